//! Self-contained HTML viewer for a telemetry run
//!
//! The page embeds the frames and envelope levels as JSON and draws them on a
//! canvas with inline script only, so it opens offline.

use std::fs;
use std::path::Path;

use serde_json::json;

use crate::config::EnvelopeConfig;
use crate::telemetry::TelemetryFrame;
use crate::FlightResult;

const CONFIG_SLOT: &str = "__FLIGHT_CONFIG__";
const TELEMETRY_SLOT: &str = "__FLIGHT_TELEMETRY__";
const TITLE_SLOT: &str = "__FLIGHT_TITLE__";

/// Generates an interactive 3D HTML visualization from telemetry frames.
#[derive(Debug, Clone, Copy)]
pub struct FlightRenderer<'a> {
    frames: &'a [TelemetryFrame],
    config: &'a EnvelopeConfig,
}

impl<'a> FlightRenderer<'a> {
    pub fn new(frames: &'a [TelemetryFrame], config: &'a EnvelopeConfig) -> Self {
        Self { frames, config }
    }

    pub fn render_html(&self, title: &str) -> FlightResult<String> {
        let config = json!({
            "atr": self.config.atr,
            "flip": self.config.flip,
            "put_wall": self.config.put_wall,
            "call_wall": self.config.call_wall,
            "risk_proxy_base": self.config.risk_proxy_base,
        });
        let telemetry = serde_json::to_string(self.frames)?;

        Ok(PAGE_TEMPLATE
            .replace(TITLE_SLOT, &escape_html(title))
            .replace(CONFIG_SLOT, &script_safe(&config.to_string()))
            .replace(TELEMETRY_SLOT, &script_safe(&telemetry)))
    }

    pub fn render_to_file(&self, path: &Path, title: &str) -> FlightResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.render_html(title)?)?;
        Ok(())
    }
}

/// Keeps embedded JSON from closing the surrounding script element.
fn script_safe(json: &str) -> String {
    json.replace("</", "<\\/")
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const PAGE_TEMPLATE: &str = r##"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>__FLIGHT_TITLE__ - Option Flight Envelope</title>
<style>
  body { margin: 0; background: #050505; color: #00ff88; font-family: monospace; overflow: hidden; }
  #hud { position: absolute; top: 20px; left: 20px; background: rgba(0, 40, 0, 0.7); padding: 15px; border: 1px solid #00ff88; width: 260px; pointer-events: none; }
  #controls { position: absolute; bottom: 20px; left: 50%; transform: translateX(-50%); background: rgba(0, 20, 0, 0.8); padding: 10px; border: 1px solid #00ff88; display: flex; gap: 10px; align-items: center; }
  .warning { color: #ff5555; }
  input[type=range] { width: 300px; }
  button { background: #004422; color: #00ff88; border: 1px solid #00ff88; padding: 5px 10px; cursor: pointer; }
  canvas { display: block; }
</style>
</head>
<body>
<div id="hud">
  <div style="font-size: 1.2em; border-bottom: 1px solid #00ff88; margin-bottom: 10px;">__FLIGHT_TITLE__</div>
  <div>REGIME: <span id="regime">-</span></div>
  <div>SPOT: <span id="spot">-</span></div>
  <div>AIRSPEED (X): <span id="x">-</span></div>
  <div>LOAD (Y): <span id="y">-</span> (rel <span id="rel">-</span>)</div>
  <div>PROXIMITY (Z): <span id="z">-</span></div>
  <div id="warnings" style="margin-top: 10px;"></div>
</div>
<div id="controls">
  <button id="play">PLAY</button>
  <input type="range" id="timeline" min="0" max="0" step="1" value="0">
  <span id="counter">0/0</span>
</div>
<canvas id="view"></canvas>
<script>
const config = __FLIGHT_CONFIG__;
const telemetry = __FLIGHT_TELEMETRY__;
const colors = { TAXI: '#88ff88', CRUISE: '#00ffff', MANEUVER: '#ffaa00', RUPTURE: '#ff0055' };
const canvas = document.getElementById('view');
const ctx = canvas.getContext('2d');
const timeline = document.getElementById('timeline');
const counter = document.getElementById('counter');
const playBtn = document.getElementById('play');
let step = 0;
let playing = false;

function resize() { canvas.width = window.innerWidth; canvas.height = window.innerHeight; }
window.addEventListener('resize', resize);
resize();

timeline.max = Math.max(telemetry.length - 1, 0);

function squash(v, limit) {
  if (Math.abs(v) <= limit) return v;
  return Math.sign(v) * (limit + Math.log(1 + Math.abs(v) - limit));
}

function project(x, y, z) {
  const scale = Math.min(canvas.width, canvas.height) * 0.8;
  const depth = z + 12;
  if (depth <= 0.5) return null;
  return { x: (squash(x, 6) / depth) * scale + canvas.width / 2, y: (-(squash(y, 5) - 1) / depth) * scale + canvas.height / 2 };
}

function line(a, b, style, width) {
  if (!a || !b) return;
  ctx.strokeStyle = style;
  ctx.lineWidth = width;
  ctx.beginPath();
  ctx.moveTo(a.x, a.y);
  ctx.lineTo(b.x, b.y);
  ctx.stroke();
}

function drawEnvelope() {
  const corners = [[-2.5, -1], [2.5, -1], [2.5, 1.5], [-2.5, 1.5]];
  for (let z = -4; z <= 4; z += 2) {
    for (let i = 0; i < corners.length; i++) {
      const c1 = corners[i];
      const c2 = corners[(i + 1) % corners.length];
      line(project(c1[0], c1[1], z), project(c2[0], c2[1], z), 'rgba(0, 255, 136, 0.25)', 1);
    }
  }
  corners.forEach(c => line(project(c[0], c[1], -4), project(c[0], c[1], 4), 'rgba(0, 255, 136, 0.15)', 2));
}

function frameDepth(i) { return (i / Math.max(telemetry.length, 1)) * 8 - 4; }

function frameSide(f) { return f.spot < config.flip ? -1 : 1; }

function drawPath() {
  for (let i = 1; i <= step && i < telemetry.length; i++) {
    const a = telemetry[i - 1];
    const b = telemetry[i];
    line(
      project(frameSide(a) * a.x, a.y - 0.5, frameDepth(i - 1)),
      project(frameSide(b) * b.x, b.y - 0.5, frameDepth(i)),
      colors[b.regime] || '#ffffff',
      b.regime === 'RUPTURE' ? 4 : 2
    );
  }
}

function updateHud() {
  const f = telemetry[step];
  if (!f) return;
  const regime = document.getElementById('regime');
  regime.innerText = f.regime;
  regime.style.color = colors[f.regime] || '#ffffff';
  document.getElementById('spot').innerText = f.spot.toFixed(2);
  document.getElementById('x').innerText = f.x.toFixed(3);
  document.getElementById('y').innerText = f.y.toFixed(3);
  document.getElementById('rel').innerText = (f.y / config.risk_proxy_base).toFixed(3);
  document.getElementById('z').innerText = f.z.toFixed(3);
  document.getElementById('warnings').innerHTML = f.flags.map(w => '<div class="warning">' + w + '</div>').join('');
  counter.innerText = step + '/' + Math.max(telemetry.length - 1, 0);
  timeline.value = step;
}

function draw() {
  ctx.fillStyle = '#050505';
  ctx.fillRect(0, 0, canvas.width, canvas.height);
  drawEnvelope();
  drawPath();
  updateHud();
}

timeline.addEventListener('input', () => { step = parseInt(timeline.value, 10); draw(); });
playBtn.addEventListener('click', () => { playing = !playing; playBtn.innerText = playing ? 'PAUSE' : 'PLAY'; });

function tick() {
  if (playing && telemetry.length > 0) {
    step = (step + 1) % telemetry.length;
  }
  draw();
  requestAnimationFrame(tick);
}
tick();
</script>
</body>
</html>
"##;
