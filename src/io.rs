use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use csv::Writer;
use serde::Serialize;

use crate::telemetry::TelemetryFrame;
use crate::{FlightError, FlightResult};

/// Handles JSONL save/load for telemetry data.
#[derive(Debug, Clone, Copy, Default)]
pub struct TelemetryLogger;

impl TelemetryLogger {
    /// One JSON object per line, newline-terminated.
    pub fn save_log(path: &Path, frames: &[TelemetryFrame]) -> FlightResult<()> {
        ensure_parent(path)?;
        let mut writer = BufWriter::new(File::create(path)?);
        for frame in frames {
            serde_json::to_writer(&mut writer, frame)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Blank lines are skipped; the first malformed line fails the whole file.
    pub fn load_log(path: &Path) -> FlightResult<Vec<TelemetryFrame>> {
        let reader = BufReader::new(File::open(path)?);
        let mut frames = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let frame: TelemetryFrame =
                serde_json::from_str(&line).map_err(|err| FlightError::Parse {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    message: err.to_string(),
                })?;
            frames.push(frame);
        }

        Ok(frames)
    }
}

pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> FlightResult<()> {
    ensure_parent(path)?;
    let data = serde_json::to_string_pretty(value)?;
    fs::write(path, data)?;
    Ok(())
}

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> FlightResult<()> {
    ensure_parent(path)?;
    let mut writer = Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn ensure_parent(path: &Path) -> FlightResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
