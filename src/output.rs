//! Per-invocation run directories
//!
//! The base directory is always supplied by the caller (CLI flag or
//! `RunnerConfig::output_dir`); nothing is resolved against the crate
//! manifest or any global location. Each call claims a fresh UTC-stamped
//! child of that base.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::FlightResult;

/// Creates `<base>/<UTC timestamp>`, suffixing `-NN` when a run in the same
/// second already claimed the name.
pub fn create_timestamped_output_dir(base: &Path) -> FlightResult<PathBuf> {
    fs::create_dir_all(base)?;

    let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let mut output_dir = base.join(&timestamp);
    let mut counter = 1_u32;

    while output_dir.exists() {
        output_dir = base.join(format!("{timestamp}-{counter:02}"));
        counter += 1;
    }

    fs::create_dir_all(&output_dir)?;
    Ok(output_dir)
}

#[cfg(test)]
mod tests {
    use super::create_timestamped_output_dir;

    #[test]
    fn repeated_runs_get_distinct_directories() {
        let base = tempfile::tempdir().unwrap();
        let first = create_timestamped_output_dir(base.path()).unwrap();
        let second = create_timestamped_output_dir(base.path()).unwrap();
        assert_ne!(first, second);
        assert!(first.is_dir() && second.is_dir());
        assert!(first.starts_with(base.path()));
    }
}
