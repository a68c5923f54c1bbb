// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/armour-rs

//! Sample timestamp recorder
//!
//! Appends raw sample timestamps to one CSV per sensor inside a timestamped
//! session directory. Recorded sessions are the input to the offline
//! profiling pipeline.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::{SensorKind, SENSOR_KIND_COUNT};

const SAMPLE_HEADER: &str = "Timestamp[nanosec],Unix time[nanosec]";

/// Per-sensor CSV writer for recorded sample timestamps.
pub struct SampleRecorder {
    dir: PathBuf,
    writers: Mutex<[Option<BufWriter<File>>; SENSOR_KIND_COUNT]>,
}

impl SampleRecorder {
    /// Create a session directory `<when>_Profiling_<name>` under
    /// `base_dir` and open one CSV per sensor inside it.
    pub fn create(base_dir: &Path, session_name: &str) -> Result<Self> {
        let stamp = Utc::now().format("%Y_%m_%d_%H_%M_%S");
        let dir = base_dir.join(format!("{}_Profiling_{}", stamp, session_name));
        Self::create_at(&dir)
    }

    /// Open a recorder writing directly into `dir`.
    pub fn create_at(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;

        let mut writers: [Option<BufWriter<File>>; SENSOR_KIND_COUNT] =
            std::array::from_fn(|_| None);
        for kind in SensorKind::ALL {
            let path = dir.join(format!("{}.csv", kind.display_name()));
            let mut writer = BufWriter::new(File::create(&path)?);
            writeln!(writer, "{}", SAMPLE_HEADER)?;
            writers[kind.index()] = Some(writer);
        }

        info!("Recording sample timestamps to {:?}", dir);
        Ok(Self {
            dir: dir.to_path_buf(),
            writers: Mutex::new(writers),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append one sample row. A no-op after `close`.
    pub fn record(&self, sensor: SensorKind, timestamp_ns: i64, unix_ms: i64) -> Result<()> {
        let mut writers = self.writers.lock();
        if let Some(writer) = writers[sensor.index()].as_mut() {
            // Unix time column is nanoseconds to match the sample column.
            writeln!(writer, "{},{}000000", timestamp_ns, unix_ms)?;
        }
        Ok(())
    }

    /// Flush and close all writers. Idempotent.
    pub fn close(&self) -> Result<()> {
        let mut writers = self.writers.lock();
        let mut closed = 0;
        for slot in writers.iter_mut() {
            if let Some(mut writer) = slot.take() {
                writer.flush()?;
                closed += 1;
            }
        }
        if closed > 0 {
            debug!("Closed {} sample writers in {:?}", closed, self.dir);
        }
        Ok(())
    }
}

impl Drop for SampleRecorder {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("armour-recorder-{}-{}", tag, std::process::id()))
    }

    #[test]
    fn test_recorded_rows_round_trip() {
        let dir = temp_dir("rows");
        let recorder = SampleRecorder::create_at(&dir).unwrap();
        recorder
            .record(SensorKind::Accelerometer, 1_000_000, 1700)
            .unwrap();
        recorder
            .record(SensorKind::Accelerometer, 201_000_000, 1900)
            .unwrap();
        recorder.close().unwrap();

        let content = std::fs::read_to_string(dir.join("Accelerometer.csv")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], SAMPLE_HEADER);
        assert_eq!(lines[1], "1000000,1700000000");
        assert_eq!(lines[2], "201000000,1900000000");

        // Writers are gone; further records are silent no-ops.
        recorder
            .record(SensorKind::Accelerometer, 401_000_000, 2100)
            .unwrap();
        let after = std::fs::read_to_string(dir.join("Accelerometer.csv")).unwrap();
        assert_eq!(after.lines().count(), 3);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_every_sensor_gets_a_file() {
        let dir = temp_dir("files");
        let recorder = SampleRecorder::create_at(&dir).unwrap();
        recorder.close().unwrap();
        for kind in SensorKind::ALL {
            assert!(dir.join(format!("{}.csv", kind.display_name())).exists());
        }
        let _ = std::fs::remove_dir_all(&dir);
    }
}
