//! Offline profiling - minimum supported sampling rate analysis
//!
//! Recorded sample logs are noisy at their edges (sensor warm-up, listener
//! teardown) and occasionally mid-stream (scheduling hiccups). This module
//! cleans a recorded timestamp log into a stable rate series, then reduces
//! a profiling session to the minimum rate the device actually delivers,
//! which is what detection thresholds are derived from.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use super::rate::NANOS_PER_SEC;
use crate::sensors::SensorKind;

/// Failures of the offline profiling pipeline.
#[derive(Debug, Error)]
pub enum ProfilingError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("malformed sample row: {0:?}")]
    MalformedRow(String),

    #[error("not enough samples in {0:?}")]
    NotEnoughData(PathBuf),
}

/// Summary of one recorded sensor log.
#[derive(Debug, Clone, PartialEq)]
pub struct RateStats {
    /// Mean of the cleaned rate series, Hz.
    pub average_rate: f64,
    /// Cleaned series length.
    pub sample_count: usize,
}

/// Tolerated rate difference between neighbors before one of them counts
/// as an outlier. Absolute bands: faster sensors wobble more in absolute
/// terms, so the tolerance widens with the rate.
fn rate_tolerance(a: f64, b: f64) -> f64 {
    let fastest = a.max(b);
    if fastest < 10.0 {
        0.1
    } else if fastest < 50.0 {
        0.5
    } else if fastest < 400.0 {
        1.0
    } else {
        2.0
    }
}

fn is_outlier(a: f64, b: f64) -> bool {
    (a - b).abs() > rate_tolerance(a, b)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Turn a recorded timestamp log into a cleaned instantaneous-rate series.
///
/// Non-positive deltas are dropped, outliers at the edges are trimmed, and
/// interior outliers are replaced by the nearer of their stable neighbors.
/// Series too short to judge are returned as-is.
pub fn clean_rate_series(timestamps_ns: &[i64]) -> Vec<f64> {
    let mut rates: Vec<f64> = timestamps_ns
        .windows(2)
        .filter(|w| w[1] > w[0])
        .map(|w| NANOS_PER_SEC / (w[1] - w[0]) as f64)
        .collect();

    if rates.len() < 3 {
        return rates.iter().copied().map(round1).collect();
    }

    // Edge trim: the first/last points must agree with the stable interior.
    while rates.len() > 2 && (is_outlier(rates[0], rates[1]) || is_outlier(rates[0], rates[2])) {
        rates.remove(0);
    }
    while rates.len() >= 3 {
        let n = rates.len();
        if is_outlier(rates[n - 1], rates[n - 2]) || is_outlier(rates[n - 1], rates[n - 3]) {
            rates.pop();
        } else {
            break;
        }
    }
    if rates.len() < 2 {
        return rates.iter().copied().map(round1).collect();
    }

    // Interior smoothing over a padded 5-point window: a point that
    // disagrees with both sides is replaced by the nearer stable neighbor.
    let first = rates[0];
    let last = rates[rates.len() - 1];
    let padded: Vec<f64> = std::iter::repeat(first)
        .take(2)
        .chain(rates.iter().copied())
        .chain(std::iter::repeat(last).take(2))
        .map(round1)
        .collect();

    let mut smoothed = Vec::with_capacity(rates.len());
    for i in 2..padded.len() - 2 {
        let (c1, c2, c3, c4, c5) = (
            padded[i - 2],
            padded[i - 1],
            padded[i],
            padded[i + 1],
            padded[i + 2],
        );
        if (is_outlier(c3, c2) || is_outlier(c3, c1)) && (is_outlier(c3, c4) || is_outlier(c3, c5))
        {
            let replacement = if (c3 - c1).abs() <= (c3 - c5).abs() { c1 } else { c5 };
            smoothed.push(replacement);
        } else {
            smoothed.push(c3);
        }
    }
    smoothed
}

/// Parse the timestamp column of a recorded sample log.
fn load_timestamps(path: &Path) -> Result<Vec<i64>, ProfilingError> {
    let content = std::fs::read_to_string(path)?;
    let mut timestamps = Vec::new();
    for line in content.lines().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let column = line.split(',').next().unwrap_or_default();
        let timestamp: i64 = column
            .parse()
            .map_err(|_| ProfilingError::MalformedRow(line.to_string()))?;
        timestamps.push(timestamp);
    }
    Ok(timestamps)
}

/// Clean one recorded log and summarize its delivered rate.
pub fn session_stats(path: &Path) -> Result<RateStats, ProfilingError> {
    let timestamps = load_timestamps(path)?;
    if timestamps.len() < 3 {
        return Err(ProfilingError::NotEnoughData(path.to_path_buf()));
    }
    let rates = clean_rate_series(&timestamps);
    if rates.is_empty() {
        return Err(ProfilingError::NotEnoughData(path.to_path_buf()));
    }
    let average_rate = rates.iter().sum::<f64>() / rates.len() as f64;
    Ok(RateStats {
        average_rate,
        sample_count: rates.len(),
    })
}

/// Minimum delivered rate per sensor across all runs of a profiling
/// session.
///
/// A session directory either contains one subdirectory per requested rate
/// or holds the sensor logs directly. Sensors with no usable log in any run
/// are absent from the result; unreadable logs are skipped with a warning
/// rather than failing the whole session.
pub fn min_supported_rates(
    session_dir: &Path,
) -> Result<HashMap<SensorKind, f64>, ProfilingError> {
    let mut run_dirs: Vec<PathBuf> = std::fs::read_dir(session_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    run_dirs.sort();
    if run_dirs.is_empty() {
        run_dirs.push(session_dir.to_path_buf());
    }

    let mut result = HashMap::new();
    for kind in SensorKind::ALL {
        let mut min_rate: Option<f64> = None;
        for run in &run_dirs {
            let file = run.join(format!("{}.csv", kind.display_name()));
            if !file.exists() {
                continue;
            }
            match session_stats(&file) {
                Ok(stats) if stats.sample_count > 0 => {
                    debug!(
                        "{:?}: {} averaged {:.2} Hz over {} samples",
                        run, kind, stats.average_rate, stats.sample_count
                    );
                    min_rate =
                        Some(min_rate.map_or(stats.average_rate, |m| m.min(stats.average_rate)));
                }
                Ok(_) => {}
                Err(err) => warn!("Skipping {:?}: {}", file, err),
            }
        }
        match min_rate {
            Some(rate) => {
                result.insert(kind, rate);
            }
            None => warn!("No usable profiling data for {}", kind),
        }
    }
    Ok(result)
}

/// Newest profiling session directory for `name` under `base`, if any.
///
/// Matches the recorder's `<when>_Profiling_<name>` naming, falling back to
/// an exact directory name.
pub fn find_session_dir(base: &Path, name: &str) -> Option<PathBuf> {
    let suffix = format!("_Profiling_{}", name);
    let newest = std::fs::read_dir(base)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(&suffix))
                .unwrap_or(false)
        })
        .filter_map(|path| {
            let modified = path.metadata().and_then(|m| m.modified()).ok()?;
            Some((modified, path))
        })
        .max_by_key(|(modified, _)| *modified)
        .map(|(_, path)| path);
    if newest.is_some() {
        return newest;
    }

    let exact = base.join(name);
    exact.is_dir().then_some(exact)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Timestamps with uniform spacing for the given rate.
    fn uniform_timestamps(rate_hz: f64, count: usize) -> Vec<i64> {
        let step = (NANOS_PER_SEC / rate_hz) as i64;
        (0..count as i64).map(|i| i * step).collect()
    }

    fn write_log(path: &Path, timestamps: &[i64]) {
        let mut content = String::from("Timestamp[nanosec],Unix time[nanosec]\n");
        for ts in timestamps {
            content.push_str(&format!("{},{}\n", ts, ts + 1_700_000_000_000_000_000));
        }
        std::fs::write(path, content).unwrap();
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("armour-profiling-{}-{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_tolerance_widens_with_rate() {
        assert!(!is_outlier(5.0, 5.05));
        assert!(is_outlier(5.0, 5.2));
        assert!(!is_outlier(30.0, 30.4));
        assert!(is_outlier(30.0, 30.6));
        assert!(!is_outlier(100.0, 100.8));
        assert!(is_outlier(100.0, 101.5));
        assert!(!is_outlier(500.0, 501.5));
    }

    #[test]
    fn test_interior_spike_is_smoothed() {
        // 5 Hz series with one halved interval: rates 5,5,5,10,5,5,5.
        let step = 200_000_000i64;
        let timestamps = vec![
            0,
            step,
            2 * step,
            3 * step,
            3 * step + step / 2,
            4 * step + step / 2,
            5 * step + step / 2,
            6 * step + step / 2,
        ];
        let cleaned = clean_rate_series(&timestamps);
        assert_eq!(cleaned.len(), 7);
        assert!(cleaned.iter().all(|r| (*r - 5.0).abs() < 0.4), "{:?}", cleaned);
    }

    #[test]
    fn test_leading_outliers_are_trimmed() {
        // A fast warm-up delta followed by a stable 5 Hz tail.
        let mut timestamps = vec![0, 20_000_000];
        for i in 1..=6 {
            timestamps.push(20_000_000 + i * 200_000_000);
        }
        let cleaned = clean_rate_series(&timestamps);
        assert!(cleaned.iter().all(|r| (*r - 5.0).abs() < 0.1), "{:?}", cleaned);
    }

    #[test]
    fn test_duplicate_timestamps_are_dropped() {
        let timestamps = vec![0, 200_000_000, 200_000_000, 400_000_000, 600_000_000];
        let cleaned = clean_rate_series(&timestamps);
        assert_eq!(cleaned.len(), 3);
        assert!(cleaned.iter().all(|r| (*r - 5.0).abs() < 0.1));
    }

    #[test]
    fn test_session_stats_average() {
        let dir = temp_dir("stats");
        let file = dir.join("Accelerometer.csv");
        write_log(&file, &uniform_timestamps(5.0, 20));

        let stats = session_stats(&file).unwrap();
        assert!((stats.average_rate - 5.0).abs() < 0.1);
        assert_eq!(stats.sample_count, 19);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_session_stats_rejects_short_logs() {
        let dir = temp_dir("short");
        let file = dir.join("Gyroscope.csv");
        write_log(&file, &[0, 200_000_000]);
        assert!(matches!(
            session_stats(&file),
            Err(ProfilingError::NotEnoughData(_))
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_malformed_row_is_reported() {
        let dir = temp_dir("malformed");
        let file = dir.join("Magnetometer.csv");
        std::fs::write(&file, "Timestamp[nanosec],Unix time[nanosec]\nnot-a-number,0\n").unwrap();
        assert!(matches!(
            session_stats(&file),
            Err(ProfilingError::MalformedRow(_))
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_min_rate_across_rate_runs() {
        let dir = temp_dir("runs");
        for (run, rate) in [("0", 8.0), ("1", 5.0)] {
            let run_dir = dir.join(run);
            std::fs::create_dir_all(&run_dir).unwrap();
            write_log(
                &run_dir.join("Accelerometer.csv"),
                &uniform_timestamps(rate, 20),
            );
        }

        let rates = min_supported_rates(&dir).unwrap();
        let accel = rates.get(&SensorKind::Accelerometer).copied().unwrap();
        assert!((accel - 5.0).abs() < 0.1, "minimum should win: {}", accel);
        // No gyroscope/magnetometer logs: absent, not zero.
        assert!(!rates.contains_key(&SensorKind::Gyroscope));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_flat_session_without_run_dirs() {
        let dir = temp_dir("flat");
        write_log(&dir.join("Gyroscope.csv"), &uniform_timestamps(10.0, 20));
        let rates = min_supported_rates(&dir).unwrap();
        assert!((rates[&SensorKind::Gyroscope] - 10.0).abs() < 0.1);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_find_session_dir_prefers_profiling_suffix() {
        let base = temp_dir("find");
        let session = base.join("2026_08_07_10_00_00_Profiling_bench");
        std::fs::create_dir_all(&session).unwrap();
        assert_eq!(find_session_dir(&base, "bench"), Some(session));

        // Exact-name fallback.
        let exact = base.join("plain");
        std::fs::create_dir_all(&exact).unwrap();
        assert_eq!(find_session_dir(&base, "plain"), Some(exact));
        assert_eq!(find_session_dir(&base, "missing"), None);

        let _ = std::fs::remove_dir_all(&base);
    }
}
