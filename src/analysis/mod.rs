//! Analysis module - sampling-rate estimation and offline profiling

mod profiling;
mod rate;

pub use profiling::{
    clean_rate_series, find_session_dir, min_supported_rates, session_stats, ProfilingError,
    RateStats,
};
pub use rate::{instantaneous_rate, window_rate, NANOS_PER_SEC};
