//! Sensor module - sensor identities and sample ingestion

mod recorder;
mod simulator;
mod window;

pub use recorder::SampleRecorder;
pub use simulator::SensorSimulator;
pub use window::SampleWindow;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Motion sensors monitored by ARMOUR.
///
/// These are the zero-permission sensors an application can register for
/// without user consent, which is what makes covert access worth detecting.
/// The set is closed; detection state is allocated per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorKind {
    Accelerometer,
    Gyroscope,
    Magnetometer,
}

/// Number of monitored sensor kinds.
pub const SENSOR_KIND_COUNT: usize = 3;

impl SensorKind {
    /// All monitored sensors, in stable order.
    pub const ALL: [SensorKind; SENSOR_KIND_COUNT] = [
        SensorKind::Accelerometer,
        SensorKind::Gyroscope,
        SensorKind::Magnetometer,
    ];

    /// Stable index into per-sensor state arrays.
    pub const fn index(self) -> usize {
        match self {
            SensorKind::Accelerometer => 0,
            SensorKind::Gyroscope => 1,
            SensorKind::Magnetometer => 2,
        }
    }

    /// Human-readable name, also used for recorded file names and the
    /// status map keys.
    pub const fn display_name(self) -> &'static str {
        match self {
            SensorKind::Accelerometer => "Accelerometer",
            SensorKind::Gyroscope => "Gyroscope",
            SensorKind::Magnetometer => "Magnetometer",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for SensorKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Accelerometer" => Ok(SensorKind::Accelerometer),
            "Gyroscope" => Ok(SensorKind::Gyroscope),
            "Magnetometer" => Ok(SensorKind::Magnetometer),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_all_order() {
        for (i, kind) in SensorKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_display_name_round_trip() {
        for kind in SensorKind::ALL {
            assert_eq!(kind.display_name().parse::<SensorKind>(), Ok(kind));
        }
        assert!("Barometer".parse::<SensorKind>().is_err());
    }
}
