//! Multi-sensor barometer frontend
//!
//! Turns raw pressure and temperature from any number of backend drivers
//! into a calibrated altitude and climb rate, picks the primary sensor and
//! gates arming on barometer health. Bus level drivers plug in through
//! [`BaroBackend`]; everything the frontend needs from the rest of the
//! vehicle comes in through [`Resources`].

pub mod altitude;
pub mod atmosphere;
pub mod backend;
pub mod calibration;
pub mod climb_rate;
pub mod clock;
pub mod config;
pub mod error;
pub mod field_elevation;
pub mod frontend;
pub mod health;
pub mod inbox;
pub mod registry;
pub mod resources;
pub mod sensor;
pub mod shared;

#[cfg(test)]
mod testing;

/// Sensor instances the table holds
pub const MAX_INSTANCES: usize = 3;

/// Backend drivers the registry holds
pub const MAX_DRIVERS: usize = 3;

pub use backend::sim::{AltitudeProfile, SimSettings};
pub use backend::{BaroBackend, InjectedBackend, PressureGate, SimBackend};
pub use calibration::{CalibrationOutcome, CalibrationReport, CalibrationState, InstanceCalibration};
pub use climb_rate::{ClimbRateFilter, DerivativeFilter};
pub use clock::{ManualClock, StdClock};
pub use config::{BaroConfig, CalibrationConfig, FieldElevationConfig, HealthPolicy};
pub use error::{BaroError, BaroResult, CalibrationPhase};
pub use frontend::Baro;
pub use health::ArmingFailure;
pub use inbox::{Inbox, InjectedPacket, InjectedSource};
pub use registry::{BackendRegistry, BoardProbe, BusDevice, Capacity, ProbeFn, ProbeSpec};
pub use resources::{InMemoryParams, LogNotifier, Resources};
pub use sensor::{BusType, DeviceId, SensorInstance, SensorKind, SensorTable, WindCoefficients};
pub use shared::SharedBaro;

#[cfg(feature = "embassy")]
pub use clock::EmbassyClock;
