//! Backend driver interface
//!
//! A backend owns one or more sensor instances and pushes their raw
//! readings into the [`SensorTable`] when the frontend refreshes it. Bus
//! level decoding lives entirely inside the backend implementations.

use crate::inbox::InjectedPacket;
use crate::sensor::SensorTable;

pub mod injected;
pub mod sim;

pub use self::injected::InjectedBackend;
pub use self::sim::SimBackend;

/// Interface for barometer backend implementations
pub trait BaroBackend: Send {
    /// Name of the driver, for diagnostics
    fn name(&self) -> &'static str;

    /// Sensor instances this backend writes to
    fn instances(&self) -> &[u8];

    /// Push fresh readings for the owned instances into the table.
    /// Called once per frontend tick.
    fn update(&mut self, sensors: &mut SensorTable, now_ms: u32);

    /// Accept a sample that arrived through a message stream rather than
    /// bus polling. Backends that poll a bus ignore these.
    fn handle_injected_message(&mut self, _packet: &InjectedPacket) {}
}

const FILTER_KOEF: f32 = 0.1;

/// Mean tracking outlier gate for noisy buses
///
/// Samples further than `range` percent from the running mean are rejected.
/// A rejected sample still nudges the mean by at most a few percent, so a
/// genuine step is accepted after enough samples.
#[derive(Debug, Clone, Default)]
pub struct PressureGate {
    mean_pressure: f32,
    error_count: u32,
}

impl PressureGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a sample against the gate, updating the running mean.
    /// `range` <= 0 accepts every finite sample.
    pub fn pressure_ok(&mut self, pressure: f32, range: i8) -> bool {
        if pressure.is_nan() || pressure.is_infinite() {
            return false;
        }
        if range <= 0 {
            return true;
        }
        if self.mean_pressure == 0.0 {
            self.mean_pressure = pressure;
            return true;
        }
        let mut ok = true;
        let d = (self.mean_pressure - pressure).abs() / (self.mean_pressure + pressure);
        let mut koeff = FILTER_KOEF;
        if d * 200.0 > range as f32 {
            ok = false;
            koeff /= d * 10.0;
            self.error_count += 1;
        }
        self.mean_pressure = self.mean_pressure * (1.0 - koeff) + pressure * koeff;
        ok
    }

    /// Number of rejected samples
    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    pub fn mean_pressure(&self) -> f32 {
        self.mean_pressure
    }
}
