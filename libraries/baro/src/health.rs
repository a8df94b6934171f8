//! Health evaluation, primary selection and the arming gate

use std::fmt;

use hal::GpsFixType;

use crate::config::HealthPolicy;
use crate::sensor::SensorInstance;

/// Whether an instance can be used under `policy`
pub fn instance_healthy(sensor: &SensorInstance, policy: HealthPolicy) -> bool {
    match policy {
        HealthPolicy::Full => sensor.healthy && sensor.alt_ok && sensor.calibrated,
        HealthPolicy::PressureOnly => sensor.healthy,
    }
}

/// Choose the primary instance from a health vector.
///
/// The preferred instance wins when it is healthy, otherwise the lowest
/// healthy index. With nothing healthy the primary is 0 and its data must be
/// treated as untrusted.
pub fn select_primary(health: &[bool], preferred: Option<u8>) -> u8 {
    if let Some(p) = preferred {
        if health.get(p as usize).copied().unwrap_or(false) {
            return p;
        }
    }
    health.iter().position(|&h| h).map(|i| i as u8).unwrap_or(0)
}

/// Health change of the primary instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthTransition {
    BecameUnhealthy,
    Recovered,
}

/// Health change of the primary between the start and the end of a tick.
/// Reporting only on change keeps the event log from flooding.
pub fn health_transition(before: bool, after: bool) -> Option<HealthTransition> {
    match (before, after) {
        (true, false) => Some(HealthTransition::BecameUnhealthy),
        (false, true) => Some(HealthTransition::Recovered),
        _ => None,
    }
}

/// Reason the barometer refuses arming
#[derive(Debug, Clone, PartialEq)]
pub struct ArmingFailure(pub String);

impl fmt::Display for ArmingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inputs of the GPS/baro altitude discrepancy check
#[derive(Debug, Clone, Copy)]
pub struct AltitudeCrossCheck {
    /// Threshold (m), 0 disables the check
    pub alt_error_max: f32,
    pub fix: GpsFixType,
    pub gps_altitude_amsl: f32,
    /// Pressure altitude against the standard sea level pressure (m)
    pub pressure_altitude: f32,
}

/// Evaluate the arming gate
pub fn arming_check(healthy: bool, cross_check: Option<AltitudeCrossCheck>) -> Result<(), ArmingFailure> {
    if !healthy {
        return Err(ArmingFailure("not healthy".into()));
    }
    // catches a wrong sensor variant on the board, e.g. a MS5607 fitted in place of a MS5611
    if let Some(check) = cross_check {
        if check.alt_error_max > 0.0 && check.fix.has_altitude() {
            let error = (check.gps_altitude_amsl - check.pressure_altitude).abs();
            if error > check.alt_error_max {
                return Err(ArmingFailure(format!(
                    "GPS alt error {:.0}m (see {})",
                    error,
                    hal::ParamKey::AltErrorMax
                )));
            }
        }
    }
    Ok(())
}
