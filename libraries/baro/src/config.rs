//! Static configuration of the barometer frontend
//!
//! Values here are fixed for the life of the process. User tunable values
//! (primary preference, field elevation, ...) are parameters; the `*_default`
//! fields only seed them when the store has no value yet.

use crate::error::{config_error, BaroResult};

/// Which flags an instance needs to count as healthy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthPolicy {
    /// healthy, alt_ok and calibrated
    Full,
    /// Only the backend health flag. For peripherals that only forward
    /// pressure and never compute altitude.
    PressureOnly,
}

/// Calibration timing
#[derive(Debug, Clone)]
pub struct CalibrationConfig {
    /// Rounds of healthy readings discarded before sampling
    pub settle_rounds: u8,
    /// Rounds averaged into the ground pressure
    pub samples: u8,
    /// Longest a round may wait for a healthy reading
    pub round_timeout_ms: u32,
    /// Delay between polls inside a round
    pub poll_delay_ms: u32,
    /// Delay between rounds
    pub round_delay_ms: u32,
    /// Minimum interval between ground pressure notifications
    pub notify_interval_ms: u32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            settle_rounds: 10,
            samples: 5,
            round_timeout_ms: 500,
            poll_delay_ms: 10,
            round_delay_ms: 100,
            notify_interval_ms: 10_000,
        }
    }
}

/// Field elevation controller tuning
#[derive(Debug, Clone)]
pub struct FieldElevationConfig {
    pub enabled: bool,
    /// Minimum time between accepted changes
    pub interval_ms: u32,
    /// Requested changes smaller than this are ignored (m)
    pub deadband_m: f32,
}

impl Default for FieldElevationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 1000,
            deadband_m: 1.0,
        }
    }
}

/// Configuration for the barometer frontend
#[derive(Debug, Clone)]
pub struct BaroConfig {
    pub calibration: CalibrationConfig,
    pub field_elevation: FieldElevationConfig,
    pub health_policy: HealthPolicy,
    /// Allow init and calibration with no sensor at all
    pub allow_no_sensors: bool,
    /// Compare baro and GPS altitude in the arming checks
    pub altitude_cross_check: bool,
    /// Log mask bit for per-tick records, `None` disables them
    pub log_bit: Option<u32>,
    /// Share of the new altitude offset blended in per tick
    pub offset_slew: f32,
    /// Offset differences below this are applied at once (m)
    pub offset_deadband_m: f32,
    /// How long an externally set temperature stays valid
    pub external_temperature_timeout_ms: u32,
    /// Upper bound on sensor temperature used as ambient (C)
    pub internal_temperature_clamp: f32,
    /// Ambient ground temperature before any calibration (C)
    pub ground_temperature_default: f32,
    pub primary_default: i8,
    pub alt_error_max_default: f32,
    pub specific_gravity_default: f32,
    pub filter_range_default: i8,
}

impl Default for BaroConfig {
    fn default() -> Self {
        Self {
            calibration: CalibrationConfig::default(),
            field_elevation: FieldElevationConfig::default(),
            health_policy: HealthPolicy::Full,
            allow_no_sensors: false,
            altitude_cross_check: true,
            log_bit: None,
            offset_slew: 0.02,
            offset_deadband_m: 0.01,
            external_temperature_timeout_ms: 10_000,
            internal_temperature_clamp: 35.0,
            ground_temperature_default: 15.0,
            primary_default: 0,
            alt_error_max_default: 2000.0,
            specific_gravity_default: 1.0,
            filter_range_default: 0,
        }
    }
}

impl BaroConfig {
    /// Configuration for a peripheral that only forwards pressure
    pub fn peripheral() -> Self {
        Self {
            health_policy: HealthPolicy::PressureOnly,
            allow_no_sensors: true,
            altitude_cross_check: false,
            field_elevation: FieldElevationConfig {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Configuration for an underwater vehicle
    pub fn submarine() -> Self {
        Self {
            altitude_cross_check: false,
            field_elevation: FieldElevationConfig {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn with_calibration(mut self, calibration: CalibrationConfig) -> Self {
        self.calibration = calibration;
        self
    }

    pub fn with_health_policy(mut self, policy: HealthPolicy) -> Self {
        self.health_policy = policy;
        self
    }

    pub fn with_log_bit(mut self, bit: u32) -> Self {
        self.log_bit = Some(bit);
        self
    }

    pub fn with_allow_no_sensors(mut self, allow: bool) -> Self {
        self.allow_no_sensors = allow;
        self
    }

    pub fn with_altitude_cross_check(mut self, enabled: bool) -> Self {
        self.altitude_cross_check = enabled;
        self
    }

    pub fn with_field_elevation(mut self, enabled: bool) -> Self {
        self.field_elevation.enabled = enabled;
        self
    }

    /// Check the configuration for values the frontend cannot work with
    pub fn validate(&self) -> BaroResult<()> {
        let cal = &self.calibration;
        if cal.samples == 0 {
            return Err(config_error("at least one sample is required", Some("calibration.samples")));
        }
        if cal.round_timeout_ms == 0 {
            return Err(config_error("timeout must be positive", Some("calibration.round_timeout_ms")));
        }
        if cal.poll_delay_ms == 0 {
            // a zero poll delay would spin forever on a frozen clock
            return Err(config_error("poll delay must be positive", Some("calibration.poll_delay_ms")));
        }
        if !(self.offset_slew > 0.0 && self.offset_slew <= 1.0) {
            return Err(config_error(
                format!("offset slew {} outside (0, 1]", self.offset_slew),
                Some("offset_slew"),
            ));
        }
        if !(self.specific_gravity_default > 0.0) || self.specific_gravity_default.is_infinite() {
            return Err(config_error(
                format!("specific gravity {} must be positive", self.specific_gravity_default),
                Some("specific_gravity_default"),
            ));
        }
        if self.field_elevation.deadband_m < 0.0 || self.field_elevation.deadband_m.is_nan() {
            return Err(config_error("deadband must not be negative", Some("field_elevation.deadband_m")));
        }
        Ok(())
    }
}
