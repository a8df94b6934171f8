//! Per-tick pressure to altitude conversion
//!
//! Runs for every healthy instance after the backends refreshed. A poisoned
//! ground reference is replaced by the current reading, and a non-finite
//! altitude clears `alt_ok` instead of being published.

use hal::Vector3d;

use crate::atmosphere::{altitude_difference, water_altitude, SSL_AIR_DENSITY};
use crate::sensor::{SensorInstance, SensorKind, WindCoefficients};

/// Inputs shared by all instances during one tick
#[derive(Debug, Clone, Copy, Default)]
pub struct Environment {
    /// Active field elevation (m AMSL)
    pub field_elevation: f32,
    /// Ground temperature used in the barometric formula (C)
    pub ground_temperature: f32,
    /// Specific gravity for water sensors
    pub specific_gravity: f32,
    /// Active altitude offset (m)
    pub alt_offset: f32,
    /// True airspeed in body frame, when known
    pub airspeed: Option<Vector3d>,
    /// Air density relative to sea level
    pub air_density_ratio: f32,
    /// Normalized throttle output, when a motor output is connected
    pub throttle: Option<f32>,
}

/// What happened to one instance during an altitude update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AltitudeOutcome {
    /// The ground pressure was invalid and was reset to the raw reading
    pub ground_pressure_reset: bool,
    pub alt_ok: bool,
}

/// Static pressure error caused by airflow over the static port
pub fn wind_pressure_correction(coeffs: &WindCoefficients, airspeed: Option<Vector3d>, density_ratio: f32) -> f32 {
    if !coeffs.enable {
        return 0.0;
    }
    let Some(v) = airspeed else {
        return 0.0;
    };
    let directional = |value: f32, positive: f32, negative: f32| {
        let coeff = if value > 0.0 { positive } else { negative };
        coeff * value * value
    };
    let error = directional(v.x, coeffs.forward, coeffs.backward)
        + directional(v.y, coeffs.right, coeffs.left)
        + directional(v.z, coeffs.down, coeffs.up);
    error * 0.5 * SSL_AIR_DENSITY * density_ratio
}

/// Local pressure change from propwash, linear in throttle
pub fn thrust_pressure_correction(thrust_scale: f32, throttle: Option<f32>) -> f32 {
    match throttle {
        Some(throttle) => thrust_scale * throttle.max(0.0),
        None => 0.0,
    }
}

fn valid_ground_pressure(pressure: f32) -> bool {
    pressure > 0.0 && !pressure.is_infinite()
}

/// Recompute `corrected_pressure` and `altitude` of one healthy instance
pub fn update_instance(sensor: &mut SensorInstance, env: &Environment) -> AltitudeOutcome {
    let ground_pressure_reset = !valid_ground_pressure(sensor.ground_pressure);
    if ground_pressure_reset {
        sensor.ground_pressure = sensor.pressure;
    }

    let mut corrected = sensor.pressure + sensor.correction_offset;
    let altitude = match sensor.kind {
        SensorKind::Air => {
            corrected -= wind_pressure_correction(&sensor.wind_coefficients, env.airspeed, env.air_density_ratio);
            corrected -= thrust_pressure_correction(sensor.thrust_scale, env.throttle);
            // ground pressure is the sea level equivalent, so remove the field elevation
            altitude_difference(sensor.ground_pressure, corrected, env.ground_temperature) - env.field_elevation
        }
        SensorKind::Water => water_altitude(sensor.ground_pressure, corrected, env.specific_gravity),
    };
    sensor.corrected_pressure = corrected;

    sensor.alt_ok = !(altitude.is_nan() || altitude.is_infinite());
    if sensor.alt_ok {
        sensor.altitude = altitude + env.alt_offset;
    }
    AltitudeOutcome {
        ground_pressure_reset,
        alt_ok: sensor.alt_ok,
    }
}

/// Altitude offset that follows its target through a low pass filter.
/// Step inputs upset the navigation filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct OffsetSlew {
    target: f32,
    active: f32,
}

impl OffsetSlew {
    pub fn new(target: f32) -> Self {
        Self { target, active: target }
    }

    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    pub fn active(&self) -> f32 {
        self.active
    }

    /// Advance one tick
    pub fn step(&mut self, blend: f32, deadband: f32) -> f32 {
        if (self.target - self.active).abs() > deadband {
            self.active = (1.0 - blend) * self.active + blend * self.target;
        } else {
            self.active = self.target;
        }
        self.active
    }
}
