// Simulated barometer for software-in-the-loop runs

use crate::atmosphere::{pressure_for_altitude_difference, ISA_LAPSE_RATE, SSL_AIR_PRESSURE};
use crate::backend::{BaroBackend, PressureGate};
use crate::error::BaroResult;
use crate::sensor::{DeviceId, SensorTable};

/// Altitude AMSL (m) as a function of time (ms)
pub type AltitudeProfile = Box<dyn FnMut(u32) -> f32 + Send>;

/// Simulated sensor characteristics
#[derive(Debug, Clone)]
pub struct SimSettings {
    /// Ambient temperature at sea level (C)
    pub sea_level_temperature: f32,
    /// Constant pressure error (Pa)
    pub offset_pa: f32,
    /// Peak noise amplitude (Pa)
    pub noise_pa: f32,
    /// Sensor self heating above ambient (C)
    pub self_heating: f32,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            sea_level_temperature: 15.0,
            offset_pa: 0.0,
            noise_pa: 0.5,
            self_heating: 5.0,
        }
    }
}

pub struct SimBackend {
    instance: [u8; 1],
    profile: AltitudeProfile,
    settings: SimSettings,
    gate: PressureGate,
    noise_state: u32,
}

impl SimBackend {
    pub fn new(
        sensors: &mut SensorTable,
        device_id: DeviceId,
        profile: AltitudeProfile,
        settings: SimSettings,
    ) -> BaroResult<Self> {
        let instance = sensors.register_sensor()?;
        sensors.set_device_id(instance, device_id)?;
        Ok(Self {
            instance: [instance],
            profile,
            settings,
            gate: PressureGate::new(),
            noise_state: (0x2545_F491 ^ device_id.0) | 1,
        })
    }

    // xorshift32, mapped to [-1, 1]
    fn noise(&mut self) -> f32 {
        let mut x = self.noise_state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.noise_state = x;
        (x as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}

impl BaroBackend for SimBackend {
    fn name(&self) -> &'static str {
        "SITL"
    }

    fn instances(&self) -> &[u8] {
        &self.instance
    }

    fn update(&mut self, sensors: &mut SensorTable, now_ms: u32) {
        let altitude = (self.profile)(now_ms);
        let noise = self.noise() * self.settings.noise_pa;
        let pressure = pressure_for_altitude_difference(
            SSL_AIR_PRESSURE,
            altitude,
            self.settings.sea_level_temperature,
        ) + self.settings.offset_pa
            + noise;
        let temperature =
            self.settings.sea_level_temperature - ISA_LAPSE_RATE * altitude + self.settings.self_heating;
        if !self.gate.pressure_ok(pressure, sensors.filter_range()) {
            log::trace!("sim baro {} rejected {}Pa", self.instance[0], pressure);
            return;
        }
        sensors.copy_to_frontend(self.instance[0], pressure, temperature, now_ms);
    }
}
