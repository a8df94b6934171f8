//! Per-instance sensor state
//!
//! A slot is claimed once by [`SensorTable::register_sensor`] and keeps its
//! index for the life of the process. Backends write raw readings into their
//! slots; the frontend derives everything else.

use crate::error::{BaroError, BaroResult};
use crate::MAX_INSTANCES;

/// No update for this long makes an instance unhealthy
pub const BARO_TIMEOUT_MS: u32 = 500;

/// A reading that has not changed for this long makes an instance unhealthy
pub const BARO_DATA_CHANGE_TIMEOUT_MS: u32 = 2000;

/// Medium the sensor measures in. Selects the altitude formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorKind {
    #[default]
    Air,
    Water,
}

/// Bus the device is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BusType {
    Unknown = 0,
    I2c = 1,
    Spi = 2,
    Uavcan = 3,
    Sitl = 4,
    Msp = 5,
    Serial = 6,
}

/// Packed bus/address/device-type identity of a sensor
///
/// Layout: bus type in bits 0..3, bus number in bits 3..8, address in bits
/// 8..16, device type in bits 16..24.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceId(pub u32);

impl DeviceId {
    pub fn new(bus_type: BusType, bus: u8, address: u8, devtype: u8) -> Self {
        DeviceId(
            (bus_type as u32 & 0x7)
                | ((bus as u32 & 0x1F) << 3)
                | ((address as u32) << 8)
                | ((devtype as u32) << 16),
        )
    }

    /// The same device with the driver type cleared. Two drivers probing the
    /// same chip compare equal on this.
    pub fn without_devtype(&self) -> Self {
        DeviceId(self.0 & 0xFFFF)
    }

    pub fn bus(&self) -> u8 {
        ((self.0 >> 3) & 0x1F) as u8
    }

    pub fn address(&self) -> u8 {
        ((self.0 >> 8) & 0xFF) as u8
    }

    pub fn devtype(&self) -> u8 {
        ((self.0 >> 16) & 0xFF) as u8
    }

    pub fn is_set(&self) -> bool {
        self.0 != 0
    }
}

/// Static port position error coefficients, one per axis direction.
/// Each is the fraction of dynamic pressure seen as static pressure error.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindCoefficients {
    pub enable: bool,
    pub forward: f32,
    pub backward: f32,
    pub right: f32,
    pub left: f32,
    pub up: f32,
    pub down: f32,
}

/// State of one registered sensor
#[derive(Debug, Clone, Default)]
pub struct SensorInstance {
    /// Raw pressure (Pa)
    pub pressure: f32,
    /// Raw temperature (C)
    pub temperature: f32,
    /// Sea level equivalent ground reference pressure (Pa)
    pub ground_pressure: f32,
    /// External pressure correction, e.g. from temperature calibration (Pa)
    pub correction_offset: f32,
    /// Pressure after correction offset and environmental corrections (Pa)
    pub corrected_pressure: f32,
    /// Altitude above the calibrated ground (m). Valid only when `alt_ok`.
    pub altitude: f32,
    pub healthy: bool,
    pub alt_ok: bool,
    pub calibrated: bool,
    pub kind: SensorKind,
    pub device_id: DeviceId,
    pub wind_coefficients: WindCoefficients,
    /// Pressure removed per unit of normalized throttle (Pa)
    pub thrust_scale: f32,
    /// Time of the last reading (ms)
    pub last_update_ms: u32,
    /// Time the reading last changed value (ms)
    pub last_change_ms: u32,
}

/// Fixed capacity table of sensor instances
#[derive(Debug, Default)]
pub struct SensorTable {
    sensors: [SensorInstance; MAX_INSTANCES],
    count: u8,
    filter_range: i8,
}

impl SensorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the next free slot.
    ///
    /// Running out of slots is a build/configuration error, not a runtime
    /// fault.
    pub fn register_sensor(&mut self) -> BaroResult<u8> {
        if self.count as usize >= MAX_INSTANCES {
            return Err(BaroError::TooManySensors { max: MAX_INSTANCES });
        }
        let index = self.count;
        self.count += 1;
        log::debug!("registered baro instance {}", index);
        Ok(index)
    }

    /// Number of registered instances
    pub fn len(&self) -> usize {
        self.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count as usize >= MAX_INSTANCES
    }

    pub fn get(&self, instance: u8) -> Option<&SensorInstance> {
        self.registered().get(instance as usize)
    }

    pub fn get_mut(&mut self, instance: u8) -> Option<&mut SensorInstance> {
        let count = self.count as usize;
        self.sensors[..count].get_mut(instance as usize)
    }

    /// Registered instances in index order
    pub fn registered(&self) -> &[SensorInstance] {
        &self.sensors[..self.count as usize]
    }

    pub fn registered_mut(&mut self) -> &mut [SensorInstance] {
        let count = self.count as usize;
        &mut self.sensors[..count]
    }

    pub fn set_kind(&mut self, instance: u8, kind: SensorKind) -> BaroResult<()> {
        let sensor = self.get_mut(instance).ok_or(BaroError::InvalidInstance(instance))?;
        sensor.kind = kind;
        Ok(())
    }

    pub fn set_device_id(&mut self, instance: u8, id: DeviceId) -> BaroResult<()> {
        let sensor = self.get_mut(instance).ok_or(BaroError::InvalidInstance(instance))?;
        sensor.device_id = id;
        Ok(())
    }

    /// Whether any registered instance already owns this bus device
    pub fn has_device(&self, id: DeviceId) -> bool {
        let wanted = id.without_devtype();
        self.registered()
            .iter()
            .any(|s| s.device_id.is_set() && s.device_id.without_devtype() == wanted)
    }

    /// Outlier gate width (percent) backends apply to new samples
    pub fn filter_range(&self) -> i8 {
        self.filter_range
    }

    pub(crate) fn set_filter_range(&mut self, range: i8) {
        self.filter_range = range;
    }

    /// Store a new reading for `instance`. Out of range instances are ignored.
    pub fn copy_to_frontend(&mut self, instance: u8, pressure: f32, temperature: f32, now_ms: u32) {
        let Some(sensor) = self.get_mut(instance) else {
            return;
        };
        if sensor.pressure != pressure || sensor.temperature != temperature {
            sensor.last_change_ms = now_ms;
        }
        sensor.pressure = pressure;
        sensor.temperature = temperature;
        sensor.last_update_ms = now_ms;
    }

    /// Recompute the backend health flag of `instance` from its reading age
    pub fn update_healthy_flag(&mut self, instance: u8, now_ms: u32) {
        let Some(sensor) = self.get_mut(instance) else {
            return;
        };
        let fresh = now_ms.wrapping_sub(sensor.last_update_ms) < BARO_TIMEOUT_MS;
        let changing = now_ms.wrapping_sub(sensor.last_change_ms) < BARO_DATA_CHANGE_TIMEOUT_MS;
        // temperatures this far out are bad data, not weather
        let sane_temperature = (-200.0..=200.0).contains(&sensor.temperature);
        sensor.healthy = fresh && changing && sensor.pressure != 0.0 && sane_temperature;
    }
}
