//! Backend registration
//!
//! Board code describes the sensors it may carry as data ([`BoardProbe`],
//! [`ProbeSpec`]); the registry walks those tables uniformly and stops once
//! either table is full.

use crate::backend::BaroBackend;
use crate::error::{BaroError, BaroResult};
use crate::sensor::{BusType, DeviceId, SensorTable};
use crate::MAX_DRIVERS;

/// A device on a bus, as handed to a probe function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusDevice {
    pub bus_type: BusType,
    pub bus: u8,
    pub address: u8,
}

impl BusDevice {
    pub const fn i2c(bus: u8, address: u8) -> Self {
        Self {
            bus_type: BusType::I2c,
            bus,
            address,
        }
    }

    pub const fn spi(bus: u8, address: u8) -> Self {
        Self {
            bus_type: BusType::Spi,
            bus,
            address,
        }
    }

    /// Identity of the device as a driver of type `devtype`
    pub fn device_id(&self, devtype: u8) -> DeviceId {
        DeviceId::new(self.bus_type, self.bus, self.address, devtype)
    }
}

/// Look for a chip at `device`. Returns `Ok(None)` when nothing answers.
pub type ProbeFn = fn(&mut SensorTable, BusDevice) -> BaroResult<Option<Box<dyn BaroBackend>>>;

/// A fixed board sensor
#[derive(Clone, Copy)]
pub struct BoardProbe {
    pub probe: ProbeFn,
    pub device: BusDevice,
}

/// A sensor family probed on every external bus
#[derive(Clone, Copy)]
pub struct ProbeSpec {
    /// Bit in the external probe mask that enables this entry
    pub bit: u32,
    pub probe: ProbeFn,
    pub address: u8,
}

/// Whether registration can continue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    Available,
    Exhausted,
}

/// Fixed capacity table of backend drivers
#[derive(Default)]
pub struct BackendRegistry {
    drivers: heapless::Vec<Box<dyn BaroBackend>, MAX_DRIVERS>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a driver. Running out of slots is a configuration error.
    pub fn add_backend(&mut self, backend: Box<dyn BaroBackend>) -> BaroResult<()> {
        let name = backend.name();
        self.drivers
            .push(backend)
            .map_err(|_| BaroError::TooManyDrivers { max: MAX_DRIVERS })?;
        log::info!("baro driver {}: {}", self.drivers.len() - 1, name);
        Ok(())
    }

    /// Add the result of a probe, reporting whether there is room for more
    pub fn try_add(&mut self, sensors: &SensorTable, backend: Option<Box<dyn BaroBackend>>) -> BaroResult<Capacity> {
        if let Some(backend) = backend {
            self.add_backend(backend)?;
        }
        Ok(self.capacity(sensors))
    }

    pub fn capacity(&self, sensors: &SensorTable) -> Capacity {
        if self.drivers.is_full() || sensors.is_full() {
            Capacity::Exhausted
        } else {
            Capacity::Available
        }
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    /// Whether a registered sensor already sits at this I2C bus/address
    pub fn have_bus_driver(&self, sensors: &SensorTable, bus: u8, address: u8) -> bool {
        sensors.has_device(BusDevice::i2c(bus, address).device_id(0))
    }

    pub fn drivers_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn BaroBackend>> {
        self.drivers.iter_mut()
    }

    /// Run one probe unless the device is already owned
    pub fn probe(&mut self, sensors: &mut SensorTable, probe: ProbeFn, device: BusDevice) -> BaroResult<Capacity> {
        if self.capacity(sensors) == Capacity::Exhausted {
            return Ok(Capacity::Exhausted);
        }
        if sensors.has_device(device.device_id(0)) {
            log::debug!("{:?} bus {} 0x{:02x} already registered", device.bus_type, device.bus, device.address);
            return Ok(Capacity::Available);
        }
        let backend = probe(sensors, device)?;
        self.try_add(sensors, backend)
    }

    /// Probe a fixed board list in order
    pub fn probe_board(&mut self, sensors: &mut SensorTable, list: &[BoardProbe]) -> BaroResult<Capacity> {
        for entry in list {
            if self.probe(sensors, entry.probe, entry.device)? == Capacity::Exhausted {
                return Ok(Capacity::Exhausted);
            }
        }
        Ok(self.capacity(sensors))
    }

    /// Probe every enabled spec on every bus in `bus_mask`
    pub fn probe_external(
        &mut self,
        sensors: &mut SensorTable,
        specs: &[ProbeSpec],
        probe_mask: u32,
        bus_mask: u32,
    ) -> BaroResult<Capacity> {
        for spec in specs.iter().filter(|spec| probe_mask & spec.bit != 0) {
            for bus in (0..32u8).filter(|bus| bus_mask & (1u32 << bus) != 0) {
                if self.probe(sensors, spec.probe, BusDevice::i2c(bus, spec.address))? == Capacity::Exhausted {
                    return Ok(Capacity::Exhausted);
                }
            }
        }
        Ok(self.capacity(sensors))
    }
}
