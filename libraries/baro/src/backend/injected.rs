// Backend fed by a message stream instead of a bus
//
// Samples are averaged between two refreshes, so a feed that runs faster
// than the scheduler is not decimated.

use crate::backend::BaroBackend;
use crate::error::BaroResult;
use crate::inbox::{InjectedPacket, InjectedSource};
use crate::sensor::{BusType, DeviceId, SensorTable};

pub struct InjectedBackend {
    source: InjectedSource,
    sensor_id: u8,
    instance: [u8; 1],
    sum_pressure: f32,
    sum_temperature: f32,
    count: u32,
}

impl InjectedBackend {
    /// Claim a sensor slot for packets from `source` with `sensor_id`
    pub fn new(sensors: &mut SensorTable, source: InjectedSource, sensor_id: u8) -> BaroResult<Self> {
        let instance = sensors.register_sensor()?;
        let bus_type = match source {
            InjectedSource::Msp => BusType::Msp,
            InjectedSource::ExternalAhrs => BusType::Serial,
            InjectedSource::Can => BusType::Uavcan,
        };
        sensors.set_device_id(instance, DeviceId::new(bus_type, 0, sensor_id, 0))?;
        log::info!("baro {}: {:?} sensor {}", instance, source, sensor_id);
        Ok(Self {
            source,
            sensor_id,
            instance: [instance],
            sum_pressure: 0.0,
            sum_temperature: 0.0,
            count: 0,
        })
    }

    /// Number of packets waiting for the next refresh
    pub fn pending(&self) -> u32 {
        self.count
    }
}

impl BaroBackend for InjectedBackend {
    fn name(&self) -> &'static str {
        match self.source {
            InjectedSource::Msp => "MSP",
            InjectedSource::ExternalAhrs => "ExternalAHRS",
            InjectedSource::Can => "CAN",
        }
    }

    fn instances(&self) -> &[u8] {
        &self.instance
    }

    fn update(&mut self, sensors: &mut SensorTable, now_ms: u32) {
        if self.count == 0 {
            return;
        }
        let n = self.count as f32;
        sensors.copy_to_frontend(self.instance[0], self.sum_pressure / n, self.sum_temperature / n, now_ms);
        self.sum_pressure = 0.0;
        self.sum_temperature = 0.0;
        self.count = 0;
    }

    fn handle_injected_message(&mut self, packet: &InjectedPacket) {
        if packet.source != self.source || packet.sensor_id != self.sensor_id {
            return;
        }
        if !packet.pressure_pa.is_finite() || !packet.temperature_c.is_finite() {
            return;
        }
        self.sum_pressure += packet.pressure_pa;
        self.sum_temperature += packet.temperature_c;
        self.count += 1;
    }
}
