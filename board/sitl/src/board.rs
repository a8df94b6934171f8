//! Simulated flight controller board
//!
//! Two simulated I2C barometers (one on the board, one found by the external
//! bus probe) and an MSP barometer fed from a serial thread. The vehicle
//! state, GPS and AHRS are simple stand-ins driven by the simulated world.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use baro::{
    Baro, BaroBackend, BaroConfig, BaroResult, BoardProbe, BusDevice, InMemoryParams, InjectedBackend,
    InjectedSource, ProbeSpec, Resources, SensorTable, SharedBaro, SimBackend, SimSettings, StdClock,
};
use hal::{
    AltitudeReference, BaroRecord, ErrorCode, ErrorSubsystem, GpsFixType, MotorOutput, ParamKey, ParamValue,
    PositionReference, TelemetrySink, VehicleState,
};

/// Elevation of the simulated home (m AMSL)
pub const HOME_ELEVATION: f32 = 584.0;

const DEVTYPE_SIM: u8 = 0x5A;

/// Log bit selecting barometer records
const LOG_BARO: u32 = 1 << 2;

/// Buses the board routes to its external connectors
pub const EXTERNAL_BUS_MASK: u32 = 0b11;

/// Chips that answer on the simulated buses
const SIM_CHIPS: &[(u8, u8)] = &[(0, 0x76), (1, 0x77)];

static SIM_ALTITUDE_BITS: AtomicU32 = AtomicU32::new(0);

/// Set the simulated altitude above home (m)
pub fn set_sim_altitude(altitude: f32) {
    SIM_ALTITUDE_BITS.store(altitude.to_bits(), Ordering::Relaxed);
}

/// Simulated altitude above mean sea level (m)
pub fn sim_altitude_amsl() -> f32 {
    HOME_ELEVATION + f32::from_bits(SIM_ALTITUDE_BITS.load(Ordering::Relaxed))
}

fn probe_sim(sensors: &mut SensorTable, device: BusDevice) -> BaroResult<Option<Box<dyn BaroBackend>>> {
    if !SIM_CHIPS.contains(&(device.bus, device.address)) {
        return Ok(None);
    }
    let settings = SimSettings {
        offset_pa: f32::from(device.bus) * 3.0,
        ..Default::default()
    };
    let backend = SimBackend::new(
        sensors,
        device.device_id(DEVTYPE_SIM),
        Box::new(|_| sim_altitude_amsl()),
        settings,
    )?;
    Ok(Some(Box::new(backend)))
}

const BOARD_PROBES: &[BoardProbe] = &[BoardProbe {
    probe: probe_sim,
    device: BusDevice::i2c(0, 0x76),
}];

const EXTERNAL_PROBES: &[ProbeSpec] = &[
    ProbeSpec {
        bit: 1 << 0,
        probe: probe_sim,
        address: 0x77,
    },
    ProbeSpec {
        bit: 1 << 1,
        probe: probe_sim,
        address: 0x76,
    },
];

#[derive(Clone, Default)]
pub struct SimVehicle {
    armed: Arc<AtomicBool>,
}

impl SimVehicle {
    pub fn set_armed(&self, armed: bool) {
        self.armed.store(armed, Ordering::SeqCst);
    }
}

impl VehicleState for SimVehicle {
    fn armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }
}

struct SimGps;

impl AltitudeReference for SimGps {
    fn fix_type(&self) -> GpsFixType {
        GpsFixType::Fix3D
    }

    fn altitude_amsl(&self) -> f32 {
        sim_altitude_amsl()
    }
}

struct SimAhrs;

impl PositionReference for SimAhrs {
    fn origin_elevation(&self) -> Option<f32> {
        Some(HOME_ELEVATION)
    }

    fn reset_height_datum(&mut self) {
        log::info!("AHRS height datum reset");
    }
}

struct SimMotors;

impl MotorOutput for SimMotors {
    fn throttle_out(&self) -> f32 {
        0.0
    }
}

/// Writes barometer records to the trace log
struct ConsoleTelemetry;

impl TelemetrySink for ConsoleTelemetry {
    fn should_log(&self, _mask: u32) -> bool {
        log::log_enabled!(log::Level::Trace)
    }

    fn write_baro(&mut self, r: &BaroRecord) {
        log::trace!(
            "BARO t={} i={} alt={:.2} press={:.1} temp={:.1} crt={:.2} h={}",
            r.timestamp_ms,
            r.instance,
            r.altitude,
            r.pressure,
            r.temperature,
            r.climb_rate,
            r.healthy
        );
    }

    fn write_error(&mut self, subsystem: ErrorSubsystem, code: ErrorCode) {
        log::warn!("ERR {:?} {:?}", subsystem, code);
    }
}

pub struct SitlBoard {
    pub vehicle: SimVehicle,
    params: InMemoryParams,
}

impl SitlBoard {
    pub fn new() -> Self {
        // as if the user had enabled probing of both external sensor families
        let params = InMemoryParams::with_saved([(ParamKey::ProbeExternal, ParamValue::Int(0b11))]);
        Self {
            vehicle: SimVehicle::default(),
            params,
        }
    }

    pub fn get_name(&self) -> &str {
        "SITL"
    }

    /// Probe the sensors and bring up the barometer frontend
    pub fn build_baro(&self) -> BaroResult<SharedBaro> {
        let resources = Resources::new(StdClock::new())
            .with_params(self.params.clone())
            .with_telemetry(ConsoleTelemetry)
            .with_vehicle(self.vehicle.clone())
            .with_gps(SimGps)
            .with_ahrs(SimAhrs)
            .with_motors(SimMotors);
        let mut baro = Baro::new(BaroConfig::default().with_log_bit(LOG_BARO), resources)?;
        baro.probe_board(BOARD_PROBES)?;
        baro.probe_external(EXTERNAL_PROBES, EXTERNAL_BUS_MASK)?;
        baro.add_backend(|sensors| InjectedBackend::new(sensors, InjectedSource::Msp, 0))?;
        baro.init()?;
        Ok(SharedBaro::new(baro))
    }
}
