//! Scripted backends and recording collaborators for unit tests

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use hal::{
    AltitudeReference, BaroRecord, ErrorCode, ErrorSubsystem, GpsFixType, Notifier, PositionReference, Severity,
    TelemetrySink, VehicleState,
};

use crate::backend::BaroBackend;
use crate::clock::ManualClock;
use crate::config::BaroConfig;
use crate::error::BaroResult;
use crate::frontend::Baro;
use crate::resources::{InMemoryParams, Resources};
use crate::sensor::{DeviceId, SensorTable};
use crate::MAX_INSTANCES;

/// Scheduler period used by [`Rig::tick`]
pub const TICK_MS: u32 = 20;

#[derive(Debug, Clone, Copy)]
pub struct Reading {
    pub pressure: f32,
    pub temperature: f32,
    /// Whether the backend delivers samples at all
    pub publishing: bool,
    /// Updates left before the backend goes silent
    pub remaining: Option<u32>,
}

impl Default for Reading {
    fn default() -> Self {
        Self {
            pressure: 101_325.0,
            temperature: 20.0,
            publishing: true,
            remaining: None,
        }
    }
}

/// Handle to the readings a [`ScriptedBackend`] publishes, indexed by the
/// backend's own slot order
#[derive(Clone, Default)]
pub struct Script {
    readings: Arc<Mutex<[Reading; MAX_INSTANCES]>>,
}

impl Script {
    pub fn set_pressure(&self, slot: usize, pressure: f32) {
        self.readings.lock().unwrap()[slot].pressure = pressure;
    }

    pub fn set_temperature(&self, slot: usize, temperature: f32) {
        self.readings.lock().unwrap()[slot].temperature = temperature;
    }

    pub fn set_publishing(&self, slot: usize, publishing: bool) {
        self.readings.lock().unwrap()[slot].publishing = publishing;
    }

    /// Publish for `updates` more backend updates, then stop
    pub fn stop_after(&self, slot: usize, updates: u32) {
        self.readings.lock().unwrap()[slot].remaining = Some(updates);
    }

    fn next(&self, slot: usize) -> Reading {
        let mut readings = self.readings.lock().unwrap();
        let reading = &mut readings[slot];
        match reading.remaining {
            Some(0) => reading.publishing = false,
            Some(n) => reading.remaining = Some(n - 1),
            None => {}
        }
        *reading
    }
}

/// Backend that publishes whatever its [`Script`] says. Temperature is
/// dithered by a hundredth of a degree so steady readings stay "changing".
pub struct ScriptedBackend {
    instances: Vec<u8>,
    script: Script,
    dither: bool,
}

impl ScriptedBackend {
    pub fn new(sensors: &mut SensorTable, count: u8) -> BaroResult<Self> {
        let mut instances = Vec::new();
        for _ in 0..count {
            instances.push(sensors.register_sensor()?);
        }
        Ok(Self {
            instances,
            script: Script::default(),
            dither: false,
        })
    }

    pub fn with_device(sensors: &mut SensorTable, id: DeviceId) -> BaroResult<Self> {
        let backend = Self::new(sensors, 1)?;
        sensors.set_device_id(backend.instances[0], id)?;
        Ok(backend)
    }

    pub fn with_script(mut self, script: Script) -> Self {
        self.script = script;
        self
    }

    pub fn script(&self) -> Script {
        self.script.clone()
    }
}

impl BaroBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "Scripted"
    }

    fn instances(&self) -> &[u8] {
        &self.instances
    }

    fn update(&mut self, sensors: &mut SensorTable, now_ms: u32) {
        self.dither = !self.dither;
        let offset = if self.dither { 0.01 } else { 0.0 };
        for (slot, &instance) in self.instances.iter().enumerate() {
            let reading = self.script.next(slot);
            if reading.publishing {
                sensors.copy_to_frontend(instance, reading.pressure, reading.temperature + offset, now_ms);
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    messages: Arc<Mutex<Vec<(Severity, String)>>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(Severity, String)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn contains(&self, text: &str) -> bool {
        self.messages().iter().any(|(_, m)| m.contains(text))
    }
}

impl Notifier for RecordingNotifier {
    fn send_text(&mut self, severity: Severity, text: &str) {
        self.messages.lock().unwrap().push((severity, text.to_string()));
    }
}

#[derive(Default)]
struct TelemetryLog {
    records: Vec<BaroRecord>,
    errors: Vec<(ErrorSubsystem, ErrorCode)>,
}

#[derive(Clone, Default)]
pub struct RecordingTelemetry {
    log: Arc<Mutex<TelemetryLog>>,
}

impl RecordingTelemetry {
    pub fn records(&self) -> Vec<BaroRecord> {
        self.log.lock().unwrap().records.clone()
    }

    pub fn errors(&self) -> Vec<(ErrorSubsystem, ErrorCode)> {
        self.log.lock().unwrap().errors.clone()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn should_log(&self, _mask: u32) -> bool {
        true
    }

    fn write_baro(&mut self, record: &BaroRecord) {
        self.log.lock().unwrap().records.push(*record);
    }

    fn write_error(&mut self, subsystem: ErrorSubsystem, code: ErrorCode) {
        self.log.lock().unwrap().errors.push((subsystem, code));
    }
}

#[derive(Clone, Default)]
pub struct FakeVehicle {
    armed: Arc<AtomicBool>,
    watchdog: Arc<AtomicBool>,
}

impl FakeVehicle {
    pub fn set_armed(&self, armed: bool) {
        self.armed.store(armed, Ordering::SeqCst);
    }

    pub fn set_watchdog_reset(&self, reset: bool) {
        self.watchdog.store(reset, Ordering::SeqCst);
    }
}

impl VehicleState for FakeVehicle {
    fn armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    fn was_watchdog_reset(&self) -> bool {
        self.watchdog.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy)]
pub struct FakeGps {
    pub fix: GpsFixType,
    pub altitude_amsl: f32,
}

impl AltitudeReference for FakeGps {
    fn fix_type(&self) -> GpsFixType {
        self.fix
    }

    fn altitude_amsl(&self) -> f32 {
        self.altitude_amsl
    }
}

#[derive(Clone, Default)]
pub struct FakeAhrs {
    pub origin: Option<f32>,
    resets: Arc<AtomicU32>,
}

impl FakeAhrs {
    pub fn with_origin(origin: f32) -> Self {
        Self {
            origin: Some(origin),
            ..Default::default()
        }
    }

    pub fn datum_resets(&self) -> u32 {
        self.resets.load(Ordering::SeqCst)
    }
}

impl PositionReference for FakeAhrs {
    fn origin_elevation(&self) -> Option<f32> {
        self.origin
    }

    fn reset_height_datum(&mut self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

/// An initialised frontend over one scripted backend, with handles to
/// every collaborator
pub struct Rig {
    pub baro: Baro,
    pub script: Script,
    pub clock: ManualClock,
    pub params: InMemoryParams,
    pub notifier: RecordingNotifier,
    pub telemetry: RecordingTelemetry,
    pub vehicle: FakeVehicle,
}

impl Rig {
    pub fn new(config: BaroConfig, sensors: u8) -> Self {
        Self::build(config, sensors, InMemoryParams::new(), |io| io)
    }

    pub fn with_params(config: BaroConfig, sensors: u8, params: InMemoryParams) -> Self {
        Self::build(config, sensors, params, |io| io)
    }

    pub fn with_resources(config: BaroConfig, sensors: u8, extra: impl FnOnce(Resources) -> Resources) -> Self {
        Self::build(config, sensors, InMemoryParams::new(), extra)
    }

    fn build(
        config: BaroConfig,
        sensors: u8,
        params: InMemoryParams,
        extra: impl FnOnce(Resources) -> Resources,
    ) -> Self {
        let clock = ManualClock::new(0);
        let notifier = RecordingNotifier::default();
        let telemetry = RecordingTelemetry::default();
        let vehicle = FakeVehicle::default();
        let io = Resources::new(clock.clone())
            .with_params(params.clone())
            .with_notifier(notifier.clone())
            .with_telemetry(telemetry.clone())
            .with_vehicle(vehicle.clone());
        let mut baro = Baro::new(config, extra(io)).unwrap();
        let script = Script::default();
        if sensors > 0 {
            let handle = script.clone();
            baro.add_backend(move |table| ScriptedBackend::new(table, sensors).map(|b| b.with_script(handle)))
                .unwrap();
        }
        baro.init().unwrap();
        Self {
            baro,
            script,
            clock,
            params,
            notifier,
            telemetry,
            vehicle,
        }
    }

    /// Advance the clock one period and run the pipeline, `n` times
    pub fn tick(&mut self, n: u32) {
        for _ in 0..n {
            self.clock.advance(TICK_MS);
            self.baro.update();
        }
    }

    pub fn clock_ms(&self) -> u32 {
        hal::Clock::now_ms(&self.clock)
    }
}
