//! Collaborators the frontend talks to
//!
//! The composition root builds one [`Resources`] and hands it to
//! [`crate::Baro::new`]. Optional collaborators that are absent simply turn
//! the features that need them off.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use hal::{
    AirspeedSensor, AltitudeReference, Clock, MotorOutput, Notifier, ParamKey, ParamStore, ParamValue,
    PositionReference, Severity, TelemetrySink, VehicleState,
};

pub struct Resources {
    pub clock: Box<dyn Clock + Send>,
    pub params: Box<dyn ParamStore + Send>,
    pub notifier: Box<dyn Notifier + Send>,
    pub telemetry: Option<Box<dyn TelemetrySink + Send>>,
    pub vehicle: Option<Box<dyn VehicleState + Send>>,
    pub ahrs: Option<Box<dyn PositionReference + Send>>,
    pub gps: Option<Box<dyn AltitudeReference + Send>>,
    pub motors: Option<Box<dyn MotorOutput + Send>>,
    pub airspeed: Option<Box<dyn AirspeedSensor + Send>>,
}

impl Resources {
    /// Minimal set: in-memory parameters and notices to the log
    pub fn new(clock: impl Clock + Send + 'static) -> Self {
        Self {
            clock: Box::new(clock),
            params: Box::new(InMemoryParams::new()),
            notifier: Box::new(LogNotifier),
            telemetry: None,
            vehicle: None,
            ahrs: None,
            gps: None,
            motors: None,
            airspeed: None,
        }
    }

    pub fn with_params(mut self, params: impl ParamStore + Send + 'static) -> Self {
        self.params = Box::new(params);
        self
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + Send + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    pub fn with_telemetry(mut self, telemetry: impl TelemetrySink + Send + 'static) -> Self {
        self.telemetry = Some(Box::new(telemetry));
        self
    }

    pub fn with_vehicle(mut self, vehicle: impl VehicleState + Send + 'static) -> Self {
        self.vehicle = Some(Box::new(vehicle));
        self
    }

    pub fn with_ahrs(mut self, ahrs: impl PositionReference + Send + 'static) -> Self {
        self.ahrs = Some(Box::new(ahrs));
        self
    }

    pub fn with_gps(mut self, gps: impl AltitudeReference + Send + 'static) -> Self {
        self.gps = Some(Box::new(gps));
        self
    }

    pub fn with_motors(mut self, motors: impl MotorOutput + Send + 'static) -> Self {
        self.motors = Some(Box::new(motors));
        self
    }

    pub fn with_airspeed(mut self, airspeed: impl AirspeedSensor + Send + 'static) -> Self {
        self.airspeed = Some(Box::new(airspeed));
        self
    }

    pub(crate) fn armed(&self) -> bool {
        self.vehicle.as_ref().map(|v| v.armed()).unwrap_or(false)
    }

    pub(crate) fn watchdog_reset(&self) -> bool {
        self.vehicle.as_ref().map(|v| v.was_watchdog_reset()).unwrap_or(false)
    }
}

/// Forwards user notices to the `log` facade
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send_text(&mut self, severity: Severity, text: &str) {
        match severity {
            Severity::Emergency | Severity::Alert | Severity::Critical | Severity::Error => log::error!("{}", text),
            Severity::Warning => log::warn!("{}", text),
            Severity::Notice | Severity::Info => log::info!("{}", text),
            Severity::Debug => log::debug!("{}", text),
        }
    }
}

#[derive(Default)]
struct ParamTable {
    values: HashMap<ParamKey, ParamValue>,
    saved: HashMap<ParamKey, ParamValue>,
    notified: Vec<ParamKey>,
}

/// Parameter store kept in memory. "Saving" copies the value into a
/// separate table, so callers can tell what would reach flash.
///
/// Clones share the same table.
#[derive(Clone, Default)]
pub struct InMemoryParams {
    inner: Arc<Mutex<ParamTable>>,
}

impl InMemoryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store populated from a previous boot
    pub fn with_saved(values: impl IntoIterator<Item = (ParamKey, ParamValue)>) -> Self {
        let params = Self::new();
        {
            let mut table = params.table();
            for (key, value) in values {
                table.values.insert(key, value);
                table.saved.insert(key, value);
            }
        }
        params
    }

    fn table(&self) -> MutexGuard<'_, ParamTable> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Value as persisted
    pub fn saved(&self, key: ParamKey) -> Option<ParamValue> {
        self.table().saved.get(&key).copied()
    }

    /// Keys notified so far, oldest first
    pub fn notifications(&self) -> Vec<ParamKey> {
        self.table().notified.clone()
    }
}

impl ParamStore for InMemoryParams {
    fn get(&self, key: ParamKey) -> Option<ParamValue> {
        self.table().values.get(&key).copied()
    }

    fn set(&mut self, key: ParamKey, value: ParamValue) {
        self.table().values.insert(key, value);
    }

    fn set_and_save(&mut self, key: ParamKey, value: ParamValue) {
        let mut table = self.table();
        table.values.insert(key, value);
        table.saved.insert(key, value);
    }

    fn notify(&mut self, key: ParamKey) {
        self.table().notified.push(key);
    }
}
