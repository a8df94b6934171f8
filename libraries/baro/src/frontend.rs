//! Barometer frontend
//!
//! [`Baro`] is the service the composition root builds once and shares with
//! whatever needs altitude. It owns the sensor table and the backends, and
//! runs the per-tick pipeline:
//!
//! 1. slew the altitude offset
//! 2. drain the injected sample inbox
//! 3. refresh every backend and recompute health flags
//! 4. convert pressure to altitude for every healthy instance
//! 5. select the primary instance
//! 6. feed the climb rate filter from the primary
//! 7. run the field elevation controller
//! 8. write telemetry and report primary health transitions

use std::sync::Arc;

use hal::{BaroRecord, ErrorCode, ErrorSubsystem, ParamKey, ParamStore, ParamValue, Severity, WindAxis, MASK_LOG_ANY};

use crate::altitude::{update_instance, Environment, OffsetSlew};
use crate::atmosphere;
use crate::backend::BaroBackend;
use crate::calibration::CalibrationState;
use crate::climb_rate::ClimbRateFilter;
use crate::config::{BaroConfig, HealthPolicy};
use crate::error::{BaroError, BaroResult};
use crate::field_elevation::{FieldElevation, FieldElevationAction};
use crate::health::{
    arming_check, health_transition, instance_healthy, select_primary, AltitudeCrossCheck, ArmingFailure,
    HealthTransition,
};
use crate::inbox::{Inbox, INBOX_CAPACITY};
use crate::registry::{BackendRegistry, BoardProbe, Capacity, ProbeSpec};
use crate::resources::Resources;
use crate::sensor::{SensorTable, WindCoefficients};
use crate::{MAX_DRIVERS, MAX_INSTANCES};

pub struct Baro {
    pub(crate) config: BaroConfig,
    pub(crate) io: Resources,
    pub(crate) sensors: SensorTable,
    registry: BackendRegistry,
    inbox: Arc<Inbox>,
    primary: u8,
    primary_preference: Option<u8>,
    climb_rate: ClimbRateFilter,
    pub(crate) field_elevation: FieldElevation,
    pub(crate) alt_offset: OffsetSlew,
    alt_error_max: f32,
    specific_gravity: f32,
    user_ground_temperature: f32,
    pub(crate) guessed_ground_temperature: f32,
    external_temperature: f32,
    last_external_temperature_ms: u32,
    pub(crate) last_notify_ms: u32,
    pub(crate) calibration_state: CalibrationState,
    initialised: bool,
}

impl Baro {
    /// Build the frontend and load its parameters.
    ///
    /// Device identifiers are cleared and a field elevation left over from
    /// the previous boot is reset; backends are added afterwards, then
    /// [`Baro::init`] finishes the setup.
    pub fn new(config: BaroConfig, io: Resources) -> BaroResult<Self> {
        config.validate()?;
        let mut baro = Self {
            alt_error_max: config.alt_error_max_default,
            specific_gravity: config.specific_gravity_default,
            guessed_ground_temperature: config.ground_temperature_default,
            primary_preference: preference_from(config.primary_default as i32),
            config,
            io,
            sensors: SensorTable::new(),
            registry: BackendRegistry::new(),
            inbox: Arc::new(Inbox::new()),
            primary: 0,
            climb_rate: ClimbRateFilter::new(),
            field_elevation: FieldElevation::new(),
            alt_offset: OffsetSlew::default(),
            user_ground_temperature: 0.0,
            external_temperature: 0.0,
            last_external_temperature_ms: 0,
            last_notify_ms: 0,
            calibration_state: CalibrationState::Idle,
            initialised: false,
        };
        baro.load_params();
        Ok(baro)
    }

    fn load_params(&mut self) {
        let params = &mut self.io.params;
        self.primary_preference = preference_from(params.get_i32(ParamKey::Primary, self.config.primary_default as i32));
        self.alt_offset = OffsetSlew::new(params.get_f32(ParamKey::AltOffset, 0.0));
        self.alt_error_max = params.get_f32(ParamKey::AltErrorMax, self.config.alt_error_max_default);
        self.specific_gravity = params.get_f32(ParamKey::SpecificGravity, self.config.specific_gravity_default);
        self.user_ground_temperature = params.get_f32(ParamKey::GroundTemperature, 0.0);
        let range = params.get_i32(ParamKey::FilterRange, self.config.filter_range_default as i32);
        self.sensors.set_filter_range(range.clamp(0, 100) as i8);

        let stored = params.get_f32(ParamKey::FieldElevation, 0.0);
        if self.field_elevation.reset_on_boot(stored) {
            params.set_and_save(ParamKey::FieldElevation, ParamValue::Float(0.0));
            params.notify(ParamKey::FieldElevation);
            log::info!("field elevation {:.0}m from previous boot cleared", stored);
        }

        // identities are rebuilt by the probes that find the devices
        for i in 0..MAX_INSTANCES as u8 {
            params.set(ParamKey::DeviceId(i), ParamValue::Int(0));
        }
    }

    /// Finish the setup once all backends are registered
    pub fn init(&mut self) -> BaroResult<()> {
        if self.sensors.is_empty() && !self.config.allow_no_sensors {
            return Err(BaroError::NoSensors);
        }
        let params = &mut self.io.params;
        for (i, sensor) in self.sensors.registered_mut().iter_mut().enumerate() {
            let i = i as u8;
            sensor.ground_pressure = params.get_f32(ParamKey::GroundPressure(i), 0.0);
            sensor.thrust_scale = params.get_f32(ParamKey::ThrustScale(i), 0.0);
            sensor.wind_coefficients = load_wind_coefficients(&**params, i);
            if sensor.device_id.is_set() {
                params.set_and_save(ParamKey::DeviceId(i), (sensor.device_id.0 as i32).into());
            }
            if self.config.health_policy == HealthPolicy::PressureOnly {
                sensor.calibrated = true;
                sensor.alt_ok = true;
            }
        }
        self.initialised = true;
        log::info!(
            "baro init: {} sensor(s) on {} driver(s)",
            self.sensors.len(),
            self.registry.len()
        );
        Ok(())
    }

    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    /// Build a backend against the sensor table and register it
    pub fn add_backend<B, F>(&mut self, build: F) -> BaroResult<()>
    where
        B: BaroBackend + 'static,
        F: FnOnce(&mut SensorTable) -> BaroResult<B>,
    {
        if self.registry.len() >= MAX_DRIVERS {
            return Err(BaroError::TooManyDrivers { max: MAX_DRIVERS });
        }
        let backend = build(&mut self.sensors)?;
        self.registry.add_backend(Box::new(backend))
    }

    /// Probe the fixed sensors of the board
    pub fn probe_board(&mut self, list: &[BoardProbe]) -> BaroResult<Capacity> {
        self.registry.probe_board(&mut self.sensors, list)
    }

    /// Probe the external buses selected by the probe parameters.
    /// `board_bus_mask` lists the buses the board exposes.
    pub fn probe_external(&mut self, specs: &[ProbeSpec], board_bus_mask: u32) -> BaroResult<Capacity> {
        let probe_mask = self.io.params.get_i32(ParamKey::ProbeExternal, 0) as u32;
        if probe_mask == 0 {
            return Ok(self.registry.capacity(&self.sensors));
        }
        let bus_mask = match self.io.params.get_i32(ParamKey::ExternalBus, -1) {
            bus @ 0..=31 => 1u32 << bus,
            _ => board_bus_mask,
        };
        self.registry.probe_external(&mut self.sensors, specs, probe_mask, bus_mask)
    }

    pub fn have_bus_driver(&self, bus: u8, address: u8) -> bool {
        self.registry.have_bus_driver(&self.sensors, bus, address)
    }

    /// Queue for samples posted from callback contexts
    pub fn inbox(&self) -> Arc<Inbox> {
        Arc::clone(&self.inbox)
    }

    pub fn sensors(&self) -> &SensorTable {
        &self.sensors
    }

    /// Run one tick of the pipeline
    pub fn update(&mut self) {
        let now = self.io.clock.now_ms();
        self.alt_offset.step(self.config.offset_slew, self.config.offset_deadband_m);
        let primary_was_healthy = self.healthy_instance(self.primary);

        self.drain_inbox();
        for driver in self.registry.drivers_mut() {
            driver.update(&mut self.sensors, now);
            for &instance in driver.instances() {
                self.sensors.update_healthy_flag(instance, now);
            }
        }

        self.update_altitudes();

        let primary = self.choose_primary();
        if primary != self.primary {
            log::info!("baro primary changed {} -> {}", self.primary, primary);
            self.primary = primary;
        }

        // the new primary is healthy whenever any instance is
        if self.healthy() {
            if let Some(sensor) = self.sensors.get(self.primary) {
                self.climb_rate.update(sensor.altitude, sensor.last_update_ms);
            }
        }

        self.update_field_elevation(now);
        self.write_telemetry(now);

        if let Some(transition) = health_transition(primary_was_healthy, self.healthy_instance(self.primary)) {
            self.report_transition(transition);
        }
    }

    fn drain_inbox(&mut self) {
        // bounded so a flooding producer cannot stall the tick
        for _ in 0..INBOX_CAPACITY {
            let Some(packet) = self.inbox.take() else {
                break;
            };
            for driver in self.registry.drivers_mut() {
                driver.handle_injected_message(&packet);
            }
        }
    }

    fn environment(&self) -> Environment {
        Environment {
            field_elevation: self.field_elevation.active(),
            ground_temperature: self.ground_temperature(),
            specific_gravity: self.specific_gravity,
            alt_offset: self.alt_offset.active(),
            airspeed: self.io.ahrs.as_ref().and_then(|ahrs| ahrs.airspeed_vector_true()),
            air_density_ratio: self.air_density_ratio(),
            throttle: self.io.motors.as_ref().map(|motors| motors.throttle_out()),
        }
    }

    fn update_altitudes(&mut self) {
        let env = self.environment();
        for (i, sensor) in self.sensors.registered_mut().iter_mut().enumerate() {
            if !sensor.healthy {
                continue;
            }
            let outcome = update_instance(sensor, &env);
            if outcome.ground_pressure_reset {
                log::debug!("baro {}: ground pressure reset to {:.1}Pa", i, sensor.ground_pressure);
                self.io
                    .params
                    .set(ParamKey::GroundPressure(i as u8), sensor.ground_pressure.into());
            }
        }
    }

    fn choose_primary(&self) -> u8 {
        let mut health = [false; MAX_INSTANCES];
        let count = self.sensors.len();
        for (i, slot) in health.iter_mut().enumerate().take(count) {
            *slot = self.healthy_instance(i as u8);
        }
        select_primary(&health[..count], self.primary_preference)
    }

    fn update_field_elevation(&mut self, now: u32) {
        let armed = self.io.armed();
        let ahrs = &self.io.ahrs;
        let action = self.field_elevation.step(
            now,
            armed,
            || ahrs.as_ref().and_then(|ahrs| ahrs.origin_elevation()),
            &self.config.field_elevation,
        );
        match action {
            FieldElevationAction::None => {}
            FieldElevationAction::Rejected { reverted_to } => {
                self.io.params.set(ParamKey::FieldElevation, reverted_to.into());
                self.io.params.notify(ParamKey::FieldElevation);
                self.io
                    .notifier
                    .send_text(Severity::Alert, "Failed to Set Field Elevation: Armed");
            }
            FieldElevationAction::Adopted { elevation, from_origin } => {
                log::info!(
                    "field elevation {:.1}m adopted{}",
                    elevation,
                    if from_origin { " from origin" } else { "" }
                );
                if let Some(ahrs) = self.io.ahrs.as_mut() {
                    ahrs.reset_height_datum();
                }
                self.update_calibration();
                let text = format!("Field Elevation Set: {:.0}m", elevation);
                self.io.notifier.send_text(Severity::Info, &text);
            }
        }
    }

    fn write_telemetry(&mut self, now: u32) {
        let Some(bit) = self.config.log_bit else {
            return;
        };
        if !self.io.telemetry.as_ref().is_some_and(|sink| sink.should_log(bit)) {
            return;
        }
        let climb_rate = self.climb_rate();
        let offset = self.alt_offset.active();
        let ground_temperature = self.ground_temperature();
        let records: heapless::Vec<BaroRecord, MAX_INSTANCES> = self
            .sensors
            .registered()
            .iter()
            .enumerate()
            .map(|(i, sensor)| BaroRecord {
                timestamp_ms: now,
                instance: i as u8,
                altitude: sensor.altitude,
                pressure: sensor.pressure,
                temperature: sensor.temperature,
                climb_rate,
                sample_ms: sensor.last_update_ms,
                offset,
                ground_temperature,
                healthy: self.healthy_instance(i as u8),
                corrected_pressure: sensor.corrected_pressure,
            })
            .collect();
        if let Some(sink) = self.io.telemetry.as_mut() {
            for record in &records {
                sink.write_baro(record);
            }
        }
    }

    fn report_transition(&mut self, transition: HealthTransition) {
        let code = match transition {
            HealthTransition::BecameUnhealthy => {
                log::warn!("baro primary {} unhealthy", self.primary);
                ErrorCode::Unhealthy
            }
            HealthTransition::Recovered => {
                log::info!("baro primary {} healthy", self.primary);
                ErrorCode::ErrorResolved
            }
        };
        if let Some(sink) = self.io.telemetry.as_mut() {
            if sink.should_log(MASK_LOG_ANY) {
                sink.write_error(ErrorSubsystem::Baro, code);
            }
        }
    }

    /// Check whether the barometer allows arming
    pub fn arming_checks(&self) -> Result<(), ArmingFailure> {
        let cross_check = match (&self.io.gps, self.config.altitude_cross_check) {
            (Some(gps), true) => Some(AltitudeCrossCheck {
                alt_error_max: self.alt_error_max,
                fix: gps.fix_type(),
                gps_altitude_amsl: gps.altitude_amsl(),
                pressure_altitude: self.altitude_difference(atmosphere::SSL_AIR_PRESSURE, self.pressure()),
            }),
            _ => None,
        };
        arming_check(self.healthy(), cross_check)
    }

    pub fn primary(&self) -> u8 {
        self.primary
    }

    pub fn num_instances(&self) -> usize {
        self.sensors.len()
    }

    /// Whether `instance` can be trusted for altitude
    pub fn healthy_instance(&self, instance: u8) -> bool {
        self.sensors
            .get(instance)
            .is_some_and(|sensor| instance_healthy(sensor, self.config.health_policy))
    }

    /// At least one instance is healthy
    pub fn healthy(&self) -> bool {
        (0..self.sensors.len() as u8).any(|i| self.healthy_instance(i))
    }

    /// Every registered instance is healthy
    pub fn all_healthy(&self) -> bool {
        !self.sensors.is_empty() && (0..self.sensors.len() as u8).all(|i| self.healthy_instance(i))
    }

    /// Altitude of the primary relative to the calibrated ground (m)
    pub fn altitude(&self) -> f32 {
        self.altitude_of(self.primary)
    }

    pub fn altitude_of(&self, instance: u8) -> f32 {
        self.sensors.get(instance).map(|s| s.altitude).unwrap_or(0.0)
    }

    pub fn pressure(&self) -> f32 {
        self.pressure_of(self.primary)
    }

    pub fn pressure_of(&self, instance: u8) -> f32 {
        self.sensors.get(instance).map(|s| s.pressure).unwrap_or(0.0)
    }

    pub fn temperature(&self) -> f32 {
        self.temperature_of(self.primary)
    }

    pub fn temperature_of(&self, instance: u8) -> f32 {
        self.sensors.get(instance).map(|s| s.temperature).unwrap_or(0.0)
    }

    pub fn ground_pressure(&self, instance: u8) -> f32 {
        self.sensors.get(instance).map(|s| s.ground_pressure).unwrap_or(0.0)
    }

    /// Time of the primary's last reading (ms)
    pub fn last_update_ms(&self) -> u32 {
        self.sensors.get(self.primary).map(|s| s.last_update_ms).unwrap_or(0)
    }

    /// Climb rate (m/s, positive up)
    pub fn climb_rate(&mut self) -> f32 {
        self.climb_rate.slope() * 1.0e3
    }

    /// User ground temperature when set, otherwise the calibration guess
    pub fn ground_temperature(&self) -> f32 {
        if self.user_ground_temperature == 0.0 {
            self.guessed_ground_temperature
        } else {
            self.user_ground_temperature
        }
    }

    pub fn set_user_ground_temperature(&mut self, temperature: f32) {
        self.user_ground_temperature = temperature;
        self.io.params.set(ParamKey::GroundTemperature, temperature.into());
    }

    /// Ambient temperature from an external sensor, valid for a while
    pub fn set_external_temperature(&mut self, temperature: f32) {
        self.external_temperature = temperature;
        self.last_external_temperature_ms = self.io.clock.now_ms();
    }

    /// Best ambient temperature estimate for `instance` (C)
    pub fn external_temperature(&self, instance: u8) -> f32 {
        let now = self.io.clock.now_ms();
        if self.last_external_temperature_ms != 0
            && now.wrapping_sub(self.last_external_temperature_ms) < self.config.external_temperature_timeout_ms
        {
            return self.external_temperature;
        }
        if let Some(airspeed) = self.io.airspeed.as_ref().filter(|a| a.healthy()) {
            if let Some(temperature) = airspeed.temperature() {
                return temperature;
            }
        }
        // sensor dies read high from board heating, so cap them
        self.temperature_of(instance).min(self.config.internal_temperature_clamp)
    }

    /// Equivalent to true airspeed factor at the primary's altitude
    pub fn eas2tas(&self) -> f32 {
        atmosphere::eas2tas(self.altitude(), self.pressure(), self.ground_temperature())
    }

    pub fn air_density_ratio(&self) -> f32 {
        atmosphere::air_density_ratio(self.eas2tas())
    }

    pub fn sealevel_pressure(&self, pressure: f32, altitude: f32) -> f32 {
        atmosphere::sealevel_pressure(pressure, altitude, self.ground_temperature())
    }

    pub fn altitude_difference(&self, base_pressure: f32, pressure: f32) -> f32 {
        atmosphere::altitude_difference(base_pressure, pressure, self.ground_temperature())
    }

    pub fn set_pressure_correction(&mut self, instance: u8, correction: f32) -> BaroResult<()> {
        let sensor = self.sensors.get_mut(instance).ok_or(BaroError::InvalidInstance(instance))?;
        sensor.correction_offset = correction;
        Ok(())
    }

    /// New altitude offset. The active offset slews towards it.
    pub fn set_alt_offset(&mut self, offset: f32) {
        self.alt_offset.set_target(offset);
        self.io.params.set_and_save(ParamKey::AltOffset, offset.into());
    }

    pub fn alt_offset(&self) -> f32 {
        self.alt_offset.active()
    }

    pub fn set_primary_preference(&mut self, preference: Option<u8>) {
        self.primary_preference = preference;
        let stored = preference.map(i32::from).unwrap_or(-1);
        self.io.params.set_and_save(ParamKey::Primary, stored.into());
    }

    /// Request a field elevation. Applied by the controller while disarmed.
    pub fn set_field_elevation(&mut self, elevation: f32) {
        self.field_elevation.request(elevation);
        self.io.params.set_and_save(ParamKey::FieldElevation, elevation.into());
    }

    pub fn field_elevation_active(&self) -> f32 {
        self.field_elevation.active()
    }

    pub fn set_thrust_scale(&mut self, instance: u8, scale: f32) -> BaroResult<()> {
        let sensor = self.sensors.get_mut(instance).ok_or(BaroError::InvalidInstance(instance))?;
        sensor.thrust_scale = scale;
        self.io.params.set_and_save(ParamKey::ThrustScale(instance), scale.into());
        Ok(())
    }

    pub fn set_wind_coefficients(&mut self, instance: u8, coeffs: WindCoefficients) -> BaroResult<()> {
        let sensor = self.sensors.get_mut(instance).ok_or(BaroError::InvalidInstance(instance))?;
        sensor.wind_coefficients = coeffs;
        let params = &mut self.io.params;
        params.set_and_save(ParamKey::WindCoeff(instance, WindAxis::Enable), i32::from(coeffs.enable).into());
        for (axis, value) in wind_axes(&coeffs) {
            params.set_and_save(ParamKey::WindCoeff(instance, axis), value.into());
        }
        Ok(())
    }

    pub fn set_specific_gravity(&mut self, specific_gravity: f32) -> BaroResult<()> {
        if !(specific_gravity > 0.0) || specific_gravity.is_infinite() {
            return Err(crate::error::config_error(
                format!("specific gravity {} must be positive", specific_gravity),
                Some(ParamKey::SpecificGravity.to_string()),
            ));
        }
        self.specific_gravity = specific_gravity;
        self.io.params.set_and_save(ParamKey::SpecificGravity, specific_gravity.into());
        Ok(())
    }

    /// Threshold of the GPS/baro arming cross-check (m), 0 disables it
    pub fn set_alt_error_max(&mut self, alt_error_max: f32) {
        self.alt_error_max = alt_error_max;
        self.io.params.set_and_save(ParamKey::AltErrorMax, alt_error_max.into());
    }

    /// Width of the backend outlier gate (percent), 0 disables it
    pub fn set_filter_range(&mut self, range: i8) {
        let range = range.clamp(0, 100);
        self.sensors.set_filter_range(range);
        self.io.params.set_and_save(ParamKey::FilterRange, i32::from(range).into());
    }

    pub fn calibration_state(&self) -> CalibrationState {
        self.calibration_state
    }
}

fn preference_from(value: i32) -> Option<u8> {
    u8::try_from(value).ok().filter(|&i| (i as usize) < MAX_INSTANCES)
}

fn wind_axes(coeffs: &WindCoefficients) -> [(WindAxis, f32); 6] {
    [
        (WindAxis::Forward, coeffs.forward),
        (WindAxis::Backward, coeffs.backward),
        (WindAxis::Right, coeffs.right),
        (WindAxis::Left, coeffs.left),
        (WindAxis::Up, coeffs.up),
        (WindAxis::Down, coeffs.down),
    ]
}

fn load_wind_coefficients(params: &dyn ParamStore, instance: u8) -> WindCoefficients {
    let coeff = |axis| params.get_f32(ParamKey::WindCoeff(instance, axis), 0.0);
    WindCoefficients {
        enable: params.get_i32(ParamKey::WindCoeff(instance, WindAxis::Enable), 0) != 0,
        forward: coeff(WindAxis::Forward),
        backward: coeff(WindAxis::Backward),
        right: coeff(WindAxis::Right),
        left: coeff(WindAxis::Left),
        up: coeff(WindAxis::Up),
        down: coeff(WindAxis::Down),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atmosphere::pressure_for_altitude_difference;
    use crate::testing::{FakeAhrs, FakeGps, Rig};
    use hal::GpsFixType;

    #[test]
    fn test_init_without_sensors_fails() {
        let io = Resources::new(crate::clock::ManualClock::new(0));
        let mut baro = Baro::new(BaroConfig::default(), io).unwrap();
        match baro.init() {
            Err(BaroError::NoSensors) => {}
            other => panic!("Expected NoSensors, got {:?}", other),
        }
    }

    #[test]
    fn test_peripheral_init_marks_calibrated() {
        let rig = Rig::new(BaroConfig::peripheral(), 2);
        for sensor in rig.baro.sensors().registered() {
            assert!(sensor.calibrated && sensor.alt_ok);
        }
    }

    #[test]
    fn test_device_ids_cleared_then_persisted() {
        let params = crate::resources::InMemoryParams::with_saved([(ParamKey::DeviceId(2), ParamValue::Int(77))]);
        let rig = Rig::with_params(BaroConfig::default(), 1, params.clone());
        assert_eq!(params.get_i32(ParamKey::DeviceId(2), -1), 0, "stale identity must be cleared");
        assert!(rig.baro.is_initialised());
    }

    #[test]
    fn test_two_instances_one_unhealthy() {
        let mut rig = Rig::new(BaroConfig::default(), 2);
        rig.baro.calibrate(false).unwrap();
        rig.script.set_publishing(1, false);
        rig.tick(30);

        assert!(rig.baro.healthy_instance(0));
        assert!(!rig.baro.healthy_instance(1), "instance 1 stopped publishing");
        assert!(rig.baro.healthy(), "aggregate health must hold with instance 0");
        assert!(!rig.baro.all_healthy());
        assert_eq!(rig.baro.primary(), 0);
        let altitude = rig.baro.altitude();
        assert!(altitude.abs() < 0.05, "Expected altitude ~0m, got {}", altitude);
    }

    #[test]
    fn test_primary_fails_over_and_logs_once() {
        let mut rig = Rig::new(BaroConfig::default(), 2);
        rig.baro.calibrate(false).unwrap();
        rig.tick(5);
        assert_eq!(rig.baro.primary(), 0);

        rig.script.set_publishing(0, false);
        rig.tick(40);
        assert_eq!(rig.baro.primary(), 1, "primary must move to the healthy instance");

        rig.script.set_publishing(0, true);
        rig.tick(5);
        assert_eq!(rig.baro.primary(), 0, "lowest healthy index wins again");
    }

    #[test]
    fn test_primary_health_transition_reported_once() {
        let mut rig = Rig::new(BaroConfig::default(), 1);
        rig.baro.calibrate(false).unwrap();
        rig.tick(5);
        let before = rig.telemetry.errors().len();

        rig.script.set_publishing(0, false);
        rig.tick(50);
        rig.script.set_publishing(0, true);
        rig.tick(50);

        let errors = rig.telemetry.errors();
        assert_eq!(
            &errors[before..],
            &[(ErrorSubsystem::Baro, ErrorCode::Unhealthy), (ErrorSubsystem::Baro, ErrorCode::ErrorResolved)]
        );
    }

    #[test]
    fn test_preferred_primary() {
        let mut rig = Rig::new(BaroConfig::default(), 3);
        rig.baro.calibrate(false).unwrap();
        rig.baro.set_primary_preference(Some(2));
        rig.tick(2);
        assert_eq!(rig.baro.primary(), 2);
    }

    #[test]
    fn test_poisoned_ground_pressure_self_heals() {
        for poisoned in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let mut rig = Rig::new(BaroConfig::default(), 1);
            rig.baro.calibrate(false).unwrap();
            rig.baro.sensors.registered_mut()[0].ground_pressure = poisoned;
            rig.tick(1);

            let sensor = &rig.baro.sensors().registered()[0];
            assert_eq!(sensor.ground_pressure, sensor.pressure, "ground pressure {} not reset", poisoned);
            assert!(sensor.altitude.is_finite(), "Expected finite altitude, got {}", sensor.altitude);
            assert_eq!(
                rig.params.get(ParamKey::GroundPressure(0)),
                Some(ParamValue::Float(sensor.pressure))
            );
        }
    }

    #[test]
    fn test_altitude_tracks_pressure() {
        let mut rig = Rig::new(BaroConfig::default(), 1);
        rig.baro.calibrate(false).unwrap();
        let ground = rig.baro.ground_pressure(0);
        let target = pressure_for_altitude_difference(ground, 100.0, rig.baro.ground_temperature());
        rig.script.set_pressure(0, target);
        rig.tick(1);
        let altitude = rig.baro.altitude();
        assert!((altitude - 100.0).abs() < 0.1, "Expected altitude ~100m, got {}", altitude);
    }

    #[test]
    fn test_alt_offset_slews() {
        let mut rig = Rig::new(BaroConfig::default(), 1);
        rig.baro.calibrate(false).unwrap();
        rig.baro.set_alt_offset(10.0);
        rig.tick(1);
        let first = rig.baro.alt_offset();
        assert!(first > 0.0 && first < 1.0, "Expected a small first step, got {}", first);
        rig.tick(600);
        assert_eq!(rig.baro.alt_offset(), 10.0);
        assert_eq!(rig.params.saved(ParamKey::AltOffset), Some(ParamValue::Float(10.0)));
    }

    #[test]
    fn test_climb_rate_from_primary() {
        let mut rig = Rig::new(BaroConfig::default(), 1);
        rig.baro.calibrate(false).unwrap();
        let ground = rig.baro.ground_pressure(0);
        let t = rig.baro.ground_temperature();
        // 2 m/s climb sampled every 20ms
        for step in 1..=20 {
            let altitude = 0.04 * step as f32;
            rig.script.set_pressure(0, pressure_for_altitude_difference(ground, altitude, t));
            rig.tick(1);
        }
        let rate = rig.baro.climb_rate();
        assert!((rate - 2.0).abs() < 0.2, "Expected climb rate ~2m/s, got {}", rate);
    }

    #[test]
    fn test_field_elevation_rejected_while_armed() {
        let mut rig = Rig::new(BaroConfig::default(), 1);
        rig.baro.calibrate(false).unwrap();
        rig.baro.set_field_elevation(50.0);
        rig.tick(60);
        assert_eq!(rig.baro.field_elevation_active(), 50.0);

        rig.vehicle.set_armed(true);
        rig.baro.set_field_elevation(120.0);
        rig.tick(60);
        assert_eq!(rig.baro.field_elevation_active(), 50.0, "armed change must not apply");
        assert!(rig.notifier.contains("Failed to Set Field Elevation: Armed"));
        assert_eq!(rig.params.get(ParamKey::FieldElevation), Some(ParamValue::Float(50.0)));
    }

    #[test]
    fn test_field_elevation_adopts_origin() {
        let ahrs = FakeAhrs::with_origin(340.0);
        let mut rig = Rig::with_resources(BaroConfig::default(), 1, |io| io.with_ahrs(ahrs.clone()));
        rig.baro.calibrate(false).unwrap();
        rig.tick(60);
        assert_eq!(rig.baro.field_elevation_active(), 340.0);
        assert_eq!(ahrs.datum_resets(), 1);
        assert!(rig.notifier.contains("Field Elevation Set: 340m"));
        let altitude = rig.baro.altitude();
        assert!(altitude.abs() < 0.1, "baseline must be re-derived, got altitude {}", altitude);
    }

    #[test]
    fn test_stale_field_elevation_cleared_on_boot() {
        let params = crate::resources::InMemoryParams::with_saved([(ParamKey::FieldElevation, ParamValue::Float(80.0))]);
        let rig = Rig::with_params(BaroConfig::default(), 1, params.clone());
        assert_eq!(rig.baro.field_elevation_active(), 0.0);
        assert_eq!(params.saved(ParamKey::FieldElevation), Some(ParamValue::Float(0.0)));
        assert!(
            params.notifications().contains(&ParamKey::FieldElevation),
            "ground stations must see the cleared value"
        );
    }

    fn arming_rig(baro_amsl: f32) -> Rig {
        let gps = FakeGps {
            fix: GpsFixType::Fix3D,
            altitude_amsl: 100.0,
        };
        let mut rig = Rig::with_resources(BaroConfig::default(), 1, move |io| io.with_gps(gps));
        rig.baro.calibrate(false).unwrap();
        let t = rig.baro.ground_temperature();
        let pressure = pressure_for_altitude_difference(atmosphere::SSL_AIR_PRESSURE, baro_amsl, t);
        rig.script.set_pressure(0, pressure);
        rig.baro.set_alt_error_max(10.0);
        rig.tick(3);
        rig
    }

    #[test]
    fn test_arming_gps_discrepancy() {
        let rig = arming_rig(150.0);
        match rig.baro.arming_checks() {
            Err(failure) => assert!(
                failure.0.contains("GPS alt error 50m") && failure.0.contains("BARO_ALTERR_MAX"),
                "Expected a discrepancy message, got {}",
                failure
            ),
            Ok(()) => panic!("Expected arming to fail with a 50m discrepancy"),
        }

        let rig = arming_rig(105.0);
        assert_eq!(rig.baro.arming_checks(), Ok(()));
    }

    #[test]
    fn test_arming_requires_health() {
        let mut rig = Rig::new(BaroConfig::default(), 1);
        assert_eq!(rig.baro.arming_checks(), Err(ArmingFailure("not healthy".into())));
        rig.baro.calibrate(false).unwrap();
        assert_eq!(rig.baro.arming_checks(), Ok(()));
    }

    #[test]
    fn test_external_temperature_priority() {
        let mut rig = Rig::new(BaroConfig::default(), 1);
        rig.script.set_temperature(0, 48.0);
        rig.tick(1);
        assert_eq!(rig.baro.external_temperature(0), 35.0, "sensor temperature is clamped");

        rig.baro.set_external_temperature(12.5);
        assert_eq!(rig.baro.external_temperature(0), 12.5);
        rig.clock.advance(10_000);
        assert_eq!(rig.baro.external_temperature(0), 35.0, "external value expires");
    }

    #[test]
    fn test_telemetry_records_per_instance() {
        let mut rig = Rig::new(BaroConfig::default().with_log_bit(1 << 3), 2);
        rig.tick(4);
        let records = rig.telemetry.records();
        assert_eq!(records.len(), 8);
        assert_eq!(records[0].instance, 0);
        assert_eq!(records[1].instance, 1);
    }

    #[test]
    fn test_invalid_instance_setters() {
        let mut rig = Rig::new(BaroConfig::default(), 1);
        assert!(matches!(rig.baro.set_thrust_scale(2, 1.0), Err(BaroError::InvalidInstance(2))));
        assert!(matches!(rig.baro.set_pressure_correction(5, 1.0), Err(BaroError::InvalidInstance(5))));
        assert!(rig.baro.set_specific_gravity(0.0).is_err());
    }
}
