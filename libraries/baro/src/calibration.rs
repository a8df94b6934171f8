//! Ground pressure calibration
//!
//! A full calibration blocks the caller: it lets the sensors settle, then
//! averages a few healthy rounds per instance into a sea level equivalent
//! ground pressure. All waiting goes through the injected clock, so a
//! simulated clock runs it without real time passing.

use hal::{ParamKey, ParamValue, Severity};

use crate::atmosphere::sealevel_pressure;
use crate::error::{BaroError, BaroResult, CalibrationPhase};
use crate::frontend::Baro;
use crate::MAX_INSTANCES;

/// Progress of the calibration state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationState {
    Idle,
    Settling { round: u8 },
    Sampling { sample: u8 },
    Evaluated,
    Committed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationOutcome {
    Completed,
    /// Calibrating in flight after a watchdog reset would zero the altitude
    SkippedWatchdogReset,
    SkippedNoSensors,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InstanceCalibration {
    Calibrated { ground_pressure: f32, samples: u8 },
    Uncalibrated,
}

impl InstanceCalibration {
    pub fn is_calibrated(&self) -> bool {
        matches!(self, InstanceCalibration::Calibrated { .. })
    }
}

#[derive(Debug, Clone)]
pub struct CalibrationReport {
    pub outcome: CalibrationOutcome,
    /// One entry per registered instance, in index order
    pub instances: Vec<InstanceCalibration>,
    /// Whether the ground pressures were persisted
    pub saved: bool,
}

impl CalibrationReport {
    fn skipped(outcome: CalibrationOutcome) -> Self {
        Self {
            outcome,
            instances: Vec::new(),
            saved: false,
        }
    }
}

/// Per instance pressure sums of one run
#[derive(Debug, Default)]
pub(crate) struct Accumulator {
    sum: [f32; MAX_INSTANCES],
    count: [u8; MAX_INSTANCES],
}

impl Baro {
    /// Run a full blocking calibration. With `save` the new ground
    /// pressures are persisted, otherwise they only apply until reboot.
    pub fn calibrate(&mut self, save: bool) -> BaroResult<CalibrationReport> {
        if self.io.watchdog_reset() {
            self.io
                .notifier
                .send_text(Severity::Info, "Baro: skipping calibration after WDG reset");
            return Ok(CalibrationReport::skipped(CalibrationOutcome::SkippedWatchdogReset));
        }
        if self.sensors.is_empty() && self.config.allow_no_sensors {
            log::info!("no barometer, calibration skipped");
            return Ok(CalibrationReport::skipped(CalibrationOutcome::SkippedNoSensors));
        }

        self.io.notifier.send_text(Severity::Info, "Calibrating barometer");
        self.alt_offset.set_target(0.0);
        self.io.params.set_and_save(ParamKey::AltOffset, ParamValue::Float(0.0));
        for sensor in self.sensors.registered_mut() {
            sensor.calibrated = true;
            sensor.alt_ok = true;
        }

        let settle_rounds = self.config.calibration.settle_rounds;
        let samples = self.config.calibration.samples;
        let round_delay_ms = self.config.calibration.round_delay_ms;
        let mut acc = Accumulator::default();
        let mut state = CalibrationState::Settling { round: 0 };
        loop {
            self.calibration_state = state;
            state = match state {
                CalibrationState::Settling { round } if round < settle_rounds => {
                    self.wait_for_healthy(CalibrationPhase::Settling, round)?;
                    self.io.clock.delay_ms(round_delay_ms);
                    CalibrationState::Settling { round: round + 1 }
                }
                CalibrationState::Settling { .. } => CalibrationState::Sampling { sample: 0 },
                CalibrationState::Sampling { sample } if sample < samples => {
                    self.wait_for_healthy(CalibrationPhase::Sampling, sample)?;
                    self.accumulate(&mut acc);
                    self.io.clock.delay_ms(round_delay_ms);
                    CalibrationState::Sampling { sample: sample + 1 }
                }
                CalibrationState::Sampling { .. } => CalibrationState::Evaluated,
                _ => break,
            };
        }

        let instances = self.commit(&acc, save)?;
        self.io.notifier.send_text(Severity::Info, "Barometer calibration complete");
        Ok(CalibrationReport {
            outcome: CalibrationOutcome::Completed,
            instances,
            saved: save,
        })
    }

    /// Tick until any instance is healthy or the round times out
    fn wait_for_healthy(&mut self, phase: CalibrationPhase, round: u8) -> BaroResult<()> {
        let start = self.io.clock.now_ms();
        loop {
            self.update();
            if self.healthy() {
                return Ok(());
            }
            let elapsed_ms = self.io.clock.now_ms().wrapping_sub(start);
            if elapsed_ms > self.config.calibration.round_timeout_ms {
                self.calibration_state = CalibrationState::Failed;
                log::error!("baro calibration timed out ({} round {})", phase, round);
                return Err(BaroError::CalibrationTimeout {
                    phase,
                    round,
                    elapsed_ms,
                });
            }
            self.io.clock.delay_ms(self.config.calibration.poll_delay_ms);
        }
    }

    fn accumulate(&self, acc: &mut Accumulator) {
        for (i, sensor) in self.sensors.registered().iter().enumerate() {
            if self.healthy_instance(i as u8) {
                acc.sum[i] += sensor.pressure;
                acc.count[i] += 1;
            }
        }
    }

    /// Turn the averaged pressures into ground pressures
    pub(crate) fn commit(&mut self, acc: &Accumulator, save: bool) -> BaroResult<Vec<InstanceCalibration>> {
        let elevation = self.field_elevation.active();
        let temperature = self.ground_temperature();
        let params = &mut self.io.params;
        let mut instances = Vec::with_capacity(self.sensors.len());
        for (i, sensor) in self.sensors.registered_mut().iter_mut().enumerate() {
            let count = acc.count[i];
            if count == 0 {
                sensor.calibrated = false;
                log::warn!("baro {} uncalibrated", i);
                instances.push(InstanceCalibration::Uncalibrated);
                continue;
            }
            let ground_pressure = sealevel_pressure(acc.sum[i] / count as f32, elevation, temperature);
            sensor.ground_pressure = ground_pressure;
            let key = ParamKey::GroundPressure(i as u8);
            if save {
                params.set_and_save(key, ground_pressure.into());
            } else {
                params.set(key, ground_pressure.into());
            }
            log::debug!("baro {} ground pressure {:.1}Pa from {} samples", i, ground_pressure, count);
            instances.push(InstanceCalibration::Calibrated {
                ground_pressure,
                samples: count,
            });
        }

        self.guessed_ground_temperature = self.external_temperature(self.primary());

        if !instances.iter().any(InstanceCalibration::is_calibrated) {
            self.calibration_state = CalibrationState::Failed;
            return Err(BaroError::AllSensorsUncalibrated);
        }
        self.calibration_state = CalibrationState::Committed;
        Ok(instances)
    }

    /// Re-derive the ground pressure of every healthy instance from its
    /// current reading, without averaging
    pub fn update_calibration(&mut self) {
        let now = self.io.clock.now_ms();
        let notify = now.wrapping_sub(self.last_notify_ms) > self.config.calibration.notify_interval_ms;
        if notify {
            self.last_notify_ms = now;
        }
        let elevation = self.field_elevation.active();
        let temperature = self.ground_temperature();
        for i in 0..self.sensors.len() as u8 {
            let key = ParamKey::GroundPressure(i);
            if self.healthy_instance(i) {
                if let Some(sensor) = self.sensors.get_mut(i) {
                    let ground_pressure =
                        sealevel_pressure(sensor.pressure + sensor.correction_offset, elevation, temperature);
                    sensor.ground_pressure = ground_pressure;
                    self.io.params.set(key, ground_pressure.into());
                }
            }
            // ground stations get flooded if notified every call
            if notify {
                self.io.params.notify(key);
            }
        }
        self.guessed_ground_temperature = self.external_temperature(self.primary());
    }
}
