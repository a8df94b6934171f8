use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use baro::atmosphere::{pressure_for_altitude_difference, SSL_AIR_PRESSURE};
use baro::{InjectedPacket, InjectedSource, SharedBaro};

mod board;

use board::SitlBoard;

const TICK: Duration = Duration::from_millis(1000 / 50); // 50 Hz
const RUN_TICKS: u32 = 50 * 20;

enum State {
    Initializing,
    Calibrating,
    Running,
    Stopping,
}

/// Simulated climb to 30m and back
fn flight_profile(tick: u32) -> f32 {
    let t = tick as f32 * TICK.as_secs_f32();
    if t < 5.0 {
        0.0
    } else if t < 10.0 {
        (t - 5.0) * 6.0
    } else if t < 15.0 {
        30.0
    } else {
        (30.0 - (t - 15.0) * 6.0).max(0.0)
    }
}

/// Stand-in for the MSP serial parser: decodes nothing, just posts samples
fn spawn_msp_feed(baro: SharedBaro, running: Arc<AtomicBool>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut wobble = 0.0f32;
        while running.load(Ordering::Relaxed) {
            wobble = if wobble > 0.0 { -0.2 } else { 0.2 };
            let packet = InjectedPacket {
                source: InjectedSource::Msp,
                sensor_id: 0,
                pressure_pa: pressure_for_altitude_difference(SSL_AIR_PRESSURE, board::sim_altitude_amsl(), 15.0)
                    + wobble,
                temperature_c: 24.0,
            };
            if baro.post(packet).is_err() {
                log::debug!("MSP inbox full, sample dropped");
            }
            thread::sleep(Duration::from_millis(50));
        }
    })
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let board = SitlBoard::new();
    log::info!("starting board {}", board.get_name());
    let mut state = State::Initializing;
    let mut shared = None;
    let mut feed = None;
    let running = Arc::new(AtomicBool::new(true));
    let mut tick = 0;

    loop {
        match state {
            State::Initializing => {
                let baro = board.build_baro().context("failed to bring up the barometers")?;
                feed = Some(spawn_msp_feed(baro.clone(), Arc::clone(&running)));
                shared = Some(baro);
                state = State::Calibrating;
            }
            State::Calibrating => {
                let baro = shared.as_ref().context("barometer not initialised")?;
                let report = baro.lock()?.calibrate(true).context("barometer calibration failed")?;
                for (i, instance) in report.instances.iter().enumerate() {
                    log::info!("baro {}: {:?}", i, instance);
                }
                state = State::Running;
            }
            State::Running => {
                let baro = shared.as_ref().context("barometer not initialised")?;
                board::set_sim_altitude(flight_profile(tick));
                baro.update()?;

                if tick == 100 {
                    match baro.arming_checks()? {
                        Ok(()) => {
                            log::info!("barometer arming checks passed");
                            board.vehicle.set_armed(true);
                        }
                        Err(failure) => log::warn!("PreArm: Baro: {}", failure),
                    }
                }
                if tick % 50 == 0 {
                    let mut guard = baro.lock()?;
                    let climb_rate = guard.climb_rate();
                    log::info!(
                        "alt {:.2}m climb {:.2}m/s primary {} healthy {}",
                        guard.altitude(),
                        climb_rate,
                        guard.primary(),
                        guard.all_healthy()
                    );
                }

                tick += 1;
                if tick >= RUN_TICKS {
                    state = State::Stopping;
                }
                thread::sleep(TICK);
            }
            State::Stopping => {
                log::info!("Stopping");
                running.store(false, Ordering::Relaxed);
                if let Some(feed) = feed.take() {
                    feed.join().map_err(|_| anyhow::anyhow!("MSP feed thread panicked"))?;
                }
                break;
            }
        }
    }
    Ok(())
}
