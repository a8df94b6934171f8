/// Vehicle state shared with the sensor subsystems

pub trait VehicleState {
    /// Whether the vehicle is armed
    fn armed(&self) -> bool;

    /// Whether this boot was caused by a watchdog reset
    fn was_watchdog_reset(&self) -> bool {
        false
    }
}
