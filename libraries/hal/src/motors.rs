/// Motor output telemetry

pub trait MotorOutput {
    /// Normalized throttle output, nominally 0.0 to 1.0
    fn throttle_out(&self) -> f32;
}
