/// Telemetry log sink interface

/// Log mask that matches any enabled logging
pub const MASK_LOG_ANY: u32 = 0xFFFF;

/// One barometer log record
#[derive(Debug, Clone, Copy, Default)]
pub struct BaroRecord {
    /// Time the record was written (ms)
    pub timestamp_ms: u32,
    pub instance: u8,
    /// Altitude relative to the calibrated ground (m)
    pub altitude: f32,
    /// Raw pressure (Pa)
    pub pressure: f32,
    /// Temperature (C)
    pub temperature: f32,
    /// Climb rate of the primary sensor (m/s)
    pub climb_rate: f32,
    /// Time of the sample (ms)
    pub sample_ms: u32,
    /// Active altitude offset (m)
    pub offset: f32,
    /// Ground temperature used for altitude (C)
    pub ground_temperature: f32,
    pub healthy: bool,
    /// Pressure after environmental corrections (Pa)
    pub corrected_pressure: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSubsystem {
    Baro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Unhealthy,
    ErrorResolved,
}

pub trait TelemetrySink {
    /// Whether records selected by `mask` are being logged
    fn should_log(&self, mask: u32) -> bool;

    fn write_baro(&mut self, record: &BaroRecord);

    fn write_error(&mut self, subsystem: ErrorSubsystem, code: ErrorCode);
}
