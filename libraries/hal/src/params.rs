/// Parameter storage interface
use core::fmt;

/// Wind coefficient slots of one sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindAxis {
    Enable,
    Forward,
    Backward,
    Right,
    Left,
    Up,
    Down,
}

impl WindAxis {
    fn suffix(&self) -> &'static str {
        match self {
            WindAxis::Enable => "ENABLE",
            WindAxis::Forward => "FWD",
            WindAxis::Backward => "BCK",
            WindAxis::Right => "RGT",
            WindAxis::Left => "LFT",
            WindAxis::Up => "UP",
            WindAxis::Down => "DN",
        }
    }
}

/// Keys of the values the barometer reads from and writes to storage.
///
/// Per-instance keys carry the zero-based instance index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKey {
    /// Calibrated sea-level equivalent ground pressure (Pa)
    GroundPressure(u8),
    /// Bus/address derived identity of the sensor in this slot
    DeviceId(u8),
    /// Pressure (Pa) removed per unit of normalized thrust
    ThrustScale(u8),
    /// Static port position error coefficients
    WindCoeff(u8, WindAxis),
    /// Altitude offset added to every reading (m)
    AltOffset,
    /// User field elevation (m AMSL)
    FieldElevation,
    /// Preferred primary instance
    Primary,
    /// Outlier gate width in percent, 0 disables
    FilterRange,
    /// Maximum GPS/baro altitude discrepancy for arming (m), 0 disables
    AltErrorMax,
    /// Specific gravity of the fluid for water sensors
    SpecificGravity,
    /// User ambient ground temperature (C), 0 means unset
    GroundTemperature,
    /// Bitmask of driver families probed on external buses
    ProbeExternal,
    /// External bus to probe, -1 for all external buses
    ExternalBus,
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKey::GroundPressure(i) => write!(f, "BARO{}_GND_PRESS", i + 1),
            ParamKey::DeviceId(i) => write!(f, "BARO{}_DEVID", i + 1),
            ParamKey::ThrustScale(i) => write!(f, "BARO{}_THST_SCALE", i + 1),
            ParamKey::WindCoeff(i, axis) => write!(f, "BARO{}_WCF_{}", i + 1, axis.suffix()),
            ParamKey::AltOffset => write!(f, "BARO_ALT_OFFSET"),
            ParamKey::FieldElevation => write!(f, "BARO_FIELD_ELV"),
            ParamKey::Primary => write!(f, "BARO_PRIMARY"),
            ParamKey::FilterRange => write!(f, "BARO_FLTR_RNG"),
            ParamKey::AltErrorMax => write!(f, "BARO_ALTERR_MAX"),
            ParamKey::SpecificGravity => write!(f, "BARO_SPEC_GRAV"),
            ParamKey::GroundTemperature => write!(f, "BARO_GND_TEMP"),
            ParamKey::ProbeExternal => write!(f, "BARO_PROBE_EXT"),
            ParamKey::ExternalBus => write!(f, "BARO_EXT_BUS"),
        }
    }
}

/// A stored parameter value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Float(f32),
    Int(i32),
}

impl ParamValue {
    pub fn as_f32(&self) -> f32 {
        match *self {
            ParamValue::Float(v) => v,
            ParamValue::Int(v) => v as f32,
        }
    }

    pub fn as_i32(&self) -> i32 {
        match *self {
            ParamValue::Float(v) => v as i32,
            ParamValue::Int(v) => v,
        }
    }
}

impl From<f32> for ParamValue {
    fn from(value: f32) -> Self {
        ParamValue::Float(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(value)
    }
}

/// Parameter storage
///
/// `set` changes the live value only, `set_and_save` also requests that it
/// is written to non-volatile storage. `notify` tells watchers (e.g. a
/// ground station) that the value changed.
pub trait ParamStore {
    fn get(&self, key: ParamKey) -> Option<ParamValue>;

    fn set(&mut self, key: ParamKey, value: ParamValue);

    fn set_and_save(&mut self, key: ParamKey, value: ParamValue);

    fn notify(&mut self, key: ParamKey);

    fn get_f32(&self, key: ParamKey, default: f32) -> f32 {
        self.get(key).map(|v| v.as_f32()).unwrap_or(default)
    }

    fn get_i32(&self, key: ParamKey, default: i32) -> i32 {
        self.get(key).map(|v| v.as_i32()).unwrap_or(default)
    }
}
