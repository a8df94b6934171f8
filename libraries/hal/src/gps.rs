/// GPS altitude interface, used as an independent altitude cross-check

/// GPS fix types
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum GpsFixType {
    /// No fix available
    NoFix,
    /// 2D fix (no altitude)
    Fix2D,
    /// 3D fix (with altitude)
    Fix3D,
    /// Differential GPS fix
    DGps,
    /// Float RTK (decimeter accuracy)
    RtkFloat,
    /// Real Time Kinematic fix (centimeter accuracy)
    Rtk,
}

impl GpsFixType {
    /// Whether the fix carries a usable altitude
    pub fn has_altitude(&self) -> bool {
        *self >= GpsFixType::Fix3D
    }
}

/// Source of an altitude that does not depend on air pressure
pub trait AltitudeReference {
    /// The current fix type
    fn fix_type(&self) -> GpsFixType;

    /// Altitude above mean sea level in meters
    fn altitude_amsl(&self) -> f32;
}

#[cfg(test)]
mod tests {
    use super::GpsFixType;

    #[test]
    fn test_fix_ordering() {
        assert!(!GpsFixType::NoFix.has_altitude());
        assert!(!GpsFixType::Fix2D.has_altitude());
        assert!(GpsFixType::Fix3D.has_altitude());
        assert!(GpsFixType::Rtk.has_altitude(), "RTK is better than a 3D fix");
    }
}
