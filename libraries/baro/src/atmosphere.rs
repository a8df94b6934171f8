//! Barometric altitude formulas
//!
//! Exact within ~2.5m of the standard atmosphere tables below 11 km, given a
//! ground temperature. Only the temperature at the reference point is used;
//! the standard lapse rate is assumed above it.

/// Sea level air pressure in the standard atmosphere (Pa)
pub const SSL_AIR_PRESSURE: f32 = 101325.01576;

/// Sea level air density in the standard atmosphere (kg/m^3)
pub const SSL_AIR_DENSITY: f32 = 1.225;

/// Specific gas constant of dry air (J/(kg K))
pub const ISA_GAS_CONSTANT: f32 = 287.26;

/// Temperature lapse rate in the troposphere (K/m)
pub const ISA_LAPSE_RATE: f32 = 0.0065;

/// Pressure increase per meter of water depth (Pa/m)
pub const WATER_PRESSURE_PER_METER: f32 = 9800.0;

const KELVIN_OFFSET: f32 = 273.15;

// R * L / g
const PRESSURE_EXPONENT: f32 = 0.190259;

pub fn celsius_to_kelvin(celsius: f32) -> f32 {
    celsius + KELVIN_OFFSET
}

/// Height of `pressure` above `base_pressure` in meters.
///
/// `ground_temperature` is the temperature at the base, in Celsius.
pub fn altitude_difference(base_pressure: f32, pressure: f32, ground_temperature: f32) -> f32 {
    let temp = celsius_to_kelvin(ground_temperature);
    let scaling = pressure / base_pressure;
    temp / ISA_LAPSE_RATE * (1.0 - scaling.powf(PRESSURE_EXPONENT))
}

/// Pressure found `altitude` meters above `base_pressure`.
///
/// Inverse of [`altitude_difference`].
pub fn pressure_for_altitude_difference(base_pressure: f32, altitude: f32, ground_temperature: f32) -> f32 {
    let temp = celsius_to_kelvin(ground_temperature);
    base_pressure * (1.0 - altitude * ISA_LAPSE_RATE / temp).powf(1.0 / PRESSURE_EXPONENT)
}

/// Sea level equivalent of a pressure measured at `altitude` meters AMSL
pub fn sealevel_pressure(pressure: f32, altitude: f32, ground_temperature: f32) -> f32 {
    let temp = celsius_to_kelvin(ground_temperature);
    pressure / (1.0 - altitude * ISA_LAPSE_RATE / temp).powf(1.0 / PRESSURE_EXPONENT)
}

/// Equivalent to true airspeed factor at `altitude` above the calibrated
/// ground, given the pressure there. Returns 1 when it cannot be computed.
pub fn eas2tas(altitude: f32, pressure: f32, ground_temperature: f32) -> f32 {
    if pressure == 0.0 {
        return 1.0;
    }
    let temp = celsius_to_kelvin(ground_temperature) - ISA_LAPSE_RATE * altitude;
    let eas2tas_squared = SSL_AIR_DENSITY / (pressure / (ISA_GAS_CONSTANT * temp));
    if !(eas2tas_squared > 0.0) || eas2tas_squared.is_infinite() {
        return 1.0;
    }
    eas2tas_squared.sqrt()
}

/// Air density relative to sea level. Decreases as altitude climbs.
pub fn air_density_ratio(eas2tas: f32) -> f32 {
    if eas2tas > 0.0 {
        1.0 / (eas2tas * eas2tas)
    } else {
        1.0
    }
}

/// Depth below the calibrated surface for a water sensor, reported as a
/// (negative) altitude. No temperature or density compensation.
pub fn water_altitude(ground_pressure: f32, pressure: f32, specific_gravity: f32) -> f32 {
    (ground_pressure - pressure) / WATER_PRESSURE_PER_METER / specific_gravity
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_pressure_is_zero_altitude() {
        let alt = altitude_difference(101325.0, 101325.0, 15.0);
        assert!(alt.abs() < 1e-3, "Expected 0m, got {}", alt);
    }

    #[test]
    fn test_standard_atmosphere_1000m() {
        // 89874.6 Pa at 1000m in the standard atmosphere
        let alt = altitude_difference(SSL_AIR_PRESSURE, 89874.6, 15.0);
        assert!((alt - 1000.0).abs() < 3.0, "Expected about 1000m, got {}", alt);
    }

    #[test]
    fn test_higher_pressure_is_lower() {
        let ground = 100000.0;
        let mut last = f32::INFINITY;
        for p in [95000.0, 97500.0, 100000.0, 102500.0] {
            let alt = altitude_difference(ground, p, 20.0);
            assert!(alt < last, "altitude must drop as pressure rises ({} at {}Pa)", alt, p);
            last = alt;
        }
    }

    #[test]
    fn test_inverse_reproduces_pressure() {
        for (base, p) in [(101325.0f32, 95000.0f32), (98000.0, 99000.0), (101325.0, 80000.0)] {
            let alt = altitude_difference(base, p, 10.0);
            let back = pressure_for_altitude_difference(base, alt, 10.0);
            assert!((back - p).abs() < 0.5, "Expected {}Pa, got {}Pa", p, back);
        }
    }

    #[test]
    fn test_sealevel_pressure_references_field_elevation() {
        // a ground pressure stored as sea level equivalent puts the field at its elevation
        let field_pressure = 95000.0;
        let elevation = 540.0;
        let p0 = sealevel_pressure(field_pressure, elevation, 15.0);
        assert!(p0 > field_pressure);
        let alt = altitude_difference(p0, field_pressure, 15.0);
        assert!((alt - elevation).abs() < 0.1, "Expected {}m, got {}m", elevation, alt);
    }

    #[test]
    fn test_eas2tas() {
        let at_sea_level = eas2tas(0.0, SSL_AIR_PRESSURE, 15.0);
        assert!((at_sea_level - 1.0).abs() < 0.01, "Expected about 1, got {}", at_sea_level);
        assert!(eas2tas(3000.0, 70100.0, 15.0) > 1.1, "thinner air means higher true airspeed");
        assert_eq!(eas2tas(0.0, 0.0, 15.0), 1.0);
    }

    #[test]
    fn test_air_density_ratio() {
        assert_eq!(air_density_ratio(0.0), 1.0);
        assert!((air_density_ratio(2.0) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_water_depth() {
        let ground = 101325.0;
        let p = ground + 9800.0;
        assert!((water_altitude(ground, p, 1.0) + 1.0).abs() < 1e-4);
        let fresh = water_altitude(ground, p, 1.0).abs();
        let lighter = water_altitude(ground, p, 0.9).abs();
        assert!(lighter > fresh, "lower specific gravity must give a larger depth");
    }
}
