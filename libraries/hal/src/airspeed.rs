/// Airspeed sensor interface

/// Only the parts of an airspeed sensor the barometer cares about
pub trait AirspeedSensor {
    fn healthy(&self) -> bool;

    /// Outside air temperature in Celsius, if the sensor has one
    fn temperature(&self) -> Option<f32>;
}
