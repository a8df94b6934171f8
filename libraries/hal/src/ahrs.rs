/// Attitude/position reference interface
use crate::types::Vector3d;

/// The navigation filter as seen by the barometer
pub trait PositionReference {
    /// Elevation of the navigation origin in meters AMSL, if an origin is set
    fn origin_elevation(&self) -> Option<f32>;

    /// Re-zero the height estimate after the baro baseline moved
    fn reset_height_datum(&mut self);

    /// True airspeed vector in body frame (m/s), if known
    fn airspeed_vector_true(&self) -> Option<Vector3d> {
        None
    }
}
