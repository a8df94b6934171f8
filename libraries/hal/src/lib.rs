#![no_std]
extern crate nalgebra;

mod ahrs;
mod airspeed;
mod clock;
mod gps;
mod motors;
mod notify;
mod params;
mod telemetry;
mod types;
mod vehicle;

pub use ahrs::*;
pub use airspeed::*;
pub use clock::*;
pub use gps::*;
pub use motors::*;
pub use notify::*;
pub use params::*;
pub use telemetry::*;
pub use types::*;
pub use vehicle::*;
