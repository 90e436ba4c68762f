//! Timelapse session pipeline: a live preview while idle, interval capture
//! into a frame store while recording, and assembly of the staged frames into
//! a video when recording stops.

mod assemble;
mod capture;
mod config;
mod controller;
mod error;
mod preview;
mod status;

pub use assemble::*;
pub use capture::*;
pub use config::*;
pub use controller::*;
pub use error::*;
pub use preview::*;
pub use status::*;
