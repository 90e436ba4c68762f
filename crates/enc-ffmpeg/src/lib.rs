mod base;

mod video;
pub use video::*;

mod mux;
pub use mux::*;

pub use mp4::{MP4File, Mp4Error};
