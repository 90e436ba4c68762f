//! Ordered staging area for the frames of a capture session.
//!
//! A store hands out sequence indices itself (`append` always writes at
//! `len()`), so the indices of a store are contiguous from zero.

use lapse_media_info::{Dimensions, FrameError, RawFrame};

mod disk;
pub use disk::*;

mod memory;
pub use memory::*;

#[derive(thiserror::Error, Debug)]
pub enum FrameStoreError {
    #[error("IO/{0}")]
    Io(#[from] std::io::Error),
    #[error("Image/{0}")]
    Image(#[from] image::ImageError),
    #[error("Frame/{0}")]
    Frame(#[from] FrameError),
    #[error("Frame {0} does not exist")]
    OutOfRange(u32),
    #[error("Staged frames are not contiguous: frame {0} is missing")]
    Gap(u32),
}

pub trait FrameStore: Send {
    /// Persists `frame` at the next sequence index and returns that index.
    fn append(&mut self, frame: &RawFrame) -> Result<u32, FrameStoreError>;

    fn read(&self, index: u32) -> Result<RawFrame, FrameStoreError>;

    /// Dimensions of the frame at `index`, read without decoding pixel data
    /// where the medium allows it.
    fn dimensions(&self, index: u32) -> Result<Dimensions, FrameStoreError>;

    fn len(&self) -> u32;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self) -> Result<(), FrameStoreError>;
}

impl<T: FrameStore + ?Sized> FrameStore for Box<T> {
    fn append(&mut self, frame: &RawFrame) -> Result<u32, FrameStoreError> {
        (**self).append(frame)
    }

    fn read(&self, index: u32) -> Result<RawFrame, FrameStoreError> {
        (**self).read(index)
    }

    fn dimensions(&self, index: u32) -> Result<Dimensions, FrameStoreError> {
        (**self).dimensions(index)
    }

    fn len(&self) -> u32 {
        (**self).len()
    }

    fn clear(&mut self) -> Result<(), FrameStoreError> {
        (**self).clear()
    }
}
