use lapse_media_info::{Dimensions, RawFrame};

use crate::{FrameStore, FrameStoreError};

/// Keeps frames in memory. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryFrameStore {
    frames: Vec<RawFrame>,
}

impl MemoryFrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, index: u32) -> Result<&RawFrame, FrameStoreError> {
        self.frames
            .get(index as usize)
            .ok_or(FrameStoreError::OutOfRange(index))
    }
}

impl FrameStore for MemoryFrameStore {
    fn append(&mut self, frame: &RawFrame) -> Result<u32, FrameStoreError> {
        let index = self.len();
        self.frames.push(frame.clone());
        Ok(index)
    }

    fn read(&self, index: u32) -> Result<RawFrame, FrameStoreError> {
        self.get(index).cloned()
    }

    fn dimensions(&self, index: u32) -> Result<Dimensions, FrameStoreError> {
        self.get(index).map(RawFrame::dimensions)
    }

    fn len(&self) -> u32 {
        self.frames.len() as u32
    }

    fn clear(&mut self) -> Result<(), FrameStoreError> {
        self.frames.clear();
        Ok(())
    }
}
