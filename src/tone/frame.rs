use crate::foundation::core::{FrameSize, RGB_CHANNELS};
use crate::foundation::error::{ReelError, ReelResult};

/// One quantized video frame: `width*height*3` bytes, row-major, interleaved R,G,B, no padding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameBuffer {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Raw `rgb24` bytes.
    pub data: Vec<u8>,
}

impl FrameBuffer {
    /// Black frame of the given size.
    pub fn new(size: FrameSize) -> Self {
        Self {
            width: size.width,
            height: size.height,
            data: vec![0; size.frame_bytes()],
        }
    }

    /// Wrap raw bytes, checking the length matches the size.
    pub fn from_raw(size: FrameSize, data: Vec<u8>) -> ReelResult<Self> {
        if data.len() != size.frame_bytes() {
            return Err(ReelError::configuration(format!(
                "frame data is {} bytes, expected {} for {}x{} rgb24",
                data.len(),
                size.frame_bytes(),
                size.width,
                size.height
            )));
        }
        Ok(Self {
            width: size.width,
            height: size.height,
            data,
        })
    }

    /// Frame dimensions.
    pub fn size(&self) -> FrameSize {
        FrameSize {
            width: self.width,
            height: self.height,
        }
    }

    /// `[r, g, b]` at column `x`, row `y`.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = (y as usize * self.width as usize + x as usize) * RGB_CHANNELS;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// Raw bytes in wire order.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}
