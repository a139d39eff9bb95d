//! Frame types handed from the camera to the detector

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Pixel layout of a captured frame.
///
/// The `Unknown` variant provides forward compatibility: drivers may tag
/// frames with a raw platform format code and the detector decides whether
/// it can decode them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit luma plane followed by interleaved, 2x2-subsampled V/U
    /// (the common mobile preview format)
    Nv21,
    /// Planar Y, U, V with 2x2 chroma subsampling
    Yuv420,
    /// Interleaved 8-bit RGBA, row-major
    Rgba8,
    /// Unrecognized platform format code, carried through as-is
    Unknown(u8),
}

impl PixelFormat {
    /// Expected payload length in bytes for a frame of the given
    /// dimensions, or `None` when the format's layout is unknown.
    pub fn frame_len(&self, width: u32, height: u32) -> Option<usize> {
        let pixels = width as usize * height as usize;
        match self {
            PixelFormat::Nv21 | PixelFormat::Yuv420 => Some(pixels * 3 / 2),
            PixelFormat::Rgba8 => Some(pixels * 4),
            PixelFormat::Unknown(_) => None,
        }
    }
}

/// One captured image plus its metadata.
///
/// Frames are transient: the delivery thread owns a frame until it is
/// handed to the detector, and nothing retains it after the detection
/// call returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel layout of `payload`
    pub format: PixelFormat,
    /// Logical capture timestamp in microseconds, monotonically
    /// increasing within one camera session
    pub timestamp_us: u64,
    /// Raw pixel bytes
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame with a zero timestamp.
    pub fn new(payload: Bytes, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
            timestamp_us: 0,
            payload,
        }
    }

    /// Set the capture timestamp and return self (builder pattern)
    pub fn with_timestamp(mut self, timestamp_us: u64) -> Self {
        self.timestamp_us = timestamp_us;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_len_nv21() {
        assert_eq!(PixelFormat::Nv21.frame_len(640, 480), Some(460_800));
        assert_eq!(PixelFormat::Yuv420.frame_len(640, 480), Some(460_800));
    }

    #[test]
    fn frame_len_rgba() {
        assert_eq!(PixelFormat::Rgba8.frame_len(2, 2), Some(16));
    }

    #[test]
    fn frame_len_unknown_format() {
        assert_eq!(PixelFormat::Unknown(17).frame_len(640, 480), None);
    }

    #[test]
    fn frame_constructor_and_timestamp() {
        let frame = Frame::new(Bytes::from_static(b"pixels"), 4, 2, PixelFormat::Rgba8)
            .with_timestamp(1_000);
        assert_eq!(frame.width, 4);
        assert_eq!(frame.height, 2);
        assert_eq!(frame.timestamp_us, 1_000);
        assert_eq!(frame.payload, Bytes::from_static(b"pixels"));
    }
}
