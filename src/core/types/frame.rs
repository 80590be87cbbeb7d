// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Image frame: pixel buffer with its declared layout and acquisition metadata.

use crate::error::{Error, Result};

/// Maximum number of bytes a frame buffer may hold (4096 x 4096 x 4 x 1 byte).
pub const MAX_FRAME_DATA_SIZE: usize = 4096 * 4096 * 4;

/// Maximum number of attributes attached to a frame.
pub const MAX_FRAME_ATTRIBUTES: usize = 5;

/// Channel layout of the pixels.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameMode {
    /// Single channel intensity.
    Grayscale,
    /// Red, green, blue.
    Rgb,
    /// Blue, green, red.
    Bgr,
    /// Red, green, blue, alpha.
    Rgba,
    /// Single channel disparity or depth map.
    Depth,
}

impl FrameMode {
    /// Number of channels of a pixel.
    pub fn channels(self) -> usize {
        match self {
            FrameMode::Grayscale | FrameMode::Depth => 1,
            FrameMode::Rgb | FrameMode::Bgr => 3,
            FrameMode::Rgba => 4,
        }
    }
}

/// Storage type of a single channel.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PixelDepth {
    /// Unsigned 8 bits.
    U8,
    /// Unsigned 16 bits, big endian in the buffer.
    U16,
    /// 32 bits float, little endian in the buffer.
    F32,
}

impl PixelDepth {
    /// Number of bytes of a single channel.
    pub fn bytes(self) -> usize {
        match self {
            PixelDepth::U8 => 1,
            PixelDepth::U16 => 2,
            PixelDepth::F32 => 4,
        }
    }
}

/// A named acquisition attribute, such as the camera serial number.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameAttribute {
    /// Attribute name.
    pub name: String,
    /// Attribute value.
    pub value: String,
}

/// Image buffer with declared dimensions and layout.
///
/// The buffer is row major, `row_size()` bytes per row.
/// A frame is either empty (no data) or its buffer size matches
/// `width * height * channels * bytes per channel`.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    width: usize,
    height: usize,
    mode: FrameMode,
    depth: PixelDepth,
    /// Acquisition time in microseconds.
    pub timestamp: i64,
    attributes: Vec<FrameAttribute>,
    data: Vec<u8>,
}

impl Default for Frame {
    fn default() -> Self {
        Self::empty()
    }
}

impl Frame {
    /// Frame without pixels.
    pub fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            mode: FrameMode::Grayscale,
            depth: PixelDepth::U8,
            timestamp: 0,
            attributes: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Frame with all bytes set to zero.
    pub fn zeros(width: usize, height: usize, mode: FrameMode, depth: PixelDepth) -> Result<Self> {
        let size = Self::expected_size(width, height, mode, depth);
        Self::from_data(width, height, mode, depth, vec![0; size])
    }

    /// Frame built from an existing buffer, checked against the declared layout.
    pub fn from_data(
        width: usize,
        height: usize,
        mode: FrameMode,
        depth: PixelDepth,
        data: Vec<u8>,
    ) -> Result<Self> {
        let frame = Self {
            width,
            height,
            mode,
            depth,
            timestamp: 0,
            attributes: Vec::new(),
            data,
        };
        frame.check()?;
        Ok(frame)
    }

    /// 8 bits grayscale frame from a row major buffer.
    pub fn from_gray(width: usize, height: usize, data: Vec<u8>) -> Result<Self> {
        Self::from_data(width, height, FrameMode::Grayscale, PixelDepth::U8, data)
    }

    fn expected_size(width: usize, height: usize, mode: FrameMode, depth: PixelDepth) -> usize {
        width * height * mode.channels() * depth.bytes()
    }

    /// Verify the buffer against the declared layout and capacity.
    pub fn check(&self) -> Result<()> {
        if self.data.len() > MAX_FRAME_DATA_SIZE {
            return Err(Error::MalformedFrame(format!(
                "{} bytes exceed the capacity of {}",
                self.data.len(),
                MAX_FRAME_DATA_SIZE
            )));
        }
        let expected = Self::expected_size(self.width, self.height, self.mode, self.depth);
        if !self.data.is_empty() && self.data.len() != expected {
            return Err(Error::MalformedFrame(format!(
                "{}x{} {:?} {:?} needs {} bytes, got {}",
                self.width,
                self.height,
                self.mode,
                self.depth,
                expected,
                self.data.len()
            )));
        }
        Ok(())
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Channel layout.
    pub fn mode(&self) -> FrameMode {
        self.mode
    }

    /// Channel storage type.
    pub fn depth(&self) -> PixelDepth {
        self.depth
    }

    /// Bytes per pixel.
    pub fn pixel_size(&self) -> usize {
        self.mode.channels() * self.depth.bytes()
    }

    /// Bytes per row.
    pub fn row_size(&self) -> usize {
        self.width * self.pixel_size()
    }

    /// True if the frame holds no pixel.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable raw bytes. The length cannot change.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Byte of channel 0 at pixel (x, y), for 8 bits frames.
    pub fn gray_at(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.row_size() + x * self.pixel_size()]
    }

    /// Acquisition attributes.
    pub fn attributes(&self) -> &[FrameAttribute] {
        &self.attributes
    }

    /// Add an attribute, fails once `MAX_FRAME_ATTRIBUTES` are attached.
    pub fn add_attribute(&mut self, name: &str, value: &str) -> Result<()> {
        if self.attributes.len() >= MAX_FRAME_ATTRIBUTES {
            return Err(Error::MalformedFrame(format!(
                "cannot hold more than {} attributes",
                MAX_FRAME_ATTRIBUTES
            )));
        }
        self.attributes.push(FrameAttribute {
            name: name.to_owned(),
            value: value.to_owned(),
        });
        Ok(())
    }
}

// TESTS #############################################################
