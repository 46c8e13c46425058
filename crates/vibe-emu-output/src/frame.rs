use serde::{Deserialize, Serialize};

use crate::timing::{VIDEO_HEIGHT, VIDEO_PITCH, VIDEO_WIDTH};

/// Packed pixel layouts the core can render in.
///
/// Pixels are always stored one per `u32`; the 16-bit formats only use the low
/// half-word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PixelFormat {
    Rgb565,
    Abgr1555,
    #[default]
    Xrgb8888,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb565 | Self::Abgr1555 => 2,
            Self::Xrgb8888 => 4,
        }
    }

    pub const fn is_16bit(self) -> bool {
        self.bytes_per_pixel() == 2
    }

    /// Bit position of the red, green and blue fields.
    pub const fn channel_shifts(self) -> [u32; 3] {
        match self {
            Self::Rgb565 => [11, 5, 0],
            Self::Abgr1555 => [0, 5, 10],
            Self::Xrgb8888 => [16, 8, 0],
        }
    }

    /// Largest value of the red, green and blue fields.
    pub const fn channel_max(self) -> [i32; 3] {
        match self {
            Self::Rgb565 => [0x1F, 0x3F, 0x1F],
            Self::Abgr1555 => [0x1F, 0x1F, 0x1F],
            Self::Xrgb8888 => [0xFF, 0xFF, 0xFF],
        }
    }

    /// Lowest bit of every field, for carry-correct packed averaging.
    pub const fn low_bits(self) -> u32 {
        match self {
            Self::Rgb565 => 0x0821,
            Self::Abgr1555 => 0x0421,
            Self::Xrgb8888 => 0x0101_0101,
        }
    }

    pub const fn pixel_mask(self) -> u32 {
        match self {
            Self::Rgb565 | Self::Abgr1555 => 0xFFFF,
            Self::Xrgb8888 => 0xFFFF_FFFF,
        }
    }

    /// Bits that carry color. Alpha and padding bits are dropped by blending.
    pub const fn color_mask(self) -> u32 {
        match self {
            Self::Rgb565 => 0xFFFF,
            Self::Abgr1555 => 0x7FFF,
            Self::Xrgb8888 => 0x00FF_FFFF,
        }
    }

    #[inline]
    pub fn unpack(self, pixel: u32) -> [i32; 3] {
        let shifts = self.channel_shifts();
        let max = self.channel_max();
        [
            ((pixel >> shifts[0]) as i32) & max[0],
            ((pixel >> shifts[1]) as i32) & max[1],
            ((pixel >> shifts[2]) as i32) & max[2],
        ]
    }

    /// Pack channel values, clamping each to its field width.
    #[inline]
    pub fn pack(self, channels: [i32; 3]) -> u32 {
        let shifts = self.channel_shifts();
        let max = self.channel_max();
        let mut pixel = 0u32;
        for i in 0..3 {
            pixel |= (channels[i].clamp(0, max[i]) as u32) << shifts[i];
        }
        pixel
    }
}

/// Dimensions and format of a frame; blend buffers are keyed on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub width: usize,
    pub height: usize,
    /// Row stride in pixels.
    pub pitch: usize,
    pub format: PixelFormat,
}

impl FrameLayout {
    pub fn len(&self) -> usize {
        self.pitch * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct FrameBuffer {
    pixels: Vec<u32>,
    layout: FrameLayout,
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize, pitch: usize, format: PixelFormat) -> Self {
        let layout = FrameLayout {
            width,
            height,
            pitch: pitch.max(width),
            format,
        };
        Self {
            pixels: vec![0; layout.len()],
            layout,
        }
    }

    /// A 160x144 frame with the native pitch.
    pub fn gameboy(format: PixelFormat) -> Self {
        Self::new(VIDEO_WIDTH, VIDEO_HEIGHT, VIDEO_PITCH, format)
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    pub fn width(&self) -> usize {
        self.layout.width
    }

    pub fn height(&self) -> usize {
        self.layout.height
    }

    pub fn pitch(&self) -> usize {
        self.layout.pitch
    }

    pub fn format(&self) -> PixelFormat {
        self.layout.format
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u32] {
        &mut self.pixels
    }

    pub fn row(&self, y: usize) -> &[u32] {
        let start = y * self.layout.pitch;
        &self.pixels[start..start + self.layout.width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [u32] {
        let start = y * self.layout.pitch;
        &mut self.pixels[start..start + self.layout.width]
    }

    pub fn fill(&mut self, pixel: u32) {
        self.pixels.fill(pixel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_rgb565_fields() {
        let fmt = PixelFormat::Rgb565;
        let px = fmt.pack([0x1F, 0x20, 0x01]);
        assert_eq!(px, 0xFC01);
        assert_eq!(fmt.unpack(px), [0x1F, 0x20, 0x01]);
    }

    #[test]
    fn pack_clamps_out_of_range_channels() {
        let fmt = PixelFormat::Abgr1555;
        assert_eq!(fmt.pack([40, -3, 0x1F]), 0x1F | (0x1F << 10));
    }

    #[test]
    fn rows_respect_pitch() {
        let mut fb = FrameBuffer::new(4, 2, 6, PixelFormat::Xrgb8888);
        fb.row_mut(1).fill(7);
        assert_eq!(fb.pixels()[..6], [0; 6]);
        assert_eq!(fb.pixels()[6..10], [7; 4]);
        assert_eq!(fb.pixels()[10..12], [0; 2]);
    }
}
