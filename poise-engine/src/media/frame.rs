//! Pixel buffers for sampled video frames
//!
//! Frames are packed row-major, 8 bits per channel. `RgbFrame` is what the
//! decoder produces; detectors that want intensity work on `GrayFrame`.

use crate::types::BoundingBox;

/// Gradient magnitude above which a pixel counts as an edge
pub const EDGE_MAGNITUDE_THRESHOLD: f64 = 100.0;

/// Packed RGB24 frame
#[derive(Debug, Clone, PartialEq)]
pub struct RgbFrame {
    pub width: u32,
    pub height: u32,
    /// `width * height * 3` bytes
    pub data: Vec<u8>,
}

impl RgbFrame {
    /// Wrap packed RGB bytes; returns `None` if the length does not match
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() == width as usize * height as usize * 3 {
            Some(Self { width, height, data })
        } else {
            None
        }
    }

    /// Solid-colour frame
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self { width, height, data }
    }

    /// Luma conversion (ITU-R BT.601 weights)
    pub fn to_gray(&self) -> GrayFrame {
        let data = self
            .data
            .chunks_exact(3)
            .map(|px| {
                let y = 0.299 * px[0] as f64 + 0.587 * px[1] as f64 + 0.114 * px[2] as f64;
                y.round().clamp(0.0, 255.0) as u8
            })
            .collect();
        GrayFrame {
            width: self.width,
            height: self.height,
            data,
        }
    }

    /// Copy out a region, clipped to the frame bounds
    pub fn crop(&self, region: &BoundingBox) -> RgbFrame {
        let (x0, y0, w, h) = clip(region, self.width, self.height);
        let mut data = Vec::with_capacity(w as usize * h as usize * 3);
        for y in y0..y0 + h {
            let start = (y as usize * self.width as usize + x0 as usize) * 3;
            data.extend_from_slice(&self.data[start..start + w as usize * 3]);
        }
        RgbFrame {
            width: w,
            height: h,
            data,
        }
    }
}

/// Single-channel 8-bit frame
#[derive(Debug, Clone, PartialEq)]
pub struct GrayFrame {
    pub width: u32,
    pub height: u32,
    /// `width * height` bytes
    pub data: Vec<u8>,
}

impl GrayFrame {
    /// Pixel at (x, y); caller guarantees bounds
    fn at(&self, x: u32, y: u32) -> f64 {
        self.data[y as usize * self.width as usize + x as usize] as f64
    }

    /// Copy out a region, clipped to the frame bounds
    pub fn crop(&self, region: &BoundingBox) -> GrayFrame {
        let (x0, y0, w, h) = clip(region, self.width, self.height);
        let mut data = Vec::with_capacity(w as usize * h as usize);
        for y in y0..y0 + h {
            let start = y as usize * self.width as usize + x0 as usize;
            data.extend_from_slice(&self.data[start..start + w as usize]);
        }
        GrayFrame {
            width: w,
            height: h,
            data,
        }
    }

    /// Fraction of interior pixels whose Sobel gradient magnitude exceeds
    /// `EDGE_MAGNITUDE_THRESHOLD`
    ///
    /// Returns 0.0 for frames smaller than 3x3.
    pub fn edge_density(&self) -> f64 {
        if self.width < 3 || self.height < 3 {
            return 0.0;
        }

        let mut edges = 0usize;
        let mut total = 0usize;
        for y in 1..self.height - 1 {
            for x in 1..self.width - 1 {
                let gx = -self.at(x - 1, y - 1) - 2.0 * self.at(x - 1, y) - self.at(x - 1, y + 1)
                    + self.at(x + 1, y - 1)
                    + 2.0 * self.at(x + 1, y)
                    + self.at(x + 1, y + 1);
                let gy = -self.at(x - 1, y - 1) - 2.0 * self.at(x, y - 1) - self.at(x + 1, y - 1)
                    + self.at(x - 1, y + 1)
                    + 2.0 * self.at(x, y + 1)
                    + self.at(x + 1, y + 1);
                if (gx * gx + gy * gy).sqrt() > EDGE_MAGNITUDE_THRESHOLD {
                    edges += 1;
                }
                total += 1;
            }
        }

        edges as f64 / total as f64
    }
}

/// Clip a region to `width` x `height`, returning (x, y, w, h)
fn clip(region: &BoundingBox, width: u32, height: u32) -> (u32, u32, u32, u32) {
    let x0 = region.x.min(width);
    let y0 = region.y.min(height);
    let x1 = region.x.saturating_add(region.width).min(width);
    let y1 = region.y.saturating_add(region.height).min(height);
    (x0, y0, x1 - x0, y1 - y0)
}
