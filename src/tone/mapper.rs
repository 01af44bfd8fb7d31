use rayon::prelude::*;

use crate::foundation::core::RGB_CHANNELS;
use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::math::{clamp01, quantize_u8};
use crate::sim::grid::Grid;
use crate::tone::frame::FrameBuffer;
use crate::tone::palette::Palette;

/// Contrast and gamma applied around the palette lookup.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToneParams {
    /// Multiplier applied to each cell before the palette, then clamped to `[0, 1]`.
    pub contrast: f64,
    /// Output gamma; each channel becomes `c^(1/gamma)`.
    pub gamma: f64,
}

impl Default for ToneParams {
    fn default() -> Self {
        Self {
            contrast: 1.0,
            gamma: 1.0,
        }
    }
}

impl ToneParams {
    /// Both values must be finite and strictly positive.
    pub fn validate(&self) -> ReelResult<()> {
        if !self.contrast.is_finite() || self.contrast <= 0.0 {
            return Err(ReelError::configuration(format!(
                "contrast must be finite and > 0, got {}",
                self.contrast
            )));
        }
        if !self.gamma.is_finite() || self.gamma <= 0.0 {
            return Err(ReelError::configuration(format!(
                "gamma must be finite and > 0, got {}",
                self.gamma
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct ToneCurve {
    contrast: f32,
    inv_gamma: Option<f32>,
}

impl ToneCurve {
    fn new(params: ToneParams) -> Self {
        let inv_gamma = if params.gamma == 1.0 {
            None
        } else {
            Some((1.0 / params.gamma) as f32)
        };
        Self {
            contrast: params.contrast as f32,
            inv_gamma,
        }
    }

    fn map_cell(&self, v: f32, palette: &dyn Palette) -> [u8; 3] {
        let v = clamp01(v * self.contrast);
        // Gamma before expansion for grayscale, per channel after the lookup otherwise.
        if palette.is_grayscale() {
            let g = quantize_u8(self.gamma(v));
            return [g, g, g];
        }
        let c = palette.sample(v);
        [
            quantize_u8(self.gamma(c[0])),
            quantize_u8(self.gamma(c[1])),
            quantize_u8(self.gamma(c[2])),
        ]
    }

    fn gamma(&self, c: f32) -> f32 {
        match self.inv_gamma {
            Some(inv) => clamp01(c).powf(inv),
            None => c,
        }
    }

    fn fill(&self, grid: &Grid, palette: &dyn Palette, out: &mut FrameBuffer) {
        let w = grid.width();
        out.data
            .par_chunks_mut(w * RGB_CHANNELS)
            .zip(grid.cells().par_chunks(w))
            .for_each(|(px_row, cell_row)| {
                for (px, &v) in px_row.chunks_exact_mut(RGB_CHANNELS).zip(cell_row) {
                    px.copy_from_slice(&self.map_cell(v, palette));
                }
            });
    }
}

/// Converts a [`Grid`] into an `rgb24` [`FrameBuffer`].
///
/// Per cell: `v * contrast` clamped to `[0, 1]`, palette lookup, `c^(1/gamma)` per channel,
/// then `round(c * 255)`.
pub struct ToneMapper {
    curve: ToneCurve,
    palette: Box<dyn Palette>,
}

impl std::fmt::Debug for ToneMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToneMapper")
            .field("curve", &self.curve)
            .field("palette", &self.palette.name())
            .finish()
    }
}

impl ToneMapper {
    /// Create a mapper. `params` should already be validated.
    pub fn new(params: ToneParams, palette: Box<dyn Palette>) -> Self {
        Self {
            curve: ToneCurve::new(params),
            palette,
        }
    }

    /// Palette in use.
    pub fn palette(&self) -> &dyn Palette {
        self.palette.as_ref()
    }

    /// Map `grid` into a freshly allocated frame.
    pub fn map(&self, grid: &Grid) -> FrameBuffer {
        let mut out = FrameBuffer::new(grid.size());
        self.curve.fill(grid, self.palette.as_ref(), &mut out);
        out
    }

    /// Map `grid` into `out`, reallocating only when the dimensions differ.
    pub fn map_into(&self, grid: &Grid, out: &mut FrameBuffer) {
        if out.size() != grid.size() {
            *out = FrameBuffer::new(grid.size());
        }
        self.curve.fill(grid, self.palette.as_ref(), out);
    }

    /// Tone-map one scalar to an 8-bit pixel.
    pub fn map_cell(&self, v: f32) -> [u8; 3] {
        self.curve.map_cell(v, self.palette.as_ref())
    }
}

/// One-shot tone mapping with a borrowed palette.
pub fn map_grid(grid: &Grid, params: ToneParams, palette: &dyn Palette) -> FrameBuffer {
    let mut out = FrameBuffer::new(grid.size());
    ToneCurve::new(params).fill(grid, palette, &mut out);
    out
}

#[cfg(test)]
#[path = "../../tests/unit/tone/mapper.rs"]
mod tests;
