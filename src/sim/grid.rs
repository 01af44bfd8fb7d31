use crate::foundation::core::FrameSize;
use crate::foundation::error::{ReelError, ReelResult};
use crate::sim::rng::FieldRng;

/// Row-major 2-D scalar field.
///
/// After every evolution step all cells lie in `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    size: FrameSize,
    cells: Vec<f32>,
}

impl Grid {
    /// All-zero grid.
    pub fn new(size: FrameSize) -> Self {
        Self::filled(size, 0.0)
    }

    /// Grid with every cell set to `value`.
    pub fn filled(size: FrameSize, value: f32) -> Self {
        Self {
            size,
            cells: vec![value; size.pixel_count()],
        }
    }

    /// Wrap existing row-major cells.
    pub fn from_cells(size: FrameSize, cells: Vec<f32>) -> ReelResult<Self> {
        if cells.len() != size.pixel_count() {
            return Err(ReelError::configuration(format!(
                "grid cell count {} does not match {}x{}",
                cells.len(),
                size.width,
                size.height
            )));
        }
        Ok(Self { size, cells })
    }

    /// Initial field: independent uniform samples in `[0, 1)`, drawn row-major from `rng`.
    pub fn random(size: FrameSize, rng: &mut FieldRng) -> Self {
        let cells = (0..size.pixel_count()).map(|_| rng.unit()).collect();
        Self { size, cells }
    }

    /// Grid dimensions.
    pub fn size(&self) -> FrameSize {
        self.size
    }

    /// Width in cells.
    pub fn width(&self) -> usize {
        self.size.width as usize
    }

    /// Height in cells.
    pub fn height(&self) -> usize {
        self.size.height as usize
    }

    /// Row-major cell values.
    pub fn cells(&self) -> &[f32] {
        &self.cells
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [f32] {
        &mut self.cells
    }

    /// Cell at column `x`, row `y`.
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.cells[y * self.width() + x]
    }

    /// One row of cells.
    pub fn row(&self, y: usize) -> &[f32] {
        let w = self.width();
        &self.cells[y * w..(y + 1) * w]
    }

    /// `(min, max)` over all cells.
    pub fn value_range(&self) -> (f32, f32) {
        self.cells
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sim/grid.rs"]
mod tests;
