use crate::foundation::core::{FrameIndex, FrameSize};
use crate::foundation::error::ReelResult;
use crate::session::config::SimulationParams;
use crate::sim::grid::Grid;
use crate::sim::rng::FieldRng;
use crate::sim::stencil::Evolver;
use crate::tone::frame::FrameBuffer;
use crate::tone::mapper::ToneMapper;
use crate::tone::palette::Palette;

/// Produces the frame sequence of one simulation.
///
/// Owns the single grid and the random stream. Frame `i` is the grid after evolution step
/// `i + time_step_offset`, tone-mapped; the grid is never advanced while a frame is being
/// mapped from it.
#[derive(Debug)]
pub struct FrameGenerator {
    grid: Grid,
    evolver: Evolver,
    rng: FieldRng,
    mapper: ToneMapper,
    step_offset: u64,
    next: u64,
}

impl FrameGenerator {
    /// Validate `params`, draw the initial grid and prepare the mapper.
    pub fn new(params: &SimulationParams, palette: Box<dyn Palette>) -> ReelResult<Self> {
        params.validate()?;
        let size = params.size()?;
        let mut rng = FieldRng::new(params.seed);
        let grid = Grid::random(size, &mut rng);
        Ok(Self {
            grid,
            evolver: Evolver::new(params.evolve()),
            rng,
            mapper: ToneMapper::new(params.tone(), palette),
            step_offset: params.time_step_offset,
            next: 0,
        })
    }

    /// Frame dimensions.
    pub fn size(&self) -> FrameSize {
        self.grid.size()
    }

    /// Current grid: the initial state before the first [`FrameGenerator::advance`].
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Mapper in use.
    pub fn mapper(&self) -> &ToneMapper {
        &self.mapper
    }

    /// Index the next call to [`FrameGenerator::advance`] will produce.
    pub fn next_index(&self) -> FrameIndex {
        FrameIndex(self.next)
    }

    /// Evolve the grid to the next frame and return that frame's index.
    pub fn advance(&mut self) -> FrameIndex {
        let idx = FrameIndex(self.next);
        let step = self.next + self.step_offset;
        self.evolver
            .evolve_in_place(&mut self.grid, step, &mut self.rng);
        self.next += 1;
        idx
    }

    /// Tone-map the current grid into `out`.
    pub fn render_into(&self, out: &mut FrameBuffer) {
        self.mapper.map_into(&self.grid, out);
    }

    /// Advance and tone-map into a fresh buffer.
    pub fn next_frame(&mut self) -> (FrameIndex, FrameBuffer) {
        let idx = self.advance();
        (idx, self.mapper.map(&self.grid))
    }

    /// Evolve without mapping until the next frame produced is `target`.
    ///
    /// No-op when already at or past `target`.
    pub fn skip_to(&mut self, target: FrameIndex) {
        while self.next < target.0 {
            self.advance();
        }
    }
}

/// Render frame `idx` of the simulation without an encoder.
pub fn render_frame(
    params: &SimulationParams,
    palette: Box<dyn Palette>,
    idx: FrameIndex,
) -> ReelResult<FrameBuffer> {
    let mut generator = FrameGenerator::new(params, palette)?;
    generator.skip_to(idx);
    Ok(generator.next_frame().1)
}

#[cfg(test)]
#[path = "../../tests/unit/session/generator.rs"]
mod tests;
