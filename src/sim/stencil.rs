use std::f64::consts::TAU;

use rayon::prelude::*;

use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::math::{clamp01, wrap_index};
use crate::sim::grid::Grid;
use crate::sim::rng::FieldRng;

/// Largest drift amplitude accepted by [`DriftParams::validate`].
pub const MAX_DRIFT_CELLS: f64 = 8.0;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// 3x3 stencil weights. The full kernel (`center + 4*orthogonal + 4*diagonal`) must sum to 1.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct StencilWeights {
    /// Weight of the cell itself.
    pub center: f64,
    /// Weight of each of N, S, E, W.
    pub orthogonal: f64,
    /// Weight of each of NE, NW, SE, SW.
    pub diagonal: f64,
}

impl Default for StencilWeights {
    fn default() -> Self {
        Self {
            center: 0.36,
            orthogonal: 0.11,
            diagonal: 0.05,
        }
    }
}

impl StencilWeights {
    /// Sum over all nine taps.
    pub fn total(&self) -> f64 {
        self.center + 4.0 * self.orthogonal + 4.0 * self.diagonal
    }

    /// Check weights are finite, non-negative and conserve mass.
    pub fn validate(&self) -> ReelResult<()> {
        for (name, w) in [
            ("center", self.center),
            ("orthogonal", self.orthogonal),
            ("diagonal", self.diagonal),
        ] {
            if !w.is_finite() || w < 0.0 {
                return Err(ReelError::configuration(format!(
                    "stencil {name} weight must be finite and >= 0, got {w}"
                )));
            }
        }
        let total = self.total();
        if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ReelError::configuration(format!(
                "stencil weights must sum to 1.0, got {total}"
            )));
        }
        Ok(())
    }
}

/// Travelling sinusoid added to every cell: `amplitude * sin(fx*X + fy*Y + step*phase_rate)`
/// with `X`, `Y` spanning `[0, 2pi)` across the grid.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct WaveParams {
    /// Horizontal cycles across the width.
    pub freq_x: f64,
    /// Vertical cycles across the height.
    pub freq_y: f64,
    /// Phase advance per step, in radians.
    pub phase_rate: f64,
    /// Peak amplitude before global modulation.
    pub amplitude: f64,
}

impl Default for WaveParams {
    fn default() -> Self {
        Self {
            freq_x: 3.0,
            freq_y: 2.0,
            phase_rate: 0.02,
            amplitude: 0.02,
        }
    }
}

impl WaveParams {
    /// Check every field is finite.
    pub fn validate(&self) -> ReelResult<()> {
        let all_finite = [self.freq_x, self.freq_y, self.phase_rate, self.amplitude]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(ReelError::configuration("wave parameters must be finite"));
        }
        Ok(())
    }
}

/// Slow toroidal shift of the whole field, in whole cells:
/// `dy = trunc(sin(step*rate_y) * max_cells)`, `dx = trunc(cos(step*rate_x) * max_cells)`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DriftParams {
    /// Angular rate of the vertical shift, radians per step.
    pub rate_y: f64,
    /// Angular rate of the horizontal shift, radians per step.
    pub rate_x: f64,
    /// Shift amplitude in cells. `0` disables drift.
    pub max_cells: f64,
}

impl Default for DriftParams {
    fn default() -> Self {
        Self {
            rate_y: 0.001,
            rate_x: 0.0013,
            max_cells: 2.0,
        }
    }
}

impl DriftParams {
    /// Drift disabled.
    pub fn none() -> Self {
        Self {
            max_cells: 0.0,
            ..Self::default()
        }
    }

    /// `(rows, columns)` shift for `step`. Positive values move content down / right.
    pub fn offsets(&self, step: u64) -> (isize, isize) {
        if self.max_cells == 0.0 {
            return (0, 0);
        }
        let t = step as f64;
        // `as` truncates toward zero.
        let dy = ((t * self.rate_y).sin() * self.max_cells) as isize;
        let dx = ((t * self.rate_x).cos() * self.max_cells) as isize;
        (dy, dx)
    }

    /// Check rates are finite and the amplitude is bounded.
    pub fn validate(&self) -> ReelResult<()> {
        if !self.rate_y.is_finite() || !self.rate_x.is_finite() {
            return Err(ReelError::configuration("drift rates must be finite"));
        }
        if !(0.0..=MAX_DRIFT_CELLS).contains(&self.max_cells) {
            return Err(ReelError::configuration(format!(
                "drift max_cells must be within [0, {MAX_DRIFT_CELLS}], got {}",
                self.max_cells
            )));
        }
        Ok(())
    }
}

/// Everything one evolution step reads.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct EvolveParams {
    /// Stencil kernel.
    pub weights: StencilWeights,
    /// Coherent perturbation.
    pub wave: WaveParams,
    /// Whole-field shift.
    pub drift: DriftParams,
    /// Standard deviation of per-cell Gaussian noise; `0` disables noise.
    pub noise_amplitude: f64,
    /// Scales the wave amplitude.
    pub global_modulation: f64,
}

/// Advances a [`Grid`] one step at a time.
///
/// The step reads only from the previous grid and writes into a separate buffer; the two are
/// swapped at the end, so no cell is ever read after it has been overwritten.
#[derive(Debug)]
pub struct Evolver {
    params: EvolveParams,
    spare: Vec<f32>,
}

impl Evolver {
    /// Create an evolver.
    pub fn new(params: EvolveParams) -> Self {
        Self {
            params,
            spare: Vec::new(),
        }
    }

    /// Parameters in use.
    pub fn params(&self) -> &EvolveParams {
        &self.params
    }

    /// Advance `grid` by one step, returning the evolved grid.
    ///
    /// Stencil and wave are deterministic in `step`; noise draws one sample per cell from
    /// `rng` in row-major order. Every output cell is clamped to `[0, 1]`.
    pub fn evolve(&mut self, mut grid: Grid, step: u64, rng: &mut FieldRng) -> Grid {
        self.evolve_in_place(&mut grid, step, rng);
        grid
    }

    /// Same as [`Evolver::evolve`], reusing `grid`'s storage for the result.
    pub fn evolve_in_place(&mut self, grid: &mut Grid, step: u64, rng: &mut FieldRng) {
        let w = grid.width();
        let h = grid.height();
        let p = self.params;

        let mut pre = std::mem::take(&mut self.spare);
        pre.clear();
        pre.resize(w * h, 0.0);

        let src = grid.cells();
        let phase = step as f64 * p.wave.phase_rate;
        let wave_gain = p.wave.amplitude * p.global_modulation;

        pre.par_chunks_mut(w).enumerate().for_each(|(y, out)| {
            let up = &src[wrap_index(y, -1, h) * w..][..w];
            let mid = &src[y * w..][..w];
            let down = &src[wrap_index(y, 1, h) * w..][..w];
            let phase_y = p.wave.freq_y * TAU * (y as f64) / (h as f64) + phase;

            for (x, cell) in out.iter_mut().enumerate() {
                let west = wrap_index(x, -1, w);
                let east = wrap_index(x, 1, w);

                let orth = f64::from(up[x])
                    + f64::from(down[x])
                    + f64::from(mid[west])
                    + f64::from(mid[east]);
                let diag = f64::from(up[west])
                    + f64::from(up[east])
                    + f64::from(down[west])
                    + f64::from(down[east]);

                let mut v = p.weights.center * f64::from(mid[x])
                    + p.weights.orthogonal * orth
                    + p.weights.diagonal * diag;
                if wave_gain != 0.0 {
                    let phase_x = p.wave.freq_x * TAU * (x as f64) / (w as f64);
                    v += wave_gain * (phase_x + phase_y).sin();
                }
                *cell = v as f32;
            }
        });

        // Serial so the random stream is consumed in a fixed order.
        if p.noise_amplitude > 0.0 {
            for cell in pre.iter_mut() {
                *cell = (f64::from(*cell) + rng.normal(p.noise_amplitude)) as f32;
            }
        }

        // The previous state is fully consumed; overwrite it with the shifted, clamped result.
        let (dy, dx) = p.drift.offsets(step);
        grid.cells_mut()
            .par_chunks_mut(w)
            .enumerate()
            .for_each(|(y, out)| {
                let sy = wrap_index(y, -dy, h);
                let from = &pre[sy * w..][..w];
                for (x, cell) in out.iter_mut().enumerate() {
                    *cell = clamp01(from[wrap_index(x, -dx, w)]);
                }
            });

        self.spare = pre;
    }
}

/// One-shot evolution step that leaves `grid` untouched.
pub fn evolve(grid: &Grid, step: u64, params: &EvolveParams, rng: &mut FieldRng) -> Grid {
    Evolver::new(*params).evolve(grid.clone(), step, rng)
}

#[cfg(test)]
#[path = "../../tests/unit/sim/stencil.rs"]
mod tests;
