//! Scalar-to-color palettes.
//!
//! A palette is an injected capability: the pipeline only ever sees `&dyn Palette`. Named color
//! ramps come from a [`PaletteCatalog`]; when the color backend is compiled out (feature
//! `colormaps` disabled) the catalog only knows grayscale, and every other request falls back
//! to it.

use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::math::clamp01;

/// Name accepted for the grayscale palette (plus `grey` and `grayscale`).
pub const GRAYSCALE_NAME: &str = "gray";
/// Ramp used when a requested name is unknown but the color backend is present.
pub const DEFAULT_RAMP_NAME: &str = "plasma";
/// Number of entries in a sampled color ramp.
pub const RAMP_LEN: usize = 256;

/// Maps a scalar in `[0, 1]` to linear-ish RGB components, each in `[0, 1]`.
pub trait Palette: Send + Sync {
    /// Stable palette name.
    fn name(&self) -> &str;

    /// Color for `v`. Inputs outside `[0, 1]` are clamped.
    fn sample(&self, v: f32) -> [f32; 3];

    /// `true` when `sample` always returns `r == g == b == v`.
    fn is_grayscale(&self) -> bool {
        false
    }
}

impl Palette for std::sync::Arc<dyn Palette> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn sample(&self, v: f32) -> [f32; 3] {
        (**self).sample(v)
    }

    fn is_grayscale(&self) -> bool {
        (**self).is_grayscale()
    }
}

/// Replicates the value into all three channels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Grayscale;

impl Palette for Grayscale {
    fn name(&self) -> &str {
        GRAYSCALE_NAME
    }

    fn sample(&self, v: f32) -> [f32; 3] {
        let v = clamp01(v);
        [v, v, v]
    }

    fn is_grayscale(&self) -> bool {
        true
    }
}

/// Fixed-size color ramp sampled with linear interpolation between entries.
#[derive(Clone, Debug, PartialEq)]
pub struct RampPalette {
    name: String,
    lut: Vec<[f32; 3]>,
}

impl RampPalette {
    /// Build from explicit entries spaced evenly over `[0, 1]`. Needs at least two entries.
    pub fn from_stops(name: impl Into<String>, stops: Vec<[f32; 3]>) -> ReelResult<Self> {
        let name = name.into();
        if stops.len() < 2 {
            return Err(ReelError::configuration(format!(
                "palette '{name}' needs at least two color stops"
            )));
        }
        let lut = stops
            .into_iter()
            .map(|c| [clamp01(c[0]), clamp01(c[1]), clamp01(c[2])])
            .collect();
        Ok(Self { name, lut })
    }

    /// Sample `f` at [`RAMP_LEN`] evenly spaced points.
    pub fn from_fn(name: impl Into<String>, f: impl Fn(f64) -> [f32; 3]) -> Self {
        let last = (RAMP_LEN - 1) as f64;
        let lut = (0..RAMP_LEN)
            .map(|i| {
                let c = f(i as f64 / last);
                [clamp01(c[0]), clamp01(c[1]), clamp01(c[2])]
            })
            .collect();
        Self {
            name: name.into(),
            lut,
        }
    }

    /// Number of ramp entries.
    pub fn len(&self) -> usize {
        self.lut.len()
    }

    /// Always `false`; ramps hold at least two entries.
    pub fn is_empty(&self) -> bool {
        self.lut.is_empty()
    }
}

impl Palette for RampPalette {
    fn name(&self) -> &str {
        &self.name
    }

    fn sample(&self, v: f32) -> [f32; 3] {
        let pos = clamp01(v) * (self.lut.len() - 1) as f32;
        let i = (pos.floor() as usize).min(self.lut.len() - 2);
        let t = pos - i as f32;
        let a = self.lut[i];
        let b = self.lut[i + 1];
        [
            a[0] + (b[0] - a[0]) * t,
            a[1] + (b[1] - a[1]) * t,
            a[2] + (b[2] - a[2]) * t,
        ]
    }
}

/// Source of named palettes.
pub trait PaletteCatalog {
    /// Ramp for `name` (already lower-cased), or `None` when unknown.
    fn lookup(&self, name: &str) -> Option<Box<dyn Palette>>;

    /// Ramp to substitute for unknown names; `None` means fall back to grayscale.
    fn default_ramp(&self) -> Option<Box<dyn Palette>>;

    /// Names this catalog can resolve, excluding grayscale.
    fn names(&self) -> Vec<&'static str>;
}

/// Catalog used when no color backend is available: grayscale only.
#[derive(Clone, Copy, Debug, Default)]
pub struct GrayscaleOnly;

impl PaletteCatalog for GrayscaleOnly {
    fn lookup(&self, _name: &str) -> Option<Box<dyn Palette>> {
        None
    }

    fn default_ramp(&self) -> Option<Box<dyn Palette>> {
        None
    }

    fn names(&self) -> Vec<&'static str> {
        Vec::new()
    }
}

/// Named perceptual and cyclic ramps backed by `colorgrad`.
#[cfg(feature = "colormaps")]
#[derive(Clone, Copy, Debug, Default)]
pub struct GradientCatalog;

#[cfg(feature = "colormaps")]
impl GradientCatalog {
    const NAMES: [&'static str; 10] = [
        "plasma", "viridis", "inferno", "magma", "cividis", "turbo", "rainbow", "sinebow",
        "warm", "cool",
    ];

    fn gradient(name: &str) -> Option<colorgrad::Gradient> {
        let g = match name {
            "plasma" => colorgrad::plasma(),
            "viridis" => colorgrad::viridis(),
            "inferno" => colorgrad::inferno(),
            "magma" => colorgrad::magma(),
            "cividis" => colorgrad::cividis(),
            "turbo" => colorgrad::turbo(),
            "rainbow" => colorgrad::rainbow(),
            "sinebow" => colorgrad::sinebow(),
            "warm" => colorgrad::warm(),
            "cool" => colorgrad::cool(),
            _ => return None,
        };
        Some(g)
    }
}

#[cfg(feature = "colormaps")]
impl PaletteCatalog for GradientCatalog {
    fn lookup(&self, name: &str) -> Option<Box<dyn Palette>> {
        let g = Self::gradient(name)?;
        let ramp = RampPalette::from_fn(name, |t| {
            let c = g.at(t);
            [c.r as f32, c.g as f32, c.b as f32]
        });
        Some(Box::new(ramp))
    }

    fn default_ramp(&self) -> Option<Box<dyn Palette>> {
        self.lookup(DEFAULT_RAMP_NAME)
    }

    fn names(&self) -> Vec<&'static str> {
        Self::NAMES.to_vec()
    }
}

/// Catalog compiled into this build.
pub fn default_catalog() -> Box<dyn PaletteCatalog> {
    #[cfg(feature = "colormaps")]
    {
        Box::new(GradientCatalog)
    }
    #[cfg(not(feature = "colormaps"))]
    {
        Box::new(GrayscaleOnly)
    }
}

/// `true` for the accepted spellings of grayscale.
pub fn is_grayscale_name(name: &str) -> bool {
    matches!(
        name.trim().to_ascii_lowercase().as_str(),
        "gray" | "grey" | "grayscale" | "greyscale"
    )
}

/// Strict lookup: grayscale or a ramp the catalog knows, otherwise `PaletteUnavailable`.
pub fn lookup_palette(name: &str, catalog: &dyn PaletteCatalog) -> ReelResult<Box<dyn Palette>> {
    if is_grayscale_name(name) {
        return Ok(Box::new(Grayscale));
    }
    let key = name.trim().to_ascii_lowercase();
    catalog.lookup(&key).ok_or_else(|| {
        ReelError::palette_unavailable(format!(
            "'{name}' is not available (known: {})",
            known_names(catalog)
        ))
    })
}

fn known_names(catalog: &dyn PaletteCatalog) -> String {
    let mut names = vec![GRAYSCALE_NAME];
    names.extend(catalog.names());
    names.join(", ")
}

/// Outcome of [`resolve_palette_in`].
pub struct ResolvedPalette {
    /// Palette to use for the run.
    pub palette: Box<dyn Palette>,
    /// Set when the requested palette was replaced by a fallback.
    pub fallback: Option<ReelError>,
}

impl std::fmt::Debug for ResolvedPalette {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedPalette")
            .field("palette", &self.palette.name())
            .field("fallback", &self.fallback)
            .finish()
    }
}

/// Resolve a palette name, never failing.
///
/// Unknown names map to the catalog's default ramp, or to grayscale when the catalog has no
/// ramps. Each fallback logs a single warning; callers resolve once per run.
pub fn resolve_palette_in(name: &str, catalog: &dyn PaletteCatalog) -> ResolvedPalette {
    match lookup_palette(name, catalog) {
        Ok(palette) => ResolvedPalette {
            palette,
            fallback: None,
        },
        Err(err) => {
            let palette = catalog
                .default_ramp()
                .unwrap_or_else(|| Box::new(Grayscale));
            tracing::warn!(
                requested = name,
                using = palette.name(),
                "{err}; falling back"
            );
            ResolvedPalette {
                palette,
                fallback: Some(err),
            }
        }
    }
}

/// [`resolve_palette_in`] against [`default_catalog`].
pub fn resolve_palette(name: &str) -> ResolvedPalette {
    resolve_palette_in(name, default_catalog().as_ref())
}

#[cfg(test)]
#[path = "../../tests/unit/tone/palette.rs"]
mod tests;
