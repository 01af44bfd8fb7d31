pub(crate) mod grid;
pub(crate) mod rng;
pub(crate) mod stencil;
