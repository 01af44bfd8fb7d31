pub(crate) mod frame;
pub(crate) mod mapper;
pub(crate) mod palette;
