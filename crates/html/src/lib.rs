mod import;
mod render;
mod style;

pub use crate::import::*;
pub use crate::render::*;
pub use crate::style::*;
