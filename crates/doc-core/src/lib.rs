mod core;
mod embed;
mod ops;
mod plugin;
mod serde_value;
mod storage;

pub use crate::core::*;
pub use crate::embed::*;
pub use crate::ops::*;
pub use crate::plugin::*;
pub use crate::serde_value::*;
pub use crate::storage::*;
