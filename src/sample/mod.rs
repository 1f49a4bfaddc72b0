//! Multi-channel PCM sample container and file/archive loader.

mod container;
mod loader;

pub use container::Sample;
pub use loader::{load_ext, loads_ext, AudioDecoder};
