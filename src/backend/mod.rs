//! GPU backend abstraction and its wgpu implementation

#[cfg(test)]
pub(crate) mod testing;
pub mod traits;
pub mod types;
pub mod wgpu_backend;

pub use traits::*;
pub use types::*;
pub use wgpu_backend::WgpuBackend;
