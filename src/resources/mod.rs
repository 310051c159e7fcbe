//! Resource management
//!
//! Handles loading and GPU residency of textures, and the materials that
//! reference them.

mod binding;
mod cache;
mod error;
#[cfg(test)]
mod fixtures;
mod material;
mod texture;
mod upload;

pub use binding::ContextBinding;
pub use cache::{ResourceCache, DEFAULT_TEXTURE_LABEL, EMPTY_TEXTURE_LABEL};
pub use error::{ResidencyError, ResidencyResult};
pub use material::*;
pub use texture::*;
pub use upload::{upload_texture, GpuTexture, TEXTURE_FORMAT};
