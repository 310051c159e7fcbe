//! Scene Assets - GPU residency management for editor textures and materials
//!
//! Tracks each texture asset from disk bytes to decoded pixels to GPU image
//! objects to a UI display handle, and shares those assets between the
//! materials of a scene so every content path is uploaded at most once.
//!
//! # Features
//! - Per-texture residency state machine with lazy upgrades
//! - Staging-buffer upload pipeline with mip generation
//! - Path-keyed texture cache and named material cache
//! - Vulkan device context via ash and gpu-allocator
//! - egui display handles via egui-ash-renderer
//! - Headless dummy context for tests and tooling

pub mod backend;
pub mod egui_integration;
pub mod resources;

pub use backend::vulkan::VulkanContext;
pub use backend::{DeviceContext, DummyContext, DummyDisplay};
pub use egui_integration::{DisplayHandle, DisplayRegistry, VulkanEguiIntegration};
pub use resources::{
    Material, ResidencyError, ResidencyResult, ResourceCache, SharedMaterial, Texture,
    TextureOptions, TextureSlot,
};

/// Configuration for a [`ResourceCache`]
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Anisotropy requested for every texture sampler.
    /// Device contexts clamp it to what the hardware supports.
    pub max_anisotropy: f32,
    /// Edge length of the default checkerboard texture
    pub default_texture_size: u32,
    /// The two checkerboard colours
    pub default_texture_colors: [[u8; 4]; 2],
    /// Colour of the 1x1 empty texture
    pub empty_texture_color: [u8; 4],
    /// Keep decoded pixels after upload
    pub retain_cpu_pixels: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_anisotropy: 16.0,
            default_texture_size: 64,
            default_texture_colors: [[255, 0, 255, 255], [0, 0, 0, 255]],
            empty_texture_color: [0, 0, 0, 0],
            retain_cpu_pixels: false,
        }
    }
}

impl CacheConfig {
    pub fn with_max_anisotropy(mut self, max_anisotropy: f32) -> Self {
        self.max_anisotropy = max_anisotropy;
        self
    }

    pub fn with_default_texture(mut self, size: u32, colors: [[u8; 4]; 2]) -> Self {
        self.default_texture_size = size.max(1);
        self.default_texture_colors = colors;
        self
    }

    pub fn with_empty_texture_color(mut self, color: [u8; 4]) -> Self {
        self.empty_texture_color = color;
        self
    }

    pub fn with_retained_cpu_pixels(mut self, retain: bool) -> Self {
        self.retain_cpu_pixels = retain;
        self
    }

    /// Upload settings applied to every texture the cache creates
    pub fn texture_options(&self) -> TextureOptions {
        TextureOptions {
            max_anisotropy: self.max_anisotropy,
            retain_cpu_pixels: self.retain_cpu_pixels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builders() {
        let config = CacheConfig::default()
            .with_max_anisotropy(4.0)
            .with_default_texture(0, [[1, 2, 3, 4], [5, 6, 7, 8]])
            .with_retained_cpu_pixels(true);

        assert_eq!(config.default_texture_size, 1);
        let options = config.texture_options();
        assert_eq!(options.max_anisotropy, 4.0);
        assert!(options.retain_cpu_pixels);
    }
}
