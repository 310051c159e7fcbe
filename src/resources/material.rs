//! Material definitions for PBR rendering
//!
//! Materials reference textures weakly. The resource cache owns every texture;
//! a material never keeps one alive past its cache entry.

use std::sync::{Arc, Weak};

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use parking_lot::RwLock;

use super::texture::Texture;

/// Material shared between the cache and scene objects
pub type SharedMaterial = Arc<RwLock<Material>>;

/// Texture slots of a PBR material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    BaseColor,
    Normal,
    MetallicRoughness,
    Emissive,
    Occlusion,
}

impl TextureSlot {
    pub const ALL: [TextureSlot; 5] = [
        TextureSlot::BaseColor,
        TextureSlot::Normal,
        TextureSlot::MetallicRoughness,
        TextureSlot::Emissive,
        TextureSlot::Occlusion,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// PBR material properties
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub base_color: Vec4,
    pub metallic: f32,
    pub roughness: f32,
    pub emissive: Vec3,
    pub emissive_strength: f32,

    /// Texture references, indexed by [`TextureSlot`]
    textures: [Option<Weak<Texture>>; 5],
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_color: Vec4::new(1.0, 1.0, 1.0, 1.0),
            metallic: 0.0,
            roughness: 0.5,
            emissive: Vec3::ZERO,
            emissive_strength: 1.0,
            textures: Default::default(),
        }
    }
}

impl Material {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_base_color(mut self, color: Vec4) -> Self {
        self.base_color = color;
        self
    }

    pub fn with_metallic(mut self, metallic: f32) -> Self {
        self.metallic = metallic;
        self
    }

    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness;
        self
    }

    pub fn with_emissive(mut self, emissive: Vec3, strength: f32) -> Self {
        self.emissive = emissive;
        self.emissive_strength = strength;
        self
    }

    pub fn with_texture(mut self, slot: TextureSlot, texture: &Arc<Texture>) -> Self {
        self.set_texture(slot, texture);
        self
    }

    /// Point `slot` at a texture owned by the cache
    pub fn set_texture(&mut self, slot: TextureSlot, texture: &Arc<Texture>) {
        self.textures[slot.index()] = Some(Arc::downgrade(texture));
    }

    pub fn clear_texture(&mut self, slot: TextureSlot) {
        self.textures[slot.index()] = None;
    }

    /// The texture in `slot`, if one is set and its cache entry still exists
    pub fn texture(&self, slot: TextureSlot) -> Option<Arc<Texture>> {
        self.textures[slot.index()].as_ref().and_then(Weak::upgrade)
    }

    /// The texture in `slot`, or `fallback` when it is unset or gone
    pub fn texture_or(&self, slot: TextureSlot, fallback: &Arc<Texture>) -> Arc<Texture> {
        self.texture(slot).unwrap_or_else(|| fallback.clone())
    }

    /// Content paths of every live texture reference
    pub fn texture_paths(&self) -> Vec<(TextureSlot, String)> {
        TextureSlot::ALL
            .iter()
            .filter_map(|slot| {
                let path = self.texture(*slot)?.path()?;
                Some((*slot, path))
            })
            .collect()
    }

    /// Create a uniform data struct for GPU
    pub fn uniform_data(&self) -> MaterialUniformData {
        MaterialUniformData {
            base_color: self.base_color,
            metallic_roughness: [self.metallic, self.roughness, 0.0, 0.0],
            emissive: self.emissive.extend(self.emissive_strength),
        }
    }
}

/// Material uniform data for GPU
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MaterialUniformData {
    pub base_color: Vec4,
    pub metallic_roughness: [f32; 4], // x=metallic, y=roughness, zw=padding
    pub emissive: Vec4,               // xyz=emissive, w=strength
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{ContextBinding, TextureOptions};

    fn texture(label: &str) -> Arc<Texture> {
        Arc::new(Texture::new(
            label,
            Arc::new(ContextBinding::new()),
            TextureOptions::default(),
        ))
    }

    #[test]
    fn test_texture_slots_are_weak() {
        let albedo = texture("albedo");
        let mut material = Material::new("brick").with_texture(TextureSlot::BaseColor, &albedo);

        assert!(Arc::ptr_eq(&material.texture(TextureSlot::BaseColor).unwrap(), &albedo));
        assert!(material.texture(TextureSlot::Normal).is_none());
        assert_eq!(Arc::strong_count(&albedo), 1);

        drop(albedo);
        assert!(material.texture(TextureSlot::BaseColor).is_none());

        material.clear_texture(TextureSlot::BaseColor);
        assert!(material.texture_paths().is_empty());
    }

    #[test]
    fn test_texture_or_fallback() {
        let fallback = texture("fallback");
        let material = Material::new("plain");

        let resolved = material.texture_or(TextureSlot::Emissive, &fallback);
        assert!(Arc::ptr_eq(&resolved, &fallback));
    }

    #[test]
    fn test_uniform_data() {
        let data = Material::new("bronze")
            .with_metallic(1.0)
            .with_roughness(0.3)
            .with_emissive(Vec3::X, 2.0)
            .uniform_data();
        assert_eq!(data.metallic_roughness[0], 1.0);
        assert_eq!(data.metallic_roughness[1], 0.3);
        assert_eq!(data.emissive, Vec4::new(1.0, 0.0, 0.0, 2.0));
        assert_eq!(std::mem::size_of::<MaterialUniformData>(), 48);
    }
}
