//! Material and texture cache
//!
//! [`ResourceCache`] maps content paths to shared textures and names to shared
//! materials so a texture referenced by many materials is decoded and
//! uploaded at most once. It is created and owned explicitly by the editor and
//! passed by reference to whatever needs texture resolution.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::binding::ContextBinding;
use super::error::ResidencyResult;
use super::material::{Material, SharedMaterial};
use super::texture::{Texture, TextureData};
use crate::backend::DeviceContext;
use crate::egui_integration::DisplayRegistry;
use crate::CacheConfig;

pub const DEFAULT_TEXTURE_LABEL: &str = "<default>";
pub const EMPTY_TEXTURE_LABEL: &str = "<empty>";

pub struct ResourceCache {
    config: CacheConfig,
    binding: Arc<ContextBinding>,
    textures: HashMap<String, Arc<Texture>>,
    materials: HashMap<String, SharedMaterial>,
    default_texture: Arc<Texture>,
    empty_texture: Arc<Texture>,
    // Every texture handed out, including evicted ones still held elsewhere
    issued: Vec<Weak<Texture>>,
}

impl ResourceCache {
    /// Create a cache with its built-in textures decoded but not uploaded.
    /// No device context is bound yet.
    pub fn new(config: CacheConfig) -> Self {
        let binding = Arc::new(ContextBinding::new());
        let options = config.texture_options();

        let default_texture = Arc::new(Texture::new(DEFAULT_TEXTURE_LABEL, binding.clone(), options));
        default_texture.load_from_data(TextureData::checkerboard(
            config.default_texture_size,
            config.default_texture_colors[0],
            config.default_texture_colors[1],
        ));

        let empty_texture = Arc::new(Texture::new(EMPTY_TEXTURE_LABEL, binding.clone(), options));
        empty_texture.load_from_data(TextureData::solid_color(config.empty_texture_color));

        let issued = vec![Arc::downgrade(&default_texture), Arc::downgrade(&empty_texture)];

        Self {
            config,
            binding,
            textures: HashMap::new(),
            materials: HashMap::new(),
            default_texture,
            empty_texture,
            issued,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Install the device context used for every GPU operation.
    ///
    /// The cache does not keep the context alive. Switching to a different
    /// context first releases every GPU-resident texture through the old one.
    pub fn bind_context<C: DeviceContext + 'static>(&mut self, context: &Arc<C>) {
        if self.binding.is_bound_to(context) {
            return;
        }

        let released = self.release_gpu_resources();
        if released > 0 {
            log::info!(
                "Rebinding device context: released {} GPU-resident textures",
                released
            );
        }
        self.binding.bind_device(context);
    }

    /// Install the UI registry that issues display handles.
    /// Handles issued by a previous registry are dropped.
    pub fn bind_display<D: DisplayRegistry + 'static>(&mut self, display: &Arc<D>) {
        if self.binding.is_display_bound_to(display) {
            return;
        }
        for texture in self.live_textures() {
            texture.unload_ui();
        }
        self.binding.bind_display(display);
    }

    /// Whether a device context is bound and still alive
    pub fn has_context(&self) -> bool {
        self.binding.is_device_alive()
    }

    /// Return the cached texture for `path`, or decode and upload it before
    /// returning.
    pub fn load_texture_instantly(&mut self, path: &str) -> ResidencyResult<Arc<Texture>> {
        if let Some(texture) = self.textures.get(path) {
            return Ok(texture.clone());
        }

        let texture = self.new_texture(path);
        texture.full_load(path)?;
        log::info!("Loaded texture {} (instant)", path);
        Ok(self.insert(path, texture))
    }

    /// Return the cached texture for `path`, or decode it and defer the upload
    /// to first GPU access.
    pub fn load_texture_lazily(&mut self, path: &str) -> ResidencyResult<Arc<Texture>> {
        if let Some(texture) = self.textures.get(path) {
            return Ok(texture.clone());
        }

        let texture = self.new_texture(path);
        texture.lazy_load(path)?;
        log::info!("Loaded texture {} (lazy)", path);
        Ok(self.insert(path, texture))
    }

    /// Fetch or create a named material. No texture work happens here.
    pub fn create_material(&mut self, name: &str) -> SharedMaterial {
        self.materials
            .entry(name.to_string())
            .or_insert_with(|| {
                log::debug!("Created material {}", name);
                Arc::new(RwLock::new(Material::new(name)))
            })
            .clone()
    }

    pub fn material(&self, name: &str) -> Option<SharedMaterial> {
        self.materials.get(name).cloned()
    }

    /// Pure lookup; never loads
    pub fn texture(&self, path: &str) -> Option<Arc<Texture>> {
        self.textures.get(path).cloned()
    }

    pub fn default_texture(&self) -> Arc<Texture> {
        self.default_texture.clone()
    }

    pub fn empty_texture(&self) -> Arc<Texture> {
        self.empty_texture.clone()
    }

    pub fn textures(&self) -> impl Iterator<Item = (&str, &Arc<Texture>)> {
        self.textures.iter().map(|(path, texture)| (path.as_str(), texture))
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    /// Number of live textures, built-ins included, that are GPU-resident
    pub fn gpu_resident_count(&self) -> usize {
        self.live_textures()
            .filter(|texture| texture.is_gpu_resident())
            .count()
    }

    /// Remove a texture from the cache and release its GPU objects.
    /// Materials referencing it see an empty slot once the last outside
    /// handle is dropped.
    pub fn evict_texture(&mut self, path: &str) -> bool {
        match self.textures.remove(path) {
            Some(texture) => {
                texture.unload_gpu();
                log::info!("Evicted texture {}", path);
                true
            }
            None => false,
        }
    }

    /// Release the GPU objects of every texture this cache has handed out.
    /// Returns how many textures were GPU-resident.
    pub fn release_gpu_resources(&mut self) -> usize {
        self.issued.retain(|texture| texture.strong_count() > 0);

        let mut released = 0;
        for texture in self.live_textures() {
            if texture.is_gpu_resident() {
                released += 1;
            }
            texture.unload_gpu();
        }
        released
    }

    fn live_textures(&self) -> impl Iterator<Item = Arc<Texture>> + '_ {
        self.issued.iter().filter_map(Weak::upgrade)
    }

    fn new_texture(&self, path: &str) -> Arc<Texture> {
        Arc::new(Texture::new(
            path,
            self.binding.clone(),
            self.config.texture_options(),
        ))
    }

    fn insert(&mut self, path: &str, texture: Arc<Texture>) -> Arc<Texture> {
        self.issued.retain(|texture| texture.strong_count() > 0);
        self.issued.push(Arc::downgrade(&texture));
        self.textures.insert(path.to_string(), texture.clone());
        texture
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl Drop for ResourceCache {
    fn drop(&mut self) {
        let released = self.release_gpu_resources();
        log::debug!(
            "Resource cache dropped ({} textures, {} GPU-resident released)",
            self.textures.len(),
            released
        );
        self.binding.unbind_device();
    }
}
