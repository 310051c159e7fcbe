//! Texture loading and residency tracking
//!
//! A [`Texture`] moves through three independent representations:
//!
//! - **CPU**: decoded RGBA8 pixels
//! - **GPU**: image, view and sampler on the bound device context
//! - **UI**: a display handle issued for the current GPU objects
//!
//! Accessors upgrade lazily. Asking for the image of a texture that only has
//! CPU pixels uploads it first, so callers never sequence loads by hand.

use std::path::Path;
use std::sync::Arc;

use image::{DynamicImage, GenericImageView};
use parking_lot::Mutex;

use super::binding::ContextBinding;
use super::error::{ResidencyError, ResidencyResult};
use super::upload::{upload_texture, GpuTexture};
use crate::backend::*;
use crate::egui_integration::DisplayHandle;

/// Number of levels in a full mip chain: floor(log2(max(width, height))) + 1
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    let largest = width.max(height).max(1);
    u32::BITS - largest.leading_zeros()
}

/// Decoded RGBA8 pixels, tightly packed
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl TextureData {
    /// Load texture from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ResidencyResult<Self> {
        let path = path.as_ref();
        let img = image::open(path).map_err(|source| ResidencyError::Decode {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_image(img))
    }

    /// Load texture from bytes. `name` labels decode errors.
    pub fn from_bytes(bytes: &[u8], name: &str) -> ResidencyResult<Self> {
        let img = image::load_from_memory(bytes).map_err(|source| ResidencyError::Decode {
            path: name.to_string(),
            source,
        })?;
        Ok(Self::from_image(img))
    }

    /// Create texture from image
    fn from_image(img: DynamicImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            data: img.to_rgba8().into_raw(),
        }
    }

    /// Create a solid color texture
    pub fn solid_color(color: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            data: color.to_vec(),
        }
    }

    /// Create a default white texture
    pub fn white() -> Self {
        Self::solid_color([255, 255, 255, 255])
    }

    /// Create a default black texture
    pub fn black() -> Self {
        Self::solid_color([0, 0, 0, 255])
    }

    /// Create a checkerboard texture
    pub fn checkerboard(size: u32, color1: [u8; 4], color2: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity((size * size * 4) as usize);

        for y in 0..size {
            for x in 0..size {
                let is_even = ((x / 8) + (y / 8)) % 2 == 0;
                let color = if is_even { color1 } else { color2 };
                data.extend_from_slice(&color);
            }
        }

        Self {
            width: size,
            height: size,
            data,
        }
    }

    pub fn info(&self) -> TextureInfo {
        TextureInfo::new(self.width, self.height)
    }
}

/// Dimensions of a decoded texture. Kept after the pixels are released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    /// Raw RGBA8 byte count
    pub size: u64,
    pub mip_levels: u32,
}

impl TextureInfo {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            size: u64::from(width) * u64::from(height) * 4,
            mip_levels: mip_level_count(width, height),
        }
    }
}

/// Which representations of a texture currently exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Residency {
    pub cpu: bool,
    pub gpu: bool,
    pub ui: bool,
}

impl Residency {
    pub fn is_empty(&self) -> bool {
        !self.cpu && !self.gpu && !self.ui
    }
}

/// Per-texture upload settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureOptions {
    pub max_anisotropy: f32,
    /// Keep the CPU pixels after upload so GPU residency can be rebuilt
    /// without decoding again
    pub retain_cpu_pixels: bool,
}

impl Default for TextureOptions {
    fn default() -> Self {
        Self {
            max_anisotropy: 16.0,
            retain_cpu_pixels: false,
        }
    }
}

#[derive(Default)]
struct TextureState {
    path: Option<String>,
    info: Option<TextureInfo>,
    // Present exactly while CPU-resident
    pixels: Option<Vec<u8>>,
    // Present exactly while GPU-resident
    gpu: Option<GpuTexture>,
    // Issued for the current `gpu` objects only
    display: Option<DisplayHandle>,
}

impl TextureState {
    fn residency(&self) -> Residency {
        Residency {
            cpu: self.pixels.is_some(),
            gpu: self.gpu.is_some(),
            ui: self.display.is_some(),
        }
    }
}

/// A texture asset shared between materials.
///
/// All operations take `&self`; the residency state sits behind a mutex so
/// one `Arc<Texture>` can be handed to every material that references it.
pub struct Texture {
    label: String,
    binding: Arc<ContextBinding>,
    options: TextureOptions,
    state: Mutex<TextureState>,
}

impl Texture {
    /// Create an empty texture. Nothing is loaded yet.
    pub fn new(label: impl Into<String>, binding: Arc<ContextBinding>, options: TextureOptions) -> Self {
        Self {
            label: label.into(),
            binding,
            options,
            state: Mutex::new(TextureState::default()),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Path of the last successful file load
    pub fn path(&self) -> Option<String> {
        self.state.lock().path.clone()
    }

    /// Dimensions of the last successful decode
    pub fn info(&self) -> Option<TextureInfo> {
        self.state.lock().info
    }

    pub fn residency(&self) -> Residency {
        self.state.lock().residency()
    }

    pub fn is_cpu_resident(&self) -> bool {
        self.residency().cpu
    }

    pub fn is_gpu_resident(&self) -> bool {
        self.residency().gpu
    }

    pub fn is_ui_registered(&self) -> bool {
        self.residency().ui
    }

    /// Decode `path` into CPU memory, discarding everything loaded before.
    ///
    /// On failure the texture is left empty.
    pub fn load_to_cpu(&self, path: &str) -> ResidencyResult<()> {
        let mut state = self.state.lock();
        self.decode_into(&mut state, path)
    }

    /// Same as [`Texture::load_to_cpu`] for already decoded data
    pub fn load_from_data(&self, data: TextureData) {
        let mut state = self.state.lock();
        self.clear(&mut state);
        Self::install_pixels(&mut state, data);
    }

    /// Decode only; the upload happens on first GPU access
    pub fn lazy_load(&self, path: &str) -> ResidencyResult<()> {
        self.load_to_cpu(path)
    }

    /// Decode and upload before returning. GPU objects from a previous load
    /// are destroyed first.
    pub fn full_load(&self, path: &str) -> ResidencyResult<()> {
        let mut state = self.state.lock();
        self.decode_into(&mut state, path)?;
        self.ensure_gpu(&mut state).map(|_| ())
    }

    /// Full load again from the remembered path
    pub fn reload(&self) -> ResidencyResult<()> {
        let path = self.path().ok_or_else(|| {
            ResidencyError::Precondition(format!("texture '{}' has no content path", self.label))
        })?;
        self.full_load(&path)
    }

    /// Upload the CPU pixels. Does nothing if already GPU-resident.
    pub fn load_to_gpu(&self) -> ResidencyResult<()> {
        let mut state = self.state.lock();
        self.ensure_gpu(&mut state).map(|_| ())
    }

    pub fn image(&self) -> ResidencyResult<ImageHandle> {
        let mut state = self.state.lock();
        Ok(self.ensure_gpu(&mut state)?.image)
    }

    pub fn image_view(&self) -> ResidencyResult<ImageViewHandle> {
        let mut state = self.state.lock();
        Ok(self.ensure_gpu(&mut state)?.view)
    }

    pub fn sampler(&self) -> ResidencyResult<SamplerHandle> {
        let mut state = self.state.lock();
        Ok(self.ensure_gpu(&mut state)?.sampler)
    }

    /// Register the current sampler/view pair with the UI layer, uploading
    /// first if needed. A previous registration is replaced.
    pub fn load_to_ui(&self) -> ResidencyResult<DisplayHandle> {
        let mut state = self.state.lock();
        self.register_display(&mut state)
    }

    /// Display handle for the UI layer, registering on first use
    pub fn display_handle(&self) -> ResidencyResult<DisplayHandle> {
        let mut state = self.state.lock();
        match state.display {
            Some(handle) => Ok(handle),
            None => self.register_display(&mut state),
        }
    }

    /// Destroy the GPU objects and drop the display registration.
    /// CPU pixels, if still resident, are kept.
    pub fn unload_gpu(&self) {
        let mut state = self.state.lock();
        release_gpu_objects(&self.binding, &self.label, &mut state);
    }

    /// Drop the display registration only
    pub fn unload_ui(&self) {
        let mut state = self.state.lock();
        release_display(&self.binding, &mut state);
    }

    fn clear(&self, state: &mut TextureState) {
        release_gpu_objects(&self.binding, &self.label, state);
        *state = TextureState::default();
    }

    fn decode_into(&self, state: &mut TextureState, path: &str) -> ResidencyResult<()> {
        self.clear(state);
        let data = TextureData::from_file(path)?;
        state.path = Some(path.to_string());
        Self::install_pixels(state, data);
        log::debug!("Texture '{}' loaded to CPU from {}", self.label, path);
        Ok(())
    }

    fn install_pixels(state: &mut TextureState, data: TextureData) {
        state.info = Some(data.info());
        state.pixels = Some(data.data);
    }

    fn ensure_gpu(&self, state: &mut TextureState) -> ResidencyResult<GpuTexture> {
        if let Some(gpu) = state.gpu {
            return Ok(gpu);
        }

        let (Some(info), true) = (state.info, state.pixels.is_some()) else {
            log::warn!("Texture '{}' not loaded to CPU", self.label);
            return Err(ResidencyError::Precondition(format!(
                "texture '{}' not loaded to CPU",
                self.label
            )));
        };

        let device = self.binding.device()?;

        let gpu = upload_texture(
            device.as_ref(),
            &self.label,
            &mut state.pixels,
            &info,
            &self.options,
        )
        .map_err(|e| {
            log::error!("Failed to upload texture '{}': {}", self.label, e);
            e
        })?;

        state.gpu = Some(gpu);
        Ok(gpu)
    }

    fn register_display(&self, state: &mut TextureState) -> ResidencyResult<DisplayHandle> {
        let display = self.binding.display()?;
        let gpu = self.ensure_gpu(state)?;

        if let Some(previous) = state.display.take() {
            display.unregister_texture(previous);
        }
        let handle = display.register_texture(gpu.sampler, gpu.view, ImageLayout::ShaderReadOnly)?;
        state.display = Some(handle);
        log::debug!("Texture '{}' registered for display", self.label);
        Ok(handle)
    }
}

fn release_display(binding: &ContextBinding, state: &mut TextureState) {
    if let Some(handle) = state.display.take() {
        if let Ok(display) = binding.display() {
            display.unregister_texture(handle);
        }
    }
}

fn release_gpu_objects(binding: &ContextBinding, label: &str, state: &mut TextureState) {
    // A display handle is only valid for the objects it was issued for
    release_display(binding, state);

    let Some(gpu) = state.gpu.take() else {
        return;
    };
    match binding.device() {
        Ok(device) => {
            gpu.destroy(device.as_ref());
            log::debug!("Texture '{}' released from GPU", label);
        }
        Err(e) => log::warn!("Dropping GPU objects of texture '{}' without destroying them: {}", label, e),
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        release_gpu_objects(&self.binding, &self.label, self.state.get_mut());
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("label", &self.label)
            .field("residency", &self.residency())
            .finish()
    }
}
