//! GPU upload pipeline
//!
//! Moves decoded RGBA8 pixels into a sampled, mip-mapped image through a
//! host-visible staging buffer. The device calls happen in a fixed order:
//!
//! 1. sampler
//! 2. staging buffer, pixel copy, host pixels released
//! 3. device-local image
//! 4. layout transition, buffer to image copy, mip generation
//! 5. staging buffer destroyed
//! 6. image view
//!
//! If any step fails, everything created so far is destroyed before the error
//! is returned. Host pixels are only released once the staging copy succeeded.

use crate::backend::*;

use super::texture::{TextureInfo, TextureOptions};

/// Format every uploaded texture is stored in
pub const TEXTURE_FORMAT: TextureFormat = TextureFormat::Rgba8UnormSrgb;

/// Device objects of a GPU-resident texture. Either all three exist or the
/// texture holds none of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuTexture {
    pub image: ImageHandle,
    pub view: ImageViewHandle,
    pub sampler: SamplerHandle,
}

impl GpuTexture {
    /// Destroy the sampler, view and image, in that order
    pub fn destroy(self, device: &dyn DeviceContext) {
        device.destroy_sampler(self.sampler);
        device.destroy_image_view(self.view);
        device.destroy_image(self.image);
    }
}

/// Destroys whatever a partially finished upload created
struct UploadGuard<'a> {
    device: &'a dyn DeviceContext,
    sampler: Option<SamplerHandle>,
    staging: Option<BufferHandle>,
    image: Option<ImageHandle>,
}

impl<'a> UploadGuard<'a> {
    fn new(device: &'a dyn DeviceContext) -> Self {
        Self {
            device,
            sampler: None,
            staging: None,
            image: None,
        }
    }

    fn destroy_staging(&mut self) {
        if let Some(buffer) = self.staging.take() {
            self.device.destroy_buffer(buffer);
        }
    }

    fn disarm(&mut self) {
        self.sampler = None;
        self.image = None;
    }
}

impl Drop for UploadGuard<'_> {
    fn drop(&mut self) {
        self.destroy_staging();
        if let Some(image) = self.image.take() {
            self.device.destroy_image(image);
        }
        if let Some(sampler) = self.sampler.take() {
            self.device.destroy_sampler(sampler);
        }
    }
}

/// Upload the pixels in `pixels` and build the image, view and sampler of a
/// texture.
///
/// The pixel buffer is taken out of `pixels` right after it has been copied
/// into the staging buffer, unless `options.retain_cpu_pixels` is set. A
/// failure before that point leaves it in place.
pub fn upload_texture(
    device: &dyn DeviceContext,
    label: &str,
    pixels: &mut Option<Vec<u8>>,
    info: &TextureInfo,
    options: &TextureOptions,
) -> BackendResult<GpuTexture> {
    if info.width == 0 || info.height == 0 {
        return Err(BackendError::InvalidUsage(format!(
            "'{}' has a zero extent ({}x{})",
            label, info.width, info.height
        )));
    }
    let byte_count = pixels.as_ref().map_or(0, Vec::len);
    if byte_count as u64 != info.size {
        return Err(BackendError::InvalidUsage(format!(
            "'{}' has {} bytes of pixels, expected {}",
            label, byte_count, info.size
        )));
    }

    let mut guard = UploadGuard::new(device);

    let sampler = device.create_sampler(&SamplerDescriptor::mipmapped(
        Some(label.to_string()),
        info.mip_levels,
        options.max_anisotropy,
    ))?;
    guard.sampler = Some(sampler);

    let staging = device.create_buffer(&BufferDescriptor::staging(
        Some(format!("{label} (staging)")),
        info.size,
    ))?;
    guard.staging = Some(staging);
    device.write_buffer(staging, 0, pixels.as_deref().unwrap_or_default())?;
    if !options.retain_cpu_pixels {
        *pixels = None;
    }

    let image = device.create_image(&ImageDescriptor {
        label: Some(label.to_string()),
        width: info.width,
        height: info.height,
        mip_levels: info.mip_levels,
        format: TEXTURE_FORMAT,
        tiling: ImageTiling::Optimal,
        usage: TextureUsage::COPY_SRC | TextureUsage::COPY_DST | TextureUsage::TEXTURE_BINDING,
        memory: MemoryLocation::DeviceLocal,
    })?;
    guard.image = Some(image);

    device.transition_image_layout(
        image,
        TEXTURE_FORMAT,
        ImageLayout::Undefined,
        ImageLayout::TransferDst,
        info.mip_levels,
    )?;
    device.copy_buffer_to_image(staging, image, info.width, info.height)?;
    device.generate_mipmaps(image, TEXTURE_FORMAT, info.width, info.height, info.mip_levels)?;

    guard.destroy_staging();

    let view = device.create_image_view(image, TEXTURE_FORMAT, ImageAspect::Color, info.mip_levels)?;
    guard.disarm();

    log::debug!(
        "Uploaded texture '{}' ({}x{}, {} mip levels)",
        label,
        info.width,
        info.height,
        info.mip_levels
    );

    Ok(GpuTexture {
        image,
        view,
        sampler,
    })
}
