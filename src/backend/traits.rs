//! Device context abstraction
//!
//! The residency manager never owns the GPU device. It talks to whatever owns
//! it through [`DeviceContext`], which both the Vulkan and the dummy context
//! implement.

use crate::backend::types::*;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Failed to create sampler: {0}")]
    SamplerCreationFailed(String),
    #[error("Command submission failed: {0}")]
    CommandFailed(String),
    #[error("Format {0:?} does not support this operation")]
    UnsupportedFormat(TextureFormat),
    #[error("Unknown handle: {0}")]
    InvalidHandle(String),
    #[error("Invalid usage: {0}")]
    InvalidUsage(String),
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Device lost")]
    DeviceLost,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a GPU buffer and its backing memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) u64);

/// Handle to a GPU image and its backing memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageHandle(pub(crate) u64);

/// Handle to an image view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageViewHandle(pub(crate) u64);

/// Handle to a sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerHandle(pub(crate) u64);

macro_rules! impl_raw_id {
    ($($handle:ty),*) => {
        $(impl $handle {
            /// Backend-local id of this handle
            pub fn raw(&self) -> u64 {
                self.0
            }
        })*
    };
}

impl_raw_id!(BufferHandle, ImageHandle, ImageViewHandle, SamplerHandle);

/// Resource-creation primitives exposed by the owner of the graphics device.
///
/// All methods take `&self`: the context is shared by every texture through a
/// non-owning reference, so implementations keep their bookkeeping behind
/// interior mutability. Calls are expected on the thread that owns the device.
pub trait DeviceContext {
    /// Allocate a buffer and bind memory to it
    fn create_buffer(&self, desc: &BufferDescriptor) -> BackendResult<BufferHandle>;

    /// Map the buffer memory, copy `data` at `offset` and unmap it again
    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8]) -> BackendResult<()>;

    /// Allocate an image and bind memory to it
    fn create_image(&self, desc: &ImageDescriptor) -> BackendResult<ImageHandle>;

    /// Transition every mip level of `image` from `old` to `new` layout
    fn transition_image_layout(
        &self,
        image: ImageHandle,
        format: TextureFormat,
        old: ImageLayout,
        new: ImageLayout,
        mip_levels: u32,
    ) -> BackendResult<()>;

    /// Copy a tightly packed buffer into mip level 0 of `image`.
    /// The image must be in [`ImageLayout::TransferDst`].
    fn copy_buffer_to_image(
        &self,
        buffer: BufferHandle,
        image: ImageHandle,
        width: u32,
        height: u32,
    ) -> BackendResult<()>;

    /// Fill mip levels 1.. by downsampling level 0.
    /// Every level ends up in [`ImageLayout::ShaderReadOnly`].
    fn generate_mipmaps(
        &self,
        image: ImageHandle,
        format: TextureFormat,
        width: u32,
        height: u32,
        mip_levels: u32,
    ) -> BackendResult<()>;

    /// Create a 2D view covering `mip_levels` levels of `image`
    fn create_image_view(
        &self,
        image: ImageHandle,
        format: TextureFormat,
        aspect: ImageAspect,
        mip_levels: u32,
    ) -> BackendResult<ImageViewHandle>;

    /// Create a sampler
    fn create_sampler(&self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle>;

    // Resource cleanup. Unknown handles are ignored.

    /// Destroy a buffer and free its memory
    fn destroy_buffer(&self, buffer: BufferHandle);

    /// Destroy an image and free its memory
    fn destroy_image(&self, image: ImageHandle);

    /// Destroy an image view
    fn destroy_image_view(&self, view: ImageViewHandle);

    /// Destroy a sampler
    fn destroy_sampler(&self, sampler: SamplerHandle);
}
