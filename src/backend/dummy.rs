//! Dummy device context for testing and headless use.
//!
//! No GPU work happens here. Every resource is tracked by id, image layouts are
//! simulated so out-of-order uploads are rejected, and each successful call is
//! recorded so tests can assert on counts and ordering. Individual operations
//! can be made to fail to exercise error paths.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::egui_integration::{DisplayHandle, DisplayRegistry};

/// Device operations recorded by [`DummyContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceCall {
    CreateBuffer,
    WriteBuffer,
    CreateImage,
    TransitionLayout,
    CopyBufferToImage,
    GenerateMipmaps,
    CreateImageView,
    CreateSampler,
    DestroyBuffer,
    DestroyImage,
    DestroyImageView,
    DestroySampler,
}

#[derive(Debug)]
struct DummyBuffer {
    size: u64,
    written: bool,
}

#[derive(Debug)]
struct DummyImage {
    width: u32,
    height: u32,
    mip_levels: u32,
    layout: ImageLayout,
    base_level_written: bool,
}

#[derive(Debug, Default)]
struct DummyState {
    next_id: u64,
    buffers: HashMap<u64, DummyBuffer>,
    images: HashMap<u64, DummyImage>,
    views: HashMap<u64, u64>,
    samplers: HashSet<u64>,
    calls: Vec<DeviceCall>,
    failing: HashSet<DeviceCall>,
}

impl DummyState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn check(&self, call: DeviceCall) -> BackendResult<()> {
        if !self.failing.contains(&call) {
            return Ok(());
        }
        log::trace!("DummyContext: injected failure for {:?}", call);
        Err(match call {
            DeviceCall::CreateBuffer | DeviceCall::CreateImage => BackendError::OutOfMemory,
            DeviceCall::CreateSampler => {
                BackendError::SamplerCreationFailed("injected failure".into())
            }
            DeviceCall::CreateImageView => {
                BackendError::TextureCreationFailed("injected failure".into())
            }
            _ => BackendError::CommandFailed(format!("injected failure in {call:?}")),
        })
    }

    fn image_mut(&mut self, image: ImageHandle) -> BackendResult<&mut DummyImage> {
        self.images
            .get_mut(&image.0)
            .ok_or_else(|| BackendError::InvalidHandle(format!("image {}", image.0)))
    }
}

/// Headless [`DeviceContext`] with allocation tracking.
#[derive(Debug, Default)]
pub struct DummyContext {
    state: Mutex<DummyState>,
}

impl DummyContext {
    /// Create a new dummy context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the backend name.
    pub fn name(&self) -> &'static str {
        "Dummy Context"
    }

    /// Make every future call of this kind fail.
    pub fn fail_on(&self, call: DeviceCall) {
        self.state.lock().failing.insert(call);
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        self.state.lock().failing.clear();
    }

    /// Successful calls in the order they happened.
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.state.lock().calls.clone()
    }

    /// Number of successful calls of one kind.
    pub fn call_count(&self, call: DeviceCall) -> usize {
        self.state.lock().calls.iter().filter(|c| **c == call).count()
    }

    /// Forget the recorded call log. Live resources are kept.
    pub fn reset_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn live_buffers(&self) -> usize {
        self.state.lock().buffers.len()
    }

    pub fn live_images(&self) -> usize {
        self.state.lock().images.len()
    }

    pub fn live_image_views(&self) -> usize {
        self.state.lock().views.len()
    }

    pub fn live_samplers(&self) -> usize {
        self.state.lock().samplers.len()
    }

    /// Total number of resources created and not yet destroyed.
    pub fn live_resources(&self) -> usize {
        let state = self.state.lock();
        state.buffers.len() + state.images.len() + state.views.len() + state.samplers.len()
    }

    /// Current simulated layout of an image.
    pub fn image_layout(&self, image: ImageHandle) -> Option<ImageLayout> {
        self.state.lock().images.get(&image.0).map(|i| i.layout)
    }

    /// Whether a handle still refers to a live resource.
    pub fn is_live_image(&self, image: ImageHandle) -> bool {
        self.state.lock().images.contains_key(&image.0)
    }

    pub fn is_live_sampler(&self, sampler: SamplerHandle) -> bool {
        self.state.lock().samplers.contains(&sampler.0)
    }

    pub fn is_live_image_view(&self, view: ImageViewHandle) -> bool {
        self.state.lock().views.contains_key(&view.0)
    }
}

impl DeviceContext for DummyContext {
    fn create_buffer(&self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        let mut state = self.state.lock();
        state.check(DeviceCall::CreateBuffer)?;
        if desc.size == 0 {
            return Err(BackendError::BufferCreationFailed("zero-sized buffer".into()));
        }
        log::trace!(
            "DummyContext: creating buffer {:?} (size: {})",
            desc.label,
            desc.size
        );
        let id = state.next_id();
        state.buffers.insert(
            id,
            DummyBuffer {
                size: desc.size,
                written: false,
            },
        );
        state.calls.push(DeviceCall::CreateBuffer);
        Ok(BufferHandle(id))
    }

    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8]) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.check(DeviceCall::WriteBuffer)?;
        let entry = state
            .buffers
            .get_mut(&buffer.0)
            .ok_or_else(|| BackendError::InvalidHandle(format!("buffer {}", buffer.0)))?;
        if offset + data.len() as u64 > entry.size {
            return Err(BackendError::InvalidUsage(format!(
                "write of {} bytes at {} overflows buffer of {} bytes",
                data.len(),
                offset,
                entry.size
            )));
        }
        entry.written = true;
        state.calls.push(DeviceCall::WriteBuffer);
        Ok(())
    }

    fn create_image(&self, desc: &ImageDescriptor) -> BackendResult<ImageHandle> {
        let mut state = self.state.lock();
        state.check(DeviceCall::CreateImage)?;
        log::trace!(
            "DummyContext: creating image {:?} ({}x{}, {} mips)",
            desc.label,
            desc.width,
            desc.height,
            desc.mip_levels
        );
        let id = state.next_id();
        state.images.insert(
            id,
            DummyImage {
                width: desc.width,
                height: desc.height,
                mip_levels: desc.mip_levels,
                layout: ImageLayout::Undefined,
                base_level_written: false,
            },
        );
        state.calls.push(DeviceCall::CreateImage);
        Ok(ImageHandle(id))
    }

    fn transition_image_layout(
        &self,
        image: ImageHandle,
        _format: TextureFormat,
        old: ImageLayout,
        new: ImageLayout,
        mip_levels: u32,
    ) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.check(DeviceCall::TransitionLayout)?;
        let entry = state.image_mut(image)?;
        if entry.layout != old {
            return Err(BackendError::InvalidUsage(format!(
                "image is in {:?}, not {:?}",
                entry.layout, old
            )));
        }
        if mip_levels != entry.mip_levels {
            return Err(BackendError::InvalidUsage(format!(
                "transition covers {} of {} mip levels",
                mip_levels, entry.mip_levels
            )));
        }
        entry.layout = new;
        state.calls.push(DeviceCall::TransitionLayout);
        Ok(())
    }

    fn copy_buffer_to_image(
        &self,
        buffer: BufferHandle,
        image: ImageHandle,
        width: u32,
        height: u32,
    ) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.check(DeviceCall::CopyBufferToImage)?;
        let (size, written) = state
            .buffers
            .get(&buffer.0)
            .map(|b| (b.size, b.written))
            .ok_or_else(|| BackendError::InvalidHandle(format!("buffer {}", buffer.0)))?;
        if !written {
            return Err(BackendError::InvalidUsage("copy from unwritten buffer".into()));
        }
        let entry = state.image_mut(image)?;
        if entry.layout != ImageLayout::TransferDst {
            return Err(BackendError::InvalidUsage(format!(
                "copy into image in {:?} layout",
                entry.layout
            )));
        }
        if width != entry.width || height != entry.height {
            return Err(BackendError::InvalidUsage("copy extent mismatch".into()));
        }
        if size < u64::from(width) * u64::from(height) * 4 {
            return Err(BackendError::InvalidUsage("buffer smaller than copy".into()));
        }
        entry.base_level_written = true;
        state.calls.push(DeviceCall::CopyBufferToImage);
        Ok(())
    }

    fn generate_mipmaps(
        &self,
        image: ImageHandle,
        _format: TextureFormat,
        _width: u32,
        _height: u32,
        mip_levels: u32,
    ) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.check(DeviceCall::GenerateMipmaps)?;
        let entry = state.image_mut(image)?;
        if !entry.base_level_written || entry.layout != ImageLayout::TransferDst {
            return Err(BackendError::InvalidUsage(
                "mip generation before base level upload".into(),
            ));
        }
        if mip_levels != entry.mip_levels {
            return Err(BackendError::InvalidUsage("mip level count mismatch".into()));
        }
        entry.layout = ImageLayout::ShaderReadOnly;
        state.calls.push(DeviceCall::GenerateMipmaps);
        Ok(())
    }

    fn create_image_view(
        &self,
        image: ImageHandle,
        _format: TextureFormat,
        _aspect: ImageAspect,
        _mip_levels: u32,
    ) -> BackendResult<ImageViewHandle> {
        let mut state = self.state.lock();
        state.check(DeviceCall::CreateImageView)?;
        state.image_mut(image)?;
        let id = state.next_id();
        state.views.insert(id, image.0);
        state.calls.push(DeviceCall::CreateImageView);
        Ok(ImageViewHandle(id))
    }

    fn create_sampler(&self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        let mut state = self.state.lock();
        state.check(DeviceCall::CreateSampler)?;
        log::trace!("DummyContext: creating sampler {:?}", desc.label);
        let id = state.next_id();
        state.samplers.insert(id);
        state.calls.push(DeviceCall::CreateSampler);
        Ok(SamplerHandle(id))
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        let mut state = self.state.lock();
        if state.buffers.remove(&buffer.0).is_some() {
            state.calls.push(DeviceCall::DestroyBuffer);
        }
    }

    fn destroy_image(&self, image: ImageHandle) {
        let mut state = self.state.lock();
        if state.images.remove(&image.0).is_some() {
            if state.views.values().any(|i| *i == image.0) {
                log::warn!("DummyContext: image {} destroyed while a view is alive", image.0);
            }
            state.calls.push(DeviceCall::DestroyImage);
        }
    }

    fn destroy_image_view(&self, view: ImageViewHandle) {
        let mut state = self.state.lock();
        if state.views.remove(&view.0).is_some() {
            state.calls.push(DeviceCall::DestroyImageView);
        }
    }

    fn destroy_sampler(&self, sampler: SamplerHandle) {
        let mut state = self.state.lock();
        if state.samplers.remove(&sampler.0) {
            state.calls.push(DeviceCall::DestroySampler);
        }
    }
}

/// Headless [`DisplayRegistry`] handing out sequential display handles.
#[derive(Debug, Default)]
pub struct DummyDisplay {
    registered: Mutex<HashMap<u64, (SamplerHandle, ImageViewHandle)>>,
    next_id: Mutex<u64>,
    registrations: Mutex<usize>,
}

impl DummyDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles currently registered.
    pub fn live_handles(&self) -> usize {
        self.registered.lock().len()
    }

    /// Total number of successful registrations.
    pub fn registration_count(&self) -> usize {
        *self.registrations.lock()
    }

    pub fn is_registered(&self, handle: DisplayHandle) -> bool {
        self.registered.lock().contains_key(&handle.0)
    }

    /// The sampler/view pair a handle was issued for.
    pub fn lookup(&self, handle: DisplayHandle) -> Option<(SamplerHandle, ImageViewHandle)> {
        self.registered.lock().get(&handle.0).copied()
    }
}

impl DisplayRegistry for DummyDisplay {
    fn register_texture(
        &self,
        sampler: SamplerHandle,
        view: ImageViewHandle,
        layout: ImageLayout,
    ) -> BackendResult<DisplayHandle> {
        if layout != ImageLayout::ShaderReadOnly {
            return Err(BackendError::InvalidUsage(format!(
                "display registration expects a shader-readable image, got {layout:?}"
            )));
        }
        let mut next = self.next_id.lock();
        *next += 1;
        self.registered.lock().insert(*next, (sampler, view));
        *self.registrations.lock() += 1;
        Ok(DisplayHandle(*next))
    }

    fn unregister_texture(&self, handle: DisplayHandle) {
        self.registered.lock().remove(&handle.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_desc(mip_levels: u32) -> ImageDescriptor {
        ImageDescriptor {
            width: 4,
            height: 4,
            mip_levels,
            format: TextureFormat::Rgba8UnormSrgb,
            ..Default::default()
        }
    }

    #[test]
    fn test_tracks_live_resources() {
        let ctx = DummyContext::new();
        let buffer = ctx.create_buffer(&BufferDescriptor::staging(None, 64)).unwrap();
        let image = ctx.create_image(&image_desc(1)).unwrap();
        assert_eq!(ctx.live_resources(), 2);

        ctx.destroy_buffer(buffer);
        ctx.destroy_buffer(buffer);
        ctx.destroy_image(image);
        assert_eq!(ctx.live_resources(), 0);
        assert_eq!(ctx.call_count(DeviceCall::DestroyBuffer), 1);
    }

    #[test]
    fn test_rejects_copy_before_transition() {
        let ctx = DummyContext::new();
        let buffer = ctx.create_buffer(&BufferDescriptor::staging(None, 64)).unwrap();
        ctx.write_buffer(buffer, 0, &[0u8; 64]).unwrap();
        let image = ctx.create_image(&image_desc(3)).unwrap();

        let err = ctx.copy_buffer_to_image(buffer, image, 4, 4).unwrap_err();
        assert!(matches!(err, BackendError::InvalidUsage(_)));
    }

    #[test]
    fn test_rejects_mipmaps_before_copy() {
        let ctx = DummyContext::new();
        let image = ctx.create_image(&image_desc(3)).unwrap();
        let format = TextureFormat::Rgba8UnormSrgb;
        ctx.transition_image_layout(image, format, ImageLayout::Undefined, ImageLayout::TransferDst, 3)
            .unwrap();

        assert!(ctx.generate_mipmaps(image, format, 4, 4, 3).is_err());
        assert_eq!(ctx.image_layout(image), Some(ImageLayout::TransferDst));
    }

    #[test]
    fn test_injected_failure() {
        let ctx = DummyContext::new();
        ctx.fail_on(DeviceCall::CreateSampler);
        assert!(ctx.create_sampler(&SamplerDescriptor::default()).is_err());
        assert_eq!(ctx.live_samplers(), 0);

        ctx.clear_failures();
        assert!(ctx.create_sampler(&SamplerDescriptor::default()).is_ok());
    }

    #[test]
    fn test_display_requires_shader_read_layout() {
        let display = DummyDisplay::new();
        let sampler = SamplerHandle(1);
        let view = ImageViewHandle(2);
        assert!(display
            .register_texture(sampler, view, ImageLayout::TransferDst)
            .is_err());

        let handle = display
            .register_texture(sampler, view, ImageLayout::ShaderReadOnly)
            .unwrap();
        assert_eq!(display.lookup(handle), Some((sampler, view)));
        display.unregister_texture(handle);
        assert_eq!(display.live_handles(), 0);
    }
}
