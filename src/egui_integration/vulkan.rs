//! Vulkan egui integration using egui-ash-renderer
//!
//! Registers uploaded textures as egui user textures so inspector panels can
//! draw them with `egui::Image`.

use ash::vk;
use egui_ash_renderer::{Options, Renderer};
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use super::{DisplayHandle, DisplayRegistry};
use crate::backend::vulkan::VulkanContext;
use crate::backend::{BackendError, BackendResult, ImageLayout, ImageViewHandle, SamplerHandle};

/// Vulkan-specific egui integration
pub struct VulkanEguiIntegration {
    /// egui context
    ctx: egui::Context,
    /// Device context the registered views and samplers live in
    context: Weak<VulkanContext>,
    device: ash::Device,
    /// egui-ash renderer (must be dropped before allocator)
    renderer: Mutex<Option<Renderer>>,
    /// Allocator owned by this integration (required by egui-ash-renderer).
    /// It MUST be dropped before the Vulkan device is destroyed.
    allocator: Option<Arc<std::sync::Mutex<Allocator>>>,
    /// Pool and layout for one combined image sampler per user texture
    descriptor_pool: vk::DescriptorPool,
    set_layout: vk::DescriptorSetLayout,
    user_textures: Mutex<HashMap<u64, vk::DescriptorSet>>,
}

impl VulkanEguiIntegration {
    /// Create a new Vulkan egui integration able to display up to
    /// `max_textures` registered textures at once.
    pub fn new(
        context: &Arc<VulkanContext>,
        render_pass: vk::RenderPass,
        max_textures: u32,
    ) -> BackendResult<Self> {
        let device = context.device().clone();
        let ctx = egui::Context::default();

        // Create a separate allocator for egui (requires std::sync::Mutex)
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: context.instance().clone(),
            device: device.clone(),
            physical_device: context.physical_device(),
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .map_err(|e| BackendError::BufferCreationFailed(e.to_string()))?;
        let allocator = Arc::new(std::sync::Mutex::new(allocator));

        let renderer = Renderer::with_gpu_allocator(
            allocator.clone(),
            device.clone(),
            render_pass,
            Options {
                srgb_framebuffer: true,
                ..Default::default()
            },
        )
        .map_err(|e| BackendError::TextureCreationFailed(e.to_string()))?;

        let binding = vk::DescriptorSetLayoutBinding::default()
            .binding(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::FRAGMENT);
        let layout_info =
            vk::DescriptorSetLayoutCreateInfo::default().bindings(std::slice::from_ref(&binding));
        let set_layout = unsafe {
            device
                .create_descriptor_set_layout(&layout_info, None)
                .map_err(|e| BackendError::TextureCreationFailed(e.to_string()))?
        };

        let pool_size = vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(max_textures);
        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(max_textures)
            .pool_sizes(std::slice::from_ref(&pool_size));
        let descriptor_pool = match unsafe { device.create_descriptor_pool(&pool_info, None) } {
            Ok(pool) => pool,
            Err(e) => {
                unsafe { device.destroy_descriptor_set_layout(set_layout, None) };
                return Err(BackendError::TextureCreationFailed(e.to_string()));
            }
        };

        Ok(Self {
            ctx,
            context: Arc::downgrade(context),
            device,
            renderer: Mutex::new(Some(renderer)),
            allocator: Some(allocator),
            descriptor_pool,
            set_layout,
            user_textures: Mutex::new(HashMap::new()),
        })
    }

    /// Get the egui context
    pub fn context(&self) -> &egui::Context {
        &self.ctx
    }

    /// Number of textures currently registered
    pub fn registered_textures(&self) -> usize {
        self.user_textures.lock().len()
    }

    /// Destroy GPU resources. Must be called before the Vulkan context is dropped.
    pub fn destroy(&mut self) {
        unsafe {
            // Wait for GPU to finish all operations
            let _ = self.device.device_wait_idle();
        }

        let sets: Vec<vk::DescriptorSet> =
            self.user_textures.lock().drain().map(|(_, set)| set).collect();

        // Drop renderer first (it uses the allocator)
        *self.renderer.lock() = None;

        // Then drop allocator
        self.allocator = None;

        unsafe {
            if !sets.is_empty() {
                let _ = self.device.free_descriptor_sets(self.descriptor_pool, &sets);
            }
            self.device.destroy_descriptor_pool(self.descriptor_pool, None);
            self.device.destroy_descriptor_set_layout(self.set_layout, None);
        }
        self.descriptor_pool = vk::DescriptorPool::null();
        self.set_layout = vk::DescriptorSetLayout::null();
    }
}

impl DisplayRegistry for VulkanEguiIntegration {
    fn register_texture(
        &self,
        sampler: SamplerHandle,
        view: ImageViewHandle,
        layout: ImageLayout,
    ) -> BackendResult<DisplayHandle> {
        let context = self.context.upgrade().ok_or(BackendError::DeviceLost)?;
        let raw_sampler = context
            .raw_sampler(sampler)
            .ok_or_else(|| BackendError::InvalidHandle(format!("sampler {}", sampler.raw())))?;
        let raw_view = context
            .raw_image_view(view)
            .ok_or_else(|| BackendError::InvalidHandle(format!("image view {}", view.raw())))?;

        let mut renderer = self.renderer.lock();
        let renderer = renderer
            .as_mut()
            .ok_or_else(|| BackendError::InvalidUsage("egui integration destroyed".into()))?;

        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.descriptor_pool)
            .set_layouts(std::slice::from_ref(&self.set_layout));
        let set = unsafe {
            self.device
                .allocate_descriptor_sets(&alloc_info)
                .map_err(|e| match e {
                    vk::Result::ERROR_OUT_OF_POOL_MEMORY => BackendError::OutOfMemory,
                    other => BackendError::TextureCreationFailed(other.to_string()),
                })?[0]
        };

        let image_layout = match layout {
            ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
            ImageLayout::TransferSrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            ImageLayout::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            ImageLayout::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        };
        let image_info = vk::DescriptorImageInfo::default()
            .sampler(raw_sampler)
            .image_view(raw_view)
            .image_layout(image_layout);
        let write = vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(std::slice::from_ref(&image_info));
        unsafe {
            self.device.update_descriptor_sets(&[write], &[]);
        }

        match renderer.add_user_texture(set) {
            egui::TextureId::User(id) => {
                self.user_textures.lock().insert(id, set);
                Ok(DisplayHandle(id))
            }
            egui::TextureId::Managed(_) => {
                unsafe {
                    let _ = self.device.free_descriptor_sets(self.descriptor_pool, &[set]);
                }
                Err(BackendError::InvalidUsage(
                    "renderer returned a managed texture id".into(),
                ))
            }
        }
    }

    fn unregister_texture(&self, handle: DisplayHandle) {
        let Some(set) = self.user_textures.lock().remove(&handle.0) else {
            return;
        };
        if let Some(renderer) = self.renderer.lock().as_mut() {
            renderer.remove_user_texture(handle.into());
        }
        unsafe {
            let _ = self.device.free_descriptor_sets(self.descriptor_pool, &[set]);
        }
    }
}

impl Drop for VulkanEguiIntegration {
    fn drop(&mut self) {
        // Always call destroy() before dropping the Vulkan context!
        if self.renderer.lock().is_some() || self.allocator.is_some() {
            log::warn!("VulkanEguiIntegration::destroy() was not called before drop. This may cause issues.");
        }
    }
}
