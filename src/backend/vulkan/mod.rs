//! Vulkan device context implementation using ash
//!
//! The editor owns the instance, device and queue. [`VulkanContext`] borrows
//! clones of those handles, owns a transient command pool and a memory
//! allocator, and records one-shot command buffers for every transfer.

use crate::backend::traits::*;
use crate::backend::types::*;
use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Vulkan device context
pub struct VulkanContext {
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    graphics_queue: vk::Queue,
    command_pool: vk::CommandPool,
    allocator: Mutex<Option<Allocator>>,

    // 1.0 when the device has no anisotropic filtering
    max_sampler_anisotropy: f32,

    // Resource storage
    buffers: Mutex<HashMap<u64, VkBuffer>>,
    images: Mutex<HashMap<u64, VkImage>>,
    image_views: Mutex<HashMap<u64, vk::ImageView>>,
    samplers: Mutex<HashMap<u64, vk::Sampler>>,

    next_id: AtomicU64,
}

struct VkBuffer {
    buffer: vk::Buffer,
    allocation: Allocation,
    size: u64,
}

struct VkImage {
    image: vk::Image,
    allocation: Allocation,
}

impl VulkanContext {
    /// Create a context on top of an existing device.
    ///
    /// The instance and device must outlive the returned context.
    pub fn new(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: &ash::Device,
        graphics_queue: vk::Queue,
        graphics_queue_family: u32,
    ) -> BackendResult<Self> {
        unsafe {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .flags(vk::CommandPoolCreateFlags::TRANSIENT)
                .queue_family_index(graphics_queue_family);
            let command_pool = device
                .create_command_pool(&pool_info, None)
                .map_err(|e| BackendError::CommandFailed(e.to_string()))?;

            let allocator = match Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            }) {
                Ok(allocator) => allocator,
                Err(e) => {
                    device.destroy_command_pool(command_pool, None);
                    return Err(BackendError::BufferCreationFailed(e.to_string()));
                }
            };

            let features = instance.get_physical_device_features(physical_device);
            let properties = instance.get_physical_device_properties(physical_device);
            let max_sampler_anisotropy = if features.sampler_anisotropy == vk::TRUE {
                properties.limits.max_sampler_anisotropy
            } else {
                1.0
            };

            log::info!(
                "Vulkan context ready (max sampler anisotropy: {})",
                max_sampler_anisotropy
            );

            Ok(Self {
                instance: instance.clone(),
                physical_device,
                device: device.clone(),
                graphics_queue,
                command_pool,
                allocator: Mutex::new(Some(allocator)),
                max_sampler_anisotropy,
                buffers: Mutex::new(HashMap::new()),
                images: Mutex::new(HashMap::new()),
                image_views: Mutex::new(HashMap::new()),
                samplers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            })
        }
    }

    /// Get the Vulkan instance
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Get the physical device
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Get the logical device
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the graphics queue
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Get the command pool used for transfers
    pub fn command_pool(&self) -> vk::CommandPool {
        self.command_pool
    }

    /// Raw sampler behind a handle
    pub fn raw_sampler(&self, sampler: SamplerHandle) -> Option<vk::Sampler> {
        self.samplers.lock().get(&sampler.0).copied()
    }

    /// Raw image view behind a handle
    pub fn raw_image_view(&self, view: ImageViewHandle) -> Option<vk::ImageView> {
        self.image_views.lock().get(&view.0).copied()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn raw_image(&self, image: ImageHandle) -> BackendResult<vk::Image> {
        self.images
            .lock()
            .get(&image.0)
            .map(|i| i.image)
            .ok_or_else(|| BackendError::InvalidHandle(format!("image {}", image.0)))
    }

    fn raw_buffer(&self, buffer: BufferHandle) -> BackendResult<vk::Buffer> {
        self.buffers
            .lock()
            .get(&buffer.0)
            .map(|b| b.buffer)
            .ok_or_else(|| BackendError::InvalidHandle(format!("buffer {}", buffer.0)))
    }

    fn allocate(&self, desc: &AllocationCreateDesc<'_>) -> BackendResult<Allocation> {
        self.allocator
            .lock()
            .as_mut()
            .ok_or(BackendError::DeviceLost)?
            .allocate(desc)
            .map_err(|e| match e {
                gpu_allocator::AllocationError::OutOfMemory => BackendError::OutOfMemory,
                other => BackendError::BufferCreationFailed(other.to_string()),
            })
    }

    fn free(&self, allocation: Allocation) {
        if let Some(allocator) = self.allocator.lock().as_mut() {
            if let Err(e) = allocator.free(allocation) {
                log::error!("Failed to free GPU allocation: {}", e);
            }
        }
    }

    fn convert_format(format: TextureFormat) -> vk::Format {
        match format {
            TextureFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
            TextureFormat::Rgba8UnormSrgb => vk::Format::R8G8B8A8_SRGB,
            TextureFormat::Depth32Float => vk::Format::D32_SFLOAT,
        }
    }

    fn convert_layout(layout: ImageLayout) -> vk::ImageLayout {
        match layout {
            ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
            ImageLayout::TransferSrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            ImageLayout::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            ImageLayout::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }

    /// Access mask and pipeline stage for work touching an image in `layout`
    fn layout_sync(layout: ImageLayout) -> (vk::AccessFlags, vk::PipelineStageFlags) {
        match layout {
            ImageLayout::Undefined => (vk::AccessFlags::empty(), vk::PipelineStageFlags::TOP_OF_PIPE),
            ImageLayout::TransferSrc => (vk::AccessFlags::TRANSFER_READ, vk::PipelineStageFlags::TRANSFER),
            ImageLayout::TransferDst => (vk::AccessFlags::TRANSFER_WRITE, vk::PipelineStageFlags::TRANSFER),
            ImageLayout::ShaderReadOnly => (
                vk::AccessFlags::SHADER_READ,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
            ),
        }
    }

    fn convert_aspect(aspect: ImageAspect) -> vk::ImageAspectFlags {
        match aspect {
            ImageAspect::Color => vk::ImageAspectFlags::COLOR,
            ImageAspect::Depth => vk::ImageAspectFlags::DEPTH,
        }
    }

    fn convert_filter(mode: FilterMode) -> vk::Filter {
        match mode {
            FilterMode::Nearest => vk::Filter::NEAREST,
            FilterMode::Linear => vk::Filter::LINEAR,
        }
    }

    fn convert_address_mode(mode: AddressMode) -> vk::SamplerAddressMode {
        match mode {
            AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
            AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
            AddressMode::MirrorRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        }
    }

    fn aspect_for(format: TextureFormat) -> vk::ImageAspectFlags {
        if format.is_depth() {
            vk::ImageAspectFlags::DEPTH
        } else {
            vk::ImageAspectFlags::COLOR
        }
    }

    /// Record commands into a one-shot buffer, submit and wait for the queue.
    fn one_shot<F>(&self, record: F) -> BackendResult<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        let err = |e: vk::Result| match e {
            vk::Result::ERROR_DEVICE_LOST => BackendError::DeviceLost,
            vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
                BackendError::OutOfMemory
            }
            other => BackendError::CommandFailed(other.to_string()),
        };

        unsafe {
            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(self.command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let cmd = self.device.allocate_command_buffers(&alloc_info).map_err(err)?[0];

            let result = (|| {
                let begin_info = vk::CommandBufferBeginInfo::default()
                    .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
                self.device.begin_command_buffer(cmd, &begin_info).map_err(err)?;

                record(&self.device, cmd);

                self.device.end_command_buffer(cmd).map_err(err)?;

                let submit_info =
                    vk::SubmitInfo::default().command_buffers(std::slice::from_ref(&cmd));
                self.device
                    .queue_submit(self.graphics_queue, &[submit_info], vk::Fence::null())
                    .map_err(err)?;
                self.device.queue_wait_idle(self.graphics_queue).map_err(err)
            })();

            self.device.free_command_buffers(self.command_pool, &[cmd]);
            result
        }
    }

    fn image_barrier(
        image: vk::Image,
        aspect_mask: vk::ImageAspectFlags,
        base_mip_level: u32,
        level_count: u32,
        old: ImageLayout,
        new: ImageLayout,
    ) -> (vk::ImageMemoryBarrier<'static>, vk::PipelineStageFlags, vk::PipelineStageFlags) {
        let (src_access, src_stage) = Self::layout_sync(old);
        let (dst_access, dst_stage) = Self::layout_sync(new);
        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(Self::convert_layout(old))
            .new_layout(Self::convert_layout(new))
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask,
                base_mip_level,
                level_count,
                base_array_layer: 0,
                layer_count: 1,
            })
            .src_access_mask(src_access)
            .dst_access_mask(dst_access);
        (barrier, src_stage, dst_stage)
    }
}

impl DeviceContext for VulkanContext {
    fn create_buffer(&self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        unsafe {
            let mut usage = vk::BufferUsageFlags::empty();
            if desc.usage.contains(BufferUsage::COPY_SRC) {
                usage |= vk::BufferUsageFlags::TRANSFER_SRC;
            }
            if desc.usage.contains(BufferUsage::COPY_DST) {
                usage |= vk::BufferUsageFlags::TRANSFER_DST;
            }

            let buffer_info = vk::BufferCreateInfo::default()
                .size(desc.size)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = self
                .device
                .create_buffer(&buffer_info, None)
                .map_err(|e| BackendError::BufferCreationFailed(e.to_string()))?;

            let requirements = self.device.get_buffer_memory_requirements(buffer);

            let location = match desc.memory {
                MemoryLocation::HostVisible => gpu_allocator::MemoryLocation::CpuToGpu,
                MemoryLocation::DeviceLocal => gpu_allocator::MemoryLocation::GpuOnly,
            };

            let allocation = match self.allocate(&AllocationCreateDesc {
                name: desc.label.as_deref().unwrap_or("buffer"),
                requirements,
                location,
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            }) {
                Ok(allocation) => allocation,
                Err(e) => {
                    self.device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            if let Err(e) = self
                .device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
            {
                self.device.destroy_buffer(buffer, None);
                self.free(allocation);
                return Err(BackendError::BufferCreationFailed(e.to_string()));
            }

            let id = self.next_id();
            self.buffers.lock().insert(
                id,
                VkBuffer {
                    buffer,
                    allocation,
                    size: desc.size,
                },
            );

            Ok(BufferHandle(id))
        }
    }

    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8]) -> BackendResult<()> {
        let mut buffers = self.buffers.lock();
        let vk_buffer = buffers
            .get_mut(&buffer.0)
            .ok_or_else(|| BackendError::InvalidHandle(format!("buffer {}", buffer.0)))?;

        let start = offset as usize;
        let end = start + data.len();
        if end as u64 > vk_buffer.size {
            return Err(BackendError::InvalidUsage(format!(
                "write of {} bytes at {} overflows buffer of {} bytes",
                data.len(),
                offset,
                vk_buffer.size
            )));
        }

        // Host-visible allocations stay persistently mapped
        let mapped = vk_buffer
            .allocation
            .mapped_slice_mut()
            .ok_or_else(|| BackendError::InvalidUsage("buffer is not host visible".into()))?;
        mapped[start..end].copy_from_slice(data);
        Ok(())
    }

    fn create_image(&self, desc: &ImageDescriptor) -> BackendResult<ImageHandle> {
        unsafe {
            let format = Self::convert_format(desc.format);

            let mut usage = vk::ImageUsageFlags::empty();
            if desc.usage.contains(TextureUsage::COPY_SRC) {
                usage |= vk::ImageUsageFlags::TRANSFER_SRC;
            }
            if desc.usage.contains(TextureUsage::COPY_DST) {
                usage |= vk::ImageUsageFlags::TRANSFER_DST;
            }
            if desc.usage.contains(TextureUsage::TEXTURE_BINDING) {
                usage |= vk::ImageUsageFlags::SAMPLED;
            }

            let tiling = match desc.tiling {
                ImageTiling::Optimal => vk::ImageTiling::OPTIMAL,
                ImageTiling::Linear => vk::ImageTiling::LINEAR,
            };

            let image_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .extent(vk::Extent3D {
                    width: desc.width,
                    height: desc.height,
                    depth: 1,
                })
                .mip_levels(desc.mip_levels)
                .array_layers(1)
                .format(format)
                .tiling(tiling)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .samples(vk::SampleCountFlags::TYPE_1);

            let image = self
                .device
                .create_image(&image_info, None)
                .map_err(|e| BackendError::TextureCreationFailed(e.to_string()))?;

            let requirements = self.device.get_image_memory_requirements(image);

            let location = match desc.memory {
                MemoryLocation::HostVisible => gpu_allocator::MemoryLocation::CpuToGpu,
                MemoryLocation::DeviceLocal => gpu_allocator::MemoryLocation::GpuOnly,
            };

            let allocation = match self.allocate(&AllocationCreateDesc {
                name: desc.label.as_deref().unwrap_or("texture"),
                requirements,
                location,
                linear: desc.tiling == ImageTiling::Linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            }) {
                Ok(allocation) => allocation,
                Err(e) => {
                    self.device.destroy_image(image, None);
                    return Err(e);
                }
            };

            if let Err(e) = self
                .device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
            {
                self.device.destroy_image(image, None);
                self.free(allocation);
                return Err(BackendError::TextureCreationFailed(e.to_string()));
            }

            let id = self.next_id();
            self.images.lock().insert(id, VkImage { image, allocation });

            Ok(ImageHandle(id))
        }
    }

    fn transition_image_layout(
        &self,
        image: ImageHandle,
        format: TextureFormat,
        old: ImageLayout,
        new: ImageLayout,
        mip_levels: u32,
    ) -> BackendResult<()> {
        let raw = self.raw_image(image)?;
        let (barrier, src_stage, dst_stage) =
            Self::image_barrier(raw, Self::aspect_for(format), 0, mip_levels, old, new);

        self.one_shot(|device, cmd| unsafe {
            device.cmd_pipeline_barrier(
                cmd,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        })
    }

    fn copy_buffer_to_image(
        &self,
        buffer: BufferHandle,
        image: ImageHandle,
        width: u32,
        height: u32,
    ) -> BackendResult<()> {
        let raw_buffer = self.raw_buffer(buffer)?;
        let raw_image = self.raw_image(image)?;

        let region = vk::BufferImageCopy::default()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
            .image_extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            });

        self.one_shot(|device, cmd| unsafe {
            device.cmd_copy_buffer_to_image(
                cmd,
                raw_buffer,
                raw_image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        })
    }

    fn generate_mipmaps(
        &self,
        image: ImageHandle,
        format: TextureFormat,
        width: u32,
        height: u32,
        mip_levels: u32,
    ) -> BackendResult<()> {
        let vk_format = Self::convert_format(format);
        let properties = unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, vk_format)
        };
        if !properties
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR)
        {
            return Err(BackendError::UnsupportedFormat(format));
        }

        let raw = self.raw_image(image)?;
        let aspect_mask = Self::aspect_for(format);

        self.one_shot(|device, cmd| unsafe {
            let mut mip_width = width as i32;
            let mut mip_height = height as i32;

            for level in 1..mip_levels {
                let (to_src, src_stage, dst_stage) = Self::image_barrier(
                    raw,
                    aspect_mask,
                    level - 1,
                    1,
                    ImageLayout::TransferDst,
                    ImageLayout::TransferSrc,
                );
                device.cmd_pipeline_barrier(
                    cmd,
                    src_stage,
                    dst_stage,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[to_src],
                );

                let next_width = (mip_width / 2).max(1);
                let next_height = (mip_height / 2).max(1);

                let blit = vk::ImageBlit::default()
                    .src_subresource(vk::ImageSubresourceLayers {
                        aspect_mask,
                        mip_level: level - 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    })
                    .src_offsets([
                        vk::Offset3D { x: 0, y: 0, z: 0 },
                        vk::Offset3D {
                            x: mip_width,
                            y: mip_height,
                            z: 1,
                        },
                    ])
                    .dst_subresource(vk::ImageSubresourceLayers {
                        aspect_mask,
                        mip_level: level,
                        base_array_layer: 0,
                        layer_count: 1,
                    })
                    .dst_offsets([
                        vk::Offset3D { x: 0, y: 0, z: 0 },
                        vk::Offset3D {
                            x: next_width,
                            y: next_height,
                            z: 1,
                        },
                    ]);

                device.cmd_blit_image(
                    cmd,
                    raw,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    raw,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[blit],
                    vk::Filter::LINEAR,
                );

                let (to_read, src_stage, dst_stage) = Self::image_barrier(
                    raw,
                    aspect_mask,
                    level - 1,
                    1,
                    ImageLayout::TransferSrc,
                    ImageLayout::ShaderReadOnly,
                );
                device.cmd_pipeline_barrier(
                    cmd,
                    src_stage,
                    dst_stage,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[to_read],
                );

                mip_width = next_width;
                mip_height = next_height;
            }

            // The last level was only ever a blit destination
            let (last, src_stage, dst_stage) = Self::image_barrier(
                raw,
                aspect_mask,
                mip_levels - 1,
                1,
                ImageLayout::TransferDst,
                ImageLayout::ShaderReadOnly,
            );
            device.cmd_pipeline_barrier(
                cmd,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[last],
            );
        })
    }

    fn create_image_view(
        &self,
        image: ImageHandle,
        format: TextureFormat,
        aspect: ImageAspect,
        mip_levels: u32,
    ) -> BackendResult<ImageViewHandle> {
        let raw = self.raw_image(image)?;

        let view_info = vk::ImageViewCreateInfo::default()
            .image(raw)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(Self::convert_format(format))
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: Self::convert_aspect(aspect),
                base_mip_level: 0,
                level_count: mip_levels,
                base_array_layer: 0,
                layer_count: 1,
            });

        let view = unsafe {
            self.device
                .create_image_view(&view_info, None)
                .map_err(|e| BackendError::TextureCreationFailed(e.to_string()))?
        };

        let id = self.next_id();
        self.image_views.lock().insert(id, view);

        Ok(ImageViewHandle(id))
    }

    fn create_sampler(&self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        let anisotropy = desc
            .max_anisotropy
            .map(|requested| requested.min(self.max_sampler_anisotropy))
            .filter(|clamped| *clamped > 1.0);

        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(Self::convert_filter(desc.mag_filter))
            .min_filter(Self::convert_filter(desc.min_filter))
            .mipmap_mode(match desc.mipmap_filter {
                FilterMode::Nearest => vk::SamplerMipmapMode::NEAREST,
                FilterMode::Linear => vk::SamplerMipmapMode::LINEAR,
            })
            .address_mode_u(Self::convert_address_mode(desc.address_mode_u))
            .address_mode_v(Self::convert_address_mode(desc.address_mode_v))
            .address_mode_w(Self::convert_address_mode(desc.address_mode_w))
            .anisotropy_enable(anisotropy.is_some())
            .max_anisotropy(anisotropy.unwrap_or(1.0))
            .compare_enable(false)
            .mip_lod_bias(0.0)
            .min_lod(desc.lod_min_clamp)
            .max_lod(desc.lod_max_clamp)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false);

        let sampler = unsafe {
            self.device
                .create_sampler(&sampler_info, None)
                .map_err(|e| BackendError::SamplerCreationFailed(e.to_string()))?
        };

        let id = self.next_id();
        self.samplers.lock().insert(id, sampler);

        Ok(SamplerHandle(id))
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        let removed = self.buffers.lock().remove(&buffer.0);
        if let Some(vk_buffer) = removed {
            unsafe {
                self.device.destroy_buffer(vk_buffer.buffer, None);
            }
            self.free(vk_buffer.allocation);
        }
    }

    fn destroy_image(&self, image: ImageHandle) {
        let removed = self.images.lock().remove(&image.0);
        if let Some(vk_image) = removed {
            unsafe {
                self.device.destroy_image(vk_image.image, None);
            }
            self.free(vk_image.allocation);
        }
    }

    fn destroy_image_view(&self, view: ImageViewHandle) {
        if let Some(raw) = self.image_views.lock().remove(&view.0) {
            unsafe {
                self.device.destroy_image_view(raw, None);
            }
        }
    }

    fn destroy_sampler(&self, sampler: SamplerHandle) {
        if let Some(raw) = self.samplers.lock().remove(&sampler.0) {
            unsafe {
                self.device.destroy_sampler(raw, None);
            }
        }
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            let leaked = self.buffers.lock().len()
                + self.images.lock().len()
                + self.image_views.lock().len()
                + self.samplers.lock().len();
            if leaked > 0 {
                log::warn!("VulkanContext dropped with {} live resources", leaked);
            }

            for (_, sampler) in self.samplers.lock().drain() {
                self.device.destroy_sampler(sampler, None);
            }

            for (_, view) in self.image_views.lock().drain() {
                self.device.destroy_image_view(view, None);
            }

            let buffers: Vec<VkBuffer> = self.buffers.lock().drain().map(|(_, b)| b).collect();
            for buffer in buffers {
                self.device.destroy_buffer(buffer.buffer, None);
                self.free(buffer.allocation);
            }

            let images: Vec<VkImage> = self.images.lock().drain().map(|(_, i)| i).collect();
            for image in images {
                self.device.destroy_image(image.image, None);
                self.free(image.allocation);
            }

            // The allocator must go before the device does
            drop(self.allocator.lock().take());

            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}
