//! Common types shared between device contexts

/// Pixel formats an image can be created with.
/// Decoded textures are always uploaded as 8-bit sRGB RGBA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Depth32Float,
}

impl TextureFormat {
    pub fn is_depth(&self) -> bool {
        matches!(self, TextureFormat::Depth32Float)
    }
}

/// Image usage flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureUsage(u32);

impl TextureUsage {
    /// Source of the mip blits
    pub const COPY_SRC: Self = Self(1 << 0);
    /// Destination of the staging copy and the mip blits
    pub const COPY_DST: Self = Self(1 << 1);
    /// Sampled from shaders
    pub const TEXTURE_BINDING: Self = Self(1 << 2);

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for TextureUsage {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Buffer usage flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferUsage(u32);

impl BufferUsage {
    pub const MAP_WRITE: Self = Self(1 << 0);
    pub const COPY_SRC: Self = Self(1 << 1);
    pub const COPY_DST: Self = Self(1 << 2);

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for BufferUsage {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Where the memory backing a resource lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryLocation {
    /// Host visible and coherent, used for staging
    HostVisible,
    /// Device local, not mappable
    DeviceLocal,
}

/// Image tiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageTiling {
    Optimal,
    Linear,
}

/// Image layouts the upload path moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    Undefined,
    TransferSrc,
    TransferDst,
    ShaderReadOnly,
}

/// Image aspect selected by a view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageAspect {
    Color,
    Depth,
}

/// Parameters of [`DeviceContext::create_image`](super::DeviceContext::create_image)
#[derive(Debug, Clone)]
pub struct ImageDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub format: TextureFormat,
    pub tiling: ImageTiling,
    pub usage: TextureUsage,
    pub memory: MemoryLocation,
}

impl Default for ImageDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            width: 1,
            height: 1,
            mip_levels: 1,
            format: TextureFormat::Rgba8Unorm,
            tiling: ImageTiling::Optimal,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
            memory: MemoryLocation::DeviceLocal,
        }
    }
}

/// Buffer descriptor
#[derive(Debug, Clone)]
pub struct BufferDescriptor {
    pub label: Option<String>,
    pub size: u64,
    pub usage: BufferUsage,
    pub memory: MemoryLocation,
}

impl BufferDescriptor {
    /// Host-visible transfer source sized for `size` bytes
    pub fn staging(label: Option<String>, size: u64) -> Self {
        Self {
            label,
            size,
            usage: BufferUsage::COPY_SRC | BufferUsage::MAP_WRITE,
            memory: MemoryLocation::HostVisible,
        }
    }
}

/// Filter mode for samplers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// Address mode for samplers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    ClampToEdge,
    Repeat,
    MirrorRepeat,
}

/// Sampler descriptor
#[derive(Debug, Clone)]
pub struct SamplerDescriptor {
    pub label: Option<String>,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub mipmap_filter: FilterMode,
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
    pub address_mode_w: AddressMode,
    /// `None` disables anisotropic filtering
    pub max_anisotropy: Option<f32>,
    pub lod_min_clamp: f32,
    pub lod_max_clamp: f32,
}

impl SamplerDescriptor {
    /// Linear, repeating, anisotropic sampler covering `mip_levels` levels
    pub fn mipmapped(label: Option<String>, mip_levels: u32, max_anisotropy: f32) -> Self {
        Self {
            label,
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::Repeat,
            address_mode_w: AddressMode::Repeat,
            max_anisotropy: Some(max_anisotropy),
            lod_max_clamp: mip_levels as f32,
            ..Default::default()
        }
    }
}

impl Default for SamplerDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Linear,
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            max_anisotropy: None,
            lod_min_clamp: 0.0,
            lod_max_clamp: 0.0,
        }
    }
}
