//! egui GUI integration
//!
//! Textures become displayable in the inspector once their sampler/view pair is
//! registered with the UI layer, which answers with an opaque [`DisplayHandle`].

mod vulkan;

pub use self::vulkan::VulkanEguiIntegration;

use crate::backend::{BackendResult, ImageLayout, ImageViewHandle, SamplerHandle};

/// Opaque id of a texture registered with the UI layer.
///
/// Only valid for the GPU objects it was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayHandle(pub(crate) u64);

impl DisplayHandle {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<DisplayHandle> for egui::TextureId {
    fn from(handle: DisplayHandle) -> Self {
        egui::TextureId::User(handle.0)
    }
}

/// UI-side registry of displayable textures.
pub trait DisplayRegistry {
    /// Register a sampler/view pair whose image is in `layout`
    fn register_texture(
        &self,
        sampler: SamplerHandle,
        view: ImageViewHandle,
        layout: ImageLayout,
    ) -> BackendResult<DisplayHandle>;

    /// Drop a previous registration. Unknown handles are ignored.
    fn unregister_texture(&self, handle: DisplayHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_handle_to_egui() {
        let id: egui::TextureId = DisplayHandle(7).into();
        assert_eq!(id, egui::TextureId::User(7));
    }
}
