//! Non-owning link from textures to the device context and UI registry
//!
//! The cache and every texture it creates share one [`ContextBinding`].
//! Neither the device context nor the display registry is kept alive by it:
//! each use upgrades the weak reference and fails cleanly when the owner is gone.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::error::{ResidencyError, ResidencyResult};
use crate::backend::DeviceContext;
use crate::egui_integration::DisplayRegistry;

#[derive(Default)]
pub struct ContextBinding {
    device: RwLock<Option<Weak<dyn DeviceContext>>>,
    display: RwLock<Option<Weak<dyn DisplayRegistry>>>,
}

impl ContextBinding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind_device<C: DeviceContext + 'static>(&self, device: &Arc<C>) {
        let device: Arc<dyn DeviceContext> = device.clone();
        *self.device.write() = Some(Arc::downgrade(&device));
    }

    pub fn unbind_device(&self) {
        *self.device.write() = None;
    }

    /// Whether `device` is the context currently bound
    pub fn is_bound_to<C: DeviceContext + 'static>(&self, device: &Arc<C>) -> bool {
        self.device
            .read()
            .as_ref()
            .is_some_and(|bound| Weak::as_ptr(bound) as *const () == Arc::as_ptr(device) as *const ())
    }

    /// Whether a context was bound and has not been dropped since
    pub fn is_device_alive(&self) -> bool {
        self.device().is_ok()
    }

    /// Upgrade the bound device context for one use
    pub fn device(&self) -> ResidencyResult<Arc<dyn DeviceContext>> {
        match self.device.read().as_ref() {
            None => Err(ResidencyError::ContextUnbound),
            Some(weak) => weak.upgrade().ok_or(ResidencyError::ContextExpired),
        }
    }

    pub fn bind_display<D: DisplayRegistry + 'static>(&self, display: &Arc<D>) {
        let display: Arc<dyn DisplayRegistry> = display.clone();
        *self.display.write() = Some(Arc::downgrade(&display));
    }

    pub fn is_display_bound_to<D: DisplayRegistry + 'static>(&self, display: &Arc<D>) -> bool {
        self.display
            .read()
            .as_ref()
            .is_some_and(|bound| Weak::as_ptr(bound) as *const () == Arc::as_ptr(display) as *const ())
    }

    /// Upgrade the bound display registry for one use
    pub fn display(&self) -> ResidencyResult<Arc<dyn DisplayRegistry>> {
        self.display
            .read()
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or(ResidencyError::DisplayUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyContext;

    #[test]
    fn test_unbound_then_expired() {
        let binding = ContextBinding::new();
        assert!(matches!(binding.device(), Err(ResidencyError::ContextUnbound)));

        let ctx = Arc::new(DummyContext::new());
        binding.bind_device(&ctx);
        assert!(binding.is_bound_to(&ctx));
        assert!(binding.is_device_alive());

        drop(ctx);
        assert!(matches!(binding.device(), Err(ResidencyError::ContextExpired)));
    }

    #[test]
    fn test_binding_does_not_own_context() {
        let binding = ContextBinding::new();
        let ctx = Arc::new(DummyContext::new());
        binding.bind_device(&ctx);
        assert_eq!(Arc::strong_count(&ctx), 1);

        let other = Arc::new(DummyContext::new());
        assert!(!binding.is_bound_to(&other));
    }
}
