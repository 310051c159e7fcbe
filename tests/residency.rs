//! Residency and cache integration tests.
//!
//! Everything runs against the dummy device context, which tracks every
//! create/destroy call and simulates image layouts, so leaks and out-of-order
//! uploads show up as assertion failures.

mod common;

use std::sync::Arc;

use rstest::rstest;

use common::{assert_balanced, garbage_fixture, png_fixture, FileFixture, TestContext};
use scene_assets::backend::{DeviceCall, ImageLayout};
use scene_assets::resources::{Residency, TextureData};
use scene_assets::{CacheConfig, DummyContext, ResidencyError, ResourceCache, TextureSlot};

// ============================================================================
// Cache Identity
// ============================================================================

#[rstest]
#[case::lazy_then_instant(true, false)]
#[case::instant_then_lazy(false, true)]
#[case::lazy_twice(true, true)]
#[case::instant_twice(false, false)]
fn test_same_path_returns_same_instance(#[case] first_lazy: bool, #[case] second_lazy: bool) {
    let mut t = TestContext::new();
    let path = png_fixture(32, 16);

    let mut load = |lazy: bool| {
        if lazy {
            t.cache.load_texture_lazily(&path).unwrap()
        } else {
            t.cache.load_texture_instantly(&path).unwrap()
        }
    };
    let first = load(first_lazy);
    let second = load(second_lazy);

    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first, &t.cache.texture(&path).unwrap()));
    assert_eq!(t.cache.texture_count(), 1);
}

#[test]
fn test_many_materials_one_upload() {
    let mut t = TestContext::new();
    let path = png_fixture(64, 64);

    for i in 0..8 {
        let material = t.cache.create_material(&format!("material_{i}"));
        let texture = t.cache.load_texture_lazily(&path).unwrap();
        material.write().set_texture(TextureSlot::BaseColor, &texture);
    }
    for i in 0..8 {
        let material = t.cache.material(&format!("material_{i}")).unwrap();
        let texture = material.read().texture(TextureSlot::BaseColor).unwrap();
        texture.image_view().unwrap();
    }

    assert_eq!(t.device.call_count(DeviceCall::CreateImage), 1);
    assert_eq!(t.device.call_count(DeviceCall::GenerateMipmaps), 1);
    assert_eq!(t.cache.material_count(), 8);
}

// ============================================================================
// Residency State Machine
// ============================================================================

#[test]
fn test_cpu_then_gpu_releases_pixels() {
    let t = TestContext::new();
    let texture = t.cache.default_texture();
    let path = png_fixture(16, 16);

    texture.load_to_cpu(&path).unwrap();
    texture.load_to_gpu().unwrap();

    assert_eq!(
        texture.residency(),
        Residency {
            cpu: false,
            gpu: true,
            ui: false
        }
    );

    t.device.reset_calls();
    texture.load_to_gpu().unwrap();
    assert!(t.device.calls().is_empty());
}

#[test]
fn test_get_image_runs_exactly_one_upload() {
    let mut t = TestContext::new();
    let texture = t.cache.load_texture_lazily(&png_fixture(8, 4)).unwrap();
    assert!(!texture.is_gpu_resident());

    let image = texture.image().unwrap();
    texture.image().unwrap();
    texture.sampler().unwrap();

    assert_eq!(t.device.call_count(DeviceCall::CreateSampler), 1);
    assert_eq!(t.device.call_count(DeviceCall::CreateImage), 1);
    assert_eq!(t.device.call_count(DeviceCall::CopyBufferToImage), 1);
    assert_eq!(t.device.image_layout(image), Some(ImageLayout::ShaderReadOnly));
    assert_eq!(t.device.live_buffers(), 0);
}

#[test]
fn test_load_to_gpu_without_cpu_data() {
    let t = TestContext::new();
    let texture = t.cache.empty_texture();
    texture.load_to_gpu().unwrap();
    texture.unload_gpu();

    let err = texture.load_to_gpu().unwrap_err();

    assert!(matches!(err, ResidencyError::Precondition(_)));
    assert!(texture.residency().is_empty());
}

#[test]
fn test_mip_levels_of_non_power_of_two() {
    let mut t = TestContext::new();
    let texture = t.cache.load_texture_lazily(&png_fixture(257, 100)).unwrap();

    assert_eq!(texture.info().unwrap().mip_levels, 9);
}

#[rstest]
#[case::missing(FileFixture::missing("texture.png"))]
#[case::corrupt(garbage_fixture())]
fn test_decode_failure(#[case] path: FileFixture) {
    let mut t = TestContext::new();

    let err = t.cache.load_texture_instantly(&path).unwrap_err();

    assert!(matches!(err, ResidencyError::Decode { .. }));
    assert!(t.cache.texture(&path).is_none());
    assert!(t.device.calls().is_empty());
}

#[test]
fn test_ui_registration() {
    let mut t = TestContext::new();
    let texture = t.cache.load_texture_lazily(&png_fixture(8, 8)).unwrap();

    let handle = texture.display_handle().unwrap();

    assert!(texture.is_gpu_resident());
    assert!(texture.is_ui_registered());
    assert_eq!(texture.display_handle().unwrap(), handle);
    assert_eq!(
        t.display.lookup(handle),
        Some((texture.sampler().unwrap(), texture.image_view().unwrap()))
    );
    assert_eq!(egui::TextureId::from(handle), egui::TextureId::User(handle.raw()));

    texture.unload_gpu();
    assert!(!t.display.is_registered(handle));
    assert!(!texture.is_ui_registered());
}

// ============================================================================
// Device Object Lifetime
// ============================================================================

#[test]
fn test_reload_cycle_returns_to_baseline() {
    let mut t = TestContext::new();
    let path = png_fixture(32, 32);

    let texture = t.cache.load_texture_instantly(&path).unwrap();
    let baseline = t.device.live_resources();
    let first_image = texture.image().unwrap();

    texture.full_load(&path).unwrap();
    assert_eq!(t.device.live_resources(), baseline);
    assert!(!t.device.is_live_image(first_image));

    texture.reload().unwrap();
    assert_eq!(t.device.live_resources(), baseline);
    assert_eq!(t.device.call_count(DeviceCall::CreateImage), 3);
    assert_eq!(t.device.call_count(DeviceCall::DestroyImage), 2);
}

#[test]
fn test_failed_upload_keeps_nothing() {
    let mut t = TestContext::new();
    t.device.fail_on(DeviceCall::GenerateMipmaps);

    let err = t.cache.load_texture_instantly(&png_fixture(16, 16)).unwrap_err();

    assert!(matches!(err, ResidencyError::DeviceResource(_)));
    assert_eq!(t.cache.texture_count(), 0);
    t.assert_balanced();
}

#[rstest]
#[case::sampler(DeviceCall::CreateSampler)]
#[case::staging(DeviceCall::CreateBuffer)]
fn test_upload_retry_after_early_failure(#[case] failing: DeviceCall) {
    let mut t = TestContext::new();
    let texture = t.cache.load_texture_lazily(&png_fixture(16, 16)).unwrap();
    t.device.fail_on(failing);

    assert!(matches!(texture.image(), Err(ResidencyError::DeviceResource(_))));
    assert!(texture.is_cpu_resident());
    t.assert_balanced();

    t.device.clear_failures();
    texture.image().unwrap();
    assert!(texture.is_gpu_resident());
}

#[test]
fn test_drop_cache_destroys_everything() {
    let mut t = TestContext::new();
    t.cache.load_texture_instantly(&png_fixture(16, 16)).unwrap();
    t.cache
        .load_texture_lazily(&png_fixture(8, 8))
        .unwrap()
        .display_handle()
        .unwrap();
    t.cache.default_texture().image().unwrap();
    t.cache.empty_texture().image().unwrap();
    assert_eq!(t.cache.gpu_resident_count(), 4);

    let TestContext {
        device,
        display,
        cache,
    } = t;
    drop(cache);

    assert_balanced(&device);
    assert_eq!(display.live_handles(), 0);
}

#[test]
fn test_rebind_context_destroys_through_old_context() {
    let mut t = TestContext::new();
    let path = png_fixture(16, 16);
    let texture = t.cache.load_texture_instantly(&path).unwrap();

    let replacement = Arc::new(DummyContext::new());
    t.cache.bind_context(&replacement);

    t.assert_balanced();
    assert!(!texture.is_gpu_resident());

    // Re-uploading goes to the new context
    texture.reload().unwrap();
    assert_eq!(replacement.live_resources(), 3);
    assert_eq!(t.device.live_resources(), 0);
}

#[test]
fn test_context_dropped_before_cache() {
    let mut t = TestContext::new();
    let texture = t.cache.load_texture_lazily(&png_fixture(4, 4)).unwrap();

    let TestContext { device, cache, .. } = t;
    drop(device);

    assert!(!cache.has_context());
    assert!(matches!(texture.image(), Err(ResidencyError::ContextExpired)));
    assert!(texture.is_cpu_resident());
}

#[test]
fn test_unbound_cache_fails_cleanly() {
    let mut cache = ResourceCache::default();
    let path = png_fixture(4, 4);

    let texture = cache.load_texture_lazily(&path).unwrap();

    assert!(matches!(texture.image(), Err(ResidencyError::ContextUnbound)));
    assert!(matches!(texture.display_handle(), Err(ResidencyError::DisplayUnavailable)));
    assert!(texture.is_cpu_resident());
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_retained_pixels_rebuild_without_decode() {
    let mut t = TestContext::with_config(CacheConfig::default().with_retained_cpu_pixels(true));
    let path = png_fixture(16, 16);
    let texture = t.cache.load_texture_instantly(&path).unwrap();
    assert!(texture.is_cpu_resident());

    t.cache.release_gpu_resources();
    std::fs::remove_file(&path).unwrap();

    texture.image().unwrap();
    assert_eq!(t.device.call_count(DeviceCall::CreateImage), 2);
}

#[test]
fn test_custom_builtin_textures() {
    let config = CacheConfig::default()
        .with_default_texture(16, [[255, 255, 255, 255], [0, 0, 0, 255]])
        .with_empty_texture_color([10, 20, 30, 40]);
    let t = TestContext::with_config(config);

    let default = t.cache.default_texture().info().unwrap();
    assert_eq!((default.width, default.height, default.mip_levels), (16, 16, 5));
    let empty = t.cache.empty_texture().info().unwrap();
    assert_eq!((empty.width, empty.height, empty.mip_levels), (1, 1, 1));
}

#[test]
fn test_material_falls_back_to_placeholder() {
    let mut t = TestContext::new();
    let material = t.cache.create_material("missing_albedo");
    let path = "/no/such/albedo.png";

    if let Ok(texture) = t.cache.load_texture_lazily(path) {
        material.write().set_texture(TextureSlot::BaseColor, &texture);
    }

    let fallback = t.cache.default_texture();
    let resolved = material.read().texture_or(TextureSlot::BaseColor, &fallback);
    assert!(Arc::ptr_eq(&resolved, &fallback));

    let data = TextureData::solid_color([1, 2, 3, 4]);
    resolved.load_from_data(data);
    assert_eq!(resolved.info().unwrap().size, 4);
}
