//! Shared fixtures for residency integration tests.

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use scene_assets::backend::DeviceCall;
use scene_assets::{CacheConfig, DummyContext, DummyDisplay, ResourceCache};

/// Create/destroy pairs tracked by the dummy context
pub const RESOURCE_CALLS: [(DeviceCall, DeviceCall); 4] = [
    (DeviceCall::CreateBuffer, DeviceCall::DestroyBuffer),
    (DeviceCall::CreateImage, DeviceCall::DestroyImage),
    (DeviceCall::CreateImageView, DeviceCall::DestroyImageView),
    (DeviceCall::CreateSampler, DeviceCall::DestroySampler),
];

/// A cache bound to fresh dummy device and display contexts.
pub struct TestContext {
    pub device: Arc<DummyContext>,
    pub display: Arc<DummyDisplay>,
    pub cache: ResourceCache,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    pub fn with_config(config: CacheConfig) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let device = Arc::new(DummyContext::new());
        let display = Arc::new(DummyDisplay::new());
        let mut cache = ResourceCache::new(config);
        cache.bind_context(&device);
        cache.bind_display(&display);

        Self {
            device,
            display,
            cache,
        }
    }

    /// Assert every created device object has been destroyed
    pub fn assert_balanced(&self) {
        assert_balanced(&self.device);
    }
}

pub fn assert_balanced(device: &DummyContext) {
    for (create, destroy) in RESOURCE_CALLS {
        assert_eq!(
            device.call_count(create),
            device.call_count(destroy),
            "{create:?} and {destroy:?} counts differ"
        );
    }
    assert_eq!(device.live_resources(), 0);
}

/// A temp file path, removed again when dropped
pub struct FileFixture {
    path: String,
}

impl FileFixture {
    fn unique(suffix: &str) -> PathBuf {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        std::env::temp_dir().join(format!(
            "scene_assets_it_{}_{}{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed),
            suffix
        ))
    }

    fn at(path: PathBuf) -> Self {
        Self {
            path: path.to_string_lossy().into_owned(),
        }
    }

    /// A path that is never written
    pub fn missing(name: &str) -> Self {
        Self::at(Self::unique(&format!("_missing/{name}")))
    }
}

impl Deref for FileFixture {
    type Target = str;

    fn deref(&self) -> &str {
        &self.path
    }
}

impl AsRef<Path> for FileFixture {
    fn as_ref(&self) -> &Path {
        Path::new(&self.path)
    }
}

impl Drop for FileFixture {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Write a PNG of the given size to the temp dir
pub fn png_fixture(width: u32, height: u32) -> FileFixture {
    let path = FileFixture::unique(".png");
    image::RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    })
    .save(&path)
    .unwrap();
    FileFixture::at(path)
}

/// A file that exists but is not an image
pub fn garbage_fixture() -> FileFixture {
    let path = FileFixture::unique("_garbage.png");
    std::fs::write(&path, b"definitely not a png").unwrap();
    FileFixture::at(path)
}
