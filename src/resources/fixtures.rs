//! Image files written to the temp dir for tests

use std::ops::Deref;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A PNG in `temp_dir()`, removed again when dropped
pub struct PngFixture {
    path: String,
}

impl PngFixture {
    pub fn new(width: u32, height: u32) -> Self {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let path: PathBuf = std::env::temp_dir().join(format!(
            "scene_assets_unit_{}_{}.png",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        image::RgbaImage::from_pixel(width, height, image::Rgba([200, 100, 50, 255]))
            .save(&path)
            .unwrap();
        Self {
            path: path.to_string_lossy().into_owned(),
        }
    }
}

impl Deref for PngFixture {
    type Target = str;

    fn deref(&self) -> &str {
        &self.path
    }
}

impl Drop for PngFixture {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_fixture_is_removed_on_drop() {
        let fixture = PngFixture::new(2, 2);
        let path = fixture.to_string();
        assert!(Path::new(&path).exists());

        drop(fixture);
        assert!(!Path::new(&path).exists());
    }
}
