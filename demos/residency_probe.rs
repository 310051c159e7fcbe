//! Headless residency probe
//!
//! Loads textures through a [`ResourceCache`] bound to the dummy device
//! context and reports what ended up resident and which device calls ran.
//!
//! Run with:
//!   cargo run --example residency_probe -- assets/brick.png assets/brick.png
//!   cargo run --example residency_probe -- --lazy --ui assets/*.png

use std::sync::Arc;

use clap::Parser;
use scene_assets::backend::DeviceCall;
use scene_assets::{
    CacheConfig, DummyContext, DummyDisplay, ResourceCache, Texture, TextureSlot,
};

#[derive(Parser, Debug)]
#[command(
    name = "residency_probe",
    about = "Load textures through the resource cache and report their residency",
    version
)]
struct Args {
    /// Image files to load. Repeated paths share one texture.
    #[arg(required = true)]
    paths: Vec<String>,

    /// Decode only; upload on first GPU access
    #[arg(long)]
    lazy: bool,

    /// Register every texture for display in the inspector UI
    #[arg(long)]
    ui: bool,

    /// Keep decoded pixels after upload
    #[arg(long)]
    retain_pixels: bool,

    /// Maximum sampler anisotropy
    #[arg(long, default_value_t = 16.0)]
    anisotropy: f32,
}

const REPORTED_CALLS: [DeviceCall; 8] = [
    DeviceCall::CreateSampler,
    DeviceCall::CreateBuffer,
    DeviceCall::CreateImage,
    DeviceCall::TransitionLayout,
    DeviceCall::CopyBufferToImage,
    DeviceCall::GenerateMipmaps,
    DeviceCall::CreateImageView,
    DeviceCall::DestroyBuffer,
];

fn describe(path: &str, texture: &Texture) {
    let residency = texture.residency();
    let size = texture
        .info()
        .map(|info| format!("{}x{} ({} mips)", info.width, info.height, info.mip_levels))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  {:<40} {:<20} cpu={:<5} gpu={:<5} ui={}",
        path, size, residency.cpu, residency.gpu, residency.ui
    );
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let config = CacheConfig::default()
        .with_max_anisotropy(args.anisotropy)
        .with_retained_cpu_pixels(args.retain_pixels);

    let context = Arc::new(DummyContext::new());
    let display = Arc::new(DummyDisplay::new());
    let mut cache = ResourceCache::new(config);
    cache.bind_context(&context);
    cache.bind_display(&display);

    println!("Residency probe ({})", context.name());
    println!("Mode: {}", if args.lazy { "lazy" } else { "instant" });
    println!();

    let material = cache.create_material("probe");
    let mut failed = 0;

    for path in &args.paths {
        let result = if args.lazy {
            cache.load_texture_lazily(path)
        } else {
            cache.load_texture_instantly(path)
        };

        let texture = match result {
            Ok(texture) => texture,
            Err(e) => {
                log::error!("{}: {}", path, e);
                failed += 1;
                continue;
            }
        };
        material.write().set_texture(TextureSlot::BaseColor, &texture);

        if args.ui {
            if let Err(e) = texture.display_handle() {
                log::error!("{}: display registration failed: {}", path, e);
            }
        }
    }

    let fallback = cache.default_texture();
    let albedo = material.read().texture_or(TextureSlot::BaseColor, &fallback);
    if Arc::ptr_eq(&albedo, &fallback) {
        println!("No texture loaded, material falls back to the default checkerboard");
    }

    println!("Textures:");
    for (path, texture) in cache.textures() {
        describe(path, texture);
    }
    println!();
    println!(
        "{} requested, {} cached, {} failed, {} GPU-resident",
        args.paths.len(),
        cache.texture_count(),
        failed,
        cache.gpu_resident_count()
    );

    println!();
    println!("Device calls:");
    for call in REPORTED_CALLS {
        println!("  {:<20} {}", format!("{call:?}"), context.call_count(call));
    }
    println!("  {:<20} {}", "DisplayHandles", display.live_handles());

    let released = cache.release_gpu_resources();
    println!();
    println!(
        "Released {} textures, {} device objects still live",
        released,
        context.live_resources()
    );
}
