//! # PBR Spheres
//!
//! Runs the 5x5 metallic/roughness sphere grid on the headless device for a
//! fixed number of frames, orbiting the camera with a simulated mouse drag,
//! and logs per-frame statistics.
//!
//! ```bash
//! cargo run --example pbr_spheres -- --frames 120 --environment assets/ibl
//! RUST_LOG=debug cargo run --example pbr_spheres -- --lights 2 --no-ibl
//! ```

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use glam::Vec3;
use glint::{Engine, EngineConfig, EnvironmentPaths, HeadlessDevice, InputState};

/// Headless PBR sphere grid.
#[derive(Parser, Debug)]
#[command(name = "pbr_spheres", about = "Render the PBR sphere grid headlessly")]
struct Args {
    /// Number of frames to render
    #[arg(long, default_value = "60")]
    frames: u64,

    /// Drawing buffer width
    #[arg(long, default_value = "1280")]
    width: u32,

    /// Drawing buffer height
    #[arg(long, default_value = "720")]
    height: u32,

    /// Active point lights (0-4)
    #[arg(long, default_value = "4")]
    lights: u32,

    /// Sphere tessellation in both directions
    #[arg(long, default_value = "20")]
    segments: u32,

    /// Directory holding diffuse-RGBM.png, specular-RGBM.png and brdf-lut.png
    #[arg(long)]
    environment: Option<PathBuf>,

    /// Disable image-based lighting
    #[arg(long)]
    no_ibl: bool,

    /// Override the albedo of every sphere, as `r,g,b` in 0-1
    #[arg(long, value_delimiter = ',', num_args = 3)]
    albedo: Option<Vec<f32>>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    log::info!("Glint v{} - PBR spheres", glint::VERSION);

    let config = EngineConfig {
        width: args.width,
        height: args.height,
        sphere_segments: args.segments,
        ..Default::default()
    };
    let mut engine = match Engine::new(HeadlessDevice::new(), config) {
        Ok(engine) => engine,
        Err(err) => {
            log::error!("Failed to create engine: {err}");
            std::process::exit(1);
        }
    };
    if let Err(err) = engine.init() {
        log::error!("Failed to initialize scene: {err}");
        std::process::exit(1);
    }

    engine.toggles.active_lights = args.lights.min(4);
    engine.toggles.ibl_diffuse = !args.no_ibl;
    engine.toggles.ibl_specular = !args.no_ibl;
    if let Some(rgb) = args.albedo.as_deref() {
        engine.toggles.albedo = Some(Vec3::from_slice(rgb));
    }
    if let Some(dir) = &args.environment {
        engine.request_environment(&EnvironmentPaths::in_dir(dir));
    }

    // Drag horizontally across the middle of the viewport, one full sweep
    // over the run.
    let mut input = InputState::new(args.height);
    let y = args.height as f32 * 0.5;
    let step = args.width as f32 / args.frames.max(1) as f32;
    input.on_cursor_moved(0.0, y);
    input.end_frame();
    input.on_mouse_button(true);

    let start = Instant::now();
    let mut last = start;
    for frame in 0..args.frames {
        input.on_cursor_moved((frame + 1) as f32 * step, y);

        let now = Instant::now();
        engine.update(&input, (now - last).as_secs_f32());
        last = now;
        input.end_frame();

        let stats = engine.render();
        log::debug!(
            "Frame {frame}: {} objects, {} draws, {} skipped, {} textures, {} rejected uniforms",
            stats.objects,
            stats.draw_calls,
            stats.draws_skipped,
            stats.textures_bound,
            stats.uniforms_rejected
        );
    }
    input.on_mouse_button(false);

    let device = engine.context().device();
    let camera = engine.camera().position();
    log::info!(
        "Rendered {} frames in {:.2?}: {} draw calls, camera at ({:.2}, {:.2}, {:.2})",
        args.frames,
        start.elapsed(),
        device.draws().len(),
        camera.x,
        camera.y,
        camera.z
    );
    if engine.pending_environment_maps() > 0 {
        log::warn!(
            "{} environment maps still loading",
            engine.pending_environment_maps()
        );
    }
    for error in device.errors() {
        log::warn!("Device error: {error}");
    }

    engine.destroy();
}
