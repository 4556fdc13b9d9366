//! # Glint
//!
//! GPU resource cache and draw dispatcher for physically-based scenes on
//! OpenGL ES 3 / WebGL2 style devices.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`Device`] - GL-shaped device trait, implemented by [`HeadlessDevice`]
//!   (records everything, used by tests) and `GlowDevice` (real contexts)
//! - [`RenderContext`] - caches geometries, programs and textures against
//!   their descriptors and dispatches draw calls with typed uniform upload
//! - [`resources`] - CPU-side geometry, shader, texture and material data
//! - [`shader`] - define expansion and the built-in PBR and skybox shaders
//! - [`scene`] and [`Engine`] - the sphere-grid scene and its frame loop
//!
//! ## Example
//!
//! ```
//! use glint::{Engine, EngineConfig, HeadlessDevice};
//!
//! let mut engine = Engine::new(HeadlessDevice::new(), EngineConfig::default()).unwrap();
//! engine.init().unwrap();
//! let stats = engine.render();
//! assert_eq!(stats.draw_calls, 25);
//! ```

pub mod backend;
pub mod context;
pub mod engine;
pub mod input;
pub mod resources;
pub mod scene;
pub mod shader;

// Re-export main types for convenience
pub use backend::{BackendError, Device, HeadlessDevice};
#[cfg(feature = "glow-backend")]
pub use backend::GlowDevice;
pub use context::{ContextConfig, GraphicsError, RenderContext, UniformMap, UniformValue};
pub use engine::{Engine, EngineConfig, EnvironmentMap, EnvironmentPaths, FrameStats, RenderToggles};
pub use input::InputState;
pub use resources::{
    GeometryData, GeometryDescriptor, PbrMaterial, ShaderDescriptor, TextureDescriptor,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize `env_logger` with `info` as the default filter.
///
/// `RUST_LOG` overrides the default. Calling it twice is harmless.
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
