//! Device abstraction layer
//!
//! Provides the [`Device`] trait and its implementations: a headless device
//! that records everything it is asked to do, and a `glow` device for real
//! OpenGL / WebGL2 contexts.

pub mod headless;
pub mod traits;
pub mod types;

#[cfg(feature = "glow-backend")]
pub mod glow_backend;

pub use headless::HeadlessDevice;
pub use traits::*;
pub use types::*;

#[cfg(feature = "glow-backend")]
pub use glow_backend::GlowDevice;
