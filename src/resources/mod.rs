//! CPU-side resource descriptors
//!
//! Geometry, shader and texture descriptors are owned by the application
//! and realized on the GPU by [`RenderContext`](crate::context::RenderContext),
//! which keys its caches by the descriptor ids.

mod geometry;
mod material;
pub mod primitives;
mod shader;
mod tangents;
mod texture;

pub use geometry::*;
pub use material::*;
pub use shader::*;
pub use tangents::{compute_tangents, triangles};
pub use texture::*;
