//! Scene management
//!
//! Everything the render loop feeds into the uniform map: camera, lights
//! and the objects to draw.

mod camera;
mod camera_controller;
mod light;
mod object;
pub mod setup;
mod transform;

pub use camera::*;
pub use camera_controller::*;
pub use light::*;
pub use object::*;
pub use transform::*;
