//! Render context error types.

use thiserror::Error;

use crate::backend::{BackendError, ShaderStage};
use crate::resources::{GeometryError, GeometryId, ShaderId, TextureError};

/// Errors reported by [`RenderContext`](super::RenderContext).
///
/// Every error is logged where it happens; callers may drop the `Result`
/// and keep rendering the next frame.
#[derive(Error, Debug)]
pub enum GraphicsError {
    /// The device refused to create an object.
    #[error("device error: {0}")]
    Backend(#[from] BackendError),
    #[error("{stage} shader compilation failed: {log}")]
    ShaderCompilation { stage: ShaderStage, log: String },
    #[error("program link failed: {log}")]
    ProgramLink { log: String },
    #[error("geometry {0:?} has not been uploaded")]
    GeometryNotUploaded(GeometryId),
    #[error("shader {0:?} has not been compiled")]
    ProgramNotCompiled(ShaderId),
    /// The program failed to compile earlier and has not been recompiled.
    #[error("shader {0:?} failed to compile and is unavailable")]
    ProgramUnavailable(ShaderId),
    #[error("invalid geometry: {0}")]
    Geometry(#[from] GeometryError),
    #[error("texture error: {0}")]
    Texture(#[from] TextureError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphicsError::ShaderCompilation {
            stage: ShaderStage::Fragment,
            log: "ERROR: 0:3: 'foo' : undeclared type".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "fragment shader compilation failed: ERROR: 0:3: 'foo' : undeclared type"
        );

        let err: GraphicsError = BackendError::DeviceLost.into();
        assert_eq!(err.to_string(), "device error: Device lost");
    }
}
