//! Shader source preprocessing and the built-in shader library.
//!
//! Sources are written without a `#version` line. [`preprocess_shader`]
//! prepends the GLSL ES 3.00 pragma and one `#define` per truthy entry of
//! the descriptor's [`ShaderDefines`], in insertion order:
//!
//! ```
//! use glint::resources::ShaderDefines;
//! use glint::shader::preprocess_shader;
//!
//! let mut defines = ShaderDefines::new();
//! defines.set("USE_UV", true);
//! defines.set("LIGHT_PROBE", false);
//! defines.set("POINT_LIGHT_COUNT", 4);
//!
//! let source = preprocess_shader("void main() {}", &defines);
//! assert_eq!(
//!     source,
//!     "#version 300 es\n\n#define USE_UV\n#define POINT_LIGHT_COUNT 4\n\nvoid main() {}"
//! );
//! ```

pub mod library;

use crate::resources::{ShaderDef, ShaderDefines};

pub use library::{cubemap_shader, pbr_shader, PbrShaderOptions};

/// Version pragma prepended to every shader.
pub const GLSL_VERSION_PRAGMA: &str = "#version 300 es";

/// Expand `defines` into preprocessor text and prepend it, with the version
/// pragma, to `source`. Falsy defines contribute nothing.
pub fn preprocess_shader(source: &str, defines: &ShaderDefines) -> String {
    let mut header = String::new();
    for (name, value) in defines.iter().filter(|(_, v)| v.is_truthy()) {
        match value {
            ShaderDef::Bool(_) => header.push_str(&format!("#define {name}\n")),
            ShaderDef::Int(_) | ShaderDef::UInt(_) => {
                header.push_str(&format!("#define {name} {value}\n"))
            }
        }
    }
    format!("{GLSL_VERSION_PRAGMA}\n\n{header}\n{source}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_defines() {
        let source = preprocess_shader("void main() {}", &ShaderDefines::new());
        assert_eq!(source, "#version 300 es\n\n\nvoid main() {}");
    }

    #[test]
    fn test_falsy_defines_are_omitted() {
        let defines: ShaderDefines = [("A", ShaderDef::Bool(false)), ("B", ShaderDef::Int(0))]
            .into_iter()
            .collect();
        let source = preprocess_shader("x", &defines);
        assert!(!source.contains("#define"));
    }

    #[test]
    fn test_defines_follow_insertion_order() {
        let mut defines = ShaderDefines::new();
        defines.set("Z_LAST_ALPHABETICALLY", true);
        defines.set("A_FIRST", 2u32);
        defines.set("NEGATIVE", -1);
        let source = preprocess_shader("", &defines);
        let z = source.find("#define Z_LAST_ALPHABETICALLY\n").unwrap();
        let a = source.find("#define A_FIRST 2\n").unwrap();
        let n = source.find("#define NEGATIVE -1\n").unwrap();
        assert!(z < a && a < n);
    }

    #[test]
    fn test_redefining_a_flag_reexpands() {
        let mut defines = ShaderDefines::new();
        defines.set("POINT_LIGHT_COUNT", 2);
        assert!(preprocess_shader("", &defines).contains("#define POINT_LIGHT_COUNT 2\n"));
        defines.set("POINT_LIGHT_COUNT", 4);
        assert!(preprocess_shader("", &defines).contains("#define POINT_LIGHT_COUNT 4\n"));
    }
}
