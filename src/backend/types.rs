//! Common types shared between devices

use std::fmt;

/// Primitive topology used by indexed draws
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
    TriangleFan,
}

impl PrimitiveTopology {
    /// Whether indices describe triangles (list, strip or fan).
    pub fn is_triangles(&self) -> bool {
        matches!(
            self,
            PrimitiveTopology::TriangleList
                | PrimitiveTopology::TriangleStrip
                | PrimitiveTopology::TriangleFan
        )
    }
}

/// Width of the elements stored in an index buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexFormat {
    Uint8,
    Uint16,
    Uint32,
}

impl IndexFormat {
    /// Size of one index in bytes.
    pub fn size(&self) -> usize {
        match self {
            IndexFormat::Uint8 => 1,
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }

    /// Smallest format whose range strictly exceeds `vertex_count`.
    ///
    /// A width `w` qualifies when `2^(8*w) > vertex_count`, so a 24-vertex
    /// cube gets byte indices while 256 vertices already need 16 bits.
    pub fn for_vertex_count(vertex_count: usize) -> Self {
        if vertex_count < 1 << 8 {
            IndexFormat::Uint8
        } else if vertex_count < 1 << 16 {
            IndexFormat::Uint16
        } else {
            IndexFormat::Uint32
        }
    }
}

/// Cull mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    Front,
    Back,
    FrontAndBack,
}

/// Shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

/// Buffer binding point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Vertex attribute data
    Array,
    /// Index data; captured by the bound vertex array
    ElementArray,
}

/// Texture bind target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureTarget {
    Texture2D,
    CubeMap,
}

/// One face of a cube map, in GL face order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];
}

/// Image upload target: the 2D texture itself or one face of a cube map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TexImageTarget {
    Texture2D,
    CubeFace(CubeFace),
}

impl TexImageTarget {
    /// Target the texture object must be bound to for this upload.
    pub fn bind_target(&self) -> TextureTarget {
        match self {
            TexImageTarget::Texture2D => TextureTarget::Texture2D,
            TexImageTarget::CubeFace(_) => TextureTarget::CubeMap,
        }
    }
}

/// Layout of client pixel data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Red,
    Rg,
    Rgb,
    Rgba,
}

impl PixelFormat {
    pub fn components(&self) -> usize {
        match self {
            PixelFormat::Red => 1,
            PixelFormat::Rg => 2,
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba => 4,
        }
    }
}

/// Component type of client pixel data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelType {
    UnsignedByte,
    HalfFloat,
    Float,
}

impl PixelType {
    pub fn size(&self) -> usize {
        match self {
            PixelType::UnsignedByte => 1,
            PixelType::HalfFloat => 2,
            PixelType::Float => 4,
        }
    }
}

/// Storage format of a texture on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InternalFormat {
    R8,
    Rg8,
    Rgb8,
    Rgba8,
    Srgb8Alpha8,
    R16F,
    Rg16F,
    Rgba16F,
    R32F,
    Rgb32F,
    Rgba32F,
}

/// Filter mode for samplers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

/// Address mode for samplers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    #[default]
    ClampToEdge,
    Repeat,
    MirrorRepeat,
}

/// Sampling state applied to the currently bound texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureParameter {
    /// Minification filter; `mipmap` selects the filter between levels.
    MinFilter {
        filter: FilterMode,
        mipmap: Option<FilterMode>,
    },
    MagFilter(FilterMode),
    WrapS(AddressMode),
    WrapT(AddressMode),
    WrapR(AddressMode),
}

/// Framebuffer planes to clear
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearMask(u32);

impl ClearMask {
    pub const COLOR: Self = Self(1 << 0);
    pub const DEPTH: Self = Self(1 << 1);
    pub const STENCIL: Self = Self(1 << 2);

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for ClearMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Toggleable fixed-function state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    DepthTest,
    CullFace,
}

/// Declared type of an active uniform, as reported by program introspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
    IVec2,
    IVec3,
    IVec4,
    UInt,
    Bool,
    Mat2,
    Mat3,
    Mat4,
    Sampler2D,
    SamplerCube,
    /// Any type the uploader table has no entry for.
    Unsupported,
}

impl UniformKind {
    pub fn is_sampler(&self) -> bool {
        matches!(self, UniformKind::Sampler2D | UniformKind::SamplerCube)
    }

    /// Texture target a sampler of this kind reads from.
    pub fn sampler_target(&self) -> Option<TextureTarget> {
        match self {
            UniformKind::Sampler2D => Some(TextureTarget::Texture2D),
            UniformKind::SamplerCube => Some(TextureTarget::CubeMap),
            _ => None,
        }
    }
}

/// One entry of a program's active uniform list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveUniform {
    /// Fully qualified name (`uModel.localToProjection`, `lights[2].color`, `weights[0]`)
    pub name: String,
    pub kind: UniformKind,
    /// Array length; 1 for non-arrays
    pub size: i32,
}

/// Limits and surface information of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCapabilities {
    /// Number of texture units usable by a single draw call
    pub max_texture_units: u32,
    pub drawing_buffer_width: u32,
    pub drawing_buffer_height: u32,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            max_texture_units: 16,
            drawing_buffer_width: 1280,
            drawing_buffer_height: 720,
        }
    }
}
