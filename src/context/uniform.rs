//! Per-draw uniform values and the typed upload table.
//!
//! A program's [`UniformTable`] maps every active uniform name to its
//! location, declared [`UniformKind`] and the [`Uploader`] chosen for that
//! kind when the program was linked. At draw time the dispatcher looks the
//! name up and calls the stored uploader; it never inspects the value's
//! type to decide which device call to make.

use std::collections::{BTreeMap, HashMap};

use glam::{IVec2, IVec3, IVec4, Mat2, Mat3, Mat4, Vec2, Vec3, Vec4};

use crate::backend::{Device, UniformKind};
use crate::resources::{TextureDescriptor, TextureId};

/// A value supplied for one uniform of one draw call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Int(i32),
    IVec2([i32; 2]),
    IVec3([i32; 3]),
    IVec4([i32; 4]),
    UInt(u32),
    Bool(bool),
    /// Column-major
    Mat2([f32; 4]),
    Mat3([f32; 9]),
    Mat4([f32; 16]),
    /// Bound to the next free texture unit of the draw call.
    Texture(TextureId),
}

impl UniformValue {
    /// GLSL spelling of the value's type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            UniformValue::Float(_) => "float",
            UniformValue::Vec2(_) => "vec2",
            UniformValue::Vec3(_) => "vec3",
            UniformValue::Vec4(_) => "vec4",
            UniformValue::Int(_) => "int",
            UniformValue::IVec2(_) => "ivec2",
            UniformValue::IVec3(_) => "ivec3",
            UniformValue::IVec4(_) => "ivec4",
            UniformValue::UInt(_) => "uint",
            UniformValue::Bool(_) => "bool",
            UniformValue::Mat2(_) => "mat2",
            UniformValue::Mat3(_) => "mat3",
            UniformValue::Mat4(_) => "mat4",
            UniformValue::Texture(_) => "texture",
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident $(via $conv:ident)?),* $(,)?) => {
        $(
            impl From<$ty> for UniformValue {
                fn from(value: $ty) -> Self {
                    UniformValue::$variant(value$(.$conv())?)
                }
            }
        )*
    };
}

impl_from! {
    f32 => Float,
    i32 => Int,
    u32 => UInt,
    bool => Bool,
    [f32; 2] => Vec2,
    [f32; 3] => Vec3,
    [f32; 4] => Vec4,
    [i32; 2] => IVec2,
    [i32; 3] => IVec3,
    [i32; 4] => IVec4,
    Vec2 => Vec2 via to_array,
    Vec3 => Vec3 via to_array,
    Vec4 => Vec4 via to_array,
    IVec2 => IVec2 via to_array,
    IVec3 => IVec3 via to_array,
    IVec4 => IVec4 via to_array,
    Mat2 => Mat2 via to_cols_array,
    Mat3 => Mat3 via to_cols_array,
    Mat4 => Mat4 via to_cols_array,
    TextureId => Texture,
}

impl From<&TextureDescriptor> for UniformValue {
    fn from(texture: &TextureDescriptor) -> Self {
        UniformValue::Texture(texture.id())
    }
}

/// Name to value mapping for one draw call.
///
/// Names may be broader than what a given shader declares; unknown names
/// are ignored at draw time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformMap {
    values: BTreeMap<String, UniformValue>,
}

impl UniformMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<UniformValue>) -> &mut Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn set_texture(
        &mut self,
        name: impl Into<String>,
        texture: &TextureDescriptor,
    ) -> &mut Self {
        self.set(name, texture)
    }

    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.values.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<UniformValue> {
        self.values.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UniformValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl<N: Into<String>, V: Into<UniformValue>> Extend<(N, V)> for UniformMap {
    fn extend<T: IntoIterator<Item = (N, V)>>(&mut self, iter: T) {
        for (name, value) in iter {
            self.set(name, value);
        }
    }
}

/// Uploads one value through the device. Returns `false` when the value
/// cannot be converted to the uniform's declared kind.
pub type Uploader<D> = fn(&mut D, &<D as Device>::UniformLocation, &UniformValue) -> bool;

/// The uploader for a declared kind, or `None` for kinds with no setter.
pub fn uploader_for<D: Device>(kind: UniformKind) -> Option<Uploader<D>> {
    let uploader: Uploader<D> = match kind {
        UniformKind::Float => upload_float::<D>,
        UniformKind::Vec2 => upload_vec2::<D>,
        UniformKind::Vec3 => upload_vec3::<D>,
        UniformKind::Vec4 => upload_vec4::<D>,
        UniformKind::Int => upload_int::<D>,
        UniformKind::IVec2 => upload_ivec2::<D>,
        UniformKind::IVec3 => upload_ivec3::<D>,
        UniformKind::IVec4 => upload_ivec4::<D>,
        UniformKind::UInt => upload_uint::<D>,
        UniformKind::Bool => upload_bool::<D>,
        UniformKind::Mat2 => upload_mat2::<D>,
        UniformKind::Mat3 => upload_mat3::<D>,
        UniformKind::Mat4 => upload_mat4::<D>,
        UniformKind::Sampler2D | UniformKind::SamplerCube => upload_sampler::<D>,
        UniformKind::Unsupported => return None,
    };
    Some(uploader)
}

// Scalars convert between numeric types; vectors and matrices must match.

fn upload_float<D: Device>(
    device: &mut D,
    location: &D::UniformLocation,
    value: &UniformValue,
) -> bool {
    let x = match *value {
        UniformValue::Float(x) => x,
        UniformValue::Int(x) => x as f32,
        UniformValue::UInt(x) => x as f32,
        _ => return false,
    };
    device.uniform_1_f32(location, x);
    true
}

fn upload_vec2<D: Device>(
    device: &mut D,
    location: &D::UniformLocation,
    value: &UniformValue,
) -> bool {
    match *value {
        UniformValue::Vec2(v) => device.uniform_2_f32(location, v),
        _ => return false,
    }
    true
}

fn upload_vec3<D: Device>(
    device: &mut D,
    location: &D::UniformLocation,
    value: &UniformValue,
) -> bool {
    match *value {
        UniformValue::Vec3(v) => device.uniform_3_f32(location, v),
        _ => return false,
    }
    true
}

fn upload_vec4<D: Device>(
    device: &mut D,
    location: &D::UniformLocation,
    value: &UniformValue,
) -> bool {
    match *value {
        UniformValue::Vec4(v) => device.uniform_4_f32(location, v),
        _ => return false,
    }
    true
}

fn upload_int<D: Device>(
    device: &mut D,
    location: &D::UniformLocation,
    value: &UniformValue,
) -> bool {
    let x = match *value {
        UniformValue::Int(x) => x,
        UniformValue::UInt(x) => match i32::try_from(x) {
            Ok(x) => x,
            Err(_) => return false,
        },
        UniformValue::Bool(b) => b as i32,
        _ => return false,
    };
    device.uniform_1_i32(location, x);
    true
}

fn upload_ivec2<D: Device>(
    device: &mut D,
    location: &D::UniformLocation,
    value: &UniformValue,
) -> bool {
    match *value {
        UniformValue::IVec2(v) => device.uniform_2_i32(location, v),
        _ => return false,
    }
    true
}

fn upload_ivec3<D: Device>(
    device: &mut D,
    location: &D::UniformLocation,
    value: &UniformValue,
) -> bool {
    match *value {
        UniformValue::IVec3(v) => device.uniform_3_i32(location, v),
        _ => return false,
    }
    true
}

fn upload_ivec4<D: Device>(
    device: &mut D,
    location: &D::UniformLocation,
    value: &UniformValue,
) -> bool {
    match *value {
        UniformValue::IVec4(v) => device.uniform_4_i32(location, v),
        _ => return false,
    }
    true
}

fn upload_uint<D: Device>(
    device: &mut D,
    location: &D::UniformLocation,
    value: &UniformValue,
) -> bool {
    let x = match *value {
        UniformValue::UInt(x) => x,
        UniformValue::Int(x) => match u32::try_from(x) {
            Ok(x) => x,
            Err(_) => return false,
        },
        UniformValue::Bool(b) => b as u32,
        _ => return false,
    };
    device.uniform_1_u32(location, x);
    true
}

/// Booleans are written as unsigned 0/1.
fn upload_bool<D: Device>(
    device: &mut D,
    location: &D::UniformLocation,
    value: &UniformValue,
) -> bool {
    let b = match *value {
        UniformValue::Bool(b) => b,
        UniformValue::Int(x) => x != 0,
        UniformValue::UInt(x) => x != 0,
        UniformValue::Float(x) => x != 0.0,
        _ => return false,
    };
    device.uniform_1_u32(location, b as u32);
    true
}

fn upload_mat2<D: Device>(
    device: &mut D,
    location: &D::UniformLocation,
    value: &UniformValue,
) -> bool {
    match value {
        UniformValue::Mat2(m) => device.uniform_matrix_2_f32(location, m),
        _ => return false,
    }
    true
}

fn upload_mat3<D: Device>(
    device: &mut D,
    location: &D::UniformLocation,
    value: &UniformValue,
) -> bool {
    match value {
        UniformValue::Mat3(m) => device.uniform_matrix_3_f32(location, m),
        _ => return false,
    }
    true
}

fn upload_mat4<D: Device>(
    device: &mut D,
    location: &D::UniformLocation,
    value: &UniformValue,
) -> bool {
    match value {
        UniformValue::Mat4(m) => device.uniform_matrix_4_f32(location, m),
        _ => return false,
    }
    true
}

/// Samplers take a texture unit index. Texture references are resolved to
/// a unit by the dispatcher before this is called.
fn upload_sampler<D: Device>(
    device: &mut D,
    location: &D::UniformLocation,
    value: &UniformValue,
) -> bool {
    let unit = match *value {
        UniformValue::Int(unit) if unit >= 0 => unit,
        UniformValue::UInt(unit) => match i32::try_from(unit) {
            Ok(unit) => unit,
            Err(_) => return false,
        },
        _ => return false,
    };
    device.uniform_1_i32(location, unit);
    true
}

/// One active uniform of a linked program.
pub struct UniformEntry<D: Device> {
    pub location: D::UniformLocation,
    pub kind: UniformKind,
    upload: Uploader<D>,
}

impl<D: Device> UniformEntry<D> {
    pub(crate) fn new(
        location: D::UniformLocation,
        kind: UniformKind,
        upload: Uploader<D>,
    ) -> Self {
        Self {
            location,
            kind,
            upload,
        }
    }

    pub(crate) fn upload(&self, device: &mut D, value: &UniformValue) -> bool {
        (self.upload)(device, &self.location, value)
    }
}

/// Uniform name to location, kind and uploader, built once at link time.
pub struct UniformTable<D: Device> {
    entries: HashMap<String, UniformEntry<D>>,
}

impl<D: Device> Default for UniformTable<D> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<D: Device> UniformTable<D> {
    pub(crate) fn insert(&mut self, name: String, entry: UniformEntry<D>) {
        self.entries.insert(name, entry);
    }

    pub fn get(&self, name: &str) -> Option<&UniformEntry<D>> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn kind(&self, name: &str) -> Option<UniformKind> {
        self.entries.get(name).map(|e| e.kind)
    }

    /// Names in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glam_conversions() {
        assert_eq!(
            UniformValue::from(Vec3::new(1.0, 2.0, 3.0)),
            UniformValue::Vec3([1.0, 2.0, 3.0])
        );
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        match UniformValue::from(m) {
            UniformValue::Mat4(cols) => assert_eq!(&cols[12..15], &[1.0, 2.0, 3.0]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_map_replaces_values() {
        let mut map = UniformMap::new();
        map.set("a", 1.0f32).set("b", true);
        map.set("a", 2.0f32);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("a"), Some(&UniformValue::Float(2.0)));
    }

    #[test]
    fn test_every_supported_kind_has_an_uploader() {
        use crate::backend::HeadlessDevice;
        let kinds = [
            UniformKind::Float,
            UniformKind::Vec2,
            UniformKind::Vec3,
            UniformKind::Vec4,
            UniformKind::Int,
            UniformKind::IVec2,
            UniformKind::IVec3,
            UniformKind::IVec4,
            UniformKind::UInt,
            UniformKind::Bool,
            UniformKind::Mat2,
            UniformKind::Mat3,
            UniformKind::Mat4,
            UniformKind::Sampler2D,
            UniformKind::SamplerCube,
        ];
        for kind in kinds {
            assert!(uploader_for::<HeadlessDevice>(kind).is_some(), "{kind:?}");
        }
        assert!(uploader_for::<HeadlessDevice>(UniformKind::Unsupported).is_none());
    }
}
