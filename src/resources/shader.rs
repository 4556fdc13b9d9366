//! Shader descriptors and conditional-compilation defines.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SHADER_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a [`ShaderDescriptor`], used as the program cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(u64);

impl ShaderId {
    fn next() -> Self {
        Self(NEXT_SHADER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Value of a single preprocessor define.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderDef {
    Bool(bool),
    Int(i64),
    UInt(u64),
}

impl ShaderDef {
    /// Falsy defines (`false`, `0`) are not emitted at all.
    pub fn is_truthy(&self) -> bool {
        match self {
            ShaderDef::Bool(b) => *b,
            ShaderDef::Int(v) => *v != 0,
            ShaderDef::UInt(v) => *v != 0,
        }
    }
}

impl From<bool> for ShaderDef {
    fn from(value: bool) -> Self {
        ShaderDef::Bool(value)
    }
}

impl From<i32> for ShaderDef {
    fn from(value: i32) -> Self {
        ShaderDef::Int(value as i64)
    }
}

impl From<i64> for ShaderDef {
    fn from(value: i64) -> Self {
        ShaderDef::Int(value)
    }
}

impl From<u32> for ShaderDef {
    fn from(value: u32) -> Self {
        ShaderDef::UInt(value as u64)
    }
}

impl From<u64> for ShaderDef {
    fn from(value: u64) -> Self {
        ShaderDef::UInt(value)
    }
}

impl From<usize> for ShaderDef {
    fn from(value: usize) -> Self {
        ShaderDef::UInt(value as u64)
    }
}

impl fmt::Display for ShaderDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderDef::Bool(b) => write!(f, "{}", *b as u8),
            ShaderDef::Int(v) => write!(f, "{v}"),
            ShaderDef::UInt(v) => write!(f, "{v}"),
        }
    }
}

/// Define map that remembers insertion order.
///
/// Setting an existing name replaces its value in place, so the emitted
/// define order only changes when a name is removed and added again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderDefines {
    entries: Vec<(String, ShaderDef)>,
}

impl ShaderDefines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ShaderDef>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<ShaderDef> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn remove(&mut self, name: &str) -> Option<ShaderDef> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ShaderDef)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, V: Into<ShaderDef>> FromIterator<(N, V)> for ShaderDefines {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut defines = Self::new();
        for (name, value) in iter {
            defines.set(name, value);
        }
        defines
    }
}

/// Vertex and fragment source plus the defines they are compiled with.
///
/// Identity, not content, keys the program cache: two descriptors with the
/// same text compile into two programs.
#[derive(Debug)]
pub struct ShaderDescriptor {
    id: ShaderId,
    label: Option<String>,
    vertex_source: String,
    fragment_source: String,
    pub defines: ShaderDefines,
}

impl ShaderDescriptor {
    pub fn new(vertex_source: impl Into<String>, fragment_source: impl Into<String>) -> Self {
        Self {
            id: ShaderId::next(),
            label: None,
            vertex_source: vertex_source.into(),
            fragment_source: fragment_source.into(),
            defines: ShaderDefines::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_define(mut self, name: impl Into<String>, value: impl Into<ShaderDef>) -> Self {
        self.defines.set(name, value);
        self
    }

    pub fn id(&self) -> ShaderId {
        self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn vertex_source(&self) -> &str {
        &self.vertex_source
    }

    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }

    /// Replace the source text. Takes effect on the next compile.
    pub fn set_sources(&mut self, vertex: impl Into<String>, fragment: impl Into<String>) {
        self.vertex_source = vertex.into();
        self.fragment_source = fragment.into();
    }
}
