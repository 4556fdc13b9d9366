//! CPU-side geometry descriptors.
//!
//! This module provides:
//! - [`GeometryData`] - Builder for raw vertex streams and indices
//! - [`GeometryDescriptor`] - Validated geometry with a stable identity
//! - [`IndexBuffer`] - Index data narrowed to the smallest sufficient width

use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use crate::backend::types::{IndexFormat, PrimitiveTopology};

static NEXT_GEOMETRY_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a [`GeometryDescriptor`], used as the GPU cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(u64);

impl GeometryId {
    fn next() -> Self {
        Self(NEXT_GEOMETRY_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Reasons a set of vertex streams cannot form a geometry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("Geometry has no vertices")]
    NoVertices,
    #[error("Geometry has {positions} positions but {normals} normals")]
    NormalCountMismatch { positions: usize, normals: usize },
    #[error("Geometry has {positions} positions but {uvs} uvs")]
    UvCountMismatch { positions: usize, uvs: usize },
    #[error("Geometry has {positions} positions but {tangents} tangents")]
    TangentCountMismatch { positions: usize, tangents: usize },
    #[error("Index {value} at offset {offset} is out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        offset: usize,
        value: u32,
        vertex_count: usize,
    },
    #[error("{count} indices do not form whole {topology:?} primitives")]
    IncompletePrimitive {
        count: usize,
        topology: PrimitiveTopology,
    },
    #[error("Tangent generation needs {0}")]
    MissingAttribute(&'static str),
}

/// Index data stored at the width chosen for the vertex count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexBuffer {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl IndexBuffer {
    /// Narrow `indices` to the smallest format able to address `vertex_count`
    /// vertices. Callers must have checked every index is below the count.
    pub fn narrowed(indices: &[u32], vertex_count: usize) -> Self {
        match IndexFormat::for_vertex_count(vertex_count) {
            IndexFormat::Uint8 => IndexBuffer::U8(indices.iter().map(|&i| i as u8).collect()),
            IndexFormat::Uint16 => IndexBuffer::U16(indices.iter().map(|&i| i as u16).collect()),
            IndexFormat::Uint32 => IndexBuffer::U32(indices.to_vec()),
        }
    }

    pub fn format(&self) -> IndexFormat {
        match self {
            IndexBuffer::U8(_) => IndexFormat::Uint8,
            IndexBuffer::U16(_) => IndexFormat::Uint16,
            IndexBuffer::U32(_) => IndexFormat::Uint32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            IndexBuffer::U8(v) => v.len(),
            IndexBuffer::U16(v) => v.len(),
            IndexBuffer::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> Option<u32> {
        match self {
            IndexBuffer::U8(v) => v.get(i).map(|&x| x as u32),
            IndexBuffer::U16(v) => v.get(i).map(|&x| x as u32),
            IndexBuffer::U32(v) => v.get(i).copied(),
        }
    }

    pub fn to_u32(&self) -> Vec<u32> {
        (0..self.len()).filter_map(|i| self.get(i)).collect()
    }

    /// Raw bytes in native endianness, ready for an element buffer upload.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            IndexBuffer::U8(v) => v.as_slice(),
            IndexBuffer::U16(v) => bytemuck::cast_slice(v.as_slice()),
            IndexBuffer::U32(v) => bytemuck::cast_slice(v.as_slice()),
        }
    }
}

/// Raw vertex streams and indices for a geometry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub uvs: Option<Vec<[f32; 2]>>,
    /// xyz tangent, w handedness (+1 or -1)
    pub tangents: Option<Vec<[f32; 4]>>,
    pub indices: Vec<u32>,
    pub topology: PrimitiveTopology,
}

impl GeometryData {
    pub fn new(positions: Vec<[f32; 3]>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            indices,
            ..Default::default()
        }
    }

    pub fn with_normals(mut self, normals: Vec<[f32; 3]>) -> Self {
        self.normals = Some(normals);
        self
    }

    pub fn with_uvs(mut self, uvs: Vec<[f32; 2]>) -> Self {
        self.uvs = Some(uvs);
        self
    }

    pub fn with_tangents(mut self, tangents: Vec<[f32; 4]>) -> Self {
        self.tangents = Some(tangents);
        self
    }

    pub fn with_topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    /// Compute per-vertex tangents from positions, normals and uvs.
    pub fn with_generated_tangents(mut self) -> Result<Self, GeometryError> {
        self.validate()?;
        let normals = self
            .normals
            .as_deref()
            .ok_or(GeometryError::MissingAttribute("normals"))?;
        let uvs = self
            .uvs
            .as_deref()
            .ok_or(GeometryError::MissingAttribute("uvs"))?;
        let tangents = super::tangents::compute_tangents(
            &self.positions,
            normals,
            uvs,
            &self.indices,
            self.topology,
        );
        self.tangents = Some(tangents);
        Ok(self)
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Check every stream length and index against the vertex count.
    pub fn validate(&self) -> Result<(), GeometryError> {
        let positions = self.positions.len();
        if positions == 0 {
            return Err(GeometryError::NoVertices);
        }
        if let Some(normals) = &self.normals {
            if normals.len() != positions {
                return Err(GeometryError::NormalCountMismatch {
                    positions,
                    normals: normals.len(),
                });
            }
        }
        if let Some(uvs) = &self.uvs {
            if uvs.len() != positions {
                return Err(GeometryError::UvCountMismatch {
                    positions,
                    uvs: uvs.len(),
                });
            }
        }
        if let Some(tangents) = &self.tangents {
            if tangents.len() != positions {
                return Err(GeometryError::TangentCountMismatch {
                    positions,
                    tangents: tangents.len(),
                });
            }
        }
        if let Some((offset, &value)) = self
            .indices
            .iter()
            .enumerate()
            .find(|&(_, &i)| i as usize >= positions)
        {
            return Err(GeometryError::IndexOutOfRange {
                offset,
                value,
                vertex_count: positions,
            });
        }
        let count = self.indices.len();
        let complete = match self.topology {
            PrimitiveTopology::PointList => true,
            PrimitiveTopology::LineList => count % 2 == 0,
            PrimitiveTopology::TriangleList => count % 3 == 0,
            PrimitiveTopology::LineStrip => count != 1,
            PrimitiveTopology::TriangleStrip | PrimitiveTopology::TriangleFan => {
                count == 0 || count >= 3
            }
        };
        if !complete {
            return Err(GeometryError::IncompletePrimitive {
                count,
                topology: self.topology,
            });
        }
        Ok(())
    }
}

/// Validated geometry with a stable identity.
///
/// Descriptors are deliberately not `Clone`: the [`GeometryId`] is the key
/// of the GPU geometry cache and must stay unique. Share a descriptor with
/// `Arc` instead.
#[derive(Debug)]
pub struct GeometryDescriptor {
    id: GeometryId,
    label: Option<String>,
    positions: Vec<[f32; 3]>,
    normals: Option<Vec<[f32; 3]>>,
    uvs: Option<Vec<[f32; 2]>>,
    tangents: Option<Vec<[f32; 4]>>,
    indices: IndexBuffer,
    topology: PrimitiveTopology,
}

impl GeometryDescriptor {
    pub fn new(data: GeometryData) -> Result<Self, GeometryError> {
        data.validate()?;
        let indices = IndexBuffer::narrowed(&data.indices, data.positions.len());
        Ok(Self {
            id: GeometryId::next(),
            label: None,
            positions: data.positions,
            normals: data.normals,
            uvs: data.uvs,
            tangents: data.tangents,
            indices,
            topology: data.topology,
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Replace the content while keeping the identity. The GPU copy is
    /// refreshed on the next upload of this descriptor.
    pub fn update(&mut self, data: GeometryData) -> Result<(), GeometryError> {
        data.validate()?;
        self.indices = IndexBuffer::narrowed(&data.indices, data.positions.len());
        self.positions = data.positions;
        self.normals = data.normals;
        self.uvs = data.uvs;
        self.tangents = data.tangents;
        self.topology = data.topology;
        Ok(())
    }

    pub fn id(&self) -> GeometryId {
        self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn topology(&self) -> PrimitiveTopology {
        self.topology
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn normals(&self) -> Option<&[[f32; 3]]> {
        self.normals.as_deref()
    }

    pub fn uvs(&self) -> Option<&[[f32; 2]]> {
        self.uvs.as_deref()
    }

    pub fn tangents(&self) -> Option<&[[f32; 4]]> {
        self.tangents.as_deref()
    }

    pub fn indices(&self) -> &IndexBuffer {
        &self.indices
    }

    pub fn index_format(&self) -> IndexFormat {
        self.indices.format()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> GeometryData {
        GeometryData::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![0, 1, 2],
        )
        .with_normals(vec![[0.0, 0.0, 1.0]; 3])
    }

    #[test]
    fn test_ids_are_unique() {
        let a = GeometryDescriptor::new(triangle()).unwrap();
        let b = GeometryDescriptor::new(triangle()).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_update_keeps_identity() {
        let mut geometry = GeometryDescriptor::new(triangle()).unwrap();
        let id = geometry.id();
        let mut data = triangle();
        data.positions[0] = [5.0, 5.0, 5.0];
        geometry.update(data).unwrap();
        assert_eq!(geometry.id(), id);
        assert_eq!(geometry.positions()[0], [5.0, 5.0, 5.0]);
    }

    #[test]
    fn test_index_width_follows_vertex_count() {
        let small = GeometryDescriptor::new(triangle()).unwrap();
        assert_eq!(small.index_format(), IndexFormat::Uint8);

        let positions = vec![[0.0; 3]; 1000];
        let large =
            GeometryDescriptor::new(GeometryData::new(positions, vec![0, 500, 999])).unwrap();
        assert_eq!(large.index_format(), IndexFormat::Uint16);
        assert_eq!(large.indices().to_u32(), vec![0, 500, 999]);
        assert_eq!(large.indices().as_bytes().len(), 6);
    }

    #[test]
    fn test_validation_errors() {
        let mismatched = triangle().with_normals(vec![[0.0, 0.0, 1.0]; 2]);
        assert_eq!(
            GeometryDescriptor::new(mismatched).unwrap_err(),
            GeometryError::NormalCountMismatch {
                positions: 3,
                normals: 2
            }
        );

        let uvs = triangle().with_uvs(vec![[0.0, 0.0]; 4]);
        assert!(matches!(
            GeometryDescriptor::new(uvs),
            Err(GeometryError::UvCountMismatch { .. })
        ));

        let mut out_of_range = triangle();
        out_of_range.indices = vec![0, 1, 3];
        assert_eq!(
            GeometryDescriptor::new(out_of_range).unwrap_err(),
            GeometryError::IndexOutOfRange {
                offset: 2,
                value: 3,
                vertex_count: 3
            }
        );

        let mut partial = triangle();
        partial.indices = vec![0, 1];
        assert!(matches!(
            GeometryDescriptor::new(partial),
            Err(GeometryError::IncompletePrimitive { .. })
        ));

        assert_eq!(
            GeometryDescriptor::new(GeometryData::default()).unwrap_err(),
            GeometryError::NoVertices
        );
    }

    #[test]
    fn test_failed_update_leaves_descriptor_untouched() {
        let mut geometry = GeometryDescriptor::new(triangle()).unwrap();
        let mut bad = triangle();
        bad.indices = vec![0, 1, 7];
        assert!(geometry.update(bad).is_err());
        assert_eq!(geometry.indices().to_u32(), vec![0, 1, 2]);
    }

    #[test]
    fn test_tangent_generation_requires_uvs() {
        assert_eq!(
            triangle().with_generated_tangents().unwrap_err(),
            GeometryError::MissingAttribute("uvs")
        );
    }
}
