//! A radial edge polygon mesh kernel.
//!
//! The mesh stores four kinds of elements in generation checked arenas:
//!
//! - vertices, each pointing at one incident edge,
//! - edges, each linked into the *disk cycle* of both endpoints and pointing
//!   at one of its loops,
//! - loops (face corners), linked into the cycle around their face and into
//!   the *radial cycle* of all loops sharing the same edge,
//! - faces, pointing at their first loop.
//!
//! Topology is only changed through the creation/destruction primitives in
//! [`kernel`] and the Euler operators in [`euler`], [`collapse`] and [`mods`],
//! all of which keep the cycles consistent. Every change can be reported to
//! a [`tracer::MeshTracer`], which is how [`undo::BMLog`] records edits.
use nalgebra::Vector3;
use slotmap::{new_key_type, SlotMap};

pub mod attributes;
pub mod collapse;
pub mod config;
pub mod edge_handle;
pub mod error;
pub mod euler;
pub mod face_handle;
#[cfg(test)]
mod fixtures;
pub(crate) mod helpers;
pub mod id_map;
pub mod iterators;
pub mod kernel;
pub mod loop_handle;
pub mod mods;
pub mod range_tree;
pub mod snapshot;
pub mod tracer;
pub mod undo;
pub mod validation;
pub mod vert_handle;

use attributes::{AttrBlock, AttrKind, AttrSchema};
use config::MeshParams;
use id_map::IdMap;
use tracer::MeshTracer;

pub use edge_handle::EdgeHandle;
pub use error::MeshError;
pub use face_handle::FaceHandle;
pub use loop_handle::LoopHandle;
pub use vert_handle::VertHandle;

pub type Vec3 = Vector3<f32>;

new_key_type! {
    pub struct VertId;
    pub struct EdgeId;
    pub struct LoopId;
    pub struct FaceId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ElemKind {
    Vert,
    Edge,
    Loop,
    Face,
}

/// Reference to an element of any kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElemRef {
    Vert(VertId),
    Edge(EdgeId),
    Loop(LoopId),
    Face(FaceId),
}

impl ElemRef {
    pub fn kind(&self) -> ElemKind {
        match self {
            ElemRef::Vert(_) => ElemKind::Vert,
            ElemRef::Edge(_) => ElemKind::Edge,
            ElemRef::Loop(_) => ElemKind::Loop,
            ElemRef::Face(_) => ElemKind::Face,
        }
    }
}

bitflags::bitflags! {
    /// Persistent per element state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
    pub struct ElemFlags: u8 {
        const SELECT = 1 << 0;
        const HIDDEN = 1 << 1;
        const SMOOTH = 1 << 2;
        const SEAM = 1 << 3;
        /// Free for tools, the kernel never reads it.
        const TAG = 1 << 4;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    pub flag: ElemFlags,
    pub(crate) data: AttrBlock,
}

impl Header {
    pub(crate) fn new(data: AttrBlock) -> Self {
        Self {
            flag: ElemFlags::empty(),
            data,
        }
    }

    pub fn attrs(&self) -> &AttrBlock {
        &self.data
    }

    pub fn attrs_mut(&mut self) -> &mut AttrBlock {
        &mut self.data
    }
}

#[derive(Debug, Clone)]
pub struct Vert {
    pub co: Vec3,
    pub no: Vec3,
    pub head: Header,
    /// Any edge touching this vertex.
    pub(crate) e: Option<EdgeId>,
}

/// Links of an edge inside the disk cycle of one of its endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DiskLink {
    pub(crate) prev: EdgeId,
    pub(crate) next: EdgeId,
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub head: Header,
    /// The two endpoints, never equal.
    pub(crate) verts: [VertId; 2],
    /// Any loop on a face alongside this edge.
    pub(crate) l: Option<LoopId>,
    /// Disk links around `verts[0]` and `verts[1]`.
    pub(crate) disk: [DiskLink; 2],
}

impl Edge {
    pub(crate) fn endpoint(&self, v: VertId) -> Option<usize> {
        self.verts.iter().position(|&x| x == v)
    }

    pub(crate) fn disk_at(&self, v: VertId) -> &DiskLink {
        let i = self.endpoint(v).unwrap_or(0);
        debug_assert!(self.verts[i] == v);
        &self.disk[i]
    }

    pub(crate) fn disk_at_mut(&mut self, v: VertId) -> &mut DiskLink {
        let i = self.endpoint(v).unwrap_or(0);
        debug_assert!(self.verts[i] == v);
        &mut self.disk[i]
    }

    pub(crate) fn other(&self, v: VertId) -> Option<VertId> {
        match self.endpoint(v)? {
            0 => Some(self.verts[1]),
            _ => Some(self.verts[0]),
        }
    }
}

/// A face corner. `next`/`prev` orbit the face, `radial_*` orbit the edge.
#[derive(Debug, Clone)]
pub struct Loop {
    pub head: Header,
    pub(crate) v: VertId,
    pub(crate) e: EdgeId,
    pub(crate) f: FaceId,
    pub(crate) next: LoopId,
    pub(crate) prev: LoopId,
    pub(crate) radial_next: LoopId,
    pub(crate) radial_prev: LoopId,
}

#[derive(Debug, Clone)]
pub struct Face {
    pub no: Vec3,
    pub mat_nr: i16,
    pub head: Header,
    pub(crate) l_first: LoopId,
    pub(crate) len: usize,
}

/// The mesh: element arenas, attribute layouts and optional stable ids.
pub struct BMesh {
    pub(crate) verts: SlotMap<VertId, Vert>,
    pub(crate) edges: SlotMap<EdgeId, Edge>,
    pub(crate) loops: SlotMap<LoopId, Loop>,
    pub(crate) faces: SlotMap<FaceId, Face>,

    pub(crate) vdata: AttrSchema,
    pub(crate) edata: AttrSchema,
    pub(crate) ldata: AttrSchema,
    pub(crate) pdata: AttrSchema,

    pub(crate) idmap: Option<IdMap>,
    pub(crate) params: MeshParams,
    pub(crate) tracer: Option<Box<dyn MeshTracer>>,
}

impl std::fmt::Debug for BMesh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BMesh")
            .field("verts", &self.verts.len())
            .field("edges", &self.edges.len())
            .field("loops", &self.loops.len())
            .field("faces", &self.faces.len())
            .field("ids", &self.idmap.is_some())
            .field("traced", &self.tracer.is_some())
            .finish()
    }
}

/// Clones the geometry, layouts and ids. The tracer stays with the original.
impl Clone for BMesh {
    fn clone(&self) -> Self {
        Self {
            verts: self.verts.clone(),
            edges: self.edges.clone(),
            loops: self.loops.clone(),
            faces: self.faces.clone(),
            vdata: self.vdata.clone(),
            edata: self.edata.clone(),
            ldata: self.ldata.clone(),
            pdata: self.pdata.clone(),
            idmap: self.idmap.clone(),
            params: self.params.clone(),
            tracer: None,
        }
    }
}

impl Default for BMesh {
    fn default() -> Self {
        Self::new(MeshParams::default())
    }
}

impl BMesh {
    pub fn new(params: MeshParams) -> Self {
        let cap = params.capacity;
        let mut mesh = Self {
            verts: SlotMap::with_capacity_and_key(cap.verts),
            edges: SlotMap::with_capacity_and_key(cap.edges),
            loops: SlotMap::with_capacity_and_key(cap.loops),
            faces: SlotMap::with_capacity_and_key(cap.faces),
            vdata: AttrSchema::new(),
            edata: AttrSchema::new(),
            ldata: AttrSchema::new(),
            pdata: AttrSchema::new(),
            idmap: None,
            params,
            tracer: None,
        };

        if let Some(id_params) = mesh.params.ids {
            mesh.enable_ids(id_params);
        }

        mesh
    }

    /// Build a mesh from positions and polygons given as vertex indices.
    /// Edges shared by several polygons are created once.
    pub fn from_polygons<P, I>(
        positions: &[Vec3],
        polygons: P,
        params: MeshParams,
    ) -> Result<Self, MeshError>
    where
        P: IntoIterator<Item = I>,
        I: IntoIterator<Item = usize>,
    {
        let mut mesh = Self::new(params);
        let verts: Vec<VertId> = positions
            .iter()
            .map(|co| mesh.create_vert(*co, None))
            .collect();

        for polygon in polygons {
            let corners = polygon
                .into_iter()
                .map(|i| {
                    verts
                        .get(i)
                        .copied()
                        .ok_or(MeshError::IndexOutOfRange(i))
                })
                .collect::<Result<Vec<_>, _>>()?;
            mesh.create_face_verts(&corners, None, false, true)?;
        }

        Ok(mesh)
    }

    pub fn params(&self) -> &MeshParams {
        &self.params
    }

    pub fn vert_count(&self) -> usize {
        self.verts.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn loop_count(&self) -> usize {
        self.loops.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn vert(&self, v: VertId) -> Option<&Vert> {
        self.verts.get(v)
    }

    pub fn edge(&self, e: EdgeId) -> Option<&Edge> {
        self.edges.get(e)
    }

    pub fn loop_(&self, l: LoopId) -> Option<&Loop> {
        self.loops.get(l)
    }

    pub fn face(&self, f: FaceId) -> Option<&Face> {
        self.faces.get(f)
    }

    pub fn contains(&self, elem: ElemRef) -> bool {
        match elem {
            ElemRef::Vert(v) => self.verts.contains_key(v),
            ElemRef::Edge(e) => self.edges.contains_key(e),
            ElemRef::Loop(l) => self.loops.contains_key(l),
            ElemRef::Face(f) => self.faces.contains_key(f),
        }
    }

    /// Navigation handle. Panics if `v` is not live.
    pub fn vert_handle(&self, v: VertId) -> VertHandle<'_> {
        VertHandle::new(v, self)
    }

    pub fn edge_handle(&self, e: EdgeId) -> EdgeHandle<'_> {
        EdgeHandle::new(e, self)
    }

    pub fn loop_handle(&self, l: LoopId) -> LoopHandle<'_> {
        LoopHandle::new(l, self)
    }

    pub fn face_handle(&self, f: FaceId) -> FaceHandle<'_> {
        FaceHandle::new(f, self)
    }

    pub fn vert_ids(&self) -> impl Iterator<Item = VertId> + '_ {
        self.verts.keys()
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.keys()
    }

    pub fn loop_ids(&self) -> impl Iterator<Item = LoopId> + '_ {
        self.loops.keys()
    }

    pub fn face_ids(&self) -> impl Iterator<Item = FaceId> + '_ {
        self.faces.keys()
    }

    pub fn verts(&self) -> impl Iterator<Item = VertHandle<'_>> + '_ {
        self.verts.keys().map(|v| VertHandle::new(v, self))
    }

    pub fn edges(&self) -> impl Iterator<Item = EdgeHandle<'_>> + '_ {
        self.edges.keys().map(|e| EdgeHandle::new(e, self))
    }

    pub fn faces(&self) -> impl Iterator<Item = FaceHandle<'_>> + '_ {
        self.faces.keys().map(|f| FaceHandle::new(f, self))
    }

    pub fn schema(&self, kind: ElemKind) -> &AttrSchema {
        match kind {
            ElemKind::Vert => &self.vdata,
            ElemKind::Edge => &self.edata,
            ElemKind::Loop => &self.ldata,
            ElemKind::Face => &self.pdata,
        }
    }

    /// Add an attribute layer to every element of `kind`. Returns the layer
    /// index, or `None` if a layer of that name but another type exists.
    pub fn add_attr_layer(&mut self, kind: ElemKind, name: &str, ty: AttrKind) -> Option<usize> {
        let schema = match kind {
            ElemKind::Vert => &mut self.vdata,
            ElemKind::Edge => &mut self.edata,
            ElemKind::Loop => &mut self.ldata,
            ElemKind::Face => &mut self.pdata,
        };
        let before = schema.clone();
        let index = schema.push_layer(name, ty)?;
        if &before == schema {
            return Some(index);
        }

        let schema = schema.clone();
        let regrow = |data: &mut AttrBlock| *data = schema.copy_block_from(&before, data);
        match kind {
            ElemKind::Vert => self.verts.values_mut().for_each(|x| regrow(&mut x.head.data)),
            ElemKind::Edge => self.edges.values_mut().for_each(|x| regrow(&mut x.head.data)),
            ElemKind::Loop => self.loops.values_mut().for_each(|x| regrow(&mut x.head.data)),
            ElemKind::Face => self.faces.values_mut().for_each(|x| regrow(&mut x.head.data)),
        }

        Some(index)
    }
}
