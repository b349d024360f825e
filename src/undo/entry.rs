//! What a log entry stores.
//!
//! Elements are keyed by stable id, never by arena key: the key of an
//! element that is removed and brought back changes, its id does not.
use std::collections::HashMap;

use smallvec::SmallVec;

use crate::{
    attributes::{AttrBlock, AttrSchema},
    BMesh, EdgeId, ElemFlags, ElemKind, FaceId, Vec3, VertId,
};

slotmap::new_key_type! {
    pub struct EntryId;
}

/// Attribute layouts an entry captured its blocks under.
#[derive(Debug, Clone)]
pub(crate) struct Schemas {
    pub(crate) vdata: AttrSchema,
    pub(crate) edata: AttrSchema,
    pub(crate) ldata: AttrSchema,
    pub(crate) pdata: AttrSchema,
}

impl Schemas {
    pub(crate) fn of(mesh: &BMesh) -> Self {
        Self {
            vdata: mesh.vdata.clone(),
            edata: mesh.edata.clone(),
            ldata: mesh.ldata.clone(),
            pdata: mesh.pdata.clone(),
        }
    }
}

/// Common shape of the per kind snapshots.
pub(crate) trait ElemSnapshot: Sized + std::fmt::Debug {
    const KIND: ElemKind;
    type Key: Copy;
    /// The part of the snapshot that can change without topology changes.
    type Values: std::fmt::Debug;

    /// This kind's share of an entry.
    fn log_of(entry: &mut PartialEntry) -> (&Schemas, &mut ElemLog<Self>);
    fn id_of(mesh: &BMesh, key: Self::Key) -> Option<u32>;
    fn find(mesh: &BMesh, id: u32) -> Option<Self::Key>;
    fn capture(mesh: &BMesh, schemas: &Schemas, key: Self::Key) -> Option<Self>;
    fn capture_values(mesh: &BMesh, schemas: &Schemas, key: Self::Key) -> Option<Self::Values>;
    /// Write `values` into the live element. `false` if they do not fit.
    fn apply_values(mesh: &mut BMesh, schemas: &Schemas, key: Self::Key, values: &Self::Values)
        -> bool;
    /// Replace this snapshot's values with older ones.
    fn fold_values(&mut self, values: Self::Values);
}

#[derive(Debug, Clone, PartialEq)]
pub struct VertSnap {
    pub co: Vec3,
    pub no: Vec3,
    pub flag: ElemFlags,
    pub data: AttrBlock,
}

impl ElemSnapshot for VertSnap {
    const KIND: ElemKind = ElemKind::Vert;
    type Key = VertId;
    type Values = VertSnap;

    fn log_of(entry: &mut PartialEntry) -> (&Schemas, &mut ElemLog<Self>) {
        (&entry.schemas, &mut entry.verts)
    }

    fn id_of(mesh: &BMesh, v: VertId) -> Option<u32> {
        mesh.vert_id(v)
    }

    fn find(mesh: &BMesh, id: u32) -> Option<VertId> {
        mesh.vert_from_id(id)
    }

    fn capture(mesh: &BMesh, schemas: &Schemas, v: VertId) -> Option<Self> {
        let vert = mesh.verts.get(v)?;
        Some(Self {
            co: vert.co,
            no: vert.no,
            flag: vert.head.flag,
            data: schemas.vdata.copy_block_from(&mesh.vdata, &vert.head.data),
        })
    }

    fn capture_values(mesh: &BMesh, schemas: &Schemas, v: VertId) -> Option<Self> {
        Self::capture(mesh, schemas, v)
    }

    fn apply_values(mesh: &mut BMesh, schemas: &Schemas, v: VertId, values: &Self) -> bool {
        let Some(vert) = mesh.verts.get_mut(v) else {
            return false;
        };
        vert.co = values.co;
        vert.no = values.no;
        vert.head.flag = values.flag;
        vert.head.data = mesh.vdata.copy_block_from(&schemas.vdata, &values.data);
        true
    }

    fn fold_values(&mut self, values: Self) {
        *self = values;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSnap {
    /// Endpoint ids.
    pub verts: [u32; 2],
    pub flag: ElemFlags,
    pub data: AttrBlock,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeValues {
    pub flag: ElemFlags,
    pub data: AttrBlock,
}

impl EdgeSnap {
    /// Whether the live edge `e` joins the vertices this snapshot names.
    pub(crate) fn same_endpoints(&self, mesh: &BMesh, e: EdgeId) -> bool {
        let Some(edge) = mesh.edges.get(e) else {
            return false;
        };
        let [a, b] = edge.verts.map(|v| mesh.vert_id(v));
        let [x, y] = self.verts.map(Some);
        (a == x && b == y) || (a == y && b == x)
    }
}

impl ElemSnapshot for EdgeSnap {
    const KIND: ElemKind = ElemKind::Edge;
    type Key = EdgeId;
    type Values = EdgeValues;

    fn log_of(entry: &mut PartialEntry) -> (&Schemas, &mut ElemLog<Self>) {
        (&entry.schemas, &mut entry.edges)
    }

    fn id_of(mesh: &BMesh, e: EdgeId) -> Option<u32> {
        mesh.edge_id(e)
    }

    fn find(mesh: &BMesh, id: u32) -> Option<EdgeId> {
        mesh.edge_from_id(id)
    }

    fn capture(mesh: &BMesh, schemas: &Schemas, e: EdgeId) -> Option<Self> {
        let edge = mesh.edges.get(e)?;
        let [a, b] = edge.verts;
        Some(Self {
            verts: [mesh.vert_id(a)?, mesh.vert_id(b)?],
            flag: edge.head.flag,
            data: schemas.edata.copy_block_from(&mesh.edata, &edge.head.data),
        })
    }

    fn capture_values(mesh: &BMesh, schemas: &Schemas, e: EdgeId) -> Option<EdgeValues> {
        let edge = mesh.edges.get(e)?;
        Some(EdgeValues {
            flag: edge.head.flag,
            data: schemas.edata.copy_block_from(&mesh.edata, &edge.head.data),
        })
    }

    fn apply_values(mesh: &mut BMesh, schemas: &Schemas, e: EdgeId, values: &EdgeValues) -> bool {
        let Some(edge) = mesh.edges.get_mut(e) else {
            return false;
        };
        edge.head.flag = values.flag;
        edge.head.data = mesh.edata.copy_block_from(&schemas.edata, &values.data);
        true
    }

    fn fold_values(&mut self, values: EdgeValues) {
        self.flag = values.flag;
        self.data = values.data;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CornerSnap {
    pub vert: u32,
    pub edge: u32,
    /// Id of the loop itself.
    pub id: u32,
    pub data: AttrBlock,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FaceSnap {
    pub no: Vec3,
    pub mat_nr: i16,
    pub flag: ElemFlags,
    pub data: AttrBlock,
    pub corners: SmallVec<[CornerSnap; 4]>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FaceValues {
    pub no: Vec3,
    pub mat_nr: i16,
    pub flag: ElemFlags,
    pub data: AttrBlock,
    /// Loop blocks in face order.
    pub corners: SmallVec<[AttrBlock; 4]>,
}

impl ElemSnapshot for FaceSnap {
    const KIND: ElemKind = ElemKind::Face;
    type Key = FaceId;
    type Values = FaceValues;

    fn log_of(entry: &mut PartialEntry) -> (&Schemas, &mut ElemLog<Self>) {
        (&entry.schemas, &mut entry.faces)
    }

    fn id_of(mesh: &BMesh, f: FaceId) -> Option<u32> {
        mesh.face_id(f)
    }

    fn find(mesh: &BMesh, id: u32) -> Option<FaceId> {
        mesh.face_from_id(id)
    }

    fn capture(mesh: &BMesh, schemas: &Schemas, f: FaceId) -> Option<Self> {
        let face = mesh.faces.get(f)?;
        let corners = mesh
            .face_loops(f)
            .map(|l| {
                let corner = &mesh.loops[l];
                Some(CornerSnap {
                    vert: mesh.vert_id(corner.v)?,
                    edge: mesh.edge_id(corner.e)?,
                    id: mesh.loop_id(l)?,
                    data: schemas.ldata.copy_block_from(&mesh.ldata, &corner.head.data),
                })
            })
            .collect::<Option<_>>()?;
        Some(Self {
            no: face.no,
            mat_nr: face.mat_nr,
            flag: face.head.flag,
            data: schemas.pdata.copy_block_from(&mesh.pdata, &face.head.data),
            corners,
        })
    }

    fn capture_values(mesh: &BMesh, schemas: &Schemas, f: FaceId) -> Option<FaceValues> {
        let face = mesh.faces.get(f)?;
        Some(FaceValues {
            no: face.no,
            mat_nr: face.mat_nr,
            flag: face.head.flag,
            data: schemas.pdata.copy_block_from(&mesh.pdata, &face.head.data),
            corners: mesh
                .face_loops(f)
                .map(|l| {
                    schemas
                        .ldata
                        .copy_block_from(&mesh.ldata, &mesh.loops[l].head.data)
                })
                .collect(),
        })
    }

    fn apply_values(mesh: &mut BMesh, schemas: &Schemas, f: FaceId, values: &FaceValues) -> bool {
        if mesh.faces.get(f).map(|face| face.len) != Some(values.corners.len()) {
            return false;
        }
        let loops: SmallVec<[_; 8]> = mesh.face_loops(f).collect();
        for (l, block) in loops.into_iter().zip(&values.corners) {
            mesh.loops[l].head.data = mesh.ldata.copy_block_from(&schemas.ldata, block);
        }
        let data = mesh.pdata.copy_block_from(&schemas.pdata, &values.data);
        let face = &mut mesh.faces[f];
        face.no = values.no;
        face.mat_nr = values.mat_nr;
        face.head.flag = values.flag;
        face.head.data = data;
        true
    }

    fn fold_values(&mut self, values: FaceValues) {
        self.no = values.no;
        self.mat_nr = values.mat_nr;
        self.flag = values.flag;
        self.data = values.data;
        for (corner, data) in self.corners.iter_mut().zip(values.corners) {
            corner.data = data;
        }
    }
}

/// Changes to one element kind within one entry.
#[derive(Debug)]
pub(crate) struct ElemLog<S: ElemSnapshot> {
    /// State before the entry of elements it removed or rewired.
    pub(crate) pre: HashMap<u32, S>,
    /// Elements the entry added or rewired. The state after the entry is
    /// captured when the entry is first undone.
    pub(crate) post: HashMap<u32, Option<S>>,
    /// Values before the entry of elements that only had values changed.
    pub(crate) modified: HashMap<u32, S::Values>,
}

impl<S: ElemSnapshot> Default for ElemLog<S> {
    fn default() -> Self {
        Self {
            pre: HashMap::new(),
            post: HashMap::new(),
            modified: HashMap::new(),
        }
    }
}

impl<S: ElemSnapshot> ElemLog<S> {
    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.pre.is_empty() && self.post.is_empty() && self.modified.is_empty()
    }

    /// Drop the captured state after the entry, to be taken again on the
    /// next undo.
    pub(crate) fn forget_post(&mut self) {
        self.post.values_mut().for_each(|slot| *slot = None);
    }

    fn tracks(&self, id: u32) -> bool {
        self.pre.contains_key(&id) || self.post.contains_key(&id)
    }

    pub(crate) fn added(&mut self, id: u32) {
        self.post.insert(id, None);
    }

    /// Record `id` as removed. An element added earlier in the same entry
    /// simply drops out of it.
    pub(crate) fn removed(&mut self, id: u32, snap: impl FnOnce() -> Option<S>) {
        if self.post.remove(&id).is_some() && !self.pre.contains_key(&id) {
            return;
        }
        self.capture_pre(id, snap);
    }

    /// Record `id` as about to be rewired.
    pub(crate) fn topo_pre(&mut self, id: u32, snap: impl FnOnce() -> Option<S>) {
        if self.tracks(id) {
            return;
        }
        if self.capture_pre(id, snap) {
            self.post.insert(id, None);
        }
    }

    /// Record the values of `id` before their first change in this entry.
    pub(crate) fn before_modified(&mut self, id: u32, values: impl FnOnce() -> Option<S::Values>) {
        if self.tracks(id) || self.modified.contains_key(&id) {
            return;
        }
        if let Some(values) = values() {
            self.modified.insert(id, values);
        }
    }

    fn capture_pre(&mut self, id: u32, snap: impl FnOnce() -> Option<S>) -> bool {
        if self.pre.contains_key(&id) {
            return true;
        }
        let Some(mut snap) = snap() else {
            log::warn!("could not snapshot element {id} for the undo log");
            return false;
        };
        if let Some(values) = self.modified.remove(&id) {
            snap.fold_values(values);
        }
        self.pre.insert(id, snap);
        true
    }
}

/// Diff of one editing step.
#[derive(Debug)]
pub(crate) struct PartialEntry {
    pub(crate) schemas: Schemas,
    pub(crate) verts: ElemLog<VertSnap>,
    pub(crate) edges: ElemLog<EdgeSnap>,
    pub(crate) faces: ElemLog<FaceSnap>,
}

impl PartialEntry {
    pub(crate) fn new(mesh: &BMesh) -> Self {
        Self {
            schemas: Schemas::of(mesh),
            verts: ElemLog::default(),
            edges: ElemLog::default(),
            faces: ElemLog::default(),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.verts.is_empty() && self.edges.is_empty() && self.faces.is_empty()
    }
}

#[derive(Debug)]
pub(crate) enum EntryKind {
    Partial(Box<PartialEntry>),
    /// Serialized mesh, swapped with the live one on undo and redo.
    FullMesh(Vec<u8>),
    /// Ids per kind (vert, edge, loop, face) in arena order, swapped with
    /// the live assignment on undo and redo.
    MeshIds(Box<[Vec<Option<u32>>; 4]>),
}

#[derive(Debug)]
pub(crate) struct LogEntry {
    pub(crate) kind: EntryKind,
    /// Neighbouring steps. Only set on the first entry of a step.
    pub(crate) prev: Option<EntryId>,
    pub(crate) next: Option<EntryId>,
    /// Entries recorded as part of the same step.
    pub(crate) combined_prev: Option<EntryId>,
    pub(crate) combined_next: Option<EntryId>,
}

impl LogEntry {
    pub(crate) fn new(kind: EntryKind) -> Self {
        Self {
            kind,
            prev: None,
            next: None,
            combined_prev: None,
            combined_next: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(co: f32) -> Option<VertSnap> {
        Some(VertSnap {
            co: Vec3::repeat(co),
            no: Vec3::zeros(),
            flag: ElemFlags::empty(),
            data: AttrBlock::default(),
        })
    }

    #[test]
    fn added_then_removed_leaves_nothing() {
        let mut log = ElemLog::<VertSnap>::default();
        log.added(3);
        log.removed(3, || snap(1.0));
        assert!(log.is_empty());
    }

    #[test]
    fn removal_keeps_values_from_before_the_entry() {
        let mut log = ElemLog::<VertSnap>::default();
        log.before_modified(1, || snap(1.0));
        log.before_modified(1, || snap(2.0));
        log.removed(1, || snap(3.0));

        assert!(log.modified.is_empty());
        assert_eq!(log.pre[&1].co, Vec3::repeat(1.0));
        assert!(!log.post.contains_key(&1));
    }

    #[test]
    fn topology_is_captured_once() {
        let mut log = ElemLog::<VertSnap>::default();
        log.topo_pre(2, || snap(1.0));
        log.topo_pre(2, || snap(2.0));
        log.before_modified(2, || snap(3.0));
        assert_eq!(log.pre[&2].co, Vec3::repeat(1.0));
        assert_eq!(log.post.get(&2), Some(&None));
        assert!(log.modified.is_empty());

        // Rewired then removed: the old state stays, the new one is gone.
        log.removed(2, || snap(4.0));
        assert_eq!(log.pre[&2].co, Vec3::repeat(1.0));
        assert!(log.post.is_empty());
    }
}
