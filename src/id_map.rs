//! Stable integer ids for mesh elements.
//!
//! `id -> element` is a dense table per element kind. `element -> id` lives in
//! the element's attribute block (the [`ID_LAYER`] layer), so ids travel with
//! the block whenever it is copied or snapshotted.
use slotmap::Key;

use crate::{
    attributes::{Accessor, AttrBlock, AttrKind, ID_LAYER, NO_ID},
    config::IdParams,
    range_tree::RangeTreeUInt,
    BMesh, EdgeId, ElemKind, ElemRef, FaceId, LoopId, MeshError, VertId,
};

/// Highest id handed out, ids must fit the `i32` attribute layer.
pub const MAX_ID: u32 = i32::MAX as u32;

/// Id bookkeeping for one element kind.
#[derive(Debug, Clone)]
pub struct IdTable<K: Key> {
    kind: ElemKind,
    /// Free ids, `None` when ids are never recycled.
    free: Option<RangeTreeUInt>,
    /// Next id when not recycling.
    next: u32,
    map: Vec<Option<K>>,
    layer: Accessor<i32>,
}

impl<K: Key> IdTable<K> {
    fn new(kind: ElemKind, params: IdParams, layer: Accessor<i32>) -> Self {
        Self {
            kind,
            free: params.recycle.then(|| RangeTreeUInt::alloc(0, MAX_ID)),
            next: 0,
            map: Vec::new(),
            layer,
        }
    }

    /// Id stored in `block`, if any.
    pub fn id_of(&self, block: &AttrBlock) -> Option<u32> {
        self.layer
            .get(block)
            .filter(|&id| id >= 0)
            .map(|id| id as u32)
    }

    /// Element bound to `id`. `None` past the high water mark or when unbound.
    pub fn lookup(&self, id: u32) -> Option<K> {
        self.map.get(id as usize).copied().flatten()
    }

    /// Number of bound ids.
    pub fn len(&self) -> usize {
        self.map.iter().filter(|k| k.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Give `key` a fresh id, or return the one it already holds.
    pub fn alloc(&mut self, key: K, block: &mut AttrBlock) -> u32 {
        if let Some(id) = self.id_of(block).filter(|&id| self.lookup(id) == Some(key)) {
            return id;
        }

        let id = match &mut self.free {
            Some(tree) => tree.take_any(),
            None => (self.next <= MAX_ID).then(|| {
                self.next += 1;
                self.next - 1
            }),
        };
        let Some(id) = id else {
            log::error!("{:?} id space exhausted", self.kind);
            self.layer.set(block, NO_ID);
            return u32::MAX;
        };

        self.bind(key, block, id);
        id
    }

    /// Bind `key` to a specific id. Fails if another live element owns it.
    pub fn assign(&mut self, key: K, block: &mut AttrBlock, id: u32) -> Result<(), MeshError> {
        if id > MAX_ID {
            return Err(MeshError::IdConflict {
                id,
                kind: self.kind,
            });
        }
        match self.lookup(id) {
            Some(owner) if owner == key => return Ok(()),
            Some(_) => {
                return Err(MeshError::IdConflict {
                    id,
                    kind: self.kind,
                })
            }
            None => {}
        }

        // Drop whatever id the element held before.
        self.release(key, block, false);

        match &mut self.free {
            Some(tree) => {
                tree.retake(id);
            }
            None => self.next = self.next.max(id + 1),
        }
        self.bind(key, block, id);

        Ok(())
    }

    /// Return the id of `key` to the pool. With `clear_id` the block's id
    /// field is reset too.
    pub fn release(&mut self, key: K, block: &mut AttrBlock, clear_id: bool) {
        if let Some(id) = self.id_of(block) {
            if self.lookup(id) == Some(key) {
                self.map[id as usize] = None;
                if let Some(tree) = &mut self.free {
                    tree.release(id);
                }
            }
        }

        if clear_id {
            self.layer.set(block, NO_ID);
        }
    }

    fn bind(&mut self, key: K, block: &mut AttrBlock, id: u32) {
        let index = id as usize;
        if self.map.len() <= index {
            self.map.resize(index + 1, None);
        }
        self.map[index] = Some(key);
        self.layer.set(block, id as i32);
    }

    fn clear(&mut self) {
        self.map.clear();
        self.next = 0;
        if let Some(tree) = &mut self.free {
            *tree = RangeTreeUInt::alloc(0, MAX_ID);
        }
    }
}

/// Id tables for all four element kinds.
#[derive(Debug, Clone)]
pub struct IdMap {
    pub verts: IdTable<VertId>,
    pub edges: IdTable<EdgeId>,
    pub loops: IdTable<LoopId>,
    pub faces: IdTable<FaceId>,
    params: IdParams,
}

impl IdMap {
    pub fn params(&self) -> IdParams {
        self.params
    }
}

macro_rules! id_access {
    ($arena:ident, $table:ident, $key:ty, $get:ident, $find:ident, $alloc:ident, $assign:ident, $release:ident) => {
        /// Stable id of a live element, `None` when ids are disabled.
        pub fn $get(&self, key: $key) -> Option<u32> {
            let map = self.idmap.as_ref()?;
            map.$table.id_of(&self.$arena.get(key)?.head.data)
        }

        /// Element currently bound to `id`.
        pub fn $find(&self, id: u32) -> Option<$key> {
            self.idmap.as_ref()?.$table.lookup(id)
        }

        pub(crate) fn $alloc(&mut self, key: $key) {
            if let (Some(map), Some(elem)) = (&mut self.idmap, self.$arena.get_mut(key)) {
                map.$table.alloc(key, &mut elem.head.data);
            }
        }

        /// Force `key` to carry `id`.
        pub fn $assign(&mut self, key: $key, id: u32) -> Result<(), MeshError> {
            let map = self.idmap.as_mut().ok_or(MeshError::IdsDisabled)?;
            let elem = self
                .$arena
                .get_mut(key)
                .ok_or(MeshError::DeadElement(key.into()))?;
            map.$table.assign(key, &mut elem.head.data, id)
        }

        /// Release the id of `key`, optionally clearing the stored value.
        pub fn $release(&mut self, key: $key, clear_id: bool) {
            if let (Some(map), Some(elem)) = (&mut self.idmap, self.$arena.get_mut(key)) {
                map.$table.release(key, &mut elem.head.data, clear_id);
            }
        }
    };
}

impl From<VertId> for ElemRef {
    fn from(v: VertId) -> Self {
        ElemRef::Vert(v)
    }
}

impl From<EdgeId> for ElemRef {
    fn from(e: EdgeId) -> Self {
        ElemRef::Edge(e)
    }
}

impl From<LoopId> for ElemRef {
    fn from(l: LoopId) -> Self {
        ElemRef::Loop(l)
    }
}

impl From<FaceId> for ElemRef {
    fn from(f: FaceId) -> Self {
        ElemRef::Face(f)
    }
}

impl BMesh {
    id_access!(verts, verts, VertId, vert_id, vert_from_id, alloc_vert_id, assign_vert_id, release_vert_id);
    id_access!(edges, edges, EdgeId, edge_id, edge_from_id, alloc_edge_id, assign_edge_id, release_edge_id);
    id_access!(loops, loops, LoopId, loop_id, loop_from_id, alloc_loop_id, assign_loop_id, release_loop_id);
    id_access!(faces, faces, FaceId, face_id, face_from_id, alloc_face_id, assign_face_id, release_face_id);

    pub fn ids_enabled(&self) -> bool {
        self.idmap.is_some()
    }

    pub fn idmap(&self) -> Option<&IdMap> {
        self.idmap.as_ref()
    }

    pub fn elem_id(&self, elem: ElemRef) -> Option<u32> {
        match elem {
            ElemRef::Vert(v) => self.vert_id(v),
            ElemRef::Edge(e) => self.edge_id(e),
            ElemRef::Loop(l) => self.loop_id(l),
            ElemRef::Face(f) => self.face_id(f),
        }
    }

    /// Turn on stable ids and give every existing element one, in arena
    /// order. Does nothing if ids are already enabled.
    pub fn enable_ids(&mut self, params: IdParams) {
        if self.idmap.is_some() || !self.install_id_tables(params) {
            return;
        }
        let Some(map) = self.idmap.as_mut() else {
            return;
        };

        macro_rules! fresh {
            ($arena:ident, $table:ident) => {
                for (key, elem) in self.$arena.iter_mut() {
                    map.$table.layer.set(&mut elem.head.data, NO_ID);
                    map.$table.alloc(key, &mut elem.head.data);
                }
            };
        }

        fresh!(verts, verts);
        fresh!(edges, edges);
        fresh!(loops, loops);
        fresh!(faces, faces);
    }

    /// Turn on stable ids keeping the ids already stored in the blocks, as
    /// after loading a snapshot.
    pub(crate) fn restore_ids(&mut self, params: IdParams) {
        if self.idmap.is_none() && !self.install_id_tables(params) {
            return;
        }
        self.rebuild_ids();
    }

    /// Add the id layers and empty id tables.
    fn install_id_tables(&mut self, params: IdParams) -> bool {
        for kind in [ElemKind::Vert, ElemKind::Edge, ElemKind::Loop, ElemKind::Face] {
            // The reserved layer is always an Int, so this cannot collide.
            let _ = self.add_attr_layer(kind, ID_LAYER, AttrKind::Int);
        }
        let (Some(vl), Some(el), Some(ll), Some(fl)) = (
            self.vdata.accessor::<i32>(ID_LAYER),
            self.edata.accessor::<i32>(ID_LAYER),
            self.ldata.accessor::<i32>(ID_LAYER),
            self.pdata.accessor::<i32>(ID_LAYER),
        ) else {
            log::error!("failed to create the id layers, ids stay disabled");
            self.params.ids = None;
            return false;
        };

        self.params.ids = Some(params);
        self.idmap = Some(IdMap {
            verts: IdTable::new(ElemKind::Vert, params, vl),
            edges: IdTable::new(ElemKind::Edge, params, el),
            loops: IdTable::new(ElemKind::Loop, params, ll),
            faces: IdTable::new(ElemKind::Face, params, fl),
            params,
        });
        true
    }

    /// Ids of every element of `kind`, in arena order.
    pub fn ids_in_arena_order(&self, kind: ElemKind) -> Vec<Option<u32>> {
        match kind {
            ElemKind::Vert => self.verts.keys().map(|k| self.vert_id(k)).collect(),
            ElemKind::Edge => self.edges.keys().map(|k| self.edge_id(k)).collect(),
            ElemKind::Loop => self.loops.keys().map(|k| self.loop_id(k)).collect(),
            ElemKind::Face => self.faces.keys().map(|k| self.face_id(k)).collect(),
        }
    }

    /// Rebind ids from lists made by [`BMesh::ids_in_arena_order`], one per
    /// kind in vert, edge, loop, face order. Nothing changes unless every
    /// list matches its arena in length.
    pub(crate) fn write_ids_in_arena_order(&mut self, ids: &[Vec<Option<u32>>; 4]) -> bool {
        if self.idmap.is_none() {
            return false;
        }
        let lens = [
            self.verts.len(),
            self.edges.len(),
            self.loops.len(),
            self.faces.len(),
        ];
        if ids.iter().zip(lens).any(|(list, len)| list.len() != len) {
            return false;
        }

        macro_rules! write {
            ($arena:ident, $schema:ident, $list:expr) => {
                if let Some(layer) = self.$schema.accessor::<i32>(ID_LAYER) {
                    for (elem, id) in self.$arena.values_mut().zip($list) {
                        layer.set(&mut elem.head.data, id.map_or(NO_ID, |id| id as i32));
                    }
                }
            };
        }

        write!(verts, vdata, &ids[0]);
        write!(edges, edata, &ids[1]);
        write!(loops, ldata, &ids[2]);
        write!(faces, pdata, &ids[3]);
        self.rebuild_ids();
        true
    }

    /// Rebuild the id tables from the ids stored in the attribute blocks.
    /// Elements whose stored id is missing or already taken get a fresh one.
    pub fn rebuild_ids(&mut self) {
        let Some(map) = self.idmap.as_mut() else {
            return;
        };

        macro_rules! rebuild {
            ($arena:ident, $table:ident) => {{
                map.$table.clear();
                let mut pending = Vec::new();
                for (key, elem) in self.$arena.iter_mut() {
                    match map.$table.id_of(&elem.head.data) {
                        Some(id) if map.$table.assign(key, &mut elem.head.data, id).is_ok() => {}
                        stored => {
                            if let Some(id) = stored {
                                log::warn!("{:?} id {} is bound twice, reassigning", map.$table.kind, id);
                            }
                            pending.push(key);
                        }
                    }
                }
                for key in pending {
                    if let Some(elem) = self.$arena.get_mut(key) {
                        map.$table.layer.set(&mut elem.head.data, NO_ID);
                        map.$table.alloc(key, &mut elem.head.data);
                    }
                }
            }};
        }

        rebuild!(verts, verts);
        rebuild!(edges, edges);
        rebuild!(loops, loops);
        rebuild!(faces, faces);
    }
}
