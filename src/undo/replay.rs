//! Applying a recorded step backwards and forwards.
//!
//! Replay is best effort. An element that is missing or whose id is taken
//! is reported with `log::warn!` and skipped; the rest of the step still
//! applies.
use std::collections::HashMap;

use smallvec::SmallVec;

use super::{
    callbacks::LogCallbacks,
    entry::{
        EdgeSnap, EdgeValues, ElemLog, ElemSnapshot, EntryKind, FaceSnap, PartialEntry, Schemas,
        VertSnap,
    },
};
use crate::{snapshot::MeshSnapshot, BMesh, EdgeId, ElemKind, Header, Vert, VertId};

impl EntryKind {
    pub(crate) fn undo(&mut self, mesh: &mut BMesh, cb: &mut dyn LogCallbacks) {
        match self {
            EntryKind::Partial(entry) => entry.undo(mesh, cb),
            EntryKind::FullMesh(bytes) => swap_full_mesh(bytes, mesh, cb),
            EntryKind::MeshIds(ids) => swap_mesh_ids(ids, mesh),
        }
    }

    pub(crate) fn redo(&mut self, mesh: &mut BMesh, cb: &mut dyn LogCallbacks) {
        match self {
            EntryKind::Partial(entry) => entry.redo(mesh, cb),
            EntryKind::FullMesh(bytes) => swap_full_mesh(bytes, mesh, cb),
            EntryKind::MeshIds(ids) => swap_mesh_ids(ids, mesh),
        }
    }
}

fn sorted_ids<T>(map: &HashMap<u32, T>) -> Vec<u32> {
    let mut ids: Vec<u32> = map.keys().copied().collect();
    ids.sort_unstable();
    ids
}

impl PartialEntry {
    pub(crate) fn undo(&mut self, mesh: &mut BMesh, cb: &mut dyn LogCallbacks) {
        self.capture_post(mesh);

        let keep: HashMap<u32, &EdgeSnap> = self.edges.pre.iter().map(|(&id, s)| (id, s)).collect();
        kill_side(
            mesh,
            &sorted_ids(&self.faces.post),
            &sorted_ids(&self.edges.post),
            &sorted_ids(&self.verts.post),
            &keep,
            cb,
        );

        let schemas = &self.schemas;
        restore_verts(mesh, schemas, self.verts.pre.iter(), cb);
        restore_edges(mesh, schemas, self.edges.pre.iter(), cb);
        restore_faces(mesh, schemas, self.faces.pre.iter(), cb);
        self.swap_values(mesh, cb);
    }

    pub(crate) fn redo(&mut self, mesh: &mut BMesh, cb: &mut dyn LogCallbacks) {
        let keep: HashMap<u32, &EdgeSnap> = self
            .edges
            .post
            .iter()
            .filter_map(|(&id, s)| Some((id, s.as_ref()?)))
            .collect();
        kill_side(
            mesh,
            &sorted_ids(&self.faces.pre),
            &sorted_ids(&self.edges.pre),
            &sorted_ids(&self.verts.pre),
            &keep,
            cb,
        );

        let schemas = &self.schemas;
        restore_verts(mesh, schemas, present(&self.verts.post), cb);
        restore_edges(mesh, schemas, present(&self.edges.post), cb);
        restore_faces(mesh, schemas, present(&self.faces.post), cb);
        self.swap_values(mesh, cb);

        // The step is current again and may take more edits.
        self.verts.forget_post();
        self.edges.forget_post();
        self.faces.forget_post();
    }

    /// Take the state after the entry of everything it added or rewired.
    /// Runs when the entry is undone, so the mesh is in exactly that state.
    fn capture_post(&mut self, mesh: &BMesh) {
        fn capture<S: ElemSnapshot>(log: &mut ElemLog<S>, mesh: &BMesh, schemas: &Schemas) {
            for (&id, slot) in log.post.iter_mut().filter(|(_, s)| s.is_none()) {
                *slot = S::find(mesh, id).and_then(|key| S::capture(mesh, schemas, key));
                if slot.is_none() {
                    log::warn!("element {id} is gone, its state after the step is lost");
                }
            }
        }

        capture(&mut self.verts, mesh, &self.schemas);
        capture(&mut self.edges, mesh, &self.schemas);
        capture(&mut self.faces, mesh, &self.schemas);
    }

    fn swap_values(&mut self, mesh: &mut BMesh, cb: &mut dyn LogCallbacks) {
        swap_values(&mut self.verts, mesh, &self.schemas, |m, v| cb.on_vert_change(m, v));
        swap_values(&mut self.edges, mesh, &self.schemas, |m, e| cb.on_edge_change(m, e));
        swap_values(&mut self.faces, mesh, &self.schemas, |m, f| cb.on_face_change(m, f));
    }
}

fn present<S>(map: &HashMap<u32, Option<S>>) -> impl Iterator<Item = (&u32, &S)> {
    map.iter().filter_map(|(id, s)| match s {
        Some(s) => Some((id, s)),
        None => {
            log::warn!("no state recorded for element {id}, cannot redo it");
            None
        }
    })
}

/// Swap live values with the stored ones, so the same call undoes and
/// redoes.
fn swap_values<S: ElemSnapshot>(
    log: &mut ElemLog<S>,
    mesh: &mut BMesh,
    schemas: &Schemas,
    mut changed: impl FnMut(&BMesh, S::Key),
) {
    for id in sorted_ids(&log.modified) {
        let Some(key) = S::find(mesh, id) else {
            log::warn!("element {id} is gone, its values cannot be restored");
            continue;
        };
        let Some(current) = S::capture_values(mesh, schemas, key) else {
            continue;
        };
        let Some(stored) = log.modified.get_mut(&id) else {
            continue;
        };
        if S::apply_values(mesh, schemas, key, stored) {
            *stored = current;
            changed(&*mesh, key);
        } else {
            log::warn!("stored values of element {id} no longer fit it");
        }
    }
}

/// Remove the elements one side of a step has. Edges whose endpoints
/// already match the state that is about to be restored stay, so faces the
/// step never touched keep their edges.
fn kill_side(
    mesh: &mut BMesh,
    faces: &[u32],
    edges: &[u32],
    verts: &[u32],
    keep: &HashMap<u32, &EdgeSnap>,
    cb: &mut dyn LogCallbacks,
) {
    for &id in faces {
        let Some(f) = mesh.face_from_id(id) else {
            log::warn!("face {id} is missing, skipping it");
            continue;
        };
        cb.on_face_kill(mesh, f);
        if let Err(err) = mesh.kill_face(f) {
            log::warn!("failed to remove face {id}: {err}");
        }
    }

    for &id in edges {
        let Some(e) = mesh.edge_from_id(id) else {
            log::warn!("edge {id} is missing, skipping it");
            continue;
        };
        if keep.get(&id).is_some_and(|snap| snap.same_endpoints(mesh, e)) {
            continue;
        }
        cb.on_edge_kill(mesh, e);
        if let Err(err) = mesh.kill_edge(e) {
            log::warn!("failed to remove edge {id}: {err}");
        }
    }

    for &id in verts {
        let Some(v) = mesh.vert_from_id(id) else {
            log::warn!("vertex {id} is missing, skipping it");
            continue;
        };
        cb.on_vert_kill(mesh, v);
        if let Err(err) = mesh.kill_vert(v) {
            log::warn!("failed to remove vertex {id}: {err}");
        }
    }
}

fn sorted<'a, S>(snaps: impl Iterator<Item = (&'a u32, &'a S)>) -> Vec<(u32, &'a S)>
where
    S: 'a,
{
    let mut snaps: Vec<(u32, &S)> = snaps.map(|(&id, s)| (id, s)).collect();
    snaps.sort_unstable_by_key(|&(id, _)| id);
    snaps
}

fn restore_verts<'a>(
    mesh: &mut BMesh,
    schemas: &Schemas,
    snaps: impl Iterator<Item = (&'a u32, &'a VertSnap)>,
    cb: &mut dyn LogCallbacks,
) {
    for (id, snap) in sorted(snaps) {
        if let Some(v) = mesh.vert_from_id(id) {
            VertSnap::apply_values(mesh, schemas, v, snap);
            cb.on_vert_change(mesh, v);
            continue;
        }
        let data = mesh.vdata.copy_block_from(&schemas.vdata, &snap.data);
        let v = mesh.verts.insert(Vert {
            co: snap.co,
            no: snap.no,
            head: Header {
                flag: snap.flag,
                data,
            },
            e: None,
        });
        if let Err(err) = mesh.assign_vert_id(v, id) {
            log::warn!("restored vertex cannot take back its id: {err}");
            mesh.alloc_vert_id(v);
        }
        cb.on_vert_add(mesh, v);
    }
}

fn restore_edges<'a>(
    mesh: &mut BMesh,
    schemas: &Schemas,
    snaps: impl Iterator<Item = (&'a u32, &'a EdgeSnap)>,
    cb: &mut dyn LogCallbacks,
) {
    for (id, snap) in sorted(snaps) {
        if let Some(e) = mesh.edge_from_id(id) {
            let values = EdgeValues {
                flag: snap.flag,
                data: snap.data.clone(),
            };
            EdgeSnap::apply_values(mesh, schemas, e, &values);
            cb.on_edge_change(mesh, e);
            continue;
        }
        let (Some(v1), Some(v2)) = (
            mesh.vert_from_id(snap.verts[0]),
            mesh.vert_from_id(snap.verts[1]),
        ) else {
            log::warn!("edge {id} needs vertices {:?} which are missing", snap.verts);
            continue;
        };
        if v1 == v2 {
            log::warn!("edge {id} would be degenerate, skipping it");
            continue;
        }
        let head = Header {
            flag: snap.flag,
            data: mesh.edata.copy_block_from(&schemas.edata, &snap.data),
        };
        let e = mesh.new_edge_record(v1, v2, head);
        if let Err(err) = mesh.assign_edge_id(e, id) {
            log::warn!("restored edge cannot take back its id: {err}");
            mesh.alloc_edge_id(e);
        }
        cb.on_edge_add(mesh, e);
    }
}

fn restore_faces<'a>(
    mesh: &mut BMesh,
    schemas: &Schemas,
    snaps: impl Iterator<Item = (&'a u32, &'a FaceSnap)>,
    cb: &mut dyn LogCallbacks,
) {
    'faces: for (id, snap) in sorted(snaps) {
        if mesh.face_from_id(id).is_some() {
            log::warn!("face {id} is already live, skipping it");
            continue;
        }
        let n = snap.corners.len();
        if n == 0 {
            log::warn!("face {id} has no corners, skipping it");
            continue;
        }

        let mut verts: SmallVec<[VertId; 8]> = SmallVec::with_capacity(n);
        let mut edges: SmallVec<[EdgeId; 8]> = SmallVec::with_capacity(n);
        for corner in &snap.corners {
            let (Some(v), Some(e)) = (
                mesh.vert_from_id(corner.vert),
                mesh.edge_from_id(corner.edge),
            ) else {
                log::warn!("face {id} refers to missing elements, skipping it");
                continue 'faces;
            };
            verts.push(v);
            edges.push(e);
        }
        for (i, &e) in edges.iter().enumerate() {
            if mesh.edges[e].other(verts[i]) != Some(verts[(i + 1) % n]) {
                log::warn!("face {id} does not match its edges any more, skipping it");
                continue 'faces;
            }
        }

        let head = Header {
            flag: snap.flag,
            data: mesh.pdata.copy_block_from(&schemas.pdata, &snap.data),
        };
        let blocks = snap
            .corners
            .iter()
            .map(|c| mesh.ldata.copy_block_from(&schemas.ldata, &c.data))
            .collect();
        let f = mesh.new_face_record(&verts, &edges, head, snap.mat_nr, blocks);
        mesh.faces[f].no = snap.no;

        if let Err(err) = mesh.assign_face_id(f, id) {
            log::warn!("restored face cannot take back its id: {err}");
            mesh.alloc_face_id(f);
        }
        let loops: SmallVec<[_; 8]> = mesh.face_loops(f).collect();
        for (l, corner) in loops.into_iter().zip(&snap.corners) {
            if let Err(err) = mesh.assign_loop_id(l, corner.id) {
                log::warn!("restored loop cannot take back its id: {err}");
                mesh.alloc_loop_id(l);
            }
        }
        cb.on_face_add(mesh, f);
    }
}

/// Swap the live mesh with the serialized one in `bytes`.
fn swap_full_mesh(bytes: &mut Vec<u8>, mesh: &mut BMesh, cb: &mut dyn LogCallbacks) {
    let stored = match MeshSnapshot::from_bytes(bytes).and_then(|s| BMesh::from_snapshot(&s)) {
        Ok(stored) => stored,
        Err(err) => {
            log::warn!("stored mesh cannot be loaded: {err}");
            return;
        }
    };
    match mesh.to_snapshot().to_bytes() {
        Ok(current) => *bytes = current,
        Err(err) => {
            log::warn!("live mesh cannot be stored: {err}");
            return;
        }
    }
    *mesh = stored;
    cb.on_full_mesh_load(mesh);
}

/// Swap the live id assignment with the stored one.
fn swap_mesh_ids(ids: &mut [Vec<Option<u32>>; 4], mesh: &mut BMesh) {
    let current = [ElemKind::Vert, ElemKind::Edge, ElemKind::Loop, ElemKind::Face]
        .map(|kind| mesh.ids_in_arena_order(kind));
    if mesh.write_ids_in_arena_order(ids) {
        *ids = current;
    } else {
        log::warn!("stored ids do not match the mesh layout, skipping them");
    }
}
