//! Undo log for mesh edits.
//!
//! A [`BMLog`] attached to a mesh records every change the kernel reports
//! into the current *step*. Steps form a list ordered by time; `undo` moves
//! the cursor back one step and restores the mesh to how it was before it,
//! `redo` moves forward again. One step may hold several combined entries,
//! for instance a full mesh copy followed by further edits.
//!
//! Elements are tracked by stable id, so the mesh must have ids enabled.
//! [`BMLog::attach`] turns them on if needed.
//!
//! ```ignore
//! let log = BMLog::new(LogParams::default());
//! log.attach(&mut mesh);
//! log.entry_add(&mesh);
//! mesh.split_edge_make_vert(v, e)?;
//! log.undo(&mut mesh, &mut ());
//! ```
use std::sync::Arc;

use parking_lot::RwLock;
use slotmap::SlotMap;

use crate::{
    config::{IdParams, LogParams},
    tracer::MeshTracer,
    BMesh, EdgeId, ElemKind, FaceId, MeshError, Vec3, VertId,
};

mod callbacks;
mod entry;
mod replay;

pub use callbacks::LogCallbacks;
pub use entry::{CornerSnap, EdgeSnap, EntryId, FaceSnap, VertSnap};

use entry::{ElemSnapshot, EntryKind, LogEntry, PartialEntry};

#[derive(Debug)]
pub(crate) struct LogState {
    entries: SlotMap<EntryId, LogEntry>,
    first: Option<EntryId>,
    last: Option<EntryId>,
    /// Head of the most recent step that is applied to the mesh.
    current: Option<EntryId>,
    /// Number of steps.
    len: usize,
    params: LogParams,
}

impl LogState {
    fn new(params: LogParams) -> Self {
        Self {
            entries: SlotMap::with_key(),
            first: None,
            last: None,
            current: None,
            len: 0,
            params,
        }
    }

    /// Entries of the step starting at `head`, in recording order.
    fn chain(&self, head: EntryId) -> Vec<EntryId> {
        let mut chain = Vec::new();
        let mut next = Some(head);
        while let Some(id) = next {
            chain.push(id);
            next = self.entries.get(id).and_then(|e| e.combined_next);
        }
        chain
    }

    /// Append a new step after the last one and make it current.
    fn push_step(&mut self, kind: EntryKind) -> EntryId {
        let id = self.entries.insert(LogEntry::new(kind));
        if let Some(last) = self.last.and_then(|l| self.entries.get_mut(l)) {
            last.next = Some(id);
        }
        self.entries[id].prev = self.last;
        if self.first.is_none() {
            self.first = Some(id);
        }
        self.last = Some(id);
        self.current = Some(id);
        self.len += 1;
        id
    }

    /// Add `kind` to the end of the current step, or start a step with it.
    fn push_combined(&mut self, kind: EntryKind) -> EntryId {
        let Some(head) = self.current else {
            return self.push_step(kind);
        };
        let tail = self.chain(head).last().copied().unwrap_or(head);
        let id = self.entries.insert(LogEntry::new(kind));
        self.entries[id].combined_prev = Some(tail);
        if let Some(tail) = self.entries.get_mut(tail) {
            tail.combined_next = Some(id);
        }
        id
    }

    /// The entry edits are recorded into: the tail of the current step,
    /// extended with a fresh partial entry if the tail holds something else.
    fn recording(&mut self, mesh: &BMesh) -> Option<&mut PartialEntry> {
        let head = self.current?;
        let mut tail = self.chain(head).last().copied().unwrap_or(head);
        if !matches!(self.entries.get(tail)?.kind, EntryKind::Partial(_)) {
            tail = self.push_combined(EntryKind::Partial(Box::new(PartialEntry::new(mesh))));
        }
        match &mut self.entries.get_mut(tail)?.kind {
            EntryKind::Partial(entry) => Some(entry.as_mut()),
            _ => None,
        }
    }

    /// Drop every step after the current one.
    fn drop_redo_tail(&mut self) {
        let mut next = match self.current {
            Some(c) => self.entries.get(c).and_then(|e| e.next),
            None => self.first,
        };
        while let Some(head) = next {
            next = self.entries.get(head).and_then(|e| e.next);
            self.remove_step(head);
        }
    }

    fn remove_step(&mut self, head: EntryId) {
        let Some(entry) = self.entries.get(head) else {
            return;
        };
        let (prev, next) = (entry.prev, entry.next);
        match prev.and_then(|p| self.entries.get_mut(p)) {
            Some(p) => p.next = next,
            None => self.first = next,
        }
        match next.and_then(|n| self.entries.get_mut(n)) {
            Some(n) => n.prev = prev,
            None => self.last = prev,
        }
        if self.current == Some(head) {
            self.current = prev;
        }
        for id in self.chain(head) {
            self.entries.remove(id);
        }
        self.len -= 1;
    }

    /// Remove a sub-entry from the middle or end of its step.
    fn remove_combined(&mut self, id: EntryId) {
        let Some(entry) = self.entries.remove(id) else {
            return;
        };
        if let Some(p) = entry.combined_prev.and_then(|p| self.entries.get_mut(p)) {
            p.combined_next = entry.combined_next;
        }
        if let Some(n) = entry.combined_next.and_then(|n| self.entries.get_mut(n)) {
            n.combined_prev = entry.combined_prev;
        }
    }

    /// Drop the oldest steps past the configured limit. The current step is
    /// never dropped.
    fn prune(&mut self) {
        let Some(max) = self.params.max_entries else {
            return;
        };
        while self.len > max {
            match self.first {
                Some(first) if Some(first) != self.current => {
                    log::debug!("undo log full, dropping the oldest step");
                    self.remove_step(first);
                }
                _ => break,
            }
        }
    }

    fn undo(&mut self, mesh: &mut BMesh, cb: &mut dyn LogCallbacks) -> bool {
        let Some(head) = self.current else {
            return false;
        };
        for id in self.chain(head).into_iter().rev() {
            if let Some(entry) = self.entries.get_mut(id) {
                entry.kind.undo(mesh, cb);
            }
        }
        self.current = self.entries.get(head).and_then(|e| e.prev);
        true
    }

    fn redo(&mut self, mesh: &mut BMesh, cb: &mut dyn LogCallbacks) -> bool {
        let target = match self.current {
            Some(c) => self.entries.get(c).and_then(|e| e.next),
            None => self.first,
        };
        let Some(head) = target else {
            return false;
        };
        for id in self.chain(head) {
            if let Some(entry) = self.entries.get_mut(id) {
                entry.kind.redo(mesh, cb);
            }
        }
        self.current = Some(head);
        true
    }

    /// First recorded state of vertex `id` in the current step.
    fn original_vert(&self, id: u32) -> Option<&VertSnap> {
        let head = self.current?;
        self.chain(head)
            .into_iter()
            .find_map(|e| match &self.entries.get(e)?.kind {
                EntryKind::Partial(entry) => entry
                    .verts
                    .pre
                    .get(&id)
                    .or_else(|| entry.verts.modified.get(&id)),
                _ => None,
            })
    }
}

/// Shared handle to an undo log. Clones refer to the same log.
#[derive(Clone)]
pub struct BMLog {
    state: Arc<RwLock<LogState>>,
}

impl std::fmt::Debug for BMLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("BMLog")
            .field("steps", &state.len)
            .field("entries", &state.entries.len())
            .field("current", &state.current)
            .finish()
    }
}

impl Default for BMLog {
    fn default() -> Self {
        Self::new(LogParams::default())
    }
}

impl BMLog {
    pub fn new(params: LogParams) -> Self {
        Self {
            state: Arc::new(RwLock::new(LogState::new(params))),
        }
    }

    /// Start recording the edits of `mesh`, turning on stable ids if they
    /// are off. Replaces any tracer the mesh had.
    pub fn attach(&self, mesh: &mut BMesh) {
        if !mesh.ids_enabled() {
            log::debug!("enabling stable ids for the undo log");
            mesh.enable_ids(IdParams::default());
        }
        if mesh
            .set_tracer(Box::new(LogTracer { log: self.clone() }))
            .is_some()
        {
            log::debug!("undo log replaced an existing mesh tracer");
        }
    }

    /// Stop recording. Removes whatever tracer the mesh has.
    pub fn detach(&self, mesh: &mut BMesh) {
        mesh.take_tracer();
    }

    /// Start a new step after the current one. Steps that were undone are
    /// dropped, as are the oldest ones past [`LogParams::max_entries`].
    pub fn entry_add(&self, mesh: &BMesh) -> EntryId {
        let mut state = self.state.write();
        state.drop_redo_tail();
        let id = state.push_step(EntryKind::Partial(Box::new(PartialEntry::new(mesh))));
        state.prune();
        log::debug!("undo step {id:?} started, {} steps", state.len);
        id
    }

    /// Like [`BMLog::entry_add`], but with `combine` the new entry becomes
    /// part of the current step, to be undone and redone together with it.
    pub fn entry_add_ex(&self, mesh: &BMesh, combine: bool) -> EntryId {
        if !combine {
            return self.entry_add(mesh);
        }
        let id = self
            .state
            .write()
            .push_combined(EntryKind::Partial(Box::new(PartialEntry::new(mesh))));
        log::debug!("undo entry {id:?} combined into the current step");
        id
    }

    /// Forget `entry` without touching the mesh. A step head takes its
    /// combined entries with it. Returns `false` for unknown entries.
    pub fn entry_drop(&self, entry: EntryId) -> bool {
        let mut state = self.state.write();
        let Some(e) = state.entries.get(entry) else {
            return false;
        };
        if e.combined_prev.is_some() {
            state.remove_combined(entry);
        } else {
            state.remove_step(entry);
        }
        true
    }

    pub fn entry_prev(&self, entry: EntryId) -> Option<EntryId> {
        self.state.read().entries.get(entry)?.prev
    }

    pub fn entry_next(&self, entry: EntryId) -> Option<EntryId> {
        self.state.read().entries.get(entry)?.next
    }

    /// Head of the last applied step, `None` when everything is undone.
    pub fn current_entry(&self) -> Option<EntryId> {
        self.state.read().current
    }

    /// Number of steps, applied or not.
    pub fn entry_count(&self) -> usize {
        self.state.read().len
    }

    pub fn params(&self) -> LogParams {
        self.state.read().params.clone()
    }

    /// Revert the current step. Returns `false` if there is nothing to undo.
    pub fn undo(&self, mesh: &mut BMesh, callbacks: &mut dyn LogCallbacks) -> bool {
        let tracer = mesh.take_tracer();
        let done = self.state.write().undo(mesh, callbacks);
        if let Some(tracer) = tracer {
            mesh.set_tracer(tracer);
        }
        done
    }

    /// Reapply the step after the current one. Returns `false` if there is
    /// nothing to redo.
    pub fn redo(&self, mesh: &mut BMesh, callbacks: &mut dyn LogCallbacks) -> bool {
        let tracer = mesh.take_tracer();
        let done = self.state.write().redo(mesh, callbacks);
        if let Some(tracer) = tracer {
            mesh.set_tracer(tracer);
        }
        done
    }

    /// Store a full copy of `mesh` in the current step. Undoing the step
    /// brings this exact mesh back, whatever happened to it in between,
    /// tracked or not.
    pub fn full_mesh(&self, mesh: &BMesh) -> Result<EntryId, MeshError> {
        let bytes = mesh.to_snapshot().to_bytes()?;
        let id = self.state.write().push_combined(EntryKind::FullMesh(bytes));
        log::debug!("full mesh stored in undo entry {id:?}");
        Ok(id)
    }

    /// Store the id assignment of `mesh` in the current step. Undoing the
    /// step restores it, as long as the element layout is the same.
    pub fn mesh_ids(&self, mesh: &BMesh) -> EntryId {
        let ids = [ElemKind::Vert, ElemKind::Edge, ElemKind::Loop, ElemKind::Face]
            .map(|kind| mesh.ids_in_arena_order(kind));
        self.state
            .write()
            .push_combined(EntryKind::MeshIds(Box::new(ids)))
    }

    /// Position of vertex `id` at the start of the current step, if the
    /// step changed it.
    pub fn original_vert_co(&self, id: u32) -> Option<Vec3> {
        self.state.read().original_vert(id).map(|s| s.co)
    }

    /// Normal of vertex `id` at the start of the current step, if the step
    /// changed it.
    pub fn original_vert_no(&self, id: u32) -> Option<Vec3> {
        self.state.read().original_vert(id).map(|s| s.no)
    }

    fn record(&self, mesh: &BMesh, f: impl FnOnce(&mut PartialEntry)) {
        let mut state = self.state.write();
        match state.recording(mesh) {
            Some(entry) => f(entry),
            None => log::debug!("no open undo step, change not recorded"),
        }
    }

    fn added<S: ElemSnapshot>(&self, mesh: &BMesh, key: S::Key) {
        let Some(id) = S::id_of(mesh, key) else {
            log::warn!("added {:?} has no id, not recorded", S::KIND);
            return;
        };
        log::trace!("{:?} {id} added", S::KIND);
        self.record(mesh, |entry| S::log_of(entry).1.added(id));
    }

    fn removed<S: ElemSnapshot>(&self, mesh: &BMesh, key: S::Key) {
        let Some(id) = S::id_of(mesh, key) else {
            log::warn!("removed {:?} has no id, not recorded", S::KIND);
            return;
        };
        log::trace!("{:?} {id} removed", S::KIND);
        self.record(mesh, |entry| {
            let (schemas, elems) = S::log_of(entry);
            elems.removed(id, || S::capture(mesh, schemas, key));
        });
    }

    fn topo_pre<S: ElemSnapshot>(&self, mesh: &BMesh, key: S::Key) {
        let Some(id) = S::id_of(mesh, key) else {
            log::warn!("rewired {:?} has no id, not recorded", S::KIND);
            return;
        };
        log::trace!("{:?} {id} rewired", S::KIND);
        self.record(mesh, |entry| {
            let (schemas, elems) = S::log_of(entry);
            elems.topo_pre(id, || S::capture(mesh, schemas, key));
        });
    }

    fn before_modified<S: ElemSnapshot>(&self, mesh: &BMesh, key: S::Key) {
        if !self.state.read().params.track_values {
            return;
        }
        let Some(id) = S::id_of(mesh, key) else {
            log::warn!("modified {:?} has no id, not recorded", S::KIND);
            return;
        };
        log::trace!("{:?} {id} modified", S::KIND);
        self.record(mesh, |entry| {
            let (schemas, elems) = S::log_of(entry);
            elems.before_modified(id, || S::capture_values(mesh, schemas, key));
        });
    }

    pub fn vert_added(&self, mesh: &BMesh, v: VertId) {
        self.added::<VertSnap>(mesh, v);
    }

    pub fn edge_added(&self, mesh: &BMesh, e: EdgeId) {
        self.added::<EdgeSnap>(mesh, e);
    }

    /// Record `f` as new in the current step. Its loops go with it.
    pub fn face_added(&self, mesh: &BMesh, f: FaceId) {
        self.added::<FaceSnap>(mesh, f);
    }

    /// Record `v` as about to be removed. Must run while it is still intact.
    pub fn vert_removed(&self, mesh: &BMesh, v: VertId) {
        self.removed::<VertSnap>(mesh, v);
    }

    pub fn edge_removed(&self, mesh: &BMesh, e: EdgeId) {
        self.removed::<EdgeSnap>(mesh, e);
    }

    pub fn face_removed(&self, mesh: &BMesh, f: FaceId) {
        self.removed::<FaceSnap>(mesh, f);
    }

    /// Record `e` as about to get other endpoints.
    pub fn edge_topo_pre(&self, mesh: &BMesh, e: EdgeId) {
        self.topo_pre::<EdgeSnap>(mesh, e);
    }

    /// Record `f` as about to gain, lose or move corners.
    pub fn face_topo_pre(&self, mesh: &BMesh, f: FaceId) {
        self.topo_pre::<FaceSnap>(mesh, f);
    }

    pub fn vert_before_modified(&self, mesh: &BMesh, v: VertId) {
        self.before_modified::<VertSnap>(mesh, v);
    }

    pub fn edge_before_modified(&self, mesh: &BMesh, e: EdgeId) {
        self.before_modified::<EdgeSnap>(mesh, e);
    }

    /// Face values include the values of its corners.
    pub fn face_before_modified(&self, mesh: &BMesh, f: FaceId) {
        self.before_modified::<FaceSnap>(mesh, f);
    }

    /// Record every element of `mesh` as added, as when the whole mesh was
    /// just built.
    pub fn all_added(&self, mesh: &BMesh) {
        mesh.vert_ids().for_each(|v| self.vert_added(mesh, v));
        mesh.edge_ids().for_each(|e| self.edge_added(mesh, e));
        mesh.face_ids().for_each(|f| self.face_added(mesh, f));
    }

    /// Record every element of `mesh` as removed, before it is cleared.
    pub fn before_all_removed(&self, mesh: &BMesh) {
        mesh.face_ids().for_each(|f| self.face_removed(mesh, f));
        mesh.edge_ids().for_each(|e| self.edge_removed(mesh, e));
        mesh.vert_ids().for_each(|v| self.vert_removed(mesh, v));
    }
}

/// Feeds kernel notifications into a log.
struct LogTracer {
    log: BMLog,
}

impl MeshTracer for LogTracer {
    fn on_vert_create(&mut self, mesh: &BMesh, v: VertId) {
        self.log.vert_added(mesh, v);
    }
    fn on_edge_create(&mut self, mesh: &BMesh, e: EdgeId) {
        self.log.edge_added(mesh, e);
    }
    fn on_face_create(&mut self, mesh: &BMesh, f: FaceId) {
        self.log.face_added(mesh, f);
    }

    fn on_vert_kill(&mut self, mesh: &BMesh, v: VertId) {
        self.log.vert_removed(mesh, v);
    }
    fn on_edge_kill(&mut self, mesh: &BMesh, e: EdgeId) {
        self.log.edge_removed(mesh, e);
    }
    fn on_face_kill(&mut self, mesh: &BMesh, f: FaceId) {
        self.log.face_removed(mesh, f);
    }

    fn on_edge_topo(&mut self, mesh: &BMesh, e: EdgeId) {
        self.log.edge_topo_pre(mesh, e);
    }
    fn on_face_topo(&mut self, mesh: &BMesh, f: FaceId) {
        self.log.face_topo_pre(mesh, f);
    }

    fn on_vert_modify(&mut self, mesh: &BMesh, v: VertId) {
        self.log.vert_before_modified(mesh, v);
    }
    fn on_edge_modify(&mut self, mesh: &BMesh, e: EdgeId) {
        self.log.edge_before_modified(mesh, e);
    }
    fn on_face_modify(&mut self, mesh: &BMesh, f: FaceId) {
        self.log.face_before_modified(mesh, f);
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        collapse::CollapseOptions,
        config::MeshParams,
        euler::{JoinEdgeOptions, Scratch},
        fixtures,
        validation::check_mesh,
    };

    use super::*;

    /// What undo and redo must bring back, keyed by id.
    #[derive(Debug, PartialEq)]
    struct State {
        verts: Vec<(u32, [f32; 3])>,
        edges: Vec<(u32, [u32; 2])>,
        /// Corners as (vertex id, loop id), starting at the first loop.
        faces: Vec<(u32, Vec<(u32, u32)>)>,
    }

    fn state(mesh: &BMesh) -> State {
        let mut verts: Vec<(u32, [f32; 3])> = mesh
            .vert_ids()
            .map(|v| (mesh.vert_id(v).unwrap(), mesh.verts[v].co.into()))
            .collect();
        let mut edges: Vec<(u32, [u32; 2])> = mesh
            .edge_ids()
            .map(|e| {
                let mut ends = mesh.edges[e].verts.map(|v| mesh.vert_id(v).unwrap());
                ends.sort();
                (mesh.edge_id(e).unwrap(), ends)
            })
            .collect();
        let mut faces: Vec<(u32, Vec<(u32, u32)>)> = mesh
            .face_ids()
            .map(|f| {
                let corners = mesh
                    .face_loops(f)
                    .map(|l| (mesh.vert_id(mesh.loops[l].v).unwrap(), mesh.loop_id(l).unwrap()))
                    .collect();
                (mesh.face_id(f).unwrap(), corners)
            })
            .collect();
        verts.sort_by_key(|&(id, _)| id);
        edges.sort();
        faces.sort();
        State {
            verts,
            edges,
            faces,
        }
    }

    fn logged(mut mesh: BMesh) -> (BMesh, BMLog) {
        let _ = env_logger::builder().is_test(true).try_init();
        let log = BMLog::default();
        log.attach(&mut mesh);
        (mesh, log)
    }

    fn vert(mesh: &BMesh, id: u32) -> VertId {
        mesh.vert_from_id(id).unwrap()
    }

    /// Undo then redo the current step, checking the mesh lands on `before`
    /// and `after` and stays valid.
    fn round_trip(mesh: &mut BMesh, log: &BMLog, before: &State, after: &State) {
        assert!(log.undo(mesh, &mut ()));
        assert!(check_mesh(mesh).is_ok());
        assert_eq!(&state(mesh), before);

        assert!(log.redo(mesh, &mut ()));
        assert!(check_mesh(mesh).is_ok());
        assert_eq!(&state(mesh), after);
    }

    #[test]
    fn split_edge_undo_redo() {
        let (mut mesh, log) = logged(fixtures::grid(2, MeshParams::with_ids()));
        let before = state(&mesh);

        log.entry_add(&mesh);
        let e = mesh.edge_exists(vert(&mesh, 1), vert(&mesh, 4)).unwrap();
        mesh.edge_split(e, vert(&mesh, 1), 0.25).unwrap();
        let after = state(&mesh);
        assert_ne!(before, after);

        round_trip(&mut mesh, &log, &before, &after);
        assert!(mesh.has_tracer());
    }

    #[test]
    fn join_edge_undo_redo() {
        let (mut mesh, log) = logged(fixtures::grid(2, MeshParams::with_ids()));
        let start = state(&mesh);

        log.entry_add(&mesh);
        let e = mesh.edge_exists(vert(&mesh, 1), vert(&mesh, 4)).unwrap();
        let (v_new, _) = mesh.split_edge_make_vert(vert(&mesh, 1), e).unwrap();
        let split = state(&mesh);

        log.entry_add(&mesh);
        let e_kill = mesh.edge_exists(v_new, vert(&mesh, 4)).unwrap();
        let mut scratch = Scratch::new();
        mesh.join_edge_kill_vert(e_kill, v_new, JoinEdgeOptions::default(), &mut scratch)
            .unwrap();
        let joined = state(&mesh);

        round_trip(&mut mesh, &log, &split, &joined);

        assert!(log.undo(&mut mesh, &mut ()));
        assert!(log.undo(&mut mesh, &mut ()));
        assert!(!log.undo(&mut mesh, &mut ()));
        assert_eq!(state(&mesh), start);
        assert!(log.redo(&mut mesh, &mut ()));
        assert!(log.redo(&mut mesh, &mut ()));
        assert!(!log.redo(&mut mesh, &mut ()));
        assert_eq!(state(&mesh), joined);
        assert!(check_mesh(&mesh).is_ok());
    }

    #[test]
    fn collapse_undo_redo() {
        let (mut mesh, log) = logged(fixtures::grid(2, MeshParams::with_ids()));
        let before = state(&mesh);

        log.entry_add(&mesh);
        let e = mesh.edge_exists(vert(&mesh, 1), vert(&mesh, 4)).unwrap();
        let mut scratch = Scratch::new();
        mesh.join_vert_kill_edge(e, vert(&mesh, 1), CollapseOptions::default(), &mut scratch)
            .unwrap();
        let after = state(&mesh);
        assert_eq!(mesh.face_count(), 4);

        round_trip(&mut mesh, &log, &before, &after);
    }

    #[test]
    fn collapse_with_duplicates_undo_redo() {
        let (mut mesh, log) = logged(fixtures::tetrahedron(MeshParams::with_ids()));
        let before = state(&mesh);

        log.entry_add(&mesh);
        let e = mesh.edge_exists(vert(&mesh, 0), vert(&mesh, 1)).unwrap();
        let mut scratch = Scratch::new();
        mesh.join_vert_kill_edge(e, vert(&mesh, 1), CollapseOptions::default(), &mut scratch)
            .unwrap();
        let after = state(&mesh);
        assert_eq!(mesh.face_count(), 1);

        round_trip(&mut mesh, &log, &before, &after);
    }

    #[test]
    fn face_split_and_join_undo_redo() {
        let (mut mesh, log) = logged(fixtures::grid(2, MeshParams::with_ids()));
        let start = state(&mesh);
        let f = mesh.face_from_id(0).unwrap();
        let (a, c) = (vert(&mesh, 0), vert(&mesh, 4));

        log.entry_add(&mesh);
        let l_a = mesh.face_vert_share_loop(f, a).unwrap();
        let l_c = mesh.face_vert_share_loop(f, c).unwrap();
        let (f2, _) = mesh.face_split(f, l_a, l_c, None, false).unwrap();
        let split = state(&mesh);

        log.entry_add(&mesh);
        let diagonal = mesh.edge_exists(a, c).unwrap();
        let mut scratch = Scratch::new();
        mesh.join_face_kill_edge(f, f2, diagonal, &mut scratch)
            .unwrap();
        let joined = state(&mesh);
        // Same shape as at the start, but the corners were rebuilt.
        assert_eq!(mesh.face_count(), 4);

        round_trip(&mut mesh, &log, &split, &joined);
        assert!(log.undo(&mut mesh, &mut ()));
        assert!(log.undo(&mut mesh, &mut ()));
        assert_eq!(state(&mesh), start);
    }

    #[test]
    fn faces_join_undo_redo() {
        let (mut mesh, log) = logged(fixtures::grid(2, MeshParams::with_ids()));
        let before = state(&mesh);

        log.entry_add(&mesh);
        let faces: Vec<_> = mesh.face_ids().collect();
        let mut scratch = Scratch::new();
        mesh.faces_join(&faces, true, &mut scratch).unwrap();
        let after = state(&mesh);
        assert_eq!(mesh.face_count(), 1);

        round_trip(&mut mesh, &log, &before, &after);
        assert_eq!(mesh.face_count(), 1);
    }

    #[test]
    fn values_undo_redo() {
        let (mut mesh, log) = logged(fixtures::cube(MeshParams::with_ids()));
        let v = vert(&mesh, 2);
        let old = mesh.verts[v].co;
        let before = state(&mesh);

        log.entry_add(&mesh);
        mesh.vert_mut(v).unwrap().co = Vec3::new(5.0, 5.0, 5.0);
        mesh.vert_mut(v).unwrap().co.x = 6.0;
        let after = state(&mesh);
        assert_eq!(log.original_vert_co(2), Some(old));
        assert_eq!(log.original_vert_co(3), None);

        round_trip(&mut mesh, &log, &before, &after);
        assert_eq!(mesh.verts[v].co, Vec3::new(6.0, 5.0, 5.0));
    }

    #[test]
    fn edits_after_redo_stay_in_the_step() {
        let (mut mesh, log) = logged(fixtures::grid(1, MeshParams::with_ids()));
        let before = state(&mesh);

        log.entry_add(&mesh);
        let e = mesh.edge_exists(vert(&mesh, 0), vert(&mesh, 1)).unwrap();
        let (v_new, _) = mesh.split_edge_make_vert(vert(&mesh, 0), e).unwrap();
        let id = mesh.vert_id(v_new).unwrap();
        assert!(log.undo(&mut mesh, &mut ()));
        assert!(log.redo(&mut mesh, &mut ()));

        let v_new = vert(&mesh, id);
        mesh.vert_mut(v_new).unwrap().co = Vec3::new(9.0, 9.0, 9.0);
        let after = state(&mesh);

        round_trip(&mut mesh, &log, &before, &after);
        assert_eq!(mesh.verts[vert(&mesh, id)].co, Vec3::new(9.0, 9.0, 9.0));
    }

    #[test]
    fn values_are_ignored_when_not_tracked() {
        let mut mesh = fixtures::quad(MeshParams::with_ids()).0;
        let log = BMLog::new(LogParams {
            track_values: false,
            ..Default::default()
        });
        log.attach(&mut mesh);
        let v = vert(&mesh, 0);

        log.entry_add(&mesh);
        mesh.vert_mut(v).unwrap().co = Vec3::new(5.0, 5.0, 5.0);
        assert!(log.undo(&mut mesh, &mut ()));
        assert_eq!(mesh.verts[v].co, Vec3::new(5.0, 5.0, 5.0));
    }

    #[test]
    fn short_lived_elements_leave_no_trace() {
        let (mut mesh, log) = logged(fixtures::grid(1, MeshParams::with_ids()));
        let before = state(&mesh);

        log.entry_add(&mesh);
        let a = mesh.create_vert(Vec3::new(3.0, 0.0, 0.0), None);
        let b = mesh.create_vert(Vec3::new(4.0, 0.0, 0.0), None);
        mesh.create_edge(a, b, None, false).unwrap();
        mesh.kill_vert(a).unwrap();
        mesh.kill_vert(b).unwrap();

        {
            let state = log.state.read();
            let head = state.current.unwrap();
            match &state.entries[head].kind {
                EntryKind::Partial(entry) => assert!(entry.is_empty()),
                kind => panic!("unexpected entry {kind:?}"),
            }
        }
        assert!(log.undo(&mut mesh, &mut ()));
        assert_eq!(state(&mesh), before);
    }

    #[derive(Default)]
    struct Counts {
        added: [usize; 3],
        killed: [usize; 3],
        changed: [usize; 3],
        loaded: usize,
    }

    impl LogCallbacks for Counts {
        fn on_vert_add(&mut self, _: &BMesh, _: VertId) {
            self.added[0] += 1;
        }
        fn on_edge_add(&mut self, _: &BMesh, _: EdgeId) {
            self.added[1] += 1;
        }
        fn on_face_add(&mut self, mesh: &BMesh, f: FaceId) {
            assert!(mesh.face(f).is_some());
            self.added[2] += 1;
        }
        fn on_vert_kill(&mut self, mesh: &BMesh, v: VertId) {
            assert!(mesh.vert(v).is_some());
            self.killed[0] += 1;
        }
        fn on_edge_kill(&mut self, _: &BMesh, _: EdgeId) {
            self.killed[1] += 1;
        }
        fn on_face_kill(&mut self, _: &BMesh, _: FaceId) {
            self.killed[2] += 1;
        }
        fn on_vert_change(&mut self, _: &BMesh, _: VertId) {
            self.changed[0] += 1;
        }
        fn on_edge_change(&mut self, _: &BMesh, _: EdgeId) {
            self.changed[1] += 1;
        }
        fn on_face_change(&mut self, _: &BMesh, _: FaceId) {
            self.changed[2] += 1;
        }
        fn on_full_mesh_load(&mut self, _: &BMesh) {
            self.loaded += 1;
        }
    }

    #[test]
    fn callbacks_follow_replay() {
        let (mut mesh, log) = logged(fixtures::grid(2, MeshParams::with_ids()));

        log.entry_add(&mesh);
        let e = mesh.edge_exists(vert(&mesh, 1), vert(&mesh, 4)).unwrap();
        mesh.split_edge_make_vert(vert(&mesh, 1), e).unwrap();

        let mut counts = Counts::default();
        assert!(log.undo(&mut mesh, &mut counts));
        // The two faces along the edge and the edge itself are rebuilt, the
        // new vertex and edge go away.
        assert_eq!(counts.killed, [1, 2, 2]);
        assert_eq!(counts.added, [0, 1, 2]);

        let mut counts = Counts::default();
        assert!(log.redo(&mut mesh, &mut counts));
        assert_eq!(counts.killed, [0, 1, 2]);
        assert_eq!(counts.added, [1, 2, 2]);
        assert_eq!(counts.changed, [0, 0, 0]);
    }

    #[test]
    fn full_mesh_restores_untracked_edits() {
        let (mut mesh, log) = logged(fixtures::cube(MeshParams::with_ids()));
        let before = state(&mesh);

        log.entry_add(&mesh);
        log.full_mesh(&mesh).unwrap();
        log.detach(&mut mesh);
        let f = mesh.face_from_id(0).unwrap();
        mesh.kill_face(f).unwrap();
        let after = state(&mesh);
        log.attach(&mut mesh);

        let mut counts = Counts::default();
        assert!(log.undo(&mut mesh, &mut counts));
        assert_eq!(counts.loaded, 1);
        assert_eq!(state(&mesh), before);
        assert!(check_mesh(&mesh).is_ok());
        assert!(mesh.has_tracer());

        assert!(log.redo(&mut mesh, &mut counts));
        assert_eq!(counts.loaded, 2);
        assert_eq!(state(&mesh), after);
    }

    #[test]
    fn full_mesh_combines_with_later_edits() {
        let (mut mesh, log) = logged(fixtures::grid(2, MeshParams::with_ids()));
        let before = state(&mesh);

        log.entry_add(&mesh);
        log.full_mesh(&mesh).unwrap();
        // Recorded into a partial entry appended after the full copy.
        let e = mesh.edge_exists(vert(&mesh, 1), vert(&mesh, 4)).unwrap();
        mesh.split_edge_make_vert(vert(&mesh, 1), e).unwrap();
        let after = state(&mesh);
        assert_eq!(log.entry_count(), 1);

        round_trip(&mut mesh, &log, &before, &after);
    }

    #[test]
    fn mesh_ids_swap_back() {
        let (mut mesh, log) = logged(fixtures::quad(MeshParams::with_ids()).0);
        let (a, b) = (vert(&mesh, 0), vert(&mesh, 1));

        log.entry_add(&mesh);
        log.mesh_ids(&mesh);
        mesh.release_vert_id(a, false);
        mesh.release_vert_id(b, false);
        mesh.assign_vert_id(a, 1).unwrap();
        mesh.assign_vert_id(b, 0).unwrap();

        assert!(log.undo(&mut mesh, &mut ()));
        assert_eq!(mesh.vert_id(a), Some(0));
        assert_eq!(mesh.vert_id(b), Some(1));
        assert_eq!(mesh.vert_from_id(0), Some(a));

        assert!(log.redo(&mut mesh, &mut ()));
        assert_eq!(mesh.vert_id(a), Some(1));
        assert_eq!(mesh.vert_id(b), Some(0));
    }

    #[test]
    fn oldest_steps_are_pruned() {
        let mut mesh = fixtures::quad(MeshParams::with_ids()).0;
        let log = BMLog::new(LogParams {
            max_entries: Some(2),
            ..Default::default()
        });
        log.attach(&mut mesh);

        let first = log.entry_add(&mesh);
        let second = log.entry_add(&mesh);
        let third = log.entry_add(&mesh);
        assert_eq!(log.entry_count(), 2);
        assert_eq!(log.entry_prev(second), None);
        assert_eq!(log.entry_next(second), Some(third));
        assert_eq!(log.entry_next(first), None);
        assert_eq!(log.current_entry(), Some(third));
    }

    #[test]
    fn new_step_drops_undone_ones() {
        let (mut mesh, log) = logged(fixtures::quad(MeshParams::with_ids()).0);
        log.entry_add(&mesh);
        let v = vert(&mesh, 0);
        mesh.vert_mut(v).unwrap().co = Vec3::repeat(2.0);

        assert!(log.undo(&mut mesh, &mut ()));
        assert_eq!(log.current_entry(), None);
        log.entry_add(&mesh);
        assert_eq!(log.entry_count(), 1);
        assert!(!log.redo(&mut mesh, &mut ()));
    }

    #[test]
    fn dropping_entries() {
        let (mesh, log) = logged(fixtures::quad(MeshParams::with_ids()).0);
        let first = log.entry_add(&mesh);
        let sub = log.entry_add_ex(&mesh, true);
        let second = log.entry_add(&mesh);
        assert_eq!(log.entry_count(), 2);

        assert!(log.entry_drop(sub));
        assert!(!log.entry_drop(sub));
        assert!(log.entry_drop(second));
        assert_eq!(log.current_entry(), Some(first));
        assert_eq!(log.entry_next(first), None);
        assert_eq!(log.entry_count(), 1);
    }

    #[test]
    fn edits_without_a_step_are_not_recorded() {
        let (mut mesh, log) = logged(fixtures::quad(MeshParams::with_ids()).0);
        mesh.create_vert(Vec3::zeros(), None);
        assert!(!log.undo(&mut mesh, &mut ()));
        assert_eq!(mesh.vert_count(), 5);
    }

    #[test]
    fn attach_enables_ids() {
        let (mesh, log) = logged(fixtures::quad(MeshParams::default()).0);
        assert!(mesh.ids_enabled());
        assert!(mesh.has_tracer());
        log.all_added(&mesh);
        assert_eq!(log.entry_count(), 0);
    }

    #[test]
    fn all_added_then_undone_clears_the_mesh() {
        let log = BMLog::default();
        log.entry_add(&BMesh::new(MeshParams::with_ids()));
        let mut mesh = fixtures::quad(MeshParams::with_ids()).0;
        log.attach(&mut mesh);
        log.all_added(&mesh);

        assert!(log.undo(&mut mesh, &mut ()));
        assert_eq!(mesh.vert_count(), 0);
        assert_eq!(mesh.face_count(), 0);
        assert!(log.redo(&mut mesh, &mut ()));
        assert_eq!(mesh.face_count(), 1);
        assert_eq!(mesh.loop_count(), 4);
        assert!(check_mesh(&mesh).is_ok());
    }
}
