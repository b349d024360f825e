//! Change notification for mesh edits.
//!
//! A mesh holds at most one [`MeshTracer`]. The kernel calls it around every
//! structural or value change, always while the affected element is still in
//! the state the hook describes:
//!
//! - `*_create` right after an element is fully linked,
//! - `*_kill` right before an element is dismantled,
//! - `*_topo` right before a live element's links change,
//! - `*_modify` right before a value (position, flags, attributes) changes.
//!
//! [`crate::undo::BMLog`] is built on this.
use crate::{BMesh, EdgeId, FaceId, VertId};

#[allow(unused_variables)]
pub trait MeshTracer: Send + Sync {
    fn on_vert_create(&mut self, mesh: &BMesh, v: VertId) {}
    fn on_edge_create(&mut self, mesh: &BMesh, e: EdgeId) {}
    fn on_face_create(&mut self, mesh: &BMesh, f: FaceId) {}

    fn on_vert_kill(&mut self, mesh: &BMesh, v: VertId) {}
    fn on_edge_kill(&mut self, mesh: &BMesh, e: EdgeId) {}
    fn on_face_kill(&mut self, mesh: &BMesh, f: FaceId) {}

    fn on_edge_topo(&mut self, mesh: &BMesh, e: EdgeId) {}
    fn on_face_topo(&mut self, mesh: &BMesh, f: FaceId) {}

    fn on_vert_modify(&mut self, mesh: &BMesh, v: VertId) {}
    fn on_edge_modify(&mut self, mesh: &BMesh, e: EdgeId) {}
    fn on_face_modify(&mut self, mesh: &BMesh, f: FaceId) {}
}

impl BMesh {
    /// Install `tracer`, returning the previous one.
    pub fn set_tracer(&mut self, tracer: Box<dyn MeshTracer>) -> Option<Box<dyn MeshTracer>> {
        self.tracer.replace(tracer)
    }

    pub fn take_tracer(&mut self) -> Option<Box<dyn MeshTracer>> {
        self.tracer.take()
    }

    pub fn has_tracer(&self) -> bool {
        self.tracer.is_some()
    }

    /// Run `f` against the installed tracer, if any. The tracer is taken out
    /// for the duration so it can look at the whole mesh.
    pub(crate) fn trace(&mut self, f: impl FnOnce(&mut dyn MeshTracer, &BMesh)) {
        if let Some(mut tracer) = self.tracer.take() {
            f(tracer.as_mut(), self);
            self.tracer = Some(tracer);
        }
    }

    /// Report every face around `v` as about to change topology.
    pub(crate) fn trace_faces_around(&mut self, v: VertId) {
        if self.tracer.is_none() {
            return;
        }
        let faces = self.vert_faces(v);
        self.trace(|t, m| faces.iter().for_each(|&f| t.on_face_topo(m, f)));
    }

    /// Report every face using `e` as about to change topology.
    pub(crate) fn trace_radial_faces(&mut self, e: EdgeId) {
        if self.tracer.is_none() {
            return;
        }
        let faces: Vec<FaceId> = self.radial_loops(e).map(|l| self.loops[l].f).collect();
        self.trace(|t, m| faces.iter().for_each(|&f| t.on_face_topo(m, f)));
    }
}
