use crate::{BMesh, EdgeId, FaceId, VertId};

/// Notified while the log replays a step, after each element is restored
/// or changed and before each element is removed.
#[allow(unused_variables)]
pub trait LogCallbacks {
    fn on_vert_add(&mut self, mesh: &BMesh, v: VertId) {}
    fn on_vert_kill(&mut self, mesh: &BMesh, v: VertId) {}
    fn on_vert_change(&mut self, mesh: &BMesh, v: VertId) {}

    fn on_edge_add(&mut self, mesh: &BMesh, e: EdgeId) {}
    fn on_edge_kill(&mut self, mesh: &BMesh, e: EdgeId) {}
    fn on_edge_change(&mut self, mesh: &BMesh, e: EdgeId) {}

    fn on_face_add(&mut self, mesh: &BMesh, f: FaceId) {}
    fn on_face_kill(&mut self, mesh: &BMesh, f: FaceId) {}
    fn on_face_change(&mut self, mesh: &BMesh, f: FaceId) {}

    /// The whole mesh was replaced.
    fn on_full_mesh_load(&mut self, mesh: &BMesh) {}
}

impl LogCallbacks for () {}
