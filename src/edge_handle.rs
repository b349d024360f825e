use crate::loop_handle::LoopHandle;
use crate::vert_handle::VertHandle;

use crate::iterators::RadialLoopIter;
use crate::{BMesh, Edge, EdgeId, ElemFlags, FaceId, Header, VertId};

#[derive(Clone, Copy)]
pub struct EdgeHandle<'m> {
    id: EdgeId,
    mesh: &'m BMesh,
}

impl<'m> EdgeHandle<'m> {
    pub(crate) fn new(id: EdgeId, mesh: &'m BMesh) -> Self {
        debug_assert!(mesh.edges.contains_key(id));
        Self { id, mesh }
    }

    pub fn id(&self) -> EdgeId {
        self.id
    }

    pub fn vertex_ids(&self) -> [VertId; 2] {
        self.my_ref().verts
    }

    pub fn v1(&self) -> VertHandle<'m> {
        VertHandle::new(self.my_ref().verts[0], self.mesh)
    }

    pub fn v2(&self) -> VertHandle<'m> {
        VertHandle::new(self.my_ref().verts[1], self.mesh)
    }

    /// The endpoint across from `v`.
    pub fn other(&self, v: VertId) -> Option<VertHandle<'m>> {
        self.my_ref()
            .other(v)
            .map(|o| VertHandle::new(o, self.mesh))
    }

    pub fn header(&self) -> &'m Header {
        &self.my_ref().head
    }

    pub fn flag(&self) -> ElemFlags {
        self.my_ref().head.flag
    }

    pub fn loop_(&self) -> Option<LoopHandle<'m>> {
        self.my_ref().l.map(|l| LoopHandle::new(l, self.mesh))
    }

    pub fn radial(&self) -> RadialLoopIter<'m> {
        RadialLoopIter::new(self.mesh, self.id)
    }

    pub fn face_ids(&self) -> impl Iterator<Item = FaceId> + 'm {
        let mesh = self.mesh;
        self.radial().map(move |l| mesh.loops[l].f)
    }

    pub fn face_count(&self) -> usize {
        self.radial().count()
    }

    pub fn is_wire(&self) -> bool {
        self.my_ref().l.is_none()
    }

    pub fn is_boundary(&self) -> bool {
        self.face_count() == 1
    }

    pub fn is_manifold(&self) -> bool {
        self.face_count() == 2
    }

    pub fn length(&self) -> f32 {
        let [a, b] = self.my_ref().verts;
        (self.mesh.verts[a].co - self.mesh.verts[b].co).norm()
    }

    fn my_ref(&self) -> &'m Edge {
        &self.mesh.edges[self.id]
    }
}
