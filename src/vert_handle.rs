use smallvec::SmallVec;

use crate::edge_handle::EdgeHandle;
use crate::face_handle::FaceHandle;
use crate::iterators::DiskEdgeIter;

use crate::{BMesh, ElemFlags, FaceId, Header, Vec3, Vert, VertId};

#[derive(Clone, Copy)]
pub struct VertHandle<'m> {
    id: VertId,
    mesh: &'m BMesh,
}

impl<'m> VertHandle<'m> {
    pub(crate) fn new(id: VertId, mesh: &'m BMesh) -> Self {
        debug_assert!(mesh.verts.contains_key(id));
        Self { id, mesh }
    }

    pub fn id(&self) -> VertId {
        self.id
    }

    pub fn co(&self) -> Vec3 {
        self.my_ref().co
    }

    pub fn no(&self) -> Vec3 {
        self.my_ref().no
    }

    pub fn header(&self) -> &'m Header {
        &self.my_ref().head
    }

    pub fn flag(&self) -> ElemFlags {
        self.my_ref().head.flag
    }

    /// Any incident edge, `None` for an isolated vertex.
    pub fn edge(&self) -> Option<EdgeHandle<'m>> {
        self.my_ref().e.map(|e| EdgeHandle::new(e, self.mesh))
    }

    pub fn disk(&self) -> DiskEdgeIter<'m> {
        DiskEdgeIter::new(self.mesh, self.id)
    }

    pub fn edges(&self) -> impl Iterator<Item = EdgeHandle<'m>> + 'm {
        let mesh = self.mesh;
        self.disk().map(move |e| EdgeHandle::new(e, mesh))
    }

    pub fn valence(&self) -> usize {
        self.disk().count()
    }

    /// Vertices sharing an edge with this one.
    pub fn neighbours(&self) -> impl Iterator<Item = VertId> + 'm {
        let (mesh, id) = (self.mesh, self.id);
        self.disk().filter_map(move |e| mesh.edges[e].other(id))
    }

    pub fn face_ids(&self) -> SmallVec<[FaceId; 8]> {
        self.mesh.vert_faces(self.id)
    }

    pub fn faces(&self) -> impl Iterator<Item = FaceHandle<'m>> + 'm {
        let mesh = self.mesh;
        self.face_ids()
            .into_iter()
            .map(move |f| FaceHandle::new(f, mesh))
    }

    pub fn is_isolated(&self) -> bool {
        self.my_ref().e.is_none()
    }

    /// Only wire edges around.
    pub fn is_wire(&self) -> bool {
        self.edges().all(|e| e.is_wire())
    }

    /// Every edge has exactly two faces.
    pub fn is_interior(&self) -> bool {
        !self.is_isolated() && self.edges().all(|e| e.is_manifold())
    }

    fn my_ref(&self) -> &'m Vert {
        &self.mesh.verts[self.id]
    }
}
