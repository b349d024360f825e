use crate::edge_handle::EdgeHandle;
use crate::face_handle::FaceHandle;
use crate::vert_handle::VertHandle;

use crate::iterators::{FaceLoopIter, RadialLoopIter};
use crate::{BMesh, Header, Loop, LoopId};

#[derive(Clone, Copy)]
pub struct LoopHandle<'m> {
    id: LoopId,
    mesh: &'m BMesh,
}

impl<'m> LoopHandle<'m> {
    pub(crate) fn new(id: LoopId, mesh: &'m BMesh) -> Self {
        debug_assert!(mesh.loops.contains_key(id));
        Self { id, mesh }
    }

    pub fn id(&self) -> LoopId {
        self.id
    }

    pub fn header(&self) -> &'m Header {
        &self.my_ref().head
    }

    /// Corner vertex, where the loop's edge starts.
    pub fn vert(&self) -> VertHandle<'m> {
        VertHandle::new(self.my_ref().v, self.mesh)
    }

    pub fn edge(&self) -> EdgeHandle<'m> {
        EdgeHandle::new(self.my_ref().e, self.mesh)
    }

    pub fn face(&self) -> FaceHandle<'m> {
        FaceHandle::new(self.my_ref().f, self.mesh)
    }

    pub fn next(&self) -> Self {
        LoopHandle::new(self.my_ref().next, self.mesh)
    }

    pub fn prev(&self) -> Self {
        LoopHandle::new(self.my_ref().prev, self.mesh)
    }

    pub fn radial_next(&self) -> Self {
        LoopHandle::new(self.my_ref().radial_next, self.mesh)
    }

    pub fn radial_prev(&self) -> Self {
        LoopHandle::new(self.my_ref().radial_prev, self.mesh)
    }

    /// Loops of the same face starting here.
    pub fn face_loop(&self) -> FaceLoopIter<'m> {
        FaceLoopIter::new(self.mesh, Some(self.id))
    }

    /// Loops on the same edge starting here.
    pub fn radial_loop(&self) -> RadialLoopIter<'m> {
        RadialLoopIter::from_loop(self.mesh, Some(self.id))
    }

    fn my_ref(&self) -> &'m Loop {
        &self.mesh.loops[self.id]
    }
}
