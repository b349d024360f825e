use std::collections::BTreeSet;

use crate::iterators::FaceLoopIter;
use crate::loop_handle::LoopHandle;

use crate::{BMesh, EdgeId, ElemFlags, Face, FaceId, Header, Vec3, VertId};

#[derive(Clone, Copy)]
pub struct FaceHandle<'m> {
    id: FaceId,
    mesh: &'m BMesh,
}

impl<'m> FaceHandle<'m> {
    pub(crate) fn new(id: FaceId, mesh: &'m BMesh) -> Self {
        debug_assert!(mesh.faces.contains_key(id));
        Self { id, mesh }
    }

    pub fn id(&self) -> FaceId {
        self.id
    }

    pub fn header(&self) -> &'m Header {
        &self.metadata().head
    }

    pub fn flag(&self) -> ElemFlags {
        self.metadata().head.flag
    }

    pub fn mat_nr(&self) -> i16 {
        self.metadata().mat_nr
    }

    /// Stored normal, see [`FaceHandle::calc_normal`] for a fresh one.
    pub fn no(&self) -> Vec3 {
        self.metadata().no
    }

    pub fn len(&self) -> usize {
        self.metadata().len
    }

    pub fn is_empty(&self) -> bool {
        self.metadata().len == 0
    }

    pub fn first_loop(&self) -> LoopHandle<'m> {
        LoopHandle::new(self.metadata().l_first, self.mesh)
    }

    pub fn loops(&self) -> FaceLoopIter<'m> {
        FaceLoopIter::new(self.mesh, Some(self.metadata().l_first))
    }

    #[inline]
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertId> + 'm {
        let mesh = self.mesh;
        self.loops().map(move |l| mesh.loops[l].v)
    }

    #[inline]
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + 'm {
        let mesh = self.mesh;
        self.loops().map(move |l| mesh.loops[l].e)
    }

    /// No edge is shared with another face.
    #[inline]
    pub fn is_isolated(&self) -> bool {
        self.loops().all(|l| self.mesh.loops[l].radial_next == l)
    }

    /// Count the number of sides by walking the loop cycle.
    pub fn side_count(&self) -> usize {
        self.loops().count()
    }

    /// Inspects the face for topological degeneracies such as a face with two sides or
    /// two faces sharing more than two vertices.
    pub fn check_degeneracies(&self) -> FaceDegeneracies {
        match self.side_count() {
            0 => return FaceDegeneracies::Empty,
            1 => return FaceDegeneracies::Monogon,
            2 => return FaceDegeneracies::Digon,
            _ => {}
        }

        let s0: BTreeSet<_> = self.vertex_ids().collect();

        for l in self.loops() {
            let others = self.mesh.radial_loops(self.mesh.loops[l].e);
            for other in others.filter(|&o| self.mesh.loops[o].f != self.id) {
                let f = self.mesh.loops[other].f;
                let s1: BTreeSet<_> = FaceHandle::new(f, self.mesh).vertex_ids().collect();
                if s0 == s1 {
                    return FaceDegeneracies::Doppelganger;
                }
            }
        }

        FaceDegeneracies::None
    }

    /// Newell normal, robust for non planar polygons. Zero for degenerate
    /// faces.
    pub fn calc_normal(&self) -> Vec3 {
        let positions: Vec<Vec3> = self.vertex_ids().map(|v| self.mesh.verts[v].co).collect();
        let mut n = Vec3::zeros();
        for (i, p) in positions.iter().enumerate() {
            let q = positions[(i + 1) % positions.len()];
            n.x += (p.y - q.y) * (p.z + q.z);
            n.y += (p.z - q.z) * (p.x + q.x);
            n.z += (p.x - q.x) * (p.y + q.y);
        }
        n.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::zeros)
    }

    pub fn centroid(&self) -> Vec3 {
        let mut centroid = Vec3::zeros();
        let mut count = 0;
        for v in self.vertex_ids() {
            centroid += self.mesh.verts[v].co;
            count += 1;
        }

        centroid / count.max(1) as f32
    }

    fn metadata(&self) -> &'m Face {
        &self.mesh.faces[self.id]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaceDegeneracies {
    None,
    /// No loops at all.
    Empty,
    /// Two sides.
    Digon,
    /// One side.
    Monogon,
    /// Another face across an edge uses exactly the same vertices.
    Doppelganger,
}
