//! Walks over the three kinds of cycles.
//!
//! Every walk stops when it returns to its start. A malformed mesh could make
//! a walk loop forever, so each iterator also stops after
//! [`MAX_LOOP_ITERATIONS`] steps and reports it.
use crate::{BMesh, EdgeId, LoopId, VertId};

/// Upper bound on the length of any single cycle.
pub const MAX_LOOP_ITERATIONS: usize = 1 << 20;

/// Edges in the disk cycle of a vertex.
pub struct DiskEdgeIter<'m> {
    mesh: &'m BMesh,
    vert: VertId,
    start: Option<EdgeId>,
    current: Option<EdgeId>,
    steps: usize,
}

impl<'m> DiskEdgeIter<'m> {
    pub(crate) fn new(mesh: &'m BMesh, vert: VertId) -> Self {
        let start = mesh.verts.get(vert).and_then(|v| v.e);
        Self {
            mesh,
            vert,
            start,
            current: start,
            steps: 0,
        }
    }
}

impl Iterator for DiskEdgeIter<'_> {
    type Item = EdgeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.steps += 1;
        if self.steps > MAX_LOOP_ITERATIONS {
            log::error!("disk cycle of {:?} does not close", self.vert);
            self.current = None;
            return None;
        }

        let next = self.mesh.edges.get(current).map(|e| e.disk_at(self.vert).next);
        self.current = next.filter(|&n| Some(n) != self.start);
        Some(current)
    }
}

/// Loops in the radial cycle of an edge.
pub struct RadialLoopIter<'m> {
    mesh: &'m BMesh,
    start: Option<LoopId>,
    current: Option<LoopId>,
    steps: usize,
}

impl<'m> RadialLoopIter<'m> {
    pub(crate) fn new(mesh: &'m BMesh, edge: EdgeId) -> Self {
        let start = mesh.edges.get(edge).and_then(|e| e.l);
        Self::from_loop(mesh, start)
    }

    pub(crate) fn from_loop(mesh: &'m BMesh, start: Option<LoopId>) -> Self {
        Self {
            mesh,
            start,
            current: start,
            steps: 0,
        }
    }
}

impl Iterator for RadialLoopIter<'_> {
    type Item = LoopId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.steps += 1;
        if self.steps > MAX_LOOP_ITERATIONS {
            log::error!("radial cycle through {:?} does not close", current);
            self.current = None;
            return None;
        }

        let next = self.mesh.loops.get(current).map(|l| l.radial_next);
        self.current = next.filter(|&n| Some(n) != self.start);
        Some(current)
    }
}

/// Loops around a face, starting at a given loop.
pub struct FaceLoopIter<'m> {
    mesh: &'m BMesh,
    start: Option<LoopId>,
    current: Option<LoopId>,
    steps: usize,
}

impl<'m> FaceLoopIter<'m> {
    pub(crate) fn new(mesh: &'m BMesh, start: Option<LoopId>) -> Self {
        Self {
            mesh,
            start,
            current: start,
            steps: 0,
        }
    }
}

impl Iterator for FaceLoopIter<'_> {
    type Item = LoopId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.steps += 1;
        if self.steps > MAX_LOOP_ITERATIONS {
            log::error!("face cycle through {:?} does not close", current);
            self.current = None;
            return None;
        }

        let next = self.mesh.loops.get(current).map(|l| l.next);
        self.current = next.filter(|&n| Some(n) != self.start);
        Some(current)
    }
}

impl BMesh {
    pub fn disk_edges(&self, v: VertId) -> DiskEdgeIter<'_> {
        DiskEdgeIter::new(self, v)
    }

    pub fn radial_loops(&self, e: EdgeId) -> RadialLoopIter<'_> {
        RadialLoopIter::new(self, e)
    }

    pub fn face_loops(&self, f: crate::FaceId) -> FaceLoopIter<'_> {
        FaceLoopIter::new(self, self.faces.get(f).map(|f| f.l_first))
    }

    /// Valence of `v`.
    pub fn disk_count(&self, v: VertId) -> usize {
        self.disk_edges(v).count()
    }

    /// Number of loops (face uses) of `e`.
    pub fn radial_count(&self, e: EdgeId) -> usize {
        self.radial_loops(e).count()
    }
}
