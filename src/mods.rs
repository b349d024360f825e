//! Higher level edits built on the Euler operators.
use std::collections::{HashMap, HashSet};

use smallvec::SmallVec;

use crate::{
    attributes::AttrBlock, euler::Scratch, validation::report_touched, BMesh, EdgeId, FaceId,
    LoopId, MeshError, VertId,
};

impl BMesh {
    /// Merge a connected set of faces into one face spanning their outer
    /// boundary.
    ///
    /// Edges used by exactly one of the faces form the boundary. Edges used
    /// by two are interior and, with `do_del`, removed along with vertices
    /// left without edges. Edges used by more than two make the selection
    /// non-manifold. The new face takes its values from `faces[0]` and its
    /// corner values from the corners it replaces.
    pub fn faces_join(
        &mut self,
        faces: &[FaceId],
        do_del: bool,
        scratch: &mut Scratch,
    ) -> Result<FaceId, MeshError> {
        match faces {
            [] => return Err(MeshError::EmptyFace),
            &[f] => {
                self.ensure(f)?;
                return Ok(f);
            }
            _ => {}
        }
        for &f in faces {
            self.ensure(f)?;
        }

        scratch.clear();
        let result = self.faces_join_boundary(faces, scratch);
        let interior: SmallVec<[EdgeId; 16]> = scratch
            .edge_counts
            .iter()
            .filter(|&(_, &count)| count == 2)
            .map(|(&e, _)| e)
            .collect();
        scratch.clear();
        let boundary = result?;

        let verts: SmallVec<[VertId; 16]> = boundary.iter().map(|&l| self.loops[l].v).collect();
        let edges: SmallVec<[EdgeId; 16]> = boundary.iter().map(|&l| self.loops[l].e).collect();
        let blocks: Vec<AttrBlock> = boundary
            .iter()
            .map(|&l| self.loops[l].head.data.clone())
            .collect();

        let f_new = self.create_face(&verts, &edges, Some(faces[0]), false)?;
        let loops: SmallVec<[LoopId; 16]> = self.face_loops(f_new).collect();
        for (l, block) in loops.into_iter().zip(&blocks) {
            self.ldata.copy_values(&mut self.loops[l].head.data, block);
        }

        for &f in faces {
            self.kill_face(f)?;
        }
        if do_del {
            let mut loose: SmallVec<[VertId; 16]> = SmallVec::new();
            for e in interior {
                if self.edges.get(e).is_some_and(|edge| edge.l.is_none()) {
                    loose.extend(self.edges[e].verts);
                    self.kill_edge(e)?;
                }
            }
            for v in loose {
                if self.verts.get(v).is_some_and(|vert| vert.e.is_none()) {
                    self.kill_vert(v)?;
                }
            }
        }

        report_touched(self, "faces_join", &[f_new.into()]);
        Ok(f_new)
    }

    /// Validate the selection and return its boundary loops in order,
    /// starting on `faces[0]` when it touches the boundary.
    fn faces_join_boundary(
        &self,
        faces: &[FaceId],
        scratch: &mut Scratch,
    ) -> Result<Vec<LoopId>, MeshError> {
        for &f in faces {
            if !scratch.faces.insert(f) {
                return Err(MeshError::SameFace);
            }
        }
        for &f in faces {
            for l in self.face_loops(f) {
                *scratch.edge_counts.entry(self.loops[l].e).or_default() += 1;
            }
        }
        if scratch.edge_counts.values().any(|&count| count > 2) {
            return Err(MeshError::NotManifold);
        }

        // Interior edges must be crossed in opposite directions, and must
        // connect the whole selection.
        let mut reached: HashSet<FaceId> = HashSet::from([faces[0]]);
        let mut stack = vec![faces[0]];
        while let Some(f) = stack.pop() {
            for l in self.face_loops(f) {
                let e = self.loops[l].e;
                if scratch.edge_counts.get(&e) != Some(&2) {
                    continue;
                }
                let Some(other) = self.radial_loops(e).find(|&r| {
                    r != l && scratch.faces.contains(&self.loops[r].f)
                }) else {
                    continue;
                };
                if self.loops[other].v == self.loops[l].v {
                    return Err(MeshError::FlippedWinding);
                }
                let g = self.loops[other].f;
                if reached.insert(g) {
                    stack.push(g);
                }
            }
        }
        if reached.len() != faces.len() {
            return Err(MeshError::NonContiguousSelection);
        }

        let boundary: Vec<LoopId> = faces
            .iter()
            .flat_map(|&f| self.face_loops(f))
            .filter(|&l| scratch.edge_counts.get(&self.loops[l].e) == Some(&1))
            .collect();
        let &start = boundary.first().ok_or(MeshError::InvalidBoundary)?;

        let mut by_start: HashMap<VertId, LoopId> = HashMap::with_capacity(boundary.len());
        for &l in &boundary {
            if by_start.insert(self.loops[l].v, l).is_some() {
                return Err(MeshError::InvalidBoundary);
            }
        }

        let mut chain = Vec::with_capacity(boundary.len());
        let mut current = start;
        loop {
            chain.push(current);
            let end = self.loops[self.loops[current].next].v;
            current = *by_start.get(&end).ok_or(MeshError::InvalidBoundary)?;
            if current == start {
                break;
            }
            if chain.len() >= boundary.len() {
                return Err(MeshError::InvalidBoundary);
            }
        }
        if chain.len() != boundary.len() {
            return Err(MeshError::InvalidBoundary);
        }
        Ok(chain)
    }

    /// Split `e` with a new vertex at `fac` along it, 0 being `v` and 1 the
    /// other endpoint. Position, normal and attributes of the new vertex
    /// and of its new corners are interpolated.
    pub fn edge_split(
        &mut self,
        e: EdgeId,
        v: VertId,
        fac: f32,
    ) -> Result<(VertId, EdgeId), MeshError> {
        self.ensure(e)?;
        self.ensure(v)?;
        let v_other = self.edges[e].other(v).ok_or(MeshError::NotInEdge)?;
        let fac = fac.clamp(0.0, 1.0);

        let (v_new, e_new) = self.split_edge_make_vert(v, e)?;

        let (a, b) = (&self.verts[v], &self.verts[v_other]);
        let co = a.co.lerp(&b.co, fac);
        let no = a
            .no
            .lerp(&b.no, fac)
            .try_normalize(f32::EPSILON)
            .unwrap_or(a.no);
        let (da, db) = (a.head.data.clone(), b.head.data.clone());
        let vert = &mut self.verts[v_new];
        vert.co = co;
        vert.no = no;
        self.vdata.interp_into(&mut vert.head.data, &da, &db, fac);

        for l in self.vert_loops(v_new) {
            let (prev, next) = (self.loops[l].prev, self.loops[l].next);
            let (at_v, at_other) = if self.loops[prev].v == v {
                (prev, next)
            } else {
                (next, prev)
            };
            let da = self.loops[at_v].head.data.clone();
            let db = self.loops[at_other].head.data.clone();
            self.ldata
                .interp_into(&mut self.loops[l].head.data, &da, &db, fac);
        }

        Ok((v_new, e_new))
    }

    /// Split `f` between the corners `l_a` and `l_b` and refresh both face
    /// normals. See [`BMesh::split_face_make_edge`].
    pub fn face_split(
        &mut self,
        f: FaceId,
        l_a: LoopId,
        l_b: LoopId,
        example: Option<EdgeId>,
        no_double: bool,
    ) -> Result<(FaceId, LoopId), MeshError> {
        let (f2, l) = self.split_face_make_edge(f, l_a, l_b, example, no_double)?;
        for face in [f, f2] {
            let no = self.face_handle(face).calc_normal();
            self.faces[face].no = no;
        }
        Ok((f2, l))
    }
}
