//! Vertex collapse and the splice operations it is built from.
use smallvec::SmallVec;

use crate::{
    euler::Scratch,
    helpers::{disk_remove, edge_vert_swap, face_loop_unlink, radial_append, radial_remove},
    validation::report_touched,
    BMesh, EdgeId, ElemRef, FaceId, LoopId, MeshError, VertId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollapseOptions {
    /// Free the collapsed vertex. When off it stays behind, isolated.
    pub delete_vert: bool,
    /// Remove faces left on top of another face.
    pub kill_duplicate_faces: bool,
    /// Replace valence three vertices next to the edge with a single
    /// triangle before collapsing.
    pub cleanup_valence_3: bool,
}

impl Default for CollapseOptions {
    fn default() -> Self {
        Self {
            delete_vert: true,
            kill_duplicate_faces: true,
            cleanup_valence_3: true,
        }
    }
}

impl BMesh {
    /// Collapse `e_kill` by merging `v_kill` into its other endpoint, which
    /// is returned.
    ///
    /// Faces along the edge lose a corner and are removed if that leaves
    /// them with fewer than three. Edges that end up joining the same pair
    /// of vertices are spliced into one.
    pub fn join_vert_kill_edge(
        &mut self,
        e_kill: EdgeId,
        v_kill: VertId,
        opts: CollapseOptions,
        scratch: &mut Scratch,
    ) -> Result<VertId, MeshError> {
        self.ensure(e_kill)?;
        self.ensure(v_kill)?;
        let v_target = self.edges[e_kill].other(v_kill).ok_or(MeshError::NotInEdge)?;

        let pair_edges = self
            .disk_edges(v_kill)
            .filter(|&e| self.edges[e].other(v_kill) == Some(v_target))
            .count();
        if pair_edges > 1 {
            return Err(MeshError::DoubleEdge);
        }
        let pinched = self
            .vert_faces(v_kill)
            .into_iter()
            .any(|f| self.vert_in_face(v_target, f) && !self.edge_in_face(e_kill, f));
        if pinched {
            return Err(MeshError::PinchedFace);
        }

        if opts.cleanup_valence_3 {
            self.cleanup_valence_3([v_kill, v_target])?;
        }

        self.trace_faces_around(v_kill);
        let edges: SmallVec<[EdgeId; 8]> = self.disk_edges(v_kill).collect();
        self.trace(|t, m| {
            for &e in &edges {
                if e == e_kill {
                    t.on_edge_kill(m, e);
                } else {
                    t.on_edge_topo(m, e);
                }
            }
        });
        if opts.delete_vert {
            self.trace(|t, m| t.on_vert_kill(m, v_kill));
        }

        // Faces along the edge that would drop below a triangle.
        for f in self.faces_shrunk_below(e_kill, 3) {
            self.kill_face(f)?;
        }

        // Drop the corners running along the edge. The corner after each
        // one now starts at the merged vertex.
        let radial: SmallVec<[LoopId; 4]> = self.radial_loops(e_kill).collect();
        let mut faces: SmallVec<[FaceId; 4]> = SmallVec::new();
        for l in radial {
            let f = self.loops[l].f;
            radial_remove(l, e_kill, self);
            face_loop_unlink(l, self);
            self.kill_only_loop(l);
            faces.push(f);
        }
        disk_remove(e_kill, v_kill, self);
        disk_remove(e_kill, v_target, self);
        self.kill_only_edge(e_kill);

        while let Some(e) = self.verts[v_kill].e {
            let other = self.edges[e].other(v_kill).ok_or(MeshError::NotInEdge)?;
            let existing = self.edge_exists(v_target, other);
            edge_vert_swap(e, v_kill, v_target, self);
            if let Some(dst) = existing {
                self.edge_splice(dst, e)?;
            }
        }

        // Splicing can fold a face onto one edge.
        let mut spliced = self.vert_faces(v_target);
        for f in faces {
            if !spliced.contains(&f) {
                spliced.push(f);
            }
        }
        for f in spliced {
            if self.faces.contains_key(f) && self.face_is_degenerate(f) {
                self.kill_face(f)?;
            }
        }

        if opts.delete_vert {
            self.kill_only_vert(v_kill);
        }
        if opts.kill_duplicate_faces {
            self.kill_duplicate_faces(&[v_target], scratch);
        }

        let mut touched: SmallVec<[ElemRef; 16]> = smallvec::smallvec![v_target.into()];
        touched.extend(self.disk_edges(v_target).map(ElemRef::Edge));
        touched.extend(self.vert_faces(v_target).into_iter().map(ElemRef::Face));
        report_touched(self, "join_vert_kill_edge", &touched);
        Ok(v_target)
    }

    /// Merge `e_src` into `e_dst`. Both must join the same two vertices.
    /// Every face using `e_src` is moved over to `e_dst`.
    pub fn edge_splice(&mut self, e_dst: EdgeId, e_src: EdgeId) -> Result<(), MeshError> {
        self.ensure(e_dst)?;
        self.ensure(e_src)?;
        let [a, b] = self.edges[e_src].verts;
        if e_dst == e_src || self.edges[e_dst].other(a) != Some(b) {
            return Err(MeshError::EndpointMismatch);
        }

        self.trace(|t, m| t.on_edge_topo(m, e_dst));
        self.trace_radial_faces(e_src);
        self.trace(|t, m| t.on_edge_kill(m, e_src));

        while let Some(l) = self.edges[e_src].l {
            radial_remove(l, e_src, self);
            radial_append(e_dst, l, self);
        }
        disk_remove(e_src, a, self);
        disk_remove(e_src, b, self);
        self.kill_only_edge(e_src);

        report_touched(self, "edge_splice", &[e_dst.into(), a.into(), b.into()]);
        Ok(())
    }

    /// Merge `v_src` into `v_dst`. The two must not share an edge; the
    /// result may hold edges that join the same pair of vertices.
    pub fn vert_splice(&mut self, v_dst: VertId, v_src: VertId) -> Result<(), MeshError> {
        self.ensure(v_dst)?;
        self.ensure(v_src)?;
        if v_dst == v_src || self.edge_exists(v_dst, v_src).is_some() {
            return Err(MeshError::Connected);
        }

        self.trace_faces_around(v_src);
        let edges: SmallVec<[EdgeId; 8]> = self.disk_edges(v_src).collect();
        self.trace(|t, m| {
            edges.iter().for_each(|&e| t.on_edge_topo(m, e));
            t.on_vert_kill(m, v_src);
        });

        for &e in &edges {
            edge_vert_swap(e, v_src, v_dst, self);
        }
        self.kill_only_vert(v_src);

        let touched: SmallVec<[ElemRef; 8]> = std::iter::once(v_dst.into())
            .chain(edges.into_iter().map(ElemRef::Edge))
            .collect();
        report_touched(self, "vert_splice", &touched);
        Ok(())
    }

    /// Remove faces built on exactly the vertices of another face, looking
    /// only around `seeds`. Returns how many were removed.
    ///
    /// The neighbourhood is the closure of every face and edge at a seed.
    /// A clean neighbourhood is a disk with `V - E + F == 1`, so the face
    /// scan only runs when that count is off. This is a local check: a
    /// duplicate whose effect on the count is cancelled by some other
    /// defect in the same neighbourhood goes unnoticed.
    pub fn kill_duplicate_faces(&mut self, seeds: &[VertId], scratch: &mut Scratch) -> usize {
        scratch.clear();
        for &v in seeds.iter().filter(|&&v| self.verts.contains_key(v)) {
            scratch.verts.insert(v);
            scratch.edges.extend(self.disk_edges(v));
            scratch.faces.extend(self.vert_faces(v));
        }
        for &f in &scratch.faces {
            for l in self.face_loops(f) {
                scratch.edges.insert(self.loops[l].e);
            }
        }
        for &e in &scratch.edges {
            scratch.verts.extend(self.edges[e].verts);
        }

        let chi = scratch.verts.len() as i64 - scratch.edges.len() as i64
            + scratch.faces.len() as i64;
        let mut faces: Vec<FaceId> = scratch.faces.drain().collect();
        scratch.clear();
        if chi == 1 {
            return 0;
        }

        faces.sort_unstable();
        let mut killed = 0;
        for f in faces {
            if !self.faces.contains_key(f) {
                continue;
            }
            if let Some(double) = self.face_find_double(f) {
                if self.kill_face(double).is_ok() {
                    log::debug!("removed {double:?}, a duplicate of {f:?}");
                    killed += 1;
                }
            }
        }
        killed
    }

    /// Faces along `e` that keep fewer than `min` corners once their
    /// corners on `e` are dropped.
    pub(crate) fn faces_shrunk_below(&self, e: EdgeId, min: usize) -> SmallVec<[FaceId; 4]> {
        let mut faces: SmallVec<[FaceId; 4]> = SmallVec::new();
        for l in self.radial_loops(e) {
            let f = self.loops[l].f;
            if faces.contains(&f) {
                continue;
            }
            let on_edge = self.face_loops(f).filter(|&l| self.loops[l].e == e).count();
            if self.faces[f].len - on_edge < min {
                faces.push(f);
            }
        }
        faces
    }

    /// Fewer than three corners, or some edge used twice.
    pub(crate) fn face_is_degenerate(&self, f: FaceId) -> bool {
        if self.faces[f].len < 3 {
            return true;
        }
        let edges: SmallVec<[EdgeId; 8]> = self.face_loops(f).map(|l| self.loops[l].e).collect();
        edges.iter().enumerate().any(|(i, e)| edges[..i].contains(e))
    }

    /// Replace each valence three vertex next to `around` that is the hub
    /// of a closed fan of three triangles with one triangle over the rim.
    fn cleanup_valence_3(&mut self, around: [VertId; 2]) -> Result<usize, MeshError> {
        let mut candidates: SmallVec<[VertId; 16]> = SmallVec::new();
        for v in around {
            for e in self.disk_edges(v) {
                if let Some(n) = self.edges[e].other(v) {
                    if !around.contains(&n) && !candidates.contains(&n) {
                        candidates.push(n);
                    }
                }
            }
        }

        let mut removed = 0;
        for n in candidates {
            let Some((rim, example)) = self.valence_3_rim(n) else {
                continue;
            };
            if self.face_exists(&rim).is_some() {
                continue;
            }
            self.create_face_verts(&rim, Some(example), false, false)?;
            self.kill_vert(n)?;
            removed += 1;
        }
        if removed > 0 {
            log::debug!("replaced {removed} valence 3 vertices before collapse");
        }
        Ok(removed)
    }

    /// The rim of the triangle fan around `n`, wound like the fan, plus
    /// one of the fan's faces.
    fn valence_3_rim(&self, n: VertId) -> Option<([VertId; 3], FaceId)> {
        if !self.verts.contains_key(n) || self.disk_count(n) != 3 {
            return None;
        }
        if self.disk_edges(n).any(|e| self.radial_count(e) != 2) {
            return None;
        }
        let faces = self.vert_faces(n);
        if faces.len() != 3 || faces.iter().any(|&f| self.faces[f].len != 3) {
            return None;
        }

        let mut rim: SmallVec<[(VertId, VertId); 3]> = SmallVec::new();
        for &f in &faces {
            let l = self.face_vert_share_loop(f, n)?;
            let a = self.loops[l].next;
            let b = self.loops[a].next;
            rim.push((self.loops[a].v, self.loops[b].v));
        }
        let (a, b) = rim[0];
        let c = rim.iter().find(|&&(s, _)| s == b)?.1;
        rim.iter()
            .any(|&(s, t)| s == c && t == a)
            .then_some(([a, b, c], faces[0]))
    }
}
