//! The Euler operators.
//!
//! Every operator checks all of its preconditions before it touches the
//! mesh. An `Err` means nothing changed, an `Ok` means the mesh went from one
//! consistent state to another.
use std::collections::{HashMap, HashSet};

use smallvec::SmallVec;

use crate::{
    helpers::{disk_next, disk_remove, edge_vert_replace, face_loop_insert_after, face_loop_unlink, radial_append},
    iterators::FaceLoopIter,
    validation::report_touched,
    BMesh, EdgeId, ElemRef, FaceId, Header, LoopId, MeshError, VertId,
};

/// Tag sets handed to operators that need to mark elements while they work.
/// Operators clear what they use before and after, so one value can be
/// reused across calls.
#[derive(Debug, Default)]
pub struct Scratch {
    pub verts: HashSet<VertId>,
    pub edges: HashSet<EdgeId>,
    pub faces: HashSet<FaceId>,
    pub edge_counts: HashMap<EdgeId, usize>,
}

impl Scratch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.verts.clear();
        self.edges.clear();
        self.faces.clear();
        self.edge_counts.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinEdgeOptions {
    /// Free the removed vertex. When off it stays behind, isolated.
    pub delete_vert: bool,
    /// If an edge already joins the two remaining vertices, merge the
    /// surviving edge into it.
    pub check_edge_exists: bool,
    /// Remove faces that end up with fewer than three sides.
    pub kill_degenerate_faces: bool,
    /// Remove faces that end up on top of another face.
    pub kill_duplicate_faces: bool,
}

impl Default for JoinEdgeOptions {
    fn default() -> Self {
        Self {
            delete_vert: true,
            check_edge_exists: false,
            kill_degenerate_faces: false,
            kill_duplicate_faces: false,
        }
    }
}

impl BMesh {
    /// Split `e` by a new vertex placed on `tv`.
    ///
    /// `e` keeps running from `tv` and ends at the new vertex, the returned
    /// edge runs from the new vertex to the other old endpoint. Every face
    /// using `e` gains one corner at the new vertex.
    pub fn split_edge_make_vert(
        &mut self,
        tv: VertId,
        e: EdgeId,
    ) -> Result<(VertId, EdgeId), MeshError> {
        self.ensure(tv)?;
        self.ensure(e)?;
        let v_old = self.edges[e].other(tv).ok_or(MeshError::NotInEdge)?;

        self.trace(|t, m| t.on_edge_topo(m, e));
        self.trace_radial_faces(e);

        let radial: SmallVec<[LoopId; 4]> = self.radial_loops(e).collect();
        let co = self.verts[tv].co;
        let v_new = self.create_vert(co, Some(tv));
        edge_vert_replace(e, v_old, v_new, self);
        let e_new = self.create_edge(v_new, v_old, Some(e), false)?;

        // Every loop is relinked below, the old radial cycle is dropped.
        self.edges[e].l = None;
        let mut faces: SmallVec<[FaceId; 4]> = SmallVec::new();
        for &l in &radial {
            let f = self.loops[l].f;
            let data = self.ldata.copy_block(&self.loops[l].head.data);
            let l_new = self.new_loop_record(v_new, e, f, data);
            face_loop_insert_after(l, l_new, self);

            let (e_l, e_l_new) = if self.loops[l].v == tv {
                (e, e_new)
            } else {
                (e_new, e)
            };
            radial_append(e_l, l, self);
            radial_append(e_l_new, l_new, self);
            self.alloc_loop_id(l_new);
            faces.push(f);
        }

        let touched: SmallVec<[ElemRef; 8]> = [v_new.into(), tv.into(), e.into(), e_new.into()]
            .into_iter()
            .chain(faces.into_iter().map(ElemRef::Face))
            .collect();
        report_touched(self, "split_edge_make_vert", &touched);
        Ok((v_new, e_new))
    }

    /// Remove the valence two vertex `v_kill` together with `e_kill`. The
    /// other edge at `v_kill` is stretched over to the far end of `e_kill`
    /// and returned.
    pub fn join_edge_kill_vert(
        &mut self,
        e_kill: EdgeId,
        v_kill: VertId,
        opts: JoinEdgeOptions,
        scratch: &mut Scratch,
    ) -> Result<EdgeId, MeshError> {
        self.ensure(e_kill)?;
        self.ensure(v_kill)?;
        let v_target = self.edges[e_kill].other(v_kill).ok_or(MeshError::NotInEdge)?;
        let valence = self.disk_count(v_kill);
        if valence != 2 {
            return Err(MeshError::InvalidValence { found: valence });
        }
        let e_old = disk_next(e_kill, v_kill, self);
        let v_old = self.edges[e_old].other(v_kill).ok_or(MeshError::NotInEdge)?;
        if v_old == v_target {
            return Err(MeshError::DoubleEdge);
        }
        let e_splice = if opts.check_edge_exists {
            self.edge_exists(v_target, v_old)
        } else {
            None
        };

        self.trace(|t, m| t.on_edge_topo(m, e_old));
        self.trace_radial_faces(e_kill);
        self.trace_radial_faces(e_old);
        self.trace(|t, m| t.on_edge_kill(m, e_kill));
        if opts.delete_vert {
            self.trace(|t, m| t.on_vert_kill(m, v_kill));
        }

        // Faces left without corners go now, short ones too when asked.
        let min = if opts.kill_degenerate_faces { 3 } else { 1 };
        for f in self.faces_shrunk_below(e_kill, min) {
            self.kill_face(f)?;
        }

        edge_vert_replace(e_old, v_kill, v_target, self);
        disk_remove(e_kill, v_target, self);

        let radial: SmallVec<[LoopId; 4]> = self.radial_loops(e_kill).collect();
        let mut faces: SmallVec<[FaceId; 4]> = SmallVec::new();
        for l_kill in radial {
            let next = self.loops[l_kill].next;
            if self.loops[next].v == v_kill {
                self.loops[next].v = v_target;
            }
            let f = self.loops[l_kill].f;
            face_loop_unlink(l_kill, self);
            self.kill_only_loop(l_kill);
            if !faces.contains(&f) {
                faces.push(f);
            }
        }
        self.edges[e_kill].l = None;
        disk_remove(e_kill, v_kill, self);
        self.kill_only_edge(e_kill);

        if opts.delete_vert {
            self.kill_only_vert(v_kill);
        }

        if let Some(e_splice) = e_splice {
            self.edge_splice(e_old, e_splice)?;
        }

        if opts.kill_degenerate_faces {
            for &f in &faces {
                if self.faces.contains_key(f) && self.face_is_degenerate(f) {
                    self.kill_face(f)?;
                }
            }
        }
        if opts.kill_duplicate_faces {
            self.kill_duplicate_faces(&[v_target, v_old], scratch);
        }

        let touched: SmallVec<[ElemRef; 8]> = [e_old.into(), v_target.into(), v_old.into()]
            .into_iter()
            .chain(faces.into_iter().map(ElemRef::Face))
            .collect();
        report_touched(self, "join_edge_kill_vert", &touched);
        Ok(e_old)
    }

    /// Cut `f` in two with a new edge from the corner `l_v1` to the corner
    /// `l_v2`.
    ///
    /// `f` keeps the run starting at `l_v1`'s vertex and ending at `l_v2`'s,
    /// the returned face gets the rest. The returned loop is the new face's
    /// corner on the new edge. Whichever face ends up holding the old first
    /// loop, the other one starts at the matching corner so the ordering seen
    /// by tools stays stable.
    pub fn split_face_make_edge(
        &mut self,
        f: FaceId,
        l_v1: LoopId,
        l_v2: LoopId,
        example: Option<EdgeId>,
        no_double: bool,
    ) -> Result<(FaceId, LoopId), MeshError> {
        self.ensure(f)?;
        self.ensure(l_v1)?;
        self.ensure(l_v2)?;
        if self.loops[l_v1].f != f || self.loops[l_v2].f != f {
            return Err(MeshError::NotInFace);
        }
        if l_v1 == l_v2 || self.loops[l_v1].next == l_v2 || self.loops[l_v2].next == l_v1 {
            return Err(MeshError::AdjacentLoops);
        }
        let (v1, v2) = (self.loops[l_v1].v, self.loops[l_v2].v);
        if v1 == v2 {
            return Err(MeshError::DegenerateEdge);
        }

        self.trace(|t, m| t.on_face_topo(m, f));
        let e = self.create_edge(v1, v2, example, no_double)?;

        let face = &self.faces[f];
        let head = Header {
            flag: face.head.flag,
            data: self.pdata.copy_block(&face.head.data),
        };
        let (mat_nr, no) = (face.mat_nr, face.no);
        let f2 = self.new_face_shell(head, mat_nr, no);

        let d1 = self.ldata.copy_block(&self.loops[l_v2].head.data);
        let d2 = self.ldata.copy_block(&self.loops[l_v1].head.data);
        let l_f1 = self.new_loop_record(v2, e, f, d1);
        let l_f2 = self.new_loop_record(v1, e, f2, d2);

        let (p1, p2) = (self.loops[l_v1].prev, self.loops[l_v2].prev);
        self.loops[l_f1].prev = p2;
        self.loops[l_f2].prev = p1;
        self.loops[p2].next = l_f1;
        self.loops[p1].next = l_f2;
        self.loops[l_f1].next = l_v1;
        self.loops[l_f2].next = l_v2;
        self.loops[l_v1].prev = l_f1;
        self.loops[l_v2].prev = l_f2;

        let first = self.faces[f].l_first;
        let first_in_f1 = FaceLoopIter::new(self, Some(l_f1)).any(|l| l == first);
        if first_in_f1 {
            self.faces[f2].l_first = if self.loops[first].prev == l_f1 {
                self.loops[l_f2].prev
            } else if self.loops[first].next == l_f1 {
                self.loops[l_f2].next
            } else {
                l_f2
            };
        } else {
            self.faces[f2].l_first = first;
            self.faces[f].l_first = if self.loops[first].prev == l_f2 {
                self.loops[l_f1].prev
            } else if self.loops[first].next == l_f2 {
                self.loops[l_f1].next
            } else {
                l_f1
            };
        }

        let f2_loops: SmallVec<[LoopId; 8]> =
            FaceLoopIter::new(self, Some(self.faces[f2].l_first)).collect();
        for &l in &f2_loops {
            self.loops[l].f = f2;
        }
        radial_append(e, l_f1, self);
        radial_append(e, l_f2, self);
        self.faces[f2].len = f2_loops.len();
        self.faces[f].len = self.face_loops(f).count();

        self.alloc_face_id(f2);
        self.alloc_loop_id(l_f1);
        self.alloc_loop_id(l_f2);
        self.trace(|t, m| t.on_face_create(m, f2));

        report_touched(
            self,
            "split_face_make_edge",
            &[f.into(), f2.into(), e.into()],
        );
        Ok((f2, l_f2))
    }

    /// Merge `f2` into `f1` by removing the edge `e` they share. The inverse
    /// of [`BMesh::split_face_make_edge`].
    pub fn join_face_kill_edge(
        &mut self,
        f1: FaceId,
        f2: FaceId,
        e: EdgeId,
        scratch: &mut Scratch,
    ) -> Result<FaceId, MeshError> {
        self.ensure(f1)?;
        self.ensure(f2)?;
        self.ensure(e)?;
        if f1 == f2 {
            return Err(MeshError::SameFace);
        }
        if self.radial_count(e) != 2 {
            return Err(MeshError::NotManifold);
        }
        let l_f1 = self.face_edge_share_loop(f1, e).ok_or(MeshError::NotInFace)?;
        let l_f2 = self.face_edge_share_loop(f2, e).ok_or(MeshError::NotInFace)?;
        if self.loops[l_f1].v == self.loops[l_f2].v {
            return Err(MeshError::FlippedWinding);
        }

        // Each endpoint needs an edge of its own on both sides.
        let (n1, p1) = (self.loops[l_f1].next, self.loops[l_f1].prev);
        let (n2, p2) = (self.loops[l_f2].next, self.loops[l_f2].prev);
        let shared_neighbour = self.edge_in_face(self.loops[n1].e, f2)
            || self.edge_in_face(self.loops[p1].e, f2)
            || self.edge_in_face(self.loops[n2].e, f1)
            || self.edge_in_face(self.loops[p2].e, f1);
        let count = self.face_share_edge_count(f1, f2);
        if shared_neighbour || count > 1 {
            return Err(MeshError::SharedEdges { count });
        }

        scratch.verts.clear();
        scratch.verts.extend(
            self.face_loops(f1)
                .filter(|&l| l != l_f1)
                .map(|l| self.loops[l].v),
        );
        let internal = self
            .face_loops(f2)
            .filter(|&l| l != l_f2)
            .any(|l| scratch.verts.contains(&self.loops[l].v));
        scratch.verts.clear();
        if internal {
            return Err(MeshError::InternalJoin);
        }

        self.trace(|t, m| t.on_face_topo(m, f1));
        self.trace(|t, m| t.on_face_kill(m, f2));
        self.trace(|t, m| t.on_edge_kill(m, e));

        self.loops[p1].next = n2;
        self.loops[n2].prev = p1;
        self.loops[n1].prev = p2;
        self.loops[p2].next = n1;
        if self.faces[f1].l_first == l_f1 {
            self.faces[f1].l_first = n1;
        }
        self.faces[f1].len += self.faces[f2].len - 2;

        let loops: SmallVec<[LoopId; 8]> = self.face_loops(f1).collect();
        for l in loops {
            self.loops[l].f = f1;
        }

        let [a, b] = self.edges[e].verts;
        disk_remove(e, a, self);
        disk_remove(e, b, self);
        self.kill_only_edge(e);
        self.kill_only_loop(l_f1);
        self.kill_only_loop(l_f2);
        self.kill_only_face(f2);

        report_touched(self, "join_face_kill_edge", &[f1.into(), a.into(), b.into()]);
        Ok(f1)
    }
}

#[cfg(test)]
mod tests {
    use crate::{config::MeshParams, fixtures, validation::check_mesh, Vec3};

    use super::*;

    #[test]
    fn split_quad_into_two_triangles() {
        let (mut mesh, [a, _, c, _], f) = fixtures::quad(MeshParams::with_ids());
        let l_a = mesh.face_vert_share_loop(f, a).unwrap();
        let l_c = mesh.face_vert_share_loop(f, c).unwrap();

        let (f2, l) = mesh.split_face_make_edge(f, l_a, l_c, None, false).unwrap();
        assert_eq!(mesh.face(f).unwrap().len, 3);
        assert_eq!(mesh.face(f2).unwrap().len, 3);
        let diagonal = mesh.loop_(l).unwrap().e;
        assert_eq!(mesh.edge_exists(a, c), Some(diagonal));
        assert_eq!(mesh.radial_count(diagonal), 2);
        assert_eq!(mesh.face_count(), 2);
        assert_eq!(mesh.loop_count(), 6);
        assert!(check_mesh(&mesh).is_ok());
    }

    #[test]
    fn split_face_keeps_first_loop() {
        let (mut mesh, [a, b, c, d], f) = fixtures::quad(MeshParams::default());
        let first = mesh.face(f).unwrap().l_first;
        let l_b = mesh.face_vert_share_loop(f, b).unwrap();
        let l_d = mesh.face_vert_share_loop(f, d).unwrap();

        let (f2, _) = mesh.split_face_make_edge(f, l_b, l_d, None, false).unwrap();
        // `f` holds b -> c -> d, the old first loop (at a) went to `f2`.
        assert_eq!(mesh.face(f2).unwrap().l_first, first);
        let verts: Vec<_> = mesh.face_handle(f).vertex_ids().collect();
        assert_eq!(verts.len(), 3);
        assert!(verts.contains(&c));
        assert!(mesh.vert_in_face(a, f2));
    }

    #[test]
    fn split_face_rejects_adjacent_loops() {
        let (mut mesh, [a, b, ..], f) = fixtures::quad(MeshParams::default());
        let l_a = mesh.face_vert_share_loop(f, a).unwrap();
        let l_b = mesh.face_vert_share_loop(f, b).unwrap();
        assert_eq!(
            mesh.split_face_make_edge(f, l_a, l_b, None, false),
            Err(MeshError::AdjacentLoops)
        );
        assert_eq!(mesh.edge_count(), 4);
    }

    #[test]
    fn split_then_join_edge_round_trips() {
        let mut mesh = fixtures::grid(2, MeshParams::with_ids());
        let verts: Vec<_> = mesh.vert_ids().collect();
        let e = mesh.edge_exists(verts[1], verts[4]).unwrap();
        let (counts, lens) = (
            (mesh.vert_count(), mesh.edge_count(), mesh.loop_count()),
            mesh.faces().map(|f| f.len()).collect::<Vec<_>>(),
        );

        let (v_new, e_new) = mesh.split_edge_make_vert(verts[1], e).unwrap();
        assert_eq!(mesh.disk_count(v_new), 2);
        assert_eq!(mesh.disk_count(verts[1]), 3);
        assert_eq!(mesh.disk_count(verts[4]), 4);
        assert_eq!(mesh.radial_count(e), 2);
        assert_eq!(mesh.radial_count(e_new), 2);
        assert_eq!(mesh.edge(e).unwrap().verts, [verts[1], v_new]);
        assert!(check_mesh(&mesh).is_ok());
        assert!(mesh.faces().take(2).all(|f| f.len() == 5));

        let mut scratch = Scratch::new();
        let kept = mesh
            .join_edge_kill_vert(e_new, v_new, JoinEdgeOptions::default(), &mut scratch)
            .unwrap();
        assert_eq!(kept, e);
        assert_eq!(mesh.edge_exists(verts[1], verts[4]), Some(e));
        assert_eq!(
            (mesh.vert_count(), mesh.edge_count(), mesh.loop_count()),
            counts
        );
        assert_eq!(mesh.faces().map(|f| f.len()).collect::<Vec<_>>(), lens);
        assert!(check_mesh(&mesh).is_ok());
    }

    #[test]
    fn split_wire_edge() {
        let mut mesh = BMesh::new(MeshParams::default());
        let a = mesh.create_vert(Vec3::zeros(), None);
        let b = mesh.create_vert(Vec3::x(), None);
        let e = mesh.create_edge(a, b, None, false).unwrap();

        let (v, e_new) = mesh.split_edge_make_vert(b, e).unwrap();
        assert_eq!(mesh.vert(v).unwrap().co, Vec3::x());
        assert_eq!(mesh.edge(e_new).unwrap().verts, [v, a]);
        assert_eq!(mesh.disk_count(a), 1);
        assert!(check_mesh(&mesh).is_ok());
    }

    #[test]
    fn join_edge_needs_valence_two() {
        let mut mesh = fixtures::grid(2, MeshParams::default());
        let verts: Vec<_> = mesh.vert_ids().collect();
        let e = mesh.edge_exists(verts[1], verts[4]).unwrap();
        let mut scratch = Scratch::new();
        assert_eq!(
            mesh.join_edge_kill_vert(e, verts[4], JoinEdgeOptions::default(), &mut scratch),
            Err(MeshError::InvalidValence { found: 4 })
        );
        assert_eq!(
            mesh.join_edge_kill_vert(e, verts[0], JoinEdgeOptions::default(), &mut scratch),
            Err(MeshError::NotInEdge)
        );
    }

    #[test]
    fn join_edge_kills_degenerate_faces() {
        let mut mesh = BMesh::new(MeshParams::default());
        let a = mesh.create_vert(Vec3::zeros(), None);
        let b = mesh.create_vert(Vec3::x(), None);
        let c = mesh.create_vert(Vec3::y(), None);
        mesh.create_face_verts(&[a, b, c], None, false, true).unwrap();
        let ca = mesh.edge_exists(c, a).unwrap();

        let mut scratch = Scratch::new();
        let opts = JoinEdgeOptions {
            kill_degenerate_faces: true,
            ..Default::default()
        };
        // `b` has valence two, folding it away leaves a-c twice.
        let ab = mesh.edge_exists(a, b).unwrap();
        let kept = mesh.join_edge_kill_vert(ab, b, opts, &mut scratch).unwrap();
        assert_eq!(mesh.face_count(), 0);
        assert_eq!(mesh.edge_count(), 2);
        assert_ne!(kept, ca);
        assert_eq!(mesh.edge_handle(kept).other(a).map(|v| v.id()), Some(c));
        assert_eq!(mesh.loop_count(), 0);
        assert!(check_mesh(&mesh).is_ok());
    }

    #[test]
    fn join_faces_across_grid_edge() {
        let mut mesh = fixtures::grid(2, MeshParams::with_ids());
        let verts: Vec<_> = mesh.vert_ids().collect();
        let faces: Vec<_> = mesh.face_ids().collect();
        let e = mesh.edge_exists(verts[1], verts[4]).unwrap();
        let mut scratch = Scratch::new();

        let f = mesh
            .join_face_kill_edge(faces[0], faces[1], e, &mut scratch)
            .unwrap();
        assert_eq!(f, faces[0]);
        assert_eq!(mesh.face_count(), 3);
        assert_eq!(mesh.face(f).unwrap().len, 6);
        assert_eq!(mesh.edge_exists(verts[1], verts[4]), None);
        assert_eq!(fixtures::euler_characteristic(&mesh), 1);
        assert!(check_mesh(&mesh).is_ok());
        assert!(scratch.verts.is_empty());
    }

    #[test]
    fn join_faces_rejects_bad_input() {
        let mut mesh = fixtures::grid(2, MeshParams::default());
        let verts: Vec<_> = mesh.vert_ids().collect();
        let faces: Vec<_> = mesh.face_ids().collect();
        let inner = mesh.edge_exists(verts[1], verts[4]).unwrap();
        let boundary = mesh.edge_exists(verts[0], verts[1]).unwrap();
        let mut scratch = Scratch::new();

        assert_eq!(
            mesh.join_face_kill_edge(faces[0], faces[0], inner, &mut scratch),
            Err(MeshError::SameFace)
        );
        assert_eq!(
            mesh.join_face_kill_edge(faces[0], faces[1], boundary, &mut scratch),
            Err(MeshError::NotManifold)
        );
        assert_eq!(
            mesh.join_face_kill_edge(faces[0], faces[3], inner, &mut scratch),
            Err(MeshError::NotInFace)
        );
        assert_eq!(mesh.face_count(), 4);
    }

    #[test]
    fn join_faces_rejects_second_shared_edge() {
        let mut mesh = fixtures::tetrahedron(MeshParams::default());
        let faces: Vec<_> = mesh.face_ids().collect();
        let verts: Vec<_> = mesh.vert_ids().collect();
        // Faces 0 (0 2 1) and 1 (0 1 3) share only 0-1.
        let e = mesh.edge_exists(verts[0], verts[1]).unwrap();
        let mut scratch = Scratch::new();
        let joined = mesh.join_face_kill_edge(faces[0], faces[1], e, &mut scratch);
        assert!(joined.is_ok());
        assert_eq!(mesh.face_count(), 3);

        // The quad 0 2 1 3 now touches face 2 (1 2 3) along two edges.
        let quad = faces[0];
        let shared = mesh.edge_exists(verts[1], verts[2]).unwrap();
        assert_eq!(
            mesh.join_face_kill_edge(quad, faces[2], shared, &mut scratch),
            Err(MeshError::SharedEdges { count: 2 })
        );
    }
}
