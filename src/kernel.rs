//! Creation and destruction primitives and the adjacency queries the
//! operators are built on.
use smallvec::SmallVec;

use crate::{
    attributes::AttrBlock,
    helpers::{disk_append, disk_remove, radial_append, radial_remove},
    BMesh, DiskLink, Edge, EdgeId, ElemRef, Face, FaceId, Header, Loop, LoopId, MeshError, Vec3,
    Vert, VertId,
};

impl BMesh {
    /// Error unless `elem` is live.
    pub(crate) fn ensure(&self, elem: impl Into<ElemRef>) -> Result<(), MeshError> {
        let elem = elem.into();
        if self.contains(elem) {
            Ok(())
        } else {
            Err(MeshError::DeadElement(elem))
        }
    }

    /// New isolated vertex. With `example` its flags, normal and attributes
    /// are copied.
    pub fn create_vert(&mut self, co: Vec3, example: Option<VertId>) -> VertId {
        let (no, head) = match example.and_then(|v| self.verts.get(v)) {
            Some(ex) => (
                ex.no,
                Header {
                    flag: ex.head.flag,
                    data: self.vdata.copy_block(&ex.head.data),
                },
            ),
            None => (Vec3::zeros(), Header::new(self.vdata.alloc_block())),
        };

        let v = self.verts.insert(Vert {
            co,
            no,
            head,
            e: None,
        });
        self.alloc_vert_id(v);
        self.trace(|t, m| t.on_vert_create(m, v));
        v
    }

    /// New edge between two distinct vertices, appended to both disk cycles.
    /// With `no_double` an existing edge between them is returned instead.
    pub fn create_edge(
        &mut self,
        v1: VertId,
        v2: VertId,
        example: Option<EdgeId>,
        no_double: bool,
    ) -> Result<EdgeId, MeshError> {
        self.ensure(v1)?;
        self.ensure(v2)?;
        if v1 == v2 {
            return Err(MeshError::DegenerateEdge);
        }
        if no_double {
            if let Some(e) = self.edge_exists(v1, v2) {
                return Ok(e);
            }
        }

        let head = match example.and_then(|e| self.edges.get(e)) {
            Some(ex) => Header {
                flag: ex.head.flag,
                data: self.edata.copy_block(&ex.head.data),
            },
            None => Header::new(self.edata.alloc_block()),
        };
        let e = self.new_edge_record(v1, v2, head);
        self.alloc_edge_id(e);
        self.trace(|t, m| t.on_edge_create(m, e));
        Ok(e)
    }

    /// New face over `verts`, where `edges[i]` joins `verts[i]` and
    /// `verts[i + 1]` (wrapping). With `no_double` an existing face over the
    /// same vertex set is returned instead.
    pub fn create_face(
        &mut self,
        verts: &[VertId],
        edges: &[EdgeId],
        example: Option<FaceId>,
        no_double: bool,
    ) -> Result<FaceId, MeshError> {
        if verts.is_empty() {
            return Err(MeshError::EmptyFace);
        }
        if edges.len() != verts.len() {
            return Err(MeshError::EdgeMismatch {
                index: verts.len().min(edges.len()),
            });
        }
        for &v in verts {
            self.ensure(v)?;
        }
        for (i, &e) in edges.iter().enumerate() {
            self.ensure(e)?;
            let (a, b) = (verts[i], verts[(i + 1) % verts.len()]);
            if self.edges[e].other(a) != Some(b) {
                return Err(MeshError::EdgeMismatch { index: i });
            }
        }
        if no_double {
            if let Some(f) = self.face_exists(verts) {
                return Ok(f);
            }
        }

        let (head, mat_nr) = match example.and_then(|f| self.faces.get(f)) {
            Some(ex) => (
                Header {
                    flag: ex.head.flag,
                    data: self.pdata.copy_block(&ex.head.data),
                },
                ex.mat_nr,
            ),
            None => (Header::new(self.pdata.alloc_block()), 0),
        };
        let blocks = vec![self.ldata.alloc_block(); verts.len()];
        let f = self.new_face_record(verts, edges, head, mat_nr, blocks);

        self.alloc_face_id(f);
        let loops: SmallVec<[LoopId; 8]> = self.face_loops(f).collect();
        for l in loops {
            self.alloc_loop_id(l);
        }
        let no = self.face_handle(f).calc_normal();
        self.faces[f].no = no;
        self.trace(|t, m| t.on_face_create(m, f));
        Ok(f)
    }

    /// Face from vertices only. Missing edges are created when
    /// `create_edges` is set, otherwise they are an error.
    pub fn create_face_verts(
        &mut self,
        verts: &[VertId],
        example: Option<FaceId>,
        no_double: bool,
        create_edges: bool,
    ) -> Result<FaceId, MeshError> {
        if verts.is_empty() {
            return Err(MeshError::EmptyFace);
        }
        for &v in verts {
            self.ensure(v)?;
        }
        if no_double {
            if let Some(f) = self.face_exists(verts) {
                return Ok(f);
            }
        }

        let n = verts.len();
        let mut edges: SmallVec<[Option<EdgeId>; 8]> = SmallVec::with_capacity(n);
        for i in 0..n {
            let (a, b) = (verts[i], verts[(i + 1) % n]);
            if a == b {
                return Err(MeshError::DegenerateEdge);
            }
            let e = self.edge_exists(a, b);
            if e.is_none() && !create_edges {
                return Err(MeshError::EdgeMismatch { index: i });
            }
            edges.push(e);
        }

        let mut resolved: SmallVec<[EdgeId; 8]> = SmallVec::with_capacity(n);
        for (i, e) in edges.into_iter().enumerate() {
            let e = match e {
                Some(e) => e,
                // An earlier iteration may already have made this edge.
                None => self.create_edge(verts[i], verts[(i + 1) % n], None, true)?,
            };
            resolved.push(e);
        }

        self.create_face(verts, &resolved, example, false)
    }

    /// Remove a face and its loops. Edges and vertices stay, possibly as wire.
    pub fn kill_face(&mut self, f: FaceId) -> Result<(), MeshError> {
        self.ensure(f)?;
        self.trace(|t, m| t.on_face_kill(m, f));

        let loops: SmallVec<[LoopId; 8]> = self.face_loops(f).collect();
        for l in loops {
            let e = self.loops[l].e;
            radial_remove(l, e, self);
            self.kill_only_loop(l);
        }
        self.kill_only_face(f);
        Ok(())
    }

    /// Remove a face, then any of its edges left without faces and any of its
    /// vertices left without edges.
    pub fn kill_face_loose(&mut self, f: FaceId) -> Result<(), MeshError> {
        self.ensure(f)?;
        let (verts, edges): (SmallVec<[VertId; 8]>, SmallVec<[EdgeId; 8]>) = self
            .face_loops(f)
            .map(|l| (self.loops[l].v, self.loops[l].e))
            .unzip();

        self.kill_face(f)?;
        for e in edges {
            if self.edges.get(e).is_some_and(|e| e.l.is_none()) {
                self.kill_edge(e)?;
            }
        }
        for v in verts {
            if self.verts.get(v).is_some_and(|v| v.e.is_none()) {
                self.kill_vert(v)?;
            }
        }
        Ok(())
    }

    /// Remove an edge and every face using it.
    pub fn kill_edge(&mut self, e: EdgeId) -> Result<(), MeshError> {
        self.ensure(e)?;
        while let Some(l) = self.edges[e].l {
            let f = self.loops[l].f;
            self.kill_face(f)?;
        }

        self.trace(|t, m| t.on_edge_kill(m, e));
        let [v1, v2] = self.edges[e].verts;
        disk_remove(e, v1, self);
        disk_remove(e, v2, self);
        self.kill_only_edge(e);
        Ok(())
    }

    /// Remove a vertex and everything attached to it.
    pub fn kill_vert(&mut self, v: VertId) -> Result<(), MeshError> {
        self.ensure(v)?;
        while let Some(e) = self.verts[v].e {
            self.kill_edge(e)?;
        }

        self.trace(|t, m| t.on_vert_kill(m, v));
        self.kill_only_vert(v);
        Ok(())
    }

    pub(crate) fn new_edge_record(&mut self, v1: VertId, v2: VertId, head: Header) -> EdgeId {
        let e = self.edges.insert_with_key(|e| Edge {
            head,
            verts: [v1, v2],
            l: None,
            disk: [DiskLink { prev: e, next: e }; 2],
        });
        disk_append(e, v1, self);
        disk_append(e, v2, self);
        e
    }

    /// A loop linked only to itself.
    pub(crate) fn new_loop_record(
        &mut self,
        v: VertId,
        e: EdgeId,
        f: FaceId,
        data: AttrBlock,
    ) -> LoopId {
        self.loops.insert_with_key(|l| Loop {
            head: Header::new(data),
            v,
            e,
            f,
            next: l,
            prev: l,
            radial_next: l,
            radial_prev: l,
        })
    }

    /// A face without loops. The caller links them and sets `l_first`/`len`.
    pub(crate) fn new_face_shell(&mut self, head: Header, mat_nr: i16, no: Vec3) -> FaceId {
        self.faces.insert(Face {
            no,
            mat_nr,
            head,
            l_first: LoopId::default(),
            len: 0,
        })
    }

    /// Build a face and its loop cycle without ids or tracing. `blocks`
    /// holds one loop block per corner.
    pub(crate) fn new_face_record(
        &mut self,
        verts: &[VertId],
        edges: &[EdgeId],
        head: Header,
        mat_nr: i16,
        blocks: Vec<AttrBlock>,
    ) -> FaceId {
        let n = verts.len();
        let f = self.new_face_shell(head, mat_nr, Vec3::zeros());
        let loops: SmallVec<[LoopId; 8]> = verts
            .iter()
            .zip(edges)
            .zip(blocks)
            .map(|((&v, &e), data)| self.new_loop_record(v, e, f, data))
            .collect();

        for (i, &l) in loops.iter().enumerate() {
            self.loops[l].next = loops[(i + 1) % n];
            self.loops[l].prev = loops[(i + n - 1) % n];
            radial_append(edges[i], l, self);
        }

        let face = &mut self.faces[f];
        face.l_first = loops[0];
        face.len = n;
        f
    }

    pub(crate) fn kill_only_vert(&mut self, v: VertId) {
        self.release_vert_id(v, false);
        self.verts.remove(v);
    }

    pub(crate) fn kill_only_edge(&mut self, e: EdgeId) {
        self.release_edge_id(e, false);
        self.edges.remove(e);
    }

    pub(crate) fn kill_only_loop(&mut self, l: LoopId) {
        self.release_loop_id(l, false);
        self.loops.remove(l);
    }

    pub(crate) fn kill_only_face(&mut self, f: FaceId) {
        self.release_face_id(f, false);
        self.faces.remove(f);
    }

    /// Edge between `v1` and `v2`, if any.
    pub fn edge_exists(&self, v1: VertId, v2: VertId) -> Option<EdgeId> {
        if v1 == v2 || !self.verts.contains_key(v2) {
            return None;
        }
        self.disk_edges(v1)
            .find(|&e| self.edges[e].other(v1) == Some(v2))
    }

    /// Faces with a corner at `v`, each once.
    pub fn vert_faces(&self, v: VertId) -> SmallVec<[FaceId; 8]> {
        let mut faces = SmallVec::new();
        for e in self.disk_edges(v) {
            for l in self.radial_loops(e) {
                let f = self.loops[l].f;
                if self.loops[l].v == v && !faces.contains(&f) {
                    faces.push(f);
                }
            }
        }
        faces
    }

    /// Corners at `v`.
    pub fn vert_loops(&self, v: VertId) -> SmallVec<[LoopId; 8]> {
        self.disk_edges(v)
            .flat_map(|e| self.radial_loops(e))
            .filter(|&l| self.loops[l].v == v)
            .collect()
    }

    fn face_has_vert_set(&self, f: FaceId, verts: &[VertId]) -> bool {
        self.faces[f].len == verts.len()
            && self
                .face_loops(f)
                .all(|l| verts.contains(&self.loops[l].v))
    }

    /// Face whose vertex set equals `verts`, ignoring order.
    pub fn face_exists(&self, verts: &[VertId]) -> Option<FaceId> {
        let &first = verts.first()?;
        if !self.verts.contains_key(first) {
            return None;
        }
        self.vert_faces(first)
            .into_iter()
            .find(|&f| self.face_has_vert_set(f, verts))
    }

    /// Another face over exactly the vertices of `f`.
    pub fn face_find_double(&self, f: FaceId) -> Option<FaceId> {
        let verts: SmallVec<[VertId; 8]> = self.face_loops(f).map(|l| self.loops[l].v).collect();
        let &first = verts.first()?;
        self.vert_faces(first)
            .into_iter()
            .find(|&g| g != f && self.face_has_vert_set(g, &verts))
    }

    /// Corner of `f` at `v`.
    pub fn face_vert_share_loop(&self, f: FaceId, v: VertId) -> Option<LoopId> {
        self.face_loops(f).find(|&l| self.loops[l].v == v)
    }

    /// Corner of `f` running along `e`.
    pub fn face_edge_share_loop(&self, f: FaceId, e: EdgeId) -> Option<LoopId> {
        self.radial_loops(e).find(|&l| self.loops[l].f == f)
    }

    pub fn vert_in_face(&self, v: VertId, f: FaceId) -> bool {
        self.face_vert_share_loop(f, v).is_some()
    }

    pub fn edge_in_face(&self, e: EdgeId, f: FaceId) -> bool {
        self.face_edge_share_loop(f, e).is_some()
    }

    /// Number of edges of `a` that `b` uses too.
    pub fn face_share_edge_count(&self, a: FaceId, b: FaceId) -> usize {
        self.face_loops(a)
            .filter(|&l| self.edge_in_face(self.loops[l].e, b))
            .count()
    }

    /// Mutable access to a vertex's values. The tracer hears about it first.
    pub fn vert_mut(&mut self, v: VertId) -> Option<&mut Vert> {
        if !self.verts.contains_key(v) {
            return None;
        }
        self.trace(|t, m| t.on_vert_modify(m, v));
        self.verts.get_mut(v)
    }

    pub fn edge_mut(&mut self, e: EdgeId) -> Option<&mut Edge> {
        if !self.edges.contains_key(e) {
            return None;
        }
        self.trace(|t, m| t.on_edge_modify(m, e));
        self.edges.get_mut(e)
    }

    pub fn face_mut(&mut self, f: FaceId) -> Option<&mut Face> {
        if !self.faces.contains_key(f) {
            return None;
        }
        self.trace(|t, m| t.on_face_modify(m, f));
        self.faces.get_mut(f)
    }

    /// Loop values are recorded as part of their face.
    pub fn loop_mut(&mut self, l: LoopId) -> Option<&mut Loop> {
        let f = self.loops.get(l)?.f;
        self.trace(|t, m| t.on_face_modify(m, f));
        self.loops.get_mut(l)
    }
}

#[cfg(test)]
mod tests {
    use crate::{config::MeshParams, fixtures, validation::check_mesh, Vec3};

    use super::*;

    #[test]
    fn create_then_kill_vert_restores_counts() {
        let mut mesh = fixtures::grid(2, MeshParams::with_ids());
        let counts = (mesh.vert_count(), mesh.edge_count(), mesh.face_count());

        let v = mesh.create_vert(Vec3::new(5.0, 5.0, 0.0), None);
        mesh.kill_vert(v).unwrap();

        assert_eq!(
            (mesh.vert_count(), mesh.edge_count(), mesh.face_count()),
            counts
        );
        assert!(check_mesh(&mesh).is_ok());
    }

    #[test]
    fn create_face_rejects_bad_input() {
        let mut mesh = BMesh::new(MeshParams::default());
        let a = mesh.create_vert(Vec3::zeros(), None);
        let b = mesh.create_vert(Vec3::x(), None);
        let c = mesh.create_vert(Vec3::y(), None);
        let ab = mesh.create_edge(a, b, None, false).unwrap();
        let bc = mesh.create_edge(b, c, None, false).unwrap();

        assert_eq!(mesh.create_face(&[], &[], None, false), Err(MeshError::EmptyFace));
        assert_eq!(
            mesh.create_face(&[a, b, c], &[ab, bc, ab], None, false),
            Err(MeshError::EdgeMismatch { index: 2 })
        );
        assert_eq!(
            mesh.create_face_verts(&[a, b, c], None, false, false),
            Err(MeshError::EdgeMismatch { index: 2 })
        );
        assert_eq!(mesh.face_count(), 0);
        assert_eq!(mesh.loop_count(), 0);
    }

    #[test]
    fn no_double_returns_existing_elements() {
        let (mut mesh, [a, b, c, d], f) = fixtures::quad(MeshParams::default());
        let e = mesh.edge_exists(a, b).unwrap();
        assert_eq!(mesh.create_edge(b, a, None, true), Ok(e));
        assert_eq!(mesh.create_face_verts(&[c, d, a, b], None, true, true), Ok(f));
        assert_eq!(mesh.face_exists(&[d, c, b, a]), Some(f));
        assert_eq!(mesh.face_find_double(f), None);

        let g = mesh.create_face_verts(&[a, b, c, d], None, false, true).unwrap();
        assert_eq!(mesh.face_find_double(f), Some(g));
        assert_eq!(mesh.radial_count(e), 2);
    }

    #[test]
    fn kill_edge_takes_its_faces() {
        let mut mesh = fixtures::grid(2, MeshParams::default());
        let verts: Vec<_> = mesh.vert_ids().collect();
        let inner = mesh.edge_exists(verts[1], verts[4]).unwrap();
        assert_eq!(mesh.radial_count(inner), 2);

        mesh.kill_edge(inner).unwrap();
        assert_eq!(mesh.face_count(), 2);
        assert_eq!(mesh.edge_count(), 11);
        assert_eq!(mesh.loop_count(), 8);
        assert!(check_mesh(&mesh).is_ok());
    }

    #[test]
    fn kill_face_loose_removes_orphans() {
        let mut mesh = fixtures::grid(2, MeshParams::default());
        let corner = mesh.face_ids().next().unwrap();

        mesh.kill_face_loose(corner).unwrap();
        // The outer corner and its two boundary edges go, the rest is shared.
        assert_eq!(mesh.face_count(), 3);
        assert_eq!(mesh.vert_count(), 8);
        assert_eq!(mesh.edge_count(), 10);
        assert!(check_mesh(&mesh).is_ok());
    }

    #[test]
    fn share_queries() {
        let mesh = fixtures::grid(2, MeshParams::default());
        let faces: Vec<_> = mesh.face_ids().collect();
        let verts: Vec<_> = mesh.vert_ids().collect();

        assert_eq!(mesh.face_share_edge_count(faces[0], faces[1]), 1);
        assert_eq!(mesh.face_share_edge_count(faces[0], faces[3]), 0);
        assert_eq!(mesh.vert_faces(verts[4]).len(), 4);
        assert_eq!(mesh.disk_count(verts[4]), 4);
        assert!(mesh.vert_in_face(verts[4], faces[3]));
        assert!(mesh.face_vert_share_loop(faces[0], verts[8]).is_none());
    }

    #[test]
    fn loops_get_ids() {
        let (mesh, _, f) = fixtures::quad(MeshParams::with_ids());
        let ids: Vec<_> = mesh
            .face_loops(f)
            .map(|l| mesh.loop_id(l).unwrap())
            .collect();
        assert_eq!(ids, [0, 1, 2, 3]);
        assert_eq!(mesh.face_id(f), Some(0));
    }
}
