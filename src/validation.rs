// The functions defined here should remain functions, don't refactor them to methods.
// They only read the mesh and must keep working on a mesh whose links are
// broken, so none of them go through the handle types.

use std::collections::HashSet;

use crate::{iterators::MAX_LOOP_ITERATIONS, BMesh, EdgeId, ElemRef, FaceId, LoopId, VertId};

bitflags::bitflags! {
    /// Invariant violations found around one element.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ElemErrors: u32 {
        /// The element itself is not live.
        const DEAD = 1 << 0;
        /// A link points at an element that is not live.
        const DEAD_LINK = 1 << 1;
        const VERT_NOT_IN_EDGE = 1 << 2;
        const DISK_BROKEN = 1 << 3;
        const EDGE_DEGENERATE = 1 << 4;
        const RADIAL_BROKEN = 1 << 5;
        /// A loop's vertex pair does not match its edge.
        const LOOP_VERT_MISMATCH = 1 << 6;
        const LOOP_WRONG_FACE = 1 << 7;
        const FACE_CYCLE_BROKEN = 1 << 8;
        const FACE_LEN_MISMATCH = 1 << 9;
        const FACE_DUPLICATE_VERT = 1 << 10;
        const FACE_DUPLICATE_EDGE = 1 << 11;
        const FACE_DUPLICATE_LOOP = 1 << 12;
        /// The radial cycle a loop sits in is not the one of its edge.
        const RADIAL_LEN_MISMATCH = 1 << 13;
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum MeshCorrectness {
    Correct,
    InvalidElement(ElemRef, ElemErrors),
    /// Face lengths do not add up to the number of loops.
    LoopCountMismatch { face_lens: usize, loops: usize },
    /// Radial cycle lengths do not add up to the number of loops.
    RadialCountMismatch { radial_lens: usize, loops: usize },
    /// Disk cycle lengths do not add up to twice the number of edges.
    DiskCountMismatch { disk_lens: usize, edges: usize },
}

impl MeshCorrectness {
    pub fn is_ok(&self) -> bool {
        *self == MeshCorrectness::Correct
    }
}

pub fn check_element(mesh: &BMesh, elem: ElemRef) -> ElemErrors {
    match elem {
        ElemRef::Vert(v) => check_vert(mesh, v),
        ElemRef::Edge(e) => check_edge(mesh, e),
        ElemRef::Loop(l) => check_loop(mesh, l),
        ElemRef::Face(f) => check_face(mesh, f),
    }
}

fn check_vert(mesh: &BMesh, v: VertId) -> ElemErrors {
    let mut errors = ElemErrors::empty();
    let Some(vert) = mesh.verts.get(v) else {
        return ElemErrors::DEAD;
    };
    let Some(first) = vert.e else {
        return errors;
    };
    let Some(edge) = mesh.edges.get(first) else {
        return ElemErrors::DEAD_LINK;
    };
    if edge.endpoint(v).is_none() {
        return ElemErrors::VERT_NOT_IN_EDGE;
    }

    if disk_len(mesh, first, v).is_none() {
        errors |= ElemErrors::DISK_BROKEN;
    }
    errors
}

/// Length of the disk cycle of `v` through `start`, `None` if it is broken.
fn disk_len(mesh: &BMesh, start: EdgeId, v: VertId) -> Option<usize> {
    let mut current = start;
    for count in 1..=MAX_LOOP_ITERATIONS {
        let edge = mesh.edges.get(current)?;
        edge.endpoint(v)?;
        let next = edge.disk_at(v).next;
        let next_edge = mesh.edges.get(next)?;
        if next_edge.endpoint(v).is_none() || next_edge.disk_at(v).prev != current {
            return None;
        }
        if next == start {
            return Some(count);
        }
        current = next;
    }
    None
}

fn check_edge(mesh: &BMesh, e: EdgeId) -> ElemErrors {
    let mut errors = ElemErrors::empty();
    let Some(edge) = mesh.edges.get(e) else {
        return ElemErrors::DEAD;
    };
    let [v1, v2] = edge.verts;
    if v1 == v2 {
        errors |= ElemErrors::EDGE_DEGENERATE;
    }
    if !mesh.verts.contains_key(v1) || !mesh.verts.contains_key(v2) {
        return errors | ElemErrors::DEAD_LINK;
    }

    for v in [v1, v2] {
        if disk_len(mesh, e, v).is_none() {
            errors |= ElemErrors::DISK_BROKEN;
        }
    }
    // The edge must be reachable from the vertex, not only the other way.
    for v in [v1, v2] {
        let reachable = mesh.verts[v]
            .e
            .is_some_and(|first| disk_contains(mesh, first, v, e));
        if !reachable {
            errors |= ElemErrors::DISK_BROKEN;
        }
    }

    if let Some(first) = edge.l {
        if radial_len(mesh, first, e).is_none() {
            errors |= ElemErrors::RADIAL_BROKEN;
        }
        for l in mesh.radial_loops(e) {
            if !loop_matches_edge(mesh, l) {
                errors |= ElemErrors::LOOP_VERT_MISMATCH;
            }
        }
    }
    errors
}

fn disk_contains(mesh: &BMesh, start: EdgeId, v: VertId, target: EdgeId) -> bool {
    let mut current = start;
    for _ in 0..MAX_LOOP_ITERATIONS {
        if current == target {
            return true;
        }
        let Some(edge) = mesh.edges.get(current) else {
            return false;
        };
        if edge.endpoint(v).is_none() {
            return false;
        }
        current = edge.disk_at(v).next;
        if current == start {
            return false;
        }
    }
    false
}

/// Length of the radial cycle through `start`, `None` if a loop in it is
/// dead, points elsewhere or has inconsistent links.
fn radial_len(mesh: &BMesh, start: LoopId, e: EdgeId) -> Option<usize> {
    let mut current = start;
    for count in 1..=MAX_LOOP_ITERATIONS {
        let l = mesh.loops.get(current)?;
        if l.e != e {
            return None;
        }
        let next = mesh.loops.get(l.radial_next)?;
        if next.radial_prev != current {
            return None;
        }
        if l.radial_next == start {
            return Some(count);
        }
        current = l.radial_next;
    }
    None
}

/// `l.v` and `l.next.v` are the two endpoints of `l.e`.
fn loop_matches_edge(mesh: &BMesh, l: LoopId) -> bool {
    let Some(lp) = mesh.loops.get(l) else {
        return false;
    };
    let (Some(edge), Some(next)) = (mesh.edges.get(lp.e), mesh.loops.get(lp.next)) else {
        return false;
    };
    edge.other(lp.v) == Some(next.v)
}

fn check_loop(mesh: &BMesh, l: LoopId) -> ElemErrors {
    let mut errors = ElemErrors::empty();
    let Some(lp) = mesh.loops.get(l) else {
        return ElemErrors::DEAD;
    };
    let links_live = mesh.verts.contains_key(lp.v)
        && mesh.edges.contains_key(lp.e)
        && mesh.faces.contains_key(lp.f)
        && [lp.next, lp.prev, lp.radial_next, lp.radial_prev]
            .iter()
            .all(|&x| mesh.loops.contains_key(x));
    if !links_live {
        return ElemErrors::DEAD_LINK;
    }

    if mesh.loops[lp.next].prev != l || mesh.loops[lp.prev].next != l {
        errors |= ElemErrors::FACE_CYCLE_BROKEN;
    }
    if mesh.loops[lp.next].f != lp.f {
        errors |= ElemErrors::LOOP_WRONG_FACE;
    }
    if mesh.loops[lp.radial_next].radial_prev != l || mesh.loops[lp.radial_prev].radial_next != l {
        errors |= ElemErrors::RADIAL_BROKEN;
    }
    if !loop_matches_edge(mesh, l) {
        errors |= ElemErrors::LOOP_VERT_MISMATCH;
    }

    // Walking from the edge must reach this loop.
    if !mesh.radial_loops(lp.e).any(|x| x == l) {
        errors |= ElemErrors::RADIAL_LEN_MISMATCH;
    }
    errors
}

fn check_face(mesh: &BMesh, f: FaceId) -> ElemErrors {
    let mut errors = ElemErrors::empty();
    let Some(face) = mesh.faces.get(f) else {
        return ElemErrors::DEAD;
    };
    if !mesh.loops.contains_key(face.l_first) {
        return ElemErrors::DEAD_LINK;
    }

    let mut verts = HashSet::new();
    let mut edges = HashSet::new();
    let mut loops = HashSet::new();
    let mut current = face.l_first;
    let mut count = 0;
    loop {
        let Some(lp) = mesh.loops.get(current) else {
            return errors | ElemErrors::DEAD_LINK;
        };
        count += 1;
        if lp.f != f {
            errors |= ElemErrors::LOOP_WRONG_FACE;
        }
        if !loops.insert(current) {
            errors |= ElemErrors::FACE_DUPLICATE_LOOP;
            break;
        }
        if !verts.insert(lp.v) {
            errors |= ElemErrors::FACE_DUPLICATE_VERT;
        }
        if !edges.insert(lp.e) {
            errors |= ElemErrors::FACE_DUPLICATE_EDGE;
        }
        errors |= check_loop(mesh, current) & !ElemErrors::LOOP_WRONG_FACE;

        current = lp.next;
        if current == face.l_first || count > MAX_LOOP_ITERATIONS {
            break;
        }
    }

    if current != face.l_first {
        errors |= ElemErrors::FACE_CYCLE_BROKEN;
    }
    if count != face.len {
        errors |= ElemErrors::FACE_LEN_MISMATCH;
    }
    errors
}

/// If this returns `Correct` then it is safe to create handles and walk every
/// cycle.
pub fn check_mesh(mesh: &BMesh) -> MeshCorrectness {
    let elems = mesh
        .verts
        .keys()
        .map(ElemRef::Vert)
        .chain(mesh.edges.keys().map(ElemRef::Edge))
        .chain(mesh.loops.keys().map(ElemRef::Loop))
        .chain(mesh.faces.keys().map(ElemRef::Face));
    for elem in elems {
        let errors = check_element(mesh, elem);
        if !errors.is_empty() {
            return MeshCorrectness::InvalidElement(elem, errors);
        }
    }

    let face_lens: usize = mesh.faces.values().map(|f| f.len).sum();
    if face_lens != mesh.loops.len() {
        return MeshCorrectness::LoopCountMismatch {
            face_lens,
            loops: mesh.loops.len(),
        };
    }

    let radial_lens: usize = mesh.edges.keys().map(|e| mesh.radial_count(e)).sum();
    if radial_lens != mesh.loops.len() {
        return MeshCorrectness::RadialCountMismatch {
            radial_lens,
            loops: mesh.loops.len(),
        };
    }

    let disk_lens: usize = mesh.verts.keys().map(|v| mesh.disk_count(v)).sum();
    if disk_lens != 2 * mesh.edges.len() {
        return MeshCorrectness::DiskCountMismatch {
            disk_lens,
            edges: mesh.edges.len(),
        };
    }

    MeshCorrectness::Correct
}

/// Check the elements an operator touched. Runs only when validation is on
/// and reports through the log, it never changes the outcome of the operator.
pub(crate) fn report_touched(mesh: &BMesh, op: &str, touched: &[ElemRef]) {
    if !mesh.params.validate_enabled() {
        return;
    }
    for &elem in touched {
        if !mesh.contains(elem) {
            continue;
        }
        let errors = check_element(mesh, elem);
        if !errors.is_empty() {
            log::error!("{op}: {elem:?} is invalid: {errors:?}");
        }
    }
}
