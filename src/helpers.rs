// The functions defined here should remain functions, don't refactor them to
// methods. They are the only place where cycle links are written, the kernel
// and the operators are built on top of them.

use smallvec::SmallVec;

use crate::{iterators::RadialLoopIter, BMesh, DiskLink, EdgeId, LoopId, VertId};

// WARNING: These functions can and will break invariants of the mesh when
// used on their own. Callers restore them before returning.

/// Insert `e` into the disk cycle of `v`, right before `v.e`.
pub(crate) fn disk_append(e: EdgeId, v: VertId, mesh: &mut BMesh) {
    match mesh.verts[v].e {
        None => {
            mesh.verts[v].e = Some(e);
            *mesh.edges[e].disk_at_mut(v) = DiskLink { prev: e, next: e };
        }
        Some(first) => {
            let prev = mesh.edges[first].disk_at(v).prev;
            *mesh.edges[e].disk_at_mut(v) = DiskLink { prev, next: first };
            mesh.edges[prev].disk_at_mut(v).next = e;
            mesh.edges[first].disk_at_mut(v).prev = e;
        }
    }
}

/// Unlink `e` from the disk cycle of `v`, moving `v.e` off it if needed.
pub(crate) fn disk_remove(e: EdgeId, v: VertId, mesh: &mut BMesh) {
    let DiskLink { prev, next } = *mesh.edges[e].disk_at(v);

    if next == e {
        mesh.verts[v].e = None;
    } else {
        mesh.edges[prev].disk_at_mut(v).next = next;
        mesh.edges[next].disk_at_mut(v).prev = prev;
        if mesh.verts[v].e == Some(e) {
            mesh.verts[v].e = Some(next);
        }
    }

    *mesh.edges[e].disk_at_mut(v) = DiskLink { prev: e, next: e };
}

#[inline]
pub(crate) fn disk_next(e: EdgeId, v: VertId, mesh: &BMesh) -> EdgeId {
    mesh.edges[e].disk_at(v).next
}

#[cfg(test)]
#[inline]
pub(crate) fn disk_prev(e: EdgeId, v: VertId, mesh: &BMesh) -> EdgeId {
    mesh.edges[e].disk_at(v).prev
}

/// Move endpoint `v_old` of `e` to `v_new`, keeping both disk cycles valid.
pub(crate) fn edge_vert_replace(e: EdgeId, v_old: VertId, v_new: VertId, mesh: &mut BMesh) {
    debug_assert!(mesh.edges[e].endpoint(v_new).is_none());
    let Some(i) = mesh.edges[e].endpoint(v_old) else {
        debug_assert!(false, "vertex is not an endpoint of the edge");
        return;
    };

    disk_remove(e, v_old, mesh);
    mesh.edges[e].verts[i] = v_new;
    disk_append(e, v_new, mesh);
}

/// Like [`edge_vert_replace`], but also moves the corners of the edge's loops
/// that sat on `v_old`.
pub(crate) fn edge_vert_swap(e: EdgeId, v_old: VertId, v_new: VertId, mesh: &mut BMesh) {
    edge_vert_replace(e, v_old, v_new, mesh);

    let loops: SmallVec<[LoopId; 4]> = RadialLoopIter::new(mesh, e).collect();
    for l in loops {
        if mesh.loops[l].v == v_old {
            mesh.loops[l].v = v_new;
        }
        let next = mesh.loops[l].next;
        if mesh.loops[next].v == v_old {
            mesh.loops[next].v = v_new;
        }
    }
}

/// Insert `l` into the radial cycle of `e`, right after `e.l`.
pub(crate) fn radial_append(e: EdgeId, l: LoopId, mesh: &mut BMesh) {
    mesh.loops[l].e = e;
    match mesh.edges[e].l {
        None => {
            mesh.edges[e].l = Some(l);
            mesh.loops[l].radial_next = l;
            mesh.loops[l].radial_prev = l;
        }
        Some(first) => {
            let next = mesh.loops[first].radial_next;
            mesh.loops[l].radial_prev = first;
            mesh.loops[l].radial_next = next;
            mesh.loops[next].radial_prev = l;
            mesh.loops[first].radial_next = l;
        }
    }
}

/// Unlink `l` from the radial cycle of `e`, moving `e.l` off it if needed.
pub(crate) fn radial_remove(l: LoopId, e: EdgeId, mesh: &mut BMesh) {
    let next = mesh.loops[l].radial_next;
    let prev = mesh.loops[l].radial_prev;

    if next == l {
        if mesh.edges[e].l == Some(l) {
            mesh.edges[e].l = None;
        }
    } else {
        mesh.loops[prev].radial_next = next;
        mesh.loops[next].radial_prev = prev;
        if mesh.edges[e].l == Some(l) {
            mesh.edges[e].l = Some(next);
        }
    }

    mesh.loops[l].radial_next = l;
    mesh.loops[l].radial_prev = l;
}

/// Take `l` out of its face cycle. The face length and first loop are fixed
/// up, the loop itself is left dangling.
pub(crate) fn face_loop_unlink(l: LoopId, mesh: &mut BMesh) {
    let next = mesh.loops[l].next;
    let prev = mesh.loops[l].prev;
    let f = mesh.loops[l].f;

    mesh.loops[prev].next = next;
    mesh.loops[next].prev = prev;

    let face = &mut mesh.faces[f];
    if face.l_first == l {
        face.l_first = next;
    }
    face.len -= 1;
}

/// Link `l_new` into a face cycle right after `l`.
pub(crate) fn face_loop_insert_after(l: LoopId, l_new: LoopId, mesh: &mut BMesh) {
    let next = mesh.loops[l].next;
    mesh.loops[l_new].prev = l;
    mesh.loops[l_new].next = next;
    mesh.loops[l].next = l_new;
    mesh.loops[next].prev = l_new;
    mesh.loops[l_new].f = mesh.loops[l].f;
    mesh.faces[mesh.loops[l].f].len += 1;
}

/// Collect a cycle by repeatedly applying `step`, stopping when it comes back
/// to `start` or after `limit` steps on a broken cycle.
#[cfg(test)]
pub(crate) fn collect_cycle<T: Copy + PartialEq>(
    start: T,
    limit: usize,
    mut step: impl FnMut(T) -> T,
) -> Vec<T> {
    let mut out = vec![start];
    let mut current = step(start);
    while current != start && out.len() <= limit {
        out.push(current);
        current = step(current);
    }
    out
}
