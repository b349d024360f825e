//! Small meshes shared by the unit tests.
use crate::{config::MeshParams, BMesh, FaceId, Vec3, VertId};

/// Unit quad in the xy plane, counter clockwise.
pub(crate) fn quad(params: MeshParams) -> (BMesh, [VertId; 4], FaceId) {
    let positions = [
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
    ];
    let mesh = BMesh::from_polygons(&positions, [[0, 1, 2, 3]], params).unwrap();
    let verts: Vec<_> = mesh.vert_ids().collect();
    let f = mesh.face_ids().next().unwrap();
    (mesh, [verts[0], verts[1], verts[2], verts[3]], f)
}

/// `n` by `n` quads. Vertices are numbered row by row, so for `n = 2` the
/// center vertex is index 4 and faces are `[0 1 4 3] [1 2 5 4] [3 4 7 6]
/// [4 5 8 7]`.
pub(crate) fn grid(n: usize, params: MeshParams) -> BMesh {
    let row = n + 1;
    let positions: Vec<Vec3> = (0..row * row)
        .map(|i| Vec3::new((i % row) as f32, (i / row) as f32, 0.0))
        .collect();
    let polygons = (0..n).flat_map(|j| {
        (0..n).map(move |i| {
            let base = j * row + i;
            [base, base + 1, base + row + 1, base + row]
        })
    });
    BMesh::from_polygons(&positions, polygons, params).unwrap()
}

/// Closed unit cube with outward winding.
pub(crate) fn cube(params: MeshParams) -> BMesh {
    let positions: Vec<Vec3> = (0..8)
        .map(|i| Vec3::new((i & 1) as f32, ((i >> 1) & 1) as f32, ((i >> 2) & 1) as f32))
        .collect();
    let polygons = [
        [0, 2, 3, 1],
        [4, 5, 7, 6],
        [0, 1, 5, 4],
        [2, 6, 7, 3],
        [0, 4, 6, 2],
        [1, 3, 7, 5],
    ];
    BMesh::from_polygons(&positions, polygons, params).unwrap()
}

pub(crate) fn tetrahedron(params: MeshParams) -> BMesh {
    let positions = [
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::new(0.0, 0.0, 1.0),
    ];
    let polygons = [[0, 2, 1], [0, 1, 3], [1, 2, 3], [0, 3, 2]];
    BMesh::from_polygons(&positions, polygons, params).unwrap()
}

/// Euler characteristic over the whole mesh.
pub(crate) fn euler_characteristic(mesh: &BMesh) -> i64 {
    mesh.vert_count() as i64 - mesh.edge_count() as i64 + mesh.face_count() as i64
}
