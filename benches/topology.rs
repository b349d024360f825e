use bmesh::collapse::CollapseOptions;
use bmesh::config::{LogParams, MeshParams};
use bmesh::euler::Scratch;
use bmesh::undo::BMLog;
use bmesh::*;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

/// `n` by `n` quads in the xy plane.
pub fn grid(n: usize, params: MeshParams) -> BMesh {
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

fn params() -> MeshParams {
    MeshParams {
        validate: false,
        ..MeshParams::with_ids()
    }
}

fn edge_split_benchmark(c: &mut Criterion) {
    let mesh = grid(64, params());

    c.bench_function("edge split", |b| {
        b.iter_batched(
            || mesh.clone(),
            |mut mesh| {
                let edges: Vec<_> = mesh.edge_ids().collect();
                for e in edges {
                    let v = mesh.edge_handle(e).vertex_ids()[0];
                    let _ = mesh.edge_split(e, v, 0.5);
                }
                mesh
            },
            BatchSize::LargeInput,
        );
    });
}

fn collapse_benchmark(c: &mut Criterion) {
    let mesh = grid(64, params());

    c.bench_function("edge collapse", |b| {
        b.iter_batched(
            || mesh.clone(),
            |mut mesh| {
                let mut scratch = Scratch::new();
                let edges: Vec<_> = mesh.edge_ids().step_by(7).collect();
                for e in edges {
                    // Earlier collapses remove edges from the list.
                    if mesh.edge(e).is_none() {
                        continue;
                    }
                    let v = mesh.edge_handle(e).vertex_ids()[0];
                    let _ = mesh.join_vert_kill_edge(e, v, CollapseOptions::default(), &mut scratch);
                }
                mesh
            },
            BatchSize::LargeInput,
        );
    });
}

fn undo_benchmark(c: &mut Criterion) {
    let mesh = grid(32, params());

    c.bench_function("undo redo", |b| {
        b.iter_batched(
            || {
                let mut mesh = mesh.clone();
                let log = BMLog::new(LogParams::default());
                log.attach(&mut mesh);
                let edges: Vec<_> = mesh.edge_ids().collect();
                for e in edges {
                    log.entry_add(&mesh);
                    let v = mesh.edge_handle(e).vertex_ids()[0];
                    let _ = mesh.edge_split(e, v, 0.5);
                }
                (mesh, log)
            },
            |(mut mesh, log)| {
                while log.undo(&mut mesh, &mut ()) {}
                while log.redo(&mut mesh, &mut ()) {}
                mesh
            },
            BatchSize::LargeInput,
        );
    });
}

fn custom_criterion() -> Criterion {
    Criterion::default()
        .measurement_time(std::time::Duration::from_secs(20))
        .warm_up_time(std::time::Duration::from_secs(3))
        .sample_size(20)
}

criterion_group! {
    name = benches;
    config = custom_criterion();
    targets = edge_split_benchmark, collapse_benchmark, undo_benchmark
}
criterion_main!(benches);
