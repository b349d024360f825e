//! Failure reasons reported by the kernel and its operators.
//!
//! Operators validate their input before touching the mesh, so receiving one
//! of these means the mesh is exactly as it was before the call.
use thiserror::Error;

use crate::{ElemKind, ElemRef};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshError {
    #[error("{0:?} does not refer to a live element")]
    DeadElement(ElemRef),
    #[error("vertex index {0} is out of range")]
    IndexOutOfRange(usize),
    #[error("an edge needs two distinct vertices")]
    DegenerateEdge,
    #[error("a face needs at least one corner")]
    EmptyFace,
    #[error("edge {index} does not connect consecutive face vertices")]
    EdgeMismatch { index: usize },
    #[error("element is not part of the given face")]
    NotInFace,
    #[error("vertex is not an endpoint of the edge")]
    NotInEdge,
    #[error("edges do not span the same pair of vertices")]
    EndpointMismatch,
    #[error("vertices are already connected by an edge")]
    Connected,
    #[error("loops are the same or adjacent, splitting would make a degenerate face")]
    AdjacentLoops,
    #[error("vertex valence is {found}, operator needs exactly 2")]
    InvalidValence { found: usize },
    #[error("a face uses both vertices without the collapsed edge")]
    PinchedFace,
    #[error("operation would create a double edge")]
    DoubleEdge,
    #[error("edge is not shared by exactly two faces")]
    NotManifold,
    #[error("faces run the shared edge in the same direction")]
    FlippedWinding,
    #[error("cannot join a face with itself")]
    SameFace,
    #[error("faces share {count} edges, expected exactly 1")]
    SharedEdges { count: usize },
    #[error("faces touch at a vertex outside the shared edge")]
    InternalJoin,
    #[error("input faces do not form a contiguous region")]
    NonContiguousSelection,
    #[error("boundary of the joined region is not a single loop")]
    InvalidBoundary,
    #[error("{kind:?} id {id} is already bound to another element")]
    IdConflict { id: u32, kind: ElemKind },
    #[error("stable ids are not enabled on this mesh")]
    IdsDisabled,
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

impl From<bincode::Error> for MeshError {
    fn from(err: bincode::Error) -> Self {
        MeshError::Snapshot(err.to_string())
    }
}
