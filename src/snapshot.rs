//! Flat, serializable copy of a whole mesh.
//!
//! Elements are stored by position: edges refer to vertices by index, face
//! corners to vertices and edges. Attribute blocks (and with them the stable
//! ids) are stored as is, next to the schemas they follow.
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;
use smallvec::SmallVec;

use crate::{
    attributes::{AttrBlock, AttrSchema},
    config::MeshParams,
    BMesh, EdgeId, ElemFlags, Header, MeshError, Vec3, VertId,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertRecord {
    pub co: [f32; 3],
    pub no: [f32; 3],
    pub flag: ElemFlags,
    pub data: AttrBlock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub verts: [u32; 2],
    pub flag: ElemFlags,
    pub data: AttrBlock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CornerRecord {
    pub vert: u32,
    pub edge: u32,
    pub data: AttrBlock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceRecord {
    pub no: [f32; 3],
    pub mat_nr: i16,
    pub flag: ElemFlags,
    pub data: AttrBlock,
    pub corners: Vec<CornerRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshSnapshot {
    pub params: MeshParams,
    pub vdata: AttrSchema,
    pub edata: AttrSchema,
    pub ldata: AttrSchema,
    pub pdata: AttrSchema,
    pub verts: Vec<VertRecord>,
    pub edges: Vec<EdgeRecord>,
    pub faces: Vec<FaceRecord>,
}

impl MeshSnapshot {
    pub fn to_bytes(&self) -> Result<Vec<u8>, MeshError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MeshError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

impl BMesh {
    pub fn to_snapshot(&self) -> MeshSnapshot {
        let mut vert_index: SecondaryMap<VertId, u32> = SecondaryMap::with_capacity(self.verts.len());
        let verts = self
            .verts
            .iter()
            .enumerate()
            .map(|(i, (v, vert))| {
                vert_index.insert(v, i as u32);
                VertRecord {
                    co: vert.co.into(),
                    no: vert.no.into(),
                    flag: vert.head.flag,
                    data: vert.head.data.clone(),
                }
            })
            .collect();

        let mut edge_index: SecondaryMap<EdgeId, u32> = SecondaryMap::with_capacity(self.edges.len());
        let edges = self
            .edges
            .iter()
            .enumerate()
            .map(|(i, (e, edge))| {
                edge_index.insert(e, i as u32);
                EdgeRecord {
                    verts: edge.verts.map(|v| vert_index[v]),
                    flag: edge.head.flag,
                    data: edge.head.data.clone(),
                }
            })
            .collect();

        let faces = self
            .faces
            .iter()
            .map(|(f, face)| FaceRecord {
                no: face.no.into(),
                mat_nr: face.mat_nr,
                flag: face.head.flag,
                data: face.head.data.clone(),
                corners: self
                    .face_loops(f)
                    .map(|l| {
                        let corner = &self.loops[l];
                        CornerRecord {
                            vert: vert_index[corner.v],
                            edge: edge_index[corner.e],
                            data: corner.head.data.clone(),
                        }
                    })
                    .collect(),
            })
            .collect();

        MeshSnapshot {
            params: self.params.clone(),
            vdata: self.vdata.clone(),
            edata: self.edata.clone(),
            ldata: self.ldata.clone(),
            pdata: self.pdata.clone(),
            verts,
            edges,
            faces,
        }
    }

    /// Rebuild a mesh from a snapshot. Stored ids are kept; elements whose
    /// id is missing or taken twice get a fresh one. Fails on indices that
    /// point outside the snapshot or edges that do not match their corners.
    pub fn from_snapshot(snapshot: &MeshSnapshot) -> Result<Self, MeshError> {
        let params = snapshot.params.clone();
        let mut mesh = BMesh::new(MeshParams {
            ids: None,
            ..params.clone()
        });
        mesh.vdata = snapshot.vdata.clone();
        mesh.edata = snapshot.edata.clone();
        mesh.ldata = snapshot.ldata.clone();
        mesh.pdata = snapshot.pdata.clone();

        let verts: Vec<VertId> = snapshot
            .verts
            .iter()
            .map(|r| {
                mesh.verts.insert(crate::Vert {
                    co: Vec3::from(r.co),
                    no: Vec3::from(r.no),
                    head: Header {
                        flag: r.flag,
                        data: r.data.clone(),
                    },
                    e: None,
                })
            })
            .collect();
        let vert_at = |i: u32| {
            verts
                .get(i as usize)
                .copied()
                .ok_or(MeshError::IndexOutOfRange(i as usize))
        };

        let mut edges: Vec<EdgeId> = Vec::with_capacity(snapshot.edges.len());
        for r in &snapshot.edges {
            let (v1, v2) = (vert_at(r.verts[0])?, vert_at(r.verts[1])?);
            if v1 == v2 {
                return Err(MeshError::DegenerateEdge);
            }
            let head = Header {
                flag: r.flag,
                data: r.data.clone(),
            };
            edges.push(mesh.new_edge_record(v1, v2, head));
        }

        for r in &snapshot.faces {
            if r.corners.is_empty() {
                return Err(MeshError::EmptyFace);
            }
            let mut fverts: SmallVec<[VertId; 8]> = SmallVec::new();
            let mut fedges: SmallVec<[EdgeId; 8]> = SmallVec::new();
            for c in &r.corners {
                fverts.push(vert_at(c.vert)?);
                fedges.push(
                    edges
                        .get(c.edge as usize)
                        .copied()
                        .ok_or(MeshError::IndexOutOfRange(c.edge as usize))?,
                );
            }
            for (i, &e) in fedges.iter().enumerate() {
                let next = fverts[(i + 1) % fverts.len()];
                if mesh.edges[e].other(fverts[i]) != Some(next) {
                    return Err(MeshError::EdgeMismatch { index: i });
                }
            }
            let head = Header {
                flag: r.flag,
                data: r.data.clone(),
            };
            let blocks = r.corners.iter().map(|c| c.data.clone()).collect();
            let f = mesh.new_face_record(&fverts, &fedges, head, r.mat_nr, blocks);
            mesh.faces[f].no = Vec3::from(r.no);
        }

        if let Some(id_params) = params.ids {
            mesh.restore_ids(id_params);
        }
        mesh.params = params;
        Ok(mesh)
    }
}

#[cfg(test)]
mod tests {
    use crate::{fixtures, validation::check_mesh};

    use super::*;

    #[test]
    fn snapshot_keeps_ids_and_topology() {
        let mut mesh = fixtures::cube(MeshParams::with_ids());
        // Punch a hole in the id sequence so restored ids are not just
        // arena order.
        let v = mesh.vert_ids().next().unwrap();
        mesh.kill_vert(v).unwrap();

        let bytes = mesh.to_snapshot().to_bytes().unwrap();
        let restored = BMesh::from_snapshot(&MeshSnapshot::from_bytes(&bytes).unwrap()).unwrap();

        assert!(check_mesh(&restored).is_ok());
        assert_eq!(restored.vert_count(), mesh.vert_count());
        assert_eq!(restored.edge_count(), mesh.edge_count());
        assert_eq!(restored.loop_count(), mesh.loop_count());
        assert_eq!(restored.face_count(), mesh.face_count());
        assert_eq!(restored.vert_from_id(0), None);

        let mut ids: Vec<_> = restored.vert_ids().map(|v| restored.vert_id(v).unwrap()).collect();
        ids.sort();
        assert_eq!(ids, (1..8).collect::<Vec<u32>>());
        for f in mesh.face_ids() {
            let id = mesh.face_id(f).unwrap();
            let g = restored.face_from_id(id).unwrap();
            let corners = |m: &BMesh, f| -> Vec<u32> {
                m.face_loops(f).map(|l| m.loop_id(l).unwrap()).collect()
            };
            assert_eq!(corners(&mesh, f), corners(&restored, g));
        }
    }

    #[test]
    fn snapshot_rejects_bad_indices() {
        let (mesh, ..) = fixtures::quad(MeshParams::default());
        let mut snapshot = mesh.to_snapshot();
        snapshot.faces[0].corners[0].edge = 99;
        assert_eq!(
            BMesh::from_snapshot(&snapshot).err(),
            Some(MeshError::IndexOutOfRange(99))
        );

        let mut snapshot = mesh.to_snapshot();
        snapshot.faces[0].corners.swap(0, 1);
        assert!(matches!(
            BMesh::from_snapshot(&snapshot),
            Err(MeshError::EdgeMismatch { .. })
        ));
    }
}
