//! Construction parameters for meshes and undo logs.
use serde::{Deserialize, Serialize};

/// Arena sizes to reserve up front.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocTemplate {
    pub verts: usize,
    pub edges: usize,
    pub loops: usize,
    pub faces: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdParams {
    /// Reuse released ids (lowest first). When off ids only ever grow.
    pub recycle: bool,
}

impl Default for IdParams {
    fn default() -> Self {
        Self { recycle: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshParams {
    /// Stable element ids, required by the undo log.
    pub ids: Option<IdParams>,
    pub capacity: AllocTemplate,
    /// Run the element validator after every operator.
    pub validate: bool,
}

impl Default for MeshParams {
    fn default() -> Self {
        Self {
            ids: None,
            capacity: AllocTemplate::default(),
            validate: cfg!(any(debug_assertions, feature = "validate")),
        }
    }
}

impl MeshParams {
    pub fn with_ids() -> Self {
        Self {
            ids: Some(IdParams::default()),
            ..Default::default()
        }
    }

    pub(crate) fn validate_enabled(&self) -> bool {
        self.validate || cfg!(feature = "validate")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogParams {
    /// Oldest steps are dropped once more than this many exist.
    pub max_entries: Option<usize>,
    /// Record value-only changes (positions, flags, attributes).
    pub track_values: bool,
}

impl Default for LogParams {
    fn default() -> Self {
        Self {
            max_entries: None,
            track_values: true,
        }
    }
}
