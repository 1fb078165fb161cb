pub mod doctor;
pub mod export;
pub mod import;
pub mod inspect;
pub mod query;
pub mod seed;
pub mod stats;
pub mod traverse;

use serde::{Deserialize, Serialize};

use ember::memory::types::{MemoryEdge, MemoryNode};

/// Export and import format.
#[derive(Debug, Serialize, Deserialize)]
pub struct GraphDump {
    pub nodes: Vec<MemoryNode>,
    #[serde(default)]
    pub edges: Vec<MemoryEdge>,
}
