// Serializable views handed to renderers and API clients

use serde::{Deserialize, Serialize};

use crate::genome::GenomeRecord;
use crate::organism::OrganismStats;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct TrailPoint {
    pub x: f32,
    pub y: f32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HyphaSnapshot {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub energy: f32,
    pub age: u32,
    pub parent: Option<u64>,
    pub trail: Vec<TrailPoint>,
}

/// Nutrient values indexed `[x][y]`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GridSnapshot {
    pub size: usize,
    pub cells: Vec<Vec<f32>>,
}

impl GridSnapshot {
    pub fn max_value(&self) -> f32 {
        self.cells.iter().flatten().copied().fold(0.0, f32::max)
    }
}

/// Final state of one organism, enough to draw its network.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrganismSnapshot {
    pub generation: u64,
    pub genome: GenomeRecord,
    pub fitness: f32,
    pub stats: OrganismStats,
    pub hyphae: Vec<HyphaSnapshot>,
    pub nutrients: GridSnapshot,
}

/// Emitted after every evolved generation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GenerationReport {
    pub generation: u64,
    pub best_fitness: f32,
    pub average_fitness: f32,
    pub best_genome: GenomeRecord,
    pub best_stats: OrganismStats,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct FitnessHistory {
    pub best: Vec<f32>,
    pub average: Vec<f32>,
}
