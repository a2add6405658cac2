// Global configuration and constants

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// One tier of nutrient patches scattered over a fresh grid.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatchSpec {
    pub count: usize,
    pub radius: f32,
    pub intensity: f32,
}

/// Weights of the four fitness terms. They should sum to at most 1.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessWeights {
    pub resources: f32,
    pub coverage: f32,
    pub survival: f32,
    pub connectivity: f32,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            resources: 0.4,
            coverage: 0.3,
            survival: 0.2,
            connectivity: 0.1,
        }
    }
}

impl FitnessWeights {
    pub fn total(&self) -> f32 {
        self.resources + self.coverage + self.survival + self.connectivity
    }
}

// Configuration struct for simulation parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    // Grid/display
    pub grid_size: usize,
    pub cell_size: f32,

    // Nutrients
    pub initial_nutrients: f32,
    pub nutrient_patches: Vec<PatchSpec>,
    pub diffusion_rate: f32,
    pub nutrient_depletion: f32,

    // Organism run
    pub simulation_steps: usize,
    pub seed_hyphae_count: usize,
    pub seed_energy: f32,
    pub max_hyphae: usize,

    // Hyphal tips
    pub trail_length: usize,
    pub sensing_radius: f32,
    pub sensing_directions: usize,
    pub heading_jitter: f32,
    pub speed_energy_divisor: f32,
    pub branch_energy_threshold: f32,
    pub branch_energy_fraction: f32,

    // Anastomosis
    pub anastomosis_boost: f32,

    // Fitness
    pub connectivity_target: f32,
    pub fitness_weights: FitnessWeights,

    // Evolution
    pub population_size: usize,
    pub elite_fraction: f32,
    pub tournament_size: usize,
    pub mutation_rate: f32,
    pub seed: Option<u64>,
    pub parallel: bool,

    // Driving loop
    pub tick_interval_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            grid_size: GRID_SIZE,
            cell_size: CELL_SIZE,
            initial_nutrients: 800.0,
            nutrient_patches: vec![
                PatchSpec {
                    count: 3,
                    radius: 8.0,
                    intensity: 1.2,
                },
                PatchSpec {
                    count: 5,
                    radius: 4.0,
                    intensity: 0.8,
                },
                PatchSpec {
                    count: 8,
                    radius: 2.0,
                    intensity: 0.5,
                },
            ],
            diffusion_rate: 0.08,
            nutrient_depletion: 5.0,
            simulation_steps: 150,
            seed_hyphae_count: 4,
            seed_energy: 100.0,
            max_hyphae: 1000,
            trail_length: 25,
            sensing_radius: 4.0,
            sensing_directions: 12,
            heading_jitter: 0.15,
            speed_energy_divisor: 50.0,
            branch_energy_threshold: 60.0,
            branch_energy_fraction: 0.65,
            anastomosis_boost: 1.15,
            connectivity_target: 20.0,
            fitness_weights: FitnessWeights::default(),
            population_size: 12,
            elite_fraction: 0.2,
            tournament_size: 3,
            mutation_rate: 0.15,
            seed: None,
            parallel: true,
            tick_interval_ms: 1000,
        }
    }
}

impl SimulationConfig {
    /// Load a config from a YAML or JSON file, picked by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&text)?,
            Some("json") => serde_json::from_str(&text)?,
            other => {
                return Err(ConfigError::UnsupportedFormat(
                    other.unwrap_or("<none>").to_string(),
                ))
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Search config.yaml, config.yml and config.json in the working
    /// directory. Unreadable or invalid files are skipped with a warning.
    pub fn from_default_paths() -> Self {
        for candidate in DEFAULT_CONFIG_PATHS {
            if !Path::new(candidate).exists() {
                continue;
            }
            match Self::from_file(candidate) {
                Ok(config) => {
                    tracing::info!(path = candidate, "loaded configuration");
                    return config;
                }
                Err(e) => {
                    tracing::warn!(path = candidate, error = %e, "ignoring config file");
                }
            }
        }
        Self::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: &str) -> Result<(), ConfigError> {
            Err(ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            })
        }

        let w = &self.fitness_weights;
        let floats = [
            ("cell_size", self.cell_size),
            ("initial_nutrients", self.initial_nutrients),
            ("diffusion_rate", self.diffusion_rate),
            ("nutrient_depletion", self.nutrient_depletion),
            ("seed_energy", self.seed_energy),
            ("sensing_radius", self.sensing_radius),
            ("heading_jitter", self.heading_jitter),
            ("speed_energy_divisor", self.speed_energy_divisor),
            ("branch_energy_threshold", self.branch_energy_threshold),
            ("branch_energy_fraction", self.branch_energy_fraction),
            ("anastomosis_boost", self.anastomosis_boost),
            ("connectivity_target", self.connectivity_target),
            ("fitness_weights", w.resources),
            ("fitness_weights", w.coverage),
            ("fitness_weights", w.survival),
            ("fitness_weights", w.connectivity),
            ("elite_fraction", self.elite_fraction),
            ("mutation_rate", self.mutation_rate),
        ];
        if let Some((field, _)) = floats.iter().find(|(_, v)| !v.is_finite()) {
            return invalid(*field, "must be a finite number");
        }
        if let Some(patch) = self
            .nutrient_patches
            .iter()
            .find(|p| !p.radius.is_finite() || !p.intensity.is_finite())
        {
            return invalid(
                "nutrient_patches",
                &format!("radius {} and intensity {} must be finite", patch.radius, patch.intensity),
            );
        }

        if self.grid_size < 3 {
            return invalid("grid_size", "must be at least 3");
        }
        if self.simulation_steps == 0 {
            return invalid("simulation_steps", "must be positive");
        }
        if self.population_size < 2 {
            return invalid("population_size", "must be at least 2");
        }
        if self.tournament_size == 0 {
            return invalid("tournament_size", "must be positive");
        }
        if self.sensing_directions == 0 {
            return invalid("sensing_directions", "must be positive");
        }
        if self.trail_length == 0 {
            return invalid("trail_length", "must be positive");
        }
        if !(0.0..=1.0).contains(&self.elite_fraction) {
            return invalid("elite_fraction", "must be within [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return invalid("mutation_rate", "must be within [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.diffusion_rate) {
            return invalid("diffusion_rate", "must be within [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.branch_energy_fraction) {
            return invalid("branch_energy_fraction", "must be within [0, 1]");
        }
        if self.speed_energy_divisor <= 0.0 {
            return invalid("speed_energy_divisor", "must be positive");
        }
        if self.connectivity_target <= 0.0 {
            return invalid("connectivity_target", "must be positive");
        }
        if self.initial_nutrients < 0.0 || self.nutrient_depletion < 0.0 {
            return invalid("initial_nutrients", "nutrient amounts must be nonnegative");
        }
        if [w.resources, w.coverage, w.survival, w.connectivity]
            .iter()
            .any(|v| *v < 0.0)
        {
            return invalid("fitness_weights", "weights must be nonnegative");
        }
        if w.total() > 1.0 + 1e-4 {
            return invalid("fitness_weights", "weights must sum to at most 1");
        }
        Ok(())
    }

    pub fn grid_area(&self) -> usize {
        self.grid_size * self.grid_size
    }

    /// Number of genomes carried unchanged into the next generation.
    pub fn elite_count(&self) -> usize {
        ((self.population_size as f32 * self.elite_fraction).floor() as usize)
            .min(self.population_size)
    }
}

const DEFAULT_CONFIG_PATHS: [&str; 3] = ["config.yaml", "config.yml", "config.json"];

pub const GRID_SIZE: usize = 80;
pub const CELL_SIZE: f32 = 6.25;
