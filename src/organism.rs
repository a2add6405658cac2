use ::rand as external_rand;
use external_rand::Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

use crate::config::SimulationConfig;
use crate::genome::Genome;
use crate::hypha::Hypha;
use crate::nutrients::NutrientGrid;
use crate::types::{GridSnapshot, HyphaSnapshot, OrganismSnapshot, TrailPoint};

/// Running statistics of one organism's foraging run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganismStats {
    pub total_energy: f32,
    pub network_length: usize,
    pub coverage: usize,
    pub resources_collected: f32,
    pub max_hyphae: usize,
    pub survival_time: usize,
    pub steps_run: usize,
    pub branches: usize,
    pub merges: usize,
}

/// One fungal network: a genome foraging on its own private grid.
pub struct Organism<'a, R: Rng> {
    genome: Genome,
    config: &'a SimulationConfig,
    grid: NutrientGrid,
    hyphae: Vec<Hypha>,
    stats: OrganismStats,
    initial_nutrients: f32,
    fitness: f32,
    next_id: u64,
    covered: Vec<bool>,
    rng: R,
}

impl<'a, R: Rng> Organism<'a, R> {
    /// Seed tips at the grid center with evenly spaced headings.
    pub fn new(genome: Genome, grid: NutrientGrid, config: &'a SimulationConfig, rng: R) -> Self {
        let centre = grid.size() as f32 / 2.0;
        let count = config.seed_hyphae_count;
        let hyphae: Vec<Hypha> = (0..count)
            .map(|i| {
                let angle = i as f32 * TAU / count as f32;
                Hypha::new(i as u64, centre, centre, angle, config.seed_energy)
            })
            .collect();
        Self::with_hyphae(genome, grid, config, rng, hyphae)
    }

    /// Start from an explicit set of tips. Ids must be unique.
    pub fn with_hyphae(
        genome: Genome,
        grid: NutrientGrid,
        config: &'a SimulationConfig,
        rng: R,
        hyphae: Vec<Hypha>,
    ) -> Self {
        let next_id = hyphae.iter().map(|h| h.id + 1).max().unwrap_or(0);
        let stats = OrganismStats {
            total_energy: hyphae.iter().map(|h| h.energy).sum(),
            max_hyphae: hyphae.len(),
            ..Default::default()
        };
        let covered = vec![false; grid.area()];
        Self {
            genome,
            config,
            initial_nutrients: grid.total(),
            grid,
            hyphae,
            stats,
            fitness: 0.0,
            next_id,
            covered,
            rng,
        }
    }

    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    pub fn grid(&self) -> &NutrientGrid {
        &self.grid
    }

    pub fn hyphae(&self) -> &[Hypha] {
        &self.hyphae
    }

    pub fn stats(&self) -> &OrganismStats {
        &self.stats
    }

    pub fn fitness(&self) -> f32 {
        self.fitness
    }

    pub fn is_extinct(&self) -> bool {
        self.hyphae.is_empty()
    }

    /// Run until the step budget is spent or every tip has died, then score.
    pub fn run(&mut self) -> f32 {
        while self.stats.steps_run < self.config.simulation_steps {
            if !self.step() {
                break;
            }
        }
        self.score()
    }

    /// One simulation tick. Returns false once no tips remain.
    pub fn step(&mut self) -> bool {
        if self.is_extinct() {
            return false;
        }
        let step_index = self.stats.steps_run;

        self.grid.diffuse(self.config.diffusion_rate);

        let mut next = Vec::with_capacity(self.hyphae.len() + 4);
        let mut consumed = 0.0;
        let current = std::mem::take(&mut self.hyphae);
        let mut population = current.len();
        for mut hypha in current {
            let allow_branch = population < self.config.max_hyphae;
            let outcome = hypha.step(
                &mut self.grid,
                &self.genome,
                self.config,
                allow_branch,
                &mut self.next_id,
                &mut self.rng,
            );
            consumed += outcome.consumed;
            if hypha.is_alive() {
                next.push(hypha);
            }
            if let Some(branch) = outcome.branch {
                next.push(branch);
                population += 1;
                self.stats.branches += 1;
            }
        }

        self.stats.merges += anastomose(&mut next, &self.genome, self.config.anastomosis_boost);
        self.hyphae = next;

        self.stats.steps_run = step_index + 1;
        self.stats.resources_collected += consumed;
        self.stats.total_energy = self.hyphae.iter().map(|h| h.energy).sum();
        self.stats.network_length = self.hyphae.iter().map(|h| h.trail.len()).sum();
        self.stats.max_hyphae = self.stats.max_hyphae.max(self.hyphae.len());
        if !self.hyphae.is_empty() {
            self.stats.survival_time = step_index;
        }
        self.stats.coverage = self.coverage();

        !self.hyphae.is_empty()
    }

    /// Distinct grid cells on the trails of the current tips.
    fn coverage(&mut self) -> usize {
        self.covered.iter_mut().for_each(|c| *c = false);
        let size = self.grid.size();
        let mut count = 0;
        for hypha in &self.hyphae {
            for &(x, y) in &hypha.trail {
                let xi = (x.floor() as usize).min(size - 1);
                let yi = (y.floor() as usize).min(size - 1);
                let cell = &mut self.covered[xi * size + yi];
                if !*cell {
                    *cell = true;
                    count += 1;
                }
            }
        }
        count
    }

    /// Weighted sum of four sub-scores, each clamped to `[0, 1]`.
    pub fn score(&mut self) -> f32 {
        let weights = &self.config.fitness_weights;
        let resource = ratio(self.stats.resources_collected, self.initial_nutrients);
        let coverage = ratio(self.stats.coverage as f32, self.grid.area() as f32);
        let survival = ratio(
            self.stats.survival_time as f32,
            self.config.simulation_steps as f32,
        );
        let connectivity = ratio(self.stats.max_hyphae as f32, self.config.connectivity_target);

        let total = resource * weights.resources
            + coverage * weights.coverage
            + survival * weights.survival
            + connectivity * weights.connectivity;
        self.fitness = if total.is_finite() {
            total.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.fitness
    }

    pub fn snapshot(&self, generation: u64) -> OrganismSnapshot {
        OrganismSnapshot {
            generation,
            genome: self.genome.to_record(),
            fitness: self.fitness,
            stats: self.stats.clone(),
            hyphae: self
                .hyphae
                .iter()
                .map(|h| HyphaSnapshot {
                    id: h.id,
                    x: h.x,
                    y: h.y,
                    angle: h.angle,
                    energy: h.energy,
                    age: h.age,
                    parent: h.parent,
                    trail: h.trail.iter().map(|&(x, y)| TrailPoint { x, y }).collect(),
                })
                .collect(),
            nutrients: GridSnapshot {
                size: self.grid.size(),
                cells: self.grid.cells.clone(),
            },
        }
    }
}

fn ratio(value: f32, max: f32) -> f32 {
    if !max.is_finite() || max <= 0.0 || !value.is_finite() {
        return 0.0;
    }
    (value / max).clamp(0.0, 1.0)
}

/// Merge nearby tips in two passes and return the number of merges.
///
/// The first pass scans pairs `(i, j)` with `i < j` in order and records a
/// merge when neither tip is already taken this tick. The second pass gives
/// the survivor `i` the boosted average energy and drops `j`.
pub fn anastomose(hyphae: &mut Vec<Hypha>, genome: &Genome, boost: f32) -> usize {
    let n = hyphae.len();
    let mut taken = vec![false; n];
    let mut merges = Vec::new();
    for i in 0..n {
        if taken[i] {
            continue;
        }
        for j in (i + 1)..n {
            if !taken[j] && hyphae[i].can_merge(&hyphae[j], genome) {
                taken[i] = true;
                taken[j] = true;
                merges.push((i, j));
                break;
            }
        }
    }

    if merges.is_empty() {
        return 0;
    }

    let mut removed = vec![false; n];
    for &(i, j) in &merges {
        let avg = (hyphae[i].energy + hyphae[j].energy) / 2.0;
        hyphae[i].energy = avg * boost;
        removed[j] = true;
    }
    let mut idx = 0;
    hyphae.retain(|_| {
        let keep = !removed[idx];
        idx += 1;
        keep
    });
    merges.len()
}
