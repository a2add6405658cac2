use ::rand as external_rand;
use external_rand::Rng;
use std::collections::VecDeque;
use std::f32::consts::TAU;

use crate::config::SimulationConfig;
use crate::genome::Genome;
use crate::nutrients::NutrientGrid;

/// A growing hyphal tip.
#[derive(Clone, Debug)]
pub struct Hypha {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub energy: f32,
    pub parent: Option<u64>,
    pub age: u32,
    // Most recent position last
    pub trail: VecDeque<(f32, f32)>,
}

/// What happened during one [`Hypha::step`].
#[derive(Debug, Default)]
pub struct StepOutcome {
    /// Nutrients removed from the grid.
    pub consumed: f32,
    /// True when the destination cell had food and the tip moved onto it.
    pub fed: bool,
    pub branch: Option<Hypha>,
}

impl Hypha {
    pub fn new(id: u64, x: f32, y: f32, angle: f32, energy: f32) -> Self {
        let mut trail = VecDeque::new();
        trail.push_back((x, y));
        Self {
            id,
            x,
            y,
            angle,
            energy,
            parent: None,
            age: 0,
            trail,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.energy > 0.0
    }

    /// Angle offset from the current heading toward the richest sensed cell.
    ///
    /// Cells are probed on a ring of `sensing_directions` absolute angles at
    /// `sensing_radius`; zero when nothing with food is in range.
    pub fn gradient_bias(&self, grid: &NutrientGrid, config: &SimulationConfig) -> f32 {
        let mut best_density = 0.0;
        let mut best_angle = self.angle;
        let directions = config.sensing_directions.max(1);
        for i in 0..directions {
            let angle = i as f32 * TAU / directions as f32;
            let sx = self.x + angle.cos() * config.sensing_radius;
            let sy = self.y + angle.sin() * config.sensing_radius;
            if let Some(density) = grid.sample(sx, sy) {
                if density > best_density {
                    best_density = density;
                    best_angle = angle;
                }
            }
        }
        best_angle - self.angle
    }

    /// Advance one tick: steer, try to move and feed, pay metabolism, maybe branch.
    ///
    /// A tip whose destination holds no food stays where it is. Branches keep
    /// a fraction of the parent's energy without debiting the parent.
    pub fn step<R: Rng + ?Sized>(
        &mut self,
        grid: &mut NutrientGrid,
        genome: &Genome,
        config: &SimulationConfig,
        allow_branch: bool,
        next_id: &mut u64,
        rng: &mut R,
    ) -> StepOutcome {
        let mut outcome = StepOutcome::default();

        let bias = self.gradient_bias(grid, config);
        self.angle += bias * genome.chemotaxis_sensitivity()
            + (rng.gen::<f32>() - 0.5) * config.heading_jitter;

        let speed = (self.energy / config.speed_energy_divisor).min(genome.growth_speed());
        let limit = (grid.size() - 1) as f32;
        let nx = (self.x + self.angle.cos() * speed).clamp(0.0, limit);
        let ny = (self.y + self.angle.sin() * speed).clamp(0.0, limit);

        let gx = nx.floor() as usize;
        let gy = ny.floor() as usize;
        let nutrients = grid.get(gx, gy);
        if nutrients > 0.0 {
            self.energy += nutrients * genome.energy_efficiency();
            outcome.consumed = grid.deplete(gx, gy, config.nutrient_depletion);
            outcome.fed = true;
            self.x = nx;
            self.y = ny;
            self.trail.push_back((nx, ny));
            while self.trail.len() > config.trail_length {
                self.trail.pop_front();
            }
        }

        self.age += 1;
        self.energy -= genome.metabolism_rate();

        if allow_branch
            && self.energy > config.branch_energy_threshold
            && rng.gen::<f32>() < genome.branch_probability()
        {
            let angle =
                self.angle + (rng.gen::<f32>() - 0.5) * genome.branch_angle_variance();
            let mut branch = Hypha::new(
                *next_id,
                self.x,
                self.y,
                angle,
                self.energy * config.branch_energy_fraction,
            );
            branch.parent = Some(self.id);
            *next_id += 1;
            outcome.branch = Some(branch);
        }

        outcome
    }

    pub fn distance_sq(&self, other: &Hypha) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn can_merge(&self, other: &Hypha, genome: &Genome) -> bool {
        let d = genome.anastomosis_distance();
        self.id != other.id && self.distance_sq(other) < d * d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::GenomeRecord;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn genome(branch_probability: f32) -> Genome {
        Genome::from_record(GenomeRecord {
            branch_probability,
            chemotaxis_sensitivity: 0.3,
            growth_speed: 1.5,
            energy_efficiency: 0.1,
            anastomosis_distance: 2.0,
            metabolism_rate: 2.0,
            branch_angle_variance: 0.8,
        })
    }

    #[test]
    fn energy_only_rises_when_feeding() {
        let config = SimulationConfig::default();
        let mut rng = StdRng::seed_from_u64(21);
        let mut grid = NutrientGrid::generate(&config, &mut rng);
        let genome = Genome::random(&mut rng);
        let centre = config.grid_size as f32 / 2.0;
        let mut next_id = 1;
        let mut hypha = Hypha::new(0, centre, centre, 0.0, config.seed_energy);

        for _ in 0..config.simulation_steps {
            if !hypha.is_alive() {
                break;
            }
            let before = hypha.energy;
            let outcome = hypha.step(&mut grid, &genome, &config, true, &mut next_id, &mut rng);
            if !outcome.fed {
                assert!(hypha.energy < before);
                assert_eq!(outcome.consumed, 0.0);
            }
        }
    }

    #[test]
    fn starving_tip_waits_and_burns_metabolism() {
        let config = SimulationConfig::default();
        let mut rng = StdRng::seed_from_u64(22);
        let mut grid = NutrientGrid::new(config.grid_size);
        let genome = genome(0.0);
        let mut next_id = 1;
        let mut hypha = Hypha::new(0, 40.0, 40.0, 1.0, 10.0);

        let outcome = hypha.step(&mut grid, &genome, &config, true, &mut next_id, &mut rng);
        assert!(!outcome.fed);
        assert_eq!((hypha.x, hypha.y), (40.0, 40.0));
        assert_eq!(hypha.age, 1);
        assert!((hypha.energy - (10.0 - genome.metabolism_rate())).abs() < 1e-6);
        assert_eq!(hypha.trail.len(), 1);
    }

    #[test]
    fn fed_tip_branches_on_saturated_grid() {
        let config = SimulationConfig::default();
        let mut rng = StdRng::seed_from_u64(23);
        let mut grid = NutrientGrid::filled(config.grid_size, config.initial_nutrients);
        let genome = genome(0.2);
        let centre = config.grid_size as f32 / 2.0;
        let mut next_id = 1;
        let mut hypha = Hypha::new(0, centre, centre, 0.0, config.seed_energy);

        let mut branches = Vec::new();
        for _ in 0..150 {
            let energy_before = hypha.energy;
            let outcome = hypha.step(&mut grid, &genome, &config, true, &mut next_id, &mut rng);
            assert!(outcome.fed);
            if let Some(branch) = outcome.branch {
                assert_eq!(branch.parent, Some(0));
                assert_eq!((branch.x, branch.y), (hypha.x, hypha.y));
                assert!((branch.energy - hypha.energy * config.branch_energy_fraction).abs() < 1e-3);
                // parent keeps its energy
                assert!(hypha.energy > energy_before - genome.metabolism_rate() - 1e-3);
                branches.push(branch);
            }
        }
        assert!(!branches.is_empty());
        assert!(hypha.trail.len() <= config.trail_length);
        let mut ids: Vec<u64> = branches.iter().map(|b| b.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), branches.len());
    }

    #[test]
    fn branching_can_be_suppressed() {
        let config = SimulationConfig::default();
        let mut rng = StdRng::seed_from_u64(24);
        let mut grid = NutrientGrid::filled(config.grid_size, config.initial_nutrients);
        let genome = genome(0.3);
        let mut next_id = 1;
        let mut hypha = Hypha::new(0, 10.0, 10.0, 0.0, config.seed_energy);
        for _ in 0..100 {
            let outcome = hypha.step(&mut grid, &genome, &config, false, &mut next_id, &mut rng);
            assert!(outcome.branch.is_none());
        }
        assert_eq!(next_id, 1);
    }

    #[test]
    fn merge_requires_distinct_tips_within_range() {
        let genome = genome(0.1);
        let a = Hypha::new(0, 10.0, 10.0, 0.0, 50.0);
        let b = Hypha::new(1, 11.5, 10.0, 0.0, 50.0);
        let c = Hypha::new(2, 13.0, 10.0, 0.0, 50.0);
        assert!(a.can_merge(&b, &genome));
        assert!(!a.can_merge(&c, &genome));
        assert!(!a.can_merge(&a.clone(), &genome));
    }

    #[test]
    fn tip_moves_toward_food() {
        let config = SimulationConfig::default();
        let mut grid = NutrientGrid::new(config.grid_size);
        // single rich cell directly "east" at sensing distance
        grid.cells[44][40] = 500.0;
        let hypha = Hypha::new(0, 40.5, 40.5, std::f32::consts::PI, 100.0);
        let bias = hypha.gradient_bias(&grid, &config);
        assert!((bias + std::f32::consts::PI).abs() < 1e-5);
    }
}
