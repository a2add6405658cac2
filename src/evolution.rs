//! Population controller: evaluate, select, recombine, repeat.

use ::rand as external_rand;
use external_rand::rngs::StdRng;
use external_rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::config::SimulationConfig;
use crate::error::ConfigError;
use crate::genome::Genome;
use crate::nutrients::NutrientGrid;
use crate::organism::{Organism, OrganismStats};
use crate::types::{FitnessHistory, GenerationReport, OrganismSnapshot};

/// Outcome of running one genome for a generation.
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    pub genome: Genome,
    pub fitness: f32,
    pub stats: OrganismStats,
    /// Seed of the organism's grid and RNG; replaying it reproduces the run.
    pub seed: u64,
}

/// Build an organism on a grid generated from `seed` and run it to completion.
pub fn run_organism(genome: Genome, config: &SimulationConfig, seed: u64) -> Organism<'_, StdRng> {
    let mut rng = StdRng::seed_from_u64(seed);
    let grid = NutrientGrid::generate(config, &mut rng);
    let mut organism = Organism::new(genome, grid, config, rng);
    organism.run();
    organism
}

pub fn evaluate_genome(genome: Genome, config: &SimulationConfig, seed: u64) -> Evaluation {
    let organism = run_organism(genome, config, seed);
    Evaluation {
        genome,
        fitness: organism.fitness(),
        stats: organism.stats().clone(),
        seed,
    }
}

/// Sample `size` entrants with replacement and keep the fittest.
///
/// `evaluated` must not be empty.
pub fn tournament_select<'e, R: Rng + ?Sized>(
    evaluated: &'e [Evaluation],
    size: usize,
    rng: &mut R,
) -> &'e Evaluation {
    let mut best = &evaluated[rng.gen_range(0..evaluated.len())];
    for _ in 1..size.max(1) {
        let candidate = &evaluated[rng.gen_range(0..evaluated.len())];
        if candidate.fitness > best.fitness {
            best = candidate;
        }
    }
    best
}

pub struct EvolutionManager {
    config: SimulationConfig,
    rng: StdRng,
    generation: u64,
    population: Vec<Genome>,
    history: FitnessHistory,
    best: Option<Evaluation>,
    last_report: Option<GenerationReport>,
}

impl EvolutionManager {
    /// Validate the config and seed a random population.
    ///
    /// Uses `config.seed` when set, entropy otherwise.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut manager = Self {
            config,
            rng,
            generation: 0,
            population: Vec::new(),
            history: FitnessHistory::default(),
            best: None,
            last_report: None,
        };
        manager.initialize_population();
        Ok(manager)
    }

    pub fn initialize_population(&mut self) {
        let rng = &mut self.rng;
        self.population = (0..self.config.population_size)
            .map(|_| Genome::random(rng))
            .collect();
    }

    /// Run one organism per genome on its own fresh grid, sorted best first.
    ///
    /// Seeds are drawn sequentially before the (possibly parallel) runs, so
    /// the result does not depend on `config.parallel`.
    pub fn evaluate_generation(&mut self) -> Vec<Evaluation> {
        let jobs: Vec<(Genome, u64)> = self
            .population
            .iter()
            .map(|genome| (*genome, self.rng.gen::<u64>()))
            .collect();

        let config = &self.config;
        let mut evaluated: Vec<Evaluation> = if config.parallel {
            jobs.par_iter()
                .map(|&(genome, seed)| evaluate_genome(genome, config, seed))
                .collect()
        } else {
            jobs.iter()
                .map(|&(genome, seed)| evaluate_genome(genome, config, seed))
                .collect()
        };
        evaluated.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));

        if let Some(best) = evaluated.first() {
            let average =
                evaluated.iter().map(|e| e.fitness).sum::<f32>() / evaluated.len() as f32;
            self.history.best.push(best.fitness);
            self.history.average.push(average);
            self.best = Some(best.clone());
            tracing::debug!(
                generation = self.generation,
                best = best.fitness,
                average,
                "generation evaluated"
            );
        }
        evaluated
    }

    /// Replace the population from a sorted evaluation: elites first, then
    /// mutated children of tournament winners.
    pub fn breed(&mut self, evaluated: &[Evaluation]) {
        let size = self.config.population_size;
        if evaluated.is_empty() {
            self.initialize_population();
            return;
        }

        let mut next: Vec<Genome> = evaluated
            .iter()
            .take(self.config.elite_count())
            .map(|e| e.genome)
            .collect();

        while next.len() < size {
            let first = tournament_select(evaluated, self.config.tournament_size, &mut self.rng);
            let second = tournament_select(evaluated, self.config.tournament_size, &mut self.rng);
            let (a, b) = first.genome.crossover(&second.genome, &mut self.rng);
            next.push(a.mutate(self.config.mutation_rate, &mut self.rng));
            if next.len() < size {
                next.push(b.mutate(self.config.mutation_rate, &mut self.rng));
            }
        }
        self.population = next;
    }

    /// Evaluate the current population, breed the next one and report.
    pub fn evolve_next_generation(&mut self) -> GenerationReport {
        let evaluated = self.evaluate_generation();
        self.breed(&evaluated);
        self.generation += 1;

        let report = GenerationReport {
            generation: self.generation,
            best_fitness: self.history.best.last().copied().unwrap_or(0.0),
            average_fitness: self.history.average.last().copied().unwrap_or(0.0),
            best_genome: evaluated
                .first()
                .map(|e| e.genome)
                .unwrap_or_else(|| self.population[0])
                .to_record(),
            best_stats: evaluated.first().map(|e| e.stats.clone()).unwrap_or_default(),
        };
        self.last_report = Some(report.clone());
        report
    }

    pub fn reset(&mut self) {
        self.generation = 0;
        self.history = FitnessHistory::default();
        self.best = None;
        self.last_report = None;
        self.initialize_population();
    }

    /// Replay the latest best organism and capture its trails and grid.
    pub fn best_organism_snapshot(&self) -> Option<OrganismSnapshot> {
        let best = self.best.as_ref()?;
        let organism = run_organism(best.genome, &self.config, best.seed);
        Some(organism.snapshot(self.generation))
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn population(&self) -> &[Genome] {
        &self.population
    }

    pub fn history(&self) -> &FitnessHistory {
        &self.history
    }

    pub fn best_genome(&self) -> Option<&Genome> {
        self.best.as_ref().map(|e| &e.genome)
    }

    /// Best evaluation of the most recent generation, with its replay seed.
    pub fn best_evaluation(&self) -> Option<&Evaluation> {
        self.best.as_ref()
    }

    pub fn last_report(&self) -> Option<&GenerationReport> {
        self.last_report.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(seed: u64) -> SimulationConfig {
        SimulationConfig {
            grid_size: 40,
            simulation_steps: 60,
            population_size: 8,
            seed: Some(seed),
            ..Default::default()
        }
    }

    #[test]
    fn rejects_invalid_config() {
        let config = SimulationConfig {
            population_size: 0,
            ..Default::default()
        };
        assert!(EvolutionManager::new(config).is_err());

        let config = SimulationConfig {
            connectivity_target: f32::NAN,
            ..Default::default()
        };
        assert!(EvolutionManager::new(config).is_err());
    }

    #[test]
    fn population_size_is_preserved() {
        let mut manager = EvolutionManager::new(small_config(41)).unwrap();
        assert_eq!(manager.population().len(), 8);
        for expected in 1..=3 {
            let report = manager.evolve_next_generation();
            assert_eq!(report.generation, expected);
            assert_eq!(manager.population().len(), 8);
            assert!(report.average_fitness <= report.best_fitness + 1e-6);
        }
        assert_eq!(manager.history().best.len(), 3);
    }

    #[test]
    fn elites_survive_unchanged() {
        let mut manager = EvolutionManager::new(small_config(42)).unwrap();
        let evaluated = manager.evaluate_generation();
        assert!(evaluated.windows(2).all(|w| w[0].fitness >= w[1].fitness));
        manager.breed(&evaluated);
        let elite = manager.config().elite_count();
        assert_eq!(elite, 1);
        for i in 0..elite {
            assert_eq!(manager.population()[i], evaluated[i].genome);
        }
    }

    #[test]
    fn tournament_prefers_fitter_entrant() {
        let mut rng = StdRng::seed_from_u64(43);
        let evaluated: Vec<Evaluation> = (0..5)
            .map(|i| Evaluation {
                genome: Genome::random(&mut rng),
                fitness: i as f32 / 10.0,
                stats: OrganismStats::default(),
                seed: i,
            })
            .collect();
        let mut wins = [0usize; 5];
        for _ in 0..500 {
            let winner = tournament_select(&evaluated, 3, &mut rng);
            wins[winner.seed as usize] += 1;
        }
        assert!(wins[4] > wins[0]);
        let single = tournament_select(&evaluated[..1], 3, &mut rng);
        assert_eq!(single.seed, 0);
    }

    #[test]
    fn seeded_runs_are_reproducible_and_parallelism_agnostic() {
        let mut sequential = EvolutionManager::new(SimulationConfig {
            parallel: false,
            ..small_config(44)
        })
        .unwrap();
        let mut parallel = EvolutionManager::new(small_config(44)).unwrap();
        for _ in 0..3 {
            assert_eq!(
                sequential.evolve_next_generation(),
                parallel.evolve_next_generation()
            );
        }
        assert_eq!(sequential.population(), parallel.population());
    }

    #[test]
    fn snapshot_replays_the_best_organism() {
        let mut manager = EvolutionManager::new(small_config(45)).unwrap();
        assert!(manager.best_organism_snapshot().is_none());
        let report = manager.evolve_next_generation();
        let snapshot = manager.best_organism_snapshot().unwrap();
        assert_eq!(snapshot.fitness, report.best_fitness);
        assert_eq!(snapshot.stats, report.best_stats);
        assert_eq!(snapshot.genome, report.best_genome);
        assert_eq!(snapshot.generation, 1);
    }

    #[test]
    fn reset_clears_progress() {
        let mut manager = EvolutionManager::new(small_config(46)).unwrap();
        manager.evolve_next_generation();
        manager.evolve_next_generation();
        let before = manager.population().to_vec();
        manager.reset();
        assert_eq!(manager.generation(), 0);
        assert!(manager.history().best.is_empty());
        assert!(manager.best_genome().is_none());
        assert!(manager.last_report().is_none());
        assert_eq!(manager.population().len(), 8);
        assert_ne!(manager.population(), &before[..]);
    }
}
