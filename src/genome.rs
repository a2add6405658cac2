//! Evolvable parameters of a fungal organism.
//!
//! A [`Genome`] is a fixed record of bounded real-valued genes. New genomes
//! only come from [`Genome::random`], [`Genome::mutate`],
//! [`Genome::crossover`] or a [`GenomeRecord`], and every path clamps into
//! the gene bounds.

use ::rand as external_rand;
use external_rand::Rng;
use serde::{Deserialize, Serialize};

/// Seed range, hard bound and mutation step of a single gene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeneSpec {
    pub seed_min: f32,
    pub seed_max: f32,
    pub min: f32,
    pub max: f32,
    /// Width of the uniform mutation delta, centered on zero.
    pub step: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gene {
    BranchProbability,
    ChemotaxisSensitivity,
    GrowthSpeed,
    EnergyEfficiency,
    AnastomosisDistance,
    MetabolismRate,
    BranchAngleVariance,
}

impl Gene {
    pub const ALL: [Gene; 7] = [
        Gene::BranchProbability,
        Gene::ChemotaxisSensitivity,
        Gene::GrowthSpeed,
        Gene::EnergyEfficiency,
        Gene::AnastomosisDistance,
        Gene::MetabolismRate,
        Gene::BranchAngleVariance,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Gene::BranchProbability => "branch_probability",
            Gene::ChemotaxisSensitivity => "chemotaxis_sensitivity",
            Gene::GrowthSpeed => "growth_speed",
            Gene::EnergyEfficiency => "energy_efficiency",
            Gene::AnastomosisDistance => "anastomosis_distance",
            Gene::MetabolismRate => "metabolism_rate",
            Gene::BranchAngleVariance => "branch_angle_variance",
        }
    }

    pub fn spec(self) -> GeneSpec {
        let (seed_min, seed_max, min, max, step) = match self {
            Gene::BranchProbability => (0.05, 0.2, 0.01, 0.3, 0.02),
            Gene::ChemotaxisSensitivity => (0.1, 0.5, 0.05, 0.8, 0.05),
            Gene::GrowthSpeed => (0.8, 2.2, 0.5, 3.0, 0.2),
            Gene::EnergyEfficiency => (0.05, 0.2, 0.02, 0.3, 0.02),
            Gene::AnastomosisDistance => (1.5, 4.5, 1.0, 6.0, 0.3),
            Gene::MetabolismRate => (1.5, 2.5, 1.0, 4.0, 0.2),
            Gene::BranchAngleVariance => (0.3, 1.5, 0.1, 2.0, 0.1),
        };
        GeneSpec {
            seed_min,
            seed_max,
            min,
            max,
            step,
        }
    }

    /// Clamp a raw value into this gene's bound. NaN maps to the lower bound.
    pub fn clamp(self, value: f32) -> f32 {
        let spec = self.spec();
        if value.is_nan() {
            spec.min
        } else {
            value.clamp(spec.min, spec.max)
        }
    }
}

/// Plain serializable mirror of a [`Genome`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenomeRecord {
    pub branch_probability: f32,
    pub chemotaxis_sensitivity: f32,
    pub growth_speed: f32,
    pub energy_efficiency: f32,
    pub anastomosis_distance: f32,
    pub metabolism_rate: f32,
    pub branch_angle_variance: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "GenomeRecord", into = "GenomeRecord")]
pub struct Genome {
    branch_probability: f32,
    chemotaxis_sensitivity: f32,
    growth_speed: f32,
    energy_efficiency: f32,
    anastomosis_distance: f32,
    metabolism_rate: f32,
    branch_angle_variance: f32,
}

impl Genome {
    /// Draw every gene uniformly from its seed range.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut genome = Self::lower_bound();
        for gene in Gene::ALL {
            let spec = gene.spec();
            genome.set(gene, rng.gen_range(spec.seed_min..spec.seed_max));
        }
        genome
    }

    /// Perturb each gene with probability `rate` by a small uniform delta.
    ///
    /// `rate` is clamped to `[0, 1]`; the result always stays within bounds.
    pub fn mutate<R: Rng + ?Sized>(&self, rate: f32, rng: &mut R) -> Self {
        let rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        let mut child = *self;
        for gene in Gene::ALL {
            if rng.gen::<f32>() < rate {
                let delta = (rng.gen::<f32>() - 0.5) * gene.spec().step;
                child.set(gene, self.get(gene) + delta);
            }
        }
        child
    }

    /// Uniform crossover: each gene of each child comes from exactly one parent.
    pub fn crossover<R: Rng + ?Sized>(&self, other: &Genome, rng: &mut R) -> (Self, Self) {
        let mut first = *self;
        let mut second = *other;
        for gene in Gene::ALL {
            if rng.gen_bool(0.5) {
                first.set(gene, other.get(gene));
                second.set(gene, self.get(gene));
            }
        }
        (first, second)
    }

    pub fn get(&self, gene: Gene) -> f32 {
        match gene {
            Gene::BranchProbability => self.branch_probability,
            Gene::ChemotaxisSensitivity => self.chemotaxis_sensitivity,
            Gene::GrowthSpeed => self.growth_speed,
            Gene::EnergyEfficiency => self.energy_efficiency,
            Gene::AnastomosisDistance => self.anastomosis_distance,
            Gene::MetabolismRate => self.metabolism_rate,
            Gene::BranchAngleVariance => self.branch_angle_variance,
        }
    }

    fn set(&mut self, gene: Gene, value: f32) {
        let value = gene.clamp(value);
        match gene {
            Gene::BranchProbability => self.branch_probability = value,
            Gene::ChemotaxisSensitivity => self.chemotaxis_sensitivity = value,
            Gene::GrowthSpeed => self.growth_speed = value,
            Gene::EnergyEfficiency => self.energy_efficiency = value,
            Gene::AnastomosisDistance => self.anastomosis_distance = value,
            Gene::MetabolismRate => self.metabolism_rate = value,
            Gene::BranchAngleVariance => self.branch_angle_variance = value,
        }
    }

    fn lower_bound() -> Self {
        Self {
            branch_probability: Gene::BranchProbability.spec().min,
            chemotaxis_sensitivity: Gene::ChemotaxisSensitivity.spec().min,
            growth_speed: Gene::GrowthSpeed.spec().min,
            energy_efficiency: Gene::EnergyEfficiency.spec().min,
            anastomosis_distance: Gene::AnastomosisDistance.spec().min,
            metabolism_rate: Gene::MetabolismRate.spec().min,
            branch_angle_variance: Gene::BranchAngleVariance.spec().min,
        }
    }

    pub fn branch_probability(&self) -> f32 {
        self.branch_probability
    }

    pub fn chemotaxis_sensitivity(&self) -> f32 {
        self.chemotaxis_sensitivity
    }

    pub fn growth_speed(&self) -> f32 {
        self.growth_speed
    }

    pub fn energy_efficiency(&self) -> f32 {
        self.energy_efficiency
    }

    pub fn anastomosis_distance(&self) -> f32 {
        self.anastomosis_distance
    }

    pub fn metabolism_rate(&self) -> f32 {
        self.metabolism_rate
    }

    pub fn branch_angle_variance(&self) -> f32 {
        self.branch_angle_variance
    }

    pub fn to_record(&self) -> GenomeRecord {
        GenomeRecord {
            branch_probability: self.branch_probability,
            chemotaxis_sensitivity: self.chemotaxis_sensitivity,
            growth_speed: self.growth_speed,
            energy_efficiency: self.energy_efficiency,
            anastomosis_distance: self.anastomosis_distance,
            metabolism_rate: self.metabolism_rate,
            branch_angle_variance: self.branch_angle_variance,
        }
    }

    /// Rebuild a genome from a record, clamping out-of-range values.
    pub fn from_record(record: GenomeRecord) -> Self {
        let mut genome = Self::lower_bound();
        genome.set(Gene::BranchProbability, record.branch_probability);
        genome.set(Gene::ChemotaxisSensitivity, record.chemotaxis_sensitivity);
        genome.set(Gene::GrowthSpeed, record.growth_speed);
        genome.set(Gene::EnergyEfficiency, record.energy_efficiency);
        genome.set(Gene::AnastomosisDistance, record.anastomosis_distance);
        genome.set(Gene::MetabolismRate, record.metabolism_rate);
        genome.set(Gene::BranchAngleVariance, record.branch_angle_variance);
        genome
    }
}

impl From<GenomeRecord> for Genome {
    fn from(record: GenomeRecord) -> Self {
        Genome::from_record(record)
    }
}

impl From<Genome> for GenomeRecord {
    fn from(genome: Genome) -> Self {
        genome.to_record()
    }
}
