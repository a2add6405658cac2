//! Evolutionary fungal foraging simulation.
//!
//! A population of [`genome::Genome`]s is scored by growing one
//! [`organism::Organism`] per genome on its own nutrient grid, then evolved
//! with elitism, tournament selection, crossover and mutation by an
//! [`evolution::EvolutionManager`]. [`session::EvolutionSession`] adds the
//! start/pause/tick control surface used by the window and the HTTP API.

pub mod api;
pub mod config;
pub mod error;
pub mod evolution;
pub mod genome;
pub mod hypha;
pub mod nutrients;
pub mod organism;
pub mod session;
pub mod types;

pub use config::SimulationConfig;
pub use error::ConfigError;
pub use evolution::EvolutionManager;
pub use genome::Genome;
pub use session::EvolutionSession;
