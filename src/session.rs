use std::time::Duration;

use crate::evolution::EvolutionManager;
use crate::types::GenerationReport;

/// Timer-gated driver around an [`EvolutionManager`].
///
/// The host calls [`tick`](Self::tick) with elapsed time; while running, one
/// generation is evolved per `tick_interval`. Pausing only stops future
/// ticks, a generation in progress always completes.
pub struct EvolutionSession {
    manager: EvolutionManager,
    running: bool,
    tick_interval: Duration,
    accumulator: Duration,
}

impl EvolutionSession {
    pub fn new(manager: EvolutionManager) -> Self {
        let tick_interval = Duration::from_millis(manager.config().tick_interval_ms.max(1));
        Self {
            manager,
            running: false,
            tick_interval,
            accumulator: Duration::ZERO,
        }
    }

    pub fn manager(&self) -> &EvolutionManager {
        &self.manager
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn start(&mut self) {
        if !self.running {
            tracing::info!(generation = self.manager.generation(), "evolution started");
        }
        self.running = true;
    }

    pub fn pause(&mut self) {
        if self.running {
            tracing::info!(generation = self.manager.generation(), "evolution paused");
        }
        self.running = false;
        self.accumulator = Duration::ZERO;
    }

    pub fn toggle(&mut self) {
        if self.running {
            self.pause();
        } else {
            self.start();
        }
    }

    /// Stop and start over from a fresh random population.
    pub fn reset(&mut self) {
        self.pause();
        self.manager.reset();
        tracing::info!("evolution reset");
    }

    /// Evolve exactly one generation, regardless of the running flag.
    pub fn step_once(&mut self) -> GenerationReport {
        let report = self.manager.evolve_next_generation();
        tracing::info!(
            generation = report.generation,
            best = report.best_fitness,
            average = report.average_fitness,
            "generation complete"
        );
        report
    }

    /// Feed elapsed time. Returns the report when a generation fired.
    ///
    /// At most one generation runs per call; surplus time is dropped so a
    /// slow host does not queue a backlog.
    pub fn tick(&mut self, elapsed: Duration) -> Option<GenerationReport> {
        if !self.running {
            return None;
        }
        self.accumulator += elapsed;
        if self.accumulator < self.tick_interval {
            return None;
        }
        self.accumulator = Duration::ZERO;
        Some(self.step_once())
    }

    pub fn latest(&self) -> Option<&GenerationReport> {
        self.manager.last_report()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;

    fn session() -> EvolutionSession {
        let config = SimulationConfig {
            grid_size: 30,
            simulation_steps: 30,
            population_size: 4,
            seed: Some(51),
            tick_interval_ms: 100,
            ..Default::default()
        };
        EvolutionSession::new(EvolutionManager::new(config).unwrap())
    }

    #[test]
    fn ticks_only_fire_while_running() {
        let mut session = session();
        assert!(session.tick(Duration::from_secs(5)).is_none());

        session.start();
        assert!(session.tick(Duration::from_millis(60)).is_none());
        let report = session.tick(Duration::from_millis(60)).unwrap();
        assert_eq!(report.generation, 1);
        assert_eq!(session.latest(), Some(&report));

        session.pause();
        assert!(session.tick(Duration::from_millis(500)).is_none());
        assert_eq!(session.manager().generation(), 1);
    }

    #[test]
    fn long_gaps_fire_a_single_generation() {
        let mut session = session();
        session.toggle();
        assert!(session.is_running());
        assert!(session.tick(Duration::from_secs(10)).is_some());
        assert!(session.tick(Duration::from_millis(10)).is_none());
        assert_eq!(session.manager().generation(), 1);
    }

    #[test]
    fn reset_pauses_and_rewinds() {
        let mut session = session();
        session.step_once();
        session.start();
        session.reset();
        assert!(!session.is_running());
        assert_eq!(session.manager().generation(), 0);
        assert!(session.latest().is_none());
    }

    #[derive(Clone, Default)]
    struct SharedBuf(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn every_generation_is_logged() {
        let buf = SharedBuf::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let mut session = session();
        tracing::subscriber::with_default(subscriber, || {
            session.step_once();
            session.start();
            session.tick(Duration::from_millis(200));
        });

        let logs = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(logs.matches("generation complete").count(), 2);
        assert!(logs.contains("generation=1"));
        assert!(logs.contains("generation=2"));
    }
}
