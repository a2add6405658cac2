use macroquad::prelude::*;

use mycoevo::session::EvolutionSession;
use mycoevo::types::OrganismSnapshot;

/// Window-side state that does not belong to the engine.
#[derive(Default)]
pub struct ViewState {
    pub show_best: bool,
    pub take_screenshot: bool,
    pub best: Option<OrganismSnapshot>,
}

impl ViewState {
    /// Replay the current best organism if the network view is open.
    pub fn refresh_best(&mut self, session: &EvolutionSession) {
        self.best = if self.show_best {
            session.manager().best_organism_snapshot()
        } else {
            None
        };
    }
}

pub fn handle_controls(session: &mut EvolutionSession, view: &mut ViewState) {
    if is_key_pressed(KeyCode::Space) {
        session.toggle();
    }

    // Single generation, only while paused
    if is_key_pressed(KeyCode::G) && !session.is_running() {
        session.step_once();
        view.refresh_best(session);
    }

    if is_key_pressed(KeyCode::R) {
        session.reset();
        view.best = None;
    }

    if is_key_pressed(KeyCode::B) {
        view.show_best = !view.show_best;
        view.refresh_best(session);
    }

    if is_key_pressed(KeyCode::P) {
        // Set flag to take screenshot at end of frame
        view.take_screenshot = true;
    }
}

pub const CONTROLS_TEXT: &str =
    "SPACE=Start/Pause | G=Single Generation | R=Reset | B=Show Best | P=Screenshot";
