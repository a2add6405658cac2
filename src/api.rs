// API module for headless mode - HTTP endpoints to drive the evolution

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tower_http::cors::CorsLayer;

use crate::config::SimulationConfig;
use crate::session::EvolutionSession;
use crate::types::{FitnessHistory, GenerationReport, OrganismSnapshot};

/// Upper bound for a single `POST /step` request.
const MAX_GENERATIONS_PER_REQUEST: usize = 100;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StateResponse {
    pub running: bool,
    pub generation: u64,
    pub population_size: usize,
    pub latest: Option<GenerationReport>,
}

#[derive(Deserialize)]
pub struct StepQuery {
    pub generations: Option<usize>,
}

// Shared state for the API server
#[derive(Clone)]
pub struct ApiState {
    pub session: Arc<Mutex<EvolutionSession>>,
}

impl ApiState {
    pub fn new(session: EvolutionSession) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
        }
    }

    // Run `f` with the session locked, on the blocking thread pool
    async fn with_session_blocking<T, F>(&self, f: F) -> Result<T, StatusCode>
    where
        F: FnOnce(&mut EvolutionSession) -> T + Send + 'static,
        T: Send + 'static,
    {
        let session = Arc::clone(&self.session);
        tokio::task::spawn_blocking(move || {
            let mut guard = session
                .lock()
                .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
            Ok(f(&mut guard))
        })
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
    }
}

fn state_response(session: &EvolutionSession) -> StateResponse {
    StateResponse {
        running: session.is_running(),
        generation: session.manager().generation(),
        population_size: session.manager().population().len(),
        latest: session.latest().cloned(),
    }
}

// GET /state - Running flag, generation and latest report
async fn get_state(State(api_state): State<ApiState>) -> Result<Json<StateResponse>, StatusCode> {
    let state = api_state
        .with_session_blocking(|session| state_response(session))
        .await?;
    Ok(Json(state))
}

// GET /history - Best and average fitness per generation
async fn get_history(
    State(api_state): State<ApiState>,
) -> Result<Json<FitnessHistory>, StatusCode> {
    let history = api_state
        .with_session_blocking(|session| session.manager().history().clone())
        .await?;
    Ok(Json(history))
}

// GET /best - Trails and grid of the latest best organism
async fn get_best(
    State(api_state): State<ApiState>,
) -> Result<Json<OrganismSnapshot>, StatusCode> {
    api_state
        .with_session_blocking(|session| session.manager().best_organism_snapshot())
        .await?
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

// POST /step - Evolve N generations synchronously
async fn step_generations(
    Query(params): Query<StepQuery>,
    State(api_state): State<ApiState>,
) -> Result<Json<Vec<GenerationReport>>, StatusCode> {
    let generations = params.generations.unwrap_or(1);
    if generations == 0 || generations > MAX_GENERATIONS_PER_REQUEST {
        return Err(StatusCode::BAD_REQUEST);
    }
    let reports: Vec<GenerationReport> = api_state
        .with_session_blocking(move |session| {
            (0..generations).map(|_| session.step_once()).collect()
        })
        .await?;
    Ok(Json(reports))
}

// POST /start - Resume timer-driven evolution
async fn start_evolution(
    State(api_state): State<ApiState>,
) -> Result<Json<StateResponse>, StatusCode> {
    let state = api_state
        .with_session_blocking(|session| {
            session.start();
            state_response(session)
        })
        .await?;
    Ok(Json(state))
}

// POST /pause - Stop timer-driven evolution
async fn pause_evolution(
    State(api_state): State<ApiState>,
) -> Result<Json<StateResponse>, StatusCode> {
    let state = api_state
        .with_session_blocking(|session| {
            session.pause();
            state_response(session)
        })
        .await?;
    Ok(Json(state))
}

// POST /reset - Fresh population, paused
async fn reset_evolution(
    State(api_state): State<ApiState>,
) -> Result<Json<StateResponse>, StatusCode> {
    let state = api_state
        .with_session_blocking(|session| {
            session.reset();
            state_response(session)
        })
        .await?;
    Ok(Json(state))
}

// GET /config - Get simulation configuration
async fn get_config(
    State(api_state): State<ApiState>,
) -> Result<Json<SimulationConfig>, StatusCode> {
    let config = api_state
        .with_session_blocking(|session| session.manager().config().clone())
        .await?;
    Ok(Json(config))
}

// Create the API router
pub fn create_router(api_state: ApiState) -> Router {
    Router::new()
        .route("/state", get(get_state))
        .route("/history", get(get_history))
        .route("/best", get(get_best))
        .route("/step", post(step_generations))
        .route("/start", post(start_evolution))
        .route("/pause", post(pause_evolution))
        .route("/reset", post(reset_evolution))
        .route("/config", get(get_config))
        .layer(CorsLayer::permissive())
        .with_state(api_state)
}

// Run the API server with the evolution ticking in the background
pub async fn run_server(api_state: ApiState, port: u16) -> anyhow::Result<()> {
    let app = create_router(api_state.clone());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    tracing::info!(port, "mycoevo headless API server listening");
    println!("MycoEvo headless API server running on http://localhost:{}", port);
    println!("Endpoints:");
    println!("  GET  /state   - Running flag, generation and latest report");
    println!("  GET  /history - Best and average fitness per generation");
    println!("  GET  /best    - Best organism trails and nutrient grid");
    println!("  POST /step?generations=N - Evolve N generations (default: 1)");
    println!("  POST /start   - Start timed evolution");
    println!("  POST /pause   - Pause timed evolution");
    println!("  POST /reset   - Reset to a fresh population");
    println!("  GET  /config  - Get simulation configuration");

    let evolution_task = tokio::spawn(evolution_loop(api_state.clone()));
    let server_handle = tokio::spawn(async move { axum::serve(listener, app).await });

    // Wait for either task to complete
    tokio::select! {
        result = server_handle => {
            result??;
        }
        _ = evolution_task => {
            tracing::error!("evolution loop ended unexpectedly");
        }
    }

    Ok(())
}

// Background task that feeds elapsed time to the session
async fn evolution_loop(api_state: ApiState) {
    const POLL_INTERVAL: Duration = Duration::from_millis(50);
    let mut last = Instant::now();

    loop {
        tokio::time::sleep(POLL_INTERVAL).await;
        let now = Instant::now();
        let elapsed = now - last;
        last = now;

        if api_state
            .with_session_blocking(move |session| session.tick(elapsed))
            .await
            .is_err()
        {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::EvolutionManager;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    fn router() -> Router {
        let config = SimulationConfig {
            grid_size: 30,
            simulation_steps: 30,
            population_size: 4,
            seed: Some(61),
            ..Default::default()
        };
        let session = EvolutionSession::new(EvolutionManager::new(config).unwrap());
        create_router(ApiState::new(session))
    }

    async fn call(router: &Router, method: Method, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn step_then_fetch_best() {
        let router = router();

        let (status, _) = call(&router, Method::GET, "/best").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(&router, Method::POST, "/step?generations=2").await;
        assert_eq!(status, StatusCode::OK);
        let reports: Vec<GenerationReport> = serde_json::from_slice(&body).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1].generation, 2);

        let (status, body) = call(&router, Method::GET, "/best").await;
        assert_eq!(status, StatusCode::OK);
        let best: OrganismSnapshot = serde_json::from_slice(&body).unwrap();
        assert_eq!(best.fitness, reports[1].best_fitness);
        assert_eq!(best.nutrients.size, 30);

        let (_, body) = call(&router, Method::GET, "/history").await;
        let history: FitnessHistory = serde_json::from_slice(&body).unwrap();
        assert_eq!(history.best.len(), 2);
    }

    #[tokio::test]
    async fn start_pause_reset_round() {
        let router = router();

        let (_, body) = call(&router, Method::POST, "/start").await;
        let state: StateResponse = serde_json::from_slice(&body).unwrap();
        assert!(state.running);

        let (_, body) = call(&router, Method::POST, "/pause").await;
        let state: StateResponse = serde_json::from_slice(&body).unwrap();
        assert!(!state.running);

        call(&router, Method::POST, "/step").await;
        let (_, body) = call(&router, Method::POST, "/reset").await;
        let state: StateResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(state.generation, 0);
        assert!(state.latest.is_none());
        assert_eq!(state.population_size, 4);
    }

    #[tokio::test]
    async fn long_step_leaves_the_runtime_free() {
        let config = SimulationConfig {
            grid_size: 60,
            simulation_steps: 150,
            population_size: 6,
            parallel: false,
            seed: Some(62),
            ..Default::default()
        };
        let session = EvolutionSession::new(EvolutionManager::new(config).unwrap());
        let router = create_router(ApiState::new(session));

        let request = {
            let router = router.clone();
            tokio::spawn(async move { call(&router, Method::POST, "/step?generations=5").await })
        };

        // A single-threaded runtime keeps polling other tasks while the generations run.
        let mut ticks = 0;
        while !request.is_finished() {
            tokio::time::sleep(Duration::from_millis(1)).await;
            ticks += 1;
        }
        assert!(ticks > 1);

        let (status, body) = request.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        let reports: Vec<GenerationReport> = serde_json::from_slice(&body).unwrap();
        assert_eq!(reports.len(), 5);
    }

    #[tokio::test]
    async fn rejects_oversized_step_requests() {
        let router = router();
        let (status, _) = call(&router, Method::POST, "/step?generations=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&router, Method::POST, "/step?generations=1000").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&router, Method::GET, "/config").await;
        assert_eq!(status, StatusCode::OK);
        let config: SimulationConfig = serde_json::from_slice(&body).unwrap();
        assert_eq!(config.population_size, 4);
    }
}
