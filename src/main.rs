use anyhow::Context;
use clap::Parser;
use std::io::Write;

use mycoevo::api::{run_server, ApiState};
use mycoevo::config::SimulationConfig;
use mycoevo::evolution::EvolutionManager;
use mycoevo::session::EvolutionSession;

#[cfg(feature = "ui")]
mod controls;
#[cfg(feature = "ui")]
mod visualization;

#[cfg(feature = "ui")]
use macroquad::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run in headless mode (HTTP API server)
    #[arg(long)]
    headless: bool,

    /// Port for headless API server
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Configuration file path (YAML or JSON). If not specified, searches for config.yaml, config.yml, or config.json in current directory.
    #[arg(short, long)]
    config: Option<String>,

    /// Evolve this many generations, print one JSON report per line and exit
    #[arg(short, long)]
    generations: Option<usize>,

    /// Fixed RNG seed, overrides the config file
    #[arg(long)]
    seed: Option<u64>,

    /// Start evolving immediately instead of waiting for a start command
    #[arg(long)]
    autostart: bool,
}

#[cfg(not(feature = "ui"))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref(), args.seed)?;
    match args.generations {
        Some(generations) => run_batch(config, generations),
        None => headless_main(args.port, config, args.autostart).await,
    }
}

#[cfg(feature = "ui")]
#[macroquad::main(window_conf)]
async fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    // Load configuration
    let config = match load_config(args.config.as_deref(), args.seed) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {:#}", e);
            std::process::exit(1);
        }
    };

    let result = if let Some(generations) = args.generations {
        run_batch(config, generations)
    } else if args.headless {
        // Run headless mode even with UI feature enabled
        tokio::runtime::Runtime::new()
            .context("failed to start tokio runtime")
            .and_then(|rt| rt.block_on(headless_main(args.port, config, args.autostart)))
    } else {
        ui_main(config, args.autostart).await
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file or defaults, then apply the seed override
fn load_config(config_path: Option<&str>, seed: Option<u64>) -> anyhow::Result<SimulationConfig> {
    let mut config = match config_path {
        Some(path) => SimulationConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => SimulationConfig::from_default_paths(),
    };
    if seed.is_some() {
        config.seed = seed;
    }
    config.validate()?;
    Ok(config)
}

fn run_batch(config: SimulationConfig, generations: usize) -> anyhow::Result<()> {
    let mut manager = EvolutionManager::new(config)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for _ in 0..generations {
        let report = manager.evolve_next_generation();
        serde_json::to_writer(&mut out, &report)?;
        writeln!(out)?;
    }
    Ok(())
}

/// Headless mode - runs HTTP API server
async fn headless_main(port: u16, config: SimulationConfig, autostart: bool) -> anyhow::Result<()> {
    let mut session = EvolutionSession::new(EvolutionManager::new(config)?);
    if autostart {
        session.start();
    }
    run_server(ApiState::new(session), port).await
}

#[cfg(feature = "ui")]
async fn ui_main(config: SimulationConfig, autostart: bool) -> anyhow::Result<()> {
    use controls::{handle_controls, ViewState, CONTROLS_TEXT};
    use std::time::Duration;
    use visualization::{
        draw_fitness_chart, draw_header, draw_network, draw_nutrients, draw_placeholder,
        draw_stats_panel,
    };

    let mut session = EvolutionSession::new(EvolutionManager::new(config.clone())?);
    if autostart {
        session.start();
    }
    let mut view = ViewState::default();

    loop {
        handle_controls(&mut session, &mut view);

        if session
            .tick(Duration::from_secs_f32(get_frame_time()))
            .is_some()
        {
            view.refresh_best(&session);
        }

        clear_background(Color::new(0.04, 0.04, 0.04, 1.0));

        draw_header(
            session.manager().generation(),
            session.is_running(),
            view.show_best,
        );
        match view.best.as_ref().filter(|_| view.show_best) {
            Some(best) => {
                draw_nutrients(&best.nutrients, config.cell_size);
                draw_network(best, config.cell_size);
            }
            None => draw_placeholder(&config),
        }
        draw_stats_panel(
            session.manager().generation(),
            session.manager().population().len(),
            session.latest(),
            view.best.as_ref(),
        );
        draw_fitness_chart(session.manager().history());
        draw_text(
            CONTROLS_TEXT,
            visualization::MARGIN,
            screen_height() - visualization::CHART_HEIGHT - 2.0 * visualization::MARGIN + 4.0,
            16.0,
            Color::new(1.0, 1.0, 1.0, 0.7),
        );

        // Take screenshot if requested
        if view.take_screenshot {
            view.take_screenshot = false;
            let timestamp = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default();
            let filename = format!("mycoevo_screenshot_{}.png", timestamp);

            match capture_screenshot(&filename) {
                Ok(_) => {
                    println!("Screenshot saved: {}", filename);
                }
                Err(e) => {
                    eprintln!("Failed to save screenshot {}: {}", filename, e);
                }
            }
        }

        next_frame().await;
    }
}

#[cfg(feature = "ui")]
fn window_conf() -> Conf {
    // Size the window from the same config main will load, falling back to defaults
    let args = Args::parse();
    let config = load_config(args.config.as_deref(), args.seed).unwrap_or_default();
    let (width, height) = visualization::window_size(&config);

    Conf {
        window_title: "Evolutionary Fungal Network Simulator".to_owned(),
        window_width: width as i32,
        window_height: height as i32,
        ..Default::default()
    }
}

#[cfg(feature = "ui")]
/// Capture a screenshot of the current screen
fn capture_screenshot(filename: &str) -> anyhow::Result<()> {
    // RGBA bytes, row by row, origin at the bottom-left
    let screen_image = get_screen_data();

    let width = screen_image.width as u32;
    let height = screen_image.height as u32;
    let bytes = &screen_image.bytes;

    let mut img = image::RgbaImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let idx = (y * width + x) as usize * 4;
            if idx + 3 < bytes.len() {
                let pixel = image::Rgba([bytes[idx], bytes[idx + 1], bytes[idx + 2], bytes[idx + 3]]);
                // Flip vertically: OpenGL has origin at bottom-left, images at top-left
                img.put_pixel(x, height - 1 - y, pixel);
            }
        }
    }

    img.save(filename)?;
    Ok(())
}
