use macroquad::color::hsl_to_rgb;
use macroquad::prelude::*;

use mycoevo::config::SimulationConfig;
use mycoevo::genome::{Gene, GenomeRecord};
use mycoevo::types::{FitnessHistory, GenerationReport, GridSnapshot, OrganismSnapshot};

pub const MARGIN: f32 = 10.0;
pub const HEADER_HEIGHT: f32 = 30.0;
pub const PANEL_WIDTH: f32 = 300.0;
pub const CHART_HEIGHT: f32 = 120.0;

pub fn grid_pixels(config: &SimulationConfig) -> f32 {
    config.grid_size as f32 * config.cell_size
}

pub fn window_size(config: &SimulationConfig) -> (f32, f32) {
    let grid = grid_pixels(config);
    (
        grid + PANEL_WIDTH + 3.0 * MARGIN,
        HEADER_HEIGHT + grid + CHART_HEIGHT + 3.0 * MARGIN,
    )
}

fn nutrient_color(value: f32, max: f32) -> Color {
    let v = if max > 0.0 { (value / max).clamp(0.0, 1.0) } else { 0.0 };
    Color::new(0.13, 0.55, 0.13, v * 0.4)
}

fn hypha_color(index: usize, lightness: f32) -> Color {
    let hue = (200.0 + (index as f32 * 30.0) % 160.0) / 360.0;
    hsl_to_rgb(hue, 0.7, lightness)
}

pub fn draw_nutrients(grid: &GridSnapshot, cell_size: f32) {
    let max = grid.max_value();
    for (x, column) in grid.cells.iter().enumerate() {
        for (y, value) in column.iter().enumerate() {
            if *value <= 0.0 {
                continue;
            }
            draw_rectangle(
                MARGIN + x as f32 * cell_size,
                HEADER_HEIGHT + MARGIN + y as f32 * cell_size,
                cell_size,
                cell_size,
                nutrient_color(*value, max),
            );
        }
    }
}

// Trails as polylines, live tips as dots
pub fn draw_network(snapshot: &OrganismSnapshot, cell_size: f32) {
    let to_screen = |x: f32, y: f32| {
        (
            MARGIN + x * cell_size,
            HEADER_HEIGHT + MARGIN + y * cell_size,
        )
    };

    for (index, hypha) in snapshot.hyphae.iter().enumerate() {
        if hypha.trail.len() < 2 {
            continue;
        }
        let color = hypha_color(index, 0.6);
        for pair in hypha.trail.windows(2) {
            let (x1, y1) = to_screen(pair[0].x, pair[0].y);
            let (x2, y2) = to_screen(pair[1].x, pair[1].y);
            draw_line(x1, y1, x2, y2, 2.0, color);
        }
        let (tx, ty) = to_screen(hypha.x, hypha.y);
        draw_circle(tx, ty, 3.0, hypha_color(index, 0.7));
    }
}

pub fn draw_placeholder(config: &SimulationConfig) {
    let size = grid_pixels(config);
    draw_rectangle(
        MARGIN,
        HEADER_HEIGHT + MARGIN,
        size,
        size,
        Color::new(0.12, 0.12, 0.14, 1.0),
    );
    let lines = [
        "Evolution in progress...",
        "Press B to show the fittest network",
    ];
    for (i, line) in lines.iter().enumerate() {
        let width = measure_text(line, None, 20, 1.0).width;
        draw_text(
            line,
            MARGIN + (size - width) / 2.0,
            HEADER_HEIGHT + MARGIN + size / 2.0 + i as f32 * 24.0,
            20.0,
            Color::new(0.6, 0.6, 0.6, 1.0),
        );
    }
}

pub fn draw_header(generation: u64, running: bool, show_best: bool) {
    let title = if show_best {
        format!("Best Network (Gen {})", generation)
    } else {
        "Evolution Visualization".to_string()
    };
    draw_text(&title, MARGIN, 22.0, 24.0, WHITE);
    if !running {
        let x = measure_text(&title, None, 24, 1.0).width + 2.0 * MARGIN;
        draw_text("PAUSED - Press SPACE to evolve", x, 22.0, 18.0, YELLOW);
    }
}

fn panel_line(label: &str, value: String, y: f32, color: Color) -> f32 {
    let x = screen_width() - PANEL_WIDTH - MARGIN;
    draw_text(label, x, y, 18.0, Color::new(0.85, 0.85, 0.85, 1.0));
    let width = measure_text(&value, None, 18, 1.0).width;
    draw_text(&value, screen_width() - MARGIN - width, y, 18.0, color);
    y + 22.0
}

pub fn draw_stats_panel(
    generation: u64,
    population_size: usize,
    report: Option<&GenerationReport>,
    best: Option<&OrganismSnapshot>,
) {
    let x = screen_width() - PANEL_WIDTH - MARGIN;
    draw_rectangle(
        x - MARGIN / 2.0,
        HEADER_HEIGHT + MARGIN,
        PANEL_WIDTH + MARGIN,
        screen_height() - CHART_HEIGHT - HEADER_HEIGHT - 3.0 * MARGIN,
        Color::new(0.12, 0.13, 0.16, 1.0),
    );

    let mut y = HEADER_HEIGHT + 2.0 * MARGIN + 14.0;
    draw_text("Evolution Stats", x, y, 22.0, WHITE);
    y += 28.0;
    y = panel_line("Generation:", generation.to_string(), y, YELLOW);
    y = panel_line("Population Size:", population_size.to_string(), y, WHITE);

    if let Some(report) = report {
        y = panel_line("Best Fitness:", format!("{:.3}", report.best_fitness), y, GREEN);
        y = panel_line("Avg Fitness:", format!("{:.3}", report.average_fitness), y, SKYBLUE);
        y += 12.0;
        draw_text("Best Genome", x, y, 22.0, WHITE);
        y += 28.0;
        y = draw_genome(&report.best_genome, y);
    }

    if let Some(best) = best {
        y += 12.0;
        draw_text("Best Network Performance", x, y, 22.0, WHITE);
        y += 28.0;
        let stats = &best.stats;
        y = panel_line(
            "Resources Collected:",
            format!("{:.0}", stats.resources_collected),
            y,
            WHITE,
        );
        y = panel_line("Coverage:", format!("{} cells", stats.coverage), y, WHITE);
        y = panel_line("Max Network Size:", format!("{} tips", stats.max_hyphae), y, WHITE);
        y = panel_line("Survival Time:", format!("{} steps", stats.survival_time), y, WHITE);
        panel_line("Final Fitness:", format!("{:.3}", best.fitness), y, GREEN);
    }
}

fn draw_genome(genome: &GenomeRecord, mut y: f32) -> f32 {
    let genome = mycoevo::genome::Genome::from_record(*genome);
    for gene in Gene::ALL {
        y = panel_line(
            gene.name(),
            format!("{:.3}", genome.get(gene)),
            y,
            Color::new(0.9, 0.9, 0.9, 1.0),
        );
    }
    y
}

/// Best fitness in green, average in blue, one dot per generation.
pub fn draw_fitness_chart(history: &FitnessHistory) {
    let x0 = MARGIN;
    let y0 = screen_height() - CHART_HEIGHT - MARGIN;
    let w = screen_width() - 2.0 * MARGIN;
    let h = CHART_HEIGHT;
    draw_rectangle(x0, y0, w, h, Color::new(0.07, 0.08, 0.1, 1.0));
    draw_text("Fitness Evolution", x0 + 6.0, y0 + 16.0, 16.0, WHITE);

    let plot = |series: &[f32], radius: f32, color: Color| {
        let n = series.len();
        for (i, fitness) in series.iter().enumerate() {
            let fx = if n > 1 { i as f32 / (n - 1) as f32 } else { 0.0 };
            let px = x0 + 8.0 + fx * (w - 16.0);
            let py = y0 + h - 8.0 - fitness.clamp(0.0, 1.0) * (h - 28.0);
            draw_circle(px, py, radius, color);
        }
    };
    plot(&history.best, 2.0, Color::new(0.06, 0.73, 0.51, 1.0));
    plot(&history.average, 1.5, Color::new(0.23, 0.51, 0.96, 1.0));

    draw_text(
        "Best Fitness",
        x0 + w - 200.0,
        y0 + 16.0,
        14.0,
        Color::new(0.06, 0.73, 0.51, 1.0),
    );
    draw_text(
        "Avg Fitness",
        x0 + w - 100.0,
        y0 + 16.0,
        14.0,
        Color::new(0.23, 0.51, 0.96, 1.0),
    );
}
