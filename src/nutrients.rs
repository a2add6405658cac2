use ::rand as external_rand;
use external_rand::Rng;

use crate::config::{PatchSpec, SimulationConfig};

/// Square grid of nonnegative nutrient values, indexed `[x][y]`.
#[derive(Clone, Debug, PartialEq)]
pub struct NutrientGrid {
    pub cells: Vec<Vec<f32>>,
    back: Vec<Vec<f32>>, // Double buffer for diffusion
    size: usize,
}

impl NutrientGrid {
    pub fn new(size: usize) -> Self {
        Self::filled(size, 0.0)
    }

    pub fn filled(size: usize, value: f32) -> Self {
        let value = value.max(0.0);
        Self {
            cells: vec![vec![value; size]; size],
            back: vec![vec![value; size]; size],
            size,
        }
    }

    /// Fresh grid with radial patches of food, one tier at a time.
    pub fn generate<R: Rng + ?Sized>(config: &SimulationConfig, rng: &mut R) -> Self {
        let mut grid = Self::new(config.grid_size);
        for patch in &config.nutrient_patches {
            for _ in 0..patch.count {
                let cx = rng.gen_range(0..grid.size) as f32;
                let cy = rng.gen_range(0..grid.size) as f32;
                grid.add_patch(cx, cy, patch, config.initial_nutrients);
            }
        }
        grid
    }

    /// Linear falloff from `amount * intensity` at the center to zero at `radius`.
    pub fn add_patch(&mut self, cx: f32, cy: f32, patch: &PatchSpec, amount: f32) {
        if patch.radius <= 0.0 {
            return;
        }
        for x in 0..self.size {
            for y in 0..self.size {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                let dist = (dx * dx + dy * dy).sqrt();
                if dist < patch.radius {
                    let falloff = 1.0 - dist / patch.radius;
                    self.cells[x][y] += (amount * patch.intensity * falloff).max(0.0);
                }
            }
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn area(&self) -> usize {
        self.size * self.size
    }

    #[inline]
    pub fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.size && (y as usize) < self.size
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.cells[x][y]
    }

    /// Density at a continuous position, `None` outside the grid.
    pub fn sample(&self, x: f32, y: f32) -> Option<f32> {
        let xi = x.floor() as i64;
        let yi = y.floor() as i64;
        if self.in_bounds(xi, yi) {
            Some(self.cells[xi as usize][yi as usize])
        } else {
            None
        }
    }

    /// Remove up to `amount` from a cell and return what was actually taken.
    pub fn deplete(&mut self, x: usize, y: usize, amount: f32) -> f32 {
        let before = self.cells[x][y];
        let after = (before - amount.max(0.0)).max(0.0);
        self.cells[x][y] = after;
        before - after
    }

    pub fn total(&self) -> f32 {
        self.cells.iter().flatten().sum()
    }

    /// One diffusion pass over interior cells: each moves toward the mean of
    /// its four neighbors by `rate`. Border cells are read but never written.
    pub fn diffuse(&mut self, rate: f32) {
        if self.size < 3 || rate <= 0.0 {
            return;
        }
        for (back, front) in self.back.iter_mut().zip(&self.cells) {
            back.copy_from_slice(front);
        }
        for x in 1..self.size - 1 {
            for y in 1..self.size - 1 {
                let avg = (self.back[x + 1][y]
                    + self.back[x - 1][y]
                    + self.back[x][y + 1]
                    + self.back[x][y - 1])
                    * 0.25;
                let v = self.back[x][y];
                self.cells[x][y] = (v + rate * (avg - v)).max(0.0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn uniform_grid_is_stable_under_diffusion() {
        let mut grid = NutrientGrid::filled(10, 3.0);
        grid.diffuse(0.08);
        assert!(grid.cells.iter().flatten().all(|v| (*v - 3.0).abs() < 1e-6));
    }

    #[test]
    fn spike_spreads_to_neighbors() {
        let mut grid = NutrientGrid::new(9);
        grid.cells[4][4] = 100.0;
        grid.diffuse(0.08);
        assert!((grid.get(4, 4) - 92.0).abs() < 1e-4);
        assert!((grid.get(5, 4) - 2.0).abs() < 1e-4);
        assert!((grid.get(4, 3) - 2.0).abs() < 1e-4);
        assert_eq!(grid.get(5, 5), 0.0);
    }

    #[test]
    fn depletion_never_goes_negative() {
        let mut grid = NutrientGrid::filled(4, 3.0);
        assert_eq!(grid.deplete(1, 1, 5.0), 3.0);
        assert_eq!(grid.get(1, 1), 0.0);
        assert_eq!(grid.deplete(1, 1, 5.0), 0.0);
    }

    #[test]
    fn sample_is_none_outside() {
        let grid = NutrientGrid::filled(5, 1.0);
        assert_eq!(grid.sample(4.9, 0.0), Some(1.0));
        assert_eq!(grid.sample(5.0, 0.0), None);
        assert_eq!(grid.sample(-0.1, 2.0), None);
    }

    #[test]
    fn generated_grid_has_food_and_no_negatives() {
        let mut rng = StdRng::seed_from_u64(11);
        let grid = NutrientGrid::generate(&SimulationConfig::default(), &mut rng);
        assert!(grid.total() > 0.0);
        assert!(grid.cells.iter().flatten().all(|v| *v >= 0.0));
        assert_eq!(grid.size(), SimulationConfig::default().grid_size);
    }
}
