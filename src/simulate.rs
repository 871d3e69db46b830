//! Synthetic annotation data.
//!
//! Generates datasets with a known annotator accuracy, for demonstrating
//! the agreement rates and for sanity-checking them.

use crate::models::{Dataset, Label};
use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Parameters of a simulated labeling experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of items (rows) to generate.
    #[serde(default = "default_items")]
    pub items: usize,

    /// Annotators labeling each item.
    #[serde(default = "default_annotators")]
    pub annotators: usize,

    /// Number of categories, labeled `0..categories`.
    #[serde(default = "default_categories")]
    pub categories: usize,

    /// Probability that an annotator applies the item's true category.
    #[serde(default = "default_accuracy")]
    pub accuracy: f64,

    /// Probability that an annotator skips an item.
    #[serde(default)]
    pub missing_rate: f64,

    /// RNG seed; a random seed is used when unset.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            items: default_items(),
            annotators: default_annotators(),
            categories: default_categories(),
            accuracy: default_accuracy(),
            missing_rate: 0.0,
            seed: None,
        }
    }
}

fn default_items() -> usize {
    1000
}

fn default_annotators() -> usize {
    3
}

fn default_categories() -> usize {
    3
}

fn default_accuracy() -> f64 {
    0.95
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.annotators == 0 {
            bail!("Simulation needs at least 1 annotator");
        }
        if self.categories == 0 {
            bail!("Simulation needs at least 1 category");
        }
        if !(0.0..=1.0).contains(&self.accuracy) {
            bail!("Accuracy must be between 0.0 and 1.0, got {}", self.accuracy);
        }
        if !(0.0..=1.0).contains(&self.missing_rate) {
            bail!(
                "Missing rate must be between 0.0 and 1.0, got {}",
                self.missing_rate
            );
        }
        Ok(())
    }

    fn describe(&self, seed: u64) -> String {
        format!(
            "simulation(items={}, annotators={}, categories={}, accuracy={}, missing_rate={}, seed={})",
            self.items, self.annotators, self.categories, self.accuracy, self.missing_rate, seed
        )
    }
}

/// Generate a synthetic dataset.
///
/// Each item gets a true category drawn uniformly. Every annotator applies
/// it with probability `accuracy` and otherwise picks uniformly among the
/// remaining categories.
pub fn simulate(config: &SimulationConfig) -> Result<Dataset> {
    config.validate()?;

    let seed = config.seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);
    debug!("Simulating with seed {}", seed);

    let categories = config.categories as i64;
    let mut rows = Vec::with_capacity(config.items);

    for _ in 0..config.items {
        let truth = rng.gen_range(0..categories);
        let mut row = Vec::with_capacity(config.annotators);

        for _ in 0..config.annotators {
            if config.missing_rate > 0.0 && rng.gen_bool(config.missing_rate) {
                continue;
            }
            let label = if categories == 1 || rng.gen_bool(config.accuracy) {
                truth
            } else {
                let other = rng.gen_range(0..categories - 1);
                if other >= truth {
                    other + 1
                } else {
                    other
                }
            };
            row.push(Label::Int(label));
        }

        rows.push(row);
    }

    info!(
        "Simulated {} items with {} annotators",
        config.items, config.annotators
    );
    Ok(Dataset::new(config.describe(seed), rows))
}
