// Analysis configuration

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use sitegraph_redirect::DEFAULT_MAX_HOPS;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EquityConfig {
    pub damping: f64,
    /// Convergence threshold as a fraction of the seed mass.
    pub tolerance: f64,
    pub max_iterations: usize,
    pub seed_mass: f64,
}

impl Default for EquityConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            tolerance: 1e-4,
            max_iterations: 100,
            seed_mass: 100.0,
        }
    }
}

/// Traffic-share thresholds for the cannibalization policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CannibalizationConfig {
    pub substantial_share: f64,
    pub dominant_share: f64,
    pub marginal_share: f64,
    pub negligible_share: f64,
    pub low_authority: f64,
    pub close_rank_gap: u32,
    /// Search volume at which the volume weight saturates.
    pub volume_reference: u64,
}

impl Default for CannibalizationConfig {
    fn default() -> Self {
        Self {
            substantial_share: 0.25,
            dominant_share: 0.70,
            marginal_share: 0.10,
            negligible_share: 0.02,
            low_authority: 30.0,
            close_rank_gap: 2,
            volume_reference: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub roots: Vec<String>,
    pub max_hops: usize,
    pub workers: usize,
    pub equity: EquityConfig,
    pub cannibalization: CannibalizationConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            roots: vec!["/".to_string()],
            max_hops: DEFAULT_MAX_HOPS,
            workers: 4,
            equity: EquityConfig::default(),
            cannibalization: CannibalizationConfig::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: AnalysisConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_roots(mut self, roots: Vec<String>) -> Self {
        self.roots = roots;
        self
    }

    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let equity = &self.equity;
        if !(equity.damping > 0.0 && equity.damping < 1.0) {
            return Err(CoreError::InvalidConfig(format!(
                "damping must be between 0 and 1 (exclusive), got {}",
                equity.damping
            )));
        }
        if !(equity.tolerance > 0.0) {
            return Err(CoreError::InvalidConfig(
                "tolerance must be positive".to_string(),
            ));
        }
        if equity.max_iterations == 0 {
            return Err(CoreError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !(equity.seed_mass > 0.0) {
            return Err(CoreError::InvalidConfig(
                "seed_mass must be positive".to_string(),
            ));
        }
        if self.roots.is_empty() {
            return Err(CoreError::InvalidConfig(
                "at least one root page is required".to_string(),
            ));
        }

        let c = &self.cannibalization;
        for (name, share) in [
            ("substantial_share", c.substantial_share),
            ("dominant_share", c.dominant_share),
            ("marginal_share", c.marginal_share),
            ("negligible_share", c.negligible_share),
        ] {
            if !(0.0..=1.0).contains(&share) {
                return Err(CoreError::InvalidConfig(format!(
                    "{} must be within 0..=1, got {}",
                    name, share
                )));
            }
        }
        if c.negligible_share > c.marginal_share {
            return Err(CoreError::InvalidConfig(
                "negligible_share cannot exceed marginal_share".to_string(),
            ));
        }

        Ok(())
    }
}
