use serde::{Deserialize, Serialize};

/// The five tunable scoring weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeightKey {
    /// Top-bottom color vs. embedding balance
    AlphaTb,
    /// Outer-inner color vs. embedding balance
    AlphaOi,
    /// MMR relevance vs. diversity balance
    MmrLambda,
    /// Outer-top vs. outer-bottom balance
    BetaTb,
    /// Weight of inner set cohesion
    LambdaTbset,
}

impl WeightKey {
    pub const ALL: [WeightKey; 5] = [
        WeightKey::AlphaTb,
        WeightKey::AlphaOi,
        WeightKey::MmrLambda,
        WeightKey::BetaTb,
        WeightKey::LambdaTbset,
    ];

    /// Closed interval the weight must stay in
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            WeightKey::AlphaTb | WeightKey::AlphaOi => (0.20, 0.95),
            WeightKey::MmrLambda => (0.30, 0.95),
            WeightKey::BetaTb => (0.20, 0.80),
            WeightKey::LambdaTbset => (0.00, 0.30),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WeightKey::AlphaTb => "alpha_tb",
            WeightKey::AlphaOi => "alpha_oi",
            WeightKey::MmrLambda => "mmr_lambda",
            WeightKey::BetaTb => "beta_tb",
            WeightKey::LambdaTbset => "lambda_tbset",
        }
    }

    /// Clamps `value` into this weight's interval. NaN maps to the lower bound.
    pub fn clip(&self, value: f64) -> f64 {
        let (lo, hi) = self.bounds();
        if value.is_nan() {
            return lo;
        }
        value.clamp(lo, hi)
    }
}

/// Scoring weights consumed by the external scorer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub alpha_tb: f64,
    pub alpha_oi: f64,
    pub mmr_lambda: f64,
    pub beta_tb: f64,
    pub lambda_tbset: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            alpha_tb: 0.60,
            alpha_oi: 0.60,
            mmr_lambda: 0.70,
            beta_tb: 0.50,
            lambda_tbset: 0.10,
        }
    }
}

impl Weights {
    pub fn get(&self, key: WeightKey) -> f64 {
        match key {
            WeightKey::AlphaTb => self.alpha_tb,
            WeightKey::AlphaOi => self.alpha_oi,
            WeightKey::MmrLambda => self.mmr_lambda,
            WeightKey::BetaTb => self.beta_tb,
            WeightKey::LambdaTbset => self.lambda_tbset,
        }
    }

    pub fn set(&mut self, key: WeightKey, value: f64) {
        let slot = match key {
            WeightKey::AlphaTb => &mut self.alpha_tb,
            WeightKey::AlphaOi => &mut self.alpha_oi,
            WeightKey::MmrLambda => &mut self.mmr_lambda,
            WeightKey::BetaTb => &mut self.beta_tb,
            WeightKey::LambdaTbset => &mut self.lambda_tbset,
        };
        *slot = value;
    }

    /// Builds a vector by clipping `f(key)` for every weight
    pub fn from_fn(mut f: impl FnMut(WeightKey) -> f64) -> Self {
        let mut weights = Weights::default();
        for key in WeightKey::ALL {
            weights.set(key, key.clip(f(key)));
        }
        weights
    }

    pub fn is_within_bounds(&self) -> bool {
        WeightKey::ALL.iter().all(|key| {
            let (lo, hi) = key.bounds();
            let value = self.get(*key);
            value >= lo && value <= hi
        })
    }
}

/// Baseline θ plus the learning constants
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hyperparams {
    #[serde(flatten)]
    pub weights: Weights,
    /// Standard deviation of the exploration noise
    pub sigma: f64,
    /// Learning rate for feedback updates
    pub eta: f64,
}

pub const DEFAULT_SIGMA: f64 = 0.05;
pub const DEFAULT_ETA: f64 = 0.30;

impl Default for Hyperparams {
    fn default() -> Self {
        Self {
            weights: Weights::default(),
            sigma: DEFAULT_SIGMA,
            eta: DEFAULT_ETA,
        }
    }
}
