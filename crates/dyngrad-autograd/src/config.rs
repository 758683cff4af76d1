//! Per-call forward configuration.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Behaviour switches for functions whose forward pass differs between
/// training and inference.
///
/// Passed explicitly to the functions that need it (such as
/// [`Dropout`](crate::functions::Dropout)); there is no process-wide mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ForwardConfig {
    pub training: bool,
    /// Seed for stochastic functions; `None` draws from the thread RNG.
    pub seed: Option<u64>,
}

impl ForwardConfig {
    pub fn train() -> Self {
        Self {
            training: true,
            seed: None,
        }
    }

    pub fn eval() -> Self {
        Self {
            training: false,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub(crate) fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self::train()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_modes() {
        assert!(ForwardConfig::train().training);
        assert!(!ForwardConfig::eval().training);
        assert_eq!(ForwardConfig::default(), ForwardConfig::train());
    }

    #[test]
    fn test_seeded_rng_reproducible() {
        let cfg = ForwardConfig::train().with_seed(42);
        let a: f32 = cfg.rng().gen();
        let b: f32 = cfg.rng().gen();
        assert_eq!(a, b);
    }
}
