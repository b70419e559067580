//! Stochastic samplers: inter-arrival times, order quantities, lead
//! times, and disruption/recovery durations are all "a number drawn from
//! a distribution" at the call site. [`Sampler`] erases the concrete
//! distribution behind a boxed closure so node processes (§4.6) don't
//! need to know whether a scenario is deterministic (Scenario A/B/F) or
//! stochastic (Scenario C/D/E).

use crate::error::SamplerError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal, Poisson};
use std::cell::RefCell;
use std::rc::Rc;

/// A single RNG shared by every sampler in a run: links, disruption
/// supervisors, and the demand generator all draw from the same
/// sequence so a run is reproducible given one seed and a fixed
/// event-insertion order (§6).
pub type SharedRng = Rc<RefCell<dyn rand::RngCore>>;

pub fn shared_rng_from_seed(seed: u64) -> SharedRng {
    Rc::new(RefCell::new(ChaCha8Rng::seed_from_u64(seed)))
}

/// A draw source. Not `Fn` because `rand_distr` distributions such as
/// `Poisson` hold no mutable state, but callers may also want stateful
/// closures (e.g. a scripted sequence for tests).
pub struct Sampler {
    name: &'static str,
    draw: Box<dyn FnMut(&mut dyn rand::RngCore) -> f64>,
}

impl Sampler {
    pub fn new(name: &'static str, draw: impl FnMut(&mut dyn rand::RngCore) -> f64 + 'static) -> Self {
        Self {
            name,
            draw: Box::new(draw),
        }
    }

    /// A sampler that always returns the same value (deterministic demand,
    /// zero lead time, fixed disruption windows in Scenario A/B/F).
    pub fn constant(name: &'static str, value: f64) -> Self {
        Self::new(name, move |_| value)
    }

    /// Poisson-distributed draw (Scenario C: daily demand ~ Poisson(25)).
    pub fn poisson(name: &'static str, lambda: f64) -> Self {
        let dist = Poisson::new(lambda).expect("invalid poisson lambda");
        Self::new(name, move |rng| dist.sample(rng))
    }

    /// Normal-distributed draw (Scenario D: demand ~ Normal(100,15)).
    pub fn normal(name: &'static str, mean: f64, std_dev: f64) -> Self {
        let dist = Normal::new(mean, std_dev).expect("invalid normal params");
        Self::new(name, move |rng| dist.sample(rng))
    }

    /// Geometric-distributed draw, returned as a count of Bernoulli
    /// trials until first success (Scenario E: disrupt/recovery
    /// intervals ~ Geometric(p)).
    pub fn geometric(name: &'static str, p: f64) -> Self {
        Self::new(name, move |rng| {
            let mut trials = 1.0;
            while !rng.gen_bool(p) {
                trials += 1.0;
            }
            trials
        })
    }

    fn raw(&mut self, rng: &mut dyn rand::RngCore) -> Result<f64, SamplerError> {
        let v = (self.draw)(rng);
        if v.is_nan() {
            Err(SamplerError::NotANumber { name: self.name })
        } else {
            Ok(v)
        }
    }

    /// Draw a value that must be non-negative (timeouts, lead times).
    pub fn sample_non_negative(&mut self, rng: &mut dyn rand::RngCore) -> Result<f64, SamplerError> {
        let v = self.raw(rng)?;
        if v < 0.0 {
            Err(SamplerError::Negative {
                name: self.name,
                value: v,
            })
        } else {
            Ok(v)
        }
    }

    /// Draw a value that must be strictly positive (order quantities).
    pub fn sample_positive(&mut self, rng: &mut dyn rand::RngCore) -> Result<f64, SamplerError> {
        let v = self.raw(rng)?;
        if v <= 0.0 {
            Err(SamplerError::NonPositive {
                name: self.name,
                value: v,
            })
        } else {
            Ok(v)
        }
    }
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler").field("name", &self.name).finish()
    }
}
