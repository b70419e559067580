//! Disruption lifecycle (component C8): an availability supervisor
//! that alternates a Node or Link between active and inactive phases
//! with stochastic durations (§4.8).

use crate::availability::Availability;
use crate::sampler::{SharedRng, Sampler};
use crate::scheduler::SimContext;
use rand::Rng;
use std::cell::RefCell;

enum Trigger {
    /// An explicit sampler for how long the active phase lasts.
    Timed(RefCell<Sampler>),
    /// Per-tick Bernoulli failure test at 1-unit granularity.
    Bernoulli { p: f64 },
}

/// Disruption parameters for one Node or Link.
pub struct DisruptionConfig {
    trigger: Trigger,
    recovery_time: RefCell<Sampler>,
}

impl DisruptionConfig {
    pub fn timed(disrupt_time: Sampler, recovery_time: Sampler) -> Self {
        DisruptionConfig {
            trigger: Trigger::Timed(RefCell::new(disrupt_time)),
            recovery_time: RefCell::new(recovery_time),
        }
    }

    pub fn bernoulli(p: f64, recovery_time: Sampler) -> Self {
        DisruptionConfig {
            trigger: Trigger::Bernoulli { p },
            recovery_time: RefCell::new(recovery_time),
        }
    }
}

/// Spawn the supervisor process for `availability`, driven by `rng`.
pub fn spawn(ctx: &SimContext, availability: Availability, config: DisruptionConfig, rng: SharedRng) {
    ctx.spawn(move |ctx| async move {
        loop {
            match &config.trigger {
                Trigger::Timed(sampler) => {
                    let dt = sampler.borrow_mut().sample_non_negative(&mut *rng.borrow_mut())?;
                    ctx.timeout(dt).await?;
                    availability.set_active(false);
                }
                Trigger::Bernoulli { p } => loop {
                    ctx.timeout(1.0).await?;
                    let roll: f64 = rng.borrow_mut().gen();
                    if roll < *p {
                        availability.set_active(false);
                        break;
                    }
                },
            }

            let recovery = config.recovery_time.borrow_mut().sample_positive(&mut *rng.borrow_mut())?;
            ctx.timeout(recovery).await?;
            availability.set_active(true);
        }
    });
}
