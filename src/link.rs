//! Link (component C7): a directed, stateless transport edge between
//! two nodes with a stochastic lead time, a per-shipment transport
//! cost charged at dispatch, and its own disruption lifecycle (§4.7).
//!
//! Holds a direct handle to its source's inventory and stats rather
//! than an id lookup: the order-processing coroutine (§4.6) needs to
//! call `get` on the upstream inventory and credit shortages to the
//! upstream node's own stats, and both are cheap `Rc` clones already
//! owned by the source node.

use crate::availability::Availability;
use crate::core_types::{LinkId, NodeId};
use crate::error::{SimError, ValidationError};
use crate::inventory::Inventory;
use crate::sampler::{SharedRng, Sampler};
use crate::stats::Stats;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone)]
pub struct Link(Rc<LinkInner>);

struct LinkInner {
    id: LinkId,
    source: NodeId,
    sink: NodeId,
    transport_cost: f64,
    lead_time: RefCell<Sampler>,
    source_inventory: Inventory,
    source_stats: Rc<RefCell<Stats>>,
    rng: SharedRng,
    availability: Availability,
}

impl Link {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: LinkId,
        source: NodeId,
        sink: NodeId,
        transport_cost: f64,
        lead_time: Sampler,
        rng: SharedRng,
        source_inventory: Inventory,
        source_stats: Rc<RefCell<Stats>>,
    ) -> Result<Self, ValidationError> {
        if source == sink {
            return Err(ValidationError::SourceEqualsSink);
        }
        if transport_cost <= 0.0 {
            return Err(ValidationError::MustBePositive {
                field: "transport_cost",
                value: transport_cost,
            });
        }
        Ok(Link(Rc::new(LinkInner {
            id,
            source,
            sink,
            transport_cost,
            lead_time: RefCell::new(lead_time),
            source_inventory,
            source_stats,
            rng,
            availability: Availability::new(true),
        })))
    }

    pub fn id(&self) -> LinkId {
        self.0.id
    }

    pub fn source(&self) -> NodeId {
        self.0.source
    }

    pub fn sink(&self) -> NodeId {
        self.0.sink
    }

    pub fn transport_cost(&self) -> f64 {
        self.0.transport_cost
    }

    pub fn source_level(&self) -> f64 {
        self.0.source_inventory.level()
    }

    pub fn source_inventory(&self) -> &Inventory {
        &self.0.source_inventory
    }

    pub fn source_stats(&self) -> &Rc<RefCell<Stats>> {
        &self.0.source_stats
    }

    pub fn is_active(&self) -> bool {
        self.0.availability.is_active()
    }

    pub fn availability(&self) -> Availability {
        self.0.availability.clone()
    }

    /// Draw a lead-time sample for the real shipment delay (§4.6/§4.7).
    pub fn lead_time(&self) -> Result<f64, SimError> {
        let mut rng = self.0.rng.borrow_mut();
        Ok(self.0.lead_time.borrow_mut().sample_non_negative(&mut rng)?)
    }

    /// A lead-time draw used only to compare links in the `fastest`
    /// supplier-selection rule (§4.5). A misbehaving sampler is treated
    /// as "infinitely slow" rather than aborting a selection decision;
    /// the same sampler still raises its real error on the actual
    /// shipment draw.
    ///
    /// Draws from a scratch RNG seeded from this link's id rather than
    /// the shared run RNG: comparing N candidate links would otherwise
    /// burn N draws off the shared sequence per selection decision,
    /// desyncing every sampler downstream of it by an amount that
    /// depends on how many suppliers happen to be in the running.
    /// Seeding from the link id keeps the preview stable across calls
    /// instead of drifting with it.
    pub fn sample_lead_time_preview(&self) -> f64 {
        let mut scratch = ChaCha8Rng::seed_from_u64(self.0.id.0);
        self.0
            .lead_time
            .borrow_mut()
            .sample_non_negative(&mut scratch)
            .unwrap_or(f64::INFINITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::shared_rng_from_seed;

    fn test_inventory(level: f64) -> Inventory {
        Inventory::non_perishable(1000.0, level, 0.0)
    }

    #[test]
    fn rejects_source_equals_sink() {
        let rng = shared_rng_from_seed(0);
        let err = Link::new(
            LinkId(1),
            NodeId(1),
            NodeId(1),
            1.0,
            Sampler::constant("lt", 1.0),
            rng,
            test_inventory(0.0),
            Rc::new(RefCell::new(Stats::new())),
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::SourceEqualsSink);
    }

    #[test]
    fn lead_time_is_non_negative_sample() {
        let rng = shared_rng_from_seed(0);
        let link = Link::new(
            LinkId(1),
            NodeId(1),
            NodeId(2),
            1.0,
            Sampler::constant("lt", 2.0),
            rng,
            test_inventory(100.0),
            Rc::new(RefCell::new(Stats::new())),
        )
        .unwrap();
        assert_eq!(link.lead_time().unwrap(), 2.0);
        assert_eq!(link.source_level(), 100.0);
    }

    #[test]
    fn starts_active_and_can_be_flipped() {
        let rng = shared_rng_from_seed(0);
        let link = Link::new(
            LinkId(1),
            NodeId(1),
            NodeId(2),
            1.0,
            Sampler::constant("lt", 2.0),
            rng,
            test_inventory(0.0),
            Rc::new(RefCell::new(Stats::new())),
        )
        .unwrap();
        assert!(link.is_active());
        link.availability().set_active(false);
        assert!(!link.is_active());
    }
}
