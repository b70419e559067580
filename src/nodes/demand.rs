//! Demand node process (part of C6): the customer generator and the
//! per-customer fulfillment process it spawns (§4.6).
//!
//! A Demand node holds no inventory of its own; it references exactly
//! one downstream target (an [`InventoryNode`] or a [`Manufacturer`])
//! and draws against that target's finished-goods inventory directly,
//! with no intervening Link — there is no "order dispatch", only a
//! customer walking up and buying (or not).

use crate::core_types::NodeId;
use crate::error::{SimError, ValidationError};
use crate::inventory::Inventory;
use crate::sampler::{SharedRng, Sampler};
use crate::scheduler::SimContext;
use crate::stats::Stats;
use std::cell::RefCell;
use std::rc::Rc;

use super::inventory_node::InventoryNode;
use super::manufacturer::Manufacturer;

/// The inventory, stats, and selling price a Demand node draws against.
/// Built from whichever node type is the demand target; Demand itself
/// never distinguishes the two past construction.
#[derive(Clone)]
pub struct DemandTarget {
    pub inventory: Inventory,
    pub stats: Rc<RefCell<Stats>>,
    pub sell_price: f64,
}

impl DemandTarget {
    pub fn from_inventory_node(node: &InventoryNode) -> Self {
        DemandTarget {
            inventory: node.inventory.clone(),
            stats: node.stats.clone(),
            sell_price: node.product.sell_price,
        }
    }

    pub fn from_manufacturer(node: &Manufacturer) -> Self {
        DemandTarget {
            inventory: node.inventory.clone(),
            stats: node.stats.clone(),
            sell_price: node.product.sell_price,
        }
    }
}

pub struct Demand {
    pub id: NodeId,
    target: DemandTarget,
    inter_arrival: Rc<RefCell<Sampler>>,
    order_quantity: Rc<RefCell<Sampler>>,
    lead_time: Rc<RefCell<Sampler>>,
    tolerance: f64,
    min_split_ratio: f64,
    delivery_cost: f64,
    rng: SharedRng,
    customers_spawned: Rc<std::cell::Cell<u64>>,
}

impl Demand {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: NodeId,
        target: DemandTarget,
        inter_arrival: Sampler,
        order_quantity: Sampler,
        lead_time: Sampler,
        tolerance: f64,
        min_split_ratio: f64,
        delivery_cost: f64,
        rng: SharedRng,
    ) -> Result<Self, ValidationError> {
        if tolerance < 0.0 {
            return Err(ValidationError::MustBeNonNegative {
                field: "tolerance",
                value: tolerance,
            });
        }
        if !(min_split_ratio > 0.0 && min_split_ratio <= 1.0) {
            return Err(ValidationError::MustBePositive {
                field: "min_split_ratio (expected 0 < r <= 1)",
                value: min_split_ratio,
            });
        }
        if delivery_cost < 0.0 {
            return Err(ValidationError::MustBeNonNegative {
                field: "delivery_cost",
                value: delivery_cost,
            });
        }
        Ok(Demand {
            id,
            target,
            inter_arrival: Rc::new(RefCell::new(inter_arrival)),
            order_quantity: Rc::new(RefCell::new(order_quantity)),
            lead_time: Rc::new(RefCell::new(lead_time)),
            tolerance,
            min_split_ratio,
            delivery_cost,
            rng,
            customers_spawned: Rc::new(std::cell::Cell::new(0)),
        })
    }

    pub fn customers_spawned(&self) -> u64 {
        self.customers_spawned.get()
    }

    /// Spawn the customer generator loop described in §4.6: sample
    /// inter-arrival and order quantity, spawn a customer process, wait,
    /// repeat forever.
    pub fn spawn(&self, ctx: &SimContext) {
        let target = self.target.clone();
        let tolerance = self.tolerance;
        let min_split_ratio = self.min_split_ratio;
        let delivery_cost = self.delivery_cost;
        let lead_time = self.lead_time.clone();
        let rng = self.rng.clone();
        let inter_arrival = self.inter_arrival.clone();
        let order_quantity = self.order_quantity.clone();
        let counter = self.customers_spawned.clone();

        ctx.spawn(move |ctx| async move {
            loop {
                let inter = {
                    let mut s = inter_arrival.borrow_mut();
                    let mut rng_ref = rng.borrow_mut();
                    s.sample_non_negative(&mut *rng_ref)?
                };
                let qty = {
                    let mut s = order_quantity.borrow_mut();
                    let mut rng_ref = rng.borrow_mut();
                    s.sample_positive(&mut *rng_ref)?
                };
                counter.set(counter.get() + 1);
                spawn_customer(
                    &ctx,
                    target.clone(),
                    qty,
                    tolerance,
                    min_split_ratio,
                    delivery_cost,
                    lead_time.clone(),
                    rng.clone(),
                );
                ctx.timeout(inter).await?;
            }
        });
    }
}

#[allow(clippy::too_many_arguments)]
async fn fulfill(
    ctx: &SimContext,
    target: &DemandTarget,
    qty: f64,
    delivery_cost: f64,
    lead_time: &Rc<RefCell<Sampler>>,
    rng: &SharedRng,
) -> Result<(), SimError> {
    target.stats.borrow_mut().add_transport_cost(delivery_cost);
    target.inventory.get(ctx, qty).await?;
    let delay = {
        let mut s = lead_time.borrow_mut();
        let mut rng_ref = rng.borrow_mut();
        s.sample_non_negative(&mut *rng_ref)?
    };
    ctx.timeout(delay).await?;
    let mut stats = target.stats.borrow_mut();
    stats.record_demand_fulfilled(1.0, qty);
    stats.add_revenue(target.sell_price * qty);
    Ok(())
}

/// The per-customer process described in §4.6: full fulfillment if
/// stock covers the order outright, a wait-and-split loop bounded by
/// `tolerance` if some tolerance is configured, else an immediate
/// shortage.
#[allow(clippy::too_many_arguments)]
fn spawn_customer(
    ctx: &SimContext,
    target: DemandTarget,
    quantity: f64,
    tolerance: f64,
    min_split_ratio: f64,
    delivery_cost: f64,
    lead_time: Rc<RefCell<Sampler>>,
    rng: SharedRng,
) {
    ctx.spawn(move |ctx| async move {
        target.stats.borrow_mut().record_demand_placed(1.0, quantity);
        let level = target.inventory.level();

        if level >= quantity {
            return fulfill(&ctx, &target, quantity, delivery_cost, &lead_time, &rng).await;
        }

        if tolerance > 0.0 {
            let partial = (quantity * min_split_ratio).floor();
            let mut remaining = quantity;
            let mut waited = 0.0;
            while remaining > 0.0 && waited < tolerance {
                let level = target.inventory.level();
                if level >= remaining {
                    fulfill(&ctx, &target, remaining, delivery_cost, &lead_time, &rng).await?;
                    remaining = 0.0;
                } else if partial > 0.0 && level >= partial {
                    fulfill(&ctx, &target, partial, delivery_cost, &lead_time, &rng).await?;
                    remaining -= partial;
                } else {
                    target.stats.borrow_mut().record_shortage((remaining - level).max(0.0));
                }
                let step = 1.0_f64.min(tolerance - waited);
                ctx.timeout(step).await?;
                waited += step;
            }
        } else {
            let shortfall = quantity - level;
            target.stats.borrow_mut().record_shortage(shortfall);
        }
        Ok(())
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::shared_rng_from_seed;
    use crate::scheduler::Scheduler;

    fn target(level: f64, capacity: f64, sell_price: f64) -> DemandTarget {
        DemandTarget {
            inventory: Inventory::non_perishable(capacity, level, 0.0),
            stats: Rc::new(RefCell::new(Stats::new())),
            sell_price,
        }
    }

    fn test_ctx(sched: &Scheduler) -> SimContext {
        let mut ctx = None;
        sched.spawn(|c| {
            ctx = Some(c.clone());
            async move { Ok(()) }
        });
        ctx.unwrap()
    }

    #[test]
    fn fully_stocked_target_fulfills_every_customer() {
        let sched = Scheduler::new();
        let ctx = test_ctx(&sched);
        let target = target(f64::INFINITY, f64::INFINITY, 10.0);
        let stats = target.stats.clone();
        let demand = Demand::new(
            NodeId(1),
            target,
            Sampler::constant("ia", 1.0),
            Sampler::constant("oq", 5.0),
            Sampler::constant("lt", 0.0),
            0.0,
            1.0,
            0.0,
            shared_rng_from_seed(0),
        )
        .unwrap();
        demand.spawn(&ctx);
        sched.run_until(10.0).unwrap();
        assert_eq!(stats.borrow().demand_placed.orders, 10.0);
        assert_eq!(stats.borrow().demand_fulfilled.units, 50.0);
        assert_eq!(stats.borrow().shortage.units, 0.0);
    }

    #[test]
    fn no_tolerance_customer_records_full_shortage_on_empty_stock() {
        let sched = Scheduler::new();
        let ctx = test_ctx(&sched);
        let target = target(0.0, 100.0, 10.0);
        let stats = target.stats.clone();
        let demand = Demand::new(
            NodeId(1),
            target,
            Sampler::constant("ia", 1.0),
            Sampler::constant("oq", 5.0),
            Sampler::constant("lt", 0.0),
            0.0,
            1.0,
            0.0,
            shared_rng_from_seed(0),
        )
        .unwrap();
        demand.spawn(&ctx);
        sched.run_until(3.0).unwrap();
        assert_eq!(stats.borrow().demand_fulfilled.units, 0.0);
        assert!(stats.borrow().shortage.units > 0.0);
    }

    #[test]
    fn rejects_min_split_ratio_out_of_range() {
        let err = Demand::new(
            NodeId(1),
            target(0.0, 10.0, 1.0),
            Sampler::constant("ia", 1.0),
            Sampler::constant("oq", 1.0),
            Sampler::constant("lt", 0.0),
            5.0,
            1.5,
            0.0,
            shared_rng_from_seed(0),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::MustBePositive { .. }));
    }
}
