//! Manufacturer node process (part of C6): consumes raw materials per
//! a bill of materials to produce a finished good, and places raw-
//! material reorders through its own replenishment policy (§4.6).
//!
//! The policy's `level`/`quantity` are expressed in *producible
//! batches* of the finished good rather than raw units: the generic
//! (s,S)/(R,Q)/periodic predicate (C4) is reused unchanged, fed a
//! synthetic level equal to `min_i(raw_i / bom_i)` — the number of
//! batches the current raw stock can still support. This was not
//! specified explicitly and is recorded as a resolved open question in
//! the design notes.

use crate::availability::Availability;
use crate::core_types::{NodeId, RawMaterialId};
use crate::entities::{Product, RawMaterial};
use crate::event::SimEvent;
use crate::inventory::Inventory;
use crate::link::Link;
use crate::policy::ReplenishmentPolicy;
use crate::scheduler::{race, SimContext};
use crate::stats::Stats;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

pub struct Manufacturer {
    pub id: NodeId,
    pub availability: Availability,
    pub stats: Rc<RefCell<Stats>>,
    pub inventory: Inventory,
    pub product: Rc<Product>,
    pub materials: Rc<HashMap<RawMaterialId, RawMaterial>>,
    pub raw_levels: Rc<RefCell<HashMap<RawMaterialId, f64>>>,
    pub raw_links: Rc<Vec<(RawMaterialId, Link)>>,
    pub ongoing_order: Rc<Cell<bool>>,
    pub policy: ReplenishmentPolicy,
    raw_drop_event: SimEvent,
}

impl Manufacturer {
    pub fn new(
        id: NodeId,
        inventory: Inventory,
        product: Rc<Product>,
        materials: Rc<HashMap<RawMaterialId, RawMaterial>>,
        raw_links: Vec<(RawMaterialId, Link)>,
        policy: ReplenishmentPolicy,
    ) -> Self {
        let raw_levels = Rc::new(RefCell::new(
            product.bill_of_materials.iter().map(|l| (l.material, 0.0)).collect(),
        ));
        Manufacturer {
            id,
            availability: Availability::new(true),
            stats: Rc::new(RefCell::new(Stats::new())),
            inventory,
            product,
            materials,
            raw_levels,
            raw_links: Rc::new(raw_links),
            ongoing_order: Rc::new(Cell::new(false)),
            policy,
            raw_drop_event: SimEvent::new(),
        }
    }

    pub fn spawn(&self, ctx: &SimContext) {
        self.inventory.spawn_expiry_sweep(ctx);
        self.spawn_production_loop(ctx);
        self.spawn_reorder_loop(ctx);
    }

    fn spawn_production_loop(&self, ctx: &SimContext) {
        let inventory = self.inventory.clone();
        let product = self.product.clone();
        let raw_levels = self.raw_levels.clone();
        let stats = self.stats.clone();
        let drop_event = self.raw_drop_event.clone();

        ctx.spawn(move |ctx| async move {
            loop {
                ctx.timeout(1.0).await?;
                let batches_available = product
                    .bill_of_materials
                    .iter()
                    .map(|line| {
                        (raw_levels.borrow().get(&line.material).copied().unwrap_or(0.0) / line.per_unit_quantity)
                            .floor()
                    })
                    .fold(f64::INFINITY, f64::min);
                let headroom = inventory.capacity() - inventory.level();
                let producible = product.batch_size.min(batches_available).min(headroom).max(0.0);
                if producible > 0.0 {
                    {
                        let mut levels = raw_levels.borrow_mut();
                        for line in &product.bill_of_materials {
                            *levels.get_mut(&line.material).unwrap() -= line.per_unit_quantity * producible;
                        }
                    }
                    drop_event.fire();
                    ctx.timeout(product.manufacturing_time).await?;
                    inventory.put_at(&ctx, producible, ctx.now()).await?;
                    let mut stats = stats.borrow_mut();
                    stats.record_production(producible);
                    stats.add_manufacturing_cost(product.manufacturing_cost * producible);
                }
            }
        });
    }

    fn spawn_reorder_loop(&self, ctx: &SimContext) {
        let this_producible = {
            let raw_levels = self.raw_levels.clone();
            let bom = self.product.bill_of_materials.clone();
            move || {
                let levels = raw_levels.borrow();
                bom.iter()
                    .map(|line| levels.get(&line.material).copied().unwrap_or(0.0) / line.per_unit_quantity)
                    .fold(f64::INFINITY, f64::min)
            }
        };
        let policy = self.policy;
        let ongoing_order = self.ongoing_order.clone();
        let drop_event = self.raw_drop_event.clone();
        let raw_links = self.raw_links.clone();
        let materials = self.materials.clone();
        let raw_levels = self.raw_levels.clone();
        let stats = self.stats.clone();

        ctx.spawn(move |ctx| async move {
            let first_delay = policy.first_review_delay();
            if first_delay > 0.0 {
                ctx.timeout(first_delay).await?;
            }
            loop {
                let level = this_producible();
                if let Some(target_batches) = policy.decide(level, ongoing_order.get()) {
                    ongoing_order.set(true);
                    let remaining = Rc::new(Cell::new(raw_links.len()));
                    for (material, link) in raw_links.iter() {
                        let per_unit = materials.get(material).map(|m| m.unit_cost).unwrap_or(0.0);
                        let order_qty = target_batches.max(0.0);
                        spawn_raw_order(
                            &ctx,
                            link.clone(),
                            order_qty,
                            *material,
                            per_unit,
                            raw_levels.clone(),
                            stats.clone(),
                            ongoing_order.clone(),
                            remaining.clone(),
                        );
                    }
                }
                if !policy.is_event_driven() {
                    let period = policy.period().expect("periodic policy always has a period");
                    ctx.timeout(period).await?;
                    continue;
                }
                match policy.period() {
                    Some(period) => {
                        race(ctx.timeout(period), drop_event.wait()).await?;
                    }
                    None => {
                        drop_event.wait().await?;
                    }
                }
                drop_event.reset();
            }
        });
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_raw_order(
    ctx: &SimContext,
    link: Link,
    quantity: f64,
    material: RawMaterialId,
    unit_cost: f64,
    raw_levels: Rc<RefCell<HashMap<RawMaterialId, f64>>>,
    stats: Rc<RefCell<Stats>>,
    ongoing_order: Rc<Cell<bool>>,
    remaining: Rc<Cell<usize>>,
) {
    ctx.spawn(move |ctx| async move {
        let finish = || {
            let left = remaining.get().saturating_sub(1);
            remaining.set(left);
            if left == 0 {
                ongoing_order.set(false);
            }
        };
        if quantity <= 0.0 || !link.is_active() {
            finish();
            return Ok(());
        }

        let source_level = link.source_level();
        if source_level < quantity {
            let shortfall = (quantity - source_level).max(0.0);
            let mut source_stats = link.source_stats().borrow_mut();
            source_stats.record_shortage(shortfall);
            source_stats.record_backorder(quantity);
        }

        {
            let mut stats = stats.borrow_mut();
            stats.add_transport_cost(link.transport_cost());
            stats.record_replenishment_order(quantity);
        }
        link.source_inventory().get(&ctx, quantity).await?;
        let delay = link.lead_time()?;
        ctx.timeout(delay).await?;

        *raw_levels.borrow_mut().entry(material).or_insert(0.0) += quantity;
        stats.borrow_mut().add_inventory_spend(unit_cost * quantity);
        finish();
        Ok(())
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::BomLine;
    use crate::sampler::{shared_rng_from_seed, Sampler};
    use crate::scheduler::Scheduler;

    fn test_ctx(sched: &Scheduler) -> SimContext {
        let mut ctx = None;
        sched.spawn(|c| {
            ctx = Some(c.clone());
            async move { Ok(()) }
        });
        ctx.unwrap()
    }

    fn test_product() -> Rc<Product> {
        Rc::new(
            Product::new(
                "widget",
                1.0,
                2.0,
                50.0,
                0.0,
                10.0,
                vec![BomLine {
                    material: RawMaterialId(1),
                    per_unit_quantity: 2.0,
                }],
            )
            .unwrap(),
        )
    }

    fn test_materials() -> Rc<HashMap<RawMaterialId, RawMaterial>> {
        let mut map = HashMap::new();
        map.insert(
            RawMaterialId(1),
            RawMaterial::new(RawMaterialId(1), "ore", 100.0, 1.0, 1.0, 1.0).unwrap(),
        );
        Rc::new(map)
    }

    #[test]
    fn production_consumes_raw_stock_and_fills_finished_goods() {
        let sched = Scheduler::new();
        let ctx = test_ctx(&sched);
        let product = test_product();
        let materials = test_materials();
        let ore_inventory = Inventory::non_perishable(f64::INFINITY, 1000.0, 0.0);
        let rng = shared_rng_from_seed(0);
        let ore_link = Link::new(
            crate::core_types::LinkId(1),
            NodeId(1),
            NodeId(2),
            1.0,
            Sampler::constant("lt", 0.0),
            rng,
            ore_inventory,
            Rc::new(RefCell::new(Stats::new())),
        )
        .unwrap();

        let manufacturer = Manufacturer::new(
            NodeId(2),
            Inventory::non_perishable(1000.0, 0.0, 0.0),
            product,
            materials,
            vec![(RawMaterialId(1), ore_link)],
            ReplenishmentPolicy::Periodic {
                period: 1.0,
                quantity: 40.0,
                first_review_delay: 0.0,
            },
        );
        manufacturer.spawn(&ctx);
        sched.run_until(6.0).unwrap();

        assert!(manufacturer.inventory.level() > 0.0);
        assert!(manufacturer.stats.borrow().production.units > 0.0);
    }

    #[test]
    fn production_stalls_without_raw_stock() {
        let sched = Scheduler::new();
        let ctx = test_ctx(&sched);
        let product = test_product();
        let materials = test_materials();
        let ore_inventory = Inventory::non_perishable(100.0, 0.0, 0.0);
        let rng = shared_rng_from_seed(0);
        let ore_link = Link::new(
            crate::core_types::LinkId(1),
            NodeId(1),
            NodeId(2),
            1.0,
            Sampler::constant("lt", 0.0),
            rng,
            ore_inventory,
            Rc::new(RefCell::new(Stats::new())),
        )
        .unwrap();

        let manufacturer = Manufacturer::new(
            NodeId(2),
            Inventory::non_perishable(1000.0, 0.0, 0.0),
            product,
            materials,
            vec![(RawMaterialId(1), ore_link)],
            ReplenishmentPolicy::Periodic {
                period: 1000.0,
                quantity: 0.0,
                first_review_delay: 1000.0,
            },
        );
        manufacturer.spawn(&ctx);
        sched.run_until(3.0).unwrap();

        assert_eq!(manufacturer.inventory.level(), 0.0);
    }
}
