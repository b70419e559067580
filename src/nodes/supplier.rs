//! Supplier node process (part of C6): an infinite supplier runs no
//! behavior at all; a finite supplier extracts its raw material
//! autonomously into its own inventory (§4.6).

use crate::availability::Availability;
use crate::core_types::NodeId;
use crate::entities::RawMaterial;
use crate::inventory::Inventory;
use crate::scheduler::SimContext;
use crate::stats::Stats;
use std::cell::RefCell;
use std::rc::Rc;

pub struct Supplier {
    pub id: NodeId,
    pub availability: Availability,
    pub stats: Rc<RefCell<Stats>>,
    pub inventory: Inventory,
    pub raw_material: Option<RawMaterial>,
}

impl Supplier {
    pub fn infinite(id: NodeId) -> Self {
        Supplier {
            id,
            availability: Availability::new(true),
            stats: Rc::new(RefCell::new(Stats::new())),
            inventory: Inventory::infinite(),
            raw_material: None,
        }
    }

    pub fn finite(id: NodeId, raw_material: RawMaterial, capacity: f64, initial_level: f64) -> Self {
        Supplier {
            id,
            availability: Availability::new(true),
            stats: Rc::new(RefCell::new(Stats::new())),
            inventory: Inventory::non_perishable(capacity, initial_level, 0.0),
            raw_material: Some(raw_material),
        }
    }

    pub fn is_infinite(&self) -> bool {
        self.raw_material.is_none()
    }

    /// Spawn the extraction loop. A no-op for an infinite supplier.
    pub fn spawn(&self, ctx: &SimContext) {
        let Some(raw_material) = self.raw_material.clone() else {
            return;
        };
        let inventory = self.inventory.clone();
        let stats = self.stats.clone();
        ctx.spawn(move |ctx| async move {
            loop {
                let level = inventory.level();
                let capacity = inventory.capacity();
                if level < capacity {
                    let qty = raw_material.extraction_quantity.min(capacity - level);
                    ctx.timeout(raw_material.extraction_time).await?;
                    inventory.put(&ctx, qty).await?;
                    let mut stats = stats.borrow_mut();
                    stats.record_extraction(qty);
                    stats.add_mining_cost(raw_material.mining_cost * qty);
                } else {
                    ctx.timeout(1.0).await?;
                }
            }
        });
    }
}
