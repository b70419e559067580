//! InventoryNode (part of C6): a reactive node that buys a Product at
//! `buy_price` from an upstream link and sells it at `sell_price`
//! downstream. Covers the `distributor`/`warehouse`/`retailer`/`store`
//! node types from the configuration enumeration (§6) — they differ
//! only in labeling, not in process shape.

use crate::availability::Availability;
use crate::core_types::NodeId;
use crate::entities::Product;
use crate::inventory::Inventory;
use crate::link::Link;
use crate::policy::{replenishment, ReplenishmentPolicy, SupplierSelection};
use crate::scheduler::SimContext;
use crate::stats::Stats;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub struct InventoryNode {
    pub id: NodeId,
    pub availability: Availability,
    pub stats: Rc<RefCell<Stats>>,
    pub inventory: Inventory,
    pub product: Rc<Product>,
    pub suppliers: Rc<RefCell<Vec<Link>>>,
    pub selection: Rc<SupplierSelection>,
    pub ongoing_order: Rc<Cell<bool>>,
    pub policy: ReplenishmentPolicy,
}

impl InventoryNode {
    pub fn new(
        id: NodeId,
        inventory: Inventory,
        product: Rc<Product>,
        selection: SupplierSelection,
        policy: ReplenishmentPolicy,
    ) -> Self {
        InventoryNode {
            id,
            availability: Availability::new(true),
            stats: Rc::new(RefCell::new(Stats::new())),
            inventory,
            product,
            suppliers: Rc::new(RefCell::new(Vec::new())),
            selection: Rc::new(selection),
            ongoing_order: Rc::new(Cell::new(false)),
            policy,
        }
    }

    /// Register an incoming link (this node is its sink). Links
    /// register themselves on construction; the node keeps the flat
    /// list supplier-selection scans (§3/§9).
    pub fn add_supplier(&self, link: Link) {
        self.suppliers.borrow_mut().push(link);
    }

    /// Spawn the replenishment loop and, if the finished-goods
    /// inventory is perishable, its expiry sweep.
    pub fn spawn(&self, ctx: &SimContext) {
        self.inventory.spawn_expiry_sweep(ctx);

        let suppliers = self.suppliers.clone();
        let selection = self.selection.clone();
        let sink_inventory = self.inventory.clone();
        let sink_stats = self.stats.clone();
        let ongoing_order = self.ongoing_order.clone();

        replenishment::spawn(
            ctx,
            self.inventory.clone(),
            self.ongoing_order.clone(),
            self.policy,
            move |ctx, qty| {
                let suppliers = suppliers.borrow();
                let link = match selection.choose(&suppliers, qty) {
                    Ok(id) => suppliers.iter().find(|l| l.id() == id).cloned(),
                    Err(_) => None,
                };
                drop(suppliers);
                let Some(link) = link else {
                    ongoing_order.set(false);
                    return;
                };
                sink_stats.borrow_mut().record_replenishment_order(qty);
                spawn_order_processing(ctx, link, qty, sink_inventory.clone(), sink_stats.clone(), ongoing_order.clone());
            },
        );
    }
}

/// The order-processing coroutine described in §4.6: check the
/// source's availability and shortage, block on its `get`, delay by
/// the link's lead time, then deposit downstream (clipped to capacity,
/// preserving batch ages when both ends are perishable).
fn spawn_order_processing(
    ctx: &SimContext,
    link: Link,
    quantity: f64,
    sink_inventory: Inventory,
    sink_stats: Rc<RefCell<Stats>>,
    ongoing_order: Rc<Cell<bool>>,
) {
    ctx.spawn(move |ctx| async move {
        if !link.is_active() {
            ongoing_order.set(false);
            return Ok(());
        }

        let source_level = link.source_level();
        if source_level < quantity {
            let shortfall = (quantity - source_level).max(0.0);
            let mut source_stats = link.source_stats().borrow_mut();
            source_stats.record_shortage(shortfall);
            source_stats.record_backorder(quantity);
        }

        sink_stats.borrow_mut().add_transport_cost(link.transport_cost());
        let consumed = link.source_inventory().get(&ctx, quantity).await?;
        let delay = link.lead_time()?;
        ctx.timeout(delay).await?;

        let room = (sink_inventory.capacity() - sink_inventory.level()).max(0.0);
        let to_put = quantity.min(room);
        if to_put > 0.0 {
            if sink_inventory.is_perishable() && link.source_inventory().is_perishable() {
                let mut remaining = to_put;
                for (manufacture_time, qty) in consumed {
                    if remaining <= 0.0 {
                        break;
                    }
                    let put_qty = qty.min(remaining);
                    sink_inventory.put_at(&ctx, put_qty, manufacture_time).await?;
                    remaining -= put_qty;
                }
            } else {
                sink_inventory.put(&ctx, to_put).await?;
            }
        }
        sink_stats.borrow_mut().record_demand_fulfilled(1.0, to_put);
        ongoing_order.set(false);
        Ok(())
    });
}
