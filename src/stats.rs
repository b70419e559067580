//! Statistics (component C9): the per-node counter bundle updated on
//! domain events and rolled up at end of run (§4.9).

use crate::inventory::Inventory;
use serde::Serialize;

/// A counter paired as (orders, units) — e.g. "3 orders totalling 450
/// units". The `orders` half is monotonically non-decreasing for the
/// life of a run (§8 invariant 5).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PairedCounter {
    pub orders: f64,
    pub units: f64,
}

impl PairedCounter {
    fn add(&mut self, orders: f64, units: f64) {
        self.orders += orders;
        self.units += units;
    }
}

/// Per-node statistics. Explicit recording methods stand in for the
/// source's single dynamically-keyed `update_stats(**kwargs)` call —
/// one method per domain event keeps every call site type-checked.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Stats {
    pub demand_placed: PairedCounter,
    pub demand_fulfilled: PairedCounter,
    pub shortage: PairedCounter,
    pub backorder: PairedCounter,
    pub replenishment_orders: PairedCounter,
    pub extraction: PairedCounter,
    pub production: PairedCounter,
    pub transport_cost: f64,
    pub inventory_spend: f64,
    pub holding_cost: f64,
    pub mining_cost: f64,
    pub manufacturing_cost: f64,
    pub revenue: f64,
    pub level: f64,
    pub waste: f64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_demand_placed(&mut self, orders: f64, units: f64) {
        self.demand_placed.add(orders, units);
    }

    pub fn record_demand_fulfilled(&mut self, orders: f64, units: f64) {
        self.demand_fulfilled.add(orders, units);
    }

    pub fn record_shortage(&mut self, units: f64) {
        self.shortage.add(1.0, units);
    }

    pub fn record_backorder(&mut self, units: f64) {
        self.backorder.add(1.0, units);
    }

    pub fn record_replenishment_order(&mut self, units: f64) {
        self.replenishment_orders.add(1.0, units);
    }

    pub fn record_extraction(&mut self, units: f64) {
        self.extraction.add(1.0, units);
    }

    pub fn record_production(&mut self, units: f64) {
        self.production.add(1.0, units);
    }

    pub fn add_transport_cost(&mut self, amount: f64) {
        self.transport_cost += amount;
    }

    pub fn add_inventory_spend(&mut self, amount: f64) {
        self.inventory_spend += amount;
    }

    pub fn add_mining_cost(&mut self, amount: f64) {
        self.mining_cost += amount;
    }

    pub fn add_manufacturing_cost(&mut self, amount: f64) {
        self.manufacturing_cost += amount;
    }

    pub fn add_revenue(&mut self, amount: f64) {
        self.revenue += amount;
    }

    /// Pull the inventory-related fields (level, waste, carry cost)
    /// current as of `now` (§4.9: "pulled from the inventory on each
    /// update"). Also advances the inventory's own time-weighted
    /// bookkeeping so repeated resamples without intervening get/put
    /// activity still reflect elapsed holding cost.
    pub fn sync_from_inventory(&mut self, inventory: &Inventory, now: f64) {
        inventory.poll(now);
        self.level = inventory.level();
        self.waste = inventory.waste();
        self.holding_cost = inventory.carry_cost();
    }

    pub fn total_cost(&self) -> f64 {
        self.transport_cost
            + self.inventory_spend
            + self.holding_cost
            + self.mining_cost
            + self.manufacturing_cost
    }

    pub fn profit(&self) -> f64 {
        self.revenue - self.total_cost()
    }

    pub fn reset(&mut self) {
        *self = Stats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profit_is_revenue_minus_total_cost() {
        let mut stats = Stats::new();
        stats.add_revenue(500.0);
        stats.add_transport_cost(20.0);
        stats.holding_cost = 30.0;
        assert_eq!(stats.total_cost(), 50.0);
        assert_eq!(stats.profit(), 450.0);
    }

    #[test]
    fn reset_clears_every_field() {
        let mut stats = Stats::new();
        stats.record_shortage(5.0);
        stats.add_revenue(100.0);
        stats.reset();
        assert_eq!(stats.shortage, PairedCounter::default());
        assert_eq!(stats.revenue, 0.0);
    }

    #[test]
    fn orders_counter_only_ever_increases() {
        let mut stats = Stats::new();
        stats.record_replenishment_order(10.0);
        let first = stats.replenishment_orders.orders;
        stats.record_replenishment_order(5.0);
        assert!(stats.replenishment_orders.orders > first);
    }
}
