//! Network construction and the run driver (§6 external interfaces, C10).
//!
//! [`NetworkBuilder`] is the thin typed front door the out-of-scope
//! descriptor-to-entity builder would sit behind: it validates and wires
//! typed records, nothing more. Scalar catalog specs (atomic node/material
//! data with no closures) derive `serde::{Serialize, Deserialize}` so an
//! external loader can hydrate them from a config file; `Sampler`s are
//! boxed closures and are threaded through builder method arguments
//! directly rather than through a serializable record.
//!
//! Node construction has to happen in dependency order: a [`Link`]'s
//! source is a live node's inventory/stats handle, so the source must
//! already be registered before a link referencing it can be built. An
//! `InventoryNode`'s incoming links are appended to its supplier list
//! after construction (`add_supplier`); a `Manufacturer`'s raw-material
//! links are immutable fields set once at construction, so
//! [`NetworkBuilder::add_manufacturer`] takes its raw supply in the same
//! call rather than through a separate `add_link`.

use crate::core_types::{LinkId, NodeId, RawMaterialId};
use crate::disruption::{self, DisruptionConfig};
use crate::entities::{BomLine, Product, RawMaterial};
use crate::error::{SimError, ValidationError};
use crate::inventory::Inventory;
use crate::link::Link;
use crate::nodes::{Demand, DemandTarget, InventoryNode, Manufacturer, Supplier};
use crate::policy::{ReplenishmentPolicy, SupplierSelection};
use crate::sampler::{SharedRng, Sampler};
use crate::scheduler::{Scheduler, SimContext};
use crate::stats::{PairedCounter, Stats};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A raw material's immutable catalog fields (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMaterialSpec {
    pub id: u64,
    pub name: String,
    pub extraction_quantity: f64,
    pub extraction_time: f64,
    pub mining_cost: f64,
    pub unit_cost: f64,
}

impl RawMaterialSpec {
    fn build(&self) -> Result<RawMaterial, ValidationError> {
        RawMaterial::new(
            RawMaterialId(self.id),
            self.name.clone(),
            self.extraction_quantity,
            self.extraction_time,
            self.mining_cost,
            self.unit_cost,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BomLineSpec {
    pub material: u64,
    pub per_unit_quantity: f64,
}

/// A manufactured good's catalog fields (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSpec {
    pub name: String,
    pub manufacturing_cost: f64,
    pub manufacturing_time: f64,
    pub sell_price: f64,
    pub buy_price: f64,
    pub batch_size: f64,
    pub bill_of_materials: Vec<BomLineSpec>,
}

impl ProductSpec {
    fn build(&self) -> Result<Product, ValidationError> {
        let bom = self
            .bill_of_materials
            .iter()
            .map(|l| BomLine {
                material: RawMaterialId(l.material),
                per_unit_quantity: l.per_unit_quantity,
            })
            .collect();
        Product::new(
            self.name.clone(),
            self.manufacturing_cost,
            self.manufacturing_time,
            self.sell_price,
            self.buy_price,
            self.batch_size,
            bom,
        )
    }
}

/// One raw-material supply line for a Manufacturer: which material, from
/// which upstream node, at what transport cost and lead time. Not
/// serializable since `lead_time` is a boxed sampler closure.
pub struct RawSupplySpec {
    pub link_id: LinkId,
    pub material: RawMaterialId,
    pub source: NodeId,
    pub transport_cost: f64,
    pub lead_time: Sampler,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Supplier,
    Manufacturer,
    InventoryNode,
    Demand,
}

enum BuiltNode {
    Supplier(Supplier),
    Manufacturer(Manufacturer),
    InventoryNode(InventoryNode),
    Demand(Demand),
}

fn validate_policy(policy: &ReplenishmentPolicy) -> Result<(), ValidationError> {
    if let ReplenishmentPolicy::SS { s, s_cap, .. } = *policy {
        if s > s_cap {
            return Err(ValidationError::ReorderPointAboveOrderUpTo { s, s_cap });
        }
    }
    Ok(())
}

fn check_initial_level(level: f64, capacity: f64) -> Result<(), ValidationError> {
    if level > capacity {
        return Err(ValidationError::InitialLevelExceedsCapacity { level, capacity });
    }
    Ok(())
}

/// Builds a [`Network`] by validating and wiring typed construction
/// records (§6). Node processes are spawned onto a fresh [`Scheduler`]
/// at [`NetworkBuilder::build`] time; nothing runs until `simulate` drives
/// the clock forward.
pub struct NetworkBuilder {
    rng: SharedRng,
    node_kinds: FxHashMap<NodeId, NodeKind>,
    nodes: FxHashMap<NodeId, BuiltNode>,
    links: FxHashMap<LinkId, Link>,
    order: Vec<NodeId>,
    pending_disruptions: Vec<(crate::availability::Availability, DisruptionConfig)>,
    with_traces: bool,
}

impl NetworkBuilder {
    pub fn new(rng: SharedRng) -> Self {
        NetworkBuilder {
            rng,
            node_kinds: FxHashMap::default(),
            nodes: FxHashMap::default(),
            links: FxHashMap::default(),
            order: Vec::new(),
            pending_disruptions: Vec::new(),
            with_traces: false,
        }
    }

    /// Record an instantaneous level trace on every finite inventory
    /// created from this point on (§6 Outputs: "per-inventory
    /// instantaneous-level trace").
    pub fn with_level_traces(mut self) -> Self {
        self.with_traces = true;
        self
    }

    fn register_kind(&mut self, id: NodeId, kind: NodeKind) -> Result<(), ValidationError> {
        if self.node_kinds.contains_key(&id) {
            return Err(ValidationError::DuplicateNodeId(id.0));
        }
        self.node_kinds.insert(id, kind);
        Ok(())
    }

    fn source_handles(&self, id: NodeId) -> (Inventory, Rc<RefCell<Stats>>) {
        match self.nodes.get(&id).expect("node registered before use as a link source") {
            BuiltNode::Supplier(s) => (s.inventory.clone(), s.stats.clone()),
            BuiltNode::Manufacturer(m) => (m.inventory.clone(), m.stats.clone()),
            BuiltNode::InventoryNode(n) => (n.inventory.clone(), n.stats.clone()),
            BuiltNode::Demand(_) => unreachable!("Demand cannot be a link source; rejected earlier"),
        }
    }

    fn maybe_trace(&self, inventory: Inventory) -> Inventory {
        if self.with_traces {
            inventory.with_trace()
        } else {
            inventory
        }
    }

    pub fn add_infinite_supplier(&mut self, id: NodeId) -> Result<(), ValidationError> {
        self.register_kind(id, NodeKind::Supplier)?;
        self.nodes.insert(id, BuiltNode::Supplier(Supplier::infinite(id)));
        self.order.push(id);
        Ok(())
    }

    pub fn add_supplier(
        &mut self,
        id: NodeId,
        raw_material: RawMaterialSpec,
        capacity: f64,
        initial_level: f64,
    ) -> Result<(), ValidationError> {
        self.register_kind(id, NodeKind::Supplier)?;
        check_initial_level(initial_level, capacity)?;
        let rm = raw_material.build()?;
        self.nodes
            .insert(id, BuiltNode::Supplier(Supplier::finite(id, rm, capacity, initial_level)));
        self.order.push(id);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_inventory_node(
        &mut self,
        id: NodeId,
        product: ProductSpec,
        capacity: f64,
        initial_level: f64,
        holding_cost_rate: f64,
        shelf_life: Option<f64>,
        selection: SupplierSelection,
        policy: ReplenishmentPolicy,
    ) -> Result<(), ValidationError> {
        self.register_kind(id, NodeKind::InventoryNode)?;
        check_initial_level(initial_level, capacity)?;
        validate_policy(&policy)?;
        let product = Rc::new(product.build()?);
        let inventory = match shelf_life {
            Some(shelf_life) => Inventory::perishable(capacity, initial_level, holding_cost_rate, shelf_life),
            None => Inventory::non_perishable(capacity, initial_level, holding_cost_rate),
        };
        let inventory = self.maybe_trace(inventory);
        let node = InventoryNode::new(id, inventory, product, selection, policy);
        self.nodes.insert(id, BuiltNode::InventoryNode(node));
        self.order.push(id);
        Ok(())
    }

    /// Register a transport link from `source` to an `InventoryNode`
    /// sink. Manufacturer raw-material links are wired through
    /// [`NetworkBuilder::add_manufacturer`] instead, since a
    /// Manufacturer's `raw_links` is set once at construction.
    pub fn add_link(
        &mut self,
        link_id: LinkId,
        source: NodeId,
        sink: NodeId,
        transport_cost: f64,
        lead_time: Sampler,
    ) -> Result<(), ValidationError> {
        if self.links.contains_key(&link_id) {
            return Err(ValidationError::DuplicateLinkId(link_id.0));
        }
        let source_kind = *self.node_kinds.get(&source).ok_or(ValidationError::UnknownNode(source.0))?;
        if source_kind == NodeKind::Demand {
            return Err(ValidationError::DemandAsSource);
        }
        let sink_kind = *self.node_kinds.get(&sink).ok_or(ValidationError::UnknownNode(sink.0))?;
        match sink_kind {
            NodeKind::Supplier => return Err(ValidationError::SupplierAsSink),
            NodeKind::Demand => return Err(ValidationError::DemandAsSink(sink.0)),
            NodeKind::Manufacturer => return Err(ValidationError::ManufacturerSinkRequiresRawMaterialLink(sink.0)),
            NodeKind::InventoryNode => {}
        }

        let (source_inventory, source_stats) = self.source_handles(source);
        let link = Link::new(
            link_id,
            source,
            sink,
            transport_cost,
            lead_time,
            self.rng.clone(),
            source_inventory,
            source_stats,
        )?;
        self.links.insert(link_id, link.clone());
        if let Some(BuiltNode::InventoryNode(node)) = self.nodes.get(&sink) {
            node.add_supplier(link);
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_manufacturer(
        &mut self,
        id: NodeId,
        product: ProductSpec,
        materials: Vec<RawMaterialSpec>,
        raw_supply: Vec<RawSupplySpec>,
        capacity: f64,
        initial_level: f64,
        holding_cost_rate: f64,
        policy: ReplenishmentPolicy,
    ) -> Result<(), ValidationError> {
        self.register_kind(id, NodeKind::Manufacturer)?;
        check_initial_level(initial_level, capacity)?;
        validate_policy(&policy)?;
        let product = Rc::new(product.build()?);

        let mut material_map = HashMap::new();
        for spec in materials {
            let rm = spec.build()?;
            material_map.insert(rm.id, rm);
        }
        for line in &product.bill_of_materials {
            if !material_map.contains_key(&line.material) {
                return Err(ValidationError::UnknownRawMaterial(line.material.0));
            }
        }

        let mut raw_links = Vec::with_capacity(raw_supply.len());
        for supply in raw_supply {
            if self.links.contains_key(&supply.link_id) {
                return Err(ValidationError::DuplicateLinkId(supply.link_id.0));
            }
            if !product.bill_of_materials.iter().any(|l| l.material == supply.material) {
                return Err(ValidationError::UnknownRawMaterial(supply.material.0));
            }
            let source_kind = *self
                .node_kinds
                .get(&supply.source)
                .ok_or(ValidationError::UnknownNode(supply.source.0))?;
            if source_kind == NodeKind::Demand {
                return Err(ValidationError::DemandAsSource);
            }
            let (source_inventory, source_stats) = self.source_handles(supply.source);
            let link = Link::new(
                supply.link_id,
                supply.source,
                id,
                supply.transport_cost,
                supply.lead_time,
                self.rng.clone(),
                source_inventory,
                source_stats,
            )?;
            self.links.insert(supply.link_id, link.clone());
            raw_links.push((supply.material, link));
        }
        for line in &product.bill_of_materials {
            if !raw_links.iter().any(|(m, _)| *m == line.material) {
                return Err(ValidationError::NoIncomingLinkBeforeOrder(id.0));
            }
        }

        let inventory = self.maybe_trace(Inventory::non_perishable(capacity, initial_level, holding_cost_rate));
        let manufacturer = Manufacturer::new(id, inventory, product, Rc::new(material_map), raw_links, policy);
        self.nodes.insert(id, BuiltNode::Manufacturer(manufacturer));
        self.order.push(id);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_demand(
        &mut self,
        id: NodeId,
        target: NodeId,
        inter_arrival: Sampler,
        order_quantity: Sampler,
        lead_time: Sampler,
        tolerance: f64,
        min_split_ratio: f64,
        delivery_cost: f64,
    ) -> Result<(), ValidationError> {
        self.register_kind(id, NodeKind::Demand)?;
        let demand_target = match self.nodes.get(&target) {
            Some(BuiltNode::InventoryNode(n)) => DemandTarget::from_inventory_node(n),
            Some(BuiltNode::Manufacturer(m)) => DemandTarget::from_manufacturer(m),
            Some(_) => return Err(ValidationError::InvalidDemandTarget(target.0)),
            None => return Err(ValidationError::UnknownNode(target.0)),
        };
        let demand = Demand::new(
            id,
            demand_target,
            inter_arrival,
            order_quantity,
            lead_time,
            tolerance,
            min_split_ratio,
            delivery_cost,
            self.rng.clone(),
        )?;
        self.nodes.insert(id, BuiltNode::Demand(demand));
        self.order.push(id);
        Ok(())
    }

    /// Attach a disruption supervisor (§4.8) to a node's availability
    /// flag. Supervisors are spawned once [`NetworkBuilder::build`] runs.
    pub fn disrupt_node(&mut self, id: NodeId, config: DisruptionConfig) -> Result<(), ValidationError> {
        let availability = match self.nodes.get(&id) {
            Some(BuiltNode::Supplier(s)) => s.availability.clone(),
            Some(BuiltNode::Manufacturer(m)) => m.availability.clone(),
            Some(BuiltNode::InventoryNode(n)) => n.availability.clone(),
            Some(BuiltNode::Demand(_)) => return Err(ValidationError::NodeHasNoAvailability(id.0)),
            None => return Err(ValidationError::UnknownNode(id.0)),
        };
        self.pending_disruptions.push((availability, config));
        Ok(())
    }

    pub fn disrupt_link(&mut self, id: LinkId, config: DisruptionConfig) -> Result<(), ValidationError> {
        let link = self.links.get(&id).ok_or(ValidationError::UnknownLink(id.0))?;
        self.pending_disruptions.push((link.availability(), config));
        Ok(())
    }

    /// Finish construction: validate that every sink with a replenishment
    /// policy has at least one incoming link (§6), then spawn every
    /// node's process and every disruption supervisor onto a fresh
    /// scheduler.
    pub fn build(self) -> Result<Network, ValidationError> {
        for (id, node) in &self.nodes {
            if let BuiltNode::InventoryNode(n) = node {
                if n.suppliers.borrow().is_empty() {
                    return Err(ValidationError::NoIncomingLinkBeforeOrder(id.0));
                }
            }
        }

        let scheduler = Scheduler::new();
        let ctx = root_context(&scheduler);
        for id in &self.order {
            match self.nodes.get(id).expect("every order entry has a node") {
                BuiltNode::Supplier(s) => s.spawn(&ctx),
                BuiltNode::Manufacturer(m) => m.spawn(&ctx),
                BuiltNode::InventoryNode(n) => n.spawn(&ctx),
                BuiltNode::Demand(d) => d.spawn(&ctx),
            }
        }
        for (availability, config) in self.pending_disruptions {
            disruption::spawn(&ctx, availability, config, self.rng.clone());
        }

        tracing::info!(node_count = self.order.len(), link_count = self.links.len(), "network built");
        Ok(Network {
            scheduler,
            nodes: self.nodes,
            order: self.order,
        })
    }
}

fn root_context(scheduler: &Scheduler) -> SimContext {
    let mut ctx = None;
    scheduler.spawn(|c| {
        ctx = Some(c.clone());
        async move { Ok(()) }
    });
    ctx.expect("scheduler invokes the spawned closure synchronously")
}

/// The constructed, already-spawned network graph (§3 Lifecycles: "all
/// entities are constructed at network-build time ... and live for the
/// entire run"). Drive it forward with [`simulate`].
pub struct Network {
    scheduler: Scheduler,
    nodes: FxHashMap<NodeId, BuiltNode>,
    order: Vec<NodeId>,
}

impl Network {
    pub fn now(&self) -> f64 {
        self.scheduler.now()
    }

    pub fn node_stats(&self, id: NodeId) -> Option<Rc<RefCell<Stats>>> {
        match self.nodes.get(&id)? {
            BuiltNode::Supplier(s) => Some(s.stats.clone()),
            BuiltNode::Manufacturer(m) => Some(m.stats.clone()),
            BuiltNode::InventoryNode(n) => Some(n.stats.clone()),
            BuiltNode::Demand(_) => None,
        }
    }

    pub fn inventory_trace(&self, id: NodeId) -> Vec<(f64, f64)> {
        match self.nodes.get(&id) {
            Some(BuiltNode::Supplier(s)) => s.inventory.trace(),
            Some(BuiltNode::Manufacturer(m)) => m.inventory.trace(),
            Some(BuiltNode::InventoryNode(n)) => n.inventory.trace(),
            _ => Vec::new(),
        }
    }

    fn summarize(&self) -> NetworkSummary {
        let now = self.scheduler.now();
        let mut summary = NetworkSummary::default();
        for id in &self.order {
            let node = self.nodes.get(id).expect("every order entry has a node");
            let (inventory, stats, exclude_from_inventory_rollup) = match node {
                BuiltNode::Supplier(s) => (Some(&s.inventory), &s.stats, s.is_infinite()),
                BuiltNode::Manufacturer(m) => (Some(&m.inventory), &m.stats, false),
                BuiltNode::InventoryNode(n) => (Some(&n.inventory), &n.stats, false),
                BuiltNode::Demand(_) => continue,
            };
            if let Some(inventory) = inventory {
                stats.borrow_mut().sync_from_inventory(inventory, now);
            }
            let stats = stats.borrow();
            if !exclude_from_inventory_rollup {
                summary.total_inventory_level += stats.level;
            }
            summary.total_carry_cost += stats.holding_cost;
            summary.total_transport_cost += stats.transport_cost;
            summary.total_revenue += stats.revenue;
            summary.total_cost += stats.total_cost();
            accumulate_counters(&mut summary, &stats);
        }
        summary.total_profit = summary.total_revenue - summary.total_cost;
        summary.avg_cost_per_order = if summary.total_demand.orders > 0.0 {
            summary.total_cost / summary.total_demand.orders
        } else {
            0.0
        };
        summary.avg_cost_per_unit = if summary.total_demand.units > 0.0 {
            summary.total_cost / summary.total_demand.units
        } else {
            0.0
        };
        summary
    }
}

fn accumulate_counters(summary: &mut NetworkSummary, stats: &Stats) {
    summary.total_demand.orders += stats.demand_placed.orders;
    summary.total_demand.units += stats.demand_placed.units;
    summary.total_fulfillment.orders += stats.demand_fulfilled.orders;
    summary.total_fulfillment.units += stats.demand_fulfilled.units;
    summary.total_shortage.orders += stats.shortage.orders;
    summary.total_shortage.units += stats.shortage.units;
    summary.total_backorders.orders += stats.backorder.orders;
    summary.total_backorders.units += stats.backorder.units;
}

/// Network-level aggregates computed at end of run (§4.10). Infinite
/// suppliers are excluded from `total_inventory_level`.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct NetworkSummary {
    pub total_inventory_level: f64,
    pub total_carry_cost: f64,
    pub total_transport_cost: f64,
    pub total_revenue: f64,
    pub total_cost: f64,
    pub total_profit: f64,
    pub total_demand: PairedCounter,
    pub total_fulfillment: PairedCounter,
    pub total_shortage: PairedCounter,
    pub total_backorders: PairedCounter,
    pub avg_cost_per_order: f64,
    pub avg_cost_per_unit: f64,
}

/// The run driver (C10): advance `network`'s clock to `sim_time` and
/// return the network-level summary (§4.10). A no-op (with a logged
/// warning) if `sim_time` has already been reached or passed.
pub fn simulate(network: &mut Network, sim_time: f64) -> Result<NetworkSummary, SimError> {
    let now = network.scheduler.now();
    if sim_time <= now {
        tracing::warn!(sim_time, now, "simulate called with sim_time <= current time; no-op");
        return Ok(network.summarize());
    }
    tracing::info!(sim_time, "simulation run starting");
    network.scheduler.run_until(sim_time)?;
    tracing::info!(now = network.scheduler.now(), "simulation run finished");
    Ok(network.summarize())
}
