//! A discrete-event supply-chain simulator.
//!
//! Virtual time advances through a small single-threaded executor
//! purpose-built for simulation (component C1, [`scheduler`]) rather
//! than a general-purpose async runtime: every "process" is an ordinary
//! `async fn` cooperating through four wait primitives — timeout
//! ([`scheduler::Timeout`]), container blocking ([`container`]),
//! one-shot events ([`event`]), and inventory gets/puts ([`inventory`]).
//!
//! # Modules
//!
//! - [`core_types`] - node/link/material/product id newtypes
//! - [`error`] - the construction/runtime/scheduler error taxonomy
//! - [`scheduler`] - the virtual-time executor and its wait primitives
//! - [`event`] - one-shot level-triggered events
//! - [`container`] - a generic FIFO-blocking get/put container
//! - [`availability`] - shared active/inactive flag for nodes and links
//! - [`sampler`] - stochastic draw sources and the shared run RNG
//! - [`entities`] - immutable raw-material/product catalog records
//! - [`inventory`] - holding cost, perishable batches, drop events
//! - [`link`] - transport edges between nodes
//! - [`disruption`] - availability supervisors
//! - [`stats`] - per-node counters and cost/revenue accrual
//! - [`policy`] - replenishment policies and supplier selection
//! - [`nodes`] - the four node process shapes
//! - [`network`] - typed network construction and the run driver

pub mod availability;
pub mod container;
pub mod core_types;
pub mod disruption;
pub mod entities;
pub mod error;
pub mod event;
pub mod inventory;
pub mod link;
pub mod network;
pub mod nodes;
pub mod policy;
pub mod sampler;
pub mod scheduler;
pub mod stats;

pub use core_types::{LinkId, NodeId, ProductId, RawMaterialId, SeqNum};
pub use disruption::DisruptionConfig;
pub use entities::{BomLine, Product, RawMaterial};
pub use error::{SamplerError, SimError, SimResult, ValidationError};
pub use inventory::Inventory;
pub use link::Link;
pub use network::{
    BomLineSpec, Network, NetworkBuilder, NetworkSummary, ProductSpec, RawMaterialSpec, RawSupplySpec, simulate,
};
pub use nodes::{Demand, DemandTarget, InventoryNode, Manufacturer, Supplier};
pub use policy::{ReplenishmentPolicy, SelectionMode, SelectionRule, SupplierSelection};
pub use sampler::{Sampler, SharedRng, shared_rng_from_seed};
pub use scheduler::{Scheduler, SimContext};
pub use stats::{PairedCounter, Stats};
