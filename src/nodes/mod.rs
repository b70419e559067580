//! Node processes (component C6): the four process shapes the network
//! graph is built from (§4.6).

pub mod demand;
pub mod inventory_node;
pub mod manufacturer;
pub mod supplier;

pub use demand::{Demand, DemandTarget};
pub use inventory_node::InventoryNode;
pub use manufacturer::Manufacturer;
pub use supplier::Supplier;
