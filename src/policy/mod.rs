//! Replenishment (C4) and supplier-selection (C5) policies: both are
//! closed sets of tagged variants rather than trait objects (§9).

pub mod replenishment;
pub mod supplier_selection;

pub use replenishment::ReplenishmentPolicy;
pub use supplier_selection::{SelectionMode, SelectionRule, SupplierSelection};
