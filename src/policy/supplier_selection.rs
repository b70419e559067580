//! Supplier selection (component C5): pick an upstream link from a
//! sink's incoming-link list for a desired order quantity (§4.5).

use crate::core_types::LinkId;
use crate::error::SimError;
use crate::link::Link;
use std::cell::Cell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionRule {
    First,
    Available,
    Cheapest,
    Fastest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Re-choose on every call.
    Dynamic,
    /// Latch the first choice and reuse it thereafter.
    Fixed,
}

/// Stateful chooser attached to one sink. `latched` is only consulted
/// in `Fixed` mode.
pub struct SupplierSelection {
    rule: SelectionRule,
    mode: SelectionMode,
    latched: Cell<Option<LinkId>>,
}

impl SupplierSelection {
    pub fn new(rule: SelectionRule, mode: SelectionMode) -> Self {
        SupplierSelection {
            rule,
            mode,
            latched: Cell::new(None),
        }
    }

    /// Choose a link from `suppliers` (the sink's incoming links) for
    /// quantity `qty`. Links whose source level cannot be compared
    /// (disrupted, etc.) still participate in `available`/`first`; only
    /// an empty list is a hard error.
    pub fn choose(&self, suppliers: &[Link], qty: f64) -> Result<LinkId, SimError> {
        if suppliers.is_empty() {
            return Err(SimError::Hard("supplier selection over an empty link list".into()));
        }
        if self.mode == SelectionMode::Fixed {
            if let Some(id) = self.latched.get() {
                if suppliers.iter().any(|l| l.id() == id) {
                    return Ok(id);
                }
            }
        }

        let chosen = match self.rule {
            SelectionRule::First => suppliers[0].id(),
            SelectionRule::Available => suppliers
                .iter()
                .find(|l| l.source_level() >= qty)
                .unwrap_or(&suppliers[0])
                .id(),
            SelectionRule::Cheapest => suppliers
                .iter()
                .min_by(|a, b| a.transport_cost().total_cmp(&b.transport_cost()))
                .expect("non-empty")
                .id(),
            SelectionRule::Fastest => suppliers
                .iter()
                .min_by(|a, b| a.sample_lead_time_preview().total_cmp(&b.sample_lead_time_preview()))
                .expect("non-empty")
                .id(),
        };

        if self.mode == SelectionMode::Fixed {
            self.latched.set(Some(chosen));
        }
        Ok(chosen)
    }
}
