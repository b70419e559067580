//! Replenishment policies (component C4): (s,S), (R,Q), and periodic
//! review loops that decide when to place a reorder (§4.4).
//!
//! A closed set of three variants rather than a trait object — the
//! design explicitly calls for tagged variants over an open hierarchy
//! since no fourth kind is coming.

use crate::event::SimEvent;
use crate::inventory::Inventory;
use crate::scheduler::{race, SimContext};
use std::cell::Cell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy)]
pub enum ReplenishmentPolicy {
    /// Min-max: reorder up to `s_cap` whenever level falls to `s + safety_stock`.
    SS {
        s: f64,
        s_cap: f64,
        safety_stock: f64,
        first_review_delay: f64,
        period: Option<f64>,
    },
    /// Reorder a fixed quantity `q` whenever level falls to `r`.
    RQ {
        r: f64,
        q: f64,
        first_review_delay: f64,
        period: Option<f64>,
    },
    /// Unconditionally order `quantity` every `period`.
    Periodic { period: f64, quantity: f64, first_review_delay: f64 },
}

impl ReplenishmentPolicy {
    pub(crate) fn first_review_delay(&self) -> f64 {
        match self {
            ReplenishmentPolicy::SS { first_review_delay, .. }
            | ReplenishmentPolicy::RQ { first_review_delay, .. }
            | ReplenishmentPolicy::Periodic { first_review_delay, .. } => *first_review_delay,
        }
    }

    pub(crate) fn period(&self) -> Option<f64> {
        match self {
            ReplenishmentPolicy::SS { period, .. } | ReplenishmentPolicy::RQ { period, .. } => *period,
            ReplenishmentPolicy::Periodic { period, .. } => Some(*period),
        }
    }

    pub(crate) fn is_event_driven(&self) -> bool {
        !matches!(self, ReplenishmentPolicy::Periodic { .. })
    }

    /// Decide whether to place an order given the current level and
    /// whether one is already outstanding. Returns the order quantity.
    pub(crate) fn decide(&self, level: f64, ongoing_order: bool) -> Option<f64> {
        if ongoing_order {
            return None;
        }
        match *self {
            ReplenishmentPolicy::SS {
                s,
                s_cap,
                safety_stock,
                ..
            } => {
                debug_assert!(s <= s_cap, "reorder point must not exceed order-up-to level");
                if level <= s + safety_stock {
                    Some((s_cap + safety_stock) - level)
                } else {
                    None
                }
            }
            ReplenishmentPolicy::RQ { r, q, .. } => {
                if level <= r {
                    Some(q)
                } else {
                    None
                }
            }
            ReplenishmentPolicy::Periodic { quantity, .. } => Some(quantity),
        }
    }
}

/// Spawn the review loop described in §4.4. `place_order` is invoked
/// with the chosen quantity whenever the policy decides to reorder; it
/// is responsible for supplier selection and spawning the fulfillment
/// coroutine. `ongoing_order` is set before `place_order` runs and must
/// be cleared by the fulfillment coroutine once it completes (or is
/// refused by a disrupted supplier).
pub fn spawn(
    ctx: &SimContext,
    inventory: Inventory,
    ongoing_order: Rc<Cell<bool>>,
    policy: ReplenishmentPolicy,
    place_order: impl Fn(&SimContext, f64) + 'static,
) {
    ctx.spawn(move |ctx| async move {
        let first_delay = policy.first_review_delay();
        if first_delay > 0.0 {
            ctx.timeout(first_delay).await?;
        }
        loop {
            let level = inventory.level();
            if let Some(qty) = policy.decide(level, ongoing_order.get()) {
                ongoing_order.set(true);
                place_order(&ctx, qty);
            }
            if !policy.is_event_driven() {
                let period = policy.period().expect("periodic policy always has a period");
                ctx.timeout(period).await?;
                continue;
            }
            let drop_event: SimEvent = inventory.drop_event();
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
