//! One-shot level-triggered [`SimEvent`] (the fourth wait primitive
//! alongside `Timeout`/`Get`/`Put`, §4.1). Used for `inventory_drop`
//! (§4.3/§4.4): a get that actually removes units fires the event; a
//! replenishment policy waits on it and resets it after observing.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

struct EventInner {
    fired: bool,
    waiters: Vec<Waker>,
}

/// Cheap to clone; every clone observes the same underlying flag.
#[derive(Clone)]
pub struct SimEvent(Rc<RefCell<EventInner>>);

impl SimEvent {
    pub fn new() -> Self {
        SimEvent(Rc::new(RefCell::new(EventInner {
            fired: false,
            waiters: Vec::new(),
        })))
    }

    /// Set the flag and wake every process currently waiting. Firing an
    /// already-fired event is a no-op (no duplicate wakes).
    pub fn fire(&self) {
        let mut inner = self.0.borrow_mut();
        if inner.fired {
            return;
        }
        inner.fired = true;
        let waiters = std::mem::take(&mut inner.waiters);
        drop(inner);
        for w in waiters {
            w.wake();
        }
    }

    /// Clear the flag so the same [`SimEvent`] can fire again next
    /// cycle (the policy loop resets it after observing, §4.4).
    pub fn reset(&self) {
        self.0.borrow_mut().fired = false;
    }

    pub fn is_fired(&self) -> bool {
        self.0.borrow().fired
    }

    pub fn wait(&self) -> EventWait {
        EventWait { event: self.clone() }
    }
}

impl Default for SimEvent {
    fn default() -> Self {
        Self::new()
    }
}

pub struct EventWait {
    event: SimEvent,
}

impl Future for EventWait {
    type Output = Result<(), crate::error::SimError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.event.0.borrow_mut();
        if inner.fired {
            Poll::Ready(Ok(()))
        } else {
            inner.waiters.push(cx.waker().clone());
            Poll::Pending
        }
    }
}
