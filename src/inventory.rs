//! Inventory (component C3): a container layered with holding-cost
//! accrual, an optional perishable batch queue, and the `inventory_drop`
//! replenishment trigger (§4.3).
//!
//! Deliberately does not delegate to [`crate::container::MonitoredContainer`]
//! for its FIFO queuing: the batch-queue bookkeeping and the level
//! mutation it shadows must happen inside the same atomic step, so
//! `Inventory` reimplements the blocking get/put discipline inline
//! rather than risk the two falling out of sync across a suspension
//! point.

use crate::error::SimError;
use crate::event::SimEvent;
use crate::scheduler::SimContext;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

#[derive(Debug, Clone, Copy)]
struct Batch {
    manufacture_time: f64,
    quantity: f64,
}

enum Kind {
    NonPerishable,
    Perishable { shelf_life: f64, batches: VecDeque<Batch> },
}

struct GetRequest {
    amount: f64,
    done: Cell<bool>,
    result: RefCell<Option<Vec<(f64, f64)>>>,
    waker: RefCell<Option<Waker>>,
}

struct PutRequest {
    amount: f64,
    manufacture_time: f64,
    done: Cell<bool>,
    waker: RefCell<Option<Waker>>,
}

struct InventoryState {
    kind: Kind,
    level: f64,
    capacity: f64,
    get_queue: VecDeque<Rc<GetRequest>>,
    put_queue: VecDeque<Rc<PutRequest>>,
    avg_level: f64,
    trace: Option<Vec<(f64, f64)>>,
    holding_cost_rate: f64,
    carry_cost: f64,
    last_mutation_time: f64,
    waste: f64,
}

impl InventoryState {
    /// Charge the *old* level for the time elapsed since the last
    /// mutation, then advance the time-weighted average and (if
    /// tracing) append the new level. Right-continuous: `new_level`
    /// itself is never charged for the instant it takes effect.
    fn record(&mut self, now: f64, new_level: f64) {
        if now > self.last_mutation_time {
            let dt = now - self.last_mutation_time;
            self.carry_cost += self.level * dt * self.holding_cost_rate;
            if now > 0.0 {
                self.avg_level = (self.avg_level * self.last_mutation_time + dt * self.level) / now;
            }
        }
        self.last_mutation_time = now;
        self.level = new_level;
        if let Some(trace) = &mut self.trace {
            trace.push((now, new_level));
        }
    }

    fn peel_from_batches(&mut self, mut amount: f64) -> Vec<(f64, f64)> {
        let Kind::Perishable { batches, .. } = &mut self.kind else {
            return Vec::new();
        };
        let mut consumed = Vec::new();
        while amount > 0.0 {
            let Some(front) = batches.front_mut() else { break };
            if front.quantity <= amount {
                amount -= front.quantity;
                consumed.push((front.manufacture_time, front.quantity));
                batches.pop_front();
            } else {
                front.quantity -= amount;
                consumed.push((front.manufacture_time, amount));
                amount = 0.0;
            }
        }
        consumed
    }

    fn insert_batch(&mut self, manufacture_time: f64, quantity: f64) {
        if let Kind::Perishable { batches, .. } = &mut self.kind {
            let slice = batches.make_contiguous();
            let idx = slice.partition_point(|b| b.manufacture_time <= manufacture_time);
            batches.insert(idx, Batch { manufacture_time, quantity });
        }
    }

    fn try_drain_gets(&mut self, now: f64, drop_event: &SimEvent) {
        while let Some(front) = self.get_queue.front() {
            if front.amount <= self.level {
                let req = self.get_queue.pop_front().unwrap();
                let consumed = self.peel_from_batches(req.amount);
                let new_level = self.level - req.amount;
                self.record(now, new_level);
                *req.result.borrow_mut() = Some(if consumed.is_empty() {
                    vec![(now, req.amount)]
                } else {
                    consumed
                });
                req.done.set(true);
                if let Some(w) = req.waker.borrow_mut().take() {
                    w.wake();
                }
                drop_event.fire();
            } else {
                break;
            }
        }
    }

    fn try_drain_puts(&mut self, now: f64) {
        while let Some(front) = self.put_queue.front() {
            if self.level + front.amount <= self.capacity {
                let req = self.put_queue.pop_front().unwrap();
                self.insert_batch(req.manufacture_time, req.amount);
                let new_level = self.level + req.amount;
                self.record(now, new_level);
                req.done.set(true);
                if let Some(w) = req.waker.borrow_mut().take() {
                    w.wake();
                }
            } else {
                break;
            }
        }
    }
}

/// Component C3. Cheap to clone; every clone shares the same state and
/// `inventory_drop` event.
#[derive(Clone)]
pub struct Inventory {
    state: Rc<RefCell<InventoryState>>,
    drop_event: SimEvent,
}

impl Inventory {
    pub fn non_perishable(capacity: f64, initial_level: f64, holding_cost_rate: f64) -> Self {
        Self::build(Kind::NonPerishable, capacity, initial_level, holding_cost_rate, false)
    }

    pub fn perishable(
        capacity: f64,
        initial_level: f64,
        holding_cost_rate: f64,
        shelf_life: f64,
    ) -> Self {
        let mut batches = VecDeque::new();
        if initial_level > 0.0 {
            batches.push_back(Batch {
                manufacture_time: 0.0,
                quantity: initial_level,
            });
        }
        Self::build(
            Kind::Perishable { shelf_life, batches },
            capacity,
            initial_level,
            holding_cost_rate,
            false,
        )
    }

    /// An always-full, unbounded inventory: the finite-vs-infinite
    /// Supplier distinction (§3) collapses to this since `amount <=
    /// f64::INFINITY` is always true and subtracting from an infinite
    /// level leaves it infinite.
    pub fn infinite() -> Self {
        Self::non_perishable(f64::INFINITY, f64::INFINITY, 0.0)
    }

    pub fn with_trace(self) -> Self {
        self.state.borrow_mut().trace = Some(vec![(0.0, self.state.borrow().level)]);
        self
    }

    fn build(kind: Kind, capacity: f64, initial_level: f64, holding_cost_rate: f64, trace: bool) -> Self {
        Inventory {
            state: Rc::new(RefCell::new(InventoryState {
                kind,
                level: initial_level,
                capacity,
                get_queue: VecDeque::new(),
                put_queue: VecDeque::new(),
                avg_level: 0.0,
                trace: if trace { Some(vec![(0.0, initial_level)]) } else { None },
                holding_cost_rate,
                carry_cost: 0.0,
                last_mutation_time: 0.0,
                waste: 0.0,
            })),
            drop_event: SimEvent::new(),
        }
    }

    pub fn level(&self) -> f64 {
        self.state.borrow().level
    }

    pub fn capacity(&self) -> f64 {
        self.state.borrow().capacity
    }

    pub fn avg_level(&self) -> f64 {
        self.state.borrow().avg_level
    }

    pub fn carry_cost(&self) -> f64 {
        self.state.borrow().carry_cost
    }

    pub fn waste(&self) -> f64 {
        self.state.borrow().waste
    }

    pub fn trace(&self) -> Vec<(f64, f64)> {
        self.state.borrow().trace.clone().unwrap_or_default()
    }

    pub fn is_perishable(&self) -> bool {
        matches!(self.state.borrow().kind, Kind::Perishable { .. })
    }

    /// The one-shot event the attached replenishment policy waits on;
    /// it fires whenever a `get` actually removes units (§4.3/§4.4).
    pub fn drop_event(&self) -> SimEvent {
        self.drop_event.clone()
    }

    /// Advance holding-cost accrual and the time-weighted average to
    /// `now` without changing the level ("external poll", §4.3).
    pub fn poll(&self, now: f64) {
        let mut state = self.state.borrow_mut();
        let level = state.level;
        state.record(now, level);
    }

    /// Remove any head batch whose age has reached `shelf_life`,
    /// draining the level and incrementing `waste` accordingly. A
    /// no-op for non-perishable inventories.
    pub fn sweep_expired(&self, now: f64) {
        let mut state = self.state.borrow_mut();
        let Kind::Perishable { shelf_life, .. } = &state.kind else {
            return;
        };
        let shelf_life = *shelf_life;
        let mut expired_qty = 0.0;
        loop {
            let Kind::Perishable { batches, .. } = &mut state.kind else { unreachable!() };
            let Some(front) = batches.front() else { break };
            if now - front.manufacture_time >= shelf_life {
                expired_qty += front.quantity;
                batches.pop_front();
            } else {
                break;
            }
        }
        if expired_qty > 0.0 {
            state.waste += expired_qty;
            let new_level = state.level - expired_qty;
            state.record(now, new_level);
        }
    }

    /// Spawn the periodic (every 1 virtual-time unit) expiry sweep
    /// process for a perishable inventory (§4.3).
    pub fn spawn_expiry_sweep(&self, ctx: &SimContext) {
        if !self.is_perishable() {
            return;
        }
        let inventory = self.clone();
        ctx.spawn(move |ctx| async move {
            loop {
                ctx.timeout(1.0).await?;
                inventory.sweep_expired(ctx.now());
            }
        });
    }

    pub fn get(&self, ctx: &SimContext, amount: f64) -> GetFuture {
        GetFuture {
            ctx: ctx.clone(),
            inventory: self.clone(),
            request: Rc::new(GetRequest {
                amount,
                done: Cell::new(false),
                result: RefCell::new(None),
                waker: RefCell::new(None),
            }),
            queued: false,
        }
    }

    /// Put `amount` units stamped with `now` as the manufacture time
    /// (fresh production, or a supplier with no upstream batch ages).
    pub fn put(&self, ctx: &SimContext, amount: f64) -> PutFuture {
        self.put_at(ctx, amount, ctx.now())
    }

    /// Put `amount` units stamped with an explicit `manufacture_time`,
    /// preserving ages carried from an upstream perishable inventory.
    pub fn put_at(&self, ctx: &SimContext, amount: f64, manufacture_time: f64) -> PutFuture {
        PutFuture {
            ctx: ctx.clone(),
            inventory: self.clone(),
            request: Rc::new(PutRequest {
                amount,
                manufacture_time,
                done: Cell::new(false),
                waker: RefCell::new(None),
            }),
            queued: false,
        }
    }
}

fn validate_amount(amount: f64) -> Result<(), SimError> {
    if amount <= 0.0 {
        Err(SimError::Hard(format!(
            "inventory get/put amount must be positive, got {amount}"
        )))
    } else {
        Ok(())
    }
}

pub struct GetFuture {
    ctx: SimContext,
    inventory: Inventory,
    request: Rc<GetRequest>,
    queued: bool,
}

impl Future for GetFuture {
    /// The sequence of `(manufacture_time, consumed_quantity)` batches
    /// actually drawn, oldest first — used to preserve ages end-to-end
    /// when this node re-deposits the units downstream.
    type Output = Result<Vec<(f64, f64)>, SimError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if !this.queued {
            if let Err(e) = validate_amount(this.request.amount) {
                return Poll::Ready(Err(e));
            }
        }
        if this.request.done.get() {
            return Poll::Ready(Ok(this.request.result.borrow_mut().take().unwrap_or_default()));
        }
        *this.request.waker.borrow_mut() = Some(cx.waker().clone());
        let now = this.ctx.now();
        if !this.queued {
            this.queued = true;
            let mut state = this.inventory.state.borrow_mut();
            state.get_queue.push_back(this.request.clone());
            state.try_drain_gets(now, &this.inventory.drop_event);
            state.try_drain_puts(now);
        }
        if this.request.done.get() {
            Poll::Ready(Ok(this.request.result.borrow_mut().take().unwrap_or_default()))
        } else {
            Poll::Pending
        }
    }
}

pub struct PutFuture {
    ctx: SimContext,
    inventory: Inventory,
    request: Rc<PutRequest>,
    queued: bool,
}

impl Future for PutFuture {
    type Output = Result<(), SimError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if !this.queued {
            if let Err(e) = validate_amount(this.request.amount) {
                return Poll::Ready(Err(e));
            }
        }
        if this.request.done.get() {
            return Poll::Ready(Ok(()));
        }
        *this.request.waker.borrow_mut() = Some(cx.waker().clone());
        let now = this.ctx.now();
        if !this.queued {
            this.queued = true;
            let mut state = this.inventory.state.borrow_mut();
            state.put_queue.push_back(this.request.clone());
            state.try_drain_puts(now);
            state.try_drain_gets(now, &this.inventory.drop_event);
        }
        if this.request.done.get() {
            Poll::Ready(Ok(()))
        } else {
            Poll::Pending
        }
    }
}
