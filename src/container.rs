//! Bounded fungible quantity with blocking get/put (component C2).
//!
//! Mirrors `simpy.Container`'s queuing discipline: a `get`/`put` that
//! cannot be satisfied immediately enqueues behind whatever is already
//! waiting, and draining the queue stops at the first request that
//! still cannot be satisfied (strict FIFO, no jumping the line — see
//! §4.2/§5).

use crate::error::SimError;
use crate::scheduler::SimContext;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

struct Request {
    amount: f64,
    done: Cell<bool>,
    waker: RefCell<Option<Waker>>,
}

struct ContainerState {
    level: f64,
    capacity: f64,
    get_queue: VecDeque<Rc<Request>>,
    put_queue: VecDeque<Rc<Request>>,
    avg_level: f64,
    last_timestamp: f64,
    trace: Option<Vec<(f64, f64)>>,
}

impl ContainerState {
    fn record(&mut self, now: f64, new_level: f64) {
        if now > 0.0 {
            self.avg_level =
                (self.avg_level * self.last_timestamp + (now - self.last_timestamp) * self.level) / now;
        }
        self.last_timestamp = now;
        self.level = new_level;
        if let Some(trace) = &mut self.trace {
            trace.push((now, new_level));
        }
    }

    fn try_drain_gets(&mut self, now: f64) {
        while let Some(front) = self.get_queue.front() {
            if front.amount <= self.level {
                let req = self.get_queue.pop_front().unwrap();
                let new_level = self.level - req.amount;
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

    fn try_drain_puts(&mut self, now: f64) {
        while let Some(front) = self.put_queue.front() {
            if self.level + front.amount <= self.capacity {
                let req = self.put_queue.pop_front().unwrap();
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

/// A bounded (or unbounded, `capacity == f64::INFINITY`) fungible
/// quantity shared by clone across every process that touches it.
#[derive(Clone)]
pub struct MonitoredContainer(Rc<RefCell<ContainerState>>);

impl MonitoredContainer {
    pub fn new(capacity: f64, initial_level: f64) -> Self {
        Self::with_trace(capacity, initial_level, false)
    }

    pub fn with_trace(capacity: f64, initial_level: f64, trace: bool) -> Self {
        MonitoredContainer(Rc::new(RefCell::new(ContainerState {
            level: initial_level,
            capacity,
            get_queue: VecDeque::new(),
            put_queue: VecDeque::new(),
            avg_level: 0.0,
            last_timestamp: 0.0,
            trace: if trace { Some(vec![(0.0, initial_level)]) } else { None },
        })))
    }

    /// An always-full, unbounded container (an infinite Supplier's
    /// inventory, §3/§4.6: "reports ∞ on get").
    pub fn infinite() -> Self {
        Self::new(f64::INFINITY, f64::INFINITY)
    }

    pub fn level(&self) -> f64 {
        self.0.borrow().level
    }

    pub fn capacity(&self) -> f64 {
        self.0.borrow().capacity
    }

    pub fn avg_level(&self) -> f64 {
        self.0.borrow().avg_level
    }

    pub fn trace(&self) -> Vec<(f64, f64)> {
        self.0.borrow().trace.clone().unwrap_or_default()
    }

    pub fn get(&self, ctx: &SimContext, amount: f64) -> GetFuture {
        GetFuture {
            ctx: ctx.clone(),
            container: self.clone(),
            request: Rc::new(Request {
                amount,
                done: Cell::new(false),
                waker: RefCell::new(None),
            }),
            queued: false,
        }
    }

    pub fn put(&self, ctx: &SimContext, amount: f64) -> PutFuture {
        PutFuture {
            ctx: ctx.clone(),
            container: self.clone(),
            request: Rc::new(Request {
                amount,
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
            "container get/put amount must be positive, got {amount}"
        )))
    } else {
        Ok(())
    }
}

pub struct GetFuture {
    ctx: SimContext,
    container: MonitoredContainer,
    request: Rc<Request>,
    queued: bool,
}

impl Future for GetFuture {
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
            let mut state = this.container.0.borrow_mut();
            state.get_queue.push_back(this.request.clone());
            state.try_drain_gets(now);
            state.try_drain_puts(now);
        }
        if this.request.done.get() {
            Poll::Ready(Ok(()))
        } else {
            Poll::Pending
        }
    }
}

pub struct PutFuture {
    ctx: SimContext,
    container: MonitoredContainer,
    request: Rc<Request>,
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
            let mut state = this.container.0.borrow_mut();
            state.put_queue.push_back(this.request.clone());
            state.try_drain_puts(now);
            state.try_drain_gets(now);
        }
        if this.request.done.get() {
            Poll::Ready(Ok(()))
        } else {
            Poll::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;

    #[test]
    fn get_blocks_until_put_arrives() {
        let sched = Scheduler::new();
        let container = MonitoredContainer::new(100.0, 0.0);
        let log = Rc::new(RefCell::new(Vec::new()));

        {
            let container = container.clone();
            let log = log.clone();
            sched.spawn(move |ctx| async move {
                container.get(&ctx, 10.0).await?;
                log.borrow_mut().push(("got", ctx.now()));
                Ok(())
            });
        }
        {
            let container = container.clone();
            sched.spawn(move |ctx| async move {
                ctx.timeout(3.0).await?;
                container.put(&ctx, 10.0).await?;
                Ok(())
            });
        }
        sched.run_until(10.0).unwrap();
        assert_eq!(*log.borrow(), vec![("got", 3.0)]);
        assert_eq!(container.level(), 0.0);
    }

    #[test]
    fn strict_fifo_blocks_smaller_later_get_behind_larger_earlier_one() {
        let sched = Scheduler::new();
        let container = MonitoredContainer::new(100.0, 0.0);
        let log = Rc::new(RefCell::new(Vec::new()));

        {
            let container = container.clone();
            let log = log.clone();
            sched.spawn(move |ctx| async move {
                container.get(&ctx, 20.0).await?;
                log.borrow_mut().push("big");
                Ok(())
            });
        }
        {
            let container = container.clone();
            let log = log.clone();
            sched.spawn(move |ctx| async move {
                container.get(&ctx, 1.0).await?;
                log.borrow_mut().push("small");
                Ok(())
            });
        }
        {
            let container = container.clone();
            sched.spawn(move |ctx| async move {
                ctx.timeout(1.0).await?;
                container.put(&ctx, 5.0).await?;
                Ok(())
            });
        }
        sched.run_until(5.0).unwrap();
        // Neither the big nor the small get could be served by 5 units
        // put in, and the small request must not jump ahead of big.
        assert!(log.borrow().is_empty());
        assert_eq!(container.level(), 5.0);
    }

    #[test]
    fn never_negative_or_over_capacity() {
        let sched = Scheduler::new();
        let container = MonitoredContainer::new(10.0, 10.0);
        {
            let container = container.clone();
            sched.spawn(move |ctx| async move {
                container.get(&ctx, 10.0).await?;
                assert_eq!(container.level(), 0.0);
                Ok(())
            });
        }
        sched.run_until(1.0).unwrap();
        assert!(container.level() >= 0.0 && container.level() <= container.capacity());
    }
}
