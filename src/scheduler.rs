//! Virtual-time cooperative scheduler (component C1).
//!
//! The source library (`SupplyNetPy`) drives everything off `simpy`
//! generators. Rust has no generator-based coroutines on stable, so each
//! "process" here is an ordinary `async fn` taking a [`SimContext`], and
//! the scheduler is a small single-threaded executor purpose-built for
//! virtual time: it never touches a clock, a thread, or an I/O reactor.
//! `Timeout`, `Get`/`Put` (container blocking, see [`crate::container`]),
//! and `Event` (see [`crate::event`]) are the four wait primitives the
//! design calls for; they are ordinary [`std::future::Future`]s built on
//! stable `std::task::Wake`, not hand-rolled vtables.
//!
//! Ordering: a priority queue keyed by `(fire_time, insertion_seq)` never
//! lets `now` move backward and always resumes same-time events in the
//! order they were scheduled (§4.1/§5).

use crate::error::SimError;
use std::cell::RefCell;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Wake, Waker};

pub type TaskId = usize;

/// Sentinel task id used for the `run_until` stop marker; never assigned
/// to a real spawned task.
const TASK_STOP: TaskId = TaskId::MAX;

#[derive(Debug, Clone, Copy)]
struct TimerKey {
    time: f64,
    seq: u64,
}

impl PartialEq for TimerKey {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}
impl Eq for TimerKey {}
impl PartialOrd for TimerKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for TimerKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.time.partial_cmp(&other.time) {
            Some(Ordering::Equal) | None => self.seq.cmp(&other.seq),
            Some(ord) => ord,
        }
    }
}

#[derive(Debug, Clone)]
struct TimerEntry {
    key: TimerKey,
    task: TaskId,
}
impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}
impl Eq for TimerEntry {}
impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

struct SchedulerState {
    now: f64,
    seq: u64,
    timers: BinaryHeap<Reverse<TimerEntry>>,
    ready: Arc<Mutex<VecDeque<TaskId>>>,
    halted: Option<SimError>,
}

impl SchedulerState {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }
}

type BoxedProcess = Pin<Box<dyn Future<Output = Result<(), SimError>>>>;

struct SchedulerImpl {
    state: RefCell<SchedulerState>,
    tasks: RefCell<Vec<Option<BoxedProcess>>>,
}

/// Handle to the event loop. Cheap to clone (an `Rc` underneath);
/// processes hold a [`SimContext`] rather than this type directly.
#[derive(Clone)]
pub struct Scheduler(Rc<SchedulerImpl>);

impl Scheduler {
    pub fn new() -> Self {
        Scheduler(Rc::new(SchedulerImpl {
            state: RefCell::new(SchedulerState {
                now: 0.0,
                seq: 0,
                timers: BinaryHeap::new(),
                ready: Arc::new(Mutex::new(VecDeque::new())),
                halted: None,
            }),
            tasks: RefCell::new(Vec::new()),
        }))
    }

    pub fn now(&self) -> f64 {
        self.0.state.borrow().now
    }

    /// Spawn a process. It is queued for its first poll at the current
    /// virtual time, after whatever process is currently running
    /// finishes its turn (mirrors `simpy`'s `env.process` scheduling an
    /// Initialize event rather than running inline).
    pub fn spawn<F, Fut>(&self, f: F)
    where
        F: FnOnce(SimContext) -> Fut,
        Fut: Future<Output = Result<(), SimError>> + 'static,
    {
        let id = {
            let mut tasks = self.0.tasks.borrow_mut();
            tasks.push(None);
            tasks.len() - 1
        };
        let ctx = SimContext {
            scheduler: self.clone(),
            task_id: id,
        };
        let fut: BoxedProcess = Box::pin(f(ctx));
        self.0.tasks.borrow_mut()[id] = Some(fut);
        self.0.state.borrow().ready.lock().unwrap().push_back(id);
    }

    fn make_waker(&self, id: TaskId) -> Waker {
        let ready = self.0.state.borrow().ready.clone();
        Waker::from(Arc::new(TaskWaker { id, ready }))
    }

    fn poll_task(&self, id: TaskId) {
        let fut_opt = {
            let mut tasks = self.0.tasks.borrow_mut();
            tasks.get_mut(id).and_then(|slot| slot.take())
        };
        let Some(mut fut) = fut_opt else { return };
        let waker = self.make_waker(id);
        let mut cx = Context::from_waker(&waker);
        match fut.as_mut().poll(&mut cx) {
            Poll::Pending => {
                self.0.tasks.borrow_mut()[id] = Some(fut);
            }
            Poll::Ready(Ok(())) => {}
            Poll::Ready(Err(e)) => {
                let mut state = self.0.state.borrow_mut();
                if state.halted.is_none() {
                    state.halted = Some(e);
                }
            }
        }
    }

    /// Register a one-shot timer for `task` firing at `time`, returning
    /// the insertion sequence used to order it against concurrent events.
    pub(crate) fn schedule_timer(&self, task: TaskId, time: f64) {
        let mut state = self.0.state.borrow_mut();
        let seq = state.next_seq();
        state.timers.push(Reverse(TimerEntry {
            key: TimerKey { time, seq },
            task,
        }));
    }

    /// Advance the clock, running the event loop until either the queue
    /// is drained or virtual time reaches `stop_time`.
    pub fn run_until(&self, stop_time: f64) -> Result<(), SimError> {
        {
            let mut state = self.0.state.borrow_mut();
            let seq = state.next_seq();
            state.timers.push(Reverse(TimerEntry {
                key: TimerKey {
                    time: stop_time,
                    seq,
                },
                task: TASK_STOP,
            }));
        }
        loop {
            if let Some(e) = self.0.state.borrow().halted.clone() {
                return Err(e);
            }

            let ready_id = {
                let state = self.0.state.borrow();
                state.ready.lock().expect("ready queue poisoned").pop_front()
            };
            if let Some(id) = ready_id {
                self.poll_task(id);
                continue;
            }

            let popped = {
                let mut state = self.0.state.borrow_mut();
                state.timers.pop()
            };
            let Some(Reverse(entry)) = popped else {
                break;
            };
            if entry.task == TASK_STOP {
                let mut state = self.0.state.borrow_mut();
                if entry.key.time > state.now {
                    state.now = entry.key.time;
                }
                break;
            }
            {
                let mut state = self.0.state.borrow_mut();
                if entry.key.time > state.now {
                    state.now = entry.key.time;
                }
            }
            self.poll_task(entry.task);
        }

        if let Some(e) = self.0.state.borrow().halted.clone() {
            return Err(e);
        }
        Ok(())
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

struct TaskWaker {
    id: TaskId,
    ready: Arc<Mutex<VecDeque<TaskId>>>,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.ready.lock().unwrap().push_back(self.id);
    }
    fn wake_by_ref(self: &Arc<Self>) {
        self.ready.lock().unwrap().push_back(self.id);
    }
}

/// Per-task handle passed into every spawned process. Cloning it is
/// cheap; it is how a process reaches the scheduler's wait primitives.
#[derive(Clone)]
pub struct SimContext {
    pub(crate) scheduler: Scheduler,
    pub(crate) task_id: TaskId,
}

impl SimContext {
    pub fn now(&self) -> f64 {
        self.scheduler.now()
    }

    pub fn spawn<F, Fut>(&self, f: F)
    where
        F: FnOnce(SimContext) -> Fut,
        Fut: Future<Output = Result<(), SimError>> + 'static,
    {
        self.scheduler.spawn(f)
    }

    /// Suspend this process for `dt` virtual-time units. `dt` must be
    /// non-negative (a `dt=0` timeout still yields control and resumes
    /// in FIFO order after whatever is already scheduled at this
    /// instant, per §4.1).
    pub fn timeout(&self, dt: f64) -> Timeout {
        debug_assert!(dt >= 0.0, "timeout delay must be non-negative");
        Timeout {
            ctx: self.clone(),
            dt,
            deadline: None,
        }
    }
}

/// A `Timeout(dt)` wait primitive (§4.1).
pub struct Timeout {
    ctx: SimContext,
    dt: f64,
    deadline: Option<f64>,
}

impl Future for Timeout {
    type Output = Result<(), SimError>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let deadline = match this.deadline {
            Some(d) => d,
            None => {
                let now = this.ctx.now();
                let d = now + this.dt;
                this.ctx.scheduler.schedule_timer(this.ctx.task_id, d);
                this.deadline = Some(d);
                d
            }
        };
        if this.ctx.now() >= deadline {
            Poll::Ready(Ok(()))
        } else {
            Poll::Pending
        }
    }
}

/// Resolve as soon as either sub-future resolves; both are polled on
/// every wake until one completes. Used by the (s,S)/(R,Q) replenishment
/// loop's `min(timeout(period), inventory_drop)` wait (§4.4).
pub struct Race<A, B> {
    a: A,
    b: B,
}

pub fn race<A, B>(a: A, b: B) -> Race<A, B>
where
    A: Future<Output = Result<(), SimError>> + Unpin,
    B: Future<Output = Result<(), SimError>> + Unpin,
{
    Race { a, b }
}

impl<A, B> Future for Race<A, B>
where
    A: Future<Output = Result<(), SimError>> + Unpin,
    B: Future<Output = Result<(), SimError>> + Unpin,
{
    type Output = Result<(), SimError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Poll::Ready(r) = Pin::new(&mut self.a).poll(cx) {
            return Poll::Ready(r);
        }
        if let Poll::Ready(r) = Pin::new(&mut self.b).poll(cx) {
            return Poll::Ready(r);
        }
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_resume_in_insertion_order_at_equal_time() {
        let sched = Scheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for i in 0..3 {
            let log = log.clone();
            sched.spawn(move |ctx| async move {
                ctx.timeout(0.0).await?;
                log.borrow_mut().push(i);
                Ok(())
            });
        }
        sched.run_until(1.0).unwrap();
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn now_never_goes_backward_and_stops_at_sim_time() {
        let sched = Scheduler::new();
        sched.spawn(|ctx| async move {
            ctx.timeout(5.0).await?;
            ctx.timeout(50.0).await?;
            Ok(())
        });
        sched.run_until(10.0).unwrap();
        assert_eq!(sched.now(), 10.0);
    }

    #[test]
    fn hard_failure_halts_the_run() {
        let sched = Scheduler::new();
        sched.spawn(|ctx| async move {
            ctx.timeout(1.0).await?;
            Err(SimError::Hard("boom".into()))
        });
        let result = sched.run_until(100.0);
        assert!(result.is_err());
        assert_eq!(sched.now(), 1.0);
    }
}
