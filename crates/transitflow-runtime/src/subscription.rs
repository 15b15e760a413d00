#![forbid(unsafe_code)]

//! Subscriptions: continuous message sources owned by the runtime.
//!
//! A model declares what it wants running through `Model::subscriptions()`.
//! After every update the runtime diffs the declared set against the running
//! set by [`SubId`], starting new ones and stopping the ones that vanished.
//! A subscription that stays declared keeps its thread.
//!
//! The application uses this for the debounce tick: an [`Every`] is declared
//! only while a location edit is waiting to settle.

use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, mpsc};
use std::thread;
use std::time::{Duration, Instant};

/// Identifier used to match declared and running subscriptions.
pub type SubId = u64;

/// A background message source.
pub trait Subscription<M: Send + 'static>: Send {
    /// Subscriptions with equal ids are the same subscription.
    fn id(&self) -> SubId;

    /// Produce messages until `stop` fires or the receiver is gone.
    ///
    /// Runs on its own thread.
    fn run(&self, sender: mpsc::Sender<M>, stop: StopSignal);
}

type StopState = Arc<(Mutex<bool>, Condvar)>;

fn lock_flag(state: &Mutex<bool>) -> MutexGuard<'_, bool> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Stop flag observed by a running subscription.
#[derive(Clone)]
pub struct StopSignal {
    inner: StopState,
}

impl StopSignal {
    pub(crate) fn new() -> (Self, StopTrigger) {
        let inner: StopState = Arc::new((Mutex::new(false), Condvar::new()));
        let signal = Self {
            inner: Arc::clone(&inner),
        };
        (signal, StopTrigger { inner })
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock_flag(lock)
    }

    /// Sleep for `duration` unless stopped first.
    ///
    /// Returns `true` if stopped, `false` on timeout. Spurious wakeups are
    /// absorbed.
    pub fn wait_timeout(&self, duration: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let deadline = Instant::now() + duration;
        let mut stopped = lock_flag(lock);
        loop {
            if *stopped {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            let (guard, _) = cvar
                .wait_timeout(stopped, remaining)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            stopped = guard;
        }
    }
}

/// Runtime side of a [`StopSignal`].
pub(crate) struct StopTrigger {
    inner: StopState,
}

impl StopTrigger {
    pub(crate) fn stop(&self) {
        let (lock, cvar) = &*self.inner;
        *lock_flag(lock) = true;
        cvar.notify_all();
    }
}

struct RunningSubscription {
    id: SubId,
    trigger: StopTrigger,
    thread: Option<thread::JoinHandle<()>>,
}

impl RunningSubscription {
    fn stop(mut self) {
        self.trigger.stop();
        if let Some(handle) = self.thread.take()
            && handle.join().is_err()
        {
            tracing::warn!(sub_id = self.id, "subscription thread panicked");
        }
    }
}

impl Drop for RunningSubscription {
    fn drop(&mut self) {
        self.trigger.stop();
    }
}

/// Starts, keeps, and stops subscriptions for a program.
pub(crate) struct SubscriptionManager<M: Send + 'static> {
    active: Vec<RunningSubscription>,
    sender: mpsc::Sender<M>,
    receiver: mpsc::Receiver<M>,
}

impl<M: Send + 'static> SubscriptionManager<M> {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            active: Vec::new(),
            sender,
            receiver,
        }
    }

    /// Make the running set match `subscriptions`.
    pub(crate) fn reconcile(&mut self, subscriptions: Vec<Box<dyn Subscription<M>>>) {
        let wanted: HashSet<SubId> = subscriptions.iter().map(|s| s.id()).collect();
        let before = self.active.len();

        let (keep, stale): (Vec<_>, Vec<_>) = self
            .active
            .drain(..)
            .partition(|running| wanted.contains(&running.id));
        self.active = keep;
        for running in stale {
            tracing::debug!(sub_id = running.id, "stopping subscription");
            running.stop();
        }

        let mut running_ids: HashSet<SubId> = self.active.iter().map(|r| r.id).collect();
        for sub in subscriptions {
            let id = sub.id();
            if !running_ids.insert(id) {
                continue;
            }
            tracing::debug!(sub_id = id, "starting subscription");
            let (signal, trigger) = StopSignal::new();
            let sender = self.sender.clone();
            let thread = thread::spawn(move || sub.run(sender, signal));
            self.active.push(RunningSubscription {
                id,
                trigger,
                thread: Some(thread),
            });
        }

        tracing::trace!(
            before,
            after = self.active.len(),
            "subscription reconcile complete"
        );
    }

    pub(crate) fn drain_messages(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }

    #[inline]
    pub(crate) fn active_count(&self) -> usize {
        self.active.len()
    }

    pub(crate) fn stop_all(&mut self) {
        for running in self.active.drain(..) {
            running.stop();
        }
    }
}

impl<M: Send + 'static> Drop for SubscriptionManager<M> {
    fn drop(&mut self) {
        self.stop_all();
    }
}

/// Fires a message at a fixed interval.
///
/// ```ignore
/// fn subscriptions(&self) -> Vec<Box<dyn Subscription<Msg>>> {
///     vec![Box::new(Every::new(Duration::from_millis(100), || Msg::Tick(Instant::now())))]
/// }
/// ```
pub struct Every<M: Send + 'static> {
    id: SubId,
    interval: Duration,
    make_msg: Box<dyn Fn() -> M + Send + Sync>,
}

impl<M: Send + 'static> Every<M> {
    /// Interval subscription whose id is derived from the interval.
    pub fn new(interval: Duration, make_msg: impl Fn() -> M + Send + Sync + 'static) -> Self {
        let id = interval.as_nanos() as u64 ^ 0x5449_434B;
        Self::with_id(id, interval, make_msg)
    }

    pub fn with_id(
        id: SubId,
        interval: Duration,
        make_msg: impl Fn() -> M + Send + Sync + 'static,
    ) -> Self {
        Self {
            id,
            interval,
            make_msg: Box::new(make_msg),
        }
    }
}

impl<M: Send + 'static> Subscription<M> for Every<M> {
    fn id(&self) -> SubId {
        self.id
    }

    fn run(&self, sender: mpsc::Sender<M>, stop: StopSignal) {
        let mut ticks: u64 = 0;
        while !stop.wait_timeout(self.interval) {
            ticks += 1;
            if sender.send((self.make_msg)()).is_err() {
                break;
            }
        }
        tracing::trace!(sub_id = self.id, ticks, "interval subscription finished");
    }
}
