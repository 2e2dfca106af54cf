//! Frame-driven animation callbacks.
//!
//! The host calls [`AnimationScheduler::tick`] once per display frame with
//! the current clock. Every registered callback is invoked in registration
//! order with a mutable context and that time; a callback returning `false`
//! is finished and is removed once the whole pass is over.
//!
//! Callbacks live in a slot map keyed by [`AnimationId`], so ids stay valid
//! and unique even as slots come and go. Removal only ever happens inside
//! `tick`, after iteration, and registering requires `&mut self`, so a
//! callback can never add or drop slots while the pass is running. Anything
//! registered between two ticks first runs on the next one.

use slotmap::SlotMap;
use tracing::{trace, warn};

use crate::id::{AnimationId, Time};

/// A frame callback. Returns `true` to keep running.
pub type AnimationFn<C> = Box<dyn FnMut(&mut C, Time) -> bool>;

/// Outcome of one [`AnimationScheduler::tick`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Callbacks invoked during the pass.
    pub invoked: usize,
    /// Slots that reported completion and were removed.
    pub finished: Vec<AnimationId>,
}

/// Owns the set of running animations for a context type `C`.
pub struct AnimationScheduler<C: ?Sized> {
    slots: SlotMap<AnimationId, AnimationFn<C>>,
    /// Registration order of live slots.
    order: Vec<AnimationId>,
    last_tick: Option<Time>,
}

impl<C: ?Sized> std::fmt::Debug for AnimationScheduler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationScheduler")
            .field("order", &self.order)
            .field("last_tick", &self.last_tick)
            .finish_non_exhaustive()
    }
}

impl<C: ?Sized> Default for AnimationScheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized> AnimationScheduler<C> {
    pub fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
            order: Vec::new(),
            last_tick: None,
        }
    }

    /// Add a callback. It first runs on the next [`tick`](Self::tick).
    ///
    /// Registration is not deduplicated: registering the same logical
    /// animation twice runs it twice.
    pub fn register<F>(&mut self, callback: F) -> AnimationId
    where
        F: FnMut(&mut C, Time) -> bool + 'static,
    {
        let id = self.slots.insert(Box::new(callback));
        self.order.push(id);
        id
    }

    /// Run every registered callback once with `now`, then drop the ones
    /// that reported completion.
    pub fn tick(&mut self, ctx: &mut C, now: Time) -> TickReport {
        if let Some(previous) = self.last_tick {
            if now < previous {
                warn!(previous, now, "animation clock went backwards");
            }
        }
        self.last_tick = Some(now);

        let mut report = TickReport::default();
        for &id in &self.order {
            let Some(callback) = self.slots.get_mut(id) else {
                continue;
            };
            report.invoked += 1;
            if !callback(ctx, now) {
                report.finished.push(id);
            }
        }

        if !report.finished.is_empty() {
            for id in &report.finished {
                self.slots.remove(*id);
            }
            let slots = &self.slots;
            self.order.retain(|id| slots.contains_key(*id));
        }

        trace!(
            now,
            invoked = report.invoked,
            finished = report.finished.len(),
            "animation tick"
        );
        report
    }

    pub fn is_registered(&self, id: AnimationId) -> bool {
        self.slots.contains_key(id)
    }

    /// Number of live slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Time passed to the most recent tick.
    pub fn last_tick(&self) -> Option<Time> {
        self.last_tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_in_registration_order() {
        let mut scheduler: AnimationScheduler<Vec<u32>> = AnimationScheduler::new();
        for n in 0..3 {
            scheduler.register(move |log: &mut Vec<u32>, _| {
                log.push(n);
                true
            });
        }
        let mut log = Vec::new();
        let report = scheduler.tick(&mut log, 0.0);
        assert_eq!(log, vec![0, 1, 2]);
        assert_eq!(report.invoked, 3);
        assert!(report.finished.is_empty());
    }

    #[test]
    fn false_removes_after_the_pass() {
        let mut scheduler: AnimationScheduler<Vec<&'static str>> = AnimationScheduler::new();
        let once = scheduler.register(|log: &mut Vec<&'static str>, _| {
            log.push("once");
            false
        });
        let forever = scheduler.register(|log: &mut Vec<&'static str>, _| {
            log.push("forever");
            true
        });

        let mut log = Vec::new();
        let report = scheduler.tick(&mut log, 1.0);
        assert_eq!(log, vec!["once", "forever"]);
        assert_eq!(report.finished, vec![once]);
        assert!(!scheduler.is_registered(once));
        assert!(scheduler.is_registered(forever));

        log.clear();
        scheduler.tick(&mut log, 2.0);
        assert_eq!(log, vec!["forever"]);
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn deadline_callback() {
        let mut scheduler: AnimationScheduler<()> = AnimationScheduler::new();
        let id = scheduler.register(|_: &mut (), now| now < 100.0);
        scheduler.tick(&mut (), 99.9);
        assert!(scheduler.is_registered(id));
        scheduler.tick(&mut (), 100.1);
        assert!(!scheduler.is_registered(id));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn registrations_between_ticks_run_next_tick() {
        let mut scheduler: AnimationScheduler<u32> = AnimationScheduler::new();
        let mut count = 0;
        scheduler.tick(&mut count, 0.0);
        scheduler.register(|c: &mut u32, _| {
            *c += 1;
            true
        });
        assert_eq!(count, 0);
        scheduler.tick(&mut count, 1.0);
        assert_eq!(count, 1);
        assert_eq!(scheduler.last_tick(), Some(1.0));
    }

    #[test]
    fn ids_stay_unique_after_removal() {
        let mut scheduler: AnimationScheduler<()> = AnimationScheduler::new();
        let a = scheduler.register(|_: &mut (), _| false);
        scheduler.tick(&mut (), 0.0);
        let b = scheduler.register(|_: &mut (), _| true);
        assert_ne!(a, b);
        assert!(!scheduler.is_registered(a));
    }
}
