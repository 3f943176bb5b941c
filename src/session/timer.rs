use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Rc::new(Cell::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by);
    }

    /// Moves to an absolute offset from the origin. Never goes backwards.
    pub fn set_elapsed(&self, elapsed: Duration) {
        if elapsed > self.offset.get() {
            self.offset.set(elapsed);
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.offset.get()
    }
}

#[derive(Debug, Clone)]
struct Armed<K> {
    key: K,
    deadline: Instant,
}

/// One-shot timer keyed by the thing it belongs to. Arming replaces any
/// outstanding deadline.
#[derive(Debug, Clone)]
pub struct CancellableTimer<K> {
    armed: Option<Armed<K>>,
}

impl<K> Default for CancellableTimer<K> {
    fn default() -> Self {
        Self { armed: None }
    }
}

impl<K: Clone> CancellableTimer<K> {
    /// Returns the key of the timer that was cancelled to make room, if any.
    pub fn arm(&mut self, key: K, now: Instant, delay: Duration) -> Option<K> {
        let replaced = self.cancel();
        self.armed = Some(Armed {
            key,
            deadline: now + delay,
        });
        replaced
    }

    pub fn cancel(&mut self) -> Option<K> {
        self.armed.take().map(|armed| armed.key)
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn key(&self) -> Option<&K> {
        self.armed.as_ref().map(|armed| &armed.key)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.armed.as_ref().map(|armed| armed.deadline)
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline().map(|deadline| now >= deadline).unwrap_or(false)
    }

    /// Disarms and yields the key once the deadline has passed.
    pub fn fire_if_due(&mut self, now: Instant) -> Option<K> {
        if !self.is_due(now) {
            return None;
        }
        self.cancel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn fires_once_after_deadline() {
        let clock = ManualClock::new();
        let mut timer = CancellableTimer::default();
        timer.arm("a", clock.now(), ms(100));

        clock.advance(ms(99));
        assert_eq!(timer.fire_if_due(clock.now()), None);
        clock.advance(ms(1));
        assert_eq!(timer.fire_if_due(clock.now()), Some("a"));
        assert_eq!(timer.fire_if_due(clock.now()), None);
        assert!(!timer.is_armed());
    }

    #[test]
    fn rearming_pushes_the_deadline_out() {
        let clock = ManualClock::new();
        let mut timer = CancellableTimer::default();
        assert_eq!(timer.arm(1, clock.now(), ms(100)), None);
        clock.advance(ms(80));
        assert_eq!(timer.arm(1, clock.now(), ms(100)), Some(1));
        clock.advance(ms(80));
        assert_eq!(timer.fire_if_due(clock.now()), None);
        clock.advance(ms(20));
        assert_eq!(timer.fire_if_due(clock.now()), Some(1));
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let clock = ManualClock::new();
        let mut timer = CancellableTimer::default();
        timer.arm("stale", clock.now(), ms(10));
        assert_eq!(timer.cancel(), Some("stale"));
        clock.advance(ms(50));
        assert_eq!(timer.fire_if_due(clock.now()), None);
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let other = clock.clone();
        clock.advance(ms(5));
        other.set_elapsed(ms(3));
        assert_eq!(other.elapsed(), ms(5));
        assert_eq!(clock.now(), other.now());
    }
}
