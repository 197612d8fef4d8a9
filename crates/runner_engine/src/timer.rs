use std::time::{Duration, Instant};

pub const COUNTDOWN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    CountdownTick,
    NavigationDue,
}

/// The one-shot navigation timer and its repeating countdown.
///
/// Both are armed and cancelled together; there is never more than one armed
/// navigation.
#[derive(Debug, Clone)]
pub struct TimerSet {
    navigation_at: Option<Instant>,
    next_tick_at: Option<Instant>,
    tick_interval: Duration,
}

impl Default for TimerSet {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerSet {
    pub fn new() -> Self {
        Self::with_tick_interval(COUNTDOWN_INTERVAL)
    }

    pub fn with_tick_interval(tick_interval: Duration) -> Self {
        Self {
            navigation_at: None,
            next_tick_at: None,
            tick_interval,
        }
    }

    /// Arms a navigation `delay` after `now`, replacing any armed one.
    pub fn arm(&mut self, now: Instant, delay: Duration) {
        self.navigation_at = Some(now + delay);
        self.next_tick_at = Some(now + self.tick_interval);
    }

    pub fn cancel(&mut self) {
        self.navigation_at = None;
        self.next_tick_at = None;
    }

    pub fn is_armed(&self) -> bool {
        self.navigation_at.is_some()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.navigation_at, self.next_tick_at) {
            (Some(nav), Some(tick)) => Some(nav.min(tick)),
            (nav, tick) => nav.or(tick),
        }
    }

    /// Returns the events due at `now`, oldest first.
    ///
    /// Ticks falling on or after the navigation deadline are dropped; once the
    /// navigation fires the set is disarmed.
    pub fn poll(&mut self, now: Instant) -> Vec<TimerEvent> {
        let Some(navigation_at) = self.navigation_at else {
            return Vec::new();
        };
        let mut events = Vec::new();
        while let Some(tick_at) = self.next_tick_at {
            if tick_at > now || tick_at >= navigation_at {
                break;
            }
            events.push(TimerEvent::CountdownTick);
            self.next_tick_at = Some(tick_at + self.tick_interval);
        }
        if navigation_at <= now {
            events.push(TimerEvent::NavigationDue);
            self.cancel();
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_then_fires_once() {
        let start = Instant::now();
        let mut timers = TimerSet::new();
        timers.arm(start, Duration::from_millis(5_000));

        assert!(timers.poll(start + Duration::from_millis(999)).is_empty());
        assert_eq!(
            timers.poll(start + Duration::from_millis(2_500)),
            vec![TimerEvent::CountdownTick, TimerEvent::CountdownTick]
        );
        assert_eq!(
            timers.poll(start + Duration::from_millis(5_000)),
            vec![
                TimerEvent::CountdownTick,
                TimerEvent::CountdownTick,
                TimerEvent::NavigationDue
            ]
        );
        assert!(!timers.is_armed());
        assert!(timers.poll(start + Duration::from_secs(60)).is_empty());
    }

    #[test]
    fn cancel_clears_both_timers() {
        let start = Instant::now();
        let mut timers = TimerSet::new();
        timers.arm(start, Duration::from_secs(5));
        assert_eq!(timers.next_deadline(), Some(start + Duration::from_secs(1)));
        timers.cancel();
        assert_eq!(timers.next_deadline(), None);
        assert!(timers.poll(start + Duration::from_secs(10)).is_empty());
    }

    #[test]
    fn rearming_replaces_the_pending_navigation() {
        let start = Instant::now();
        let mut timers = TimerSet::new();
        timers.arm(start, Duration::from_secs(5));
        timers.arm(start + Duration::from_secs(3), Duration::from_secs(5));
        let events = timers.poll(start + Duration::from_secs(6));
        assert!(!events.contains(&TimerEvent::NavigationDue));
        assert!(timers.is_armed());
    }
}
