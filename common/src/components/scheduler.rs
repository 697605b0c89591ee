// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL2). Also, it is
// "Incompatible With Secondary Licenses", as defined by the MPL2.
// If a copy of the MPL2 was not distributed with this file, you can
// obtain one at https://mozilla.org/MPL/2.0/.

/// Type for unsigned time, in device cycles
pub type Time = u64;
/// Type for signed time, in device cycles
pub type TimeS = i64;

/// A scheduler used by the emulation core to defer work.
/// It is generic over the possible events and keeps them in a vector
/// sorted by descending execution time; the next event is always last.
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Scheduler<E: Kind> {
    /// Current time of the scheduler.
    time: Time,
    /// Time of the next event.
    next: Time,
    /// Token handed out for the next scheduled event.
    next_token: u32,
    /// Events currently awaiting execution.
    #[cfg_attr(feature = "serde", serde(bound = ""))]
    events: Vec<ScheduledEvent<E>>,
}

impl<E: Kind> Scheduler<E> {
    /// Schedule an event of the given kind after the given amount of
    /// cycles have elapsed from now. A negative amount saturates to now;
    /// the clock never moves backwards. Events with equal execution time
    /// fire in the order they were scheduled.
    /// The returned token can be used to remove the event again.
    pub fn schedule(&mut self, kind: E, after: TimeS) -> EventToken {
        let time = self.time.saturating_add_signed(after.max(0));
        let token = EventToken(self.next_token);
        self.next_token = self.next_token.wrapping_add(1);
        let event = ScheduledEvent {
            kind,
            execute_at: time,
            token,
        };
        self.events.push(event);

        // Keep the list sorted by swapping the new event towards the front.
        // `>=` keeps it in front of events with the same time, so the older
        // one stays closer to the tail and is popped first.
        for idx in (1..self.events.len()).rev() {
            let other = self.events[idx - 1];
            if time >= other.execute_at {
                self.events[idx] = other;
            } else {
                self.events[idx] = event;
                self.next = self.events.last().unwrap().execute_at;
                return token;
            }
        }
        // The loop exited without finding a later event, this one is the latest
        self.events[0] = event;
        self.next = self.events.last().unwrap().execute_at;
        token
    }

    /// Advance the clock by the given amount of ticks.
    #[inline]
    pub fn advance(&mut self, by: Time) {
        self.time += by;
    }

    /// Get the next pending event. If no event is due yet, returns None.
    #[inline]
    pub fn get_next_pending(&mut self) -> Option<Event<E>> {
        if self.next <= self.time && !self.events.is_empty() {
            let event = self.events.pop().unwrap();
            self.update_next();
            Some(Event {
                kind: event.kind,
                late_by: (self.time - event.execute_at) as TimeS,
            })
        } else {
            None
        }
    }

    #[inline]
    pub fn has_events(&self) -> bool {
        self.next <= self.time
    }

    /// Return the next event immediately, and set the current time to
    /// the event's execution time. This is used while the CPU is halted.
    pub fn pop(&mut self) -> Event<E> {
        let event = self.events.pop().unwrap();
        self.time = self.time.max(event.execute_at);
        self.update_next();
        Event {
            kind: event.kind,
            late_by: (self.time - event.execute_at) as TimeS,
        }
    }

    /// Cancel all events of a given kind. Somewhat expensive.
    pub fn cancel(&mut self, evt: E) {
        self.events.retain(|e| e.kind != evt);
        self.update_next();
    }

    /// Cancel the single event a `schedule` call handed out this token for.
    /// Returns false if it already fired or was cancelled.
    pub fn cancel_token(&mut self, token: EventToken) -> bool {
        let idx = self.events.iter().position(|e| e.token == token);
        if let Some(idx) = idx {
            self.events.remove(idx);
            self.update_next();
        }
        idx.is_some()
    }

    /// Current time of the device clock. Monotonically non-decreasing.
    #[inline]
    pub fn now(&self) -> Time {
        self.time
    }

    /// Execution time of the earliest pending event,
    /// or `Time::MAX` if nothing is scheduled.
    #[inline]
    pub fn next_at(&self) -> Time {
        self.next
    }

    fn update_next(&mut self) {
        self.next = self
            .events
            .last()
            .map(|e| e.execute_at)
            .unwrap_or(Time::MAX);
    }
}

impl<E: Kind> Default for Scheduler<E> {
    fn default() -> Self {
        Self {
            time: 0,
            next: Time::MAX,
            next_token: 0,
            events: Vec::with_capacity(8),
        }
    }
}

/// An event awaiting execution
#[derive(Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
struct ScheduledEvent<E: Kind> {
    /// Kind of event to execute
    #[cfg_attr(feature = "serde", serde(bound = ""))]
    kind: E,
    /// Time of the scheduler to execute it at
    execute_at: Time,
    /// Token handed to the scheduling caller.
    token: EventToken,
}

/// Opaque handle to a scheduled event.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct EventToken(u32);

/// Trait for event kinds.
#[cfg(feature = "serde")]
pub trait Kind:
    for<'de> serde::Deserialize<'de> + serde::Serialize + PartialEq + Copy + Clone
{
}
#[cfg(not(feature = "serde"))]
pub trait Kind: PartialEq + Copy + Clone {}

/// Event that is ready to be handled.
#[derive(Copy, Clone)]
#[cfg_attr(test, derive(Debug, PartialEq))]
pub struct Event<E: Kind> {
    /// The kind of event to handle
    pub kind: E,
    /// By how many ticks the event was delayed. For example:
    /// - Event was scheduled to be executed at tick 1000
    /// - Scheduler ran until 1010 before the event got handled
    /// - `late_by` will be 1010 - 1000 = 10.
    pub late_by: TimeS,
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
    enum TestEvent {
        #[default]
        A,
        B,
        C,
    }

    impl Kind for TestEvent {}

    #[test]
    fn test_basic() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule(TestEvent::A, 10);
        scheduler.schedule(TestEvent::B, 5);
        scheduler.schedule(TestEvent::C, 15);
        assert_eq!(scheduler.get_next_pending(), None);
        assert_eq!(scheduler.next_at(), 5);

        scheduler.advance(5);
        assert_eq!(
            scheduler.get_next_pending(),
            Some(Event {
                kind: TestEvent::B,
                late_by: 0
            })
        );
        assert_eq!(scheduler.get_next_pending(), None);

        scheduler.advance(5);
        assert_eq!(
            scheduler.get_next_pending(),
            Some(Event {
                kind: TestEvent::A,
                late_by: 0
            })
        );
        assert_eq!(scheduler.get_next_pending(), None);

        scheduler.advance(5);
        assert_eq!(
            scheduler.get_next_pending(),
            Some(Event {
                kind: TestEvent::C,
                late_by: 0
            })
        );
        assert_eq!(scheduler.get_next_pending(), None);
    }

    #[test]
    fn test_equal_times_fire_in_insertion_order() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule(TestEvent::A, 10);
        scheduler.schedule(TestEvent::B, 10);
        scheduler.schedule(TestEvent::C, 5);

        scheduler.advance(20);
        assert_eq!(scheduler.get_next_pending().unwrap().kind, TestEvent::C);
        assert_eq!(scheduler.get_next_pending().unwrap().kind, TestEvent::A);
        assert_eq!(scheduler.get_next_pending().unwrap().kind, TestEvent::B);
        assert_eq!(scheduler.get_next_pending(), None);
    }

    #[test]
    fn test_cancel() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule(TestEvent::A, 10);
        scheduler.schedule(TestEvent::A, 19);
        scheduler.schedule(TestEvent::B, 5);
        scheduler.schedule(TestEvent::C, 15);
        scheduler.cancel(TestEvent::A);

        scheduler.advance(20);
        assert_eq!(
            scheduler.get_next_pending(),
            Some(Event {
                kind: TestEvent::B,
                late_by: 15
            })
        );
        assert_eq!(
            scheduler.get_next_pending(),
            Some(Event {
                kind: TestEvent::C,
                late_by: 5
            })
        );
        assert_eq!(scheduler.get_next_pending(), None);
    }

    #[test]
    fn test_cancel_token() {
        let mut scheduler = Scheduler::default();
        let token = scheduler.schedule(TestEvent::A, 10);
        scheduler.schedule(TestEvent::B, 5);
        assert!(scheduler.cancel_token(token));
        assert!(!scheduler.cancel_token(token));

        scheduler.advance(20);
        assert_eq!(scheduler.get_next_pending().unwrap().kind, TestEvent::B);
        assert_eq!(scheduler.get_next_pending(), None);
    }

    #[test]
    fn test_negative_delta_fires_now() {
        let mut scheduler = Scheduler::default();
        scheduler.advance(100);
        scheduler.schedule(TestEvent::A, -20);
        assert_eq!(scheduler.next_at(), 100);
        assert_eq!(scheduler.get_next_pending().unwrap().kind, TestEvent::A);
        assert_eq!(scheduler.now(), 100);
    }

    #[test]
    fn test_pop() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule(TestEvent::A, 10);
        scheduler.schedule(TestEvent::B, 5);
        scheduler.schedule(TestEvent::C, 15);

        assert_eq!(scheduler.pop().kind, TestEvent::B);
        assert_eq!(scheduler.now(), 5);
        assert_eq!(scheduler.pop().kind, TestEvent::A);
        assert_eq!(scheduler.now(), 10);
        assert_eq!(scheduler.pop().kind, TestEvent::C);
        assert_eq!(scheduler.now(), 15);
        assert_eq!(scheduler.next_at(), Time::MAX);
    }
}
