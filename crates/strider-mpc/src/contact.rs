//! Contact schedule data model.
//!
//! A [`ContactSequence`] is an ordered timeline of discrete contact
//! configuration changes. Between consecutive events the active contact
//! set is held constant; the in-flight motion of swinging feet is the
//! reference generator's business, the sequence only records discrete
//! footholds.

use std::fmt;

use nalgebra::Vector3;
use strider_core::PlanError;

/// Number of contact points for the quadruped trot topology.
pub const NUM_CONTACTS: usize = 4;

/// Events closer together than this are merged rather than stored as
/// zero-duration holds (see the stance_time = 0 collapse in the planner).
pub const EVENT_MERGE_EPS: f64 = 1e-9;

/// Identifier of a declared contact point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContactId(pub usize);

/// Left-front foot.
pub const LF: ContactId = ContactId(0);
/// Left-hind foot.
pub const LH: ContactId = ContactId(1);
/// Right-front foot.
pub const RF: ContactId = ContactId(2);
/// Right-hind foot.
pub const RH: ContactId = ContactId(3);

// ---------------------------------------------------------------------------
// ContactState
// ---------------------------------------------------------------------------

/// Active-contact flags plus world-frame contact positions for one
/// phase of the schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactState {
    active: [bool; NUM_CONTACTS],
    positions: [Vector3<f64>; NUM_CONTACTS],
}

impl ContactState {
    /// All contacts active at the given positions (full stance).
    #[must_use]
    pub fn standing(positions: [Vector3<f64>; NUM_CONTACTS]) -> Self {
        Self {
            active: [true; NUM_CONTACTS],
            positions,
        }
    }

    /// Only the listed contacts active; the rest are swinging. Positions
    /// for swinging contacts record their pre-swing footholds.
    #[must_use]
    pub fn with_active(
        active_ids: &[ContactId],
        positions: [Vector3<f64>; NUM_CONTACTS],
    ) -> Self {
        let mut active = [false; NUM_CONTACTS];
        for id in active_ids {
            active[id.0] = true;
        }
        Self { active, positions }
    }

    /// Whether the contact is planted in this phase.
    #[must_use]
    pub fn is_active(&self, id: ContactId) -> bool {
        self.active[id.0]
    }

    /// Number of planted contacts.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.iter().filter(|&&a| a).count()
    }

    /// World-frame position of a contact point (foothold for planted
    /// contacts, pre-swing foothold for swinging ones).
    #[must_use]
    pub fn position(&self, id: ContactId) -> Vector3<f64> {
        self.positions[id.0]
    }

    /// All recorded contact positions, indexed by `ContactId`.
    #[must_use]
    pub fn positions(&self) -> &[Vector3<f64>; NUM_CONTACTS] {
        &self.positions
    }
}

// ---------------------------------------------------------------------------
// ContactEvent
// ---------------------------------------------------------------------------

/// A discrete change of contact configuration at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactEvent {
    /// Time of the configuration change, seconds.
    pub time: f64,
    /// Contact configuration holding from this event to the next.
    pub state: ContactState,
}

// ---------------------------------------------------------------------------
// ContactSequence
// ---------------------------------------------------------------------------

/// Ordered timeline of [`ContactEvent`]s with a fixed event budget.
///
/// Invariants: event times strictly increase, `len() <= max_events`,
/// and the first event marks the sequence start.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactSequence {
    events: Vec<ContactEvent>,
    max_events: usize,
}

impl ContactSequence {
    /// Create an empty sequence bounded to `max_events` events.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Vec::with_capacity(max_events),
            max_events,
        }
    }

    /// Install the initial contact configuration at time `t0`.
    pub fn init(&mut self, t0: f64, state: ContactState) {
        self.events.clear();
        self.events.push(ContactEvent { time: t0, state });
    }

    /// Append a configuration change.
    ///
    /// An event within [`EVENT_MERGE_EPS`] of the last one replaces the
    /// last event's state in place instead of storing a zero-duration
    /// hold. Earlier times are rejected; exceeding the budget is a
    /// capacity error.
    pub fn push(&mut self, time: f64, state: ContactState) -> Result<(), PlanError> {
        if let Some(last) = self.events.last_mut() {
            if time < last.time - EVENT_MERGE_EPS {
                return Err(PlanError::NonMonotonicEvent {
                    time,
                    last: last.time,
                });
            }
            if (time - last.time).abs() <= EVENT_MERGE_EPS {
                last.state = state;
                return Ok(());
            }
        }
        if self.events.len() >= self.max_events {
            return Err(PlanError::CapacityExceeded {
                required: self.events.len() + 1,
                max_events: self.max_events,
            });
        }
        self.events.push(ContactEvent { time, state });
        Ok(())
    }

    /// Number of events currently in the timeline.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the timeline holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Event budget.
    #[must_use]
    pub const fn max_events(&self) -> usize {
        self.max_events
    }

    /// The ordered events.
    #[must_use]
    pub fn events(&self) -> &[ContactEvent] {
        &self.events
    }

    /// Event times in order.
    #[must_use]
    pub fn event_times(&self) -> Vec<f64> {
        self.events.iter().map(|e| e.time).collect()
    }

    /// Start time of the timeline (time of the first event).
    #[must_use]
    pub fn start_time(&self) -> Option<f64> {
        self.events.first().map(|e| e.time)
    }

    /// Time of the last configuration change. The final configuration
    /// holds indefinitely past this.
    #[must_use]
    pub fn horizon_end(&self) -> Option<f64> {
        self.events.last().map(|e| e.time)
    }

    /// Contact configuration in force at time `t`. Before the first
    /// event this is the first event's configuration.
    #[must_use]
    pub fn phase_at(&self, t: f64) -> Option<&ContactState> {
        let idx = self
            .events
            .iter()
            .rposition(|e| e.time <= t)
            .unwrap_or(0);
        self.events.get(idx).map(|e| &e.state)
    }

    /// Drop the first event. Used by the rolling horizon once an event
    /// time has passed.
    pub fn pop_front(&mut self) -> Option<ContactEvent> {
        if self.events.is_empty() {
            None
        } else {
            Some(self.events.remove(0))
        }
    }
}

impl fmt::Display for ContactSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ContactSequence ({}/{} events):", self.len(), self.max_events)?;
        for e in &self.events {
            let flags: String = e
                .state
                .active
                .iter()
                .map(|&a| if a { '#' } else { '.' })
                .collect();
            writeln!(f, "  t={:8.4}  [{}]", e.time, flags)?;
        }
        Ok(())
    }
}
