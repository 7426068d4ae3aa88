//! Trajectory lineage
//!
//! A run's trajectory is a chain of frozen segments plus a growing tail:
//!
//! ```text
//! [seg 0..=120] <- [seg 121..=365] <- tail [366, 367, ...]
//! ```
//!
//! Sealing moves the tail into a new frozen segment (no state is copied),
//! so taking a snapshot is amortized O(1). A branch links to the frozen
//! chain with a visibility cap at the fork day: the parent may keep
//! appending without the branch ever seeing those days, and the branch
//! never writes into the parent's segments.

use crate::core::time::DayIndex;
use crate::models::state::SimulationState;
use std::sync::Arc;

/// Frozen, shareable run of consecutive days
#[derive(Debug)]
pub struct Segment {
    /// Earlier segment and the last day of it that is visible from here
    parent: Option<(Arc<Segment>, DayIndex)>,
    first_day: DayIndex,
    states: Vec<Arc<SimulationState>>,
}

impl Segment {
    fn last_day(&self) -> Option<DayIndex> {
        if self.states.is_empty() {
            None
        } else {
            Some(self.first_day + self.states.len() as DayIndex - 1)
        }
    }

    fn get(&self, day: DayIndex) -> Option<&Arc<SimulationState>> {
        if day < self.first_day {
            return None;
        }
        self.states.get((day - self.first_day) as usize)
    }
}

/// Locate `day` in a frozen chain whose head is visible up to `cap`
fn lookup(head: &Arc<Segment>, cap: DayIndex, day: DayIndex) -> Option<Arc<SimulationState>> {
    if day > cap {
        return None;
    }
    let mut segment = head;
    loop {
        if day >= segment.first_day {
            return segment.get(day).cloned();
        }
        match &segment.parent {
            Some((parent, parent_cap)) if day <= *parent_cap => segment = parent,
            _ => return None,
        }
    }
}

/// Read-only reference to a recorded day and all days before it
#[derive(Debug, Clone)]
pub struct Lineage {
    head: Arc<Segment>,
    cap: DayIndex,
}

impl Lineage {
    /// Lineage consisting of a single detached state (restored checkpoints)
    pub fn detached(state: Arc<SimulationState>) -> Self {
        let day = state.day();
        Self {
            head: Arc::new(Segment {
                parent: None,
                first_day: day,
                states: vec![state],
            }),
            cap: day,
        }
    }

    pub fn day(&self) -> DayIndex {
        self.cap
    }

    pub fn get(&self, day: DayIndex) -> Option<Arc<SimulationState>> {
        lookup(&self.head, self.cap, day)
    }

    /// True if both lineages reference the same recorded state allocation
    pub fn shares_state_with(&self, other: &Lineage, day: DayIndex) -> bool {
        match (self.get(day), other.get(day)) {
            (Some(a), Some(b)) => Arc::ptr_eq(&a, &b),
            _ => false,
        }
    }
}

/// Ordered states of one run, shared read-only with its branches
#[derive(Debug, Clone)]
pub struct Trajectory {
    sealed: Option<Lineage>,
    tail_first_day: DayIndex,
    tail: Vec<Arc<SimulationState>>,
}

impl Trajectory {
    /// Trajectory starting with a day-0 (or restored) state
    pub fn new(initial: Arc<SimulationState>) -> Self {
        Self {
            sealed: None,
            tail_first_day: initial.day(),
            tail: vec![initial],
        }
    }

    /// Trajectory continuing from a recorded day of another trajectory
    pub fn branch(lineage: Lineage) -> Self {
        let next = lineage.day() + 1;
        Self {
            sealed: Some(lineage),
            tail_first_day: next,
            tail: Vec::new(),
        }
    }

    /// First day reachable through this trajectory
    pub fn first_day(&self) -> DayIndex {
        let mut day = self.tail_first_day;
        if let Some(lineage) = &self.sealed {
            let mut segment = &lineage.head;
            day = segment.first_day;
            while let Some((parent, _)) = &segment.parent {
                segment = parent;
                day = segment.first_day;
            }
        }
        day
    }

    /// Most recent recorded day
    pub fn latest_day(&self) -> DayIndex {
        match self.tail.len() {
            0 => self.tail_first_day.saturating_sub(1),
            n => self.tail_first_day + n as DayIndex - 1,
        }
    }

    pub fn latest(&self) -> Option<Arc<SimulationState>> {
        self.get(self.latest_day())
    }

    pub fn get(&self, day: DayIndex) -> Option<Arc<SimulationState>> {
        if day >= self.tail_first_day {
            return self.tail.get((day - self.tail_first_day) as usize).cloned();
        }
        self.sealed.as_ref().and_then(|lineage| lineage.get(day))
    }

    /// Append the next day's state
    pub fn push(&mut self, state: Arc<SimulationState>) {
        debug_assert_eq!(state.day(), self.latest_day() + 1);
        self.tail.push(state);
    }

    /// Freeze the tail and return a lineage capped at `day`
    ///
    /// Returns `None` if `day` was never recorded by this trajectory.
    pub fn lineage_at(&mut self, day: DayIndex) -> Option<Lineage> {
        if day > self.latest_day() || day < self.first_day() {
            return None;
        }
        self.seal();
        let head = self.sealed.as_ref()?.head.clone();
        Some(Lineage { head, cap: day })
    }

    fn seal(&mut self) {
        if self.tail.is_empty() {
            return;
        }
        let states = std::mem::take(&mut self.tail);
        let segment = Segment {
            parent: self.sealed.take().map(|l| (l.head, l.cap)),
            first_day: self.tail_first_day,
            states,
        };
        let cap = segment.last_day().unwrap_or(self.tail_first_day);
        self.tail_first_day = cap + 1;
        self.sealed = Some(Lineage {
            head: Arc::new(segment),
            cap,
        });
    }

    /// All visible states in day order
    pub fn states(&self) -> Vec<Arc<SimulationState>> {
        let first = self.first_day();
        (first..=self.latest_day())
            .filter_map(|day| self.get(day))
            .collect()
    }
}
