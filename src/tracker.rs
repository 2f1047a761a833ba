//! Identity correlation and posture transition tracking.
//!
//! The detector gives no stable identity, so people are correlated across
//! frames by slot. With the default `ByIndex` assignment a slot is simply the
//! person's position in the filtered detection list. This misattributes
//! identity whenever the detector reorders people or the head count changes,
//! and slots are never cleared: a slot left empty keeps its last label and is
//! compared against whoever next lands on that index.
//!
//! `GreedyIou` is an opt-in alternative that matches people to the slot whose
//! last box overlaps them most. It changes observable behaviour and must be
//! selected explicitly. IoU slots are retired once they go unmatched for more
//! than `max_misses` consecutive frames.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::detect::{BoundingBox, Detection};
use crate::posture::{PostureClassifier, PostureLabel};

pub const DEFAULT_MIN_IOU: f32 = 0.3;
/// About one second at the default 20 ms frame interval.
pub const DEFAULT_MAX_MISSES: u32 = 50;

/// Outcome of comparing a slot's previous and current labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionEvent {
    None,
    StandingUp,
    SittingDown,
}

impl TransitionEvent {
    /// Compare the label recorded for a slot with the one observed now.
    pub fn between(previous: Option<PostureLabel>, current: PostureLabel) -> Self {
        match (previous, current) {
            (Some(PostureLabel::Sitting), PostureLabel::Standing) => TransitionEvent::StandingUp,
            (Some(PostureLabel::Standing), PostureLabel::Sitting) => TransitionEvent::SittingDown,
            _ => TransitionEvent::None,
        }
    }

    pub fn is_some(&self) -> bool {
        !matches!(self, TransitionEvent::None)
    }
}

/// How people in a frame are mapped onto tracked slots.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SlotAssignment {
    #[default]
    ByIndex,
    GreedyIou { min_iou: f32, max_misses: u32 },
}

/// One visible person after tracking.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TrackedPerson {
    pub slot: usize,
    pub bbox: BoundingBox,
    pub label: PostureLabel,
    pub transition: TransitionEvent,
}

#[derive(Clone, Copy, Debug)]
struct Slot {
    label: PostureLabel,
    bbox: BoundingBox,
    /// Consecutive frames without a match. Only IoU assignment reads it.
    misses: u32,
}

/// Per-session slot state.
///
/// Single writer: `update` is called once per processed frame from the frame
/// loop and nowhere else.
#[derive(Debug, Default)]
pub struct PostureTracker {
    slots: BTreeMap<usize, Slot>,
    assignment: SlotAssignment,
    next_slot: usize,
}

impl PostureTracker {
    pub fn new(assignment: SlotAssignment) -> Self {
        Self {
            slots: BTreeMap::new(),
            assignment,
            next_slot: 0,
        }
    }

    /// Label last recorded for a slot, if it was ever populated.
    pub fn label(&self, slot: usize) -> Option<PostureLabel> {
        self.slots.get(&slot).map(|s| s.label)
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Forget every slot. Called when the video source restarts.
    pub fn reset(&mut self) {
        self.slots.clear();
        self.next_slot = 0;
    }

    /// Classify, correlate and record one frame's persons.
    ///
    /// Returns one entry per person in filter order. A slot seen for the
    /// first time never carries a transition. With index assignment, slots
    /// not matched this frame are left untouched. With IoU assignment they
    /// count a miss and are dropped after `max_misses` of them.
    pub fn update(
        &mut self,
        persons: &[Detection],
        classifier: &PostureClassifier,
    ) -> Vec<TrackedPerson> {
        let slots: Vec<usize> = match self.assignment {
            SlotAssignment::ByIndex => (0..persons.len()).collect(),
            SlotAssignment::GreedyIou { min_iou, .. } => self.assign_by_iou(persons, min_iou),
        };

        let tracked: Vec<TrackedPerson> = persons
            .iter()
            .zip(slots.iter().copied())
            .map(|(person, slot)| {
                let label = classifier.classify(&person.bbox);
                let transition = TransitionEvent::between(self.label(slot), label);
                self.slots.insert(
                    slot,
                    Slot {
                        label,
                        bbox: person.bbox,
                        misses: 0,
                    },
                );
                self.next_slot = self.next_slot.max(slot + 1);
                TrackedPerson {
                    slot,
                    bbox: person.bbox,
                    label,
                    transition,
                }
            })
            .collect();

        if let SlotAssignment::GreedyIou { max_misses, .. } = self.assignment {
            self.retire_unmatched(&slots, max_misses);
        }
        tracked
    }

    fn retire_unmatched(&mut self, matched: &[usize], max_misses: u32) {
        for (slot, state) in self.slots.iter_mut() {
            if !matched.contains(slot) {
                state.misses = state.misses.saturating_add(1);
            }
        }
        self.slots.retain(|slot, state| {
            let keep = state.misses <= max_misses;
            if !keep {
                log::debug!("slot {} retired after {} missed frames", slot, state.misses);
            }
            keep
        });
    }

    fn assign_by_iou(&self, persons: &[Detection], min_iou: f32) -> Vec<usize> {
        let mut pairs: Vec<(usize, usize, f32)> = Vec::new();
        for (i, person) in persons.iter().enumerate() {
            for (&slot, state) in &self.slots {
                let iou = person.bbox.iou(&state.bbox);
                if iou >= min_iou {
                    pairs.push((i, slot, iou));
                }
            }
        }
        pairs.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(Ordering::Equal));

        let mut assigned: Vec<Option<usize>> = vec![None; persons.len()];
        let mut taken: HashSet<usize> = HashSet::new();
        for (i, slot, _) in pairs {
            if assigned[i].is_none() && !taken.contains(&slot) {
                assigned[i] = Some(slot);
                taken.insert(slot);
            }
        }

        let mut next = self.next_slot;
        assigned
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    let fresh = next;
                    next += 1;
                    fresh
                })
            })
            .collect()
    }
}
