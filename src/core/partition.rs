//! Capacity-bounded grouping by ability with snake-order age balancing.
//!
//! Steps per ability bucket:
//! 1. sort by birth date ascending (unknown dates first), then name, then id;
//! 2. reorder front/back alternately (oldest, youngest, 2nd oldest, ...);
//! 3. deal the sequence over the bucket's groups with a serpentine cursor
//!    (0, 1, .., k-1, k-1, .., 0, 0, 1, ..), skipping full groups.
//!
//! Buckets are visited in ability-code order so group numbering is stable.

use crate::domain::model::{AbilityCode, Participant, ParticipantId};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedGroup {
    pub ability: AbilityCode,
    pub members: Vec<ParticipantId>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionPlan {
    pub groups: Vec<PlannedGroup>,
    /// Participants no group had room for.
    pub unassigned: Vec<ParticipantId>,
}

/// Result of dealing one bucket over a fixed set of group slots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Distribution {
    pub slots: Vec<Vec<ParticipantId>>,
    pub unassigned: Vec<ParticipantId>,
}

/// Splits `participants` into groups of at most `capacity`.
///
/// # Panics
///
/// Panics if `capacity` is zero.
pub fn partition(participants: &[Participant], capacity: usize) -> PartitionPlan {
    assert!(capacity > 0, "partition capacity must be positive");

    let mut plan = PartitionPlan::default();
    for (ability, bucket) in bucket_by_ability(participants) {
        let group_count = bucket.len().div_ceil(capacity);
        let distribution = distribute(&bucket, &vec![capacity; group_count]);

        plan.groups
            .extend(distribution.slots.into_iter().map(|members| PlannedGroup {
                ability: ability.clone(),
                members,
            }));
        plan.unassigned.extend(distribution.unassigned);
    }

    tracing::debug!(
        "Partitioned {} participants into {} groups ({} unassigned)",
        participants.len(),
        plan.groups.len(),
        plan.unassigned.len()
    );
    plan
}

/// Participants per ability code, each bucket already in sort order.
pub fn bucket_by_ability(participants: &[Participant]) -> BTreeMap<AbilityCode, Vec<&Participant>> {
    let mut buckets: BTreeMap<AbilityCode, Vec<&Participant>> = BTreeMap::new();
    for participant in participants {
        buckets
            .entry(participant.ability.clone())
            .or_default()
            .push(participant);
    }
    for bucket in buckets.values_mut() {
        sort_bucket(bucket);
    }
    buckets
}

pub fn sort_bucket(bucket: &mut [&Participant]) {
    bucket.sort_by(|a, b| {
        a.birth_date
            .cmp(&b.birth_date)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Alternates between the front and the back of `sorted`.
pub fn snake_order<T: Copy>(sorted: &[T]) -> Vec<T> {
    let mut out = Vec::with_capacity(sorted.len());
    let (mut front, mut back) = (0, sorted.len());
    let mut take_front = true;

    while front < back {
        if take_front {
            out.push(sorted[front]);
            front += 1;
        } else {
            back -= 1;
            out.push(sorted[back]);
        }
        take_front = !take_front;
    }
    out
}

/// Deals an already sorted bucket over slots with the given free places.
pub fn distribute(sorted_bucket: &[&Participant], free_places: &[usize]) -> Distribution {
    let mut remaining = free_places.to_vec();
    let mut distribution = Distribution {
        slots: vec![Vec::new(); remaining.len()],
        unassigned: Vec::new(),
    };
    let mut turns = Serpentine::new(remaining.len());

    for participant in snake_order(sorted_bucket) {
        let slot = (0..2 * remaining.len())
            .filter_map(|_| turns.next())
            .find(|&slot| remaining[slot] > 0);

        match slot {
            Some(slot) => {
                remaining[slot] -= 1;
                distribution.slots[slot].push(participant.id.clone());
            }
            None => {
                tracing::warn!(
                    "No free place for participant {} ({})",
                    participant.id,
                    participant.ability
                );
                distribution.unassigned.push(participant.id.clone());
            }
        }
    }
    distribution
}

/// Slot indices 0..n then n-1..0, repeating.
struct Serpentine {
    len: usize,
    step: usize,
}

impl Serpentine {
    fn new(len: usize) -> Self {
        Self { len, step: 0 }
    }
}

impl Iterator for Serpentine {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        let period = 2 * self.len;
        let pos = self.step % period;
        self.step += 1;
        Some(if pos < self.len { pos } else { period - 1 - pos })
    }
}
