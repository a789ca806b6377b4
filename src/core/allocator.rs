//! Weekly (re-)grouping, manual moves and the read-only views over them.
//!
//! Week 1 throws away every group and membership of the program and
//! partitions from scratch. Later weeks keep the groups and deactivate only
//! that week's memberships. Within each ability bucket, participants whose
//! reference group (same week on a re-run, else the previous week) still has
//! room stay there; newcomers and overflow are snake-dealt over the remaining
//! places, reusing groups in creation order and adding groups only when the
//! bucket no longer fits.

use crate::core::ledger::Transition;
use crate::core::partition::{bucket_by_ability, distribute, partition};
use crate::core::store::{RosterStore, Transaction};
use crate::domain::model::{
    AbilityCode, Group, GroupId, Membership, Movement, Participant, ParticipantId, Program,
    ProgramId,
};
use crate::utils::error::{RosterError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

pub const ALLOCATOR_ACTOR: &str = "allocator";
pub const WEEKLY_REASON: &str = "weekly allocation";
pub const BULK_REASON: &str = "bulk move";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AllocationReport {
    pub week: u32,
    pub groups_created: usize,
    pub assigned: usize,
    pub unassigned: usize,
    pub movements: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkMoveReport {
    pub moved: usize,
    /// Ids not in the destination's program, already in the group, or repeated.
    pub skipped: Vec<ParticipantId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupView {
    pub group: Group,
    pub members: Vec<Participant>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub group_id: GroupId,
    pub name: String,
    pub ability: AbilityCode,
    pub instructor: Option<String>,
    pub members: usize,
    pub capacity: usize,
    pub average_age: f64,
}

fn validate_week(program: &Program, week: u32) -> Result<()> {
    if week == 0 || week > program.max_weeks {
        return Err(RosterError::validation(format!(
            "Week {} is outside 1..={} for program {}",
            week, program.max_weeks, program.id
        )));
    }
    Ok(())
}

fn next_group_name(groups: &[Group], ability: &AbilityCode) -> String {
    let taken = groups.iter().filter(|g| &g.ability == ability).count();
    format!("{}-{}", ability, taken + 1)
}

fn new_group(program_id: &ProgramId, groups: &[Group], ability: &AbilityCode, capacity: usize, week: u32) -> Group {
    Group {
        id: GroupId::generate(),
        name: next_group_name(groups, ability),
        program_id: program_id.clone(),
        ability: ability.clone(),
        instructor: None,
        capacity,
        created_week: week,
    }
}

fn membership(participant_id: ParticipantId, group_id: GroupId, week: u32, now: DateTime<Utc>) -> Membership {
    Membership {
        participant_id,
        group_id,
        week,
        active: true,
        joined_at: now,
        left_at: None,
    }
}

fn active_groups_for_week(program: &Program, week: u32) -> HashMap<ParticipantId, GroupId> {
    program
        .memberships
        .iter()
        .filter(|m| m.active && m.week == week)
        .map(|m| (m.participant_id.clone(), m.group_id.clone()))
        .collect()
}

pub struct WeeklyAllocator<'a> {
    store: &'a RosterStore,
}

impl<'a> WeeklyAllocator<'a> {
    pub fn new(store: &'a RosterStore) -> Self {
        Self { store }
    }

    /// (Re-)groups every participant of the program for `week`.
    pub fn allocate_week(&self, program_id: &ProgramId, week: u32, capacity: usize) -> Result<AllocationReport> {
        if capacity == 0 {
            return Err(RosterError::validation("Group capacity must be at least 1"));
        }

        let report = self.store.transact(program_id, |tx| {
            validate_week(tx.program(), week)?;
            if week == 1 {
                Ok(reset_allocation(tx, capacity))
            } else {
                Ok(incremental_allocation(tx, week, capacity))
            }
        })?;

        tracing::info!(
            "Allocated week {} of {}: {} assigned, {} unassigned, {} new groups, {} movements",
            week,
            program_id,
            report.assigned,
            report.unassigned,
            report.groups_created,
            report.movements
        );
        Ok(report)
    }

    pub fn move_participant(
        &self,
        participant_id: &ParticipantId,
        week: u32,
        destination: &GroupId,
        actor: &str,
        reason: Option<&str>,
    ) -> Result<()> {
        let program_id = self.store.find_participant_program(participant_id)?;
        let group_program = self.store.find_group_program(destination)?;
        if group_program != program_id {
            return Err(RosterError::validation(format!(
                "Group {} belongs to program {}, not {}",
                destination, group_program, program_id
            )));
        }

        self.store.transact(&program_id, |tx| {
            validate_week(tx.program(), week)?;
            move_within(tx, participant_id, week, destination, actor, reason)
        })?;

        tracing::info!("{} moved {} to {} for week {}", actor, participant_id, destination, week);
        Ok(())
    }

    /// Moves several participants into one group. The batch is rejected as a
    /// whole when the eligible participants outnumber the free places.
    pub fn bulk_move(
        &self,
        participant_ids: &[ParticipantId],
        week: u32,
        destination: &GroupId,
        actor: &str,
    ) -> Result<BulkMoveReport> {
        let program_id = self.store.find_group_program(destination)?;

        let report = self.store.transact(&program_id, |tx| {
            let program = tx.program();
            validate_week(program, week)?;
            let group = program
                .group(destination)
                .ok_or_else(|| RosterError::not_found("group", destination.as_str()))?;

            let mut seen = HashSet::new();
            let mut candidates = Vec::new();
            let mut skipped = Vec::new();
            for id in participant_ids {
                let eligible = seen.insert(id)
                    && program.participant(id).is_some()
                    && program.active_membership(id, week).map(|m| &m.group_id) != Some(destination);
                if eligible {
                    candidates.push(id.clone());
                } else {
                    skipped.push(id.clone());
                }
            }

            let free = group.capacity.saturating_sub(program.active_count(destination, week));
            if candidates.len() > free {
                return Err(RosterError::CapacityExceeded {
                    group: group.name.clone(),
                    capacity: group.capacity,
                    requested: candidates.len(),
                });
            }

            for id in &candidates {
                move_within(tx, id, week, destination, actor, Some(BULK_REASON))?;
            }
            Ok(BulkMoveReport {
                moved: candidates.len(),
                skipped,
            })
        })?;

        tracing::info!(
            "{} bulk-moved {} participants to {} for week {} ({} skipped)",
            actor,
            report.moved,
            destination,
            week,
            report.skipped.len()
        );
        Ok(report)
    }

    /// Takes a participant out of their group for `week`; they stay in the
    /// program and show up as unassigned.
    pub fn remove_participant(
        &self,
        participant_id: &ParticipantId,
        week: u32,
        actor: &str,
        reason: Option<&str>,
    ) -> Result<GroupId> {
        let program_id = self.store.find_participant_program(participant_id)?;

        let left = self.store.transact(&program_id, |tx| {
            let now = Utc::now();
            let program = tx.program_mut();
            validate_week(program, week)?;

            let active = program
                .memberships
                .iter_mut()
                .find(|m| m.active && m.week == week && &m.participant_id == participant_id)
                .ok_or_else(|| {
                    RosterError::validation(format!(
                        "Participant {} is not in a group for week {}",
                        participant_id, week
                    ))
                })?;
            active.deactivate(now);
            let left = active.group_id.clone();

            tx.record_movement(
                participant_id,
                week,
                Transition {
                    from: Some(left.clone()),
                    to: None,
                },
                actor,
                reason,
            );
            Ok(left)
        })?;

        tracing::info!("{} removed {} from {} for week {}", actor, participant_id, left, week);
        Ok(left)
    }

    /// Increments the week counter; fails at the last week.
    pub fn advance_week(&self, program_id: &ProgramId) -> Result<u32> {
        let week = self.store.transact(program_id, |tx| {
            let program = tx.program_mut();
            if program.current_week >= program.max_weeks {
                return Err(RosterError::validation(format!(
                    "Program {} is already at its final week ({})",
                    program.id, program.max_weeks
                )));
            }
            program.current_week += 1;
            Ok(program.current_week)
        })?;

        tracing::info!("Program {} advanced to week {}", program_id, week);
        Ok(week)
    }

    pub fn groups_with_members(&self, program_id: &ProgramId, week: u32) -> Result<Vec<GroupView>> {
        self.store.read_program(program_id, |program| {
            validate_week(program, week)?;
            Ok(program
                .groups
                .iter()
                .filter(|group| group.created_week <= week)
                .map(|group| GroupView {
                    group: group.clone(),
                    members: program
                        .memberships
                        .iter()
                        .filter(|m| m.active && m.week == week && m.group_id == group.id)
                        .filter_map(|m| program.participant(&m.participant_id))
                        .cloned()
                        .collect(),
                })
                .collect())
        })?
    }

    pub fn unassigned(&self, program_id: &ProgramId, week: u32) -> Result<Vec<Participant>> {
        self.store.read_program(program_id, |program| {
            validate_week(program, week)?;
            let assigned = active_groups_for_week(program, week);
            Ok(program
                .participants
                .iter()
                .filter(|p| !assigned.contains_key(&p.id))
                .cloned()
                .collect())
        })?
    }

    pub fn movement_history(&self, participant_id: &ParticipantId) -> Result<Vec<Movement>> {
        self.store.movement_history(participant_id)
    }

    /// Member count and mean age per group, ages taken on the program start date.
    pub fn group_summary(&self, program_id: &ProgramId, week: u32) -> Result<Vec<GroupSummary>> {
        let reference = self.store.read_program(program_id, Program::reference_date)?;
        let views = self.groups_with_members(program_id, week)?;

        Ok(views
            .into_iter()
            .map(|view| {
                let ages: Vec<u32> = view.members.iter().map(|p| p.age_on(reference)).collect();
                let average_age = if ages.is_empty() {
                    0.0
                } else {
                    ages.iter().sum::<u32>() as f64 / ages.len() as f64
                };
                GroupSummary {
                    group_id: view.group.id,
                    name: view.group.name,
                    ability: view.group.ability,
                    instructor: view.group.instructor,
                    members: view.members.len(),
                    capacity: view.group.capacity,
                    average_age,
                }
            })
            .collect())
    }
}

fn reset_allocation(tx: &mut Transaction, capacity: usize) -> AllocationReport {
    let now = Utc::now();
    let program = tx.program_mut();
    program.groups.clear();
    program.memberships.clear();

    let plan = partition(&program.participants, capacity);
    let mut report = AllocationReport {
        week: 1,
        unassigned: plan.unassigned.len(),
        ..AllocationReport::default()
    };

    for planned in plan.groups {
        let group = new_group(&program.id, &program.groups, &planned.ability, capacity, 1);
        report.assigned += planned.members.len();
        for member in planned.members {
            program.memberships.push(membership(member, group.id.clone(), 1, now));
        }
        program.groups.push(group);
        report.groups_created += 1;
    }
    report
}

fn incremental_allocation(tx: &mut Transaction, week: u32, capacity: usize) -> AllocationReport {
    let now = Utc::now();
    let mut report = AllocationReport {
        week,
        ..AllocationReport::default()
    };

    // 先記下重跑前本週及上週的分組，用來判斷誰換了組
    let rerun_groups = active_groups_for_week(tx.program(), week);
    let last_week_groups = active_groups_for_week(tx.program(), week - 1);
    let mut transitions: Vec<(ParticipantId, Transition)> = Vec::new();

    let Program {
        id: program_id,
        participants,
        groups,
        memberships,
        ..
    } = tx.program_mut();

    for m in memberships.iter_mut().filter(|m| m.active && m.week == week) {
        m.deactivate(now);
    }

    let reference_of = |id: &ParticipantId| rerun_groups.get(id).or_else(|| last_week_groups.get(id));

    for (ability, bucket) in bucket_by_ability(participants) {
        let referenced: HashSet<&GroupId> = bucket.iter().filter_map(|p| reference_of(&p.id)).collect();

        let mut slots: Vec<GroupId> = Vec::new();
        let mut free_places: Vec<usize> = Vec::new();
        for group in groups.iter().filter(|g| g.ability == ability) {
            if free_places.iter().sum::<usize>() < bucket.len() || referenced.contains(&group.id) {
                slots.push(group.id.clone());
                free_places.push(group.capacity);
            }
        }
        while free_places.iter().sum::<usize>() < bucket.len() {
            let group = new_group(program_id, groups, &ability, capacity, week);
            tracing::debug!("Week {}: added group {} for {}", week, group.name, ability);
            slots.push(group.id.clone());
            free_places.push(capacity);
            groups.push(group);
            report.groups_created += 1;
        }

        // 已有分組且該組仍有空位者留在原組，其餘才進入蛇形分配
        let mut placed: Vec<(ParticipantId, usize)> = Vec::new();
        let mut pending: Vec<&Participant> = Vec::new();
        for participant in bucket.iter().copied() {
            let kept = reference_of(&participant.id)
                .and_then(|g| slots.iter().position(|s| s == g))
                .filter(|&slot| free_places[slot] > 0);
            match kept {
                Some(slot) => {
                    free_places[slot] -= 1;
                    placed.push((participant.id.clone(), slot));
                }
                None => pending.push(participant),
            }
        }

        let distribution = distribute(&pending, &free_places);
        placed.extend(
            distribution
                .slots
                .into_iter()
                .enumerate()
                .flat_map(|(slot, members)| members.into_iter().map(move |m| (m, slot))),
        );

        for (member, slot) in placed {
            let to = slots[slot].clone();
            let reference = reference_of(&member);
            if reference != Some(&to) {
                transitions.push((
                    member.clone(),
                    Transition {
                        from: reference.cloned(),
                        to: Some(to.clone()),
                    },
                ));
            }
            memberships.push(membership(member, to, week, now));
            report.assigned += 1;
        }
        for member in distribution.unassigned {
            if let Some(from) = reference_of(&member) {
                transitions.push((
                    member.clone(),
                    Transition {
                        from: Some(from.clone()),
                        to: None,
                    },
                ));
            }
            report.unassigned += 1;
        }
    }

    report.movements = transitions.len();
    for (participant_id, transition) in transitions {
        tx.record_movement(&participant_id, week, transition, ALLOCATOR_ACTOR, Some(WEEKLY_REASON));
    }
    report
}

/// Moves one participant inside the staged program; validates before writing.
fn move_within(
    tx: &mut Transaction,
    participant_id: &ParticipantId,
    week: u32,
    destination: &GroupId,
    actor: &str,
    reason: Option<&str>,
) -> Result<()> {
    let now = Utc::now();
    let program = tx.program_mut();

    if program.participant(participant_id).is_none() {
        return Err(RosterError::not_found("participant", participant_id.as_str()));
    }
    let group = program
        .group(destination)
        .ok_or_else(|| RosterError::not_found("group", destination.as_str()))?;

    let current = program
        .active_membership(participant_id, week)
        .map(|m| m.group_id.clone());
    if current.as_ref() == Some(destination) {
        return Err(RosterError::validation(format!(
            "Participant {} is already in group {} for week {}",
            participant_id, group.name, week
        )));
    }

    let occupied = program.active_count(destination, week);
    if occupied >= group.capacity {
        return Err(RosterError::CapacityExceeded {
            group: group.name.clone(),
            capacity: group.capacity,
            requested: occupied + 1,
        });
    }

    if let Some(active) = program
        .memberships
        .iter_mut()
        .find(|m| m.active && m.week == week && &m.participant_id == participant_id)
    {
        active.deactivate(now);
    }
    program
        .memberships
        .push(membership(participant_id.clone(), destination.clone(), week, now));

    tx.record_movement(
        participant_id,
        week,
        Transition {
            from: current,
            to: Some(destination.clone()),
        },
        actor,
        reason,
    );
    Ok(())
}
