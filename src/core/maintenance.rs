//! Data maintenance: notes, instructors, program clear, e-mail scrub, diagnostics.

use crate::core::fields::is_sentinel_email;
use crate::core::store::RosterStore;
use crate::domain::model::{GroupId, Note, ParticipantId, Program, ProgramId};
use crate::utils::error::{RosterError, Result};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClearReport {
    pub participants: usize,
    pub groups: usize,
    pub memberships: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramDiagnostics {
    pub program_id: ProgramId,
    pub name: String,
    pub current_week: u32,
    pub participants: usize,
    pub sentinel_emails: usize,
    pub with_customer_ref: usize,
    pub with_name_and_birth_date: usize,
    /// week -> active memberships
    pub active_memberships: BTreeMap<u32, usize>,
}

impl ProgramDiagnostics {
    fn from_program(program: &Program, extra_sentinels: &[String]) -> Self {
        let mut active_memberships = BTreeMap::new();
        for m in program.memberships.iter().filter(|m| m.active) {
            *active_memberships.entry(m.week).or_insert(0) += 1;
        }

        Self {
            program_id: program.id.clone(),
            name: program.name.clone(),
            current_week: program.current_week,
            participants: program.participants.len(),
            sentinel_emails: program
                .participants
                .iter()
                .filter(|p| is_sentinel_email(&p.contact.contact_email, extra_sentinels))
                .count(),
            with_customer_ref: program
                .participants
                .iter()
                .filter(|p| p.customer_ref.is_some())
                .count(),
            with_name_and_birth_date: program
                .participants
                .iter()
                .filter(|p| !p.name.is_empty() && p.birth_date.is_some())
                .count(),
            active_memberships,
        }
    }
}

pub fn add_note(
    store: &RosterStore,
    program_id: &ProgramId,
    participant_id: &ParticipantId,
    text: &str,
    author: &str,
) -> Result<()> {
    let text = text.trim();
    if text.is_empty() {
        return Err(RosterError::validation("Note text cannot be empty"));
    }

    store.transact(program_id, |tx| {
        let participant = tx
            .program_mut()
            .participant_mut(participant_id)
            .ok_or_else(|| RosterError::not_found("participant", participant_id.as_str()))?;
        participant.notes.push(Note {
            text: text.to_string(),
            author: author.to_string(),
            timestamp: Utc::now(),
        });
        Ok(())
    })?;

    tracing::debug!("{} added a note to {}", author, participant_id);
    Ok(())
}

/// Sets or clears (empty name) the instructor of a group.
pub fn assign_instructor(store: &RosterStore, group_id: &GroupId, instructor: &str) -> Result<()> {
    let program_id = store.find_group_program(group_id)?;
    let instructor = instructor.trim();

    store.transact(&program_id, |tx| {
        let group = tx
            .program_mut()
            .group_mut(group_id)
            .ok_or_else(|| RosterError::not_found("group", group_id.as_str()))?;
        group.instructor = (!instructor.is_empty()).then(|| instructor.to_string());
        Ok(())
    })?;

    tracing::info!("Group {} instructor set to '{}'", group_id, instructor);
    Ok(())
}

/// Empties a program for re-import; the program itself and the ledger stay.
pub fn clear_program(store: &RosterStore, program_id: &ProgramId) -> Result<ClearReport> {
    let report = store.transact(program_id, |tx| {
        let program = tx.program_mut();
        let report = ClearReport {
            participants: program.participants.len(),
            groups: program.groups.len(),
            memberships: program.memberships.len(),
        };
        program.participants.clear();
        program.groups.clear();
        program.memberships.clear();
        program.current_week = 1;
        Ok(report)
    })?;

    tracing::info!(
        "Cleared program {}: {} participants, {} groups, {} memberships",
        program_id,
        report.participants,
        report.groups,
        report.memberships
    );
    Ok(report)
}

/// Blanks stored contact e-mails that are placeholders (`hoh`, `guest`, ...).
pub fn scrub_sentinel_emails(store: &RosterStore, program_id: &ProgramId, extra_sentinels: &[String]) -> Result<usize> {
    let scrubbed = store.transact(program_id, |tx| {
        let mut count = 0;
        for participant in tx.program_mut().participants.iter_mut() {
            if is_sentinel_email(&participant.contact.contact_email, extra_sentinels) {
                participant.contact.contact_email.clear();
                count += 1;
            }
        }
        Ok(count)
    })?;

    tracing::info!("Scrubbed {} placeholder e-mails in {}", scrubbed, program_id);
    Ok(scrubbed)
}

pub fn diagnostics(store: &RosterStore, extra_sentinels: &[String]) -> Result<Vec<ProgramDiagnostics>> {
    store
        .program_ids()?
        .iter()
        .map(|id| store.read_program(id, |p| ProgramDiagnostics::from_program(p, extra_sentinels)))
        .collect()
}
