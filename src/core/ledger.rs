use crate::domain::model::{GroupId, Movement, ParticipantId, ProgramId};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Group change of one participant; either side is `None` for join/leave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: Option<GroupId>,
    pub to: Option<GroupId>,
}

/// Append-only movement log. Entries are never edited or removed, and they
/// outlive the participants, groups and programs they reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovementLedger {
    entries: Vec<Movement>,
}

impl MovementLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<Movement>) -> Self {
        Self { entries }
    }

    pub fn record(
        &mut self,
        program_id: &ProgramId,
        participant_id: &ParticipantId,
        week: u32,
        transition: Transition,
        actor: &str,
        reason: Option<&str>,
    ) {
        self.entries.push(Movement {
            program_id: program_id.clone(),
            participant_id: participant_id.clone(),
            week,
            from_group: transition.from,
            to_group: transition.to,
            actor: actor.to_string(),
            reason: reason.map(str::to_string),
            timestamp: Utc::now(),
        });
    }

    /// Moves every entry of a committed transaction into this ledger.
    pub(crate) fn absorb(&mut self, staged: MovementLedger) {
        self.entries.extend(staged.entries);
    }

    pub fn history_for(&self, participant_id: &ParticipantId) -> Vec<Movement> {
        self.entries
            .iter()
            .filter(|m| &m.participant_id == participant_id)
            .cloned()
            .collect()
    }

    pub fn entries(&self) -> &[Movement] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_history() {
        let mut ledger = MovementLedger::new();
        let program = ProgramId::from("winter");
        let jane = ParticipantId::from("p-jane");
        let joe = ParticipantId::from("p-joe");

        ledger.record(
            &program,
            &jane,
            2,
            Transition {
                from: Some(GroupId::from("g-1")),
                to: Some(GroupId::from("g-2")),
            },
            "coach",
            Some("skill jump"),
        );
        ledger.record(
            &program,
            &joe,
            2,
            Transition {
                from: None,
                to: Some(GroupId::from("g-1")),
            },
            "coach",
            None,
        );

        let history = ledger.history_for(&jane);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reason.as_deref(), Some("skill jump"));
        assert_eq!(history[0].to_group, Some(GroupId::from("g-2")));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_absorb_appends_in_order() {
        let program = ProgramId::from("winter");
        let mut ledger = MovementLedger::new();
        let mut staged = MovementLedger::new();
        for week in 1..=3 {
            staged.record(
                &program,
                &ParticipantId::from("p"),
                week,
                Transition { from: None, to: None },
                "system",
                None,
            );
        }

        ledger.absorb(staged);
        let weeks: Vec<u32> = ledger.entries().iter().map(|m| m.week).collect();
        assert_eq!(weeks, vec![1, 2, 3]);
    }
}
