//! In-memory roster store with per-program locking.
//!
//! Every mutation runs through [`RosterStore::transact`]: the closure works on a
//! staged copy of one program plus a staged movement ledger, and both are
//! committed together only when the closure returns `Ok`. Operations on the
//! same program are serialized by that program's mutex; different programs
//! proceed in parallel.

use crate::core::ledger::{MovementLedger, Transition};
use crate::domain::model::{
    GroupId, Movement, ParticipantId, Program, ProgramId,
};
use crate::utils::error::{RosterError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

type ProgramHandle = Arc<Mutex<Program>>;

fn poisoned(what: &str) -> RosterError {
    RosterError::StoreError {
        message: format!("{} lock poisoned", what),
    }
}

/// Staged changes for a single program.
pub struct Transaction {
    program: Program,
    staged: MovementLedger,
}

impl Transaction {
    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn program_mut(&mut self) -> &mut Program {
        &mut self.program
    }

    pub fn record_movement(
        &mut self,
        participant_id: &ParticipantId,
        week: u32,
        transition: Transition,
        actor: &str,
        reason: Option<&str>,
    ) {
        let program_id = self.program.id.clone();
        self.staged
            .record(&program_id, participant_id, week, transition, actor, reason);
    }
}

/// Whole-store image used by the snapshot adapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub programs: Vec<Program>,
    pub movements: Vec<Movement>,
}

#[derive(Default)]
pub struct RosterStore {
    programs: RwLock<BTreeMap<ProgramId, ProgramHandle>>,
    ledger: Mutex<MovementLedger>,
}

impl RosterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let programs = snapshot
            .programs
            .into_iter()
            .map(|p| (p.id.clone(), Arc::new(Mutex::new(p))))
            .collect();
        Self {
            programs: RwLock::new(programs),
            ledger: Mutex::new(MovementLedger::from_entries(snapshot.movements)),
        }
    }

    pub fn snapshot(&self) -> Result<StoreSnapshot> {
        let mut programs = Vec::new();
        for handle in self.handles()? {
            programs.push(lock(&handle)?.clone());
        }
        let movements = self.lock_ledger()?.entries().to_vec();
        Ok(StoreSnapshot {
            programs,
            movements,
        })
    }

    /// Creates a program whose id is the lower-cased name with spaces as underscores.
    pub fn create_program(
        &self,
        name: &str,
        description: &str,
        max_weeks: u32,
        start_date: Option<NaiveDate>,
    ) -> Result<ProgramId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RosterError::validation("Program name cannot be empty"));
        }
        if max_weeks == 0 {
            return Err(RosterError::validation("max_weeks must be at least 1"));
        }

        let id = ProgramId::new(name.to_lowercase().replace(' ', "_"));
        let mut programs = self.programs.write().map_err(|_| poisoned("program map"))?;
        if programs.contains_key(&id) {
            return Err(RosterError::validation(format!(
                "A program with name '{}' already exists",
                name
            )));
        }

        let mut program = Program::new(id.clone(), name, max_weeks);
        program.description = description.to_string();
        program.start_date = start_date;
        programs.insert(id.clone(), Arc::new(Mutex::new(program)));

        tracing::info!("Created program {} ({} weeks)", id, max_weeks);
        Ok(id)
    }

    /// Removes the program with its participants, groups and memberships.
    /// Movements stay in the ledger.
    pub fn delete_program(&self, id: &ProgramId) -> Result<()> {
        let mut programs = self.programs.write().map_err(|_| poisoned("program map"))?;
        programs
            .remove(id)
            .map(|_| tracing::info!("Deleted program {}", id))
            .ok_or_else(|| RosterError::not_found("program", id.as_str()))
    }

    pub fn program_ids(&self) -> Result<Vec<ProgramId>> {
        let programs = self.programs.read().map_err(|_| poisoned("program map"))?;
        Ok(programs.keys().cloned().collect())
    }

    pub fn read_program<T>(&self, id: &ProgramId, f: impl FnOnce(&Program) -> T) -> Result<T> {
        let handle = self.handle(id)?;
        let program = lock(&handle)?;
        Ok(f(&program))
    }

    /// Runs `f` against a staged copy of the program; commits only on `Ok`.
    pub fn transact<T>(
        &self,
        id: &ProgramId,
        f: impl FnOnce(&mut Transaction) -> Result<T>,
    ) -> Result<T> {
        let handle = self.handle(id)?;
        let mut live = lock(&handle)?;

        let mut tx = Transaction {
            program: live.clone(),
            staged: MovementLedger::new(),
        };

        match f(&mut tx) {
            Ok(value) => {
                let mut ledger = self.lock_ledger()?;
                *live = tx.program;
                ledger.absorb(tx.staged);
                Ok(value)
            }
            Err(e) => {
                tracing::debug!("Rolled back transaction on program {}: {}", id, e);
                Err(e)
            }
        }
    }

    pub fn find_participant_program(&self, participant_id: &ParticipantId) -> Result<ProgramId> {
        self.find_program(|p| p.participant(participant_id).is_some())?
            .ok_or_else(|| RosterError::not_found("participant", participant_id.as_str()))
    }

    pub fn find_group_program(&self, group_id: &GroupId) -> Result<ProgramId> {
        self.find_program(|p| p.group(group_id).is_some())?
            .ok_or_else(|| RosterError::not_found("group", group_id.as_str()))
    }

    pub fn movement_history(&self, participant_id: &ParticipantId) -> Result<Vec<Movement>> {
        Ok(self.lock_ledger()?.history_for(participant_id))
    }

    pub fn movement_count(&self) -> Result<usize> {
        Ok(self.lock_ledger()?.len())
    }

    fn find_program(&self, matches: impl Fn(&Program) -> bool) -> Result<Option<ProgramId>> {
        for handle in self.handles()? {
            let program = lock(&handle)?;
            if matches(&program) {
                return Ok(Some(program.id.clone()));
            }
        }
        Ok(None)
    }

    fn handle(&self, id: &ProgramId) -> Result<ProgramHandle> {
        let programs = self.programs.read().map_err(|_| poisoned("program map"))?;
        programs
            .get(id)
            .cloned()
            .ok_or_else(|| RosterError::not_found("program", id.as_str()))
    }

    fn handles(&self) -> Result<Vec<ProgramHandle>> {
        let programs = self.programs.read().map_err(|_| poisoned("program map"))?;
        Ok(programs.values().cloned().collect())
    }

    fn lock_ledger(&self) -> Result<MutexGuard<'_, MovementLedger>> {
        self.ledger.lock().map_err(|_| poisoned("movement ledger"))
    }
}

fn lock(handle: &ProgramHandle) -> Result<MutexGuard<'_, Program>> {
    handle.lock().map_err(|_| poisoned("program"))
}
