use crate::core::ability;
use crate::core::fields::{self, Field};
use crate::core::store::RosterStore;
use crate::domain::model::{
    AbilityCode, Cell, ContactDetails, Note, Participant, ParticipantId, Program, ProgramId,
    RosterRow,
};
use crate::utils::error::{RosterError, Result};
use chrono::{Datelike, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// What to do when an incoming row matches an existing participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum DuplicateStrategy {
    /// Leave the existing record alone.
    #[default]
    Skip,
    /// Overwrite the mapped fields of the existing record.
    Update,
    /// Insert a second record under a new id.
    Duplicate,
}

impl FromStr for DuplicateStrategy {
    type Err = RosterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "update" => Ok(Self::Update),
            "duplicate" => Ok(Self::Duplicate),
            other => Err(RosterError::validation(format!(
                "Unknown duplicate strategy '{}' (expected skip, update or duplicate)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Created,
    Updated,
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl IngestSummary {
    fn tally(&mut self, outcome: IngestOutcome) {
        match outcome {
            IngestOutcome::Created => self.created += 1,
            IngestOutcome::Updated => self.updated += 1,
            IngestOutcome::Skipped => self.skipped += 1,
        }
    }

    pub fn processed(&self) -> usize {
        self.created + self.updated + self.skipped
    }
}

/// Epoch of spreadsheet serial dates (serial 1 = 1899-12-31).
fn spreadsheet_epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 30)
}

pub fn from_spreadsheet_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    spreadsheet_epoch()?.checked_add_days(Days::new(serial.floor() as u64))
}

/// Birth date from a date cell, a spreadsheet serial or text such as `05-Mar-15`.
/// Anything else degrades to `None`.
pub fn parse_birth_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Empty => None,
        Cell::Date(date) => Some(*date),
        Cell::Number(serial) => from_spreadsheet_serial(*serial),
        Cell::Text(text) => parse_date_text(text.trim()),
    }
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    if text.is_empty() {
        return None;
    }
    if let Ok(serial) = text.parse::<f64>() {
        return from_spreadsheet_serial(serial);
    }

    // 兩位數年份落在未來時往前推一百年
    if let Ok(date) = NaiveDate::parse_from_str(text, "%d-%b-%y") {
        let today = Utc::now().date_naive();
        return if date > today {
            date.with_year(date.year() - 100)
        } else {
            Some(date)
        };
    }

    ["%d-%b-%Y", "%Y-%m-%d", "%d/%m/%Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

/// `"Doe, Jane"` becomes `"Jane Doe"`; other names are only trimmed.
pub fn reorder_name(raw: &str) -> String {
    match raw.split_once(',') {
        Some((last, first)) if !first.trim().is_empty() => {
            format!("{} {}", first.trim(), last.trim())
        }
        Some((last, _)) => last.trim().to_string(),
        None => raw.trim().to_string(),
    }
}

#[derive(Debug, Default)]
struct ContactPatch {
    parent_name: Option<String>,
    contact_email: Option<String>,
    emergency_contact: Option<String>,
    emergency_phone: Option<String>,
    food_allergy: Option<String>,
    drug_allergy: Option<String>,
    medication: Option<String>,
    special_condition: Option<String>,
}

impl ContactPatch {
    fn apply(&self, contact: &mut ContactDetails) {
        let pairs = [
            (&self.parent_name, &mut contact.parent_name),
            (&self.contact_email, &mut contact.contact_email),
            (&self.emergency_contact, &mut contact.emergency_contact),
            (&self.emergency_phone, &mut contact.emergency_phone),
            (&self.food_allergy, &mut contact.food_allergy),
            (&self.drug_allergy, &mut contact.drug_allergy),
            (&self.medication, &mut contact.medication),
            (&self.special_condition, &mut contact.special_condition),
        ];
        for (value, slot) in pairs {
            if let Some(value) = value {
                slot.clone_from(value);
            }
        }
    }
}

/// A row after alias resolution; `None` means the row did not supply the field.
#[derive(Debug, Default)]
struct ParsedRow {
    id: Option<ParticipantId>,
    customer_ref: Option<String>,
    name: Option<String>,
    birth_date: Option<NaiveDate>,
    ability: Option<AbilityCode>,
    contact: ContactPatch,
    note: Option<String>,
}

impl ParsedRow {
    fn from_row(row: &RosterRow, extra_sentinels: &[String]) -> Self {
        let text = |field| fields::resolve_text(row, field);

        let name = text(Field::Name).map(|n| reorder_name(&n)).or_else(|| {
            let parts: Vec<String> = [text(Field::FirstName), text(Field::LastName)]
                .into_iter()
                .flatten()
                .collect();
            (!parts.is_empty()).then(|| parts.join(" "))
        });

        let birth_date = fields::resolve(row, Field::BirthDate).and_then(|cell| {
            let parsed = parse_birth_date(cell);
            if parsed.is_none() {
                tracing::warn!("Unparseable birth date {:?}, leaving it empty", cell);
            }
            parsed
        });

        let ability = text(Field::Ability)
            .map(|raw| ability::normalize(&raw))
            .or_else(|| text(Field::ProductDescription).map(|d| ability::from_product_description(&d)));

        let contact_email = text(Field::ContactEmail)
            .map(|e| e.to_lowercase())
            .filter(|e| !fields::is_sentinel_email(e, extra_sentinels));

        Self {
            id: text(Field::Id).map(ParticipantId::new),
            customer_ref: text(Field::CustomerRef),
            name,
            birth_date,
            ability,
            contact: ContactPatch {
                parent_name: text(Field::ParentName),
                contact_email,
                emergency_contact: text(Field::EmergencyContact),
                emergency_phone: text(Field::EmergencyPhone),
                food_allergy: text(Field::FoodAllergy),
                drug_allergy: text(Field::DrugAllergy),
                medication: text(Field::Medication),
                special_condition: text(Field::SpecialCondition),
            },
            note: text(Field::Notes),
        }
    }
}

/// First match wins: explicit id, customer reference, (name, birth date), e-mail.
fn find_existing(program: &Program, row: &ParsedRow) -> Option<ParticipantId> {
    let participants = &program.participants;

    row.id
        .as_ref()
        .and_then(|id| program.participant(id))
        .or_else(|| {
            let customer_ref = row.customer_ref.as_deref()?;
            participants
                .iter()
                .find(|p| p.customer_ref.as_deref() == Some(customer_ref))
        })
        .or_else(|| {
            let (name, birth) = (row.name.as_deref()?, row.birth_date?);
            participants
                .iter()
                .find(|p| p.name == name && p.birth_date == Some(birth))
        })
        .or_else(|| {
            let email = row.contact.contact_email.as_deref()?;
            participants
                .iter()
                .find(|p| p.contact.contact_email == email)
        })
        .map(|p| p.id.clone())
}

pub const IMPORT_AUTHOR: &str = "import";

#[derive(Debug, Clone, Default)]
pub struct RosterIngestor {
    strategy: DuplicateStrategy,
    extra_sentinel_emails: Vec<String>,
}

impl RosterIngestor {
    pub fn new(strategy: DuplicateStrategy) -> Self {
        Self {
            strategy,
            extra_sentinel_emails: Vec::new(),
        }
    }

    pub fn with_extra_sentinel_emails(mut self, sentinels: Vec<String>) -> Self {
        self.extra_sentinel_emails = sentinels;
        self
    }

    pub fn strategy(&self) -> DuplicateStrategy {
        self.strategy
    }

    /// Maps one row onto the program's participants.
    pub fn ingest(&self, program: &mut Program, row: &RosterRow) -> Result<(ParticipantId, IngestOutcome)> {
        let parsed = ParsedRow::from_row(row, &self.extra_sentinel_emails);
        let existing = find_existing(program, &parsed);

        match (existing, self.strategy) {
            (Some(id), DuplicateStrategy::Skip) => {
                tracing::debug!("Row matches participant {}, skipped", id);
                Ok((id, IngestOutcome::Skipped))
            }
            (Some(id), DuplicateStrategy::Update) => {
                let participant = program
                    .participant_mut(&id)
                    .ok_or_else(|| RosterError::not_found("participant", id.as_str()))?;
                update_participant(participant, parsed);
                tracing::debug!("Row matches participant {}, updated", id);
                Ok((id, IngestOutcome::Updated))
            }
            (_, _) => {
                let participant = new_participant(parsed)?;
                let id = participant.id.clone();
                tracing::debug!("Created participant {} ({})", id, participant.name);
                program.participants.push(participant);
                Ok((id, IngestOutcome::Created))
            }
        }
    }

    /// Ingests all rows in one transaction. A failing row rolls the whole call back;
    /// the error reports how many rows were processed before it.
    pub fn ingest_file(
        &self,
        store: &RosterStore,
        program_id: &ProgramId,
        rows: &[RosterRow],
    ) -> Result<IngestSummary> {
        let summary = store.transact(program_id, |tx| {
            let mut summary = IngestSummary::default();
            for (index, row) in rows.iter().enumerate() {
                if row.is_blank() {
                    tracing::debug!("Row {} is blank, ignored", index + 1);
                    continue;
                }
                match self.ingest(tx.program_mut(), row) {
                    Ok((_, outcome)) => summary.tally(outcome),
                    Err(e) => {
                        return Err(RosterError::Ingest {
                            row: index + 1,
                            processed: summary.processed(),
                            message: e.user_friendly_message(),
                        })
                    }
                }
            }
            Ok(summary)
        })?;

        tracing::info!(
            "Ingested {} rows into {}: {} created, {} updated, {} skipped",
            summary.processed(),
            program_id,
            summary.created,
            summary.updated,
            summary.skipped
        );
        Ok(summary)
    }
}

fn new_participant(parsed: ParsedRow) -> Result<Participant> {
    let name = parsed
        .name
        .ok_or_else(|| RosterError::validation("Row has no participant name"))?;

    let mut participant = Participant::new(name, parsed.birth_date, parsed.ability.unwrap_or_default());
    participant.customer_ref = parsed.customer_ref;
    parsed.contact.apply(&mut participant.contact);
    if let Some(text) = parsed.note {
        participant.notes.push(Note {
            text,
            author: IMPORT_AUTHOR.to_string(),
            timestamp: Utc::now(),
        });
    }
    Ok(participant)
}

fn update_participant(participant: &mut Participant, parsed: ParsedRow) {
    if let Some(customer_ref) = parsed.customer_ref {
        participant.customer_ref = Some(customer_ref);
    }
    if let Some(name) = parsed.name {
        participant.name = name;
    }
    if let Some(birth) = parsed.birth_date {
        participant.birth_date = Some(birth);
    }
    if let Some(ability) = parsed.ability {
        participant.ability = ability;
    }
    parsed.contact.apply(&mut participant.contact);
    if let Some(text) = parsed.note {
        if !participant.notes.iter().any(|n| n.text == text) {
            participant.notes.push(Note {
                text,
                author: IMPORT_AUTHOR.to_string(),
                timestamp: Utc::now(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program() -> Program {
        Program::new(ProgramId::from("winter"), "Winter", 6)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_reorder_name() {
        assert_eq!(reorder_name("Doe, Jane"), "Jane Doe");
        assert_eq!(reorder_name("  Jane Doe "), "Jane Doe");
        assert_eq!(reorder_name("Doe, Jane, Jr"), "Jane, Jr Doe");
        assert_eq!(reorder_name("Doe,"), "Doe");
    }

    #[test]
    fn test_parse_birth_date_forms() {
        assert_eq!(parse_birth_date(&Cell::Date(date(2016, 2, 29))), Some(date(2016, 2, 29)));
        assert_eq!(parse_birth_date(&Cell::Number(42370.0)), Some(date(2016, 1, 1)));
        assert_eq!(parse_birth_date(&Cell::Text("42370".into())), Some(date(2016, 1, 1)));
        assert_eq!(parse_birth_date(&Cell::Text("05-Mar-15".into())), Some(date(2015, 3, 5)));
        assert_eq!(parse_birth_date(&Cell::Text("2014-07-09".into())), Some(date(2014, 7, 9)));
        assert_eq!(parse_birth_date(&Cell::Text("not a date".into())), None);
        assert_eq!(parse_birth_date(&Cell::Number(-3.0)), None);
        assert_eq!(parse_birth_date(&Cell::Empty), None);
    }

    #[test]
    fn test_two_digit_year_never_lands_in_future() {
        let parsed = parse_birth_date(&Cell::Text("01-Jan-68".into())).unwrap();
        assert!(parsed <= Utc::now().date_naive());
    }

    #[test]
    fn test_skip_strategy_reports_skipped() {
        let mut program = program();
        let ingestor = RosterIngestor::new(DuplicateStrategy::Skip);
        let row = RosterRow::from_pairs([("customer_id", "C1"), ("name", "Doe, Jane"), ("ability", "FT")]);

        let (first, outcome) = ingestor.ingest(&mut program, &row).unwrap();
        assert_eq!(outcome, IngestOutcome::Created);
        let (second, outcome) = ingestor.ingest(&mut program, &row).unwrap();
        assert_eq!(outcome, IngestOutcome::Skipped);

        assert_eq!(first, second);
        assert_eq!(program.participants.len(), 1);
        assert_eq!(program.participants[0].name, "Jane Doe");
        assert_eq!(program.participants[0].ability.as_str(), "FT");
    }

    #[test]
    fn test_update_strategy_overwrites_mapped_fields_and_keeps_id() {
        let mut program = program();
        let first = RosterRow::from_pairs([("CustomerID", "C1"), ("CustomerName", "Doe, Jane"), ("Ability", "b1")]);
        let (id, _) = RosterIngestor::default().ingest(&mut program, &first).unwrap();

        let second = RosterRow::from_pairs([
            ("CustomerID", "C1"),
            ("Ability", "intermediate"),
            ("Medication", "Inhaler"),
        ]);
        let (updated, outcome) = RosterIngestor::new(DuplicateStrategy::Update)
            .ingest(&mut program, &second)
            .unwrap();

        assert_eq!(outcome, IngestOutcome::Updated);
        assert_eq!(updated, id);
        let p = program.participant(&id).unwrap();
        assert_eq!(p.name, "Jane Doe");
        assert_eq!(p.ability.as_str(), "IZ");
        assert_eq!(p.contact.medication, "Inhaler");
    }

    #[test]
    fn test_duplicate_strategy_forces_new_record() {
        let mut program = program();
        let row = RosterRow::from_pairs([("customer_id", "C1"), ("name", "Jane Doe")]);
        let ingestor = RosterIngestor::new(DuplicateStrategy::Duplicate);

        let (a, _) = ingestor.ingest(&mut program, &row).unwrap();
        let (b, outcome) = ingestor.ingest(&mut program, &row).unwrap();

        assert_eq!(outcome, IngestOutcome::Created);
        assert_ne!(a, b);
        assert_eq!(program.participants.len(), 2);
    }

    #[test]
    fn test_identity_priority_chain() {
        let mut program = program();
        let ingestor = RosterIngestor::new(DuplicateStrategy::Update);
        let seed = RosterRow::from_pairs([
            ("name", "Sam Lee"),
            ("birth_date", "2015-01-02"),
            ("email", "Parent@Example.com"),
        ]);
        let (id, _) = ingestor.ingest(&mut program, &seed).unwrap();

        // explicit id
        let by_id = RosterRow::from_pairs([("id", id.as_str()), ("name", "Samuel Lee")]);
        assert_eq!(ingestor.ingest(&mut program, &by_id).unwrap().0, id);

        // name + birth date
        let by_name = RosterRow::from_pairs([("name", "Samuel Lee"), ("dob", "2015-01-02")]);
        assert_eq!(ingestor.ingest(&mut program, &by_name).unwrap().0, id);

        // e-mail, case-folded
        let by_email = RosterRow::from_pairs([("name", "S. Lee"), ("contact_email", "parent@example.com ")]);
        assert_eq!(ingestor.ingest(&mut program, &by_email).unwrap().0, id);

        assert_eq!(program.participants.len(), 1);
    }

    #[test]
    fn test_sentinel_emails_never_match() {
        let mut program = program();
        let ingestor = RosterIngestor::default();
        let a = RosterRow::from_pairs([("name", "Ann"), ("email", "HOH")]);
        let b = RosterRow::from_pairs([("name", "Ben"), ("email", "hoh")]);

        ingestor.ingest(&mut program, &a).unwrap();
        let (_, outcome) = ingestor.ingest(&mut program, &b).unwrap();

        assert_eq!(outcome, IngestOutcome::Created);
        assert!(program.participants.iter().all(|p| p.contact.contact_email.is_empty()));
    }

    #[test]
    fn test_first_and_last_name_and_product_description() {
        let mut program = program();
        let row = RosterRow::from_pairs([
            ("First Name", "Jane"),
            ("Last Name", "Doe"),
            ("ProductDescription_1", "Ride Tribe - BZ2"),
            ("Notes", "Needs help with lifts"),
        ]);
        let (id, _) = RosterIngestor::default().ingest(&mut program, &row).unwrap();

        let p = program.participant(&id).unwrap();
        assert_eq!(p.name, "Jane Doe");
        assert_eq!(p.ability.as_str(), "BZ2");
        assert_eq!(p.notes.len(), 1);
        assert_eq!(p.notes[0].author, IMPORT_AUTHOR);
    }

    #[test]
    fn test_missing_ability_and_bad_date_degrade() {
        let mut program = program();
        let row = RosterRow::from_pairs([("name", "Kim"), ("birth_date", "sometime")]);
        let (id, _) = RosterIngestor::default().ingest(&mut program, &row).unwrap();

        let p = program.participant(&id).unwrap();
        assert!(p.ability.is_mixed());
        assert_eq!(p.birth_date, None);
    }

    #[test]
    fn test_row_without_name_is_rejected() {
        let mut program = program();
        let row = RosterRow::from_pairs([("ability", "FT")]);
        assert!(RosterIngestor::default().ingest(&mut program, &row).is_err());
    }

    #[test]
    fn test_blank_rows_are_not_counted() {
        let store = RosterStore::new();
        let id = store.create_program("Winter", "", 6, None).unwrap();
        let rows = vec![
            RosterRow::from_pairs([("name", "Ann Lee"), ("ability", "FT")]),
            RosterRow::from_pairs([("name", "  "), ("ability", "")]),
            RosterRow::from_pairs([("name", "Bo Chan"), ("ability", "AZ")]),
        ];

        let summary = RosterIngestor::default().ingest_file(&store, &id, &rows).unwrap();
        assert_eq!(summary.processed(), 2);
        assert_eq!(summary.created, 2);
        assert_eq!(store.read_program(&id, |p| p.participants.len()).unwrap(), 2);
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("Update".parse::<DuplicateStrategy>().unwrap(), DuplicateStrategy::Update);
        assert!("merge".parse::<DuplicateStrategy>().is_err());
        assert_eq!(DuplicateStrategy::default(), DuplicateStrategy::Skip);
    }
}
