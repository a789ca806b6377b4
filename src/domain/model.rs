use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::core::fields::normalize_header;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// 產生新的隨機 id
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(ProgramId);
string_id!(ParticipantId);
string_id!(GroupId);

/// Canonical skill level. Only `core::ability` builds these from raw text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AbilityCode(String);

impl AbilityCode {
    pub const MIXED: &'static str = "MIXED";

    pub fn mixed() -> Self {
        Self(Self::MIXED.to_string())
    }

    pub(crate) fn from_normalized(code: String) -> Self {
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_mixed(&self) -> bool {
        self.0 == Self::MIXED
    }

    pub fn is_canonical(&self) -> bool {
        crate::core::ability::CANONICAL_CODES.contains(&self.0.as_str())
    }
}

impl Default for AbilityCode {
    fn default() -> Self {
        Self::mixed()
    }
}

impl fmt::Display for AbilityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub text: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
}

/// Opaque contact and medical fields, passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub parent_name: String,
    pub contact_email: String,
    pub emergency_contact: String,
    pub emergency_phone: String,
    pub food_allergy: String,
    pub drug_allergy: String,
    pub medication: String,
    pub special_condition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub customer_ref: Option<String>,
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub ability: AbilityCode,
    #[serde(default)]
    pub contact: ContactDetails,
    #[serde(default)]
    pub notes: Vec<Note>,
}

impl Participant {
    pub fn new(name: impl Into<String>, birth_date: Option<NaiveDate>, ability: AbilityCode) -> Self {
        Self {
            id: ParticipantId::generate(),
            customer_ref: None,
            name: name.into(),
            birth_date,
            ability,
            contact: ContactDetails::default(),
            notes: Vec::new(),
        }
    }

    /// Whole years on `reference`; 0 when the birth date is unknown.
    pub fn age_on(&self, reference: NaiveDate) -> u32 {
        self.birth_date
            .and_then(|birth| reference.years_since(birth))
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub program_id: ProgramId,
    pub ability: AbilityCode,
    pub instructor: Option<String>,
    pub capacity: usize,
    pub created_week: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    pub participant_id: ParticipantId,
    pub group_id: GroupId,
    pub week: u32,
    pub active: bool,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
}

impl Membership {
    pub fn deactivate(&mut self, at: DateTime<Utc>) {
        self.active = false;
        self.left_at = Some(at);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub program_id: ProgramId,
    pub participant_id: ParticipantId,
    pub week: u32,
    pub from_group: Option<GroupId>,
    pub to_group: Option<GroupId>,
    pub actor: String,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub id: ProgramId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub current_week: u32,
    pub max_weeks: u32,
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub memberships: Vec<Membership>,
}

impl Program {
    pub fn new(id: ProgramId, name: impl Into<String>, max_weeks: u32) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            created_at: Utc::now(),
            current_week: 1,
            max_weeks,
            start_date: None,
            participants: Vec::new(),
            groups: Vec::new(),
            memberships: Vec::new(),
        }
    }

    /// Date ages are measured against: the program start, or today.
    pub fn reference_date(&self) -> NaiveDate {
        self.start_date.unwrap_or_else(|| Utc::now().date_naive())
    }

    pub fn participant(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.id == id)
    }

    pub fn participant_mut(&mut self, id: &ParticipantId) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| &p.id == id)
    }

    pub fn group(&self, id: &GroupId) -> Option<&Group> {
        self.groups.iter().find(|g| &g.id == id)
    }

    pub fn group_mut(&mut self, id: &GroupId) -> Option<&mut Group> {
        self.groups.iter_mut().find(|g| &g.id == id)
    }

    pub fn active_membership(&self, participant: &ParticipantId, week: u32) -> Option<&Membership> {
        self.memberships
            .iter()
            .find(|m| m.active && m.week == week && &m.participant_id == participant)
    }

    pub fn active_count(&self, group: &GroupId, week: u32) -> usize {
        self.memberships
            .iter()
            .filter(|m| m.active && m.week == week && &m.group_id == group)
            .count()
    }
}

/// One spreadsheet cell as handed over by the upload collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Date(NaiveDate),
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(text) => text.trim().is_empty(),
            Cell::Number(n) => n.is_nan(),
            Cell::Date(_) => false,
        }
    }

    /// Trimmed text form, `None` when blank.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(text) => {
                let trimmed = text.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Cell::Number(n) if n.is_nan() => None,
            Cell::Number(n) if n.fract() == 0.0 => Some(format!("{}", *n as i64)),
            Cell::Number(n) => Some(n.to_string()),
            Cell::Date(date) => Some(date.format("%Y-%m-%d").to_string()),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<NaiveDate> for Cell {
    fn from(value: NaiveDate) -> Self {
        Cell::Date(value)
    }
}

/// A raw roster row keyed by normalized header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RosterRow {
    cells: HashMap<String, Cell>,
}

impl RosterRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: AsRef<str>,
        V: Into<Cell>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut row = Self::new();
        for (key, value) in pairs {
            row.insert(key.as_ref(), value.into());
        }
        row
    }

    /// Headers that collide after normalization keep the first non-blank value.
    pub fn insert(&mut self, header: &str, cell: Cell) {
        let key = normalize_header(header);
        match self.cells.get(&key) {
            Some(existing) if !existing.is_blank() => {}
            _ => {
                self.cells.insert(key, cell);
            }
        }
    }

    pub fn get(&self, header: &str) -> Option<&Cell> {
        self.cells.get(&normalize_header(header))
    }

    pub fn is_blank(&self) -> bool {
        self.cells.values().all(Cell::is_blank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_on_reference_date() {
        let birth = NaiveDate::from_ymd_opt(2015, 9, 2);
        let p = Participant::new("Kid", birth, AbilityCode::mixed());
        let reference = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        assert_eq!(p.age_on(reference), 9);

        let unknown = Participant::new("Nobody", None, AbilityCode::mixed());
        assert_eq!(unknown.age_on(reference), 0);
    }

    #[test]
    fn test_row_headers_are_normalized() {
        let row = RosterRow::from_pairs([("Customer ID", "C1"), ("customer_id", "")]);
        assert_eq!(row.get("customerid").and_then(Cell::as_text), Some("C1".to_string()));
        assert!(!row.is_blank());
    }

    #[test]
    fn test_integral_number_renders_without_fraction() {
        assert_eq!(Cell::Number(42.0).as_text(), Some("42".to_string()));
        assert_eq!(Cell::Text("  ".into()).as_text(), None);
    }
}
