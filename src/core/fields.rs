//! Static header alias tables for roster uploads.

use crate::domain::model::{Cell, RosterRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Id,
    CustomerRef,
    Name,
    FirstName,
    LastName,
    BirthDate,
    Ability,
    ProductDescription,
    ParentName,
    ContactEmail,
    EmergencyContact,
    EmergencyPhone,
    FoodAllergy,
    DrugAllergy,
    Medication,
    SpecialCondition,
    Notes,
}

/// Accepted source headers per field, in priority order. Matching ignores case,
/// whitespace and punctuation, so `"Customer ID"` and `"customer_id"` are the same header.
pub const FIELD_ALIASES: &[(Field, &[&str])] = &[
    (Field::Id, &["id", "student_id", "participant_id"]),
    (Field::CustomerRef, &["customer_id", "customer_ref", "customer_number"]),
    (Field::Name, &["name", "customer_name", "student_name", "full_name"]),
    (Field::FirstName, &["first_name", "given_name", "forename"]),
    (Field::LastName, &["last_name", "surname", "family_name"]),
    (Field::BirthDate, &["birth_date", "date_of_birth", "dob", "birthday"]),
    (Field::Ability, &["ability", "ability_level", "ability_code", "level"]),
    (
        Field::ProductDescription,
        &["product_description_1", "product_description", "product"],
    ),
    (Field::ParentName, &["parent_name", "guardian_name", "parent"]),
    (
        Field::ContactEmail,
        &["contact_email", "email", "email_address", "textbox37"],
    ),
    (
        Field::EmergencyContact,
        &["emergency_contact", "primary_emergency_contact", "emergency_name"],
    ),
    (
        Field::EmergencyPhone,
        &["emergency_phone", "primary_emergency_phone", "phone"],
    ),
    (Field::FoodAllergy, &["food_allergy", "allergy", "allergies"]),
    (Field::DrugAllergy, &["drug_allergy", "medication_allergy"]),
    (Field::Medication, &["medication", "medications"]),
    (
        Field::SpecialCondition,
        &["special_condition", "medical_condition", "conditions"],
    ),
    (Field::Notes, &["notes", "note", "comments"]),
];

/// Contact e-mail placeholders that front-desk staff type instead of a real address.
pub const SENTINEL_EMAILS: &[&str] = &["hoh", "guest"];

/// Lower-cases and drops everything that is not a letter or digit.
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn aliases(field: Field) -> &'static [&'static str] {
    FIELD_ALIASES
        .iter()
        .find(|(f, _)| *f == field)
        .map(|(_, aliases)| *aliases)
        .unwrap_or(&[])
}

/// First non-blank cell among the field's aliases.
pub fn resolve<'a>(row: &'a RosterRow, field: Field) -> Option<&'a Cell> {
    aliases(field)
        .iter()
        .filter_map(|alias| row.get(alias))
        .find(|cell| !cell.is_blank())
}

pub fn resolve_text(row: &RosterRow, field: Field) -> Option<String> {
    resolve(row, field).and_then(Cell::as_text)
}

pub fn is_sentinel_email(email: &str, extra: &[String]) -> bool {
    let folded = email.trim().to_lowercase();
    SENTINEL_EMAILS.contains(&folded.as_str()) || extra.iter().any(|s| s.to_lowercase() == folded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("Customer ID"), "customerid");
        assert_eq!(normalize_header("customer_id"), "customerid");
        assert_eq!(normalize_header(" ProductDescription_1 "), "productdescription1");
    }

    #[test]
    fn test_every_field_has_aliases() {
        for field in [
            Field::Id,
            Field::CustomerRef,
            Field::Name,
            Field::BirthDate,
            Field::Ability,
            Field::ContactEmail,
            Field::Notes,
        ] {
            assert!(!aliases(field).is_empty(), "{:?} has no aliases", field);
        }
    }

    #[test]
    fn test_resolve_takes_first_non_blank_alias() {
        let row = RosterRow::from_pairs([("Name", ""), ("CustomerName", "Doe, Jane")]);
        assert_eq!(resolve_text(&row, Field::Name), Some("Doe, Jane".to_string()));
        assert_eq!(resolve_text(&row, Field::BirthDate), None);
    }

    #[test]
    fn test_sentinel_emails() {
        assert!(is_sentinel_email("HOH", &[]));
        assert!(is_sentinel_email(" Guest ", &[]));
        assert!(is_sentinel_email("n/a", &["N/A".to_string()]));
        assert!(!is_sentinel_email("jane@example.com", &[]));
    }
}
