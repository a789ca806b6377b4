use anyhow::Result;
use chrono::NaiveDate;
use roster_groups::adapters::CsvRowSource;
use roster_groups::domain::ports::RowSource;
use roster_groups::{DuplicateStrategy, RosterError, RosterIngestor, RosterStore};
use std::io::Write;
use tempfile::NamedTempFile;

const EXPORT: &str = "\
Customer ID,Customer Name,Date of Birth,Product Description,Contact Email,Drug Allergy,Notes
C-1,\"Doe, Jane\",05-Mar-15,Ride Tribe - FT,HOH,,likes jumps
C-2,Sam Lee,2014-07-09,Ride Tribe - Intermediate,Parent@Example.com,penicillin,
,,,,,,
C-3,Ana Ruiz,41651,Ride Tribe - AZ,,,
";

fn export_file(content: &str) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(content.as_bytes())?;
    Ok(file)
}

#[test]
fn test_import_export_into_program() -> Result<()> {
    let file = export_file(EXPORT)?;
    let rows = CsvRowSource::from_path(file.path())?.rows()?;
    assert_eq!(rows.len(), 4);

    let store = RosterStore::new();
    let program = store.create_program("Ride Tribe", "", 6, None)?;
    let summary = RosterIngestor::default().ingest_file(&store, &program, &rows)?;

    assert_eq!(summary.created, 3);
    assert_eq!(summary.processed(), 3);

    store.read_program(&program, |p| {
        let jane = p.participants.iter().find(|x| x.name == "Jane Doe").unwrap();
        assert_eq!(jane.ability.as_str(), "FT");
        assert_eq!(jane.birth_date, NaiveDate::from_ymd_opt(2015, 3, 5));
        assert!(jane.contact.contact_email.is_empty());
        assert_eq!(jane.notes[0].text, "likes jumps");
        assert_eq!(jane.notes[0].author, "import");

        let sam = p.participants.iter().find(|x| x.name == "Sam Lee").unwrap();
        assert_eq!(sam.ability.as_str(), "IZ");
        assert_eq!(sam.contact.contact_email, "parent@example.com");
        assert_eq!(sam.contact.drug_allergy, "penicillin");

        let ana = p.participants.iter().find(|x| x.name == "Ana Ruiz").unwrap();
        assert_eq!(ana.birth_date, NaiveDate::from_ymd_opt(2014, 1, 12));
    })?;
    Ok(())
}

#[test]
fn test_reimport_respects_duplicate_strategy() -> Result<()> {
    let rows = CsvRowSource::from_reader(EXPORT.as_bytes()).rows()?;
    let store = RosterStore::new();
    let program = store.create_program("Ride Tribe", "", 6, None)?;

    RosterIngestor::default().ingest_file(&store, &program, &rows)?;
    let skipped = RosterIngestor::new(DuplicateStrategy::Skip).ingest_file(&store, &program, &rows)?;
    assert_eq!(skipped.skipped, 3);

    let updated = RosterIngestor::new(DuplicateStrategy::Update).ingest_file(&store, &program, &rows)?;
    assert_eq!(updated.updated, 3);

    let duplicated = RosterIngestor::new(DuplicateStrategy::Duplicate).ingest_file(&store, &program, &rows)?;
    assert_eq!(duplicated.created, 3);
    assert_eq!(store.read_program(&program, |p| p.participants.len())?, 6);
    Ok(())
}

#[test]
fn test_bad_row_rolls_back_whole_upload() -> Result<()> {
    let content = "\
Customer ID,Customer Name,Ability
C-1,Ann Lee,FT
C-2,,BZ1
C-3,Bo Chan,AZ
";
    let rows = CsvRowSource::from_reader(content.as_bytes()).rows()?;
    let store = RosterStore::new();
    let program = store.create_program("Spring", "", 6, None)?;

    let err = RosterIngestor::default()
        .ingest_file(&store, &program, &rows)
        .unwrap_err();

    match err {
        RosterError::Ingest { row, processed, .. } => {
            assert_eq!(row, 2);
            assert_eq!(processed, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.read_program(&program, |p| p.participants.len())?, 0);
    Ok(())
}
