use anyhow::Result;
use roster_groups::adapters::SnapshotRepository;
use roster_groups::core::maintenance;
use roster_groups::domain::model::RosterRow;
use roster_groups::{LocalStorage, RosterConfig, RosterIngestor, RosterStore, WeeklyAllocator};
use tempfile::TempDir;

fn repository(dir: &TempDir) -> SnapshotRepository<LocalStorage> {
    SnapshotRepository::new(
        LocalStorage::new(dir.path().to_string_lossy().to_string()),
        "roster.json",
    )
}

#[tokio::test]
async fn test_state_survives_reload() -> Result<()> {
    let dir = TempDir::new()?;
    let repo = repository(&dir);

    let store = repo.load().await?;
    let program = store.create_program("Ride Tribe", "", 6, None)?;
    let rows = vec![
        RosterRow::from_pairs([("Name", "Ann Lee"), ("Ability", "FT"), ("Email", "guest")]),
        RosterRow::from_pairs([("Name", "Bo Chan"), ("Ability", "FT"), ("Email", "bo@example.com")]),
        RosterRow::from_pairs([("Name", "Cy Park"), ("Ability", "FT"), ("Email", "cy@example.com")]),
    ];
    RosterIngestor::default().ingest_file(&store, &program, &rows)?;

    let allocator = WeeklyAllocator::new(&store);
    allocator.allocate_week(&program, 1, 2)?;
    let groups = allocator.groups_with_members(&program, 1)?;
    let (from, to) = if groups[0].members.len() == 2 {
        (&groups[0], &groups[1])
    } else {
        (&groups[1], &groups[0])
    };
    let mover = from.members[0].id.clone();
    allocator.move_participant(&mover, 1, &to.group.id, "coach", Some("friends"))?;
    maintenance::assign_instructor(&store, &to.group.id, "Mia")?;
    repo.save(&store).await?;

    let reloaded: RosterStore = repo.load().await?;
    let allocator = WeeklyAllocator::new(&reloaded);
    let history = allocator.movement_history(&mover)?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].reason.as_deref(), Some("friends"));

    let summary = allocator.group_summary(&program, 1)?;
    let target = summary.iter().find(|g| g.group_id == to.group.id).expect("target group");
    assert_eq!(target.instructor.as_deref(), Some("Mia"));
    assert_eq!(target.members, 2);

    // sentinel e-mails are never stored on import
    let report = maintenance::diagnostics(&reloaded, &[])?;
    assert_eq!(report[0].sentinel_emails, 0);
    assert_eq!(report[0].active_memberships.get(&1), Some(&3));
    Ok(())
}

#[tokio::test]
async fn test_config_points_at_snapshot() -> Result<()> {
    let dir = TempDir::new()?;
    let toml = format!(
        "[storage]\ndata_dir = \"{}\"\nsnapshot_file = \"state/roster.json\"\n",
        dir.path().display()
    );
    let config = RosterConfig::from_toml_str(&toml)?;

    let repo = SnapshotRepository::new(
        LocalStorage::new(config.storage.data_dir.clone()),
        config.storage.snapshot_file.clone(),
    );
    let store = RosterStore::new();
    store.create_program("Winter", "", 6, None)?;
    repo.save(&store).await?;

    assert!(config.snapshot_path().exists());
    Ok(())
}
