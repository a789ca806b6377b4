use clap::Parser;
use roster_groups::adapters::{CsvRowSource, SnapshotRepository};
use roster_groups::config::Command;
use roster_groups::core::maintenance;
use roster_groups::domain::model::{GroupId, ParticipantId, ProgramId};
use roster_groups::domain::ports::RowSource;
use roster_groups::utils::error::ErrorSeverity;
use roster_groups::utils::{logger, validation::Validate};
use roster_groups::{CliConfig, LocalStorage, RosterConfig, RosterIngestor, RosterStore, WeeklyAllocator};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    let settings = match cli.load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", cli.config, e);
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    // 初始化日誌
    if settings.is_json_logging() {
        logger::init_json_logger(&settings.logging.level);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("🚀 Starting roster-groups");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    // 驗證配置
    if let Err(e) = cli.validate().and_then(|_| settings.validate()) {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let repository = SnapshotRepository::new(
        LocalStorage::new(settings.storage.data_dir.clone()),
        settings.storage.snapshot_file.clone(),
    );

    if let Err(e) = run(&cli.command, &settings, &repository).await {
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2, // 找不到或額滿，可換參數重試
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3, // 儲存層錯誤
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn run(
    command: &Command,
    settings: &RosterConfig,
    repository: &SnapshotRepository<LocalStorage>,
) -> roster_groups::Result<()> {
    let store = repository.load().await?;
    if execute(command, settings, &store)? {
        repository.save(&store).await?;
        tracing::info!("📁 Roster saved to {}", settings.snapshot_path().display());
    }
    Ok(())
}

/// Runs one command; returns whether the store changed.
fn execute(command: &Command, settings: &RosterConfig, store: &RosterStore) -> roster_groups::Result<bool> {
    let allocator = WeeklyAllocator::new(store);

    match command {
        Command::CreateProgram {
            name,
            description,
            max_weeks,
            start_date,
        } => {
            let weeks = max_weeks.unwrap_or(settings.allocation.default_max_weeks);
            let id = store.create_program(name, description, weeks, *start_date)?;
            println!("✅ Created program {} ({} weeks)", id, weeks);
            Ok(true)
        }
        Command::DeleteProgram { program } => {
            store.delete_program(&ProgramId::from(program.as_str()))?;
            println!("🗑️  Deleted program {}", program);
            Ok(true)
        }
        Command::Programs => {
            for id in store.program_ids()? {
                let line = store.read_program(&id, |p| {
                    format!(
                        "{}\t{}\tweek {}/{}\t{} participants\t{} groups",
                        p.id,
                        p.name,
                        p.current_week,
                        p.max_weeks,
                        p.participants.len(),
                        p.groups.len()
                    )
                })?;
                println!("{}", line);
            }
            Ok(false)
        }
        Command::Ingest {
            program,
            file,
            strategy,
        } => {
            tracing::info!("📥 Reading roster from {}", file.display());
            let rows = CsvRowSource::from_path(file)?.rows()?;
            let ingestor = RosterIngestor::new(strategy.unwrap_or(settings.ingest.duplicate_strategy))
                .with_extra_sentinel_emails(settings.ingest.extra_sentinel_emails.clone());
            let summary = ingestor.ingest_file(store, &ProgramId::from(program.as_str()), &rows)?;
            println!(
                "✅ Imported {} rows: {} created, {} updated, {} skipped",
                summary.processed(),
                summary.created,
                summary.updated,
                summary.skipped
            );
            Ok(true)
        }
        Command::Allocate {
            program,
            week,
            capacity,
        } => {
            let capacity = capacity.unwrap_or(settings.allocation.default_capacity);
            let report = allocator.allocate_week(&ProgramId::from(program.as_str()), *week, capacity)?;
            println!(
                "✅ Week {}: {} assigned, {} unassigned, {} new groups, {} movements",
                report.week, report.assigned, report.unassigned, report.groups_created, report.movements
            );
            Ok(true)
        }
        Command::Move {
            participant,
            week,
            group,
            actor,
            reason,
        } => {
            allocator.move_participant(
                &ParticipantId::from(participant.as_str()),
                *week,
                &GroupId::from(group.as_str()),
                actor,
                reason.as_deref(),
            )?;
            println!("✅ Moved {} to {}", participant, group);
            Ok(true)
        }
        Command::Remove {
            participant,
            week,
            actor,
            reason,
        } => {
            let group = allocator.remove_participant(
                &ParticipantId::from(participant.as_str()),
                *week,
                actor,
                reason.as_deref(),
            )?;
            println!("✅ Removed {} from {} for week {}", participant, group, week);
            Ok(true)
        }
        Command::BulkMove {
            week,
            group,
            actor,
            participants,
        } => {
            let ids: Vec<ParticipantId> = participants.iter().map(|p| ParticipantId::from(p.as_str())).collect();
            let report = allocator.bulk_move(&ids, *week, &GroupId::from(group.as_str()), actor)?;
            println!("✅ Moved {} participants to {}", report.moved, group);
            for skipped in &report.skipped {
                println!("⚠️  Skipped {}", skipped);
            }
            Ok(report.moved > 0)
        }
        Command::Advance { program } => {
            let week = allocator.advance_week(&ProgramId::from(program.as_str()))?;
            println!("✅ {} is now in week {}", program, week);
            Ok(true)
        }
        Command::Groups {
            program,
            week,
            summary,
        } => {
            let program_id = ProgramId::from(program.as_str());
            if *summary {
                for group in allocator.group_summary(&program_id, *week)? {
                    println!(
                        "{}\t{}\t{}\t{}/{}\tmean age {:.1}\t{}",
                        group.group_id,
                        group.name,
                        group.ability,
                        group.members,
                        group.capacity,
                        group.average_age,
                        group.instructor.as_deref().unwrap_or("-")
                    );
                }
            } else {
                for view in allocator.groups_with_members(&program_id, *week)? {
                    println!(
                        "{} ({}) [{}/{}]",
                        view.group.name,
                        view.group.id,
                        view.members.len(),
                        view.group.capacity
                    );
                    for member in &view.members {
                        println!("  {}\t{}", member.id, member.name);
                    }
                }
            }
            Ok(false)
        }
        Command::Unassigned { program, week } => {
            for participant in allocator.unassigned(&ProgramId::from(program.as_str()), *week)? {
                println!("{}\t{}\t{}", participant.id, participant.name, participant.ability);
            }
            Ok(false)
        }
        Command::History { participant } => {
            let history = allocator.movement_history(&ParticipantId::from(participant.as_str()))?;
            println!("{}", serde_json::to_string_pretty(&history)?);
            Ok(false)
        }
        Command::AddNote {
            program,
            participant,
            text,
            author,
        } => {
            maintenance::add_note(
                store,
                &ProgramId::from(program.as_str()),
                &ParticipantId::from(participant.as_str()),
                text,
                author,
            )?;
            println!("✅ Note added to {}", participant);
            Ok(true)
        }
        Command::AssignInstructor { group, instructor } => {
            maintenance::assign_instructor(store, &GroupId::from(group.as_str()), instructor)?;
            println!("✅ Instructor of {} set", group);
            Ok(true)
        }
    }
}
