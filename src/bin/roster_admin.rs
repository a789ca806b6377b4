use clap::Parser;
use roster_groups::adapters::SnapshotRepository;
use roster_groups::config::AdminCommand;
use roster_groups::core::maintenance;
use roster_groups::domain::model::ProgramId;
use roster_groups::utils::error::ErrorSeverity;
use roster_groups::utils::{logger, validation::Validate};
use roster_groups::{AdminConfig, LocalStorage, RosterConfig, RosterStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = AdminConfig::parse();

    let settings = match args.load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 初始化日誌
    logger::init_cli_logger(args.verbose);
    tracing::info!("🔧 Starting roster-admin");

    if let Err(e) = settings.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let repository = SnapshotRepository::new(
        LocalStorage::new(settings.storage.data_dir.clone()),
        settings.storage.snapshot_file.clone(),
    );

    let result = async {
        let store = repository.load().await?;
        if execute(&args.command, &settings, &store)? {
            repository.save(&store).await?;
        }
        Ok::<_, roster_groups::RosterError>(())
    }
    .await;

    if let Err(e) = result {
        tracing::error!("❌ {} (Category: {:?})", e, e.category());
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());
        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

fn execute(command: &AdminCommand, settings: &RosterConfig, store: &RosterStore) -> roster_groups::Result<bool> {
    let sentinels = &settings.ingest.extra_sentinel_emails;

    match command {
        AdminCommand::Diagnostics => {
            for report in maintenance::diagnostics(store, sentinels)? {
                println!("📊 {} ({}) - week {}", report.name, report.program_id, report.current_week);
                println!("   participants:            {}", report.participants);
                println!("   placeholder e-mails:     {}", report.sentinel_emails);
                println!("   with customer reference: {}", report.with_customer_ref);
                println!("   with name and birthdate: {}", report.with_name_and_birth_date);
                for (week, count) in &report.active_memberships {
                    println!("   week {} active memberships: {}", week, count);
                }
            }
            Ok(false)
        }
        AdminCommand::Clear { program } => {
            let report = maintenance::clear_program(store, &ProgramId::from(program.as_str()))?;
            println!(
                "🗑️  Cleared {}: {} participants, {} groups, {} memberships",
                program, report.participants, report.groups, report.memberships
            );
            Ok(true)
        }
        AdminCommand::FixEmails { program } => {
            let fixed = maintenance::scrub_sentinel_emails(store, &ProgramId::from(program.as_str()), sentinels)?;
            println!("✅ Cleared {} placeholder e-mails in {}", fixed, program);
            Ok(fixed > 0)
        }
    }
}
