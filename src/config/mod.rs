pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli_args::{AdminCommand, AdminConfig, CliConfig, Command};

#[cfg(feature = "cli")]
mod cli_args {
    use super::toml_config::{RosterConfig, DEFAULT_CONFIG_FILE};
    use crate::core::ingest::DuplicateStrategy;
    use crate::utils::error::Result;
    use crate::utils::validation::{self, Validate};
    use chrono::NaiveDate;
    use clap::{Parser, Subcommand};
    use std::path::PathBuf;

    #[derive(Debug, Clone, Parser)]
    #[command(name = "roster-groups")]
    #[command(about = "Weekly ability groups for multi-week lesson programs")]
    pub struct CliConfig {
        /// Path to TOML configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        pub config: String,

        /// Override storage.data_dir from config
        #[arg(long)]
        pub data_dir: Option<String>,

        #[arg(short, long, help = "Enable verbose output")]
        pub verbose: bool,

        #[command(subcommand)]
        pub command: Command,
    }

    #[derive(Debug, Clone, Subcommand)]
    pub enum Command {
        /// Create a program; its id is derived from the name
        CreateProgram {
            #[arg(long)]
            name: String,
            #[arg(long, default_value = "")]
            description: String,
            /// Defaults to allocation.default_max_weeks
            #[arg(long)]
            max_weeks: Option<u32>,
            /// YYYY-MM-DD; ages are computed on this date
            #[arg(long)]
            start_date: Option<NaiveDate>,
        },
        /// Delete a program with its participants and groups
        DeleteProgram {
            #[arg(long)]
            program: String,
        },
        /// List programs
        Programs,
        /// Import a roster CSV export into a program
        Ingest {
            #[arg(long)]
            program: String,
            file: PathBuf,
            /// Defaults to ingest.duplicate_strategy
            #[arg(long, value_enum)]
            strategy: Option<DuplicateStrategy>,
        },
        /// Build (week 1) or rebuild (later weeks) the groups of a week
        Allocate {
            #[arg(long)]
            program: String,
            #[arg(long)]
            week: u32,
            /// Defaults to allocation.default_capacity
            #[arg(long)]
            capacity: Option<usize>,
        },
        /// Move one participant to another group
        Move {
            #[arg(long)]
            participant: String,
            #[arg(long)]
            week: u32,
            #[arg(long)]
            group: String,
            #[arg(long, default_value = "cli")]
            actor: String,
            #[arg(long)]
            reason: Option<String>,
        },
        /// Take a participant out of their group for a week
        Remove {
            #[arg(long)]
            participant: String,
            #[arg(long)]
            week: u32,
            #[arg(long, default_value = "cli")]
            actor: String,
            #[arg(long)]
            reason: Option<String>,
        },
        /// Move several participants to one group
        BulkMove {
            #[arg(long)]
            week: u32,
            #[arg(long)]
            group: String,
            #[arg(long, default_value = "cli")]
            actor: String,
            #[arg(required = true)]
            participants: Vec<String>,
        },
        /// Move a program to its next week
        Advance {
            #[arg(long)]
            program: String,
        },
        /// Show groups and members for a week
        Groups {
            #[arg(long)]
            program: String,
            #[arg(long)]
            week: u32,
            /// Print member count and mean age instead of names
            #[arg(long)]
            summary: bool,
        },
        /// List participants without a group for a week
        Unassigned {
            #[arg(long)]
            program: String,
            #[arg(long)]
            week: u32,
        },
        /// Movement history of a participant
        History {
            #[arg(long)]
            participant: String,
        },
        AddNote {
            #[arg(long)]
            program: String,
            #[arg(long)]
            participant: String,
            #[arg(long)]
            text: String,
            #[arg(long, default_value = "cli")]
            author: String,
        },
        /// Set the instructor of a group; an empty name clears it
        AssignInstructor {
            #[arg(long)]
            group: String,
            #[arg(long)]
            instructor: String,
        },
    }

    impl CliConfig {
        /// Loads the TOML file (or defaults) and applies command-line overrides.
        pub fn load_settings(&self) -> Result<RosterConfig> {
            let mut settings = RosterConfig::load_or_default(&self.config)?;
            if let Some(dir) = &self.data_dir {
                settings.storage.data_dir = dir.clone();
            }
            Ok(settings)
        }
    }

    impl Validate for CliConfig {
        fn validate(&self) -> Result<()> {
            validation::validate_path("config", &self.config)?;
            if let Some(dir) = &self.data_dir {
                validation::validate_path("data_dir", dir)?;
            }
            match &self.command {
                Command::Allocate {
                    capacity: Some(capacity),
                    ..
                } => validation::validate_positive_number("capacity", *capacity, 1),
                Command::CreateProgram { name, max_weeks, .. } => {
                    validation::validate_non_empty_string("name", name)?;
                    match max_weeks {
                        Some(weeks) => validation::validate_positive_number("max_weeks", *weeks as usize, 1),
                        None => Ok(()),
                    }
                }
                _ => Ok(()),
            }
        }
    }

    #[derive(Debug, Clone, Parser)]
    #[command(name = "roster-admin")]
    #[command(about = "Roster data maintenance")]
    pub struct AdminConfig {
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        pub config: String,

        #[arg(long)]
        pub data_dir: Option<String>,

        #[arg(short, long, help = "Enable verbose output")]
        pub verbose: bool,

        #[command(subcommand)]
        pub command: AdminCommand,
    }

    #[derive(Debug, Clone, Subcommand)]
    pub enum AdminCommand {
        /// Record counts and data-quality figures per program
        Diagnostics,
        /// Remove all participants, groups and memberships of a program
        Clear {
            #[arg(long)]
            program: String,
        },
        /// Blank out placeholder contact e-mails (hoh, guest, ...)
        FixEmails {
            #[arg(long)]
            program: String,
        },
    }

    impl AdminConfig {
        pub fn load_settings(&self) -> Result<RosterConfig> {
            let mut settings = RosterConfig::load_or_default(&self.config)?;
            if let Some(dir) = &self.data_dir {
                settings.storage.data_dir = dir.clone();
            }
            Ok(settings)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_parse_allocate() {
            let cli = CliConfig::try_parse_from([
                "roster-groups",
                "--data-dir",
                "/tmp/r",
                "allocate",
                "--program",
                "winter",
                "--week",
                "2",
            ])
            .unwrap();

            assert!(matches!(
                cli.command,
                Command::Allocate { week: 2, capacity: None, .. }
            ));
            assert!(cli.validate().is_ok());
        }

        #[test]
        fn test_zero_capacity_fails_validation() {
            let cli = CliConfig::try_parse_from([
                "roster-groups",
                "allocate",
                "--program",
                "winter",
                "--week",
                "1",
                "--capacity",
                "0",
            ])
            .unwrap();
            assert!(cli.validate().is_err());
        }

        #[test]
        fn test_ingest_strategy_and_start_date() {
            let cli = CliConfig::try_parse_from([
                "roster-groups",
                "ingest",
                "--program",
                "winter",
                "--strategy",
                "update",
                "export.csv",
            ])
            .unwrap();
            assert!(matches!(
                cli.command,
                Command::Ingest { strategy: Some(DuplicateStrategy::Update), .. }
            ));

            let cli = CliConfig::try_parse_from([
                "roster-groups",
                "create-program",
                "--name",
                "Ride Tribe",
                "--start-date",
                "2025-09-06",
            ])
            .unwrap();
            assert!(matches!(
                cli.command,
                Command::CreateProgram { start_date: Some(_), .. }
            ));
        }

        #[test]
        fn test_parse_remove() {
            let cli = CliConfig::try_parse_from([
                "roster-groups",
                "remove",
                "--participant",
                "p-1",
                "--week",
                "3",
                "--reason",
                "injured",
            ])
            .unwrap();

            match cli.command {
                Command::Remove {
                    participant,
                    week,
                    actor,
                    reason,
                } => {
                    assert_eq!(participant, "p-1");
                    assert_eq!(week, 3);
                    assert_eq!(actor, "cli");
                    assert_eq!(reason.as_deref(), Some("injured"));
                }
                other => panic!("unexpected command {:?}", other),
            }
        }

        #[test]
        fn test_data_dir_override() {
            let cli = AdminConfig::try_parse_from([
                "roster-admin",
                "--config",
                "/definitely/not/here.toml",
                "--data-dir",
                "/srv/roster",
                "diagnostics",
            ])
            .unwrap();
            let settings = cli.load_settings().unwrap();
            assert_eq!(settings.storage.data_dir, "/srv/roster");
        }
    }
}
