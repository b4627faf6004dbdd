//! CLI interface for autodidact

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::orchestrator::Orchestrator;
use crate::types::{Depth, TaskPriority};

#[derive(Parser)]
#[command(name = "autodidact")]
#[command(about = "Autonomous technology learner: generate, sandbox, grade, and archive runnable examples", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Learn one technology now (bypasses the queue)
    Learn {
        /// Library/framework/tool to learn (e.g. "json", "fastapi")
        technology: String,
        /// How thorough the generated material should be
        #[arg(short, long, default_value = "basic")]
        depth: Depth,
    },
    /// Queue several technologies and drain them in priority order
    Batch {
        /// Technologies to learn
        technologies: Vec<String>,
        #[arg(short, long, default_value = "basic")]
        depth: Depth,
        #[arg(short, long, default_value = "normal")]
        priority: TaskPriority,
    },
    /// Show pipeline and knowledge status
    Status,
    /// Print a human-readable learning report
    Report,
    /// List learned technologies
    List,
    /// Search stored knowledge
    Search {
        query: String,
    },
    /// Show the latest stored record for a technology
    Show {
        technology: String,
        /// Specific version instead of the latest
        #[arg(short, long)]
        version: Option<u32>,
    },
    /// Manage the provider API key
    Key {
        #[command(subcommand)]
        command: KeyCommands,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Store the API key (keyring, with file fallback)
    Set { key: String },
    /// Remove the stored API key
    Delete,
    /// Check whether an API key is available
    Status,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the active configuration
    Show,
    /// Write a default config file if none exists
    Init,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Learn { technology, depth } => {
            let orchestrator = Orchestrator::from_config(&config)?;
            let result = orchestrator.learn_technology(&technology, depth).await?;

            println!(
                "{} {}: grade {}, proficiency {:.2}, tests {}/{} ({:.1}s)",
                if result.success { "Learned" } else { "Failed" },
                result.technology,
                result.quality_grade,
                result.proficiency,
                result.tests_passed,
                result.tests_total,
                result.execution_time,
            );
            for error in &result.errors {
                println!("  error: {}", error);
            }
            for suggestion in &result.suggestions {
                println!("  hint: {}", suggestion);
            }
        }
        Commands::Batch { technologies, depth, priority } => {
            if technologies.is_empty() {
                anyhow::bail!("no technologies given");
            }
            let orchestrator = Orchestrator::from_config(&config)?;
            for technology in &technologies {
                orchestrator.queue_learning(technology, depth, priority)?;
            }
            orchestrator.drain().await;
            println!("{}", orchestrator.generate_report()?);
        }
        Commands::Status => {
            let orchestrator = Orchestrator::from_config(&config)?;
            let status = orchestrator.get_status()?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Report => {
            let orchestrator = Orchestrator::from_config(&config)?;
            println!("{}", orchestrator.generate_report()?);
        }
        Commands::List => {
            let orchestrator = Orchestrator::from_config(&config)?;
            for technology in orchestrator.get_learned_technologies()? {
                println!("{}", technology);
            }
        }
        Commands::Search { query } => {
            let orchestrator = Orchestrator::from_config(&config)?;
            let results = orchestrator.search_knowledge(&query)?;
            if results.is_empty() {
                println!("No matches for '{}'", query);
            }
            for record in results {
                println!(
                    "{} (v{}, grade {}), learned {}",
                    record.technology,
                    record.version,
                    record.quality_grade,
                    record.learned_at.format("%Y-%m-%d %H:%M UTC")
                );
            }
        }
        Commands::Show { technology, version } => {
            let orchestrator = Orchestrator::from_config(&config)?;
            let record = match version {
                Some(v) => orchestrator
                    .knowledge()
                    .get_version(&technology, v)?
                    .ok_or_else(|| anyhow::anyhow!("no version {} for '{}'", v, technology))?,
                None => orchestrator.knowledge().get_latest(&technology)?,
            };
            println!(
                "# {} v{}: grade {}, proficiency {:.2}, learned {}\n",
                record.technology,
                record.version,
                record.quality_grade,
                record.proficiency,
                record.learned_at.format("%Y-%m-%d %H:%M UTC")
            );
            println!("{}", record.content);
        }
        Commands::Key { command } => match command {
            KeyCommands::Set { key } => {
                crate::secrets::set_api_key(&key)?;
                println!("API key stored");
            }
            KeyCommands::Delete => {
                crate::secrets::delete_api_key()?;
                println!("API key deleted");
            }
            KeyCommands::Status => {
                if crate::secrets::has_api_key() {
                    println!("API key is available");
                } else {
                    println!("No API key found. Run 'autodidact key set YOUR_KEY'.");
                }
            }
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                println!("{}", toml::to_string_pretty(&config)?);
            }
            ConfigCommands::Init => {
                let path = crate::config::config_path()?;
                if path.exists() {
                    println!("Config already exists at {}", path.display());
                } else {
                    Config::default().save()?;
                    println!("Wrote default config to {}", path.display());
                }
            }
        },
    }

    Ok(())
}
