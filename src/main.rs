//! Maintenance CLI for the translation store.
//!
//! Usage:
//!   field-translations export [--with-targets]   # Materialize rows for current values
//!   field-translations stats                     # Progress per entity type and language
//!   field-translations show <type> <language>    # Original/translation pairs
//!   field-translations obsolete                  # Obsolete rows worth reviewing
//!   field-translations purge --yes               # Delete every obsolete row
//!
//! Reports are printed as JSON on stdout; logs go to stderr.
//!
//! Environment variables (all optional):
//! - DATABASE_URL (defaults to sqlite://translations.db?mode=rwc)
//! - DATABASE_MAX_CONNECTIONS (defaults to 5)
//! - LANGUAGES (defaults to en:English)
//! - DEFAULT_LANGUAGE (defaults to en)
//! - SOURCE_FILE (defaults to data/entities.json)
//! - TRANSLATABLE_FIELDS (defaults to every declared field)

use anyhow::{bail, Context, Result};
use field_translations::config::Config;
use field_translations::{JsonSource, KeyValueStore, Registry, ReviewService};
use serde::Serialize;
use tracing::info;

const USAGE: &str = "usage: field-translations <export [--with-targets] | stats | show <type> <language> | obsolete | purge --yes>";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Export { with_targets: bool },
    Stats,
    Show { entity_type: String, language: String },
    Obsolete,
    Purge { confirmed: bool },
}

impl Command {
    fn parse(args: &[String]) -> Result<Self> {
        let flags: Vec<&str> = args.iter().skip(1).map(String::as_str).collect();

        match args.first().map(String::as_str) {
            Some("export") => Ok(Command::Export {
                with_targets: flags.contains(&"--with-targets"),
            }),
            Some("stats") => Ok(Command::Stats),
            Some("show") => match flags.as_slice() {
                [entity_type, language] => Ok(Command::Show {
                    entity_type: entity_type.to_string(),
                    language: language.to_string(),
                }),
                _ => bail!("show expects <type> <language>\n{}", USAGE),
            },
            Some("obsolete") => Ok(Command::Obsolete),
            Some("purge") => Ok(Command::Purge {
                confirmed: flags.contains(&"--yes"),
            }),
            Some(other) => bail!("Unknown command '{}'\n{}", other, USAGE),
            None => bail!("{}", USAGE),
        }
    }
}

fn build_registry(config: &Config, source: &JsonSource) -> Result<Registry> {
    let mut registry = Registry::new();
    if config.translatable_fields.is_empty() {
        registry.register_all(source)?;
    } else {
        for (entity_type, fields) in &config.translatable_fields {
            registry
                .register(source, entity_type, fields.iter().cloned())
                .with_context(|| format!("Failed to register {}", entity_type))?;
        }
    }
    Ok(registry)
}

fn print_json<T: Serialize>(report: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    // Initialize logging (stderr, so stdout stays machine-readable)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("field_translations=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;

    let config = Config::from_env()?;
    let languages = config.language_list()?;

    let source = JsonSource::from_path(&config.source_file)
        .with_context(|| format!("Failed to load entities from {}", config.source_file))?;
    let registry = build_registry(&config, &source)?;
    info!("Registered {} entity types", registry.entries().len());

    let store = KeyValueStore::connect(
        &config.database_url,
        languages.default_code(),
        config.database_max_connections,
    )
    .await
    .context("Failed to open translation store")?;

    let service = ReviewService::new(&store, &source, &registry, &languages)?;

    match command {
        Command::Export { with_targets } => print_json(&service.export(with_targets).await?)?,
        Command::Stats => print_json(&service.model_list().await?)?,
        Command::Show {
            entity_type,
            language,
        } => print_json(&service.model_detail(&entity_type, &language).await?)?,
        Command::Obsolete => print_json(&service.obsolete_list().await?)?,
        Command::Purge { confirmed } => {
            if !confirmed {
                bail!("purge permanently deletes every obsolete row; re-run with --yes");
            }
            let deleted = service.purge_obsolete().await?;
            print_json(&serde_json::json!({ "deleted": deleted }))?;
        }
    }

    Ok(())
}
