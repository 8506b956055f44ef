//! wsitconf binary.
//!
//! Run with: `wsitconf apply --config config.yaml`

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use wsitconf::{apply_config, render_policies, SecurityProfile, WsitConfig};

/// WS-SecurityPolicy profile tool.
///
/// Builds the WSDL skeleton described by a configuration file, installs the
/// configured security profiles on it and reports how every binding and
/// operation classifies afterwards.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the buildable security profiles
    Profiles {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Apply the profile rules of a configuration file
    Apply {
        /// Path to configuration file (YAML)
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,

        /// Also print the resulting policies as XML
        #[arg(long)]
        render: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = args.log_level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    match args.command {
        Command::Profiles { format } => list_profiles(format),
        Command::Apply {
            config,
            format,
            render,
        } => run_apply(config, format, render),
    }
}

fn list_profiles(format: Format) -> Result<()> {
    match format {
        Format::Json => {
            let profiles: Vec<_> = SecurityProfile::ALL
                .into_iter()
                .map(|p| {
                    serde_json::json!({
                        "id": p.as_str(),
                        "name": p.display_name(),
                        "description": p.description(),
                        "requirements": p.requirements(),
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&profiles).context("Failed to serialize profiles")?
            );
        }
        Format::Text => {
            for p in SecurityProfile::ALL {
                println!("{:<52} {}", p.as_str(), p.display_name());
                println!("    {}", p.description());
            }
        }
    }
    Ok(())
}

fn run_apply(path: PathBuf, format: Format, render: bool) -> Result<()> {
    info!("Starting wsitconf v{}", env!("CARGO_PKG_VERSION"));
    info!("Config file: {}", path.display());

    // Load configuration
    let config: WsitConfig = if path.exists() {
        let content = std::fs::read_to_string(&path).context("Failed to read config file")?;
        serde_yaml::from_str(&content).context("Failed to parse config file")?
    } else {
        info!("Config file not found, using defaults");
        WsitConfig::default()
    };

    info!(
        config_version = %config.settings.config_version,
        bindings = config.document.bindings.len(),
        rules = config.profiles.len(),
        "Configuration loaded"
    );

    let mut doc = config
        .build_document()
        .context("Failed to build document from configuration")?;
    let report = apply_config(&mut doc, &config).context("Failed to apply profile rules")?;

    match format {
        Format::Json => println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        ),
        Format::Text => print!("{}", report),
    }

    if render {
        let xml = render_policies(&doc).context("Failed to render policies")?;
        println!("{}", xml);
    }

    info!("Done");
    Ok(())
}
