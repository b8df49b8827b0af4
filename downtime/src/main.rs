//! downtime: generate the exoplanet dataset lineage and evaluate freshness
//! detection against it.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::info;

use downtime::report;
use downtime::{Config, LineageRunner, SqliteStore};

#[derive(Parser)]
#[command(name = "downtime")]
#[command(about = "Synthetic data-downtime datasets and freshness evaluation")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "downtime.toml")]
    config: PathBuf,

    /// Output directory for generation stores (overrides config file)
    #[arg(short, long, env = "DOWNTIME_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Seed phrase (overrides config file)
    #[arg(long, env = "DOWNTIME_SEED")]
    seed: Option<String>,

    /// Log level for this tool (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build the dataset lineage
    Generate {
        /// Build only this generation
        #[arg(short, long)]
        generation: Option<String>,
    },

    /// Sweep freshness thresholds over a stored table
    Evaluate {
        /// SQLite store to read
        #[arg(long)]
        db: PathBuf,
        /// Table to evaluate (defaults to the configured table)
        #[arg(short, long)]
        table: Option<String>,
        /// Print JSON instead of a text table
        #[arg(long)]
        json: bool,
    },

    /// List update dates whose gap exceeds a threshold
    Freshness {
        #[arg(long)]
        db: PathBuf,
        #[arg(long)]
        threshold: u32,
        #[arg(short, long)]
        table: Option<String>,
    },

    /// Write the default configuration
    InitConfig {
        #[arg(short, long, default_value = "downtime.toml")]
        path: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let directive = format!("downtime={}", cli.log_level.as_deref().unwrap_or("info"));
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?),
        )
        .init();

    run(cli)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        config: config_path,
        output_dir,
        seed,
        command,
        ..
    } = cli;
    let load = || load_config(&config_path, output_dir.clone(), seed.clone());

    match command {
        Commands::InitConfig { path } => {
            let content = Config::default().to_toml_string()?;
            std::fs::write(&path, content)?;
            println!("Wrote default configuration to {}", path.display());
        }
        Commands::Generate { generation } => {
            let runner = LineageRunner::new(load()?)?;
            info!(output_dir = %runner.config().output_dir.display(), "Generating lineage");
            let summaries = match generation {
                Some(name) => vec![runner.run_one(&name)?],
                None => runner.run_all()?,
            };
            for s in summaries {
                println!(
                    "{}: {} rows ({} carried, {} new), {} derived, {} update dates, {} outage days -> {}",
                    s.name,
                    s.carried_rows + s.new_rows,
                    s.carried_rows,
                    s.new_rows,
                    s.derived_rows,
                    s.distinct_dates,
                    s.outage_days,
                    s.db_path.display()
                );
            }
        }
        Commands::Evaluate { db, table, json } => {
            let config = load()?;
            let store = open_existing(&db)?;
            let table = table.unwrap_or_else(|| config.evaluation.table.clone());
            let rows = report::sweep_store(&store, &table, &config.evaluation)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                print!("{}", report::render(&rows));
            }
        }
        Commands::Freshness {
            db,
            threshold,
            table,
        } => {
            let config = load()?;
            let store = open_existing(&db)?;
            let table = table.unwrap_or_else(|| config.evaluation.table.clone());
            for gap in store.freshness_anomalies(&table, threshold)? {
                println!("{}\t{} days", gap.date, gap.days_since_previous);
            }
        }
    }

    Ok(())
}

/// Config file (or defaults) with command-line overrides applied.
fn load_config(
    path: &Path,
    output_dir: Option<PathBuf>,
    seed: Option<String>,
) -> anyhow::Result<Config> {
    let mut config = Config::load_or_default(path)?;
    if let Some(output_dir) = output_dir {
        config.output_dir = output_dir;
    }
    if let Some(seed) = seed {
        config.seed = seed;
    }
    config.validate()?;
    Ok(config)
}

fn open_existing(path: &Path) -> anyhow::Result<SqliteStore> {
    if !path.exists() {
        anyhow::bail!("store {} does not exist", path.display());
    }
    Ok(SqliteStore::open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_config_writes_loadable_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("downtime.toml");
        let cli = Cli::try_parse_from([
            "downtime",
            "--config",
            "unused.toml",
            "init-config",
            "--path",
            path.to_str().unwrap(),
        ])
        .unwrap();
        run(cli).unwrap();

        assert_eq!(Config::load_or_default(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_overrides_apply_over_file() {
        let dir = TempDir::new().unwrap();
        let config = load_config(
            &dir.path().join("missing.toml"),
            Some(dir.path().join("out")),
            Some("other phrase".to_string()),
        )
        .unwrap();
        assert_eq!(config.output_dir, dir.path().join("out"));
        assert_eq!(config.seed, "other phrase");
    }
}
