mod observations;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use clinrisk_core::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "clinrisk")]
#[command(about = "Clinical scoring calculators and longitudinal risk rules", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override config file location
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered calculators and their inputs
    List,

    /// Run one calculator and print its result as JSON
    Run {
        /// Calculator id (see `list`)
        id: String,

        /// Input as key=value; repeatable, overrides --file
        #[arg(long = "input", short = 'i', value_name = "KEY=VALUE")]
        inputs: Vec<String>,

        /// JSON object of inputs
        #[arg(long)]
        file: Option<PathBuf>,

        /// Print the uniform envelope instead of the raw result
        #[arg(long)]
        envelope: bool,
    },

    /// Evaluate domain risk from an observations CSV
    Risk {
        /// CSV with columns metric,value,observed_at
        #[arg(long)]
        observations: PathBuf,

        /// Reference time (RFC 3339); defaults to now
        #[arg(long)]
        now: Option<DateTime<Utc>>,

        /// Age in years
        #[arg(long)]
        age: Option<f64>,

        /// Sex (female or male)
        #[arg(long)]
        sex: Option<Sex>,
    },

    /// Print the effective configuration
    Config {
        /// Write the effective configuration to the config path
        #[arg(long)]
        write: bool,
    },
}

fn main() -> Result<()> {
    clinrisk_core::logging::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => cmd_list(),
        Commands::Run {
            id,
            inputs,
            file,
            envelope,
        } => cmd_run(&id, &inputs, file.as_deref(), envelope),
        Commands::Risk {
            observations,
            now,
            age,
            sex,
        } => {
            let config = load_config(cli.config.as_deref())?;
            cmd_risk(&observations, now, Demographics { age, sex }, &config)
        }
        Commands::Config { write } => cmd_config(cli.config.as_deref(), write),
    }
}

/// Config from `--config` when given, otherwise the default path. A file that
/// does not exist yet yields the defaults.
fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) if path.exists() => Config::load_from(path)?,
        Some(path) => {
            tracing::debug!("No config file at {:?}, using defaults", path);
            Config::default()
        }
        None => Config::load()?,
    };
    config.validate()?;
    Ok(config)
}

fn cmd_list() -> Result<()> {
    let registry = builtin_registry()?;
    for definition in registry.definitions() {
        println!("{:<22} {}", definition.id, definition.label);
        let inputs: Vec<String> = definition
            .inputs
            .iter()
            .map(|spec| {
                let marker = if spec.required { "*" } else { "" };
                match spec.unit {
                    Some(unit) => format!("{}{} ({})", spec.key, marker, unit),
                    None => format!("{}{}", spec.key, marker),
                }
            })
            .collect();
        if !inputs.is_empty() {
            println!("    {}", inputs.join(", "));
        }
    }
    Ok(())
}

/// Merge `--file` and `--input` values; command-line pairs win.
fn collect_inputs(pairs: &[String], file: Option<&Path>) -> Result<Inputs> {
    let mut inputs = match file {
        Some(path) => {
            let contents = std::fs::read_to_string(path)?;
            serde_json::from_str::<Inputs>(&contents)?
        }
        None => Inputs::new(),
    };

    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| Error::Other(format!("Expected KEY=VALUE, got '{}'", pair)))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::Other(format!("Empty key in '{}'", pair)));
        }
        inputs.insert(key, InputValue::parse(value));
    }
    Ok(inputs)
}

fn cmd_run(id: &str, pairs: &[String], file: Option<&Path>, envelope: bool) -> Result<()> {
    let registry = builtin_registry()?;
    let inputs = collect_inputs(pairs, file)?;
    tracing::debug!("Running '{}' with {} inputs", id, inputs.len());

    let json = if envelope {
        serde_json::to_string_pretty(&registry.envelope(id, &inputs)?)?
    } else {
        serde_json::to_string_pretty(&registry.run(id, &inputs)?)?
    };
    println!("{}", json);
    Ok(())
}

fn cmd_risk(
    path: &Path,
    now: Option<DateTime<Utc>>,
    demographics: Demographics,
    config: &Config,
) -> Result<()> {
    let observations = observations::load_observations(path)?;
    let now = now.unwrap_or_else(Utc::now);
    let results = evaluate_domains(&observations, now, demographics, config);
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

fn cmd_config(path: Option<&Path>, write: bool) -> Result<()> {
    let config = load_config(path)?;
    print!("{}", config.to_toml_string()?);

    if write {
        let target = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Config::default_config_path);
        config.save_to(&target)?;
        eprintln!("Wrote {}", target.display());
    }
    Ok(())
}
