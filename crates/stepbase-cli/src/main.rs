//! stepbase CLI - baselines, interfaces and revision diffs for STEP assemblies.
//!
//! JSON goes to stdout; logs go to stderr (`RUST_LOG` overrides the
//! default `stepbase=info` filter).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use stepbase::{
    bom_lines, to_csv, AnalysisConfig, Baseline, BaselineStore, Component, Engine, FileStore, GeometrySummary,
    ModelRequest, Totals, ValidationReport,
};
use stepbase_step::StepKernel;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stepbase")]
#[command(about = "Baseline and diff engine for STEP assemblies", long_about = None)]
struct Cli {
    /// Analysis settings (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Baseline store directory
    #[arg(long, global = true, default_value = ".stepbase/baselines")]
    store: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a baseline with interfaces and validation
    Analyze {
        /// STEP file (.step or .stp)
        file: PathBuf,
        /// Save the baseline to the store
        #[arg(long)]
        save: bool,
    },
    /// Print the bill of materials
    Bom {
        /// STEP file
        file: PathBuf,
        /// Semicolon-separated output instead of JSON
        #[arg(long)]
        csv: bool,
    },
    /// Print geometry summaries
    Geometry {
        /// STEP file
        file: PathBuf,
        /// Only the component with this name
        #[arg(short, long)]
        component: Option<String>,
    },
    /// Detect interfaces between parts
    Interfaces {
        /// STEP file
        file: PathBuf,
    },
    /// Run quality checks
    Validate {
        /// STEP file
        file: PathBuf,
    },
    /// Compare two revisions
    Compare {
        /// Before: STEP file, baseline JSON file or stored baseline id
        before: String,
        /// After: STEP file, baseline JSON file or stored baseline id
        after: String,
    },
    /// List stored baseline ids
    List,
}

#[derive(Serialize)]
struct Analysis<'a> {
    baseline: &'a Baseline,
    totals: Totals,
    validation: ValidationReport,
}

#[derive(Serialize)]
struct ComponentGeometry<'a> {
    component: &'a Component,
    path: Option<String>,
    geometry: Option<&'a GeometrySummary>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let engine = load_engine(cli.config.as_deref())?;
    let store = FileStore::new(&cli.store);

    match cli.command {
        Commands::Analyze { file, save } => {
            let baseline = engine.with_interfaces(baseline_of(&engine, &file)?);
            let analysis = Analysis {
                totals: baseline.totals(),
                validation: engine.validate(&baseline),
                baseline: &baseline,
            };
            print_json(&analysis)?;
            if save {
                let id = store.save(&baseline)?;
                eprintln!("saved baseline {id} to {}", store.dir().display());
            }
        }
        Commands::Bom { file, csv } => {
            let lines = bom_lines(&baseline_of(&engine, &file)?);
            if csv {
                print!("{}", to_csv(&lines));
            } else {
                print_json(&lines)?;
            }
        }
        Commands::Geometry { file, component } => {
            let baseline = baseline_of(&engine, &file)?;
            match component {
                Some(name) => {
                    let (component, geometry) = baseline.find_by_name(&name)?;
                    print_json(&ComponentGeometry {
                        component,
                        path: baseline.component_path(&component.component_id),
                        geometry: Some(geometry),
                    })?;
                }
                None => {
                    let all: Vec<ComponentGeometry<'_>> = baseline
                        .components
                        .iter()
                        .map(|c| ComponentGeometry {
                            component: c,
                            path: baseline.component_path(&c.component_id),
                            geometry: baseline.summary(&c.component_id),
                        })
                        .collect();
                    print_json(&all)?;
                }
            }
        }
        Commands::Interfaces { file } => {
            let baseline = baseline_of(&engine, &file)?;
            let (_, graph) = engine.detect_interfaces(&baseline);
            print_json(&graph)?;
        }
        Commands::Validate { file } => {
            let baseline = baseline_of(&engine, &file)?;
            print_json(&engine.validate(&baseline))?;
        }
        Commands::Compare { before, after } => {
            let b1 = resolve(&engine, &store, &before)?;
            let b2 = resolve(&engine, &store, &after)?;
            let report = engine.compare(&b1, &b2)?;
            info!(impact = ?report.impact_level, changes = report.statistics.total_changes, "comparison done");
            print_json(&report)?;
        }
        Commands::List => {
            for id in store.list()? {
                println!("{id}");
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stepbase=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_engine(config: Option<&Path>) -> Result<Engine<StepKernel>> {
    let config = match config {
        Some(path) => AnalysisConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    Ok(Engine::with_config(StepKernel::new(), config)?)
}

fn baseline_of(engine: &Engine<StepKernel>, file: &Path) -> Result<Baseline> {
    engine
        .baseline(ModelRequest::from_path(file))
        .with_context(|| format!("analyzing {}", file.display()))
}

/// A compare operand: baseline JSON, STEP file or stored id, tried in that
/// order. Baselines always carry interfaces before comparison.
fn resolve(engine: &Engine<StepKernel>, store: &FileStore, operand: &str) -> Result<Baseline> {
    let path = Path::new(operand);
    let baseline = if path.is_file() {
        if is_json(path) {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading {operand}"))?;
            Baseline::from_json(&text).with_context(|| format!("decoding baseline {operand}"))?
        } else {
            baseline_of(engine, path)?
        }
    } else {
        store
            .load(operand)
            .with_context(|| format!("'{operand}' is neither a file nor a stored baseline"))?
    };
    Ok(match baseline.interfaces {
        Some(_) => baseline,
        None => engine.with_interfaces(baseline),
    })
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
