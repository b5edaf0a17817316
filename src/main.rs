use aerodeck::config;
use aerodeck::context::RunContext;
use aerodeck::controls::{self, ControlDerivatives};
use aerodeck::deck::{Airfoil, DeckWriter};
use aerodeck::executor::{BatchResult, Mode, SolverExecutor};
use aerodeck::geometry::loader::load_panel_data;
use aerodeck::geometry::GeometryData;
use aerodeck::io::CsvWriter;
use aerodeck::polar::{self, AirfoilPolars, PolarGenerator, PolarSettings};
use aerodeck::process::ExternalSolver;
use aerodeck::reference::{self, ReferenceGeometry};
use aerodeck::run_matrix::{build_matrix, control_sweep, expand_range, ControlKind};
use aerodeck::stability::{self, StabilitySummary};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SCHEMA_VERSION: &str = "1.0.0";
const PROGRAM_ID: &str = "aerodeck";

#[derive(Parser, Debug)]
#[command(name = "aerodeck")]
#[command(version)]
#[command(about = "aerodeck - Panel geometry to vortex-lattice decks and stability derivative tables")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Output directory
    #[arg(short, long, global = true)]
    out: Option<String>,

    /// Print per-case and per-section detail
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full pipeline on an exported geometry folder
    Generate {
        /// Folder with mass.csv, LEpts.csv, TEpts.csv (and optional WINGLETpts.csv, ELEVONpts.csv)
        input_dir: String,
        /// Overrides [aircraft] name
        #[arg(long)]
        aircraft_name: Option<String>,
        /// Stop after geometry validation
        #[arg(long)]
        validate_only: bool,
        /// Also generate airfoil polars
        #[arg(long)]
        polars: bool,
        /// Write the JSON result bundle
        #[arg(long)]
        json: bool,
    },
    /// Load and validate a geometry folder
    Validate {
        input_dir: String,
    },
    /// Generate airfoil polars only
    Polar,
    /// Write the default configuration to a file
    InitConfig {
        path: String,
    },
    /// Print version information
    Version,
}

// ============================================================================
// JSON Output Structures
// ============================================================================

#[derive(Serialize)]
struct Manifest {
    schema_version: String,
    solver_version: String,
    program_id: String,
    timestamp_utc: String,
    platform: String,
    config_hash: String,
    config_snapshot: config::Root,
}

#[derive(Serialize)]
struct ResultBundle<'a> {
    manifest: Manifest,
    aircraft: &'a str,
    mode: Mode,
    reference: &'a ReferenceGeometry,
    warnings: &'a [String],
    records: &'a BatchResult,
    control_sweeps: &'a [BatchResult],
    control_derivatives: &'a [ControlDerivatives],
    stability: &'a StabilitySummary,
    polars: Option<&'a AirfoilPolars>,
    wall_time_ms: f64,
}

// ============================================================================
// Helper Functions
// ============================================================================

fn compute_hash(data: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

fn get_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn create_manifest(cfg: &config::Root, cfg_text: &str) -> Manifest {
    Manifest {
        schema_version: SCHEMA_VERSION.to_string(),
        solver_version: VERSION.to_string(),
        program_id: PROGRAM_ID.to_string(),
        timestamp_utc: get_timestamp(),
        platform: std::env::consts::OS.to_string(),
        config_hash: compute_hash(cfg_text),
        config_snapshot: cfg.clone(),
    }
}

/// Config from `--config`, or the defaults (hashed as their TOML rendering).
fn load_config(path: Option<&str>) -> Result<(config::Root, String)> {
    let (cfg, text) = match path {
        Some(p) => config::Root::load(Path::new(p))?,
        None => {
            let cfg = config::Root::default();
            let text = toml::to_string(&cfg)?;
            (cfg, text)
        }
    };
    cfg.validate()?;
    Ok((cfg, text))
}

fn load_and_validate(input_dir: &str, cfg: &config::Root, ctx: &RunContext) -> Result<(GeometryData, Vec<String>)> {
    let geom = load_panel_data(Path::new(input_dir), ctx)?;
    let report = geom
        .validate(&cfg.validation, ctx)
        .context("geometry validation failed")?;
    ctx.ok(format!("geometry valid ({} warnings)", report.warnings.len()));
    Ok((geom, report.warnings))
}

fn print_reference(r: &ReferenceGeometry, ctx: &RunContext) {
    ctx.info(format!(
        "Sref={:.3} ft^2  Bref={:.3} ft  Cref={:.3} ft  AR={:.2}{}",
        r.area,
        r.span,
        r.chord,
        r.aspect_ratio(),
        if r.half_span_model { "  (half-span model)" } else { "" }
    ));
}

fn write_polars(set: &AirfoilPolars, dir: &Path, ctx: &RunContext) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    for p in &set.polars {
        let path = dir.join(polar::polar_csv_name(p));
        let mut w = CsvWriter::create(&path)?;
        w.write_polar(p)?;
        w.flush()?;
        ctx.debug(format!("polar: {}", path.display()));
    }
    ctx.ok(format!("{} polar files in {}", set.polars.len(), dir.display()));
    Ok(())
}

fn generate_polars(cfg: &config::Root, out_dir: &Path, ctx: &RunContext) -> AirfoilPolars {
    let x = &cfg.xfoil;
    let settings = PolarSettings::from_config(x, cfg.analysis.mach);
    let runner = ExternalSolver::new(&x.executable, x.timeout_s, cfg.avl.probe_timeout_s);
    let work_root = out_dir.join("xfoil_outputs");
    let keep = cfg.avl.keep_intermediate;
    let gen = if x.force_mock {
        PolarGenerator::with_mode(runner, Mode::Mock, settings, work_root, keep)
    } else {
        PolarGenerator::new(runner, settings, work_root, keep, ctx)
    };
    let airfoil = Airfoil::resolve(x.airfoil_file.as_deref(), &x.naca);
    gen.generate(&airfoil, &cfg.analysis.reynolds_numbers, ctx)
}

// ============================================================================
// Commands
// ============================================================================

fn run_generate(
    cfg: &config::Root,
    cfg_text: &str,
    input_dir: &str,
    out_dir: &Path,
    validate_only: bool,
    with_polars: bool,
    json_output: bool,
    ctx: &RunContext,
) -> Result<()> {
    let start = Instant::now();
    let name = cfg.aircraft.name.as_str();

    let (geom, warnings) = load_and_validate(input_dir, cfg, ctx)?;
    if validate_only {
        return Ok(());
    }

    let reference = reference::compute(&geom, &cfg.reference);
    print_reference(&reference, ctx);

    let deck = DeckWriter::from_config(cfg).write_files(out_dir, name, &geom, &reference, ctx)?;

    // Stability matrix
    let a = &cfg.analysis;
    let cases = build_matrix(&expand_range(a.alpha_range), &expand_range(a.beta_range), a.mach);
    ctx.info(format!("run matrix: {} cases", cases.len()));

    let runner = ExternalSolver::new(&cfg.avl.executable, cfg.avl.timeout_s, cfg.avl.probe_timeout_s);
    let work_root = out_dir.join("avl_outputs");
    let executor = if cfg.avl.force_mock {
        SolverExecutor::with_mode(runner, Mode::Mock, work_root, cfg.avl.keep_intermediate)
    } else {
        SolverExecutor::new(runner, work_root, cfg.avl.keep_intermediate, ctx)
    };
    let batch = executor.execute(&deck.avl_path, &cases, ctx);

    // Control sweeps, only when the deck carries control surfaces
    let c = &cfg.controls;
    let mut sweeps: Vec<BatchResult> = Vec::new();
    let mut derivatives = Vec::new();
    let mut known = batch.records.clone();
    if deck.hinges.iter().any(|h| h.emits_control()) {
        for (kind, control, range) in [
            (ControlKind::Symmetric, &c.symmetric_name, c.symmetric_range),
            (ControlKind::Differential, &c.differential_name, c.differential_range),
        ] {
            let sweep = control_sweep(kind, &expand_range(range), c.sweep_alpha, c.sweep_beta, a.mach);
            ctx.info(format!("{} sweep: {} cases", control, sweep.len()));
            let result = executor.execute_reusing(&deck.avl_path, &sweep, &known, ctx);
            known.extend(result.records.iter().cloned());
            match controls::estimate(&result.records, kind, control) {
                Ok(d) => derivatives.push(d),
                Err(e) => ctx.warn(format!("no {} derivatives: {}", control, e)),
            }
            sweeps.push(result);
        }
    } else {
        ctx.info("no control surface in deck, skipping deflection sweeps");
    }

    let summary = stability::summarize(&batch.records, &reference, geom.mass.cg.x);

    // CSV outputs
    let table_path = out_dir.join(format!("{}_derivatives.csv", name));
    let mut w = CsvWriter::create(&table_path)?;
    w.write_derivative_header()?;
    // Sweeps share their undeflected case with the matrix
    w.write_derivative_rows(batch.records.iter().chain(sweeps.iter().flat_map(|s| s.records.iter())))?;
    w.flush()?;
    ctx.ok(format!("derivative table: {}", table_path.display()));

    if !derivatives.is_empty() {
        let path = out_dir.join(format!("{}_control_derivatives.csv", name));
        let mut w = CsvWriter::create(&path)?;
        w.write_control_header()?;
        for d in &derivatives {
            w.write_control_rows(d)?;
        }
        w.flush()?;
        ctx.ok(format!("control derivatives: {}", path.display()));
    }

    let polars = if with_polars {
        let set = generate_polars(cfg, out_dir, ctx);
        write_polars(&set, &out_dir.join("polars"), ctx)?;
        Some(set)
    } else {
        None
    };

    match (summary.static_margin, summary.stability) {
        (Some(sm), Some(class)) => ctx.info(format!(
            "static margin {:.1}% MAC ({:?}, Xnp={:.3} ft, Xcg={:.3} ft)",
            sm * 100.0,
            class,
            summary.neutral_point.unwrap_or_default(),
            geom.mass.cg.x
        )),
        _ => ctx.warn("static margin unavailable: not enough converged alpha cases"),
    }

    let wall_time_ms = start.elapsed().as_secs_f64() * 1000.0;
    if json_output {
        let json_path = out_dir.join(format!("{}_results.json", name));
        let bundle = ResultBundle {
            manifest: create_manifest(cfg, cfg_text),
            aircraft: name,
            mode: batch.mode,
            reference: &reference,
            warnings: &warnings,
            records: &batch,
            control_sweeps: &sweeps,
            control_derivatives: &derivatives,
            stability: &summary,
            polars: polars.as_ref(),
            wall_time_ms,
        };
        let json = serde_json::to_string_pretty(&bundle)?;
        fs::write(&json_path, json)?;
        ctx.ok(format!("JSON bundle: {}", json_path.display()));
    }

    let failed = batch.records.len() - batch.converged_count();
    if failed > 0 {
        ctx.warn(format!("{} of {} cases did not converge", failed, batch.records.len()));
    }
    ctx.ok(format!("done in {:.1} s", wall_time_ms / 1000.0));
    Ok(())
}

fn run_validate(cfg: &config::Root, input_dir: &str, ctx: &RunContext) -> Result<()> {
    let (geom, _) = load_and_validate(input_dir, cfg, ctx)?;
    print_reference(&reference::compute(&geom, &cfg.reference), ctx);
    if let Some(panel) = &geom.winglet {
        ctx.info(format!("winglet: {} points", panel.len()));
    }
    if let Some(panel) = &geom.control_panel {
        ctx.info(format!("control panel: {} points", panel.len()));
    }
    Ok(())
}

fn run_polar(cfg: &config::Root, out_dir: &Path, ctx: &RunContext) -> Result<()> {
    let set = generate_polars(cfg, out_dir, ctx);
    if set.polars.is_empty() {
        bail!("no polar could be generated for {}", set.airfoil_name);
    }
    write_polars(&set, out_dir, ctx)
}

fn init_config(path: &str, ctx: &RunContext) -> Result<()> {
    if Path::new(path).exists() {
        bail!("{} already exists", path);
    }
    let text = toml::to_string_pretty(&config::Root::default())?;
    fs::write(path, text).with_context(|| format!("failed to write {}", path))?;
    ctx.ok(format!("wrote default configuration to {}", path));
    Ok(())
}

fn print_version() {
    println!("{} {}", PROGRAM_ID, VERSION);
    println!("result schema {}", SCHEMA_VERSION);
}

fn main() -> Result<()> {
    let args = Args::parse();
    let ctx = RunContext::new(args.verbose, args.quiet);

    match args.command {
        Commands::Version => {
            print_version();
            Ok(())
        }
        Commands::InitConfig { path } => init_config(&path, &ctx),
        Commands::Validate { input_dir } => {
            let (cfg, _) = load_config(args.config.as_deref())?;
            run_validate(&cfg, &input_dir, &ctx)
        }
        Commands::Polar => {
            let (cfg, _) = load_config(args.config.as_deref())?;
            let out_dir = PathBuf::from(args.out.unwrap_or_else(|| "results/polars".to_string()));
            run_polar(&cfg, &out_dir, &ctx)
        }
        Commands::Generate {
            input_dir,
            aircraft_name,
            validate_only,
            polars,
            json,
        } => {
            let (mut cfg, cfg_text) = load_config(args.config.as_deref())?;
            if let Some(n) = aircraft_name {
                cfg.aircraft.name = n;
                cfg.validate()?;
            }
            let out_dir = PathBuf::from(
                args.out
                    .unwrap_or_else(|| format!("results/{}", cfg.aircraft.name)),
            );
            ctx.info(format!("{} v{} - {}", PROGRAM_ID, VERSION, cfg.aircraft.name));
            run_generate(&cfg, &cfg_text, &input_dir, &out_dir, validate_only, polars, json, &ctx)
        }
    }
}
