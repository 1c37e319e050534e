//! The thin CLI surface described in spec.md §6: argument parsing and exit
//! codes only. Every subcommand maps 1:1 onto a programmatic entry point of
//! the `nexuslink` library; no resolution, minimization, or pipeline logic
//! lives here. Errors are carried as `anyhow::Error` up to `main`, the same
//! split `cargo-unleash::cli::run` draws between its own `anyhow`-returning
//! outer boundary and the `NexusResult`-returning library calls it wraps.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::PathBuf;

use anyhow::{bail, Context};
use flexi_logger::Logger;
use log::trace;
use structopt::{
    clap::AppSettings::{ColorAuto, ColoredHelp},
    StructOpt,
};

use nexuslink::{
    Component, Constraint, Dfa, ExecutionMode, MinimizationLevel, NexusError, Pipeline, PipelineConfig,
    Registry, Resolver, Symbol, Tier,
};

#[derive(Debug, StructOpt)]
#[structopt(name = "nexuslink", about = "Versioned symbol resolution, automaton minimization, and pipeline scheduling")]
#[structopt(setting(ColorAuto), setting(ColoredHelp))]
struct Opt {
    /// Specify the log level filter (passed straight to flexi_logger).
    #[structopt(short, long, default_value = "warn")]
    log: String,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Resolve a symbol against a set of component metadata documents.
    Resolve {
        name: String,
        /// Version constraint, e.g. `^1.0.0`. Defaults to no constraint.
        #[structopt(long = "version")]
        version: Option<String>,
        /// Id of the requesting component. Must be present in `--components`.
        #[structopt(long = "from")]
        from: String,
        /// Component metadata documents (spec.md §6 interchange format).
        #[structopt(long = "components", required = true)]
        components: Vec<PathBuf>,
    },
    /// Minimize a DFA document (spec.md §4.6).
    Minimize {
        /// Path to a DFA document (see `Dfa::load`).
        component_path: PathBuf,
        /// 0 = none, 1 = basic, 2 = standard, 3 = aggressive.
        #[structopt(long = "level", default_value = "2")]
        level: u8,
        /// Print the per-run metrics block after minimizing.
        #[structopt(long = "metrics")]
        metrics: bool,
    },
    /// Build and run an ad-hoc pipeline over stdin, writing to stdout.
    Pipeline {
        #[structopt(subcommand)]
        action: PipelineAction,
    },
}

#[derive(Debug, StructOpt)]
enum PipelineAction {
    /// Describe the pipeline that `execute` would build, without running it.
    Create {
        #[structopt(long = "mode", default_value = "auto")]
        mode: String,
        #[structopt(long = "optimization", default_value = "off")]
        optimization: String,
    },
    /// Describe a stage that would be appended (informational only: this
    /// binary is stateless across invocations, spec.md §1 forbids a
    /// persistence format beyond the metadata document, so `create` and
    /// `add-stage` cannot build up cross-process pipeline state; only
    /// `execute` actually constructs and runs one, from its own `--stage`
    /// list, per invocation).
    AddStage { name: String },
    /// Build a pipeline from repeated `--stage` flags and run it over stdin.
    Execute {
        /// Built-in stage name, repeatable; order is execution order.
        /// Recognized names: `upper`, `reverse`.
        #[structopt(long = "stage", required = true)]
        stages: Vec<String>,
        #[structopt(long = "mode", default_value = "auto")]
        mode: String,
        #[structopt(long = "max-iterations", default_value = "32")]
        max_iterations: usize,
        #[structopt(long = "buffer-size", default_value = "1024")]
        buffer_size: usize,
    },
}

fn main() {
    let opt = Opt::from_args();
    match Logger::try_with_str(&opt.log) {
        Ok(logger) => {
            if let Err(e) = logger.start() {
                eprintln!("failed to start logger: {}", e);
            }
        },
        Err(e) => eprintln!("failed to start logger: {}", e),
    }

    if let Err(e) = run(opt.cmd) {
        eprintln!("error: {:#}", e);
        std::process::exit(exit_code_for(&e));
    }
}

/// Maps an outer `anyhow::Error` to the exit code table in spec.md §6.
/// `Usage`-shaped failures (unknown flag values, missing requester) are
/// invalid-arguments (1); an `io::Error` in the chain means the input wasn't
/// found (2); a `NexusError` downcasts to its own taxonomy.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(nexus) = err.chain().find_map(|cause| cause.downcast_ref::<NexusError>()) {
        return match nexus {
            NexusError::InvalidInput { .. } => 3,
            NexusError::Unresolved { .. } | NexusError::VersionConflict { .. } | NexusError::KindMismatch { .. } => 5,
            NexusError::PassFailed { .. } => 4,
            other => other.exit_code(),
        };
    }
    if err.chain().any(|cause| cause.downcast_ref::<std::io::Error>().is_some()) {
        return 2;
    }
    1
}

fn run(cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::Resolve { name, version, from, components } => resolve(name, version, from, components),
        Command::Minimize { component_path, level, metrics } => minimize(component_path, level, metrics),
        Command::Pipeline { action } => pipeline(action),
    }
}

fn resolve(name: String, version: Option<String>, from: String, paths: Vec<PathBuf>) -> anyhow::Result<()> {
    let mut available = Vec::with_capacity(paths.len());
    for path in &paths {
        let file = File::open(path).with_context(|| format!("opening component file {}", path.display()))?;
        let component = Component::load(BufReader::new(file))
            .with_context(|| format!("parsing component file {}", path.display()))?;
        available.push(component);
    }
    let requester = available
        .iter()
        .find(|c| c.id == from)
        .with_context(|| format!("requesting component `{}` not found in --components", from))?
        .clone();

    let registry = Registry::new();
    for component in &available {
        for export in &component.exports {
            registry.add(
                Tier::Exported,
                Symbol::new(export.name.clone(), export.version.clone(), export.kind, component.id.clone()),
            )?;
        }
    }

    let constraint = version.as_deref().map(Constraint::parse).transpose()?;
    let graph = nexuslink::graph_for(&requester, &available);
    let resolver = Resolver::new(&registry, &graph);
    trace!("resolving `{}` (constraint {:?}) from `{}`", name, constraint, requester.id);
    let symbol = resolver.resolve(&name, constraint.as_ref(), &requester.id)?;
    println!("{}@{} (provided by {})", symbol.name, symbol.version, symbol.component_id);
    Ok(())
}

fn minimize(path: PathBuf, level: u8, print_metrics: bool) -> anyhow::Result<()> {
    let original_bytes = std::fs::metadata(&path)
        .with_context(|| format!("reading metadata for {}", path.display()))?
        .len();
    let file = File::open(&path).with_context(|| format!("opening automaton file {}", path.display()))?;
    let dfa = Dfa::load(BufReader::new(file)).with_context(|| format!("parsing automaton file {}", path.display()))?;

    let level = match level {
        0 => MinimizationLevel::None,
        1 => MinimizationLevel::Basic,
        2 => MinimizationLevel::Standard,
        3 => MinimizationLevel::Aggressive,
        other => bail!("--level must be 0..3, got {}", other),
    };

    let (minimized, mut metrics) = dfa.minimize(level, Some((original_bytes, 0)));
    let mut minimized_buf = Vec::new();
    minimized.save(&mut minimized_buf)?;
    metrics.minimized_bytes = minimized_buf.len() as u64;

    println!("{}", minimized.export_dot());
    if print_metrics {
        println!(
            "component={} level={} states {}->{} bytes {}->{} elapsed_ms={} boolean_reduction={}",
            path.display(),
            level as u8,
            metrics.original_states,
            metrics.minimized_states,
            metrics.original_bytes,
            metrics.minimized_bytes,
            metrics.elapsed_ms,
            metrics.boolean_reduction
        );
    }
    Ok(())
}

fn pipeline(action: PipelineAction) -> anyhow::Result<()> {
    match action {
        PipelineAction::Create { mode, optimization } => {
            println!("would create a pipeline: mode={} optimization={}", mode, optimization);
            Ok(())
        },
        PipelineAction::AddStage { name } => {
            println!("would append stage `{}`", name);
            Ok(())
        },
        PipelineAction::Execute { stages, mode, max_iterations, buffer_size } => {
            let mode = match mode.as_str() {
                "single" => ExecutionMode::Single,
                "multi" => ExecutionMode::Multi,
                "auto" => ExecutionMode::Auto,
                other => bail!("unknown --mode `{}`", other),
            };

            let config = PipelineConfig::new(buffer_size, max_iterations, mode);
            let mut built = Pipeline::new(config);
            for name in &stages {
                let stage_fn = match name.as_str() {
                    "upper" => nexuslink::pipeline::stage_uppercase(),
                    "reverse" => nexuslink::pipeline::stage_reverse(),
                    other => bail!("unknown built-in stage `{}`", other),
                };
                built.add_stage(name.clone(), stage_fn, serde_json::Value::Null)?;
            }

            let mut input = Vec::new();
            std::io::stdin().read_to_end(&mut input)?;
            let output = built.execute(&input)?;
            let stdout = std::io::stdout();
            let mut handle = BufWriter::new(stdout.lock());
            handle.write_all(&output)?;

            let stats = built.get_stats();
            eprintln!("iterations={} elapsed_ms={}", stats.last_iterations, stats.last_time_ms);
            Ok(())
        },
    }
}
