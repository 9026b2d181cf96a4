//! procsift: process-monitor capture triage
//!
//! Streams a capture CSV through the analysis engine and writes the text
//! report and timeline once the pass completes.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use procsift::config::AppConfig;
use procsift::engine::Engine;
use procsift::hashing::HashWhitelist;
use procsift::output::{write_outputs, OutputPaths};
use procsift::report::ReportHeader;
use procsift::reputation::{ReputationLookup, VirusTotalClient};
use procsift::scanner::{Scanner, ScannerLoad};
use procsift::utils::{expand_placeholders, now_timestamp_string, EnvSnapshot, Generalizer};
use procsift::whitelist::Whitelists;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser)]
#[command(name = "procsift")]
#[command(about = "Sandbox report and timeline from process-monitor captures", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Override logging level (e.g., error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a capture CSV export
    Analyze(AnalyzeArgs),
    /// Compile whitelist and YARA rules and list any that fail
    CheckRules {
        /// YARA rules folder (defaults to scanner.yara_rules_path)
        #[arg(long, value_name = "DIR")]
        yara: Option<PathBuf>,
    },
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Capture CSV to analyze
    #[arg(long, value_name = "FILE")]
    csv: PathBuf,
    /// Output folder (defaults to the CSV's folder)
    #[arg(long, value_name = "DIR")]
    output: Option<PathBuf>,
    /// Scan created files with the YARA rules in this folder
    #[arg(long, value_name = "DIR")]
    yara: Option<PathBuf>,
    /// Extra hash whitelist file
    #[arg(long, value_name = "FILE")]
    hash: Option<PathBuf>,
    /// Rewrite user paths to %Placeholder% form
    #[arg(long)]
    generalize: bool,
    /// Look up created-file hashes on VirusTotal
    #[arg(long)]
    virustotal: bool,
    /// Command line of the analyzed sample, shown in the report header
    #[arg(long, value_name = "CMDLINE")]
    cmd: Option<String>,
    /// Skip writing the timeline CSV
    #[arg(long)]
    no_timeline: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = match AppConfig::new() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("Failed to load configuration: {}", err);
            eprintln!("Hint: check procsift.toml and PROCSIFT__* environment overrides.");
            return Err(anyhow::anyhow!("Failed to load configuration: {}", err));
        }
    };
    if let Some(level) = cli.log_level {
        if !level.trim().is_empty() {
            cfg.logging.level = level;
        }
    }

    // Keep the guard alive so buffered file logs are flushed on exit
    let _guard = init_logging(&cfg);

    match cli.command {
        Commands::Analyze(args) => run_analyze(&cfg, args),
        Commands::CheckRules { yara } => run_check_rules(&cfg, yara),
    }
}

fn run_analyze(cfg: &AppConfig, args: AnalyzeArgs) -> Result<()> {
    info!(target: "procsift", csv = %args.csv.display(), "Starting analysis");

    let env = EnvSnapshot::from_process();
    let whitelists = Whitelists::compile(&cfg.whitelist.rules(), &env);

    let mut hash_whitelist = HashWhitelist::builtin();
    let hash_file = args
        .hash
        .or_else(|| non_empty_path(&cfg.whitelist.hash_file));
    if let Some(path) = hash_file {
        hash_whitelist
            .load_file(&path)
            .with_context(|| format!("Failed to read hash whitelist {:?}", path))?;
    }

    let generalizer = if args.generalize || cfg.output.generalize_paths {
        Generalizer::from_env(&env)
    } else {
        Generalizer::disabled()
    };

    let mut engine = Engine::new(whitelists)
        .with_hash_whitelist(hash_whitelist)
        .with_generalizer(generalizer);

    let yara_dir = args.yara.or_else(|| {
        cfg.scanner
            .yara_enabled
            .then(|| cfg.scanner.yara_rules_path.clone())
    });
    if let Some(dir) = yara_dir {
        if let Some(scanner) = Scanner::compile_folder(&dir)?.into_scanner() {
            engine = engine.with_scanner(scanner);
        }
    }

    if args.virustotal || cfg.reputation.enabled {
        match cfg.reputation.resolve_api_key() {
            Some(key) => {
                let client = VirusTotalClient::new(
                    &cfg.reputation.endpoint,
                    &key,
                    Duration::from_secs(cfg.reputation.timeout_secs),
                )?;
                engine = engine.with_reputation(ReputationLookup::new(
                    Box::new(client),
                    Duration::from_secs(cfg.reputation.cooldown_secs),
                    cfg.reputation.max_retries,
                ));
            }
            None => warn!(
                target: "reputation",
                key_file = %cfg.reputation.api_key_file.display(),
                "No API key configured; reputation lookups disabled"
            ),
        }
    }

    let file = File::open(&args.csv)
        .with_context(|| format!("Failed to open capture CSV {:?}", args.csv))?;
    let output = engine.run(BufReader::new(file))?;

    let mut header = ReportHeader::new(env!("CARGO_PKG_VERSION"));
    header.command_line = args.cmd;
    header.analysis = Some(output.analysis);
    header.generated_at = Some(now_timestamp_string());

    let out_dir = args
        .output
        .or_else(|| non_empty_path(&cfg.output.directory));
    let paths = OutputPaths::for_input(&args.csv, out_dir.as_deref());
    write_outputs(
        &paths,
        &output,
        &header,
        cfg.output.enable_timeline && !args.no_timeline,
    )?;

    if let Some(lookup) = engine.reputation() {
        info!(
            target: "reputation",
            calls = lookup.calls(),
            cached = lookup.cached(),
            "Reputation lookups finished"
        );
    }
    println!("[*] Report saved to: {}", paths.report.display());
    Ok(())
}

fn run_check_rules(cfg: &AppConfig, yara: Option<PathBuf>) -> Result<()> {
    let env = EnvSnapshot::from_process();
    let rules = cfg.whitelist.rules();
    let whitelists = Whitelists::compile(&rules, &env);
    let disabled: Vec<_> = whitelists.disabled().collect();
    let mut failed = !disabled.is_empty();

    println!("Whitelist rules: {} total, {} disabled", rules.len(), disabled.len());
    for rule in &disabled {
        println!("  [{}] {}", rule.scope.as_str(), rule.pattern);
        println!("      expands to: {}", expand_placeholders(&rule.pattern, &env));
        println!("      {}", rule.error);
    }

    let yara_dir = yara.unwrap_or_else(|| cfg.scanner.yara_rules_path.clone());
    if yara_dir.is_dir() {
        match Scanner::compile_folder(&yara_dir)? {
            ScannerLoad::Ready(scanner) => {
                println!("YARA rules: {} files compiled", scanner.rule_files())
            }
            ScannerLoad::Empty => println!("YARA rules: no rule files in {:?}", yara_dir),
            ScannerLoad::Failed(failures) => {
                failed = true;
                println!("YARA rules: {} files failed, scanning would be disabled", failures.len());
                for failure in &failures {
                    println!("  {}", failure.path.display());
                    println!("      {}", failure.error);
                }
            }
        }
    } else {
        println!("YARA rules: folder {:?} not found, skipped", yara_dir);
    }

    if failed {
        bail!("Rule validation found problems");
    }
    Ok(())
}

fn non_empty_path(value: &str) -> Option<PathBuf> {
    let value = value.trim();
    (!value.is_empty()).then(|| PathBuf::from(value))
}

/// Console logging on stderr, plus a daily rolling file when enabled.
/// The returned guard must live until exit.
fn init_logging(cfg: &AppConfig) -> Option<WorkerGuard> {
    let console_layer = fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::new(&cfg.logging.level));

    let (file_layer, guard) = if cfg.logging.file_output {
        if let Err(err) = std::fs::create_dir_all(&cfg.logging.directory)
            .with_context(|| format!("Failed to create log directory {:?}", cfg.logging.directory))
        {
            eprintln!("{}", err);
        }
        let app_file = rolling::daily(&cfg.logging.directory, &cfg.logging.filename);
        let (app_writer, guard) = tracing_appender::non_blocking(app_file);
        let layer = fmt::layer()
            .with_writer(app_writer)
            .compact()
            .with_ansi(false)
            .with_target(true)
            .with_filter(EnvFilter::new(&cfg.logging.level));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    guard
}
