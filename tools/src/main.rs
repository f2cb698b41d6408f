//! case-triage: run one AML case reference through the triage pipeline.
//!
//! Usage:
//!   case-triage data/case_input.txt
//!   case-triage --case-id CA6373
//!   case-triage                       (auto-detect a case file in data/)
//!   case-triage --create-sample
//!   case-triage --config-check
//!   case-triage import --customers c.csv --transactions t.csv --cases p.csv --db data/records.db

mod import;
mod sample;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use triage_core::{
    analytics::{compare_flagged, summarize_comparisons},
    config::{AnalyticsConfig, SourcesConfig, TriageConfig},
    pipeline::{Orchestrator, RunOutcome},
    reasoning::OpenAiClient,
    records::{CustomerSource, OfflineSource, PriorCaseSource, RecordSources, TransactionSource},
    sink::FileSink,
    store::RecordStore,
};

#[derive(Parser)]
#[command(
    name = "case-triage",
    version,
    about = "Triage an AML alert case: reference in, description + suspicion score + narrative out",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    /// Case reference file, or a bare case id
    case_file: Option<String>,

    /// Resolve the case file for this id in the input directory
    #[arg(long)]
    case_id: Option<String>,

    /// JSON config file; defaults apply when it does not exist
    #[arg(long, default_value = "config/triage.json")]
    config: String,

    /// Where case files are looked up and samples written
    #[arg(long, default_value = "data")]
    input_dir: PathBuf,

    /// Overrides `output_dir` from the config
    #[arg(long)]
    output_dir: Option<String>,

    /// Write a sample case file (and sample records if none exist)
    #[arg(long)]
    create_sample: bool,

    /// Validate configuration and record sources, then exit
    #[arg(long)]
    config_check: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Load CSV exports into a SQLite records database
    Import {
        #[arg(long)]
        customers: Option<PathBuf>,
        #[arg(long)]
        transactions: Option<PathBuf>,
        #[arg(long)]
        cases: Option<PathBuf>,
        #[arg(long, default_value = "data/records.db")]
        db: String,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    if let Err(e) = dotenvy::dotenv() {
        log::debug!("no .env loaded: {e}");
    }

    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

/// Ok(true) only when a case reached Done (or a utility mode succeeded).
fn run(cli: Cli) -> Result<bool> {
    if let Some(Command::Import {
        customers,
        transactions,
        cases,
        db,
    }) = &cli.command
    {
        return run_import(customers.as_deref(), transactions.as_deref(), cases.as_deref(), db);
    }

    let mut config = load_config(&cli.config)?;
    apply_env(&mut config);
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }

    if cli.create_sample {
        let path = sample::write_case_file(&cli.input_dir)?;
        println!("Sample case file created: {}", path.display());
        if sample::seed_records(&config.sources.customer_db)? {
            println!("Sample records written: {}", config.sources.customer_db);
        }
        return Ok(true);
    }

    if cli.config_check {
        return Ok(config_check(&config));
    }

    let problems = config.validate();
    if !problems.is_empty() {
        for p in &problems {
            eprintln!("config: {p}");
        }
        bail!("configuration invalid ({} problems); see --config-check", problems.len());
    }

    let case_path = resolve_case_file(&cli)?;
    println!("Case file: {}", case_path.display());
    let text = std::fs::read_to_string(&case_path)
        .with_context(|| format!("cannot read {}", case_path.display()))?;

    let client = OpenAiClient::new(&config.llm)?;
    let sources = open_sources(&config.sources);
    let mut sink = FileSink::new(&config.output_dir);
    let orchestrator = Orchestrator::new(sources, Box::new(client), config);

    let (outcome, location) = orchestrator.process(&text, &mut sink)?;
    print_summary(&outcome, location.as_deref(), &orchestrator.config().analytics);
    Ok(outcome.is_completed())
}

fn load_config(path: &str) -> Result<TriageConfig> {
    if Path::new(path).exists() {
        log::info!("loading config from {path}");
        TriageConfig::load(path)
    } else {
        log::info!("{path} not found; using default config");
        Ok(TriageConfig::default())
    }
}

/// Credentials and endpoint overrides come from the environment only.
fn apply_env(config: &mut TriageConfig) {
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        config.llm.api_key = Some(key);
    }
    if let Ok(model) = std::env::var("LLM_MODEL") {
        config.llm.model = model;
    }
    if let Ok(url) = std::env::var("OPENAI_API_URL") {
        config.llm.api_url = url;
    }
}

fn open_store(path: &str, source_name: &'static str) -> Result<RecordStore, OfflineSource> {
    RecordStore::open_read_only(path, source_name).map_err(|e| {
        log::warn!("{e}");
        OfflineSource::new(source_name, e.to_string())
    })
}

/// An unopenable file degrades its relation to an offline source.
fn open_sources(cfg: &SourcesConfig) -> RecordSources {
    let customers: Box<dyn CustomerSource> = match open_store(&cfg.customer_db, "customer") {
        Ok(s) => Box::new(s),
        Err(offline) => Box::new(offline),
    };
    let transactions: Box<dyn TransactionSource> =
        match open_store(&cfg.transaction_db, "transaction") {
            Ok(s) => Box::new(s),
            Err(offline) => Box::new(offline),
        };
    let prior_cases: Box<dyn PriorCaseSource> =
        match open_store(&cfg.case_history_db, "case history") {
            Ok(s) => Box::new(s),
            Err(offline) => Box::new(offline),
        };
    RecordSources::new(customers, transactions, prior_cases)
}

fn find_by_id(input_dir: &Path, case_id: &str) -> Result<PathBuf> {
    let candidates = [
        format!("case_input_{case_id}.txt"),
        format!("case_{case_id}.txt"),
        format!("{case_id}.txt"),
        format!("input_{case_id}.txt"),
    ];
    candidates
        .iter()
        .map(|name| input_dir.join(name))
        .find(|p| p.is_file())
        .with_context(|| {
            format!(
                "no case file for {case_id} in {} (tried {})",
                input_dir.display(),
                candidates.join(", ")
            )
        })
}

/// First `*.txt` whose name mentions "case" or "input", in name order.
fn auto_detect(input_dir: &Path) -> Result<PathBuf> {
    let entries = std::fs::read_dir(input_dir)
        .with_context(|| format!("input directory not found: {}", input_dir.display()))?;
    let mut found: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            let name = p
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            name.ends_with(".txt") && (name.contains("case") || name.contains("input"))
        })
        .collect();
    found.sort();
    if found.len() > 1 {
        log::info!("{} case files found; using the first", found.len());
    }
    found.into_iter().next().with_context(|| {
        format!(
            "no case files in {}; add one (e.g. case_input.txt) or run --create-sample",
            input_dir.display()
        )
    })
}

fn resolve_case_file(cli: &Cli) -> Result<PathBuf> {
    if let Some(id) = &cli.case_id {
        return find_by_id(&cli.input_dir, id);
    }
    match &cli.case_file {
        Some(arg) if arg.ends_with(".txt") || Path::new(arg).exists() => {
            let path = PathBuf::from(arg);
            if !path.is_file() {
                bail!("file not found: {arg}");
            }
            Ok(path)
        }
        Some(id) => find_by_id(&cli.input_dir, id),
        None => auto_detect(&cli.input_dir),
    }
}

fn config_check(config: &TriageConfig) -> bool {
    println!("case-triage configuration");
    println!("  model:            {}", config.llm.model);
    println!("  api url:          {}", config.llm.api_url);
    println!(
        "  api key:          {}",
        if config.llm.api_key.is_some() { "set" } else { "missing" }
    );
    println!("  max attempts:     {}", config.retry.max_attempts);
    println!("  transaction cap:  {}", config.limits.transaction_cap);
    println!("  prompt limit:     {} chars", config.limits.max_prompt_chars);
    println!("  output dir:       {}", config.output_dir);

    for (label, path) in [
        ("customer", &config.sources.customer_db),
        ("transaction", &config.sources.transaction_db),
        ("case history", &config.sources.case_history_db),
    ] {
        match RecordStore::open_read_only(path, "check").map(|s| s.counts()) {
            Ok(Ok((c, t, p))) => println!(
                "  {label:<13} {path}: ok ({c} customers, {t} transactions, {p} prior cases)"
            ),
            Ok(Err(e)) => println!("  {label:<13} {path}: unreadable ({e})"),
            Err(e) => println!("  {label:<13} {path}: unavailable ({e})"),
        }
    }

    let problems = config.validate();
    if problems.is_empty() {
        println!("Configuration OK");
        true
    } else {
        for p in &problems {
            println!("  problem: {p}");
        }
        false
    }
}

fn run_import(
    customers: Option<&Path>,
    transactions: Option<&Path>,
    cases: Option<&Path>,
    db: &str,
) -> Result<bool> {
    if customers.is_none() && transactions.is_none() && cases.is_none() {
        bail!("nothing to import; pass --customers, --transactions and/or --cases");
    }
    let store = RecordStore::open(db).with_context(|| format!("cannot open {db}"))?;
    store.migrate()?;

    if let Some(path) = customers {
        println!("customers:     {} rows", import::customers(path, &store)?);
    }
    if let Some(path) = transactions {
        println!("transactions:  {} rows", import::transactions(path, &store)?);
    }
    if let Some(path) = cases {
        println!("prior cases:   {} rows", import::prior_cases(path, &store)?);
    }
    let (c, t, p) = store.counts()?;
    println!("{db} now holds {c} customers, {t} transactions, {p} prior cases");
    Ok(true)
}

fn print_summary(outcome: &RunOutcome, location: Option<&str>, analytics: &AnalyticsConfig) {
    let trail: Vec<String> = outcome.trail().iter().map(|s| s.to_string()).collect();
    println!();
    match outcome {
        RunOutcome::Completed(c) => {
            println!("{}", c.report.render());
            println!("Case:      {}", c.case_id);
            println!("Run:       {}", c.run_id);
            println!(
                "Score:     {} ({})",
                c.report.suspicion_score,
                c.report.risk_band()
            );
            println!("Attempts:  {}", c.attempts);
            if !c.context.reference.transaction_ids.is_empty() {
                match summarize_comparisons(&compare_flagged(&c.context, analytics)) {
                    Some(s) => println!(
                        "Flagged:   {} compared, {} high risk, {} outliers, max |z| {:.2}",
                        s.compared, s.high_risk, s.outliers, s.max_abs_z
                    ),
                    None => println!("Flagged:   not enough account history to compare"),
                }
            }
            if let Some(loc) = location {
                println!("Report:    {loc}");
            }
        }
        RunOutcome::Failed(f) => {
            println!("Case:      {}", f.case_id.as_deref().unwrap_or("(unparsed)"));
            println!("Run:       {}", f.run_id);
            println!("FAILED:    {}", f.summary());
        }
    }
    println!("Stages:    {}", trail.join(" -> "));

    let warnings = outcome.warnings();
    if !warnings.is_empty() {
        println!("Warnings ({}):", warnings.len());
        for w in warnings {
            println!("  - {w}");
        }
    }
}
