use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ngramlm_core::store::{JOINED_COUNTS_TXT, SIDECAR_FILE};
use ngramlm_core::{
    CountStore, CountStoreBuilder, LanguageModel, LmConfig, SequenceScorer, SmoothingKind,
};
use serde::Serialize;
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "lmtool", about = "Build, inspect and score n-gram count indexes")]
struct Cli {
    /// Log filter, e.g. "info" or "ngramlm_core=debug". RUST_LOG wins when set.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Count a whitespace-tokenized corpus into an index directory
    Count(CountArgs),
    /// Compile an index directory into a binary snapshot
    Compile(CompileArgs),
    /// Print per-order statistics of an index
    Stats(StatsArgs),
    /// Score sentences read from stdin, one per line
    Score(ScoreArgs),
}

#[derive(Args)]
struct CountArgs {
    /// Corpus file, one sentence per line
    corpus: PathBuf,
    #[arg(long)]
    out: PathBuf,
    #[arg(long, default_value_t = 3)]
    order: usize,
    #[arg(long, default_value_t = 1)]
    min_count: u64,
}

#[derive(Args)]
struct CompileArgs {
    index: PathBuf,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    normalize_unicode: bool,
}

#[derive(Args)]
struct StatsArgs {
    index: PathBuf,
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ScoreArgs {
    index: PathBuf,
    /// TOML model configuration
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides the configured smoothing algorithm
    #[arg(long)]
    smoothing: Option<SmoothingKind>,
    #[arg(long)]
    order: Option<usize>,
    /// Leave n-grams ending in an unknown word out of the perplexity
    #[arg(long)]
    skip_oov: bool,
}

#[derive(Serialize)]
struct OrderStats {
    order: usize,
    distinct: u64,
    occurrences: u64,
    n1: u64,
    n2: u64,
    n3_plus: u64,
    discount: f64,
}

#[derive(Serialize)]
struct IndexSummary {
    records: usize,
    vocabulary: u64,
    orders: Vec<OrderStats>,
}

fn init_tracing(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

fn count(args: &CountArgs) -> Result<()> {
    let file = std::fs::File::open(&args.corpus)
        .with_context(|| format!("open {}", args.corpus.display()))?;
    let mut builder = CountStoreBuilder::new(args.order)?.min_count(args.min_count);
    for line in std::io::BufReader::new(file).lines() {
        builder.add_text(&line.with_context(|| format!("read {}", args.corpus.display()))?);
    }
    let (records, stats) = builder.records();

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("create {}", args.out.display()))?;
    let counts_path = args.out.join(JOINED_COUNTS_TXT);
    let mut w = BufWriter::new(
        std::fs::File::create(&counts_path)
            .with_context(|| format!("create {}", counts_path.display()))?,
    );
    for r in &records {
        writeln!(w, "{}", r.to_joined_line())?;
    }
    w.flush()?;
    let sidecar = args.out.join(SIDECAR_FILE);
    std::fs::write(&sidecar, stats.to_sidecar_string())
        .with_context(|| format!("write {}", sidecar.display()))?;
    info!(records = records.len(), out = %args.out.display(), "index written");
    println!("wrote {} records to {}", records.len(), args.out.display());
    Ok(())
}

fn compile(args: &CompileArgs) -> Result<()> {
    let store = CountStore::open(&args.index, args.normalize_unicode)
        .with_context(|| format!("load index {}", args.index.display()))?;
    store
        .save_snapshot(&args.out)
        .with_context(|| format!("write snapshot {}", args.out.display()))?;
    println!(
        "compiled {} records ({} words) into {}",
        store.len(),
        store.vocabulary_size(),
        args.out.display()
    );
    Ok(())
}

fn summarize(index: &Path) -> Result<IndexSummary> {
    let store = CountStore::open(index, false)
        .with_context(|| format!("load index {}", index.display()))?;
    let order = store.max_order().max(1);
    let config = LmConfig {
        order,
        ..LmConfig::default()
    };
    let model = LanguageModel::new(Arc::new(store), config)?;
    let stats = model.store().global_stats();
    let orders = (1..=order)
        .map(|n| {
            let [distinct, n1, n2, n3_plus] = stats.count_classes(n);
            OrderStats {
                order: n,
                distinct,
                occurrences: stats.sum(n),
                n1,
                n2,
                n3_plus,
                discount: model.engine().discounts().y(n),
            }
        })
        .collect();
    Ok(IndexSummary {
        records: model.store().len(),
        vocabulary: model.store().vocabulary_size(),
        orders,
    })
}

fn stats(args: &StatsArgs) -> Result<()> {
    let summary = summarize(&args.index)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    println!(
        "records: {}  vocabulary: {}",
        summary.records, summary.vocabulary
    );
    for o in &summary.orders {
        println!(
            "order {}: distinct={} occurrences={} N1={} N2={} N3+={} D={:.4}",
            o.order, o.distinct, o.occurrences, o.n1, o.n2, o.n3_plus, o.discount
        );
    }
    Ok(())
}

fn score(args: &ScoreArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(p) => LmConfig::load_toml(p).with_context(|| format!("load {}", p.display()))?,
        None => LmConfig::default(),
    };
    if let Some(kind) = args.smoothing {
        config.smoothing = kind;
    }
    if let Some(order) = args.order {
        config.order = order;
    }
    let model = LanguageModel::open(&args.index, config)
        .with_context(|| format!("load model from {}", args.index.display()))?;
    info!(smoothing = %model.engine().kind(), order = model.order(), "model ready");

    let mut scorer = SequenceScorer::new(&model).skip_oov(args.skip_oov);
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for line in std::io::stdin().lock().lines() {
        let line = line.context("read stdin")?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        let log10 = scorer.add_sequence(&model.ngram_sequence(&tokens));
        writeln!(out, "{log10:.6}\t{line}")?;
    }
    writeln!(
        out,
        "# ngrams={} oov={} log10={:.6} perplexity={:.4}",
        scorer.num_ngrams(),
        scorer.num_oov(),
        scorer.log10_sum(),
        scorer.perplexity()
    )?;
    out.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    match &cli.command {
        Command::Count(a) => count(a),
        Command::Compile(a) => compile(a),
        Command::Stats(a) => stats(a),
        Command::Score(a) => score(a),
    }
}
