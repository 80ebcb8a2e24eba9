use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use inference_client::{HuggingFace, TextClassifier};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use redpulse_common::{
    load_config, Config, LogFormat, PipelineConfig, QueryParams, RawRecord, RecordKind,
    StrategyKind,
};
use redpulse_pipeline::{
    normalize, JsonFileSource, Pipeline, RecordSource, ResultSet, SentimentScorer,
};

#[derive(Parser)]
#[command(name = "redpulse", about = "Reddit sentiment, engagement and trend analytics")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a file of raw records
    Analyze(AnalyzeArgs),
    /// Score ad-hoc text
    Score {
        /// Use the lexicon instead of the transformer model
        #[arg(long)]
        lexicon: bool,
        #[arg(required = true)]
        text: Vec<String>,
    },
}

#[derive(Args)]
struct AnalyzeArgs {
    /// JSON array or JSON-lines file of raw records
    #[arg(long)]
    input: PathBuf,
    #[arg(long, default_value = "all")]
    subreddit: String,
    /// Inclusive lower bound, RFC 3339
    #[arg(long)]
    since: Option<DateTime<Utc>>,
    /// Exclusive upper bound, RFC 3339
    #[arg(long)]
    until: Option<DateTime<Utc>>,
    #[arg(long)]
    min_upvotes: Option<u64>,
    #[arg(long)]
    kind: Vec<RecordKind>,
    #[arg(long)]
    keyword: Vec<String>,
    /// Tracked topic for the insights breakdown
    #[arg(long)]
    topic: Vec<String>,
    /// Path to config TOML file (overrides REDPULSE_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    lexicon: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Summary)]
    format: OutputFormat,
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Summary,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(LogFormat::from_env())?;
    let env = Config::from_env();

    match Cli::parse().command {
        Command::Analyze(args) => analyze(&env, args).await,
        Command::Score { lexicon, text } => score(&env, lexicon, text).await,
    }
}

fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("redpulse=info".parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
    Ok(())
}

/// Pipeline tunables plus model name: the TOML file when given, defaults
/// otherwise.
fn pipeline_config(
    env: &Config,
    path: Option<&PathBuf>,
    lexicon: bool,
) -> Result<(PipelineConfig, String)> {
    let (mut config, model) = match path.or(env.config_path.as_ref()) {
        Some(path) => {
            info!(config = %path.display(), "Loading config");
            let file = load_config(path)?;
            let model = file
                .sentiment
                .model
                .clone()
                .unwrap_or_else(|| env.sentiment_model.clone());
            (file.pipeline_config(), model)
        }
        None => (PipelineConfig::default(), env.sentiment_model.clone()),
    };
    if lexicon {
        config.strategy = StrategyKind::Lexicon;
    }
    Ok((config, model))
}

fn classifier(
    env: &Config,
    config: &PipelineConfig,
    model: &str,
) -> Option<Arc<dyn TextClassifier>> {
    if config.strategy == StrategyKind::Lexicon {
        return None;
    }
    let mut hf = HuggingFace::new(model);
    if let Some(token) = &env.hf_api_token {
        hf = hf.with_api_token(token);
    }
    if let Some(url) = &env.inference_base_url {
        hf = hf.with_base_url(url);
    }
    let classifier: Arc<dyn TextClassifier> = Arc::new(hf);
    Some(classifier)
}

async fn analyze(env: &Config, args: AnalyzeArgs) -> Result<()> {
    let (config, model) = pipeline_config(env, args.config.as_ref(), args.lexicon)?;

    let mut query = QueryParams::new(&args.subreddit).with_range(args.since, args.until);
    if let Some(min) = args.min_upvotes {
        query = query.with_min_upvotes(min);
    }
    for kind in args.kind {
        query = query.with_kind(kind);
    }
    for keyword in args.keyword {
        query = query.with_keyword(keyword);
    }
    for topic in args.topic {
        query = query.with_topic(topic);
    }

    let source = JsonFileSource::new(&args.input);
    let raw = source.fetch(&query, config.max_records).await?;

    let classifier = classifier(env, &config, &model);
    let pipeline = Pipeline::from_config(config, classifier)?;
    let timeout = Duration::from_secs(args.timeout_secs);

    let result = match pipeline.run_with_timeout(&raw, &query, None, timeout).await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "Analysis failed");
            bail!(e.user_message());
        }
    };

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&*result)?),
        OutputFormat::Summary => print_summary(&result),
    }
    Ok(())
}

fn print_summary(result: &ResultSet) {
    println!("{}", result.stats);

    let sentiment = &result.insights.sentiment;
    println!(
        "Overall sentiment: {} (avg {:.3}; {} positive, {} negative, {} neutral)",
        sentiment.overall,
        sentiment.average_score,
        sentiment.positive,
        sentiment.negative,
        sentiment.neutral
    );

    if !result.insights.trending_topics.is_empty() {
        let terms: Vec<String> = result
            .insights
            .trending_topics
            .iter()
            .map(|t| format!("{} ({})", t.term, t.count))
            .collect();
        println!("Trending: {}", terms.join(", "));
    }

    for r in result.anomalies() {
        println!(
            "ANOMALY  {}  z={:+.2}  engagement={:.2}  {}",
            r.id(),
            r.anomaly.z_score,
            r.features.engagement_score,
            r.record.created_at.to_rfc3339()
        );
    }
    for r in result.trend_peaks() {
        println!(
            "PEAK     {}  engagement={:.2}  {}",
            r.id(),
            r.features.engagement_score,
            r.record.created_at.to_rfc3339()
        );
    }
}

async fn score(env: &Config, lexicon: bool, texts: Vec<String>) -> Result<()> {
    let (config, model) = pipeline_config(env, None, lexicon)?;
    config.validate()?;
    let scorer = SentimentScorer::from_config(&config, classifier(env, &config, &model));

    let records: Vec<_> = texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            normalize(&RawRecord {
                id: Some(format!("text-{}", i + 1)),
                body: Some(text),
                ..Default::default()
            })
        })
        .collect();

    for (record, a) in records.iter().zip(scorer.score_batch(&records).await) {
        println!(
            "{:<8} {:+.3}  conf={:.2}  [{}]  {}",
            a.label.to_string(),
            a.score,
            a.confidence,
            a.method,
            record.display_text
        );
    }
    Ok(())
}
