use anyhow::{Context, Result};
use bandcross_core::DataProvider;
use bandcross_data::csv_loader::is_csv_path;
use bandcross_data::CsvDataProvider;
use bandcross_engine::{ErrorPolicy, SignalRun};
use bandcross_strategies::ema_bollinger::EmaBollingerConfig;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "bandcross")]
#[command(about = "EMA crossover + Bollinger Band signal evaluator for historical bars")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", env = "BANDCROSS_LOG_LEVEL")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a strategy over historical bars and write its signals
    Signals {
        /// CSV file, or a directory of `<instrument>.csv` files
        #[arg(short, long)]
        data: PathBuf,

        /// Instrument symbol (required when --data is a directory)
        #[arg(short, long)]
        instrument: Option<String>,

        /// First bar to include (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        start: Option<String>,

        /// Last bar to include (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        end: Option<String>,

        /// Strategy name
        #[arg(short, long, default_value = "ema_bollinger")]
        strategy: String,

        /// TOML file with strategy parameters
        #[arg(short, long, env = "BANDCROSS_CONFIG")]
        config: Option<PathBuf>,

        /// Fast EMA period
        #[arg(long)]
        fast_period: Option<usize>,

        /// Slow EMA period
        #[arg(long)]
        slow_period: Option<usize>,

        /// Bollinger Band window
        #[arg(long)]
        boll_period: Option<usize>,

        /// Bollinger Band width in standard deviations
        #[arg(long)]
        boll_k: Option<Decimal>,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,

        /// What to do with a malformed or out-of-order bar
        #[arg(long, value_enum, default_value_t = OnError::Abort)]
        on_error: OnError,
    },

    /// List available strategies
    Strategies,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OnError {
    Abort,
    Skip,
}

impl From<OnError> for ErrorPolicy {
    fn from(value: OnError) -> Self {
        match value {
            OnError::Abort => ErrorPolicy::Abort,
            OnError::Skip => ErrorPolicy::Skip,
        }
    }
}

/// Command-line overrides applied on top of the config file.
#[derive(Debug, Default)]
struct ParamOverrides {
    fast_period: Option<usize>,
    slow_period: Option<usize>,
    boll_period: Option<usize>,
    boll_k: Option<Decimal>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so signal output can be piped.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    match cli.log_format {
        LogFormat::Text => fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }

    match cli.command {
        Commands::Signals {
            data,
            instrument,
            start,
            end,
            strategy,
            config,
            fast_period,
            slow_period,
            boll_period,
            boll_k,
            output,
            format,
            on_error,
        } => {
            let overrides = ParamOverrides {
                fast_period,
                slow_period,
                boll_period,
                boll_k,
            };
            let params = load_config(config.as_deref(), overrides)?;
            let range = (
                start.as_deref().map(parse_bound).transpose()?,
                end.as_deref().map(parse_bound).transpose()?,
            );
            run_signals(
                data,
                instrument,
                range,
                strategy,
                params,
                output,
                format,
                on_error.into(),
            )
            .await?;
        }
        Commands::Strategies => {
            println!("Available strategies:");
            for (name, description) in bandcross_strategies::STRATEGIES {
                println!("  {:<16} - {}", name, description);
            }
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_signals(
    data: PathBuf,
    instrument: Option<String>,
    (start, end): (Option<DateTime<Utc>>, Option<DateTime<Utc>>),
    strategy_name: String,
    params: EmaBollingerConfig,
    output: Option<PathBuf>,
    format: OutputFormat,
    policy: ErrorPolicy,
) -> Result<()> {
    let (directory, symbol) = resolve_source(&data, instrument.as_deref())?;

    tracing::info!(
        strategy = %strategy_name,
        instrument = %symbol,
        data = %data.display(),
        ?params,
        "Starting signal evaluation"
    );

    let provider = CsvDataProvider::new(directory);
    let mut bars = provider
        .load_bars(
            &symbol,
            start.unwrap_or(DateTime::<Utc>::MIN_UTC),
            end.unwrap_or(DateTime::<Utc>::MAX_UTC),
        )
        .await?;
    tracing::info!(bars = bars.len(), "Loaded historical data");

    if bars.is_empty() {
        anyhow::bail!("No bars loaded from {}", data.display());
    }

    if let Some(name) = instrument {
        for bar in &mut bars {
            bar.instrument = name.clone();
        }
    }

    let mut strategy = bandcross_strategies::build_strategy(&strategy_name, params)?;
    let run = bandcross_engine::run_signals(&bars, strategy.as_mut(), policy)?;

    let mut sink: Box<dyn Write> = match &output {
        Some(path) => Box::new(std::io::BufWriter::new(
            std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(std::io::stdout().lock()),
    };
    match format {
        OutputFormat::Csv => bandcross_data::writer::write_signals_csv(&mut sink, &run.signals)?,
        OutputFormat::Json => bandcross_data::writer::write_signals_jsonl(&mut sink, &run.signals)?,
    }
    drop(sink);

    if let Some(path) = &output {
        tracing::info!(path = %path.display(), signals = run.signals.len(), "Signals written");
    }
    print_summary(&run);

    Ok(())
}

/// Split `--data` into the provider directory and the instrument to load.
///
/// A file path loads that file; a directory needs an explicit instrument.
fn resolve_source(data: &Path, instrument: Option<&str>) -> Result<(PathBuf, String)> {
    if data.is_dir() {
        let symbol = instrument
            .context("--instrument is required when --data is a directory")?
            .to_string();
        return Ok((data.to_path_buf(), symbol));
    }

    if !is_csv_path(data) {
        anyhow::bail!("Expected a .csv file or a directory: {}", data.display());
    }
    let stem = data
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .context("Data file has no name")?;
    let directory = data
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok((directory, stem))
}

/// Read strategy parameters from an optional TOML file, then apply flags.
fn load_config(path: Option<&Path>, overrides: ParamOverrides) -> Result<EmaBollingerConfig> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => EmaBollingerConfig::default(),
    };

    if let Some(v) = overrides.fast_period {
        config.fast_period = v;
    }
    if let Some(v) = overrides.slow_period {
        config.slow_period = v;
    }
    if let Some(v) = overrides.boll_period {
        config.boll_period = v;
    }
    if let Some(v) = overrides.boll_k {
        config.boll_k = v;
    }
    Ok(config)
}

/// Parse a `--start` / `--end` bound. Plain dates mean midnight UTC.
fn parse_bound(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD or RFC 3339", s))?;
    Ok(date.and_time(Default::default()).and_utc())
}

fn print_summary(run: &SignalRun) {
    let summary = &run.summary;
    let fmt_ts = |ts: Option<DateTime<Utc>>| {
        ts.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string())
    };

    let sep = "=".repeat(60);
    eprintln!("\n{sep}");
    eprintln!("  SIGNAL SUMMARY");
    eprintln!("{sep}");
    eprintln!("  Strategy:        {}", run.strategy_id);
    eprintln!("  Instrument:      {}", run.instrument);
    eprintln!("  Period:          {} → {}", fmt_ts(summary.start), fmt_ts(summary.end));
    eprintln!("  Bars:            {}", summary.bars);
    eprintln!("  Warm-up Bars:    {}", summary.warmup_bars);
    eprintln!("  Signals:         {}", summary.signals);
    eprintln!("  Long:            {}", summary.longs);
    eprintln!("  Short:           {}", summary.shorts);
    eprintln!("  Flat:            {}", summary.flats);
    eprintln!("  Rejected Bars:   {}", summary.rejected);
    for rejected in &run.rejected {
        eprintln!("    #{} {}: {}", rejected.index, rejected.timestamp, rejected.reason);
    }
    eprintln!("{sep}\n");
}
