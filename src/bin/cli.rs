use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use provider_perf::export::exporter_for;
use provider_perf::normalize::RecordNormalizer;
use provider_perf::prelude::*;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "perfcli", version)]
#[command(about = "Provider performance CLI - registration and signing statistics from visit exports", long_about = None)]
struct Cli {
    /// Log pipeline details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the per-provider table and optionally export it
    Compute(ComputeArgs),
    /// Show clinic-wide key metrics and leaders
    Summary(SummaryArgs),
    /// Write the default configuration file
    InitConfig(InitConfigArgs),
}

#[derive(Args)]
struct InputArgs {
    /// Visit export (CSV)
    #[arg(short, long)]
    input: PathBuf,
    /// First visit day, inclusive; defaults to the earliest visit
    #[arg(long)]
    start: Option<String>,
    /// Last visit day, inclusive; defaults to the latest visit
    #[arg(long)]
    end: Option<String>,
    /// Configuration file, instead of the default location
    #[arg(short, long, env = "PROVIDER_PERF_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct ComputeArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Directory to export the tables into
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
    /// Export format
    #[arg(long, value_enum, default_value_t = ExportFormatOpt::Csv)]
    format: ExportFormatOpt,
    /// Prefix for exported file names
    #[arg(long, default_value = "performance")]
    stem: String,
    /// Use the original Chinese column headers
    #[arg(long)]
    chinese_headers: bool,
}

#[derive(Args)]
struct SummaryArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Number of providers per leaderboard
    #[arg(long, default_value_t = 5)]
    top: usize,
}

#[derive(Args)]
struct InitConfigArgs {
    /// Where to write the file; defaults to the user config directory
    #[arg(short, long)]
    path: Option<PathBuf>,
    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ExportFormatOpt {
    Csv,
    Json,
}

impl From<ExportFormatOpt> for ExportFormat {
    fn from(opt: ExportFormatOpt) -> Self {
        match opt {
            ExportFormatOpt::Csv => ExportFormat::Csv,
            ExportFormatOpt::Json => ExportFormat::Json,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Compute(args) => cmd_compute(args),
        Commands::Summary(args) => cmd_summary(args),
        Commands::InitConfig(args) => cmd_init_config(args),
    };

    if let Err(e) = result {
        match e.downcast_ref::<PerfError>() {
            Some(perf) => eprintln!("Error: {}", perf.user_message()),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::load_from(path)?,
        None => EngineConfig::load()?,
    };
    Ok(config)
}

/// Load, normalize and compute the report for the requested window
fn run_pipeline(args: &InputArgs, config: EngineConfig) -> anyhow::Result<PerformanceReport> {
    // window bounds accept the same formats as date cells
    let normalizer = RecordNormalizer::new(&config);
    let start = args.start.as_deref().map(|s| normalizer.parse_day(s)).transpose()?;
    let end = args.end.as_deref().map(|s| normalizer.parse_day(s)).transpose()?;

    let table = VisitReader::from_config(&config).load(&args.input)?;
    let engine = PerformanceEngine::new(config);
    let normalized = engine.normalize(&table)?;

    let window = match (start, end) {
        (Some(start), Some(end)) => DateWindow::new(start, end),
        (start, end) => {
            let Some(range) = normalized.visit_date_range() else {
                bail!("{} has no visits with a readable visit date", args.input.display());
            };
            DateWindow::new(start.unwrap_or(range.start), end.unwrap_or(range.end))
        }
    };
    if window.is_inverted() {
        info!(%window, "window start is after its end; the report will be empty");
    }

    Ok(engine.compute_normalized(&normalized, window))
}

fn cmd_compute(args: ComputeArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.input.config.as_ref())?;
    if args.chinese_headers {
        config.header_style = HeaderStyle::Chinese;
    }
    let style = config.header_style;
    let report = run_pipeline(&args.input, config)?;

    let table = report.table();
    println!("Window: {}", report.window);
    println!("{}", table.headers(style).join(" | "));
    for row in &table.rows {
        let cells: Vec<String> = row.iter().map(|c| c.to_string()).collect();
        println!("{}", cells.join(" | "));
    }
    println!("Providers: {}  Visits in window: {}", table.len(), report.records_in_window);

    if let Some(dir) = args.output_dir {
        let exporter = exporter_for(args.format.into(), style);
        let files = exporter
            .export(&report, &dir, &args.stem)
            .with_context(|| format!("exporting to {}", dir.display()))?;
        for file in files {
            println!("Exported {}", file.display());
        }
    }
    Ok(())
}

fn cmd_summary(args: SummaryArgs) -> anyhow::Result<()> {
    let config = load_config(args.input.config.as_ref())?;
    let style = config.header_style;
    let report = run_pipeline(&args.input, config)?;

    report.summary().print_summary();

    let mut boards = vec![Column::RegistrationRate, Column::SigningRate];
    if report.groups.new_registrations {
        boards.push(Column::NewRegistrationRate);
    }
    if report.groups.new_signings {
        boards.push(Column::NewSigningRate);
        boards.push(Column::NewSignings);
    }
    for metric in boards {
        println!();
        println!("Top {} by {}:", args.top, metric.header(style));
        for (i, (provider, value)) in leaderboard(&report.statistics, &metric, args.top).iter().enumerate() {
            println!("  {}. {} ({})", i + 1, provider, value);
        }
    }
    Ok(())
}

fn cmd_init_config(args: InitConfigArgs) -> anyhow::Result<()> {
    let path = match args.path.or_else(EngineConfig::default_config_path) {
        Some(path) => path,
        None => bail!("Could not determine a configuration directory; pass --path"),
    };
    if path.exists() && !args.force {
        bail!("{} already exists; pass --force to overwrite it", path.display());
    }
    EngineConfig::default().save(&path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
