#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use greenspace::export::PdfReportGenerator;
use greenspace::pipeline::report_from_file;
use greenspace::{Crs, PipelineConfig, PipelineContext, ReportGenerator, reproject_directory};
use std::path::PathBuf;

#[derive(Debug)]
enum CliError {
    Pipeline(greenspace::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Pipeline(err) => write!(f, "{err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
        }
    }
}

impl From<greenspace::Error> for CliError {
    fn from(value: greenspace::Error) -> Self {
        Self::Pipeline(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Parser)]
#[command(name = "greenspace")]
#[command(about = "Percent green space per neighbourhood from polygon shapefiles")]
#[command(version)]
struct Cli {
    /// Raise the log level (-v info, -vv debug); RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every stage and export the map.
    Run {
        /// YAML or JSON configuration; defaults apply to anything it leaves out.
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Directory holding the input shapefiles; overrides `input_dir`.
        #[arg(long, value_name = "DIR")]
        working_dir: Option<PathBuf>,
        #[arg(long)]
        skip_report: bool,
        #[arg(long, value_name = "FILE")]
        preview_png: Option<PathBuf>,
    },
    /// Reproject every shapefile in a directory.
    Reproject {
        dir: PathBuf,
        #[arg(long, value_name = "CRS")]
        from: String,
        #[arg(long, value_name = "CRS")]
        to: String,
        /// Output file suffix; derived from the target CRS when omitted.
        #[arg(long, value_parser = clap::builder::NonEmptyStringValueParser::new())]
        suffix: Option<String>,
    },
    /// Export the map for an existing joined layer.
    Report {
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        #[arg(long, value_name = "SHP")]
        layer: PathBuf,
        #[arg(long, value_name = "FILE")]
        preview_png: Option<PathBuf>,
    },
    /// Print the default configuration as YAML.
    Config,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig, CliError> {
    match path {
        Some(path) => Ok(PipelineConfig::from_path(path)?),
        None => Ok(PipelineConfig::default()),
    }
}

fn generator(preview_png: Option<PathBuf>) -> PdfReportGenerator {
    match preview_png {
        Some(path) => PdfReportGenerator::new().with_preview_png(path),
        None => PdfReportGenerator::new(),
    }
}

fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Run {
            config,
            working_dir,
            skip_report,
            preview_png,
        } => {
            let mut config = load_config(config.as_ref())?;
            if let Some(dir) = working_dir {
                config.input_dir = dir;
            }
            let generator = generator(preview_png);
            let report: Option<&dyn ReportGenerator> =
                if skip_report { None } else { Some(&generator) };
            let outcome = greenspace::run(&config, report)?;

            if let Some(shapefile) = &outcome.manifest.shapefile {
                println!(
                    "{} ({} features)",
                    shapefile.path.display(),
                    shapefile.features
                );
            }
            if let Some(report) = &outcome.manifest.report {
                println!("{}", report.pdf.display());
            }
            println!("{}", outcome.manifest_path.display());
        }
        Commands::Reproject {
            dir,
            from,
            to,
            suffix,
        } => {
            let from: Crs = from.parse()?;
            let to: Crs = to.parse()?;
            let suffix = suffix.unwrap_or_else(|| to.file_suffix());
            let mut ctx = PipelineContext::new(&dir, from, to);
            for file in reproject_directory(&mut ctx, &suffix)? {
                println!(
                    "{} -> {} ({} features)",
                    file.source.display(),
                    file.output.display(),
                    file.features
                );
            }
        }
        Commands::Report {
            config,
            layer,
            preview_png,
        } => {
            let config = load_config(config.as_ref())?;
            let outcome = report_from_file(&config, &layer, &generator(preview_png))?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Config => {
            print!("{}", PipelineConfig::default().to_yaml()?);
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli.command) {
        tracing::debug!(error = ?err, "command failed");
        eprintln!("{err}");
        std::process::exit(1);
    }
}
