use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use bids_ingest::app::{App, ProgressSink, UploadPlan};
use bids_ingest::config::ConfigLoader;
use bids_ingest::domain::BidsStudy;
use bids_ingest::error::BidsError;
use bids_ingest::output::{JsonOutput, OutputMode, StderrProgress};

#[derive(Parser)]
#[command(name = "bids-ingest")]
#[command(about = "Scan a BIDS study into datasets ready for warehouse upload")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Walk a BIDS study and list the datasets found")]
    Scan(ScanArgs),
    #[command(about = "Build upload records for every dataset in a BIDS study")]
    Plan(PlanArgs),
}

#[derive(Args)]
struct ScanArgs {
    root: Utf8PathBuf,
}

#[derive(Args)]
struct PlanArgs {
    root: Utf8PathBuf,

    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    project: Option<String>,

    #[arg(long = "tag")]
    tags: Vec<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<BidsError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &BidsError) -> u8 {
    match error {
        BidsError::InvalidRoot(_) | BidsError::MissingProject => 2,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };
    let app = App::new();

    match cli.command {
        Commands::Scan(args) => {
            let study = app.scan(&args.root, sink_for(output_mode))?;
            match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_study(&study).into_diagnostic(),
                OutputMode::Interactive => {
                    print_study_summary(&study);
                    Ok(())
                }
            }
        }
        Commands::Plan(args) => {
            let config = ConfigLoader::resolve(args.config.as_deref())?
                .with_overrides(args.project, args.tags);
            let plan = app.plan(&args.root, &config, sink_for(output_mode))?;
            match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_plan(&plan).into_diagnostic(),
                OutputMode::Interactive => {
                    print_plan_summary(&plan);
                    Ok(())
                }
            }
        }
    }
}

fn sink_for(mode: OutputMode) -> &'static dyn ProgressSink {
    match mode {
        OutputMode::Interactive => &StderrProgress,
        OutputMode::NonInteractive => &JsonOutput,
    }
}

fn print_study_summary(study: &BidsStudy) {
    let cyan = "\x1b[36m";
    let green = "\x1b[32m";
    let reset = "\x1b[0m";

    println!("{cyan}BIDS scan summary{reset}");
    println!("{green}participants: {}{reset}", study.participants.len());
    println!("{green}datasets: {}{reset}", study.datasets.len());
    for (datatype, count) in study.summary() {
        println!("  {datatype:<20} {count}");
    }
}

fn print_plan_summary(plan: &UploadPlan) {
    let cyan = "\x1b[36m";
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let reset = "\x1b[0m";

    println!("{cyan}upload plan for project {}{reset}", plan.project);
    for record in &plan.records {
        println!(
            "{green}+ {} [{}] {}{reset}",
            record.datatype,
            record.datatype_tags.join(","),
            record.desc
        );
    }
    for skipped in &plan.skipped {
        println!(
            "{yellow}- {} {} ({}){reset}",
            skipped.datatype, skipped.desc, skipped.reason
        );
    }
}
