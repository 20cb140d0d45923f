use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mycocosm_downloader::app::{App, RunOptions};
use mycocosm_downloader::config::ConfigLoader;
use mycocosm_downloader::error::MycoError;
use mycocosm_downloader::jgi::{Credentials, JgiHttpClient};
use mycocosm_downloader::listing::FileListing;
use mycocosm_downloader::output::{JsonOutput, OutputMode, ScanEntry, TextOutput};
use mycocosm_downloader::policy::{load_exclude_list, load_overrides};
use mycocosm_downloader::previous::{PreviousDownloads, scan_previous, write_previous};
use mycocosm_downloader::projects::ProjectList;

#[derive(Parser)]
#[command(name = "mycocosm-dl")]
#[command(about = "Download MycoCosm assemblies and annotations into a taxonomy tree")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Select files, build the taxonomy tree and fetch what is missing")]
    Run(RunArgs),
    #[command(about = "List *.gz files under a folder as a previous-downloads table")]
    ScanPrevious(ScanArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Project list exported from the portal (CSV).
    #[arg(long)]
    csv: PathBuf,

    /// Per-portal file listing (TSV).
    #[arg(long)]
    listing: PathBuf,

    /// Annotation overrides, `portal<TAB>filename` per line.
    #[arg(long)]
    overrides: Option<PathBuf>,

    /// Previously downloaded files, as written by `scan-previous`.
    #[arg(long)]
    previous: Option<PathBuf>,

    /// Portals to leave out, one per line.
    #[arg(long)]
    exclude_list: Option<PathBuf>,

    #[arg(long = "outputfolder")]
    output_folder: Option<Utf8PathBuf>,

    #[arg(long)]
    simulate: bool,

    #[arg(long)]
    use_restricted: bool,

    #[arg(long)]
    config: Option<String>,
}

#[derive(Args)]
struct ScanArgs {
    base: PathBuf,

    #[arg(long, default_value = "previous_downloads.tsv")]
    out: PathBuf,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<MycoError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &MycoError) -> u8 {
    match error {
        MycoError::ConfigRead(_)
        | MycoError::ConfigParse(_)
        | MycoError::ConfigurationErrors(_)
        | MycoError::OverrideMissing { .. }
        | MycoError::InputRead(_)
        | MycoError::InputParse { .. }
        | MycoError::MissingCredentials => 2,
        MycoError::Login(_) | MycoError::JgiHttp(_) | MycoError::JgiStatus { .. } => 3,
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
    let mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    match cli.command {
        Commands::Run(args) => run_pipeline(args, mode),
        Commands::ScanPrevious(args) => run_scan(args, mode),
    }
}

fn run_pipeline(args: RunArgs, mode: OutputMode) -> miette::Result<()> {
    let resolved = ConfigLoader::resolve(args.config.as_deref())?;

    let mut policy = resolved.policy();
    if let Some(path) = &args.overrides {
        policy = policy.with_overrides(load_overrides(path)?);
    }
    if let Some(path) = &args.exclude_list {
        policy = policy.with_excluded_portals(load_exclude_list(path)?);
    }
    let previous = match &args.previous {
        Some(path) => PreviousDownloads::load(path)?,
        None => PreviousDownloads::default(),
    };
    if !previous.is_empty() {
        tracing::info!(files = previous.len(), "loaded previous downloads");
    }

    let options = RunOptions {
        output_folder: args.output_folder.unwrap_or(resolved.output_folder.clone()),
        simulate: args.simulate || resolved.simulate,
        use_restricted: args.use_restricted || resolved.use_restricted,
    };

    let projects = ProjectList::load(&args.csv)?;
    let listing = FileListing::load(&args.listing)?;
    tracing::info!(
        portals = projects.portals.len(),
        skipped = projects.skipped.len(),
        skipped_listing_rows = listing.skipped_rows,
        "loaded project list"
    );

    let credentials = if options.simulate {
        None
    } else {
        Some(Credentials::from_env()?)
    };
    let transfer = JgiHttpClient::new(
        &resolved.base_url,
        &resolved.signon_url,
        resolved.transfer,
        credentials,
    )?;
    let app = App::new(transfer, policy, previous);
    let summary = app.run(&projects, &listing, &options)?;

    match mode {
        OutputMode::Json => JsonOutput::print_summary(&summary),
        OutputMode::Text => TextOutput::print_summary(&summary),
    }
    .map_err(|err| MycoError::Filesystem(err.to_string()))?;

    if !summary.config_errors.is_empty() {
        return Err(MycoError::ConfigurationErrors(summary.config_errors.len()).into());
    }
    Ok(())
}

fn run_scan(args: ScanArgs, mode: OutputMode) -> miette::Result<()> {
    let found = scan_previous(&args.base)?;
    write_previous(&args.out, &found)?;
    tracing::info!(files = found.len(), out = %args.out.display(), "wrote previous downloads");

    if mode == OutputMode::Json {
        let entries = found
            .iter()
            .map(|(filename, directory)| ScanEntry {
                filename: filename.clone(),
                directory: directory.display().to_string(),
            })
            .collect::<Vec<_>>();
        JsonOutput::print_scan(&entries).map_err(|err| MycoError::Filesystem(err.to_string()))?;
    } else {
        println!("{} files written to {}", found.len(), args.out.display());
    }
    Ok(())
}
