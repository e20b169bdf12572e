use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use hylaunch_core::installation::{
    archive, integrity, provisioners_from_config, ArchiveFormat, ArtifactCache, Downloader,
};
use hylaunch_core::progress::DEFAULT_PROGRESS_CAPACITY;
use hylaunch_core::{
    check_versions, ConfigLoader, DomainPatcher, HttpVersionSource, LauncherConfig, LauncherPaths,
    Pipeline, ProgressReporter, TransferProgress,
};
use log::LevelFilter;
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Parser, Debug)]
#[clap(
    name = "hylaunch",
    author,
    version = "0.1.0",
    about = "Hylaunch game acquisition and patching pipeline"
)]
struct Cli {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(long, short, help = "Configuration file (defaults to the per-user config if present)")]
    config: Option<PathBuf>,

    #[clap(long, short, default_value = "info")]
    log_level: String,

    #[clap(long, help = "Write logs to this file instead of stderr")]
    log_file: Option<PathBuf>,

    #[clap(long, help = "Do not print progress events")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Bring the installation up to date (default command)
    Run,
    /// Query installed, latest and variant versions
    Versions,
    /// Download and install the Java runtime if missing
    Runtime,
    /// Download and install the butler delivery tool if missing
    Tool,
    /// Patch the authentication domain into the game binaries
    Patch {
        #[clap(value_enum, default_value = "all")]
        target: Target,

        #[clap(long, help = "Domain to patch in, overriding the configuration")]
        domain: Option<String>,
    },
    /// Restore binaries from their pre-patch backups
    Restore {
        #[clap(value_enum, default_value = "all")]
        target: Target,
    },
    /// Check a file against a SHA-256 digest
    Verify { file: PathBuf, sha256: String },
    /// Extract a zip or tar.gz archive
    Extract {
        archive: PathBuf,
        destination: PathBuf,

        #[clap(long, help = "Keep a single top-level directory instead of lifting its contents")]
        no_flatten: bool,
    },
    /// Show which Java executable would be used
    Java,
    /// Manage the download cache
    Cache {
        #[clap(subcommand)]
        action: CacheCommands,
    },
}

#[derive(Subcommand, Debug)]
enum CacheCommands {
    /// Show cache location and usage
    Info,
    /// Remove every cached download
    Clear,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Target {
    Client,
    Server,
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Info);
    let mut logger = env_logger::Builder::new();
    logger.filter_level(log_level_filter);
    if let Some(log_file) = &cli.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .with_context(|| format!("Failed to open log file {}", log_file.display()))?;
        logger.target(env_logger::Target::Pipe(Box::new(file)));
    }
    logger.init();

    let config = ConfigLoader::load_or_default(cli.config.as_deref()).await?;
    let paths = LauncherPaths::from_config(&config)?;
    log::info!("Launcher data directory: {}", paths.app_dir.display());

    let (progress, printer) = progress_printer(cli.quiet);
    let result = run_command(cli.command.unwrap_or(Commands::Run), config, paths, progress).await;

    // All reporters are dropped by now, so the printer drains and exits
    let _ = printer.await;
    result
}

async fn run_command(
    command: Commands,
    mut config: LauncherConfig,
    paths: LauncherPaths,
    progress: ProgressReporter,
) -> Result<()> {
    match command {
        Commands::Run => {
            let pipeline = Pipeline::from_config(&config, paths)?.with_progress(progress);
            let report = pipeline.run().await;
            print_json(&report)?;
            if let Some(error) = report.error {
                anyhow::bail!("Pipeline failed: {}", error);
            }
        }
        Commands::Versions => {
            let downloader = Downloader::from_config(&config.transfer)?;
            let source = HttpVersionSource::new(downloader, &config);
            let state = check_versions(&source).await;
            print_json(&state)?;
        }
        Commands::Runtime => {
            let (runtime, _tool, _java) = provisioners_from_config(&config, &paths)?;
            let install = runtime
                .ensure_runtime(&paths.cache_dir, &paths.jre_dir, &progress)
                .await?;
            print_json(&install)?;
        }
        Commands::Tool => {
            let (_runtime, tool, _java) = provisioners_from_config(&config, &paths)?;
            let install = tool.ensure_tool(&paths.tools_dir, &progress).await?;
            print_json(&install)?;
        }
        Commands::Patch { target, domain } => {
            if let Some(domain) = domain {
                config.auth_domain = domain;
            }
            let patcher = DomainPatcher::from_config(&config);
            patch(&patcher, &paths, target, &progress).await?;
        }
        Commands::Restore { target } => {
            let patcher = DomainPatcher::from_config(&config);
            let mut artifacts = Vec::new();
            if target != Target::Server {
                artifacts.extend(patcher.find_client_path(&paths.game_dir));
            }
            if target != Target::Client {
                artifacts.extend(patcher.find_server_path(&paths.game_dir));
            }
            if artifacts.is_empty() {
                anyhow::bail!("No game binaries found in {}", paths.game_dir.display());
            }
            for artifact in artifacts {
                if patcher.restore(&artifact)? {
                    println!("Restored {}", artifact.display());
                } else {
                    println!("No backup for {}", artifact.display());
                }
            }
        }
        Commands::Verify { file, sha256 } => {
            if integrity::verify(&file, &sha256).await? {
                println!("OK {}", file.display());
            } else {
                anyhow::bail!("Digest mismatch for {}", file.display());
            }
        }
        Commands::Extract {
            archive: source,
            destination,
            no_flatten,
        } => {
            let format = ArchiveFormat::from_path(&source)?;
            log::info!("Extracting {:?} archive {}", format, source.display());
            archive::extract_async(source, destination.clone(), !no_flatten).await?;
            println!("Extracted to {}", destination.display());
        }
        Commands::Java => {
            let (_runtime, _tool, java) = provisioners_from_config(&config, &paths)?;
            print_json(&java.candidates())?;
            match java.locate() {
                Some((source, path)) => println!("Using {:?} java at {}", source, path.display()),
                None => anyhow::bail!("No Java executable found"),
            }
        }
        Commands::Cache { action } => handle_cache_command(action, &paths).await?,
    }

    Ok(())
}

async fn patch(
    patcher: &DomainPatcher,
    paths: &LauncherPaths,
    target: Target,
    progress: &ProgressReporter,
) -> Result<()> {
    let missing = || anyhow::anyhow!("No matching binary found in {}", paths.game_dir.display());
    match target {
        Target::All => {
            let summary = patcher.ensure_patched(&paths.game_dir, progress).await;
            print_json(&summary)?;
            if let Some(error) = summary.error_message() {
                anyhow::bail!("Patching failed: {}", error);
            }
        }
        Target::Client => {
            let client = patcher.find_client_path(&paths.game_dir).ok_or_else(missing)?;
            print_json(&patcher.patch_client(&client, progress).await?)?;
        }
        Target::Server => {
            let server = patcher.find_server_path(&paths.game_dir).ok_or_else(missing)?;
            print_json(&patcher.patch_server(&server, progress).await?)?;
        }
    }
    Ok(())
}

async fn handle_cache_command(action: CacheCommands, paths: &LauncherPaths) -> Result<()> {
    let cache = ArtifactCache::new(paths.cache_dir.clone());

    match action {
        CacheCommands::Info => {
            println!("Download cache directory: {}", cache.cache_dir().display());
            let stats = cache.stats().await?;
            println!("Cached files: {} ({})", stats.file_count, stats.total_size_human());
        }
        CacheCommands::Clear => {
            cache.clear().await?;
            println!("Download cache cleared.");
        }
    }

    Ok(())
}

/// Spawn a task that prints progress events to stderr until every reporter is dropped
fn progress_printer(quiet: bool) -> (ProgressReporter, JoinHandle<()>) {
    if quiet {
        return (ProgressReporter::disabled(), tokio::spawn(async {}));
    }
    let (progress, rx) = ProgressReporter::channel(DEFAULT_PROGRESS_CAPACITY);
    (progress, tokio::spawn(print_progress(rx)))
}

async fn print_progress(mut rx: mpsc::Receiver<TransferProgress>) {
    while let Some(event) = rx.recv().await {
        let percent = event
            .percent
            .map(|p| format!("[{:>3.0}%]", p))
            .unwrap_or_else(|| "[    ]".to_string());
        match (&event.message, event.bytes_transferred) {
            (Some(message), _) => eprintln!("{} {}", percent, message),
            (None, Some(bytes)) => match event.total_bytes {
                Some(total) => eprintln!("{} {} / {} bytes", percent, bytes, total),
                None => eprintln!("{} {} bytes", percent, bytes),
            },
            (None, None) => {}
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
