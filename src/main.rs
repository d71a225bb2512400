use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use maven_launcher::{commands, LauncherConfig, ResolutionDriver, ResolutionOutcome};
use maven_launcher::repo::RepositoryDescriptor;
use maven_launcher::vault::EncodedVault;

/// Resolves a Maven artifact with the dependencies declared in its manifest, and runs it
#[derive(Parser, Debug)]
#[command(name = "launcher")]
#[command(version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// groupId:artifactId:version[:packaging[:classifier[:mainclass]]] or a local jar
    artifact: Option<String>,

    /// arguments passed to the application
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    app_args: Vec<String>,

    /// JSON configuration file (default: $HOME/.m2-launcher/launcher.json if it exists)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// local cache directory
    #[arg(long)]
    cache: Option<PathBuf>,

    /// repository as id=url; repeatable, replaces the configured repositories
    #[arg(long = "repository")]
    repositories: Vec<String>,

    #[arg(long)]
    offline: bool,

    #[arg(long)]
    ignore_cache: bool,

    /// check all cached artifacts for updates
    #[arg(long)]
    update: bool,

    /// do not verify checksums
    #[arg(long)]
    no_verify: bool,

    #[arg(long)]
    no_fail_on_error: bool,

    /// resolve only and print the classpath
    #[arg(long)]
    no_execute: bool,

    #[arg(long)]
    skip_download: bool,

    /// run the artifact without its declared dependencies
    #[arg(long)]
    delegate: bool,

    #[arg(long, global = true)]
    debug: bool,

    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a value, e.g. a repository password
    Encrypt {
        /// vault key, e.g. repository.<id>.password
        #[arg(long)]
        key: String,

        #[arg(long)]
        value: String,
    },

    /// Show the decrypted value of a vault key
    Decrypt {
        #[arg(long)]
        key: String,
    },

    /// Print a repository entry for the configuration file, password encrypted
    Repository {
        #[arg(long)]
        id: String,

        #[arg(long)]
        url: String,

        #[arg(long)]
        username: Option<String>,

        #[arg(long, requires = "username")]
        password: Option<String>,
    },

    /// Print the effective configuration
    Config,
}

/// Configuration file plus command line overrides, before clamping
fn load_config(cli: &Cli) -> anyhow::Result<LauncherConfig> {
    let path = cli.config.clone()
        .or_else(|| Some(LauncherConfig::default_path()).filter(|p| p.is_file()));
    let mut config = match &path {
        Some(path) => LauncherConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => LauncherConfig::default(),
    };

    if let Some(cache) = &cli.cache {
        config.cache = cache.clone();
    }
    if !cli.repositories.is_empty() {
        config.repositories = cli.repositories.iter()
            .map(|r| RepositoryDescriptor::parse(r))
            .collect::<Result<_, _>>()?;
    }
    config.offline |= cli.offline;
    config.ignore_cache |= cli.ignore_cache;
    config.update |= cli.update;
    config.verify &= !cli.no_verify;
    config.fail_on_error &= !cli.no_fail_on_error;
    config.execute &= !cli.no_execute;
    config.skip_download |= cli.skip_download;
    config.delegate |= cli.delegate;
    config.debug |= cli.debug;
    config.quiet |= cli.quiet;
    Ok(config)
}

fn init_logging(config: &LauncherConfig) {
    let default_level = if config.debug {
        "debug"
    }
    else if config.quiet {
        "error"
    }
    else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    // NB: stdout is reserved for the classpath and command output
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run_command(command: Commands, config: &LauncherConfig) -> anyhow::Result<ExitCode> {
    let vault = EncodedVault::for_repositories(&config.repositories);
    let output = match command {
        Commands::Encrypt { key, value } => commands::encrypt(&vault, &key, &value),
        Commands::Decrypt { key } => match commands::decrypt(&vault, &key) {
            Some(value) => value,
            None => bail!("no value for {}", key),
        },
        Commands::Repository { id, url, username, password } => {
            commands::repository_entry(&vault, &id, &url, username.as_deref(), password.as_deref())?
        }
        Commands::Config => commands::describe_config(config)?,
    };
    println!("{}", output);
    Ok(ExitCode::SUCCESS)
}

async fn launch(outcome: &ResolutionOutcome, app_args: &[String]) -> anyhow::Result<ExitCode> {
    let (main_class, args) = match outcome.entry_point(app_args) {
        Some(entry_point) => entry_point,
        None => bail!("no main class: neither given explicitly, nor declared in the manifest, nor as first argument"),
    };
    let classpath = std::env::join_paths(outcome.classpath())
        .context("invalid classpath")?;

    info!("starting {}", main_class);
    let status = tokio::process::Command::new("java")
        .arg("-cp")
        .arg(classpath)
        .arg(&main_class)
        .args(&args)
        .status()
        .await
        .context("failed to start java")?;

    debug!("{} terminated with {}", main_class, status);
    Ok(match status.code() {
        Some(code) => ExitCode::from(code.clamp(0, 255) as u8),
        None => ExitCode::FAILURE,
    })
}

async fn run(cli: Cli, config: LauncherConfig) -> anyhow::Result<ExitCode> {
    if let Some(command) = cli.command {
        return run_command(command, &config);
    }
    let artifact = match &cli.artifact {
        Some(artifact) => artifact,
        None => bail!("expected an artifact: groupId:artifactId:version[:packaging[:classifier[:mainclass]]] or a jar file"),
    };
    config.validate()?;

    let config = Arc::new(config);
    let vault = Arc::new(EncodedVault::for_repositories(&config.repositories));
    let driver = ResolutionDriver::new(config.clone(), vault)?;

    let outcome = driver.resolve(artifact).await?;

    if config.execute {
        launch(&outcome, &cli.app_args).await
    }
    else {
        let classpath = std::env::join_paths(outcome.classpath())
            .context("invalid classpath")?;
        println!("{}", classpath.to_string_lossy());
        Ok(ExitCode::SUCCESS)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("launcher: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    // NB: before effective(), which reports clamped values through the log
    init_logging(&config);
    let config = config.effective();

    match run(cli, config).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
