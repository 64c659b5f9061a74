use clap::{Parser, Subcommand};
use logview::cli::tail::TailArgs;
use logview::config::resolve_config_path;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "logview")]
#[command(about = "Tail container logs from a log viewer backend", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream logs of a container, stack, service, group or merged set
    Tail(TailArgs),
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they never interleave with printed entries
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logview=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());

    match cli.command {
        Commands::Tail(args) => {
            logview::cli::tail::run(config_path, args).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Init { stdout } => {
                logview::cli::config::init(stdout)?;
            }
            ConfigAction::Validate => {
                logview::cli::config::validate(config_path)?;
            }
        },
    }

    Ok(())
}
