use crate::config::{load_config, Config};
use crate::model::{ContainerRef, ContainerState, Level, LogEntry, StreamConfig, Target};
use crate::stream::HttpLogApi;
use crate::viewer::{LogViewer, ViewerDeps, ViewerHandle};
use clap::Args;
use console::style;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Args)]
#[command(group(
    clap::ArgGroup::new("target")
        .required(true)
        .args(["container", "stack", "service", "group", "merged"])
))]
pub struct TailArgs {
    /// Stream a single container
    #[arg(long, requires = "host")]
    pub container: Option<String>,

    #[arg(long)]
    pub stack: Option<String>,

    #[arg(long)]
    pub service: Option<String>,

    #[arg(long)]
    pub group: Option<String>,

    /// Stream several containers of one host merged together
    #[arg(long, num_args = 1.., requires = "host")]
    pub merged: Vec<String>,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub no_stdout: bool,

    #[arg(long)]
    pub no_stderr: bool,

    /// Only show these levels (repeatable)
    #[arg(long = "level")]
    pub levels: Vec<Level>,

    /// Load one window of history once the first entries arrive.
    /// Stack, service and group streams carry no container list to page through.
    #[arg(long, conflicts_with_all = ["stack", "service", "group"])]
    pub backfill: bool,
}

impl TailArgs {
    pub fn target(&self) -> Result<Target, String> {
        let host = || self.host.clone().ok_or_else(|| "--host is required".to_string());

        if let Some(id) = &self.container {
            return Ok(Target::Container(ContainerRef::new(
                &host()?,
                id,
                id,
                ContainerState::Running,
            )));
        }
        if let Some(name) = &self.stack {
            return Ok(Target::Stack { name: name.clone(), containers: Vec::new() });
        }
        if let Some(name) = &self.service {
            return Ok(Target::Service { name: name.clone(), containers: Vec::new() });
        }
        if let Some(name) = &self.group {
            return Ok(Target::Group { name: name.clone(), containers: Vec::new() });
        }
        if !self.merged.is_empty() {
            let host = host()?;
            let containers = self
                .merged
                .iter()
                .map(|id| ContainerRef::new(&host, id, id, ContainerState::Running))
                .collect();
            return Ok(Target::Merged { host, containers });
        }
        Err("no target given".to_string())
    }

    /// Flags from the command line override the configured defaults
    pub fn stream_config(&self, defaults: &StreamConfig) -> StreamConfig {
        let mut config = defaults.clone();
        if self.no_stdout {
            config.stdout = false;
        }
        if self.no_stderr {
            config.stderr = false;
        }
        if !self.levels.is_empty() {
            config.levels = self.levels.iter().copied().collect();
        }
        config
    }
}

pub async fn run(config_path: Option<PathBuf>, args: TailArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &config_path {
        Some(path) => {
            info!(config_path = %path.display(), "Loading configuration");
            load_config(path)?
        }
        None => Config::default(),
    };

    let target = args.target()?;
    let stream_config = args.stream_config(&config.stream);
    if !stream_config.stdout && !stream_config.stderr {
        return Err("at least one of stdout and stderr must be enabled".into());
    }

    let api = Arc::new(HttpLogApi::new(&config.server)?);
    let (_target_tx, target_rx) = watch::channel(target);
    let (_stream_tx, stream_rx) = watch::channel(stream_config);
    let (_paused_tx, paused_rx) = watch::channel(false);

    let handle = LogViewer::spawn(
        api,
        &config,
        ViewerDeps {
            target: target_rx,
            stream_config: stream_rx,
            paused: paused_rx,
        },
    )?;

    info!(base_url = %config.server.base_url, "Tailing logs, press Ctrl+C to stop");

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        _ = print_entries(&handle, args.backfill) => {}
    }

    handle.shutdown().await;
    Ok(())
}

/// Print newly visible entries until the viewer stops
async fn print_entries(handle: &ViewerHandle, backfill: bool) {
    let mut messages = handle.messages();
    let mut printer = Printer::default();
    let mut backfill_requested = !backfill;

    while messages.changed().await.is_ok() {
        let snapshot = messages.borrow_and_update().clone();
        printer.print_new(&snapshot);

        if !backfill_requested && printer.has_output() {
            backfill_requested = true;
            match handle.load_older().await {
                Ok(true) => {}
                Ok(false) => info!("No older entries to load for this target"),
                Err(e) => tracing::warn!(error = %e, "Could not load older entries"),
            }
        }
    }
}

#[derive(Default)]
struct Printer {
    first: Option<LogEntry>,
    last: Option<LogEntry>,
}

impl Printer {
    fn has_output(&self) -> bool {
        self.last.is_some()
    }

    fn print_new(&mut self, snapshot: &[LogEntry]) {
        if snapshot.is_empty() {
            self.first = None;
            self.last = None;
            return;
        }

        // entries spliced in front of what was already printed
        if let Some(first) = &self.first {
            if let Some(index) = snapshot.iter().position(|e| e == first) {
                if index > 0 {
                    println!("{}", style("── older entries ──").dim());
                    snapshot[..index].iter().for_each(print_entry);
                    println!("{}", style("── live ──").dim());
                }
            }
        }

        let start = self
            .last
            .as_ref()
            .and_then(|last| snapshot.iter().rposition(|e| e == last))
            .map_or(0, |index| index + 1);
        snapshot[start..].iter().for_each(print_entry);

        self.first = snapshot.first().cloned();
        self.last = snapshot.last().cloned();
    }
}

fn print_entry(entry: &LogEntry) {
    let timestamp = entry.date.format("%Y-%m-%d %H:%M:%S%.3f");
    let level = match entry.level {
        Some(level @ (Level::Fatal | Level::Error)) => style(level.as_str()).red().bold(),
        Some(level @ Level::Warn) => style(level.as_str()).yellow(),
        Some(level @ Level::Info) => style(level.as_str()).green(),
        Some(level) => style(level.as_str()).dim(),
        None => style("-").dim(),
    };

    if entry.is_synthetic() {
        println!("{} {}", style(timestamp).dim(), style(entry.text()).cyan().italic());
    } else {
        println!("{} {:>5} {}", style(timestamp).dim(), level, entry.text());
    }
}
