use super::handle::{Command, Reply};
use super::{Result, ViewerError, ViewerHandle, ViewerState};
use crate::backfill::{
    merge_older, plan_older, plan_skipped, split_skipped, BackfillDone, BackfillError,
    BackfillKind, BackfillLoader, BackfillRequest, SkippedAnchor,
};
use crate::buffer::FlushController;
use crate::config::{BackfillConfig, Config};
use crate::model::{LogEntry, StreamConfig, Target};
use crate::stream::connection::CONTAINER_STOPPED;
use crate::stream::{stream_url, ConnectionOptions, LogApi, StreamConnection, StreamEvent, TaggedEvent};
use chrono::Utc;
use reqwest::Url;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Named lifecycle marker injected when a stopped container starts again
const CONTAINER_STARTED: &str = "container-started";

const EVENT_CHANNEL_SIZE: usize = 1024;
const COMMAND_CHANNEL_SIZE: usize = 16;

/// Signals a viewer follows for its whole lifetime
pub struct ViewerDeps {
    pub target: watch::Receiver<Target>,
    pub stream_config: watch::Receiver<StreamConfig>,
    pub paused: watch::Receiver<bool>,
}

/// One mounted log viewer.
///
/// A single task owns the connection, the flush controller and the backfill
/// loader and reacts to one event at a time, so none of them needs locking.
pub struct LogViewer {
    base: Url,
    backfill: BackfillConfig,
    target: watch::Receiver<Target>,
    target_live: bool,
    stream_config: watch::Receiver<StreamConfig>,
    stream_config_live: bool,
    current_target: Target,
    current_stream: StreamConfig,
    controller: FlushController,
    connection: StreamConnection,
    loader: BackfillLoader,
    events: mpsc::Receiver<TaggedEvent>,
    backfill_results: mpsc::Receiver<BackfillDone>,
    commands: mpsc::Receiver<Command>,
    state: watch::Sender<ViewerState>,
}

impl LogViewer {
    /// Start a viewer task and connect it to the current target
    pub fn spawn(api: Arc<dyn LogApi>, config: &Config, deps: ViewerDeps) -> Result<ViewerHandle> {
        let base = Url::parse(&config.server.base_url).map_err(|e| ViewerError::BaseUrl {
            url: config.server.base_url.clone(),
            reason: e.to_string(),
        })?;

        let (event_tx, events) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let (backfill_tx, backfill_results) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let (command_tx, commands) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let (state, state_rx) = watch::channel(ViewerState::Disconnected);

        let options = ConnectionOptions {
            retry_interval: config.server.retry_interval,
            idle_timeout: config.server.idle_timeout,
        };
        let connection = StreamConnection::new(Arc::clone(&api), options, event_tx);
        let loader = BackfillLoader::new(api, backfill_tx);
        let controller = FlushController::new(&config.viewer, deps.paused);

        let handle = ViewerHandle::new(
            command_tx,
            controller.subscribe(),
            state_rx,
            loader.subscribe(),
        );

        let mut target = deps.target;
        let mut stream_config = deps.stream_config;
        let current_target = target.borrow_and_update().clone();
        let current_stream = stream_config.borrow_and_update().clone();

        let viewer = LogViewer {
            base,
            backfill: config.backfill.clone(),
            target,
            target_live: true,
            stream_config,
            stream_config_live: true,
            current_target,
            current_stream,
            controller,
            connection,
            loader,
            events,
            backfill_results,
            commands,
            state,
        };
        tokio::spawn(viewer.run());

        Ok(handle)
    }

    async fn run(mut self) {
        info!(target_id = %self.current_target.identity(), "Log viewer started");
        self.connect(true);

        loop {
            let deadline = self.controller.deadline();

            tokio::select! {
                Some(tagged) = self.events.recv() => {
                    self.on_stream_event(tagged);
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.controller.flush_if_due(Instant::now());
                }
                changed = self.target.changed(), if self.target_live => {
                    match changed {
                        Ok(()) => self.on_target_changed(),
                        Err(_) => self.target_live = false,
                    }
                }
                changed = self.stream_config.changed(), if self.stream_config_live => {
                    match changed {
                        Ok(()) => self.on_stream_config_changed(),
                        Err(_) => self.stream_config_live = false,
                    }
                }
                command = self.commands.recv() => {
                    match command {
                        Some(Command::Shutdown) | None => break,
                        Some(command) => self.on_command(command),
                    }
                }
                Some(done) = self.backfill_results.recv() => {
                    self.on_backfill_done(done);
                }
            }
        }

        self.commands.close();
        self.connection.close();
        self.loader.abort();
        self.state.send_replace(ViewerState::Closed);
        info!(target_id = %self.current_target.identity(), "Log viewer stopped");
    }

    /// Close the current connection and open one for the current target
    fn connect(&mut self, clear: bool) {
        self.connection.close();
        self.loader.abort();
        if clear {
            self.controller.clear_messages();
        }

        let url = match stream_url(&self.base, &self.current_target, &self.current_stream) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Cannot build stream URL");
                self.state.send_replace(ViewerState::Disconnected);
                return;
            }
        };

        self.state.send_replace(ViewerState::Connecting);
        let default_container = self.current_target.default_container().map(str::to_string);
        let generation = self.connection.open(url, default_container);
        debug!(generation, clear, "Connecting viewer");
    }

    fn on_stream_event(&mut self, tagged: TaggedEvent) {
        if tagged.generation != self.connection.generation() || !self.connection.is_open() {
            debug!(generation = tagged.generation, "Dropping event from stale connection");
            return;
        }

        match tagged.event {
            StreamEvent::Opened => {
                self.state.send_replace(ViewerState::Open);
            }
            StreamEvent::Entry(entry) => {
                self.controller.push(entry, Instant::now());
            }
            StreamEvent::ContainerStopped { actor_id } => {
                let marker = LogEntry::docker_event(CONTAINER_STOPPED, &actor_id, Utc::now());
                self.controller.push(marker, Instant::now());
                self.controller.flush_now();
            }
            StreamEvent::Error(reason) => {
                self.state.send_replace(ViewerState::Errored);
                self.loader.abort();
                self.controller.clear_messages();
                warn!(error = %reason, "Log stream error, cleared viewer state");
                self.state.send_replace(ViewerState::Disconnected);
            }
            StreamEvent::Reconnecting => {
                self.state.send_replace(ViewerState::Connecting);
            }
        }
    }

    fn on_target_changed(&mut self) {
        let next = self.target.borrow_and_update().clone();

        if next.identity() != self.current_target.identity() {
            info!(
                from = %self.current_target.identity(),
                to = %next.identity(),
                "Viewer target changed"
            );
            self.current_target = next;
            self.connect(true);
        } else if !self.current_target.is_running() && next.is_running() {
            self.current_target = next;
            if let Some(id) = self.current_target.default_container().map(str::to_string) {
                let marker = LogEntry::docker_event(CONTAINER_STARTED, &id, Utc::now());
                self.controller.push(marker, Instant::now());
            }
            self.connect(false);
        } else {
            self.current_target = next;
        }
    }

    fn on_stream_config_changed(&mut self) {
        let next = self.stream_config.borrow_and_update().clone();
        if next != self.current_stream {
            self.current_stream = next;
            self.connect(true);
        }
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::LoadOlder(reply) => {
                let requests = plan_older(
                    self.controller.messages(),
                    self.current_target.containers(),
                    &self.backfill,
                );
                self.start_backfill(BackfillKind::Older, requests, reply);
            }
            Command::LoadSkipped { index, reply } => {
                let Some(entry) = self.controller.messages().get(index) else {
                    let _ = reply.send(Err(BackfillError::NotSkipped(index)));
                    return;
                };
                let (Some(skipped), Some(anchor)) = (entry.as_skipped(), SkippedAnchor::of(entry)) else {
                    let _ = reply.send(Err(BackfillError::NotSkipped(index)));
                    return;
                };
                let requests = plan_skipped(skipped, self.current_target.containers(), &self.backfill);
                self.start_backfill(BackfillKind::Skipped(anchor), requests, reply);
            }
            Command::Reconnect { clear } => self.connect(clear),
            Command::Shutdown => {}
        }
    }

    fn start_backfill(&mut self, kind: BackfillKind, requests: Vec<BackfillRequest>, reply: Reply) {
        let started = self
            .loader
            .start(&self.base, &self.current_stream, kind, requests);
        if let Err(e) = &started {
            warn!(error = %e, "Cannot start backfill");
        }
        let _ = reply.send(started);
    }

    fn on_backfill_done(&mut self, done: BackfillDone) {
        if !self.loader.finish(done.ticket) {
            debug!(ticket = done.ticket, "Discarding stale backfill result");
            return;
        }

        let fetched = match done.outcome {
            Ok(fetched) => fetched,
            Err(BackfillError::Aborted) => return,
            Err(e) => {
                warn!(error = %e, "Backfill failed");
                return;
            }
        };

        match done.kind {
            BackfillKind::Older => {
                let block = merge_older(self.controller.messages(), fetched);
                debug!(count = block.len(), "Loaded older entries");
                self.controller.splice_front(block);
            }
            BackfillKind::Skipped(anchor) => {
                let messages = self.controller.messages();
                let Some(index) = messages.iter().position(|e| anchor.matches(e)) else {
                    debug!("Skipped placeholder no longer visible, dropping result");
                    return;
                };
                let replacement = split_skipped(
                    &messages[index],
                    messages,
                    fetched,
                    self.backfill.skipped_page,
                );
                debug!(index, count = replacement.len(), "Loaded skipped entries");
                self.controller.replace(index, replacement);
            }
        }
    }
}
