use super::{Result, ViewerError, ViewerState};
use crate::backfill::BackfillError;
use crate::buffer::Snapshot;
use tokio::sync::{mpsc, oneshot, watch};

pub(crate) type Reply = oneshot::Sender<std::result::Result<bool, BackfillError>>;

#[derive(Debug)]
pub(crate) enum Command {
    LoadOlder(Reply),
    LoadSkipped { index: usize, reply: Reply },
    Reconnect { clear: bool },
    Shutdown,
}

/// Cloneable front of a running viewer.
///
/// The viewer stops once `shutdown` is called or every handle is dropped.
#[derive(Debug, Clone)]
pub struct ViewerHandle {
    commands: mpsc::Sender<Command>,
    messages: watch::Receiver<Snapshot>,
    state: watch::Receiver<ViewerState>,
    loading_more: watch::Receiver<bool>,
}

impl ViewerHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<Command>,
        messages: watch::Receiver<Snapshot>,
        state: watch::Receiver<ViewerState>,
        loading_more: watch::Receiver<bool>,
    ) -> Self {
        Self {
            commands,
            messages,
            state,
            loading_more,
        }
    }

    /// Observe the visible message sequence
    pub fn messages(&self) -> watch::Receiver<Snapshot> {
        self.messages.clone()
    }

    pub fn state(&self) -> watch::Receiver<ViewerState> {
        self.state.clone()
    }

    pub fn loading_more(&self) -> watch::Receiver<bool> {
        self.loading_more.clone()
    }

    /// Load the window just before the oldest visible entries.
    ///
    /// Resolves to `false` when nothing was started: another backfill is
    /// still running or nothing is visible yet. The block itself shows up
    /// on the `messages` channel when the fetch completes.
    pub async fn load_older(&self) -> Result<bool> {
        let (reply, response) = oneshot::channel();
        self.send(Command::LoadOlder(reply)).await?;
        Ok(response.await.map_err(|_| ViewerError::Stopped)??)
    }

    /// Fill in the skipped placeholder at `index` of the visible sequence
    pub async fn load_skipped(&self, index: usize) -> Result<bool> {
        let (reply, response) = oneshot::channel();
        self.send(Command::LoadSkipped { index, reply }).await?;
        Ok(response.await.map_err(|_| ViewerError::Stopped)??)
    }

    pub async fn reconnect(&self, clear: bool) -> Result<()> {
        self.send(Command::Reconnect { clear }).await
    }

    /// Stop the viewer and wait until its connection is closed.
    ///
    /// Calling this on an already stopped viewer is a no-op.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
        let mut state = self.state.clone();
        let _ = state.wait_for(|s| *s == ViewerState::Closed).await;
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ViewerError::Stopped)
    }
}
