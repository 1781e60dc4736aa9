use signage_core::config::Config;
use signage_core::state::{DesiredState, DisplayState};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::player::Player;
use crate::poller::Poller;

/// Fixed time between poll ticks.
const POLL_INTERVAL: Duration = Duration::from_secs(15);
/// Delay before the first launch, giving the display device time to come up.
const STARTUP_DELAY: Duration = Duration::from_secs(5);

/// A command for the playback backend, decided by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCommand {
    StartWaiting,
    StartMedia(String),
}

/// The playback state machine: maps observed desired state onto player
/// commands. Pure — all subprocess and network I/O lives in the driver —
/// so every transition is unit-testable.
///
/// The tracked desired state starts as `Idle`, so a first `Idle` poll after
/// startup compares as unchanged and does not restart the waiting screen
/// the startup transition already put on screen.
pub struct Reconciler {
    desired: DesiredState,
    display: DisplayState,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconciler {
    pub fn new() -> Self {
        Self {
            desired: DesiredState::Idle,
            display: DisplayState::Uninitialized,
        }
    }

    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    /// Unconditional first transition: put the waiting screen up.
    pub fn startup(&mut self) -> PlayerCommand {
        self.display = DisplayState::Waiting;
        PlayerCommand::StartWaiting
    }

    /// One poll observation. Returns a command only when the observation
    /// differs from the previous one; duplicates issue nothing.
    pub fn on_poll(&mut self, observed: DesiredState) -> Option<PlayerCommand> {
        if observed == self.desired {
            return None;
        }
        self.desired = observed.clone();
        Some(match observed {
            DesiredState::Media(url) => {
                self.display = DisplayState::Media(url.clone());
                PlayerCommand::StartMedia(url)
            }
            DesiredState::Idle => {
                self.display = DisplayState::Waiting;
                PlayerCommand::StartWaiting
            }
        })
    }

    /// The subprocess exited on its own. Fall back to the waiting screen
    /// and reset the tracked desired state, so an unchanged media URL on
    /// the next poll reads as a change and restarts playback.
    pub fn on_player_exit(&mut self) -> PlayerCommand {
        self.desired = DesiredState::Idle;
        self.display = DisplayState::Waiting;
        PlayerCommand::StartWaiting
    }

    /// A launch attempt failed; nothing is on screen. A failed media start
    /// is forgotten so the next identical poll retries it. A failed waiting
    /// start is not: repeated `Idle` observations never re-issue commands,
    /// crash detection is the only retry path there.
    pub fn on_command_failed(&mut self, command: &PlayerCommand) {
        if matches!(command, PlayerCommand::StartMedia(_)) {
            self.desired = DesiredState::Idle;
        }
        self.display = DisplayState::Idle;
    }
}

/// The daemon's single thread of control: poll, compare, act, sleep.
pub struct ReconcileLoop {
    poller: Poller,
    player: Player,
    reconciler: Reconciler,
    shutdown: CancellationToken,
}

impl ReconcileLoop {
    pub fn new(config: &Config, shutdown: CancellationToken) -> anyhow::Result<Self> {
        Ok(Self {
            poller: Poller::new(&config.server_url, &config.player_id)?,
            player: Player::new(config.output_backend.clone(), config.waiting_image.clone()),
            reconciler: Reconciler::new(),
            shutdown,
        })
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        // Let the display device come up before the first mpv launch.
        tokio::select! {
            _ = self.shutdown.cancelled() => return Ok(()),
            _ = tokio::time::sleep(STARTUP_DELAY) => {}
        }

        let startup = self.reconciler.startup();
        self.apply(startup).await;

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            let observed = self.poller.poll().await;
            if let Some(command) = self.reconciler.on_poll(observed) {
                info!("desired state changed, now showing {}", self.reconciler.display());
                self.apply(command).await;
            }

            // Crash detection runs every tick, independent of the poll.
            if let Some(code) = self.player.poll_exit() {
                warn!("mpv exited unexpectedly (code {:?}), falling back to waiting screen", code);
                let command = self.reconciler.on_player_exit();
                self.apply(command).await;
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
            }
        }

        info!("shutting down, stopping playback");
        self.player.stop().await;
        Ok(())
    }

    async fn apply(&mut self, command: PlayerCommand) {
        let result = match &command {
            PlayerCommand::StartWaiting => self.player.start_waiting().await,
            PlayerCommand::StartMedia(url) => self.player.start_media(url).await,
        };
        if let Err(e) = result {
            warn!("playback start failed: {:#}", e);
            self.reconciler.on_command_failed(&command);
        }
    }
}
