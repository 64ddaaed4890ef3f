use crate::config::Configuration;
use crate::error::ViewerError;
use crate::events::{LoadOutcome, LoadRequest, ViewerCommand, ViewerEvent};
use crate::media::LoadedMedia;
use crate::playback::HeadlessPlayback;
use crate::session::{PlaybackState, SceneMedia, ViewerSession, ViewerState, ViewerStateChange};
use anyhow::Result;
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Owns the session and funnels commands and load outcomes through its
/// transitions. Exits on cancellation, or once the command channel is closed
/// and no load is pending (or the loader is gone).
pub async fn run(
    mut commands: Receiver<ViewerCommand>,
    mut outcomes: Receiver<LoadOutcome>,
    to_loader: Sender<LoadRequest>,
    events: Sender<ViewerEvent>,
    cfg: Configuration,
    cancel: CancellationToken,
) -> Result<()> {
    let mut viewer = Viewer {
        session: ViewerSession::new(cfg.zoom.clone()),
        cfg,
        to_loader,
        events,
    };
    let mut commands_open = true;
    let mut outcomes_open = true;

    loop {
        if !commands_open && (!outcomes_open || viewer.session.state() != ViewerState::Loading) {
            break;
        }
        select! {
            _ = cancel.cancelled() => break,

            maybe_cmd = commands.recv(), if commands_open => match maybe_cmd {
                Some(cmd) => viewer.handle_command(cmd).await,
                None => {
                    debug!("command channel closed");
                    commands_open = false;
                }
            },

            maybe_outcome = outcomes.recv(), if outcomes_open => match maybe_outcome {
                Some(outcome) => viewer.handle_outcome(outcome).await,
                None => {
                    debug!("loader stopped");
                    outcomes_open = false;
                }
            },
        }
        viewer.flush_notices().await;
    }

    let ch = viewer.session.reset();
    viewer.state_changed(ch).await;
    info!("viewer stopped");
    Ok(())
}

struct Viewer {
    session: ViewerSession,
    cfg: Configuration,
    to_loader: Sender<LoadRequest>,
    events: Sender<ViewerEvent>,
}

impl Viewer {
    async fn handle_command(&mut self, cmd: ViewerCommand) {
        debug!(?cmd, "viewer command");
        match cmd {
            ViewerCommand::Load { source, stereo } => {
                let previous = self.session.state();
                let ticket = self.session.load_requested(source.clone(), stereo);
                if previous != ViewerState::Loading {
                    self.state_changed(Some(ViewerStateChange {
                        from: previous,
                        to: ViewerState::Loading,
                    }))
                    .await;
                }
                if self
                    .to_loader
                    .send(LoadRequest { ticket, source })
                    .await
                    .is_err()
                {
                    warn!("loader channel closed");
                    let ch = self.session.load_failed(
                        ticket,
                        ViewerError::NetworkFailure("loader is not running".into()),
                    );
                    self.state_changed(ch).await;
                }
            }
            ViewerCommand::ToggleStereo => {
                if self.session.stereo_toggled().is_some() {
                    self.emit_texture().await;
                }
            }
            ViewerCommand::AdjustFov(delta) => {
                let fov = self.session.fov_adjusted(delta);
                self.fov_changed(fov).await;
            }
            ViewerCommand::Wheel(delta_y) => {
                let fov = self.session.wheel(delta_y);
                self.fov_changed(fov).await;
            }
            ViewerCommand::PinchStart(distance) => self.session.pinch_started(distance),
            ViewerCommand::Pinch(distance) => {
                let fov = self.session.pinch_moved(distance);
                self.fov_changed(fov).await;
            }
            ViewerCommand::Play => {
                let state = self.session.set_playing(true);
                self.playback_changed(state).await;
            }
            ViewerCommand::Pause => {
                let state = self.session.set_playing(false);
                self.playback_changed(state).await;
            }
            ViewerCommand::TogglePlayback => {
                let state = self.session.toggle_playback();
                self.playback_changed(state).await;
            }
            ViewerCommand::Seek(fraction) => {
                let state = self.session.seek(fraction);
                self.playback_changed(state).await;
            }
            ViewerCommand::Tick => {
                let state = self.session.tick_playback();
                self.playback_changed(state).await;
            }
            ViewerCommand::Interact => {
                if self.session.user_interaction() {
                    let state = self.session.playback();
                    self.playback_changed(state).await;
                }
            }
            ViewerCommand::Screenshot(path) => {
                let path = path.unwrap_or_else(|| self.cfg.default_screenshot_path());
                if self.session.screenshot(&path) {
                    emit(&self.events, ViewerEvent::ScreenshotSaved(path)).await;
                }
            }
            ViewerCommand::Reset => {
                let ch = self.session.reset();
                self.state_changed(ch).await;
            }
            ViewerCommand::Status => {
                let snapshot = self.session.snapshot();
                emit(&self.events, ViewerEvent::Status(snapshot)).await;
            }
        }
    }

    async fn handle_outcome(&mut self, outcome: LoadOutcome) {
        let LoadOutcome { ticket, result } = outcome;
        if !self.session.is_current(ticket) {
            debug!(generation = ticket.generation(), "dropping outcome of superseded load");
            return;
        }
        let ch = match result {
            Ok(LoadedMedia::Image(img)) => self.session.load_succeeded(ticket, SceneMedia::Image(img)),
            Ok(LoadedMedia::Video { info, bytes }) => {
                let player = HeadlessPlayback::new(info, bytes, self.cfg.autoplay);
                self.session
                    .load_succeeded(ticket, SceneMedia::Video(Box::new(player)))
            }
            Err(err) => self.session.load_failed(ticket, err),
        };
        self.state_changed(ch).await;
        match self.session.state() {
            ViewerState::ShowingImage => self.emit_texture().await,
            ViewerState::ShowingVideo => {
                let state = self.session.playback();
                self.playback_changed(state).await;
            }
            _ => {}
        }
    }

    /// Emits the current sky texture, if one is on screen.
    async fn emit_texture(&mut self) {
        if let Some(texture) = self.session.texture() {
            let stereo = self.session.stereo_mode();
            emit(&self.events, ViewerEvent::ImageRendered { texture, stereo }).await;
        }
    }

    async fn state_changed(&mut self, ch: Option<ViewerStateChange>) {
        if let Some(ch) = ch {
            info!(from = ?ch.from, to = ?ch.to, "viewer state");
            emit(&self.events, ViewerEvent::StateChanged(ch)).await;
        }
    }

    async fn fov_changed(&mut self, fov: Option<f32>) {
        if let Some(fov) = fov {
            debug!(fov, "zoom");
            emit(&self.events, ViewerEvent::FovChanged(fov)).await;
        }
    }

    async fn playback_changed(&mut self, state: Option<PlaybackState>) {
        if let Some(state) = state {
            emit(&self.events, ViewerEvent::Playback(state)).await;
        }
    }

    async fn flush_notices(&mut self) {
        for error in self.session.drain_notices() {
            let message = error.user_message();
            emit(&self.events, ViewerEvent::Notification { message, error }).await;
        }
    }
}

// Borrows only the sender: the session is Send but not Sync.
async fn emit(events: &Sender<ViewerEvent>, event: ViewerEvent) {
    if events.send(event).await.is_err() {
        debug!("event receiver dropped");
    }
}
