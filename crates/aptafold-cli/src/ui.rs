use aptafold::engine::progress::{Progress, ProgressCallback};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::warn;

#[derive(Debug)]
pub enum UiEvent {
    Progress(Progress),
    Log(String),
}

pub struct UiManager {
    mp: Arc<MultiProgress>,
    state: PhaseState,
    event_receiver: mpsc::Receiver<UiEvent>,
    shutdown_receiver: watch::Receiver<bool>,
    _sentinel_bar: ProgressBar,
}

/// The pipeline stage currently on screen, numbered in the order stages were seen.
#[derive(Default)]
struct PhaseState {
    spinner: Option<ProgressBar>,
    phase: Option<&'static str>,
    started: Option<Instant>,
    /// Stages seen so far, executed or skipped.
    seen: usize,
}

impl PhaseState {
    fn label(&self, name: &str) -> String {
        format!("[{}] {}", self.seen, name)
    }

    fn clear_spinner(&mut self) {
        if let Some(bar) = self.spinner.take() {
            bar.finish_and_clear();
        }
    }
}

impl UiManager {
    pub fn new() -> (Self, mpsc::Sender<UiEvent>, watch::Sender<bool>) {
        let (event_sender, event_receiver) = mpsc::channel(1024);
        let (shutdown_sender, shutdown_receiver) = watch::channel(false);
        let mp = Arc::new(MultiProgress::new());
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(12));
        let _sentinel_bar = mp.add(ProgressBar::hidden());
        let manager = Self {
            mp,
            state: PhaseState::default(),
            event_receiver,
            shutdown_receiver,
            _sentinel_bar,
        };

        (manager, event_sender, shutdown_sender)
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(event) = self.event_receiver.recv() => {
                    self.handle_event(event);
                }
                result = self.shutdown_receiver.changed() => {
                    if result.is_err() || *self.shutdown_receiver.borrow() {
                        break;
                    }
                }
            }
        }
        // Events queued before the shutdown signal still get printed.
        while let Ok(event) = self.event_receiver.try_recv() {
            self.handle_event(event);
        }
        self.state.clear_spinner();
        self._sentinel_bar.finish_and_clear();
    }

    fn handle_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Log(msg) => {
                self.mp.println(msg).ok();
            }
            UiEvent::Progress(progress) => self.handle_progress(progress),
        }
    }

    fn handle_progress(&mut self, progress: Progress) {
        match progress {
            Progress::PhaseStart { name } => {
                self.state.clear_spinner();
                self.state.seen += 1;

                let spinner = self.mp.add(ProgressBar::new_spinner());
                spinner.enable_steady_tick(Duration::from_millis(100));
                spinner.set_style(Self::stage_style());
                spinner.set_message(self.state.label(name));

                self.state.spinner = Some(spinner);
                self.state.phase = Some(name);
                self.state.started = Some(Instant::now());
            }
            Progress::PhaseFinish => {
                self.state.clear_spinner();
                if let Some(name) = self.state.phase.take() {
                    let elapsed = self
                        .state
                        .started
                        .take()
                        .map_or(0.0, |t| t.elapsed().as_secs_f64());
                    self.mp
                        .println(format!("✓ {} ({:.1}s)", self.state.label(name), elapsed))
                        .ok();
                }
            }
            Progress::StageSkipped { name } => {
                self.state.seen += 1;
                self.mp
                    .println(format!("↷ {} (checkpointed, skipped)", self.state.label(name)))
                    .ok();
            }
            Progress::Message(msg) => {
                if let (Some(spinner), Some(name)) = (&self.state.spinner, self.state.phase) {
                    spinner.set_message(format!("{}: {}", self.state.label(name), msg));
                }
                self.mp.println(format!("    {}", msg)).ok();
            }
        }
    }

    fn stage_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed_precise}]")
            .expect("Invalid template")
            .tick_chars("◐◓◑◒ ")
    }
}

#[derive(Clone)]
pub struct CliProgressHandler {
    sender: mpsc::Sender<UiEvent>,
}

impl CliProgressHandler {
    pub fn new(sender: mpsc::Sender<UiEvent>) -> Self {
        Self { sender }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let sender = self.sender.clone();
        Box::new(move |progress: Progress| {
            if let Err(e) = sender.try_send(UiEvent::Progress(progress)) {
                warn!("Failed to send progress update to UI channel: {}", e);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hidden_manager() -> UiManager {
        let (manager, _, _) = UiManager::new();
        manager.mp.set_draw_target(ProgressDrawTarget::hidden());
        manager
    }

    fn start(manager: &mut UiManager, name: &'static str) {
        manager.handle_event(UiEvent::Progress(Progress::PhaseStart { name }));
    }

    #[test]
    fn phase_start_shows_numbered_spinner() {
        let mut manager = hidden_manager();
        assert!(manager.state.spinner.is_none());

        start(&mut manager, "Secondary Structure Prediction");

        let spinner = manager.state.spinner.as_ref().unwrap();
        assert_eq!(spinner.message(), "[1] Secondary Structure Prediction");
        assert_eq!(manager.state.phase, Some("Secondary Structure Prediction"));
        assert!(manager.state.started.is_some());
    }

    #[test]
    fn skipped_stages_count_towards_numbering() {
        let mut manager = hidden_manager();
        manager.handle_event(UiEvent::Progress(Progress::StageSkipped {
            name: "Secondary Structure Prediction",
        }));
        manager.handle_event(UiEvent::Progress(Progress::StageSkipped {
            name: "Coarse Folding",
        }));
        assert!(manager.state.spinner.is_none());

        start(&mut manager, "Free Aptamer Sampling");

        let spinner = manager.state.spinner.as_ref().unwrap();
        assert_eq!(spinner.message(), "[3] Free Aptamer Sampling");
    }

    #[test]
    fn phase_finish_clears_the_stage() {
        let mut manager = hidden_manager();
        start(&mut manager, "Coarse Folding");

        manager.handle_event(UiEvent::Progress(Progress::PhaseFinish));

        assert!(manager.state.spinner.is_none());
        assert!(manager.state.phase.is_none());
        assert!(manager.state.started.is_none());
        assert_eq!(manager.state.seen, 1);
    }

    #[test]
    fn message_annotates_the_running_stage() {
        let mut manager = hidden_manager();
        start(&mut manager, "Free Aptamer Sampling");

        manager.handle_event(UiEvent::Progress(Progress::Message(
            "aptamer simulation speed 24.0 ns/day".to_string(),
        )));

        let spinner = manager.state.spinner.as_ref().unwrap();
        assert_eq!(
            spinner.message(),
            "[1] Free Aptamer Sampling: aptamer simulation speed 24.0 ns/day"
        );
    }

    #[test]
    fn message_without_running_stage_is_only_printed() {
        let mut manager = hidden_manager();
        manager.handle_event(UiEvent::Progress(Progress::Message("idle".to_string())));
        assert!(manager.state.spinner.is_none());
    }

    #[tokio::test]
    async fn progress_handler_forwards_events() {
        let (sender, mut receiver) = mpsc::channel(1);
        let handler = CliProgressHandler::new(sender);
        let callback = handler.get_callback();

        callback(Progress::StageSkipped { name: "Coarse Folding" });

        match receiver.recv().await.unwrap() {
            UiEvent::Progress(Progress::StageSkipped { name }) => {
                assert_eq!(name, "Coarse Folding")
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn manager_drains_queued_events_on_shutdown() {
        let (manager, sender, shutdown) = UiManager::new();
        manager.mp.set_draw_target(ProgressDrawTarget::hidden());

        sender
            .send(UiEvent::Progress(Progress::PhaseStart {
                name: "Complex Sampling",
            }))
            .await
            .unwrap();
        shutdown.send(true).unwrap();

        tokio::spawn(manager.run()).await.unwrap();
        assert!(sender.is_closed());
    }
}
