use std::io::Write;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::Utc;
use genwatch_core::{update, Effect, JobStatus, Msg, ProgressState};
use genwatch_logging::{gw_debug, gw_info, set_current_job};

use super::config::AppConfig;
use super::effects::EffectRunner;
use super::render::TerminalRenderer;

const TICK_INTERVAL: Duration = Duration::from_millis(100);
/// How long a finished job waits for outstanding preview fetches.
const PREVIEW_GRACE: Duration = Duration::from_secs(2);

/// What the user asked the binary to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Generate {
        portfolio_id: String,
    },
    Watch {
        job_id: String,
        portfolio_id: Option<String>,
    },
}

impl Command {
    fn initial_msgs(self) -> Vec<Msg> {
        match self {
            Command::Generate { portfolio_id } => vec![
                Msg::PortfolioSelected(Some(portfolio_id)),
                Msg::GenerateRequested,
            ],
            Command::Watch {
                job_id,
                portfolio_id,
            } => vec![Msg::WatchRequested {
                job_id,
                portfolio_id,
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed { error: Option<String> },
    TriggerFailed { message: String },
}

impl Outcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Completed => 0,
            Outcome::Failed { .. } | Outcome::TriggerFailed { .. } => 1,
        }
    }
}

/// Reducer state plus the bookkeeping needed to know when to stop.
struct Session {
    state: ProgressState,
    pending_previews: usize,
    finish_by: Option<Instant>,
    grace: Duration,
}

impl Session {
    fn new(state: ProgressState, grace: Duration) -> Self {
        Self {
            state,
            pending_previews: 0,
            finish_by: None,
            grace,
        }
    }

    fn apply(&mut self, msg: Msg) -> Vec<Effect> {
        if matches!(msg, Msg::PreviewLoaded(_) | Msg::PreviewFailed { .. }) {
            self.pending_previews = self.pending_previews.saturating_sub(1);
        }
        let previous_job = self.state.active_job_id().map(ToOwned::to_owned);
        let (state, effects) = update(std::mem::take(&mut self.state), msg);
        self.state = state;
        if self.state.active_job_id() != previous_job.as_deref() {
            set_current_job(self.state.active_job_id());
            self.finish_by = None;
        }
        effects
    }

    fn previews_issued(&mut self, count: usize) {
        self.pending_previews += count;
    }

    /// Decides whether the session is over at `now`.
    fn outcome(&mut self, now: Instant) -> Option<Outcome> {
        if self.state.active_job_id().is_none() && !self.state.trigger_pending() {
            return self
                .state
                .trigger_error()
                .map(|message| Outcome::TriggerFailed {
                    message: message.to_string(),
                });
        }

        let outcome = match self.state.status()? {
            JobStatus::Completed => Outcome::Completed,
            JobStatus::Failed => Outcome::Failed {
                error: self.state.view().error,
            },
            _ => {
                self.finish_by = None;
                return None;
            }
        };

        let finish_by = *self.finish_by.get_or_insert(now + self.grace);
        if self.pending_previews == 0 || now >= finish_by {
            Some(outcome)
        } else {
            None
        }
    }
}

/// Runs one command to completion, rendering progress to `out`.
pub fn run(config: &AppConfig, command: Command, out: impl Write) -> anyhow::Result<Outcome> {
    let (msg_tx, msg_rx) = mpsc::channel::<Msg>();
    let runner = EffectRunner::new(config.to_engine_settings(), msg_tx.clone(), config.preview)
        .context("failed to start engine")?;
    let mut renderer = TerminalRenderer::new(out);
    let mut session = Session::new(
        ProgressState::with_ordering(config.ordering_policy()),
        PREVIEW_GRACE,
    );

    for msg in command.initial_msgs() {
        msg_tx.send(msg).context("message loop closed")?;
    }

    // Background tick so grace deadlines expire without new events.
    let tick_tx = msg_tx;
    thread::spawn(move || {
        while tick_tx.send(Msg::Tick).is_ok() {
            thread::sleep(TICK_INTERVAL);
        }
    });

    let result = loop {
        let msg = msg_rx.recv().context("engine stopped unexpectedly")?;
        if !matches!(msg, Msg::Tick) {
            gw_debug!("Dispatching {:?}", msg);
        }
        let effects = session.apply(msg);
        session.previews_issued(runner.enqueue(effects));

        if session.state.consume_dirty() {
            renderer
                .render(&session.state.view())
                .context("failed to write progress")?;
        }
        if let Some(outcome) = session.outcome(Instant::now()) {
            break outcome;
        }
    };

    let view = session.state.view();
    if let Some(job_id) = &view.job_id {
        runner.close_channel(job_id);
        renderer
            .summary(&view, Utc::now())
            .context("failed to write summary")?;
    }
    gw_info!("Finished with {:?}", result);
    set_current_job(None);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use genwatch_core::{
        Effect, GenerationJob, GenerationProgressEvent, JobStatus, Msg, PreviewDigest,
        ProgressState,
    };
    use pretty_assertions::assert_eq;

    use super::{Command, Outcome, Session};

    fn started(session: &mut Session) {
        for msg in (Command::Generate {
            portfolio_id: "p1".to_string(),
        })
        .initial_msgs()
        {
            session.apply(msg);
        }
        session.apply(Msg::JobStarted(GenerationJob::pending("job1", "p1")));
    }

    fn progress(session: &mut Session, status: JobStatus, value: u32) -> Vec<Effect> {
        session.apply(Msg::ProgressReceived {
            job_id: "job1".to_string(),
            event: GenerationProgressEvent::new("job1", status, value, "step"),
        })
    }

    #[test]
    fn generate_starts_with_selection_then_trigger() {
        let msgs = Command::Generate {
            portfolio_id: "p1".to_string(),
        }
        .initial_msgs();
        assert_eq!(
            msgs,
            vec![
                Msg::PortfolioSelected(Some("p1".to_string())),
                Msg::GenerateRequested
            ]
        );
    }

    #[test]
    fn running_job_is_not_finished() {
        let mut session = Session::new(ProgressState::new(), Duration::from_secs(2));
        started(&mut session);
        assert_eq!(session.outcome(Instant::now()), None);
        progress(&mut session, JobStatus::Processing, 40);
        assert_eq!(session.outcome(Instant::now()), None);
    }

    #[test]
    fn trigger_failure_ends_the_session() {
        let mut session = Session::new(ProgressState::new(), Duration::from_secs(2));
        session.apply(Msg::PortfolioSelected(Some("p1".to_string())));
        session.apply(Msg::GenerateRequested);
        assert_eq!(session.outcome(Instant::now()), None);

        session.apply(Msg::TriggerFailed {
            message: "Job already running".to_string(),
        });
        let outcome = session.outcome(Instant::now()).unwrap();
        assert_eq!(
            outcome,
            Outcome::TriggerFailed {
                message: "Job already running".to_string()
            }
        );
        assert_eq!(outcome.exit_code(), 1);
    }

    #[test]
    fn completion_waits_for_the_preview() {
        let mut session = Session::new(ProgressState::new(), Duration::from_secs(2));
        started(&mut session);
        let effects = progress(&mut session, JobStatus::Completed, 100);
        assert_eq!(
            effects,
            vec![Effect::FetchPreview {
                portfolio_id: "p1".to_string()
            }]
        );
        session.previews_issued(1);

        let now = Instant::now();
        assert_eq!(session.outcome(now), None);

        session.apply(Msg::PreviewLoaded(PreviewDigest {
            portfolio_id: "p1".to_string(),
            title: None,
            body: String::new(),
        }));
        let outcome = session.outcome(now).unwrap();
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(outcome.exit_code(), 0);
    }

    #[test]
    fn grace_period_bounds_the_wait() {
        let mut session = Session::new(ProgressState::new(), Duration::from_millis(500));
        started(&mut session);
        progress(&mut session, JobStatus::Completed, 100);
        session.previews_issued(1);

        let now = Instant::now();
        assert_eq!(session.outcome(now), None);
        assert!(session.outcome(now + Duration::from_millis(600)).is_some());
    }

    #[test]
    fn channel_failure_finishes_as_failed() {
        let mut session = Session::new(ProgressState::new(), Duration::from_secs(2));
        started(&mut session);
        progress(&mut session, JobStatus::Processing, 30);
        session.apply(Msg::ChannelFailed {
            job_id: "job1".to_string(),
            reason: "connection reset".to_string(),
        });

        let outcome = session.outcome(Instant::now()).unwrap();
        assert_eq!(outcome, Outcome::Failed { error: None });
        assert_eq!(session.state.view().step_label, "WebSocket disconnected");
    }

    #[test]
    fn watch_follows_an_existing_job() {
        let mut session = Session::new(ProgressState::new(), Duration::from_secs(2));
        let mut effects = Vec::new();
        for msg in (Command::Watch {
            job_id: "job9".to_string(),
            portfolio_id: None,
        })
        .initial_msgs()
        {
            effects.extend(session.apply(msg));
        }
        assert_eq!(
            effects,
            vec![Effect::OpenChannel {
                job_id: "job9".to_string()
            }]
        );
        assert_eq!(session.outcome(Instant::now()), None);
    }
}
