use std::sync::{mpsc, Arc};

use genwatch_core::{Effect, Msg};
use genwatch_engine::{
    ApiError, ChannelSignal, EngineEvent, EngineHandle, EngineSettings, EventSink,
};
use genwatch_logging::{gw_debug, gw_info, gw_warn};

/// Executes reducer effects on the engine and feeds engine events back as messages.
pub struct EffectRunner {
    engine: EngineHandle,
    previews: bool,
}

impl EffectRunner {
    pub fn new(
        settings: EngineSettings,
        msg_tx: mpsc::Sender<Msg>,
        previews: bool,
    ) -> Result<Self, ApiError> {
        let engine = EngineHandle::new(settings, Arc::new(MsgSink::new(msg_tx)))?;
        Ok(Self { engine, previews })
    }

    /// Runs `effects` in order and returns how many preview fetches were issued.
    pub fn enqueue(&self, effects: Vec<Effect>) -> usize {
        let mut previews = 0;
        for effect in effects {
            match effect {
                Effect::TriggerJob { portfolio_id } => {
                    gw_info!("TriggerJob portfolio_id={}", portfolio_id);
                    self.engine.trigger(portfolio_id);
                }
                Effect::OpenChannel { job_id } => {
                    gw_info!("OpenChannel job_id={}", job_id);
                    self.engine.open_channel(job_id);
                }
                Effect::CloseChannel { job_id } => {
                    gw_info!("CloseChannel job_id={}", job_id);
                    self.engine.close_channel(job_id);
                }
                Effect::FetchPreview { portfolio_id } => {
                    if !self.previews {
                        gw_debug!("Previews disabled; skipping {}", portfolio_id);
                        continue;
                    }
                    self.engine.fetch_preview(portfolio_id);
                    previews += 1;
                }
            }
        }
        previews
    }

    pub fn close_channel(&self, job_id: &str) {
        self.engine.close_channel(job_id);
    }
}

/// Forwards engine events into the message loop.
pub struct MsgSink {
    tx: mpsc::Sender<Msg>,
}

impl MsgSink {
    pub fn new(tx: mpsc::Sender<Msg>) -> Self {
        Self { tx }
    }
}

impl EventSink for MsgSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(to_msg(event));
    }
}

pub fn to_msg(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::JobStarted(job) => Msg::JobStarted(job),
        EngineEvent::TriggerFailed {
            portfolio_id,
            error,
        } => {
            gw_warn!(
                "Trigger for portfolio {} failed ({}): {}",
                portfolio_id,
                error.kind,
                error
            );
            Msg::TriggerFailed {
                message: error.message,
            }
        }
        EngineEvent::Channel { job_id, signal } => match signal {
            ChannelSignal::Event(event) => Msg::ProgressReceived { job_id, event },
            ChannelSignal::Failed { reason } => {
                gw_warn!("Channel of job {} failed: {}", job_id, reason);
                Msg::ChannelFailed { job_id, reason }
            }
            ChannelSignal::Closed => Msg::ChannelClosed { job_id },
        },
        EngineEvent::PreviewLoaded(digest) => Msg::PreviewLoaded(digest),
        EngineEvent::PreviewFailed {
            portfolio_id,
            error,
        } => {
            gw_warn!("Preview of portfolio {} failed: {}", portfolio_id, error);
            Msg::PreviewFailed {
                portfolio_id,
                message: error.message,
            }
        }
    }
}
