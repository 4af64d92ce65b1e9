use std::sync::{mpsc, Arc};
use std::thread;

use genwatch_logging::{gw_debug, gw_error, gw_info};
use tokio::sync::mpsc as async_mpsc;
use tokio::task::JoinHandle;

use crate::{
    ApiClient, ApiError, EngineEvent, EngineSettings, JobTrigger, LiveChannel, PreviewFetcher,
    ReqwestJobTrigger, ReqwestPreviewFetcher,
};

/// Receives everything the engine observes. Called from engine threads.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelEventSink {
    tx: mpsc::Sender<EngineEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

enum EngineCommand {
    Trigger { portfolio_id: String },
    OpenChannel { job_id: String },
    CloseChannel { job_id: String },
    FetchPreview { portfolio_id: String },
}

/// Handle to the IO engine running on its own tokio runtime thread.
///
/// Dropping the handle shuts the engine down and releases any open channel.
pub struct EngineHandle {
    cmd_tx: async_mpsc::UnboundedSender<EngineCommand>,
}

impl EngineHandle {
    pub fn new(settings: EngineSettings, sink: Arc<dyn EventSink>) -> Result<Self, ApiError> {
        let api = ApiClient::new(&settings)?;
        let trigger = Arc::new(ReqwestJobTrigger::new(api.clone()));
        let preview = Arc::new(ReqwestPreviewFetcher::new(api, settings.preview_max_chars));
        Ok(Self::with_components(settings, trigger, preview, sink))
    }

    pub fn with_components(
        settings: EngineSettings,
        trigger: Arc<dyn JobTrigger>,
        preview: Arc<dyn PreviewFetcher>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = async_mpsc::unbounded_channel();

        thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    gw_error!("Failed to start engine runtime: {}", err);
                    return;
                }
            };
            let components = Components {
                settings,
                trigger,
                preview,
                sink,
            };
            runtime.block_on(run_engine(components, cmd_rx));
            gw_debug!("Engine runtime stopped");
        });

        Self { cmd_tx }
    }

    pub fn trigger(&self, portfolio_id: impl Into<String>) {
        self.send(EngineCommand::Trigger {
            portfolio_id: portfolio_id.into(),
        });
    }

    pub fn open_channel(&self, job_id: impl Into<String>) {
        self.send(EngineCommand::OpenChannel {
            job_id: job_id.into(),
        });
    }

    pub fn close_channel(&self, job_id: impl Into<String>) {
        self.send(EngineCommand::CloseChannel {
            job_id: job_id.into(),
        });
    }

    pub fn fetch_preview(&self, portfolio_id: impl Into<String>) {
        self.send(EngineCommand::FetchPreview {
            portfolio_id: portfolio_id.into(),
        });
    }

    fn send(&self, command: EngineCommand) {
        let _ = self.cmd_tx.send(command);
    }
}

struct Components {
    settings: EngineSettings,
    trigger: Arc<dyn JobTrigger>,
    preview: Arc<dyn PreviewFetcher>,
    sink: Arc<dyn EventSink>,
}

/// The one live channel the engine keeps; dropping it releases the socket.
struct ActiveChannel {
    job_id: String,
    forwarder: JoinHandle<()>,
}

impl Drop for ActiveChannel {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

async fn run_engine(
    components: Components,
    mut cmd_rx: async_mpsc::UnboundedReceiver<EngineCommand>,
) {
    let mut active: Option<ActiveChannel> = None;

    while let Some(command) = cmd_rx.recv().await {
        match command {
            EngineCommand::Trigger { portfolio_id } => {
                let trigger = components.trigger.clone();
                let sink = components.sink.clone();
                tokio::spawn(async move {
                    let event = match trigger.trigger(&portfolio_id).await {
                        Ok(job) => EngineEvent::JobStarted(job),
                        Err(error) => EngineEvent::TriggerFailed {
                            portfolio_id,
                            error,
                        },
                    };
                    sink.emit(event);
                });
            }
            EngineCommand::OpenChannel { job_id } => {
                if let Some(previous) = active.take() {
                    gw_info!("Releasing channel of job {}", previous.job_id);
                }
                let mut channel = LiveChannel::open(&components.settings, &job_id);
                let sink = components.sink.clone();
                let forwarded_job = job_id.clone();
                let forwarder = tokio::spawn(async move {
                    while let Some(signal) = channel.next().await {
                        sink.emit(EngineEvent::Channel {
                            job_id: forwarded_job.clone(),
                            signal,
                        });
                    }
                });
                active = Some(ActiveChannel { job_id, forwarder });
            }
            EngineCommand::CloseChannel { job_id } => {
                if active.as_ref().is_some_and(|channel| channel.job_id == job_id) {
                    gw_info!("Closing channel of job {}", job_id);
                    active = None;
                }
            }
            EngineCommand::FetchPreview { portfolio_id } => {
                let preview = components.preview.clone();
                let sink = components.sink.clone();
                tokio::spawn(async move {
                    let event = match preview.fetch(&portfolio_id).await {
                        Ok(digest) => EngineEvent::PreviewLoaded(digest),
                        Err(error) => EngineEvent::PreviewFailed {
                            portfolio_id,
                            error,
                        },
                    };
                    sink.emit(event);
                });
            }
        }
    }
}
