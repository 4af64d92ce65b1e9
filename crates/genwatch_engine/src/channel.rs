use std::time::Duration;

use futures_util::StreamExt;
use genwatch_core::decode_event;
use genwatch_logging::{gw_debug, gw_info, gw_warn};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::{ChannelSignal, EngineSettings, ReconnectPolicy};

/// Signals buffered between the socket reader and the consumer. A full queue
/// pauses reading from the socket.
const QUEUE_DEPTH: usize = 64;

const CLOSED_EARLY: &str = "connection closed before the job finished";

/// Live event stream of one generation job.
pub struct LiveChannel;

impl LiveChannel {
    /// Opens the stream for `job_id` on the current tokio runtime.
    ///
    /// The returned handle owns the connection: dropping it (or calling
    /// [`ChannelHandle::close`]) releases the socket.
    pub fn open(settings: &EngineSettings, job_id: &str) -> ChannelHandle {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let cancel = CancellationToken::new();
        let target = settings
            .generation_stream_url(job_id)
            .map(|url| url.to_string())
            .map_err(|err| err.message);

        tokio::spawn(run_channel(
            target,
            job_id.to_string(),
            settings.connect_timeout,
            settings.reconnect,
            tx,
            cancel.clone(),
        ));

        ChannelHandle {
            job_id: job_id.to_string(),
            rx,
            cancel,
        }
    }
}

/// Consumer side of a [`LiveChannel`]: a lazy, non-restartable sequence of signals.
pub struct ChannelHandle {
    job_id: String,
    rx: mpsc::Receiver<ChannelSignal>,
    cancel: CancellationToken,
}

impl ChannelHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Next signal, or `None` once the channel is exhausted or closed.
    pub async fn next(&mut self) -> Option<ChannelSignal> {
        self.rx.recv().await
    }

    /// Stops listening. Signals already queued can still be drained.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum SessionOutcome {
    /// Stream ended after a terminal event.
    Finished,
    /// Transport failed. `stable` is set when the session delivered events
    /// and stayed up for the policy's `stable_after`.
    Dropped { reason: String, stable: bool },
    /// Nobody is listening anymore.
    ConsumerGone,
}

async fn run_channel(
    target: Result<String, String>,
    job_id: String,
    connect_timeout: Duration,
    policy: ReconnectPolicy,
    tx: mpsc::Sender<ChannelSignal>,
    cancel: CancellationToken,
) {
    let target = match target {
        Ok(target) => target,
        Err(reason) => {
            gw_warn!("Job {}: cannot build stream url: {}", job_id, reason);
            let _ = tx.send(ChannelSignal::Failed { reason }).await;
            return;
        }
    };

    let mut failures = 0u32;
    loop {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                gw_debug!("Job {}: channel closed by consumer", job_id);
                return;
            }
            outcome = stream_session(&target, &job_id, connect_timeout, &policy, &tx) => outcome,
        };

        match outcome {
            SessionOutcome::Finished => {
                gw_info!("Job {}: stream finished", job_id);
                let _ = tx.send(ChannelSignal::Closed).await;
                return;
            }
            SessionOutcome::ConsumerGone => return,
            SessionOutcome::Dropped { reason, stable } => {
                if stable {
                    failures = 0;
                }
                failures += 1;
                if failures > policy.max_retries {
                    gw_warn!(
                        "Job {}: stream lost after {} attempt(s): {}",
                        job_id,
                        failures,
                        reason
                    );
                    let _ = tx.send(ChannelSignal::Failed { reason }).await;
                    return;
                }

                let delay = policy.delay_for(failures);
                gw_warn!(
                    "Job {}: stream dropped ({}), reconnecting in {:?} ({}/{})",
                    job_id,
                    reason,
                    delay,
                    failures,
                    policy.max_retries
                );
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

async fn stream_session(
    target: &str,
    job_id: &str,
    connect_timeout: Duration,
    policy: &ReconnectPolicy,
    tx: &mpsc::Sender<ChannelSignal>,
) -> SessionOutcome {
    let connect = tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(target));
    let mut socket = match connect.await {
        Ok(Ok((socket, _response))) => socket,
        Ok(Err(err)) => {
            return SessionOutcome::Dropped {
                reason: err.to_string(),
                stable: false,
            }
        }
        Err(_) => {
            return SessionOutcome::Dropped {
                reason: format!("handshake timed out after {connect_timeout:?}"),
                stable: false,
            }
        }
    };
    gw_info!("Job {}: connected to {}", job_id, target);
    let connected_at = Instant::now();
    // Delivered events plus `stable_after` of uptime reset the retry budget.
    let stable = |delivered: bool| delivered && connected_at.elapsed() >= policy.stable_after;

    let mut delivered = false;
    let mut last_terminal = false;
    while let Some(frame) = socket.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    gw_debug!("Job {}: dropping non-UTF-8 binary frame", job_id);
                    continue;
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(err) => {
                return SessionOutcome::Dropped {
                    reason: err.to_string(),
                    stable: stable(delivered),
                }
            }
        };

        let event = match decode_event(&text) {
            Ok(event) => event,
            Err(err) => {
                gw_debug!("Job {}: dropping frame: {}", job_id, err);
                continue;
            }
        };
        last_terminal = event.status.is_terminal();
        delivered = true;
        if tx.send(ChannelSignal::Event(event)).await.is_err() {
            return SessionOutcome::ConsumerGone;
        }
    }

    if last_terminal {
        SessionOutcome::Finished
    } else {
        SessionOutcome::Dropped {
            reason: CLOSED_EARLY.to_string(),
            stable: stable(delivered),
        }
    }
}
