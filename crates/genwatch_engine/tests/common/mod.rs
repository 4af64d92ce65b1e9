#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::SinkExt;
use genwatch_engine::{EngineSettings, ReconnectPolicy};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

/// What the scripted server does on one accepted connection.
#[derive(Debug, Clone)]
pub enum Step {
    Send(String),
    /// Send a close frame and hang up.
    Close,
    /// Keep the connection open until the client leaves.
    Hold,
}

pub fn send(text: &str) -> Step {
    Step::Send(text.to_string())
}

/// A WebSocket server that plays one script per accepted connection.
/// Connections past the last script are dropped right after the handshake.
pub struct ScriptedServer {
    pub base: String,
    connections: Arc<AtomicUsize>,
    paths: Arc<Mutex<Vec<String>>>,
}

impl ScriptedServer {
    pub async fn start(scripts: Vec<Vec<Step>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let connections = Arc::new(AtomicUsize::new(0));
        let paths = Arc::new(Mutex::new(Vec::new()));

        let counter = connections.clone();
        let seen_paths = paths.clone();
        tokio::spawn(async move {
            let mut scripts = scripts.into_iter();
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let steps = scripts.next().unwrap_or_default();
                let seen_paths = seen_paths.clone();
                tokio::spawn(async move {
                    let record = move |request: &Request, response: Response| {
                        seen_paths
                            .lock()
                            .unwrap()
                            .push(request.uri().path().to_string());
                        Ok::<Response, ErrorResponse>(response)
                    };
                    let Ok(mut socket) = tokio_tungstenite::accept_hdr_async(stream, record).await
                    else {
                        return;
                    };
                    for step in steps {
                        match step {
                            Step::Send(text) => {
                                if socket.send(Message::Text(text)).await.is_err() {
                                    return;
                                }
                            }
                            Step::Close => {
                                let _ = socket.close(None).await;
                                return;
                            }
                            Step::Hold => {
                                use futures_util::StreamExt;
                                while let Some(Ok(_)) = socket.next().await {}
                                return;
                            }
                        }
                    }
                });
            }
        });

        Self {
            base: format!("http://{addr}"),
            connections,
            paths,
        }
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }

    pub fn settings(&self, max_retries: u32) -> EngineSettings {
        fast_settings(&self.base, max_retries)
    }

    pub fn ws_base(&self) -> String {
        self.base.replacen("http://", "ws://", 1)
    }
}

/// Settings with millisecond reconnect delays.
pub fn fast_settings(api_base: &str, max_retries: u32) -> EngineSettings {
    EngineSettings {
        reconnect: ReconnectPolicy {
            max_retries,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
            stable_after: Duration::from_secs(1),
        },
        ..EngineSettings::with_api_base(api_base)
    }
}

pub fn event_json(status: &str, progress: u32, step: &str) -> String {
    serde_json::json!({ "job_id": "job1", "status": status, "progress": progress, "step": step })
        .to_string()
}
