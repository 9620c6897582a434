use super::store::Inbox;
use crate::messages::{Message, Response, TabId};
use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

pub const DEFAULT_BRIDGE_PORT: u16 = 9876;

/// One frame from a page, tagged with the tab it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub tab_id: Option<TabId>,
    pub message: Message,
}

/// Local WebSocket front door for the relay inbox. Pages that cannot reach the
/// relay in-process send [`Envelope`]s here and get a [`Response`] frame back.
pub struct BrowserBridge {
    inbox: Inbox,
    port: u16,
}

impl BrowserBridge {
    pub fn new(inbox: Inbox, port: u16) -> Self {
        Self { inbox, port }
    }

    /// Binds the listener and serves connections in the background. Returns the bound
    /// address, which differs from the configured one when port 0 was requested.
    pub async fn start(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("127.0.0.1:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind WebSocket server on {}", addr))?;
        let local = listener.local_addr()?;

        info!("Browser bridge listening on ws://{}", local);

        let inbox = self.inbox.clone();

        tokio::spawn(async move {
            while let Ok((stream, peer)) = listener.accept().await {
                debug!("Page connected from: {}", peer);
                let inbox = inbox.clone();

                tokio::spawn(async move {
                    match accept_async(stream).await {
                        Ok(ws_stream) => {
                            let (mut write, mut read) = ws_stream.split();

                            while let Some(msg_result) = read.next().await {
                                let msg = match msg_result {
                                    Ok(msg) => msg,
                                    Err(e) => {
                                        debug!("WebSocket error: {}", e);
                                        break;
                                    }
                                };
                                if msg.is_close() {
                                    break;
                                }
                                let Ok(text) = msg.to_text() else {
                                    continue;
                                };
                                let envelope = match serde_json::from_str::<Envelope>(text) {
                                    Ok(envelope) => envelope,
                                    Err(e) => {
                                        debug!("Ignoring malformed bridge frame: {}", e);
                                        continue;
                                    }
                                };

                                let response = inbox.handle(envelope.tab_id, envelope.message).await;
                                if let Err(e) = write.send(encode(&response)).await {
                                    debug!("Failed to answer page: {}", e);
                                    break;
                                }
                            }
                            debug!("Page disconnected");
                        }
                        Err(e) => {
                            error!("WebSocket handshake failed: {}", e);
                        }
                    }
                });
            }
        });

        Ok(local)
    }
}

fn encode(response: &Response) -> WsMessage {
    let body = serde_json::to_string(response).unwrap_or_else(|_| r#"{"ok":false}"#.to_string());
    WsMessage::Text(body.into())
}
