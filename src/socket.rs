//! Optional push channel for room state.
//!
//! The socket only hints that something changed; the phase sync still treats
//! the polled snapshot as the truth. Losing the connection is never fatal.

use futures::{SinkExt, StreamExt};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::protocol::{RoomStatePush, SocketFrame};
use crate::types::{PlayerName, RoomCode};

/// Pushes buffered before the consumer falls behind and drops them
const PUSH_BUFFER: usize = 16;

const LEAVE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum SocketError {
    #[error("Socket connection failed: {0}")]
    Connect(String),

    #[error("Socket closed")]
    Closed,
}

pub type SocketResult<T> = Result<T, SocketError>;

/// A joined room channel. Dropping it closes the connection.
pub struct RoomSocket {
    code: RoomCode,
    name: PlayerName,
    outgoing: mpsc::Sender<SocketFrame>,
    task: Option<JoinHandle<()>>,
}

impl RoomSocket {
    /// Connect to `url`, join `code` as `name`, and return the socket with a
    /// receiver of `room:state` pushes for that room
    pub async fn connect(
        url: &str,
        code: &str,
        name: &str,
    ) -> SocketResult<(Self, mpsc::Receiver<RoomStatePush>)> {
        let (stream, _) = connect_async(url)
            .await
            .map_err(|e| SocketError::Connect(e.to_string()))?;
        let (mut write, mut read) = stream.split();

        let code = code.to_uppercase();
        let join = SocketFrame::Join {
            code: code.clone(),
            name: name.to_string(),
        };
        let text = serde_json::to_string(&join).map_err(|e| SocketError::Connect(e.to_string()))?;
        write
            .send(Message::Text(text))
            .await
            .map_err(|e| SocketError::Connect(e.to_string()))?;
        tracing::info!("Socket joined room {} as {}", code, name);

        let (outgoing, mut outgoing_rx) = mpsc::channel::<SocketFrame>(4);
        let (pushes, pushes_rx) = mpsc::channel(PUSH_BUFFER);
        let room = code.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    frame = outgoing_rx.recv() => {
                        let Some(frame) = frame else { break };
                        let Ok(text) = serde_json::to_string(&frame) else { continue };
                        if write.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                        if matches!(frame, SocketFrame::Leave { .. }) {
                            let _ = write.close().await;
                            break;
                        }
                    }
                    msg = read.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                match serde_json::from_str::<SocketFrame>(&text) {
                                    Ok(SocketFrame::State(push)) if push.code.eq_ignore_ascii_case(&room) => {
                                        if pushes.try_send(push).is_err() {
                                            tracing::debug!("Dropping room:state push, consumer busy");
                                        }
                                    }
                                    Ok(_) => {}
                                    Err(e) => tracing::debug!("Ignoring socket frame: {}", e),
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                tracing::info!("Socket for room {} closed by server", room);
                                break;
                            }
                            Some(Err(e)) => {
                                tracing::warn!("Socket error for room {}: {}", room, e);
                                break;
                            }
                            Some(Ok(_)) => {}
                        }
                    }
                }
            }
        });

        Ok((
            Self {
                code,
                name: name.to_string(),
                outgoing,
                task: Some(task),
            },
            pushes_rx,
        ))
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn is_connected(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Send `room:leave` and wait for the connection to close
    pub async fn leave(mut self) -> SocketResult<()> {
        let frame = SocketFrame::Leave {
            code: self.code.clone(),
            name: self.name.clone(),
        };
        self.outgoing
            .send(frame)
            .await
            .map_err(|_| SocketError::Closed)?;

        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(LEAVE_TIMEOUT, &mut task).await.is_err() {
                tracing::warn!("Socket for room {} did not close in time", self.code);
                task.abort();
            }
        }
        tracing::info!("Socket left room {}", self.code);
        Ok(())
    }
}

impl Drop for RoomSocket {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
