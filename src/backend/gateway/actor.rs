//! Per-connection actor
//!
//! The socket is split in two. A writer task drains the connection's
//! outbound channel into the sink; the reader loop hands text frames to the
//! [`Session`] strictly in arrival order. A ping task closes connections
//! that stop answering.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, timeout};

use crate::backend::gateway::session::{Session, SessionKind};
use crate::backend::server::state::AppState;
use crate::shared::event::OutboundFrame;

const PING_INTERVAL: Duration = Duration::from_secs(30);
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn run_connection(socket: WebSocket, state: AppState, kind: SessionKind) {
    let (sink, mut stream) = socket.split();
    let (frames_tx, frames_rx) = mpsc::unbounded_channel::<OutboundFrame>();
    let (control_tx, control_rx) = mpsc::unbounded_channel::<Message>();

    let writer_handle = tokio::spawn(writer_task(sink, frames_rx, control_rx));

    let session = match Session::open(state, frames_tx, kind).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(kind = ?kind, error = %e, "[Gateway] Failed to open session");
            let _ = control_tx.send(Message::Close(Some(CloseFrame {
                code: 1011,
                reason: "session setup failed".into(),
            })));
            let _ = writer_handle.await;
            return;
        }
    };

    let (pong_tx, mut pong_rx) = watch::channel(());
    let ping_tx = control_tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(PING_INTERVAL);
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;
            arm_pong(&mut pong_rx);
            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                break;
            }

            if !pong_after_ping(&mut pong_rx, PONG_TIMEOUT).await {
                tracing::warn!("[Gateway] Pong timeout, closing connection");
                let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                    code: 1001,
                    reason: "pong timeout".into(),
                })));
                break;
            }
        }
    });

    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                // Failures were already reported on the socket
                let _ = session.handle_frame(text.as_str()).await;
            }
            Some(Ok(Message::Binary(_))) => {
                tracing::debug!(connection_id = %session.connection(), "[Gateway] Ignoring binary frame");
            }
            Some(Ok(Message::Pong(_))) => {
                pong_tx.send_replace(());
            }
            Some(Ok(Message::Ping(_))) => {
                // axum answers pings itself
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Err(e)) => {
                tracing::debug!(connection_id = %session.connection(), error = %e, "[Gateway] Socket error");
                break;
            }
        }
    }

    ping_handle.abort();
    session.close().await;
    writer_handle.abort();
}

/// Forget pongs received before the ping about to be sent
fn arm_pong(pongs: &mut watch::Receiver<()>) {
    pongs.mark_unchanged();
}

/// Whether a pong arrived since `arm_pong`, waiting at most `wait`
async fn pong_after_ping(pongs: &mut watch::Receiver<()>, wait: Duration) -> bool {
    matches!(timeout(wait, pongs.changed()).await, Ok(Ok(())))
}

async fn writer_task(
    mut sink: SplitSink<WebSocket, Message>,
    mut frames: mpsc::UnboundedReceiver<OutboundFrame>,
    mut control: mpsc::UnboundedReceiver<Message>,
) {
    loop {
        tokio::select! {
            Some(frame) = frames.recv() => {
                let text = match frame.to_text() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(event = %frame.event, error = %e, "[Gateway] Failed to encode frame");
                        continue;
                    }
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            Some(message) = control.recv() => {
                let closing = matches!(message, Message::Close(_));
                if sink.send(message).await.is_err() || closing {
                    break;
                }
            }
            else => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_stale_pongs_do_not_answer_a_new_ping() {
        let (pong_tx, mut pong_rx) = watch::channel(());
        for _ in 0..5 {
            pong_tx.send_replace(());
        }

        arm_pong(&mut pong_rx);
        assert!(!pong_after_ping(&mut pong_rx, PONG_TIMEOUT).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pong_after_ping_is_seen() {
        let (pong_tx, mut pong_rx) = watch::channel(());

        arm_pong(&mut pong_rx);
        pong_tx.send_replace(());
        assert!(pong_after_ping(&mut pong_rx, PONG_TIMEOUT).await);

        // Each ping needs its own pong
        arm_pong(&mut pong_rx);
        assert!(!pong_after_ping(&mut pong_rx, PONG_TIMEOUT).await);
    }
}
