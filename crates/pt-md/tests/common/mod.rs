//! In-process WebSocket server used by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;

/// Outbound command for one accepted connection.
pub enum Push {
    Text(String),
    /// Drop the socket without a close handshake.
    Drop,
}

pub struct MockServer {
    pub url: String,
    accepted: Arc<AtomicUsize>,
    /// Text frames received from clients, tagged with the connection index.
    inbound: mpsc::UnboundedReceiver<(usize, String)>,
    /// One push handle per accepted connection, in accept order.
    conns: mpsc::UnboundedReceiver<mpsc::UnboundedSender<Push>>,
    shutdown: watch::Sender<bool>,
}

impl MockServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let (conns_tx, conns) = mpsc::unbounded_channel();
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            loop {
                let tcp = tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    r = listener.accept() => match r {
                        Ok((tcp, _)) => tcp,
                        Err(_) => break,
                    },
                };
                let Ok(ws) = tokio_tungstenite::accept_async(tcp).await else {
                    continue;
                };
                let index = counter.fetch_add(1, Ordering::SeqCst);
                let (push_tx, push_rx) = mpsc::unbounded_channel();
                let _ = conns_tx.send(push_tx);
                tokio::spawn(serve(ws, index, push_rx, inbound_tx.clone(), shutdown_rx.clone()));
            }
        });

        Self { url: format!("ws://{addr}"), accepted, inbound, conns, shutdown }
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Next text frame any client sent.
    pub async fn next_frame(&mut self) -> (usize, String) {
        tokio::time::timeout(Duration::from_secs(5), self.inbound.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("server gone")
    }

    /// Push handle of the next accepted connection.
    pub async fn next_conn(&mut self) -> mpsc::UnboundedSender<Push> {
        tokio::time::timeout(Duration::from_secs(5), self.conns.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("server gone")
    }

    /// Stop listening and drop every open socket.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}

async fn serve(
    ws: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    index: usize,
    mut push_rx: mpsc::UnboundedReceiver<Push>,
    inbound_tx: mpsc::UnboundedSender<(usize, String)>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let (mut sink, mut stream) = ws.split();
    let mut pushing = true;
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            push = push_rx.recv(), if pushing => match push {
                Some(Push::Text(text)) => {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Some(Push::Drop) => break,
                // Handle dropped by the test; keep the socket open.
                None => pushing = false,
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let _ = inbound_tx.send((index, text.to_string()));
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}
