//! Single-shot loopback HTTP listener that captures the OAuth redirect.
//!
//! The server owns an explicit armed/disarmed trigger. The first well-formed
//! request disarms it, gets a short confirmation page, and is handed to the
//! waiting login flow; anything that races in behind it is dropped unanswered.
//! Connections are only accepted while `wait` is being polled, and the socket
//! belongs to the server itself, so dropping the server (or a login future
//! holding it) closes the port immediately.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::error::AuthError;

const CONFIRMATION_BODY: &str = "Login completed for the console client ...";
const MAX_REQUEST_HEAD_BYTES: usize = 16 * 1024;

/// The redirect request as received: its request target, e.g.
/// `/oauth/callback?code=...&state=...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackRequest {
    pub target: String,
}

enum Trigger {
    Armed(oneshot::Sender<CallbackRequest>),
    Disarmed,
}

impl Trigger {
    /// Disarm and hand back the sender if this is the first caller.
    fn take(&mut self) -> Option<oneshot::Sender<CallbackRequest>> {
        match std::mem::replace(self, Trigger::Disarmed) {
            Trigger::Armed(sender) => Some(sender),
            Trigger::Disarmed => None,
        }
    }

    fn is_armed(&self) -> bool {
        matches!(self, Trigger::Armed(_))
    }
}

type SharedTrigger = Arc<Mutex<Trigger>>;

/// A bound loopback listener. Dropping it releases the port.
pub struct LoopbackServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    trigger: SharedTrigger,
    receiver: oneshot::Receiver<CallbackRequest>,
    delivered: bool,
}

impl LoopbackServer {
    /// Bind `addr`. Returns only once the socket is listening, so callers
    /// may open the browser immediately afterwards; connections queue in
    /// the backlog until `wait` starts accepting.
    pub async fn bind(addr: SocketAddr) -> Result<Self, AuthError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| AuthError::ListenerBind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| AuthError::ListenerBind { addr, source })?;

        let (sender, receiver) = oneshot::channel();
        debug!(%local_addr, "callback listener ready");
        Ok(Self {
            listener,
            local_addr,
            trigger: Arc::new(Mutex::new(Trigger::Armed(sender))),
            receiver,
            delivered: false,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Suspend until the redirect arrives, or until `timeout` elapses when
    /// one is given.
    pub async fn wait(&mut self, timeout: Option<Duration>) -> Result<CallbackRequest, AuthError> {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, self.serve())
                .await
                .map_err(|_| AuthError::CallbackTimeout(limit))?,
            None => self.serve().await,
        }
    }

    /// Accept connections until one of them disarms the trigger.
    async fn serve(&mut self) -> Result<CallbackRequest, AuthError> {
        if self.delivered {
            return Err(AuthError::Authorization(
                "callback listener already delivered its redirect".into(),
            ));
        }
        loop {
            tokio::select! {
                received = &mut self.receiver => {
                    self.delivered = true;
                    return received.map_err(|_| {
                        AuthError::Authorization(
                            "callback listener stopped before a redirect arrived".into(),
                        )
                    });
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) if lock(&self.trigger).is_armed() => {
                        debug!(%peer, "callback connection accepted");
                        tokio::spawn(handle_connection(stream, Arc::clone(&self.trigger)));
                    }
                    Ok((_, peer)) => debug!(%peer, "callback already handled; dropping connection"),
                    Err(err) => warn!(error = %err, "callback listener accept failed"),
                },
            }
        }
    }
}

async fn handle_connection(mut stream: TcpStream, trigger: SharedTrigger) {
    let Some(target) = read_request_target(&mut stream).await else {
        return;
    };
    let Some(sender) = lock(&trigger).take() else {
        debug!("ignoring duplicate callback request");
        return;
    };

    if let Err(err) = write_confirmation(&mut stream).await {
        warn!(error = %err, "failed to write callback confirmation");
    }
    let _ = sender.send(CallbackRequest { target });
}

fn lock(trigger: &SharedTrigger) -> std::sync::MutexGuard<'_, Trigger> {
    trigger
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Read until the request line is complete and return its target.
async fn read_request_target(stream: &mut TcpStream) -> Option<String> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    while !buffer.contains(&b'\n') {
        if buffer.len() >= MAX_REQUEST_HEAD_BYTES {
            return None;
        }
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
        }
    }
    parse_request_target(&String::from_utf8_lossy(&buffer))
}

fn parse_request_target(head: &str) -> Option<String> {
    let first_line = head.lines().next()?;
    let mut parts = first_line.split_whitespace();
    let _method = parts.next()?;
    let target = parts.next()?;
    target.starts_with('/').then(|| target.to_string())
}

async fn write_confirmation(stream: &mut TcpStream) -> std::io::Result<()> {
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        CONFIRMATION_BODY.len(),
        CONFIRMATION_BODY
    );
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;
    stream.shutdown().await
}
