//! # OutputMux: multiplexed child-process output.
//!
//! Many children, one consumer, no thread-per-pipe. Each registered pipe
//! gets a small reader task that forwards 4 KiB chunks into one bounded
//! channel; the fleet supervisor drains that channel from its single
//! driving task.
//!
//! ```text
//!  node A stdout ──► reader task ──┐
//!  node A stderr ──► reader task ──┤
//!  node B stdout ──► reader task ──┼──► mpsc ──► Supervisor (one owner)
//!  node B stderr ──► reader task ──┘
//! ```
//!
//! ## Rules
//! - A zero-length read means EOF: the reader sends [`PipePayload::Eof`] and
//!   its task ends — registration removal is automatic.
//! - Delivery order between different pipes is arbitrary; per-pipe order is
//!   FIFO.
//! - The channel is bounded; readers apply backpressure to chatty children
//!   rather than buffering without limit.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

/// Which pipe of the child produced an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// Payload of one pipe event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipePayload {
    /// A chunk of raw output bytes.
    Data(Vec<u8>),
    /// End of stream; the pipe's reader has deregistered itself.
    Eof,
}

/// One readiness event from a registered pipe.
#[derive(Clone, Debug)]
pub struct PipeEvent {
    /// Name of the node that owns the pipe.
    pub node: Arc<str>,
    /// Which of the node's pipes fired.
    pub stream: StreamKind,
    /// Data or EOF.
    pub payload: PipePayload,
}

/// Read buffer size per chunk.
const READ_CHUNK: usize = 4096;

/// Cloneable registration handle; held by node supervisors.
#[derive(Clone)]
pub struct MuxHandle {
    tx: mpsc::Sender<PipeEvent>,
}

impl MuxHandle {
    /// Registers a pipe: spawns a reader task that forwards chunks until EOF
    /// (or a read error, which is treated as EOF — the child is gone).
    pub fn watch<R>(&self, node: Arc<str>, stream: StreamKind, mut pipe: R)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let mut buf = [0u8; READ_CHUNK];
            loop {
                match pipe.read(&mut buf).await {
                    Ok(0) | Err(_) => {
                        let _ = tx
                            .send(PipeEvent {
                                node,
                                stream,
                                payload: PipePayload::Eof,
                            })
                            .await;
                        break;
                    }
                    Ok(n) => {
                        let ev = PipeEvent {
                            node: Arc::clone(&node),
                            stream,
                            payload: PipePayload::Data(buf[..n].to_vec()),
                        };
                        if tx.send(ev).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }
}

/// Single-consumer multiplexer over all registered pipes.
pub struct OutputMux {
    tx: mpsc::Sender<PipeEvent>,
    rx: mpsc::Receiver<PipeEvent>,
}

impl OutputMux {
    /// Creates a multiplexer with the given channel capacity (clamped >= 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self { tx, rx }
    }

    /// Returns a registration handle for node supervisors.
    pub fn handle(&self) -> MuxHandle {
        MuxHandle {
            tx: self.tx.clone(),
        }
    }

    /// Receives the next pipe event; pending until one arrives.
    ///
    /// Never returns `None` in practice: the mux itself keeps a sender
    /// alive, so the channel cannot close while the mux exists.
    pub async fn recv(&mut self) -> Option<PipeEvent> {
        self.rx.recv().await
    }

    /// Receives the next pipe event, waiting at most `timeout`.
    ///
    /// Returns `None` on timeout — the caller regains control once per
    /// iteration, as an event loop should.
    pub async fn recv_timeout(&mut self, timeout: std::time::Duration) -> Option<PipeEvent> {
        tokio::time::timeout(timeout, self.rx.recv())
            .await
            .ok()
            .flatten()
    }
}
