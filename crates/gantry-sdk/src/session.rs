// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Interactive sessions over upgraded connections.
//!
//! Two session shapes run on top of a `101 Switching Protocols` socket:
//!
//! - **Exec** ([`run_exec_session`]): framed output from the connection is
//!   demultiplexed into an output and an error sink while caller input is
//!   copied onto the connection unmodified. The session ends when either
//!   direction finishes.
//! - **Log tail** ([`spawn_log_tail`]): the connection bytes are unframed
//!   and pumped into an in-process pipe the caller reads as a live
//!   [`LogStream`].
//!
//! Neither shape applies a timeout; a session runs until the peer closes,
//! a sink goes away, or the caller cancels.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use gantry_protocol::{FrameError, demux};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::sync::{mpsc, oneshot};

/// Buffer between the log-tail pump and the stream handed to the caller.
const LOG_BUFFER_SIZE: usize = 8 * 1024;

/// Errors an interactive session can end with.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A raw copy pump failed.
    #[error("copy data: {0}")]
    Copy(#[from] io::Error),

    /// The output demultiplexer failed.
    #[error("demultiplex output: {0}")]
    Frame(#[from] FrameError),
}

impl SessionError {
    /// True when the failure is one end closing its pipe, which a session
    /// treats as a normal end.
    fn is_closed_pipe(&self) -> bool {
        match self {
            SessionError::Copy(e) => e.kind() == io::ErrorKind::BrokenPipe,
            SessionError::Frame(FrameError::Io(e)) => e.kind() == io::ErrorKind::BrokenPipe,
            SessionError::Frame(_) => false,
        }
    }
}

/// Session half of the exec readiness gate.
///
/// When present, the session signals readiness after the connection is up
/// and blocks until the caller acknowledges before pumping any data. The
/// window lets the caller finish setup, such as an initial terminal
/// resize, while the stream already exists.
#[derive(Debug)]
pub struct ReadyHandshake {
    ready: oneshot::Sender<()>,
    resume: oneshot::Receiver<()>,
}

impl ReadyHandshake {
    /// Signal ready and wait for the ack. A caller that dropped its half
    /// does not hold the session up.
    async fn wait(self) {
        if self.ready.send(()).is_ok() {
            let _ = self.resume.await;
        }
    }
}

/// Caller half of the exec readiness gate.
#[derive(Debug)]
pub struct ReadyWaiter {
    ready: oneshot::Receiver<()>,
    resume: oneshot::Sender<()>,
}

impl ReadyWaiter {
    /// Resolves once the session connection is up and the pumps are about
    /// to start.
    pub async fn ready(&mut self) {
        let _ = (&mut self.ready).await;
    }

    /// Release the session.
    pub fn resume(self) {
        let _ = self.resume.send(());
    }
}

/// Create the two halves of an exec readiness gate.
pub fn ready_handshake() -> (ReadyHandshake, ReadyWaiter) {
    let (ready_tx, ready_rx) = oneshot::channel();
    let (resume_tx, resume_rx) = oneshot::channel();
    (
        ReadyHandshake {
            ready: ready_tx,
            resume: resume_rx,
        },
        ReadyWaiter {
            ready: ready_rx,
            resume: resume_tx,
        },
    )
}

/// Streams wired into an exec session.
#[derive(Debug)]
pub struct ExecSessionOpts<I, O, E> {
    input: I,
    output: O,
    error: E,
    ready: Option<ReadyHandshake>,
}

impl<I, O, E> ExecSessionOpts<I, O, E> {
    /// Wire an input source and output/error sinks into the session.
    pub fn new(input: I, output: O, error: E) -> Self {
        Self {
            input,
            output,
            error,
            ready: None,
        }
    }

    /// Gate the pumps behind a readiness handshake.
    pub fn with_ready(mut self, ready: ReadyHandshake) -> Self {
        self.ready = Some(ready);
        self
    }
}

/// Run an exec session over an upgraded connection.
///
/// Framed output from `conn` is demultiplexed into the output and error
/// sinks while the input stream is copied onto `conn` unmodified. The
/// first pump to finish decides the session result and the other one is
/// torn down with its connection half. A broken pipe on either pump is a
/// normal end.
pub async fn run_exec_session<C, I, O, E>(
    conn: C,
    opts: ExecSessionOpts<I, O, E>,
) -> Result<(), SessionError>
where
    C: AsyncRead + AsyncWrite + Send + 'static,
    I: AsyncRead + Unpin + Send + 'static,
    O: AsyncWrite + Unpin + Send + 'static,
    E: AsyncWrite + Unpin + Send + 'static,
{
    let ExecSessionOpts {
        mut input,
        mut output,
        mut error,
        ready,
    } = opts;

    if let Some(gate) = ready {
        gate.wait().await;
    }

    let (mut read_half, mut write_half) = tokio::io::split(conn);
    let (finished, mut first) = mpsc::channel::<Result<(), SessionError>>(2);

    let demux_done = finished.clone();
    let demux_pump = tokio::spawn(async move {
        let result = demux(&mut read_half, &mut output, &mut error)
            .await
            .map(|_| ())
            .map_err(SessionError::from);
        let _ = demux_done.send(result).await;
    });

    let input_pump = tokio::spawn(async move {
        let result = tokio::io::copy(&mut input, &mut write_half)
            .await
            .map(|_| ())
            .map_err(SessionError::from);
        let _ = finished.send(result).await;
    });

    let result = first.recv().await.unwrap_or(Ok(()));
    demux_pump.abort();
    input_pump.abort();

    match result {
        Err(e) if e.is_closed_pipe() => Ok(()),
        other => other,
    }
}

/// Live log stream returned by [`spawn_log_tail`].
///
/// Reads yield raw bytes as the platform sends them and end with EOF when
/// the session is over. Dropping the stream winds the session down on its
/// next write.
#[derive(Debug)]
pub struct LogStream {
    inner: DuplexStream,
}

impl AsyncRead for LogStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

/// Start pumping raw bytes from an upgraded connection into a stream the
/// caller reads at its own pace.
///
/// The pump ends when the connection closes, the stream is dropped, or the
/// caller fires `exit`. The terminal outcome (clean end, or a wrapped copy
/// error) is delivered once on `done` when provided; on an exit signal the
/// pump stops immediately, `done` is dropped without a result, and both
/// the connection and the stream's write side are closed.
pub fn spawn_log_tail<C>(
    conn: C,
    exit: oneshot::Receiver<()>,
    done: Option<oneshot::Sender<Result<(), SessionError>>>,
) -> LogStream
where
    C: AsyncRead + Unpin + Send + 'static,
{
    let (stream, mut sink) = tokio::io::duplex(LOG_BUFFER_SIZE);
    let mut conn = conn;

    tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = exit_signalled(exit) => {}
            result = pump_logs(&mut conn, &mut sink) => {
                if let Some(done) = done {
                    let _ = done.send(result);
                }
            }
        }
    });

    LogStream { inner: stream }
}

/// Copy until the connection closes. EOF and a dropped [`LogStream`] end
/// the pump silently.
async fn pump_logs<R, W>(conn: &mut R, sink: &mut W) -> Result<(), SessionError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    match tokio::io::copy(conn, sink).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        Err(e) => Err(SessionError::Copy(e)),
    }
}

/// Resolves only on an explicit exit signal. A dropped sender never
/// cancels the tail.
async fn exit_signalled(exit: oneshot::Receiver<()>) {
    match exit.await {
        Ok(()) => {}
        Err(_) => std::future::pending().await,
    }
}
