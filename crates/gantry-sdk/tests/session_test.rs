// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Interactive session tests for gantry-sdk.
//!
//! The upgraded connection is simulated with in-memory duplex pipes; the
//! "server" side writes the platform's wire bytes directly.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::oneshot;

use gantry_protocol::{Frame, FrameError, write_frame};
use gantry_sdk::{ExecSessionOpts, SessionError, ready_handshake, run_exec_session, spawn_log_tail};

// ============================================================================
// Exec sessions
// ============================================================================

#[tokio::test]
async fn test_exec_session_demuxes_output_channels() {
    let (conn_client, mut conn_server) = tokio::io::duplex(1024);
    let (_in_w, in_r) = tokio::io::duplex(64);
    let (out_w, mut out_r) = tokio::io::duplex(1024);
    let (err_w, mut err_r) = tokio::io::duplex(1024);

    let session = tokio::spawn(run_exec_session(
        conn_client,
        ExecSessionOpts::new(in_r, out_w, err_w),
    ));

    write_frame(&mut conn_server, &Frame::primary(&b"hello from the container\n"[..]))
        .await
        .unwrap();
    write_frame(&mut conn_server, &Frame::error(&b"warning: low disk\n"[..]))
        .await
        .unwrap();
    drop(conn_server);

    session.await.unwrap().unwrap();

    let mut out = Vec::new();
    out_r.read_to_end(&mut out).await.unwrap();
    assert_eq!(out, b"hello from the container\n");

    let mut err = Vec::new();
    err_r.read_to_end(&mut err).await.unwrap();
    assert_eq!(err, b"warning: low disk\n");
}

#[tokio::test]
async fn test_exec_session_forwards_input_unframed() {
    let (conn_client, mut conn_server) = tokio::io::duplex(1024);
    let (mut in_w, in_r) = tokio::io::duplex(64);
    let (out_w, _out_r) = tokio::io::duplex(64);
    let (err_w, _err_r) = tokio::io::duplex(64);

    let session = tokio::spawn(run_exec_session(
        conn_client,
        ExecSessionOpts::new(in_r, out_w, err_w),
    ));

    in_w.write_all(b"ls -la\n").await.unwrap();

    let mut buf = [0u8; 7];
    conn_server.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ls -la\n");

    drop(conn_server);
    session.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_exec_session_reports_malformed_stream() {
    let (conn_client, mut conn_server) = tokio::io::duplex(1024);
    let (_in_w, in_r) = tokio::io::duplex(64);
    let (out_w, _out_r) = tokio::io::duplex(64);
    let (err_w, _err_r) = tokio::io::duplex(64);

    let session = tokio::spawn(run_exec_session(
        conn_client,
        ExecSessionOpts::new(in_r, out_w, err_w),
    ));

    // Header with an unknown channel tag
    conn_server
        .write_all(&[9, 0, 0, 0, 0, 0, 0, 2, b'h', b'i'])
        .await
        .unwrap();

    let err = session.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        SessionError::Frame(FrameError::MalformedFrame(9))
    ));
}

#[tokio::test]
async fn test_exec_session_detached_sink_ends_cleanly() {
    let (conn_client, mut conn_server) = tokio::io::duplex(1024);
    let (_in_w, in_r) = tokio::io::duplex(64);
    let (out_w, out_r) = tokio::io::duplex(64);
    let (err_w, _err_r) = tokio::io::duplex(64);

    let session = tokio::spawn(run_exec_session(
        conn_client,
        ExecSessionOpts::new(in_r, out_w, err_w),
    ));

    // The caller walks away from the output before data arrives
    drop(out_r);
    write_frame(&mut conn_server, &Frame::primary(&b"anyone there?\n"[..]))
        .await
        .unwrap();

    // A closed local pipe is a detach, not a session failure
    session.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_exec_session_waits_for_ready_gate() {
    let (conn_client, mut conn_server) = tokio::io::duplex(1024);
    let (_in_w, in_r) = tokio::io::duplex(64);
    let (out_w, mut out_r) = tokio::io::duplex(1024);
    let (err_w, _err_r) = tokio::io::duplex(64);

    let (handshake, mut waiter) = ready_handshake();
    let session = tokio::spawn(run_exec_session(
        conn_client,
        ExecSessionOpts::new(in_r, out_w, err_w).with_ready(handshake),
    ));

    waiter.ready().await;

    // Gated: nothing is pumped yet even though the server already wrote
    write_frame(&mut conn_server, &Frame::primary(&b"early\n"[..]))
        .await
        .unwrap();
    let mut probe = [0u8; 1];
    let idle = tokio::time::timeout(Duration::from_millis(50), out_r.read(&mut probe)).await;
    assert!(idle.is_err());

    waiter.resume();

    let mut buf = [0u8; 6];
    out_r.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"early\n");

    drop(conn_server);
    session.await.unwrap().unwrap();
}

// ============================================================================
// Log tailing
// ============================================================================

#[tokio::test]
async fn test_log_tail_streams_until_server_close() {
    let (conn_client, mut conn_server) = tokio::io::duplex(1024);
    let (_exit_tx, exit_rx) = oneshot::channel();
    let (done_tx, done_rx) = oneshot::channel();

    let mut stream = spawn_log_tail(conn_client, exit_rx, Some(done_tx));

    conn_server.write_all(b"log line 1\n").await.unwrap();
    conn_server.write_all(b"log line 2\n").await.unwrap();
    drop(conn_server);

    let mut all = Vec::new();
    stream.read_to_end(&mut all).await.unwrap();
    assert_eq!(all, b"log line 1\nlog line 2\n");

    // Clean end of stream is a successful session
    assert!(matches!(done_rx.await, Ok(Ok(()))));
}

#[tokio::test]
async fn test_log_tail_exit_signal_detaches_silently() {
    let (conn_client, _conn_server) = tokio::io::duplex(1024);
    let (exit_tx, exit_rx) = oneshot::channel();
    let (done_tx, done_rx) = oneshot::channel();

    let mut stream = spawn_log_tail(conn_client, exit_rx, Some(done_tx));

    exit_tx.send(()).unwrap();

    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.unwrap();

    // Exit delivers no session result at all
    assert!(done_rx.await.is_err());
}

#[tokio::test]
async fn test_log_tail_survives_dropped_exit_sender() {
    let (conn_client, mut conn_server) = tokio::io::duplex(1024);
    let (exit_tx, exit_rx) = oneshot::channel::<()>();
    let (done_tx, done_rx) = oneshot::channel();

    drop(exit_tx);
    let mut stream = spawn_log_tail(conn_client, exit_rx, Some(done_tx));

    conn_server.write_all(b"still streaming\n").await.unwrap();
    drop(conn_server);

    let mut all = Vec::new();
    stream.read_to_end(&mut all).await.unwrap();
    assert_eq!(all, b"still streaming\n");
    assert!(matches!(done_rx.await, Ok(Ok(()))));
}

#[tokio::test]
async fn test_log_tail_dropped_reader_is_clean() {
    let (conn_client, mut conn_server) = tokio::io::duplex(1024);
    let (_exit_tx, exit_rx) = oneshot::channel();
    let (done_tx, done_rx) = oneshot::channel();

    let stream = spawn_log_tail(conn_client, exit_rx, Some(done_tx));
    drop(stream);

    conn_server.write_all(b"nobody listening\n").await.unwrap();

    assert!(matches!(done_rx.await, Ok(Ok(()))));
}

#[tokio::test]
async fn test_log_tail_without_result_channel() {
    let (conn_client, mut conn_server) = tokio::io::duplex(1024);
    let (_exit_tx, exit_rx) = oneshot::channel();

    let mut stream = spawn_log_tail(conn_client, exit_rx, None);

    conn_server.write_all(b"fire and forget\n").await.unwrap();
    drop(conn_server);

    let mut all = Vec::new();
    stream.read_to_end(&mut all).await.unwrap();
    assert_eq!(all, b"fire and forget\n");
}
