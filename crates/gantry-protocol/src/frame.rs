// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Wire format for two-channel stream framing.
//!
//! Interactive endpoints (container exec, realtime logs) multiplex two
//! logical output streams over one connection. Each frame is:
//! - 1 byte: channel tag
//! - 3 bytes: reserved (zero)
//! - 4 bytes: payload length (big-endian)
//! - N bytes: payload
//!
//! [`demux`] is the receive side: it copies a framed connection into two
//! sinks until the peer closes the stream. The send side ([`write_frame`])
//! is used by servers and tests; client input travels unframed.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Frame header size (1 byte tag + 3 bytes reserved + 4 bytes length)
pub const HEADER_SIZE: usize = 8;

/// Initial capacity of the demux read buffer.
///
/// The buffer grows on demand when a frame is larger; frames carry no
/// size cap.
pub const INITIAL_BUFFER_SIZE: usize = 32 * 1024 + HEADER_SIZE + 1;

/// Logical channel carried by a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamChannel {
    /// Primary output (tags 0 and 1 on the wire)
    Primary,
    /// Error output (tag 2 on the wire)
    Error,
}

impl StreamChannel {
    /// Wire tag written when encoding a frame on this channel
    pub fn tag(&self) -> u8 {
        match self {
            StreamChannel::Primary => 1,
            StreamChannel::Error => 2,
        }
    }
}

impl TryFrom<u8> for StreamChannel {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, <Self as TryFrom<u8>>::Error> {
        match value {
            0 | 1 => Ok(StreamChannel::Primary),
            2 => Ok(StreamChannel::Error),
            _ => Err(FrameError::MalformedFrame(value)),
        }
    }
}

/// Errors that can occur during frame encoding/demultiplexing
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame header: unknown channel tag {0}")]
    MalformedFrame(u8),

    #[error("short write: sink accepted {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A framed chunk of channel output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub channel: StreamChannel,
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame on the given channel
    pub fn new(channel: StreamChannel, payload: impl Into<Bytes>) -> Self {
        Self {
            channel,
            payload: payload.into(),
        }
    }

    /// Create a new primary-output frame
    pub fn primary(payload: impl Into<Bytes>) -> Self {
        Self::new(StreamChannel::Primary, payload)
    }

    /// Create a new error-output frame
    pub fn error(payload: impl Into<Bytes>) -> Self {
        Self::new(StreamChannel::Error, payload)
    }

    /// Encode the frame to bytes for wire transmission
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.payload.len());
        buf.put_u8(self.channel.tag());
        buf.put_bytes(0, 3);
        buf.put_u32(self.payload.len() as u32);
        buf.put(self.payload.clone());
        buf.freeze()
    }
}

/// Write a frame to an async writer
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    frame: &Frame,
) -> Result<(), FrameError> {
    let encoded = frame.encode();
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}

/// Demultiplex a framed stream into two sinks until the source is exhausted.
///
/// Frames tagged 0 or 1 go to `primary`, frames tagged 2 to `error`, in
/// wire arrival order. Returns the total payload bytes dispatched; header
/// bytes are not counted.
///
/// A source that ends mid-header or mid-payload is a clean end of stream:
/// complete frames already dispatched stay valid and their byte count is
/// returned. An unknown channel tag fails with
/// [`FrameError::MalformedFrame`] before any byte of the offending frame
/// reaches a sink. A sink that stops accepting bytes mid-frame fails with
/// [`FrameError::ShortWrite`].
pub async fn demux<R, P, E>(src: &mut R, primary: &mut P, error: &mut E) -> Result<u64, FrameError>
where
    R: AsyncRead + Unpin,
    P: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUFFER_SIZE);
    let mut written: u64 = 0;

    loop {
        // Fill up to a complete header; end of stream before that is a
        // clean end.
        while buf.len() < HEADER_SIZE {
            if src.read_buf(&mut buf).await? == 0 {
                return Ok(written);
            }
        }

        let channel = StreamChannel::try_from(buf[0])?;
        let frame_size = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize;
        let frame_end = HEADER_SIZE + frame_size;

        // Extend the buffer when the frame will not fit.
        if buf.capacity() < frame_end {
            buf.reserve(frame_end - buf.len());
        }

        // Fill up to the end of the frame; end of stream before that is a
        // clean end.
        while buf.len() < frame_end {
            if src.read_buf(&mut buf).await? == 0 {
                return Ok(written);
            }
        }

        let payload = &buf[HEADER_SIZE..frame_end];
        let accepted = match channel {
            StreamChannel::Primary => write_payload(primary, payload).await?,
            StreamChannel::Error => write_payload(error, payload).await?,
        };
        if accepted != frame_size {
            return Err(FrameError::ShortWrite {
                written: accepted,
                expected: frame_size,
            });
        }
        written += frame_size as u64;

        // Drop the consumed frame, keeping any bytes of the next one.
        buf.advance(frame_end);
    }
}

/// Write a full payload, reporting how many bytes the sink accepted.
///
/// `write_all` folds a stalled sink into an opaque `WriteZero` error; the
/// short-write check needs the count, so the loop is manual.
async fn write_payload<W: AsyncWrite + Unpin>(
    sink: &mut W,
    payload: &[u8],
) -> Result<usize, FrameError> {
    let mut accepted = 0;
    while accepted < payload.len() {
        let n = sink.write(&payload[accepted..]).await?;
        if n == 0 {
            break;
        }
        accepted += n;
    }
    sink.flush().await?;
    Ok(accepted)
}
