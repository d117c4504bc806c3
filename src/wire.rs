//! Byte-stream assembly for frames.
//!
//! TCP gives stream semantics, not message semantics: a single receive may
//! return fewer bytes than asked for and a single send may accept fewer than
//! offered. The helpers here loop until the frame boundary is satisfied, and
//! fail loudly instead of handing back a short buffer.

use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

/// Timeout applied to every receive call in this protocol.
pub const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Receive buffer size for payload assembly.
const RECV_CHUNK: usize = 4096;

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("read timed out with {received} of {expected} bytes")]
    ReadTimeout { received: usize, expected: usize },

    #[error("connection closed with {received} of {expected} bytes")]
    ConnectionClosed { received: usize, expected: usize },

    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    #[error("write failed: {0}")]
    Write(#[source] io::Error),
}

impl WireError {
    /// True when the peer closed the stream before sending anything at all.
    pub fn is_empty_close(&self) -> bool {
        matches!(self, Self::ConnectionClosed { received: 0, .. })
    }
}

/// Read exactly `n` bytes, accumulating across receives.
///
/// The timeout bounds each individual receive call, so a peer that keeps
/// trickling bytes stays alive while a silent one does not. Returns
/// [`WireError::ConnectionClosed`] on EOF short of `n`.
pub async fn read_exact<R>(conn: &mut R, n: usize, limit: Duration) -> Result<Vec<u8>, WireError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; n];
    let mut filled = 0;
    while filled < n {
        let read = timeout(limit, conn.read(&mut buf[filled..]))
            .await
            .map_err(|_| WireError::ReadTimeout {
                received: filled,
                expected: n,
            })?
            .map_err(WireError::Read)?;
        if read == 0 {
            return Err(WireError::ConnectionClosed {
                received: filled,
                expected: n,
            });
        }
        filled += read;
    }
    Ok(buf)
}

/// Read until the peer closes the stream or `limit_bytes` have accumulated,
/// whichever comes first.
///
/// This is the payload-assembly loop: the caller compares the result's
/// length against the declared length afterwards. EOF is a normal stop here,
/// not an error.
pub async fn read_limited<R>(
    conn: &mut R,
    limit_bytes: usize,
    limit: Duration,
) -> Result<Vec<u8>, WireError>
where
    R: AsyncRead + Unpin,
{
    let mut data = Vec::with_capacity(limit_bytes.min(RECV_CHUNK));
    let mut chunk = [0u8; RECV_CHUNK];
    while data.len() < limit_bytes {
        let want = (limit_bytes - data.len()).min(RECV_CHUNK);
        let read = timeout(limit, conn.read(&mut chunk[..want]))
            .await
            .map_err(|_| WireError::ReadTimeout {
                received: data.len(),
                expected: limit_bytes,
            })?
            .map_err(WireError::Read)?;
        if read == 0 {
            break;
        }
        data.extend_from_slice(&chunk[..read]);
    }
    Ok(data)
}

/// Write the whole buffer, advancing past short sends, then flush.
pub async fn write_all<W>(conn: &mut W, mut buf: &[u8]) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    while !buf.is_empty() {
        let sent = conn.write(buf).await.map_err(WireError::Write)?;
        if sent == 0 {
            return Err(WireError::Write(io::ErrorKind::WriteZero.into()));
        }
        buf = &buf[sent..];
    }
    conn.flush().await.map_err(WireError::Write)
}
