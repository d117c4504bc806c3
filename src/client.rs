//! Requester side: one connection, one request, one response.
//!
//! Every step is fatal to the session on failure; nothing is written to disk
//! unless the full payload arrived and its length matched the header.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::protocol::{Request, ResponseHeader, Status};
use crate::wire::{self, READ_TIMEOUT};

/// Requester configuration.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Responder hostname or IP address.
    pub host: String,
    /// Responder port.
    pub port: u16,
    /// File to request; also the name the payload is saved under.
    pub filename: String,
    /// Directory the fetched file is written into.
    pub output_dir: PathBuf,
    /// Budget for each receive call.
    pub read_timeout: Duration,
}

impl FetchConfig {
    pub fn new(host: impl Into<String>, port: u16, filename: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            filename: filename.into(),
            output_dir: PathBuf::from("."),
            read_timeout: READ_TIMEOUT,
        }
    }
}

/// How a completed session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// File saved. `total_bytes` counts the response header plus payload.
    Saved {
        payload_bytes: usize,
        total_bytes: usize,
    },
    /// The responder answered status 0; nothing was written.
    NotFound,
}

/// Session failures specific to the requester.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("no response received")]
    NoResponse,

    #[error("response declared {expected} payload bytes but {received} arrived")]
    PayloadLengthMismatch { expected: usize, received: usize },
}

/// Fetch one file from a responder and save it under the requested name.
pub async fn fetch(config: &FetchConfig) -> Result<FetchOutcome> {
    // Filename size is validated before any connection is made.
    let request = Request::new(config.filename.clone())?;

    let mut stream = timeout(
        config.read_timeout,
        TcpStream::connect((config.host.as_str(), config.port)),
    )
    .await
    .map_err(|_| anyhow!("timed out connecting to {}:{}", config.host, config.port))?
    .with_context(|| format!("connecting to {}:{}", config.host, config.port))?;
    debug!(host = %config.host, port = config.port, "connected");

    let payload = match exchange(&mut stream, &request, config.read_timeout).await? {
        Some(payload) => payload,
        None => return Ok(FetchOutcome::NotFound),
    };

    let dest = config.output_dir.join(&config.filename);
    tokio::fs::write(&dest, &payload)
        .await
        .with_context(|| format!("writing {}", dest.display()))?;
    debug!(file = %dest.display(), bytes = payload.len(), "payload saved");

    Ok(FetchOutcome::Saved {
        payload_bytes: payload.len(),
        total_bytes: ResponseHeader::SIZE + payload.len(),
    })
}

/// Drive the wire exchange: send the request, validate the response header,
/// assemble the payload. Returns `None` on a not-found response.
async fn exchange<S>(
    stream: &mut S,
    request: &Request,
    limit: Duration,
) -> Result<Option<Vec<u8>>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    wire::write_all(stream, &request.encode())
        .await
        .context("sending request")?;

    let header_bytes = match wire::read_exact(stream, ResponseHeader::SIZE, limit).await {
        Ok(bytes) => bytes,
        // A silent close before any header byte means the responder dropped
        // the request, most likely as malformed.
        Err(err) if err.is_empty_close() => return Err(FetchError::NoResponse.into()),
        Err(err) => return Err(anyhow::Error::new(err).context("reading response header")),
    };
    let header = ResponseHeader::decode(&header_bytes).context("validating response header")?;

    if header.status == Status::NotFound {
        return Ok(None);
    }

    let expected = header.data_len as usize;
    let payload = wire::read_limited(stream, expected, limit)
        .await
        .context("receiving payload")?;
    if payload.len() != expected {
        return Err(FetchError::PayloadLengthMismatch {
            expected,
            received: payload.len(),
        }
        .into());
    }
    Ok(Some(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Response;
    use bytes::Bytes;
    use tokio::io::{duplex, AsyncWriteExt};

    const TEST_TIMEOUT: Duration = Duration::from_millis(200);

    async fn drive(response: Vec<u8>) -> Result<Option<Vec<u8>>> {
        let (mut near, mut far) = duplex(4096);
        let peer = tokio::spawn(async move {
            // Drain the request, then play back the canned response bytes.
            let header = wire::read_exact(&mut far, 5, TEST_TIMEOUT).await.unwrap();
            let name_len = u16::from_be_bytes([header[3], header[4]]) as usize;
            wire::read_exact(&mut far, name_len, TEST_TIMEOUT).await.unwrap();
            far.write_all(&response).await.unwrap();
            far.shutdown().await.unwrap();
        });

        let request = Request::new("greeting.txt").unwrap();
        let result = exchange(&mut near, &request, TEST_TIMEOUT).await;
        peer.await.unwrap();
        result
    }

    #[tokio::test]
    async fn exchange_returns_payload() {
        let response = Response::found(Bytes::from_static(b"hello"))
            .encode()
            .unwrap()
            .to_vec();
        let payload = drive(response).await.unwrap();
        assert_eq!(payload.as_deref(), Some(&b"hello"[..]));
    }

    #[tokio::test]
    async fn exchange_maps_status_zero_to_none() {
        let response = Response::not_found().encode().unwrap().to_vec();
        let payload = drive(response).await.unwrap();
        assert_eq!(payload, None);
    }

    #[tokio::test]
    async fn exchange_reports_no_response_on_silent_close() {
        let err = drive(Vec::new()).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<FetchError>(),
            Some(&FetchError::NoResponse)
        );
    }

    #[tokio::test]
    async fn exchange_rejects_short_payload() {
        // Header declares 10 bytes; only 4 arrive before the close.
        let mut response = vec![0x49, 0x7E, 0x02, 0x01, 0x00, 0x00, 0x00, 0x0A];
        response.extend_from_slice(b"spam");

        let err = drive(response).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<FetchError>(),
            Some(&FetchError::PayloadLengthMismatch {
                expected: 10,
                received: 4,
            })
        );
    }

    #[tokio::test]
    async fn exchange_rejects_corrupt_header() {
        let mut response = Response::not_found().encode().unwrap().to_vec();
        response[0] = 0x00;
        let err = drive(response).await.unwrap_err();
        assert!(err
            .downcast_ref::<crate::protocol::ProtocolError>()
            .is_some());
    }
}
