//! Responder side: accept loop and per-connection session.
//!
//! Each accepted connection runs one request/response exchange and is then
//! closed, never reused. A malformed request is answered with silence - the
//! connection closes without a response frame - and the failure stays scoped
//! to that connection; the loop keeps accepting.

use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpSocket};
use tracing::{debug, info, warn};

use crate::protocol::{RequestHeader, Response};
use crate::wire::{self, READ_TIMEOUT};

/// Responder configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind_addr: SocketAddr,
    /// Directory requested filenames are resolved under.
    pub root: PathBuf,
    /// Pending-connection backlog handed to `listen`.
    pub backlog: u32,
    /// Run each session to completion before accepting the next connection,
    /// instead of spawning a task per connection.
    pub serial: bool,
    /// Budget for each receive call.
    pub read_timeout: Duration,
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr, root: impl Into<PathBuf>) -> Self {
        Self {
            bind_addr,
            root: root.into(),
            backlog: 1,
            serial: false,
            read_timeout: READ_TIMEOUT,
        }
    }
}

/// A bound responder, ready to accept connections.
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
}

impl Server {
    /// Bind the listening socket. Going through `TcpSocket` rather than
    /// `TcpListener::bind` keeps the backlog configurable.
    pub fn bind(config: ServerConfig) -> Result<Self> {
        let socket = if config.bind_addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .context("creating listening socket")?;
        socket.set_reuseaddr(true).context("setting SO_REUSEADDR")?;
        socket
            .bind(config.bind_addr)
            .with_context(|| format!("binding {}", config.bind_addr))?;
        let listener = socket
            .listen(config.backlog)
            .with_context(|| format!("listening on {}", config.bind_addr))?;
        Ok(Self { listener, config })
    }

    /// The bound address; useful when binding port 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("reading listener address")
    }

    /// Accept connections until the accept call itself fails. Session
    /// failures are logged and do not stop the loop.
    pub async fn run(self) -> Result<()> {
        loop {
            let (mut stream, peer) = self
                .listener
                .accept()
                .await
                .context("accepting connection")?;
            debug!(%peer, "connection accepted");

            if self.config.serial {
                if let Err(err) =
                    handle_connection(&mut stream, &self.config.root, self.config.read_timeout)
                        .await
                {
                    warn!(%peer, error = %format!("{err:#}"), "session failed");
                }
            } else {
                let root = self.config.root.clone();
                let read_timeout = self.config.read_timeout;
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(&mut stream, &root, read_timeout).await {
                        warn!(%peer, error = %format!("{err:#}"), "session failed");
                    }
                });
            }
        }
    }
}

/// One request/response exchange.
///
/// Failure anywhere before the response is built means the connection closes
/// without a single byte sent back.
async fn handle_connection<S>(stream: &mut S, root: &Path, limit: Duration) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let header_bytes = wire::read_exact(stream, RequestHeader::SIZE, limit)
        .await
        .context("reading request header")?;
    let header = RequestHeader::decode(&header_bytes).context("validating request header")?;

    let name_bytes = wire::read_exact(stream, header.filename_len as usize, limit)
        .await
        .context("reading filename")?;
    let filename = String::from_utf8(name_bytes).context("filename is not valid UTF-8")?;
    debug!(file = %filename, "request received");

    let response = match resolve(root, &filename).await {
        Some(data) => Response::found(data),
        None => Response::not_found(),
    };
    let encoded = response.encode().context("encoding response")?;
    wire::write_all(stream, &encoded)
        .await
        .context("sending response")?;

    match response.payload() {
        Some(_) => info!(file = %filename, bytes = encoded.len(), "file sent"),
        None => info!(file = %filename, "file absent, status-only response sent"),
    }
    Ok(())
}

/// Read the requested file under `root`. Every failure mode - unsafe name,
/// missing file, unreadable file - folds into `None`; the requester only
/// ever learns found or not-found.
async fn resolve(root: &Path, name: &str) -> Option<Vec<u8>> {
    if !plain_filename(name) {
        warn!(file = %name, "rejected unsafe filename");
        return None;
    }
    match tokio::fs::read(root.join(name)).await {
        Ok(data) => Some(data),
        Err(err) => {
            debug!(file = %name, %err, "could not read requested file");
            None
        }
    }
}

/// A requested name must be a bare file name: relative, one path component,
/// no parent references. Anything else would escape the served directory.
fn plain_filename(name: &str) -> bool {
    let path = Path::new(name);
    if path.is_absolute() {
        return false;
    }
    let mut components = path.components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
