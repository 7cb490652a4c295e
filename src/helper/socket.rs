use std::{
    io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::UnixStream,
};
use tracing::trace;

use super::{HelperRequest, HelperResponse, HelperTransport};
use crate::error::{Error, Result};

/// Where the installed helper listens
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/tonic-helper.sock";

/// Talks to the helper over a Unix domain socket, one connection per request
#[derive(Debug, Clone)]
pub struct UnixSocketTransport {
    path: PathBuf,
}

impl UnixSocketTransport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for UnixSocketTransport {
    fn default() -> Self {
        Self::new(DEFAULT_SOCKET_PATH)
    }
}

#[async_trait]
impl HelperTransport for UnixSocketTransport {
    async fn call(&self, request: &HelperRequest) -> Result<HelperResponse> {
        let stream = UnixStream::connect(&self.path).await.map_err(|err| match err.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => {
                Error::unavailable(format!("helper not running at {}", self.path.display()))
            },
            io::ErrorKind::PermissionDenied => {
                Error::permission_denied(format!("no access to {}", self.path.display()))
            },
            _ => Error::Io(err),
        })?;

        let (read_half, mut write_half) = stream.into_split();
        let mut line = serde_json::to_vec(request)?;
        line.push(b'\n');
        write_half.write_all(&line).await?;
        write_half.shutdown().await?;
        trace!(?request, "Sent helper request");

        let mut answer = String::new();
        BufReader::new(read_half).read_line(&mut answer).await?;
        if answer.trim().is_empty() {
            return Err(Error::invalid_data("helper closed the connection without answering"));
        }
        serde_json::from_str(answer.trim()).map_err(|err| Error::invalid_data(format!("bad helper answer: {}", err)))
    }
}
