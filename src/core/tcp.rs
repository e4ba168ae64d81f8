use crate::domain::model::ConnectRetry;
use crate::utils::error::{Result, SumoError};
use std::net::{IpAddr, SocketAddr};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// TCP connection to a SUMO process listening on `--remote-port`.
///
/// Nothing is connected until [`SumoTcpConnection::connect`] is called.
#[derive(Debug)]
pub struct SumoTcpConnection {
    address: SocketAddr,
    stream: Option<TcpStream>,
}

impl SumoTcpConnection {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            address: SocketAddr::new(host, port),
            stream: None,
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub fn stream(&mut self) -> Result<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| SumoError::ConnectionError {
                message: format!("no open socket to {}", self.address),
            })
    }

    /// Single connection attempt.
    pub async fn connect(&mut self) -> Result<()> {
        let stream = TcpStream::connect(self.address)
            .await
            .map_err(|source| SumoError::SocketError {
                address: self.address,
                source,
            })?;
        stream.set_nodelay(true)?;

        tracing::debug!("Connected to SUMO at {}", self.address);
        self.stream = Some(stream);
        Ok(())
    }

    pub async fn connect_with_retry(&mut self, retry: &ConnectRetry) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self.connect().await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < retry.attempts => {
                    tracing::debug!(
                        "Connection attempt {}/{} to {} failed: {}",
                        attempt,
                        retry.attempts,
                        self.address,
                        e
                    );
                    attempt += 1;
                    tokio::time::sleep(retry.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await?;
            tracing::debug!("Closed SUMO connection to {}", self.address);
        }
        Ok(())
    }
}
