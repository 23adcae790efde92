//! Line-terminated SCPI transport over TCP.
//!
//! Connection health is verified on connect with `*IDN?` (non-empty reply
//! required) followed by `*CLS` and a 200 ms settle. Every command gets a
//! 50 ms post-send settle, matching what the supply needs between writes.

use eol_common::error::{EolError, EolResult};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::debug;

/// Settle after `*CLS` during the connect handshake.
const CLS_SETTLE: Duration = Duration::from_millis(200);
/// Settle after every command.
const POST_SEND_SETTLE: Duration = Duration::from_millis(50);
/// Deadline for one query reply line.
const QUERY_TIMEOUT: Duration = Duration::from_secs(2);

/// One SCPI connection.
#[derive(Debug)]
pub struct ScpiClient {
    stream: Option<BufStream<TcpStream>>,
    device: &'static str,
    peer: String,
    identity: Option<String>,
}

impl ScpiClient {
    /// Connect and verify the instrument answers `*IDN?`.
    ///
    /// # Errors
    ///
    /// `EolError::Connection` on TCP failure or an empty identification
    /// reply; `EolError::Timeout` if the connect or the reply exceeds
    /// `connect_timeout` / the query deadline.
    pub async fn connect(
        device: &'static str,
        host: &str,
        port: u16,
        connect_timeout: Duration,
    ) -> EolResult<Self> {
        let peer = format!("{host}:{port}");
        let tcp = timeout(connect_timeout, TcpStream::connect(&peer))
            .await
            .map_err(|_| EolError::timeout(device, "connect", connect_timeout))?
            .map_err(|e| EolError::connection(device, format!("connect {peer}: {e}")))?;

        let mut client = Self {
            stream: Some(BufStream::new(tcp)),
            device,
            peer,
            identity: None,
        };

        let identity = client.query("*IDN?").await?;
        if identity.is_empty() {
            client.disconnect().await;
            return Err(EolError::connection(
                device,
                "device identification failed: empty *IDN? reply",
            ));
        }
        debug!("{device} identified as '{identity}'");
        client.identity = Some(identity);

        client.send_command("*CLS").await?;
        sleep(CLS_SETTLE).await;

        Ok(client)
    }

    /// Close the connection. Idempotent.
    pub async fn disconnect(&mut self) {
        if self.stream.take().is_some() {
            debug!("closed SCPI connection to {}", self.peer);
        }
    }

    /// Whether the connection is open.
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Identification string captured at connect.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    fn stream_mut(&mut self) -> EolResult<&mut BufStream<TcpStream>> {
        let device = self.device;
        self.stream
            .as_mut()
            .ok_or_else(|| EolError::connection(device, "SCPI connection not open"))
    }

    async fn write_line(&mut self, line: &str) -> EolResult<()> {
        let device = self.device;
        let stream = self.stream_mut()?;
        stream
            .write_all(line.as_bytes())
            .await
            .map_err(|e| EolError::connection(device, format!("write: {e}")))?;
        if !line.ends_with('\n') {
            stream
                .write_all(b"\n")
                .await
                .map_err(|e| EolError::connection(device, format!("write: {e}")))?;
        }
        stream
            .flush()
            .await
            .map_err(|e| EolError::connection(device, format!("flush: {e}")))?;
        Ok(())
    }

    /// Send a command line (terminator appended if absent).
    pub async fn send_command(&mut self, line: &str) -> EolResult<()> {
        debug!("{} <- {}", self.device, line.trim_end());
        self.write_line(line).await?;
        sleep(POST_SEND_SETTLE).await;
        Ok(())
    }

    /// Send a query and read one `\n`-terminated reply line, trimmed.
    pub async fn query(&mut self, line: &str) -> EolResult<String> {
        debug!("{} <- {}", self.device, line.trim_end());
        self.write_line(line).await?;

        let device = self.device;
        let stream = self.stream_mut()?;
        let mut reply = String::new();
        timeout(QUERY_TIMEOUT, stream.read_line(&mut reply))
            .await
            .map_err(|_| EolError::timeout(device, "query", QUERY_TIMEOUT))?
            .map_err(|e| EolError::connection(device, format!("read: {e}")))?;

        sleep(POST_SEND_SETTLE).await;

        let reply = reply.trim().to_string();
        debug!("{} -> {}", self.device, reply);
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Minimal SCPI endpoint: answers *IDN? and echoes MEAS queries.
    async fn spawn_stub(identity: &'static str) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut buf = vec![0u8; 256];
            loop {
                let n = match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => n,
                };
                let line = String::from_utf8_lossy(&buf[..n]);
                for command in line.split('\n').filter(|l| !l.trim().is_empty()) {
                    let reply = match command.trim() {
                        "*IDN?" => Some(identity),
                        "MEAS:VOLT?" => Some("18.00"),
                        "MEAS:ALL?" => Some("18.00,2.50"),
                        _ => None,
                    };
                    if let Some(reply) = reply {
                        let _ = socket.write_all(reply.as_bytes()).await;
                        let _ = socket.write_all(b"\n").await;
                    }
                }
            }
        });

        addr
    }

    #[tokio::test]
    async fn connect_verifies_identity_and_queries_work() {
        let addr = spawn_stub("ODA,EX-PRO,1.0").await;
        let mut client = ScpiClient::connect(
            "power",
            &addr.ip().to_string(),
            addr.port(),
            Duration::from_secs(2),
        )
        .await
        .expect("connect");

        assert!(client.is_connected());
        assert_eq!(client.identity(), Some("ODA,EX-PRO,1.0"));

        let volts = client.query("MEAS:VOLT?").await.expect("query");
        assert_eq!(volts, "18.00");

        client.send_command("OUTP ON").await.expect("command");
        client.disconnect().await;
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn empty_identity_fails_connect() {
        let addr = spawn_stub("").await;
        let result = ScpiClient::connect(
            "power",
            &addr.ip().to_string(),
            addr.port(),
            Duration::from_secs(2),
        )
        .await;
        // The stub replies with an empty line, which the connect rejects.
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn connect_to_dead_port_is_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let result =
            ScpiClient::connect("power", &addr.ip().to_string(), addr.port(), Duration::from_millis(500))
                .await;
        assert!(result.is_err());
    }
}
