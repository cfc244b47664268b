//! Stream types for IMAP connections.

use crate::error::{Error, Result};
use rustls::pki_types::ServerName;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

/// IMAP stream (plain TCP or TLS), buffered for line and literal reads.
#[derive(Debug)]
pub enum ImapStream {
    /// Plaintext TCP stream.
    Plain(BufReader<TcpStream>),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<BufReader<tokio_rustls::client::TlsStream<TcpStream>>>),
}

impl ImapStream {
    /// Reads one CRLF-terminated line, with the terminator trimmed.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the peer closed the stream.
    pub async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let n = match self {
            Self::Plain(reader) => reader.read_line(&mut line).await?,
            Self::Tls(reader) => reader.read_line(&mut line).await?,
        };
        if n == 0 {
            return Err(Error::Protocol("connection closed by server".into()));
        }
        Ok(line.trim_end().to_string())
    }

    /// Reads exactly `len` bytes (an IMAP literal).
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub async fn read_exact(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        match self {
            Self::Plain(reader) => reader.read_exact(&mut buf).await?,
            Self::Tls(reader) => reader.read_exact(&mut buf).await?,
        };
        Ok(buf)
    }

    /// Writes data to the stream and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Self::Plain(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await?;
            }
            Self::Tls(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await?;
            }
        }
        Ok(())
    }

    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

/// Connects to a server with TLS from the start (port 993 convention).
///
/// # Errors
///
/// Returns an error if the connection or TLS handshake fails.
pub async fn connect_tls(host: &str, port: u16) -> Result<ImapStream> {
    let addr = format!("{host}:{port}");
    let tcp = TcpStream::connect(&addr).await?;

    let connector = create_tls_connector();
    let server_name = ServerName::try_from(host.to_string())?;
    let tls = connector.connect(server_name, tcp).await?;

    Ok(ImapStream::Tls(Box::new(BufReader::new(tls))))
}

/// Connects to a server without TLS (for testing).
///
/// # Errors
///
/// Returns an error if the connection fails.
pub async fn connect_plain(host: &str, port: u16) -> Result<ImapStream> {
    let addr = format!("{host}:{port}");
    let tcp = TcpStream::connect(&addr).await?;
    Ok(ImapStream::Plain(BufReader::new(tcp)))
}

/// Creates a TLS connector backed by the webpki root store.
fn create_tls_connector() -> TlsConnector {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}
