//! Low-level SMTP stream handling.

use crate::error::{Error, Result};
use rustls::pki_types::ServerName;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

/// SMTP stream (plain TCP or TLS).
#[derive(Debug)]
pub enum SmtpStream {
    /// Plain TCP connection.
    Plain(BufReader<TcpStream>),
    /// TLS-encrypted connection (boxed to reduce enum size).
    Tls(Box<BufReader<tokio_rustls::client::TlsStream<TcpStream>>>),
}

impl SmtpStream {
    /// Reads one CRLF-terminated line, with the terminator trimmed.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
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

    /// Upgrades a plain stream to TLS (STARTTLS).
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is already TLS or the handshake fails.
    pub async fn upgrade_to_tls(self, hostname: &str) -> Result<Self> {
        let tcp = match self {
            Self::Plain(reader) => reader.into_inner(),
            Self::Tls(_) => return Err(Error::Protocol("stream is already TLS".into())),
        };

        let connector = create_tls_connector();
        let server_name = ServerName::try_from(hostname.to_string())?;
        let tls = connector.connect(server_name, tcp).await?;
        Ok(Self::Tls(Box::new(BufReader::new(tls))))
    }

    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

/// Connects over plain TCP (for STARTTLS or testing).
///
/// # Errors
///
/// Returns an error if the connection fails.
pub async fn connect(hostname: &str, port: u16) -> Result<SmtpStream> {
    let addr = format!("{hostname}:{port}");
    let tcp = TcpStream::connect(&addr).await?;
    Ok(SmtpStream::Plain(BufReader::new(tcp)))
}

/// Connects with implicit TLS (port 465 convention).
///
/// # Errors
///
/// Returns an error if the connection or TLS handshake fails.
pub async fn connect_tls(hostname: &str, port: u16) -> Result<SmtpStream> {
    let addr = format!("{hostname}:{port}");
    let tcp = TcpStream::connect(&addr).await?;

    let connector = create_tls_connector();
    let server_name = ServerName::try_from(hostname.to_string())?;
    let tls = connector.connect(server_name, tcp).await?;
    Ok(SmtpStream::Tls(Box::new(BufReader::new(tls))))
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
