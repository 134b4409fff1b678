// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw TCP print backend (JetDirect, port 9100).
//
// Open a socket and stream the file.  There is no negotiation, so the
// printer must understand the document format natively and page ranges
// cannot be applied.  Copies are produced by sending the document again.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info};

use printdesk_core::error::{PrintdeskError, Result};

use crate::printer::{PrintOptions, Printer};

/// Default raw TCP port (HP JetDirect).
pub const RAW_PORT: u16 = 9100;

const CHUNK_SIZE: usize = 8192;

#[derive(Debug, Clone)]
pub struct RawSocketPrinter {
    timeout: Duration,
}

impl RawSocketPrinter {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

/// `host` or `host:port` from `PRINTER_NAME`.
pub fn printer_addr(printer: &str) -> String {
    let printer = printer.trim();
    let has_port = printer
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && !host.ends_with(':') && port.parse::<u16>().is_ok());
    if has_port {
        printer.to_owned()
    } else {
        format!("{printer}:{RAW_PORT}")
    }
}

async fn send_raw(addr: &str, document: &[u8], timeout: Duration) -> Result<()> {
    let mut stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| {
            PrintdeskError::PrintFailure(format!(
                "Raw TCP connection to {addr} timed out after {}s",
                timeout.as_secs()
            ))
        })?
        .map_err(|e| PrintdeskError::PrintFailure(format!("Raw TCP connect to {addr}: {e}")))?;

    let mut sent = 0;
    for chunk in document.chunks(CHUNK_SIZE) {
        tokio::time::timeout(timeout, stream.write_all(chunk))
            .await
            .map_err(|_| PrintdeskError::PrintFailure(format!("Raw TCP send to {addr} timed out")))?
            .map_err(|e| {
                PrintdeskError::PrintFailure(format!("Raw TCP send failed at byte {sent}: {e}"))
            })?;
        sent += chunk.len();
        debug!(sent, total = document.len(), "raw TCP progress");
    }

    stream
        .flush()
        .await
        .map_err(|e| PrintdeskError::PrintFailure(format!("Raw TCP flush: {e}")))?;
    stream
        .shutdown()
        .await
        .map_err(|e| PrintdeskError::PrintFailure(format!("Raw TCP shutdown: {e}")))?;
    Ok(())
}

#[async_trait]
impl Printer for RawSocketPrinter {
    async fn print(&self, path: &Path, options: &PrintOptions) -> Result<()> {
        let Some(printer) = options.printer.as_deref().filter(|p| !p.trim().is_empty()) else {
            return Err(PrintdeskError::PrintFailure(
                "raw backend needs PRINTER_NAME set to host[:port]".into(),
            ));
        };
        if !options.page_range.is_all() {
            return Err(PrintdeskError::PrintFailure(format!(
                "raw backend cannot print page range {}",
                options.page_range
            )));
        }

        let document = tokio::fs::read(path)
            .await
            .map_err(|e| PrintdeskError::PrintFailure(format!("{}: {e}", path.display())))?;
        let addr = printer_addr(printer);
        info!(addr = %addr, bytes = document.len(), copies = options.copies.get(), "sending via raw TCP");

        for copy in 1..=options.copies.get() {
            send_raw(&addr, &document, self.timeout).await?;
            debug!(copy, "raw TCP copy sent");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "raw"
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use printdesk_core::types::{Copies, PageRange};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    use super::*;

    #[test]
    fn default_port_is_added() {
        assert_eq!(printer_addr("10.0.0.5"), "10.0.0.5:9100");
        assert_eq!(printer_addr("10.0.0.5:9101"), "10.0.0.5:9101");
        assert_eq!(printer_addr(" laser.local "), "laser.local:9100");
    }

    #[tokio::test]
    async fn sends_document_once_per_copy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut received = Vec::new();
            for _ in 0..2 {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = Vec::new();
                socket.read_to_end(&mut buf).await.unwrap();
                received.push(buf);
            }
            received
        });

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"%!PS-Adobe-3.0\nshowpage\n").unwrap();
        let options = PrintOptions {
            copies: Copies::new(2).unwrap(),
            page_range: PageRange::All,
            printer: Some(addr.to_string()),
        };
        RawSocketPrinter::new(Duration::from_secs(5))
            .print(file.path(), &options)
            .await
            .unwrap();

        let received = server.await.unwrap();
        assert_eq!(received.len(), 2);
        assert!(received.iter().all(|r| r == b"%!PS-Adobe-3.0\nshowpage\n"));
    }

    #[tokio::test]
    async fn page_ranges_are_refused() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let options = PrintOptions {
            copies: Copies::default(),
            page_range: PageRange::parse(Some("1-2")).unwrap(),
            printer: Some("127.0.0.1:9".into()),
        };
        let err = RawSocketPrinter::new(Duration::from_secs(1))
            .print(file.path(), &options)
            .await
            .unwrap_err();
        assert!(matches!(err, PrintdeskError::PrintFailure(_)));
    }
}
