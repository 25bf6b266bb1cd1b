//! Streaming downloads with percentage notifications.
//!
//! [`Downloader::open`] hands back a [`DownloadStream`] positioned at the start
//! of the response body. The stream is read directly by the archive extractor,
//! so the payload is never held in memory or on disk as a whole.

use crate::core::cancel::CancelToken;
use crate::core::events::{InstallEvent, InstallObserver};
use crate::core::http::HttpTransport;
use crate::error::{PgkitError, Result};
use std::fmt;
use std::io::{self, Read};

/// With an unknown total, a heartbeat is raised every time this many more bytes arrive.
const HEARTBEAT_BYTES: u64 = 1024 * 1024;

/// Payload of the `io::Error`s a [`DownloadStream`] raises when the transport fails.
#[derive(Debug)]
pub struct TransferFailure {
    message: String,
}

impl fmt::Display for TransferFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TransferFailure {}

/// Payload of the `io::Error` raised when a read finds the cancel token set.
#[derive(Debug)]
pub struct CancelledRead;

impl fmt::Display for CancelledRead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("download cancelled")
    }
}

impl std::error::Error for CancelledRead {}

/// Map an error that came out of reading a [`DownloadStream`] (possibly through a
/// decompressor) to the failure it stands for.
pub fn classify_read_error(error: io::Error) -> PgkitError {
    if let Some(inner) = error.get_ref() {
        if inner.is::<TransferFailure>() {
            return PgkitError::transfer(error.to_string());
        }
        if inner.is::<CancelledRead>() {
            return PgkitError::Cancelled;
        }
    }
    PgkitError::archive(error.to_string())
}

/// Byte accounting for one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSession {
    /// Known only when the response carried a non-zero `Content-Length`.
    pub total: Option<u64>,
    pub transferred: u64,
    last_percent: u8,
}

impl DownloadSession {
    pub fn new(total: Option<u64>) -> Self {
        Self {
            total: total.filter(|t| *t > 0),
            transferred: 0,
            last_percent: 0,
        }
    }

    pub fn percent(&self) -> Option<u8> {
        self.total
            .map(|total| (self.transferred.saturating_mul(100) / total).min(100) as u8)
    }

    /// Account for `bytes` more and return the percentage to report, if it is new.
    fn advance(&mut self, bytes: u64) -> Option<u8> {
        self.transferred += bytes;
        let percent = self.percent()?;
        if percent > self.last_percent {
            self.last_percent = percent;
            Some(percent)
        } else {
            None
        }
    }

    fn is_short(&self) -> bool {
        self.total.is_some_and(|total| self.transferred < total)
    }
}

pub struct Downloader<'a> {
    transport: &'a dyn HttpTransport,
    observer: &'a dyn InstallObserver,
    cancel: CancelToken,
}

impl<'a> Downloader<'a> {
    pub fn new(
        transport: &'a dyn HttpTransport,
        observer: &'a dyn InstallObserver,
        cancel: CancelToken,
    ) -> Self {
        Self {
            transport,
            observer,
            cancel,
        }
    }

    /// Start the transfer. Nothing is handed out if the request itself fails.
    pub fn open(&self, url: &str) -> Result<DownloadStream<'a>> {
        if self.cancel.is_cancelled() {
            return Err(PgkitError::Cancelled);
        }

        let body = self.transport.open(url)?;
        let session = DownloadSession::new(body.content_length);

        self.observer.notify(&InstallEvent::DownloadStarted {
            url: url.to_string(),
            total: session.total,
        });

        Ok(DownloadStream {
            url: url.to_string(),
            reader: body.reader,
            session,
            observer: self.observer,
            cancel: self.cancel.clone(),
            next_heartbeat: HEARTBEAT_BYTES,
            completed: false,
            failure: None,
        })
    }
}

pub struct DownloadStream<'a> {
    url: String,
    reader: Box<dyn Read + Send>,
    session: DownloadSession,
    observer: &'a dyn InstallObserver,
    cancel: CancelToken,
    next_heartbeat: u64,
    completed: bool,
    /// Once set, every later read fails with the same message.
    failure: Option<String>,
}

impl DownloadStream<'_> {
    pub fn session(&self) -> &DownloadSession {
        &self.session
    }

    /// Read whatever the consumer left unread, then report completion.
    pub fn close(mut self) -> Result<u64> {
        io::copy(&mut self, &mut io::sink()).map_err(classify_read_error)?;
        self.finish();
        Ok(self.session.transferred)
    }

    fn record(&mut self, bytes: usize) {
        if let Some(percent) = self.session.advance(bytes as u64) {
            self.observer
                .notify(&InstallEvent::DownloadProgress { percent });
        } else if self.session.total.is_none() && self.session.transferred >= self.next_heartbeat {
            self.next_heartbeat = (self.session.transferred / HEARTBEAT_BYTES + 1) * HEARTBEAT_BYTES;
            self.observer.notify(&InstallEvent::DownloadHeartbeat {
                transferred: self.session.transferred,
            });
        }
    }

    fn finish(&mut self) {
        if !self.completed {
            self.completed = true;
            tracing::debug!(
                "Finished {} after {} bytes",
                self.url,
                self.session.transferred
            );
            self.observer.notify(&InstallEvent::DownloadCompleted {
                transferred: self.session.transferred,
            });
        }
    }

    fn fail(&mut self, message: String) -> io::Error {
        let message = format!("{}: {message}", self.url);
        self.failure = Some(message.clone());
        io::Error::other(TransferFailure { message })
    }
}

impl Read for DownloadStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(message) = &self.failure {
            return Err(io::Error::other(TransferFailure {
                message: message.clone(),
            }));
        }
        if self.completed {
            return Ok(0);
        }
        if self.cancel.is_cancelled() {
            return Err(io::Error::other(CancelledRead));
        }

        let n = match self.reader.read(buf) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Err(e),
            Err(e) => return Err(self.fail(e.to_string())),
        };

        if n == 0 && !buf.is_empty() {
            if self.session.is_short() {
                let expected = self.session.total.unwrap_or_default();
                return Err(self.fail(format!(
                    "connection closed after {} of {expected} bytes",
                    self.session.transferred
                )));
            }
            self.finish();
            return Ok(0);
        }

        self.record(n);
        Ok(n)
    }
}
