//! Line framing over a byte stream.
//!
//! Outbound tokens are written as-is (the controller delimits them with
//! spaces). Inbound data is consumed one byte at a time until a newline or the
//! line cap, so no bytes beyond the current line are ever interpreted.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::{Instant, error::Elapsed, timeout_at};
use tracing::{debug, trace};

const TRAFFIC: &str = "sockmsg::traffic";

/// Sends tokens and receives newline-terminated lines.
#[derive(Debug)]
pub struct LineTransport<S> {
    stream: BufReader<S>,
    /// Bytes of a line whose read was interrupted by a deadline.
    partial: Vec<u8>,
    max_line_length: usize,
    log_traffic: bool,
}

impl<S> LineTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps `stream`; inbound lines are capped at `max_line_length` bytes.
    pub fn new(stream: S, max_line_length: usize) -> Self {
        Self {
            stream: BufReader::new(stream),
            partial: Vec::with_capacity(max_line_length),
            max_line_length: max_line_length.max(1),
            log_traffic: false,
        }
    }

    /// Logs traffic at `debug` instead of `trace`.
    pub fn with_traffic_logging(mut self, enabled: bool) -> Self {
        self.log_traffic = enabled;
        self
    }

    /// Writes the whole buffer, looping over partial writes.
    ///
    /// Returns the number of bytes sent, which is always `buf.len()`.
    pub async fn send_all(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut sent = 0;
        while sent < buf.len() {
            match self.stream.write(&buf[sent..]).await {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        format!("peer accepted {sent} of {} bytes", buf.len()),
                    ));
                }
                Ok(n) => sent += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        self.stream.flush().await?;

        if self.log_traffic {
            debug!(target: TRAFFIC, "Sent {} bytes: {:?}", sent, String::from_utf8_lossy(buf));
        } else {
            trace!(target: TRAFFIC, "Sent {} bytes: {:?}", sent, String::from_utf8_lossy(buf));
        }
        Ok(sent)
    }

    /// Reads one line, including its trailing newline.
    ///
    /// Stops early at the line cap. An empty string means the peer closed the
    /// connection before sending anything; a closed connection mid-line yields
    /// the partial line. Cancelling the returned future keeps the bytes read
    /// so far for the next call.
    pub async fn receive_line(&mut self) -> io::Result<String> {
        let mut byte = [0u8; 1];
        while self.partial.len() < self.max_line_length {
            match self.stream.read(&mut byte).await {
                Ok(0) => break,
                Ok(_) => {
                    self.partial.push(byte[0]);
                    if byte[0] == b'\n' {
                        break;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.partial.clear();
                    return Err(err);
                }
            }
        }

        let line = String::from_utf8_lossy(&self.partial).into_owned();
        self.partial.clear();

        if self.log_traffic {
            debug!(target: TRAFFIC, "Received {} bytes: {:?}", line.len(), line);
        } else {
            trace!(target: TRAFFIC, "Received {} bytes: {:?}", line.len(), line);
        }
        Ok(line)
    }

    /// [`receive_line`](Self::receive_line) bounded by an absolute deadline.
    pub async fn receive_line_until(
        &mut self,
        deadline: Instant,
    ) -> Result<io::Result<String>, Elapsed> {
        timeout_at(deadline, self.receive_line()).await
    }

    /// [`receive_line`](Self::receive_line) bounded by an optional timeout.
    ///
    /// Expiry is reported as [`io::ErrorKind::TimedOut`].
    pub async fn receive_line_within(&mut self, timeout: Option<Duration>) -> io::Result<String> {
        match timeout {
            None => self.receive_line().await,
            Some(timeout) => self
                .receive_line_until(Instant::now() + timeout)
                .await
                .map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("no line received within {timeout:?}"),
                    )
                })?,
        }
    }

    /// Shuts down the write side of the stream.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }

    /// Returns the underlying stream, dropping any buffered input.
    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }
}
