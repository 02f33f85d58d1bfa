use core::time::Duration;
use std::fmt;
use std::io::{self, BufRead, BufReader};
use std::time::Instant;

use log::*;

use crate::session::Connection;

/// HTTP headers end with an empty line.
const END_OF_HEADERS: &[u8; 4] = b"\r\n\r\n";

/// Longest status line kept for inspection; the rest is dropped.
const MAX_STATUS_LINE: usize = 64;

/// What is known about the response once its headers are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHead {
    /// Status code, if the first line looked like `HTTP/1.x NNN ...`.
    pub status: Option<u16>,
}

impl ResponseHead {
    fn from_status_line(line: &[u8]) -> Self {
        let status = std::str::from_utf8(line).ok().and_then(|line| {
            let mut parts = line.split_whitespace();
            let version = parts.next()?;
            if !version.starts_with("HTTP/") {
                return None;
            }
            parts.next()?.parse().ok()
        });
        Self { status }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, Some(200..=299))
    }
}

#[derive(Debug)]
pub enum HeaderError {
    /// The blank line did not arrive before the deadline.
    Timeout(Duration),
    /// The peer closed the connection inside the headers.
    PeerClosed,
    Io(io::Error),
}

impl fmt::Display for HeaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(limit) => {
                write!(f, "no end of headers within {} ms", limit.as_millis())
            }
            Self::PeerClosed => write!(f, "connection closed before end of headers"),
            Self::Io(e) => write!(f, "reading headers failed: {}", e),
        }
    }
}

impl std::error::Error for HeaderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// Consumes the response up to and including `\r\n\r\n`, leaving the reader
/// at the first body byte. Gives up once `timeout` has elapsed in total.
pub fn skip_headers<C: Connection>(
    reader: &mut BufReader<C>,
    timeout: Duration,
) -> Result<ResponseHead, HeaderError> {
    let deadline = Instant::now() + timeout;
    let mut matched = 0;
    let mut status_line = Vec::new();
    let mut in_status_line = true;

    loop {
        let remaining = deadline
            .checked_duration_since(Instant::now())
            .filter(|left| !left.is_zero())
            .ok_or(HeaderError::Timeout(timeout))?;
        reader
            .get_mut()
            .set_read_timeout(Some(remaining))
            .map_err(HeaderError::Io)?;

        let buf = match reader.fill_buf() {
            Ok(buf) => buf,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                continue
            }
            Err(e) => return Err(HeaderError::Io(e)),
        };
        if buf.is_empty() {
            warn!("No response or invalid response!");
            return Err(HeaderError::PeerClosed);
        }

        let mut consumed = 0;
        let mut found = false;
        for &byte in buf {
            consumed += 1;
            if in_status_line {
                match byte {
                    b'\n' => in_status_line = false,
                    b'\r' => {}
                    _ if status_line.len() < MAX_STATUS_LINE => status_line.push(byte),
                    _ => {}
                }
            }
            matched = advance(matched, byte);
            if matched == END_OF_HEADERS.len() {
                found = true;
                break;
            }
        }
        reader.consume(consumed);

        if found {
            let head = ResponseHead::from_status_line(&status_line);
            info!("Response headers skipped (status {:?})", head.status);
            return Ok(head);
        }
    }
}

/// Next match length of the terminator after seeing `byte`.
fn advance(matched: usize, byte: u8) -> usize {
    if byte == END_OF_HEADERS[matched] {
        matched + 1
    } else if byte == b'\r' {
        1
    } else {
        0
    }
}
