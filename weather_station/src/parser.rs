use core::time::Duration;
use std::fmt;
use std::io::{self, BufRead, BufReader};
use std::time::Instant;

use log::*;
use serde_json::{Deserializer, Value};

use crate::reading::{Narrowing, Reading};
use crate::session::Connection;

#[derive(Debug)]
pub enum ParseError {
    /// Malformed or truncated JSON.
    Syntax(serde_json::Error),
    /// The body ran past the working-buffer size.
    TooLarge(u64),
    /// Nothing but whitespace before the end of the stream.
    Empty,
    /// The document is valid JSON but not an object.
    NotAnObject,
    /// The document was still incomplete when the deadline passed.
    Timeout(Duration),
    /// The connection failed while the body was read.
    Io(io::Error),
}

impl ParseError {
    /// Timeouts and socket errors, as opposed to a bad document.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Io(_))
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax(e) => write!(f, "JSON parsing failed: {}", e),
            Self::TooLarge(limit) => write!(f, "response body exceeds {} bytes", limit),
            Self::Empty => write!(f, "response body is empty"),
            Self::NotAnObject => write!(f, "response body is not a JSON object"),
            Self::Timeout(limit) => {
                write!(f, "no complete JSON body within {} ms", limit.as_millis())
            }
            Self::Io(e) => write!(f, "reading body failed: {}", e),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Syntax(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// Reads the body until it holds one complete JSON document of at most
/// `max_len` bytes, then extracts a [`Reading`]. The whole read shares one
/// deadline of `timeout`. Bytes after the document are left unread.
pub fn read_reading<C: Connection>(
    reader: &mut BufReader<C>,
    timeout: Duration,
    max_len: u64,
    narrowing: Narrowing,
) -> Result<Reading, ParseError> {
    let doc = read_document(reader, timeout, max_len)?;
    reading_from_document(&doc, narrowing)
}

fn read_document<C: Connection>(
    reader: &mut BufReader<C>,
    timeout: Duration,
    max_len: u64,
) -> Result<Value, ParseError> {
    let deadline = Instant::now() + timeout;
    let limit = usize::try_from(max_len).unwrap_or(usize::MAX);
    let mut body = Vec::new();

    loop {
        // Only an unexpected end of input means more bytes may still fix the document.
        match first_document(&body) {
            Some(Ok(doc)) => return Ok(doc),
            Some(Err(e)) if !e.is_eof() => return Err(ParseError::Syntax(e)),
            _ => {}
        }
        if body.len() >= limit {
            debug!("Body reached {} bytes without a complete document", limit);
            return Err(ParseError::TooLarge(max_len));
        }

        let remaining = deadline
            .checked_duration_since(Instant::now())
            .filter(|left| !left.is_zero())
            .ok_or(ParseError::Timeout(timeout))?;
        reader
            .get_mut()
            .set_read_timeout(Some(remaining))
            .map_err(ParseError::Io)?;

        let buf = match reader.fill_buf() {
            Ok(buf) => buf,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                continue
            }
            Err(e) => return Err(ParseError::Io(e)),
        };
        if buf.is_empty() {
            return match first_document(&body) {
                Some(Ok(doc)) => Ok(doc),
                Some(Err(e)) => Err(ParseError::Syntax(e)),
                None => Err(ParseError::Empty),
            };
        }

        let take = buf.len().min(limit - body.len());
        body.extend_from_slice(&buf[..take]);
        reader.consume(take);
    }
}

fn first_document(body: &[u8]) -> Option<serde_json::Result<Value>> {
    Deserializer::from_slice(body).into_iter::<Value>().next()
}

/// Missing or non-numeric fields read as zero.
pub fn reading_from_document(doc: &Value, narrowing: Narrowing) -> Result<Reading, ParseError> {
    if !doc.is_object() {
        return Err(ParseError::NotAnObject);
    }

    Ok(Reading {
        temperature: float(doc, "/main/temp"),
        humidity: narrowing.to_i8(integer(doc, "/main/humidity")),
        pressure: narrowing.to_i16(integer(doc, "/main/pressure")),
        wind_speed: float(doc, "/wind/speed"),
        wind_direction: narrowing.to_i16(integer(doc, "/wind/deg")),
    })
}

fn float(doc: &Value, pointer: &str) -> f32 {
    match doc.pointer(pointer).and_then(Value::as_f64) {
        Some(value) => value as f32,
        None => {
            debug!("{} missing or not a number", pointer);
            0.0
        }
    }
}

/// Floats are truncated toward zero.
fn integer(doc: &Value, pointer: &str) -> i64 {
    let value = doc.pointer(pointer).and_then(|v| {
        v.as_i64()
            .or_else(|| v.as_u64().map(|u| u as i64))
            .or_else(|| v.as_f64().map(|f| f as i64))
    });
    match value {
        Some(value) => value,
        None => {
            debug!("{} missing or not a number", pointer);
            0
        }
    }
}
