//! Scripted in-memory connections for pipeline tests.

use core::time::Duration;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::rc::Rc;

use crate::session::{Connection, Connector};

/// What the fake peer does on the next read.
#[derive(Debug, Clone)]
pub enum Step {
    /// Hand out these bytes, possibly over several reads.
    Data(Vec<u8>),
    /// Hand out these bytes one per read, sleeping before each.
    Slow(Vec<u8>, Duration),
    /// Never send anything again; every read waits out the read timeout.
    Stall,
    /// Fail the read.
    Fail(io::ErrorKind),
}

#[derive(Debug, Default)]
struct Shared {
    attempts: Vec<(String, u16)>,
    written: Vec<Vec<u8>>,
    shutdowns: usize,
}

/// Serves one script per `connect` call, in order. Once the scripts run out
/// every further attempt is refused.
#[derive(Debug, Clone)]
pub struct ScriptedConnector {
    scripts: VecDeque<Result<Vec<Step>, io::ErrorKind>>,
    shared: Rc<RefCell<Shared>>,
}

impl ScriptedConnector {
    pub fn new(scripts: Vec<Result<Vec<Step>, io::ErrorKind>>) -> Self {
        Self {
            scripts: scripts.into(),
            shared: Rc::default(),
        }
    }

    /// A well-behaved server answering `body` with a 200 response.
    pub fn ok_response(body: &str) -> Vec<Step> {
        vec![Step::Data(http_response("200 OK", body))]
    }

    pub fn attempts(&self) -> Vec<(String, u16)> {
        self.shared.borrow().attempts.clone()
    }

    /// Bytes written on each opened connection.
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.shared.borrow().written.clone()
    }

    pub fn shutdowns(&self) -> usize {
        self.shared.borrow().shutdowns
    }
}

pub fn http_response(status: &str, body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 {}\r\nServer: openresty\r\nContent-Type: application/json; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    )
    .into_bytes()
}

impl Connector for ScriptedConnector {
    type Conn = ScriptedConnection;

    fn connect(&mut self, host: &str, port: u16, _timeout: Duration) -> io::Result<Self::Conn> {
        self.shared
            .borrow_mut()
            .attempts
            .push((host.to_string(), port));
        match self.scripts.pop_front() {
            Some(Ok(steps)) => {
                let index = {
                    let mut shared = self.shared.borrow_mut();
                    shared.written.push(Vec::new());
                    shared.written.len() - 1
                };
                Ok(ScriptedConnection {
                    steps: steps.into(),
                    read_timeout: None,
                    index,
                    shared: self.shared.clone(),
                })
            }
            Some(Err(kind)) => Err(io::Error::from(kind)),
            None => Err(io::Error::from(io::ErrorKind::ConnectionRefused)),
        }
    }
}

#[derive(Debug)]
pub struct ScriptedConnection {
    steps: VecDeque<Step>,
    read_timeout: Option<Duration>,
    index: usize,
    shared: Rc<RefCell<Shared>>,
}

impl Read for ScriptedConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.steps.front_mut() {
            None => Ok(0),
            Some(Step::Data(data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                data.drain(..n);
                if data.is_empty() {
                    self.steps.pop_front();
                }
                Ok(n)
            }
            Some(Step::Slow(data, delay)) => {
                std::thread::sleep(*delay);
                buf[0] = data.remove(0);
                if data.is_empty() {
                    self.steps.pop_front();
                }
                Ok(1)
            }
            Some(Step::Stall) => {
                let wait = self
                    .read_timeout
                    .unwrap_or(Duration::from_millis(10))
                    .min(Duration::from_millis(50));
                std::thread::sleep(wait);
                Err(io::Error::from(io::ErrorKind::WouldBlock))
            }
            Some(Step::Fail(kind)) => {
                let kind = *kind;
                self.steps.pop_front();
                Err(io::Error::from(kind))
            }
        }
    }
}

impl Write for ScriptedConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.shared.borrow_mut().written[self.index].extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Connection for ScriptedConnection {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.read_timeout = timeout;
        Ok(())
    }

    fn shutdown(&mut self) -> io::Result<()> {
        self.shared.borrow_mut().shutdowns += 1;
        Ok(())
    }
}

/// Routes `log` output through the test harness.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
