//! In-memory scripted transport.

use std::collections::HashMap;
use std::io::{self, Read};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use loadq_loader::{Connection, LoadError, LoadResult, Method, Transport, TransportRequest};

/// What the transport answers for one locator.
#[derive(Clone)]
pub enum Reply {
    Body {
        bytes: Vec<u8>,
        declare_length: bool,
        chunk: usize,
        delay: Duration,
    },
    Fail(LoadError),
}

// Allow unused: not every test binary uses every reply shape
#[allow(dead_code)]
impl Reply {
    pub fn body(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Body {
            bytes: bytes.into(),
            declare_length: true,
            chunk: usize::MAX,
            delay: Duration::ZERO,
        }
    }

    /// Serve `chunk` bytes per read, sleeping `delay` before each.
    pub fn slow(bytes: impl Into<Vec<u8>>, chunk: usize, delay: Duration) -> Self {
        Self::Body {
            bytes: bytes.into(),
            declare_length: true,
            chunk,
            delay,
        }
    }
}

/// One call to [`Transport::open`].
#[derive(Debug, Clone)]
pub struct Opened {
    pub locator: String,
    pub method: Method,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<HashMap<String, Reply>>,
    opened: Mutex<Vec<Opened>>,
}

// Allow unused: not every test binary uses every helper
#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, locator: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .insert(locator.to_string(), reply);
    }

    pub fn opened(&self) -> Vec<Opened> {
        self.opened.lock().unwrap().clone()
    }

    pub fn open_count(&self, locator: &str) -> usize {
        self.opened
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.locator == locator)
            .count()
    }
}

impl Transport for ScriptedTransport {
    fn open(&self, request: TransportRequest) -> LoadResult<Connection> {
        let locator = request.locator.to_string();
        let mut body = Vec::new();
        let content_type = match request.body {
            Some(mut upload) => {
                upload.reader.read_to_end(&mut body)?;
                Some(upload.content_type)
            }
            None => None,
        };
        self.opened.lock().unwrap().push(Opened {
            locator: locator.clone(),
            method: request.method,
            content_type,
            body,
        });

        let reply = self.replies.lock().unwrap().get(&locator).cloned();
        match reply {
            None => Err(LoadError::transport_with_status(
                format!("no route for {locator}"),
                404,
            )),
            Some(Reply::Fail(error)) => Err(error),
            Some(Reply::Body {
                bytes,
                declare_length,
                chunk,
                delay,
            }) => {
                let declared = declare_length.then_some(bytes.len() as u64);
                Ok(Connection::new(
                    declared,
                    SlowReader {
                        data: bytes,
                        position: 0,
                        chunk,
                        delay,
                    },
                ))
            }
        }
    }
}

struct SlowReader {
    data: Vec<u8>,
    position: usize,
    chunk: usize,
    delay: Duration,
}

impl Read for SlowReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.position >= self.data.len() {
            return Ok(0);
        }
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        let n = buf
            .len()
            .min(self.chunk)
            .min(self.data.len() - self.position);
        buf[..n].copy_from_slice(&self.data[self.position..self.position + n]);
        self.position += n;
        Ok(n)
    }
}
