//! Scripted stand-in for a camera on the other end of the wire.
//!
//! Every complete `\r`-terminated line written to the link is handed to a
//! responder closure, which returns the reply as a list of chunks. Each
//! `poll_read` delivers at most one chunk, so a reply split into
//! `[b"ACK\r", packet]` shows up the way a slow UART would deliver it.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use crate::Transport;

type Responder = Box<dyn FnMut(&str) -> Vec<Vec<u8>> + Send>;

/// Handle onto the lines a [`MockLink`] has received, usable after the link
/// itself has been moved into a driver.
#[derive(Debug, Clone, Default)]
pub struct SentLog(Arc<Mutex<Vec<String>>>);

impl SentLog {
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lines sent since `mark` (an earlier `len()`).
    pub fn since(&self, mark: usize) -> Vec<String> {
        self.0.lock().unwrap()[mark..].to_vec()
    }

    fn push(&self, line: String) {
        self.0.lock().unwrap().push(line);
    }
}

pub struct MockLink {
    responder: Responder,
    inbox: VecDeque<Vec<u8>>,
    partial: Vec<u8>,
    log: SentLog,
}

impl MockLink {
    pub fn new<F>(responder: F) -> Self
    where
        F: FnMut(&str) -> Vec<Vec<u8>> + Send + 'static,
    {
        Self {
            responder: Box::new(responder),
            inbox: VecDeque::new(),
            partial: Vec::new(),
            log: SentLog::default(),
        }
    }

    /// Camera that acknowledges every command and never says anything else.
    pub fn acking() -> Self {
        Self::new(|_| vec![b"ACK\r".to_vec()])
    }

    /// Camera that never answers.
    pub fn silent() -> Self {
        Self::new(|_| Vec::new())
    }

    pub fn log(&self) -> SentLog {
        self.log.clone()
    }

    /// Queue bytes as if they had arrived unprompted.
    pub fn inject(&mut self, chunk: &[u8]) {
        self.inbox.push_back(chunk.to_vec());
    }
}

impl Transport for MockLink {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        for &b in bytes {
            if b == b'\r' {
                let line = String::from_utf8_lossy(&self.partial).into_owned();
                self.partial.clear();
                let reply = (self.responder)(&line);
                self.log.push(line);
                self.inbox.extend(reply.into_iter().filter(|c| !c.is_empty()));
            } else {
                self.partial.push(b);
            }
        }
        Ok(())
    }

    fn poll_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(mut chunk) = self.inbox.pop_front() else {
            return Ok(0);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            self.inbox.push_front(chunk.split_off(n));
        }
        Ok(n)
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.inbox.clear();
        Ok(())
    }
}
