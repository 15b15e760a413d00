#![forbid(unsafe_code)]

//! Input events and the sources that produce them.
//!
//! The runtime is line-oriented: each line the user enters becomes one
//! [`Event::Line`]. End of input becomes a single [`Event::Closed`].

use std::collections::VecDeque;
use std::io::{self, BufRead};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

/// An input event delivered to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// One line of user input, without the trailing newline.
    Line(String),
    /// Input reached end of stream.
    Closed,
}

/// A source of input events polled by [`Program`](crate::Program).
pub trait EventSource {
    /// Wait up to `timeout` for an event to become available.
    fn poll_event(&mut self, timeout: Duration) -> io::Result<bool>;

    /// Take the next available event, if any.
    fn read_event(&mut self) -> io::Result<Option<Event>>;
}

/// Reads lines from a blocking reader on a dedicated thread.
pub struct LineEventSource {
    receiver: mpsc::Receiver<io::Result<String>>,
    pending: Option<Event>,
    closed: bool,
}

impl LineEventSource {
    /// Read lines from standard input.
    #[must_use]
    pub fn stdin() -> Self {
        Self::from_reader(io::BufReader::new(io::stdin()))
    }

    /// Read lines from any buffered reader.
    pub fn from_reader<R: BufRead + Send + 'static>(reader: R) -> Self {
        let (sender, receiver) = mpsc::channel();
        thread::spawn(move || {
            for line in reader.lines() {
                let failed = line.is_err();
                if sender.send(line).is_err() || failed {
                    break;
                }
            }
        });
        Self {
            receiver,
            pending: None,
            closed: false,
        }
    }
}

impl EventSource for LineEventSource {
    fn poll_event(&mut self, timeout: Duration) -> io::Result<bool> {
        if self.pending.is_some() {
            return Ok(true);
        }
        if self.closed {
            thread::sleep(timeout);
            return Ok(false);
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(Ok(line)) => {
                self.pending = Some(Event::Line(line.trim_end_matches('\r').to_string()));
                Ok(true)
            }
            Ok(Err(e)) => Err(e),
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => {
                self.closed = true;
                self.pending = Some(Event::Closed);
                Ok(true)
            }
        }
    }

    fn read_event(&mut self) -> io::Result<Option<Event>> {
        Ok(self.pending.take())
    }
}

/// Replays a fixed list of events, then reports [`Event::Closed`] once.
#[derive(Debug, Default)]
pub struct ScriptedEventSource {
    events: VecDeque<Event>,
    closed: bool,
}

impl ScriptedEventSource {
    pub fn new(events: impl IntoIterator<Item = Event>) -> Self {
        Self {
            events: events.into_iter().collect(),
            closed: false,
        }
    }

    /// Script of input lines.
    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(lines.into_iter().map(|l| Event::Line(l.into())))
    }
}

impl EventSource for ScriptedEventSource {
    fn poll_event(&mut self, timeout: Duration) -> io::Result<bool> {
        if self.events.is_empty() && self.closed {
            thread::sleep(timeout);
            return Ok(false);
        }
        Ok(true)
    }

    fn read_event(&mut self) -> io::Result<Option<Event>> {
        if let Some(event) = self.events.pop_front() {
            return Ok(Some(event));
        }
        if self.closed {
            return Ok(None);
        }
        self.closed = true;
        Ok(Some(Event::Closed))
    }
}
