#![forbid(unsafe_code)]

//! Elm-style runtime for line-oriented applications.
//!
//! The program runtime owns the update/view loop. State lives in a [`Model`];
//! side effects are described by [`Cmd`] values the runtime executes.
//!
//! # Example
//!
//! ```ignore
//! use transitflow_runtime::{Cmd, Event, Frame, Model};
//!
//! struct Counter {
//!     count: i32,
//! }
//!
//! enum Msg {
//!     Increment,
//!     Quit,
//! }
//!
//! impl From<Event> for Msg {
//!     fn from(event: Event) -> Self {
//!         match event {
//!             Event::Line(l) if l == "q" => Msg::Quit,
//!             Event::Closed => Msg::Quit,
//!             _ => Msg::Increment,
//!         }
//!     }
//! }
//!
//! impl Model for Counter {
//!     type Message = Msg;
//!
//!     fn update(&mut self, msg: Msg) -> Cmd<Msg> {
//!         match msg {
//!             Msg::Increment => { self.count += 1; Cmd::none() }
//!             Msg::Quit => Cmd::quit(),
//!         }
//!     }
//!
//!     fn view(&self, frame: &mut Frame) {
//!         frame.line(format!("count: {}", self.count));
//!     }
//! }
//! ```

use std::io::{self, Stdout, Write};
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, debug_span, info, info_span};

use crate::event::{Event, EventSource};
use crate::frame::Frame;
use crate::state_persistence::StateRegistry;
use crate::subscription::{Subscription, SubscriptionManager};

/// Application state and behavior.
pub trait Model: Sized {
    /// Messages that drive state transitions.
    ///
    /// Must be convertible from input events.
    type Message: From<Event> + Send + 'static;

    /// Startup commands, run once before the first render.
    fn init(&mut self) -> Cmd<Self::Message> {
        Cmd::none()
    }

    /// The state transition function.
    fn update(&mut self, msg: Self::Message) -> Cmd<Self::Message>;

    /// Render the current state.
    fn view(&self, frame: &mut Frame);

    /// Declare active subscriptions.
    ///
    /// Called after each update. The runtime diffs the returned set by
    /// `SubId` against what is running.
    fn subscriptions(&self) -> Vec<Box<dyn Subscription<Self::Message>>> {
        vec![]
    }
}

/// Metadata for background tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskSpec {
    /// Optional task name for diagnostics.
    pub name: Option<String>,
}

impl TaskSpec {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

/// Side effects to be executed by the runtime.
#[derive(Default)]
pub enum Cmd<M> {
    /// No operation.
    #[default]
    None,
    /// Quit the application.
    Quit,
    /// Execute multiple commands (sequentially).
    Batch(Vec<Cmd<M>>),
    /// Execute commands sequentially.
    Sequence(Vec<Cmd<M>>),
    /// Send a message to the model.
    Msg(M),
    /// Run a blocking closure on a background thread.
    ///
    /// The returned message is fed back into `update()`.
    Task(TaskSpec, Box<dyn FnOnce() -> M + Send>),
    /// Flush the state registry to its backend.
    SaveState,
}

impl<M: std::fmt::Debug> std::fmt::Debug for Cmd<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Quit => write!(f, "Quit"),
            Self::Batch(cmds) => f.debug_tuple("Batch").field(cmds).finish(),
            Self::Sequence(cmds) => f.debug_tuple("Sequence").field(cmds).finish(),
            Self::Msg(m) => f.debug_tuple("Msg").field(m).finish(),
            Self::Task(spec, _) => f.debug_struct("Task").field("spec", spec).finish(),
            Self::SaveState => write!(f, "SaveState"),
        }
    }
}

impl<M> Cmd<M> {
    #[inline]
    pub fn none() -> Self {
        Self::None
    }

    #[inline]
    pub fn quit() -> Self {
        Self::Quit
    }

    #[inline]
    pub fn msg(m: M) -> Self {
        Self::Msg(m)
    }

    /// Batch of commands, collapsed when empty or singular.
    pub fn batch(cmds: Vec<Self>) -> Self {
        Self::collapse(cmds, Self::Batch)
    }

    pub fn sequence(cmds: Vec<Self>) -> Self {
        Self::collapse(cmds, Self::Sequence)
    }

    fn collapse(mut cmds: Vec<Self>, wrap: fn(Vec<Self>) -> Self) -> Self {
        if cmds.len() > 1 {
            return wrap(cmds);
        }
        cmds.pop().unwrap_or(Self::None)
    }

    /// Stable name for tracing.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Quit => "Quit",
            Self::Batch(_) => "Batch",
            Self::Sequence(_) => "Sequence",
            Self::Msg(_) => "Msg",
            Self::Task(..) => "Task",
            Self::SaveState => "SaveState",
        }
    }

    pub fn task<F>(f: F) -> Self
    where
        F: FnOnce() -> M + Send + 'static,
    {
        Self::Task(TaskSpec::default(), Box::new(f))
    }

    /// Named background task; the name shows up in traces and in the
    /// simulator's deferred task list.
    pub fn task_named<F>(name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce() -> M + Send + 'static,
    {
        Self::Task(TaskSpec::named(name), Box::new(f))
    }

    #[inline]
    pub fn save_state() -> Self {
        Self::SaveState
    }

    /// Number of atomic commands, recursing into batches.
    pub fn count(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Batch(cmds) | Self::Sequence(cmds) => cmds.iter().map(Self::count).sum(),
            _ => 1,
        }
    }
}

/// When and how registry state is saved and restored.
#[derive(Clone)]
pub struct PersistenceConfig {
    /// State registry; `None` disables persistence.
    pub registry: Option<Arc<StateRegistry>>,
    /// Load the registry on program start.
    pub auto_load: bool,
    /// Flush the registry on program exit.
    pub auto_save: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            registry: None,
            auto_load: true,
            auto_save: true,
        }
    }
}

impl std::fmt::Debug for PersistenceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceConfig")
            .field(
                "registry",
                &self.registry.as_ref().map(|r| r.backend_name()),
            )
            .field("auto_load", &self.auto_load)
            .field("auto_save", &self.auto_save)
            .finish()
    }
}

impl PersistenceConfig {
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_registry(registry: Arc<StateRegistry>) -> Self {
        Self {
            registry: Some(registry),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn auto_load(mut self, enabled: bool) -> Self {
        self.auto_load = enabled;
        self
    }

    #[must_use]
    pub fn auto_save(mut self, enabled: bool) -> Self {
        self.auto_save = enabled;
        self
    }
}

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct ProgramConfig {
    /// Upper bound on how long the loop blocks waiting for input.
    pub poll_timeout: Duration,
    /// Width of rendered frames.
    pub frame_width: usize,
    pub persistence: PersistenceConfig,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(100),
            frame_width: 80,
            persistence: PersistenceConfig::default(),
        }
    }
}

impl ProgramConfig {
    #[must_use]
    pub fn with_persistence(mut self, persistence: PersistenceConfig) -> Self {
        self.persistence = persistence;
        self
    }

    #[must_use]
    pub fn with_frame_width(mut self, width: usize) -> Self {
        self.frame_width = width;
        self
    }

    #[must_use]
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }
}

/// Drives a [`Model`] from an [`EventSource`], writing frames to `W`.
pub struct Program<M: Model, E: EventSource, W: Write + Send = Stdout> {
    model: M,
    events: E,
    writer: W,
    running: bool,
    dirty: bool,
    frame_width: usize,
    poll_timeout: Duration,
    last_frame: Option<Frame>,
    frames_written: u64,
    subscriptions: SubscriptionManager<M::Message>,
    task_sender: mpsc::Sender<M::Message>,
    task_receiver: mpsc::Receiver<M::Message>,
    task_handles: Vec<JoinHandle<()>>,
    persistence_config: PersistenceConfig,
}

impl<M: Model, E: EventSource, W: Write + Send> Program<M, E, W> {
    pub fn new(model: M, events: E, writer: W, config: ProgramConfig) -> Self {
        let (task_sender, task_receiver) = mpsc::channel();
        Self {
            model,
            events,
            writer,
            running: true,
            dirty: true,
            frame_width: config.frame_width,
            poll_timeout: config.poll_timeout,
            last_frame: None,
            frames_written: 0,
            subscriptions: SubscriptionManager::new(),
            task_sender,
            task_receiver,
            task_handles: Vec::new(),
            persistence_config: config.persistence,
        }
    }

    /// Run until the model quits.
    pub fn run(&mut self) -> io::Result<()> {
        let _span = info_span!("transitflow.program.run").entered();

        if self.persistence_config.auto_load {
            self.load_state();
        }

        let cmd = {
            let _span = info_span!("transitflow.program.init").entered();
            self.model.init()
        };
        self.execute_cmd(cmd)?;
        self.reconcile_subscriptions();
        self.render_frame()?;

        while self.running {
            if self.events.poll_event(self.poll_timeout)? {
                loop {
                    if let Some(event) = self.events.read_event()? {
                        self.handle_event(event)?;
                    }
                    if !self.running || !self.events.poll_event(Duration::ZERO)? {
                        break;
                    }
                }
            }

            self.process_subscription_messages()?;
            self.process_task_results()?;
            self.reap_finished_tasks();

            if self.dirty {
                self.render_frame()?;
            }
        }

        if self.persistence_config.auto_save {
            self.save_state();
        }

        self.subscriptions.stop_all();
        self.reap_finished_tasks();
        info!(frames = self.frames_written, "program finished");
        Ok(())
    }

    #[must_use]
    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    fn handle_event(&mut self, event: Event) -> io::Result<()> {
        let kind = match &event {
            Event::Line(_) => "line",
            Event::Closed => "closed",
        };
        self.dispatch(M::Message::from(event), kind)?;
        self.reconcile_subscriptions();
        Ok(())
    }

    /// Run one update with tracing and execute the resulting command.
    fn dispatch(&mut self, msg: M::Message, source: &'static str) -> io::Result<()> {
        let cmd = {
            let _span = debug_span!(
                "transitflow.program.update",
                msg_type = source,
                duration_us = tracing::field::Empty,
                cmd_type = tracing::field::Empty
            )
            .entered();
            let start = Instant::now();
            let cmd = self.model.update(msg);
            tracing::Span::current().record("duration_us", start.elapsed().as_micros() as u64);
            tracing::Span::current().record("cmd_type", cmd.type_name());
            cmd
        };
        self.dirty = true;
        self.execute_cmd(cmd)
    }

    fn reconcile_subscriptions(&mut self) {
        let _span = debug_span!(
            "transitflow.program.subscriptions",
            active_count = tracing::field::Empty
        )
        .entered();
        let subs = self.model.subscriptions();
        self.subscriptions.reconcile(subs);
        tracing::Span::current().record("active_count", self.subscriptions.active_count());
    }

    fn process_subscription_messages(&mut self) -> io::Result<()> {
        let messages = self.subscriptions.drain_messages();
        if messages.is_empty() {
            return Ok(());
        }
        for msg in messages {
            if !self.running {
                break;
            }
            self.dispatch(msg, "subscription")?;
        }
        self.reconcile_subscriptions();
        Ok(())
    }

    fn process_task_results(&mut self) -> io::Result<()> {
        let mut delivered = false;
        while self.running {
            let Ok(msg) = self.task_receiver.try_recv() else {
                break;
            };
            self.dispatch(msg, "task")?;
            delivered = true;
        }
        if delivered {
            self.reconcile_subscriptions();
        }
        Ok(())
    }

    fn execute_cmd(&mut self, cmd: Cmd<M::Message>) -> io::Result<()> {
        match cmd {
            Cmd::None => {}
            Cmd::Quit => self.running = false,
            Cmd::Msg(m) => self.dispatch(m, "cmd")?,
            Cmd::Batch(cmds) | Cmd::Sequence(cmds) => {
                for c in cmds {
                    self.execute_cmd(c)?;
                    if !self.running {
                        break;
                    }
                }
            }
            Cmd::Task(spec, f) => {
                debug!(task = spec.name.as_deref().unwrap_or("unnamed"), "spawning task");
                let sender = self.task_sender.clone();
                let handle = thread::spawn(move || {
                    let _ = sender.send(f());
                });
                self.task_handles.push(handle);
            }
            Cmd::SaveState => self.save_state(),
        }
        Ok(())
    }

    fn reap_finished_tasks(&mut self) {
        if self.task_handles.is_empty() {
            return;
        }
        let (finished, pending): (Vec<_>, Vec<_>) = self
            .task_handles
            .drain(..)
            .partition(|handle| handle.is_finished());
        self.task_handles = pending;
        for handle in finished {
            if let Err(payload) = handle.join() {
                let msg = if let Some(s) = payload.downcast_ref::<&str>() {
                    (*s).to_owned()
                } else if let Some(s) = payload.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic payload".to_owned()
                };
                tracing::error!("spawned task panicked: {msg}");
            }
        }
    }

    /// Render the model; identical frames are not rewritten.
    fn render_frame(&mut self) -> io::Result<()> {
        self.dirty = false;
        let mut frame = Frame::new(self.frame_width);
        {
            let _span = debug_span!("transitflow.program.view").entered();
            self.model.view(&mut frame);
        }
        if self.last_frame.as_ref() == Some(&frame) {
            return Ok(());
        }
        write!(self.writer, "{frame}")?;
        self.writer.flush()?;
        self.frames_written += 1;
        self.last_frame = Some(frame);
        Ok(())
    }

    fn load_state(&mut self) {
        if let Some(registry) = &self.persistence_config.registry {
            match registry.load() {
                Ok(count) => info!(count, "loaded state from persistence"),
                Err(e) => tracing::warn!(error = %e, "failed to load state"),
            }
        }
    }

    fn save_state(&mut self) {
        if let Some(registry) = &self.persistence_config.registry {
            match registry.flush() {
                Ok(true) => debug!("saved state to persistence"),
                Ok(false) => {}
                Err(e) => tracing::warn!(error = %e, "failed to save state"),
            }
        }
    }
}
