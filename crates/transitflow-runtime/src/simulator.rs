#![forbid(unsafe_code)]

//! Deterministic program simulator for testing.
//!
//! `ProgramSimulator` runs a [`Model`] without threads or I/O: events are
//! injected, messages sent directly, and frames captured for assertions.
//!
//! Tasks run synchronously by default. In deferred mode they are queued
//! instead, so a test can complete them in any order and observe how the
//! model handles late or reordered responses.
//!
//! # Example
//!
//! ```ignore
//! use transitflow_runtime::ProgramSimulator;
//!
//! let mut sim = ProgramSimulator::new(Counter { value: 0 });
//! sim.init();
//! sim.send(Msg::Increment);
//! assert_eq!(sim.model().value, 1);
//! assert!(sim.capture_frame(80).contains("count: 1"));
//! ```

use std::sync::Arc;

use crate::event::Event;
use crate::frame::Frame;
use crate::program::{Cmd, Model, TaskSpec};
use crate::state_persistence::StateRegistry;
use crate::subscription::SubId;

/// Record of a command executed during simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CmdRecord {
    None,
    Quit,
    Msg,
    Batch(usize),
    Sequence(usize),
    /// Task executed or queued, with its name.
    Task(Option<String>),
    SaveState,
}

type DeferredTask<T> = (TaskSpec, Box<dyn FnOnce() -> T + Send>);

/// Deterministic simulator for [`Model`] testing.
pub struct ProgramSimulator<M: Model> {
    model: M,
    frames: Vec<Frame>,
    command_log: Vec<CmdRecord>,
    running: bool,
    state_registry: Option<Arc<StateRegistry>>,
    defer_tasks: bool,
    pending_tasks: Vec<DeferredTask<M::Message>>,
}

impl<M: Model> ProgramSimulator<M> {
    /// The model is not initialized until [`init`](Self::init) is called.
    pub fn new(model: M) -> Self {
        Self {
            model,
            frames: Vec::new(),
            command_log: Vec::new(),
            running: true,
            state_registry: None,
            defer_tasks: false,
            pending_tasks: Vec::new(),
        }
    }

    /// `Cmd::SaveState` flushes `registry`.
    pub fn with_registry(model: M, registry: Arc<StateRegistry>) -> Self {
        let mut sim = Self::new(model);
        sim.state_registry = Some(registry);
        sim
    }

    /// Queue tasks instead of running them inline.
    #[must_use]
    pub fn defer_tasks(mut self) -> Self {
        self.defer_tasks = true;
        self
    }

    pub fn init(&mut self) {
        let cmd = self.model.init();
        self.execute_cmd(cmd);
    }

    pub fn inject_events(&mut self, events: &[Event]) {
        for event in events {
            if !self.running {
                break;
            }
            let msg = M::Message::from(event.clone());
            let cmd = self.model.update(msg);
            self.execute_cmd(cmd);
        }
    }

    pub fn inject_event(&mut self, event: Event) {
        self.inject_events(&[event]);
    }

    /// Inject one [`Event::Line`].
    pub fn inject_line(&mut self, line: impl Into<String>) {
        self.inject_event(Event::Line(line.into()));
    }

    pub fn send(&mut self, msg: M::Message) {
        if !self.running {
            return;
        }
        let cmd = self.model.update(msg);
        self.execute_cmd(cmd);
    }

    /// Names of queued tasks, oldest first; unnamed tasks show as `""`.
    pub fn pending_tasks(&self) -> Vec<&str> {
        self.pending_tasks
            .iter()
            .map(|(spec, _)| spec.name.as_deref().unwrap_or(""))
            .collect()
    }

    /// Complete the queued task at `index` and deliver its message.
    ///
    /// Returns `false` if there is no such task.
    pub fn run_task(&mut self, index: usize) -> bool {
        if index >= self.pending_tasks.len() {
            return false;
        }
        let (_, f) = self.pending_tasks.remove(index);
        let msg = f();
        self.send(msg);
        true
    }

    /// Complete the oldest queued task called `name`.
    pub fn run_task_named(&mut self, name: &str) -> bool {
        let index = self
            .pending_tasks
            .iter()
            .position(|(spec, _)| spec.name.as_deref() == Some(name));
        match index {
            Some(i) => self.run_task(i),
            None => false,
        }
    }

    /// Complete queued tasks in order, including ones queued meanwhile.
    pub fn run_all_tasks(&mut self) -> usize {
        let mut ran = 0;
        while self.run_task(0) {
            ran += 1;
        }
        ran
    }

    /// Drop all queued tasks without delivering their messages.
    pub fn discard_tasks(&mut self) -> usize {
        let n = self.pending_tasks.len();
        self.pending_tasks.clear();
        n
    }

    /// Ids of the subscriptions the model currently declares.
    pub fn subscription_ids(&self) -> Vec<SubId> {
        self.model.subscriptions().iter().map(|s| s.id()).collect()
    }

    /// Render the model into a fresh frame and keep it.
    pub fn capture_frame(&mut self, width: usize) -> &Frame {
        let mut frame = Frame::new(width);
        self.model.view(&mut frame);
        self.frames.push(frame);
        &self.frames[self.frames.len() - 1]
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// `false` once a `Cmd::Quit` has executed.
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn command_log(&self) -> &[CmdRecord] {
        &self.command_log
    }

    fn execute_cmd(&mut self, cmd: Cmd<M::Message>) {
        match cmd {
            Cmd::None => self.command_log.push(CmdRecord::None),
            Cmd::Quit => {
                self.running = false;
                self.command_log.push(CmdRecord::Quit);
            }
            Cmd::Msg(m) => {
                self.command_log.push(CmdRecord::Msg);
                let cmd = self.model.update(m);
                self.execute_cmd(cmd);
            }
            Cmd::Batch(cmds) => {
                self.command_log.push(CmdRecord::Batch(cmds.len()));
                self.execute_all(cmds);
            }
            Cmd::Sequence(cmds) => {
                self.command_log.push(CmdRecord::Sequence(cmds.len()));
                self.execute_all(cmds);
            }
            Cmd::Task(spec, f) => {
                self.command_log.push(CmdRecord::Task(spec.name.clone()));
                if self.defer_tasks {
                    self.pending_tasks.push((spec, f));
                } else {
                    let msg = f();
                    let cmd = self.model.update(msg);
                    self.execute_cmd(cmd);
                }
            }
            Cmd::SaveState => {
                self.command_log.push(CmdRecord::SaveState);
                if let Some(registry) = &self.state_registry {
                    let _ = registry.flush();
                }
            }
        }
    }

    fn execute_all(&mut self, cmds: Vec<Cmd<M::Message>>) {
        for c in cmds {
            self.execute_cmd(c);
            if !self.running {
                break;
            }
        }
    }
}
