//! Deferred notifications.
//!
//! `validate` never notifies listeners synchronously: it posts a [`Task`] to a
//! [`Scheduler`], and the host drains the queue once the current unit of work
//! is done. [`TaskQueue`] is the in-process scheduler; [`EventBus`] is the
//! per-record subscribe/trigger hub the tasks publish to.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::enums::Validity;
use crate::types::InvalidAttrs;

/// A unit of work run after the current one completes.
pub type Task = Box<dyn FnOnce()>;

/// Posts tasks to run "after the current unit of work". No ordering guarantee
/// is made across independently scheduled tasks.
pub trait Scheduler {
    fn defer(&self, task: Task);
}

// ─── TaskQueue ──────────────────────────────────────────────────────────────

/// A FIFO of deferred tasks, drained explicitly by the host.
///
/// Clones share the same queue.
#[derive(Clone, Default)]
pub struct TaskQueue {
    tasks: Rc<RefCell<VecDeque<Task>>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        TaskQueue::default()
    }

    /// Runs every pending task, including tasks scheduled while draining.
    /// Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            // the borrow ends before the task runs so tasks may schedule more
            let next = self.tasks.borrow_mut().pop_front();
            let Some(task) = next else { break };
            task();
            ran += 1;
        }
        if ran > 0 {
            tracing::trace!(ran, "drained deferred tasks");
        }
        ran
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }
}

impl Scheduler for TaskQueue {
    fn defer(&self, task: Task) {
        self.tasks.borrow_mut().push_back(task);
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue").field("pending", &self.len()).finish()
    }
}

// ─── Events ─────────────────────────────────────────────────────────────────

/// A notification about a record's validity.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ValidationEvent {
    /// Sent after every full pass.
    #[serde(rename_all = "camelCase")]
    Validated {
        record_id: String,
        is_valid: bool,
        invalid_attrs: InvalidAttrs,
    },
    /// Sent after every full pass, named for its outcome.
    #[serde(rename_all = "camelCase")]
    ValidatedAs {
        record_id: String,
        validity: Validity,
        invalid_attrs: InvalidAttrs,
    },
    /// Sent synchronously by `is_valid` when a queried attribute fails.
    #[serde(rename_all = "camelCase")]
    Invalid {
        record_id: String,
        invalid_attrs: InvalidAttrs,
    },
}

impl ValidationEvent {
    /// `validated`, `validated:valid`, `validated:invalid` or `invalid`.
    pub fn name(&self) -> &'static str {
        match self {
            ValidationEvent::Validated { .. } => "validated",
            ValidationEvent::ValidatedAs {
                validity: Validity::Valid,
                ..
            } => "validated:valid",
            ValidationEvent::ValidatedAs {
                validity: Validity::Invalid,
                ..
            } => "validated:invalid",
            ValidationEvent::Invalid { .. } => "invalid",
        }
    }

    pub fn record_id(&self) -> &str {
        match self {
            ValidationEvent::Validated { record_id, .. }
            | ValidationEvent::ValidatedAs { record_id, .. }
            | ValidationEvent::Invalid { record_id, .. } => record_id,
        }
    }

    pub fn invalid_attrs(&self) -> &InvalidAttrs {
        match self {
            ValidationEvent::Validated { invalid_attrs, .. }
            | ValidationEvent::ValidatedAs { invalid_attrs, .. }
            | ValidationEvent::Invalid { invalid_attrs, .. } => invalid_attrs,
        }
    }
}

type Handler = Rc<dyn Fn(&ValidationEvent)>;

/// Named-event subscriptions for one record.
///
/// Clones share subscriptions, so a deferred task can hold its own handle.
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Rc<RefCell<Vec<(String, Handler)>>>,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus::default()
    }

    /// Subscribes `handler` to events named `name`.
    pub fn subscribe<F>(&self, name: &str, handler: F)
    where
        F: Fn(&ValidationEvent) + 'static,
    {
        self.handlers
            .borrow_mut()
            .push((name.to_string(), Rc::new(handler)));
    }

    /// Calls every handler subscribed to the event's name, in subscription
    /// order.
    pub fn trigger(&self, event: &ValidationEvent) {
        let matching: Vec<Handler> = self
            .handlers
            .borrow()
            .iter()
            .filter(|(name, _)| name == event.name())
            .map(|(_, h)| Rc::clone(h))
            .collect();
        tracing::trace!(event = event.name(), record = event.record_id(), handlers = matching.len(), "trigger");
        for handler in matching {
            handler(event);
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handlers.borrow().len())
            .finish()
    }
}
