/*!
 * Notification hub for live job progress.
 *
 * Fans out job state snapshots and log lines to any number of observers and
 * keeps one queryable "current state" value plus a bounded ring of recent
 * log entries. Pushes never block the publisher: each observer owns a bounded
 * queue, a full queue drops the event and a closed queue is pruned.
 */

use std::collections::{HashMap, VecDeque};
use std::fmt;

use chrono::{DateTime, Utc};
use log::debug;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::translation::job::JobSnapshot;

/// Default number of log entries retained
pub const DEFAULT_LOG_CAPACITY: usize = 100;

/// Per-observer queue depth
const OBSERVER_QUEUE_DEPTH: usize = 64;

/// Severity of a published log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warn => write!(f, "warn"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// One log line as seen by observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub severity: Severity,
}

impl LogEntry {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
            severity,
        }
    }
}

/// Event pushed to observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum HubEvent {
    State(JobSnapshot),
    Log(LogEntry),
}

/// Subscriber handle returned by [`NotificationHub::subscribe`]
#[derive(Debug)]
pub struct Observer {
    id: Uuid,
    receiver: mpsc::Receiver<HubEvent>,
}

impl Observer {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the next event; `None` once the observer was unsubscribed
    pub async fn recv(&mut self) -> Option<HubEvent> {
        self.receiver.recv().await
    }

    /// Non-blocking poll
    pub fn try_recv(&mut self) -> Option<HubEvent> {
        self.receiver.try_recv().ok()
    }
}

/// Publish/subscribe hub with latest-state snapshot and bounded log ring
pub struct NotificationHub {
    state: RwLock<JobSnapshot>,
    logs: Mutex<VecDeque<LogEntry>>,
    observers: Mutex<HashMap<Uuid, mpsc::Sender<HubEvent>>>,
    log_capacity: usize,
}

impl NotificationHub {
    pub fn new(log_capacity: usize) -> Self {
        let log_capacity = log_capacity.max(1);
        Self {
            state: RwLock::new(JobSnapshot::idle()),
            logs: Mutex::new(VecDeque::with_capacity(log_capacity)),
            observers: Mutex::new(HashMap::new()),
            log_capacity,
        }
    }

    /// Replace the current state and push it to every observer
    pub fn publish_state(&self, snapshot: JobSnapshot) {
        *self.state.write() = snapshot.clone();
        self.broadcast(HubEvent::State(snapshot));
    }

    /// Append to the log ring and push to every observer
    pub fn publish_log(&self, entry: LogEntry) {
        {
            let mut logs = self.logs.lock();
            if logs.len() == self.log_capacity {
                logs.pop_front();
            }
            logs.push_back(entry.clone());
        }
        self.broadcast(HubEvent::Log(entry));
    }

    /// Register an observer; the current state is replayed to it first
    pub fn subscribe(&self) -> Observer {
        let (sender, receiver) = mpsc::channel(OBSERVER_QUEUE_DEPTH);
        let id = Uuid::new_v4();

        // A concurrent publish lands either in the replay or in the broadcast
        let mut observers = self.observers.lock();
        // Fresh queue, cannot be full
        let _ = sender.try_send(HubEvent::State(self.current_state()));
        observers.insert(id, sender);
        drop(observers);
        debug!("Observer {} subscribed", id);

        Observer { id, receiver }
    }

    /// Remove an observer; unknown ids are ignored
    pub fn unsubscribe(&self, id: Uuid) {
        if self.observers.lock().remove(&id).is_some() {
            debug!("Observer {} unsubscribed", id);
        }
    }

    pub fn current_state(&self) -> JobSnapshot {
        self.state.read().clone()
    }

    /// Retained log entries, oldest first
    pub fn recent_logs(&self) -> Vec<LogEntry> {
        self.logs.lock().iter().cloned().collect()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }

    fn broadcast(&self, event: HubEvent) {
        // Push outside the lock so registrations never wait on delivery
        let targets: Vec<(Uuid, mpsc::Sender<HubEvent>)> = self
            .observers
            .lock()
            .iter()
            .map(|(id, sender)| (*id, sender.clone()))
            .collect();

        let mut closed = Vec::new();
        for (id, sender) in targets {
            match sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    debug!("Observer {} is lagging, event dropped", id);
                }
                Err(TrySendError::Closed(_)) => closed.push(id),
            }
        }

        if !closed.is_empty() {
            let mut observers = self.observers.lock();
            for id in closed {
                observers.remove(&id);
            }
        }
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}
