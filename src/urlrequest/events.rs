//! Per-request notification channel.

use crate::base::neterror::NetError;
use crate::http::payload::Payload;
use crate::transport::TransportKind;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// A notification published by a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// About to send over this transport.
    Before(TransportKind),
    /// Body handed to the transport.
    Send,
    /// Raw payload as the transport reported it.
    Stream(Payload),
    /// New data for the consumer. Never overlaps earlier data.
    Data(Payload),
    Error(NetError),
    /// Terminal. Carries the error if the exchange failed.
    End(Option<NetError>),
    Destroy,
}

/// Names for subscribing to one kind of [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Before,
    Send,
    Stream,
    Data,
    Error,
    End,
    Destroy,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Before(_) => EventKind::Before,
            Event::Send => EventKind::Send,
            Event::Stream(_) => EventKind::Stream,
            Event::Data(_) => EventKind::Data,
            Event::Error(_) => EventKind::Error,
            Event::End(_) => EventKind::End,
            Event::Destroy => EventKind::Destroy,
        }
    }
}

type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

struct Entry {
    kind: Option<EventKind>,
    listener: Listener,
}

impl Entry {
    fn matches(&self, kind: EventKind) -> bool {
        self.kind.map_or(true, |k| k == kind)
    }
}

/// One event on its way to the listeners it was addressed to.
struct Job {
    event: Event,
    targets: Vec<Listener>,
    epoch: u64,
}

#[derive(Default)]
struct State {
    entries: Vec<Entry>,
    /// Published while nobody listened for their kind.
    held: Vec<Event>,
    queue: VecDeque<Job>,
    dispatching: bool,
    attached: bool,
    closed: bool,
    /// Bumped on close. Jobs from an older epoch are not delivered further.
    epoch: u64,
}

/// Subscribe/publish for one request.
///
/// Listeners run in subscription order, one event at a time and never under
/// a lock, so a callback may call back into the channel. An event emitted
/// from a listener is delivered once the current one is done.
///
/// An event nobody listens for is held and handed to the first listener of
/// its kind, so subscribing after the request started loses nothing. Raw
/// `stream` payloads are held only until the first listener of any kind
/// attaches.
#[derive(Default)]
pub struct EventChannel {
    state: Mutex<State>,
}

impl EventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen for one kind of event.
    pub fn subscribe<F>(&self, kind: EventKind, listener: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.add(Some(kind), Arc::new(listener));
    }

    /// Listen for every event.
    pub fn subscribe_all<F>(&self, listener: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.add(None, Arc::new(listener));
    }

    /// Forward every event into an unbounded channel.
    pub fn receiver(&self) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribe_all(move |event| {
            let _ = tx.send(event.clone());
        });
        rx
    }

    /// Publish `event`. Returns the number of listeners it was addressed
    /// to; zero means it was held or the channel is closed.
    pub fn emit(&self, event: &Event) -> usize {
        let addressed = {
            let mut state = self.lock();
            if state.closed {
                return 0;
            }
            let targets = state.targets(event.kind());
            if targets.is_empty() {
                if event.kind() != EventKind::Stream || !state.attached {
                    state.held.push(event.clone());
                }
                return 0;
            }
            let addressed = targets.len();
            let epoch = state.epoch;
            state.queue.push_back(Job {
                event: event.clone(),
                targets,
                epoch,
            });
            addressed
        };
        self.dispatch();
        addressed
    }

    /// Deliver `event` as the last notification, then close.
    ///
    /// Queued events are dropped, and so is the rest of the event being
    /// delivered right now.
    pub fn close_with(&self, event: &Event) {
        {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            let targets = state.targets(event.kind());
            state.shut();
            let epoch = state.epoch;
            state.queue.push_back(Job {
                event: event.clone(),
                targets,
                epoch,
            });
        }
        self.dispatch();
    }

    /// Drop every listener and refuse new ones.
    pub fn close(&self) {
        let mut state = self.lock();
        if !state.closed {
            state.shut();
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.lock().entries.iter().filter(|e| e.matches(kind)).count()
    }

    /// Events waiting for a listener of their kind.
    pub fn held_count(&self) -> usize {
        self.lock().held.len()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn add(&self, kind: Option<EventKind>, listener: Listener) {
        {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            let entry = Entry { kind, listener };
            let (mine, rest): (Vec<Event>, Vec<Event>) = std::mem::take(&mut state.held)
                .into_iter()
                .partition(|event| entry.matches(event.kind()));
            state.held = rest;
            if !state.attached {
                state.attached = true;
                state.held.retain(|event| event.kind() != EventKind::Stream);
            }

            let epoch = state.epoch;
            for event in mine {
                state.queue.push_back(Job {
                    event,
                    targets: vec![Arc::clone(&entry.listener)],
                    epoch,
                });
            }
            state.entries.push(entry);
        }
        self.dispatch();
    }

    /// Drain the queue unless another caller already is.
    fn dispatch(&self) {
        {
            let mut state = self.lock();
            if state.dispatching {
                return;
            }
            state.dispatching = true;
        }
        let mut guard = Dispatching {
            channel: self,
            done: false,
        };

        loop {
            let job = {
                let mut state = self.lock();
                match state.queue.pop_front() {
                    Some(job) => job,
                    None => {
                        state.dispatching = false;
                        guard.done = true;
                        return;
                    }
                }
            };
            for listener in &job.targets {
                if self.lock().epoch != job.epoch {
                    break;
                }
                listener(&job.event);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl State {
    fn targets(&self, kind: EventKind) -> Vec<Listener> {
        self.entries
            .iter()
            .filter(|entry| entry.matches(kind))
            .map(|entry| Arc::clone(&entry.listener))
            .collect()
    }

    fn shut(&mut self) {
        self.closed = true;
        self.epoch += 1;
        self.entries.clear();
        self.held.clear();
        self.queue.clear();
    }
}

/// Releases the dispatch slot if a listener panics.
struct Dispatching<'a> {
    channel: &'a EventChannel,
    done: bool,
}

impl Drop for Dispatching<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.channel.lock().dispatching = false;
        }
    }
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("EventChannel")
            .field("listeners", &state.entries.len())
            .field("held", &state.held.len())
            .field("closed", &state.closed)
            .finish()
    }
}
