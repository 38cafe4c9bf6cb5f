//! Incremental delivery.
//!
//! Turns the readiness signals of any transport into the notification
//! sequence a consumer sees: `stream`/`data` while the response arrives,
//! then an optional `error` and exactly one `end`.
//!
//! Cumulative transports report the whole response so far on every signal.
//! The engine keeps an offset cursor and hands out only what lies past it,
//! so consecutive `data` payloads never overlap and never skip. Delta
//! transports (multipart XHR, fetch readers) are forwarded verbatim.

use crate::base::neterror::NetError;
use crate::host::ReadySignal;
use crate::http::payload::Payload;
use crate::http::status::normalize_status;
use crate::transport::SliceMode;
use crate::urlrequest::events::Event;

#[derive(Debug)]
pub struct DeliveryEngine {
    slicing: SliceMode,
    streaming: bool,
    offset: usize,
    /// Delta chunks held back until completion when not streaming.
    buffered: Option<Payload>,
    /// Last cumulative snapshot, for transports without a final body.
    latest: Option<Payload>,
    status: Option<u16>,
    finished: bool,
}

impl DeliveryEngine {
    pub fn new(slicing: SliceMode, streaming: bool) -> Self {
        Self {
            slicing,
            streaming,
            offset: 0,
            buffered: None,
            latest: None,
            status: None,
            finished: false,
        }
    }

    /// Bytes already handed to the consumer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Remapped status, once completed.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn on_signal(&mut self, signal: ReadySignal) -> Vec<Event> {
        if self.finished {
            return Vec::new();
        }

        match signal {
            ReadySignal::Connected => Vec::new(),
            ReadySignal::Progress(payload) => self.on_progress(payload),
            ReadySignal::Completed { status, body } => self.on_complete(status, body),
            ReadySignal::TimedOut => self.fail(NetError::TimedOut),
            ReadySignal::Errored(e) => self.fail(e),
        }
    }

    /// The signal source went away without a terminal signal.
    pub fn on_disconnect(&mut self) -> Vec<Event> {
        if self.finished {
            return Vec::new();
        }
        self.fail(NetError::ConnectionClosed)
    }

    fn on_progress(&mut self, payload: Payload) -> Vec<Event> {
        let mut events = vec![Event::Stream(payload.clone())];
        match (self.slicing, self.streaming) {
            (SliceMode::Delta, true) => {
                if let Some(chunk) = self.take_delta(payload) {
                    events.push(Event::Data(chunk));
                }
            }
            (SliceMode::Delta, false) => match &mut self.buffered {
                Some(buffer) => buffer.append(payload),
                None => self.buffered = Some(payload),
            },
            (SliceMode::Cumulative, true) => {
                if let Some(chunk) = self.take_new(&payload) {
                    events.push(Event::Data(chunk));
                }
                self.latest = Some(payload);
            }
            (SliceMode::Cumulative, false) => self.latest = Some(payload),
        }
        events
    }

    fn on_complete(&mut self, status: u16, body: Option<Payload>) -> Vec<Event> {
        let rest = match self.slicing {
            SliceMode::Delta => self.buffered.take().and_then(|b| self.take_delta(b)),
            SliceMode::Cumulative => body
                .or_else(|| self.latest.take())
                .and_then(|full| self.take_new(&full)),
        };

        self.status = Some(normalize_status(status));
        self.finished = true;

        let mut events = Vec::with_capacity(2);
        if let Some(chunk) = rest {
            events.push(Event::Data(chunk));
        }
        events.push(Event::End(None));
        events
    }

    fn fail(&mut self, error: NetError) -> Vec<Event> {
        self.finished = true;
        vec![Event::Error(error.clone()), Event::End(Some(error))]
    }

    fn take_delta(&mut self, chunk: Payload) -> Option<Payload> {
        if chunk.is_empty() {
            return None;
        }
        self.offset += chunk.len();
        Some(chunk)
    }

    /// Everything in `snapshot` past the offset. The offset moves to the
    /// end of the snapshot before the chunk is returned.
    fn take_new(&mut self, snapshot: &Payload) -> Option<Payload> {
        let chunk = snapshot.slice_from(self.offset)?;
        self.offset = snapshot.len();
        (!chunk.is_empty()).then_some(chunk)
    }
}
