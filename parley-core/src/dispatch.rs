//! Wire dispatcher: decodes relay lines and runs observers by event kind.
//!
//! Observers are registered once, before the relay starts streaming, and are
//! invoked in registration order. One envelope may match several kinds; every
//! matching observer list runs, in the order of [`EventKind::ALL`].

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;

use parley_types::{Envelope, WireError, WireMessage};
use thiserror::Error;

/// Error returned by an observer.
pub type ObserverError = Box<dyn StdError + Send + Sync>;

type Observer = Box<dyn Fn(&Envelope) -> Result<(), ObserverError> + Send + Sync>;
type ErrorObserver = Box<dyn Fn(&(dyn StdError + 'static)) + Send + Sync>;

/// Category of a decoded envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Every decoded envelope.
    Any,
    /// Echo of a message this account sent.
    Sent,
    /// Message from a peer, outside any group.
    Received,
    /// Message from a peer, inside a group.
    GroupReceived,
    /// Delivery or read receipt.
    Receipt,
}

impl EventKind {
    /// All kinds, in dispatch order.
    pub const ALL: [EventKind; 5] = [
        EventKind::Any,
        EventKind::Received,
        EventKind::GroupReceived,
        EventKind::Sent,
        EventKind::Receipt,
    ];

    /// Whether `envelope` belongs to this kind.
    pub fn matches(self, envelope: &Envelope) -> bool {
        match self {
            EventKind::Any => true,
            EventKind::Received => envelope
                .data_message
                .as_ref()
                .is_some_and(|d| d.group_info.is_none()),
            EventKind::GroupReceived => envelope.group_info().is_some(),
            EventKind::Sent => envelope.sent_message().is_some(),
            EventKind::Receipt => envelope.receipt_message.is_some(),
        }
    }

    /// Every kind `envelope` belongs to. Not mutually exclusive.
    pub fn classify(envelope: &Envelope) -> Vec<EventKind> {
        Self::ALL
            .into_iter()
            .filter(|kind| kind.matches(envelope))
            .collect()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Any => "any",
            EventKind::Sent => "sent",
            EventKind::Received => "received",
            EventKind::GroupReceived => "group-received",
            EventKind::Receipt => "receipt",
        };
        f.write_str(name)
    }
}

/// Error from processing one relay line.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The line was not a valid envelope.
    #[error("malformed relay line: {0}")]
    Decode(#[from] WireError),

    /// An observer rejected the envelope; later observers did not run.
    #[error("{kind} observer failed: {source}")]
    Observer {
        /// Kind of the failing observer.
        kind: EventKind,
        /// Error the observer returned.
        #[source]
        source: ObserverError,
    },
}

impl DispatchError {
    /// Whether the stream should stop after this error.
    ///
    /// Malformed lines are skipped; observer failures end the stream.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DispatchError::Observer { .. })
    }
}

/// Event bus from [`EventKind`] to ordered observer lists.
#[derive(Default)]
pub struct Dispatcher {
    observers: HashMap<EventKind, Vec<Observer>>,
    error_observers: Vec<ErrorObserver>,
}

impl Dispatcher {
    /// Create a dispatcher with no observers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer for `kind`.
    pub fn on<F>(&mut self, kind: EventKind, observer: F)
    where
        F: Fn(&Envelope) -> Result<(), ObserverError> + Send + Sync + 'static,
    {
        self.observers
            .entry(kind)
            .or_default()
            .push(Box::new(observer));
    }

    /// Register an observer for errors raised while receiving.
    pub fn on_error<F>(&mut self, observer: F)
    where
        F: Fn(&(dyn StdError + 'static)) + Send + Sync + 'static,
    {
        self.error_observers.push(Box::new(observer));
    }

    /// Number of observers registered for `kind`.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.observers.get(&kind).map_or(0, Vec::len)
    }

    /// Decode one line and dispatch it.
    ///
    /// Blank lines are ignored. Returns the kinds that were dispatched.
    pub fn process_line(&self, line: &[u8]) -> Result<Vec<EventKind>, DispatchError> {
        if line.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        let wire = WireMessage::from_line(line)?;
        self.dispatch(&wire.envelope)
    }

    /// Run every observer whose kind matches `envelope`.
    ///
    /// Stops at the first observer error.
    pub fn dispatch(&self, envelope: &Envelope) -> Result<Vec<EventKind>, DispatchError> {
        let kinds = EventKind::classify(envelope);
        for kind in &kinds {
            let Some(observers) = self.observers.get(kind) else {
                continue;
            };
            for observer in observers {
                observer(envelope).map_err(|source| DispatchError::Observer {
                    kind: *kind,
                    source,
                })?;
            }
        }
        Ok(kinds)
    }

    /// Hand an error to every error observer.
    pub fn publish_error(&self, error: &(dyn StdError + 'static)) {
        for observer in &self.error_observers {
            observer(error);
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: Vec<(EventKind, usize)> = EventKind::ALL
            .into_iter()
            .map(|kind| (kind, self.handler_count(kind)))
            .collect();
        counts.retain(|(_, n)| *n > 0);
        f.debug_struct("Dispatcher")
            .field("observers", &counts)
            .field("error_observers", &self.error_observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn line(envelope: Envelope) -> Vec<u8> {
        WireMessage::from(envelope).to_line().unwrap().into_bytes()
    }

    fn recorder(dispatcher: &mut Dispatcher, kind: EventKind) -> Arc<Mutex<Vec<i64>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        dispatcher.on(kind, move |env| {
            sink.lock().unwrap().push(env.timestamp);
            Ok(())
        });
        seen
    }

    // ===========================================
    // Classification
    // ===========================================

    #[test]
    fn classifies_each_payload() {
        assert_eq!(
            EventKind::classify(&Envelope::received("+1", 1, "hi")),
            vec![EventKind::Any, EventKind::Received]
        );
        assert_eq!(
            EventKind::classify(&Envelope::received("+1", 1, "hi").in_group("g1", "Team")),
            vec![EventKind::Any, EventKind::GroupReceived]
        );
        assert_eq!(
            EventKind::classify(&Envelope::sent("+2", 1, "hi")),
            vec![EventKind::Any, EventKind::Sent]
        );
        assert_eq!(
            EventKind::classify(&Envelope::receipt("+2", 1, true, false, vec![1])),
            vec![EventKind::Any, EventKind::Receipt]
        );
    }

    #[test]
    fn overlapping_payloads_fire_every_matching_kind() {
        let mut env = Envelope::received("+1", 5, "hi");
        env.receipt_message = Envelope::receipt("+1", 5, true, true, vec![4]).receipt_message;

        let mut d = Dispatcher::new();
        let received = recorder(&mut d, EventKind::Received);
        let receipts = recorder(&mut d, EventKind::Receipt);

        let kinds = d.dispatch(&env).unwrap();
        assert_eq!(
            kinds,
            vec![EventKind::Any, EventKind::Received, EventKind::Receipt]
        );
        assert_eq!(*received.lock().unwrap(), vec![5]);
        assert_eq!(*receipts.lock().unwrap(), vec![5]);
    }

    // ===========================================
    // Dispatch
    // ===========================================

    #[test]
    fn observers_run_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut d = Dispatcher::new();
        for n in 0..3 {
            let order = order.clone();
            d.on(EventKind::Sent, move |_| {
                order.lock().unwrap().push(n);
                Ok(())
            });
        }
        d.process_line(&line(Envelope::sent("+2", 1, "x"))).unwrap();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn first_observer_error_aborts_line() {
        let mut d = Dispatcher::new();
        d.on(EventKind::Received, |_| Err("boom".into()));
        let after = recorder(&mut d, EventKind::Received);

        let err = d
            .process_line(&line(Envelope::received("+1", 1, "x")))
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err,
            DispatchError::Observer {
                kind: EventKind::Received,
                ..
            }
        ));
        assert!(after.lock().unwrap().is_empty());
    }

    #[test]
    fn malformed_line_is_not_fatal() {
        let d = Dispatcher::new();
        let err = d.process_line(b"{\"envelope\": nope").unwrap_err();
        assert!(matches!(err, DispatchError::Decode(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn blank_line_is_ignored() {
        let d = Dispatcher::new();
        assert!(d.process_line(b"  \n").unwrap().is_empty());
    }

    #[test]
    fn error_observers_receive_published_errors() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut d = Dispatcher::new();
        d.on_error(move |e| sink.lock().unwrap().push(e.to_string()));

        let err = d.process_line(b"garbage").unwrap_err();
        d.publish_error(&err);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].starts_with("malformed relay line"));
    }

    #[test]
    fn debug_lists_registered_kinds() {
        let mut d = Dispatcher::new();
        d.on(EventKind::Receipt, |_| Ok(()));
        let rendered = format!("{d:?}");
        assert!(rendered.contains("Receipt"));
        assert!(!rendered.contains("Sent"));
    }
}
