//! In-process bus carrying lifecycle events to subscribers and a replay ring.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::broadcast::{self, Sender};
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::payloads::{DEFAULT_REPLAY_CAPACITY, Event, EventEnvelope, EventId};

/// Live stream of envelopes handed to subscribers.
pub type EventStream = BroadcastStream<EventEnvelope>;

/// Id assignment and retention happen under one lock so the ring stays ordered.
struct Ring {
    next_id: EventId,
    capacity: usize,
    envelopes: VecDeque<EventEnvelope>,
}

impl Ring {
    fn stamp(&mut self, event: Event) -> EventEnvelope {
        let envelope = EventEnvelope {
            id: self.next_id,
            timestamp: Utc::now(),
            event,
        };
        self.next_id = self.next_id.saturating_add(1);
        if self.envelopes.len() == self.capacity {
            self.envelopes.pop_front();
        }
        self.envelopes.push_back(envelope.clone());
        envelope
    }
}

/// Cloneable handle shared by the pipeline, the query job, and observers.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    ring: Arc<Mutex<Ring>>,
}

impl EventBus {
    /// Bus retaining at most `capacity` events; zero is raised to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            ring: Arc::new(Mutex::new(Ring {
                next_id: 1,
                capacity,
                envelopes: VecDeque::with_capacity(capacity),
            })),
        }
    }

    /// Bus with [`DEFAULT_REPLAY_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Stream of events published after this call.
    #[must_use]
    pub fn subscribe(&self) -> EventStream {
        BroadcastStream::new(self.sender.subscribe())
    }

    /// Stamp, retain, and broadcast `event`. Never blocks and never fails;
    /// lagging subscribers miss events rather than slowing the publisher.
    pub fn publish(&self, event: Event) -> EventId {
        let envelope = self.ring().stamp(event);
        let id = envelope.id;
        let _ = self.sender.send(envelope);
        id
    }

    /// Id of the newest retained event.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        self.ring().envelopes.back().map(|envelope| envelope.id)
    }

    /// Retained events with an id greater than `id`, oldest first.
    #[must_use]
    pub fn backlog_since(&self, id: EventId) -> Vec<EventEnvelope> {
        self.ring()
            .envelopes
            .iter()
            .filter(|envelope| envelope.id > id)
            .cloned()
            .collect()
    }

    /// Retained events of one invocation, oldest first.
    #[must_use]
    pub fn invocation_events(&self, invocation_id: Uuid) -> Vec<Event> {
        self.ring()
            .envelopes
            .iter()
            .filter(|envelope| envelope.event.invocation_id() == Some(invocation_id))
            .map(|envelope| envelope.event.clone())
            .collect()
    }

    fn ring(&self) -> MutexGuard<'_, Ring> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use tokio_stream::StreamExt;

    fn started(invocation_id: Uuid, records: usize) -> Event {
        Event::InvocationStarted {
            invocation_id,
            records,
        }
    }

    #[test]
    fn backlog_starts_after_the_given_id() {
        let bus = EventBus::with_capacity(4);
        let first = bus.publish(started(Uuid::nil(), 1));
        let second = bus.publish(Event::InvocationCompleted {
            invocation_id: Uuid::nil(),
            succeeded: 1,
            failed: 0,
        });

        assert_eq!(bus.last_event_id(), Some(second));
        let backlog = bus.backlog_since(first);
        assert_eq!(backlog.len(), 1);
        assert_eq!(backlog[0].id, second);
    }

    #[test]
    fn full_ring_drops_oldest() {
        let bus = EventBus::with_capacity(2);
        for records in 0..5 {
            bus.publish(started(Uuid::nil(), records));
        }
        let ids: Vec<_> = bus.backlog_since(0).iter().map(|env| env.id).collect();
        assert_eq!(ids, vec![4, 5]);
    }

    #[test]
    fn invocation_events_filter_by_correlation_id() {
        let bus = EventBus::new();
        let ours = Uuid::from_u128(1);
        bus.publish(started(ours, 2));
        bus.publish(started(Uuid::from_u128(2), 1));
        bus.publish(Event::QuerySubmitted {
            execution_id: "exec-1".into(),
            date: "2019-03-04".into(),
        });
        bus.publish(Event::InvocationCompleted {
            invocation_id: ours,
            succeeded: 2,
            failed: 0,
        });

        let events = bus.invocation_events(ours);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], started(ours, 2));
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() -> Result<()> {
        let bus = EventBus::new();
        let mut stream = bus.subscribe();
        let id = bus.publish(Event::QuerySubmitted {
            execution_id: "exec-1".into(),
            date: "2019-03-04".into(),
        });
        let envelope = stream
            .next()
            .await
            .ok_or_else(|| anyhow!("stream closed"))??;
        assert_eq!(envelope.id, id);
        assert!(matches!(envelope.event, Event::QuerySubmitted { .. }));
        Ok(())
    }
}
