use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::AuditEvent;

/// Envelope wrapping an audit event with the time it was emitted
#[derive(Debug, Clone)]
pub struct AuditEventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
}

impl AuditEventEnvelope {
    fn now(event: AuditEvent) -> Self {
        Self {
            timestamp: crate::db::now(),
            event,
        }
    }
}

/// Handle for emitting audit events
///
/// Cheap to clone. Events go through a bounded channel to the `AuditWriter`;
/// a failed send is logged and never fails the caller.
#[derive(Clone)]
pub struct AuditHandle {
    tx: mpsc::Sender<AuditEventEnvelope>,
}

impl AuditHandle {
    pub fn new(tx: mpsc::Sender<AuditEventEnvelope>) -> Self {
        Self { tx }
    }

    /// Emit an event, waiting for channel capacity.
    pub async fn emit(&self, event: AuditEvent) {
        let event_type = event.event_type();
        if let Err(e) = self.tx.send(AuditEventEnvelope::now(event)).await {
            tracing::error!(event_type, "Failed to emit audit event: {}", e);
        }
    }

    /// Emit from synchronous code. Must not be called from inside the runtime.
    pub fn emit_blocking(&self, event: AuditEvent) {
        let event_type = event.event_type();
        if let Err(e) = self.tx.blocking_send(AuditEventEnvelope::now(event)) {
            tracing::error!(event_type, "Failed to emit audit event: {}", e);
        }
    }

    /// Emit without waiting. Returns false if the channel is full or closed.
    pub fn try_emit(&self, event: AuditEvent) -> bool {
        let event_type = event.event_type();
        match self.tx.try_send(AuditEventEnvelope::now(event)) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(event_type, "Failed to emit audit event: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discarded(item_id: i64) -> AuditEvent {
        AuditEvent::QueueItemDiscarded {
            item_id,
            discarded_by: "mgr".to_string(),
        }
    }

    #[tokio::test]
    async fn test_emit_event() {
        let (tx, mut rx) = mpsc::channel(10);
        let handle = AuditHandle::new(tx);

        handle.emit(discarded(1)).await;

        let envelope = rx.recv().await.expect("event");
        assert!(matches!(
            envelope.event,
            AuditEvent::QueueItemDiscarded { item_id: 1, .. }
        ));
    }

    #[test]
    fn test_try_emit_full_channel() {
        let (tx, _rx) = mpsc::channel(1);
        let handle = AuditHandle::new(tx);

        assert!(handle.try_emit(discarded(1)));
        assert!(!handle.try_emit(discarded(2)));
    }

    #[tokio::test]
    async fn test_emit_closed_channel_does_not_panic() {
        let (tx, rx) = mpsc::channel::<AuditEventEnvelope>(10);
        let handle = AuditHandle::new(tx);
        drop(rx);

        handle.emit(discarded(1)).await;
        assert!(!handle.try_emit(discarded(2)));
    }

    #[test]
    fn test_envelope_has_timestamp() {
        let (tx, mut rx) = mpsc::channel(10);
        let handle = AuditHandle::new(tx);

        let before = crate::db::now();
        handle.try_emit(discarded(1));
        let after = Utc::now();

        let envelope = rx.try_recv().expect("event");
        assert!(envelope.timestamp >= before);
        assert!(envelope.timestamp <= after);
    }
}
