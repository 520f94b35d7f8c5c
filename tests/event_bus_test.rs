//! Integration tests for the event bus and external broadcast

use async_trait::async_trait;
use caduceus::adapters::events::EventChannel;
use caduceus::core::events::EventBus;
use caduceus::domain::events::{PaymentReceived, VisitChanged};
use caduceus::domain::{
    DomainEvent, EventEnvelope, EventKind, InvoiceId, PaymentId, PaymentMethod, Result, VisitId,
};
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Channel that hands every broadcast to the peer buses, like pub/sub would
#[derive(Default)]
struct LoopbackChannel {
    peers: Mutex<Vec<Arc<EventBus>>>,
    sent: Mutex<Vec<serde_json::Value>>,
}

#[async_trait]
impl EventChannel for LoopbackChannel {
    async fn broadcast(&self, envelope: &EventEnvelope) -> Result<()> {
        let wire = serde_json::to_value(envelope)?;
        self.sent.lock().push(wire.clone());

        let received: EventEnvelope = serde_json::from_value(wire)?;
        let peers = self.peers.lock().clone();
        for peer in peers {
            peer.deliver_remote(&received);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "loopback"
    }
}

fn visit_created() -> DomainEvent {
    DomainEvent::VisitCreated(VisitChanged {
        visit_id: VisitId::new(),
        at: Utc::now(),
    })
}

async fn wait_for(counter: &AtomicUsize, expected: usize) {
    for _ in 0..100 {
        if counter.load(Ordering::SeqCst) >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_broadcast_reaches_other_instances_once() {
    let channel = Arc::new(LoopbackChannel::default());
    let a = Arc::new(EventBus::with_channel("ward-a", channel.clone()));
    let b = Arc::new(EventBus::with_channel("ward-b", channel.clone()));
    channel.peers.lock().extend([Arc::clone(&a), Arc::clone(&b)]);

    let on_a = Arc::new(AtomicUsize::new(0));
    let on_b = Arc::new(AtomicUsize::new(0));
    let (count_a, count_b) = (Arc::clone(&on_a), Arc::clone(&on_b));
    let _sa = a.subscribe(EventKind::VisitCreated, move |_| {
        count_a.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    let _sb = b.subscribe(EventKind::VisitCreated, move |envelope| {
        assert_eq!(envelope.origin, "ward-a");
        count_b.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let report = a.publish(visit_created());
    assert_eq!(report.delivered, 1);

    wait_for(&on_b, 1).await;
    assert_eq!(on_a.load(Ordering::SeqCst), 1);
    assert_eq!(on_b.load(Ordering::SeqCst), 1);
    // remote deliveries are not re-broadcast
    assert_eq!(channel.sent.lock().len(), 1);
}

#[tokio::test]
async fn test_wire_format_is_name_and_payload() {
    let channel = Arc::new(LoopbackChannel::default());
    let bus = EventBus::with_channel("cashier-desk", channel.clone());
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&delivered);
    let _sub = bus.subscribe(EventKind::PaymentReceived, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    bus.publish(DomainEvent::PaymentReceived(PaymentReceived {
        payment_id: PaymentId::new(),
        invoice_id: InvoiceId::new(),
        amount: Decimal::new(2050, 2),
        method: PaymentMethod::Card,
        provider: None,
        received_at: Utc::now(),
    }));

    for _ in 0..100 {
        if !channel.sent.lock().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let sent = channel.sent.lock().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["origin"], "cashier-desk");
    assert_eq!(sent[0]["event"]["name"], "PaymentReceived");
    assert!(sent[0]["event"]["payload"]["invoiceId"].is_string());
    assert_eq!(delivered.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_handler_failures_are_isolated() {
    let bus = EventBus::new("ward-a");
    let reached = Arc::new(AtomicUsize::new(0));

    let _failing = bus.subscribe(EventKind::VisitCreated, |_| Err("printer offline".into()));
    let _panicking = bus.subscribe_all(|_| panic!("bad handler"));
    let counter = Arc::clone(&reached);
    let _last = bus.subscribe(EventKind::VisitCreated, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let report = bus.publish(visit_created());
    assert_eq!(report.failed, 2);
    assert_eq!(report.delivered, 1);
    assert_eq!(reached.load(Ordering::SeqCst), 1);

    // the bus keeps working after a panic
    assert_eq!(bus.publish(visit_created()).delivered, 1);
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let bus = EventBus::new("ward-a");
    let reached = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&reached);
    let subscription = bus.subscribe(EventKind::VisitCreated, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    bus.publish(visit_created());
    assert!(subscription.unsubscribe());
    bus.publish(visit_created());

    assert_eq!(reached.load(Ordering::SeqCst), 1);
    assert_eq!(bus.handler_count(EventKind::VisitCreated), 0);
}
