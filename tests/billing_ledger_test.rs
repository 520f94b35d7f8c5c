//! Integration tests for invoices and payments

use caduceus::adapters::database::{BillingTx, LedgerStore};
use caduceus::adapters::memory::MemoryLedgerStore;
use caduceus::core::billing::BillingLedger;
use caduceus::core::events::EventBus;
use caduceus::domain::{
    CaduceusError, DomainEvent, EventKind, Invoice, InvoiceStatus, NewInvoice, NewInvoiceItem,
    NewPayment, PatientId, PaymentMethod, Precondition,
};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};

fn ledger() -> (Arc<BillingLedger>, Arc<EventBus>, MemoryLedgerStore) {
    let store = MemoryLedgerStore::new();
    let bus = Arc::new(EventBus::new("billing-test"));
    let ledger = BillingLedger::new(Arc::new(store.clone()), Arc::clone(&bus));
    (Arc::new(ledger), bus, store)
}

fn invoice_for(total: i64) -> NewInvoice {
    NewInvoice {
        patient_id: Some(PatientId::new("P-100").unwrap()),
        items: vec![NewInvoiceItem::new(
            "Consultation",
            Decimal::ONE,
            Decimal::from(total),
        )],
        insurance_covered_amount: None,
    }
}

fn cash(invoice: &Invoice, amount: i64) -> NewPayment {
    NewPayment::new(invoice.id, Decimal::from(amount), PaymentMethod::Cash, "cashier-1")
}

#[tokio::test]
async fn test_invoice_lifecycle() {
    let (ledger, bus, store) = ledger();
    let received = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&received);
    let _subscription = bus.subscribe(EventKind::PaymentReceived, move |envelope| {
        if let DomainEvent::PaymentReceived(payment) = &envelope.event {
            seen.lock().unwrap().push(payment.amount);
        }
        Ok(())
    });

    let invoice = ledger.generate_invoice(invoice_for(50)).await.unwrap();
    assert_eq!(invoice.total_amount, Decimal::from(50));
    assert_eq!(invoice.status, InvoiceStatus::Unpaid);

    let first = ledger.record_payment(cash(&invoice, 20)).await.unwrap();
    assert_eq!(first.summary.status, InvoiceStatus::Partial);
    assert_eq!(first.summary.outstanding, Decimal::from(30));

    let second = ledger.record_payment(cash(&invoice, 30)).await.unwrap();
    assert_eq!(second.summary.status, InvoiceStatus::Paid);
    assert_eq!(second.summary.outstanding, Decimal::ZERO);

    let err = ledger.record_payment(cash(&invoice, 1)).await.unwrap_err();
    match err.precondition() {
        Some(Precondition::Overpayment {
            paid,
            attempted,
            total,
            ..
        }) => {
            assert_eq!(*paid, Decimal::from(50));
            assert_eq!(*attempted, Decimal::ONE);
            assert_eq!(*total, Decimal::from(50));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(err.status_code(), 400);

    assert_eq!(store.payment_count(), 2);
    assert_eq!(ledger.payments(invoice.id).await.unwrap().len(), 2);
    assert_eq!(
        ledger.invoice(invoice.id).await.unwrap().status,
        InvoiceStatus::Paid
    );
    assert_eq!(
        *received.lock().unwrap(),
        vec![Decimal::from(20), Decimal::from(30)]
    );
}

#[tokio::test]
async fn test_every_published_event_has_an_audit_row() {
    let (ledger, _, store) = ledger();
    let invoice = ledger.generate_invoice(invoice_for(10)).await.unwrap();
    ledger.record_payment(cash(&invoice, 10)).await.unwrap();
    assert!(ledger.record_payment(cash(&invoice, 1)).await.is_err());

    let types: Vec<String> = store
        .audit_entries()
        .into_iter()
        .map(|entry| entry.event_type)
        .collect();
    assert_eq!(types, vec!["InvoiceGenerated", "PaymentReceived"]);
}

#[tokio::test]
async fn test_fractional_amounts_are_exact() {
    let (ledger, _, _) = ledger();
    let invoice = ledger
        .generate_invoice(NewInvoice {
            patient_id: None,
            items: vec![
                NewInvoiceItem::new("Dressing", Decimal::from(3), Decimal::new(10, 1)),
                NewInvoiceItem::new("Suture", Decimal::ONE, Decimal::new(20, 1)),
            ],
            insurance_covered_amount: Some(Decimal::new(15, 1)),
        })
        .await
        .unwrap();
    assert_eq!(invoice.total_amount, Decimal::new(50, 1));
    assert_eq!(invoice.patient_responsible, Decimal::new(35, 1));

    for _ in 0..3 {
        ledger
            .record_payment(NewPayment::new(
                invoice.id,
                Decimal::new(1, 1),
                PaymentMethod::MobileMoney,
                "cashier-1",
            ))
            .await
            .unwrap();
    }
    let summary = ledger.payment_summary(invoice.id).await.unwrap();
    assert_eq!(summary.paid, Decimal::new(3, 1));
    assert_eq!(summary.outstanding, Decimal::new(47, 1));
}

#[tokio::test]
async fn test_concurrent_payments_never_overpay() {
    let (ledger, _, store) = ledger();
    let invoice = ledger.generate_invoice(invoice_for(100)).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..30 {
        let ledger = Arc::clone(&ledger);
        let payment = cash(&invoice, 7);
        handles.push(tokio::spawn(
            async move { ledger.record_payment(payment).await },
        ));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(CaduceusError::PreconditionFailed(Precondition::Overpayment { .. })) => {}
            Err(e) => panic!("unexpected error {e}"),
        }
    }

    // 14 * 7 = 98 fits, a 15th payment would reach 105
    assert_eq!(accepted, 14);
    assert_eq!(store.payment_count(), 14);
    let summary = ledger.payment_summary(invoice.id).await.unwrap();
    assert_eq!(summary.paid, Decimal::from(98));
    assert_eq!(summary.status, InvoiceStatus::Partial);
}

#[tokio::test]
async fn test_store_reads_back_committed_invoice() {
    let (ledger, _, store) = ledger();
    let invoice = ledger.generate_invoice(invoice_for(25)).await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let stored = tx.invoice(invoice.id).await.unwrap().unwrap();
    tx.rollback().await.unwrap();
    assert_eq!(stored, invoice);
}
