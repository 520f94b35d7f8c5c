//! Billing ledger
//!
//! Invoice status is a projection of the payment history: every payment is
//! checked against a fresh `SUM(amount)` under the invoice row lock and is
//! rejected before insert if it would push the paid total above the invoice
//! total. Insurance claim settlement records its payment through the same
//! path, in the same transaction as the claim update.

use super::audit;
use super::events::EventBus;
use super::{finish, finish_read, rejected, require_text};
use crate::adapters::database::{BillingTx, LedgerStore, LedgerTransaction};
use crate::domain::events::{InvoiceGenerated, PaymentReceived};
use crate::domain::{
    CaduceusError, ClaimId, ClaimStatus, DomainEvent, InsuranceClaim, Invoice, InvoiceId,
    InvoiceItem, InvoiceStatus, NewInvoice, NewPayment, Payment, PaymentId, PaymentMethod,
    PaymentSummary, Precondition, Result,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// A committed payment and the invoice position after it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub summary: PaymentSummary,
}

/// Billing service over a transactional store
pub struct BillingLedger {
    store: Arc<dyn LedgerStore>,
    bus: Arc<EventBus>,
}

impl BillingLedger {
    pub fn new(store: Arc<dyn LedgerStore>, bus: Arc<EventBus>) -> Self {
        Self { store, bus }
    }

    /// Create an invoice from line items
    ///
    /// Line totals and the invoice total are computed exactly. The patient's
    /// share is the total less the insurance-covered amount, never below
    /// zero. An invoice whose total is zero is created already PAID.
    ///
    /// # Errors
    ///
    /// Returns [`CaduceusError::InvalidInput`] for an empty item list, a
    /// non-positive quantity, a negative unit price or a negative insurance
    /// amount.
    pub async fn generate_invoice(&self, request: NewInvoice) -> Result<Invoice> {
        let invoice = build_invoice(request).map_err(|e| rejected("generate_invoice", e))?;
        let event = DomainEvent::InvoiceGenerated(InvoiceGenerated {
            invoice_id: invoice.id,
            patient_id: invoice.patient_id.clone(),
            total_amount: invoice.total_amount,
            items: invoice.items.clone(),
            created_at: invoice.created_at,
        });

        let mut tx = self.store.begin().await?;
        let outcome = async {
            tx.insert_invoice(&invoice).await?;
            audit::record_event(&mut *tx, &event, None).await
        }
        .await;
        finish(tx, "generate_invoice", outcome).await?;

        crate::log_ledger_mutation!(
            "invoice",
            &invoice.id,
            "generate_invoice",
            total = %invoice.total_amount,
            status = %invoice.status
        );
        self.bus.publish(event);
        Ok(invoice)
    }

    /// Record a payment against an invoice
    ///
    /// # Errors
    ///
    /// - [`CaduceusError::InvalidInput`] if `amount <= 0`
    /// - [`CaduceusError::NotFound`] if the invoice does not exist
    /// - [`Precondition::InvoiceCancelled`] for a cancelled invoice
    /// - [`Precondition::Overpayment`] if the paid total would exceed the invoice total
    pub async fn record_payment(&self, request: NewPayment) -> Result<PaymentReceipt> {
        validate_payment(&request).map_err(|e| rejected("record_payment", e))?;

        let mut tx = self.store.begin().await?;
        let outcome = apply_payment(&mut *tx, &request).await;
        let (receipt, event) = finish(tx, "record_payment", outcome).await?;

        crate::log_ledger_mutation!(
            "invoice",
            &receipt.payment.invoice_id,
            "record_payment",
            payment_id = %receipt.payment.id,
            amount = %receipt.payment.amount,
            paid = %receipt.summary.paid,
            status = %receipt.summary.status
        );
        self.bus.publish(event);
        Ok(receipt)
    }

    /// Cancel an invoice that has received no payments
    ///
    /// # Errors
    ///
    /// - [`CaduceusError::NotFound`] if the invoice does not exist
    /// - [`Precondition::InvoiceNotCancellable`] unless the invoice is UNPAID
    ///   with no payments
    pub async fn cancel_invoice(&self, invoice_id: InvoiceId, actor: &str) -> Result<Invoice> {
        require_text("actor", actor).map_err(|e| rejected("cancel_invoice", e))?;

        let mut tx = self.store.begin().await?;
        let outcome = async {
            let mut invoice = lock_invoice(&mut *tx, invoice_id).await?;
            let paid = tx.sum_payments(invoice_id).await?;
            if invoice.status != InvoiceStatus::Unpaid || paid > Decimal::ZERO {
                return Err(Precondition::InvoiceNotCancellable {
                    invoice_id: invoice_id.to_string(),
                    status: invoice.status.to_string(),
                }
                .into());
            }

            let now = Utc::now();
            tx.update_invoice_status(invoice_id, InvoiceStatus::Cancelled, now)
                .await?;
            audit::record(
                &mut *tx,
                "InvoiceCancelled",
                json!({ "invoiceId": invoice_id, "totalAmount": invoice.total_amount }),
                Some(actor),
            )
            .await?;

            invoice.status = InvoiceStatus::Cancelled;
            invoice.updated_at = now;
            Ok::<_, CaduceusError>(invoice)
        }
        .await;
        let invoice = finish(tx, "cancel_invoice", outcome).await?;

        crate::log_ledger_mutation!("invoice", &invoice_id, "cancel_invoice");
        Ok(invoice)
    }

    /// Fetch one invoice
    pub async fn invoice(&self, invoice_id: InvoiceId) -> Result<Invoice> {
        let mut tx = self.store.begin().await?;
        let outcome = tx
            .invoice(invoice_id)
            .await
            .and_then(|found| found.ok_or_else(|| CaduceusError::not_found("invoice", invoice_id)));
        finish_read(tx, "invoice", outcome).await
    }

    /// Payments recorded against an invoice, oldest first
    pub async fn payments(&self, invoice_id: InvoiceId) -> Result<Vec<Payment>> {
        let mut tx = self.store.begin().await?;
        let outcome = async {
            if tx.invoice(invoice_id).await?.is_none() {
                return Err(CaduceusError::not_found("invoice", invoice_id));
            }
            tx.payments(invoice_id).await
        }
        .await;
        finish_read(tx, "payments", outcome).await
    }

    /// Total, paid, outstanding and status of an invoice
    pub async fn payment_summary(&self, invoice_id: InvoiceId) -> Result<PaymentSummary> {
        let mut tx = self.store.begin().await?;
        let outcome = async {
            let invoice = tx
                .invoice(invoice_id)
                .await?
                .ok_or_else(|| CaduceusError::not_found("invoice", invoice_id))?;
            let paid = tx.sum_payments(invoice_id).await?;
            Ok::<_, CaduceusError>(summarize(&invoice, paid, invoice.status))
        }
        .await;
        finish_read(tx, "payment_summary", outcome).await
    }

    /// Raise an insurance claim against an invoice
    ///
    /// # Errors
    ///
    /// - [`CaduceusError::InvalidInput`] for a blank provider, a non-positive
    ///   amount, or an amount above the invoice total
    /// - [`CaduceusError::NotFound`] if the invoice does not exist
    /// - [`Precondition::InvoiceCancelled`] for a cancelled invoice
    pub async fn submit_claim(
        &self,
        invoice_id: InvoiceId,
        provider: &str,
        claimed_amount: Decimal,
    ) -> Result<InsuranceClaim> {
        require_text("provider", provider)
            .and_then(|_| require_positive("claimed amount", claimed_amount))
            .map_err(|e| rejected("submit_claim", e))?;

        let mut tx = self.store.begin().await?;
        let outcome = async {
            let invoice = lock_invoice(&mut *tx, invoice_id).await?;
            if invoice.status == InvoiceStatus::Cancelled {
                return Err(Precondition::InvoiceCancelled(invoice_id.to_string()).into());
            }
            if claimed_amount > invoice.total_amount {
                return Err(CaduceusError::InvalidInput(format!(
                    "claimed amount {claimed_amount} exceeds invoice total {}",
                    invoice.total_amount
                )));
            }

            let now = Utc::now();
            let claim = InsuranceClaim {
                id: ClaimId::new(),
                invoice_id,
                provider: provider.trim().to_string(),
                claimed_amount,
                approved_amount: None,
                status: ClaimStatus::Submitted,
                payment_id: None,
                submitted_at: now,
                updated_at: now,
            };
            tx.insert_claim(&claim).await?;
            audit::record(&mut *tx, "ClaimSubmitted", serde_json::to_value(&claim)?, None).await?;
            Ok::<_, CaduceusError>(claim)
        }
        .await;
        let claim = finish(tx, "submit_claim", outcome).await?;

        crate::log_ledger_mutation!(
            "insurance_claim",
            &claim.id,
            "submit_claim",
            invoice_id = %invoice_id,
            amount = %claimed_amount
        );
        Ok(claim)
    }

    /// Approve a submitted claim for `approved_amount`
    ///
    /// # Errors
    ///
    /// - [`CaduceusError::InvalidInput`] if the amount is not positive or
    ///   exceeds the claimed amount
    /// - [`Precondition::InvalidTransition`] unless the claim is SUBMITTED
    pub async fn approve_claim(
        &self,
        claim_id: ClaimId,
        approved_amount: Decimal,
    ) -> Result<InsuranceClaim> {
        require_positive("approved amount", approved_amount)
            .map_err(|e| rejected("approve_claim", e))?;

        let claim = self
            .transition_claim(claim_id, ClaimStatus::Approved, "approve_claim", |claim| {
                if approved_amount > claim.claimed_amount {
                    return Err(CaduceusError::InvalidInput(format!(
                        "approved amount {approved_amount} exceeds claimed amount {}",
                        claim.claimed_amount
                    )));
                }
                claim.approved_amount = Some(approved_amount);
                Ok(())
            })
            .await?;

        crate::log_ledger_mutation!(
            "insurance_claim",
            &claim_id,
            "approve_claim",
            amount = %approved_amount
        );
        Ok(claim)
    }

    /// Reject a submitted claim
    ///
    /// # Errors
    ///
    /// Returns [`Precondition::InvalidTransition`] unless the claim is SUBMITTED
    pub async fn reject_claim(&self, claim_id: ClaimId) -> Result<InsuranceClaim> {
        let claim = self
            .transition_claim(claim_id, ClaimStatus::Rejected, "reject_claim", |_| Ok(()))
            .await?;
        crate::log_ledger_mutation!("insurance_claim", &claim_id, "reject_claim");
        Ok(claim)
    }

    /// Record the approved amount of a claim as an insurance payment
    ///
    /// # Errors
    ///
    /// - [`Precondition::ClaimNotApproved`] unless the claim is APPROVED
    /// - [`Precondition::Overpayment`] if the invoice cannot absorb the amount
    pub async fn settle_claim(&self, claim_id: ClaimId, received_by: &str) -> Result<PaymentReceipt> {
        require_text("received_by", received_by).map_err(|e| rejected("settle_claim", e))?;

        let mut tx = self.store.begin().await?;
        let outcome = async {
            let mut claim = lock_claim(&mut *tx, claim_id).await?;
            let amount = match (claim.status, claim.approved_amount) {
                (ClaimStatus::Approved, Some(amount)) => amount,
                _ => {
                    return Err(Precondition::ClaimNotApproved {
                        claim_id: claim_id.to_string(),
                        status: claim.status.to_string(),
                    }
                    .into())
                }
            };

            let request = NewPayment::new(
                claim.invoice_id,
                amount,
                PaymentMethod::Insurance,
                received_by,
            )
            .with_provider(claim.provider.clone())
            .with_reference(claim_id.to_string());
            let (receipt, event) = apply_payment(&mut *tx, &request).await?;

            claim.status = ClaimStatus::Paid;
            claim.payment_id = Some(receipt.payment.id);
            claim.updated_at = Utc::now();
            tx.update_claim(&claim).await?;
            Ok::<_, CaduceusError>((receipt, event))
        }
        .await;
        let (receipt, event) = finish(tx, "settle_claim", outcome).await?;

        crate::log_ledger_mutation!(
            "insurance_claim",
            &claim_id,
            "settle_claim",
            payment_id = %receipt.payment.id,
            amount = %receipt.payment.amount
        );
        self.bus.publish(event);
        Ok(receipt)
    }

    async fn transition_claim<F>(
        &self,
        claim_id: ClaimId,
        next: ClaimStatus,
        operation: &'static str,
        update: F,
    ) -> Result<InsuranceClaim>
    where
        F: FnOnce(&mut InsuranceClaim) -> Result<()> + Send,
    {
        let mut tx = self.store.begin().await?;
        let outcome = async {
            let mut claim = lock_claim(&mut *tx, claim_id).await?;
            if !claim.status.can_transition_to(next) {
                return Err(Precondition::InvalidTransition {
                    entity: "insurance claim",
                    from: claim.status.to_string(),
                    to: next.to_string(),
                }
                .into());
            }
            update(&mut claim)?;
            claim.status = next;
            claim.updated_at = Utc::now();
            tx.update_claim(&claim).await?;
            audit::record(
                &mut *tx,
                "ClaimStatusChanged",
                json!({ "claimId": claim_id, "status": next }),
                None,
            )
            .await?;
            Ok::<_, CaduceusError>(claim)
        }
        .await;
        finish(tx, operation, outcome).await
    }
}

/// Insert a payment if the invoice can absorb it and refresh the status
///
/// Runs inside the caller's transaction; the invoice row stays locked until
/// it ends.
async fn apply_payment(
    tx: &mut dyn LedgerTransaction,
    request: &NewPayment,
) -> Result<(PaymentReceipt, DomainEvent)> {
    let invoice = lock_invoice(tx, request.invoice_id).await?;
    if invoice.status == InvoiceStatus::Cancelled {
        return Err(Precondition::InvoiceCancelled(invoice.id.to_string()).into());
    }

    let paid = tx.sum_payments(invoice.id).await?;
    if paid + request.amount > invoice.total_amount {
        return Err(Precondition::Overpayment {
            invoice_id: invoice.id.to_string(),
            paid,
            attempted: request.amount,
            total: invoice.total_amount,
        }
        .into());
    }

    let now = Utc::now();
    let payment = Payment {
        id: PaymentId::new(),
        invoice_id: invoice.id,
        amount: request.amount,
        method: request.method,
        provider: request.provider.clone(),
        reference: request.reference.clone(),
        received_by: request.received_by.clone(),
        received_at: now,
    };
    tx.insert_payment(&payment).await?;

    let paid = tx.sum_payments(invoice.id).await?;
    let status = InvoiceStatus::derive(paid, invoice.total_amount, invoice.status);
    if status != invoice.status {
        tx.update_invoice_status(invoice.id, status, now).await?;
    }

    let event = DomainEvent::PaymentReceived(PaymentReceived {
        payment_id: payment.id,
        invoice_id: invoice.id,
        amount: payment.amount,
        method: payment.method,
        provider: payment.provider.clone(),
        received_at: payment.received_at,
    });
    audit::record_event(tx, &event, Some(payment.received_by.as_str())).await?;

    let summary = summarize(&invoice, paid, status);
    Ok((PaymentReceipt { payment, summary }, event))
}

async fn lock_invoice(tx: &mut dyn LedgerTransaction, invoice_id: InvoiceId) -> Result<Invoice> {
    tx.lock_invoice(invoice_id)
        .await?
        .ok_or_else(|| CaduceusError::not_found("invoice", invoice_id))
}

async fn lock_claim(tx: &mut dyn LedgerTransaction, claim_id: ClaimId) -> Result<InsuranceClaim> {
    tx.lock_claim(claim_id)
        .await?
        .ok_or_else(|| CaduceusError::not_found("insurance claim", claim_id))
}

fn summarize(invoice: &Invoice, paid: Decimal, status: InvoiceStatus) -> PaymentSummary {
    PaymentSummary {
        invoice_id: invoice.id,
        total_amount: invoice.total_amount,
        paid,
        outstanding: (invoice.total_amount - paid).max(Decimal::ZERO),
        status,
    }
}

fn build_invoice(request: NewInvoice) -> Result<Invoice> {
    if request.items.is_empty() {
        return Err(CaduceusError::InvalidInput(
            "invoice must have at least one item".to_string(),
        ));
    }

    let mut items = Vec::with_capacity(request.items.len());
    for (index, item) in request.items.into_iter().enumerate() {
        require_text("item description", &item.description)?;
        if item.quantity <= Decimal::ZERO {
            return Err(CaduceusError::InvalidInput(format!(
                "item {index}: quantity must be positive, got {}",
                item.quantity
            )));
        }
        if item.unit_price < Decimal::ZERO {
            return Err(CaduceusError::InvalidInput(format!(
                "item {index}: unit price cannot be negative, got {}",
                item.unit_price
            )));
        }
        items.push(InvoiceItem {
            line_total: item.quantity * item.unit_price,
            description: item.description,
            quantity: item.quantity,
            unit_price: item.unit_price,
        });
    }

    let insurance = request.insurance_covered_amount.unwrap_or(Decimal::ZERO);
    if insurance < Decimal::ZERO {
        return Err(CaduceusError::InvalidInput(format!(
            "insurance covered amount cannot be negative, got {insurance}"
        )));
    }

    let total_amount: Decimal = items.iter().map(|item| item.line_total).sum();
    let status = if total_amount.is_zero() {
        InvoiceStatus::Paid
    } else {
        InvoiceStatus::Unpaid
    };

    let now = Utc::now();
    Ok(Invoice {
        id: InvoiceId::new(),
        patient_id: request.patient_id,
        items,
        total_amount,
        insurance_covered_amount: insurance,
        patient_responsible: (total_amount - insurance).max(Decimal::ZERO),
        status,
        created_at: now,
        updated_at: now,
    })
}

fn require_positive(field: &str, amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(CaduceusError::InvalidInput(format!(
            "{field} must be positive, got {amount}"
        )));
    }
    Ok(())
}

fn validate_payment(request: &NewPayment) -> Result<()> {
    require_positive("payment amount", request.amount)?;
    require_text("received_by", &request.received_by)
}
