//! Simulated payment processor.

use async_trait::async_trait;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{
    AdapterError, AppError, FeeBreakdown, PaymentAdapter, PaymentMethod, PaymentReceipt,
    round_cents,
};

/// Credit card processing fee rate
const CARD_PROCESSING_RATE: f64 = 0.0299;

/// Monthly interest rate applied per installment beyond the first
const INSTALLMENT_INTEREST_RATE: f64 = 0.0199;

/// Largest single charge the simulated processor accepts
const MAX_CHARGE_BRL: f64 = 10_000_000.0;

/// Deterministic simulated payment processor. Pix charges settle at face
/// value; credit card charges carry a processing fee plus installment
/// interest. Charges above the processor limit are declined.
pub struct SimulatedPaymentProcessor;

impl SimulatedPaymentProcessor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn fees(amount_brl: f64, method: PaymentMethod, installments: u32) -> FeeBreakdown {
        match method {
            PaymentMethod::Pix => FeeBreakdown {
                processing_fee_brl: 0.0,
                installment_interest_brl: 0.0,
                total_charged_brl: round_cents(amount_brl),
            },
            PaymentMethod::CreditCard => {
                let processing = round_cents(amount_brl * CARD_PROCESSING_RATE);
                let interest = round_cents(
                    amount_brl * INSTALLMENT_INTEREST_RATE * installments.saturating_sub(1) as f64,
                );
                FeeBreakdown {
                    processing_fee_brl: processing,
                    installment_interest_brl: interest,
                    total_charged_brl: round_cents(amount_brl + processing + interest),
                }
            }
        }
    }
}

impl Default for SimulatedPaymentProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentAdapter for SimulatedPaymentProcessor {
    #[instrument(skip(self))]
    async fn charge(
        &self,
        amount_brl: f64,
        method: PaymentMethod,
        installments: u32,
    ) -> Result<PaymentReceipt, AppError> {
        if amount_brl <= 0.0 {
            return Err(AppError::InvalidRequest(
                "charge amount must be positive".to_string(),
            ));
        }
        if amount_brl > MAX_CHARGE_BRL {
            return Err(AppError::Adapter(AdapterError::PaymentDeclined(format!(
                "amount R$ {:.2} exceeds the processor limit",
                amount_brl
            ))));
        }

        let reference = format!("pay_{}", Uuid::new_v4().simple());
        let fees = Self::fees(amount_brl, method, installments);
        info!(reference = %reference, amount_brl, method = %method, installments, "Payment approved");

        Ok(PaymentReceipt {
            reference,
            amount_brl: round_cents(amount_brl),
            method,
            installments,
            fees,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pix_charges_face_value() {
        let processor = SimulatedPaymentProcessor::new();
        let receipt = processor
            .charge(95_000.0, PaymentMethod::Pix, 1)
            .await
            .unwrap();
        assert_eq!(receipt.amount_brl, 95_000.0);
        assert_eq!(receipt.fees.total_charged_brl, 95_000.0);
        assert_eq!(receipt.fees.processing_fee_brl, 0.0);
    }

    #[tokio::test]
    async fn test_card_installments_accrue_interest() {
        let processor = SimulatedPaymentProcessor::new();
        let receipt = processor
            .charge(10_000.0, PaymentMethod::CreditCard, 3)
            .await
            .unwrap();
        assert_eq!(receipt.fees.processing_fee_brl, 299.0);
        assert_eq!(receipt.fees.installment_interest_brl, 398.0);
        assert_eq!(receipt.fees.total_charged_brl, 10_697.0);
    }

    #[tokio::test]
    async fn test_over_limit_is_declined() {
        let processor = SimulatedPaymentProcessor::new();
        let result = processor
            .charge(20_000_000.0, PaymentMethod::Pix, 1)
            .await;
        assert!(matches!(
            result,
            Err(AppError::Adapter(AdapterError::PaymentDeclined(_)))
        ));
    }
}
