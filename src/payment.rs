//! Payment view-model: processing, status checks, history and receipts.

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::dashboard::{PaymentType, TransactionItem, TransactionStatus};
use crate::error::Error;
use crate::http::{ApiClient, Body, segment, with_query};
use crate::notify::Notification;

/// Input of [`PaymentStore::process_payment`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentRequest {
    pub pay_type: String,
    pub deliver_to: String,
    pub amount: f64,
    /// Defaults to `deliver_to` when absent.
    pub reference: Option<String>,
}

impl PaymentRequest {
    /// Local checks run before any request is sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for missing fields or a non-positive amount.
    pub fn validate(&self) -> Result<(), Error> {
        let amount_missing = self.amount == 0.0 || self.amount.is_nan();
        if self.pay_type.trim().is_empty() || self.deliver_to.trim().is_empty() || amount_missing {
            return Err(Error::Validation("Please fill in all required fields".into()));
        }
        if self.amount < 0.0 {
            return Err(Error::Validation("Amount must be greater than 0".into()));
        }
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessPaymentBody<'a> {
    reference: &'a str,
    amount: f64,
    pay_type: String,
    deliver_to: &'a str,
}

/// Server answer to a process or retry call. Kept as JSON; only a few
/// fields are read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentResult(pub JsonValue);

impl PaymentResult {
    #[must_use]
    pub fn transaction(&self) -> Option<&JsonValue> {
        self.0.get("transaction").filter(|t| !t.is_null())
    }

    /// MoPay transaction id, whether the server sent it as a string or a number.
    #[must_use]
    pub fn mopay_transaction_id(&self) -> Option<String> {
        match self.0.get("mopayTransactionId")? {
            JsonValue::String(id) if !id.is_empty() => Some(id.clone()),
            JsonValue::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.0
            .get("message")
            .and_then(JsonValue::as_str)
            .filter(|m| !m.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentHistoryParams {
    pub payment_type: Option<PaymentType>,
    pub status: Option<TransactionStatus>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub limit: Option<u32>,
}

/// A downloaded PDF receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub filename: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[non_exhaustive]
pub struct PaymentState {
    pub payment: Option<PaymentResult>,
    pub transaction: Option<JsonValue>,
    pub payment_status: Option<JsonValue>,
    pub history: Vec<TransactionItem>,
    pub loading: bool,
    pub error: Option<String>,
    pub processing: bool,
    pub mopay_transaction_id: Option<String>,
}

#[derive(Clone)]
pub struct PaymentStore {
    api: ApiClient,
    state: Arc<RwLock<PaymentState>>,
}

impl PaymentStore {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            state: Arc::default(),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> PaymentState {
        self.read(PaymentState::clone)
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.read(|s| s.loading)
    }

    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.read(|s| s.processing)
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.read(|s| s.error.clone())
    }

    #[must_use]
    pub fn mopay_transaction_id(&self) -> Option<String> {
        self.read(|s| s.mopay_transaction_id.clone())
    }

    /// Validates and submits a payment.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] before any request, then pipeline or
    /// [`Error::Api`] errors.
    pub async fn process_payment(&self, request: &PaymentRequest) -> Result<PaymentResult, Error> {
        self.run("process_payment", "Failed to process payment", true, async {
            request.validate()?;

            let reference = request
                .reference
                .as_deref()
                .filter(|r| !r.is_empty())
                .unwrap_or(&request.deliver_to);
            let body = Body::json(&ProcessPaymentBody {
                reference,
                amount: request.amount,
                pay_type: request.pay_type.to_lowercase(),
                deliver_to: &request.deliver_to,
            })?;

            let result: PaymentResult = self
                .api
                .post("/payments/process", Some(body))
                .await?
                .into_data("Payment processing failed")?;

            self.write(|s| {
                if let Some(transaction) = result.transaction() {
                    s.transaction = Some(transaction.clone());
                }
                if let Some(id) = result.mopay_transaction_id() {
                    s.mopay_transaction_id = Some(id);
                }
                s.payment = Some(result.clone());
            });
            let message = result.message().unwrap_or("Payment processed successfully!");
            self.api.notify(Notification::success(message));
            Ok::<_, Error>(result)
        })
        .await
    }

    /// # Errors
    ///
    /// [`Error::Validation`] for an empty reference, then pipeline or
    /// [`Error::Api`] errors.
    pub async fn check_payment_status(&self, reference: &str) -> Result<JsonValue, Error> {
        self.run("check_payment_status", "Failed to check payment status", false, async {
            if reference.is_empty() {
                return Err(Error::Validation("Payment reference is required".into()));
            }
            let status: JsonValue = self
                .api
                .get(&format!("/payments/status/{}", segment(reference)))
                .await?
                .into_data("Failed to check payment status")?;
            self.write(|s| s.payment_status = Some(status.clone()));
            Ok::<_, Error>(status)
        })
        .await
    }

    /// # Errors
    ///
    /// [`Error::Validation`] for an empty reference, then pipeline or
    /// [`Error::Api`] errors.
    pub async fn fetch_transaction_by_reference(&self, reference: &str) -> Result<JsonValue, Error> {
        self.run("fetch_transaction_by_reference", "Failed to fetch transaction", false, async {
            if reference.is_empty() {
                return Err(Error::Validation("Transaction reference is required".into()));
            }
            let transaction: JsonValue = self
                .api
                .get(&format!("/dashboard/transactions/{}", segment(reference)))
                .await?
                .into_data("Failed to fetch transaction")?;
            self.write(|s| s.transaction = Some(transaction.clone()));
            Ok::<_, Error>(transaction)
        })
        .await
    }

    /// Loads payment history. Failures are recorded and swallowed.
    pub async fn fetch_payment_history(&self, params: &PaymentHistoryParams) {
        let path = with_query(
            "/dashboard/transactions",
            &[
                ("paymentType", params.payment_type.map(|t| t.as_str().to_owned())),
                ("status", params.status.map(|s| s.as_str().to_owned())),
                ("dateFrom", params.date_from.clone()),
                ("dateTo", params.date_to.clone()),
                ("limit", params.limit.filter(|n| *n > 0).map(|n| n.to_string())),
            ],
        );

        let _ = self
            .run("fetch_payment_history", "Failed to fetch payment history", false, async {
                let history = self
                    .api
                    .get::<Vec<TransactionItem>>(&path)
                    .await?
                    .ensure_success("Failed to fetch payment history")?
                    .unwrap_or_default();
                self.write(|s| s.history = history);
                Ok::<_, Error>(())
            })
            .await;
    }

    /// # Errors
    ///
    /// Pipeline or [`Error::Api`] errors.
    pub async fn retry_payment(&self, reference: &str) -> Result<PaymentResult, Error> {
        self.run("retry_payment", "Failed to retry payment", true, async {
            let result: PaymentResult = self
                .api
                .post(&format!("/payments/retry/{}", segment(reference)), None)
                .await?
                .into_data("Payment retry failed")?;
            self.write(|s| {
                if let Some(transaction) = result.transaction() {
                    s.transaction = Some(transaction.clone());
                }
                s.payment = Some(result.clone());
            });
            self.api
                .notify(Notification::success("Payment retry initiated successfully"));
            Ok::<_, Error>(result)
        })
        .await
    }

    /// # Errors
    ///
    /// Pipeline or [`Error::Api`] errors.
    pub async fn cancel_payment(&self, reference: &str) -> Result<(), Error> {
        self.run("cancel_payment", "Failed to cancel payment", false, async {
            self.api
                .post::<JsonValue>(&format!("/payments/cancel/{}", segment(reference)), None)
                .await?
                .ensure_success("Payment cancellation failed")?;
            self.api
                .notify(Notification::success("Payment cancelled successfully"));
            Ok::<_, Error>(())
        })
        .await
    }

    /// Downloads the PDF receipt for `reference`, named after `kind`.
    ///
    /// `None` when the server did not answer with a file or the request failed.
    pub async fn download_receipt(&self, reference: &str, kind: &str) -> Option<Receipt> {
        tracing::debug!(reference = %reference, kind = %kind, "Downloading receipt");
        self.run("download_receipt", "Failed to download receipt", false, async {
            let bytes = self
                .api
                .download(&format!("/payments/receipt/{}", segment(reference)))
                .await?;
            let receipt = bytes.map(|bytes| Receipt {
                filename: format!("{kind}-INVOICE-{reference}.pdf"),
                bytes,
            });
            if receipt.is_some() {
                self.api
                    .notify(Notification::success("Receipt downloaded successfully"));
            }
            Ok::<_, Error>(receipt)
        })
        .await
        .ok()
        .flatten()
    }

    /// Clears the current payment, transaction, status, error and MoPay id.
    pub fn reset(&self) {
        self.write(|s| {
            s.payment = None;
            s.transaction = None;
            s.payment_status = None;
            s.error = None;
            s.mopay_transaction_id = None;
        });
    }

    async fn run<T>(
        &self,
        operation: &'static str,
        default_error: &str,
        processing: bool,
        op: impl Future<Output = Result<T, Error>>,
    ) -> Result<T, Error> {
        self.write(|s| {
            s.loading = true;
            s.processing |= processing;
            s.error = None;
        });

        let result = op.await;

        self.write(|s| {
            s.loading = false;
            if processing {
                s.processing = false;
            }
        });

        result.inspect_err(|e| {
            tracing::error!(error = %e, operation, "Payment request failed");
            let message = e.user_message(default_error);
            self.write(|s| s.error = Some(message.clone()));
            if !e.is_surfaced() {
                self.api.notify(Notification::error(message));
            }
        })
    }

    fn read<R>(&self, f: impl FnOnce(&PaymentState) -> R) -> R {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write<R>(&self, f: impl FnOnce(&mut PaymentState) -> R) -> R {
        f(&mut self.state.write().unwrap_or_else(PoisonError::into_inner))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::notify::AlertKind;
    use crate::testing::Harness;

    fn request() -> PaymentRequest {
        PaymentRequest {
            pay_type: "ELECTRICITY".into(),
            deliver_to: "0412345678".into(),
            amount: 5000.0,
            reference: None,
        }
    }

    #[tokio::test]
    async fn validation_precedes_network() {
        let h = Harness::new();
        let store = PaymentStore::new(h.api.clone());

        let missing = PaymentRequest {
            deliver_to: String::new(),
            ..request()
        };
        let err = store.process_payment(&missing).await.unwrap_err();
        assert_eq!(err.to_string(), "Please fill in all required fields");

        let negative = PaymentRequest {
            amount: -10.0,
            ..request()
        };
        let err = store.process_payment(&negative).await.unwrap_err();
        assert_eq!(err.to_string(), "Amount must be greater than 0");

        assert!(h.transport.requests().is_empty());
        assert_eq!(store.error().as_deref(), Some("Amount must be greater than 0"));
        assert!(!store.is_processing());
        assert_eq!(h.sink.notifications().len(), 2);
    }

    #[tokio::test]
    async fn process_payment_sends_normalized_body() {
        let h = Harness::new();
        h.transport.push_json(
            200,
            json!({
                "success": true,
                "data": {
                    "transaction": { "reference": "0412345678", "status": "PENDING" },
                    "mopayTransactionId": 778812,
                    "message": "Payment initiated, confirm on your phone",
                },
            }),
        );
        let store = PaymentStore::new(h.api.clone());

        let result = store.process_payment(&request()).await.unwrap();
        assert_eq!(result.mopay_transaction_id().as_deref(), Some("778812"));

        assert_eq!(
            h.transport.last_json(),
            Some(json!({
                "reference": "0412345678",
                "amount": 5000.0,
                "payType": "electricity",
                "deliverTo": "0412345678",
            }))
        );
        let state = store.snapshot();
        assert_eq!(state.mopay_transaction_id.as_deref(), Some("778812"));
        assert_eq!(state.transaction.unwrap()["status"], "PENDING");
        assert!(!state.processing);
        assert!(!state.loading);

        let notes = h.sink.notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, AlertKind::Success);
        assert_eq!(notes[0].message, "Payment initiated, confirm on your phone");
    }

    #[tokio::test]
    async fn process_payment_default_message_and_explicit_reference() {
        let h = Harness::new();
        h.transport.push_json(200, json!({ "success": true, "data": {} }));
        let store = PaymentStore::new(h.api.clone());

        let req = PaymentRequest {
            reference: Some("INV-7".into()),
            ..request()
        };
        store.process_payment(&req).await.unwrap();
        assert_eq!(h.transport.last_json().unwrap()["reference"], "INV-7");
        assert_eq!(h.sink.messages(), vec!["Payment processed successfully!"]);
    }

    #[tokio::test]
    async fn rejected_payment_is_recorded_once() {
        let h = Harness::new();
        h.transport
            .push_json(422, json!({ "message": "Meter number not recognised" }));
        let store = PaymentStore::new(h.api.clone());

        let err = store.process_payment(&request()).await.unwrap_err();
        assert_eq!(err.status_code(), Some(422));
        assert_eq!(store.error().as_deref(), Some("Meter number not recognised"));
        assert_eq!(h.sink.messages(), vec!["Meter number not recognised"]);
        assert!(!store.is_processing());
    }

    #[tokio::test]
    async fn status_requires_reference_and_encodes_it() {
        let h = Harness::new();
        let store = PaymentStore::new(h.api.clone());
        assert!(matches!(
            store.check_payment_status("").await,
            Err(Error::Validation(ref m)) if m == "Payment reference is required"
        ));

        h.transport
            .push_json(200, json!({ "success": true, "data": { "status": "SUCCESS" } }));
        let status = store.check_payment_status("INV/1").await.unwrap();
        assert_eq!(status["status"], "SUCCESS");
        assert_eq!(
            h.transport.last_request().unwrap().url.path(),
            "/api/payments/status/INV%2F1"
        );
        assert_eq!(store.snapshot().payment_status, Some(status));
    }

    #[tokio::test]
    async fn transaction_lookup_by_reference() {
        let h = Harness::new();
        h.transport
            .push_json(200, json!({ "success": true, "data": { "reference": "R9" } }));
        let store = PaymentStore::new(h.api.clone());

        store.fetch_transaction_by_reference("R9").await.unwrap();
        assert_eq!(
            h.transport.last_request().unwrap().url.path(),
            "/api/dashboard/transactions/R9"
        );
        assert_eq!(store.snapshot().transaction.unwrap()["reference"], "R9");

        let err = store.fetch_transaction_by_reference("").await.unwrap_err();
        assert_eq!(err.to_string(), "Transaction reference is required");
    }

    #[tokio::test]
    async fn history_query_and_swallowed_failure() {
        let h = Harness::new();
        h.transport.push_json(200, json!({ "success": true, "data": null }));
        let store = PaymentStore::new(h.api.clone());

        let params = PaymentHistoryParams {
            payment_type: Some(PaymentType::Airtime),
            status: Some(TransactionStatus::Failed),
            date_from: Some("2025-01-01".into()),
            date_to: Some("2025-01-31".into()),
            limit: Some(10),
        };
        store.fetch_payment_history(&params).await;
        assert_eq!(
            h.transport.last_request().unwrap().url.query(),
            Some("paymentType=AIRTIME&status=FAILED&dateFrom=2025-01-01&dateTo=2025-01-31&limit=10")
        );
        assert!(store.snapshot().history.is_empty());
        assert!(store.error().is_none());

        h.transport.push_json(200, json!({ "success": false }));
        store.fetch_payment_history(&PaymentHistoryParams::default()).await;
        assert_eq!(store.error().as_deref(), Some("Failed to fetch payment history"));
    }

    #[tokio::test]
    async fn retry_and_cancel() {
        let h = Harness::new();
        h.transport.push_json(
            200,
            json!({ "success": true, "data": { "transaction": { "status": "PROCESSING" } } }),
        );
        h.transport.push_json(200, json!({ "success": true }));
        let store = PaymentStore::new(h.api.clone());

        store.retry_payment("R1").await.unwrap();
        store.cancel_payment("R1").await.unwrap();

        let paths: Vec<String> = h
            .transport
            .requests()
            .iter()
            .map(|r| r.url.path().to_owned())
            .collect();
        assert_eq!(paths, vec!["/api/payments/retry/R1", "/api/payments/cancel/R1"]);
        assert_eq!(
            h.sink.messages(),
            vec!["Payment retry initiated successfully", "Payment cancelled successfully"]
        );
        assert_eq!(store.snapshot().transaction.unwrap()["status"], "PROCESSING");
    }

    #[tokio::test]
    async fn cancel_rejection_uses_server_message() {
        let h = Harness::new();
        h.transport
            .push_json(200, json!({ "success": false, "message": "Already completed" }));
        let store = PaymentStore::new(h.api.clone());

        let err = store.cancel_payment("R1").await.unwrap_err();
        assert_eq!(err.to_string(), "Already completed");
        assert_eq!(h.sink.messages(), vec!["Already completed"]);
    }

    #[tokio::test]
    async fn receipt_is_named_after_kind_and_reference() {
        let h = Harness::new();
        h.transport.push_raw(200, Some("application/pdf"), b"%PDF-1.7");
        let store = PaymentStore::new(h.api.clone());

        let receipt = store.download_receipt("R1", "ELECTRICITY").await.unwrap();
        assert_eq!(receipt.filename, "ELECTRICITY-INVOICE-R1.pdf");
        assert_eq!(receipt.bytes, Bytes::from_static(b"%PDF-1.7"));
        assert_eq!(h.sink.messages(), vec!["Receipt downloaded successfully"]);
    }

    #[tokio::test]
    async fn receipt_failures_are_swallowed() {
        let h = Harness::new();
        h.transport.push_json(200, json!({ "success": true }));
        h.transport.push_json(500, json!({}));
        let store = PaymentStore::new(h.api.clone());

        assert!(store.download_receipt("R1", "WATER").await.is_none());
        assert!(h.sink.notifications().is_empty());

        assert!(store.download_receipt("R1", "WATER").await.is_none());
        assert_eq!(store.error().as_deref(), Some("Internal server error"));
    }

    #[tokio::test]
    async fn reset_clears_current_payment() {
        let h = Harness::new();
        h.transport.push_json(
            200,
            json!({ "success": true, "data": { "mopayTransactionId": "M-1" } }),
        );
        let store = PaymentStore::new(h.api.clone());
        store.process_payment(&request()).await.unwrap();
        assert_eq!(store.mopay_transaction_id().as_deref(), Some("M-1"));

        store.reset();
        let state = store.snapshot();
        assert!(state.payment.is_none());
        assert!(state.mopay_transaction_id.is_none());
        assert!(state.error.is_none());
    }
}
