//! Dashboard view-model: account summary, statistics and the transaction list.
//!
//! Every fetch here is read-only, so failures are recorded in
//! [`DashboardState::error`] and swallowed.

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::http::{ApiClient, with_query};
use crate::notify::Notification;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Success,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentType {
    Electricity,
    Airtime,
    Water,
    Internet,
    Rra,
}

impl PaymentType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Electricity => "ELECTRICITY",
            Self::Airtime => "AIRTIME",
            Self::Water => "WATER",
            Self::Internet => "INTERNET",
            Self::Rra => "RRA",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub last_login_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionItem {
    pub id: i64,
    pub reference: String,
    pub amount: f64,
    pub payment_type: PaymentType,
    pub deliver_to: String,
    pub status: TransactionStatus,
    pub created_at: String,
    #[serde(default)]
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionStats {
    pub total_transactions: u64,
    pub successful_transactions: u64,
    pub pending_transactions: u64,
    pub failed_transactions: u64,
    pub total_spent: f64,
}

impl TransactionStats {
    /// Share of successful transactions, one decimal ("0" when there are none).
    #[must_use]
    pub fn success_rate(&self) -> String {
        self.rate(self.successful_transactions)
    }

    #[must_use]
    pub fn pending_rate(&self) -> String {
        self.rate(self.pending_transactions)
    }

    #[must_use]
    pub fn failure_rate(&self) -> String {
        self.rate(self.failed_transactions)
    }

    #[allow(clippy::cast_precision_loss)]
    fn rate(&self, count: u64) -> String {
        if self.total_transactions == 0 {
            return "0".to_owned();
        }
        format!("{:.1}", count as f64 / self.total_transactions as f64 * 100.0)
    }
}

/// Payload of `GET /dashboard`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardData {
    pub user_summary: Option<UserSummary>,
    pub recent_transactions: Option<Vec<TransactionItem>>,
    pub stats: Option<TransactionStats>,
}

/// Server-side filters for the transaction list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilters {
    pub status: Option<TransactionStatus>,
    pub payment_type: Option<PaymentType>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub search: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[non_exhaustive]
pub struct DashboardState {
    pub dashboard: Option<DashboardData>,
    pub user_summary: Option<UserSummary>,
    pub recent_transactions: Vec<TransactionItem>,
    pub transactions: Vec<TransactionItem>,
    pub stats: TransactionStats,
    pub loading: bool,
    pub error: Option<String>,
    pub filters: TransactionFilters,
}

#[derive(Clone)]
pub struct DashboardStore {
    api: ApiClient,
    state: Arc<RwLock<DashboardState>>,
}

impl DashboardStore {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            state: Arc::default(),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> DashboardState {
        self.read(DashboardState::clone)
    }

    #[must_use]
    pub fn stats(&self) -> TransactionStats {
        self.read(|s| s.stats.clone())
    }

    #[must_use]
    pub fn filters(&self) -> TransactionFilters {
        self.read(|s| s.filters.clone())
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.read(|s| s.loading)
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.read(|s| s.error.clone())
    }

    /// Applies `patch` to the current filters.
    pub fn set_filters(&self, patch: impl FnOnce(&mut TransactionFilters)) {
        self.write(|s| patch(&mut s.filters));
    }

    pub fn reset_filters(&self) {
        self.write(|s| s.filters = TransactionFilters::default());
    }

    /// Loads `GET /dashboard` into summary, recent transactions and stats.
    pub async fn fetch_dashboard(&self) {
        self.begin();
        let result = self
            .api
            .get::<DashboardData>("/dashboard")
            .await
            .and_then(|r| r.into_data("Failed to fetch dashboard data"));

        match result {
            Ok(data) => self.write(|s| {
                if let Some(summary) = &data.user_summary {
                    s.user_summary = Some(summary.clone());
                }
                if let Some(recent) = &data.recent_transactions {
                    s.recent_transactions = recent.clone();
                }
                if let Some(stats) = &data.stats {
                    s.stats = stats.clone();
                }
                s.dashboard = Some(data);
            }),
            Err(e) => self.record("fetch_dashboard", &e, "Failed to fetch dashboard data"),
        }
        self.write(|s| s.loading = false);
    }

    /// Loads the transaction list using the current filters.
    pub async fn fetch_transactions(&self, limit: Option<u32>, offset: Option<u32>) {
        self.begin();
        let filters = self.filters();
        let path = with_query(
            "/dashboard/transactions",
            &[
                ("status", filters.status.map(|s| s.as_str().to_owned())),
                ("paymentType", filters.payment_type.map(|t| t.as_str().to_owned())),
                ("search", Some(filters.search)),
                ("limit", limit.filter(|n| *n > 0).map(|n| n.to_string())),
                ("offset", offset.filter(|n| *n > 0).map(|n| n.to_string())),
            ],
        );

        let result = self
            .api
            .get::<Vec<TransactionItem>>(&path)
            .await
            .and_then(|r| r.into_data("Failed to fetch transactions"));

        match result {
            Ok(items) => self.write(|s| s.transactions = items),
            Err(e) => self.record("fetch_transactions", &e, "Failed to fetch transactions"),
        }
        self.write(|s| s.loading = false);
    }

    fn begin(&self) {
        self.write(|s| {
            s.loading = true;
            s.error = None;
        });
    }

    fn record(&self, operation: &'static str, err: &Error, default_message: &str) {
        tracing::error!(error = %err, operation, "Dashboard request failed");
        let message = err.user_message(default_message);
        self.write(|s| s.error = Some(message.clone()));
        if !err.is_surfaced() {
            self.api.notify(Notification::error(message));
        }
    }

    fn read<R>(&self, f: impl FnOnce(&DashboardState) -> R) -> R {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write<R>(&self, f: impl FnOnce(&mut DashboardState) -> R) -> R {
        f(&mut self.state.write().unwrap_or_else(PoisonError::into_inner))
    }
}
