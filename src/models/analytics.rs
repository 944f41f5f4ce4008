use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyRevenue {
    /// `YYYY-MM`
    pub month: String,
    pub revenue_cents: i64,
    pub orders: i64,
}

/// Dashboard financial summary, computed from stored orders.
#[derive(Debug, Clone, Serialize)]
pub struct FinancialAnalytics {
    pub currency: String,
    pub order_count: i64,
    pub paid_order_count: i64,
    pub total_revenue_cents: i64,
    pub refunded_cents: i64,
    pub average_order_value_cents: i64,
    /// Share of orders that reached payment, 0.0-1.0.
    pub conversion_rate: f64,
    pub orders_by_status: BTreeMap<String, i64>,
    pub revenue_by_complexity: BTreeMap<String, i64>,
    pub revenue_by_month: Vec<MonthlyRevenue>,
}
