use serde::Serialize;

use crate::domain::Cents;

/// Per-category spending breakdown for one group.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryReport {
    pub group: String,
    pub categories: Vec<CategorySummary>,
    pub total: Cents,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
    pub category: String,
    pub total: Cents,
    pub count: i64,
    pub average: Cents,
    /// Share of the group's total spend. Display-only; never fed back
    /// into any balance arithmetic.
    pub percentage: f64,
}

/// Spending over time for one group, bucketed by calendar period.
#[derive(Debug, Clone, Serialize)]
pub struct SpendingOverTimeReport {
    pub group: String,
    pub periods: Vec<PeriodSummary>,
    pub total: Cents,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodSummary {
    /// "2024-06" for monthly buckets, "2024-06-01" for daily.
    pub period: String,
    pub total: Cents,
    pub count: i64,
}

// Helper structs for repository aggregation
#[derive(Debug, Clone)]
pub struct CategoryAggregate {
    pub category: String,
    pub count: i64,
    pub total: Cents,
}

#[derive(Debug, Clone)]
pub struct PeriodAggregate {
    pub period: String,
    pub count: i64,
    pub total: Cents,
}
