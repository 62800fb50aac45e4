//! Dashboard and analytics aggregation over historical orders.
//!
//! Everything here is a pure function of the order list it is given. Empty
//! input yields zero totals and `None` for the "top" figures.

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::models::{HistoricalOrder, PaymentMethod, PaymentStatus};

// ---------------------------------------------------------------------------
// Date windows
// ---------------------------------------------------------------------------

/// Whole-day window, both ends inclusive (start 00:00 through end 23:59:59.999).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePreset {
    Today,
    /// Sunday through Saturday of the current week.
    Week,
    Month,
}

impl DatePreset {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "today" => Some(Self::Today),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            _ => None,
        }
    }
}

impl DateWindow {
    /// A reversed range is swapped rather than treated as empty.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    pub fn preset(preset: DatePreset, today: NaiveDate) -> Self {
        match preset {
            DatePreset::Today => Self::new(today, today),
            DatePreset::Week => {
                let back = i64::from(today.weekday().num_days_from_sunday());
                let start = today - Duration::days(back);
                Self::new(start, start + Duration::days(6))
            }
            DatePreset::Month => {
                let start = today.with_day(1).unwrap_or(today);
                let next_month = if today.month() == 12 {
                    NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)
                } else {
                    NaiveDate::from_ymd_opt(today.year(), today.month() + 1, 1)
                };
                let end = next_month
                    .and_then(|d| d.pred_opt())
                    .unwrap_or(today);
                Self::new(start, end)
            }
        }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        day >= self.start && day <= self.end
    }

    /// Divisor for the average: whole days between the two ends, at least 1.
    pub fn average_days(&self) -> i64 {
        (self.end - self.start).num_days().max(1)
    }
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

/// Orders inside `window` (when set) paid with `method` (when set, compared
/// case-insensitively). With a window set, orders lacking a timestamp are
/// left out.
pub fn filter_orders(
    orders: &[HistoricalOrder],
    window: Option<DateWindow>,
    method: Option<&str>,
) -> Vec<HistoricalOrder> {
    let method = method.map(str::trim).filter(|m| !m.is_empty());
    orders
        .iter()
        .filter(|order| match window {
            Some(w) => order.created_at.is_some_and(|ts| w.contains(ts.date())),
            None => true,
        })
        .filter(|order| method.map_or(true, |m| order.payment_method.matches(m)))
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueSummary {
    pub total: f64,
    /// Revenue per day of the window; equals `total` without a window.
    pub average: f64,
    pub count: usize,
}

pub fn revenue_summary(orders: &[HistoricalOrder], window: Option<DateWindow>) -> RevenueSummary {
    if orders.is_empty() {
        return RevenueSummary::default();
    }
    let total: f64 = orders.iter().map(|o| o.grand_total).sum();
    let days = window.map_or(1, |w| w.average_days());
    RevenueSummary {
        total,
        average: total / days as f64,
        count: orders.len(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Share {
    pub amount: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct PaymentBreakdown {
    pub cash: Share,
    pub upi: Share,
    pub card: Share,
}

fn percentage(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        part / total * 100.0
    } else {
        0.0
    }
}

/// Revenue per CASH/UPI/CARD. Other methods fall outside every bucket.
pub fn payment_breakdown(orders: &[HistoricalOrder]) -> PaymentBreakdown {
    let (mut cash, mut upi, mut card) = (0.0, 0.0, 0.0);
    for order in orders {
        match order.payment_method {
            PaymentMethod::Cash => cash += order.grand_total,
            PaymentMethod::Upi => upi += order.grand_total,
            PaymentMethod::Card => card += order.grand_total,
            PaymentMethod::Other(_) => {}
        }
    }
    let total = cash + upi + card;
    let share = |amount: f64| Share {
        amount,
        percentage: percentage(amount, total),
    };
    PaymentBreakdown {
        cash: share(cash),
        upi: share(upi),
        card: share(card),
    }
}

/// Groups keyed by name, kept in first-seen order.
struct Groups<T> {
    index: HashMap<String, usize>,
    entries: Vec<(String, T)>,
}

impl<T: Default> Groups<T> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    fn entry(&mut self, key: &str) -> &mut T {
        let idx = match self.index.get(key) {
            Some(&idx) => idx,
            None => {
                self.entries.push((key.to_string(), T::default()));
                self.index.insert(key.to_string(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &mut self.entries[idx].1
    }

    /// Entries sorted by `score`, highest first; equal scores keep
    /// first-seen order.
    fn ranked_by(mut self, score: impl Fn(&T) -> f64) -> Vec<(String, T)> {
        self.entries.sort_by(|a, b| score(&b.1).total_cmp(&score(&a.1)));
        self.entries
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeStats {
    pub username: String,
    pub revenue: f64,
    pub orders: usize,
}

#[derive(Default)]
struct EmployeeAcc {
    revenue: f64,
    orders: usize,
}

/// Operators ranked by revenue, at most `limit` entries.
pub fn employee_leaderboard(orders: &[HistoricalOrder], limit: usize) -> Vec<EmployeeStats> {
    let mut groups: Groups<EmployeeAcc> = Groups::new();
    for order in orders {
        let acc = groups.entry(order.operator());
        acc.revenue += order.grand_total;
        acc.orders += 1;
    }
    groups
        .ranked_by(|acc| acc.revenue)
        .into_iter()
        .take(limit)
        .map(|(username, acc)| EmployeeStats {
            username,
            revenue: acc.revenue,
            orders: acc.orders,
        })
        .collect()
}

/// The operator with the highest revenue; ties go to the first seen.
pub fn top_employee(orders: &[HistoricalOrder]) -> Option<EmployeeStats> {
    employee_leaderboard(orders, 1).into_iter().next()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopProduct {
    pub product_name: String,
    /// Orders containing the product; a product listed twice in one order
    /// counts once.
    pub orders: usize,
    /// Revenue over every line, duplicates included.
    pub revenue: f64,
}

#[derive(Default)]
struct ProductAcc {
    orders: usize,
    revenue: f64,
    quantity: u64,
}

/// The product appearing in the most orders. `None` when no order carries
/// named line items.
pub fn top_product(orders: &[HistoricalOrder]) -> Option<TopProduct> {
    let mut groups: Groups<ProductAcc> = Groups::new();
    for order in orders {
        let mut seen: HashSet<&str> = HashSet::new();
        for line in &order.items {
            let name = line.name.trim();
            if name.is_empty() {
                continue;
            }
            let acc = groups.entry(name);
            if seen.insert(name) {
                acc.orders += 1;
            }
            let amount = line.line_total();
            if amount.is_finite() {
                acc.revenue += amount;
            }
        }
    }
    groups
        .ranked_by(|acc| acc.orders as f64)
        .into_iter()
        .next()
        .map(|(product_name, acc)| TopProduct {
            product_name,
            orders: acc.orders,
            revenue: acc.revenue,
        })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductStats {
    pub name: String,
    pub revenue: f64,
    pub quantity: u64,
}

/// Products ranked by revenue, at most `limit` entries. Unnamed lines are
/// grouped under "Unknown"; a line without a quantity counts as one unit.
pub fn top_products(orders: &[HistoricalOrder], limit: usize) -> Vec<ProductStats> {
    let mut groups: Groups<ProductAcc> = Groups::new();
    for line in orders.iter().flat_map(|o| &o.items) {
        let name = match line.name.trim() {
            "" => "Unknown",
            name => name,
        };
        let acc = groups.entry(name);
        let amount = line.line_total();
        if amount.is_finite() {
            acc.revenue += amount;
        }
        acc.quantity += u64::from(line.quantity.max(1));
    }
    groups
        .ranked_by(|acc| acc.revenue)
        .into_iter()
        .take(limit)
        .map(|(name, acc)| ProductStats {
            name,
            revenue: acc.revenue,
            quantity: acc.quantity,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: NaiveDate,
    /// Short weekday name, e.g. "Mon".
    pub label: String,
    pub revenue: f64,
}

pub const TREND_DAYS: i64 = 7;

/// Daily revenue for the seven days ending `today`, oldest first.
pub fn revenue_trend(orders: &[HistoricalOrder], today: NaiveDate) -> Vec<TrendPoint> {
    (0..TREND_DAYS)
        .rev()
        .map(|back| {
            let date = today - Duration::days(back);
            let revenue = orders
                .iter()
                .filter(|o| o.created_at.is_some_and(|ts| ts.date() == date))
                .map(|o| o.grand_total)
                .sum();
            TrendPoint {
                date,
                label: date.format("%a").to_string(),
                revenue,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatusCount {
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct StatusDistribution {
    pub completed: StatusCount,
    pub pending: StatusCount,
}

pub fn status_distribution(orders: &[HistoricalOrder]) -> StatusDistribution {
    let completed = orders
        .iter()
        .filter(|o| o.status() == PaymentStatus::Completed)
        .count();
    let pending = orders.len() - completed;
    let total = orders.len() as f64;
    StatusDistribution {
        completed: StatusCount {
            count: completed,
            percentage: percentage(completed as f64, total),
        },
        pending: StatusCount {
            count: pending,
            percentage: percentage(pending as f64, total),
        },
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

pub const LEADERBOARD_SIZE: usize = 5;

/// Everything the dashboard and analytics screens show for one filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardReport {
    pub window: Option<DateWindow>,
    pub orders: Vec<HistoricalOrder>,
    pub revenue: RevenueSummary,
    pub payment_breakdown: PaymentBreakdown,
    pub top_employee: Option<EmployeeStats>,
    pub top_product: Option<TopProduct>,
    pub employees: Vec<EmployeeStats>,
    pub products: Vec<ProductStats>,
    pub status: StatusDistribution,
    /// Trailing week ending `today`, over the unfiltered list.
    pub trend: Vec<TrendPoint>,
}

impl DashboardReport {
    pub fn build(
        all_orders: &[HistoricalOrder],
        window: Option<DateWindow>,
        method: Option<&str>,
        today: NaiveDate,
    ) -> Self {
        let orders = filter_orders(all_orders, window, method);
        Self {
            window,
            revenue: revenue_summary(&orders, window),
            payment_breakdown: payment_breakdown(&orders),
            top_employee: top_employee(&orders),
            top_product: top_product(&orders),
            employees: employee_leaderboard(&orders, LEADERBOARD_SIZE),
            products: top_products(&orders, LEADERBOARD_SIZE),
            status: status_distribution(&orders),
            trend: revenue_trend(all_orders, today),
            orders,
        }
    }
}
