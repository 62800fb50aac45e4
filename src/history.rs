//! Order history screen helpers: paging, search and item summaries.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::models::{HistoricalOrder, OrderLine};

pub const DEFAULT_PER_PAGE: usize = 10;
/// Page numbers shown at once in the pager.
pub const PAGE_WINDOW: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<'a> {
    /// 1-based, clamped into `1..=total_pages` (1 when there are no orders).
    pub current: usize,
    pub total_pages: usize,
    pub per_page: usize,
    pub orders: &'a [HistoricalOrder],
}

impl<'a> Page<'a> {
    pub fn of(orders: &'a [HistoricalOrder], page: usize, per_page: usize) -> Self {
        let per_page = per_page.max(1);
        let total_pages = orders.len().div_ceil(per_page);
        let current = page.clamp(1, total_pages.max(1));
        let start = ((current - 1) * per_page).min(orders.len());
        let end = (start + per_page).min(orders.len());
        Self {
            current,
            total_pages,
            per_page,
            orders: &orders[start..end],
        }
    }

    pub fn has_previous(&self) -> bool {
        self.current > 1
    }

    pub fn has_next(&self) -> bool {
        self.current < self.total_pages
    }

    /// Page numbers for the pager, see [`page_window`].
    pub fn window(&self) -> Vec<usize> {
        page_window(self.current, self.total_pages)
    }
}

/// Up to three consecutive page numbers around `current`, shifted so the
/// window never runs past either end.
pub fn page_window(current: usize, total_pages: usize) -> Vec<usize> {
    if total_pages <= PAGE_WINDOW {
        return (1..=total_pages).collect();
    }
    let start = current
        .saturating_sub(1)
        .min(total_pages - (PAGE_WINDOW - 1))
        .max(1);
    let end = (start + PAGE_WINDOW - 1).min(total_pages);
    (start..=end).collect()
}

/// `"Colour Print x 2, Binding x 1"`.
pub fn format_items(items: &[OrderLine]) -> String {
    items
        .iter()
        .map(|item| format!("{} x {}", item.name, item.quantity))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `"Mar 14, 2026, 03:04 PM"`.
pub fn format_timestamp(ts: Option<NaiveDateTime>) -> String {
    ts.map(|t| t.format("%b %-d, %Y, %I:%M %p").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Orders whose id, customer name or phone number contains `term`,
/// ignoring case. A blank term matches everything.
pub fn search<'a>(orders: &'a [HistoricalOrder], term: &str) -> Vec<&'a HistoricalOrder> {
    let needle = term.trim().to_lowercase();
    orders
        .iter()
        .filter(|o| {
            needle.is_empty()
                || o.order_id.to_lowercase().contains(&needle)
                || o.customer_name.to_lowercase().contains(&needle)
                || o.phone_number.contains(&needle)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentMethod, SavedOrder};
    use chrono::NaiveDate;

    fn orders(n: usize) -> Vec<SavedOrder> {
        (1..=n)
            .map(|i| SavedOrder {
                order_id: format!("ORD_{i}"),
                customer_name: if i % 2 == 0 { "Asha" } else { "Ravi" }.to_string(),
                phone_number: format!("98450{i:05}"),
                username: None,
                items: Vec::new(),
                subtotal: 10.0,
                tax: 0.1,
                grand_total: 10.1,
                payment_method: PaymentMethod::Cash,
                created_at: None,
                payment_details: None,
                tax_percent: None,
            })
            .collect()
    }

    #[test]
    fn pages_are_sliced_and_clamped() {
        let all = orders(23);
        let first = Page::of(&all, 1, DEFAULT_PER_PAGE);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.orders.len(), 10);
        assert!(!first.has_previous());
        assert!(first.has_next());

        let last = Page::of(&all, 99, DEFAULT_PER_PAGE);
        assert_eq!(last.current, 3);
        assert_eq!(last.orders.len(), 3);
        assert_eq!(last.orders[0].order_id, "ORD_21");
        assert!(!last.has_next());

        assert_eq!(Page::of(&all, 0, DEFAULT_PER_PAGE).current, 1);
    }

    #[test]
    fn empty_history_has_one_empty_page() {
        let page = Page::of(&[], 4, DEFAULT_PER_PAGE);
        assert_eq!(page.current, 1);
        assert_eq!(page.total_pages, 0);
        assert!(page.orders.is_empty());
        assert!(page.window().is_empty());
    }

    #[test]
    fn window_slides_within_bounds() {
        assert_eq!(page_window(1, 2), vec![1, 2]);
        assert_eq!(page_window(1, 10), vec![1, 2, 3]);
        assert_eq!(page_window(2, 10), vec![1, 2, 3]);
        assert_eq!(page_window(5, 10), vec![4, 5, 6]);
        assert_eq!(page_window(10, 10), vec![8, 9, 10]);
    }

    #[test]
    fn items_are_summarised() {
        let items = vec![
            OrderLine {
                name: "Colour Print".to_string(),
                quantity: 2,
                ..OrderLine::default()
            },
            OrderLine {
                name: "Binding".to_string(),
                quantity: 1,
                ..OrderLine::default()
            },
        ];
        assert_eq!(format_items(&items), "Colour Print x 2, Binding x 1");
        assert_eq!(format_items(&[]), "");
    }

    #[test]
    fn timestamps_format_for_display() {
        let ts = NaiveDate::from_ymd_opt(2026, 3, 4)
            .and_then(|d| d.and_hms_opt(15, 4, 0))
            .expect("valid");
        assert_eq!(format_timestamp(Some(ts)), "Mar 4, 2026, 03:04 PM");
        assert_eq!(format_timestamp(None), "-");
    }

    #[test]
    fn search_matches_id_name_and_phone() {
        let all = orders(12);
        assert_eq!(search(&all, "ord_12").len(), 1);
        assert_eq!(search(&all, "asha").len(), 6);
        assert_eq!(search(&all, "9845000003").len(), 1);
        assert_eq!(search(&all, "  ").len(), 12);
    }
}
