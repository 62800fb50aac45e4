//! In-progress cart and the customer fields of one checkout session.
//!
//! A [`CheckoutSession`] is owned by a single counter. Consumers (the
//! checkout orchestrator, the cart view) receive a [`SessionHandle`]
//! explicitly rather than looking the session up ambiently.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::models::{CartLine, Item};
use crate::totals::{compute_totals, sanitize_tax_percent, Totals, DEFAULT_TAX_PERCENT};

// ---------------------------------------------------------------------------
// Cart
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one unit of `item`. A repeated add bumps the quantity and takes
    /// the newly selected price as the unit price.
    pub fn add(&mut self, item: &Item) {
        if let Some(line) = self.lines.iter_mut().find(|l| l.item_id == item.item_id) {
            line.quantity = line.quantity.saturating_add(1);
            line.unit_price = item.price;
            return;
        }
        self.lines.push(CartLine {
            item_id: item.item_id.clone(),
            name: item.name.clone(),
            unit_price: item.price,
            quantity: 1,
        });
    }

    /// Returns `true` if a line was removed.
    pub fn remove(&mut self, item_id: &str) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.item_id != item_id);
        self.lines.len() != before
    }

    /// Set the quantity of an existing line; zero removes it.
    pub fn update_quantity(&mut self, item_id: &str, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove(item_id);
        }
        match self.lines.iter_mut().find(|l| l.item_id == item_id) {
            Some(line) => {
                line.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Override the unit price of a line. Negative or non-finite prices are
    /// rejected.
    pub fn override_price(&mut self, item_id: &str, unit_price: f64) -> bool {
        if !unit_price.is_finite() || unit_price < 0.0 {
            return false;
        }
        match self.lines.iter_mut().find(|l| l.item_id == item_id) {
            Some(line) => {
                line.unit_price = unit_price;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of units across all lines.
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

// ---------------------------------------------------------------------------
// Checkout session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSession {
    pub cart: Cart,
    pub customer_name: String,
    pub phone_number: String,
    /// Operator ringing up the sale.
    pub username: Option<String>,
    tax_percent: f64,
}

impl Default for CheckoutSession {
    fn default() -> Self {
        Self::new(DEFAULT_TAX_PERCENT)
    }
}

impl CheckoutSession {
    pub fn new(tax_percent: f64) -> Self {
        Self {
            cart: Cart::new(),
            customer_name: String::new(),
            phone_number: String::new(),
            username: None,
            tax_percent: sanitize_tax_percent(tax_percent),
        }
    }

    pub fn tax_percent(&self) -> f64 {
        self.tax_percent
    }

    pub fn set_tax_percent(&mut self, tax_percent: f64) {
        self.tax_percent = sanitize_tax_percent(tax_percent);
    }

    pub fn set_customer(&mut self, name: &str, phone_number: &str) {
        self.customer_name = name.trim().to_string();
        self.phone_number = phone_number.trim().to_string();
    }

    pub fn totals(&self) -> Totals {
        compute_totals(self.cart.lines(), self.tax_percent)
    }

    /// Clear the cart and every customer/operator field. The tax rate is a
    /// counter setting and survives.
    pub fn clear_all(&mut self) {
        self.cart.clear();
        self.customer_name.clear();
        self.phone_number.clear();
        self.username = None;
    }
}

/// Shared handle to a counter's checkout session.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle(Arc<Mutex<CheckoutSession>>);

impl SessionHandle {
    pub fn new(session: CheckoutSession) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    /// Lock the session. A poisoned lock is recovered: the session holds
    /// plain data and stays consistent between mutations.
    pub fn lock(&self) -> MutexGuard<'_, CheckoutSession> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> CheckoutSession {
        self.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, price: f64) -> Item {
        Item {
            item_id: id.to_string(),
            name: format!("Item {id}"),
            price,
            category_id: "cat-1".to_string(),
            description: None,
            img_url: None,
        }
    }

    #[test]
    fn repeated_add_merges_into_one_line() {
        let mut cart = Cart::new();
        cart.add(&item("A", 50.0));
        cart.add(&item("A", 50.0));
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 2);
    }

    #[test]
    fn repeated_add_takes_latest_price() {
        let mut cart = Cart::new();
        cart.add(&item("A", 50.0));
        cart.add(&item("A", 45.0));
        assert_eq!(cart.lines()[0].unit_price, 45.0);
        assert_eq!(cart.lines()[0].quantity, 2);
    }

    #[test]
    fn zero_quantity_removes_line() {
        let mut cart = Cart::new();
        cart.add(&item("A", 10.0));
        cart.add(&item("B", 5.0));
        assert!(cart.update_quantity("A", 0));
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].item_id, "B");
        assert!(!cart.update_quantity("missing", 3));
    }

    #[test]
    fn price_override_rejects_invalid_values() {
        let mut cart = Cart::new();
        cart.add(&item("A", 10.0));
        assert!(!cart.override_price("A", -1.0));
        assert!(!cart.override_price("A", f64::NAN));
        assert!(cart.override_price("A", 7.5));
        assert_eq!(cart.lines()[0].unit_price, 7.5);
    }

    #[test]
    fn clear_all_keeps_tax_rate() {
        let mut session = CheckoutSession::new(5.0);
        session.cart.add(&item("A", 10.0));
        session.set_customer(" Meera ", "98450 00000");
        session.username = Some("cashier1".to_string());
        session.clear_all();
        assert!(session.cart.is_empty());
        assert!(session.customer_name.is_empty());
        assert!(session.username.is_none());
        assert_eq!(session.tax_percent(), 5.0);
    }

    #[test]
    fn session_totals_use_sanitized_rate() {
        let mut session = CheckoutSession::new(-3.0);
        session.cart.add(&item("A", 100.0));
        assert_eq!(session.totals().grand_total, 100.0);
        session.set_tax_percent(10.0);
        assert_eq!(session.totals().grand_total, 110.0);
    }
}
