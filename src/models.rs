//! Wire and domain types shared by the cart, checkout, receipt and
//! reporting modules.
//!
//! Field names follow the backend's camelCase JSON contract. Payloads that
//! the backend has historically returned in more than one shape (line items
//! under `items` / `orderItems` / `cartItems`, item names under `name` /
//! `itemName` / ...) are folded into one canonical shape here, at the
//! deserialization boundary, so the rest of the crate never looks for
//! alternatives.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Payment method / status
// ---------------------------------------------------------------------------

/// How an order was (or is to be) paid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum PaymentMethod {
    Cash,
    Upi,
    Card,
    /// A method this build does not recognise. Kept verbatim so historical
    /// orders still deserialize and count toward revenue totals.
    Other(String),
}

impl PaymentMethod {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "CASH" => Self::Cash,
            "UPI" => Self::Upi,
            "CARD" => Self::Card,
            _ => Self::Other(value.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Cash => "CASH",
            Self::Upi => "UPI",
            Self::Card => "CARD",
            Self::Other(raw) => raw.as_str(),
        }
    }

    /// Case-insensitive comparison against a filter value such as `"upi"`.
    pub fn matches(&self, filter: &str) -> bool {
        self.as_str().eq_ignore_ascii_case(filter.trim())
    }
}

impl From<String> for PaymentMethod {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

/// `null` reads as an unrecognised, empty method.
impl From<Option<String>> for PaymentMethod {
    fn from(value: Option<String>) -> Self {
        value.map(Self::from).unwrap_or_default()
    }
}

impl Default for PaymentMethod {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<PaymentMethod> for String {
    fn from(value: PaymentMethod) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settlement status used by the reporting screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Completed,
    Pending,
}

impl PaymentStatus {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("COMPLETED") => Self::Completed,
            _ => Self::Pending,
        }
    }
}

// ---------------------------------------------------------------------------
// Cart / order lines
// ---------------------------------------------------------------------------

/// One catalog item and its quantity within an in-progress order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub item_id: String,
    pub name: String,
    #[serde(rename = "price")]
    pub unit_price: f64,
    pub quantity: u32,
}

impl CartLine {
    pub fn line_total(&self) -> f64 {
        self.unit_price * f64::from(self.quantity)
    }
}

/// A line item as echoed back by the backend on saved/historical orders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default, alias = "itemName", alias = "productName", alias = "title")]
    pub name: String,
    #[serde(default, alias = "unitPrice", deserialize_with = "amount::deserialize")]
    pub price: f64,
    #[serde(default)]
    pub quantity: u32,
    /// Pre-computed line amount, when the backend supplies one.
    #[serde(default, alias = "amount", skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
}

impl OrderLine {
    pub fn line_total(&self) -> f64 {
        self.total
            .filter(|t| t.is_finite())
            .unwrap_or(self.price * f64::from(self.quantity))
    }
}

impl From<&CartLine> for OrderLine {
    fn from(line: &CartLine) -> Self {
        Self {
            item_id: Some(line.item_id.clone()),
            name: line.name.clone(),
            price: line.unit_price,
            quantity: line.quantity,
            total: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Body of the order-creation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub customer_name: String,
    pub phone_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub cart_items: Vec<CartLine>,
    pub subtotal: f64,
    pub tax: f64,
    pub grand_total: f64,
    pub payment_method: PaymentMethod,
}

/// Gateway identifiers attached to an order after a verified UPI payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentDetails {
    #[serde(rename = "razorpayOrderId", default)]
    pub gateway_order_id: String,
    #[serde(rename = "razorpayPaymentId", default)]
    pub gateway_payment_id: String,
    #[serde(rename = "razorpaySignature", default)]
    pub gateway_signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// An order as persisted by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedOrder {
    pub order_id: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, alias = "orderItems", alias = "cartItems")]
    pub items: Vec<OrderLine>,
    #[serde(default, deserialize_with = "amount::deserialize")]
    pub subtotal: f64,
    #[serde(default, deserialize_with = "amount::deserialize")]
    pub tax: f64,
    #[serde(default, deserialize_with = "amount::deserialize")]
    pub grand_total: f64,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default, with = "timestamp", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_details: Option<PaymentDetails>,
    /// Tax rate applied at the counter; the backend does not store it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_percent: Option<f64>,
}

/// A previously placed order fetched for reporting. Read-only.
pub type HistoricalOrder = SavedOrder;

impl SavedOrder {
    pub fn status(&self) -> PaymentStatus {
        PaymentStatus::parse(
            self.payment_details
                .as_ref()
                .and_then(|d| d.status.as_deref()),
        )
    }

    /// Operator that rang the order up, `"Unknown"` when absent.
    pub fn operator(&self) -> &str {
        self.username
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or("Unknown")
    }
}

/// Aggregate returned by the dashboard endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    #[serde(default)]
    pub today_sales: f64,
    #[serde(default)]
    pub today_order_count: u64,
    #[serde(default)]
    pub recent_orders: Vec<HistoricalOrder>,
}

// ---------------------------------------------------------------------------
// Payment gateway
// ---------------------------------------------------------------------------

/// Request for a gateway-side order. `amount` is in major units (rupees).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayOrderRequest {
    pub amount: f64,
    pub currency: String,
}

/// Gateway-side order. `amount` is in minor units (paise).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

/// Identifiers handed to the success handler by the gateway widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayPayment {
    #[serde(rename = "razorpay_order_id")]
    pub gateway_order_id: String,
    #[serde(rename = "razorpay_payment_id")]
    pub gateway_payment_id: String,
    #[serde(rename = "razorpay_signature")]
    pub gateway_signature: String,
}

/// Body of the payment verification request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifyRequest {
    #[serde(rename = "razorpayOrderId")]
    pub gateway_order_id: String,
    #[serde(rename = "razorpayPaymentId")]
    pub gateway_payment_id: String,
    #[serde(rename = "razorpaySignature")]
    pub gateway_signature: String,
    #[serde(rename = "orderId")]
    pub order_id: String,
}

impl VerifyRequest {
    pub fn new(payment: &GatewayPayment, order_id: &str) -> Self {
        Self {
            gateway_order_id: payment.gateway_order_id.clone(),
            gateway_payment_id: payment.gateway_payment_id.clone(),
            gateway_signature: payment.gateway_signature.clone(),
            order_id: order_id.to_string(),
        }
    }
}

impl From<&GatewayPayment> for PaymentDetails {
    fn from(payment: &GatewayPayment) -> Self {
        Self {
            gateway_order_id: payment.gateway_order_id.clone(),
            gateway_payment_id: payment.gateway_payment_id.clone(),
            gateway_signature: payment.gateway_signature.clone(),
            status: Some("COMPLETED".to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog / users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub category_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img_url: Option<String>,
    /// Item count as reported by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub item_id: String,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub category_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img_url: Option<String>,
}

/// Payload for creating a catalog item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub name: String,
    pub price: f64,
    pub category_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Payload for creating a category.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCategory {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    pub name: String,
    pub email: String,
    #[serde(default = "default_role")]
    pub role: String,
}

/// Payload for registering or updating a user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    pub role: String,
}

fn default_role() -> String {
    "ROLE_USER".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub role: String,
    #[serde(default)]
    pub name: Option<String>,
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Lenient `createdAt` codec. The backend emits either a zone-less local
/// timestamp (`2026-03-02T14:05:09.123`) or RFC 3339; both are normalised
/// to local wall-clock time. Unparseable values read as `None`.
pub(crate) mod timestamp {
    use chrono::{DateTime, Local, NaiveDateTime};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    pub fn parse(raw: &str) -> Option<NaiveDateTime> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Local).naive_local());
        }
        NaiveDateTime::parse_from_str(raw, FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
    }

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => serializer.serialize_str(&dt.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(parse))
    }
}

/// Money fields on fetched orders: `null` reads as zero.
pub(crate) mod amount {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_method_parses_case_insensitively() {
        assert_eq!(PaymentMethod::parse("cash"), PaymentMethod::Cash);
        assert_eq!(PaymentMethod::parse(" Upi "), PaymentMethod::Upi);
        assert_eq!(
            PaymentMethod::parse("wallet"),
            PaymentMethod::Other("wallet".to_string())
        );
        assert!(PaymentMethod::Upi.matches("upi"));
        assert!(!PaymentMethod::Cash.matches("card"));
    }

    #[test]
    fn saved_order_accepts_alternate_item_keys() {
        let raw = serde_json::json!({
            "orderId": "ORD_1",
            "customerName": "Asha",
            "phoneNumber": "9876543210",
            "orderItems": [
                {"itemId": "I1", "itemName": "A4 Print", "price": 2.0, "quantity": 10}
            ],
            "subtotal": 20.0,
            "tax": 0.2,
            "grandTotal": 20.2,
            "paymentMethod": "upi",
            "createdAt": "2026-03-02T14:05:09.123"
        });
        let order: SavedOrder = serde_json::from_value(raw).expect("decode order");
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].name, "A4 Print");
        assert_eq!(order.payment_method, PaymentMethod::Upi);
        assert!(order.created_at.is_some());
        assert_eq!(order.status(), PaymentStatus::Pending);
        assert_eq!(order.operator(), "Unknown");
    }

    #[test]
    fn unparseable_timestamp_reads_as_none() {
        let raw = serde_json::json!({
            "orderId": "ORD_2",
            "paymentMethod": "CASH",
            "createdAt": "yesterday"
        });
        let order: SavedOrder = serde_json::from_value(raw).expect("decode order");
        assert!(order.created_at.is_none());
    }

    #[test]
    fn history_list_tolerates_missing_and_null_fields() {
        let raw = r#"[
            {"orderId": "1", "grandTotal": 10.0, "paymentMethod": "CASH"},
            {"orderId": "2", "grandTotal": 5.0},
            {"orderId": "3", "grandTotal": 7.5, "paymentMethod": null},
            {"orderId": "4", "grandTotal": null, "subtotal": null, "tax": null,
             "paymentMethod": "UPI",
             "items": [{"name": "Scan", "price": null, "quantity": 1}]}
        ]"#;
        let orders: Vec<HistoricalOrder> = serde_json::from_str(raw).expect("decode list");
        assert_eq!(orders.len(), 4);
        assert_eq!(orders[1].payment_method, PaymentMethod::Other(String::new()));
        assert_eq!(orders[1].grand_total, 5.0);
        assert_eq!(orders[2].payment_method, PaymentMethod::default());
        assert_eq!(orders[3].grand_total, 0.0);
        assert_eq!(orders[3].items[0].price, 0.0);
        let revenue: f64 = orders.iter().map(|o| o.grand_total).sum();
        assert_eq!(revenue, 22.5);
    }

    #[test]
    fn order_request_uses_backend_field_names() {
        let request = OrderRequest {
            customer_name: "Ravi".to_string(),
            phone_number: "99999".to_string(),
            username: None,
            cart_items: vec![CartLine {
                item_id: "I1".to_string(),
                name: "Lamination".to_string(),
                unit_price: 30.0,
                quantity: 2,
            }],
            subtotal: 60.0,
            tax: 0.6,
            grand_total: 60.6,
            payment_method: PaymentMethod::Cash,
        };
        let json = serde_json::to_value(&request).expect("encode request");
        assert_eq!(json["paymentMethod"], "CASH");
        assert_eq!(json["grandTotal"], 60.6);
        assert_eq!(json["cartItems"][0]["price"], 30.0);
        assert!(json.get("username").is_none());
    }

    #[test]
    fn order_line_prefers_explicit_total() {
        let line = OrderLine {
            name: "Binding".to_string(),
            price: 50.0,
            quantity: 2,
            total: Some(90.0),
            ..OrderLine::default()
        };
        assert_eq!(line.line_total(), 90.0);
        let line = OrderLine {
            total: None,
            ..line
        };
        assert_eq!(line.line_total(), 100.0);
    }
}
