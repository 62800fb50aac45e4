//! Receipt presentation.
//!
//! [`ReceiptView::from_order`] turns a completed order plus the shop's
//! settings into the tax-invoice view. The view is then rendered as plain
//! text, as a standalone HTML page for the print preview, or as ESC/POS
//! bytes for a thermal printer. All three renderings share one row layout.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::escpos::{format_columns, format_pair, Column, EscPosBuilder, PaperWidth};
use crate::models::{PaymentMethod, SavedOrder};
use crate::settings::Settings;
use crate::totals::DEFAULT_TAX_PERCENT;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLine {
    pub serial: usize,
    pub name: String,
    pub quantity: u32,
    pub rate: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptView {
    pub shop_name: String,
    pub address: String,
    pub contact: String,
    pub gst_number: Option<String>,
    pub invoice_no: String,
    pub issued_at: NaiveDateTime,
    pub customer_name: String,
    pub phone_number: String,
    pub lines: Vec<ReceiptLine>,
    pub subtotal: f64,
    pub tax_percent: f64,
    pub tax: f64,
    pub grand_total: f64,
    pub currency_symbol: String,
    pub payment_method: String,
    /// Present only for gateway-paid UPI orders.
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub footer: String,
}

impl ReceiptView {
    /// Build the receipt for `order`. `now` stands in for a missing order
    /// timestamp.
    pub fn from_order(order: &SavedOrder, settings: &Settings, now: NaiveDateTime) -> Self {
        let lines = order
            .items
            .iter()
            .enumerate()
            .map(|(idx, line)| ReceiptLine {
                serial: idx + 1,
                name: line.name.clone(),
                quantity: line.quantity,
                rate: line.price,
                amount: line.line_total(),
            })
            .collect();

        let upi_details = order
            .payment_details
            .as_ref()
            .filter(|_| order.payment_method == PaymentMethod::Upi);

        let footer = settings.receipt.footer.trim();
        Self {
            shop_name: settings.business.shop_name.clone(),
            address: settings.business.address.clone(),
            contact: settings.business.contact.clone(),
            gst_number: settings
                .business
                .gst_number
                .clone()
                .filter(|g| !g.trim().is_empty()),
            invoice_no: if order.order_id.trim().is_empty() {
                "N/A".to_string()
            } else {
                order.order_id.clone()
            },
            issued_at: order.created_at.unwrap_or(now),
            customer_name: order.customer_name.clone(),
            phone_number: order.phone_number.clone(),
            lines,
            subtotal: order.subtotal,
            tax_percent: receipt_tax_percent(order),
            tax: order.tax,
            grand_total: order.grand_total,
            currency_symbol: currency_symbol(&settings.payment.currency),
            payment_method: order.payment_method.as_str().to_string(),
            gateway_order_id: upi_details.map(|d| d.gateway_order_id.clone()),
            gateway_payment_id: upi_details.map(|d| d.gateway_payment_id.clone()),
            footer: if footer.is_empty() {
                "Thank You for Your Business!".to_string()
            } else {
                footer.to_string()
            },
        }
    }

    fn amount(&self, value: f64) -> String {
        format!("{}{}", self.currency_symbol, money(value))
    }
}

/// Explicit rate on the order, else derived from tax and subtotal, else the
/// shop default.
fn receipt_tax_percent(order: &SavedOrder) -> f64 {
    if let Some(rate) = order.tax_percent.filter(|r| r.is_finite()) {
        return rate;
    }
    if order.subtotal != 0.0 && order.subtotal.is_finite() {
        return order.tax / order.subtotal * 100.0;
    }
    DEFAULT_TAX_PERCENT
}

fn currency_symbol(code: &str) -> String {
    match code.trim().to_ascii_uppercase().as_str() {
        "" | "INR" => "₹".to_string(),
        other => format!("{other} "),
    }
}

fn money(value: f64) -> String {
    format!("{value:.2}")
}

/// `18` rather than `18.00`, `12.5` rather than `12.50`.
fn percent(value: f64) -> String {
    let fixed = format!("{value:.2}");
    fixed
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

fn esc(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut line = String::new();
    for token in text.split_whitespace() {
        if line.is_empty() {
            line.push_str(token);
            continue;
        }
        if line.chars().count() + 1 + token.chars().count() > width.max(8) {
            out.push(std::mem::take(&mut line));
            line.push_str(token);
        } else {
            line.push(' ');
            line.push_str(token);
        }
    }
    if !line.is_empty() {
        out.push(line);
    }
    out
}

// ---------------------------------------------------------------------------
// Shared row layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Row {
    /// Centered and emphasized.
    Heading(String),
    Centered(String),
    Rule,
    Pair(String, String),
    /// Emphasized pair.
    Total(String, String),
    /// Preformatted table line.
    Plain(String),
}

/// Below this many characters the item table is printed one item per two
/// lines instead of five columns.
const TABLE_MIN_WIDTH: usize = 40;

fn item_rows(view: &ReceiptView, width: usize) -> Vec<Row> {
    let mut rows = Vec::new();
    if width < TABLE_MIN_WIDTH {
        for line in &view.lines {
            rows.push(Row::Plain(format!("{}. {}", line.serial, line.name)));
            rows.push(Row::Pair(
                format!("   {} x {}", line.quantity, money(line.rate)),
                money(line.amount),
            ));
        }
        return rows;
    }

    let (sr, qty, rate, amount) = (3, 4, 9, 10);
    let name = width.saturating_sub(sr + qty + rate + amount + 4);
    rows.push(Row::Plain(format_columns(&[
        Column::left("Sr.", sr),
        Column::left("Item", name),
        Column::right("Qty", qty),
        Column::right("Rate", rate),
        Column::right("Amount", amount),
    ])));
    rows.push(Row::Rule);
    for line in &view.lines {
        let serial = line.serial.to_string();
        let quantity = line.quantity.to_string();
        let unit = money(line.rate);
        let total = money(line.amount);
        rows.push(Row::Plain(format_columns(&[
            Column::left(&serial, sr),
            Column::left(&line.name, name),
            Column::right(&quantity, qty),
            Column::right(&unit, rate),
            Column::right(&total, amount),
        ])));
    }
    rows
}

fn layout(view: &ReceiptView, width: usize) -> Vec<Row> {
    let mut rows = vec![Row::Heading(view.shop_name.clone())];
    for text in [&view.address, &view.contact] {
        if !text.trim().is_empty() {
            rows.push(Row::Centered(text.trim().to_string()));
        }
    }
    if let Some(gst) = &view.gst_number {
        rows.push(Row::Centered(format!("GSTIN: {gst}")));
    }
    rows.push(Row::Rule);
    rows.push(Row::Heading("TAX INVOICE".to_string()));
    rows.push(Row::Pair("Invoice No:".to_string(), view.invoice_no.clone()));
    rows.push(Row::Pair(
        "Date:".to_string(),
        view.issued_at.format("%d/%m/%Y, %I:%M:%S %p").to_string(),
    ));
    rows.push(Row::Pair("Customer:".to_string(), view.customer_name.clone()));
    rows.push(Row::Pair("Phone:".to_string(), view.phone_number.clone()));
    rows.push(Row::Rule);

    rows.extend(item_rows(view, width));
    rows.push(Row::Rule);

    rows.push(Row::Pair("Subtotal:".to_string(), view.amount(view.subtotal)));
    rows.push(Row::Pair(
        format!("Tax ({}%):", percent(view.tax_percent)),
        view.amount(view.tax),
    ));
    rows.push(Row::Total(
        "Total Amount:".to_string(),
        view.amount(view.grand_total),
    ));
    rows.push(Row::Rule);

    rows.push(Row::Pair(
        "Payment Method:".to_string(),
        view.payment_method.clone(),
    ));
    if let Some(id) = &view.gateway_order_id {
        rows.push(Row::Pair("Razorpay Order ID:".to_string(), id.clone()));
    }
    if let Some(id) = &view.gateway_payment_id {
        rows.push(Row::Pair("Razorpay Payment ID:".to_string(), id.clone()));
    }
    rows.push(Row::Rule);
    rows.push(Row::Centered(view.footer.clone()));
    rows
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// Plain-text receipt `width` characters wide.
pub fn render_text(view: &ReceiptView, width: usize) -> String {
    let width = width.max(24);
    let mut out: Vec<String> = Vec::new();
    for row in layout(view, width) {
        match row {
            Row::Heading(text) | Row::Centered(text) => {
                for part in wrap(&text, width) {
                    out.push(format!("{part:^width$}").trim_end().to_string());
                }
            }
            Row::Rule => out.push("-".repeat(width)),
            Row::Pair(label, value) | Row::Total(label, value) => {
                out.extend(format_pair(&label, &value, width));
            }
            Row::Plain(text) => out.push(text),
        }
    }
    let mut text = out.join("\n");
    text.push('\n');
    text
}

// ---------------------------------------------------------------------------
// HTML
// ---------------------------------------------------------------------------

fn html_shell(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8"/>
<meta name="viewport" content="width=device-width, initial-scale=1.0"/>
<title>{}</title>
<style>
body {{ font-family: ui-monospace, SFMono-Regular, Menlo, monospace; margin: 0; padding: 12px; background: #fff; color: #111; }}
.center {{ text-align: center; }}
.shop {{ font-size: 14px; font-weight: bold; }}
.title {{ margin: 6px 0; font-size: 13px; letter-spacing: 1px; }}
.line {{ display: flex; justify-content: space-between; gap: 8px; font-size: 11px; }}
.total {{ font-weight: bold; font-size: 12px; }}
.section {{ margin-top: 8px; border-top: 1px dashed #111; padding-top: 6px; }}
table {{ width: 100%; border-collapse: collapse; font-size: 11px; }}
th {{ text-align: left; border-bottom: 1px solid #111; }}
.num {{ text-align: right; }}
.note {{ color: #666; font-size: 10px; }}
</style>
</head>
<body>{}</body>
</html>"#,
        esc(title),
        body
    )
}

fn html_line(label: &str, value: &str, class: &str) -> String {
    format!(
        "<div class=\"{class}\"><span>{}</span><span>{}</span></div>",
        esc(label),
        esc(value)
    )
}

/// Standalone HTML page for the print preview. Every value is escaped.
pub fn render_html(view: &ReceiptView) -> String {
    let mut body = format!(
        "<div class=\"center shop\">{}</div>",
        esc(&view.shop_name)
    );
    for text in [&view.address, &view.contact] {
        if !text.trim().is_empty() {
            body.push_str(&format!("<div class=\"center note\">{}</div>", esc(text)));
        }
    }
    if let Some(gst) = &view.gst_number {
        body.push_str(&format!("<div class=\"center note\">GSTIN: {}</div>", esc(gst)));
    }

    body.push_str("<div class=\"section\"><div class=\"center title\">TAX INVOICE</div>");
    body.push_str(&html_line("Invoice No:", &view.invoice_no, "line"));
    body.push_str(&html_line(
        "Date & Time:",
        &view.issued_at.format("%d/%m/%Y, %I:%M:%S %p").to_string(),
        "line",
    ));
    body.push_str(&html_line("Customer Name:", &view.customer_name, "line"));
    body.push_str(&html_line("Phone:", &view.phone_number, "line"));
    body.push_str("</div>");

    body.push_str(
        "<div class=\"section\"><table><thead><tr><th>Sr.</th><th>Item Name</th>\
         <th class=\"num\">Qty</th><th class=\"num\">Rate</th><th class=\"num\">Amount</th>\
         </tr></thead><tbody>",
    );
    for line in &view.lines {
        body.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td>\
             <td class=\"num\">{}</td></tr>",
            line.serial,
            esc(&line.name),
            line.quantity,
            esc(&view.amount(line.rate)),
            esc(&view.amount(line.amount))
        ));
    }
    body.push_str("</tbody></table></div>");

    body.push_str("<div class=\"section\">");
    body.push_str(&html_line("Subtotal:", &view.amount(view.subtotal), "line"));
    body.push_str(&html_line(
        &format!("Tax ({}%):", percent(view.tax_percent)),
        &view.amount(view.tax),
        "line",
    ));
    body.push_str(&html_line(
        "Total Amount:",
        &view.amount(view.grand_total),
        "line total",
    ));
    body.push_str("</div>");

    body.push_str("<div class=\"section\">");
    body.push_str(&html_line("Payment Method:", &view.payment_method, "line"));
    if let Some(id) = &view.gateway_order_id {
        body.push_str(&html_line("Razorpay Order ID:", id, "line"));
    }
    if let Some(id) = &view.gateway_payment_id {
        body.push_str(&html_line("Razorpay Payment ID:", id, "line"));
    }
    body.push_str("</div>");

    body.push_str(&format!(
        "<div class=\"section center\">{}</div>",
        esc(&view.footer)
    ));
    html_shell(&format!("Invoice {}", view.invoice_no), &body)
}

// ---------------------------------------------------------------------------
// ESC/POS
// ---------------------------------------------------------------------------

/// Thermal printer payload: reset, receipt body, feed and partial cut.
pub fn render_escpos(view: &ReceiptView, paper: PaperWidth) -> Vec<u8> {
    let width = paper.chars();
    let mut builder = EscPosBuilder::new().with_paper(paper);
    builder.init();
    for row in layout(view, width) {
        match row {
            Row::Heading(text) => {
                builder.center().bold(true).double_height();
                for part in wrap(&text, width) {
                    builder.line(&part);
                }
                builder.normal_size().bold(false).left();
            }
            Row::Centered(text) => {
                builder.center();
                for part in wrap(&text, width) {
                    builder.line(&part);
                }
                builder.left();
            }
            Row::Rule => {
                builder.separator();
            }
            Row::Pair(label, value) => {
                builder.line_pair(&label, &value);
            }
            Row::Total(label, value) => {
                builder.bold(true).line_pair(&label, &value).bold(false);
            }
            Row::Plain(text) => {
                builder.line(&text);
            }
        }
    }
    builder.feed(3).cut();
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderLine, PaymentDetails};
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .and_then(|d| d.and_hms_opt(h, m, 0))
            .expect("valid time")
    }

    fn settings() -> Settings {
        let mut s = Settings::default();
        s.business.shop_name = "Syndicate Prints".to_string();
        s.business.address = "12 MG Road, Bengaluru".to_string();
        s.business.contact = "+91 98450 00000".to_string();
        s
    }

    fn order(method: PaymentMethod) -> SavedOrder {
        SavedOrder {
            order_id: "ORD_1001".to_string(),
            customer_name: "Asha".to_string(),
            phone_number: "9876543210".to_string(),
            username: Some("cashier1".to_string()),
            items: vec![
                OrderLine {
                    name: "Colour Print A4".to_string(),
                    price: 100.0,
                    quantity: 2,
                    ..OrderLine::default()
                },
                OrderLine {
                    name: "Spiral <Binding>".to_string(),
                    price: 20.0,
                    quantity: 1,
                    ..OrderLine::default()
                },
            ],
            subtotal: 220.0,
            tax: 22.0,
            grand_total: 242.0,
            payment_method: method,
            created_at: Some(at(15, 4)),
            payment_details: Some(PaymentDetails {
                gateway_order_id: "order_gw_1".to_string(),
                gateway_payment_id: "pay_123".to_string(),
                gateway_signature: "sig".to_string(),
                status: Some("COMPLETED".to_string()),
            }),
            tax_percent: Some(10.0),
        }
    }

    #[test]
    fn view_lists_lines_with_serials_and_amounts() {
        let view = ReceiptView::from_order(&order(PaymentMethod::Cash), &settings(), at(9, 0));
        assert_eq!(view.lines.len(), 2);
        assert_eq!(view.lines[0].serial, 1);
        assert_eq!(view.lines[0].amount, 200.0);
        assert_eq!(view.lines[1].serial, 2);
        assert_eq!(view.invoice_no, "ORD_1001");
        assert_eq!(view.issued_at, at(15, 4));
        assert_eq!(view.currency_symbol, "₹");
    }

    #[test]
    fn gateway_ids_only_for_upi() {
        let cash = ReceiptView::from_order(&order(PaymentMethod::Cash), &settings(), at(9, 0));
        assert!(cash.gateway_order_id.is_none());
        assert!(cash.gateway_payment_id.is_none());

        let upi = ReceiptView::from_order(&order(PaymentMethod::Upi), &settings(), at(9, 0));
        assert_eq!(upi.gateway_order_id.as_deref(), Some("order_gw_1"));
        assert_eq!(upi.gateway_payment_id.as_deref(), Some("pay_123"));
    }

    #[test]
    fn tax_percent_falls_back_to_ratio_then_default() {
        let mut o = order(PaymentMethod::Cash);
        o.tax_percent = None;
        o.subtotal = 200.0;
        o.tax = 36.0;
        let view = ReceiptView::from_order(&o, &settings(), at(9, 0));
        assert!((view.tax_percent - 18.0).abs() < 1e-9);

        o.subtotal = 0.0;
        o.tax = 0.0;
        let view = ReceiptView::from_order(&o, &settings(), at(9, 0));
        assert_eq!(view.tax_percent, DEFAULT_TAX_PERCENT);
    }

    #[test]
    fn missing_id_and_timestamp_use_placeholders() {
        let mut o = order(PaymentMethod::Cash);
        o.order_id = String::new();
        o.created_at = None;
        let view = ReceiptView::from_order(&o, &settings(), at(9, 30));
        assert_eq!(view.invoice_no, "N/A");
        assert_eq!(view.issued_at, at(9, 30));
    }

    #[test]
    fn view_is_deterministic() {
        let o = order(PaymentMethod::Upi);
        let a = ReceiptView::from_order(&o, &settings(), at(9, 0));
        let b = ReceiptView::from_order(&o, &settings(), at(9, 0));
        assert_eq!(a, b);
        assert_eq!(render_text(&a, 48), render_text(&b, 48));
    }

    #[test]
    fn text_receipt_has_invoice_sections() {
        let view = ReceiptView::from_order(&order(PaymentMethod::Upi), &settings(), at(9, 0));
        let text = render_text(&view, 48);
        assert!(text.contains("TAX INVOICE"));
        assert!(text.contains("Syndicate Prints"));
        assert!(text.contains("Tax (10%):"));
        assert!(text.contains("₹242.00"));
        assert!(text.contains("Razorpay Payment ID:"));
        assert!(text.contains("14/03/2026, 03:04:00 PM"));
        assert!(text.trim_end().ends_with("Thank You for Your Business!"));
        for line in text.lines() {
            assert!(line.chars().count() <= 48, "line too wide: {line:?}");
        }
    }

    #[test]
    fn narrow_text_receipt_stacks_items() {
        let view = ReceiptView::from_order(&order(PaymentMethod::Cash), &settings(), at(9, 0));
        let text = render_text(&view, 32);
        assert!(text.contains("1. Colour Print A4"));
        assert!(text.contains("   2 x 100.00"));
        assert!(!text.contains("Razorpay"));
    }

    #[test]
    fn html_escapes_values() {
        let view = ReceiptView::from_order(&order(PaymentMethod::Cash), &settings(), at(9, 0));
        let html = render_html(&view);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Spiral &lt;Binding&gt;"));
        assert!(!html.contains("<Binding>"));
        assert!(html.contains("Total Amount:"));
        assert!(html.contains("<title>Invoice ORD_1001</title>"));
    }

    #[test]
    fn escpos_is_ascii_framed_by_init_and_cut() {
        let view = ReceiptView::from_order(&order(PaymentMethod::Upi), &settings(), at(9, 0));
        let bytes = render_escpos(&view, PaperWidth::Mm58);
        assert_eq!(&bytes[..2], &[0x1B, 0x40]);
        assert_eq!(&bytes[bytes.len() - 4..], &[0x1D, 0x56, 0x41, 0x10]);
        assert!(bytes.is_ascii());
        let haystack = String::from_utf8_lossy(&bytes);
        assert!(haystack.contains("Rs.242.00"));
        assert!(haystack.contains("TAX INVOICE"));
    }

    #[test]
    fn percent_trims_trailing_zeros() {
        assert_eq!(percent(18.0), "18");
        assert_eq!(percent(12.5), "12.5");
        assert_eq!(percent(0.0), "0");
    }
}
