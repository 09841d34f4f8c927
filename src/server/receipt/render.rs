//! Receipt presentations: structured data, fixed-width text and HTML.
//!
//! All three are projections of one [`ReceiptLayout`], so they always show the same
//! items and amounts. None of them looks anything up; callers hand in a resolved
//! receipt together with the owner's business name.

use crate::server::model::receipt::{
    LineItemResponse, PaymentMethod, PaymentResponse, Receipt, ReceiptId, ReceiptLinks,
    ReceiptResponse,
};
use crate::server::receipt::money::Money;
use chrono::{DateTime, Utc};
use derive_more::{Display, Error};

pub(crate) const MIN_LINE_WIDTH: usize = 28;
pub(crate) const DEFAULT_LINE_WIDTH: usize = 32;
pub(crate) const MAX_LINE_WIDTH: usize = 1024;

const THANK_YOU: &str = "Thank you for your purchase!";
const SUM_LABEL: &str = "SUM";
const CHANGE_LABEL: &str = "CHANGE";

/// Width of the plain-text receipt in characters, between [`MIN_LINE_WIDTH`] and
/// [`MAX_LINE_WIDTH`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LineWidth(usize);

#[derive(Debug, Display, Error, PartialEq, Eq)]
#[display("line width must be between 28 and 1024, got {width}")]
pub(crate) struct LineWidthOutOfRange {
    width: usize,
}

impl LineWidth {
    pub fn new(width: usize) -> Result<Self, LineWidthOutOfRange> {
        if !(MIN_LINE_WIDTH..=MAX_LINE_WIDTH).contains(&width) {
            return Err(LineWidthOutOfRange { width });
        }
        Ok(Self(width))
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for LineWidth {
    fn default() -> Self {
        Self(DEFAULT_LINE_WIDTH)
    }
}

pub(crate) struct LayoutLine<'a> {
    pub name: &'a str,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

/// What every presentation of a receipt shows.
pub(crate) struct ReceiptLayout<'a> {
    pub id: ReceiptId,
    pub business_name: &'a str,
    pub lines: Vec<LayoutLine<'a>>,
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub amount_tendered: Money,
    pub change: Money,
    pub created_at: DateTime<Utc>,
}

impl<'a> ReceiptLayout<'a> {
    pub fn new(receipt: &'a Receipt, business_name: &'a str) -> Self {
        Self {
            id: receipt.id,
            business_name,
            lines: receipt
                .items
                .iter()
                .map(|item| LayoutLine {
                    name: &item.name,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    line_total: item.line_total,
                })
                .collect(),
            total: receipt.total,
            payment_method: receipt.payment.method,
            amount_tendered: receipt.payment.amount_tendered,
            change: receipt.change,
            created_at: receipt.created_at,
        }
    }

    /// Structured view, with links to the other views built from `base_url`.
    pub fn structured(&self, base_url: &str) -> ReceiptResponse {
        ReceiptResponse {
            id: self.id,
            items: self
                .lines
                .iter()
                .map(|line| LineItemResponse {
                    name: line.name.to_string(),
                    unit_price: line.unit_price,
                    quantity: line.quantity,
                    line_total: line.line_total,
                })
                .collect(),
            payment: PaymentResponse {
                method: self.payment_method,
                amount: self.amount_tendered,
            },
            total: self.total,
            change: self.change,
            created_at: self.created_at,
            links: ReceiptLinks::new(base_url, self.id),
        }
    }

    /// Fixed-width text receipt. `printed_at` is the moment of printing, not of sale.
    pub fn text(&self, width: LineWidth, printed_at: DateTime<Utc>) -> String {
        let width = width.get();
        let double = "=".repeat(width);
        let single = "-".repeat(width);
        let mut lines: Vec<String> = Vec::with_capacity(self.lines.len() * 3 + 10);

        lines.push(format!("{:^width$}", self.business_name));
        lines.push(double.clone());
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                lines.push(single.clone());
            }
            lines.push(line.name.chars().take(width).collect());
            lines.push(pair(
                &format!("{} x {}", line.quantity, line.unit_price.grouped()),
                &line.line_total.grouped(),
                width,
            ));
        }
        lines.push(double.clone());
        lines.push(pair(SUM_LABEL, &self.total.grouped(), width));
        lines.push(pair(self.payment_method.text_label(), &self.total.grouped(), width));
        lines.push(pair(CHANGE_LABEL, &self.change.grouped(), width));
        lines.push(double);
        lines.push(format!(
            "{:^width$}",
            printed_at.format("%d.%m.%Y %H:%M").to_string()
        ));
        lines.push(format!("{THANK_YOU:^width$}"));
        lines.join("\n")
    }

    pub fn html(&self) -> String {
        let mut body = String::new();
        body.push_str(&format!(
            "<div class=\"center\"><strong>{}</strong></div>\
             <div class=\"center\">Receipt #{}</div>",
            esc(self.business_name),
            self.id
        ));
        body.push_str("<div class=\"section\">");
        for line in &self.lines {
            body.push_str(&format!(
                "<div class=\"item\"><div>{}</div><div class=\"line\"><span>{} x {}</span>\
                 <span>{}</span></div></div>",
                esc(line.name),
                line.quantity,
                line.unit_price.grouped(),
                line.line_total.grouped()
            ));
        }
        body.push_str("</div><div class=\"section\">");
        for (label, amount) in [
            (SUM_LABEL, self.total),
            (self.payment_method.display_label(), self.total),
            (CHANGE_LABEL, self.change),
        ] {
            body.push_str(&format!(
                "<div class=\"line\"><span>{}</span><span>{}</span></div>",
                label,
                amount.grouped()
            ));
        }
        body.push_str(&format!(
            "</div><div class=\"section center\">{}</div><div class=\"center\">{}</div>",
            self.created_at.format("%d.%m.%Y at %H:%M:%S"),
            THANK_YOU
        ));
        html_shell(&format!("Receipt #{}", self.id), &body)
    }
}

/// Left label, right-aligned amount. The label column never shrinks below zero,
/// so an amount wider than the line simply overflows it.
fn pair(label: &str, amount: &str, width: usize) -> String {
    let label_width = width.saturating_sub(amount.chars().count());
    format!("{label:<label_width$}{amount}")
}

fn esc(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn html_shell(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8"/>
<meta name="viewport" content="width=device-width, initial-scale=1.0"/>
<title>{}</title>
<style>
body {{ font-family: ui-monospace, SFMono-Regular, Menlo, monospace; max-width: 360px; margin: 0 auto; padding: 12px; color: #111; }}
.line {{ display: flex; justify-content: space-between; gap: 8px; }}
.item {{ padding: 4px 0; border-bottom: 1px dashed #999; }}
.item:last-child {{ border-bottom: none; }}
.section {{ margin-top: 8px; border-top: 2px solid #111; padding-top: 6px; }}
.center {{ text-align: center; }}
</style>
</head>
<body>{}</body>
</html>"#,
        esc(title),
        body
    )
}
