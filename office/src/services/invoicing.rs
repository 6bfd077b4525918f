//! Invoice arithmetic, the A4 print plan and the invoice email.
//!
//! Everything here is pure; the ledger calls [`InvoiceTotals::compute`] on
//! every save so stored amounts never come from the client.

use crate::types::Money;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A4 page width in millimetres.
pub const A4_WIDTH_MM: f64 = 210.0;
/// A4 page height in millimetres.
pub const A4_HEIGHT_MM: f64 = 297.0;

/// Decimal places kept for quantities and tax rates (`NUMERIC(_, 3)` columns).
pub const STORED_SCALE: i32 = 3;

/// Round a quantity or tax rate to the precision it is stored at.
#[must_use]
pub fn to_stored_scale(value: f64) -> f64 {
    let factor = 10f64.powi(STORED_SCALE);
    (value * factor).round() / factor
}

/// One line as entered on the invoice form.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItemDraft {
    /// What was sold; blank lines are dropped
    #[serde(default)]
    pub description: String,
    /// Quantity (fractional allowed)
    #[serde(default)]
    pub quantity: f64,
    /// Unit price
    #[serde(default)]
    pub rate: Money,
}

impl InvoiceItemDraft {
    /// Whether the line counts toward totals.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.description.trim().is_empty()
    }

    /// `quantity × rate`, rounded to the cent.
    #[must_use]
    pub fn amount(&self) -> Money {
        line_amount(self.quantity, self.rate)
    }

    /// The line as it will be stored: quantity at [`STORED_SCALE`] places.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            quantity: to_stored_scale(self.quantity),
            ..self
        }
    }
}

/// `quantity × rate`, rounded to the cent. The quantity is first taken at
/// its stored precision.
#[must_use]
pub fn line_amount(quantity: f64, rate: Money) -> Money {
    rate.scale(to_stored_scale(quantity))
}

/// Derived invoice figures.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    /// Sum of line amounts
    pub subtotal: Money,
    /// `subtotal × tax / 100`, rounded to the cent
    pub tax_amount: Money,
    /// `subtotal + tax_amount`
    pub total: Money,
}

impl InvoiceTotals {
    /// Totals over the non-blank lines at `tax_percent`.
    #[must_use]
    pub fn compute(items: &[InvoiceItemDraft], tax_percent: f64) -> Self {
        let subtotal: Money = items
            .iter()
            .filter(|item| !item.is_blank())
            .map(InvoiceItemDraft::amount)
            .sum();
        let tax_amount = subtotal.scale(to_stored_scale(tax_percent) / 100.0);
        Self {
            subtotal,
            tax_amount,
            total: subtotal + tax_amount,
        }
    }
}

/// How a rendered invoice preview is split across A4 pages.
///
/// The preview is scaled to the page width; page `n` shows the slice starting
/// `n × 297` mm down the image, which is why the offsets are negative.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrintLayout {
    /// Scaled image width (the page width)
    pub image_width_mm: f64,
    /// Scaled image height
    pub image_height_mm: f64,
    /// Pages to emit
    pub pages: u32,
    /// Vertical image offset on each page
    pub offsets_mm: Vec<f64>,
}

impl PrintLayout {
    /// Plan pages for a `width_px × height_px` render, emitting at most
    /// `page_limit` pages (a limit of zero means one).
    ///
    /// Returns `None` for an empty render.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn plan(width_px: u32, height_px: u32, page_limit: u32) -> Option<Self> {
        if width_px == 0 {
            return None;
        }
        let image_height_mm = f64::from(height_px) * A4_WIDTH_MM / f64::from(width_px);
        let needed = (image_height_mm / A4_HEIGHT_MM).ceil().max(1.0) as u32;
        let pages = needed.min(page_limit.max(1));
        let offsets_mm = (0..pages).map(|page| -f64::from(page) * A4_HEIGHT_MM).collect();

        Some(Self {
            image_width_mm: A4_WIDTH_MM,
            image_height_mm,
            pages,
            offsets_mm,
        })
    }
}

/// A ready-to-send invoice email.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceEmail {
    /// Recipient
    pub to: String,
    /// `Invoice <number>`
    pub subject: String,
    /// Plain-text body
    pub body: String,
}

/// What goes into an invoice email.
#[derive(Clone, Copy, Debug)]
pub struct EmailDetails<'a> {
    /// Recipient address
    pub email: &'a str,
    /// Recipient first name
    pub first_name: &'a str,
    /// Recipient last name
    pub last_name: &'a str,
    /// Invoice number
    pub invoice_number: &'a str,
    /// Amount due
    pub total: Money,
    /// Due date
    pub due_date: NaiveDate,
    /// Invoice notes
    pub notes: &'a str,
    /// Signature
    pub band_name: &'a str,
}

impl InvoiceEmail {
    /// Compose the email for `details`.
    #[must_use]
    pub fn compose(details: &EmailDetails<'_>) -> Self {
        let body = format!(
            "Dear {first} {last},\n\nPlease find attached your invoice {number} for {total}.\n\nDue Date: {due}\n\n{notes}\n\nThank you!\n{band}",
            first = details.first_name,
            last = details.last_name,
            number = details.invoice_number,
            total = details.total,
            due = details.due_date.format("%-m/%-d/%Y"),
            notes = details.notes,
            band = details.band_name,
        );
        Self {
            to: details.email.to_string(),
            subject: format!("Invoice {}", details.invoice_number),
            body,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::float_cmp)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn item(description: &str, quantity: f64, rate_cents: i64) -> InvoiceItemDraft {
        InvoiceItemDraft {
            description: description.into(),
            quantity,
            rate: Money::from_cents(rate_cents),
        }
    }

    #[test]
    fn show_with_eight_percent_tax() {
        let totals = InvoiceTotals::compute(&[item("Show", 1.0, 150_000)], 8.0);
        assert_eq!(totals.subtotal, Money::from_dollars(1500));
        assert_eq!(totals.tax_amount, Money::from_dollars(120));
        assert_eq!(totals.total, Money::from_dollars(1620));
    }

    #[test]
    fn blank_lines_do_not_count() {
        let totals = InvoiceTotals::compute(&[item("Show", 2.0, 10_000), item("  ", 5.0, 10_000)], 0.0);
        assert_eq!(totals.subtotal, Money::from_dollars(200));
    }

    #[test]
    fn line_amount_rounds_to_the_cent() {
        assert_eq!(line_amount(1.5, Money::from_cents(333)), Money::from_cents(500));
        assert_eq!(line_amount(0.333, Money::from_dollars(10)), Money::from_cents(333));
    }

    #[test]
    fn amounts_follow_the_stored_quantity() {
        let line = item("Set", 0.3333, 10_000).normalized();
        assert_eq!(line.quantity, 0.333);
        assert_eq!(line.amount(), Money::from_cents(3330));
        assert_eq!(item("Set", 0.3333, 10_000).amount(), line.amount());

        // 8.1234% is stored as 8.123%.
        let totals = InvoiceTotals::compute(&[item("Show", 1.0, 100_000)], 8.1234);
        assert_eq!(totals.tax_amount, Money::from_cents(8123));
    }

    #[test]
    fn print_plan_respects_the_page_limit() {
        // 1000 × 3000 px scales to 210 × 630 mm: three pages needed.
        let plan = PrintLayout::plan(1000, 3000, 10).unwrap();
        assert_eq!(plan.pages, 3);
        assert_eq!(plan.offsets_mm, [0.0, -297.0, -594.0]);

        let capped = PrintLayout::plan(1000, 3000, 2).unwrap();
        assert_eq!(capped.pages, 2);

        let zero_limit = PrintLayout::plan(1000, 3000, 0).unwrap();
        assert_eq!(zero_limit.pages, 1);

        assert!(PrintLayout::plan(0, 100, 1).is_none());
    }

    #[test]
    fn short_render_is_one_page() {
        let plan = PrintLayout::plan(1000, 10, 5).unwrap();
        assert_eq!(plan.pages, 1);
        assert_eq!(plan.offsets_mm, [0.0]);
    }

    #[test]
    fn email_body_names_number_total_and_due_date() {
        let email = InvoiceEmail::compose(&EmailDetails {
            email: "jo@x.com",
            first_name: "Jo",
            last_name: "Ray",
            invoice_number: "INV-7",
            total: Money::from_dollars(1620),
            due_date: NaiveDate::from_ymd_opt(2025, 2, 14).unwrap(),
            notes: "Thank you for your business!",
            band_name: "The Band",
        });
        assert_eq!(email.to, "jo@x.com");
        assert_eq!(email.subject, "Invoice INV-7");
        assert!(email.body.starts_with("Dear Jo Ray,"));
        assert!(email.body.contains("your invoice INV-7 for $1620.00."));
        assert!(email.body.contains("Due Date: 2/14/2025"));
        assert!(email.body.ends_with("Thank you!\nThe Band"));
    }

    proptest! {
        #[test]
        fn total_is_subtotal_plus_tax(
            lines in prop::collection::vec((0u32..1000, 0i64..1_000_000), 0..8),
            tax_tenths in 0u32..300,
        ) {
            let items: Vec<_> = lines
                .iter()
                .map(|(q, rate)| item("line", f64::from(*q) / 10.0, *rate))
                .collect();
            let tax = f64::from(tax_tenths) / 10.0;
            let totals = InvoiceTotals::compute(&items, tax);

            let sum: Money = items.iter().map(InvoiceItemDraft::amount).sum();
            prop_assert_eq!(totals.subtotal, sum);
            prop_assert_eq!(totals.total, totals.subtotal + totals.subtotal.scale(tax / 100.0));
        }

        #[test]
        fn line_amount_is_cent_rounded_product(q in 0u32..100_000, rate in 0i64..10_000_000) {
            let quantity = f64::from(q) / 1000.0;
            let expected = (quantity * rate as f64).round() as i64;
            prop_assert_eq!(line_amount(quantity, Money::from_cents(rate)).cents(), expected);
        }
    }
}
