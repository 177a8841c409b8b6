//! Line-sum vs document consistency.
//!
//! Two independent gates:
//! - [`check_totals`]: advisory, tight tolerance; reported, never written back.
//! - [`check_export_readiness`]: two-tier tolerance plus required fields;
//!   an `Exceeded` tier or a missing field blocks export.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::{ExportTolerance, TotalsTolerance};
use crate::derive::Field;
use crate::model::{LineItem, PartialFinancialRecord};

// ---------------------------------------------------------------------------
// Line sums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineSums {
    /// `None` when the sum overflows the decimal range.
    pub subtotal: Option<Decimal>,
    pub vat_amount: Option<Decimal>,
    pub total: Option<Decimal>,
    /// Lines missing at least one of subtotal / VAT / total.
    pub incomplete_lines: usize,
}

impl Default for LineSums {
    fn default() -> Self {
        Self {
            subtotal: Some(Decimal::ZERO),
            vat_amount: Some(Decimal::ZERO),
            total: Some(Decimal::ZERO),
            incomplete_lines: 0,
        }
    }
}

fn add(sum: Option<Decimal>, amount: Option<Decimal>) -> Option<Decimal> {
    sum?.checked_add(amount.unwrap_or_default())
}

pub fn sum_lines(lines: &[LineItem]) -> LineSums {
    let mut sums = LineSums::default();
    for line in lines {
        if line.subtotal.is_none() || line.vat_amount.is_none() || line.total.is_none() {
            sums.incomplete_lines += 1;
        }
        sums.subtotal = add(sums.subtotal, line.subtotal);
        sums.vat_amount = add(sums.vat_amount, line.vat_amount);
        sums.total = add(sums.total, line.total);
    }
    sums
}

// ---------------------------------------------------------------------------
// Advisory totals check
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnchorComparison {
    pub field: Field,
    pub document: Option<Decimal>,
    pub lines: Option<Decimal>,
    /// `document - lines`; `None` when either side is unknown or overflows.
    pub diff: Option<Decimal>,
    pub matches: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalsReport {
    pub net: AnchorComparison,
    pub vat_amount: AnchorComparison,
    pub gross: AnchorComparison,
    pub incomplete_lines: usize,
}

impl TotalsReport {
    pub fn all_match(&self) -> bool {
        self.net.matches && self.vat_amount.matches && self.gross.matches
    }

    pub fn comparisons(&self) -> [&AnchorComparison; 3] {
        [&self.net, &self.vat_amount, &self.gross]
    }
}

/// Compare summed line amounts with the document anchors.
pub fn check_totals(record: &PartialFinancialRecord, tolerance: &TotalsTolerance) -> TotalsReport {
    let sums = sum_lines(&record.line_items);
    let compare = |field: Field, document: Option<Decimal>, lines: Option<Decimal>| {
        let diff = document.zip(lines).and_then(|(d, l)| d.checked_sub(l));
        AnchorComparison {
            field,
            document,
            lines,
            diff,
            matches: diff.is_some_and(|d| d.abs() <= tolerance.tolerance),
        }
    };

    let report = TotalsReport {
        net: compare(Field::Net, record.net, sums.subtotal),
        vat_amount: compare(Field::VatAmount, record.vat_amount, sums.vat_amount),
        gross: compare(Field::Gross, record.gross, sums.total),
        incomplete_lines: sums.incomplete_lines,
    };

    for c in report.comparisons() {
        if !c.matches {
            log::warn!(
                "document {:?}: {:?} is {:?}, lines sum to {:?} (diff {:?})",
                record.document_number.as_deref().unwrap_or("?"),
                c.field,
                c.document,
                c.lines,
                c.diff,
            );
        }
    }

    report
}

// ---------------------------------------------------------------------------
// Export readiness
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToleranceTier {
    Exact,
    WithinTolerance,
    Exceeded,
}

impl ToleranceTier {
    pub fn for_diff(diff: Decimal, tolerance: &ExportTolerance) -> Self {
        let abs = diff.abs();
        if abs <= tolerance.exact {
            Self::Exact
        } else if abs <= tolerance.tolerance {
            Self::WithinTolerance
        } else {
            Self::Exceeded
        }
    }

    pub fn passes(&self) -> bool {
        !matches!(self, Self::Exceeded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredField {
    SellerName,
    BuyerName,
    InvoiceDate,
    Currency,
    DocumentNumber,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierCheck {
    pub field: Field,
    /// `None` when the line sum or the difference overflows; tiered `Exceeded`.
    pub diff: Option<Decimal>,
    pub tier: ToleranceTier,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportReadiness {
    pub ready: bool,
    pub missing_fields: Vec<RequiredField>,
    /// Net / gross that are absent or zero. VAT may legitimately be zero.
    pub missing_amounts: Vec<Field>,
    /// Empty when the document has no line items.
    pub totals: Vec<TierCheck>,
}

/// Decide whether a derived document can be handed to an exporter.
pub fn check_export_readiness(record: &PartialFinancialRecord, tolerance: &ExportTolerance) -> ExportReadiness {
    let mut missing_fields = Vec::new();
    if record.seller.name.is_none() {
        missing_fields.push(RequiredField::SellerName);
    }
    if record.buyer.name.is_none() {
        missing_fields.push(RequiredField::BuyerName);
    }
    if record.invoice_date.is_none() {
        missing_fields.push(RequiredField::InvoiceDate);
    }
    if record.currency.is_none() {
        missing_fields.push(RequiredField::Currency);
    }
    if record.document_number.is_none() {
        missing_fields.push(RequiredField::DocumentNumber);
    }

    let missing_amounts: Vec<Field> = [(Field::Net, record.net), (Field::Gross, record.gross)]
        .into_iter()
        .filter(|(_, v)| v.map_or(true, |v| v.is_zero()))
        .map(|(f, _)| f)
        .collect();

    let totals = if record.line_items.is_empty() {
        Vec::new()
    } else {
        let sums = sum_lines(&record.line_items);
        [
            (Field::Net, record.net, sums.subtotal),
            (Field::VatAmount, record.vat_amount, sums.vat_amount),
            (Field::Gross, record.gross, sums.total),
        ]
        .into_iter()
        .map(|(field, document, lines)| {
            let diff = lines.and_then(|l| document.unwrap_or_default().checked_sub(l));
            TierCheck {
                field,
                diff,
                tier: diff.map_or(ToleranceTier::Exceeded, |d| ToleranceTier::for_diff(d, tolerance)),
            }
        })
        .collect()
    };

    let ready = missing_fields.is_empty()
        && missing_amounts.is_empty()
        && totals.iter().all(|t| t.tier.passes());

    if !ready {
        log::warn!(
            "document {:?} blocked for export: missing {:?}, amounts {:?}, tiers {:?}",
            record.document_number.as_deref().unwrap_or("?"),
            missing_fields,
            missing_amounts,
            totals.iter().map(|t| t.tier).collect::<Vec<_>>(),
        );
    }

    ExportReadiness {
        ready,
        missing_fields,
        missing_amounts,
        totals,
    }
}
