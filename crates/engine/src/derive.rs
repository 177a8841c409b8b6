//! Field derivation solver.
//!
//! Fills every numeric field that can be computed from the known ones, in a
//! single fixed pass. A field is only ever written while it is absent, so a
//! value known on input (or derived earlier in the pass) is never replaced.
//! Later steps do read values derived by earlier steps.
//!
//! Order (document): net, VAT amount, VAT percent, gross.
//! Order (line): subtotal, VAT amount, VAT percent, total, unit price, quantity.
//!
//! Every division checks its divisor first; a blocked path falls through to
//! the next one, and a field with no runnable path stays `None`.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::model::{LineItem, PartialFinancialRecord};
use crate::money::{checked_div, gross_factor, round_to, HUNDRED, MONEY_DP, PRICE_DP};

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Net,
    Gross,
    Quantity,
    UnitPrice,
    Subtotal,
    Total,
    VatAmount,
    VatPercent,
}

/// Which formula produced a value. "Base" is net (document) or subtotal
/// (line); "total" is gross (document) or line total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    BaseFromQuantityTimesPrice,
    BaseFromTotalAndPercent,
    BaseFromTotalMinusVat,
    VatFromBaseAndPercent,
    VatFromTotalMinusBase,
    PercentFromVatAndBase,
    PercentFromTotalAndBase,
    TotalFromBaseAndPercent,
    TotalFromBasePlusVat,
    PriceFromBaseAndQuantity,
    PriceFromTotalPercentAndQuantity,
    QuantityFromBaseAndPrice,
    QuantityFromTotalPercentAndPrice,
    QuantityDefaultOne,
    PriceDefaultSubtotal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Derivation {
    pub field: Field,
    pub rule: Rule,
    pub value: Decimal,
}

/// A record with derivable fields filled, plus the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Derived<T> {
    pub value: T,
    pub provenance: Vec<Derivation>,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Derive the four document anchors. Line items are returned untouched.
pub fn derive_document(record: &PartialFinancialRecord) -> Derived<PartialFinancialRecord> {
    let mut solver = Solver::default();
    let mut tri = Triangle {
        base: record.net,
        vat: record.vat_amount,
        percent: record.vat_percent,
        total: record.gross,
    };
    solver.solve_triangle(&mut tri, Field::Net, Field::Gross, None);

    let mut value = record.clone();
    value.net = tri.base;
    value.vat_amount = tri.vat;
    value.vat_percent = tri.percent;
    value.gross = tri.total;

    Derived {
        value,
        provenance: solver.log,
    }
}

/// Derive the six line amounts, then apply the quantity/price defaults.
pub fn derive_line(line: &LineItem) -> Derived<LineItem> {
    let mut solver = Solver::default();
    let mut value = line.clone();

    let mut tri = Triangle {
        base: line.subtotal,
        vat: line.vat_amount,
        percent: line.vat_percent,
        total: line.total,
    };
    let qty_times_price = mul(line.quantity, line.unit_price);
    solver.solve_triangle(&mut tri, Field::Subtotal, Field::Total, qty_times_price);
    value.subtotal = tri.base;
    value.vat_amount = tri.vat;
    value.vat_percent = tri.percent;
    value.total = tri.total;

    // Base implied by total and percent; shared by the price and quantity fallbacks.
    let base_from_total = tri.total.zip(tri.percent).and_then(|(t, p)| checked_div(t, gross_factor(p)));

    if value.unit_price.is_none() {
        let paths = [
            (Rule::PriceFromBaseAndQuantity, div(value.subtotal, value.quantity)),
            (Rule::PriceFromTotalPercentAndQuantity, div(base_from_total, value.quantity)),
        ];
        value.unit_price = solver.settle(Field::UnitPrice, PRICE_DP, &paths);
    }

    if value.quantity.is_none() {
        let paths = [
            (Rule::QuantityFromBaseAndPrice, div(value.subtotal, value.unit_price)),
            (Rule::QuantityFromTotalPercentAndPrice, div(base_from_total, value.unit_price)),
        ];
        value.quantity = solver.settle(Field::Quantity, MONEY_DP, &paths);
    }

    // Defaults only once the subtotal is known; otherwise a defaulted
    // quantity would let a second pass compute a subtotal this pass could not.
    if let Some(subtotal) = value.subtotal {
        if value.quantity.is_none() {
            value.quantity = solver.settle(Field::Quantity, MONEY_DP, &[(Rule::QuantityDefaultOne, Some(Decimal::ONE))]);
        }
        if value.unit_price.is_none() {
            value.unit_price = solver.settle(Field::UnitPrice, PRICE_DP, &[(Rule::PriceDefaultSubtotal, Some(subtotal))]);
        }
    }

    Derived {
        value,
        provenance: solver.log,
    }
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

struct Triangle {
    base: Option<Decimal>,
    vat: Option<Decimal>,
    percent: Option<Decimal>,
    total: Option<Decimal>,
}

#[derive(Default)]
struct Solver {
    log: Vec<Derivation>,
}

impl Solver {
    /// Base, VAT, percent, total; in that order, each only if absent.
    fn solve_triangle(
        &mut self,
        t: &mut Triangle,
        base_field: Field,
        total_field: Field,
        qty_times_price: Option<Decimal>,
    ) {
        if t.base.is_none() {
            let paths = [
                (Rule::BaseFromQuantityTimesPrice, qty_times_price),
                (Rule::BaseFromTotalAndPercent, t.total.zip(t.percent).and_then(|(g, p)| checked_div(g, gross_factor(p)))),
                (Rule::BaseFromTotalMinusVat, sub(t.total, t.vat)),
            ];
            t.base = self.settle(base_field, MONEY_DP, &paths);
        }

        if t.vat.is_none() {
            let paths = [
                (Rule::VatFromBaseAndPercent, mul(t.base, t.percent).map(|v| v / HUNDRED)),
                (Rule::VatFromTotalMinusBase, sub(t.total, t.base)),
            ];
            t.vat = self.settle(Field::VatAmount, MONEY_DP, &paths);
        }

        if t.percent.is_none() {
            let paths = [
                (Rule::PercentFromVatAndBase, div(t.vat, t.base).and_then(|r| r.checked_mul(HUNDRED))),
                (Rule::PercentFromTotalAndBase, div(t.total, t.base).and_then(|r| (r - Decimal::ONE).checked_mul(HUNDRED))),
            ];
            t.percent = self.settle(Field::VatPercent, MONEY_DP, &paths);
        }

        if t.total.is_none() {
            let paths = [
                (Rule::TotalFromBaseAndPercent, t.base.zip(t.percent).and_then(|(n, p)| n.checked_mul(gross_factor(p)))),
                (Rule::TotalFromBasePlusVat, add(t.base, t.vat)),
            ];
            t.total = self.settle(total_field, MONEY_DP, &paths);
        }
    }

    /// Take the first runnable path, round it, and record where it came from.
    fn settle(&mut self, field: Field, dp: u32, paths: &[(Rule, Option<Decimal>)]) -> Option<Decimal> {
        let (rule, raw) = paths.iter().find_map(|(rule, v)| v.map(|v| (*rule, v)))?;
        let value = round_to(raw, dp);
        log::debug!("derived {field:?} = {value} via {rule:?}");
        self.log.push(Derivation { field, rule, value });
        Some(value)
    }
}

fn mul(a: Option<Decimal>, b: Option<Decimal>) -> Option<Decimal> {
    a?.checked_mul(b?)
}

fn add(a: Option<Decimal>, b: Option<Decimal>) -> Option<Decimal> {
    a?.checked_add(b?)
}

fn sub(a: Option<Decimal>, b: Option<Decimal>) -> Option<Decimal> {
    a?.checked_sub(b?)
}

fn div(a: Option<Decimal>, b: Option<Decimal>) -> Option<Decimal> {
    checked_div(a?, b?)
}
