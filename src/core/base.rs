use super::error::TaxError;
use super::regime::Regime;
use super::rules::TaxRuleTable;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

pub const EXEMPT_ALLOWANCES: &str = "Exempt Allowances u/s 10";
pub const STANDARD_DEDUCTION: &str = "Standard Deduction";
pub const PROFESSIONAL_TAX: &str = "Professional Tax";

/// Anything the regime calculator can compute tax for: a reconciled profile
/// or an aggregated income summary.
pub trait TaxBase: Serialize {
    /// Reject inputs the calculator must not silently coerce
    fn validate(&self) -> Result<(), TaxError>;

    /// Income and the deductions claimable under `regime`
    fn regime_base(&self, regime: Regime, rules: &TaxRuleTable) -> RegimeBase;

    fn income_heads(&self) -> IncomeHeads;

    /// Gross total income before any deduction
    fn gross_total_income(&self) -> Decimal;

    /// Taxes already paid or deducted that settle against the liability
    fn total_credits(&self) -> Decimal;

    fn itr_factors(&self) -> ItrFactors {
        let heads = self.income_heads();
        ItrFactors {
            gross_income: self.gross_total_income(),
            has_business_income: heads.business > Decimal::ZERO,
            has_capital_gains: heads.capital_gains > Decimal::ZERO,
            has_foreign_assets: false,
        }
    }
}

/// Income split the way the slab computation consumes it for one regime.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegimeBase {
    /// Gross salary before any salary-head deduction
    pub salary: Decimal,
    /// Deductions from the salary head; salary never drops below zero
    pub salary_deductions: BTreeMap<String, Decimal>,
    pub other_income: Decimal,
    /// Deductions from total income (Chapter VI-A and similar)
    pub deductions: BTreeMap<String, Decimal>,
}

impl RegimeBase {
    pub fn net_salary(&self) -> Decimal {
        let claimed: Decimal = self.salary_deductions.values().sum();
        (self.salary - claimed).max(Decimal::ZERO)
    }

    pub fn taxable_income(&self) -> Decimal {
        let claimed: Decimal = self.deductions.values().sum();
        (self.net_salary() + self.other_income - claimed).max(Decimal::ZERO)
    }

    /// Every deduction claimed, by label
    pub fn deductions_used(&self) -> BTreeMap<String, Decimal> {
        self.salary_deductions
            .iter()
            .chain(self.deductions.iter())
            .filter(|(_, amount)| !amount.is_zero())
            .map(|(label, amount)| (label.clone(), *amount))
            .collect()
    }

    pub fn total_deductions(&self) -> Decimal {
        self.salary_deductions.values().chain(self.deductions.values()).sum()
    }
}

/// Income by head, for reporting
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IncomeHeads {
    pub salary: Decimal,
    pub house_property: Decimal,
    pub capital_gains: Decimal,
    pub business: Decimal,
    pub other: Decimal,
}

/// Inputs to the ITR form decision
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItrFactors {
    pub gross_income: Decimal,
    pub has_business_income: bool,
    pub has_capital_gains: bool,
    pub has_foreign_assets: bool,
}

/// A document figure limited by the rule table's cap; `None` cap means not allowed.
pub(crate) fn capped(amount: Decimal, cap: Option<Decimal>) -> Decimal {
    match cap {
        Some(cap) => amount.min(cap).max(Decimal::ZERO),
        None => Decimal::ZERO,
    }
}

pub(crate) fn insert_nonzero(map: &mut BTreeMap<String, Decimal>, label: &str, amount: Decimal) {
    if !amount.is_zero() {
        *map.entry(label.to_string()).or_insert(Decimal::ZERO) += amount;
    }
}
