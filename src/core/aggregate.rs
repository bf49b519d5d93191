use super::base::{
    capped, insert_nonzero, IncomeHeads, ItrFactors, RegimeBase, TaxBase, PROFESSIONAL_TAX,
    STANDARD_DEDUCTION,
};
use super::error::TaxError;
use super::extract::{AisFields, DocumentExtract, ExtractedFields, Form16Fields};
use super::regime::Regime;
use super::rules::TaxRuleTable;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Income and deductions summed up from flat document extracts
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IncomeSummary {
    pub gross_total_income: Decimal,
    pub salary_income: Decimal,
    pub house_property_income: Decimal,
    pub capital_gains: Decimal,
    pub business_income: Decimal,
    pub other_income: Decimal,
    pub total_tds: Decimal,
    /// Deductions claimable under the old regime, by label
    pub deductions: BTreeMap<String, Decimal>,
    pub has_foreign_assets: bool,
}

impl IncomeSummary {
    fn add_form16(&mut self, fields: &Form16Fields) {
        self.salary_income = self.salary_income.max(fields.gross_salary);
        self.gross_total_income = self.gross_total_income.max(fields.total_income);
        self.total_tds = self.total_tds.max(fields.total_tds);
        for (section, amount) in &fields.deductions {
            *self.deductions.entry(section.clone()).or_default() += *amount;
        }
        insert_nonzero(&mut self.deductions, STANDARD_DEDUCTION, fields.standard_deduction);
        insert_nonzero(&mut self.deductions, PROFESSIONAL_TAX, fields.professional_tax);
    }

    fn add_ais(&mut self, fields: &AisFields) {
        self.salary_income = self
            .salary_income
            .max(fields.salary)
            .max(fields.salary_income);
        self.other_income += fields.interest_income + fields.dividend_income + fields.other_income;
        self.capital_gains += fields.capital_gains;
        self.house_property_income += fields.house_property_income;
        self.business_income = self.business_income.max(fields.business_income);
        self.has_foreign_assets |= fields.has_foreign_assets;
    }

    fn amounts(&self) -> impl Iterator<Item = (&str, Decimal)> + '_ {
        [
            ("gross_total_income", self.gross_total_income),
            ("salary_income", self.salary_income),
            ("house_property_income", self.house_property_income),
            ("capital_gains", self.capital_gains),
            ("business_income", self.business_income),
            ("other_income", self.other_income),
            ("total_tds", self.total_tds),
        ]
        .into_iter()
        .chain(self.deductions.iter().map(|(label, amount)| (label.as_str(), *amount)))
    }
}

/// Fold extracts into one summary.
///
/// Form 16 salary, gross total income and TDS take the maximum across
/// re-uploads while its deductions add up. Form 26AS only contributes TDS.
/// AIS salary and business income take the maximum; interest, dividends,
/// other income and capital gains add. Extracts without a payload are skipped.
pub fn aggregate(documents: &[DocumentExtract]) -> Result<IncomeSummary, TaxError> {
    let mut summary = IncomeSummary::default();
    for doc in documents {
        match doc.fields()? {
            None => log::warn!(
                "skipping {} extract {}: no extracted data",
                doc.doc_type,
                doc.file_name.as_deref().unwrap_or("<unnamed>")
            ),
            Some(ExtractedFields::Form16(fields)) => summary.add_form16(&fields),
            Some(ExtractedFields::Form26As(fields)) => {
                summary.total_tds = summary.total_tds.max(fields.total_tds)
            }
            Some(ExtractedFields::Ais(fields)) => summary.add_ais(&fields),
            Some(ExtractedFields::Other) => {
                log::debug!("ignoring extract of type {}", doc.doc_type)
            }
        }
    }

    if summary.gross_total_income.is_zero() {
        summary.gross_total_income = summary.salary_income
            + summary.house_property_income
            + summary.capital_gains
            + summary.other_income;
        log::debug!("derived gross total income {}", summary.gross_total_income);
    }
    Ok(summary)
}

impl TaxBase for IncomeSummary {
    fn validate(&self) -> Result<(), TaxError> {
        match self.amounts().find(|(_, amount)| *amount < Decimal::ZERO) {
            Some((field, amount)) => Err(TaxError::MalformedProfile(format!(
                "{field} is negative ({amount})"
            ))),
            None => Ok(()),
        }
    }

    fn regime_base(&self, regime: Regime, rules: &TaxRuleTable) -> RegimeBase {
        let salary_rules = &rules.salary_deductions;
        let salary = self.salary_income.min(self.gross_total_income);
        let claimed = |label: &str| self.deductions.get(label).copied().unwrap_or_default();

        let mut salary_deductions = BTreeMap::new();
        insert_nonzero(
            &mut salary_deductions,
            STANDARD_DEDUCTION,
            capped(
                claimed(STANDARD_DEDUCTION),
                *salary_rules.standard_deduction.get(regime),
            ),
        );

        let mut deductions = BTreeMap::new();
        match regime {
            Regime::Old => {
                insert_nonzero(
                    &mut salary_deductions,
                    PROFESSIONAL_TAX,
                    capped(
                        claimed(PROFESSIONAL_TAX),
                        Some(salary_rules.professional_tax_cap),
                    ),
                );
                self.deductions
                    .iter()
                    .filter(|(label, _)| *label != STANDARD_DEDUCTION && *label != PROFESSIONAL_TAX)
                    .for_each(|(label, amount)| insert_nonzero(&mut deductions, label, *amount));
            }
            Regime::New => {
                for label in &rules.new_regime_deductions {
                    insert_nonzero(&mut deductions, label, claimed(label));
                }
            }
        }

        RegimeBase {
            salary,
            salary_deductions,
            other_income: self.gross_total_income - salary,
            deductions,
        }
    }

    fn income_heads(&self) -> IncomeHeads {
        IncomeHeads {
            salary: self.salary_income,
            house_property: self.house_property_income,
            capital_gains: self.capital_gains,
            business: self.business_income,
            other: self.other_income,
        }
    }

    fn gross_total_income(&self) -> Decimal {
        self.gross_total_income
    }

    fn total_credits(&self) -> Decimal {
        self.total_tds
    }

    fn itr_factors(&self) -> ItrFactors {
        ItrFactors {
            gross_income: self.gross_total_income,
            has_business_income: self.business_income > Decimal::ZERO,
            has_capital_gains: self.capital_gains > Decimal::ZERO,
            has_foreign_assets: self.has_foreign_assets,
        }
    }
}
