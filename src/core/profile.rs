//! Canonical per-taxpayer, per-year financial facts extracted from one or more documents.

use super::base::{
    capped, insert_nonzero, IncomeHeads, RegimeBase, TaxBase, EXEMPT_ALLOWANCES,
    PROFESSIONAL_TAX, STANDARD_DEDUCTION,
};
use super::error::TaxError;
use super::regime::Regime;
use super::rules::TaxRuleTable;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;

/// Source document family, used to decide merge priority
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Form16,
    Form26As,
    Ais,
    Other,
}

impl DocumentKind {
    pub fn classify(doc_type: &str) -> Self {
        let normalized: String = doc_type
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "form16" | "formno16" => DocumentKind::Form16,
            "form26as" | "26as" => DocumentKind::Form26As,
            "ais" | "annualinformationstatement" => DocumentKind::Ais,
            _ => DocumentKind::Other,
        }
    }
}

/// Who and what the document is about. Traceability only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Identity {
    #[serde(default)]
    pub employee_name: Option<String>,
    #[serde(default)]
    pub employee_pan: Option<String>,
    #[serde(default)]
    pub employer_name: Option<String>,
    #[serde(default)]
    pub employer_pan: Option<String>,
    #[serde(default)]
    pub employer_tan: Option<String>,
    #[serde(default)]
    pub assessment_year: Option<String>,
    #[serde(default)]
    pub financial_year: Option<String>,
    /// e.g. "Form 16", "Form 26AS", "AIS"
    #[serde(default)]
    pub doc_type: Option<String>,
}

impl Identity {
    pub fn kind(&self) -> DocumentKind {
        self.doc_type
            .as_deref()
            .map_or(DocumentKind::Other, DocumentKind::classify)
    }

    /// Fill fields this identity lacks from `other`; document type is kept.
    pub fn fill_missing(&mut self, other: &Identity) {
        let pairs = [
            (&mut self.employee_name, &other.employee_name),
            (&mut self.employee_pan, &other.employee_pan),
            (&mut self.employer_name, &other.employer_name),
            (&mut self.employer_pan, &other.employer_pan),
            (&mut self.employer_tan, &other.employer_tan),
            (&mut self.assessment_year, &other.assessment_year),
            (&mut self.financial_year, &other.financial_year),
        ];
        for (mine, theirs) in pairs {
            if mine.is_none() {
                mine.clone_from(theirs);
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SalaryBlock {
    /// Salary u/s 17(1)
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub gross_salary_17_1: Option<Decimal>,
    /// Value of perquisites u/s 17(2)
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub perquisites_17_2: Option<Decimal>,
    /// Profits in lieu of salary u/s 17(3)
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub profits_in_lieu_17_3: Option<Decimal>,
    /// Allowances exempt u/s 10, by label (HRA, LTA, ...)
    #[serde(default)]
    #[schemars(with = "BTreeMap<String, f64>")]
    pub exempt_allowances_sec10: BTreeMap<String, Decimal>,
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub standard_deduction: Option<Decimal>,
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub professional_tax_16_iii: Option<Decimal>,
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub taxable_salary: Option<Decimal>,
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub tds_on_salary: Option<Decimal>,
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub relief_89_1: Option<Decimal>,
}

impl SalaryBlock {
    /// Whether the block carries a usable §17(1) figure
    pub fn has_gross(&self) -> bool {
        self.gross_salary_17_1.is_some_and(|g| !g.is_zero())
    }

    /// 17(1) + 17(2) + 17(3) exactly as extracted
    pub fn gross(&self) -> Decimal {
        [
            self.gross_salary_17_1,
            self.perquisites_17_2,
            self.profits_in_lieu_17_3,
        ]
        .iter()
        .flatten()
        .sum()
    }

    pub fn exempt_total(&self) -> Decimal {
        self.exempt_allowances_sec10.values().sum()
    }

    fn amounts(&self) -> Vec<(String, Decimal)> {
        let optional = [
            ("gross_salary_17_1", self.gross_salary_17_1),
            ("perquisites_17_2", self.perquisites_17_2),
            ("profits_in_lieu_17_3", self.profits_in_lieu_17_3),
            ("standard_deduction", self.standard_deduction),
            ("professional_tax_16_iii", self.professional_tax_16_iii),
            ("taxable_salary", self.taxable_salary),
            ("tds_on_salary", self.tds_on_salary),
            ("relief_89_1", self.relief_89_1),
        ];
        optional
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (format!("salary.{name}"), v)))
            .chain(
                self.exempt_allowances_sec10
                    .iter()
                    .map(|(label, v)| (format!("salary.exempt_allowances_sec10.{label}"), *v)),
            )
            .collect()
    }
}

/// Income from other sources; every bucket adds across documents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OtherIncome {
    #[serde(default)]
    #[schemars(with = "f64")]
    pub savings_interest: Decimal,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub fd_interest: Decimal,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub dividend: Decimal,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub others: Decimal,
}

impl OtherIncome {
    pub fn total(&self) -> Decimal {
        self.savings_interest + self.fd_interest + self.dividend + self.others
    }

    pub fn add(&mut self, other: &OtherIncome) {
        self.savings_interest += other.savings_interest;
        self.fd_interest += other.fd_interest;
        self.dividend += other.dividend;
        self.others += other.others;
    }
}

/// Chapter VI-A deductions. `total` is always recomputed from the sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChapterVia {
    #[serde(default)]
    #[schemars(with = "f64")]
    pub sec_80c: Decimal,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub sec_80ccd_1b: Decimal,
    /// Employer contribution to NPS
    #[serde(default)]
    #[schemars(with = "f64")]
    pub sec_80ccd_2: Decimal,
    /// Agnipath scheme contribution
    #[serde(default)]
    #[schemars(with = "f64")]
    pub sec_80cch: Decimal,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub sec_80d: Decimal,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub sec_80e: Decimal,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub sec_80g: Decimal,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub sec_80tta: Decimal,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub sec_80ttb: Decimal,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub total: Decimal,
}

impl ChapterVia {
    /// Section amounts with their statutory labels
    pub fn sections(&self) -> [(&'static str, Decimal); 9] {
        [
            ("80C", self.sec_80c),
            ("80CCD(1B)", self.sec_80ccd_1b),
            ("80CCD(2)", self.sec_80ccd_2),
            ("80CCH", self.sec_80cch),
            ("80D", self.sec_80d),
            ("80E", self.sec_80e),
            ("80G", self.sec_80g),
            ("80TTA", self.sec_80tta),
            ("80TTB", self.sec_80ttb),
        ]
    }

    fn sections_mut(&mut self) -> [&mut Decimal; 9] {
        [
            &mut self.sec_80c,
            &mut self.sec_80ccd_1b,
            &mut self.sec_80ccd_2,
            &mut self.sec_80cch,
            &mut self.sec_80d,
            &mut self.sec_80e,
            &mut self.sec_80g,
            &mut self.sec_80tta,
            &mut self.sec_80ttb,
        ]
    }

    pub fn sections_total(&self) -> Decimal {
        self.sections().iter().map(|(_, amount)| *amount).sum()
    }

    pub fn recompute_total(&mut self) {
        self.total = self.sections_total();
    }

    /// Section-wise maximum of the two, with a fresh total
    pub fn max_merge(&self, other: &ChapterVia) -> ChapterVia {
        let mut merged = self.clone();
        let theirs = other.sections();
        for (mine, (_, their_amount)) in merged.sections_mut().into_iter().zip(theirs) {
            *mine = (*mine).max(their_amount);
        }
        merged.recompute_total();
        merged
    }
}

/// Taxes already paid or deducted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Credits {
    /// TDS on salary u/s 192
    #[serde(default)]
    #[schemars(with = "f64")]
    pub tds_salary_192: Decimal,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub tds_other: Decimal,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub tcs_total: Decimal,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub adv_tax: Decimal,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub self_assessment_tax: Decimal,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub refund_issued: Decimal,
}

impl Credits {
    /// Credits that settle against the computed liability
    pub fn total(&self) -> Decimal {
        self.tds_salary_192 + self.tds_other + self.adv_tax + self.self_assessment_tax
    }
}

/// One taxpayer's financial facts for one financial year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StructuredTaxProfile {
    pub identity: Identity,
    pub salary: SalaryBlock,
    pub other_income: OtherIncome,
    pub deductions: ChapterVia,
    pub credits: Credits,
    /// Content digests of every source document folded into this profile
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub merged_sources: BTreeSet<String>,
}

#[derive(Serialize)]
struct ProfileContent<'a> {
    identity: &'a Identity,
    salary: &'a SalaryBlock,
    other_income: &'a OtherIncome,
    deductions: &'a ChapterVia,
    credits: &'a Credits,
}

impl StructuredTaxProfile {
    /// Parse a profile, recompute the deduction total and validate amounts
    pub fn from_json<R: Read>(reader: R) -> Result<Self, TaxError> {
        let mut profile: StructuredTaxProfile = serde_json::from_reader(reader)
            .map_err(|e| TaxError::MalformedProfile(e.to_string()))?;
        profile.deductions.recompute_total();
        profile.check()?;
        Ok(profile)
    }

    /// SHA-256 over the profile's facts (provenance excluded)
    pub fn content_digest(&self) -> String {
        let content = ProfileContent {
            identity: &self.identity,
            salary: &self.salary,
            other_income: &self.other_income,
            deductions: &self.deductions,
            credits: &self.credits,
        };
        // string map keys and decimal amounts only, which JSON always encodes
        let bytes = serde_json::to_vec(&content).expect("profile content serializes to JSON");
        hex::encode(Sha256::digest(&bytes))
    }

    /// Digests of the source documents this profile represents
    pub fn provenance(&self) -> BTreeSet<String> {
        if self.merged_sources.is_empty() {
            BTreeSet::from([self.content_digest()])
        } else {
            self.merged_sources.clone()
        }
    }

    fn amounts(&self) -> Vec<(String, Decimal)> {
        let mut amounts = self.salary.amounts();
        let o = &self.other_income;
        let c = &self.credits;
        amounts.extend([
            ("other_income.savings_interest".to_string(), o.savings_interest),
            ("other_income.fd_interest".to_string(), o.fd_interest),
            ("other_income.dividend".to_string(), o.dividend),
            ("other_income.others".to_string(), o.others),
            ("credits.tds_salary_192".to_string(), c.tds_salary_192),
            ("credits.tds_other".to_string(), c.tds_other),
            ("credits.tcs_total".to_string(), c.tcs_total),
            ("credits.adv_tax".to_string(), c.adv_tax),
            ("credits.self_assessment_tax".to_string(), c.self_assessment_tax),
            ("credits.refund_issued".to_string(), c.refund_issued),
        ]);
        amounts.extend(
            self.deductions
                .sections()
                .iter()
                .map(|(label, amount)| (format!("deductions.{label}"), *amount)),
        );
        amounts
    }

    fn check(&self) -> Result<(), TaxError> {
        if let Some((field, amount)) = self
            .amounts()
            .into_iter()
            .find(|(_, amount)| amount.is_sign_negative() && !amount.is_zero())
        {
            return Err(TaxError::MalformedProfile(format!(
                "{field} is negative ({amount})"
            )));
        }
        let has_components = self.salary.perquisites_17_2.is_some()
            || self.salary.profits_in_lieu_17_3.is_some();
        if has_components && self.salary.gross_salary_17_1.is_none() {
            return Err(TaxError::MalformedProfile(
                "salary block has perquisites or profits in lieu but no salary u/s 17(1)"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

impl TaxBase for StructuredTaxProfile {
    fn validate(&self) -> Result<(), TaxError> {
        self.check()?;
        if self.deductions.total != self.deductions.sections_total() {
            return Err(TaxError::MalformedProfile(format!(
                "deductions.total {} does not match the section sum {}",
                self.deductions.total,
                self.deductions.sections_total()
            )));
        }
        Ok(())
    }

    fn regime_base(&self, regime: Regime, rules: &TaxRuleTable) -> RegimeBase {
        let salary_rules = &rules.salary_deductions;
        let standard = capped(
            self.salary.standard_deduction.unwrap_or(Decimal::ZERO),
            *salary_rules.standard_deduction.get(regime),
        );

        let mut salary_deductions = BTreeMap::new();
        let mut deductions = BTreeMap::new();
        match regime {
            Regime::Old => {
                insert_nonzero(
                    &mut salary_deductions,
                    EXEMPT_ALLOWANCES,
                    self.salary.exempt_total(),
                );
                insert_nonzero(&mut salary_deductions, STANDARD_DEDUCTION, standard);
                insert_nonzero(
                    &mut salary_deductions,
                    PROFESSIONAL_TAX,
                    capped(
                        self.salary.professional_tax_16_iii.unwrap_or(Decimal::ZERO),
                        Some(salary_rules.professional_tax_cap),
                    ),
                );
                for (label, amount) in self.deductions.sections() {
                    insert_nonzero(&mut deductions, label, amount);
                }
            }
            Regime::New => {
                insert_nonzero(&mut salary_deductions, STANDARD_DEDUCTION, standard);
                for (label, amount) in self.deductions.sections() {
                    if rules.new_regime_deductions.iter().any(|allowed| allowed == label) {
                        insert_nonzero(&mut deductions, label, amount);
                    }
                }
            }
        }

        RegimeBase {
            salary: self.salary.gross(),
            salary_deductions,
            other_income: self.other_income.total(),
            deductions,
        }
    }

    fn income_heads(&self) -> IncomeHeads {
        IncomeHeads {
            salary: self.salary.gross(),
            other: self.other_income.total(),
            ..IncomeHeads::default()
        }
    }

    fn gross_total_income(&self) -> Decimal {
        self.salary.gross() + self.other_income.total()
    }

    fn total_credits(&self) -> Decimal {
        self.credits.total()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    pub(crate) fn profile(doc_type: &str) -> StructuredTaxProfile {
        StructuredTaxProfile {
            identity: Identity {
                doc_type: Some(doc_type.to_string()),
                ..Identity::default()
            },
            salary: SalaryBlock::default(),
            other_income: OtherIncome::default(),
            deductions: ChapterVia::default(),
            credits: Credits::default(),
            merged_sources: BTreeSet::new(),
        }
    }

    pub(crate) fn form16(gross: Decimal, standard: Decimal) -> StructuredTaxProfile {
        let mut p = profile("Form 16");
        p.salary.gross_salary_17_1 = Some(gross);
        p.salary.standard_deduction = Some(standard);
        p
    }

    #[test]
    fn document_kind_classification() {
        assert_eq!(DocumentKind::classify("Form 16"), DocumentKind::Form16);
        assert_eq!(DocumentKind::classify(" form  16 "), DocumentKind::Form16);
        assert_eq!(DocumentKind::classify("FORM-26AS"), DocumentKind::Form26As);
        assert_eq!(DocumentKind::classify("ais"), DocumentKind::Ais);
        assert_eq!(
            DocumentKind::classify("Annual Information Statement"),
            DocumentKind::Ais
        );
        assert_eq!(DocumentKind::classify("Form 16A"), DocumentKind::Other);
        assert_eq!(profile("unknown").identity.kind(), DocumentKind::Other);
    }

    #[test]
    fn gross_is_sum_of_components() {
        let mut salary = SalaryBlock {
            gross_salary_17_1: Some(dec!(900000)),
            perquisites_17_2: Some(dec!(25000)),
            ..SalaryBlock::default()
        };
        assert_eq!(salary.gross(), dec!(925000));
        salary.profits_in_lieu_17_3 = Some(dec!(5000));
        assert_eq!(salary.gross(), dec!(930000));
    }

    #[test]
    fn from_json_recomputes_total() {
        let json = r#"{
            "identity": {"doc_type": "Form 16"},
            "salary": {"gross_salary_17_1": 800000},
            "other_income": {},
            "deductions": {"sec_80c": 150000, "sec_80d": 25000, "total": 999},
            "credits": {"tds_salary_192": 10000}
        }"#;
        let profile = StructuredTaxProfile::from_json(json.as_bytes()).unwrap();
        assert_eq!(profile.deductions.total, dec!(175000));
        assert_eq!(profile.credits.total(), dec!(10000));
    }

    #[test]
    fn non_numeric_amount_is_malformed() {
        let json = r#"{
            "identity": {},
            "salary": {"gross_salary_17_1": "lots"},
            "other_income": {},
            "deductions": {},
            "credits": {}
        }"#;
        let err = StructuredTaxProfile::from_json(json.as_bytes()).unwrap_err();
        assert!(matches!(err, TaxError::MalformedProfile(_)), "{err:?}");
    }

    #[test]
    fn missing_block_is_malformed() {
        let json = r#"{"identity": {}, "salary": {}, "other_income": {}, "deductions": {}}"#;
        let err = StructuredTaxProfile::from_json(json.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("credits"), "{err}");
    }

    #[test]
    fn negative_amount_is_malformed() {
        let mut p = form16(dec!(500000), dec!(50000));
        p.other_income.fd_interest = dec!(-10);
        assert_eq!(
            p.validate(),
            Err(TaxError::MalformedProfile(
                "other_income.fd_interest is negative (-10)".to_string()
            ))
        );
    }

    #[test]
    fn perquisites_without_gross_is_malformed() {
        let mut p = profile("Form 16");
        p.salary.perquisites_17_2 = Some(dec!(1000));
        assert!(matches!(p.validate(), Err(TaxError::MalformedProfile(_))));
    }

    #[test]
    fn stale_total_fails_validation() {
        let mut p = form16(dec!(500000), dec!(50000));
        p.deductions.sec_80c = dec!(1000);
        assert!(p.validate().is_err());
        p.deductions.recompute_total();
        assert!(p.validate().is_ok());
    }

    #[test]
    fn digest_ignores_provenance() {
        let mut p = form16(dec!(500000), dec!(50000));
        let digest = p.content_digest();
        assert_eq!(digest.len(), 64);
        p.merged_sources.insert("abc".to_string());
        assert_eq!(p.content_digest(), digest);
        assert_eq!(p.provenance(), BTreeSet::from(["abc".to_string()]));
    }

    #[test]
    fn identity_fill_keeps_doc_type() {
        let mut primary = profile("Form 16").identity;
        let secondary = Identity {
            employee_pan: Some("ABCDE1234F".to_string()),
            doc_type: Some("AIS".to_string()),
            ..Identity::default()
        };
        primary.fill_missing(&secondary);
        assert_eq!(primary.employee_pan.as_deref(), Some("ABCDE1234F"));
        assert_eq!(primary.doc_type.as_deref(), Some("Form 16"));
    }
}
