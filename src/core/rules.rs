//! Per-financial-year rule tables: slabs, rebate, surcharge, marginal relief and cess.

use super::error::TaxError;
use super::fy::{AgeBand, FinancialYear};
use super::regime::Regime;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

const BUILTIN_TABLES: &[(&str, &str)] = &[
    ("2023-24", include_str!("../../rules/2023-24.json")),
    ("2024-25", include_str!("../../rules/2024-25.json")),
];

/// Rule table for one financial year. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TaxRuleTable {
    #[schemars(with = "String")]
    pub financial_year: FinancialYear,
    pub assessment_year: String,
    /// Health and education cess, percent of tax plus surcharge
    #[schemars(with = "f64")]
    pub cess_percent: Decimal,
    pub slabs: SlabTables,
    pub rebate_87a: PerRegime<RebateRule>,
    pub surcharge: PerRegime<Vec<SurchargeThreshold>>,
    #[serde(default)]
    pub marginal_relief: MarginalRelief,
    #[serde(default)]
    pub salary_deductions: SalaryDeductionRules,
    /// Deduction sections still available under the new regime
    #[serde(default = "default_new_regime_deductions")]
    pub new_regime_deductions: Vec<String>,
    /// Highest gross income (inclusive) for which ITR-1 may be used
    #[serde(default = "default_itr1_ceiling")]
    #[schemars(with = "f64")]
    pub itr1_income_ceiling: Decimal,
}

fn default_new_regime_deductions() -> Vec<String> {
    vec!["80CCD(2)".to_string(), "80CCH".to_string()]
}

fn default_itr1_ceiling() -> Decimal {
    dec!(5000000)
}

/// A value that differs between the two regimes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PerRegime<T> {
    pub old_regime: T,
    pub new_regime: T,
}

impl<T> PerRegime<T> {
    pub fn get(&self, regime: Regime) -> &T {
        match regime {
            Regime::Old => &self.old_regime,
            Regime::New => &self.new_regime,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SlabTables {
    pub old_regime: AgeBandedSlabs,
    /// Same slabs for every age under the new regime
    pub new_regime: Vec<Slab>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AgeBandedSlabs {
    pub below_60: Vec<Slab>,
    pub age_60_to_79: Vec<Slab>,
    pub age_80_and_above: Vec<Slab>,
}

/// One income band of a slab ladder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSlab", into = "RawSlab")]
pub struct Slab {
    /// Exclusive lower bound of the band
    pub over: Decimal,
    /// Inclusive upper bound, `None` for the top band
    pub up_to: Option<Decimal>,
    pub rate: SlabRate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlabRate {
    /// Marginal rate applied to the portion of income inside the band
    Percent(Decimal),
    /// Closed form `base + percent% of amount over threshold`
    Formula(Formula),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    pub base: Decimal,
    pub percent: Decimal,
    pub threshold: Decimal,
    source: String,
}

static FORMULA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*([\d,]+(?:\.\d+)?)\s*\+\s*(\d+(?:\.\d+)?)\s*%\s*of\s+(?:the\s+)?amount\s+over\s+([\d,]+(?:\.\d+)?)\s*$")
        .expect("formula pattern is valid")
});

impl Formula {
    pub fn parse(text: &str) -> Option<Formula> {
        let caps = FORMULA_RE.captures(text)?;
        let number = |i: usize| -> Option<Decimal> {
            caps.get(i)?.as_str().replace(',', "").parse().ok()
        };
        Some(Formula {
            base: number(1)?,
            percent: number(2)?,
            threshold: number(3)?,
            source: text.trim().to_string(),
        })
    }

    pub fn evaluate(&self, income: Decimal) -> Decimal {
        let excess = (income - self.threshold).max(Decimal::ZERO);
        self.base + excess * self.percent / Decimal::ONE_HUNDRED
    }
}

/// Wire form of a slab, mirroring the published tables:
/// `{"upto": X}`, `{"over": L, "up_to": U}` or `{"over": L}` with either
/// `rate_percent` or `formula`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
struct RawSlab {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<f64>")]
    upto: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<f64>")]
    over: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<f64>")]
    up_to: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<f64>")]
    rate_percent: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    formula: Option<String>,
}

impl TryFrom<RawSlab> for Slab {
    type Error = String;

    fn try_from(raw: RawSlab) -> Result<Self, Self::Error> {
        let over = raw.over.unwrap_or(Decimal::ZERO);
        let up_to = raw.up_to.or(raw.upto);
        if let Some(upper) = up_to {
            if upper <= over {
                return Err(format!("slab upper bound {upper} is not above {over}"));
            }
        }
        let rate = match (raw.formula, raw.rate_percent) {
            (Some(text), _) => SlabRate::Formula(
                Formula::parse(&text).ok_or_else(|| format!("unrecognised slab formula '{text}'"))?,
            ),
            (None, Some(rate)) => SlabRate::Percent(rate),
            (None, None) => return Err("slab needs rate_percent or formula".to_string()),
        };
        Ok(Slab { over, up_to, rate })
    }
}

impl From<Slab> for RawSlab {
    fn from(slab: Slab) -> Self {
        let (rate_percent, formula) = match slab.rate {
            SlabRate::Percent(rate) => (Some(rate), None),
            SlabRate::Formula(f) => (None, Some(f.source)),
        };
        if slab.over.is_zero() {
            RawSlab {
                upto: slab.up_to,
                rate_percent,
                formula,
                ..RawSlab::default()
            }
        } else {
            RawSlab {
                over: Some(slab.over),
                up_to: slab.up_to,
                rate_percent,
                formula,
                ..RawSlab::default()
            }
        }
    }
}

impl JsonSchema for Slab {
    fn schema_name() -> String {
        "Slab".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        RawSlab::json_schema(gen)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RebateRule {
    /// Rebate applies while taxable income is at or below this amount
    #[schemars(with = "f64")]
    pub max_total_income: Decimal,
    #[schemars(with = "f64")]
    pub rebate_cap: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SurchargeThreshold {
    /// Rate applies to income strictly greater than this
    #[schemars(with = "f64")]
    pub min_exclusive: Decimal,
    #[schemars(with = "f64")]
    pub rate_percent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReliefBand {
    #[schemars(with = "f64")]
    pub over: Decimal,
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub up_to: Option<Decimal>,
}

impl ReliefBand {
    pub fn contains(&self, income: Decimal) -> bool {
        income > self.over && self.up_to.map_or(true, |upper| income <= upper)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MarginalRelief {
    #[serde(default = "default_true")]
    pub applicable: bool,
    #[serde(default)]
    pub old_regime: Vec<ReliefBand>,
    #[serde(default)]
    pub new_regime: Vec<ReliefBand>,
}

impl Default for MarginalRelief {
    fn default() -> Self {
        MarginalRelief {
            applicable: true,
            old_regime: Vec::new(),
            new_regime: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SalaryDeductionRules {
    /// Cap on the standard deduction; `None` means not allowed in that regime
    #[schemars(with = "PerRegime<Option<f64>>")]
    pub standard_deduction: PerRegime<Option<Decimal>>,
    /// Cap on professional tax u/s 16(iii) (old regime only)
    #[schemars(with = "f64")]
    pub professional_tax_cap: Decimal,
}

impl Default for SalaryDeductionRules {
    fn default() -> Self {
        SalaryDeductionRules {
            standard_deduction: PerRegime {
                old_regime: Some(dec!(50000)),
                new_regime: None,
            },
            professional_tax_cap: dec!(2500),
        }
    }
}

impl TaxRuleTable {
    /// Parse and validate a table. Errors name the table's `financial_year`
    /// when the document carries one.
    pub fn from_json<R: Read>(reader: R) -> Result<Self, TaxError> {
        let invalid = |financial_year: &str, e: serde_json::Error| TaxError::InvalidRuleTable {
            financial_year: financial_year.to_string(),
            reason: e.to_string(),
        };
        let value: serde_json::Value =
            serde_json::from_reader(reader).map_err(|e| invalid("unknown", e))?;
        let label = value
            .get("financial_year")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let table: TaxRuleTable = serde_json::from_value(value).map_err(|e| invalid(&label, e))?;
        table.validate()?;
        Ok(table)
    }

    /// Slab ladder for a regime and age band
    pub fn slabs_for(&self, regime: Regime, band: AgeBand) -> &[Slab] {
        match regime {
            Regime::New => &self.slabs.new_regime,
            Regime::Old => match band {
                AgeBand::Below60 => &self.slabs.old_regime.below_60,
                AgeBand::Age60To79 => &self.slabs.old_regime.age_60_to_79,
                AgeBand::Age80AndAbove => &self.slabs.old_regime.age_80_and_above,
            },
        }
    }

    /// Surcharge rate for an income: the highest threshold strictly below it.
    pub fn surcharge_rate(&self, regime: Regime, income: Decimal) -> Decimal {
        self.surcharge
            .get(regime)
            .iter()
            .filter(|t| income > t.min_exclusive)
            .max_by_key(|t| t.min_exclusive)
            .map_or(Decimal::ZERO, |t| t.rate_percent)
    }

    /// Marginal relief bands, derived from the surcharge ladder when none are configured.
    pub fn relief_bands(&self, regime: Regime) -> Vec<ReliefBand> {
        let configured = self.marginal_relief.get(regime);
        if !configured.is_empty() {
            return configured.clone();
        }
        let mut thresholds: Vec<Decimal> = self
            .surcharge
            .get(regime)
            .iter()
            .map(|t| t.min_exclusive)
            .collect();
        thresholds.sort();
        thresholds
            .iter()
            .enumerate()
            .map(|(i, &over)| ReliefBand {
                over,
                up_to: thresholds.get(i + 1).copied(),
            })
            .collect()
    }

    fn validate(&self) -> Result<(), TaxError> {
        let invalid = |reason: String| TaxError::InvalidRuleTable {
            financial_year: self.financial_year.display(),
            reason,
        };
        let sets = [
            ("old_regime.below_60", &self.slabs.old_regime.below_60),
            ("old_regime.age_60_to_79", &self.slabs.old_regime.age_60_to_79),
            ("old_regime.age_80_and_above", &self.slabs.old_regime.age_80_and_above),
            ("new_regime", &self.slabs.new_regime),
        ];
        for (name, slabs) in sets {
            if slabs.is_empty() {
                return Err(invalid(format!("slab set {name} is empty")));
            }
            if slabs.windows(2).any(|pair| pair[1].over < pair[0].over) {
                return Err(invalid(format!("slab set {name} is not in ascending order")));
            }
        }
        if self.cess_percent.is_sign_negative() {
            return Err(invalid("cess_percent is negative".to_string()));
        }
        Ok(())
    }
}

impl MarginalRelief {
    pub fn get(&self, regime: Regime) -> &Vec<ReliefBand> {
        match regime {
            Regime::Old => &self.old_regime,
            Regime::New => &self.new_regime,
        }
    }
}

/// Rule tables keyed by financial year
#[derive(Debug, Clone, Default)]
pub struct RuleBook {
    tables: BTreeMap<FinancialYear, TaxRuleTable>,
}

impl RuleBook {
    /// Tables shipped with the crate
    pub fn builtin() -> Result<Self, TaxError> {
        let mut book = RuleBook::default();
        for (year, json) in BUILTIN_TABLES {
            let table = TaxRuleTable::from_json(json.as_bytes()).map_err(|e| match e {
                TaxError::InvalidRuleTable { reason, .. } => TaxError::InvalidRuleTable {
                    financial_year: year.to_string(),
                    reason,
                },
                other => other,
            })?;
            book.insert(table);
        }
        Ok(book)
    }

    /// Load every `*.json` file in `dir`, replacing tables for the same year.
    pub fn load_dir(&mut self, dir: &Path) -> anyhow::Result<usize> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();
        for path in &paths {
            let table = TaxRuleTable::from_json(BufReader::new(File::open(path)?))
                .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?;
            log::info!("loaded tax rules for FY {} from {}", table.financial_year, path.display());
            self.insert(table);
        }
        Ok(paths.len())
    }

    pub fn insert(&mut self, table: TaxRuleTable) {
        self.tables.insert(table.financial_year, table);
    }

    pub fn get(&self, fy: FinancialYear) -> Result<&TaxRuleTable, TaxError> {
        self.tables
            .get(&fy)
            .ok_or_else(|| TaxError::RuleTableNotFound(fy.display()))
    }

    pub fn years(&self) -> impl Iterator<Item = FinancialYear> + '_ {
        self.tables.keys().copied()
    }

    pub fn tables(&self) -> impl Iterator<Item = &TaxRuleTable> {
        self.tables.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(fy: &str) -> TaxRuleTable {
        let book = RuleBook::builtin().unwrap();
        book.get(fy.parse().unwrap()).unwrap().clone()
    }

    #[test]
    fn builtin_tables_load() {
        let book = RuleBook::builtin().unwrap();
        let years: Vec<_> = book.years().map(|y| y.display()).collect();
        assert_eq!(years, vec!["2023-24", "2024-25"]);
        assert_eq!(table("2024-25").assessment_year, "2025-26");
    }

    #[test]
    fn missing_year_is_an_error() {
        let book = RuleBook::builtin().unwrap();
        let err = book.get(FinancialYear(2019)).unwrap_err();
        assert_eq!(err, TaxError::RuleTableNotFound("2019-20".to_string()));
        assert_eq!(
            err.to_string(),
            "tax rules for FY 2019-20 not found - please seed/upload them"
        );
    }

    #[test]
    fn formula_parses() {
        let f = Formula::parse("20000 + 10% of amount over 700000").unwrap();
        assert_eq!(f.base, dec!(20000));
        assert_eq!(f.percent, dec!(10));
        assert_eq!(f.threshold, dec!(700000));
        assert_eq!(f.evaluate(dec!(900000)), dec!(40000));

        let f = Formula::parse("1,40,000 + 30 % of the amount over 15,00,000").unwrap();
        assert_eq!(f.base, dec!(140000));
        assert_eq!(f.threshold, dec!(1500000));

        assert!(Formula::parse("ten percent").is_none());
    }

    #[test]
    fn slab_wire_forms() {
        let first: Slab = serde_json::from_str(r#"{"upto": 250000, "rate_percent": 0}"#).unwrap();
        assert_eq!(first.over, Decimal::ZERO);
        assert_eq!(first.up_to, Some(dec!(250000)));

        let top: Slab = serde_json::from_str(
            r#"{"over": 1500000, "formula": "140000 + 30% of amount over 1500000"}"#,
        )
        .unwrap();
        assert_eq!(top.up_to, None);
        assert!(matches!(top.rate, SlabRate::Formula(_)));

        let err = serde_json::from_str::<Slab>(r#"{"over": 10}"#).unwrap_err();
        assert!(err.to_string().contains("rate_percent or formula"));

        let err = serde_json::from_str::<Slab>(r#"{"over": 10, "up_to": 5, "rate_percent": 5}"#)
            .unwrap_err();
        assert!(err.to_string().contains("not above"));
    }

    #[test]
    fn slab_serialises_back_to_wire_form() {
        let slab: Slab = serde_json::from_str(
            r#"{"over": 700000, "up_to": 1000000, "formula": "20000 + 10% of amount over 700000"}"#,
        )
        .unwrap();
        let json = serde_json::to_value(&slab).unwrap();
        assert_eq!(json["formula"], "20000 + 10% of amount over 700000");
        assert!(json.get("rate_percent").is_none());
    }

    #[test]
    fn surcharge_rate_is_strictly_greater_than() {
        let t = table("2024-25");
        assert_eq!(t.surcharge_rate(Regime::Old, dec!(5000000)), Decimal::ZERO);
        assert_eq!(t.surcharge_rate(Regime::Old, dec!(5000001)), dec!(10));
        assert_eq!(t.surcharge_rate(Regime::Old, dec!(10000001)), dec!(15));
        assert_eq!(t.surcharge_rate(Regime::Old, dec!(60000000)), dec!(37));
        assert_eq!(t.surcharge_rate(Regime::New, dec!(60000000)), dec!(25));
    }

    #[test]
    fn relief_bands_derived_from_thresholds() {
        // FY 2023-24 table carries no explicit bands
        let t = table("2023-24");
        let bands = t.relief_bands(Regime::New);
        assert_eq!(
            bands,
            vec![
                ReliefBand {
                    over: dec!(5000000),
                    up_to: Some(dec!(10000000)),
                },
                ReliefBand {
                    over: dec!(10000000),
                    up_to: Some(dec!(20000000)),
                },
                ReliefBand {
                    over: dec!(20000000),
                    up_to: None,
                },
            ]
        );
        assert!(bands[0].contains(dec!(10000000)));
        assert!(!bands[0].contains(dec!(5000000)));
    }

    #[test]
    fn load_dir_overrides_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let mut custom = table("2024-25");
        custom.cess_percent = dec!(5);
        std::fs::write(
            dir.path().join("custom.json"),
            serde_json::to_string(&custom).unwrap(),
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut book = RuleBook::builtin().unwrap();
        assert_eq!(book.load_dir(dir.path()).unwrap(), 1);
        assert_eq!(book.get(FinancialYear(2024)).unwrap().cess_percent, dec!(5));
    }

    #[test]
    fn unordered_slabs_rejected() {
        let mut json = serde_json::to_value(table("2024-25")).unwrap();
        json["slabs"]["new_regime"] = serde_json::json!([
            {"over": 300000, "rate_percent": 5},
            {"upto": 300000, "rate_percent": 0}
        ]);
        let err = TaxRuleTable::from_json(json.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, TaxError::InvalidRuleTable { .. }));
    }

    #[test]
    fn parse_errors_name_the_year() {
        let mut json = serde_json::to_value(table("2024-25")).unwrap();
        json["cess_percent"] = serde_json::json!("four");
        let err = TaxRuleTable::from_json(json.to_string().as_bytes()).unwrap_err();
        match err {
            TaxError::InvalidRuleTable { financial_year, .. } => {
                assert_eq!(financial_year, "2024-25")
            }
            other => panic!("unexpected error {other:?}"),
        }

        let err = TaxRuleTable::from_json("{not json".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("unknown"), "{err}");
    }
}
