//! Dual-regime computation over a tax base and one year's rule table.

use super::base::{IncomeHeads, TaxBase};
use super::error::TaxError;
use super::fy::{FinancialYear, Taxpayer};
use super::itr::{self, ItrForm};
use super::money::report;
use super::regime::{compute_regime, Regime, RegimeResult};
use super::rules::{RuleBook, TaxRuleTable};
use super::select::{select, Settlement};
use anyhow::Context;
use rust_decimal::Decimal;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Where rule tables come from
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory of `*.json` rule tables; overrides built-ins for the same year
    pub rules_dir: Option<PathBuf>,
    /// Start from the tables shipped with the crate
    pub builtin_rules: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            rules_dir: None,
            builtin_rules: true,
        }
    }
}

/// Everything a caller needs to show both regimes and settle the year.
/// Amounts are rounded for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxComputationResult {
    pub financial_year: FinancialYear,
    pub assessment_year: String,
    pub taxpayer: Taxpayer,
    pub income_heads: IncomeHeads,
    pub gross_total_income: Decimal,
    pub old_regime: RegimeResult,
    pub new_regime: RegimeResult,
    pub recommended_regime: Regime,
    pub recommendation_reason: String,
    pub recommended_itr_form: ItrForm,
    pub tax_savings: Decimal,
    #[serde(flatten)]
    pub settlement: Settlement,
    /// SHA-256 of the tax base, taxpayer and rule table
    pub input_digest: String,
}

impl TaxComputationResult {
    pub fn regime(&self, regime: Regime) -> &RegimeResult {
        match regime {
            Regime::Old => &self.old_regime,
            Regime::New => &self.new_regime,
        }
    }

    pub fn recommended(&self) -> &RegimeResult {
        self.regime(self.recommended_regime)
    }
}

pub struct TaxEngine {
    rules: RuleBook,
}

impl TaxEngine {
    pub fn new(config: &EngineConfig) -> anyhow::Result<Self> {
        let mut rules = if config.builtin_rules {
            RuleBook::builtin()?
        } else {
            RuleBook::default()
        };
        if let Some(dir) = &config.rules_dir {
            let loaded = rules
                .load_dir(dir)
                .with_context(|| format!("loading tax rules from {}", dir.display()))?;
            log::info!("{} rule table(s) loaded from {}", loaded, dir.display());
        }
        Ok(TaxEngine { rules })
    }

    pub fn with_rules(rules: RuleBook) -> Self {
        TaxEngine { rules }
    }

    pub fn rules(&self) -> &RuleBook {
        &self.rules
    }

    /// Compute both regimes, recommend one and settle against credits.
    /// Either both regimes succeed or nothing is returned.
    pub fn compute<B: TaxBase>(
        &self,
        base: &B,
        taxpayer: &Taxpayer,
        fy: FinancialYear,
    ) -> Result<TaxComputationResult, TaxError> {
        let rules = self.rules.get(fy)?;
        base.validate()?;

        let [old, new] = Regime::ALL
            .map(|regime| compute_regime(&base.regime_base(regime, rules), taxpayer, rules, regime));
        let recommendation = select(&old, &new);
        let chosen = match recommendation.regime {
            Regime::Old => &old,
            Regime::New => &new,
        };
        let settlement = Settlement::new(chosen.total_tax, base.total_credits());
        let itr_form = itr::recommend(&base.itr_factors(), rules.itr1_income_ceiling);
        let heads = base.income_heads();

        Ok(TaxComputationResult {
            financial_year: fy,
            assessment_year: rules.assessment_year.clone(),
            taxpayer: *taxpayer,
            income_heads: IncomeHeads {
                salary: report(heads.salary),
                house_property: report(heads.house_property),
                capital_gains: report(heads.capital_gains),
                business: report(heads.business),
                other: report(heads.other),
            },
            gross_total_income: report(base.gross_total_income()),
            old_regime: old.rounded(),
            new_regime: new.rounded(),
            recommended_regime: recommendation.regime,
            recommendation_reason: recommendation.reason,
            recommended_itr_form: itr_form,
            tax_savings: report(recommendation.tax_savings),
            settlement: settlement.rounded(),
            input_digest: input_digest(base, taxpayer, rules)?,
        })
    }

    /// One regime by its tag, `"old"` or `"new"`
    pub fn compute_regime<B: TaxBase>(
        &self,
        base: &B,
        taxpayer: &Taxpayer,
        fy: FinancialYear,
        regime: &str,
    ) -> Result<RegimeResult, TaxError> {
        let regime: Regime = regime.parse()?;
        let rules = self.rules.get(fy)?;
        base.validate()?;
        let result = compute_regime(&base.regime_base(regime, rules), taxpayer, rules, regime);
        Ok(result.rounded())
    }
}

fn input_digest<B: TaxBase>(
    base: &B,
    taxpayer: &Taxpayer,
    rules: &TaxRuleTable,
) -> Result<String, TaxError> {
    let bytes = serde_json::to_vec(&(base, taxpayer, rules))
        .map_err(|e| TaxError::MalformedProfile(e.to_string()))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
