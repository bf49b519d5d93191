use super::base::RegimeBase;
use super::error::TaxError;
use super::fy::Taxpayer;
use super::money::{percent_of, report};
use super::rules::{Slab, SlabRate, TaxRuleTable};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Statutory computation method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    Old,
    New,
}

impl Regime {
    pub const ALL: [Regime; 2] = [Regime::Old, Regime::New];

    pub fn label(&self) -> &'static str {
        match self {
            Regime::Old => "Old Regime",
            Regime::New => "New Regime",
        }
    }
}

impl FromStr for Regime {
    type Err = TaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "old" => Ok(Regime::Old),
            "new" => Ok(Regime::New),
            other => Err(TaxError::InvalidRegime(other.to_string())),
        }
    }
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Regime::Old => write!(f, "old"),
            Regime::New => write!(f, "new"),
        }
    }
}

/// Full tax breakdown for one regime
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimeResult {
    pub regime: Regime,
    pub deductions: BTreeMap<String, Decimal>,
    pub total_deductions: Decimal,
    pub taxable_income: Decimal,
    pub tax_before_rebate: Decimal,
    pub rebate: Decimal,
    pub tax_after_rebate: Decimal,
    /// Percent applied to the tax after rebate
    pub surcharge_rate: Decimal,
    /// Surcharge waived so crossing a threshold never costs more than the excess income
    pub marginal_relief: Decimal,
    /// Surcharge after marginal relief
    pub surcharge: Decimal,
    pub cess: Decimal,
    pub total_tax: Decimal,
}

impl RegimeResult {
    /// Copy with every amount rounded for reporting
    pub fn rounded(&self) -> RegimeResult {
        RegimeResult {
            regime: self.regime,
            deductions: self
                .deductions
                .iter()
                .map(|(label, amount)| (label.clone(), report(*amount)))
                .collect(),
            total_deductions: report(self.total_deductions),
            taxable_income: report(self.taxable_income),
            tax_before_rebate: report(self.tax_before_rebate),
            rebate: report(self.rebate),
            tax_after_rebate: report(self.tax_after_rebate),
            surcharge_rate: self.surcharge_rate,
            marginal_relief: report(self.marginal_relief),
            surcharge: report(self.surcharge),
            cess: report(self.cess),
            total_tax: report(self.total_tax),
        }
    }
}

/// Tax on `income` under a slab ladder.
///
/// Rate bands add `portion inside band * rate`. A formula band replaces the
/// running total with its closed form evaluated at the income capped to the
/// band's upper bound. The last band is open-ended whatever its upper bound.
pub fn slab_tax(income: Decimal, slabs: &[Slab]) -> Decimal {
    let mut tax = Decimal::ZERO;
    for (i, slab) in slabs.iter().enumerate() {
        if income <= slab.over {
            break;
        }
        let is_last = i + 1 == slabs.len();
        let reached = match slab.up_to {
            Some(upper) if !is_last => income.min(upper),
            _ => income,
        };
        match &slab.rate {
            SlabRate::Percent(rate) => {
                let portion = reached - slab.over;
                let contribution = percent_of(portion, *rate);
                log::debug!(
                    "slab over {}: {} @ {}% = {}",
                    slab.over,
                    portion,
                    rate,
                    contribution
                );
                tax += contribution;
            }
            SlabRate::Formula(formula) => {
                tax = formula.evaluate(reached);
                log::debug!("slab over {}: formula at {} = {}", slab.over, reached, tax);
            }
        }
    }
    tax
}

/// Tax after the §87A rebate, without surcharge or cess
struct SlabOutcome {
    before_rebate: Decimal,
    rebate: Decimal,
}

impl SlabOutcome {
    fn after_rebate(&self) -> Decimal {
        self.before_rebate - self.rebate
    }
}

fn slab_outcome(
    income: Decimal,
    taxpayer: &Taxpayer,
    rules: &TaxRuleTable,
    regime: Regime,
) -> SlabOutcome {
    let before_rebate = slab_tax(income, rules.slabs_for(regime, taxpayer.age_band()));
    let rule = rules.rebate_87a.get(regime);
    let rebate = if taxpayer.is_resident() && income <= rule.max_total_income {
        before_rebate.min(rule.rebate_cap)
    } else {
        Decimal::ZERO
    };
    SlabOutcome {
        before_rebate,
        rebate,
    }
}

/// Surcharge on `tax` at `income`, and the marginal relief granted against it.
fn surcharge_with_relief(
    income: Decimal,
    tax: Decimal,
    taxpayer: &Taxpayer,
    rules: &TaxRuleTable,
    regime: Regime,
) -> (Decimal, Decimal, Decimal) {
    let rate = rules.surcharge_rate(regime, income);
    let gross = percent_of(tax, rate);
    if rate.is_zero() || !rules.marginal_relief.applicable {
        return (rate, gross, Decimal::ZERO);
    }
    let Some(band) = rules
        .relief_bands(regime)
        .into_iter()
        .find(|band| band.contains(income))
    else {
        return (rate, gross, Decimal::ZERO);
    };

    let threshold = band.over;
    let tax_at_threshold = slab_outcome(threshold, taxpayer, rules, regime).after_rebate();
    let surcharge_at_threshold =
        percent_of(tax_at_threshold, rules.surcharge_rate(regime, threshold));
    // cess is levied on the capped figure, so the excess is scaled back by it
    let cess_factor = Decimal::ONE + rules.cess_percent / Decimal::ONE_HUNDRED;
    let ceiling = tax_at_threshold + surcharge_at_threshold + (income - threshold) / cess_factor;
    if tax + gross <= ceiling {
        return (rate, gross, Decimal::ZERO);
    }
    let surcharge = (ceiling - tax).max(Decimal::ZERO);
    log::debug!(
        "marginal relief over {}: tax + surcharge capped at {}, surcharge {} -> {}",
        threshold,
        ceiling,
        gross,
        surcharge
    );
    (rate, surcharge, gross - surcharge)
}

/// Compute one regime's tax on an already resolved base
pub fn compute_regime(
    base: &RegimeBase,
    taxpayer: &Taxpayer,
    rules: &TaxRuleTable,
    regime: Regime,
) -> RegimeResult {
    let taxable_income = base.taxable_income();
    let slabs = slab_outcome(taxable_income, taxpayer, rules, regime);
    let tax_after_rebate = slabs.after_rebate();
    let (surcharge_rate, surcharge, marginal_relief) =
        surcharge_with_relief(taxable_income, tax_after_rebate, taxpayer, rules, regime);
    let cess = percent_of(tax_after_rebate + surcharge, rules.cess_percent);
    let total_tax = tax_after_rebate + surcharge + cess;

    log::debug!(
        "{}: taxable {} tax {} rebate {} surcharge {} cess {} total {}",
        regime,
        taxable_income,
        slabs.before_rebate,
        slabs.rebate,
        surcharge,
        cess,
        total_tax
    );

    RegimeResult {
        regime,
        deductions: base.deductions_used(),
        total_deductions: base.total_deductions(),
        taxable_income,
        tax_before_rebate: slabs.before_rebate,
        rebate: slabs.rebate,
        tax_after_rebate,
        surcharge_rate,
        marginal_relief,
        surcharge,
        cess,
        total_tax,
    }
}
