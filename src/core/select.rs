use super::money::{format_inr, report};
use super::regime::{Regime, RegimeResult};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub regime: Regime,
    pub reason: String,
    /// How much less the recommended regime costs
    pub tax_savings: Decimal,
}

/// Pick the regime with strictly lower total tax; a tie goes to the new
/// regime, the statutory default.
pub fn select(old: &RegimeResult, new: &RegimeResult) -> Recommendation {
    let (old_tax, new_tax) = (old.total_tax, new.total_tax);
    let totals = format!(
        "Tax under Old Regime: {}\nTax under New Regime: {}",
        format_inr(old_tax),
        format_inr(new_tax)
    );

    let recommendation = if old_tax < new_tax {
        let savings = new_tax - old_tax;
        Recommendation {
            regime: Regime::Old,
            reason: format!(
                "Old Regime is recommended as it results in lower tax liability.\n\n{totals}\nTax Savings: {}\n\n\
                 The deductions available under the old regime ({}) outweigh the lower rates of the new regime.",
                format_inr(savings),
                format_inr(old.total_deductions)
            ),
            tax_savings: savings,
        }
    } else if new_tax < old_tax {
        let savings = old_tax - new_tax;
        Recommendation {
            regime: Regime::New,
            reason: format!(
                "New Regime is recommended as it results in lower tax liability.\n\n{totals}\nTax Savings: {}\n\n\
                 Even without most deductions, the lower rates of the new regime cost less at this income.",
                format_inr(savings)
            ),
            tax_savings: savings,
        }
    } else {
        Recommendation {
            regime: Regime::New,
            reason: format!(
                "New Regime is recommended as the default regime: both regimes result in the same tax.\n\n{totals}\nTax Savings: {}",
                format_inr(Decimal::ZERO)
            ),
            tax_savings: Decimal::ZERO,
        }
    };
    log::info!(
        "recommending {} (savings {})",
        recommendation.regime.label(),
        recommendation.tax_savings
    );
    recommendation
}

/// What is left to pay, or to get back, once credits are set off
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settlement {
    pub total_credits: Decimal,
    pub tax_payable: Decimal,
    pub refund_amount: Decimal,
    /// Positive when tax is payable, negative for a refund
    pub net_payable_or_refund: Decimal,
}

impl Settlement {
    pub fn new(total_tax: Decimal, total_credits: Decimal) -> Self {
        let net = total_tax - total_credits;
        Settlement {
            total_credits,
            tax_payable: net.max(Decimal::ZERO),
            refund_amount: (-net).max(Decimal::ZERO),
            net_payable_or_refund: net,
        }
    }

    pub fn rounded(&self) -> Settlement {
        Settlement {
            total_credits: report(self.total_credits),
            tax_payable: report(self.tax_payable),
            refund_amount: report(self.refund_amount),
            net_payable_or_refund: report(self.net_payable_or_refund),
        }
    }
}
