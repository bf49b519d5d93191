use super::base::ItrFactors;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

/// Return form an individual should file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItrForm {
    /// Salary, one house property and other sources within the ceiling
    Itr1,
    /// Capital gains, foreign assets or income above the ITR-1 ceiling
    Itr2,
    /// Business or professional income
    Itr3,
}

impl std::fmt::Display for ItrForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ItrForm::Itr1 => "ITR-1 (SAHAJ)",
            ItrForm::Itr2 => "ITR-2",
            ItrForm::Itr3 => "ITR-3",
        };
        f.write_str(name)
    }
}

impl Serialize for ItrForm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// `ceiling` is the highest gross income (inclusive) that still qualifies for ITR-1
pub fn recommend(factors: &ItrFactors, ceiling: Decimal) -> ItrForm {
    if factors.has_foreign_assets || factors.has_capital_gains {
        ItrForm::Itr2
    } else if factors.has_business_income {
        ItrForm::Itr3
    } else if factors.gross_income <= ceiling {
        ItrForm::Itr1
    } else {
        ItrForm::Itr2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ceiling() -> Decimal {
        dec!(5000000)
    }

    fn salaried(gross_income: Decimal) -> ItrFactors {
        ItrFactors {
            gross_income,
            ..ItrFactors::default()
        }
    }

    #[test]
    fn salaried_within_ceiling() {
        assert_eq!(recommend(&salaried(dec!(5000000)), ceiling()), ItrForm::Itr1);
        assert_eq!(recommend(&salaried(Decimal::ZERO), ceiling()), ItrForm::Itr1);
        assert_eq!(ItrForm::Itr1.to_string(), "ITR-1 (SAHAJ)");
    }

    #[test]
    fn above_ceiling() {
        assert_eq!(recommend(&salaried(dec!(5000001)), ceiling()), ItrForm::Itr2);
    }

    #[test]
    fn capital_gains_beat_business_income() {
        let factors = ItrFactors {
            has_business_income: true,
            has_capital_gains: true,
            ..salaried(dec!(100000))
        };
        assert_eq!(recommend(&factors, ceiling()), ItrForm::Itr2);

        let business = ItrFactors {
            has_capital_gains: false,
            ..factors
        };
        assert_eq!(recommend(&business, ceiling()), ItrForm::Itr3);
    }

    #[test]
    fn foreign_assets() {
        let factors = ItrFactors {
            has_foreign_assets: true,
            ..salaried(dec!(100000))
        };
        assert_eq!(recommend(&factors, ceiling()), ItrForm::Itr2);
        assert_eq!(serde_json::to_string(&ItrForm::Itr2).unwrap(), "\"ITR-2\"");
    }
}
