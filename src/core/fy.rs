use super::error::TaxError;
use chrono::{Datelike, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Indian Financial Year (runs 1 April to 31 March)
/// The value is the starting calendar year (e.g., 2024 = FY 2024-25)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FinancialYear(pub i32);

impl FinancialYear {
    /// Financial year a date falls in
    pub fn from_date(date: NaiveDate) -> Self {
        if date.month() >= 4 {
            FinancialYear(date.year())
        } else {
            FinancialYear(date.year() - 1)
        }
    }

    /// Assessment year in which income of this FY is assessed
    pub fn assessment_year(&self) -> FinancialYear {
        FinancialYear(self.0 + 1)
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.0, 4, 1)
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.0 + 1, 3, 31)
    }

    /// Display as "2024-25"
    pub fn display(&self) -> String {
        format!("{}-{:02}", self.0, (self.0 + 1).rem_euclid(100))
    }
}

impl FromStr for FinancialYear {
    type Err = TaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TaxError::InvalidFinancialYear(s.to_string());
        let (start, end) = s.trim().split_once('-').ok_or_else(invalid)?;
        if start.len() != 4 || end.len() != 2 {
            return Err(invalid());
        }
        let start: i32 = start.parse().map_err(|_| invalid())?;
        let end: i32 = end.parse().map_err(|_| invalid())?;
        if (start + 1).rem_euclid(100) != end {
            return Err(invalid());
        }
        Ok(FinancialYear(start))
    }
}

impl TryFrom<String> for FinancialYear {
    type Error = TaxError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FinancialYear> for String {
    fn from(fy: FinancialYear) -> Self {
        fy.display()
    }
}

impl std::fmt::Display for FinancialYear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Age band selecting the old-regime slab set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeBand {
    Below60,
    Age60To79,
    Age80AndAbove,
}

impl AgeBand {
    pub fn from_age(age: u32) -> Self {
        match age {
            0..=59 => AgeBand::Below60,
            60..=79 => AgeBand::Age60To79,
            _ => AgeBand::Age80AndAbove,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResidentialStatus {
    #[default]
    Resident,
    NonResident,
}

/// Facts about the person that change how the slabs and rebate apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Taxpayer {
    pub age: u32,
    #[serde(default)]
    pub residential_status: ResidentialStatus,
}

impl Taxpayer {
    pub fn resident(age: u32) -> Self {
        Taxpayer {
            age,
            residential_status: ResidentialStatus::Resident,
        }
    }

    pub fn age_band(&self) -> AgeBand {
        AgeBand::from_age(self.age)
    }

    pub fn is_resident(&self) -> bool {
        self.residential_status == ResidentialStatus::Resident
    }
}

/// Completed years of age on `on`; zero if `on` precedes the date of birth.
pub fn age_on(date_of_birth: NaiveDate, on: NaiveDate) -> u32 {
    let mut age = on.year() - date_of_birth.year();
    if (on.month(), on.day()) < (date_of_birth.month(), date_of_birth.day()) {
        age -= 1;
    }
    u32::try_from(age).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn fy_from_date_before_april() {
        // 31 March 2025 is the last day of FY 2024-25
        assert_eq!(FinancialYear::from_date(date("2025-03-31")), FinancialYear(2024));
    }

    #[test]
    fn fy_from_date_on_april_1() {
        assert_eq!(FinancialYear::from_date(date("2024-04-01")), FinancialYear(2024));
    }

    #[test]
    fn fy_parse_and_display() {
        let fy: FinancialYear = "2024-25".parse().unwrap();
        assert_eq!(fy, FinancialYear(2024));
        assert_eq!(fy.display(), "2024-25");
        assert_eq!(fy.assessment_year().display(), "2025-26");
        assert_eq!(FinancialYear(1999).display(), "1999-00");
        assert_eq!("1999-00".parse::<FinancialYear>().unwrap(), FinancialYear(1999));
    }

    #[test]
    fn fy_parse_rejects_garbage() {
        for bad in ["2024", "2024-26", "24-25", "2024/25", "abcd-ef", ""] {
            assert_eq!(
                bad.parse::<FinancialYear>(),
                Err(TaxError::InvalidFinancialYear(bad.to_string())),
                "{bad}"
            );
        }
    }

    #[test]
    fn fy_serde_as_string() {
        let json = serde_json::to_string(&FinancialYear(2023)).unwrap();
        assert_eq!(json, "\"2023-24\"");
        let fy: FinancialYear = serde_json::from_str("\"2023-24\"").unwrap();
        assert_eq!(fy, FinancialYear(2023));
    }

    #[test]
    fn fy_bounds() {
        let fy = FinancialYear(2024);
        assert_eq!(fy.start_date(), Some(date("2024-04-01")));
        assert_eq!(fy.end_date(), Some(date("2025-03-31")));
    }

    #[test]
    fn age_bands() {
        assert_eq!(AgeBand::from_age(45), AgeBand::Below60);
        assert_eq!(AgeBand::from_age(59), AgeBand::Below60);
        assert_eq!(AgeBand::from_age(60), AgeBand::Age60To79);
        assert_eq!(AgeBand::from_age(79), AgeBand::Age60To79);
        assert_eq!(AgeBand::from_age(80), AgeBand::Age80AndAbove);
    }

    #[test]
    fn age_counts_completed_years() {
        let dob = date("1964-07-15");
        assert_eq!(age_on(dob, date("2024-07-14")), 59);
        assert_eq!(age_on(dob, date("2024-07-15")), 60);
        assert_eq!(age_on(dob, date("1960-01-01")), 0);
    }
}
