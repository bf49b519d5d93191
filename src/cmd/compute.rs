//! Compute command - both regimes, recommendation and settlement

use super::{read_extracts, read_profiles, RulesSource};
use anyhow::Context;
use chrono::NaiveDate;
use clap::Args;
use itrc::core::{
    age_on, aggregate, format_inr, fuse_profiles, FinancialYear, Regime, RegimeResult,
    ResidentialStatus, TaxComputationResult, Taxpayer,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct ComputeCommand {
    /// Structured profile JSON file(s); several are reconciled into one
    #[arg(
        short,
        long = "profile",
        num_args = 1..,
        required_unless_present = "extracts",
        conflicts_with = "extracts"
    )]
    profiles: Vec<PathBuf>,

    /// JSON array of flat document extracts to aggregate
    #[arg(short, long)]
    extracts: Option<PathBuf>,

    /// Financial year (e.g., 2024-25)
    #[arg(long)]
    fy: FinancialYear,

    /// Age of the taxpayer in completed years
    #[arg(long, required_unless_present = "dob", conflicts_with = "dob")]
    age: Option<u32>,

    /// Date of birth (YYYY-MM-DD), used to derive the age
    #[arg(long)]
    dob: Option<NaiveDate>,

    /// Date the age is taken on; defaults to the last day of the financial year
    #[arg(long, requires = "dob")]
    on: Option<NaiveDate>,

    /// Taxpayer is not resident in India (no rebate u/s 87A)
    #[arg(long)]
    non_resident: bool,

    /// Only show one regime (old or new)
    #[arg(short, long)]
    regime: Option<Regime>,

    #[command(flatten)]
    rules: RulesSource,

    /// Output as JSON instead of a formatted table
    #[arg(long, conflicts_with = "csv")]
    json: bool,

    /// Output breakdown rows as CSV
    #[arg(long)]
    csv: bool,
}

impl ComputeCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let engine = self.rules.engine()?;
        let taxpayer = self.taxpayer()?;

        let result = match &self.extracts {
            Some(path) => {
                let summary = aggregate(&read_extracts(path)?)?;
                engine.compute(&summary, &taxpayer, self.fy)?
            }
            None => {
                let profile = fuse_profiles(read_profiles(&self.profiles)?)
                    .context("at least one profile is required")?;
                engine.compute(&profile, &taxpayer, self.fy)?
            }
        };

        if self.json {
            self.print_json(&result)
        } else if self.csv {
            self.print_csv(&result)
        } else {
            self.print_table(&result);
            Ok(())
        }
    }

    fn taxpayer(&self) -> anyhow::Result<Taxpayer> {
        let age = match (self.age, self.dob) {
            (Some(age), _) => age,
            (None, Some(dob)) => {
                let on = match self.on {
                    Some(on) => on,
                    None => self
                        .fy
                        .end_date()
                        .with_context(|| format!("no end date for FY {}", self.fy))?,
                };
                age_on(dob, on)
            }
            (None, None) => anyhow::bail!("either --age or --dob is required"),
        };
        let residential_status = if self.non_resident {
            ResidentialStatus::NonResident
        } else {
            ResidentialStatus::Resident
        };
        Ok(Taxpayer {
            age,
            residential_status,
        })
    }

    fn regimes(&self) -> Vec<Regime> {
        match self.regime {
            Some(regime) => vec![regime],
            None => Regime::ALL.to_vec(),
        }
    }

    fn print_json(&self, result: &TaxComputationResult) -> anyhow::Result<()> {
        let json = match self.regime {
            Some(regime) => serde_json::to_string_pretty(result.regime(regime))?,
            None => serde_json::to_string_pretty(result)?,
        };
        println!("{json}");
        Ok(())
    }

    fn print_csv(&self, result: &TaxComputationResult) -> anyhow::Result<()> {
        let records = self.regimes().into_iter().flat_map(|regime| {
            line_items(result.regime(regime))
                .into_iter()
                .map(move |(item, amount)| BreakdownRecord {
                    financial_year: result.financial_year.display(),
                    regime,
                    item,
                    amount,
                })
        });
        let mut wtr = csv::Writer::from_writer(std::io::stdout());
        for record in records {
            wtr.serialize(record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn print_table(&self, result: &TaxComputationResult) {
        let regimes = self.regimes();
        println!();
        println!(
            "INCOME TAX COMPUTATION (FY {}, AY {}) - age {}{}",
            result.financial_year,
            result.assessment_year,
            result.taxpayer.age,
            if result.taxpayer.is_resident() { "" } else { ", non-resident" }
        );
        println!();
        println!("Gross Total Income: {}", format_inr(result.gross_total_income));
        println!();

        let mut builder = tabled::builder::Builder::default();
        let mut header = vec!["Item".to_string()];
        header.extend(regimes.iter().map(|r| r.label().to_string()));
        builder.push_record(header);
        for (item, values) in comparison_rows(result, &regimes) {
            let mut row = vec![item];
            row.extend(values);
            builder.push_record(row);
        }
        let table = builder
            .build()
            .with(Style::rounded())
            .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
            .to_string();
        println!("{table}");

        println!();
        if self.regime.is_none() {
            println!("{}", result.recommendation_reason);
            println!();
        }

        let settlement = vec![SettlementRow {
            regime: result.recommended_regime.label().to_string(),
            credits: format_inr(result.settlement.total_credits),
            payable: format_inr(result.settlement.tax_payable),
            refund: format_inr(result.settlement.refund_amount),
            itr_form: result.recommended_itr_form.to_string(),
        }];
        let table = Table::new(settlement).with(Style::rounded()).to_string();
        println!("{table}");
    }
}

/// Reportable amounts of one regime, in computation order
fn line_items(result: &RegimeResult) -> Vec<(String, Decimal)> {
    let mut items: Vec<(String, Decimal)> = result
        .deductions
        .iter()
        .map(|(label, amount)| (format!("Deduction: {label}"), *amount))
        .collect();
    items.extend([
        ("Total Deductions".to_string(), result.total_deductions),
        ("Taxable Income".to_string(), result.taxable_income),
        ("Tax Before Rebate".to_string(), result.tax_before_rebate),
        ("Rebate u/s 87A".to_string(), result.rebate),
        ("Tax After Rebate".to_string(), result.tax_after_rebate),
        ("Surcharge Rate (%)".to_string(), result.surcharge_rate),
        ("Marginal Relief".to_string(), result.marginal_relief),
        ("Surcharge".to_string(), result.surcharge),
        ("Health & Education Cess".to_string(), result.cess),
        ("Total Tax".to_string(), result.total_tax),
    ]);
    items
}

/// One row per line item, one column per regime; deduction labels are the union of both regimes
fn comparison_rows(
    result: &TaxComputationResult,
    regimes: &[Regime],
) -> Vec<(String, Vec<String>)> {
    let labels: BTreeSet<&String> = regimes
        .iter()
        .flat_map(|r| result.regime(*r).deductions.keys())
        .collect();
    let mut rows: Vec<(String, Vec<String>)> = labels
        .into_iter()
        .map(|label| {
            let values = regimes
                .iter()
                .map(|r| {
                    result
                        .regime(*r)
                        .deductions
                        .get(label)
                        .map_or("-".to_string(), |amount| format_inr(*amount))
                })
                .collect();
            (format!("Deduction: {label}"), values)
        })
        .collect();

    let per_regime: Vec<Vec<(String, Decimal)>> = regimes
        .iter()
        .map(|r| {
            line_items(result.regime(*r))
                .into_iter()
                .filter(|(item, _)| !item.starts_with("Deduction: "))
                .collect()
        })
        .collect();
    if let Some(first) = per_regime.first() {
        for (i, (item, _)) in first.iter().enumerate() {
            let values = per_regime
                .iter()
                .map(|items| {
                    let amount = items[i].1;
                    if item.ends_with("(%)") {
                        format!("{amount}%")
                    } else {
                        format_inr(amount)
                    }
                })
                .collect();
            rows.push((item.clone(), values));
        }
    }
    rows
}

#[derive(Debug, Serialize)]
struct BreakdownRecord {
    financial_year: String,
    regime: Regime,
    item: String,
    amount: Decimal,
}

#[derive(Debug, Clone, Tabled)]
struct SettlementRow {
    #[tabled(rename = "Recommended")]
    regime: String,
    #[tabled(rename = "Credits")]
    credits: String,
    #[tabled(rename = "Payable")]
    payable: String,
    #[tabled(rename = "Refund")]
    refund: String,
    #[tabled(rename = "ITR Form")]
    itr_form: String,
}
