//! Rules command - inspect the configured tax rule tables

use super::RulesSource;
use clap::Args;
use itrc::core::{
    format_inr, AgeBand, FinancialYear, Regime, Slab, SlabRate, TaxEngine, TaxRuleTable,
};
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct RulesCommand {
    /// Show a single financial year (e.g., 2024-25)
    #[arg(long)]
    fy: Option<FinancialYear>,

    #[command(flatten)]
    rules: RulesSource,

    /// Output as JSON instead of formatted tables
    #[arg(long)]
    json: bool,
}

impl RulesCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let engine = self.rules.engine()?;
        match self.fy {
            Some(fy) => {
                let table = engine.rules().get(fy)?;
                if self.json {
                    println!("{}", serde_json::to_string_pretty(table)?);
                } else {
                    print_table(table);
                }
            }
            None => self.print_years(&engine)?,
        }
        Ok(())
    }

    fn print_years(&self, engine: &TaxEngine) -> anyhow::Result<()> {
        if self.json {
            let tables: Vec<_> = engine.rules().tables().collect();
            println!("{}", serde_json::to_string_pretty(&tables)?);
            return Ok(());
        }
        let rows: Vec<YearRow> = engine
            .rules()
            .tables()
            .map(|table| YearRow {
                financial_year: table.financial_year.display(),
                assessment_year: table.assessment_year.clone(),
                cess: format!("{}%", table.cess_percent),
                old_rebate: rebate_text(table, Regime::Old),
                new_rebate: rebate_text(table, Regime::New),
            })
            .collect();
        if rows.is_empty() {
            println!("No tax rule tables configured");
            return Ok(());
        }
        println!("{}", Table::new(rows).with(Style::rounded()));
        Ok(())
    }
}

fn rebate_text(table: &TaxRuleTable, regime: Regime) -> String {
    let rule = table.rebate_87a.get(regime);
    format!(
        "up to {} if income <= {}",
        format_inr(rule.rebate_cap),
        format_inr(rule.max_total_income)
    )
}

fn print_table(table: &TaxRuleTable) {
    println!();
    println!(
        "TAX RULES FY {} (AY {}), cess {}%",
        table.financial_year, table.assessment_year, table.cess_percent
    );

    let sets = [
        ("Old Regime, below 60", table.slabs_for(Regime::Old, AgeBand::Below60)),
        ("Old Regime, 60 to 79", table.slabs_for(Regime::Old, AgeBand::Age60To79)),
        ("Old Regime, 80 and above", table.slabs_for(Regime::Old, AgeBand::Age80AndAbove)),
        ("New Regime", table.slabs_for(Regime::New, AgeBand::Below60)),
    ];
    for (title, slabs) in sets {
        println!();
        println!("{title}");
        let rows: Vec<SlabRow> = slabs.iter().map(SlabRow::from).collect();
        let rendered = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
            .to_string();
        println!("{rendered}");
    }

    for regime in Regime::ALL {
        println!();
        println!("{} surcharge", regime.label());
        let rows: Vec<SurchargeRow> = table
            .surcharge
            .get(regime)
            .iter()
            .map(|t| SurchargeRow {
                above: format_inr(t.min_exclusive),
                rate: format!("{}%", t.rate_percent),
            })
            .collect();
        println!("{}", Table::new(rows).with(Style::rounded()));
        println!("Rebate u/s 87A: {}", rebate_text(table, regime));
    }
}

#[derive(Debug, Clone, Tabled)]
struct YearRow {
    #[tabled(rename = "FY")]
    financial_year: String,
    #[tabled(rename = "AY")]
    assessment_year: String,
    #[tabled(rename = "Cess")]
    cess: String,
    #[tabled(rename = "Old Regime Rebate")]
    old_rebate: String,
    #[tabled(rename = "New Regime Rebate")]
    new_rebate: String,
}

#[derive(Debug, Clone, Tabled)]
struct SlabRow {
    #[tabled(rename = "Over")]
    over: String,
    #[tabled(rename = "Up To")]
    up_to: String,
    #[tabled(rename = "Tax")]
    rate: String,
}

impl From<&Slab> for SlabRow {
    fn from(slab: &Slab) -> Self {
        SlabRow {
            over: format_inr(slab.over),
            up_to: slab.up_to.map_or("-".to_string(), format_inr),
            rate: match &slab.rate {
                SlabRate::Percent(rate) => format!("{rate}%"),
                SlabRate::Formula(formula) => format!(
                    "{} + {}% of amount over {}",
                    format_inr(formula.base),
                    formula.percent,
                    format_inr(formula.threshold)
                ),
            },
        }
    }
}

#[derive(Debug, Clone, Tabled)]
struct SurchargeRow {
    #[tabled(rename = "Income Above")]
    above: String,
    #[tabled(rename = "Rate")]
    rate: String,
}
