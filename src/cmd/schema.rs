//! Schema command - print expected input formats

use clap::Args;
use itrc::core::{
    AisFields, DocumentExtract, FieldDoc, Form16Fields, Form26AsFields, StructuredTaxProfile,
    TaxRuleTable,
};
use schemars::schema_for;

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Which input to describe
    #[arg(value_enum, default_value = "profile")]
    target: SchemaTarget,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaTarget {
    /// JSON Schema for a structured tax profile
    Profile,
    /// JSON Schema for a list of flat document extracts
    Extracts,
    /// JSON Schema for a tax rule table
    Rules,
    /// Accepted fields of each flat extract document type
    ExtractFields,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let schema = match self.target {
            SchemaTarget::Profile => schema_for!(StructuredTaxProfile),
            SchemaTarget::Extracts => schema_for!(Vec<DocumentExtract>),
            SchemaTarget::Rules => schema_for!(TaxRuleTable),
            SchemaTarget::ExtractFields => {
                print_extract_fields();
                return Ok(());
            }
        };
        println!("{}", serde_json::to_string_pretty(&schema)?);
        Ok(())
    }
}

fn print_extract_fields() {
    println!("Flat Extract Fields");
    println!("===================");
    let documents: [(&str, &[FieldDoc]); 3] = [
        ("Form 16", Form16Fields::field_table()),
        ("Form 26AS", Form26AsFields::field_table()),
        ("AIS", AisFields::field_table()),
    ];
    for (doc_type, fields) in documents {
        println!();
        println!("doc_type: \"{doc_type}\"");
        for field in fields {
            let req = if field.required { "required" } else { "optional" };
            println!("  {:24} ({:8})  {}", field.name, req, field.description);
        }
    }
    println!();
    println!("Missing or null amounts count as zero; unknown document types are ignored.");
}
