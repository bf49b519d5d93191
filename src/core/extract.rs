//! Flat scalar extracts, for documents where only a handful of fields could be read.

use super::error::TaxError;
use super::profile::DocumentKind;
use itrc_derive::FieldTable;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::io::Read;

/// One accepted field of an extract variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldDoc {
    pub name: &'static str,
    pub required: bool,
    pub description: &'static str,
}

/// A document as it comes out of extraction: a type tag and a loose payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DocumentExtract {
    #[serde(default)]
    pub file_name: Option<String>,
    /// "Form 16", "Form 26AS" or "AIS"; anything else is ignored
    pub doc_type: String,
    /// Missing when extraction produced nothing
    #[serde(default)]
    pub extracted_data: Option<serde_json::Value>,
}

/// Extract payload, typed by document kind
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedFields {
    Form16(Form16Fields),
    Form26As(Form26AsFields),
    Ais(AisFields),
    Other,
}

impl DocumentExtract {
    pub fn kind(&self) -> DocumentKind {
        DocumentKind::classify(&self.doc_type)
    }

    /// Typed fields, or `None` when there is no payload
    pub fn fields(&self) -> Result<Option<ExtractedFields>, TaxError> {
        let Some(data) = &self.extracted_data else {
            return Ok(None);
        };
        if data.is_null() {
            return Ok(None);
        }
        let fields = match self.kind() {
            DocumentKind::Form16 => ExtractedFields::Form16(self.parse(data)?),
            DocumentKind::Form26As => ExtractedFields::Form26As(self.parse(data)?),
            DocumentKind::Ais => ExtractedFields::Ais(self.parse(data)?),
            DocumentKind::Other => ExtractedFields::Other,
        };
        Ok(Some(fields))
    }

    fn parse<T: for<'de> Deserialize<'de>>(&self, data: &serde_json::Value) -> Result<T, TaxError> {
        T::deserialize(data).map_err(|e| {
            TaxError::MalformedProfile(format!(
                "{} extract{}: {e}",
                self.doc_type,
                self.file_name
                    .as_deref()
                    .map(|name| format!(" '{name}'"))
                    .unwrap_or_default()
            ))
        })
    }

    /// Read a JSON array of extracts
    pub fn read_all<R: Read>(reader: R) -> Result<Vec<DocumentExtract>, TaxError> {
        serde_json::from_reader(reader).map_err(|e| TaxError::MalformedProfile(e.to_string()))
    }
}

/// Treat an explicit `null` like an absent amount
fn amount_or_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
    Ok(Option::<Decimal>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FieldTable)]
pub struct Form16Fields {
    /// Gross salary as printed in Part B
    #[serde(default, deserialize_with = "amount_or_zero")]
    pub gross_salary: Decimal,
    /// Gross total income as printed in Part B
    #[serde(default, deserialize_with = "amount_or_zero")]
    pub total_income: Decimal,
    /// Total tax deducted at source
    #[serde(default, deserialize_with = "amount_or_zero")]
    pub total_tds: Decimal,
    /// Chapter VI-A deductions keyed by section, e.g. "80C"
    #[serde(default)]
    pub deductions: BTreeMap<String, Decimal>,
    /// Standard deduction u/s 16(ia)
    #[serde(default, deserialize_with = "amount_or_zero")]
    pub standard_deduction: Decimal,
    /// Professional tax u/s 16(iii)
    #[serde(default, deserialize_with = "amount_or_zero")]
    pub professional_tax: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FieldTable)]
pub struct Form26AsFields {
    /// Total tax deducted at source across all deductors
    #[serde(default, deserialize_with = "amount_or_zero")]
    pub total_tds: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FieldTable)]
pub struct AisFields {
    /// Salary reported by employers
    #[serde(default, deserialize_with = "amount_or_zero")]
    pub salary: Decimal,
    /// Alternative label for the salary figure
    #[serde(default, deserialize_with = "amount_or_zero")]
    pub salary_income: Decimal,
    /// Savings and deposit interest
    #[serde(default, deserialize_with = "amount_or_zero")]
    pub interest_income: Decimal,
    #[serde(default, deserialize_with = "amount_or_zero")]
    pub dividend_income: Decimal,
    /// Any other income from other sources
    #[serde(default, deserialize_with = "amount_or_zero")]
    pub other_income: Decimal,
    /// Sale of securities and property
    #[serde(default, deserialize_with = "amount_or_zero")]
    pub capital_gains: Decimal,
    /// Business or professional receipts
    #[serde(default, deserialize_with = "amount_or_zero")]
    pub business_income: Decimal,
    /// Rent received
    #[serde(default, deserialize_with = "amount_or_zero")]
    pub house_property_income: Decimal,
    /// Foreign remittances or assets reported
    #[serde(default)]
    pub has_foreign_assets: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn extract(doc_type: &str, data: serde_json::Value) -> DocumentExtract {
        DocumentExtract {
            file_name: None,
            doc_type: doc_type.to_string(),
            extracted_data: Some(data),
        }
    }

    #[test]
    fn form16_fields_parse() {
        let fields = extract(
            "Form 16",
            json!({
                "gross_salary": 1200000,
                "total_tds": "85000.50",
                "deductions": {"80C": 150000},
                "standard_deduction": null,
                "unrelated": "ignored"
            }),
        )
        .fields()
        .unwrap();
        let Some(ExtractedFields::Form16(form16)) = fields else {
            panic!("expected Form 16 fields, got {fields:?}");
        };
        assert_eq!(form16.gross_salary, dec!(1200000));
        assert_eq!(form16.total_tds, dec!(85000.50));
        assert_eq!(form16.standard_deduction, Decimal::ZERO);
        assert_eq!(form16.deductions["80C"], dec!(150000));
    }

    #[test]
    fn missing_payload_is_none() {
        let mut doc = extract("AIS", json!(null));
        assert_eq!(doc.fields().unwrap(), None);
        doc.extracted_data = None;
        assert_eq!(doc.fields().unwrap(), None);
    }

    #[test]
    fn unknown_document_type() {
        let doc = extract("Bank Statement", json!({"balance": 10}));
        assert_eq!(doc.fields().unwrap(), Some(ExtractedFields::Other));
    }

    #[test]
    fn non_numeric_amount_is_malformed() {
        let mut doc = extract("Form 26AS", json!({"total_tds": "plenty"}));
        doc.file_name = Some("26as.pdf".to_string());
        let err = doc.fields().unwrap_err();
        assert!(err.to_string().contains("Form 26AS extract '26as.pdf'"), "{err}");
    }

    #[test]
    fn field_tables() {
        let names: Vec<_> = Form26AsFields::field_table().iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["total_tds"]);

        let gross = &Form16Fields::field_table()[0];
        assert_eq!(gross.name, "gross_salary");
        assert!(!gross.required);
        assert_eq!(gross.description, "Gross salary as printed in Part B");

        let dividend = AisFields::field_table()
            .iter()
            .find(|f| f.name == "dividend_income")
            .unwrap();
        assert_eq!(dividend.description, "");
    }
}
