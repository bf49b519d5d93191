pub mod aggregate;
pub mod base;
pub mod engine;
pub mod error;
pub mod extract;
pub mod fy;
pub mod itr;
pub mod money;
pub mod profile;
pub mod reconcile;
pub mod regime;
pub mod rules;
pub mod select;

// Flat public surface for domain types and functions.
pub use aggregate::{aggregate, IncomeSummary};
pub use base::{IncomeHeads, ItrFactors, RegimeBase, TaxBase};
pub use engine::{EngineConfig, TaxComputationResult, TaxEngine};
pub use error::TaxError;
pub use extract::{
    AisFields, DocumentExtract, ExtractedFields, FieldDoc, Form16Fields, Form26AsFields,
};
pub use fy::{age_on, AgeBand, FinancialYear, ResidentialStatus, Taxpayer};
pub use itr::{recommend as recommend_itr_form, ItrForm};
pub use money::{format_inr, report};
pub use profile::{
    ChapterVia, Credits, DocumentKind, Identity, OtherIncome, SalaryBlock, StructuredTaxProfile,
};
pub use reconcile::{fuse_profiles, reconcile};
pub use regime::{compute_regime, slab_tax, Regime, RegimeResult};
pub use rules::{RuleBook, Slab, SlabRate, TaxRuleTable};
pub use select::{select, Recommendation, Settlement};
