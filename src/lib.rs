//! Indian income-tax reconciliation and old/new regime computation.

pub mod core;
