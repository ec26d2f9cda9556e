//! Diagnostic facilities.

pub mod leak_ledger;
