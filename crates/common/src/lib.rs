// tabula-common: shared types and utilities for the Tabula workspace

pub mod action;
pub mod import;
pub mod types;
