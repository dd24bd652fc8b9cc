//! Spreadsheet adapter: converts between CSV sheets and client records.
//! Reading validates the sheet structure before any record is materialized;
//! writing produces the roster sheet plus, when needed, a companion sheet
//! enumerating field-level errors.

pub mod errors;
pub mod reader;
pub mod writer;
