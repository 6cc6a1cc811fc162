//! Tabular export and import.
//!
//! Column order per kind is fixed by [`columns`]; multi-valued cells use the
//! grammars in [`subrecord`].

pub mod columns;
pub mod export;
pub mod import;
pub mod subrecord;

pub use columns::{Column, HeaderMap, columns_for, headers_for};
pub use export::{ExportOptions, export_csv, export_file_name, to_rows, write_csv};
pub use import::{ImportReport, RowError, SkippedReference, import_rows, import_rows_with_progress};
