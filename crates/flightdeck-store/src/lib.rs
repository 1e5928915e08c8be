// ABOUTME: Persistence layer for flightdeck, wrapping the relational flights dataset.
// ABOUTME: Provides read-only SQL execution with row caps and timeouts, the schema and CSV import.

pub mod import;
pub mod schema;
pub mod sqlite;

pub use import::{ImportError, ImportReport, LOAD_ORDER, TableCount, import_csv_dir};
pub use schema::{SCHEMA_CONTEXT, SCHEMA_DDL, create_schema};
pub use sqlite::{ColumnInfo, ColumnKind, FlightsDb, QueryError, QueryResult};
