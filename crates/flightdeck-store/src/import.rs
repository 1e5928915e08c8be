// ABOUTME: Loads the nycflights13 CSV exports into the SQLite database in dependency order.
// ABOUTME: Values are typed by the declared column type; time_hour is normalised to ISO 8601 text.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, Transaction, params_from_iter};
use serde::Serialize;
use thiserror::Error;

use crate::schema::create_schema;
use crate::sqlite::QueryError;

/// Tables in load order. Referenced tables come before the tables that
/// reference them; clearing runs in reverse.
pub const LOAD_ORDER: [&str; 5] = ["airlines", "airports", "planes", "weather", "flights"];

const TIME_HOUR: &str = "time_hour";

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("missing CSV file: {0}")]
    MissingFile(PathBuf),

    #[error("{file}: {source}")]
    Csv {
        file: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{table}.csv has a column the table does not define: {column}")]
    UnknownColumn { table: String, column: String },

    #[error("schema setup failed: {0}")]
    Schema(#[from] QueryError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Row count of one loaded table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCount {
    pub table: String,
    pub rows: usize,
}

/// What an import loaded, plus the integrity checks run afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub tables: Vec<TableCount>,
    /// Distinct flight carriers with no airlines row.
    pub unknown_carriers: Vec<String>,
}

impl ImportReport {
    pub fn rows(&self, table: &str) -> Option<usize> {
        self.tables.iter().find(|t| t.table == table).map(|t| t.rows)
    }
}

/// Declared affinity of a table column.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Affinity {
    Integer,
    Real,
    Text,
}

/// Replace the contents of every dataset table with the CSVs in `dir`
/// (`airlines.csv`, `airports.csv`, ...). Runs in one transaction: either
/// every table is loaded or the database is left as it was.
pub fn import_csv_dir(db_path: &Path, dir: &Path) -> Result<ImportReport, ImportError> {
    let files: Vec<(&str, PathBuf)> = LOAD_ORDER
        .iter()
        .map(|table| (*table, dir.join(format!("{}.csv", table))))
        .collect();
    if let Some((_, missing)) = files.iter().find(|(_, path)| !path.is_file()) {
        return Err(ImportError::MissingFile(missing.clone()));
    }

    create_schema(db_path)?;
    let mut conn = Connection::open(db_path)?;
    let tx = conn.transaction()?;

    for table in LOAD_ORDER.iter().rev() {
        tx.execute(&format!("DELETE FROM {}", table), [])?;
    }

    let mut tables = Vec::with_capacity(files.len());
    for (table, path) in &files {
        let rows = load_table(&tx, table, path)?;
        tracing::info!(table = *table, rows, file = %path.display(), "table loaded");
        tables.push(TableCount {
            table: table.to_string(),
            rows,
        });
    }
    tx.commit()?;

    let unknown_carriers = unknown_carriers(&conn)?;
    if !unknown_carriers.is_empty() {
        tracing::warn!(
            carriers = ?unknown_carriers,
            "flights reference carriers missing from airlines"
        );
    }

    Ok(ImportReport {
        tables,
        unknown_carriers,
    })
}

fn table_columns(
    tx: &Transaction<'_>,
    table: &str,
) -> Result<Vec<(String, Affinity)>, rusqlite::Error> {
    let mut stmt = tx.prepare("SELECT name, type FROM pragma_table_info(?1)")?;
    let columns = stmt
        .query_map([table], |row| {
            let name: String = row.get(0)?;
            let declared: String = row.get(1)?;
            let affinity = match declared.to_ascii_uppercase().as_str() {
                "INTEGER" => Affinity::Integer,
                "REAL" => Affinity::Real,
                _ => Affinity::Text,
            };
            Ok((name, affinity))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

fn load_table(tx: &Transaction<'_>, table: &str, path: &Path) -> Result<usize, ImportError> {
    let csv_error = |source| ImportError::Csv {
        file: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_error)?;
    let headers = reader.headers().map_err(csv_error)?.clone();
    let known = table_columns(tx, table)?;

    // (csv index, column name, affinity); blank headers are row-name columns.
    let mut mapping = Vec::new();
    for (index, header) in headers.iter().enumerate() {
        if header.is_empty() {
            continue;
        }
        let (name, affinity) = known
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(header))
            .ok_or_else(|| ImportError::UnknownColumn {
                table: table.to_string(),
                column: header.to_string(),
            })?;
        mapping.push((index, name.clone(), *affinity));
    }

    let columns: Vec<&str> = mapping.iter().map(|(_, name, _)| name.as_str()).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders
    );
    let mut insert = tx.prepare(&sql)?;

    let mut rows = 0;
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        let values = mapping.iter().map(|(index, name, affinity)| {
            let raw = record.get(*index).unwrap_or_default();
            if name == TIME_HOUR {
                time_hour_value(raw)
            } else {
                typed_value(raw, *affinity)
            }
        });
        insert.execute(params_from_iter(values))?;
        rows += 1;
    }
    Ok(rows)
}

fn is_missing(raw: &str) -> bool {
    raw.is_empty() || raw.eq_ignore_ascii_case("NA")
}

fn typed_value(raw: &str, affinity: Affinity) -> SqlValue {
    if is_missing(raw) {
        return SqlValue::Null;
    }
    match affinity {
        Affinity::Integer => match raw.parse::<i64>() {
            Ok(i) => SqlValue::Integer(i),
            Err(_) => match raw.parse::<f64>() {
                Ok(f) if f.fract() == 0.0 => SqlValue::Integer(f as i64),
                Ok(f) => SqlValue::Real(f),
                Err(_) => SqlValue::Text(raw.to_string()),
            },
        },
        Affinity::Real => raw
            .parse::<f64>()
            .map(SqlValue::Real)
            .unwrap_or_else(|_| SqlValue::Text(raw.to_string())),
        Affinity::Text => SqlValue::Text(raw.to_string()),
    }
}

/// Normalise a timestamp to `YYYY-MM-DDTHH:MM:SS` in UTC so flights and
/// weather join on identical text. Unrecognised values are kept as given.
fn time_hour_value(raw: &str) -> SqlValue {
    if is_missing(raw) {
        return SqlValue::Null;
    }
    const ISO: &str = "%Y-%m-%dT%H:%M:%S";
    let normalised = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc).naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .map(|dt| dt.format(ISO).to_string())
        .unwrap_or_else(|_| raw.to_string());
    SqlValue::Text(normalised)
}

fn unknown_carriers(conn: &Connection) -> Result<Vec<String>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT carrier FROM flights \
         WHERE carrier IS NOT NULL AND carrier NOT IN (SELECT carrier FROM airlines) \
         ORDER BY carrier",
    )?;
    let carriers = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(carriers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_fixture(dir: &Path) {
        fs::write(
            dir.join("airlines.csv"),
            "carrier,name\nUA,United Air Lines Inc.\nDL,Delta Air Lines Inc.\n",
        )
        .unwrap();
        fs::write(
            dir.join("airports.csv"),
            "faa,name,lat,lon,alt,tz,dst,tzone\n\
             JFK,John F Kennedy Intl,40.639751,-73.778925,13,-5,A,America/New_York\n\
             ATL,Hartsfield Jackson Atlanta Intl,33.636719,-84.428067,1026,-5,A,America/New_York\n",
        )
        .unwrap();
        fs::write(
            dir.join("planes.csv"),
            "tailnum,year,type,manufacturer,model,engines,seats,speed,engine\n\
             N10156,2004,Fixed wing multi engine,EMBRAER,EMB-145XR,2,55,NA,Turbo-fan\n",
        )
        .unwrap();
        fs::write(
            dir.join("weather.csv"),
            "origin,year,month,day,hour,temp,wind_gust,time_hour\n\
             JFK,2013,1,1,5,39.02,NA,2013-01-01 05:00:00\n",
        )
        .unwrap();
        fs::write(
            dir.join("flights.csv"),
            "\"\",year,month,day,dep_delay,carrier,flight,origin,dest,time_hour\n\
             \"1\",2013,1,1,2,UA,1545,JFK,ATL,2013-01-01T10:00:00Z\n\
             \"2\",2013,1,1,NA,DL,461,JFK,ATL,2013-01-01 05:00:00\n\
             \"3\",2013,1,2,2,ZZ,1141,JFK,ATL,2013-01-02 05:00:00\n",
        )
        .unwrap();
    }

    #[test]
    fn import_loads_every_table_and_reports_counts() {
        let dir = TempDir::new().unwrap();
        write_fixture(dir.path());
        let db_path = dir.path().join("flights.db");

        let report = import_csv_dir(&db_path, dir.path()).unwrap();

        let order: Vec<&str> = report.tables.iter().map(|t| t.table.as_str()).collect();
        assert_eq!(order, LOAD_ORDER.to_vec());
        assert_eq!(report.rows("airlines"), Some(2));
        assert_eq!(report.rows("flights"), Some(3));
        assert_eq!(report.unknown_carriers, vec!["ZZ".to_string()]);

        let conn = Connection::open(&db_path).unwrap();
        let (dep_delay, time_hour): (Option<f64>, String) = conn
            .query_row(
                "SELECT dep_delay, time_hour FROM flights WHERE carrier = 'DL'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert!(dep_delay.is_none());
        assert_eq!(time_hour, "2013-01-01T05:00:00");

        let utc: String = conn
            .query_row(
                "SELECT time_hour FROM flights WHERE carrier = 'UA'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(utc, "2013-01-01T10:00:00");

        let joined: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM flights f JOIN weather w \
                 ON f.origin = w.origin AND f.time_hour = w.time_hour",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(joined, 1);
    }

    #[test]
    fn reimport_replaces_previous_rows() {
        let dir = TempDir::new().unwrap();
        write_fixture(dir.path());
        let db_path = dir.path().join("flights.db");

        import_csv_dir(&db_path, dir.path()).unwrap();
        let report = import_csv_dir(&db_path, dir.path()).unwrap();
        assert_eq!(report.rows("flights"), Some(3));

        let conn = Connection::open(&db_path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM flights", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn missing_file_fails_before_touching_database() {
        let dir = TempDir::new().unwrap();
        write_fixture(dir.path());
        fs::remove_file(dir.path().join("weather.csv")).unwrap();
        let db_path = dir.path().join("flights.db");

        let err = import_csv_dir(&db_path, dir.path()).unwrap_err();
        assert!(matches!(err, ImportError::MissingFile(ref p) if p.ends_with("weather.csv")));
        assert!(!db_path.exists());
    }

    #[test]
    fn unknown_column_rolls_back() {
        let dir = TempDir::new().unwrap();
        write_fixture(dir.path());
        let db_path = dir.path().join("flights.db");
        import_csv_dir(&db_path, dir.path()).unwrap();

        fs::write(dir.path().join("planes.csv"), "tailnum,wingspan\nN1,30\n").unwrap();
        let err = import_csv_dir(&db_path, dir.path()).unwrap_err();
        assert!(err.to_string().contains("wingspan"));

        let conn = Connection::open(&db_path).unwrap();
        let airlines: i64 = conn
            .query_row("SELECT COUNT(*) FROM airlines", [], |row| row.get(0))
            .unwrap();
        assert_eq!(airlines, 2);
    }

    #[test]
    fn values_follow_column_affinity() {
        assert_eq!(typed_value("NA", Affinity::Integer), SqlValue::Null);
        assert_eq!(typed_value("42", Affinity::Integer), SqlValue::Integer(42));
        assert_eq!(typed_value("42.0", Affinity::Integer), SqlValue::Integer(42));
        assert_eq!(typed_value("1.5", Affinity::Real), SqlValue::Real(1.5));
        assert_eq!(typed_value("007", Affinity::Text), SqlValue::Text("007".to_string()));
    }
}
