// ABOUTME: Schema of the NYC flights 2013 dataset, both as DDL and as prose context for SQL generation.
// ABOUTME: The DDL creates the five dataset tables; the context text is embedded in model prompts.

use std::path::Path;

use rusqlite::Connection;

use crate::sqlite::QueryError;

/// Description of the dataset handed to the language model when it writes SQL.
pub const SCHEMA_CONTEXT: &str = "\
The database contains the following tables:

1. airlines
   - carrier (text): Two letter carrier code
   - name (text): Full carrier name

2. airports
   - faa (text): FAA airport code
   - name (text): Airport name
   - lat (float): Latitude
   - lon (float): Longitude
   - alt (int): Altitude
   - tz (int): Timezone offset
   - dst (text): Daylight savings time zone
   - tzone (text): IANA time zone

3. planes
   - tailnum (text): Tail number
   - year (int): Year manufactured
   - type (text): Type of aircraft
   - manufacturer (text): Manufacturer
   - model (text): Model
   - engines (int): Number of engines
   - seats (int): Number of seats
   - speed (int): Average cruising speed
   - engine (text): Engine type

4. weather
   - origin (text): Weather station (FAA code)
   - year, month, day, hour (int): Observation time parts
   - temp, dewp (float): Temperature and dew point (F)
   - humid (float): Humidity
   - wind_dir (int): Wind direction
   - wind_speed, wind_gust (float): Wind speed and gust
   - precip (float): Precipitation
   - pressure (float): Pressure
   - visib (float): Visibility
   - time_hour (text): Date and hour, ISO 8601

5. flights
   - year, month, day (int): Date of departure
   - dep_time, sched_dep_time (int): Actual and scheduled departure time (HHMM)
   - dep_delay (float): Departure delay in minutes
   - arr_time, sched_arr_time (int): Actual and scheduled arrival time (HHMM)
   - arr_delay (float): Arrival delay in minutes
   - carrier (text): Carrier code, joins airlines.carrier
   - flight (int): Flight number
   - tailnum (text): Tail number, joins planes.tailnum
   - origin (text): Origin airport (EWR, JFK or LGA), joins airports.faa
   - dest (text): Destination airport, joins airports.faa
   - air_time (float): Minutes in the air
   - distance (float): Distance in miles
   - hour, minute (int): Scheduled departure split into hour and minute
   - time_hour (text): Scheduled departure date and hour, ISO 8601
";

/// DDL for the dataset tables. Idempotent.
pub const SCHEMA_DDL: &str = "
CREATE TABLE IF NOT EXISTS airlines (
    carrier TEXT PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS airports (
    faa TEXT PRIMARY KEY,
    name TEXT,
    lat REAL,
    lon REAL,
    alt INTEGER,
    tz INTEGER,
    dst TEXT,
    tzone TEXT
);

CREATE TABLE IF NOT EXISTS planes (
    tailnum TEXT PRIMARY KEY,
    year INTEGER,
    type TEXT,
    manufacturer TEXT,
    model TEXT,
    engines INTEGER,
    seats INTEGER,
    speed INTEGER,
    engine TEXT
);

CREATE TABLE IF NOT EXISTS weather (
    origin TEXT,
    year INTEGER,
    month INTEGER,
    day INTEGER,
    hour INTEGER,
    temp REAL,
    dewp REAL,
    humid REAL,
    wind_dir INTEGER,
    wind_speed REAL,
    wind_gust REAL,
    precip REAL,
    pressure REAL,
    visib REAL,
    time_hour TEXT
);

CREATE TABLE IF NOT EXISTS flights (
    year INTEGER,
    month INTEGER,
    day INTEGER,
    dep_time INTEGER,
    sched_dep_time INTEGER,
    dep_delay REAL,
    arr_time INTEGER,
    sched_arr_time INTEGER,
    arr_delay REAL,
    carrier TEXT,
    flight INTEGER,
    tailnum TEXT,
    origin TEXT,
    dest TEXT,
    air_time REAL,
    distance REAL,
    hour INTEGER,
    minute INTEGER,
    time_hour TEXT
);

CREATE INDEX IF NOT EXISTS idx_flights_carrier ON flights(carrier);
CREATE INDEX IF NOT EXISTS idx_flights_origin_date ON flights(origin, month, day);
";

/// Create (or open) a database at `path` and ensure the dataset tables exist.
pub fn create_schema(path: &Path) -> Result<(), QueryError> {
    let conn = Connection::open(path).map_err(|e| QueryError::Backend(e.to_string()))?;
    conn.execute_batch(SCHEMA_DDL)
        .map_err(|e| QueryError::Backend(e.to_string()))?;
    tracing::info!(path = %path.display(), "flights schema ready");
    Ok(())
}
