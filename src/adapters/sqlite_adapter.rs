//! SQLite market data adapter.

use crate::domain::error::BreadthtraderError;
use crate::domain::observation::Observation;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn source_error(e: impl std::fmt::Display) -> BreadthtraderError {
    BreadthtraderError::DataSource {
        reason: e.to_string(),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, BreadthtraderError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| source_error(format!("invalid date {}: {}", s, e)))
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, BreadthtraderError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| BreadthtraderError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(db_path.trim());
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(source_error)?;

        Ok(Self { pool })
    }

    /// Single-connection in-memory database, so every query sees the same data.
    pub fn in_memory() -> Result<Self, BreadthtraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(source_error)?;

        Ok(Self { pool })
    }

    fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>, BreadthtraderError> {
        self.pool.get().map_err(source_error)
    }

    pub fn initialize_schema(&self) -> Result<(), BreadthtraderError> {
        let conn = self.connection()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS observations (
                asset TEXT NOT NULL,
                date TEXT NOT NULL,
                close REAL,
                is_liquid REAL,
                PRIMARY KEY (asset, date)
            );
            CREATE INDEX IF NOT EXISTS idx_observations_date ON observations(date);",
        )
        .map_err(source_error)?;

        Ok(())
    }

    pub fn insert_observations(
        &self,
        observations: &[Observation],
    ) -> Result<(), BreadthtraderError> {
        let mut conn = self.connection()?;
        let tx = conn.transaction().map_err(source_error)?;

        for obs in observations {
            tx.execute(
                "INSERT OR REPLACE INTO observations (asset, date, close, is_liquid)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    obs.asset,
                    obs.date.format("%Y-%m-%d").to_string(),
                    obs.close,
                    obs.is_liquid
                ],
            )
            .map_err(source_error)?;
        }

        tx.commit().map_err(source_error)?;
        Ok(())
    }
}

impl DataPort for SqliteAdapter {
    fn fetch_observations(
        &self,
        asset: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<Observation>, BreadthtraderError> {
        let conn = self.connection()?;

        let start_str = start_date.map(|d| d.format("%Y-%m-%d").to_string());
        let end_str = end_date.map(|d| d.format("%Y-%m-%d").to_string());

        let mut stmt = conn
            .prepare(
                "SELECT date, close, is_liquid
                 FROM observations
                 WHERE asset = ?1
                   AND (?2 IS NULL OR date >= ?2)
                   AND (?3 IS NULL OR date <= ?3)
                 ORDER BY date ASC",
            )
            .map_err(source_error)?;

        let rows = stmt
            .query_map(params![asset, start_str, end_str], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<f64>>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                ))
            })
            .map_err(source_error)?;

        let mut observations = Vec::new();
        for row in rows {
            let (date_str, close, is_liquid) = row.map_err(source_error)?;
            observations.push(Observation::new(
                asset,
                parse_date(&date_str)?,
                close,
                is_liquid,
            ));
        }

        Ok(observations)
    }

    fn list_assets(&self) -> Result<Vec<String>, BreadthtraderError> {
        let conn = self.connection()?;

        let mut stmt = conn
            .prepare("SELECT DISTINCT asset FROM observations ORDER BY asset")
            .map_err(source_error)?;

        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(source_error)?;

        let mut assets = Vec::new();
        for row in rows {
            assets.push(row.map_err(source_error)?);
        }

        Ok(assets)
    }

    fn get_data_range(
        &self,
        asset: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, BreadthtraderError> {
        let conn = self.connection()?;

        let result: (Option<String>, Option<String>, i64) = conn
            .query_row(
                "SELECT MIN(date), MAX(date), COUNT(*) FROM observations WHERE asset = ?1",
                params![asset],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(source_error)?;

        match result {
            (Some(min_str), Some(max_str), count) if count > 0 => Ok(Some((
                parse_date(&min_str)?,
                parse_date(&max_str)?,
                count as usize,
            ))),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyConfig;

    impl ConfigPort for EmptyConfig {
        fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
        fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
            default
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn seeded() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
            .insert_observations(&[
                Observation::new("SPY", d(2), Some(470.0), Some(1.0)),
                Observation::new("SPY", d(3), None, Some(0.0)),
                Observation::new("SPY", d(5), Some(472.5), None),
                Observation::new("QQQ", d(2), Some(400.0), Some(1.0)),
            ])
            .unwrap();
        adapter
    }

    #[test]
    fn from_config_missing_path() {
        match SqliteAdapter::from_config(&EmptyConfig) {
            Err(BreadthtraderError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn fetch_returns_rows_with_gaps() {
        let adapter = seeded();
        let rows = adapter.fetch_observations("SPY", None, None).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], Observation::new("SPY", d(2), Some(470.0), Some(1.0)));
        assert_eq!(rows[1].close, None);
        assert_eq!(rows[2].is_liquid, None);
    }

    #[test]
    fn fetch_respects_date_bounds() {
        let adapter = seeded();
        let rows = adapter
            .fetch_observations("SPY", Some(d(3)), Some(d(4)))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, d(3));

        let open_start = adapter.fetch_observations("SPY", None, Some(d(3))).unwrap();
        assert_eq!(open_start.len(), 2);
    }

    #[test]
    fn unknown_asset_has_no_rows() {
        let adapter = seeded();
        assert!(adapter.fetch_observations("IWM", None, None).unwrap().is_empty());
        assert_eq!(adapter.get_data_range("IWM").unwrap(), None);
    }

    #[test]
    fn lists_assets_sorted() {
        assert_eq!(seeded().list_assets().unwrap(), vec!["QQQ", "SPY"]);
    }

    #[test]
    fn data_range_reports_bounds_and_count() {
        assert_eq!(
            seeded().get_data_range("SPY").unwrap(),
            Some((d(2), d(5), 3))
        );
    }
}
