use anyhow::{Context, Result};
use plantcare_sensors::{PotId, PotRecord, ReadingHistory, SensorReading};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{FromRow, Pool, Sqlite};
use std::str::FromStr;
use time::OffsetDateTime;

#[derive(Clone)]
pub struct Db {
    pool: Pool<Sqlite>,
}

#[derive(FromRow)]
struct PotRow {
    pot_id: i64,
    name: String,
    plant_name: Option<String>,
    light_exposure: Option<String>,
    moisture_profile: Option<String>,
    soil_ph: Option<String>,
}

impl From<PotRow> for PotRecord {
    fn from(r: PotRow) -> Self {
        PotRecord {
            id: r.pot_id,
            name: r.name,
            plant_name: r.plant_name,
            light_exposure: r.light_exposure,
            moisture_profile: r.moisture_profile,
            soil_ph: r.soil_ph,
        }
    }
}

#[derive(FromRow)]
struct ReadingRow {
    pot_id: i64,
    ts: i64,
    watering_ts: Option<i64>,
    temperature_celsius: f64,
    light_intensity_lux: f64,
    soil_moisture: f64,
    soil_ph: f64,
}

impl TryFrom<ReadingRow> for SensorReading {
    type Error = anyhow::Error;

    fn try_from(r: ReadingRow) -> Result<Self> {
        let at = |ts: i64| {
            OffsetDateTime::from_unix_timestamp(ts)
                .with_context(|| format!("reading timestamp out of range: {ts}"))
        };
        Ok(SensorReading {
            pot_id: r.pot_id,
            timestamp: at(r.ts)?,
            watering_timestamp: r.watering_ts.map(at).transpose()?,
            temperature_celsius: r.temperature_celsius,
            light_intensity_lux: r.light_intensity_lux,
            soil_moisture: r.soil_moisture,
            soil_ph: r.soil_ph,
        })
    }
}

const READING_COLUMNS: &str = "pot_id, ts, watering_ts, temperature_celsius, \
                               light_intensity_lux, soil_moisture, soil_ph";

impl Db {
    /// db_url examples:
    /// - "sqlite:/home/pi/plantcare/plantcare.db"
    /// - "sqlite::memory:" (tests)
    pub async fn connect(db_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(db_url)
            .with_context(|| format!("invalid sqlite connection string: {db_url}"))?
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to connect to sqlite db: {db_url}"))?;

        Ok(Self { pool })
    }

    /// Runs SQLx migrations from ./migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("failed to run migrations")?;
        Ok(())
    }

    // ----------------------------
    // Pots
    // ----------------------------

    pub async fn upsert_pot(&self, p: &PotRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO pots (pot_id, name, plant_name, light_exposure, moisture_profile, soil_ph)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(pot_id) DO UPDATE SET
              name=excluded.name,
              plant_name=excluded.plant_name,
              light_exposure=excluded.light_exposure,
              moisture_profile=excluded.moisture_profile,
              soil_ph=excluded.soil_ph
            "#,
        )
        .bind(p.id)
        .bind(&p.name)
        .bind(&p.plant_name)
        .bind(&p.light_exposure)
        .bind(&p.moisture_profile)
        .bind(&p.soil_ph)
        .execute(&self.pool)
        .await
        .context("upsert_pot failed")?;
        Ok(())
    }

    pub async fn load_pots(&self) -> Result<Vec<PotRecord>> {
        let rows: Vec<PotRow> = sqlx::query_as(
            r#"
            SELECT pot_id, name, plant_name, light_exposure, moisture_profile, soil_ph
            FROM pots
            ORDER BY pot_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("load_pots failed")?;

        Ok(rows.into_iter().map(PotRecord::from).collect())
    }

    pub async fn get_pot(&self, pot_id: PotId) -> Result<Option<PotRecord>> {
        let row: Option<PotRow> = sqlx::query_as(
            r#"
            SELECT pot_id, name, plant_name, light_exposure, moisture_profile, soil_ph
            FROM pots
            WHERE pot_id = ?
            "#,
        )
        .bind(pot_id)
        .fetch_optional(&self.pool)
        .await
        .context("get_pot failed")?;

        Ok(row.map(PotRecord::from))
    }

    /// Delete a pot and, with it, all of its readings.  Returns false if the
    /// pot did not exist.
    pub async fn delete_pot(&self, pot_id: PotId) -> Result<bool> {
        let mut tx = self.pool.begin().await.context("delete_pot: begin failed")?;

        sqlx::query("DELETE FROM readings WHERE pot_id = ?")
            .bind(pot_id)
            .execute(&mut *tx)
            .await
            .context("delete_pot: deleting readings failed")?;

        let deleted = sqlx::query("DELETE FROM pots WHERE pot_id = ?")
            .bind(pot_id)
            .execute(&mut *tx)
            .await
            .context("delete_pot: deleting pot failed")?
            .rows_affected();

        tx.commit().await.context("delete_pot: commit failed")?;
        Ok(deleted > 0)
    }

    // ----------------------------
    // Readings
    // ----------------------------

    async fn fetch_readings(&self, sql: &str, pot_id: PotId) -> Result<Vec<SensorReading>> {
        let rows: Vec<ReadingRow> = sqlx::query_as(sql)
            .bind(pot_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(SensorReading::try_from).collect()
    }
}

impl ReadingHistory for Db {
    async fn append(&self, r: &SensorReading) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO readings (
              pot_id, ts, watering_ts,
              temperature_celsius, light_intensity_lux, soil_moisture, soil_ph
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(r.pot_id)
        .bind(r.timestamp.unix_timestamp())
        .bind(r.watering_timestamp.map(|t| t.unix_timestamp()))
        .bind(r.temperature_celsius)
        .bind(r.light_intensity_lux)
        .bind(r.soil_moisture)
        .bind(r.soil_ph)
        .execute(&self.pool)
        .await
        .with_context(|| format!("insert_reading failed pot={}", r.pot_id))?;
        Ok(())
    }

    async fn most_recent(&self, pot_id: PotId) -> Result<Option<SensorReading>> {
        let sql = format!(
            "SELECT {READING_COLUMNS} FROM readings WHERE pot_id = ? \
             ORDER BY ts DESC, id DESC LIMIT 1"
        );
        let rows = self
            .fetch_readings(&sql, pot_id)
            .await
            .context("most_recent failed")?;
        Ok(rows.into_iter().next())
    }

    async fn most_recent_watering(&self, pot_id: PotId) -> Result<Option<SensorReading>> {
        let sql = format!(
            "SELECT {READING_COLUMNS} FROM readings \
             WHERE pot_id = ? AND watering_ts IS NOT NULL \
             ORDER BY watering_ts DESC, id DESC LIMIT 1"
        );
        let rows = self
            .fetch_readings(&sql, pot_id)
            .await
            .context("most_recent_watering failed")?;
        Ok(rows.into_iter().next())
    }

    async fn series(&self, pot_id: PotId) -> Result<Vec<SensorReading>> {
        let sql = format!(
            "SELECT {READING_COLUMNS} FROM readings WHERE pot_id = ? ORDER BY ts, id"
        );
        self.fetch_readings(&sql, pot_id)
            .await
            .context("series failed")
    }

    async fn delete_all(&self, pot_id: PotId) -> Result<u64> {
        let res = sqlx::query("DELETE FROM readings WHERE pot_id = ?")
            .bind(pot_id)
            .execute(&self.pool)
            .await
            .context("delete_all failed")?;
        Ok(res.rows_affected())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use time::macros::datetime;
    use time::Duration;

    pub(crate) fn pot(id: PotId, name: &str) -> PotRecord {
        PotRecord {
            id,
            name: name.into(),
            plant_name: Some("Monstera".into()),
            light_exposure: Some("Indirect sunlight".into()),
            moisture_profile: Some("Normal".into()),
            soil_ph: Some("6.0 - 7.0".into()),
        }
    }

    pub(crate) async fn test_db() -> Db {
        let db = Db::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    fn reading(pot_id: PotId, ts: OffsetDateTime, moisture: f64) -> SensorReading {
        SensorReading {
            pot_id,
            timestamp: ts,
            watering_timestamp: None,
            temperature_celsius: 19.5,
            light_intensity_lux: 1234.56,
            soil_moisture: moisture,
            soil_ph: 6.42,
        }
    }

    const T0: OffsetDateTime = datetime!(2024-06-01 08:00 UTC);

    #[tokio::test]
    async fn upsert_and_load_pots() {
        let db = test_db().await;
        db.upsert_pot(&pot(2, "Window")).await.unwrap();
        db.upsert_pot(&pot(1, "Kitchen")).await.unwrap();

        let mut renamed = pot(2, "Window sill");
        renamed.soil_ph = None;
        db.upsert_pot(&renamed).await.unwrap();

        let pots = db.load_pots().await.unwrap();
        assert_eq!(pots.len(), 2);
        assert_eq!(pots[0].id, 1);
        assert_eq!(pots[1], renamed);
        assert_eq!(db.get_pot(1).await.unwrap(), Some(pot(1, "Kitchen")));
        assert_eq!(db.get_pot(9).await.unwrap(), None);
    }

    #[tokio::test]
    async fn readings_round_trip_in_order() {
        let db = test_db().await;
        db.upsert_pot(&pot(1, "Kitchen")).await.unwrap();

        let mut watered = reading(1, T0 + Duration::hours(1), 8.0);
        watered.watering_timestamp = Some(watered.timestamp);
        db.append(&reading(1, T0 + Duration::hours(2), 7.5)).await.unwrap();
        db.append(&reading(1, T0, 7.0)).await.unwrap();
        db.append(&watered).await.unwrap();

        let series = db.series(1).await.unwrap();
        let moisture: Vec<f64> = series.iter().map(|r| r.soil_moisture).collect();
        assert_eq!(moisture, vec![7.0, 8.0, 7.5]);
        assert_eq!(series[1], watered);

        assert_eq!(db.most_recent(1).await.unwrap().unwrap().soil_moisture, 7.5);
        assert_eq!(db.most_recent_watering(1).await.unwrap(), Some(watered));
    }

    #[tokio::test]
    async fn ties_go_to_latest_insert() {
        let db = test_db().await;
        db.upsert_pot(&pot(1, "Kitchen")).await.unwrap();
        db.append(&reading(1, T0, 7.0)).await.unwrap();
        db.append(&reading(1, T0, 6.0)).await.unwrap();
        assert_eq!(db.most_recent(1).await.unwrap().unwrap().soil_moisture, 6.0);
    }

    #[tokio::test]
    async fn empty_history_queries() {
        let db = test_db().await;
        db.upsert_pot(&pot(1, "Kitchen")).await.unwrap();
        assert_eq!(db.most_recent(1).await.unwrap(), None);
        assert_eq!(db.most_recent_watering(1).await.unwrap(), None);
        assert!(db.series(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_for_unknown_pot_fails() {
        let db = test_db().await;
        assert!(db.append(&reading(42, T0, 7.0)).await.is_err());
    }

    #[tokio::test]
    async fn delete_pot_cascades_readings() {
        let db = test_db().await;
        db.upsert_pot(&pot(1, "Kitchen")).await.unwrap();
        db.upsert_pot(&pot(2, "Window")).await.unwrap();
        db.append(&reading(1, T0, 7.0)).await.unwrap();
        db.append(&reading(2, T0, 3.0)).await.unwrap();

        assert!(db.delete_pot(1).await.unwrap());
        assert!(!db.delete_pot(1).await.unwrap());
        assert!(db.series(1).await.unwrap().is_empty());
        assert_eq!(db.series(2).await.unwrap().len(), 1);
        assert_eq!(db.get_pot(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_all_keeps_pot() {
        let db = test_db().await;
        db.upsert_pot(&pot(1, "Kitchen")).await.unwrap();
        db.append(&reading(1, T0, 7.0)).await.unwrap();
        assert_eq!(db.delete_all(1).await.unwrap(), 1);
        assert!(db.get_pot(1).await.unwrap().is_some());
    }
}
