//! SQLite 版的食物快取儲存（feature `sqlite`）
//!
//! 三張表：`fdc_food`、`fdc_nutrient`、`fdc_portion`。儲存一筆食物時在同一個交易內
//! 取代它的營養素與份量。

use crate::domain::model::{Food, FoodPortion, Nutrient};
use crate::domain::ports::{FoodStore, StoredFood};
use crate::utils::error::{FdcError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;

const SCHEMA: [&str; 5] = [
    r"
    CREATE TABLE IF NOT EXISTS fdc_food (
        fdc_id INTEGER PRIMARY KEY,
        description TEXT NOT NULL,
        data_type TEXT NOT NULL,
        publication_date TEXT,
        food_class TEXT,
        food_category TEXT,
        scientific_name TEXT,
        brand_owner TEXT,
        brand_name TEXT,
        ingredients TEXT,
        serving_size REAL,
        serving_size_unit TEXT,
        household_serving_fulltext TEXT,
        updated_at TEXT NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS fdc_nutrient (
        fdc_id INTEGER NOT NULL REFERENCES fdc_food(fdc_id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        nutrient_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        amount REAL NOT NULL,
        unit_name TEXT NOT NULL,
        nutrient_nbr TEXT,
        rank INTEGER,
        PRIMARY KEY (fdc_id, position)
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS fdc_portion (
        fdc_id INTEGER NOT NULL REFERENCES fdc_food(fdc_id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        portion_id INTEGER NOT NULL,
        amount REAL NOT NULL,
        gram_weight REAL NOT NULL,
        portion_description TEXT,
        modifier TEXT,
        measure_unit TEXT,
        PRIMARY KEY (fdc_id, position)
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_fdc_food_updated_at ON fdc_food(updated_at)",
    "CREATE INDEX IF NOT EXISTS idx_fdc_food_description ON fdc_food(description)",
];

#[derive(Debug, Clone)]
pub struct SqliteFoodStore {
    pool: SqlitePool,
}

impl SqliteFoodStore {
    /// 連線並建立資料表；`sqlite::memory:` 可用於測試
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| FdcError::database(format!("Invalid database URL: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true);

        // 記憶體資料庫每條連線各自獨立，只開一條
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| FdcError::database(format!("Failed to open database: {e}")))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| FdcError::database(format!("Failed to create schema: {e}")))?;
        }
        Ok(())
    }

    async fn load_nutrients(&self, fdc_id: u32) -> Result<Vec<Nutrient>> {
        let rows = sqlx::query(
            r"
            SELECT nutrient_id, name, amount, unit_name, nutrient_nbr, rank
            FROM fdc_nutrient
            WHERE fdc_id = ?1
            ORDER BY position
            ",
        )
        .bind(i64::from(fdc_id))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| FdcError::database(format!("Failed to load nutrients: {e}")))?;

        Ok(rows
            .iter()
            .map(|row| Nutrient {
                id: row.get::<i64, _>("nutrient_id") as u32,
                name: row.get("name"),
                amount: row.get("amount"),
                unit_name: row.get("unit_name"),
                nutrient_nbr: row.get("nutrient_nbr"),
                rank: row.get::<Option<i64>, _>("rank").map(|r| r as u32),
            })
            .collect())
    }

    async fn load_portions(&self, fdc_id: u32) -> Result<Vec<FoodPortion>> {
        let rows = sqlx::query(
            r"
            SELECT portion_id, amount, gram_weight, portion_description, modifier, measure_unit
            FROM fdc_portion
            WHERE fdc_id = ?1
            ORDER BY position
            ",
        )
        .bind(i64::from(fdc_id))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| FdcError::database(format!("Failed to load portions: {e}")))?;

        Ok(rows
            .iter()
            .map(|row| FoodPortion {
                id: row.get::<i64, _>("portion_id") as u32,
                amount: row.get("amount"),
                gram_weight: row.get("gram_weight"),
                portion_description: row.get("portion_description"),
                modifier: row.get("modifier"),
                measure_unit: row.get("measure_unit"),
            })
            .collect())
    }
}

/// 固定寬度的 RFC 3339，字串排序即時間排序
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn food_from_row(row: &SqliteRow) -> (Food, DateTime<Utc>) {
    let publication_date: Option<String> = row.get("publication_date");
    let updated_at_str: String = row.get("updated_at");
    let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
        .map_or_else(|_| DateTime::<Utc>::MIN_UTC, |dt| dt.with_timezone(&Utc));

    let food = Food {
        fdc_id: row.get::<i64, _>("fdc_id") as u32,
        description: row.get("description"),
        data_type: row.get("data_type"),
        publication_date: publication_date
            .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        food_class: row.get("food_class"),
        food_category: row.get("food_category"),
        scientific_name: row.get("scientific_name"),
        brand_owner: row.get("brand_owner"),
        brand_name: row.get("brand_name"),
        ingredients: row.get("ingredients"),
        serving_size: row.get("serving_size"),
        serving_size_unit: row.get("serving_size_unit"),
        household_serving_fulltext: row.get("household_serving_fulltext"),
        nutrients: Vec::new(),
        food_portions: Vec::new(),
    };
    (food, updated_at)
}

#[async_trait]
impl FoodStore for SqliteFoodStore {
    async fn load_food(&self, fdc_id: u32) -> Result<Option<StoredFood>> {
        let row = sqlx::query(
            r"
            SELECT fdc_id, description, data_type, publication_date, food_class, food_category,
                   scientific_name, brand_owner, brand_name, ingredients, serving_size,
                   serving_size_unit, household_serving_fulltext, updated_at
            FROM fdc_food
            WHERE fdc_id = ?1
            ",
        )
        .bind(i64::from(fdc_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| FdcError::database(format!("Failed to load food: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let (mut food, updated_at) = food_from_row(&row);
        food.nutrients = self.load_nutrients(fdc_id).await?;
        food.food_portions = self.load_portions(fdc_id).await?;
        Ok(Some(StoredFood { food, updated_at }))
    }

    async fn save_food(&self, food: &Food) -> Result<StoredFood> {
        let stored = StoredFood::new(food.clone());
        let now = timestamp(stored.updated_at);
        let fdc_id = i64::from(food.fdc_id);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| FdcError::database(format!("Failed to begin transaction: {e}")))?;

        sqlx::query(
            r"
            INSERT INTO fdc_food (
                fdc_id, description, data_type, publication_date, food_class, food_category,
                scientific_name, brand_owner, brand_name, ingredients, serving_size,
                serving_size_unit, household_serving_fulltext, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT(fdc_id) DO UPDATE SET
                description = ?2,
                data_type = ?3,
                publication_date = ?4,
                food_class = ?5,
                food_category = ?6,
                scientific_name = ?7,
                brand_owner = ?8,
                brand_name = ?9,
                ingredients = ?10,
                serving_size = ?11,
                serving_size_unit = ?12,
                household_serving_fulltext = ?13,
                updated_at = ?14
            ",
        )
        .bind(fdc_id)
        .bind(&food.description)
        .bind(&food.data_type)
        .bind(food.publication_date.map(|d| d.format("%Y-%m-%d").to_string()))
        .bind(&food.food_class)
        .bind(&food.food_category)
        .bind(&food.scientific_name)
        .bind(&food.brand_owner)
        .bind(&food.brand_name)
        .bind(&food.ingredients)
        .bind(food.serving_size)
        .bind(&food.serving_size_unit)
        .bind(&food.household_serving_fulltext)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| FdcError::database(format!("Failed to save food: {e}")))?;

        for table in ["fdc_nutrient", "fdc_portion"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE fdc_id = ?1"))
                .bind(fdc_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| FdcError::database(format!("Failed to clear {table}: {e}")))?;
        }

        for (position, nutrient) in food.nutrients.iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO fdc_nutrient
                    (fdc_id, position, nutrient_id, name, amount, unit_name, nutrient_nbr, rank)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ",
            )
            .bind(fdc_id)
            .bind(position as i64)
            .bind(i64::from(nutrient.id))
            .bind(&nutrient.name)
            .bind(nutrient.amount)
            .bind(&nutrient.unit_name)
            .bind(&nutrient.nutrient_nbr)
            .bind(nutrient.rank.map(i64::from))
            .execute(&mut *tx)
            .await
            .map_err(|e| FdcError::database(format!("Failed to save nutrient: {e}")))?;
        }

        for (position, portion) in food.food_portions.iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO fdc_portion
                    (fdc_id, position, portion_id, amount, gram_weight, portion_description,
                     modifier, measure_unit)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ",
            )
            .bind(fdc_id)
            .bind(position as i64)
            .bind(i64::from(portion.id))
            .bind(portion.amount)
            .bind(portion.gram_weight)
            .bind(&portion.portion_description)
            .bind(&portion.modifier)
            .bind(&portion.measure_unit)
            .execute(&mut *tx)
            .await
            .map_err(|e| FdcError::database(format!("Failed to save portion: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| FdcError::database(format!("Failed to commit food: {e}")))?;

        Ok(stored)
    }

    async fn stale_food_ids(&self, older_than: DateTime<Utc>, limit: usize) -> Result<Vec<u32>> {
        let rows = sqlx::query(
            r"
            SELECT fdc_id FROM fdc_food
            WHERE updated_at < ?1
            ORDER BY updated_at
            LIMIT ?2
            ",
        )
        .bind(timestamp(older_than))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| FdcError::database(format!("Failed to query stale foods: {e}")))?;

        Ok(rows
            .iter()
            .map(|row| row.get::<i64, _>("fdc_id") as u32)
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM fdc_food")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| FdcError::database(format!("Failed to count foods: {e}")))?;
        Ok(row.get::<i64, _>("total") as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_food() -> Food {
        Food {
            publication_date: NaiveDate::from_ymd_opt(2019, 4, 1),
            food_category: Some("Fruits and Fruit Juices".to_string()),
            ..Food::new(171688, "Apples, raw, with skin", "SR Legacy")
        }
        .with_nutrients(vec![
            Nutrient::new(1003, "Protein", 0.26, "g"),
            Nutrient::new(1008, "Energy", 52.0, "kcal"),
        ])
        .with_portions(vec![FoodPortion {
            id: 1,
            amount: 1.0,
            gram_weight: 125.0,
            modifier: Some("cup, quartered or chopped".to_string()),
            ..Default::default()
        }])
    }

    #[tokio::test]
    async fn test_round_trip_and_replace() {
        let store = SqliteFoodStore::connect("sqlite::memory:").await.unwrap();
        let mut food = sample_food();
        store.save_food(&food).await.unwrap();

        let loaded = store.load_food(171688).await.unwrap().unwrap();
        assert_eq!(loaded.food, food);

        food.nutrients.truncate(1);
        food.description = "Apples, raw".to_string();
        store.save_food(&food).await.unwrap();

        let loaded = store.load_food(171688).await.unwrap().unwrap();
        assert_eq!(loaded.food.nutrients.len(), 1);
        assert_eq!(loaded.food.description, "Apples, raw");
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.load_food(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_food_ids() {
        let store = SqliteFoodStore::connect("sqlite::memory:").await.unwrap();
        store.save_food(&sample_food()).await.unwrap();

        let future = Utc::now() + chrono::Duration::minutes(1);
        assert_eq!(store.stale_food_ids(future, 10).await.unwrap(), vec![171688]);
        let past = Utc::now() - chrono::Duration::days(1);
        assert!(store.stale_food_ids(past, 10).await.unwrap().is_empty());
    }
}
