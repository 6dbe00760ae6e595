use crate::domain::model::Food;
use crate::domain::ports::{FoodStore, Storage, StoredFood};
use crate::utils::error::{FdcError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

const FOODS_DIR: &str = "foods";

/// 每筆食物一個 JSON 文件：`foods/<fdc_id>.json`
#[derive(Debug, Clone)]
pub struct FileFoodStore<S: Storage> {
    storage: S,
}

impl<S: Storage> FileFoodStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    fn path_for(fdc_id: u32) -> String {
        format!("{}/{}.json", FOODS_DIR, fdc_id)
    }

    async fn stored_ids(&self) -> Result<Vec<u32>> {
        Ok(self
            .storage
            .list_files(FOODS_DIR)
            .await?
            .iter()
            .filter_map(|name| name.strip_suffix(".json"))
            .filter_map(|stem| stem.parse().ok())
            .collect())
    }
}

#[async_trait]
impl<S: Storage> FoodStore for FileFoodStore<S> {
    async fn load_food(&self, fdc_id: u32) -> Result<Option<StoredFood>> {
        match self.storage.read_file(&Self::path_for(fdc_id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(FdcError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn save_food(&self, food: &Food) -> Result<StoredFood> {
        let stored = StoredFood::new(food.clone());
        let bytes = serde_json::to_vec_pretty(&stored)?;
        self.storage
            .write_file(&Self::path_for(food.fdc_id), &bytes)
            .await?;
        Ok(stored)
    }

    async fn stale_food_ids(&self, older_than: DateTime<Utc>, limit: usize) -> Result<Vec<u32>> {
        let mut stale = Vec::new();
        for id in self.stored_ids().await? {
            if let Some(stored) = self.load_food(id).await? {
                if stored.updated_at < older_than {
                    stale.push((stored.updated_at, id));
                }
            }
        }
        stale.sort();
        Ok(stale.into_iter().take(limit).map(|(_, id)| id).collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.stored_ids().await?.len())
    }
}
