use crate::domain::model::{Food, Nutrient, SearchResult, SearchResultFood};
use crate::domain::query::{FoodOptions, ListQuery, SearchQuery};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 位元組層級的檔案儲存（本機目錄等）
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// 列出目錄下的檔名（不含子目錄），目錄不存在時回傳空清單
    fn list_files(
        &self,
        dir: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;
}

/// 食物資料來源：FDC API 或包在外層的快取
#[async_trait]
pub trait FoodSource: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResult>;
    async fn get_food(&self, fdc_id: u32, options: &FoodOptions) -> Result<Food>;
    async fn get_foods(&self, fdc_ids: &[u32], options: &FoodOptions) -> Result<Vec<Food>>;
    async fn list_foods(&self, query: &ListQuery) -> Result<Vec<Food>>;

    async fn get_nutrients(&self, fdc_id: u32) -> Result<Vec<Nutrient>> {
        let food = self.get_food(fdc_id, &FoodOptions::default()).await?;
        Ok(food.nutrients)
    }

    /// 逐頁搜尋直到最後一頁、空頁或達到 `max_results`
    async fn search_all(
        &self,
        query: &SearchQuery,
        max_results: Option<usize>,
    ) -> Result<Vec<SearchResultFood>> {
        let mut page = query.clone();
        let mut foods = Vec::new();

        loop {
            let result = self.search(&page).await?;
            let fetched = result.foods.len();
            let last_page = result.is_last_page();
            foods.extend(result.foods);

            if let Some(max) = max_results {
                if foods.len() >= max {
                    foods.truncate(max);
                    break;
                }
            }
            if fetched == 0 || last_page {
                break;
            }
            page.page_number += 1;
        }

        Ok(foods)
    }

    /// 逐頁列出食物直到短頁或達到 `limit`
    async fn list_all(&self, query: &ListQuery, limit: Option<usize>) -> Result<Vec<Food>> {
        let mut page = query.clone();
        let mut foods = Vec::new();

        loop {
            let batch = self.list_foods(&page).await?;
            let fetched = batch.len();
            foods.extend(batch);

            if let Some(limit) = limit {
                if foods.len() >= limit {
                    foods.truncate(limit);
                    break;
                }
            }
            if fetched < page.page_size as usize {
                break;
            }
            page.page_number += 1;
        }

        Ok(foods)
    }
}

/// 持久化的食物與其更新時間
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFood {
    pub food: Food,
    pub updated_at: DateTime<Utc>,
}

impl StoredFood {
    pub fn new(food: Food) -> Self {
        Self {
            food,
            updated_at: Utc::now(),
        }
    }

    pub fn is_stale(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        now - self.updated_at > ttl
    }
}

/// 快取層使用的持久化介面
#[async_trait]
pub trait FoodStore: Send + Sync {
    async fn load_food(&self, fdc_id: u32) -> Result<Option<StoredFood>>;

    async fn load_foods(&self, fdc_ids: &[u32]) -> Result<Vec<StoredFood>> {
        let mut stored = Vec::with_capacity(fdc_ids.len());
        for id in fdc_ids {
            if let Some(food) = self.load_food(*id).await? {
                stored.push(food);
            }
        }
        Ok(stored)
    }

    async fn save_food(&self, food: &Food) -> Result<StoredFood>;

    /// 更新時間早於 `older_than` 的食物編號，最舊的優先
    async fn stale_food_ids(&self, older_than: DateTime<Utc>, limit: usize) -> Result<Vec<u32>>;

    async fn count(&self) -> Result<usize>;
}
