use crate::config::{ClientSettings, MAX_CACHE_TTL_SECS};
use crate::domain::model::{Food, SearchResult};
use crate::domain::ports::{FoodSource, FoodStore, StoredFood};
use crate::domain::query::{FoodOptions, ListQuery, SearchQuery, MAX_PAGE_SIZE};
use crate::utils::error::{FdcError, Result};
use async_trait::async_trait;
use chrono::Utc;
use moka::future::Cache;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_SEARCH_ENTRIES: u64 = 1_000;

#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl: Duration,
    pub max_search_entries: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(crate::config::DEFAULT_CACHE_TTL_SECS),
            max_search_entries: DEFAULT_MAX_SEARCH_ENTRIES,
        }
    }
}

impl From<&ClientSettings> for CacheSettings {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            enabled: settings.cache_enabled,
            ttl: Duration::from_secs(settings.cache_ttl_seconds),
            ..Self::default()
        }
    }
}

/// 快取維護工作的統計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheTaskReport {
    pub requested: usize,
    pub stored: usize,
    pub skipped: usize,
    pub failed_batches: usize,
}

/// 讀穿式快取：搜尋結果放記憶體，食物細節放 `FoodStore`
///
/// 只有 full 格式且未過濾營養素的請求會走快取，其他選項直接轉給來源。
pub struct FdcCache<F: FoodSource, St: FoodStore> {
    source: F,
    store: St,
    settings: CacheSettings,
    searches: Cache<String, SearchResult>,
}

impl<F: FoodSource, St: FoodStore> FdcCache<F, St> {
    pub fn new(source: F, store: St, mut settings: CacheSettings) -> Self {
        // moka 與 chrono 都無法處理過大的存活時間
        let max_ttl = Duration::from_secs(MAX_CACHE_TTL_SECS);
        if settings.ttl > max_ttl {
            warn!("⚠️ Cache TTL {:?} exceeds limit, clamping to {:?}", settings.ttl, max_ttl);
            settings.ttl = max_ttl;
        }
        let searches = Cache::builder()
            .max_capacity(settings.max_search_entries)
            .time_to_live(settings.ttl)
            .build();

        Self {
            source,
            store,
            settings,
            searches,
        }
    }

    pub fn source(&self) -> &F {
        &self.source
    }

    pub fn store(&self) -> &St {
        &self.store
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.settings.ttl.as_secs() as i64)
    }

    fn is_fresh(&self, stored: &StoredFood) -> bool {
        !stored.is_stale(self.ttl(), Utc::now())
    }

    fn cacheable(&self, options: &FoodOptions) -> bool {
        self.settings.enabled && *options == FoodOptions::default()
    }

    /// `force_refresh` 時略過快取讀取，但仍會寫回
    pub async fn get_food_with(
        &self,
        fdc_id: u32,
        options: &FoodOptions,
        force_refresh: bool,
    ) -> Result<Food> {
        if !self.cacheable(options) {
            return self.source.get_food(fdc_id, options).await;
        }

        if !force_refresh {
            if let Some(stored) = self.store.load_food(fdc_id).await? {
                if self.is_fresh(&stored) {
                    debug!("💾 cache hit for food {}", fdc_id);
                    return Ok(stored.food);
                }
                debug!("⌛ cached food {} is stale", fdc_id);
            }
        }

        let food = self.source.get_food(fdc_id, options).await?;
        self.store.save_food(&food).await?;
        Ok(food)
    }

    /// 重新抓取並寫回指定的食物
    pub async fn refresh(&self, fdc_ids: &[u32]) -> Result<Vec<Food>> {
        let foods = self
            .source
            .get_foods(fdc_ids, &FoodOptions::default())
            .await?;
        for food in &foods {
            self.store.save_food(food).await?;
        }
        Ok(foods)
    }

    /// 更新超過 `max_age` 未更新的食物
    pub async fn refresh_stale(
        &self,
        max_age: chrono::Duration,
        limit: usize,
        batch_size: usize,
    ) -> Result<CacheTaskReport> {
        let older_than = Utc::now() - max_age;
        let ids = self.store.stale_food_ids(older_than, limit).await?;
        info!("🔄 refreshing {} stale foods", ids.len());
        self.store_in_batches(&ids, batch_size).await
    }

    /// 依資料類型列出食物並預先快取
    pub async fn warm(
        &self,
        data_types: &[String],
        limit: usize,
        batch_size: usize,
    ) -> Result<CacheTaskReport> {
        let page_size = (limit.clamp(1, MAX_PAGE_SIZE as usize)) as u32;
        let query = ListQuery::default()
            .data_types(data_types.iter().cloned())
            .page_size(page_size);
        let listed = self.source.list_all(&query, Some(limit)).await?;
        let ids: Vec<u32> = listed.iter().map(|f| f.fdc_id).collect();

        let missing = self.missing_ids(&ids).await?;
        info!(
            "🔥 warming cache: {} listed, {} not cached",
            ids.len(),
            missing.len()
        );
        let mut report = self.store_in_batches(&missing, batch_size).await?;
        report.requested = ids.len();
        report.skipped = ids.len() - missing.len();
        Ok(report)
    }

    /// 把搜尋結果的食物匯入快取；`force` 時連已快取的也重抓
    pub async fn import_search(
        &self,
        query: &SearchQuery,
        limit: usize,
        force: bool,
        batch_size: usize,
    ) -> Result<CacheTaskReport> {
        let hits = self.source.search_all(query, Some(limit)).await?;
        let ids: Vec<u32> = hits.iter().map(|f| f.fdc_id).collect();
        info!("📥 importing {} foods for '{}'", ids.len(), query.query);
        self.import_foods(&ids, force, batch_size).await
    }

    pub async fn import_foods(
        &self,
        fdc_ids: &[u32],
        force: bool,
        batch_size: usize,
    ) -> Result<CacheTaskReport> {
        let ids = if force {
            fdc_ids.to_vec()
        } else {
            self.missing_ids(fdc_ids).await?
        };
        let mut report = self.store_in_batches(&ids, batch_size).await?;
        report.requested = fdc_ids.len();
        report.skipped = fdc_ids.len() - ids.len();
        Ok(report)
    }

    pub fn clear_searches(&self) {
        self.searches.invalidate_all();
    }

    async fn missing_ids(&self, fdc_ids: &[u32]) -> Result<Vec<u32>> {
        let fresh: HashSet<u32> = self
            .store
            .load_foods(fdc_ids)
            .await?
            .into_iter()
            .filter(|stored| self.is_fresh(stored))
            .map(|stored| stored.food.fdc_id)
            .collect();
        Ok(fdc_ids
            .iter()
            .copied()
            .filter(|id| !fresh.contains(id))
            .collect())
    }

    /// 分批抓取；失敗的批次記錄後略過
    async fn store_in_batches(&self, fdc_ids: &[u32], batch_size: usize) -> Result<CacheTaskReport> {
        if batch_size == 0 {
            return Err(FdcError::validation("batch_size must be at least 1"));
        }

        let mut report = CacheTaskReport {
            requested: fdc_ids.len(),
            ..CacheTaskReport::default()
        };
        for (index, batch) in fdc_ids.chunks(batch_size).enumerate() {
            match self.refresh(batch).await {
                Ok(foods) => {
                    report.stored += foods.len();
                    debug!("batch {}: stored {} foods", index + 1, foods.len());
                }
                Err(e) => {
                    report.failed_batches += 1;
                    warn!("⚠️ batch {} ({} ids) failed: {}", index + 1, batch.len(), e);
                }
            }
        }
        Ok(report)
    }
}

#[async_trait]
impl<F: FoodSource, St: FoodStore> FoodSource for FdcCache<F, St> {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResult> {
        if !self.settings.enabled {
            return self.source.search(query).await;
        }

        let key = query.cache_key();
        if let Some(hit) = self.searches.get(&key).await {
            debug!("💾 search cache hit: {}", key);
            return Ok(hit);
        }

        let result = self.source.search(query).await?;
        self.searches.insert(key, result.clone()).await;
        Ok(result)
    }

    async fn get_food(&self, fdc_id: u32, options: &FoodOptions) -> Result<Food> {
        self.get_food_with(fdc_id, options, false).await
    }

    async fn get_foods(&self, fdc_ids: &[u32], options: &FoodOptions) -> Result<Vec<Food>> {
        if !self.cacheable(options) {
            return self.source.get_foods(fdc_ids, options).await;
        }

        let mut found: HashMap<u32, Food> = self
            .store
            .load_foods(fdc_ids)
            .await?
            .into_iter()
            .filter(|stored| self.is_fresh(stored))
            .map(|stored| (stored.food.fdc_id, stored.food))
            .collect();

        let missing: Vec<u32> = fdc_ids
            .iter()
            .copied()
            .filter(|id| !found.contains_key(id))
            .collect();
        debug!(
            "💾 {} of {} foods served from cache",
            fdc_ids.len() - missing.len(),
            fdc_ids.len()
        );

        if !missing.is_empty() {
            for food in self.refresh(&missing).await? {
                found.insert(food.fdc_id, food);
            }
        }

        let mut seen = HashSet::new();
        Ok(fdc_ids
            .iter()
            .filter(|id| seen.insert(**id))
            .filter_map(|id| found.remove(id))
            .collect())
    }

    async fn list_foods(&self, query: &ListQuery) -> Result<Vec<Food>> {
        self.source.list_foods(query).await
    }
}
