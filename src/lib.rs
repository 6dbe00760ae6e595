pub mod analysis;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::{ClientSettings, LocalStorage};
pub use core::cache::{CacheSettings, CacheTaskReport, FdcCache};
pub use core::client::{AuthMode, FdcClient, FdcClientBuilder, RetryPolicy};
pub use core::file_store::FileFoodStore;
#[cfg(feature = "sqlite")]
pub use core::sqlite_store::SqliteFoodStore;
pub use domain::{
    Food, FoodFormat, FoodOptions, FoodPortion, FoodSource, FoodStore, ListQuery, Nutrient,
    SearchQuery, SearchResult, SearchResultFood, SortOrder, Storage, StoredFood,
};
pub use utils::error::{FdcError, Result};
