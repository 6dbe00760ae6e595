// Domain layer: models, FDC wire payloads, queries and ports.

pub mod api;
pub mod model;
pub mod ports;
pub mod query;

pub use crate::domain::model::{Food, FoodPortion, Nutrient, SearchResult, SearchResultFood};
pub use crate::domain::ports::{FoodSource, FoodStore, Storage, StoredFood};
pub use crate::domain::query::{FoodFormat, FoodOptions, ListQuery, SearchQuery, SortOrder};
pub use crate::utils::error::Result;
