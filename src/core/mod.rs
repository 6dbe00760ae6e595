pub mod cache;
pub mod client;
pub mod file_store;
#[cfg(feature = "sqlite")]
pub mod sqlite_store;

pub use crate::domain::ports::{FoodSource, FoodStore, Storage};
pub use crate::utils::error::Result;
