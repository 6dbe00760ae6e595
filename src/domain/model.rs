use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 食物中的單一營養素（每 100 g 的含量）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nutrient {
    pub id: u32,
    pub name: String,
    pub amount: f64,
    pub unit_name: String,
    pub nutrient_nbr: Option<String>,
    pub rank: Option<u32>,
}

impl Nutrient {
    pub fn new(id: u32, name: impl Into<String>, amount: f64, unit_name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            amount,
            unit_name: unit_name.into(),
            nutrient_nbr: None,
            rank: None,
        }
    }
}

impl fmt::Display for Nutrient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} {}", self.name, self.amount, self.unit_name)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FoodPortion {
    pub id: u32,
    pub amount: f64,
    pub gram_weight: f64,
    pub portion_description: Option<String>,
    pub modifier: Option<String>,
    pub measure_unit: Option<String>,
}

impl fmt::Display for FoodPortion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.1} {} ({:.1}g)",
            self.amount,
            self.measure_unit.as_deref().unwrap_or(""),
            self.gram_weight
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Food {
    pub fdc_id: u32,
    pub description: String,
    pub data_type: String,
    pub publication_date: Option<NaiveDate>,
    pub food_class: Option<String>,
    pub food_category: Option<String>,
    pub scientific_name: Option<String>,
    pub brand_owner: Option<String>,
    pub brand_name: Option<String>,
    pub ingredients: Option<String>,
    pub serving_size: Option<f64>,
    pub serving_size_unit: Option<String>,
    pub household_serving_fulltext: Option<String>,
    #[serde(default)]
    pub nutrients: Vec<Nutrient>,
    #[serde(default)]
    pub food_portions: Vec<FoodPortion>,
}

impl Food {
    pub fn new(fdc_id: u32, description: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            fdc_id,
            description: description.into(),
            data_type: data_type.into(),
            ..Default::default()
        }
    }

    pub fn with_nutrients(mut self, nutrients: Vec<Nutrient>) -> Self {
        self.nutrients = nutrients;
        self
    }

    pub fn with_portions(mut self, portions: Vec<FoodPortion>) -> Self {
        self.food_portions = portions;
        self
    }

    pub fn nutrient_by_id(&self, id: u32) -> Option<&Nutrient> {
        self.nutrients.iter().find(|n| n.id == id)
    }

    pub fn nutrient_by_name(&self, name: &str) -> Option<&Nutrient> {
        self.nutrients
            .iter()
            .find(|n| n.name.eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Food {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description, self.fdc_id)
    }
}

/// 搜尋結果中的精簡食物資料
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchResultFood {
    pub fdc_id: u32,
    pub description: String,
    pub data_type: String,
    pub publication_date: Option<NaiveDate>,
    pub brand_owner: Option<String>,
    pub brand_name: Option<String>,
    pub ingredients: Option<String>,
    pub food_category: Option<String>,
    pub score: Option<f64>,
    #[serde(default)]
    pub nutrients: Vec<Nutrient>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchResult {
    pub total_hits: u64,
    pub current_page: u32,
    pub total_pages: u32,
    pub foods: Vec<SearchResultFood>,
}

impl SearchResult {
    pub fn is_last_page(&self) -> bool {
        self.current_page >= self.total_pages
    }
}
