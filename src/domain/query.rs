use crate::utils::error::{FdcError, Result};
use crate::utils::validation::{validate_range, Validate};
use std::fmt;
use std::str::FromStr;

pub const MAX_PAGE_SIZE: u32 = 200;
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// `GET food/{id}` 的回應格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FoodFormat {
    #[default]
    Full,
    Abridged,
}

impl FoodFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FoodFormat::Full => "full",
            FoodFormat::Abridged => "abridged",
        }
    }
}

impl FromStr for FoodFormat {
    type Err = FdcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(FoodFormat::Full),
            "abridged" => Ok(FoodFormat::Abridged),
            other => Err(FdcError::validation(format!("Unknown food format: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = FdcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(FdcError::validation(format!("Unknown sort order: {}", other))),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 搜尋條件
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub query: String,
    pub data_types: Vec<String>,
    pub page_size: u32,
    pub page_number: u32,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
    pub brand_owner: Option<String>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            data_types: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            page_number: 1,
            sort_by: None,
            sort_order: None,
            brand_owner: None,
        }
    }

    pub fn data_types<I, S>(mut self, data_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_types = data_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn page_number(mut self, page_number: u32) -> Self {
        self.page_number = page_number;
        self
    }

    pub fn sort(mut self, sort_by: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = Some(sort_by.into());
        self.sort_order = Some(order);
        self
    }

    pub fn brand_owner(mut self, brand_owner: impl Into<String>) -> Self {
        self.brand_owner = Some(brand_owner.into());
        self
    }

    /// 組出查詢字串參數（不含 api_key）
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("query", self.query.clone()),
            ("pageSize", self.page_size.to_string()),
            ("pageNumber", self.page_number.to_string()),
        ];
        if !self.data_types.is_empty() {
            params.push(("dataType", self.data_types.join(",")));
        }
        if let Some(sort_by) = &self.sort_by {
            params.push(("sortBy", sort_by.clone()));
        }
        if let Some(order) = self.sort_order {
            params.push(("sortOrder", order.as_str().to_string()));
        }
        if let Some(brand_owner) = &self.brand_owner {
            params.push(("brandOwner", brand_owner.clone()));
        }
        params
    }

    /// 快取鍵，參數順序固定
    pub fn cache_key(&self) -> String {
        let mut data_types = self.data_types.clone();
        data_types.sort();
        format!(
            "fdc:search:{}:{}:{}:{}:{}:{}:{}",
            self.query.trim().to_lowercase(),
            data_types.join(","),
            self.page_size,
            self.page_number,
            self.sort_by.as_deref().unwrap_or(""),
            self.sort_order.map(|o| o.as_str()).unwrap_or(""),
            self.brand_owner.as_deref().unwrap_or("")
        )
    }
}

impl Validate for SearchQuery {
    fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(FdcError::validation("Search query cannot be empty"));
        }
        validate_paging(self.page_size, self.page_number)
    }
}

/// `POST foods/list` 的分頁條件
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub data_types: Vec<String>,
    pub page_size: u32,
    pub page_number: u32,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            data_types: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            page_number: 1,
            sort_by: None,
            sort_order: None,
        }
    }
}

impl ListQuery {
    pub fn data_types<I, S>(mut self, data_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_types = data_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn page_number(mut self, page_number: u32) -> Self {
        self.page_number = page_number;
        self
    }
}

impl Validate for ListQuery {
    fn validate(&self) -> Result<()> {
        validate_paging(self.page_size, self.page_number)
    }
}

/// 取得單筆或多筆食物時的選項
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FoodOptions {
    pub format: FoodFormat,
    /// 只取回指定的營養素編號（最多 25 個）
    pub nutrients: Vec<u32>,
}

impl FoodOptions {
    pub fn abridged() -> Self {
        Self {
            format: FoodFormat::Abridged,
            nutrients: Vec::new(),
        }
    }

    pub fn with_nutrients(mut self, nutrients: Vec<u32>) -> Self {
        self.nutrients = nutrients;
        self
    }

    pub fn nutrients_param(&self) -> Option<String> {
        if self.nutrients.is_empty() {
            None
        } else {
            Some(
                self.nutrients
                    .iter()
                    .map(|n| n.to_string())
                    .collect::<Vec<_>>()
                    .join(","),
            )
        }
    }
}

fn validate_paging(page_size: u32, page_number: u32) -> Result<()> {
    validate_range("page_size", page_size, 1, MAX_PAGE_SIZE)
        .map_err(|e| FdcError::validation(e.to_string()))?;
    if page_number < 1 {
        return Err(FdcError::validation("page_number must be at least 1"));
    }
    Ok(())
}
