//! FoodData Central 的 JSON 酬載（camelCase）以及轉換成領域模型的邏輯。
//!
//! 同一個 API 在不同端點會回傳不同形狀的 `foodNutrients`，這裡統一吸收差異。

use crate::domain::model::{Food, FoodPortion, Nutrient, SearchResult, SearchResultFood};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSearchResult {
    #[serde(default)]
    pub total_hits: u64,
    #[serde(default)]
    pub current_page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub foods: Option<Vec<ApiSearchFood>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSearchFood {
    pub fdc_id: u32,
    pub description: Option<String>,
    pub data_type: Option<String>,
    pub publication_date: Option<String>,
    pub brand_owner: Option<String>,
    pub brand_name: Option<String>,
    pub ingredients: Option<String>,
    pub food_category: Option<ApiFoodCategory>,
    pub score: Option<f64>,
    pub food_nutrients: Option<Vec<ApiFoodNutrient>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiFood {
    pub fdc_id: u32,
    pub description: Option<String>,
    pub data_type: Option<String>,
    pub publication_date: Option<String>,
    pub food_class: Option<String>,
    pub food_category: Option<ApiFoodCategory>,
    pub scientific_name: Option<String>,
    pub brand_owner: Option<String>,
    pub brand_name: Option<String>,
    pub ingredients: Option<String>,
    pub serving_size: Option<f64>,
    pub serving_size_unit: Option<String>,
    #[serde(rename = "householdServingFullText")]
    pub household_serving_full_text: Option<String>,
    pub food_nutrients: Option<Vec<ApiFoodNutrient>>,
    pub food_portions: Option<Vec<ApiFoodPortion>>,
}

/// `foodCategory` 可能是字串，也可能是 `{ "description": ... }`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ApiFoodCategory {
    Text(String),
    Object { description: Option<String> },
}

impl ApiFoodCategory {
    fn into_description(self) -> Option<String> {
        match self {
            ApiFoodCategory::Text(text) => Some(text),
            ApiFoodCategory::Object { description } => description,
        }
    }
}

/// 支援 full（巢狀 `nutrient`）、search（`nutrientId`/`value`）、list/abridged（`number`/`amount`）三種形狀
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiFoodNutrient {
    pub nutrient: Option<ApiNutrientInfo>,
    pub amount: Option<f64>,
    pub nutrient_id: Option<u32>,
    pub nutrient_name: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub nutrient_number: Option<String>,
    pub unit_name: Option<String>,
    pub value: Option<f64>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub number: Option<String>,
    pub name: Option<String>,
    pub rank: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiNutrientInfo {
    pub id: Option<u32>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub number: Option<String>,
    pub name: Option<String>,
    pub rank: Option<u32>,
    pub unit_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiFoodPortion {
    pub id: Option<u32>,
    pub amount: Option<f64>,
    pub gram_weight: Option<f64>,
    pub portion_description: Option<String>,
    pub modifier: Option<String>,
    pub measure_unit: Option<ApiMeasureUnit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiMeasureUnit {
    pub name: Option<String>,
    pub abbreviation: Option<String>,
}

/// `POST /foods` 的請求內容
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodsRequest<'a> {
    pub fdc_ids: &'a [u32],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nutrients: Option<&'a [u32]>,
}

/// `POST /foods/list` 的請求內容
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<&'a [String]>,
    pub page_size: u32,
    pub page_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<&'a str>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// FDC 日期同時出現 `2019-04-01` 與 `4/1/2019` 兩種格式
pub fn parse_publication_date(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw?.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .ok()
}

impl From<ApiFoodNutrient> for Nutrient {
    fn from(raw: ApiFoodNutrient) -> Self {
        let info = raw.nutrient;

        let id = info
            .as_ref()
            .and_then(|n| n.id)
            .or(raw.nutrient_id)
            .unwrap_or(0);
        let name = info
            .as_ref()
            .and_then(|n| n.name.clone())
            .or(raw.nutrient_name)
            .or(raw.name)
            .unwrap_or_default();
        let unit_name = info
            .as_ref()
            .and_then(|n| n.unit_name.clone())
            .or(raw.unit_name)
            .unwrap_or_default();
        let nutrient_nbr = info
            .as_ref()
            .and_then(|n| n.number.clone())
            .or(raw.nutrient_number)
            .or(raw.number);
        let rank = info.as_ref().and_then(|n| n.rank).or(raw.rank);

        Nutrient {
            id,
            name,
            amount: raw.amount.or(raw.value).unwrap_or(0.0),
            unit_name,
            nutrient_nbr,
            rank,
        }
    }
}

impl From<ApiFoodPortion> for FoodPortion {
    fn from(raw: ApiFoodPortion) -> Self {
        let measure_unit = raw
            .measure_unit
            .and_then(|unit| unit.name.or(unit.abbreviation))
            .filter(|name| !name.eq_ignore_ascii_case("undetermined"));

        FoodPortion {
            id: raw.id.unwrap_or(0),
            amount: raw.amount.unwrap_or(1.0),
            gram_weight: raw.gram_weight.unwrap_or(0.0),
            portion_description: raw.portion_description,
            modifier: raw.modifier,
            measure_unit,
        }
    }
}

impl From<ApiFood> for Food {
    fn from(raw: ApiFood) -> Self {
        Food {
            fdc_id: raw.fdc_id,
            description: raw.description.unwrap_or_default(),
            data_type: raw.data_type.unwrap_or_default(),
            publication_date: parse_publication_date(raw.publication_date.as_deref()),
            food_class: raw.food_class,
            food_category: raw.food_category.and_then(ApiFoodCategory::into_description),
            scientific_name: raw.scientific_name,
            brand_owner: raw.brand_owner,
            brand_name: raw.brand_name,
            ingredients: raw.ingredients,
            serving_size: raw.serving_size,
            serving_size_unit: raw.serving_size_unit,
            household_serving_fulltext: raw.household_serving_full_text,
            nutrients: raw
                .food_nutrients
                .unwrap_or_default()
                .into_iter()
                .map(Nutrient::from)
                .collect(),
            food_portions: raw
                .food_portions
                .unwrap_or_default()
                .into_iter()
                .map(FoodPortion::from)
                .collect(),
        }
    }
}

impl From<ApiSearchFood> for SearchResultFood {
    fn from(raw: ApiSearchFood) -> Self {
        SearchResultFood {
            fdc_id: raw.fdc_id,
            description: raw.description.unwrap_or_default(),
            data_type: raw.data_type.unwrap_or_default(),
            publication_date: parse_publication_date(raw.publication_date.as_deref()),
            brand_owner: raw.brand_owner,
            brand_name: raw.brand_name,
            ingredients: raw.ingredients,
            food_category: raw.food_category.and_then(ApiFoodCategory::into_description),
            score: raw.score,
            nutrients: raw
                .food_nutrients
                .unwrap_or_default()
                .into_iter()
                .map(Nutrient::from)
                .collect(),
        }
    }
}

impl From<ApiSearchResult> for SearchResult {
    fn from(raw: ApiSearchResult) -> Self {
        SearchResult {
            total_hits: raw.total_hits,
            current_page: raw.current_page,
            total_pages: raw.total_pages,
            foods: raw
                .foods
                .unwrap_or_default()
                .into_iter()
                .map(SearchResultFood::from)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_food_payload() {
        let payload = json!({
            "fdcId": 1234,
            "description": "Test Food",
            "dataType": "Branded",
            "publicationDate": "2023-01-01",
            "foodClass": "Test Class",
            "foodCategory": {"description": "Test Category"},
            "householdServingFullText": "1 cup",
            "foodNutrients": [
                {"nutrient": {"id": 1001, "number": "203", "name": "Protein", "rank": 600, "unitName": "g"}, "amount": 10.5},
                {"nutrient": {"id": 1002, "name": "Fat", "unitName": "g"}, "amount": 5.2}
            ],
            "foodPortions": [
                {"id": 101, "amount": 1.0, "gramWeight": 100.0, "measureUnit": {"name": "cup", "abbreviation": "c"}}
            ]
        });

        let food: Food = serde_json::from_value::<ApiFood>(payload).unwrap().into();

        assert_eq!(food.fdc_id, 1234);
        assert_eq!(food.publication_date, NaiveDate::from_ymd_opt(2023, 1, 1));
        assert_eq!(food.food_category.as_deref(), Some("Test Category"));
        assert_eq!(food.household_serving_fulltext.as_deref(), Some("1 cup"));
        assert_eq!(food.nutrients.len(), 2);
        assert_eq!(food.nutrients[0].name, "Protein");
        assert_eq!(food.nutrients[0].amount, 10.5);
        assert_eq!(food.nutrients[0].unit_name, "g");
        assert_eq!(food.nutrients[0].nutrient_nbr.as_deref(), Some("203"));
        assert_eq!(food.nutrients[0].rank, Some(600));
        assert_eq!(food.food_portions[0].measure_unit.as_deref(), Some("cup"));
        assert_eq!(food.food_portions[0].gram_weight, 100.0);
    }

    #[test]
    fn test_search_payload_with_flat_nutrients() {
        let payload = json!({
            "totalHits": 2,
            "currentPage": 1,
            "totalPages": 1,
            "foods": [
                {
                    "fdcId": 1234,
                    "description": "Test Food 1",
                    "dataType": "Branded",
                    "foodCategory": "Fruits",
                    "publicationDate": "4/1/2019",
                    "score": 512.5,
                    "foodNutrients": [
                        {"nutrientId": 1003, "nutrientName": "Protein", "nutrientNumber": "203", "unitName": "G", "value": 0.3}
                    ]
                },
                {"fdcId": 5678, "description": "Test Food 2", "dataType": "Foundation"}
            ]
        });

        let result: SearchResult = serde_json::from_value::<ApiSearchResult>(payload)
            .unwrap()
            .into();

        assert_eq!(result.total_hits, 2);
        assert!(result.is_last_page());
        assert_eq!(result.foods[0].food_category.as_deref(), Some("Fruits"));
        assert_eq!(
            result.foods[0].publication_date,
            NaiveDate::from_ymd_opt(2019, 4, 1)
        );
        assert_eq!(result.foods[0].nutrients[0].id, 1003);
        assert_eq!(result.foods[0].nutrients[0].amount, 0.3);
        assert!(result.foods[1].nutrients.is_empty());
    }

    #[test]
    fn test_list_payload_and_undetermined_units() {
        let payload = json!({
            "fdcId": 42,
            "description": "Oats",
            "dataType": "SR Legacy",
            "publicationDate": "not a date",
            "foodNutrients": [
                {"number": 208, "name": "Energy", "amount": 389.0, "unitName": "KCAL"},
                {"number": "203", "name": "Protein", "unitName": "G"}
            ],
            "foodPortions": [
                {"id": 7, "gramWeight": 81.0, "modifier": "cup", "measureUnit": {"name": "undetermined"}}
            ]
        });

        let food: Food = serde_json::from_value::<ApiFood>(payload).unwrap().into();

        assert!(food.publication_date.is_none());
        assert_eq!(food.nutrients[0].nutrient_nbr.as_deref(), Some("208"));
        assert_eq!(food.nutrients[0].amount, 389.0);
        assert_eq!(food.nutrients[1].amount, 0.0);
        assert!(food.food_portions[0].measure_unit.is_none());
        assert_eq!(food.food_portions[0].amount, 1.0);
        assert_eq!(food.food_portions[0].modifier.as_deref(), Some("cup"));
    }

    #[test]
    fn test_request_bodies_skip_empty_fields() {
        let ids = [1, 2];
        let body = serde_json::to_value(FoodsRequest {
            fdc_ids: &ids,
            format: Some("full"),
            nutrients: None,
        })
        .unwrap();
        assert_eq!(body, json!({"fdcIds": [1, 2], "format": "full"}));

        let body = serde_json::to_value(ListRequest {
            data_type: None,
            page_size: 50,
            page_number: 1,
            sort_by: None,
            sort_order: Some("asc"),
        })
        .unwrap();
        assert_eq!(body, json!({"pageSize": 50, "pageNumber": 1, "sortOrder": "asc"}));
    }
}
