use crate::analysis::analyze::{analyze_scaled, AnalysisOptions, NutrientAnalysis};
use crate::analysis::nutrients::catalogue_id;
use crate::analysis::units::{
    convert_measurement, convert_to_grams, convert_to_milliliters, household_grams, lookup_unit,
    parse_quantity,
};
use crate::domain::model::{Food, Nutrient};
use crate::domain::ports::FoodSource;
use crate::domain::query::{FoodOptions, SearchQuery};
use crate::utils::error::{FdcError, Result};
use crate::utils::validation::Validate;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

pub const DEFAULT_SEARCH_LIMIT: u32 = 5;
const DEFAULT_UNIT: &str = "piece";
const GRAMS_PER_UNKNOWN_UNIT: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ingredient {
    pub food: Food,
    pub weight_g: f64,
    /// 原始的食材描述，例如 `"1 cup flour"`
    pub description: Option<String>,
    pub quantity: f64,
    pub unit: String,
}

impl Ingredient {
    /// 直接以公克數建立食材
    pub fn from_grams(food: Food, weight_g: f64) -> Self {
        Self {
            food,
            weight_g,
            description: None,
            quantity: weight_g,
            unit: "g".to_string(),
        }
    }
}

impl fmt::Display for Ingredient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.description.as_deref().unwrap_or(&self.food.description);
        write!(f, "{} ({:.1}g)", label, self.weight_g)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipe {
    pub name: String,
    pub ingredients: Vec<Ingredient>,
    pub servings: u32,
    pub description: Option<String>,
}

impl Recipe {
    pub fn new(name: impl Into<String>, ingredients: Vec<Ingredient>, servings: u32) -> Self {
        Self {
            name: name.into(),
            ingredients,
            servings,
            description: None,
        }
    }

    pub fn total_weight_g(&self) -> f64 {
        self.ingredients.iter().map(|i| i.weight_g).sum()
    }

    pub fn weight_per_serving(&self) -> Result<f64> {
        self.validate()?;
        Ok(self.total_weight_g() / self.servings as f64)
    }
}

impl Validate for Recipe {
    fn validate(&self) -> Result<()> {
        if self.servings == 0 {
            return Err(FdcError::validation("Recipe servings must be at least 1"));
        }
        Ok(())
    }
}

/// 食材描述拆解後的數量、單位與食物名稱
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedIngredient {
    pub quantity: f64,
    pub unit: String,
    pub food_name: String,
}

fn is_known_unit(unit: &str) -> bool {
    lookup_unit(unit).is_some() || household_grams(unit).is_some()
}

/// 食材描述的樣式，首次使用時編譯
fn ingredient_pattern() -> Result<&'static Regex> {
    static PATTERN: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^([\d./]+)\s*(fl\.?\s*oz|[a-zA-Z]+)?\s+(.+)$"))
        .as_ref()
        .map_err(|e| FdcError::ConfigError {
            message: format!("Invalid ingredient pattern: {}", e),
        })
}

/// 解析 `"<數量>[單位] <食物>"`；沒有數量時視為 1 個
pub fn parse_ingredient_text(text: &str) -> Result<ParsedIngredient> {
    let text = text.trim();
    if text.is_empty() {
        return Err(FdcError::validation("Ingredient text cannot be empty"));
    }

    let Some(caps) = ingredient_pattern()?.captures(text) else {
        return Ok(ParsedIngredient {
            quantity: 1.0,
            unit: DEFAULT_UNIT.to_string(),
            food_name: text.to_string(),
        });
    };

    let raw_quantity = &caps[1];
    let quantity = parse_quantity(raw_quantity).unwrap_or_else(|_| {
        debug!("無法解析數量 '{}'，以 1 計算", raw_quantity);
        1.0
    });
    let rest = caps[3].trim();

    let parsed = match caps.get(2).map(|m| m.as_str()) {
        Some(unit) if is_known_unit(unit) => ParsedIngredient {
            quantity,
            unit: unit.to_lowercase(),
            food_name: rest.to_string(),
        },
        // 不認得的字（例如 "large"）屬於食物名稱
        Some(word) => ParsedIngredient {
            quantity,
            unit: DEFAULT_UNIT.to_string(),
            food_name: format!("{} {}", word, rest),
        },
        None => ParsedIngredient {
            quantity,
            unit: DEFAULT_UNIT.to_string(),
            food_name: rest.to_string(),
        },
    };
    Ok(parsed)
}

/// 估算食材重量（公克）
///
/// 依序嘗試：質量單位、食物本身的份量資料、家用份量表、以水的密度換算容量，最後每單位 100 g。
pub fn estimate_weight(food: &Food, quantity: f64, unit: &str) -> f64 {
    if let Ok(grams) = convert_to_grams(quantity, unit) {
        return grams;
    }

    let unit_lower = unit.trim().to_lowercase();
    let portion = food.food_portions.iter().find(|p| {
        p.measure_unit
            .as_deref()
            .is_some_and(|m| m.eq_ignore_ascii_case(&unit_lower))
            || p.modifier
                .as_deref()
                .is_some_and(|m| m.to_lowercase().starts_with(&unit_lower))
    });
    if let Some(portion) = portion {
        let per_unit = if portion.amount > 0.0 {
            portion.gram_weight / portion.amount
        } else {
            portion.gram_weight
        };
        return quantity * per_unit;
    }

    if let Some(grams) = household_grams(&unit_lower) {
        return quantity * grams;
    }
    if let Ok(ml) = convert_to_milliliters(quantity, &unit_lower) {
        return ml;
    }

    quantity * GRAMS_PER_UNKNOWN_UNIT
}

/// 解析食材描述、搜尋第一筆符合的食物並估算重量；找不到食物時回傳 None
pub async fn parse_ingredient<S>(
    text: &str,
    source: &S,
    search_limit: u32,
) -> Result<Option<Ingredient>>
where
    S: FoodSource + ?Sized,
{
    let parsed = parse_ingredient_text(text)?;
    let query = SearchQuery::new(parsed.food_name.clone()).page_size(search_limit.max(1));
    let result = source.search(&query).await?;

    let Some(hit) = result.foods.first() else {
        return Ok(None);
    };

    let food = match source.get_food(hit.fdc_id, &FoodOptions::default()).await {
        Ok(food) => food,
        Err(FdcError::NotFoundError { .. }) => return Ok(None),
        Err(e) => return Err(e),
    };
    let weight_g = estimate_weight(&food, parsed.quantity, &parsed.unit);
    debug!(
        "🥕 {} → {} ({:.1} g)",
        text.trim(),
        food.description,
        weight_g
    );

    Ok(Some(Ingredient {
        food,
        weight_g,
        description: Some(text.trim().to_string()),
        quantity: parsed.quantity,
        unit: parsed.unit,
    }))
}

/// 由多行食材描述建立食譜，無法對應的食材會記錄警告後略過
pub async fn create_recipe<S, T>(
    name: &str,
    texts: &[T],
    source: &S,
    servings: u32,
    description: Option<String>,
) -> Result<Recipe>
where
    S: FoodSource + ?Sized,
    T: AsRef<str>,
{
    let mut recipe = Recipe::new(name, Vec::new(), servings);
    recipe.description = description;
    recipe.validate()?;

    for text in texts {
        let text = text.as_ref();
        if text.trim().is_empty() {
            continue;
        }
        match parse_ingredient(text, source, DEFAULT_SEARCH_LIMIT).await? {
            Some(ingredient) => recipe.ingredients.push(ingredient),
            None => warn!("⚠️ 找不到食材 '{}'，已略過", text.trim()),
        }
    }

    info!(
        "📋 食譜 '{}'：{} 項食材，共 {:.1} g",
        recipe.name,
        recipe.ingredients.len(),
        recipe.total_weight_g()
    );
    Ok(recipe)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeAnalysis {
    pub recipe: Recipe,
    pub per_serving: NutrientAnalysis,
    pub total: NutrientAnalysis,
    /// 每項食材依其重量的分析
    pub ingredients: Vec<NutrientAnalysis>,
}

/// 把所有食材的營養素依重量加總成一筆「整份食譜」食物
fn combine_nutrients(recipe: &Recipe) -> Vec<Nutrient> {
    // 以目錄編號合併：1008 與 2047/2048 都是熱量
    let mut combined: Vec<(String, Nutrient)> = Vec::new();

    for ingredient in &recipe.ingredients {
        let factor = ingredient.weight_g / 100.0;
        // 同一食材重複的營養素只取第一筆，與單一食物分析一致
        let mut seen = HashSet::new();
        for nutrient in &ingredient.food.nutrients {
            let id = catalogue_id(nutrient);
            if !seen.insert(id.clone()) {
                continue;
            }
            let amount = nutrient.amount * factor;
            let existing = combined
                .iter_mut()
                .find(|(key, _)| *key == id)
                .map(|(_, n)| n);

            match existing {
                Some(existing) => {
                    match convert_measurement(amount, &nutrient.unit_name, &existing.unit_name) {
                        Ok(converted) => existing.amount += converted,
                        Err(e) => debug!("略過 {} 的 {}: {}", ingredient.food.description, nutrient.name, e),
                    }
                }
                None => combined.push((
                    id,
                    Nutrient {
                        amount,
                        ..nutrient.clone()
                    },
                )),
            }
        }
    }

    combined.into_iter().map(|(_, nutrient)| nutrient).collect()
}

pub fn analyze_recipe(recipe: &Recipe, options: &AnalysisOptions) -> Result<RecipeAnalysis> {
    recipe.validate()?;
    options.validate()?;

    let ingredients = recipe
        .ingredients
        .iter()
        .map(|i| analyze_scaled(&i.food, i.weight_g / 100.0, i.weight_g, options))
        .collect();

    let mut combined = Food::new(0, recipe.name.clone(), "Recipe")
        .with_nutrients(combine_nutrients(recipe));
    combined.ingredients = Some(
        recipe
            .ingredients
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(", "),
    );

    let total_weight = recipe.total_weight_g();
    let servings = recipe.servings as f64;
    let total = analyze_scaled(&combined, 1.0, total_weight, options);
    let per_serving = analyze_scaled(&combined, 1.0 / servings, total_weight / servings, options);

    Ok(RecipeAnalysis {
        recipe: recipe.clone(),
        per_serving,
        total,
        ingredients,
    })
}
