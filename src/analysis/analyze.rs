use crate::analysis::dri::{get_dri, DriType, Gender};
use crate::analysis::nutrients::{self, NutrientGroup};
use crate::analysis::units::normalize_nutrient_value;
use crate::domain::model::{Food, Nutrient};
use crate::utils::error::{FdcError, Result};
use crate::utils::validation::{validate_positive_amount, Validate};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

pub const DEFAULT_SERVING_SIZE: f64 = 100.0;
pub const DEFAULT_AGE: u32 = 30;
pub const MAX_AGE: u32 = 120;

/// 比較時預設列出的營養素
pub const DEFAULT_COMPARE_NUTRIENTS: &[&str] = &[
    "protein",
    "fat",
    "carbohydrate",
    "fiber",
    "vitamin_c",
    "calcium",
    "iron",
];

const KCAL_PER_GRAM_PROTEIN: f64 = 4.0;
const KCAL_PER_GRAM_CARBOHYDRATE: f64 = 4.0;
const KCAL_PER_GRAM_FAT: f64 = 9.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnalysisOptions {
    /// 份量（公克）
    pub serving_size: f64,
    pub dri_type: DriType,
    pub gender: Gender,
    pub age: u32,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            serving_size: DEFAULT_SERVING_SIZE,
            dri_type: DriType::default(),
            gender: Gender::default(),
            age: DEFAULT_AGE,
        }
    }
}

impl AnalysisOptions {
    pub fn with_serving_size(mut self, serving_size: f64) -> Self {
        self.serving_size = serving_size;
        self
    }

    pub fn with_dri(mut self, dri_type: DriType, gender: Gender, age: u32) -> Self {
        self.dri_type = dri_type;
        self.gender = gender;
        self.age = age;
        self
    }
}

impl Validate for AnalysisOptions {
    fn validate(&self) -> Result<()> {
        validate_positive_amount("serving_size", self.serving_size)?;
        if self.age > MAX_AGE {
            return Err(FdcError::validation(format!(
                "age must be between 0 and {}, got {}",
                MAX_AGE, self.age
            )));
        }
        Ok(())
    }
}

/// 單一營養素在一份食物中的含量與 DRI 比較
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NutrientValue {
    pub nutrient_id: String,
    pub name: String,
    pub source: Nutrient,
    pub amount: f64,
    pub unit: String,
    pub dri: Option<f64>,
    pub dri_percent: Option<f64>,
    pub dri_type: DriType,
    pub group: Option<NutrientGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NutrientAnalysis {
    pub food: Food,
    pub serving_size: f64,
    pub dri_type: DriType,
    pub gender: Gender,
    pub age: u32,
    pub nutrients: BTreeMap<String, NutrientValue>,
    pub calories_per_serving: f64,
    pub protein_per_serving: f64,
    pub carbs_per_serving: f64,
    pub fat_per_serving: f64,
    /// protein / carbohydrate / fat 佔熱量的百分比；沒有熱量資料時為空
    pub macronutrient_distribution: BTreeMap<String, f64>,
}

impl NutrientAnalysis {
    pub fn get_nutrient(&self, nutrient_id: &str) -> Option<&NutrientValue> {
        self.nutrients.get(&nutrient_id.to_lowercase())
    }

    /// 依目錄順序列出某分類中有資料的營養素
    pub fn nutrients_in_group(&self, group: NutrientGroup) -> Vec<&NutrientValue> {
        nutrients::in_group(group)
            .filter_map(|info| self.nutrients.get(info.id))
            .collect()
    }
}

/// 以每 100 g 的含量乘上 `factor` 進行分析
pub(crate) fn analyze_scaled(
    food: &Food,
    factor: f64,
    serving_size: f64,
    options: &AnalysisOptions,
) -> NutrientAnalysis {
    let mut analysis = NutrientAnalysis {
        food: food.clone(),
        serving_size,
        dri_type: options.dri_type,
        gender: options.gender,
        age: options.age,
        nutrients: BTreeMap::new(),
        calories_per_serving: 0.0,
        protein_per_serving: 0.0,
        carbs_per_serving: 0.0,
        fat_per_serving: 0.0,
        macronutrient_distribution: BTreeMap::new(),
    };

    for nutrient in &food.nutrients {
        let nutrient_id = nutrients::catalogue_id(nutrient);
        if analysis.nutrients.contains_key(&nutrient_id) {
            debug!("略過重複的營養素 {} ({})", nutrient.name, nutrient_id);
            continue;
        }

        let scaled = nutrient.amount * factor;
        let info = nutrients::by_id(&nutrient_id);
        let (amount, unit, dri) = match info {
            Some(info) => {
                let (amount, unit) = normalize_nutrient_value(scaled, &nutrient.unit_name, info.unit);
                // 換算失敗時單位不同，不能和參考值比較
                let dri = if unit == info.unit {
                    get_dri(info.id, options.dri_type, options.gender, options.age)
                } else {
                    None
                };
                (amount, unit, dri)
            }
            None => (scaled, nutrient.unit_name.clone(), None),
        };
        let dri_percent = dri.filter(|d| *d > 0.0).map(|d| amount / d * 100.0);

        match nutrient_id.as_str() {
            "energy" => analysis.calories_per_serving = amount,
            "protein" => analysis.protein_per_serving = amount,
            "carbohydrate" => analysis.carbs_per_serving = amount,
            "fat" => analysis.fat_per_serving = amount,
            _ => {}
        }

        analysis.nutrients.insert(
            nutrient_id.clone(),
            NutrientValue {
                name: info
                    .map(|i| i.display_name.to_string())
                    .unwrap_or_else(|| nutrient.name.clone()),
                nutrient_id,
                source: nutrient.clone(),
                amount,
                unit,
                dri,
                dri_percent,
                dri_type: options.dri_type,
                group: info.map(|i| i.group),
            },
        );
    }

    analysis.macronutrient_distribution = macronutrient_distribution(
        analysis.protein_per_serving,
        analysis.carbs_per_serving,
        analysis.fat_per_serving,
        analysis.calories_per_serving,
    );
    analysis
}

fn macronutrient_distribution(
    protein: f64,
    carbs: f64,
    fat: f64,
    calories: f64,
) -> BTreeMap<String, f64> {
    let protein_kcal = protein * KCAL_PER_GRAM_PROTEIN;
    let carb_kcal = carbs * KCAL_PER_GRAM_CARBOHYDRATE;
    let fat_kcal = fat * KCAL_PER_GRAM_FAT;

    let mut total = protein_kcal + carb_kcal + fat_kcal;
    if total == 0.0 && calories > 0.0 {
        total = calories;
    }
    if total <= 0.0 {
        return BTreeMap::new();
    }

    [
        ("protein", protein_kcal),
        ("carbohydrate", carb_kcal),
        ("fat", fat_kcal),
    ]
    .into_iter()
    .map(|(key, kcal)| (key.to_string(), kcal / total * 100.0))
    .collect()
}

/// 分析一份食物（依 `serving_size` 換算每 100 g 的含量）
pub fn analyze_food(food: &Food, options: &AnalysisOptions) -> Result<NutrientAnalysis> {
    options.validate()?;
    Ok(analyze_scaled(
        food,
        options.serving_size / 100.0,
        options.serving_size,
        options,
    ))
}

/// 分析多筆食物；`serving_sizes` 需與食物一一對應
pub fn analyze_foods(
    foods: &[Food],
    serving_sizes: Option<&[f64]>,
    options: &AnalysisOptions,
) -> Result<Vec<NutrientAnalysis>> {
    match serving_sizes {
        Some(sizes) if sizes.len() != foods.len() => Err(FdcError::validation(format!(
            "Number of serving sizes ({}) must match number of foods ({})",
            sizes.len(),
            foods.len()
        ))),
        Some(sizes) => foods
            .iter()
            .zip(sizes)
            .map(|(food, size)| analyze_food(food, &options.with_serving_size(*size)))
            .collect(),
        None => foods.iter().map(|food| analyze_food(food, options)).collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonEntry {
    pub food: String,
    pub amount: f64,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NutrientComparison {
    pub nutrient_id: String,
    pub display_name: String,
    /// 沒有這個營養素的食物不列入
    pub entries: Vec<ComparisonEntry>,
}

pub fn compare_foods(
    foods: &[Food],
    nutrient_ids: Option<&[String]>,
    serving_sizes: Option<&[f64]>,
    options: &AnalysisOptions,
) -> Result<Vec<NutrientComparison>> {
    let analyses = analyze_foods(foods, serving_sizes, options)?;
    let ids: Vec<String> = match nutrient_ids {
        Some(ids) => ids.iter().map(|id| id.trim().to_lowercase()).collect(),
        None => DEFAULT_COMPARE_NUTRIENTS
            .iter()
            .map(|id| id.to_string())
            .collect(),
    };

    Ok(ids
        .into_iter()
        .map(|nutrient_id| {
            let entries = analyses
                .iter()
                .filter_map(|analysis| {
                    analysis
                        .get_nutrient(&nutrient_id)
                        .map(|value| ComparisonEntry {
                            food: analysis.food.description.clone(),
                            amount: value.amount,
                            unit: value.unit.clone(),
                        })
                })
                .collect();
            let display_name = nutrients::by_id(&nutrient_id)
                .map(|info| info.display_name.to_string())
                .unwrap_or_else(|| nutrient_id.clone());
            NutrientComparison {
                nutrient_id,
                display_name,
                entries,
            }
        })
        .collect())
}
