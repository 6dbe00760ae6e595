// Nutrient analysis: unit conversion, DRI lookup, food and recipe analysis, reports.

pub mod analyze;
pub mod dri;
pub mod nutrients;
pub mod recipe;
pub mod report;
pub mod units;

pub use crate::analysis::analyze::{
    analyze_food, analyze_foods, compare_foods, AnalysisOptions, ComparisonEntry,
    NutrientAnalysis, NutrientComparison, NutrientValue,
};
pub use crate::analysis::dri::{get_dri, DriType, Gender};
pub use crate::analysis::nutrients::{NutrientGroup, NutrientInfo};
pub use crate::analysis::recipe::{
    analyze_recipe, create_recipe, estimate_weight, parse_ingredient, Ingredient, Recipe,
    RecipeAnalysis,
};
pub use crate::analysis::report::render_html_report;
