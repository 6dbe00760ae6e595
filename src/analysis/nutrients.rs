//! 分析用的營養素目錄：代號、顯示名稱、單位、分類與對應的 FDC 營養素編號。

use crate::domain::model::Nutrient;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NutrientGroup {
    Macronutrient,
    Fat,
    Carbohydrate,
    Mineral,
    Vitamin,
    AminoAcid,
}

impl NutrientGroup {
    pub fn label(&self) -> &'static str {
        match self {
            NutrientGroup::Macronutrient => "Macronutrients",
            NutrientGroup::Fat => "Fats",
            NutrientGroup::Carbohydrate => "Carbohydrates",
            NutrientGroup::Mineral => "Minerals",
            NutrientGroup::Vitamin => "Vitamins",
            NutrientGroup::AminoAcid => "Amino acids",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NutrientInfo {
    pub id: &'static str,
    pub display_name: &'static str,
    pub unit: &'static str,
    pub group: NutrientGroup,
    pub fdc_id: u32,
}

const fn info(
    id: &'static str,
    display_name: &'static str,
    unit: &'static str,
    group: NutrientGroup,
    fdc_id: u32,
) -> NutrientInfo {
    NutrientInfo {
        id,
        display_name,
        unit,
        group,
        fdc_id,
    }
}

use NutrientGroup::{AminoAcid, Carbohydrate, Fat, Macronutrient, Mineral, Vitamin};

pub const NUTRIENTS: &[NutrientInfo] = &[
    info("energy", "Energy", "kcal", Macronutrient, 1008),
    info("protein", "Protein", "g", Macronutrient, 1003),
    info("fat", "Total Fat", "g", Macronutrient, 1004),
    info("carbohydrate", "Carbohydrate", "g", Macronutrient, 1005),
    info("fiber", "Fiber", "g", Macronutrient, 1079),
    info("water", "Water", "g", Macronutrient, 1051),
    info("saturated", "Saturated Fat", "g", Fat, 1258),
    info("monounsaturated", "Monounsaturated Fat", "g", Fat, 1292),
    info("polyunsaturated", "Polyunsaturated Fat", "g", Fat, 1293),
    info("trans", "Trans Fat", "g", Fat, 1257),
    info("cholesterol", "Cholesterol", "mg", Fat, 1253),
    info("sugar", "Total Sugar", "g", Carbohydrate, 2000),
    info("starch", "Starch", "g", Carbohydrate, 1009),
    info("sucrose", "Sucrose", "g", Carbohydrate, 1010),
    info("glucose", "Glucose", "g", Carbohydrate, 1011),
    info("fructose", "Fructose", "g", Carbohydrate, 1012),
    info("lactose", "Lactose", "g", Carbohydrate, 1013),
    info("maltose", "Maltose", "g", Carbohydrate, 1014),
    info("galactose", "Galactose", "g", Carbohydrate, 1075),
    info("calcium", "Calcium", "mg", Mineral, 1087),
    info("iron", "Iron", "mg", Mineral, 1089),
    info("magnesium", "Magnesium", "mg", Mineral, 1090),
    info("phosphorus", "Phosphorus", "mg", Mineral, 1091),
    info("potassium", "Potassium", "mg", Mineral, 1092),
    info("sodium", "Sodium", "mg", Mineral, 1093),
    info("zinc", "Zinc", "mg", Mineral, 1095),
    info("copper", "Copper", "µg", Mineral, 1098),
    info("manganese", "Manganese", "mg", Mineral, 1101),
    info("selenium", "Selenium", "µg", Mineral, 1103),
    info("molybdenum", "Molybdenum", "µg", Mineral, 1102),
    info("vitamin_a", "Vitamin A", "µg", Vitamin, 1106),
    info("vitamin_c", "Vitamin C", "mg", Vitamin, 1162),
    info("vitamin_d", "Vitamin D", "µg", Vitamin, 1114),
    info("vitamin_e", "Vitamin E", "mg", Vitamin, 1109),
    info("vitamin_k", "Vitamin K", "µg", Vitamin, 1185),
    info("thiamin", "Thiamin (B1)", "mg", Vitamin, 1165),
    info("riboflavin", "Riboflavin (B2)", "mg", Vitamin, 1166),
    info("niacin", "Niacin (B3)", "mg", Vitamin, 1167),
    info("pantothenic_acid", "Pantothenic Acid (B5)", "mg", Vitamin, 1170),
    info("vitamin_b6", "Vitamin B6", "mg", Vitamin, 1175),
    info("biotin", "Biotin (B7)", "µg", Vitamin, 1176),
    info("folate", "Folate (B9)", "µg", Vitamin, 1177),
    info("vitamin_b12", "Vitamin B12", "µg", Vitamin, 1178),
    info("choline", "Choline", "mg", Vitamin, 1180),
    info("histidine", "Histidine", "mg", AminoAcid, 1221),
    info("isoleucine", "Isoleucine", "mg", AminoAcid, 1212),
    info("leucine", "Leucine", "mg", AminoAcid, 1213),
    info("lysine", "Lysine", "mg", AminoAcid, 1214),
    info("methionine", "Methionine", "mg", AminoAcid, 1215),
    info("phenylalanine", "Phenylalanine", "mg", AminoAcid, 1217),
    info("threonine", "Threonine", "mg", AminoAcid, 1211),
    info("tryptophan", "Tryptophan", "mg", AminoAcid, 1210),
    info("valine", "Valine", "mg", AminoAcid, 1219),
    info("alanine", "Alanine", "mg", AminoAcid, 1222),
    info("arginine", "Arginine", "mg", AminoAcid, 1220),
    info("aspartic_acid", "Aspartic Acid", "mg", AminoAcid, 1223),
    info("cystine", "Cystine", "mg", AminoAcid, 1216),
    info("glutamic_acid", "Glutamic Acid", "mg", AminoAcid, 1224),
    info("glycine", "Glycine", "mg", AminoAcid, 1225),
    info("proline", "Proline", "mg", AminoAcid, 1226),
    info("serine", "Serine", "mg", AminoAcid, 1227),
    info("tyrosine", "Tyrosine", "mg", AminoAcid, 1218),
];

/// 目錄以外、但代表同一營養素的 FDC 編號
const FDC_ALIASES: &[(u32, &str)] = &[
    (2047, "energy"), // Atwater General Factors
    (2048, "energy"), // Atwater Specific Factors
    (1050, "carbohydrate"),
    (1063, "sugar"),
];

/// FDC 營養素名稱的前綴對照，順序即優先順序
const NAME_PREFIXES: &[(&str, &str)] = &[
    ("protein", "protein"),
    ("total lipid (fat)", "fat"),
    ("fatty acids, total saturated", "saturated"),
    ("fatty acids, total monounsaturated", "monounsaturated"),
    ("fatty acids, total polyunsaturated", "polyunsaturated"),
    ("fatty acids, total trans", "trans"),
    ("carbohydrate, by", "carbohydrate"),
    ("fiber, total dietary", "fiber"),
    ("sugars, total", "sugar"),
    ("total sugars", "sugar"),
    ("calcium, ca", "calcium"),
    ("iron, fe", "iron"),
    ("magnesium, mg", "magnesium"),
    ("phosphorus, p", "phosphorus"),
    ("potassium, k", "potassium"),
    ("sodium, na", "sodium"),
    ("zinc, zn", "zinc"),
    ("copper, cu", "copper"),
    ("manganese, mn", "manganese"),
    ("selenium, se", "selenium"),
    ("vitamin c", "vitamin_c"),
    ("vitamin a, rae", "vitamin_a"),
    ("vitamin d (d2 + d3), international units", "vitamin_d_iu"),
    ("vitamin d (d2 + d3)", "vitamin_d"),
    ("vitamin e (alpha-tocopherol)", "vitamin_e"),
    ("vitamin k (phylloquinone)", "vitamin_k"),
    ("vitamin b-6", "vitamin_b6"),
    ("vitamin b-12", "vitamin_b12"),
    ("folate, total", "folate"),
    ("choline, total", "choline"),
    ("cholesterol", "cholesterol"),
    ("water", "water"),
    ("energy", "energy"),
];

pub fn by_id(id: &str) -> Option<&'static NutrientInfo> {
    NUTRIENTS.iter().find(|n| n.id.eq_ignore_ascii_case(id))
}

pub fn by_fdc_id(fdc_id: u32) -> Option<&'static NutrientInfo> {
    NUTRIENTS.iter().find(|n| n.fdc_id == fdc_id).or_else(|| {
        FDC_ALIASES
            .iter()
            .find(|(alias, _)| *alias == fdc_id)
            .and_then(|(_, id)| by_id(id))
    })
}

/// 依代號或顯示名稱查詢（不分大小寫）
pub fn by_name(name: &str) -> Option<&'static NutrientInfo> {
    let name = name.trim();
    by_id(name).or_else(|| {
        NUTRIENTS
            .iter()
            .find(|n| n.display_name.eq_ignore_ascii_case(name))
    })
}

pub fn in_group(group: NutrientGroup) -> impl Iterator<Item = &'static NutrientInfo> {
    NUTRIENTS.iter().filter(move |n| n.group == group)
}

/// 把 FDC 營養素對應到目錄代號：先看編號，再看名稱，最後用名稱轉成的代號
pub fn catalogue_id(nutrient: &Nutrient) -> String {
    if let Some(info) = by_fdc_id(nutrient.id) {
        return info.id.to_string();
    }

    let lower = nutrient.name.trim().to_lowercase();
    if let Some((_, id)) = NAME_PREFIXES
        .iter()
        .find(|(prefix, _)| lower.starts_with(prefix))
    {
        return id.to_string();
    }
    if let Some(info) = by_name(&lower) {
        return info.id.to_string();
    }

    slug(&lower)
}

fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_is_consistent() {
        let mut ids: Vec<_> = NUTRIENTS.iter().map(|n| n.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), NUTRIENTS.len());
        assert!(NUTRIENTS.len() >= 60);
        assert_eq!(in_group(NutrientGroup::Mineral).count(), 11);
        assert_eq!(in_group(NutrientGroup::Vitamin).count(), 14);
    }

    #[test]
    fn test_lookups() {
        assert_eq!(by_fdc_id(1003).unwrap().id, "protein");
        assert_eq!(by_fdc_id(2047).unwrap().id, "energy");
        assert!(by_fdc_id(9999).is_none());
        assert_eq!(by_name("Vitamin C").unwrap().id, "vitamin_c");
        assert_eq!(by_name("TOTAL FAT").unwrap().id, "fat");
        assert_eq!(by_name("iron").unwrap().display_name, "Iron");
        assert!(by_name("unobtainium").is_none());
    }

    #[test]
    fn test_catalogue_id_mapping() {
        assert_eq!(catalogue_id(&Nutrient::new(1004, "Total lipid (fat)", 1.0, "g")), "fat");
        // 名稱對照
        assert_eq!(catalogue_id(&Nutrient::new(0, "Protein", 1.0, "g")), "protein");
        assert_eq!(
            catalogue_id(&Nutrient::new(0, "Carbohydrate, by difference", 1.0, "g")),
            "carbohydrate"
        );
        assert_eq!(
            catalogue_id(&Nutrient::new(0, "Calcium, Ca", 1.0, "mg")),
            "calcium"
        );
        assert_eq!(catalogue_id(&Nutrient::new(0, "Energy", 1.0, "kJ")), "energy");
        // 其他名稱轉成代號
        assert_eq!(
            catalogue_id(&Nutrient::new(0, "Vitamin A, IU", 1.0, "IU")),
            "vitamin_a_iu"
        );
        assert_eq!(
            catalogue_id(&Nutrient::new(0, "Fatty acids, total trans-monoenoic", 1.0, "g")),
            "trans"
        );
    }
}
