//! 膳食營養素參考攝取量（DRI）查詢
//!
//! 參考值以 JSON 嵌入執行檔：營養素代號 → 性別 → 年齡區間（`"19-30"`、`"71+"`）→ 數值，
//! 數值單位與營養素目錄一致。

use crate::utils::error::{FdcError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriType {
    /// Recommended Dietary Allowance
    #[default]
    Rda,
    /// Adequate Intake
    Ai,
    /// Tolerable Upper Intake Level
    Ul,
    /// Estimated Average Requirement
    Ear,
}

impl DriType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriType::Rda => "rda",
            DriType::Ai => "ai",
            DriType::Ul => "ul",
            DriType::Ear => "ear",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DriType::Rda => "RDA",
            DriType::Ai => "AI",
            DriType::Ul => "UL",
            DriType::Ear => "EAR",
        }
    }
}

impl fmt::Display for DriType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DriType {
    type Err = FdcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "rda" => Ok(DriType::Rda),
            "ai" => Ok(DriType::Ai),
            "ul" => Ok(DriType::Ul),
            "ear" => Ok(DriType::Ear),
            other => Err(FdcError::validation(format!(
                "Unknown DRI type '{}' (expected rda, ai, ul or ear)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[default]
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = FdcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            other => Err(FdcError::validation(format!(
                "Unknown gender '{}' (expected male or female)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AgeRange {
    min: u32,
    max: Option<u32>,
}

impl AgeRange {
    fn parse(key: &str) -> Option<Self> {
        if let Some(min) = key.strip_suffix('+') {
            return Some(Self {
                min: min.trim().parse().ok()?,
                max: None,
            });
        }
        let (min, max) = key.split_once('-')?;
        let range = Self {
            min: min.trim().parse().ok()?,
            max: Some(max.trim().parse().ok()?),
        };
        (range.max >= Some(range.min)).then_some(range)
    }

    fn contains(&self, age: u32) -> bool {
        age >= self.min && self.max.map_or(true, |max| age <= max)
    }
}

type Brackets = Vec<(AgeRange, f64)>;

/// 單一 DRI 類型的參考值表
#[derive(Debug, Clone, Default)]
pub struct DriTable {
    entries: HashMap<String, HashMap<Gender, Brackets>>,
}

impl DriTable {
    pub fn get(&self, nutrient_id: &str, gender: Gender, age: u32) -> Option<f64> {
        self.entries
            .get(&nutrient_id.to_lowercase())?
            .get(&gender)?
            .iter()
            .find(|(range, _)| range.contains(age))
            .map(|(_, value)| *value)
    }

    pub fn nutrient_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 解析 DRI JSON，年齡區間格式錯誤時回傳錯誤
pub fn load_table(raw: &str) -> Result<DriTable> {
    let parsed: HashMap<String, HashMap<Gender, BTreeMap<String, f64>>> =
        serde_json::from_str(raw)?;

    let mut entries = HashMap::with_capacity(parsed.len());
    for (nutrient, genders) in parsed {
        let mut by_gender = HashMap::with_capacity(genders.len());
        for (gender, brackets) in genders {
            let mut ranges = Vec::with_capacity(brackets.len());
            for (key, value) in brackets {
                let range = AgeRange::parse(&key).ok_or_else(|| FdcError::ConfigError {
                    message: format!("Invalid DRI age range '{}' for {}", key, nutrient),
                })?;
                ranges.push((range, value));
            }
            ranges.sort_by_key(|(range, _)| range.min);
            by_gender.insert(gender, ranges);
        }
        entries.insert(nutrient.to_lowercase(), by_gender);
    }

    Ok(DriTable { entries })
}

fn embedded(dri_type: DriType) -> &'static str {
    match dri_type {
        DriType::Rda => include_str!("../../resources/dri/rda.json"),
        DriType::Ai => include_str!("../../resources/dri/ai.json"),
        DriType::Ul => include_str!("../../resources/dri/ul.json"),
        DriType::Ear => include_str!("../../resources/dri/ear.json"),
    }
}

fn cell(dri_type: DriType) -> &'static OnceLock<DriTable> {
    static RDA: OnceLock<DriTable> = OnceLock::new();
    static AI: OnceLock<DriTable> = OnceLock::new();
    static UL: OnceLock<DriTable> = OnceLock::new();
    static EAR: OnceLock<DriTable> = OnceLock::new();
    match dri_type {
        DriType::Rda => &RDA,
        DriType::Ai => &AI,
        DriType::Ul => &UL,
        DriType::Ear => &EAR,
    }
}

/// 取得內建參考值表（首次使用時解析）
pub fn table(dri_type: DriType) -> &'static DriTable {
    cell(dri_type).get_or_init(|| match load_table(embedded(dri_type)) {
        Ok(table) => table,
        Err(e) => {
            warn!("⚠️ 無法載入 {} 參考值表: {}", dri_type.label(), e);
            DriTable::default()
        }
    })
}

/// 查詢某營養素在指定性別、年齡的參考值；無資料時回傳 None
pub fn get_dri(nutrient_id: &str, dri_type: DriType, gender: Gender, age: u32) -> Option<f64> {
    if age == 0 {
        return None;
    }
    table(dri_type).get(nutrient_id, gender, age)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_tables_parse() {
        for dri_type in [DriType::Rda, DriType::Ai, DriType::Ul, DriType::Ear] {
            let table = load_table(embedded(dri_type)).unwrap();
            assert!(!table.is_empty(), "{} table is empty", dri_type);
            for id in table.nutrient_ids() {
                assert!(
                    crate::analysis::nutrients::by_id(id).is_some(),
                    "{} is not in the nutrient catalogue",
                    id
                );
            }
        }
    }

    #[test]
    fn test_get_dri_by_gender_and_age() {
        assert_eq!(get_dri("vitamin_c", DriType::Rda, Gender::Male, 30), Some(90.0));
        assert_eq!(get_dri("vitamin_c", DriType::Rda, Gender::Female, 30), Some(75.0));
        assert_eq!(get_dri("iron", DriType::Rda, Gender::Female, 25), Some(18.0));
        assert_eq!(get_dri("iron", DriType::Rda, Gender::Female, 60), Some(8.0));
        assert_eq!(get_dri("calcium", DriType::Rda, Gender::Male, 75), Some(1200.0));
        assert_eq!(get_dri("protein", DriType::Rda, Gender::Male, 2), Some(13.0));
        assert_eq!(get_dri("fiber", DriType::Ai, Gender::Female, 40), Some(25.0));
        assert_eq!(get_dri("vitamin_d", DriType::Ul, Gender::Female, 30), Some(100.0));
    }

    #[test]
    fn test_get_dri_missing() {
        assert_eq!(get_dri("unobtainium", DriType::Rda, Gender::Male, 30), None);
        // RDA 沒有鉀，不會自動改查 AI
        assert_eq!(get_dri("potassium", DriType::Rda, Gender::Male, 30), None);
        assert_eq!(get_dri("vitamin_c", DriType::Rda, Gender::Male, 0), None);
        assert_eq!(get_dri("VITAMIN_C", DriType::Rda, Gender::Male, 30), Some(90.0));
    }

    #[test]
    fn test_load_table_rejects_bad_ranges() {
        let raw = r#"{"iron": {"male": {"30-19": 8}}}"#;
        assert!(matches!(load_table(raw), Err(FdcError::ConfigError { .. })));

        let raw = r#"{"iron": {"male": {"adult": 8}}}"#;
        assert!(load_table(raw).is_err());

        let raw = r#"{"Iron": {"female": {"19-50": 18, "51+": 8}}}"#;
        let table = load_table(raw).unwrap();
        assert_eq!(table.get("iron", Gender::Female, 51), Some(8.0));
        assert_eq!(table.get("iron", Gender::Male, 51), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!("UL".parse::<DriType>().unwrap(), DriType::Ul);
        assert_eq!("female".parse::<Gender>().unwrap(), Gender::Female);
        assert!("amdr".parse::<DriType>().is_err());
        assert!("other".parse::<Gender>().is_err());
    }
}
