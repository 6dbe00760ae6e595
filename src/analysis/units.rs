//! 單位換算：質量以公克、容量以毫升、熱量以大卡為基準。

use crate::utils::error::{FdcError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Mass,
    Volume,
    Energy,
    /// IU 的換算依營養素而定，不做換算
    InternationalUnit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Unit {
    pub name: &'static str,
    pub symbol: &'static str,
    pub kind: UnitKind,
    /// 換算到基準單位（g / ml / kcal）的倍數
    pub factor: f64,
}

const fn unit(name: &'static str, symbol: &'static str, kind: UnitKind, factor: f64) -> Unit {
    Unit {
        name,
        symbol,
        kind,
        factor,
    }
}

pub const GRAM: Unit = unit("gram", "g", UnitKind::Mass, 1.0);
pub const KILOGRAM: Unit = unit("kilogram", "kg", UnitKind::Mass, 1000.0);
pub const MILLIGRAM: Unit = unit("milligram", "mg", UnitKind::Mass, 0.001);
pub const MICROGRAM: Unit = unit("microgram", "µg", UnitKind::Mass, 0.000_001);
pub const OUNCE: Unit = unit("ounce", "oz", UnitKind::Mass, 28.349_523_125);
pub const POUND: Unit = unit("pound", "lb", UnitKind::Mass, 453.592_37);

pub const MILLILITER: Unit = unit("milliliter", "ml", UnitKind::Volume, 1.0);
pub const LITER: Unit = unit("liter", "l", UnitKind::Volume, 1000.0);
pub const TEASPOON: Unit = unit("teaspoon", "tsp", UnitKind::Volume, 4.928_92);
pub const TABLESPOON: Unit = unit("tablespoon", "tbsp", UnitKind::Volume, 14.786_8);
pub const FLUID_OUNCE: Unit = unit("fluid ounce", "fl oz", UnitKind::Volume, 29.573_5);
pub const CUP: Unit = unit("cup", "cup", UnitKind::Volume, 236.588);
pub const PINT: Unit = unit("pint", "pint", UnitKind::Volume, 473.176);
pub const QUART: Unit = unit("quart", "quart", UnitKind::Volume, 946.353);
pub const GALLON: Unit = unit("gallon", "gallon", UnitKind::Volume, 3785.41);

pub const KILOCALORIE: Unit = unit("kilocalorie", "kcal", UnitKind::Energy, 1.0);
pub const KILOJOULE: Unit = unit("kilojoule", "kJ", UnitKind::Energy, 0.239_006);

pub const INTERNATIONAL_UNIT: Unit =
    unit("international unit", "IU", UnitKind::InternationalUnit, 0.0);

const UNIT_ALIASES: &[(&str, Unit)] = &[
    ("g", GRAM),
    ("gm", GRAM),
    ("gram", GRAM),
    ("grams", GRAM),
    ("kg", KILOGRAM),
    ("kilogram", KILOGRAM),
    ("kilograms", KILOGRAM),
    ("mg", MILLIGRAM),
    ("mg_ate", MILLIGRAM),
    ("milligram", MILLIGRAM),
    ("milligrams", MILLIGRAM),
    ("µg", MICROGRAM),
    ("μg", MICROGRAM),
    ("ug", MICROGRAM),
    ("mcg", MICROGRAM),
    ("microgram", MICROGRAM),
    ("micrograms", MICROGRAM),
    ("oz", OUNCE),
    ("ounce", OUNCE),
    ("ounces", OUNCE),
    ("lb", POUND),
    ("lbs", POUND),
    ("pound", POUND),
    ("pounds", POUND),
    ("ml", MILLILITER),
    ("milliliter", MILLILITER),
    ("milliliters", MILLILITER),
    ("millilitre", MILLILITER),
    ("millilitres", MILLILITER),
    ("l", LITER),
    ("liter", LITER),
    ("liters", LITER),
    ("litre", LITER),
    ("litres", LITER),
    ("tsp", TEASPOON),
    ("teaspoon", TEASPOON),
    ("teaspoons", TEASPOON),
    ("tbsp", TABLESPOON),
    ("tablespoon", TABLESPOON),
    ("tablespoons", TABLESPOON),
    ("fl oz", FLUID_OUNCE),
    ("floz", FLUID_OUNCE),
    ("fluid ounce", FLUID_OUNCE),
    ("fluid ounces", FLUID_OUNCE),
    ("cup", CUP),
    ("cups", CUP),
    ("pint", PINT),
    ("pints", PINT),
    ("pt", PINT),
    ("quart", QUART),
    ("quarts", QUART),
    ("qt", QUART),
    ("gallon", GALLON),
    ("gallons", GALLON),
    ("gal", GALLON),
    ("kcal", KILOCALORIE),
    ("kilocalorie", KILOCALORIE),
    ("kilocalories", KILOCALORIE),
    ("cal", KILOCALORIE),
    ("calorie", KILOCALORIE),
    ("calories", KILOCALORIE),
    ("kj", KILOJOULE),
    ("kilojoule", KILOJOULE),
    ("kilojoules", KILOJOULE),
    ("iu", INTERNATIONAL_UNIT),
    ("international unit", INTERNATIONAL_UNIT),
    ("international units", INTERNATIONAL_UNIT),
];

/// 家用份量的概略重量（公克）
const HOUSEHOLD_GRAMS: &[(&str, f64)] = &[
    ("cup", 240.0),
    ("cups", 240.0),
    ("tbsp", 15.0),
    ("tablespoon", 15.0),
    ("tablespoons", 15.0),
    ("tsp", 5.0),
    ("teaspoon", 5.0),
    ("teaspoons", 5.0),
    ("piece", 100.0),
    ("pieces", 100.0),
    ("item", 100.0),
    ("items", 100.0),
    ("slice", 30.0),
    ("slices", 30.0),
];

fn normalize_key(raw: &str) -> String {
    raw.trim()
        .trim_end_matches('.')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// 不分大小寫查詢單位
pub fn lookup_unit(raw: &str) -> Option<Unit> {
    let key = normalize_key(raw);
    UNIT_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, unit)| *unit)
}

pub fn household_grams(raw: &str) -> Option<f64> {
    let key = normalize_key(raw);
    HOUSEHOLD_GRAMS
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, grams)| *grams)
}

fn require_unit(raw: &str, kind: UnitKind) -> Result<Unit> {
    match lookup_unit(raw) {
        Some(unit) if unit.kind == kind => Ok(unit),
        Some(unit) => Err(FdcError::unit(format!(
            "Unit '{}' is a {:?} unit, expected {:?}",
            raw, unit.kind, kind
        ))),
        None => Err(FdcError::unit(format!("Unknown unit: {}", raw))),
    }
}

/// 解析數量字串：整數、小數或分數（`1/2`）
pub fn parse_quantity(raw: &str) -> Result<f64> {
    let raw = raw.trim();
    let value = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num
                .trim()
                .parse()
                .map_err(|_| FdcError::unit(format!("Invalid quantity: {}", raw)))?;
            let den: f64 = den
                .trim()
                .parse()
                .map_err(|_| FdcError::unit(format!("Invalid quantity: {}", raw)))?;
            if den == 0.0 {
                return Err(FdcError::unit(format!("Invalid quantity: {}", raw)));
            }
            num / den
        }
        None => raw
            .parse()
            .map_err(|_| FdcError::unit(format!("Invalid quantity: {}", raw)))?,
    };

    if !value.is_finite() || value < 0.0 {
        return Err(FdcError::unit(format!("Invalid quantity: {}", raw)));
    }
    Ok(value)
}

/// `"100 g"`、`"100g"`、`"1/2 cup"` → `(值, 單位)`
pub fn parse_unit_and_value(text: &str) -> Result<(f64, String)> {
    let text = text.trim();
    let split_at = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '/'))
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split_at);
    let unit = unit.trim();

    if number.is_empty() || unit.is_empty() {
        return Err(FdcError::unit(format!(
            "Expected '<amount> <unit>', got '{}'",
            text
        )));
    }

    Ok((parse_quantity(number)?, unit.to_string()))
}

pub fn convert_to_grams(value: f64, unit: &str) -> Result<f64> {
    Ok(value * require_unit(unit, UnitKind::Mass)?.factor)
}

pub fn convert_from_grams(value: f64, unit: &str) -> Result<f64> {
    Ok(value / require_unit(unit, UnitKind::Mass)?.factor)
}

pub fn convert_to_milliliters(value: f64, unit: &str) -> Result<f64> {
    Ok(value * require_unit(unit, UnitKind::Volume)?.factor)
}

/// 同類單位之間換算；IU 與跨類換算會回傳錯誤
pub fn convert_measurement(value: f64, from: &str, to: &str) -> Result<f64> {
    if normalize_key(from) == normalize_key(to) {
        return Ok(value);
    }

    let from_unit =
        lookup_unit(from).ok_or_else(|| FdcError::unit(format!("Unknown unit: {}", from)))?;
    let to_unit = lookup_unit(to).ok_or_else(|| FdcError::unit(format!("Unknown unit: {}", to)))?;

    if from_unit == to_unit {
        return Ok(value);
    }
    if from_unit.kind == UnitKind::InternationalUnit || to_unit.kind == UnitKind::InternationalUnit
    {
        return Err(FdcError::unit(format!(
            "Cannot convert between {} and {}",
            from, to
        )));
    }
    if from_unit.kind != to_unit.kind {
        return Err(FdcError::unit(format!(
            "Cannot convert {:?} unit '{}' to {:?} unit '{}'",
            from_unit.kind, from, to_unit.kind, to
        )));
    }

    Ok(value * from_unit.factor / to_unit.factor)
}

/// 可換算時回傳換算值與目標單位符號，否則原值原單位
pub fn normalize_nutrient_value(value: f64, from: &str, to: &str) -> (f64, String) {
    match convert_measurement(value, from, to) {
        Ok(converted) => {
            let symbol = lookup_unit(to)
                .map(|u| u.symbol.to_string())
                .unwrap_or_else(|| to.to_string());
            (converted, symbol)
        }
        Err(_) => (value, from.to_string()),
    }
}

pub fn format_amount(amount: f64, unit: &str, precision: usize) -> String {
    format!("{:.*} {}", precision, amount, unit)
}

/// `"1 cup"` → 公克；質量單位精確換算，家用單位查表
pub fn quantity_to_grams(text: &str) -> Result<f64> {
    let (value, unit) = parse_unit_and_value(text)?;
    if let Ok(grams) = convert_to_grams(value, &unit) {
        return Ok(grams);
    }
    household_grams(&unit)
        .map(|grams| value * grams)
        .ok_or_else(|| FdcError::unit(format!("Cannot convert '{}' to grams", unit)))
}
