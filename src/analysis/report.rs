//! Chart.js 圖表資料與 HTML 報告

use crate::analysis::analyze::{NutrientAnalysis, NutrientValue};
use crate::analysis::nutrients::NutrientGroup;
use crate::utils::error::Result;
use askama::Template;
use serde_json::{json, Value};

/// DRI 長條圖預設只列出達 1% 以上的營養素
pub const DEFAULT_MIN_PERCENT: f64 = 1.0;
const RADAR_CAP: f64 = 100.0;

pub fn macronutrient_chart(analysis: &NutrientAnalysis) -> Value {
    let dist = &analysis.macronutrient_distribution;
    let share = |key: &str| dist.get(key).copied().unwrap_or(0.0);

    json!({
        "type": "pie",
        "data": {
            "labels": ["Protein", "Fat", "Carbohydrate"],
            "datasets": [{
                "data": [share("protein"), share("fat"), share("carbohydrate")],
                "backgroundColor": ["#FF6384", "#36A2EB", "#FFCE56"]
            }]
        },
        "options": {
            "title": {
                "display": true,
                "text": format!("Macronutrient Distribution for {}", analysis.food.description)
            }
        }
    })
}

/// 依 DRI 百分比由高到低排列；`nutrient_ids` 為 None 時列出全部
pub fn dri_chart(
    analysis: &NutrientAnalysis,
    nutrient_ids: Option<&[String]>,
    min_percent: f64,
) -> Value {
    let mut values: Vec<(&NutrientValue, f64)> = analysis
        .nutrients
        .iter()
        .filter(|(id, _)| nutrient_ids.map_or(true, |ids| ids.iter().any(|i| i == *id)))
        .filter_map(|(_, value)| value.dri_percent.map(|p| (value, p)))
        .filter(|(_, percent)| *percent >= min_percent)
        .collect();
    values.sort_by(|a, b| b.1.total_cmp(&a.1));

    let labels: Vec<&str> = values.iter().map(|(v, _)| v.name.as_str()).collect();
    let data: Vec<f64> = values.iter().map(|(_, p)| *p).collect();

    json!({
        "type": "horizontalBar",
        "data": {
            "labels": labels,
            "datasets": [{
                "label": format!("% of {}", analysis.dri_type),
                "data": data,
                "backgroundColor": "rgba(54, 162, 235, 0.5)",
                "borderColor": "rgba(54, 162, 235, 1)",
                "borderWidth": 1
            }]
        },
        "options": {
            "title": {
                "display": true,
                "text": format!("{} Percentages for {}", analysis.dri_type, analysis.food.description)
            },
            "scales": { "xAxes": [{ "ticks": { "beginAtZero": true } }] }
        }
    })
}

pub fn comparison_chart(analyses: &[NutrientAnalysis], nutrient_id: &str) -> Value {
    let hits: Vec<(&NutrientAnalysis, &NutrientValue)> = analyses
        .iter()
        .filter_map(|a| a.get_nutrient(nutrient_id).map(|v| (a, v)))
        .collect();
    let name = hits
        .first()
        .map(|(_, v)| v.name.clone())
        .unwrap_or_else(|| "Unknown".to_string());
    let labels: Vec<&str> = hits.iter().map(|(a, _)| a.food.description.as_str()).collect();
    let data: Vec<f64> = hits.iter().map(|(_, v)| v.amount).collect();

    json!({
        "type": "bar",
        "data": {
            "labels": labels,
            "datasets": [{
                "label": format!("{} Content", name),
                "data": data,
                "backgroundColor": "rgba(75, 192, 192, 0.5)",
                "borderColor": "rgba(75, 192, 192, 1)",
                "borderWidth": 1
            }]
        },
        "options": {
            "title": { "display": true, "text": format!("{} Comparison", name) },
            "scales": { "yAxes": [{ "ticks": { "beginAtZero": true } }] }
        }
    })
}

/// 雷達圖的百分比上限為 100
pub fn radar_chart(analysis: &NutrientAnalysis, nutrient_ids: &[String]) -> Value {
    let (labels, data): (Vec<&str>, Vec<f64>) = nutrient_ids
        .iter()
        .filter_map(|id| analysis.get_nutrient(id))
        .filter_map(|v| v.dri_percent.map(|p| (v.name.as_str(), p.min(RADAR_CAP))))
        .unzip();

    json!({
        "type": "radar",
        "data": {
            "labels": labels,
            "datasets": [{
                "label": analysis.food.description,
                "data": data,
                "backgroundColor": "rgba(54, 162, 235, 0.2)",
                "borderColor": "rgba(54, 162, 235, 1)",
                "pointBackgroundColor": "rgba(54, 162, 235, 1)",
                "pointBorderColor": "#fff"
            }]
        },
        "options": {
            "title": {
                "display": true,
                "text": format!("Nutrient Profile for {}", analysis.food.description)
            },
            "scale": { "ticks": { "beginAtZero": true, "max": RADAR_CAP } }
        }
    })
}

struct ReportRow {
    name: String,
    amount: String,
    dri_percent: String,
}

impl From<&NutrientValue> for ReportRow {
    fn from(value: &NutrientValue) -> Self {
        Self {
            name: value.name.clone(),
            amount: format!("{:.1} {}", value.amount, value.unit),
            dri_percent: value
                .dri_percent
                .map(|p| format!("{:.1}%", p))
                .unwrap_or_else(|| "N/A".to_string()),
        }
    }
}

struct ReportSection {
    title: &'static str,
    rows: Vec<ReportRow>,
}

#[derive(Template)]
#[template(path = "analysis_report.html")]
struct AnalysisReportTemplate {
    description: String,
    fdc_id: u32,
    data_type: String,
    serving_size: String,
    calories: String,
    dri_label: String,
    sections: Vec<ReportSection>,
    macro_chart_json: String,
    dri_chart_json: String,
}

/// 嵌入 `<script>` 的 JSON：`<`、`>`、`&` 改寫成 Unicode 跳脫，避免提早結束標籤
fn script_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(value)?
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026"))
}

const MACRO_ROWS: &[&str] = &["protein", "fat", "carbohydrate", "fiber"];

pub fn render_html_report(analysis: &NutrientAnalysis) -> Result<String> {
    let macros = MACRO_ROWS
        .iter()
        .filter_map(|id| analysis.get_nutrient(id))
        .map(ReportRow::from)
        .collect();
    let section = |group: NutrientGroup| ReportSection {
        title: group.label(),
        rows: analysis
            .nutrients_in_group(group)
            .into_iter()
            .map(ReportRow::from)
            .collect(),
    };

    let template = AnalysisReportTemplate {
        description: analysis.food.description.clone(),
        fdc_id: analysis.food.fdc_id,
        data_type: analysis.food.data_type.clone(),
        serving_size: format!("{:.1}", analysis.serving_size),
        calories: format!("{:.1}", analysis.calories_per_serving),
        dri_label: format!(
            "{} ({}, {} years)",
            analysis.dri_type, analysis.gender, analysis.age
        ),
        sections: vec![
            ReportSection {
                title: NutrientGroup::Macronutrient.label(),
                rows: macros,
            },
            section(NutrientGroup::Vitamin),
            section(NutrientGroup::Mineral),
        ],
        macro_chart_json: script_json(&macronutrient_chart(analysis))?,
        dri_chart_json: script_json(&dri_chart(analysis, None, DEFAULT_MIN_PERCENT))?,
    };

    Ok(template.render()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze::{analyze_food, AnalysisOptions};
    use crate::domain::model::{Food, Nutrient};

    fn analysis() -> NutrientAnalysis {
        let food = Food::new(1750340, "Apple <raw>", "Foundation").with_nutrients(vec![
            Nutrient::new(1008, "Energy", 52.0, "kcal"),
            Nutrient::new(1003, "Protein", 0.26, "g"),
            Nutrient::new(1004, "Total lipid (fat)", 0.17, "g"),
            Nutrient::new(1005, "Carbohydrate, by difference", 13.8, "g"),
            Nutrient::new(1162, "Vitamin C, total ascorbic acid", 4.6, "mg"),
            Nutrient::new(1106, "Vitamin A, RAE", 3.0, "µg"),
            Nutrient::new(1089, "Iron, Fe", 0.12, "mg"),
            Nutrient::new(1087, "Calcium, Ca", 6.0, "mg"),
        ]);
        analyze_food(&food, &AnalysisOptions::default()).unwrap()
    }

    #[test]
    fn test_dri_chart_sorted_and_filtered() {
        let analysis = analysis();
        let chart = dri_chart(&analysis, None, DEFAULT_MIN_PERCENT);
        let data: Vec<f64> = chart["data"]["datasets"][0]["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_f64().unwrap())
            .collect();
        assert!(data.windows(2).all(|w| w[0] >= w[1]));
        assert!(data.iter().all(|p| *p >= 1.0));
        // 維生素 A 3 µg / 900 µg 不到 1%
        let labels = chart["data"]["labels"].as_array().unwrap();
        assert!(!labels.iter().any(|l| l == "Vitamin A"));
        assert_eq!(labels[0], "Carbohydrate");
        assert!(labels.iter().any(|l| l == "Vitamin C"));

        let only = vec!["iron".to_string()];
        let chart = dri_chart(&analysis, Some(&only), 0.0);
        assert_eq!(chart["data"]["labels"], json!(["Iron"]));
    }

    #[test]
    fn test_radar_chart_caps_percent() {
        let food = Food::new(1, "Orange juice", "Foundation")
            .with_nutrients(vec![Nutrient::new(1162, "Vitamin C", 200.0, "mg")]);
        let analysis = analyze_food(&food, &AnalysisOptions::default()).unwrap();
        let chart = radar_chart(&analysis, &["vitamin_c".to_string(), "iron".to_string()]);
        assert_eq!(chart["data"]["datasets"][0]["data"], json!([100.0]));
        assert_eq!(chart["type"], "radar");
    }

    #[test]
    fn test_comparison_and_macro_charts() {
        let analyses = vec![analysis(), analysis()];
        let chart = comparison_chart(&analyses, "protein");
        assert_eq!(chart["data"]["datasets"][0]["label"], "Protein Content");
        assert_eq!(chart["data"]["labels"].as_array().unwrap().len(), 2);

        let empty = comparison_chart(&analyses, "unobtainium");
        assert_eq!(empty["options"]["title"]["text"], "Unknown Comparison");

        let pie = macronutrient_chart(&analyses[0]);
        let total: f64 = pie["data"]["datasets"][0]["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_f64().unwrap())
            .sum();
        assert!((total - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_script_json_escapes_markup() {
        let value = json!({"title": "Bar </script><script>alert(1)</script> & co"});
        let escaped = script_json(&value).unwrap();
        assert!(!escaped.contains('<'));
        assert!(!escaped.contains('>'));
        assert!(!escaped.contains('&'));
        // 跳脫後仍是相同的 JSON
        assert_eq!(serde_json::from_str::<Value>(&escaped).unwrap(), value);
    }

    #[test]
    fn test_render_html_report_with_markup_in_description() {
        let food = Food::new(42, "Bar </script><script>alert(1)</script>", "Branded")
            .with_nutrients(vec![
                Nutrient::new(1008, "Energy", 480.0, "kcal"),
                Nutrient::new(1003, "Protein", 20.0, "g"),
                Nutrient::new(1162, "Vitamin C", 30.0, "mg"),
                Nutrient::new(1089, "Iron, Fe", 4.0, "mg"),
            ]);
        let analysis = analyze_food(&food, &AnalysisOptions::default()).unwrap();
        let html = render_html_report(&analysis).unwrap();

        assert!(!html.contains("<script>alert(1)"));
        assert_eq!(html.matches("</script>").count(), 2);
        assert!(html.contains("Bar &lt;"));
    }

    #[test]
    fn test_render_html_report() {
        let html = render_html_report(&analysis()).unwrap();
        assert!(html.contains("Apple &lt;raw&gt;"));
        assert!(html.contains("FDC ID: 1750340"));
        assert!(html.contains("Vitamins"));
        assert!(html.contains("Minerals"));
        assert!(html.contains("Vitamin C"));
        assert!(html.contains("\"type\":\"pie\""));
        assert!(html.contains("52.0 kcal"));
    }
}
