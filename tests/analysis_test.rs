use httpmock::prelude::*;
use serde_json::json;
use usda_fdc::analysis::{
    analyze_food, analyze_recipe, compare_foods, create_recipe, render_html_report,
    AnalysisOptions, DriType, Gender,
};
use usda_fdc::{FdcClient, FoodOptions, FoodSource};

fn client_for(server: &MockServer) -> FdcClient {
    FdcClient::builder()
        .api_key("test-key")
        .base_url(server.url("/fdc/v1"))
        .max_retries(0)
        .build()
        .unwrap()
}

fn nutrient(id: u32, name: &str, unit: &str, amount: f64) -> serde_json::Value {
    json!({"nutrient": {"id": id, "name": name, "unitName": unit}, "amount": amount})
}

fn oats_json() -> serde_json::Value {
    json!({
        "fdcId": 100,
        "description": "Oats, rolled",
        "dataType": "SR Legacy",
        "foodNutrients": [
            nutrient(1008, "Energy", "kcal", 379.0),
            nutrient(1003, "Protein", "g", 13.15),
            nutrient(1089, "Iron, Fe", "mg", 4.25)
        ],
        "foodPortions": [
            {"id": 1, "amount": 1.0, "gramWeight": 81.0, "measureUnit": {"name": "cup"}}
        ]
    })
}

fn milk_json() -> serde_json::Value {
    json!({
        "fdcId": 200,
        "description": "Milk, whole",
        "dataType": "Foundation",
        "foodNutrients": [
            nutrient(1008, "Energy", "kcal", 61.0),
            nutrient(1003, "Protein", "g", 3.2),
            nutrient(1087, "Calcium, Ca", "mg", 123.0)
        ]
    })
}

fn mock_search(server: &MockServer, query: &str, ids: &[u32]) {
    let foods: Vec<_> = ids
        .iter()
        .map(|id| json!({"fdcId": id, "description": query}))
        .collect();
    server.mock(|when, then| {
        when.method(GET)
            .path("/fdc/v1/foods/search")
            .query_param("query", query);
        then.status(200).json_body(json!({
            "totalHits": foods.len(), "currentPage": 1, "totalPages": 1, "foods": foods
        }));
    });
}

fn mock_food(server: &MockServer, fdc_id: u32, body: serde_json::Value) {
    server.mock(|when, then| {
        when.method(GET).path(format!("/fdc/v1/food/{}", fdc_id));
        then.status(200).json_body(body);
    });
}

#[tokio::test]
async fn test_analyze_fetched_food_against_female_rda() {
    let server = MockServer::start();
    mock_food(&server, 100, oats_json());
    let client = client_for(&server);

    let food = client.get_food(100, &FoodOptions::default()).await.unwrap();
    let options = AnalysisOptions::default()
        .with_serving_size(50.0)
        .with_dri(DriType::Rda, Gender::Female, 25);
    let analysis = analyze_food(&food, &options).unwrap();

    assert!((analysis.calories_per_serving - 189.5).abs() < 1e-9);
    let iron = analysis.get_nutrient("iron").unwrap();
    assert!((iron.amount - 2.125).abs() < 1e-9);
    assert_eq!(iron.dri, Some(18.0));
    assert!((iron.dri_percent.unwrap() - 2.125 / 18.0 * 100.0).abs() < 1e-9);

    let html = render_html_report(&analysis).unwrap();
    assert!(html.contains("Oats, rolled"));
}

#[tokio::test]
async fn test_compare_fetched_foods() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/fdc/v1/foods");
        then.status(200).json_body(json!([oats_json(), milk_json()]));
    });
    let client = client_for(&server);

    let foods = client
        .get_foods(&[100, 200], &FoodOptions::default())
        .await
        .unwrap();
    let ids = vec!["protein".to_string(), "calcium".to_string()];
    let comparison = compare_foods(&foods, Some(ids.as_slice()), None, &AnalysisOptions::default()).unwrap();

    assert_eq!(comparison.len(), 2);
    assert_eq!(comparison[0].entries.len(), 2);
    assert_eq!(comparison[0].entries[0].food, "Oats, rolled");
    // 燕麥沒有鈣的資料
    assert_eq!(comparison[1].entries.len(), 1);
    assert_eq!(comparison[1].entries[0].food, "Milk, whole");
    assert_eq!(comparison[1].entries[0].amount, 123.0);
}

#[tokio::test]
async fn test_recipe_from_ingredient_lines() {
    let server = MockServer::start();
    mock_search(&server, "oats", &[100]);
    mock_search(&server, "milk", &[200]);
    mock_search(&server, "dragonfruit", &[]);
    mock_food(&server, 100, oats_json());
    mock_food(&server, 200, milk_json());
    let client = client_for(&server);

    let lines = ["1 cup oats", "100 g milk", "1 dragonfruit"];
    let recipe = create_recipe("Porridge", &lines, &client, 2, None)
        .await
        .unwrap();

    // 找不到的食材略過
    assert_eq!(recipe.ingredients.len(), 2);
    assert_eq!(recipe.ingredients[0].weight_g, 81.0);
    assert_eq!(recipe.ingredients[1].weight_g, 100.0);
    assert_eq!(recipe.total_weight_g(), 181.0);

    let analysis = analyze_recipe(&recipe, &AnalysisOptions::default()).unwrap();
    let total_kcal = 379.0 * 0.81 + 61.0;
    assert!((analysis.total.calories_per_serving - total_kcal).abs() < 1e-9);
    assert!((analysis.per_serving.calories_per_serving - total_kcal / 2.0).abs() < 1e-9);
    assert!((analysis.per_serving.serving_size - 90.5).abs() < 1e-9);
    assert_eq!(analysis.ingredients.len(), 2);
    assert_eq!(analysis.per_serving.food.data_type, "Recipe");

    let protein = analysis.total.get_nutrient("protein").unwrap();
    assert!((protein.amount - (13.15 * 0.81 + 3.2)).abs() < 1e-9);
}

#[tokio::test]
async fn test_recipe_requires_servings() {
    let server = MockServer::start();
    let client = client_for(&server);
    let lines = ["1 cup oats"];

    assert!(create_recipe("Empty", &lines, &client, 0, None)
        .await
        .is_err());
}
