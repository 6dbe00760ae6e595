use httpmock::prelude::*;
use serde_json::json;
use std::time::Duration;
use usda_fdc::{
    AuthMode, FdcClient, FdcError, FoodOptions, FoodSource, ListQuery, SearchQuery, SortOrder,
};

fn client_for(server: &MockServer, max_retries: u32) -> FdcClient {
    FdcClient::builder()
        .api_key("test-key")
        .base_url(server.url("/fdc/v1"))
        .max_retries(max_retries)
        .backoff_base(Duration::from_millis(1))
        .max_backoff(Duration::from_millis(5))
        .build()
        .unwrap()
}

fn food_json(fdc_id: u32, description: &str) -> serde_json::Value {
    json!({
        "fdcId": fdc_id,
        "description": description,
        "dataType": "Foundation",
        "publicationDate": "2019-04-01",
        "foodNutrients": [
            {"nutrient": {"id": 1003, "number": "203", "name": "Protein", "unitName": "g"}, "amount": 0.26},
            {"nutrient": {"id": 1008, "number": "208", "name": "Energy", "unitName": "kcal"}, "amount": 52.0}
        ],
        "foodPortions": [
            {"id": 1, "amount": 1.0, "gramWeight": 182.0, "measureUnit": {"name": "cup"}}
        ]
    })
}

#[tokio::test]
async fn test_search_sends_query_params() {
    let server = MockServer::start();
    let search_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/fdc/v1/foods/search")
            .query_param("api_key", "test-key")
            .query_param("query", "apple")
            .query_param("dataType", "Foundation,SR Legacy")
            .query_param("pageSize", "10")
            .query_param("pageNumber", "2")
            .query_param("sortBy", "dataType.keyword")
            .query_param("sortOrder", "desc");
        then.status(200).json_body(json!({
            "totalHits": 12,
            "currentPage": 2,
            "totalPages": 2,
            "foods": [
                {"fdcId": 1750340, "description": "Apples, raw", "dataType": "Foundation", "score": 410.2}
            ]
        }));
    });

    let client = client_for(&server, 0);
    let query = SearchQuery::new("apple")
        .data_types(["Foundation", "SR Legacy"])
        .page_size(10)
        .page_number(2)
        .sort("dataType.keyword", SortOrder::Desc);
    let result = client.search(&query).await.unwrap();

    search_mock.assert();
    assert_eq!(result.total_hits, 12);
    assert!(result.is_last_page());
    assert_eq!(result.foods[0].fdc_id, 1750340);
    assert_eq!(result.foods[0].score, Some(410.2));
}

#[tokio::test]
async fn test_get_food_parses_details() {
    let server = MockServer::start();
    let food_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/fdc/v1/food/1750340")
            .query_param("format", "full")
            .query_param("api_key", "test-key");
        then.status(200).json_body(food_json(1750340, "Apples, raw"));
    });

    let client = client_for(&server, 0);
    let food = client
        .get_food(1750340, &FoodOptions::default())
        .await
        .unwrap();

    food_mock.assert();
    assert_eq!(food.description, "Apples, raw");
    assert_eq!(food.nutrient_by_id(1008).unwrap().amount, 52.0);
    assert_eq!(food.food_portions[0].gram_weight, 182.0);

    let nutrients = client.get_nutrients(1750340).await.unwrap();
    assert_eq!(nutrients.len(), 2);
    food_mock.assert_hits(2);
}

#[tokio::test]
async fn test_unauthorized_maps_to_auth_error() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/fdc/v1/foods/search");
        then.status(401)
            .json_body(json!({"error": {"code": "API_KEY_INVALID", "message": "An invalid api_key was supplied"}}));
    });

    let client = client_for(&server, 3);
    let err = client.search(&SearchQuery::new("apple")).await.unwrap_err();

    // 認證錯誤不重試
    mock.assert_hits(1);
    match err {
        FdcError::AuthError { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "An invalid api_key was supplied");
        }
        other => panic!("expected AuthError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rate_limit_is_retried_then_surfaced() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/fdc/v1/food/1750340");
        then.status(429)
            .header("Retry-After", "0")
            .body("Too Many Requests");
    });

    let client = client_for(&server, 2);
    let err = client
        .get_food(1750340, &FoodOptions::default())
        .await
        .unwrap_err();

    mock.assert_hits(3);
    assert!(matches!(
        err,
        FdcError::RateLimitError {
            retry_after: Some(0),
            ..
        }
    ));
    assert!(err.is_api_error());
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/fdc/v1/food/999999");
        then.status(404).body("");
    });

    let client = client_for(&server, 3);
    let err = client
        .get_food(999999, &FoodOptions::default())
        .await
        .unwrap_err();

    mock.assert_hits(1);
    assert!(matches!(err, FdcError::NotFoundError { .. }));
    assert_eq!(err.status_code(), Some(404));
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/fdc/v1/foods/search");
        then.status(503).json_body(json!({"message": "Service Unavailable"}));
    });

    let client = client_for(&server, 3);
    let err = client.search(&SearchQuery::new("apple")).await.unwrap_err();

    mock.assert_hits(4);
    assert!(matches!(
        err,
        FdcError::ApiError {
            status: Some(503),
            ..
        }
    ));
}

#[tokio::test]
async fn test_invalid_input_sends_no_request() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.any_request();
        then.status(200).json_body(json!({}));
    });

    let client = client_for(&server, 0);
    assert!(matches!(
        client.search(&SearchQuery::new("  ")).await,
        Err(FdcError::ValidationError { .. })
    ));
    assert!(client
        .search(&SearchQuery::new("apple").page_size(500))
        .await
        .is_err());
    assert!(client.get_food(0, &FoodOptions::default()).await.is_err());
    assert!(client
        .get_foods(&[], &FoodOptions::default())
        .await
        .unwrap()
        .is_empty());

    mock.assert_hits(0);
}

#[tokio::test]
async fn test_get_foods_is_chunked() {
    let server = MockServer::start();
    let ids: Vec<u32> = (1..=25).collect();

    let first = server.mock(|when, then| {
        when.method(POST)
            .path("/fdc/v1/foods")
            .json_body(json!({"fdcIds": (1..=20).collect::<Vec<u32>>(), "format": "full"}));
        then.status(200).json_body(json!((1..=20)
            .map(|id| food_json(id, "Food"))
            .collect::<Vec<_>>()));
    });
    let second = server.mock(|when, then| {
        when.method(POST)
            .path("/fdc/v1/foods")
            .json_body(json!({"fdcIds": [21, 22, 23, 24, 25], "format": "full"}));
        then.status(200).json_body(json!((21..=25)
            .map(|id| food_json(id, "Food"))
            .collect::<Vec<_>>()));
    });

    let client = client_for(&server, 0);
    let foods = client
        .get_foods(&ids, &FoodOptions::default())
        .await
        .unwrap();

    first.assert();
    second.assert();
    assert_eq!(foods.len(), 25);
    assert_eq!(foods[24].fdc_id, 25);
}

#[tokio::test]
async fn test_list_foods_posts_paging() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/fdc/v1/foods/list")
            .json_body(json!({"dataType": ["Foundation"], "pageSize": 2, "pageNumber": 1}));
        then.status(200).json_body(json!([
            {"fdcId": 1, "description": "A", "dataType": "Foundation",
             "foodNutrients": [{"number": "203", "name": "Protein", "amount": 1.5, "unitName": "G"}]},
            {"fdcId": 2, "description": "B", "dataType": "Foundation"}
        ]));
    });

    let client = client_for(&server, 0);
    let query = ListQuery::default().data_types(["Foundation"]).page_size(2);
    let foods = client.list_foods(&query).await.unwrap();

    mock.assert();
    assert_eq!(foods.len(), 2);
    assert_eq!(foods[0].nutrients[0].amount, 1.5);
}

#[tokio::test]
async fn test_search_all_stops_at_last_page() {
    let server = MockServer::start();
    let page = |number: u32, ids: [u32; 2]| {
        json!({
            "totalHits": 4,
            "currentPage": number,
            "totalPages": 2,
            "foods": ids.iter().map(|id| json!({"fdcId": id, "description": "Apple"})).collect::<Vec<_>>()
        })
    };
    let page_one = server.mock(|when, then| {
        when.method(GET)
            .path("/fdc/v1/foods/search")
            .query_param("pageNumber", "1");
        then.status(200).json_body(page(1, [1, 2]));
    });
    let page_two = server.mock(|when, then| {
        when.method(GET)
            .path("/fdc/v1/foods/search")
            .query_param("pageNumber", "2");
        then.status(200).json_body(page(2, [3, 4]));
    });

    let client = client_for(&server, 0);
    let query = SearchQuery::new("apple").page_size(2);

    let all = client.search_all(&query, None).await.unwrap();
    assert_eq!(all.iter().map(|f| f.fdc_id).collect::<Vec<_>>(), vec![1, 2, 3, 4]);

    let limited = client.search_all(&query, Some(1)).await.unwrap();
    assert_eq!(limited.len(), 1);

    page_one.assert_hits(2);
    page_two.assert_hits(1);
}

#[tokio::test]
async fn test_header_auth_mode() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/fdc/v1/food/1750340")
            .header("X-Api-Key", "test-key");
        then.status(200).json_body(food_json(1750340, "Apples, raw"));
    });

    let client = FdcClient::builder()
        .api_key("test-key")
        .base_url(server.url("/fdc/v1/"))
        .auth_mode(AuthMode::Header)
        .build()
        .unwrap();
    let food = client
        .get_food(1750340, &FoodOptions::default())
        .await
        .unwrap();

    mock.assert();
    assert_eq!(food.fdc_id, 1750340);
}
