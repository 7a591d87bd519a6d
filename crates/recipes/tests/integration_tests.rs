use fridgefriend_recipes::{RecipeClient, RecipeError, Ranking, SearchOptions};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn matches_body() -> serde_json::Value {
    json!([
        {
            "id": 101,
            "title": "Egg Fried Rice",
            "image": "https://img.example/101.jpg",
            "usedIngredientCount": 2,
            "missedIngredientCount": 1,
            "usedIngredients": [{ "name": "eggs", "amount": 2.0 }, { "name": "rice" }],
            "missedIngredients": [{ "name": "scallions" }],
            "likes": 12
        },
        {
            "id": 202,
            "title": "Milk Toast",
            "usedIngredientCount": 1,
            "missedIngredientCount": 0,
            "usedIngredients": [{ "name": "milk" }],
            "missedIngredients": []
        }
    ])
}

#[tokio::test]
async fn test_search_sends_joined_ingredients_and_applies_defaults() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/recipes/findByIngredients"))
        .and(query_param("ingredients", "eggs,rice,milk"))
        .and(query_param("number", "50"))
        .and(query_param("ranking", "2"))
        .and(query_param("ignorePantry", "true"))
        .and(query_param("apiKey", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(matches_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = RecipeClient::new(&server.uri(), "test-key", reqwest::Client::new());
    let recipes = client
        .search(&["eggs", "rice", " milk "], &SearchOptions::default())
        .await
        .unwrap();

    assert_eq!(recipes.len(), 2);
    assert_eq!(recipes[0].id, "101");
    assert_eq!(recipes[0].used_ingredients.len(), 2);
    assert_eq!(recipes[0].ready_in_minutes, 30);
    assert_eq!(recipes[1].image, None);
    assert_eq!(
        recipes[1].source_url,
        "https://spoonacular.com/recipes/Milk-Toast-202"
    );
}

#[tokio::test]
async fn test_search_with_details_merges_information() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/recipes/findByIngredients"))
        .and(query_param("ranking", "1"))
        .and(query_param("number", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(matches_body()))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/recipes/101/information"))
        .and(query_param("includeNutrition", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 101,
            "readyInMinutes": 20,
            "servings": 3,
            "sourceUrl": "https://food.example/egg-fried-rice"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/recipes/202/information"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 202,
            "readyInMinutes": 5,
            "servings": 1,
            "image": "https://img.example/202.jpg"
        })))
        .mount(&server)
        .await;

    let client = RecipeClient::new(&server.uri(), "test-key", reqwest::Client::new());
    let options = SearchOptions {
        number: 10,
        ranking: Ranking::MaximizeUsed,
        include_details: true,
        ..Default::default()
    };
    let recipes = client.search(&["eggs"], &options).await.unwrap();

    assert_eq!(recipes[0].ready_in_minutes, 20);
    assert_eq!(recipes[0].source_url, "https://food.example/egg-fried-rice");
    assert_eq!(recipes[1].servings, 1);
    assert_eq!(recipes[1].image.as_deref(), Some("https://img.example/202.jpg"));
}

#[tokio::test]
async fn test_quota_error_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/recipes/findByIngredients"))
        .respond_with(ResponseTemplate::new(402).set_body_string("daily points limit reached"))
        .mount(&server)
        .await;

    let client = RecipeClient::new(&server.uri(), "test-key", reqwest::Client::new());
    let result = client.search(&["eggs"], &SearchOptions::default()).await;

    match result {
        Err(RecipeError::ApiError { status, message }) => {
            assert_eq!(status, 402);
            assert!(message.contains("limit"));
        }
        other => panic!("Expected RecipeError::ApiError, got {:?}", other),
    }
}
