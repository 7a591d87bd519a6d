//! Recipe search client for FridgeFriend
//!
//! Finds recipes that use a list of ingredients through the Spoonacular
//! REST API and merges the optional per-recipe details into [`Recipe`]
//! summaries.

mod types;

pub use types::*;

use futures_util::future::try_join_all;
use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.spoonacular.com";

#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Recipe API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

pub type Result<T> = std::result::Result<T, RecipeError>;

#[derive(Debug, Clone)]
pub struct RecipeClient {
    base_url: String,
    api_key: String,
    http_client: Client,
}

impl RecipeClient {
    pub fn new(base_url: &str, api_key: &str, http_client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http_client,
        }
    }

    /// `GET /recipes/findByIngredients`
    pub async fn find_by_ingredients<S: AsRef<str>>(
        &self,
        ingredients: &[S],
        options: &SearchOptions,
    ) -> Result<Vec<IngredientMatch>> {
        let joined = ingredients
            .iter()
            .map(|i| i.as_ref().trim())
            .filter(|i| !i.is_empty())
            .collect::<Vec<_>>()
            .join(",");

        let mut url = Url::parse(&format!("{}/recipes/findByIngredients", self.base_url))?;
        url.query_pairs_mut()
            .append_pair("ingredients", &joined)
            .append_pair("number", &options.number.to_string())
            .append_pair("ranking", options.ranking.as_param())
            .append_pair("ignorePantry", &options.ignore_pantry.to_string())
            .append_pair("apiKey", &self.api_key);

        self.get_json(url).await
    }

    /// `GET /recipes/{id}/information`
    pub async fn recipe_information(&self, id: u64) -> Result<RecipeInformation> {
        let mut url = Url::parse(&format!("{}/recipes/{}/information", self.base_url, id))?;
        url.query_pairs_mut()
            .append_pair("includeNutrition", "false")
            .append_pair("apiKey", &self.api_key);

        self.get_json(url).await
    }

    /// Searches by ingredients and builds [`Recipe`] summaries, fetching
    /// details concurrently when `include_details` is set.
    pub async fn search<S: AsRef<str>>(
        &self,
        ingredients: &[S],
        options: &SearchOptions,
    ) -> Result<Vec<Recipe>> {
        let matches = self.find_by_ingredients(ingredients, options).await?;
        log::debug!("{} recipe matches", matches.len());

        if !options.include_details {
            return Ok(matches
                .into_iter()
                .map(|m| Recipe::from_match(m, None))
                .collect());
        }

        let details =
            try_join_all(matches.iter().map(|m| self.recipe_information(m.id))).await?;

        Ok(matches
            .into_iter()
            .zip(details.iter())
            .map(|(m, info)| Recipe::from_match(m, Some(info)))
            .collect())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.http_client.get(url).send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            log::warn!("recipe API returned {}: {}", status, body);
            return Err(RecipeError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        serde_json::from_str(&body).map_err(|e| RecipeError::DeserializationError(e.to_string()))
    }
}
