//! Configuration for the FridgeFriend client

use std::env;
use std::time::Duration;

use fridgefriend_recipes::Ranking;
use url::Url;

use crate::error::{Error, Result};

/// Backend project and third-party service settings
#[derive(Debug, Clone)]
pub struct FridgeFriendConfig {
    pub url: Url,
    pub anon_key: String,
    pub email: Option<EmailConfig>,
    pub recipes: Option<RecipeConfig>,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub base_url: String,
    pub service_id: String,
    pub template_id: String,
    /// Template for expiry digests; the notification template is used when unset
    pub expiry_template_id: Option<String>,
    pub user_id: String,
    pub access_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RecipeConfig {
    pub base_url: String,
    pub api_key: String,
}

impl FridgeFriendConfig {
    pub fn new(url: &str, anon_key: &str) -> Result<Self> {
        let url = Url::parse(url)?;
        if anon_key.trim().is_empty() {
            return Err(Error::config("anon_key cannot be empty"));
        }
        Ok(Self {
            url,
            anon_key: anon_key.to_string(),
            email: None,
            recipes: None,
        })
    }

    pub fn with_email(mut self, email: EmailConfig) -> Self {
        self.email = Some(email);
        self
    }

    pub fn with_recipes(mut self, recipes: RecipeConfig) -> Self {
        self.recipes = Some(recipes);
        self
    }

    /// Reads settings from the environment, loading a `.env` file first if present.
    ///
    /// Required: `SUPABASE_URL`, `SUPABASE_ANON_KEY`.
    /// Email: `EMAILJS_SERVICE_ID`, `EMAILJS_TEMPLATE_ID`, `EMAILJS_USER_ID`
    /// (all or none), plus optional `EMAILJS_EXPIRY_TEMPLATE_ID`,
    /// `EMAILJS_ACCESS_TOKEN`, `EMAILJS_URL`.
    /// Recipes: `SPOONACULAR_API_KEY`, optional `SPOONACULAR_URL`.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let url = required_env("SUPABASE_URL")?;
        let anon_key = required_env("SUPABASE_ANON_KEY")?;
        let mut config = Self::new(&url, &anon_key)?;

        let email_vars = [
            optional_env("EMAILJS_SERVICE_ID"),
            optional_env("EMAILJS_TEMPLATE_ID"),
            optional_env("EMAILJS_USER_ID"),
        ];
        match email_vars {
            [Some(service_id), Some(template_id), Some(user_id)] => {
                config.email = Some(EmailConfig {
                    base_url: optional_env("EMAILJS_URL")
                        .unwrap_or_else(|| fridgefriend_email::DEFAULT_BASE_URL.to_string()),
                    service_id,
                    template_id,
                    expiry_template_id: optional_env("EMAILJS_EXPIRY_TEMPLATE_ID"),
                    user_id,
                    access_token: optional_env("EMAILJS_ACCESS_TOKEN"),
                });
            }
            [None, None, None] => {}
            _ => {
                return Err(Error::config(
                    "EMAILJS_SERVICE_ID, EMAILJS_TEMPLATE_ID and EMAILJS_USER_ID must be set together",
                ))
            }
        }

        if let Some(api_key) = optional_env("SPOONACULAR_API_KEY") {
            config.recipes = Some(RecipeConfig {
                base_url: optional_env("SPOONACULAR_URL")
                    .unwrap_or_else(|| fridgefriend_recipes::DEFAULT_BASE_URL.to_string()),
                api_key,
            });
        }

        Ok(config)
    }
}

fn required_env(name: &str) -> Result<String> {
    optional_env(name).ok_or_else(|| Error::config(format!("{} must be set", name)))
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Behaviour knobs for the client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// The request timeout
    pub request_timeout: Option<Duration>,

    /// Trailing window in which an identical notification is not stored again
    pub notification_dedup_window: chrono::Duration,

    /// Number of recipe matches requested per search
    pub recipe_count: u32,

    pub recipe_ranking: Ranking,

    pub recipes_per_page: usize,

    /// Items listed under "needs attention" on the dashboard
    pub attention_limit: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(30)),
            notification_dedup_window: chrono::Duration::hours(24),
            recipe_count: 50,
            recipe_ranking: Ranking::MinimizeMissing,
            recipes_per_page: 9,
            attention_limit: 5,
        }
    }
}

impl ClientOptions {
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    pub fn with_notification_dedup_window(mut self, value: chrono::Duration) -> Self {
        self.notification_dedup_window = value;
        self
    }

    pub fn with_recipe_count(mut self, value: u32) -> Self {
        self.recipe_count = value;
        self
    }

    pub fn with_recipe_ranking(mut self, value: Ranking) -> Self {
        self.recipe_ranking = value;
        self
    }

    /// Zero is treated as one
    pub fn with_recipes_per_page(mut self, value: usize) -> Self {
        self.recipes_per_page = value.max(1);
        self
    }

    pub fn with_attention_limit(mut self, value: usize) -> Self {
        self.attention_limit = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validity() {
        let config = FridgeFriendConfig::new("https://example.supabase.co", "anon");
        assert!(config.is_ok());

        let empty_key = FridgeFriendConfig::new("https://example.supabase.co", " ");
        assert!(matches!(empty_key, Err(Error::Config(_))));

        let bad_url = FridgeFriendConfig::new("not a url", "anon");
        assert!(matches!(bad_url, Err(Error::Url(_))));
    }

    #[test]
    fn test_option_builders() {
        let options = ClientOptions::default()
            .with_recipes_per_page(0)
            .with_notification_dedup_window(chrono::Duration::hours(1));

        assert_eq!(options.recipes_per_page, 1);
        assert_eq!(options.notification_dedup_window, chrono::Duration::hours(1));
        assert_eq!(options.attention_limit, 5);
    }
}
