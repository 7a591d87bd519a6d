use serde::{Deserialize, Serialize};

pub const DEFAULT_READY_IN_MINUTES: u32 = 30;
pub const DEFAULT_SERVINGS: u32 = 2;

/// How the provider ranks ingredient matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ranking {
    /// Maximise the number of pantry ingredients used
    MaximizeUsed,
    /// Minimise the number of ingredients still to buy
    #[default]
    MinimizeMissing,
}

impl Ranking {
    pub fn as_param(&self) -> &'static str {
        match self {
            Ranking::MaximizeUsed => "1",
            Ranking::MinimizeMissing => "2",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub number: u32,
    pub ranking: Ranking,
    pub ignore_pantry: bool,
    /// Fetch `/information` per match for timing, servings and source URL
    pub include_details: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            number: 50,
            ranking: Ranking::MinimizeMissing,
            ignore_pantry: true,
            include_details: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
}

/// One row of `findByIngredients`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngredientMatch {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub used_ingredient_count: u32,
    #[serde(default)]
    pub missed_ingredient_count: u32,
    #[serde(default)]
    pub used_ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub missed_ingredients: Vec<Ingredient>,
}

/// The subset of `/recipes/{id}/information` the app reads
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeInformation {
    pub id: u64,
    #[serde(default)]
    pub ready_in_minutes: Option<u32>,
    #[serde(default)]
    pub servings: Option<u32>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Recipe summary shown to the user. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipe {
    pub id: String,
    pub title: String,
    pub image: Option<String>,
    pub ready_in_minutes: u32,
    pub servings: u32,
    pub source_url: String,
    pub used_ingredient_count: u32,
    pub missed_ingredient_count: u32,
    pub used_ingredients: Vec<Ingredient>,
    pub missed_ingredients: Vec<Ingredient>,
}

impl Recipe {
    /// Merges a match with optional details; zero or missing timing and
    /// servings fall back to the defaults.
    pub fn from_match(m: IngredientMatch, info: Option<&RecipeInformation>) -> Self {
        let ready_in_minutes = info
            .and_then(|i| i.ready_in_minutes)
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_READY_IN_MINUTES);
        let servings = info
            .and_then(|i| i.servings)
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_SERVINGS);
        let source_url = info
            .and_then(|i| i.source_url.clone())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| fallback_source_url(&m.title, m.id));
        let image = m.image.or_else(|| info.and_then(|i| i.image.clone()));

        Self {
            id: m.id.to_string(),
            title: m.title,
            image,
            ready_in_minutes,
            servings,
            source_url,
            used_ingredient_count: m.used_ingredient_count,
            missed_ingredient_count: m.missed_ingredient_count,
            used_ingredients: m.used_ingredients,
            missed_ingredients: m.missed_ingredients,
        }
    }
}

/// `https://spoonacular.com/recipes/{title-with-dashes}-{id}`
pub fn fallback_source_url(title: &str, id: u64) -> String {
    format!("https://spoonacular.com/recipes/{}-{}", title.replace(' ', "-"), id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_match() -> IngredientMatch {
        IngredientMatch {
            id: 716429,
            title: "Pasta with Garlic".to_string(),
            image: Some("https://img.example/716429.jpg".to_string()),
            used_ingredient_count: 2,
            missed_ingredient_count: 1,
            used_ingredients: vec![Ingredient { name: "garlic".to_string() }],
            missed_ingredients: vec![Ingredient { name: "basil".to_string() }],
        }
    }

    #[test]
    fn test_defaults_without_details() {
        let recipe = Recipe::from_match(sample_match(), None);

        assert_eq!(recipe.id, "716429");
        assert_eq!(recipe.ready_in_minutes, 30);
        assert_eq!(recipe.servings, 2);
        assert_eq!(
            recipe.source_url,
            "https://spoonacular.com/recipes/Pasta-with-Garlic-716429"
        );
    }

    #[test]
    fn test_details_override_defaults() {
        let info = RecipeInformation {
            id: 716429,
            ready_in_minutes: Some(45),
            servings: Some(4),
            source_url: Some("https://blog.example/pasta".to_string()),
            image: None,
        };

        let recipe = Recipe::from_match(sample_match(), Some(&info));

        assert_eq!(recipe.ready_in_minutes, 45);
        assert_eq!(recipe.servings, 4);
        assert_eq!(recipe.source_url, "https://blog.example/pasta");
    }

    #[test]
    fn test_zero_minutes_falls_back() {
        let info = RecipeInformation {
            id: 716429,
            ready_in_minutes: Some(0),
            servings: None,
            source_url: None,
            image: None,
        };

        let recipe = Recipe::from_match(sample_match(), Some(&info));

        assert_eq!(recipe.ready_in_minutes, 30);
        assert_eq!(recipe.servings, 2);
    }
}
