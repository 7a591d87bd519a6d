//! Recipe suggestions from the current inventory

use std::str::FromStr;

use tokio::sync::RwLock;
use tracing::{debug, info};

use fridgefriend_recipes::{Recipe, SearchOptions};

use crate::error::{Error, Result};
use crate::models::FoodItem;
use crate::FridgeFriend;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecipeSort {
    /// Most inventory ingredients used first
    #[default]
    Relevance,
    /// Quickest first
    Time,
}

impl FromStr for RecipeSort {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "relevance" => Ok(RecipeSort::Relevance),
            "time" => Ok(RecipeSort::Time),
            other => Err(Error::invalid_input(format!("unknown sort '{}'", other))),
        }
    }
}

/// Stable sort; equal keys keep their order
pub fn sort_recipes(recipes: &mut [Recipe], sort: RecipeSort) {
    match sort {
        RecipeSort::Relevance => {
            recipes.sort_by(|a, b| b.used_ingredient_count.cmp(&a.used_ingredient_count))
        }
        RecipeSort::Time => recipes.sort_by_key(|r| r.ready_in_minutes),
    }
}

/// Case-insensitive title match; a blank term keeps everything
pub fn filter_by_title(recipes: &[Recipe], term: &str) -> Vec<Recipe> {
    let term = term.trim().to_lowercase();
    recipes
        .iter()
        .filter(|r| term.is_empty() || r.title.to_lowercase().contains(&term))
        .cloned()
        .collect()
}

/// Distinct item names in inventory order
pub fn ingredient_names(items: &[FoodItem]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for item in items {
        let name = item.name.trim();
        if !name.is_empty() && !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            names.push(name.to_string());
        }
    }
    names
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeQuery {
    pub search: Option<String>,
    pub sort: RecipeSort,
    /// One-based; out of range pages are clamped
    pub page: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipePage {
    pub recipes: Vec<Recipe>,
    pub page: usize,
    pub total_pages: usize,
    pub total_matches: usize,
}

pub fn paginate(recipes: Vec<Recipe>, page: usize, per_page: usize) -> RecipePage {
    let per_page = per_page.max(1);
    let total_matches = recipes.len();
    let total_pages = total_matches.div_ceil(per_page);
    let page = page.clamp(1, total_pages.max(1));

    let recipes = recipes
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .collect();

    RecipePage {
        recipes,
        page,
        total_pages,
        total_matches,
    }
}

/// Fetched suggestions plus search, sort and paging over them
pub struct RecipeBrowser {
    client: FridgeFriend,
    recipes: RwLock<Vec<Recipe>>,
}

impl RecipeBrowser {
    pub fn new(client: FridgeFriend) -> Self {
        Self {
            client,
            recipes: RwLock::new(Vec::new()),
        }
    }

    /// Searches recipes using the inventory's item names. An empty
    /// inventory clears the suggestions without a request.
    pub async fn load_suggestions(&self, items: &[FoodItem]) -> Result<Vec<Recipe>> {
        let ingredients = ingredient_names(items);
        if ingredients.is_empty() {
            debug!("inventory is empty, no recipe search");
            self.recipes.write().await.clear();
            return Ok(Vec::new());
        }

        let options = self.client.options();
        let search = SearchOptions {
            number: options.recipe_count,
            ranking: options.recipe_ranking,
            ..Default::default()
        };
        let recipes = self
            .client
            .recipes()?
            .search(&ingredients, &search)
            .await?;

        info!(count = recipes.len(), "recipe suggestions loaded");
        *self.recipes.write().await = recipes.clone();
        Ok(recipes)
    }

    pub async fn recipes(&self) -> Vec<Recipe> {
        self.recipes.read().await.clone()
    }

    pub async fn view(&self, query: &RecipeQuery) -> RecipePage {
        let recipes = self.recipes.read().await;
        let mut matching = filter_by_title(&recipes, query.search.as_deref().unwrap_or(""));
        sort_recipes(&mut matching, query.sort);
        paginate(matching, query.page, self.client.options().recipes_per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(id: u32, title: &str, used: u32, minutes: u32) -> Recipe {
        Recipe {
            id: id.to_string(),
            title: title.to_string(),
            image: None,
            ready_in_minutes: minutes,
            servings: 2,
            source_url: String::new(),
            used_ingredient_count: used,
            missed_ingredient_count: 0,
            used_ingredients: Vec::new(),
            missed_ingredients: Vec::new(),
        }
    }

    fn ids(recipes: &[Recipe]) -> Vec<&str> {
        recipes.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_relevance_sort_is_stable_and_descending() {
        let mut recipes = vec![
            recipe(1, "Omelette", 1, 10),
            recipe(2, "Pancakes", 3, 25),
            recipe(3, "Quiche", 1, 60),
            recipe(4, "Custard", 3, 40),
        ];
        sort_recipes(&mut recipes, RecipeSort::Relevance);
        assert_eq!(ids(&recipes), vec!["2", "4", "1", "3"]);
        assert!(recipes
            .windows(2)
            .all(|w| w[0].used_ingredient_count >= w[1].used_ingredient_count));
    }

    #[test]
    fn test_time_sort_ascending() {
        let mut recipes = vec![
            recipe(1, "Stew", 2, 90),
            recipe(2, "Salad", 1, 10),
            recipe(3, "Toast", 1, 10),
        ];
        sort_recipes(&mut recipes, RecipeSort::Time);
        assert_eq!(ids(&recipes), vec!["2", "3", "1"]);
    }

    #[test]
    fn test_pagination_clamps() {
        let recipes: Vec<Recipe> = (1..=20).map(|i| recipe(i, "Dish", 0, 30)).collect();

        let first = paginate(recipes.clone(), 1, 9);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.recipes.len(), 9);

        let last = paginate(recipes.clone(), 7, 9);
        assert_eq!(last.page, 3);
        assert_eq!(ids(&last.recipes), vec!["19", "20"]);

        let empty = paginate(Vec::new(), 0, 9);
        assert_eq!(empty.page, 1);
        assert_eq!(empty.total_pages, 0);
        assert!(empty.recipes.is_empty());
    }

    #[test]
    fn test_title_filter_and_sort_parse() {
        let recipes = vec![recipe(1, "Egg Fried Rice", 2, 20), recipe(2, "Tomato Soup", 1, 30)];
        assert_eq!(ids(&filter_by_title(&recipes, "RICE")), vec!["1"]);
        assert_eq!(filter_by_title(&recipes, "  ").len(), 2);

        assert_eq!("Time".parse::<RecipeSort>().unwrap(), RecipeSort::Time);
        assert!("fastest".parse::<RecipeSort>().is_err());
    }
}
