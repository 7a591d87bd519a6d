//! Storage location breakdown of the inventory

use crate::models::FoodItem;

/// Item counts per storage location, in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageDistribution {
    counts: Vec<(String, usize)>,
    total: usize,
}

impl StorageDistribution {
    pub fn from_items(items: &[FoodItem]) -> Self {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for item in items {
            match counts.iter_mut().find(|(location, _)| *location == item.location) {
                Some((_, count)) => *count += 1,
                None => counts.push((item.location.clone(), 1)),
            }
        }
        Self {
            counts,
            total: items.len(),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn count(&self, location: &str) -> usize {
        self.counts
            .iter()
            .find(|(l, _)| l == location)
            .map(|(_, c)| *c)
            .unwrap_or(0)
    }

    /// Percentage of all items stored at `location`
    pub fn share(&self, location: &str) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.count(location) as f64 / self.total as f64 * 100.0
    }

    pub fn entries(&self) -> &[(String, usize)] {
        &self.counts
    }

    /// Largest location first; ties keep first-seen order
    pub fn entries_by_count(&self) -> Vec<(String, usize)> {
        let mut entries = self.counts.clone();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries
    }
}

/// `"refrigerator"` -> `"Refrigerator"`
pub fn display_name(location: &str) -> String {
    let mut chars = location.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(location: &str) -> FoodItem {
        FoodItem {
            id: String::new(),
            name: "thing".to_string(),
            quantity: 1,
            unit: "piece".to_string(),
            category: "other".to_string(),
            purchased: String::new(),
            expiration: "2024-05-01".to_string(),
            location: location.to_string(),
            notes: None,
            user_id: String::new(),
            household_id: String::new(),
            created_at: String::new(),
        }
    }

    #[test]
    fn test_counts_and_shares() {
        let items: Vec<FoodItem> = ["pantry", "refrigerator", "refrigerator", "freezer", "refrigerator", "pantry"]
            .iter()
            .map(|l| stored(l))
            .collect();

        let distribution = StorageDistribution::from_items(&items);
        assert_eq!(distribution.total(), 6);
        assert_eq!(distribution.count("refrigerator"), 3);
        assert_eq!(distribution.share("refrigerator"), 50.0);
        assert_eq!(distribution.share("cabinet"), 0.0);

        let sum: f64 = distribution
            .entries()
            .iter()
            .map(|(location, _)| distribution.share(location))
            .sum();
        assert!((sum - 100.0).abs() < 1e-9);

        let ordered: Vec<String> = distribution
            .entries_by_count()
            .into_iter()
            .map(|(l, _)| l)
            .collect();
        assert_eq!(ordered, vec!["refrigerator", "pantry", "freezer"]);
        assert_eq!(distribution.entries()[0].0, "pantry");
    }

    #[test]
    fn test_empty_inventory() {
        let distribution = StorageDistribution::from_items(&[]);
        assert!(distribution.is_empty());
        assert!(distribution.entries().is_empty());
        assert_eq!(distribution.share("pantry"), 0.0);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("refrigerator"), "Refrigerator");
        assert_eq!(display_name(""), "");
    }
}
