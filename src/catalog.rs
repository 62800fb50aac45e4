//! Catalog snapshot: categories, items and staff users fetched from the
//! backend, held in one canonical shape for the browsing and admin screens.

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::info;

use crate::api::ApiError;
use crate::models::{Category, Item, User};

/// Read side of the catalog/user endpoints.
#[async_trait]
pub trait CatalogBackend: Send + Sync {
    async fn fetch_categories(&self) -> Result<Vec<Category>, ApiError>;
    async fn fetch_items(&self) -> Result<Vec<Item>, ApiError>;
    async fn fetch_users(&self) -> Result<Vec<User>, ApiError>;
}

#[derive(Debug, Clone, Default)]
pub struct CatalogStore {
    categories: Vec<Category>,
    items: Vec<Item>,
    users: Vec<User>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch categories, items and users (in that order) and install them.
    /// Nothing is replaced unless all three fetches succeed.
    pub async fn refresh(&mut self, backend: &dyn CatalogBackend) -> Result<(), ApiError> {
        let categories = backend.fetch_categories().await?;
        let items = backend.fetch_items().await?;
        let users = backend.fetch_users().await?;
        info!(
            categories = categories.len(),
            items = items.len(),
            users = users.len(),
            "Catalog refreshed"
        );
        self.categories = categories;
        self.items = items;
        self.users = users;
        Ok(())
    }

    pub fn replace_categories(&mut self, categories: Vec<Category>) {
        self.categories = categories;
    }

    pub fn replace_items(&mut self, items: Vec<Item>) {
        self.items = items;
    }

    pub fn replace_users(&mut self, users: Vec<User>) {
        self.users = users;
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn find_item(&self, item_id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.item_id == item_id)
    }

    /// Items of one category; an empty id selects every item.
    pub fn items_in_category(&self, category_id: &str) -> Vec<&Item> {
        let category_id = category_id.trim();
        self.items
            .iter()
            .filter(|i| category_id.is_empty() || i.category_id == category_id)
            .collect()
    }

    /// Case-insensitive substring search on item names.
    pub fn search_items(&self, term: &str) -> Vec<&Item> {
        let needle = term.trim().to_lowercase();
        self.items
            .iter()
            .filter(|i| i.name.to_lowercase().contains(&needle))
            .collect()
    }

    /// Number of items per category id, counted from the local snapshot.
    pub fn category_item_counts(&self) -> HashMap<&str, usize> {
        let mut counts: HashMap<&str, usize> = self
            .categories
            .iter()
            .map(|c| (c.category_id.as_str(), 0))
            .collect();
        for item in &self.items {
            *counts.entry(item.category_id.as_str()).or_insert(0) += 1;
        }
        counts
    }

    // -- Local mutation after successful admin calls -------------------------

    pub fn upsert_item(&mut self, item: Item) {
        match self.items.iter_mut().find(|i| i.item_id == item.item_id) {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
    }

    pub fn remove_item(&mut self, item_id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.item_id != item_id);
        self.items.len() != before
    }

    pub fn upsert_category(&mut self, category: Category) {
        match self
            .categories
            .iter_mut()
            .find(|c| c.category_id == category.category_id)
        {
            Some(existing) => *existing = category,
            None => self.categories.push(category),
        }
    }

    /// Removes the category and the items filed under it.
    pub fn remove_category(&mut self, category_id: &str) -> bool {
        let before = self.categories.len();
        self.categories.retain(|c| c.category_id != category_id);
        if self.categories.len() == before {
            return false;
        }
        self.items.retain(|i| i.category_id != category_id);
        true
    }

    pub fn upsert_user(&mut self, user: User) {
        match self.users.iter_mut().find(|u| u.user_id == user.user_id) {
            Some(existing) => *existing = user,
            None => self.users.push(user),
        }
    }

    pub fn remove_user(&mut self, user_id: &str) -> bool {
        let before = self.users.len();
        self.users.retain(|u| u.user_id != user_id);
        self.users.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedBackend {
        fail_users: bool,
    }

    #[async_trait]
    impl CatalogBackend for FixedBackend {
        async fn fetch_categories(&self) -> Result<Vec<Category>, ApiError> {
            Ok(vec![category("c1", "Printing"), category("c2", "Binding")])
        }

        async fn fetch_items(&self) -> Result<Vec<Item>, ApiError> {
            Ok(vec![
                item("i1", "Colour Print A4", "c1"),
                item("i2", "B/W Print A4", "c1"),
                item("i3", "Spiral Binding", "c2"),
            ])
        }

        async fn fetch_users(&self) -> Result<Vec<User>, ApiError> {
            if self.fail_users {
                return Err(ApiError::Status {
                    status: 403,
                    message: "You are not permitted to perform this action".to_string(),
                });
            }
            Ok(vec![User {
                user_id: "u1".to_string(),
                name: "Kiran".to_string(),
                email: "kiran@example.com".to_string(),
                role: "ROLE_USER".to_string(),
            }])
        }
    }

    fn category(id: &str, name: &str) -> Category {
        Category {
            category_id: id.to_string(),
            name: name.to_string(),
            description: None,
            bg_color: None,
            img_url: None,
            items: None,
        }
    }

    fn item(id: &str, name: &str, category_id: &str) -> Item {
        Item {
            item_id: id.to_string(),
            name: name.to_string(),
            price: 5.0,
            category_id: category_id.to_string(),
            description: None,
            img_url: None,
        }
    }

    #[tokio::test]
    async fn refresh_installs_all_three_snapshots() {
        let mut store = CatalogStore::new();
        store
            .refresh(&FixedBackend { fail_users: false })
            .await
            .expect("refresh");
        assert_eq!(store.categories().len(), 2);
        assert_eq!(store.items().len(), 3);
        assert_eq!(store.users().len(), 1);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let mut store = CatalogStore::new();
        store.replace_items(vec![item("old", "Old Item", "c1")]);
        let result = store.refresh(&FixedBackend { fail_users: true }).await;
        assert!(result.is_err());
        assert_eq!(store.items().len(), 1);
        assert_eq!(store.items()[0].item_id, "old");
    }

    #[test]
    fn search_and_category_filters() {
        let mut store = CatalogStore::new();
        store.replace_categories(vec![category("c1", "Printing"), category("c2", "Binding")]);
        store.replace_items(vec![
            item("i1", "Colour Print A4", "c1"),
            item("i2", "B/W Print A4", "c1"),
            item("i3", "Spiral Binding", "c2"),
        ]);
        assert_eq!(store.search_items("print a4").len(), 2);
        assert_eq!(store.search_items("").len(), 3);
        assert_eq!(store.items_in_category("c2").len(), 1);
        assert_eq!(store.items_in_category("").len(), 3);
        let counts = store.category_item_counts();
        assert_eq!(counts.get("c1"), Some(&2));
        assert_eq!(counts.get("c2"), Some(&1));
    }

    #[test]
    fn removing_category_drops_its_items() {
        let mut store = CatalogStore::new();
        store.replace_categories(vec![category("c1", "Printing"), category("c2", "Binding")]);
        store.replace_items(vec![
            item("i1", "Colour Print A4", "c1"),
            item("i3", "Spiral Binding", "c2"),
        ]);
        assert!(store.remove_category("c2"));
        assert!(!store.remove_category("c2"));
        assert_eq!(store.items().len(), 1);
        assert!(store.find_item("i3").is_none());
    }

    #[test]
    fn upsert_replaces_by_id() {
        let mut store = CatalogStore::new();
        store.upsert_item(item("i1", "Colour Print A4", "c1"));
        let mut renamed = item("i1", "Colour Print A3", "c1");
        renamed.price = 12.0;
        store.upsert_item(renamed);
        assert_eq!(store.items().len(), 1);
        assert_eq!(store.items()[0].name, "Colour Print A3");
        assert_eq!(store.items()[0].price, 12.0);
    }
}
