use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{
    not_found, quantity_out_of_range, AdvertisementRepository, CategoryRepository,
    InventoryRepository, ProductRepository,
};
use crate::error::{AppError, AppResult};
use crate::models::*;

/// In-process store used when no database is configured and by the tests.
/// Every operation takes the single lock once, so multi-step operations
/// (cascading deletes, `add_stock`) are atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    categories: BTreeMap<i64, Category>,
    products: BTreeMap<i64, Product>,
    inventory: BTreeMap<i64, StoredItem>,
    advertisements: BTreeMap<i64, Advertisement>,
}

/// Inventory row without the joined product name.
struct StoredItem {
    id: i64,
    product_id: i64,
    quantity: i32,
    location: String,
    last_updated: chrono::DateTime<Utc>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn view(&self, item: &StoredItem) -> InventoryItem {
        InventoryItem {
            id: item.id,
            product_id: item.product_id,
            product_name: self
                .products
                .get(&item.product_id)
                .map(|p| p.name.clone())
                .unwrap_or_default(),
            quantity: item.quantity,
            location: item.location.clone(),
            last_updated: item.last_updated,
        }
    }

    fn ensure_category(&self, id: i64) -> AppResult<()> {
        if self.categories.contains_key(&id) {
            Ok(())
        } else {
            Err(AppError::BadRequest("Referenced record does not exist".to_string()))
        }
    }

    fn ensure_product(&self, id: i64) -> AppResult<()> {
        if self.products.contains_key(&id) {
            Ok(())
        } else {
            Err(AppError::BadRequest("Referenced record does not exist".to_string()))
        }
    }

    fn delete_product_cascade(&mut self, id: i64) {
        self.products.remove(&id);
        self.inventory.retain(|_, item| item.product_id != id);
    }
}

// ── Categories ────────────────────────────────────────────────────────────────

#[async_trait]
impl CategoryRepository for MemoryStore {
    async fn list(&self) -> AppResult<Vec<Category>> {
        Ok(self.tables.read().await.categories.values().cloned().collect())
    }

    async fn get(&self, id: i64) -> AppResult<Category> {
        self.tables
            .read()
            .await
            .categories
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("Category", id))
    }

    async fn create(&self, input: &NewCategory) -> AppResult<Category> {
        let mut tables = self.tables.write().await;
        let category = Category {
            id: tables.allocate_id(),
            name: input.name.clone(),
            description: input.description.clone(),
        };
        tables.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn update(&self, id: i64, input: &NewCategory) -> AppResult<Category> {
        let mut tables = self.tables.write().await;
        let category = tables
            .categories
            .get_mut(&id)
            .ok_or_else(|| not_found("Category", id))?;
        category.name = input.name.clone();
        category.description = input.description.clone();
        Ok(category.clone())
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        if tables.categories.remove(&id).is_none() {
            return Err(not_found("Category", id));
        }
        let orphaned: Vec<i64> = tables
            .products
            .values()
            .filter(|p| p.category_id == id)
            .map(|p| p.id)
            .collect();
        for product_id in orphaned {
            tables.delete_product_cascade(product_id);
        }
        Ok(())
    }
}

// ── Products ──────────────────────────────────────────────────────────────────

#[async_trait]
impl ProductRepository for MemoryStore {
    async fn list(&self) -> AppResult<Vec<Product>> {
        Ok(self.tables.read().await.products.values().cloned().collect())
    }

    async fn get(&self, id: i64) -> AppResult<Product> {
        self.tables
            .read()
            .await
            .products
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("Product", id))
    }

    async fn create(&self, input: &NewProduct) -> AppResult<Product> {
        let mut tables = self.tables.write().await;
        tables.ensure_category(input.category_id)?;

        let now = Utc::now();
        let mut product = Product {
            id: tables.allocate_id(),
            name: input.name.clone(),
            category_id: input.category_id,
            description: input.description.clone(),
            price: input.price,
            condition: input.condition.clone(),
            created_at: now,
            updated_at: now,
            specifications: String::new(),
            stock: input.stock,
            image: None,
        };
        product.set_specifications(&input.specifications);
        tables.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn update(&self, id: i64, input: &NewProduct) -> AppResult<Product> {
        let mut tables = self.tables.write().await;
        if !tables.products.contains_key(&id) {
            return Err(not_found("Product", id));
        }
        tables.ensure_category(input.category_id)?;

        let product = tables
            .products
            .get_mut(&id)
            .ok_or_else(|| not_found("Product", id))?;
        product.name = input.name.clone();
        product.category_id = input.category_id;
        product.description = input.description.clone();
        product.price = input.price;
        product.condition = input.condition.clone();
        product.set_specifications(&input.specifications);
        product.stock = input.stock;
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn set_image(&self, id: i64, image: Option<&str>) -> AppResult<Product> {
        let mut tables = self.tables.write().await;
        let product = tables
            .products
            .get_mut(&id)
            .ok_or_else(|| not_found("Product", id))?;
        product.image = image.map(str::to_string);
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.products.contains_key(&id) {
            return Err(not_found("Product", id));
        }
        tables.delete_product_cascade(id);
        Ok(())
    }
}

// ── Inventory ─────────────────────────────────────────────────────────────────

#[async_trait]
impl InventoryRepository for MemoryStore {
    async fn list(&self) -> AppResult<Vec<InventoryItem>> {
        let tables = self.tables.read().await;
        Ok(tables.inventory.values().map(|i| tables.view(i)).collect())
    }

    async fn get(&self, id: i64) -> AppResult<InventoryItem> {
        let tables = self.tables.read().await;
        tables
            .inventory
            .get(&id)
            .map(|i| tables.view(i))
            .ok_or_else(|| not_found("Inventory item", id))
    }

    async fn create(&self, input: &NewInventoryItem) -> AppResult<InventoryItem> {
        let mut tables = self.tables.write().await;
        tables.ensure_product(input.product_id)?;

        let item = StoredItem {
            id: tables.allocate_id(),
            product_id: input.product_id,
            quantity: input.quantity,
            location: input.location.clone(),
            last_updated: Utc::now(),
        };
        let view = tables.view(&item);
        tables.inventory.insert(item.id, item);
        Ok(view)
    }

    async fn update(&self, id: i64, input: &NewInventoryItem) -> AppResult<InventoryItem> {
        let mut tables = self.tables.write().await;
        if !tables.inventory.contains_key(&id) {
            return Err(not_found("Inventory item", id));
        }
        tables.ensure_product(input.product_id)?;

        let item = tables
            .inventory
            .get_mut(&id)
            .ok_or_else(|| not_found("Inventory item", id))?;
        item.product_id = input.product_id;
        item.quantity = input.quantity;
        item.location = input.location.clone();
        item.last_updated = Utc::now();

        let item = &tables.inventory[&id];
        Ok(tables.view(item))
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        match tables.inventory.remove(&id) {
            Some(_) => Ok(()),
            None => Err(not_found("Inventory item", id)),
        }
    }

    async fn add_stock(&self, product_id: i64, quantity: i32) -> AppResult<InventoryItem> {
        let mut tables = self.tables.write().await;
        if !tables.products.contains_key(&product_id) {
            return Err(not_found("Product", product_id));
        }

        let existing = tables
            .inventory
            .values()
            .find(|i| i.product_id == product_id)
            .map(|i| i.id);

        let id = match existing {
            Some(id) => {
                if let Some(item) = tables.inventory.get_mut(&id) {
                    item.quantity = item
                        .quantity
                        .checked_add(quantity)
                        .ok_or_else(quantity_out_of_range)?;
                    item.last_updated = Utc::now();
                }
                id
            }
            None => {
                let id = tables.allocate_id();
                tables.inventory.insert(
                    id,
                    StoredItem {
                        id,
                        product_id,
                        quantity,
                        location: String::new(),
                        last_updated: Utc::now(),
                    },
                );
                id
            }
        };

        let item = &tables.inventory[&id];
        Ok(tables.view(item))
    }

    async fn low_stock(&self, threshold: i32) -> AppResult<Vec<InventoryItem>> {
        let tables = self.tables.read().await;
        Ok(tables
            .inventory
            .values()
            .filter(|i| i.quantity <= threshold)
            .map(|i| tables.view(i))
            .collect())
    }
}

// ── Advertisements ────────────────────────────────────────────────────────────

#[async_trait]
impl AdvertisementRepository for MemoryStore {
    async fn list(&self) -> AppResult<Vec<Advertisement>> {
        Ok(self
            .tables
            .read()
            .await
            .advertisements
            .values()
            .cloned()
            .collect())
    }

    async fn get(&self, id: i64) -> AppResult<Advertisement> {
        self.tables
            .read()
            .await
            .advertisements
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("Advertisement", id))
    }

    async fn create(&self, input: &NewAdvertisement) -> AppResult<Advertisement> {
        let mut tables = self.tables.write().await;
        let ad = Advertisement {
            id: tables.allocate_id(),
            description: input.description.clone(),
            image_description: input.image_description.clone(),
            generated_content: input.generated_content.clone(),
            image: input.image.clone(),
        };
        tables.advertisements.insert(ad.id, ad.clone());
        Ok(ad)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::Arc;

    use rust_decimal::Decimal;

    use crate::db::Repositories;
    use crate::error::AppError;
    use crate::models::*;

    async fn seed_product(repos: &Repositories, name: &str) -> (Category, Product) {
        let category = repos
            .categories
            .create(&NewCategory {
                name: "Bikes".into(),
                description: String::new(),
            })
            .await
            .unwrap();
        let product = repos
            .products
            .create(&NewProduct {
                name: name.into(),
                category_id: category.id,
                description: "Aluminium frame".into(),
                price: Decimal::from_str("450.00").unwrap(),
                condition: "used".into(),
                specifications: Specifications::new(),
                stock: 0,
            })
            .await
            .unwrap();
        (category, product)
    }

    async fn add_item(repos: &Repositories, product_id: i64, quantity: i32) -> InventoryItem {
        repos
            .inventory
            .create(&NewInventoryItem {
                product_id,
                quantity,
                location: "A1".into(),
            })
            .await
            .unwrap()
    }

    // ── Cascades ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn deleting_category_removes_products_and_inventory() {
        let repos = Repositories::memory();
        let (category, product) = seed_product(&repos, "Road bike").await;
        add_item(&repos, product.id, 3).await;

        repos.categories.delete(category.id).await.unwrap();

        assert!(repos.products.get(product.id).await.is_err());
        assert!(repos.inventory.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn product_requires_existing_category() {
        let repos = Repositories::memory();
        let err = repos
            .products
            .create(&NewProduct {
                name: "Orphan".into(),
                category_id: 99,
                description: "d".into(),
                price: Decimal::ONE,
                condition: "new".into(),
                specifications: Specifications::new(),
                stock: 0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    // ── Stock ──────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn add_stock_creates_then_accumulates() {
        let repos = Repositories::memory();
        let (_, product) = seed_product(&repos, "Road bike").await;

        let first = repos.inventory.add_stock(product.id, 5).await.unwrap();
        assert_eq!(first.quantity, 5);
        assert_eq!(first.product_name, "Road bike");

        let second = repos.inventory.add_stock(product.id, 3).await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.quantity, 8, "stock updates are additive");
        assert_eq!(repos.inventory.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn add_stock_overflow_is_rejected_and_keeps_total() {
        let repos = Repositories::memory();
        let (_, product) = seed_product(&repos, "Road bike").await;
        repos.inventory.add_stock(product.id, i32::MAX).await.unwrap();

        for delta in [1, i32::MAX] {
            let err = repos.inventory.add_stock(product.id, delta).await.unwrap_err();
            assert!(matches!(err, AppError::BadRequest(ref m) if m == "quantity out of range"));
        }
        let drained = repos.inventory.add_stock(product.id, i32::MIN).await.unwrap();
        assert_eq!(drained.quantity, -1);

        let items = repos.inventory.list().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, -1);
    }

    #[tokio::test]
    async fn products_store_specifications_as_json_text() {
        let repos = Repositories::memory();
        let (category, product) = seed_product(&repos, "Road bike").await;
        assert_eq!(product.specifications, "{}");

        let mut specifications = Specifications::new();
        specifications.insert("frame".into(), "56cm".into());
        let updated = repos
            .products
            .update(
                product.id,
                &NewProduct {
                    name: product.name.clone(),
                    category_id: category.id,
                    description: product.description.clone(),
                    price: product.price,
                    condition: product.condition.clone(),
                    specifications: specifications.clone(),
                    stock: product.stock,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.specifications, r#"{"frame":"56cm"}"#);
        assert_eq!(updated.get_specifications().unwrap(), specifications);
    }

    #[tokio::test]
    async fn add_stock_targets_oldest_item() {
        let repos = Repositories::memory();
        let (_, product) = seed_product(&repos, "Road bike").await;
        let oldest = add_item(&repos, product.id, 1).await;
        let newer = add_item(&repos, product.id, 1).await;

        repos.inventory.add_stock(product.id, 4).await.unwrap();

        assert_eq!(repos.inventory.get(oldest.id).await.unwrap().quantity, 5);
        assert_eq!(repos.inventory.get(newer.id).await.unwrap().quantity, 1);
    }

    #[tokio::test]
    async fn add_stock_unknown_product_is_not_found() {
        let repos = Repositories::memory();
        let err = repos.inventory.add_stock(42, 1).await.unwrap_err();
        assert!(matches!(err, crate::error::AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn concurrent_add_stock_loses_nothing() {
        let repos = Repositories::memory();
        let (_, product) = seed_product(&repos, "Road bike").await;
        let inventory = Arc::clone(&repos.inventory);
        let product_id = product.id;

        let mut handles = Vec::new();
        for _ in 0..50 {
            let inventory = Arc::clone(&inventory);
            handles.push(tokio::spawn(async move {
                inventory.add_stock(product_id, 2).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let items = repos.inventory.list().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 100);
    }

    #[tokio::test]
    async fn low_stock_is_inclusive_and_ordered() {
        let repos = Repositories::memory();
        let (_, product) = seed_product(&repos, "Road bike").await;
        let a = add_item(&repos, product.id, 10).await;
        add_item(&repos, product.id, 11).await;
        let c = add_item(&repos, product.id, 0).await;
        add_item(&repos, product.id, 250).await;

        let low = repos.inventory.low_stock(10).await.unwrap();
        let ids: Vec<i64> = low.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![a.id, c.id]);
        assert!(low.iter().all(|i| i.quantity <= 10));
    }

    #[tokio::test]
    async fn inventory_view_follows_product_rename() {
        let repos = Repositories::memory();
        let (category, product) = seed_product(&repos, "Road bike").await;
        let item = add_item(&repos, product.id, 1).await;

        repos
            .products
            .update(
                product.id,
                &NewProduct {
                    name: "Gravel bike".into(),
                    category_id: category.id,
                    description: product.description.clone(),
                    price: product.price,
                    condition: product.condition.clone(),
                    specifications: product.get_specifications().unwrap(),
                    stock: product.stock,
                },
            )
            .await
            .unwrap();

        assert_eq!(repos.inventory.get(item.id).await.unwrap().product_name, "Gravel bike");
    }
}
