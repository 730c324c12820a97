//! Record store: one repository trait per record type, with a PostgreSQL
//! implementation and an in-memory one sharing the same semantics.

mod memory;
mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::*;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn list(&self) -> AppResult<Vec<Category>>;
    async fn get(&self, id: i64) -> AppResult<Category>;
    async fn create(&self, input: &NewCategory) -> AppResult<Category>;
    async fn update(&self, id: i64, input: &NewCategory) -> AppResult<Category>;
    /// Deleting a category removes its products and their inventory items.
    async fn delete(&self, id: i64) -> AppResult<()>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn list(&self) -> AppResult<Vec<Product>>;
    async fn get(&self, id: i64) -> AppResult<Product>;
    async fn create(&self, input: &NewProduct) -> AppResult<Product>;
    async fn update(&self, id: i64, input: &NewProduct) -> AppResult<Product>;
    async fn set_image(&self, id: i64, image: Option<&str>) -> AppResult<Product>;
    async fn delete(&self, id: i64) -> AppResult<()>;
}

#[async_trait]
pub trait InventoryRepository: Send + Sync {
    async fn list(&self) -> AppResult<Vec<InventoryItem>>;
    async fn get(&self, id: i64) -> AppResult<InventoryItem>;
    async fn create(&self, input: &NewInventoryItem) -> AppResult<InventoryItem>;
    async fn update(&self, id: i64, input: &NewInventoryItem) -> AppResult<InventoryItem>;
    async fn delete(&self, id: i64) -> AppResult<()>;

    /// Adds `quantity` to the product's oldest inventory item, creating one
    /// holding `quantity` when none exists. Runs as a single atomic step.
    async fn add_stock(&self, product_id: i64, quantity: i32) -> AppResult<InventoryItem>;

    /// Items with `quantity <= threshold`, in insertion order.
    async fn low_stock(&self, threshold: i32) -> AppResult<Vec<InventoryItem>>;
}

#[async_trait]
pub trait AdvertisementRepository: Send + Sync {
    async fn list(&self) -> AppResult<Vec<Advertisement>>;
    async fn get(&self, id: i64) -> AppResult<Advertisement>;
    async fn create(&self, input: &NewAdvertisement) -> AppResult<Advertisement>;
}

pub type DynCategoryRepository = Arc<dyn CategoryRepository>;
pub type DynProductRepository = Arc<dyn ProductRepository>;
pub type DynInventoryRepository = Arc<dyn InventoryRepository>;
pub type DynAdvertisementRepository = Arc<dyn AdvertisementRepository>;

/// All repositories, handed to the router as part of the app state.
#[derive(Clone)]
pub struct Repositories {
    pub categories: DynCategoryRepository,
    pub products: DynProductRepository,
    pub inventory: DynInventoryRepository,
    pub advertisements: DynAdvertisementRepository,
}

impl Repositories {
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Self::from_store(Arc::new(PgStore::new(pool)))
    }

    pub fn memory() -> Self {
        Self::from_store(Arc::new(MemoryStore::new()))
    }

    fn from_store<S>(store: Arc<S>) -> Self
    where
        S: CategoryRepository
            + ProductRepository
            + InventoryRepository
            + AdvertisementRepository
            + 'static,
    {
        Self {
            categories: store.clone(),
            products: store.clone(),
            inventory: store.clone(),
            advertisements: store,
        }
    }
}

pub(crate) fn not_found(kind: &str, id: i64) -> crate::error::AppError {
    crate::error::AppError::NotFound(format!("{} {} not found", kind, id))
}

/// A stock total that no longer fits the quantity column.
pub(crate) fn quantity_out_of_range() -> crate::error::AppError {
    crate::error::AppError::BadRequest("quantity out of range".to_string())
}
