use async_trait::async_trait;
use sqlx::PgPool;

use super::{
    not_found, quantity_out_of_range, AdvertisementRepository, CategoryRepository,
    InventoryRepository, ProductRepository,
};
use crate::error::{AppError, AppResult};
use crate::models::*;

const PRODUCT_COLUMNS: &str = "id, name, category_id, description, price, condition, \
     created_at, updated_at, specifications, stock, image";

const INVENTORY_SELECT: &str = r#"
    SELECT i.id, i.product_id, p.name AS product_name, i.quantity, i.location, i.last_updated
    FROM inventory_items i
    JOIN products p ON p.id = i.product_id
"#;

/// PostgreSQL-backed store. Cascades are enforced by the foreign keys in
/// `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_inventory_item(&self, id: i64) -> AppResult<InventoryItem> {
        sqlx::query_as::<_, InventoryItem>(&format!("{} WHERE i.id = $1", INVENTORY_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found("Inventory item", id))
    }
}

/// Foreign-key violations (a dangling category or product id) and stock
/// totals past the `INTEGER` range are caller mistakes; everything else
/// stays a database error.
fn map_write_error(err: sqlx::Error) -> AppError {
    let code = err
        .as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.into_owned());

    match code.as_deref() {
        Some("23503") => AppError::BadRequest("Referenced record does not exist".to_string()),
        Some("22003") => quantity_out_of_range(),
        _ => AppError::Database(err),
    }
}

// ── Categories ────────────────────────────────────────────────────────────────

#[async_trait]
impl CategoryRepository for PgStore {
    async fn list(&self) -> AppResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, description FROM categories ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    async fn get(&self, id: i64) -> AppResult<Category> {
        sqlx::query_as::<_, Category>("SELECT id, name, description FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found("Category", id))
    }

    async fn create(&self, input: &NewCategory) -> AppResult<Category> {
        let category = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name, description) VALUES ($1, $2)
             RETURNING id, name, description",
        )
        .bind(&input.name)
        .bind(&input.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(category)
    }

    async fn update(&self, id: i64, input: &NewCategory) -> AppResult<Category> {
        sqlx::query_as::<_, Category>(
            "UPDATE categories SET name = $1, description = $2 WHERE id = $3
             RETURNING id, name, description",
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found("Category", id))
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found("Category", id));
        }
        Ok(())
    }
}

// ── Products ──────────────────────────────────────────────────────────────────

#[async_trait]
impl ProductRepository for PgStore {
    async fn list(&self) -> AppResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products ORDER BY id",
            PRODUCT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    async fn get(&self, id: i64) -> AppResult<Product> {
        sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found("Product", id))
    }

    async fn create(&self, input: &NewProduct) -> AppResult<Product> {
        sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products (name, category_id, description, price, condition, specifications, stock)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(&input.name)
        .bind(input.category_id)
        .bind(&input.description)
        .bind(input.price)
        .bind(&input.condition)
        .bind(encode_specifications(&input.specifications))
        .bind(input.stock)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)
    }

    async fn update(&self, id: i64, input: &NewProduct) -> AppResult<Product> {
        sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
            SET name           = $1,
                category_id    = $2,
                description    = $3,
                price          = $4,
                condition      = $5,
                specifications = $6,
                stock          = $7,
                updated_at     = NOW()
            WHERE id = $8
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(&input.name)
        .bind(input.category_id)
        .bind(&input.description)
        .bind(input.price)
        .bind(&input.condition)
        .bind(encode_specifications(&input.specifications))
        .bind(input.stock)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error)?
        .ok_or_else(|| not_found("Product", id))
    }

    async fn set_image(&self, id: i64, image: Option<&str>) -> AppResult<Product> {
        sqlx::query_as::<_, Product>(&format!(
            "UPDATE products SET image = $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
            PRODUCT_COLUMNS
        ))
        .bind(image)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found("Product", id))
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found("Product", id));
        }
        Ok(())
    }
}

// ── Inventory ─────────────────────────────────────────────────────────────────

#[async_trait]
impl InventoryRepository for PgStore {
    async fn list(&self) -> AppResult<Vec<InventoryItem>> {
        let items = sqlx::query_as::<_, InventoryItem>(&format!("{} ORDER BY i.id", INVENTORY_SELECT))
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    async fn get(&self, id: i64) -> AppResult<InventoryItem> {
        self.fetch_inventory_item(id).await
    }

    async fn create(&self, input: &NewInventoryItem) -> AppResult<InventoryItem> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO inventory_items (product_id, quantity, location)
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(input.product_id)
        .bind(input.quantity)
        .bind(&input.location)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?;

        self.fetch_inventory_item(id).await
    }

    async fn update(&self, id: i64, input: &NewInventoryItem) -> AppResult<InventoryItem> {
        let updated: Option<(i64,)> = sqlx::query_as(
            r#"
            UPDATE inventory_items
            SET product_id   = $1,
                quantity     = $2,
                location     = $3,
                last_updated = NOW()
            WHERE id = $4
            RETURNING id
            "#,
        )
        .bind(input.product_id)
        .bind(input.quantity)
        .bind(&input.location)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error)?;

        match updated {
            Some(_) => self.fetch_inventory_item(id).await,
            None => Err(not_found("Inventory item", id)),
        }
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM inventory_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found("Inventory item", id));
        }
        Ok(())
    }

    async fn add_stock(&self, product_id: i64, quantity: i32) -> AppResult<InventoryItem> {
        let mut tx = self.pool.begin().await?;

        // Locking the product row serialises concurrent stock updates for it,
        // including the case where no inventory item exists yet.
        let product: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM products WHERE id = $1 FOR UPDATE")
                .bind(product_id)
                .fetch_optional(&mut *tx)
                .await?;
        if product.is_none() {
            return Err(not_found("Product", product_id));
        }

        let updated: Option<(i64,)> = sqlx::query_as(
            r#"
            UPDATE inventory_items
            SET quantity = quantity + $1, last_updated = NOW()
            WHERE id = (
                SELECT id FROM inventory_items WHERE product_id = $2 ORDER BY id LIMIT 1
            )
            RETURNING id
            "#,
        )
        .bind(quantity)
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_write_error)?;

        let id = match updated {
            Some((id,)) => id,
            None => {
                let (id,): (i64,) = sqlx::query_as(
                    "INSERT INTO inventory_items (product_id, quantity) VALUES ($1, $2) RETURNING id",
                )
                .bind(product_id)
                .bind(quantity)
                .fetch_one(&mut *tx)
                .await
                .map_err(map_write_error)?;
                id
            }
        };

        tx.commit().await?;
        self.fetch_inventory_item(id).await
    }

    async fn low_stock(&self, threshold: i32) -> AppResult<Vec<InventoryItem>> {
        let items = sqlx::query_as::<_, InventoryItem>(&format!(
            "{} WHERE i.quantity <= $1 ORDER BY i.id",
            INVENTORY_SELECT
        ))
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }
}

// ── Advertisements ────────────────────────────────────────────────────────────

#[async_trait]
impl AdvertisementRepository for PgStore {
    async fn list(&self) -> AppResult<Vec<Advertisement>> {
        let ads = sqlx::query_as::<_, Advertisement>(
            "SELECT id, description, image_description, generated_content, image
             FROM advertisements ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ads)
    }

    async fn get(&self, id: i64) -> AppResult<Advertisement> {
        sqlx::query_as::<_, Advertisement>(
            "SELECT id, description, image_description, generated_content, image
             FROM advertisements WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found("Advertisement", id))
    }

    async fn create(&self, input: &NewAdvertisement) -> AppResult<Advertisement> {
        let ad = sqlx::query_as::<_, Advertisement>(
            r#"
            INSERT INTO advertisements (description, image_description, generated_content, image)
            VALUES ($1, $2, $3, $4)
            RETURNING id, description, image_description, generated_content, image
            "#,
        )
        .bind(&input.description)
        .bind(&input.image_description)
        .bind(&input.generated_content)
        .bind(input.image.as_deref())
        .fetch_one(&self.pool)
        .await?;
        Ok(ad)
    }
}
