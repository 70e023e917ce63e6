use chrono::{DateTime, Utc};
use nichepress_core::error::AppError;
use nichepress_core::models::{
    ComparisonProduct, InternalLink, ProductRecord, ProductStatus, ScrapedProduct,
};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

/// Product rows in PostgreSQL, keyed by ASIN.
#[derive(Clone)]
pub struct ProductRepository {
    pool: Pool<Postgres>,
}

impl ProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn status(&self, asin: &str) -> Result<ProductStatus, AppError> {
        let row: Option<(bool,)> =
            sqlx::query_as("SELECT is_published FROM products WHERE asin = $1")
                .bind(asin)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(match row {
            None => ProductStatus::Unknown,
            Some((true,)) => ProductStatus::Published,
            Some((false,)) => ProductStatus::Scraped,
        })
    }

    /// Insert a product, or refresh the scraped fields of an existing one.
    /// The publication flag and post URL are left alone.
    pub async fn upsert(&self, product: &ScrapedProduct) -> Result<ProductRecord, AppError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            INSERT INTO products (asin, title, price, rating, review_count, image_url, product_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (asin) DO UPDATE SET
                title = EXCLUDED.title,
                price = EXCLUDED.price,
                rating = EXCLUDED.rating,
                review_count = EXCLUDED.review_count,
                image_url = EXCLUDED.image_url,
                product_url = EXCLUDED.product_url,
                updated_at = NOW()
            RETURNING id, asin, title, price, rating, review_count, image_url, product_url,
                      is_published, post_url, created_at, updated_at
            "#,
        )
        .bind(&product.asin)
        .bind(&product.title)
        .bind(&product.price)
        .bind(&product.rating)
        .bind(&product.review_count)
        .bind(&product.image_url)
        .bind(&product.product_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        tracing::debug!(asin = %row.asin, id = %row.id, "Product saved");
        Ok(row.into())
    }

    /// Flip an unpublished product to published. Returns false when no
    /// unpublished row matched.
    pub async fn mark_published(&self, asin: &str, post_url: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET is_published = TRUE, post_url = $2, updated_at = NOW()
            WHERE asin = $1 AND is_published = FALSE
            "#,
        )
        .bind(asin)
        .bind(post_url)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Random sample of other products.
    pub async fn similar(
        &self,
        asin: &str,
        limit: usize,
    ) -> Result<Vec<ComparisonProduct>, AppError> {
        let rows = sqlx::query_as::<_, ComparisonRow>(
            r#"
            SELECT title, price, rating
            FROM products
            WHERE asin <> $1
            ORDER BY random()
            LIMIT $2
            "#,
        )
        .bind(asin)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Published posts, newest first.
    pub async fn recent_links(&self, limit: usize) -> Result<Vec<InternalLink>, AppError> {
        let rows = sqlx::query_as::<_, LinkRow>(
            r#"
            SELECT title, post_url
            FROM products
            WHERE is_published = TRUE AND post_url IS NOT NULL
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Published posts whose title contains the keyword's words in order.
    pub async fn matching_links(
        &self,
        keyword: &str,
        limit: usize,
    ) -> Result<Vec<InternalLink>, AppError> {
        let rows = sqlx::query_as::<_, LinkRow>(
            r#"
            SELECT title, post_url
            FROM products
            WHERE is_published = TRUE AND post_url IS NOT NULL AND title ILIKE $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(title_pattern(keyword))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// `best gaming laptop` → `%best%gaming%laptop%`, with LIKE wildcards in
/// the keyword escaped.
fn title_pattern(keyword: &str) -> String {
    let words: Vec<String> = keyword
        .split_whitespace()
        .map(|w| {
            w.replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_")
        })
        .collect();
    format!("%{}%", words.join("%"))
}

// -- Internal row types for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    asin: String,
    title: String,
    price: String,
    rating: String,
    review_count: String,
    image_url: Option<String>,
    product_url: String,
    is_published: bool,
    post_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for ProductRecord {
    fn from(row: ProductRow) -> Self {
        ProductRecord {
            id: row.id,
            asin: row.asin,
            title: row.title,
            price: row.price,
            rating: row.rating,
            review_count: row.review_count,
            image_url: row.image_url,
            product_url: row.product_url,
            is_published: row.is_published,
            post_url: row.post_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ComparisonRow {
    title: String,
    price: String,
    rating: String,
}

impl From<ComparisonRow> for ComparisonProduct {
    fn from(row: ComparisonRow) -> Self {
        ComparisonProduct {
            title: row.title,
            price: row.price,
            rating: row.rating,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LinkRow {
    title: String,
    post_url: String,
}

impl From<LinkRow> for InternalLink {
    fn from(row: LinkRow) -> Self {
        InternalLink {
            title: row.title,
            link: row.post_url,
        }
    }
}

// -- Trait implementation --

impl nichepress_core::traits::ProductStore for ProductRepository {
    async fn status(&self, asin: &str) -> Result<ProductStatus, AppError> {
        ProductRepository::status(self, asin).await
    }

    async fn upsert(&self, product: &ScrapedProduct) -> Result<ProductRecord, AppError> {
        ProductRepository::upsert(self, product).await
    }

    async fn mark_published(&self, asin: &str, post_url: &str) -> Result<bool, AppError> {
        ProductRepository::mark_published(self, asin, post_url).await
    }

    async fn similar(&self, asin: &str, limit: usize) -> Result<Vec<ComparisonProduct>, AppError> {
        ProductRepository::similar(self, asin, limit).await
    }

    async fn recent_links(&self, limit: usize) -> Result<Vec<InternalLink>, AppError> {
        ProductRepository::recent_links(self, limit).await
    }

    async fn matching_links(
        &self,
        keyword: &str,
        limit: usize,
    ) -> Result<Vec<InternalLink>, AppError> {
        ProductRepository::matching_links(self, keyword, limit).await
    }
}
