use nichepress_core::models::{ProductStatus, ScrapedProduct};
use nichepress_db::ProductRepository;

use crate::common::setup_test_db;

fn product(asin: &str, title: &str) -> ScrapedProduct {
    ScrapedProduct {
        asin: asin.into(),
        title: title.into(),
        price: "$49.99".into(),
        rating: "4.5 out of 5 stars".into(),
        review_count: "1,024 ratings".into(),
        image_url: Some(format!("https://m.media-amazon.com/images/I/{asin}.jpg")),
        product_url: format!("https://www.amazon.com/dp/{asin}"),
    }
}

async fn count(pool: &sqlx::PgPool) -> i64 {
    let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
        .fetch_one(pool)
        .await
        .unwrap();
    n
}

#[tokio::test]
async fn upsert_creates_then_updates_without_duplicating() {
    let (pool, _container) = setup_test_db().await;
    let repo = ProductRepository::new(pool.clone());

    let first = repo.upsert(&product("B0TEST0001", "Retro Stick")).await.unwrap();
    assert!(!first.is_published);
    assert_eq!(repo.status("B0TEST0001").await.unwrap(), ProductStatus::Scraped);

    let mut changed = product("B0TEST0001", "Retro Stick 4K");
    changed.price = "$39.99".into();
    let second = repo.upsert(&changed).await.unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.title, "Retro Stick 4K");
    assert_eq!(second.price, "$39.99");
    assert!(second.updated_at >= first.updated_at);
    assert_eq!(count(&pool).await, 1);
}

#[tokio::test]
async fn unknown_asin_has_unknown_status() {
    let (pool, _container) = setup_test_db().await;
    let repo = ProductRepository::new(pool);

    assert_eq!(repo.status("B0NOTHERE1").await.unwrap(), ProductStatus::Unknown);
}

#[tokio::test]
async fn publication_flag_flips_once() {
    let (pool, _container) = setup_test_db().await;
    let repo = ProductRepository::new(pool);
    repo.upsert(&product("B0TEST0001", "Retro Stick")).await.unwrap();

    assert!(repo
        .mark_published("B0TEST0001", "https://blog.example/retro-stick/")
        .await
        .unwrap());
    assert!(!repo
        .mark_published("B0TEST0001", "https://blog.example/other/")
        .await
        .unwrap());
    assert_eq!(repo.status("B0TEST0001").await.unwrap(), ProductStatus::Published);

    // Re-scraping keeps it published with the original link.
    let record = repo.upsert(&product("B0TEST0001", "Retro Stick v2")).await.unwrap();
    assert!(record.is_published);
    assert_eq!(
        record.post_url.as_deref(),
        Some("https://blog.example/retro-stick/")
    );
}

#[tokio::test]
async fn mark_published_ignores_unknown_product() {
    let (pool, _container) = setup_test_db().await;
    let repo = ProductRepository::new(pool);

    assert!(!repo
        .mark_published("B0NOTHERE1", "https://blog.example/x/")
        .await
        .unwrap());
}

#[tokio::test]
async fn similar_excludes_current_product() {
    let (pool, _container) = setup_test_db().await;
    let repo = ProductRepository::new(pool);
    for (asin, title) in [
        ("B0TEST0001", "Retro Stick"),
        ("B0TEST0002", "Mini Console"),
        ("B0TEST0003", "Handheld Pro"),
    ] {
        repo.upsert(&product(asin, title)).await.unwrap();
    }

    let similar = repo.similar("B0TEST0001", 2).await.unwrap();

    assert_eq!(similar.len(), 2);
    assert!(similar.iter().all(|p| p.title != "Retro Stick"));
}

#[tokio::test]
async fn links_only_cover_published_posts() {
    let (pool, _container) = setup_test_db().await;
    let repo = ProductRepository::new(pool);
    repo.upsert(&product("B0TEST0001", "Best Gaming Laptop 2025"))
        .await
        .unwrap();
    repo.upsert(&product("B0TEST0002", "Gaming Mouse"))
        .await
        .unwrap();
    repo.upsert(&product("B0TEST0003", "Office Laptop Stand"))
        .await
        .unwrap();
    repo.mark_published("B0TEST0001", "https://blog.example/laptop/")
        .await
        .unwrap();
    repo.mark_published("B0TEST0003", "https://blog.example/stand/")
        .await
        .unwrap();

    let recent = repo.recent_links(5).await.unwrap();
    assert_eq!(recent.len(), 2);

    let matching = repo.matching_links("gaming laptop", 5).await.unwrap();
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].link, "https://blog.example/laptop/");
    assert_eq!(matching[0].title, "Best Gaming Laptop 2025");

    assert!(repo.matching_links("laptop gaming", 5).await.unwrap().is_empty());
}
