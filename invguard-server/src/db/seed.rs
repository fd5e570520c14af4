//! Startup seeding
//!
//! Idempotent: principals are created only when missing, sample items only
//! when the item table is empty.

use shared::models::{ItemCreate, Role, UserCreate};
use sqlx::SqlitePool;

use super::repository::{RepoResult, item, user};

/// Seed parameters
#[derive(Debug, Clone)]
pub struct SeedConfig {
    pub admin_username: String,
    pub admin_password: String,
    pub viewer_password: String,
    /// Insert the sample catalogue into an empty store
    pub sample_data: bool,
}

impl SeedConfig {
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            admin_username: "admin".into(),
            admin_password: "admin123".into(),
            viewer_password: "viewer123".into(),
            sample_data: true,
        }
    }
}

/// (name, sku, category, quantity, price, reorder_level, description)
const SAMPLE_ITEMS: &[(&str, &str, &str, i64, f64, i64, &str)] = &[
    ("Laptop Dell XPS 15", "LAP001", "Electronics", 15, 1200.00, 5, "High-performance laptop for development"),
    ("Office Chair Ergonomic", "FUR001", "Furniture", 25, 250.00, 10, "Comfortable office chair with lumbar support"),
    ("Wireless Mouse Logitech", "ELE001", "Electronics", 8, 35.00, 15, "Wireless mouse with USB receiver"),
    ("Desk Lamp LED", "OFF001", "Office Supplies", 42, 45.00, 20, "Adjustable LED desk lamp"),
    ("Monitor 27 inch 4K", "MON001", "Electronics", 12, 450.00, 8, "4K UHD monitor with HDR support"),
    ("Standing Desk", "FUR002", "Furniture", 6, 800.00, 3, "Electric height-adjustable standing desk"),
];

pub(crate) async fn run(pool: &SqlitePool, seed: &SeedConfig) -> RepoResult<()> {
    ensure_user(pool, &seed.admin_username, &seed.admin_password, Role::Admin).await?;
    ensure_user(pool, "viewer", &seed.viewer_password, Role::Viewer).await?;

    if seed.sample_data && item::count(pool).await? == 0 {
        for (name, sku, category, quantity, price, reorder_level, description) in SAMPLE_ITEMS {
            item::create(
                pool,
                ItemCreate {
                    sku: (*sku).to_string(),
                    name: (*name).to_string(),
                    category: (*category).to_string(),
                    quantity: *quantity,
                    price: *price,
                    reorder_level: Some(*reorder_level),
                    description: Some((*description).to_string()),
                },
            )
            .await?;
        }
        tracing::info!(count = SAMPLE_ITEMS.len(), "Seeded sample items");
    }

    Ok(())
}

async fn ensure_user(pool: &SqlitePool, username: &str, password: &str, role: Role) -> RepoResult<()> {
    if user::find_by_username(pool, username).await?.is_none() {
        user::create(
            pool,
            UserCreate {
                username: username.to_string(),
                password: password.to_string(),
                role,
            },
        )
        .await?;
        tracing::info!(username = %username, role = ?role, "Created principal");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_store;

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let (_dir, store) = temp_store().await;
        // second run must not duplicate anything
        run(&store.pool, &SeedConfig::for_tests()).await.unwrap();

        assert_eq!(item::count(&store.pool).await.unwrap(), 6);
        let admin = user::find_by_username(&store.pool, "admin").await.unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);
        let viewer = user::find_by_username(&store.pool, "viewer").await.unwrap().unwrap();
        assert_eq!(viewer.role, Role::Viewer);
    }

    #[tokio::test]
    async fn test_sample_lap001() {
        let (_dir, store) = temp_store().await;
        let lap = item::find_by_sku(&store.pool, "LAP001").await.unwrap().unwrap();
        assert_eq!(lap.quantity, 15);
        assert_eq!(lap.reorder_level, 5);
    }
}
