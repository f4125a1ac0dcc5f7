use anyhow::Result;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};

use crate::models::CompositionRecord;

/// Read-only lookup into the food composition database (per-100 g records).
#[async_trait]
pub trait CompositionStore: Send + Sync {
    /// Case-insensitive substring search, best matches first, at most
    /// `limit` rows.
    async fn search_foods(&self, term: &str, limit: u32) -> Result<Vec<CompositionRecord>>;
}

pub struct PgCompositionStore {
    pool: PgPool,
}

impl PgCompositionStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl CompositionStore for PgCompositionStore {
    async fn search_foods(&self, term: &str, limit: u32) -> Result<Vec<CompositionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT food_code, name, energy_kcal, protein_g, fat_g, carbs_g
            FROM food_composition
            WHERE name ILIKE $1
            ORDER BY relevance, food_code
            LIMIT $2
            "#,
        )
        .bind(format!("%{}%", term))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CompositionRecord {
                food_code: row.get("food_code"),
                name: row.get("name"),
                energy_kcal: row.get("energy_kcal"),
                protein_g: row.get("protein_g"),
                fat_g: row.get("fat_g"),
                carbs_g: row.get("carbs_g"),
            })
            .collect())
    }
}
