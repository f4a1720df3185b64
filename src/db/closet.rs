use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgPool};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Category, ClosetItem, ItemAttributes, NewClosetItem, Season},
};

/// Wardrobe inventory
#[async_trait]
pub trait ClosetRepository: Send + Sync {
    /// All items, oldest first
    async fn find_all(&self) -> AppResult<Vec<ClosetItem>>;

    async fn find_by_id(&self, id: &str) -> AppResult<Option<ClosetItem>>;

    async fn create(&self, item: NewClosetItem) -> AppResult<ClosetItem>;

    async fn delete(&self, id: &str) -> AppResult<()>;

    async fn update_vector(&self, id: &str, vector: Vec<f32>) -> AppResult<()>;

    async fn find_by_category(&self, category: Category) -> AppResult<Vec<ClosetItem>> {
        let items = self.find_all().await?;
        Ok(items
            .into_iter()
            .filter(|item| item.category() == category)
            .collect())
    }
}

fn build_item(new: NewClosetItem) -> AppResult<ClosetItem> {
    let image_url = new
        .image_url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| AppError::InvalidInput("image_url is required".to_string()))?;
    let attributes = new
        .attributes
        .ok_or_else(|| AppError::InvalidInput("attributes are required".to_string()))?;

    Ok(ClosetItem {
        id: format!("item-{}", Uuid::new_v4()),
        image_url,
        attributes,
        name: new.name,
        tags: new.tags,
        season: new.season,
        image_vector: None,
        created_at: Utc::now(),
        updated_at: None,
    })
}

#[derive(Default)]
pub struct InMemoryClosetRepository {
    items: RwLock<Vec<ClosetItem>>,
}

impl InMemoryClosetRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<ClosetItem>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }
}

#[async_trait]
impl ClosetRepository for InMemoryClosetRepository {
    async fn find_all(&self) -> AppResult<Vec<ClosetItem>> {
        Ok(self.items.read().await.clone())
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<ClosetItem>> {
        Ok(self.items.read().await.iter().find(|item| item.id == id).cloned())
    }

    async fn create(&self, item: NewClosetItem) -> AppResult<ClosetItem> {
        let item = build_item(item)?;
        self.items.write().await.push(item.clone());
        Ok(item)
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|item| item.id != id);
        if items.len() == before {
            return Err(AppError::NotFound(format!("Closet item {}", id)));
        }
        Ok(())
    }

    async fn update_vector(&self, id: &str, vector: Vec<f32>) -> AppResult<()> {
        let mut items = self.items.write().await;
        let item = items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Closet item {}", id)))?;
        item.image_vector = Some(vector);
        item.updated_at = Some(Utc::now());
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ClosetItemRow {
    id: String,
    image_url: String,
    attributes: Json<ItemAttributes>,
    name: Option<String>,
    tags: Vec<String>,
    season: Vec<String>,
    image_vector: Option<Vec<f32>>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<ClosetItemRow> for ClosetItem {
    fn from(row: ClosetItemRow) -> Self {
        ClosetItem {
            id: row.id,
            image_url: row.image_url,
            attributes: row.attributes.0,
            name: row.name,
            tags: row.tags,
            season: row.season.iter().filter_map(|s| Season::parse(s)).collect(),
            image_vector: row.image_vector,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, image_url, attributes, name, tags, season, image_vector, created_at, updated_at FROM closet_items";

pub struct PostgresClosetRepository {
    pool: PgPool,
}

impl PostgresClosetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClosetRepository for PostgresClosetRepository {
    async fn find_all(&self) -> AppResult<Vec<ClosetItem>> {
        let rows: Vec<ClosetItemRow> =
            sqlx::query_as(&format!("{} ORDER BY created_at ASC, id ASC", SELECT_COLUMNS))
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(ClosetItem::from).collect())
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<ClosetItem>> {
        let row: Option<ClosetItemRow> = sqlx::query_as(&format!("{} WHERE id = $1", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ClosetItem::from))
    }

    async fn create(&self, item: NewClosetItem) -> AppResult<ClosetItem> {
        let item = build_item(item)?;
        let seasons: Vec<&str> = item.season.iter().map(Season::as_str).collect();

        sqlx::query(
            r#"
            INSERT INTO closet_items (id, image_url, category, attributes, name, tags, season, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&item.id)
        .bind(&item.image_url)
        .bind(item.category().as_str())
        .bind(Json(&item.attributes))
        .bind(&item.name)
        .bind(&item.tags)
        .bind(&seasons)
        .bind(item.created_at)
        .execute(&self.pool)
        .await?;

        Ok(item)
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM closet_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Closet item {}", id)));
        }
        Ok(())
    }

    async fn update_vector(&self, id: &str, vector: Vec<f32>) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE closet_items SET image_vector = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(&vector)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Closet item {}", id)));
        }
        Ok(())
    }

    async fn find_by_category(&self, category: Category) -> AppResult<Vec<ClosetItem>> {
        let rows: Vec<ClosetItemRow> = sqlx::query_as(&format!(
            "{} WHERE category = $1 ORDER BY created_at ASC, id ASC",
            SELECT_COLUMNS
        ))
        .bind(category.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ClosetItem::from).collect())
    }
}
