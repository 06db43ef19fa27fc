// storage keeps terrain snapshots in MongoDB

pub mod models;

use crate::models::TerrainDoc;
use bson::doc;
use futures_util::stream::TryStreamExt;
use mantle_core::MantleError;
use mongodb::{Client, Collection, IndexModel, options::ClientOptions, options::IndexOptions};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("mongodb: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error(transparent)]
    Terrain(#[from] MantleError),
}

pub type Result<T> = std::result::Result<T, StorageError>;

pub struct TerrainStore {
    col: Collection<TerrainDoc>,
}

impl TerrainStore {
    // Connect and make sure terrain names are unique
    pub async fn init(uri: &str, db_name: &str, col_name: &str) -> Result<Self> {
        let mut opts = ClientOptions::parse(uri).await?;
        opts.app_name = Some("mantle".to_string());
        let client = Client::with_options(opts)?;
        let col = client.database(db_name).collection(col_name);

        let index_model = IndexModel::builder()
            .keys(doc! { "name": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        col.create_index(index_model).await?;
        log::debug!("terrain store ready at {db_name}.{col_name}");

        Ok(Self { col })
    }

    pub async fn list_names(&self) -> Result<Vec<String>> {
        let mut cursor = self.col.find(doc! {}).await?;
        let mut names = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            names.push(doc.name);
        }
        Ok(names)
    }

    pub async fn read_by_name(&self, name: &str) -> Result<Option<TerrainDoc>> {
        Ok(self.col.find_one(doc! { "name": name }).await?)
    }

    // Save a snapshot, replacing any earlier one with the same name
    pub async fn create(&self, terrain: &TerrainDoc) -> Result<()> {
        let removed = self
            .col
            .delete_one(doc! { "name": &terrain.name })
            .await?;
        if removed.deleted_count > 0 {
            log::info!("replacing saved terrain {}", terrain.name);
        }
        self.col.insert_one(terrain).await?;
        Ok(())
    }

    pub async fn read_by_seed(&self, seed: i64) -> Result<Option<TerrainDoc>> {
        Ok(self.col.find_one(doc! { "seed": seed }).await?)
    }

    // Returns whether anything was deleted
    pub async fn delete_by_name(&self, name: &str) -> Result<bool> {
        let removed = self.col.delete_one(doc! { "name": name }).await?;
        Ok(removed.deleted_count > 0)
    }
}
