use bson::oid::ObjectId;
use mantle_core::backend::SceneBackend;
use mantle_core::config::TerrainConfig;
use mantle_core::error::{MantleError, Result};
use mantle_core::terrain::TerrainGenerator;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// One saved terrain: the generator settings plus the (possibly eroded and
// painted) height field they produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none", default)]
    pub id: Option<ObjectId>,
    pub name: String,
    pub seed: i64,
    pub params: TerrainConfig,
    // Flattened row-major: length = map_size × map_size
    pub height_map: Vec<f32>,
}

impl TerrainDoc {
    // Snapshot the terrain's current field under `name`
    pub fn capture<B: SceneBackend>(name: &str, terrain: &TerrainGenerator<B>) -> Result<Self> {
        let field = terrain.field().ok_or(MantleError::NoHeightField)?;
        Ok(Self {
            id: None,
            name: name.to_string(),
            seed: i64::from(terrain.seed()),
            params: terrain.config().clone(),
            height_map: field.as_slice().to_vec(),
        })
    }

    pub fn map_size(&self) -> usize {
        self.params.map_size
    }

    // Load the saved field into an existing terrain of the same map size
    pub fn restore_into<B: SceneBackend>(&self, terrain: &mut TerrainGenerator<B>) -> Result<()> {
        terrain.import_height_map_from_array(&self.height_map)?;
        Ok(())
    }

    // Fresh terrain with the saved settings and field
    pub fn to_terrain<B: SceneBackend>(&self, backend: Arc<B>) -> Result<TerrainGenerator<B>> {
        let mut params = self.params.clone();
        params.seed = u32::try_from(self.seed).ok().or(params.seed);
        let mut terrain = TerrainGenerator::new(backend, params);
        self.restore_into(&mut terrain)?;
        Ok(terrain)
    }
}
