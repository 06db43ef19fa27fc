// core holds the Mantle terrain engine: noise, height synthesis, erosion,
// painting and scatter, independent of any rendering backend
pub mod actors;
pub mod backend;
pub mod config;
pub mod erosion;
pub mod error;
pub mod field;
pub mod foliage;
pub mod headless;
pub mod heightmap;
pub mod mantle;
pub mod painting;
pub mod preview;
pub mod rng;
pub mod scatter;
pub mod simplex3;
pub mod terrain;

pub use actors::{ActorScatterLayer, ActorScatterManager};
pub use backend::{GroundBuild, GroundOptions, InstanceTransform, MeshOptions, SceneBackend};
pub use config::{MantleConfig, TerrainConfig};
pub use erosion::{ErosionStats, HydraulicErosion};
pub use error::MantleError;
pub use field::HeightField;
pub use foliage::{FoliageEntry, FoliageGroupLayer, FoliageLayer, FoliageLayerManager};
pub use headless::HeadlessScene;
pub use heightmap::HeightMapGenerator;
pub use mantle::{GenerateOptions, Mantle};
pub use painting::{BrushMode, TerrainPainter};
pub use rng::Mulberry32;
pub use simplex3::SimplexNoise3D;
pub use terrain::TerrainGenerator;

// noise generator that can sample 2D or 3D points
// 3D implementations provide `get3(...)`; `get2(...)` is the z = 0 slice
// unless overridden.
pub trait NoiseGenerator {
    // Sample 3D noise at (x, y, z).
    fn get3(&self, x: f64, y: f64, z: f64) -> f64;

    // Sample 2D noise at (x, y).
    fn get2(&self, x: f64, y: f64) -> f64 {
        self.get3(x, y, 0.0)
    }
}
