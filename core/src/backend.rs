// Capabilities the terrain core needs from a host scene.
// The core never touches engine classes directly: it asks the backend to
// decode images, build a displaced ground mesh from a grayscale heightmap,
// manage materials, and place object instances.

use glam::DVec3;
use image::{DynamicImage, GrayImage};
use tokio::sync::oneshot;

use crate::error::Result;

// Parameters for building a ground mesh from a heightmap image.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundOptions {
    pub width: f64,
    pub depth: f64,
    pub subdivisions: u32,
    pub min_height: f64,
    pub max_height: f64,
    pub updatable: bool,
}

// A ground mesh handle plus a signal that fires once the mesh is usable.
// The sender may never fire (slow or failed texture decode); callers bound
// the wait with a timeout.
pub struct GroundBuild<M> {
    pub mesh: M,
    pub ready: oneshot::Receiver<()>,
}

// Caller overrides for terrain mesh construction.
#[derive(Debug, Clone)]
pub struct MeshOptions<Mat> {
    // Defaults to `map_size - 1`.
    pub subdivisions: Option<u32>,
    // Defaults to 0.
    pub min_height: Option<f64>,
    // Defaults to the terrain's elevation scale.
    pub max_height: Option<f64>,
    // Replaces the default textured material.
    pub material: Option<Mat>,
    pub receive_shadows: bool,
}

impl<Mat> Default for MeshOptions<Mat> {
    fn default() -> Self {
        Self {
            subdivisions: None,
            min_height: None,
            max_height: None,
            material: None,
            receive_shadows: true,
        }
    }
}

// Placement of a single object instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceTransform {
    pub position: DVec3,
    // Uniform scale.
    pub scale: f64,
    // Rotation about the instance's up axis, radians.
    pub rotation_y: f64,
    // Up axis; world Y unless the layer aligns to the surface.
    pub up: DVec3,
}

impl InstanceTransform {
    pub fn at(position: DVec3) -> Self {
        Self {
            position,
            scale: 1.0,
            rotation_y: 0.0,
            up: DVec3::Y,
        }
    }
}

#[allow(async_fn_in_trait)]
pub trait SceneBackend {
    type Mesh: Clone;
    type Material: Clone + PartialEq;
    type Instance: Clone;

    async fn decode_image(&self, url: &str) -> Result<DynamicImage>;

    fn build_ground(
        &self,
        name: &str,
        heightmap: &GrayImage,
        options: &GroundOptions,
    ) -> GroundBuild<Self::Mesh>;

    fn enable_collisions(&self, mesh: &Self::Mesh);

    fn set_receive_shadows(&self, mesh: &Self::Mesh, receive: bool);

    fn assign_material(&self, mesh: &Self::Mesh, material: &Self::Material);

    // Tinted, tiled ground material; `uv_scale` repeats the texture
    fn create_default_material(&self, name: &str, uv_scale: f64) -> Self::Material;

    fn dispose_mesh(&self, mesh: &Self::Mesh);

    fn dispose_material(&self, material: &Self::Material);

    // Ok(None) when the asset loads but holds no mesh
    async fn load_mesh(&self, url: &str) -> Result<Option<Self::Mesh>>;

    fn find_mesh(&self, name: &str) -> Option<Self::Mesh>;

    fn create_instance(
        &self,
        template: &Self::Mesh,
        name: &str,
        transform: &InstanceTransform,
        parent: Option<&Self::Mesh>,
    ) -> Self::Instance;

    fn dispose_instance(&self, instance: Self::Instance);
}
