// In-memory scene backend.
// Records every ground mesh, material and instance it is asked to create so
// tools can export them and tests can inspect them. Images resolve from an
// in-memory registry first, then from the filesystem.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use image::{DynamicImage, GrayImage};
use tokio::sync::oneshot;

use crate::backend::{GroundBuild, GroundOptions, InstanceTransform, SceneBackend};
use crate::error::{MantleError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MeshHandle {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MaterialHandle {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceHandle(pub u64);

// How ground builds report readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadyMode {
    #[default]
    Immediate,
    // Keep the signal pending forever
    Never,
    // Drop the sender without signalling
    Dropped,
}

#[derive(Debug, Clone)]
pub struct MeshRecord {
    pub handle: MeshHandle,
    pub heightmap: Option<GrayImage>,
    pub ground: Option<GroundOptions>,
    pub source_url: Option<String>,
    pub collisions: bool,
    pub receive_shadows: bool,
    pub material: Option<MaterialHandle>,
    pub disposed: bool,
}

#[derive(Debug, Clone)]
pub struct MaterialRecord {
    pub handle: MaterialHandle,
    pub uv_scale: Option<f64>,
    pub disposed: bool,
}

#[derive(Debug, Clone)]
pub struct InstanceRecord {
    pub handle: InstanceHandle,
    pub name: String,
    pub template: MeshHandle,
    pub parent: Option<MeshHandle>,
    pub transform: InstanceTransform,
}

#[derive(Default)]
struct SceneState {
    next_id: u64,
    ready_mode: ReadyMode,
    images: HashMap<String, DynamicImage>,
    meshes: Vec<MeshRecord>,
    materials: Vec<MaterialRecord>,
    instances: Vec<InstanceRecord>,
    disposed_instances: usize,
    mesh_loads: usize,
    pending_ready: Vec<oneshot::Sender<()>>,
}

impl SceneState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn mesh_mut(&mut self, handle: &MeshHandle) -> Option<&mut MeshRecord> {
        self.meshes.iter_mut().find(|m| m.handle.id == handle.id)
    }

    fn add_mesh(&mut self, name: &str) -> MeshHandle {
        let handle = MeshHandle {
            id: self.next_id(),
            name: name.to_string(),
        };
        self.meshes.push(MeshRecord {
            handle: handle.clone(),
            heightmap: None,
            ground: None,
            source_url: None,
            collisions: false,
            receive_shadows: false,
            material: None,
            disposed: false,
        });
        handle
    }
}

#[derive(Default)]
pub struct HeadlessScene {
    state: Mutex<SceneState>,
}

impl HeadlessScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ready_mode(mode: ReadyMode) -> Self {
        let scene = Self::default();
        scene.lock().ready_mode = mode;
        scene
    }

    fn lock(&self) -> MutexGuard<'_, SceneState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register_image(&self, url: &str, img: DynamicImage) {
        self.lock().images.insert(url.to_string(), img);
    }

    // Template mesh that `find_mesh` can resolve by name
    pub fn add_mesh(&self, name: &str) -> MeshHandle {
        self.lock().add_mesh(name)
    }

    pub fn mesh(&self, handle: &MeshHandle) -> Option<MeshRecord> {
        self.lock()
            .meshes
            .iter()
            .find(|m| m.handle.id == handle.id)
            .cloned()
    }

    pub fn live_meshes(&self) -> Vec<MeshRecord> {
        self.lock()
            .meshes
            .iter()
            .filter(|m| !m.disposed)
            .cloned()
            .collect()
    }

    pub fn material(&self, handle: &MaterialHandle) -> Option<MaterialRecord> {
        self.lock()
            .materials
            .iter()
            .find(|m| m.handle.id == handle.id)
            .cloned()
    }

    pub fn instances(&self) -> Vec<InstanceRecord> {
        self.lock().instances.clone()
    }

    pub fn instance_count(&self) -> usize {
        self.lock().instances.len()
    }

    pub fn disposed_instance_count(&self) -> usize {
        self.lock().disposed_instances
    }

    // How many times `load_mesh` fetched an asset
    pub fn mesh_loads(&self) -> usize {
        self.lock().mesh_loads
    }
}

impl SceneBackend for HeadlessScene {
    type Mesh = MeshHandle;
    type Material = MaterialHandle;
    type Instance = InstanceHandle;

    async fn decode_image(&self, url: &str) -> Result<DynamicImage> {
        if let Some(img) = self.lock().images.get(url) {
            return Ok(img.clone());
        }
        image::open(url).map_err(|source| MantleError::ImageLoad {
            url: url.to_string(),
            source,
        })
    }

    fn build_ground(
        &self,
        name: &str,
        heightmap: &GrayImage,
        options: &GroundOptions,
    ) -> GroundBuild<MeshHandle> {
        let mut state = self.lock();
        let mesh = state.add_mesh(name);
        if let Some(record) = state.mesh_mut(&mesh) {
            record.heightmap = Some(heightmap.clone());
            record.ground = Some(options.clone());
        }

        let (tx, ready) = oneshot::channel();
        match state.ready_mode {
            ReadyMode::Immediate => {
                let _ = tx.send(());
            }
            ReadyMode::Never => state.pending_ready.push(tx),
            ReadyMode::Dropped => drop(tx),
        }
        GroundBuild { mesh, ready }
    }

    fn enable_collisions(&self, mesh: &MeshHandle) {
        if let Some(record) = self.lock().mesh_mut(mesh) {
            record.collisions = true;
        }
    }

    fn set_receive_shadows(&self, mesh: &MeshHandle, receive: bool) {
        if let Some(record) = self.lock().mesh_mut(mesh) {
            record.receive_shadows = receive;
        }
    }

    fn assign_material(&self, mesh: &MeshHandle, material: &MaterialHandle) {
        if let Some(record) = self.lock().mesh_mut(mesh) {
            record.material = Some(material.clone());
        }
    }

    fn create_default_material(&self, name: &str, uv_scale: f64) -> MaterialHandle {
        let mut state = self.lock();
        let handle = MaterialHandle {
            id: state.next_id(),
            name: name.to_string(),
        };
        state.materials.push(MaterialRecord {
            handle: handle.clone(),
            uv_scale: Some(uv_scale),
            disposed: false,
        });
        handle
    }

    fn dispose_mesh(&self, mesh: &MeshHandle) {
        if let Some(record) = self.lock().mesh_mut(mesh) {
            record.disposed = true;
        }
    }

    fn dispose_material(&self, material: &MaterialHandle) {
        let mut state = self.lock();
        if let Some(record) = state
            .materials
            .iter_mut()
            .find(|m| m.handle.id == material.id)
        {
            record.disposed = true;
        }
    }

    async fn load_mesh(&self, url: &str) -> Result<Option<MeshHandle>> {
        if url.trim().is_empty() {
            return Err(MantleError::Backend("empty mesh url".into()));
        }
        let name = url.rsplit('/').next().unwrap_or(url);
        let mut state = self.lock();
        state.mesh_loads += 1;
        let mesh = state.add_mesh(name);
        if let Some(record) = state.mesh_mut(&mesh) {
            record.source_url = Some(url.to_string());
        }
        Ok(Some(mesh))
    }

    fn find_mesh(&self, name: &str) -> Option<MeshHandle> {
        self.lock()
            .meshes
            .iter()
            .find(|m| !m.disposed && m.handle.name == name)
            .map(|m| m.handle.clone())
    }

    fn create_instance(
        &self,
        template: &MeshHandle,
        name: &str,
        transform: &InstanceTransform,
        parent: Option<&MeshHandle>,
    ) -> InstanceHandle {
        let mut state = self.lock();
        let handle = InstanceHandle(state.next_id());
        state.instances.push(InstanceRecord {
            handle,
            name: name.to_string(),
            template: template.clone(),
            parent: parent.cloned(),
            transform: *transform,
        });
        handle
    }

    fn dispose_instance(&self, instance: InstanceHandle) {
        let mut state = self.lock();
        let before = state.instances.len();
        state.instances.retain(|i| i.handle != instance);
        state.disposed_instances += before - state.instances.len();
    }
}
