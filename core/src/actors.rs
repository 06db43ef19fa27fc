// Actor scatter: props, rocks and trees placed by rule, optionally aligned
// to the terrain surface, plus single manual placements.

use std::sync::Arc;

use glam::DVec3;

use crate::backend::{InstanceTransform, SceneBackend};
use crate::config::ActorsConfig;
use crate::error::Result;
use crate::scatter::{ScatterLayer, ScatterRule};
use crate::terrain::TerrainGenerator;

const INSTANCE_PREFIX: &str = "actor";

pub struct ActorScatterLayer<B: SceneBackend> {
    pub layer: ScatterLayer<B>,
    // Orient instances to the surface normal instead of world up.
    pub align_to_surface: bool,
}

impl<B: SceneBackend> ActorScatterLayer<B> {
    pub fn new(rule: ScatterRule, align_to_surface: bool) -> Self {
        Self {
            layer: ScatterLayer::new(rule),
            align_to_surface,
        }
    }

    pub fn id(&self) -> &str {
        self.layer.id()
    }
}

// Template for a manual placement: a mesh handle or the name of a mesh
// already in the scene.
pub enum MeshRef<'a, M> {
    Mesh(&'a M),
    Name(&'a str),
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScatterAtOptions {
    pub scale: Option<f64>,
    pub rotation_y: Option<f64>,
}

pub struct ActorScatterManager<B: SceneBackend> {
    backend: Arc<B>,
    layers: Vec<ActorScatterLayer<B>>,
    manual: Vec<B::Instance>,
    placed_manually: u64,
}

impl<B: SceneBackend> ActorScatterManager<B> {
    pub fn new(backend: Arc<B>, config: &ActorsConfig) -> Self {
        let layers = config
            .layers
            .iter()
            .map(|c| ActorScatterLayer::new(c.rule.clone(), c.align_to_surface))
            .collect();
        Self {
            backend,
            layers,
            manual: Vec::new(),
            placed_manually: 0,
        }
    }

    pub fn layers(&self) -> &[ActorScatterLayer<B>] {
        &self.layers
    }

    pub fn layer_mut(&mut self, id: &str) -> Option<&mut ActorScatterLayer<B>> {
        self.layers.iter_mut().find(|l| l.id() == id)
    }

    // Actor layers are unbounded
    pub fn add_layer(&mut self, layer: ActorScatterLayer<B>) {
        self.layers.push(layer);
    }

    pub fn remove_layer(&mut self, id: &str) -> bool {
        let Some(i) = self.layers.iter().position(|l| l.id() == id) else {
            return false;
        };
        let mut removed = self.layers.remove(i);
        removed.layer.clear(&self.backend);
        true
    }

    pub fn instance_count(&self) -> usize {
        self.manual.len()
            + self
                .layers
                .iter()
                .map(|l| l.layer.instances().len())
                .sum::<usize>()
    }

    // Place one instance at world (x, z) on the surface, ignoring every
    // layer filter. Ok(None) when a named mesh is not in the scene.
    pub fn scatter_at(
        &mut self,
        terrain: &TerrainGenerator<B>,
        world_x: f64,
        world_z: f64,
        mesh: MeshRef<'_, B::Mesh>,
        options: ScatterAtOptions,
    ) -> Result<Option<B::Instance>> {
        let template = match mesh {
            MeshRef::Mesh(m) => m.clone(),
            MeshRef::Name(name) => match self.backend.find_mesh(name) {
                Some(m) => m,
                None => {
                    log::debug!("scatter_at: no mesh named {name}");
                    return Ok(None);
                }
            },
        };
        let y = terrain.height_at_world(world_x, world_z)?;

        self.placed_manually += 1;
        let name = format!("{INSTANCE_PREFIX}_manual_{}", self.placed_manually);
        let transform = InstanceTransform {
            position: DVec3::new(world_x, y, world_z),
            scale: options.scale.unwrap_or(1.0),
            rotation_y: options.rotation_y.unwrap_or(0.0),
            up: DVec3::Y,
        };
        let inst = self
            .backend
            .create_instance(&template, &name, &transform, terrain.mesh());
        self.manual.push(inst.clone());
        Ok(Some(inst))
    }

    pub async fn scatter_all(&mut self, terrain: &TerrainGenerator<B>) -> usize {
        let mut placed = 0;
        for actor in &mut self.layers {
            if actor.layer.rule.enabled {
                placed += actor
                    .layer
                    .scatter(terrain, INSTANCE_PREFIX, actor.align_to_surface)
                    .await;
            }
        }
        log::info!("actors: placed {placed} instances");
        placed
    }

    // Dispose layer and manual instances; layers stay registered
    pub fn clear_all(&mut self) {
        for actor in &mut self.layers {
            actor.layer.clear(&self.backend);
        }
        for inst in self.manual.drain(..) {
            self.backend.dispose_instance(inst);
        }
    }

    pub fn dispose(&mut self) {
        self.clear_all();
    }
}
