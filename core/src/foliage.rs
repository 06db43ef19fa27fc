// Foliage layers: up to `MAX_LAYERS` layers or groups of layers, scattered
// over the terrain in insertion order.

use std::sync::Arc;

use crate::backend::SceneBackend;
use crate::config::FoliageConfig;
use crate::error::{MantleError, Result};
use crate::scatter::{ScatterLayer, ScatterRule};
use crate::terrain::TerrainGenerator;

pub const MAX_LAYERS: usize = 20;

const INSTANCE_PREFIX: &str = "foliage";

pub type FoliageLayer<B> = ScatterLayer<B>;

// Organizational grouping. Disabling the group skips its children; the
// children keep their own filters.
pub struct FoliageGroupLayer<B: SceneBackend> {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    layers: Vec<FoliageLayer<B>>,
}

impl<B: SceneBackend> FoliageGroupLayer<B> {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            enabled: true,
            layers: Vec::new(),
        }
    }

    pub fn layers(&self) -> &[FoliageLayer<B>] {
        &self.layers
    }

    pub fn layer_mut(&mut self, id: &str) -> Option<&mut FoliageLayer<B>> {
        self.layers.iter_mut().find(|l| l.id() == id)
    }

    pub fn add_layer(&mut self, layer: FoliageLayer<B>) -> Result<()> {
        if self.layers.len() >= MAX_LAYERS {
            return Err(MantleError::LayerLimit { max: MAX_LAYERS });
        }
        self.layers.push(layer);
        Ok(())
    }

    // Remove a child by id, disposing everything it placed
    pub fn remove_layer(&mut self, backend: &B, id: &str) -> bool {
        let Some(i) = self.layers.iter().position(|l| l.id() == id) else {
            return false;
        };
        self.layers.remove(i).clear(backend);
        true
    }
}

pub enum FoliageEntry<B: SceneBackend> {
    Layer(FoliageLayer<B>),
    Group(FoliageGroupLayer<B>),
}

impl<B: SceneBackend> FoliageEntry<B> {
    pub fn id(&self) -> &str {
        match self {
            Self::Layer(l) => l.id(),
            Self::Group(g) => &g.id,
        }
    }

    pub fn enabled(&self) -> bool {
        match self {
            Self::Layer(l) => l.rule.enabled,
            Self::Group(g) => g.enabled,
        }
    }

    fn layers_mut(&mut self) -> &mut [FoliageLayer<B>] {
        match self {
            Self::Layer(l) => std::slice::from_mut(l),
            Self::Group(g) => &mut g.layers,
        }
    }

    fn instance_count(&self) -> usize {
        match self {
            Self::Layer(l) => l.instances().len(),
            Self::Group(g) => g.layers.iter().map(|l| l.instances().len()).sum(),
        }
    }
}

pub struct FoliageLayerManager<B: SceneBackend> {
    backend: Arc<B>,
    max_layers: usize,
    entries: Vec<FoliageEntry<B>>,
}

impl<B: SceneBackend> FoliageLayerManager<B> {
    pub fn new(backend: Arc<B>, config: &FoliageConfig) -> Self {
        let mut manager = Self {
            backend,
            max_layers: config.max_layers,
            entries: Vec::new(),
        };
        for rule in &config.layers {
            if let Err(e) = manager.add_layer(FoliageLayer::new(rule.clone())) {
                log::warn!("foliage layer {} dropped: {e}", rule.id);
            }
        }
        for group_config in &config.groups {
            let mut group = FoliageGroupLayer::new(&group_config.id, &group_config.name);
            group.enabled = group_config.enabled;
            for rule in &group_config.layers {
                if let Err(e) = group.add_layer(FoliageLayer::new(rule.clone())) {
                    log::warn!("foliage layer {} dropped from {}: {e}", rule.id, group.id);
                }
            }
            if let Err(e) = manager.add_group(group) {
                log::warn!("foliage group {} dropped: {e}", group_config.id);
            }
        }
        manager
    }

    pub fn entries(&self) -> &[FoliageEntry<B>] {
        &self.entries
    }

    pub fn entry_mut(&mut self, id: &str) -> Option<&mut FoliageEntry<B>> {
        self.entries.iter_mut().find(|e| e.id() == id)
    }

    pub fn max_layers(&self) -> usize {
        self.max_layers
    }

    pub fn instance_count(&self) -> usize {
        self.entries.iter().map(FoliageEntry::instance_count).sum()
    }

    pub fn add_layer(&mut self, layer: FoliageLayer<B>) -> Result<()> {
        self.push(FoliageEntry::Layer(layer))
    }

    pub fn add_group(&mut self, group: FoliageGroupLayer<B>) -> Result<()> {
        self.push(FoliageEntry::Group(group))
    }

    // Convenience for config-driven callers
    pub fn add_rule(&mut self, rule: ScatterRule) -> Result<()> {
        self.add_layer(FoliageLayer::new(rule))
    }

    fn push(&mut self, entry: FoliageEntry<B>) -> Result<()> {
        if self.entries.len() >= self.max_layers {
            return Err(MantleError::LayerLimit {
                max: self.max_layers,
            });
        }
        self.entries.push(entry);
        Ok(())
    }

    // Remove a layer or group by id, disposing everything it placed
    pub fn remove_layer(&mut self, id: &str) -> bool {
        let Some(i) = self.entries.iter().position(|e| e.id() == id) else {
            return false;
        };
        let mut entry = self.entries.remove(i);
        for layer in entry.layers_mut() {
            layer.clear(&self.backend);
        }
        true
    }

    // Re-scatter every enabled layer, descending one level into enabled
    // groups. Returns the total number of instances placed.
    pub async fn scatter_all(&mut self, terrain: &TerrainGenerator<B>) -> usize {
        let mut placed = 0;
        for entry in &mut self.entries {
            if !entry.enabled() {
                continue;
            }
            for layer in entry.layers_mut() {
                if layer.rule.enabled {
                    placed += layer.scatter(terrain, INSTANCE_PREFIX, false).await;
                }
            }
        }
        log::info!("foliage: placed {placed} instances");
        placed
    }

    pub fn clear_all(&mut self) {
        for entry in &mut self.entries {
            for layer in entry.layers_mut() {
                layer.clear(&self.backend);
            }
        }
    }

    pub fn dispose(&mut self) {
        self.clear_all();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{FoliageEntry, FoliageGroupLayer, FoliageLayer, FoliageLayerManager, MAX_LAYERS};
    use crate::config::{FoliageConfig, FoliageGroupConfig, TerrainConfig};
    use crate::error::MantleError;
    use crate::headless::HeadlessScene;
    use crate::scatter::ScatterRule;
    use crate::terrain::TerrainGenerator;

    fn rule(id: &str) -> ScatterRule {
        ScatterRule {
            id: id.into(),
            density: 0.05,
            mesh_url: Some(format!("assets/{id}.glb")),
            seed: Some(11),
            ..ScatterRule::default()
        }
    }

    fn setup() -> (Arc<HeadlessScene>, TerrainGenerator<HeadlessScene>) {
        let scene = Arc::new(HeadlessScene::new());
        let config = TerrainConfig {
            map_size: 32,
            seed: Some(5),
            ..TerrainConfig::default()
        };
        let mut terrain = TerrainGenerator::new(scene.clone(), config);
        terrain.generate_height_map();
        (scene, terrain)
    }

    #[test]
    fn manager_enforces_layer_limit() {
        let mut m = FoliageLayerManager::new(
            Arc::new(HeadlessScene::new()),
            &FoliageConfig::default(),
        );
        for i in 0..MAX_LAYERS {
            m.add_rule(rule(&format!("l{i}"))).unwrap();
        }
        let err = m.add_rule(rule("extra")).unwrap_err();
        assert!(matches!(err, MantleError::LayerLimit { max: 20 }));
        assert_eq!(m.entries().len(), MAX_LAYERS);
    }

    #[test]
    fn group_enforces_layer_limit() {
        let scene = HeadlessScene::new();
        let mut g = FoliageGroupLayer::<HeadlessScene>::new("g", "Group");
        for i in 0..MAX_LAYERS {
            g.add_layer(FoliageLayer::new(rule(&format!("l{i}")))).unwrap();
        }
        assert!(g.add_layer(FoliageLayer::new(rule("extra"))).is_err());
        assert!(g.remove_layer(&scene, "l3"));
        assert!(!g.remove_layer(&scene, "l3"));
        assert_eq!(g.layers().len(), MAX_LAYERS - 1);
    }

    #[tokio::test]
    async fn scatter_replaces_instances_and_caches_mesh() {
        let (scene, terrain) = setup();
        let config = FoliageConfig {
            layers: vec![rule("grass")],
            ..FoliageConfig::default()
        };
        let mut m = FoliageLayerManager::new(scene.clone(), &config);

        let first = m.scatter_all(&terrain).await;
        assert!(first > 0);
        assert_eq!(scene.instance_count(), first);
        let second = m.scatter_all(&terrain).await;
        assert_eq!(scene.instance_count(), second);
        assert_eq!(scene.disposed_instance_count(), first);
        assert_eq!(scene.mesh_loads(), 1);
        assert!(scene.instances().iter().all(|i| i.name.starts_with("foliage_grass_")));
    }

    #[tokio::test]
    async fn seeded_layers_place_identically() {
        let (scene_a, terrain_a) = setup();
        let (scene_b, terrain_b) = setup();
        let config = FoliageConfig {
            layers: vec![rule("rocks")],
            ..FoliageConfig::default()
        };
        let mut a = FoliageLayerManager::new(scene_a.clone(), &config);
        let mut b = FoliageLayerManager::new(scene_b.clone(), &config);
        a.scatter_all(&terrain_a).await;
        b.scatter_all(&terrain_b).await;
        let ta: Vec<_> = scene_a.instances().iter().map(|i| i.transform).collect();
        let tb: Vec<_> = scene_b.instances().iter().map(|i| i.transform).collect();
        assert_eq!(ta, tb);
    }

    #[tokio::test]
    async fn disabled_group_skips_children() {
        let (scene, terrain) = setup();
        let config = FoliageConfig {
            groups: vec![
                FoliageGroupConfig {
                    id: "off".into(),
                    enabled: false,
                    layers: vec![rule("a")],
                    ..FoliageGroupConfig::default()
                },
                FoliageGroupConfig {
                    id: "on".into(),
                    layers: vec![
                        rule("b"),
                        ScatterRule {
                            enabled: false,
                            ..rule("c")
                        },
                    ],
                    ..FoliageGroupConfig::default()
                },
            ],
            ..FoliageConfig::default()
        };
        let mut m = FoliageLayerManager::new(scene.clone(), &config);
        let placed = m.scatter_all(&terrain).await;
        assert!(placed > 0);
        assert!(scene.instances().iter().all(|i| i.name.starts_with("foliage_b_")));
    }

    #[tokio::test]
    async fn layers_without_mesh_are_skipped() {
        let (scene, terrain) = setup();
        let config = FoliageConfig {
            layers: vec![ScatterRule {
                mesh_url: None,
                ..rule("bare")
            }],
            ..FoliageConfig::default()
        };
        let mut m = FoliageLayerManager::new(scene.clone(), &config);
        assert_eq!(m.scatter_all(&terrain).await, 0);
        assert_eq!(scene.mesh_loads(), 0);
    }

    #[tokio::test]
    async fn template_layers_parent_to_terrain_mesh() {
        let (scene, mut terrain) = setup();
        let mesh = terrain
            .construct_mesh(crate::backend::MeshOptions::default())
            .await
            .unwrap();
        let bush = scene.add_mesh("bush");
        let mut m = FoliageLayerManager::new(scene.clone(), &FoliageConfig::default());
        let layer = FoliageLayer::new(ScatterRule {
            mesh_url: None,
            ..rule("bush")
        })
        .with_template(bush.clone());
        m.add_layer(layer).unwrap();

        assert!(m.scatter_all(&terrain).await > 0);
        for inst in scene.instances() {
            assert_eq!(inst.template, bush);
            assert_eq!(inst.parent.as_ref(), Some(&mesh));
        }
    }

    #[tokio::test]
    async fn remove_and_clear_dispose_instances() {
        let (scene, terrain) = setup();
        let config = FoliageConfig {
            layers: vec![rule("a"), rule("b")],
            ..FoliageConfig::default()
        };
        let mut m = FoliageLayerManager::new(scene.clone(), &config);
        m.scatter_all(&terrain).await;
        let before = scene.instance_count();

        assert!(m.remove_layer("a"));
        assert!(!m.remove_layer("a"));
        assert!(scene.instance_count() < before);
        assert_eq!(scene.instance_count(), m.instance_count());

        m.dispose();
        assert_eq!(scene.instance_count(), 0);
        assert_eq!(m.instance_count(), 0);
    }

    #[tokio::test]
    async fn group_child_removal_disposes_instances() {
        let (scene, terrain) = setup();
        let config = FoliageConfig {
            groups: vec![FoliageGroupConfig {
                id: "g".into(),
                layers: vec![rule("a")],
                ..FoliageGroupConfig::default()
            }],
            ..FoliageConfig::default()
        };
        let mut m = FoliageLayerManager::new(scene.clone(), &config);
        assert!(m.scatter_all(&terrain).await > 0);

        let Some(FoliageEntry::Group(g)) = m.entry_mut("g") else {
            panic!("group g missing");
        };
        assert!(g.remove_layer(&scene, "a"));
        assert!(g.layers().is_empty());
        assert_eq!(scene.instance_count(), 0);
        assert_eq!(m.instance_count(), 0);
    }
}
