use std::sync::Arc;

use mantle_core::config::TerrainConfig;
use mantle_core::{HeadlessScene, MantleError, TerrainGenerator};
use mantle_storage::TerrainStore;
use mantle_storage::models::TerrainDoc;

fn terrain(map_size: usize, seed: u32) -> TerrainGenerator<HeadlessScene> {
    let config = TerrainConfig {
        map_size,
        seed: Some(seed),
        ..TerrainConfig::default()
    };
    let mut t = TerrainGenerator::new(Arc::new(HeadlessScene::new()), config);
    t.generate_height_map();
    t.erode(Some(500)).expect("erosion failed");
    t
}

#[test]
fn capture_requires_a_field() {
    let t = TerrainGenerator::new(Arc::new(HeadlessScene::new()), TerrainConfig::default());
    let err = TerrainDoc::capture("empty", &t).unwrap_err();
    assert!(matches!(err, MantleError::NoHeightField));
}

#[test]
fn snapshot_restores_field_and_settings() {
    let original = terrain(33, 42);
    let doc = TerrainDoc::capture("valley", &original).expect("capture failed");
    assert_eq!(doc.seed, 42);
    assert_eq!(doc.map_size(), 33);
    assert_eq!(doc.height_map.len(), 33 * 33);

    let restored = doc
        .to_terrain(Arc::new(HeadlessScene::new()))
        .expect("restore failed");
    assert_eq!(restored.seed(), 42);
    assert_eq!(restored.config(), original.config());
    assert_eq!(restored.field(), original.field());
}

#[test]
fn restore_into_rejects_other_map_sizes() {
    let doc = TerrainDoc::capture("small", &terrain(16, 1)).expect("capture failed");
    let mut other = terrain(32, 1);
    let err = doc.restore_into(&mut other).unwrap_err();
    assert!(matches!(
        err,
        MantleError::SizeMismatch {
            expected: 1024,
            actual: 256
        }
    ));
}

#[test]
fn snapshot_survives_bson() {
    let doc = TerrainDoc::capture("bson", &terrain(16, 7)).expect("capture failed");
    let encoded = bson::to_document(&doc).expect("encode failed");
    assert!(!encoded.contains_key("_id"));
    let decoded: TerrainDoc = bson::from_document(encoded).expect("decode failed");
    assert_eq!(decoded, doc);
}

#[test]
#[ignore = "needs a MongoDB server on localhost:27017"]
fn test_roundtrip_mongo() {
    use tokio::runtime::Builder;

    let rt = Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build Tokio runtime");

    rt.block_on(async {
        let t = terrain(65, 4242);
        let doc = TerrainDoc::capture("roundtrip", &t).expect("capture failed");

        let store = TerrainStore::init("mongodb://localhost:27017", "mantle_test", "terrains")
            .await
            .expect("storage init failed");

        store.create(&doc).await.expect("create failed");
        // Saving again under the same name replaces the first copy
        store.create(&doc).await.expect("replace failed");

        let found = store
            .read_by_name("roundtrip")
            .await
            .expect("read failed")
            .expect("doc not found");
        assert_eq!(found.height_map, doc.height_map);
        assert!(store.list_names().await.expect("list failed").contains(&doc.name));

        let by_seed = store
            .read_by_seed(4242)
            .await
            .expect("read failed")
            .expect("doc not found");
        assert_eq!(by_seed.name, "roundtrip");

        assert!(store.delete_by_name("roundtrip").await.expect("delete failed"));
        assert!(store.read_by_name("roundtrip").await.expect("read failed").is_none());
    });
}
