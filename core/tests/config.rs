use fiefdom_core::{config::GameConfig, model::Resource, morale::EffectMode};

fn data_dir() -> String {
    format!("{}/../data", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn shipped_tables_load_and_match_the_test_defaults() {
    let _ = env_logger::builder().is_test(true).try_init();
    let loaded = GameConfig::load(&data_dir()).expect("data directory loads");
    let defaults = GameConfig::default_test();

    assert_eq!(
        loaded.building_types.keys().collect::<Vec<_>>(),
        defaults.building_types.keys().collect::<Vec<_>>()
    );
    assert_eq!(loaded.walls.keys().collect::<Vec<_>>(), vec![&1i64, &2i64]);
    assert_eq!(loaded.world.anchor_type, "home_base");
    assert_eq!(loaded.world.starting_resources.get(&Resource::Gold), Some(&1000));

    let farm = loaded.building("farm").expect("farm");
    assert_eq!(farm.cost_for_level(2).get(&Resource::Gold), Some(&100));
    assert!((farm.production[&Resource::Grain].rate_per_hour(2) - 9.0).abs() < 1e-9);

    let hall = loaded.building("banner_hall").and_then(|b| b.morale.as_ref()).expect("banner hall morale");
    assert_eq!(hall.mode, EffectMode::Multiply);
}

#[test]
fn missing_directory_is_an_error() {
    assert!(GameConfig::load("/definitely/not/here").is_err());
}
