use serial_test::serial;

use super::load_config;
use super::settings::Settings;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.pipes.control_path, "/tmp/manager_pipe");
    assert_eq!(settings.pipes.feed_prefix, "/tmp/feed_");
    assert_eq!(settings.broker.max_feeds, 10);
    assert_eq!(settings.broker.max_topics, 20);
    assert_eq!(settings.broker.max_subscribers_per_topic, 10);
    assert_eq!(settings.broker.tick_interval_secs, 1);
    assert_eq!(settings.storage.store_path, "persistent_messages.txt");
}

#[test]
#[serial]
fn test_load_config_falls_back_to_defaults() {
    // Shield the process env so stray overrides cannot leak in
    temp_env::with_vars_unset(
        [
            "PIPESUB_PIPES__CONTROL_PATH",
            "PIPESUB_BROKER__MAX_FEEDS",
            "PIPESUB_STORAGE__STORE_PATH",
        ],
        || {
            let loaded = load_config().expect("config should load");
            let default = Settings::default();
            assert_eq!(loaded.broker.max_feeds, default.broker.max_feeds);
            assert_eq!(loaded.storage.store_path, default.storage.store_path);
        },
    );
}

#[test]
#[serial]
fn test_env_overrides_a_single_setting() {
    temp_env::with_var("PIPESUB_BROKER__MAX_FEEDS", Some("3"), || {
        let loaded = load_config().expect("config should load");
        assert_eq!(loaded.broker.max_feeds, 3);

        // everything not overridden keeps its default
        let default = Settings::default();
        assert_eq!(loaded.broker.max_topics, default.broker.max_topics);
        assert_eq!(loaded.pipes.control_path, default.pipes.control_path);
    });
}

#[test]
#[serial]
fn test_env_overrides_a_string_setting() {
    temp_env::with_var(
        "PIPESUB_STORAGE__STORE_PATH",
        Some("/tmp/other_store.txt"),
        || {
            let loaded = load_config().expect("config should load");
            assert_eq!(loaded.storage.store_path, "/tmp/other_store.txt");
        },
    );
}
