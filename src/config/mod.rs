mod settings;

use crate::config::settings::PartialSettings;
use crate::utils::error::Result;
use config::{Config, Environment, File};

pub use settings::{BrokerSettings, PipeSettings, Settings, StorageSettings};

/// Loads the configuration from the default file and environment variables
/// and merges it with the built-in defaults.
///
/// Environment variables carry the `PIPESUB` prefix and nest sections with a
/// double underscore, e.g. `PIPESUB_BROKER__MAX_FEEDS=3`.
pub fn load_config() -> Result<Settings> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix("PIPESUB")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Take whatever is available, then fill the gaps with defaults
    let partial: PartialSettings = config.try_deserialize()?;
    let default = Settings::default();

    Ok(Settings {
        pipes: PipeSettings {
            control_path: partial
                .pipes
                .as_ref()
                .and_then(|p| p.control_path.clone())
                .unwrap_or(default.pipes.control_path),
            feed_prefix: partial
                .pipes
                .as_ref()
                .and_then(|p| p.feed_prefix.clone())
                .unwrap_or(default.pipes.feed_prefix),
        },
        broker: BrokerSettings {
            max_feeds: partial
                .broker
                .as_ref()
                .and_then(|b| b.max_feeds)
                .unwrap_or(default.broker.max_feeds),
            max_topics: partial
                .broker
                .as_ref()
                .and_then(|b| b.max_topics)
                .unwrap_or(default.broker.max_topics),
            max_subscribers_per_topic: partial
                .broker
                .as_ref()
                .and_then(|b| b.max_subscribers_per_topic)
                .unwrap_or(default.broker.max_subscribers_per_topic),
            tick_interval_secs: partial
                .broker
                .as_ref()
                .and_then(|b| b.tick_interval_secs)
                .unwrap_or(default.broker.tick_interval_secs),
        },
        storage: StorageSettings {
            store_path: partial
                .storage
                .as_ref()
                .and_then(|s| s.store_path.clone())
                .unwrap_or(default.storage.store_path),
        },
    })
}

#[cfg(test)]
mod tests;
