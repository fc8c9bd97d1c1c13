use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Covers the pipe locations shared by manager and feeds, the broker's
/// capacity limits and the message store location.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub pipes: PipeSettings,
    pub broker: BrokerSettings,
    pub storage: StorageSettings,
}

/// Locations of the named pipes.
///
/// Every feed's delivery pipe is `feed_prefix` + username.
#[derive(Debug, Deserialize, Clone)]
pub struct PipeSettings {
    pub control_path: String,
    pub feed_prefix: String,
}

/// Capacity limits and the evictor cadence.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    pub max_feeds: usize,
    pub max_topics: usize,
    pub max_subscribers_per_topic: usize,
    pub tick_interval_secs: u64,
}

/// Where persisted messages survive a restart.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    pub store_path: String,
}

/// Partial configuration loaded from files or environment.
///
/// Allows partial specification of settings; missing values fall back to the
/// defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub pipes: Option<PartialPipeSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub storage: Option<PartialStorageSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialPipeSettings {
    pub control_path: Option<String>,
    pub feed_prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub max_feeds: Option<usize>,
    pub max_topics: Option<usize>,
    pub max_subscribers_per_topic: Option<usize>,
    pub tick_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialStorageSettings {
    pub store_path: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pipes: PipeSettings::default(),
            broker: BrokerSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

impl Default for PipeSettings {
    fn default() -> Self {
        Self {
            control_path: "/tmp/manager_pipe".to_string(),
            feed_prefix: "/tmp/feed_".to_string(),
        }
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            max_feeds: 10,
            max_topics: 20,
            max_subscribers_per_topic: 10,
            tick_interval_secs: 1,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            store_path: "persistent_messages.txt".to_string(),
        }
    }
}
