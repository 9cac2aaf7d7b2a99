// Configuration loading

pub mod settings;

pub use settings::{ConfigError, FeedSettings, HarvestSettings, Settings, StoreSettings};
