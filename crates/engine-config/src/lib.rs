pub mod settings;

pub use settings::{
    LoaderSettings, error::SettingsError, validated::ValidatedSettings,
    validator::SettingsValidator,
};
