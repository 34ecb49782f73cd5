//! Loading [`RecPlayConfig`] from JSON files.

use std::fs;
use std::path::Path;

use recplay_core::config::{ArtifactName, DeviceId, MAX_DEVICE_ID_LEN, MAX_NAME_LEN};
use recplay_core::RecPlayConfig;

use crate::error::{Error, Result};

/// Read a config file. Missing fields take their defaults.
pub fn load(path: &Path) -> Result<RecPlayConfig> {
    let text = fs::read_to_string(path)?;
    parse(&text)
}

pub fn parse(text: &str) -> Result<RecPlayConfig> {
    let config: RecPlayConfig = serde_json::from_str(text)?;
    config.validate()?;
    Ok(config)
}

pub fn device_id(s: &str) -> Result<DeviceId> {
    DeviceId::try_from(s).map_err(|_| Error::TooLong("device id", MAX_DEVICE_ID_LEN))
}

pub fn artifact_name(s: &str) -> Result<ArtifactName> {
    ArtifactName::try_from(s).map_err(|_| Error::TooLong("artifact name", MAX_NAME_LEN))
}
