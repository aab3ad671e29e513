// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Enforces non-empty build command and target lists.

use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::BTreeMap;

use super::TargetConfig;
use crate::types::TargetId;

pub fn deserialize_commands<'de, D>(deserializer: D) -> Result<NonEmpty<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let commands: Vec<String> = Vec::deserialize(deserializer)?;
    if let Some(blank) = commands.iter().position(|c| c.trim().is_empty()) {
        return Err(serde::de::Error::custom(format!(
            "build command #{} is empty",
            blank + 1
        )));
    }

    NonEmpty::from_vec(commands)
        .ok_or_else(|| serde::de::Error::custom("at least one build command is required"))
}

pub fn deserialize_targets<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<TargetId, TargetConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let targets: BTreeMap<TargetId, TargetConfig> = BTreeMap::deserialize(deserializer)?;
    if targets.is_empty() {
        return Err(serde::de::Error::custom("at least one target is required"));
    }
    Ok(targets)
}
