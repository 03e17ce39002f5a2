//! # Scan Engine Configuration
//!
//! Parsed form of the user-editable engine YAML: a mapping from scan type
//! name to a sub-configuration holding tool entries.
//!
//! ```yaml
//! subdomain_discovery:
//!   passive_tools:
//!     subfinder:
//!       enabled: true
//!       timeout: 600
//! port_scan:
//!   tools:
//!     naabu_active:
//!       enabled: true
//!       ports: top-1000
//! ```
//!
//! Unknown top-level keys are ignored. Key declaration order is preserved
//! for logging only; execution order always comes from the stage table.

use crate::constants::{ScanType, ToolGrouping};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value as YamlValue};
use std::collections::BTreeMap;
use std::str::FromStr;

const ENABLED_KEY: &str = "enabled";

/// One tool entry after resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    pub enabled: bool,
    /// Tool-specific parameters passed through to the executor untouched
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub params: serde_json::Map<String, serde_json::Value>,
}

/// Enabled tools of one scan type, keyed by tool name
pub type ToolSet = BTreeMap<String, ToolConfig>;

/// Top-level engine configuration in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct ScanEngineConfig {
    entries: Vec<(String, YamlValue)>,
}

impl ScanEngineConfig {
    /// Parse raw engine configuration text
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Err(ConfigError::Empty);
        }

        let value: YamlValue =
            serde_yaml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mapping = match value {
            YamlValue::Mapping(mapping) => mapping,
            YamlValue::Null => return Err(ConfigError::Empty),
            other => {
                return Err(ConfigError::NotAMapping {
                    found: yaml_kind(&other).to_string(),
                })
            }
        };

        if mapping.is_empty() {
            return Err(ConfigError::Empty);
        }

        let entries = mapping
            .into_iter()
            .filter_map(|(key, value)| match key {
                YamlValue::String(name) => Some((name, value)),
                _ => None,
            })
            .collect();

        Ok(Self { entries })
    }

    /// Top-level keys as declared
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Raw sub-configuration for a scan type
    pub fn section(&self, scan_type: ScanType) -> Option<&YamlValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == scan_type.as_str())
            .map(|(_, value)| value)
    }

    /// A scan type is enabled iff at least one tool under its grouping is enabled
    pub fn is_enabled(&self, scan_type: ScanType) -> bool {
        let Some(tools) = self
            .section(scan_type)
            .and_then(|section| section.get(scan_type.tool_grouping().key()))
            .and_then(YamlValue::as_mapping)
        else {
            return false;
        };

        tools
            .values()
            .any(|entry| entry.get(ENABLED_KEY).and_then(YamlValue::as_bool) == Some(true))
    }

    /// Recognized, enabled scan types in declaration order
    pub fn detect_enabled(&self) -> Vec<ScanType> {
        self.keys()
            .filter_map(|key| ScanType::from_str(key).ok())
            .filter(|scan_type| self.is_enabled(*scan_type))
            .collect()
    }

    /// Resolve the enabled tools of one scan type
    ///
    /// Disabled tools are dropped here so they never reach a handler.
    pub fn resolve_tools(&self, scan_type: ScanType) -> Result<ToolSet, ConfigError> {
        let grouping = scan_type.tool_grouping();
        let tools = self.tool_mapping(scan_type, grouping)?;

        let mut resolved = ToolSet::new();
        for (name, entry) in tools {
            let name = match name {
                YamlValue::String(name) => name.clone(),
                other => {
                    return Err(ConfigError::InvalidToolGrouping {
                        scan_type,
                        grouping: grouping.key(),
                        reason: format!("tool names must be strings, got {}", yaml_kind(other)),
                    })
                }
            };

            let tool = resolve_tool(scan_type, &name, entry)?;
            if tool.enabled {
                resolved.insert(name, tool);
            }
        }

        Ok(resolved)
    }

    fn tool_mapping(
        &self,
        scan_type: ScanType,
        grouping: ToolGrouping,
    ) -> Result<&Mapping, ConfigError> {
        let section = self
            .section(scan_type)
            .ok_or_else(|| ConfigError::InvalidToolGrouping {
                scan_type,
                grouping: grouping.key(),
                reason: "scan type is not configured".to_string(),
            })?;

        match section.get(grouping.key()) {
            Some(YamlValue::Mapping(tools)) => Ok(tools),
            Some(other) => Err(ConfigError::InvalidToolGrouping {
                scan_type,
                grouping: grouping.key(),
                reason: format!("expected a mapping of tools, got {}", yaml_kind(other)),
            }),
            None => Err(ConfigError::InvalidToolGrouping {
                scan_type,
                grouping: grouping.key(),
                reason: "section is missing".to_string(),
            }),
        }
    }
}

fn resolve_tool(scan_type: ScanType, name: &str, entry: &YamlValue) -> Result<ToolConfig, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidToolConfig {
        scan_type,
        tool: name.to_string(),
        reason,
    };

    let YamlValue::Mapping(fields) = entry else {
        return Err(invalid(format!("expected a mapping, got {}", yaml_kind(entry))));
    };

    let mut enabled = false;
    let mut params = serde_json::Map::new();

    for (key, value) in fields {
        let YamlValue::String(key) = key else {
            return Err(invalid(format!(
                "parameter names must be strings, got {}",
                yaml_kind(key)
            )));
        };

        if key == ENABLED_KEY {
            enabled = value
                .as_bool()
                .ok_or_else(|| invalid(format!("'enabled' must be a boolean, got {}", yaml_kind(value))))?;
            continue;
        }

        let json = serde_json::to_value(value)
            .map_err(|e| invalid(format!("parameter '{key}' is not representable: {e}")))?;
        params.insert(key.clone(), json);
    }

    Ok(ToolConfig { enabled, params })
}

fn yaml_kind(value: &YamlValue) -> &'static str {
    match value {
        YamlValue::Null => "null",
        YamlValue::Bool(_) => "boolean",
        YamlValue::Number(_) => "number",
        YamlValue::String(_) => "string",
        YamlValue::Sequence(_) => "sequence",
        YamlValue::Mapping(_) => "mapping",
        YamlValue::Tagged(_) => "tagged value",
    }
}
