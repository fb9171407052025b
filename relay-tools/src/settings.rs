use crate::error::{Result, ToolError};
use serde::Deserialize;

/// Per-tool settings, parsed from the policy record's free-form JSON at the
/// configuration boundary. Tools without settings parse only the empty
/// object; unknown fields are rejected everywhere.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolSettings {
    Search(SearchSettings),
    Filesystem(FilesystemSettings),
    CloudBrowser(CloudBrowserSettings),
    AdapterCall(AdapterCallSettings),
    None,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SearchSettings {
    #[serde(default)]
    pub api_key: Option<String>,
}

impl SearchSettings {
    /// Settings value first, then the conventional environment fallbacks.
    pub fn effective_api_key(&self) -> Option<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
            return Some(key.clone());
        }
        for var in ["TAVILY_API_KEY", "SEARCH_API_KEY"] {
            if let Ok(value) = std::env::var(var) {
                if !value.trim().is_empty() {
                    return Some(value);
                }
            }
        }
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct FilesystemSettings {
    #[serde(default)]
    pub root: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CloudBrowserSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct AdapterCallSettings {
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ToolSettings {
    /// Parse and validate the settings blob for a tool id. Fails on unknown
    /// fields and on settings supplied for a tool that takes none.
    pub fn parse(tool_id: &str, settings: &serde_json::Value) -> Result<Self> {
        let parse_err = |e: serde_json::Error| {
            ToolError::InvalidArguments(format!("invalid settings for tool '{tool_id}': {e}"))
        };
        match tool_id {
            "search" => Ok(Self::Search(
                serde_json::from_value(settings.clone()).map_err(parse_err)?,
            )),
            "filesystem" => Ok(Self::Filesystem(
                serde_json::from_value(settings.clone()).map_err(parse_err)?,
            )),
            "cloud_browser_task" => Ok(Self::CloudBrowser(
                serde_json::from_value(settings.clone()).map_err(parse_err)?,
            )),
            "adapter_call" => Ok(Self::AdapterCall(
                serde_json::from_value(settings.clone()).map_err(parse_err)?,
            )),
            _ => {
                if settings.as_object().is_some_and(|o| !o.is_empty()) {
                    return Err(ToolError::InvalidArguments(format!(
                        "tool '{tool_id}' does not take settings"
                    )));
                }
                Ok(Self::None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_settings_parse_api_key() {
        let parsed =
            ToolSettings::parse("search", &serde_json::json!({ "apiKey": "tvly-123" })).unwrap();
        assert_eq!(
            parsed,
            ToolSettings::Search(SearchSettings {
                api_key: Some("tvly-123".to_string())
            })
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err =
            ToolSettings::parse("search", &serde_json::json!({ "apikey": "oops" })).unwrap_err();
        assert!(err.to_string().contains("invalid settings"));
    }

    #[test]
    fn settings_for_a_settingless_tool_are_rejected() {
        let err = ToolSettings::parse("analysis", &serde_json::json!({ "x": 1 })).unwrap_err();
        assert!(err.to_string().contains("does not take settings"));
    }

    #[test]
    fn empty_object_is_fine_for_any_tool() {
        assert_eq!(
            ToolSettings::parse("analysis", &serde_json::json!({})).unwrap(),
            ToolSettings::None
        );
    }
}
