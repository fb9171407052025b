use crate::adapter::AdapterCallTool;
use crate::analysis::AnalysisTool;
use crate::browser::{BrowserActionTool, CloudBrowserTool};
use crate::code_execution::CodeExecutionTool;
use crate::credentials::CredentialResolver;
use crate::diagnostics::DiagnosticsTool;
use crate::filesystem::FilesystemTool;
use crate::search::SearchTool;
use crate::settings::ToolSettings;
use crate::shell_task::ShellTaskTool;
use crate::stubs::{PlaceholderTool, STUB_CAPABILITIES, StubCapability};
use crate::traits::{Tool, to_llm_tool_def};
use relay_llm::{ExecutionMode, ToolDefinition};
use relay_store::{ConfigStore, ToolPolicy};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

/// Everything the catalog needs to construct concrete tools.
#[derive(Clone)]
pub struct CatalogContext {
    pub workspace_root: PathBuf,
    pub store: Arc<dyn ConfigStore>,
}

pub struct RegisteredTool {
    pub tool: Arc<dyn Tool>,
    /// Effective flag for this run: explicit policy override, else the
    /// tool's catalog default.
    pub needs_approval: bool,
}

/// The concrete tool set for one run. Ids are unique; iteration order is
/// stable so prompts are deterministic.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn get(&self, tool_id: &str) -> Option<&RegisteredTool> {
        self.tools.get(tool_id)
    }

    pub fn contains(&self, tool_id: &str) -> bool {
        self.tools.contains_key(tool_id)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|r| to_llm_tool_def(r.tool.as_ref()))
            .collect()
    }

    fn insert(&mut self, tool: Arc<dyn Tool>, needs_approval: bool) {
        let name = tool.spec().name;
        // First registration wins; later defaults never overwrite a mapped tool.
        self.tools
            .entry(name)
            .or_insert(RegisteredTool {
                tool,
                needs_approval,
            });
    }
}

/// Assemble the tool set for a run: the mode's base entries filtered and
/// flagged by policy, the always-available diagnostics tool, then the stub
/// capabilities. Pure function of its inputs plus the static catalog; the
/// caller is responsible for snapshotting policies (a store failure upstream
/// degrades to an empty map, never a failed build).
pub fn build(
    mode: ExecutionMode,
    policies: &HashMap<String, ToolPolicy>,
    ctx: &CatalogContext,
) -> ToolRegistry {
    let mut registry = ToolRegistry::default();

    for tool_id in base_tool_ids(mode) {
        let policy = policies.get(*tool_id);
        if policy.is_some_and(|p| !p.enabled) {
            tracing::debug!(%tool_id, "tool disabled by policy");
            continue;
        }
        let settings = tool_settings(tool_id, policy);
        let tool = instantiate(tool_id, &settings, ctx);
        let needs_approval = policy
            .and_then(|p| p.needs_approval)
            .unwrap_or(tool.spec().default_needs_approval);
        registry.insert(tool, needs_approval);
    }

    let stub_entries: Vec<(&StubCapability, bool)> = STUB_CAPABILITIES
        .iter()
        .filter(|c| !registry.contains(c.name) && c.name != "diagnostics")
        .filter(|c| !policies.get(c.name).is_some_and(|p| !p.enabled))
        .map(|c| {
            let needs_approval = policies
                .get(c.name)
                .and_then(|p| p.needs_approval)
                .unwrap_or(c.needs_approval);
            (c, needs_approval)
        })
        .collect();

    // Diagnostics is not subject to mode filtering or policy, and it
    // advertises the full final tool list.
    let mut advertised = registry.ids();
    advertised.push("diagnostics".to_string());
    advertised.extend(stub_entries.iter().map(|(c, _)| c.name.to_string()));
    registry.insert(
        Arc::new(DiagnosticsTool::new(mode.as_str(), advertised)),
        false,
    );

    for (capability, needs_approval) in stub_entries {
        registry.insert(
            Arc::new(PlaceholderTool::from_capability(capability)),
            needs_approval,
        );
    }

    tracing::debug!(
        mode = mode.as_str(),
        tools = registry.len(),
        "tool registry assembled"
    );
    registry
}

fn base_tool_ids(mode: ExecutionMode) -> &'static [&'static str] {
    match mode {
        ExecutionMode::Browser => &[
            "search",
            "browser_action",
            "cloud_browser_task",
            "adapter_call",
        ],
        ExecutionMode::Cli => &["search", "shell_task", "filesystem", "adapter_call"],
        // Auto resolves to a forced sub-mode upstream; at build time it
        // carries the coding set.
        ExecutionMode::Coding | ExecutionMode::Auto => &[
            "search",
            "filesystem",
            "code_execution",
            "analysis",
            "adapter_call",
        ],
    }
}

fn tool_settings(tool_id: &str, policy: Option<&ToolPolicy>) -> ToolSettings {
    let Some(policy) = policy else {
        return default_settings(tool_id);
    };
    // Settings are validated at the admin boundary; a record that fails to
    // parse here (written by an older build, say) falls back to defaults.
    ToolSettings::parse(tool_id, &policy.settings).unwrap_or_else(|e| {
        tracing::warn!(tool_id, error = %e, "stored tool settings invalid; using defaults");
        default_settings(tool_id)
    })
}

fn default_settings(tool_id: &str) -> ToolSettings {
    ToolSettings::parse(tool_id, &serde_json::Value::Object(serde_json::Map::new()))
        .unwrap_or(ToolSettings::None)
}

fn instantiate(tool_id: &str, settings: &ToolSettings, ctx: &CatalogContext) -> Arc<dyn Tool> {
    match (tool_id, settings) {
        ("search", ToolSettings::Search(s)) => Arc::new(SearchTool::new(s.effective_api_key())),
        ("filesystem", ToolSettings::Filesystem(s)) => {
            let root = s
                .root
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or_else(|| ctx.workspace_root.clone());
            match FilesystemTool::new(&root) {
                Ok(tool) => Arc::new(tool),
                Err(e) => {
                    tracing::warn!(error = %e, "filesystem root invalid; using workspace root");
                    Arc::new(
                        FilesystemTool::new(&ctx.workspace_root)
                            .expect("workspace root is validated at startup"),
                    )
                }
            }
        }
        ("code_execution", _) => Arc::new(CodeExecutionTool),
        ("analysis", _) => Arc::new(AnalysisTool),
        ("browser_action", _) => Arc::new(BrowserActionTool),
        ("cloud_browser_task", ToolSettings::CloudBrowser(s)) => Arc::new(CloudBrowserTool::new(
            s.api_key.clone().or_else(|| non_empty_env("CLOUD_BROWSER_API_KEY")),
            s.base_url.clone(),
        )),
        ("shell_task", _) => Arc::new(ShellTaskTool::new(&ctx.workspace_root)),
        ("adapter_call", ToolSettings::AdapterCall(s)) => Arc::new(AdapterCallTool::new(
            CredentialResolver::new(ctx.store.clone()),
            s.base_url.clone(),
        )),
        // Settings enum mismatches cannot happen for catalog ids; fall back
        // to a defaulted instance rather than panic.
        ("search", _) => Arc::new(SearchTool::new(None)),
        ("cloud_browser_task", _) => Arc::new(CloudBrowserTool::new(
            non_empty_env("CLOUD_BROWSER_API_KEY"),
            None,
        )),
        ("adapter_call", _) => Arc::new(AdapterCallTool::new(
            CredentialResolver::new(ctx.store.clone()),
            None,
        )),
        ("filesystem", _) => Arc::new(
            FilesystemTool::new(&ctx.workspace_root)
                .expect("workspace root is validated at startup"),
        ),
        (other, _) => unreachable!("unknown catalog tool id: {other}"),
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
