//! Three independent tool tables behind one lookup.
//!
//! Tables are read concurrently during dispatch and written rarely. Every
//! mutation validates and applies its change under a single write guard, so
//! readers never see a half-updated table; multi-step async mutations are
//! additionally serialized by `mutation`.

use crate::dynamic::{validate_category, validate_tool_name, DynamicTool, SCRIPT_EXTENSION};
use crate::error::ToolError;
use crate::sandbox::{write_bytes_atomic, DEFAULT_MAX_BYTES};
use crate::tools::base::{describe, Tool};
use crate::traits::{ToolDescriptor, ToolProvider, ToolSource};
use crate::workspace::Workspace;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Owner of a resolved name, invoked by the dispatcher through one signature.
#[derive(Clone)]
pub enum ToolHandle {
    System(Arc<dyn Tool>),
    Dynamic(Arc<DynamicTool>),
    Integration(Arc<dyn ToolProvider>),
}

/// Name-keyed table that remembers insertion order.
struct SourceTable<T> {
    entries: HashMap<String, T>,
    order: Vec<String>,
}

impl<T> SourceTable<T> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    fn get(&self, name: &str) -> Option<&T> {
        self.entries.get(name)
    }

    /// Replacing an existing entry keeps its original position.
    fn insert(&mut self, name: String, value: T) {
        if self.entries.insert(name.clone(), value).is_none() {
            self.order.push(name);
        }
    }

    fn remove(&mut self, name: &str) -> Option<T> {
        let removed = self.entries.remove(name)?;
        self.order.retain(|n| n != name);
        Some(removed)
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn values(&self) -> impl Iterator<Item = &T> {
        self.order.iter().filter_map(|name| self.entries.get(name))
    }
}

struct LoadedIntegration {
    provider: Arc<dyn ToolProvider>,
    tools: Vec<ToolDescriptor>,
}

struct Tables {
    system: SourceTable<Arc<dyn Tool>>,
    dynamic: SourceTable<Arc<DynamicTool>>,
    integrations: Vec<LoadedIntegration>,
    /// Tool name -> index into `integrations`.
    integration_index: HashMap<String, usize>,
}

impl Tables {
    fn new() -> Self {
        Self {
            system: SourceTable::new(),
            dynamic: SourceTable::new(),
            integrations: Vec::new(),
            integration_index: HashMap::new(),
        }
    }

    /// Owning source by precedence System > Integration > Dynamic.
    fn owner(&self, name: &str) -> Option<ToolSource> {
        if self.system.contains(name) {
            Some(ToolSource::System)
        } else if self.integration_index.contains_key(name) {
            Some(ToolSource::Integration)
        } else if self.dynamic.contains(name) {
            Some(ToolSource::Dynamic)
        } else {
            None
        }
    }

    fn resolve(&self, name: &str) -> Option<(ToolSource, ToolHandle)> {
        if let Some(tool) = self.system.get(name) {
            return Some((ToolSource::System, ToolHandle::System(tool.clone())));
        }
        if let Some(&idx) = self.integration_index.get(name) {
            let provider = self.integrations.get(idx)?.provider.clone();
            return Some((ToolSource::Integration, ToolHandle::Integration(provider)));
        }
        self.dynamic
            .get(name)
            .map(|tool| (ToolSource::Dynamic, ToolHandle::Dynamic(tool.clone())))
    }

    fn rebuild_integration_index(&mut self) {
        self.integration_index = self
            .integrations
            .iter()
            .enumerate()
            .flat_map(|(idx, loaded)| loaded.tools.iter().map(move |t| (t.name.clone(), idx)))
            .collect();
    }
}

pub struct ToolRegistry {
    workspace: Arc<Workspace>,
    tables: RwLock<Tables>,
    mutation: Mutex<()>,
}

impl ToolRegistry {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self {
            workspace,
            tables: RwLock::new(Tables::new()),
            mutation: Mutex::new(()),
        }
    }

    pub fn workspace(&self) -> &Arc<Workspace> {
        &self.workspace
    }

    /// Permanent for the life of the registry.
    pub fn register_system_tool(&self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        let mut tables = self.tables.write();

        if let Some(owner) = tables.owner(&name) {
            warn!(tool = %name, %owner, "Rejected system tool registration");
            return Err(ToolError::NameConflict(name));
        }

        tables.system.insert(name.clone(), tool);
        debug!(tool = %name, "Registered system tool");
        Ok(())
    }

    /// Create or replace a dynamic tool and persist its script.
    pub async fn create_dynamic_tool(
        &self,
        name: &str,
        code: &str,
        category: &str,
    ) -> Result<ToolDescriptor, ToolError> {
        validate_tool_name(name)?;
        validate_category(category)?;
        let _guard = self.mutation.lock().await;

        self.check_dynamic_name(name)?;

        let tool = DynamicTool::new(name, code, category);
        let script = self.workspace.tool_script_path(name)?;
        write_bytes_atomic(&script, tool.code.as_bytes(), DEFAULT_MAX_BYTES).await?;

        let descriptor = tool.descriptor();
        let inserted = {
            let mut tables = self.tables.write();
            let free = matches!(tables.owner(name), None | Some(ToolSource::Dynamic));
            if free {
                tables.dynamic.insert(name.to_string(), Arc::new(tool));
            }
            free
        };
        if !inserted {
            if let Err(e) = tokio::fs::remove_file(script.as_path()).await {
                warn!(tool = %name, error = %e, "Failed to remove conflicting tool script");
            }
            return Err(ToolError::NameConflict(name.to_string()));
        }

        info!(tool = %name, category = %category, "Created dynamic tool");
        Ok(descriptor)
    }

    pub async fn delete_dynamic_tool(&self, name: &str) -> Result<(), ToolError> {
        let _guard = self.mutation.lock().await;

        {
            let tables = self.tables.read();
            if tables.system.contains(name) {
                return Err(ToolError::PermissionDenied(format!(
                    "Cannot delete system tool '{}'",
                    name
                )));
            }
            if !tables.dynamic.contains(name) {
                return Err(ToolError::ToolNotFound(name.to_string()));
            }
        }

        let script = self.workspace.tool_script_path(name)?;
        match tokio::fs::remove_file(script.as_path()).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        self.tables.write().dynamic.remove(name);
        info!(tool = %name, "Deleted dynamic tool");
        Ok(())
    }

    /// Replace the Dynamic table with the scripts found on disk.
    ///
    /// Scripts that cannot be read or whose names collide with another
    /// source are skipped with a warning.
    pub async fn load_dynamic_tools(&self) -> Result<usize, ToolError> {
        let _guard = self.mutation.lock().await;

        let mut scripts = Vec::new();
        let mut dir = tokio::fs::read_dir(self.workspace.tools().path()).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SCRIPT_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            if validate_tool_name(&name).is_err() {
                warn!(file = %path.display(), "Skipping script with invalid tool name");
                continue;
            }
            // Resolve through the sandbox so planted symlinks are not followed out.
            let script = match self.workspace.tool_script_path(&name) {
                Ok(script) => script,
                Err(e) => {
                    warn!(tool = %name, error = %e, "Skipping unreadable tool script");
                    continue;
                }
            };
            if !script.is_file() {
                warn!(tool = %name, "Skipping tool script that is not a regular file");
                continue;
            }
            match tokio::fs::read_to_string(script.as_path()).await {
                Ok(contents) => scripts.push(DynamicTool::parse(&name, contents)),
                Err(e) => warn!(tool = %name, error = %e, "Skipping unreadable tool script"),
            }
        }
        scripts.sort_by(|a, b| a.name.cmp(&b.name));

        let mut tables = self.tables.write();
        tables.dynamic.clear();
        for tool in scripts {
            if let Some(owner) = tables.owner(&tool.name) {
                warn!(tool = %tool.name, %owner, "Skipping dynamic tool with conflicting name");
                continue;
            }
            tables.dynamic.insert(tool.name.clone(), Arc::new(tool));
        }

        let count = tables.dynamic.len();
        info!(count, "Loaded dynamic tools");
        Ok(count)
    }

    /// Initialize a provider and add its tools, all or nothing.
    ///
    /// A provider exposing any name already owned elsewhere is shut down
    /// and rejected with `NameConflict`.
    pub async fn load_integration(&self, provider: Arc<dyn ToolProvider>) -> Result<usize, ToolError> {
        let _guard = self.mutation.lock().await;
        let id = provider.id().to_string();

        if self.integration_ids().contains(&id) {
            return Err(ToolError::NameConflict(id));
        }

        if let Err(e) = provider.initialize().await {
            provider.shutdown().await;
            return Err(e);
        }

        let mut tools = match provider.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                provider.shutdown().await;
                return Err(e);
            }
        };
        for tool in &mut tools {
            tool.source = ToolSource::Integration;
            tool.provider = id.clone();
        }

        let conflict = {
            let mut tables = self.tables.write();
            let mut seen = HashSet::new();
            let conflict = tools
                .iter()
                .find(|t| tables.owner(&t.name).is_some() || !seen.insert(t.name.as_str()))
                .map(|t| t.name.clone());

            if conflict.is_none() {
                tables.integrations.push(LoadedIntegration {
                    provider: provider.clone(),
                    tools: tools.clone(),
                });
                tables.rebuild_integration_index();
            }
            conflict
        };

        if let Some(name) = conflict {
            warn!(integration = %id, tool = %name, "Integration exposes a conflicting tool name");
            provider.shutdown().await;
            return Err(ToolError::NameConflict(name));
        }

        info!(integration = %id, tools = tools.len(), "Loaded integration");
        Ok(tools.len())
    }

    pub async fn unload_integration(&self, id: &str) -> Result<(), ToolError> {
        let _guard = self.mutation.lock().await;

        let removed = {
            let mut tables = self.tables.write();
            let pos = tables
                .integrations
                .iter()
                .position(|loaded| loaded.provider.id() == id);
            let removed = pos.map(|pos| tables.integrations.remove(pos));
            tables.rebuild_integration_index();
            removed
        };

        let loaded = removed.ok_or_else(|| ToolError::ToolNotFound(id.to_string()))?;
        loaded.provider.shutdown().await;
        info!(integration = %id, "Unloaded integration");
        Ok(())
    }

    /// Shut down and drop every integration.
    pub async fn shutdown(&self) {
        let _guard = self.mutation.lock().await;

        let drained: Vec<LoadedIntegration> = {
            let mut tables = self.tables.write();
            tables.integration_index.clear();
            tables.integrations.drain(..).collect()
        };

        for loaded in drained {
            loaded.provider.shutdown().await;
        }
    }

    /// System, then Dynamic, then Integration tools in provider order.
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        let tables = self.tables.read();
        let mut tools = Vec::new();

        tools.extend(tables.system.values().map(|tool| describe(tool.as_ref())));
        tools.extend(tables.dynamic.values().map(|tool| tool.descriptor()));
        for loaded in &tables.integrations {
            tools.extend(loaded.tools.iter().cloned());
        }
        tools
    }

    pub fn resolve(&self, name: &str) -> Option<(ToolSource, ToolHandle)> {
        self.tables.read().resolve(name)
    }

    /// Script text of a dynamic tool, for callers that run scripts themselves.
    pub fn get_dynamic_source(&self, name: &str) -> Option<String> {
        self.tables.read().dynamic.get(name).map(|tool| tool.code.clone())
    }

    pub fn integration_ids(&self) -> Vec<String> {
        self.tables
            .read()
            .integrations
            .iter()
            .map(|loaded| loaded.provider.id().to_string())
            .collect()
    }

    pub fn count(&self) -> usize {
        let tables = self.tables.read();
        tables.system.len() + tables.dynamic.len() + tables.integration_index.len()
    }

    fn check_dynamic_name(&self, name: &str) -> Result<(), ToolError> {
        match self.tables.read().owner(name) {
            None | Some(ToolSource::Dynamic) => Ok(()),
            Some(owner) => {
                warn!(tool = %name, %owner, "Rejected dynamic tool creation");
                Err(ToolError::NameConflict(name.to_string()))
            }
        }
    }
}
