//! # Workload container
//!
//! File and process-supervisor access to the container running the UDR binary

use crate::error::{OperatorError, Result};
use crate::plan::{Layer, LayerStack, Plan, ServiceSpec, Startup};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

/// Operations the operator performs against its workload container
pub trait Workload {
    fn name(&self) -> &str;

    /// Whether the container's supervisor answers
    fn can_connect(&self) -> bool;

    fn exists(&self, path: &str) -> Result<bool>;

    fn push(&mut self, path: &str, content: &str) -> Result<()>;

    fn pull(&self, path: &str) -> Result<Option<String>>;

    fn add_layer(&mut self, label: &str, layer: &Layer, combine: bool) -> Result<()>;

    fn plan(&self) -> Result<Plan>;

    /// Bring running services in line with the plan
    fn replan(&mut self) -> Result<()>;
}

/// Services the supervisor currently runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RunningServices {
    pub services: BTreeMap<String, ServiceSpec>,
    #[serde(default)]
    pub restarts: u64,
}

impl RunningServices {
    /// Start or restart enabled services whose definition changed, stop the rest.
    /// Returns the names of services that were (re)started.
    pub fn replan(&mut self, plan: &Plan) -> Vec<String> {
        let mut started = Vec::new();

        self.services.retain(|name, _| {
            plan.services
                .get(name)
                .map(|s| s.startup == Startup::Enabled)
                .unwrap_or(false)
        });

        for (name, spec) in &plan.services {
            if spec.startup != Startup::Enabled {
                continue;
            }
            if self.services.get(name) != Some(spec) {
                self.services.insert(name.clone(), spec.clone());
                self.restarts += 1;
                started.push(name.clone());
            }
        }

        started
    }
}

/// Workload kept entirely in memory
#[derive(Debug, Clone)]
pub struct InMemoryWorkload {
    name: String,
    reachable: bool,
    files: BTreeMap<String, String>,
    layers: LayerStack,
    running: RunningServices,
    pushes: usize,
    replans: usize,
}

impl InMemoryWorkload {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            reachable: false,
            files: BTreeMap::new(),
            layers: LayerStack::default(),
            running: RunningServices::default(),
            pushes: 0,
            replans: 0,
        }
    }

    pub fn set_can_connect(&mut self, reachable: bool) {
        self.reachable = reachable;
    }

    /// Remove a file as if deleted from outside the operator
    pub fn remove_file(&mut self, path: &str) -> Option<String> {
        self.files.remove(path)
    }

    pub fn push_count(&self) -> usize {
        self.pushes
    }

    pub fn replan_count(&self) -> usize {
        self.replans
    }

    pub fn running(&self) -> &RunningServices {
        &self.running
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(OperatorError::ContainerUnreachable(self.name.clone()))
        }
    }
}

impl Workload for InMemoryWorkload {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_connect(&self) -> bool {
        self.reachable
    }

    fn exists(&self, path: &str) -> Result<bool> {
        self.ensure_connected()?;
        Ok(self.files.contains_key(path))
    }

    fn push(&mut self, path: &str, content: &str) -> Result<()> {
        self.ensure_connected()?;
        self.files.insert(path.to_string(), content.to_string());
        self.pushes += 1;
        Ok(())
    }

    fn pull(&self, path: &str) -> Result<Option<String>> {
        self.ensure_connected()?;
        Ok(self.files.get(path).cloned())
    }

    fn add_layer(&mut self, label: &str, layer: &Layer, combine: bool) -> Result<()> {
        self.ensure_connected()?;
        self.layers.add(label, layer, combine);
        Ok(())
    }

    fn plan(&self) -> Result<Plan> {
        Ok(self.layers.plan())
    }

    fn replan(&mut self) -> Result<()> {
        self.ensure_connected()?;
        let plan = self.layers.plan();
        let started = self.running.replan(&plan);
        self.replans += 1;
        debug!("Replanned {}: started {:?}", self.name, started);
        Ok(())
    }
}

const STATE_DIR: &str = ".supervisor";
const LAYERS_FILE: &str = "layers.yaml";
const RUNNING_FILE: &str = "running.yaml";

/// Workload backed by a directory on the local filesystem.
///
/// Container paths are resolved below `root`; supervisor state is persisted
/// as YAML under `root/.supervisor`.
#[derive(Debug, Clone)]
pub struct LocalWorkload {
    name: String,
    root: PathBuf,
}

impl LocalWorkload {
    pub fn new(name: &str, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            root: root.into(),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    fn state_path(&self, file: &str) -> PathBuf {
        self.root.join(STATE_DIR).join(file)
    }

    fn load<T>(&self, file: &str) -> Result<T>
    where
        T: Default + for<'de> Deserialize<'de>,
    {
        let path = self.state_path(file);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(serde_yaml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            Err(e) => Err(OperatorError::io(path, e)),
        }
    }

    fn store<T: Serialize>(&self, file: &str, value: &T) -> Result<()> {
        let path = self.state_path(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| OperatorError::io(parent, e))?;
        }
        fs::write(&path, serde_yaml::to_string(value)?).map_err(|e| OperatorError::io(path, e))
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.can_connect() {
            Ok(())
        } else {
            Err(OperatorError::ContainerUnreachable(self.name.clone()))
        }
    }

    pub fn running(&self) -> Result<RunningServices> {
        self.load(RUNNING_FILE)
    }
}

impl Workload for LocalWorkload {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_connect(&self) -> bool {
        self.root.is_dir()
    }

    fn exists(&self, path: &str) -> Result<bool> {
        self.ensure_connected()?;
        Ok(self.resolve(path).is_file())
    }

    fn push(&mut self, path: &str, content: &str) -> Result<()> {
        self.ensure_connected()?;
        let target = self.resolve(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| OperatorError::io(parent, e))?;
        }
        fs::write(&target, content).map_err(|e| OperatorError::io(&target, e))?;
        info!("Wrote {} into {}", path, self.root.display());
        Ok(())
    }

    fn pull(&self, path: &str) -> Result<Option<String>> {
        self.ensure_connected()?;
        let target = self.resolve(path);
        match fs::read_to_string(&target) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(OperatorError::io(target, e)),
        }
    }

    fn add_layer(&mut self, label: &str, layer: &Layer, combine: bool) -> Result<()> {
        self.ensure_connected()?;
        let mut stack: LayerStack = self.load(LAYERS_FILE)?;
        stack.add(label, layer, combine);
        self.store(LAYERS_FILE, &stack)
    }

    fn plan(&self) -> Result<Plan> {
        let stack: LayerStack = self.load(LAYERS_FILE)?;
        Ok(stack.plan())
    }

    fn replan(&mut self) -> Result<()> {
        self.ensure_connected()?;
        let plan = self.plan()?;
        let mut running: RunningServices = self.load(RUNNING_FILE)?;
        let started = running.replan(&plan);
        self.store(RUNNING_FILE, &running)?;
        debug!("Replanned {}: started {:?}", self.name, started);
        Ok(())
    }
}
