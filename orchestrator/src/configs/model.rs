use std::collections::{HashMap, HashSet};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActFnConfig {
    Identity,
    Rectlin,
    /// `shortcut` lets the engine fold the logistic derivative into a binary cross entropy.
    Logistic { shortcut: bool },
    Softmax,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InitConfig {
    Constant { value: f32 },
    Uniform { low: f32, high: f32 },
    Gaussian { loc: f32, scale: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayerConfig {
    FullyConnected {
        name: String,
        nout: usize,
        init: InitConfig,
        act_fn: ActFnConfig,
    },
    BranchPoint {
        name: String,
    },
}

impl LayerConfig {
    pub fn dense(name: impl Into<String>, nout: usize, init: InitConfig, act_fn: ActFnConfig) -> Self {
        Self::FullyConnected {
            name: name.into(),
            nout,
            init,
            act_fn,
        }
    }

    pub fn branch(name: impl Into<String>) -> Self {
        Self::BranchPoint { name: name.into() }
    }
}

/// An ordered run of layers from the input, or from a branch point, to a terminal output.
#[derive(Debug, Clone, PartialEq)]
pub struct PathConfig {
    layers: Vec<LayerConfig>,
}

impl PathConfig {
    pub fn new(layers: Vec<LayerConfig>) -> Self {
        Self { layers }
    }

    pub fn layers(&self) -> &[LayerConfig] {
        &self.layers
    }

    /// The branch point this path starts from, if any.
    pub fn root(&self) -> Option<&str> {
        match self.layers.first()? {
            LayerConfig::BranchPoint { name } => Some(name),
            LayerConfig::FullyConnected { .. } => None,
        }
    }

    /// The output width of the path's last layer.
    pub fn terminal_width(&self) -> Option<usize> {
        match self.layers.last()? {
            LayerConfig::FullyConnected { nout, .. } => Some(*nout),
            LayerConfig::BranchPoint { .. } => None,
        }
    }
}

/// Where a branch point is declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchPointId {
    pub path: usize,
    pub position: usize,
}

/// A set of paths sharing branch points by name.
///
/// The first path is the main one. Every other path starts with a reference
/// to a branch point declared by an earlier path, so the paths form a fan out
/// graph rooted at the main path.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchTree {
    paths: Vec<PathConfig>,
    branch_points: HashMap<String, BranchPointId>,
}

impl BranchTree {
    /// Validates `paths` and indexes their branch point declarations.
    ///
    /// # Errors
    /// Returns a `ConfigError` if a path is malformed, a name is reused or a
    /// subordinate path references a branch point not declared by an earlier path.
    pub fn new(paths: Vec<PathConfig>) -> Result<Self, ConfigError> {
        if paths.is_empty() {
            return Err(ConfigError::EmptyTree);
        }

        let branch_points = Self::collect_declarations(&paths)?;
        Self::resolve_references(&paths, &branch_points)?;

        Ok(Self {
            paths,
            branch_points,
        })
    }

    pub fn paths(&self) -> &[PathConfig] {
        &self.paths
    }

    pub fn branch_point(&self, name: &str) -> Option<BranchPointId> {
        self.branch_points.get(name).copied()
    }

    fn collect_declarations(
        paths: &[PathConfig],
    ) -> Result<HashMap<String, BranchPointId>, ConfigError> {
        let mut declared = HashMap::new();
        let mut layer_names = HashSet::new();

        for (i, path) in paths.iter().enumerate() {
            for (position, layer) in path.layers().iter().enumerate() {
                match layer {
                    LayerConfig::BranchPoint { name } if position == 0 => {
                        if i == 0 {
                            return Err(ConfigError::MainPathStartsAtBranch { name: name.clone() });
                        }
                    }
                    LayerConfig::BranchPoint { name } => {
                        let id = BranchPointId { path: i, position };
                        if declared.insert(name.clone(), id).is_some() {
                            return Err(ConfigError::DuplicateBranchPoint { name: name.clone() });
                        }
                    }
                    LayerConfig::FullyConnected { name, nout, .. } => {
                        if *nout == 0 {
                            return Err(ConfigError::ZeroWidthLayer { name: name.clone() });
                        }
                        if !layer_names.insert(name.as_str()) {
                            return Err(ConfigError::DuplicateLayerName { name: name.clone() });
                        }
                    }
                }
            }

            if path.terminal_width().is_none() {
                return Err(ConfigError::MissingTerminal { path: i });
            }
        }

        Ok(declared)
    }

    fn resolve_references(
        paths: &[PathConfig],
        declared: &HashMap<String, BranchPointId>,
    ) -> Result<(), ConfigError> {
        for (i, path) in paths.iter().enumerate().skip(1) {
            let root = path.root().ok_or(ConfigError::MissingRoot { path: i })?;

            match declared.get(root) {
                Some(id) if id.path < i => {}
                _ => {
                    return Err(ConfigError::UndeclaredBranchPoint {
                        path: i,
                        name: root.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}
