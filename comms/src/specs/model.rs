use serde::{Deserialize, Serialize};

/// The specification for an activation function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFnSpec {
    Identity,
    Rectlin,
    Logistic { shortcut: bool },
    Softmax,
}

/// The specification for a weight initializer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitSpec {
    Constant { value: f32 },
    Uniform { low: f32, high: f32 },
    Gaussian { loc: f32, scale: f32 },
}

/// The specification for a single element of a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSpec {
    Dense {
        name: String,
        dim: (usize, usize),
        init: InitSpec,
        act_fn: ActFnSpec,
    },
    Branch {
        name: String,
    },
}

/// A path of layers, `root` names the branch point it starts from.
///
/// The main path has no root and is fed by the dataset input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSpec {
    pub root: Option<String>,
    pub layers: Vec<LayerSpec>,
}

/// The specification for a branching model, paths in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeSpec {
    pub paths: Vec<PathSpec>,
}
