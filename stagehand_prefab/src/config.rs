use std::path::PathBuf;

use derivative::Derivative;
use serde::{Deserialize, Serialize};

/// Prefab settings of the editor, usually loaded from `prefab.ron` with
/// [`Config::load`](stagehand_config::Config::load).
#[derive(Clone, Debug, PartialEq, Derivative, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(default)]
pub struct PrefabConfig {
    /// Whether new instances push their edits into the template right away.
    #[derivative(Default(value = "true"))]
    pub auto_update_instances: bool,
    /// Grid the pivot of a prefab created from a selection snaps to. `0.0` disables snapping.
    #[derivative(Default(value = "0.0"))]
    pub snap_grid: f32,
    /// Display name of an instance whose template is missing and which had no name.
    #[derivative(Default(value = "String::from(\"Unknown Prefab\")"))]
    pub unknown_template_name: String,
    /// Directory template files are loaded from and saved to. `None` keeps the library in memory.
    pub template_dir: Option<PathBuf>,
}

impl PrefabConfig {
    /// Rounds each coordinate to the snap grid.
    pub fn snap(&self, value: f32) -> f32 {
        if self.snap_grid > 0.0 {
            (value / self.snap_grid).round() * self.snap_grid
        } else {
            value
        }
    }
}
