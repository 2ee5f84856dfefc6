use serde::{Deserialize, Serialize};

/// Index of a layer in its scene.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(pub usize);

/// A named layer. Levels are saved per layer, so a layer remembers whether it changed.
#[derive(Clone, Debug, PartialEq, Eq, derive_new::new)]
pub struct Layer {
    name: String,
    #[new(default)]
    modified: bool,
}

impl Layer {
    /// Layer name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` if an object on this layer changed since the flag was last cleared.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub(crate) fn set_modified(&mut self, modified: bool) {
        self.modified = modified;
    }
}
