//! Saving and loading a level as RON.
//!
//! Prefab members are never written: an instance stores only its template id and the last
//! known template name, and its members come back by expansion when the level is loaded.

use std::{fs, path::Path};

use log::info;
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};
use stagehand_core::{ObjectId, ObjectKind, Transform, DEFAULT_LAYER};
use stagehand_error::{format_err, Error, ResultExt};

use super::Level;
use crate::{error::PrefabError, template::TemplateId};

/// A saved level.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelDocument {
    /// Layer names, in creation order.
    #[serde(default)]
    pub layers: Vec<String>,
    /// Every object that is not a prefab member, in scene order.
    pub objects: Vec<ObjectRecord>,
}

/// One saved object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Object id.
    pub id: ObjectId,
    /// Display name.
    pub name: String,
    /// Object kind.
    pub kind: ObjectKind,
    /// Hierarchical parent.
    #[serde(default)]
    pub parent: Option<ObjectId>,
    /// Link target.
    #[serde(default)]
    pub linked_to: Option<ObjectId>,
    /// Transform relative to the link target or the parent.
    #[serde(default)]
    pub transform: Transform,
    /// Layer name. Empty means the default layer.
    #[serde(default)]
    pub layer: String,
    /// Template of a prefab instance.
    #[serde(rename = "PrefabTemplateId", default, skip_serializing_if = "Option::is_none")]
    pub prefab_template_id: Option<TemplateId>,
    /// Template name of a prefab instance, shown while the template cannot be resolved.
    #[serde(rename = "PrefabName", default, skip_serializing_if = "Option::is_none")]
    pub prefab_name: Option<String>,
}

impl Level {
    /// Snapshot of everything that is saved.
    pub fn to_document(&self) -> LevelDocument {
        let layers = self.scene.layers().iter().map(|l| l.name().to_owned()).collect();
        let objects = self
            .scene
            .objects()
            .filter(|o| !o.is_prefab_member())
            .map(|o| {
                let instance = self.instances.get(&o.id());
                ObjectRecord {
                    id: o.id(),
                    name: o.name().to_owned(),
                    kind: o.kind().clone(),
                    parent: o.parent(),
                    linked_to: o.linked_to(),
                    transform: o.local_transform().clone(),
                    layer: self
                        .scene
                        .layer(o.layer())
                        .map(|l| l.name().to_owned())
                        .unwrap_or_default(),
                    prefab_template_id: instance.and_then(|i| i.template),
                    prefab_name: instance.map(|i| i.template_name.clone()),
                }
            })
            .collect();
        LevelDocument { layers, objects }
    }

    /// Writes the level to `path`.
    pub fn save_document<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        let text = ron::ser::to_string_pretty(&self.to_document(), PrettyConfig::default())?;
        fs::write(path, text).with_context(|_| format_err!("cannot write level {}", path.display()))?;
        info!("Saved level to {}", path.display());
        Ok(())
    }

    /// Reads a level from `path` into this one. Returns how many objects were created.
    pub fn load_document<P: AsRef<Path>>(&mut self, path: P) -> Result<usize, Error> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|_| format_err!("cannot read level {}", path.display()))?;
        let document: LevelDocument = ron::de::from_str(&text)
            .with_context(|_| format_err!("cannot parse level {}", path.display()))?;
        let created = self.apply_document(document);
        info!("Loaded {} object(s) from {}", created, path.display());
        Ok(created)
    }

    /// Recreates the objects of `document`, expands its instances and then restores parents
    /// and links. References that cannot be resolved are dropped with a warning.
    pub fn apply_document(&mut self, document: LevelDocument) -> usize {
        for layer in &document.layers {
            self.scene.add_layer(layer.as_str());
        }

        let mut created = Vec::with_capacity(document.objects.len());
        for record in &document.objects {
            let layer = if record.layer.is_empty() {
                self.scene.add_layer(DEFAULT_LAYER)
            } else {
                self.scene.add_layer(record.layer.as_str())
            };
            let result = self
                .scene
                .create(record.id, record.name.clone(), record.kind.clone())
                .and_then(|_| self.scene.set_local_transform(record.id, record.transform.clone()))
                .and_then(|_| self.scene.set_layer(record.id, layer));
            if let Err(e) = result {
                self.warn(e.into());
                continue;
            }
            if record.kind.is_prefab() || record.prefab_template_id.is_some() {
                self.register_instance(record.id);
                if let Some(inst) = self.instances.get_mut(&record.id) {
                    inst.template_name = record.prefab_name.clone().unwrap_or_default();
                }
            }
            created.push(record);
        }

        for record in &created {
            if self.is_instance(record.id) {
                let template = record.prefab_template_id;
                self.without_undo(|level| level.bind_template(record.id, template));
            }
        }

        for record in &created {
            if let Some(parent) = record.parent {
                self.restore_reference(record.id, parent, false);
            }
            if let Some(target) = record.linked_to {
                self.restore_reference(record.id, target, true);
            }
        }
        created.len()
    }

    fn restore_reference(&mut self, object: ObjectId, reference: ObjectId, link: bool) {
        if !self.scene.contains(reference) {
            self.warn(PrefabError::UnresolvedReference {
                node: object,
                reference,
            });
            return;
        }
        let result = if link {
            self.scene.link(object, reference, false)
        } else {
            self.scene.attach(object, reference, false)
        };
        if let Err(e) = result {
            self.warn(e.into());
        }
    }
}
