//! The template library.
//!
//! Templates live in memory once resolved. With a template directory configured they are
//! loaded lazily from `<dir>/<template id>.ron` the first time they are asked for, and written
//! back by [`PrefabLibrary::save_modified`].

use std::{fs, path::PathBuf};

use fnv::FnvHashMap;
use log::{debug, warn};
use ron::ser::PrettyConfig;
use stagehand_config::ron_path;
use stagehand_error::{format_err, Error, ResultExt};

use crate::{
    config::PrefabConfig,
    events::{Subscription, TemplateEvent, TemplateEvents},
    template::{Template, TemplateDocument, TemplateId},
};

/// Owns every known template and the bus their change events go through.
#[derive(Debug, Default)]
pub struct PrefabLibrary {
    templates: FnvHashMap<TemplateId, Template>,
    root: Option<PathBuf>,
    events: TemplateEvents,
}

impl PrefabLibrary {
    /// A library backed by `root`, or purely in memory.
    pub fn new(root: Option<PathBuf>) -> Self {
        PrefabLibrary {
            root,
            ..Default::default()
        }
    }

    /// A library backed by the configured template directory.
    pub fn from_config(config: &PrefabConfig) -> Self {
        PrefabLibrary::new(config.template_dir.clone())
    }

    /// Where template `id` is stored on disk.
    pub fn path_of(&self, id: TemplateId) -> Option<PathBuf> {
        self.root
            .as_ref()
            .map(|root| ron_path(root, &id.to_string()))
    }

    /// Resolves a template, reading it from the template directory if it is not loaded yet.
    ///
    /// Returns `None` if the template is unknown or its file cannot be read.
    pub fn load_template(&mut self, id: TemplateId) -> Option<&Template> {
        if !self.templates.contains_key(&id) {
            let template = self.read_template(id)?;
            self.templates.insert(id, template);
        }
        self.templates.get(&id)
    }

    fn read_template(&self, id: TemplateId) -> Option<Template> {
        let path = self.path_of(id)?;
        if !path.exists() {
            return None;
        }
        let loaded = fs::read(&path)
            .map_err(Error::from)
            .and_then(|bytes| ron::de::from_bytes::<Template>(&bytes).map_err(Error::from));
        match loaded {
            Ok(template) if template.id() == id => {
                debug!("Loaded template '{}' from {}", template.name(), path.display());
                Some(template)
            }
            Ok(template) => {
                warn!(
                    "{} holds template {} instead of {}",
                    path.display(),
                    template.id(),
                    id
                );
                None
            }
            Err(e) => {
                warn!("Failed to read template {}: {}", path.display(), e);
                None
            }
        }
    }

    /// A loaded template.
    pub fn template(&self, id: TemplateId) -> Option<&Template> {
        self.templates.get(&id)
    }

    /// A loaded template, mutably.
    pub fn template_mut(&mut self, id: TemplateId) -> Option<&mut Template> {
        self.templates.get_mut(&id)
    }

    /// `true` if the template is loaded.
    pub fn contains(&self, id: TemplateId) -> bool {
        self.templates.contains_key(&id)
    }

    /// Loaded templates, in no particular order.
    pub fn templates(&self) -> impl Iterator<Item = &Template> + '_ {
        self.templates.values()
    }

    /// Adds or replaces a template.
    pub fn insert(&mut self, template: Template) -> Option<Template> {
        self.templates.insert(template.id(), template)
    }

    /// Creates an empty template.
    pub fn create<N: Into<String>>(&mut self, name: N) -> TemplateId {
        let id = TemplateId::random();
        let mut template = Template::with_document(id, name, TemplateDocument::default());
        template.set_modified(true);
        self.templates.insert(id, template);
        id
    }

    /// Renames a template and notifies its instances.
    pub fn rename<N: Into<String>>(&mut self, id: TemplateId, name: N) -> bool {
        let name = name.into();
        match self.templates.get_mut(&id) {
            Some(template) => {
                template.set_name(name.clone());
                self.events.emit(TemplateEvent::Renamed { template: id, name });
                true
            }
            None => false,
        }
    }

    /// Drops a template and notifies its instances. The file on disk is kept.
    pub fn remove(&mut self, id: TemplateId) -> Option<Template> {
        let removed = self.templates.remove(&id);
        if removed.is_some() {
            self.events.emit(TemplateEvent::Removed { template: id });
        }
        removed
    }

    /// Writes every modified template to the template directory, returning how many were written.
    pub fn save_modified(&mut self) -> Result<usize, Error> {
        let root = match self.root.as_ref() {
            Some(root) => root.clone(),
            None => {
                debug!("Template library has no directory; nothing saved");
                return Ok(0);
            }
        };
        fs::create_dir_all(&root)
            .with_context(|_| format_err!("cannot create template directory {}", root.display()))?;

        let mut saved = 0;
        for template in self.templates.values_mut().filter(|t| t.is_modified()) {
            let path = ron_path(&root, &template.id().to_string());
            let text = ron::ser::to_string_pretty(&*template, PrettyConfig::default())?;
            fs::write(&path, text)
                .with_context(|_| format_err!("cannot write template {}", path.display()))?;
            template.set_modified(false);
            saved += 1;
        }
        debug!("Saved {} template(s) to {}", saved, root.display());
        Ok(saved)
    }

    /// Subscribes to the events of `template`.
    pub fn subscribe(&mut self, template: TemplateId) -> Subscription {
        self.events.subscribe(template)
    }

    /// Ends a subscription.
    pub fn unsubscribe(&mut self, subscription: Subscription) {
        self.events.unsubscribe(subscription)
    }

    /// The event bus.
    pub fn events(&self) -> &TemplateEvents {
        &self.events
    }
}
