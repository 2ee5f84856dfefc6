//! # stagehand_prefab
//!
//! Prefab templates and their instances.
//!
//! A template is a reusable object graph kept in the [`PrefabLibrary`]. Placing it in a
//! [`Level`] creates an instance whose members are expanded from the graph under ids derived
//! from the instance id, so repeated expansions give the same ids. Edits to members flow back
//! into the template and from there into every other instance of it.

#![warn(missing_docs, rust_2018_idioms, rust_2018_compatibility)]

pub use crate::{
    bounds::compute_bounds,
    config::PrefabConfig,
    error::PrefabError,
    events::{Subscription, TemplateEvent, TemplateEvents},
    instance::PrefabInstance,
    level::{Level, LevelDocument, ObjectRecord},
    library::PrefabLibrary,
    loader::{expand, Expansion, IdPolicy},
    membership::{reconcile, MemberLink, ReconcilePlan},
    sync::{ChangeKind, ChangeRecord, PendingChanges, SyncOutcome},
    template::{NodeKind, Template, TemplateDocument, TemplateId, TemplateNode},
};

pub mod guid;

mod bounds;
mod config;
mod error;
mod events;
mod instance;
mod level;
mod library;
mod loader;
mod membership;
mod recursion;
mod sync;
mod template;
