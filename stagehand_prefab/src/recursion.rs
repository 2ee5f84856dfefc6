//! Guards against prefabs that would contain themselves.

use fnv::{FnvHashMap, FnvHashSet};
use stagehand_core::{ObjectId, Scene};

use crate::{
    error::PrefabError, instance::PrefabInstance, library::PrefabLibrary, template::TemplateId,
};

pub(crate) type Instances = FnvHashMap<ObjectId, PrefabInstance>;

/// The nearest instance above `object`, following link targets before parents.
pub(crate) fn owning_instance(scene: &Scene, instances: &Instances, object: ObjectId) -> Option<ObjectId> {
    let mut visited = FnvHashSet::default();
    let mut current = scene.frame_of(object);
    while let Some(id) = current {
        if instances.contains_key(&id) {
            return Some(id);
        }
        if !visited.insert(id) {
            return None;
        }
        current = scene.frame_of(id);
    }
    None
}

fn template_of(instances: &Instances, object: ObjectId) -> Option<TemplateId> {
    instances.get(&object).and_then(|i| i.template)
}

/// Templates of `instance` and of every instance enclosing it.
fn template_chain(scene: &Scene, instances: &Instances, instance: ObjectId) -> Vec<TemplateId> {
    let mut chain = Vec::new();
    let mut current = Some(instance);
    while let Some(id) = current {
        if let Some(template) = template_of(instances, id) {
            if chain.contains(&template) {
                break;
            }
            chain.push(template);
        }
        current = owning_instance(scene, instances, id);
    }
    chain
}

fn subtree(scene: &Scene, root: ObjectId, follow_links: bool) -> Vec<ObjectId> {
    let mut out = Vec::new();
    let mut seen = FnvHashSet::default();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        if let Some(object) = scene.object(id) {
            out.push(id);
            stack.extend(object.children().iter().copied());
            if follow_links {
                stack.extend(object.linked().iter().copied());
            }
        }
    }
    out
}

/// Every template a set of templates pulls in through nested prefab nodes, the set included.
fn reachable_templates(library: &PrefabLibrary, start: Vec<TemplateId>) -> FnvHashSet<TemplateId> {
    let mut reached = FnvHashSet::default();
    let mut stack = start;
    while let Some(template) = stack.pop() {
        if !reached.insert(template) {
            continue;
        }
        if let Some(document) = library.template(template).and_then(|t| t.graph_document()) {
            stack.extend(document.nested_templates());
        }
    }
    reached
}

/// Refuses `candidate` as a new member of `instance` if that would nest a prefab in itself.
///
/// Two rules apply. The candidate may not carry, anywhere in its subtree or in the templates
/// nested there, a template of `instance` or of an instance enclosing it. And an instance of
/// the same template elsewhere in the candidate's hierarchy is refused when both it and
/// `instance` sit inside instances of one common template, since they are then copies of the
/// same nested prefab.
pub(crate) fn check_can_add(
    scene: &Scene,
    instances: &Instances,
    library: &PrefabLibrary,
    instance: ObjectId,
    candidate: ObjectId,
) -> Result<(), PrefabError> {
    let refuse = || Err(PrefabError::RecursivePrefabReference(candidate, instance));

    if candidate == instance || scene.is_ancestor(candidate, instance) {
        return refuse();
    }

    let chain = template_chain(scene, instances, instance);
    if chain.is_empty() {
        return Ok(());
    }

    let carried: Vec<TemplateId> = subtree(scene, candidate, true)
        .into_iter()
        .filter_map(|id| template_of(instances, id))
        .collect();
    let carried = reachable_templates(library, carried);
    if chain.iter().any(|t| carried.contains(t)) {
        return refuse();
    }

    let own_template = chain[0];
    let mut root = candidate;
    while let Some(parent) = scene.object(root).and_then(|o| o.parent()) {
        root = parent;
    }
    let own_enclosing = owning_instance(scene, instances, instance);
    for other in subtree(scene, root, false) {
        if other == instance || template_of(instances, other) != Some(own_template) {
            continue;
        }
        let other_enclosing = owning_instance(scene, instances, other);
        match (own_enclosing, other_enclosing) {
            (Some(a), Some(b)) => {
                let enclosing = template_of(instances, a);
                if enclosing.is_some() && enclosing == template_of(instances, b) {
                    return refuse();
                }
            }
            _ => {}
        }
    }
    Ok(())
}
