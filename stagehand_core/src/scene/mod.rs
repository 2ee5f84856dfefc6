//! The object arena every editor operation works on.
//!
//! Objects form a forest through two relations: the parent/child hierarchy, and links, which
//! make an object follow a target without being its child. An object's world matrix is the
//! world matrix of its frame (the link target if linked, else the parent) times its local
//! transform. World matrices are cached and invalidated top-down whenever a frame moves.

use fnv::{FnvHashMap, FnvHashSet};
use log::debug;
use nalgebra::{Matrix4, Point3};

use crate::{error::SceneError, ids::ObjectId, transform::Transform};

pub use self::{
    layer::{Layer, LayerId},
    object::{ObjectFlags, ObjectKind, SceneObject},
};

mod layer;
mod object;

/// Name of the layer every scene starts with.
pub const DEFAULT_LAYER: &str = "Main";

type Result<T> = std::result::Result<T, SceneError>;

/// Scene object storage with hierarchy, links, layers and a selection set.
#[derive(Debug)]
pub struct Scene {
    objects: FnvHashMap<ObjectId, SceneObject>,
    order: Vec<ObjectId>,
    layers: Vec<Layer>,
    current_layer: LayerId,
    selection: Vec<ObjectId>,
}

impl Default for Scene {
    fn default() -> Self {
        Scene::new()
    }
}

impl Scene {
    /// An empty scene with the default layer selected.
    pub fn new() -> Self {
        Scene {
            objects: FnvHashMap::default(),
            order: Vec::new(),
            layers: vec![Layer::new(DEFAULT_LAYER.to_owned())],
            current_layer: LayerId(0),
            selection: Vec::new(),
        }
    }

    /// Creates a parentless object on the current layer.
    pub fn create<N: Into<String>>(&mut self, id: ObjectId, name: N, kind: ObjectKind) -> Result<()> {
        if self.objects.contains_key(&id) {
            return Err(SceneError::DuplicateId(id));
        }
        self.objects
            .insert(id, SceneObject::new(id, name.into(), kind, self.current_layer));
        self.order.push(id);
        Ok(())
    }

    /// `true` if an object with this id exists.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Looks up an object.
    pub fn object(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(&id)
    }

    fn get(&self, id: ObjectId) -> Result<&SceneObject> {
        self.objects.get(&id).ok_or(SceneError::UnknownObject(id))
    }

    fn get_mut(&mut self, id: ObjectId) -> Result<&mut SceneObject> {
        self.objects
            .get_mut(&id)
            .ok_or(SceneError::UnknownObject(id))
    }

    /// All objects, in creation order.
    pub fn objects(&self) -> impl Iterator<Item = &SceneObject> + '_ {
        self.order.iter().filter_map(move |id| self.objects.get(id))
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// `true` if the scene holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// The first object, in creation order, with this name.
    pub fn find_by_name(&self, name: &str) -> Option<ObjectId> {
        self.objects().find(|o| o.name == name).map(|o| o.id)
    }

    /// Renames an object.
    pub fn set_name<N: Into<String>>(&mut self, id: ObjectId, name: N) -> Result<()> {
        self.get_mut(id)?.name = name.into();
        Ok(())
    }

    /// Sets state bits.
    pub fn insert_flags(&mut self, id: ObjectId, flags: ObjectFlags) -> Result<()> {
        self.get_mut(id)?.flags.insert(flags);
        Ok(())
    }

    /// Clears state bits.
    pub fn remove_flags(&mut self, id: ObjectId, flags: ObjectFlags) -> Result<()> {
        self.get_mut(id)?.flags.remove(flags);
        Ok(())
    }

    /// Moves an object to another layer.
    pub fn set_layer(&mut self, id: ObjectId, layer: LayerId) -> Result<()> {
        self.get_mut(id)?.layer = layer;
        Ok(())
    }

    /// Sets or clears the template node an object corresponds to.
    pub fn set_id_in_prefab(&mut self, id: ObjectId, node: Option<ObjectId>) -> Result<()> {
        self.get_mut(id)?.id_in_prefab = node;
        Ok(())
    }

    /// The reference frame of an object: its link target if linked, else its parent.
    pub fn frame_of(&self, id: ObjectId) -> Option<ObjectId> {
        self.objects.get(&id).and_then(SceneObject::frame)
    }

    /// Replaces the local transform.
    pub fn set_local_transform(&mut self, id: ObjectId, transform: Transform) -> Result<()> {
        self.get_mut(id)?.local = transform;
        self.invalidate_transform(id);
        Ok(())
    }

    /// World matrix, computed through the frame chain and cached.
    pub fn world_matrix(&self, id: ObjectId) -> Result<Matrix4<f32>> {
        let object = self.get(id)?;
        if let Some(m) = object.world.get() {
            return Ok(m);
        }
        let m = self.frame_world(object)? * object.local.matrix();
        object.world.set(Some(m));
        Ok(m)
    }

    fn frame_world(&self, object: &SceneObject) -> Result<Matrix4<f32>> {
        match object.frame() {
            Some(frame) => self.world_matrix(frame),
            None => Ok(Matrix4::identity()),
        }
    }

    /// World-space origin of an object.
    pub fn world_position(&self, id: ObjectId) -> Result<Point3<f32>> {
        Ok(self.world_matrix(id)?.transform_point(&Point3::origin()))
    }

    /// Changes the local transform so that the world matrix becomes `m`.
    pub fn set_world_matrix(&mut self, id: ObjectId, m: &Matrix4<f32>) -> Result<()> {
        let frame = self.frame_world(self.get(id)?)?;
        let inverse = frame.try_inverse().unwrap_or_else(Matrix4::identity);
        self.set_local_transform(id, Transform::from_matrix(&(inverse * m)))
    }

    /// Moves an object so that its world-space origin is `p`, keeping rotation and scale.
    pub fn set_world_position(&mut self, id: ObjectId, p: Point3<f32>) -> Result<()> {
        let frame = self.frame_world(self.get(id)?)?;
        let inverse = frame.try_inverse().unwrap_or_else(Matrix4::identity);
        let local = inverse.transform_point(&p);
        let mut transform = self.get(id)?.local.clone();
        transform.set_translation(local.coords);
        self.set_local_transform(id, transform)
    }

    /// Drops the cached world matrix of `id` and of everything that follows it.
    pub fn invalidate_transform(&self, id: ObjectId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if let Some(object) = self.objects.get(&id) {
                object.world.set(None);
                stack.extend(object.children.iter().copied());
                stack.extend(object.linked.iter().copied());
            }
        }
    }

    fn restore_world(&mut self, id: ObjectId, world: Option<Matrix4<f32>>) -> Result<()> {
        match world {
            Some(m) => self.set_world_matrix(id, &m),
            None => {
                self.invalidate_transform(id);
                Ok(())
            }
        }
    }

    /// `true` if `ancestor` is reachable from `of` by walking parents and link targets upwards.
    pub fn is_ancestor(&self, ancestor: ObjectId, of: ObjectId) -> bool {
        let mut visited = FnvHashSet::default();
        let mut stack = vec![of];
        while let Some(id) = stack.pop() {
            let object = match self.objects.get(&id) {
                Some(object) => object,
                None => continue,
            };
            for up in object.parent.iter().chain(object.linked_to.iter()) {
                if *up == ancestor {
                    return true;
                }
                if visited.insert(*up) {
                    stack.push(*up);
                }
            }
        }
        false
    }

    fn check_cycle(&self, object: ObjectId, target: ObjectId) -> Result<()> {
        if object == target || self.is_ancestor(object, target) {
            Err(SceneError::HierarchyCycle(object, target))
        } else {
            Ok(())
        }
    }

    /// Makes `child` a child of `parent`, detaching it from its previous parent.
    ///
    /// With `keep_world` the child keeps its world transform, otherwise its local transform.
    pub fn attach(&mut self, child: ObjectId, parent: ObjectId, keep_world: bool) -> Result<()> {
        self.get(parent)?;
        if self.get(child)?.parent == Some(parent) {
            return Ok(());
        }
        self.check_cycle(child, parent)?;

        let world = if keep_world {
            Some(self.world_matrix(child)?)
        } else {
            None
        };
        self.remove_from_parent(child);
        self.get_mut(child)?.parent = Some(parent);
        self.get_mut(parent)?.children.push(child);
        self.restore_world(child, world)
    }

    /// Makes `child` parentless.
    pub fn detach(&mut self, child: ObjectId, keep_world: bool) -> Result<()> {
        if self.get(child)?.parent.is_none() {
            return Ok(());
        }
        let world = if keep_world {
            Some(self.world_matrix(child)?)
        } else {
            None
        };
        self.remove_from_parent(child);
        self.restore_world(child, world)
    }

    /// Makes `object` follow `target`. A link takes precedence over the parent as reference frame.
    pub fn link(&mut self, object: ObjectId, target: ObjectId, keep_world: bool) -> Result<()> {
        if !self.get(object)?.kind.can_be_linked() {
            return Err(SceneError::CannotBeLinked(object));
        }
        self.get(target)?;
        if self.get(object)?.linked_to == Some(target) {
            return Ok(());
        }
        self.check_cycle(object, target)?;

        let world = if keep_world {
            Some(self.world_matrix(object)?)
        } else {
            None
        };
        self.remove_link(object);
        self.get_mut(object)?.linked_to = Some(target);
        self.get_mut(target)?.linked.push(object);
        self.restore_world(object, world)
    }

    /// Removes the link of `object`, if any.
    pub fn unlink(&mut self, object: ObjectId, keep_world: bool) -> Result<()> {
        if self.get(object)?.linked_to.is_none() {
            return Ok(());
        }
        let world = if keep_world {
            Some(self.world_matrix(object)?)
        } else {
            None
        };
        self.remove_link(object);
        self.restore_world(object, world)
    }

    fn remove_from_parent(&mut self, child: ObjectId) {
        let parent = self.objects.get_mut(&child).and_then(|o| o.parent.take());
        if let Some(parent) = parent.and_then(|p| self.objects.get_mut(&p)) {
            parent.children.retain(|c| *c != child);
        }
    }

    fn remove_link(&mut self, object: ObjectId) {
        let target = self.objects.get_mut(&object).and_then(|o| o.linked_to.take());
        if let Some(target) = target.and_then(|t| self.objects.get_mut(&t)) {
            target.linked.retain(|l| *l != object);
        }
    }

    /// Hierarchical descendants of `id` in pre-order, `id` excluded. Links are not followed.
    pub fn descendants(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut out = Vec::new();
        let mut stack: Vec<ObjectId> = match self.objects.get(&id) {
            Some(object) => object.children.iter().rev().copied().collect(),
            None => return out,
        };
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(object) = self.objects.get(&id) {
                stack.extend(object.children.iter().rev().copied());
            }
        }
        out
    }

    /// Deletes `id` and its hierarchical descendants, returning the deleted ids in pre-order.
    ///
    /// Surviving objects linked to a deleted object are unlinked and keep their world transform.
    pub fn delete(&mut self, id: ObjectId) -> Result<Vec<ObjectId>> {
        self.get(id)?;
        let mut doomed = vec![id];
        doomed.extend(self.descendants(id));
        let doomed_set: FnvHashSet<ObjectId> = doomed.iter().copied().collect();

        let followers: Vec<ObjectId> = doomed
            .iter()
            .filter_map(|d| self.objects.get(d))
            .flat_map(|o| o.linked.iter().copied())
            .filter(|o| !doomed_set.contains(o))
            .collect();
        for follower in followers {
            self.unlink(follower, true)?;
        }

        self.remove_from_parent(id);
        for d in &doomed {
            self.remove_link(*d);
            self.objects.remove(d);
        }
        self.order.retain(|o| !doomed_set.contains(o));
        self.selection.retain(|o| !doomed_set.contains(o));
        debug!("Deleted {} object(s) rooted at {}", doomed.len(), id);
        Ok(doomed)
    }

    /// Gives an object a new id, rewriting every relation that refers to it.
    pub fn change_id(&mut self, old: ObjectId, new: ObjectId) -> Result<()> {
        if old == new {
            return Ok(());
        }
        if self.objects.contains_key(&new) {
            return Err(SceneError::DuplicateId(new));
        }
        let mut object = self
            .objects
            .remove(&old)
            .ok_or(SceneError::UnknownObject(old))?;
        object.id = new;

        if let Some(parent) = object.parent.and_then(|p| self.objects.get_mut(&p)) {
            replace_id(&mut parent.children, old, new);
        }
        if let Some(target) = object.linked_to.and_then(|t| self.objects.get_mut(&t)) {
            replace_id(&mut target.linked, old, new);
        }
        for child in &object.children {
            if let Some(child) = self.objects.get_mut(child) {
                child.parent = Some(new);
            }
        }
        for follower in &object.linked {
            if let Some(follower) = self.objects.get_mut(follower) {
                follower.linked_to = Some(new);
            }
        }
        self.objects.insert(new, object);
        replace_id(&mut self.order, old, new);
        replace_id(&mut self.selection, old, new);
        Ok(())
    }

    /// Adds a layer, or returns the existing one with that name.
    pub fn add_layer<N: Into<String>>(&mut self, name: N) -> LayerId {
        let name = name.into();
        if let Some(id) = self.layer_by_name(&name) {
            return id;
        }
        self.layers.push(Layer::new(name));
        LayerId(self.layers.len() - 1)
    }

    /// Looks up a layer.
    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(id.0)
    }

    /// Finds a layer by name.
    pub fn layer_by_name(&self, name: &str) -> Option<LayerId> {
        self.layers.iter().position(|l| l.name() == name).map(LayerId)
    }

    /// All layers, indexed by `LayerId`.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// The layer new objects are created on.
    pub fn current_layer(&self) -> LayerId {
        self.current_layer
    }

    /// Selects the layer new objects are created on. Unknown layers are ignored.
    pub fn set_current_layer(&mut self, id: LayerId) {
        if id.0 < self.layers.len() {
            self.current_layer = id;
        }
    }

    /// Flags a layer as changed.
    pub fn mark_layer_modified(&mut self, id: LayerId) {
        if let Some(layer) = self.layers.get_mut(id.0) {
            layer.set_modified(true);
        }
    }

    /// Clears the changed flag of every layer.
    pub fn clear_modified_layers(&mut self) {
        for layer in &mut self.layers {
            layer.set_modified(false);
        }
    }

    /// Adds an object to the selection.
    pub fn select(&mut self, id: ObjectId) {
        if self.objects.contains_key(&id) && !self.selection.contains(&id) {
            self.selection.push(id);
        }
    }

    /// Removes an object from the selection.
    pub fn deselect(&mut self, id: ObjectId) {
        self.selection.retain(|s| *s != id);
    }

    /// Empties the selection.
    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Selected objects, in selection order.
    pub fn selection(&self) -> &[ObjectId] {
        &self.selection
    }

    /// `true` if the object is selected.
    pub fn is_selected(&self, id: ObjectId) -> bool {
        self.selection.contains(&id)
    }
}

fn replace_id(list: &mut [ObjectId], old: ObjectId, new: ObjectId) {
    for id in list.iter_mut().filter(|id| **id == old) {
        *id = new;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn id(n: u64) -> ObjectId {
        ObjectId::from_parts(0, n)
    }

    fn at(scene: &mut Scene, n: u64, kind: ObjectKind, x: f32) -> ObjectId {
        scene.create(id(n), format!("object {}", n), kind).unwrap();
        scene
            .set_local_transform(id(n), Transform::from_translation(Vector3::new(x, 0.0, 0.0)))
            .unwrap();
        id(n)
    }

    #[test]
    fn world_follows_parent_chain() {
        let mut scene = Scene::new();
        let a = at(&mut scene, 1, ObjectKind::Group, 1.0);
        let b = at(&mut scene, 2, ObjectKind::Empty, 2.0);
        scene.attach(b, a, false).unwrap();
        assert_relative_eq!(scene.world_position(b).unwrap(), Point3::new(3.0, 0.0, 0.0));

        scene
            .set_local_transform(a, Transform::from_translation(Vector3::new(10.0, 0.0, 0.0)))
            .unwrap();
        assert_relative_eq!(scene.world_position(b).unwrap(), Point3::new(12.0, 0.0, 0.0));
    }

    #[test]
    fn attach_keeping_world() {
        let mut scene = Scene::new();
        let a = at(&mut scene, 1, ObjectKind::Group, 5.0);
        let b = at(&mut scene, 2, ObjectKind::Empty, 2.0);
        scene.attach(b, a, true).unwrap();
        assert_relative_eq!(scene.world_position(b).unwrap(), Point3::new(2.0, 0.0, 0.0));
        assert_relative_eq!(scene.object(b).unwrap().local_transform().translation().x, -3.0);
        assert_eq!(scene.object(a).unwrap().children(), &[b]);
    }

    #[test]
    fn link_takes_precedence_over_parent() {
        let mut scene = Scene::new();
        let group = at(&mut scene, 1, ObjectKind::Group, 1.0);
        let target = at(&mut scene, 2, ObjectKind::Empty, 100.0);
        let follower = at(&mut scene, 3, ObjectKind::Empty, 1.0);
        scene.attach(follower, group, false).unwrap();
        scene.link(follower, target, false).unwrap();

        assert_eq!(scene.frame_of(follower), Some(target));
        assert_relative_eq!(scene.world_position(follower).unwrap(), Point3::new(101.0, 0.0, 0.0));
    }

    #[test]
    fn geometry_nests_but_links_and_cycles_are_refused() {
        let mut scene = Scene::new();
        let geometry = at(
            &mut scene,
            1,
            ObjectKind::Geometry {
                bounds: crate::Aabb::unit(),
            },
            0.0,
        );
        let group = at(&mut scene, 2, ObjectKind::Group, 0.0);
        let inner = at(&mut scene, 3, ObjectKind::Group, 0.0);

        scene.attach(group, geometry, false).unwrap();
        assert_eq!(scene.object(geometry).unwrap().children(), &[group]);
        scene.detach(group, false).unwrap();
        assert_eq!(
            scene.link(group, inner, false),
            Err(SceneError::CannotBeLinked(group))
        );
        scene.attach(inner, group, false).unwrap();
        assert_eq!(
            scene.attach(group, inner, false),
            Err(SceneError::HierarchyCycle(group, inner))
        );
    }

    #[test]
    fn delete_unlinks_followers_in_place() {
        let mut scene = Scene::new();
        let root = at(&mut scene, 1, ObjectKind::Group, 4.0);
        let child = at(&mut scene, 2, ObjectKind::Empty, 1.0);
        let follower = at(&mut scene, 3, ObjectKind::Empty, 1.0);
        scene.attach(child, root, false).unwrap();
        scene.link(follower, child, false).unwrap();
        scene.select(child);
        assert_relative_eq!(scene.world_position(follower).unwrap(), Point3::new(6.0, 0.0, 0.0));

        let deleted = scene.delete(root).unwrap();
        assert_eq!(deleted, vec![root, child]);
        assert!(!scene.contains(child));
        assert!(scene.selection().is_empty());
        assert_eq!(scene.object(follower).unwrap().linked_to(), None);
        assert_relative_eq!(scene.world_position(follower).unwrap(), Point3::new(6.0, 0.0, 0.0));
    }

    #[test]
    fn change_id_rewrites_relations() {
        let mut scene = Scene::new();
        let root = at(&mut scene, 1, ObjectKind::Group, 0.0);
        let child = at(&mut scene, 2, ObjectKind::Empty, 0.0);
        let follower = at(&mut scene, 3, ObjectKind::Empty, 0.0);
        scene.attach(child, root, false).unwrap();
        scene.link(follower, child, false).unwrap();

        scene.change_id(child, id(20)).unwrap();
        assert_eq!(scene.object(root).unwrap().children(), &[id(20)]);
        assert_eq!(scene.object(follower).unwrap().linked_to(), Some(id(20)));
        assert_eq!(scene.object(id(20)).unwrap().parent(), Some(root));
        assert_eq!(scene.change_id(root, follower), Err(SceneError::DuplicateId(follower)));
    }

    #[test]
    fn layers() {
        let mut scene = Scene::new();
        let props = scene.add_layer("Props");
        assert_eq!(scene.add_layer("Props"), props);
        scene.set_current_layer(props);
        let a = at(&mut scene, 1, ObjectKind::Empty, 0.0);
        assert_eq!(scene.object(a).unwrap().layer(), props);

        scene.mark_layer_modified(props);
        assert!(scene.layer(props).unwrap().is_modified());
        assert!(!scene.layer(LayerId(0)).unwrap().is_modified());
    }
}
