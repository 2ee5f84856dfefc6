//! Bounding box of a prefab instance.

use log::warn;
use stagehand_core::{nalgebra::Matrix4, Aabb, ObjectId, Scene, SceneError};

/// Bounds of `instance` in its own space, gathered from the prefab members hanging below it.
///
/// Children and linked objects are both followed, but never into objects that are not prefab
/// members. An instance without members reports the unit box.
pub fn compute_bounds(scene: &Scene, instance: ObjectId) -> Result<Aabb, SceneError> {
    let root = scene
        .object(instance)
        .ok_or(SceneError::UnknownObject(instance))?;
    let to_local = match scene.world_matrix(instance)?.try_inverse() {
        Some(to_local) => to_local,
        None => {
            warn!("{} has a singular transform, its bounds are taken in world space", instance);
            Matrix4::identity()
        }
    };

    let mut bounds = Aabb::empty();
    let mut stack: Vec<ObjectId> = root
        .children()
        .iter()
        .chain(root.linked())
        .copied()
        .collect();
    while let Some(id) = stack.pop() {
        let object = match scene.object(id) {
            Some(object) if object.is_prefab_member() => object,
            _ => continue,
        };
        if let Some(local) = object.kind().local_bounds() {
            let m = to_local * scene.world_matrix(id)?;
            bounds.union(&local.transformed(&m));
        }
        stack.extend(object.children().iter().chain(object.linked()).copied());
    }

    if bounds.is_empty() {
        Ok(Aabb::unit())
    } else {
        Ok(bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use stagehand_core::{
        nalgebra::{Point3, Vector3},
        ObjectFlags, ObjectKind, Transform,
    };

    fn id(n: u64) -> ObjectId {
        ObjectId::from_parts(0, n)
    }

    fn geometry(scene: &mut Scene, n: u64, x: f32, member: bool) -> ObjectId {
        scene
            .create(
                id(n),
                "box",
                ObjectKind::Geometry {
                    bounds: Aabb::new(Point3::new(-0.5, -0.5, -0.5), Point3::new(0.5, 0.5, 0.5)),
                },
            )
            .unwrap();
        scene
            .set_local_transform(id(n), Transform::from_translation(Vector3::new(x, 0.0, 0.0)))
            .unwrap();
        if member {
            scene.insert_flags(id(n), ObjectFlags::PREFAB_MEMBER).unwrap();
        }
        id(n)
    }

    #[test]
    fn no_members_is_unit_box() {
        let mut scene = Scene::new();
        scene.create(id(1), "I", ObjectKind::Prefab).unwrap();
        let stray = geometry(&mut scene, 2, 5.0, false);
        scene.attach(stray, id(1), false).unwrap();
        assert_eq!(compute_bounds(&scene, id(1)).unwrap(), Aabb::unit());
    }

    #[test]
    fn members_and_linked_members_in_instance_space() {
        let mut scene = Scene::new();
        scene.create(id(1), "I", ObjectKind::Prefab).unwrap();
        scene
            .set_local_transform(id(1), Transform::from_translation(Vector3::new(100.0, 0.0, 0.0)))
            .unwrap();
        let a = geometry(&mut scene, 2, 1.0, true);
        let b = geometry(&mut scene, 3, 2.0, true);
        let outsider = geometry(&mut scene, 4, 50.0, false);
        scene.attach(a, id(1), false).unwrap();
        scene.link(b, a, false).unwrap();
        scene.link(outsider, a, false).unwrap();

        let bounds = compute_bounds(&scene, id(1)).unwrap();
        assert_relative_eq!(bounds.min, Point3::new(0.5, -0.5, -0.5), epsilon = 1e-4);
        assert_relative_eq!(bounds.max, Point3::new(3.5, 0.5, 0.5), epsilon = 1e-4);
    }

    #[test]
    fn flattened_instance_still_reports_bounds() {
        let mut scene = Scene::new();
        scene.create(id(1), "I", ObjectKind::Prefab).unwrap();
        let mut flat = Transform::default();
        flat.set_scale(Vector3::zeros());
        scene.set_local_transform(id(1), flat).unwrap();
        let a = geometry(&mut scene, 2, 1.0, true);
        scene.attach(a, id(1), false).unwrap();

        assert!(compute_bounds(&scene, id(1)).is_ok());
    }
}
