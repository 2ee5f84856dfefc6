use approx::assert_relative_eq;
use stagehand_core::{nalgebra::Point3, ObjectKind};
use stagehand_prefab::{guid, MemberLink, PrefabError};

mod common;

use common::{
    at, chain_template, level, local, member, node_translation, place, plain_box, world,
    wrapper_template,
};

#[test]
fn added_objects_move_into_the_instance_id_space() {
    let mut level = level();
    let template = chain_template(&mut level);
    let instance = place(&mut level, template, [2.0, 0.0, 0.0]);
    let x = plain_box(&mut level, "X", [10.0, 0.0, 0.0]);

    level.add_members(instance, &[x]).unwrap();

    let remapped = guid::remap(instance, x);
    assert!(!level.scene().contains(x));
    let object = level.scene().object(remapped).unwrap();
    assert!(object.is_prefab_member());
    assert_eq!(object.parent(), Some(instance));
    assert_eq!(object.id_in_prefab(), Some(x));
    assert!(guid::is_owned_by(remapped, instance));
    assert_relative_eq!(world(&level, remapped), Point3::new(10.0, 0.0, 0.0), epsilon = 1e-5);
    assert_relative_eq!(
        node_translation(&level, template, x),
        stagehand_core::nalgebra::Vector3::new(8.0, 0.0, 0.0),
        epsilon = 1e-5
    );

    let step = level.undo_log().undo_steps().last().unwrap();
    assert_eq!(step.description(), "Add Prefab Members");
    assert_eq!(step.record_descriptions().collect::<Vec<_>>(), vec!["Change GUIDs"]);
}

#[test]
fn id_change_is_undoable() {
    let mut level = level();
    let template = chain_template(&mut level);
    let instance = level.instantiate(template).unwrap();
    let x = plain_box(&mut level, "X", [0.0, 1.0, 0.0]);
    level.add_members(instance, &[x]).unwrap();
    let remapped = guid::remap(instance, x);

    assert!(level.undo());
    assert!(level.scene().contains(x));
    assert!(!level.scene().contains(remapped));
    assert_eq!(level.undo_log().redo_len(), 1);

    assert!(level.redo());
    assert!(!level.scene().contains(x));
    assert_eq!(level.scene().object(remapped).unwrap().parent(), Some(instance));
}

#[test]
fn recursive_membership_is_refused() {
    let mut level = level();
    let template = chain_template(&mut level);
    let instance = level.instantiate(template).unwrap();
    let sibling = level.instantiate(template).unwrap();

    let refused = level.add_members(instance, &[sibling]);
    assert_eq!(
        refused,
        Err(PrefabError::RecursivePrefabReference(sibling, instance))
    );
    assert_eq!(level.scene().object(sibling).unwrap().parent(), None);

    let group = level.allocate_id();
    level.scene_mut().create(group, "G", ObjectKind::Group).unwrap();
    level.scene_mut().attach(instance, group, true).unwrap();
    assert!(level.add_members(instance, &[group]).is_err());
    assert_eq!(level.scene().object(group).unwrap().parent(), None);
}

#[test]
fn instance_of_another_template_nests() {
    let mut level = level();
    let outer = chain_template(&mut level);
    let inner = chain_template(&mut level);
    let instance = level.instantiate(outer).unwrap();
    let guest = level.instantiate(inner).unwrap();
    let guest_members = level.members(guest);

    level.add_members(instance, &[guest]).unwrap();

    let nested = guid::remap(instance, guest);
    assert!(level.is_instance(nested));
    assert_eq!(level.members(nested), guest_members);
    assert_eq!(level.owning_instance(guest_members[0]), Some(nested));
    let document = level
        .library()
        .template(outer)
        .and_then(|t| t.graph_document())
        .unwrap();
    assert_eq!(document.nested_templates().collect::<Vec<_>>(), vec![inner]);
    assert_eq!(document.objects.len(), 3);
}

#[test]
fn removed_members_go_to_the_outer_parent() {
    let mut level = level();
    let template = chain_template(&mut level);
    let group = level.allocate_id();
    level.scene_mut().create(group, "G", ObjectKind::Group).unwrap();
    level.scene_mut().set_local_transform(group, at(0.0, 0.0, 5.0)).unwrap();
    let first = level.instantiate(template).unwrap();
    let second = level.instantiate(template).unwrap();
    level.scene_mut().attach(first, group, true).unwrap();
    level.scene_mut().attach(second, group, true).unwrap();
    let a1 = member(first, local(1));
    let b1 = member(first, local(2));
    let a2 = member(second, local(1));

    level.remove_members(first, &[a1], true, false).unwrap();
    let a = level.scene().object(a1).unwrap();
    assert_eq!(a.parent(), Some(group));
    assert!(!a.is_prefab_member());
    assert_eq!(a.id_in_prefab(), None);
    assert!(!level.scene().object(b1).unwrap().is_prefab_member());
    assert_relative_eq!(world(&level, a1), Point3::new(1.0, 0.0, 0.0), epsilon = 1e-5);

    level.remove_members(second, &[a2], true, true).unwrap();
    assert_eq!(level.scene().object(a2).unwrap().parent(), None);
    assert_relative_eq!(world(&level, a2), Point3::new(1.0, 0.0, 0.0), epsilon = 1e-5);
}

#[test]
fn readded_member_keeps_its_id_through_a_remake() {
    let mut level = level();
    let template = chain_template(&mut level);
    let instance = level.instantiate(template).unwrap();
    let a = member(instance, local(1));
    let b = member(instance, local(2));

    level.remove_members(instance, &[a], true, false).unwrap();
    level.add_members(instance, &[a]).unwrap();
    let a_back = guid::remap(instance, a);
    let b_back = guid::remap(instance, b);
    assert_eq!(level.scene().object(a_back).unwrap().id_in_prefab(), Some(a));
    assert_eq!(level.scene().object(a_back).unwrap().children(), &[b_back]);

    level.remake_instance(instance).unwrap();

    let scene = level.scene();
    assert_eq!(scene.object(a_back).unwrap().parent(), Some(instance));
    assert_eq!(scene.object(a_back).unwrap().children(), &[b_back]);
    assert!(scene.object(b_back).unwrap().is_prefab_member());
    assert_relative_eq!(world(&level, a_back), Point3::new(1.0, 0.0, 0.0), epsilon = 1e-5);
    assert_relative_eq!(world(&level, b_back), Point3::new(1.0, 2.0, 0.0), epsilon = 1e-5);
}

#[test]
fn member_list_reconciliation_attaches_then_removes() {
    let mut level = level();
    let template = chain_template(&mut level);
    let instance = level.instantiate(template).unwrap();
    let a = member(instance, local(1));
    let x = plain_box(&mut level, "X", [6.0, 0.0, 0.0]);

    let plan = level
        .apply_member_links(instance, &[MemberLink::new(x, "X".into())])
        .unwrap();

    assert_eq!(plan.attach, vec![x]);
    assert_eq!(plan.remove, vec![a]);
    assert_eq!(level.direct_members(instance), vec![guid::remap(instance, x)]);
    assert_eq!(level.scene().object(a).unwrap().parent(), None);
    assert!(!level.scene().object(a).unwrap().is_prefab_member());
    assert_eq!(
        level.undo_log().undo_steps().last().unwrap().description(),
        "Modify Prefab"
    );
}

#[test]
fn refused_member_list_changes_nothing() {
    let mut level = level();
    let template = chain_template(&mut level);
    let instance = level.instantiate(template).unwrap();
    let sibling = level.instantiate(template).unwrap();
    let a = member(instance, local(1));
    let x = plain_box(&mut level, "X", [6.0, 0.0, 0.0]);
    let steps = level.undo_log().undo_len();

    let refused = level.apply_member_links(
        instance,
        &[
            MemberLink::new(a, "A".into()),
            MemberLink::new(x, "X".into()),
            MemberLink::new(sibling, "Sibling".into()),
        ],
    );

    assert_eq!(
        refused,
        Err(PrefabError::RecursivePrefabReference(sibling, instance))
    );
    let object = level.scene().object(x).unwrap();
    assert_eq!(object.parent(), None);
    assert!(!object.is_prefab_member());
    assert_eq!(level.direct_members(instance), vec![a]);
    assert_eq!(level.undo_log().undo_len(), steps);
    let document = level
        .library()
        .template(template)
        .and_then(|t| t.graph_document())
        .unwrap();
    assert_eq!(document.objects.len(), 2);
}

#[test]
fn unchanged_member_list_does_nothing() {
    let mut level = level();
    let template = chain_template(&mut level);
    let instance = level.instantiate(template).unwrap();
    let a = member(instance, local(1));
    let steps = level.undo_log().undo_len();

    let plan = level
        .apply_member_links(instance, &[MemberLink::new(a, "renamed in the list".into())])
        .unwrap();

    assert!(plan.is_empty());
    assert_eq!(level.undo_log().undo_len(), steps);
    assert_eq!(level.direct_members(instance), vec![a]);
}

#[test]
fn prefab_from_selection_and_back() {
    let mut level = level();
    let x = plain_box(&mut level, "X", [0.0, 0.0, 0.0]);
    let y = plain_box(&mut level, "Y", [4.0, 0.0, 0.0]);

    let (instance, template) = level.create_from_objects(&[x, y], "Pair", true).unwrap();

    assert_relative_eq!(world(&level, instance), Point3::new(2.0, 0.0, 0.0), epsilon = 1e-5);
    assert_eq!(level.scene().selection(), &[instance]);
    let members = level.direct_members(instance);
    assert_eq!(members, vec![guid::remap(instance, x), guid::remap(instance, y)]);
    assert_relative_eq!(world(&level, members[1]), Point3::new(4.0, 0.0, 0.0), epsilon = 1e-5);
    let document = level
        .library()
        .template(template)
        .and_then(|t| t.graph_document())
        .unwrap();
    assert_eq!(document.objects.len(), 2);
    assert_eq!(
        level.undo_log().undo_steps().last().unwrap().description(),
        "Create Prefab"
    );

    assert!(level.undo());
    assert!(!level.scene().contains(instance));
    assert!(!level.is_instance(instance));
    for (id, x_pos) in [(x, 0.0), (y, 4.0)].iter() {
        let object = level.scene().object(*id).unwrap();
        assert!(!object.is_prefab_member());
        assert_eq!(object.parent(), None);
        assert_relative_eq!(world(&level, *id), Point3::new(*x_pos, 0.0, 0.0), epsilon = 1e-5);
    }

    assert!(level.redo());
    assert_eq!(level.instance(instance).unwrap().template(), Some(template));
    assert_eq!(level.direct_members(instance), members);
    assert_eq!(level.owning_instance(members[0]), Some(instance));
}

#[test]
fn prefab_from_objects_of_different_templates_is_refused() {
    let mut level = level();
    let first = chain_template(&mut level);
    let second = chain_template(&mut level);
    let i1 = level.instantiate(first).unwrap();
    let i2 = level.instantiate(second).unwrap();
    let templates = level.library().templates().count();

    let refused = level.create_from_objects(
        &[member(i1, local(1)), member(i2, local(1))],
        "Mixed",
        false,
    );

    assert_eq!(refused, Err(PrefabError::MixedTemplates));
    assert_eq!(level.library().templates().count(), templates);
}

#[test]
fn swapping_templates_is_undoable() {
    let mut level = level();
    let chain = chain_template(&mut level);
    let wrapper = wrapper_template(&mut level, chain);
    let instance = level.instantiate(chain).unwrap();

    level.set_template(instance, Some(wrapper), false).unwrap();
    assert!(level.scene().contains(member(instance, local(10))));
    assert!(!level.scene().contains(member(instance, local(1))));
    assert_eq!(
        level.undo_log().undo_steps().last().unwrap().description(),
        "Set Prefab"
    );

    assert!(level.undo());
    assert_eq!(level.instance(instance).unwrap().template(), Some(chain));
    assert!(level.scene().contains(member(instance, local(1))));
    assert!(!level.scene().contains(member(instance, local(10))));

    assert!(level.redo());
    assert_eq!(level.instance(instance).unwrap().template(), Some(wrapper));

    let unchanged = level.set_template(instance, Some(wrapper), false);
    assert!(unchanged.is_ok());
    assert_eq!(level.undo_log().undo_len(), 1);
}

#[test]
fn clone_all_makes_plain_copies() {
    let mut level = level();
    let template = chain_template(&mut level);
    let instance = place(&mut level, template, [0.0, 5.0, 0.0]);

    let copies = level.clone_all(instance).unwrap();

    assert_eq!(copies.len(), 2);
    let root = level.scene().object(copies[0]).unwrap();
    assert!(!root.is_prefab_member());
    assert_eq!(root.id_in_prefab(), None);
    assert_eq!(root.parent(), None);
    assert_eq!(level.scene().object(copies[1]).unwrap().parent(), Some(copies[0]));
    assert_relative_eq!(world(&level, copies[1]), Point3::new(1.0, 7.0, 0.0), epsilon = 1e-5);
    assert_eq!(level.members(instance).len(), 2);
}
