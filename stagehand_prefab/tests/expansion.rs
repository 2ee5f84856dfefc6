use approx::assert_relative_eq;
use stagehand_core::nalgebra::Point3;
use stagehand_prefab::{NodeKind, PrefabError, Template, TemplateDocument, TemplateId, TemplateNode};

mod common;

use common::{chain_template, has_warning, level, local, member, place, wrapper_template, world};

#[test]
fn instance_expands_template_hierarchy() {
    let mut level = level();
    let template = chain_template(&mut level);
    let instance = place(&mut level, template, [0.0, 0.0, 0.0]);
    let a = member(instance, local(1));
    let b = member(instance, local(2));

    let scene = level.scene();
    assert_eq!(scene.object(instance).unwrap().children(), &[a]);
    assert_eq!(scene.object(a).unwrap().children(), &[b]);
    assert_eq!(scene.object(a).unwrap().name(), "A");
    assert!(scene.object(b).unwrap().is_prefab_member());
    assert_eq!(scene.object(b).unwrap().id_in_prefab(), Some(local(2)));
    assert_relative_eq!(world(&level, b), Point3::new(1.0, 2.0, 0.0), epsilon = 1e-5);
    assert!(level.warnings().is_empty());
}

#[test]
fn re_expanding_reproduces_ids() {
    let mut level = level();
    let template = chain_template(&mut level);
    let instance = place(&mut level, template, [4.0, 0.0, 0.0]);
    let before = level.members(instance);
    assert_eq!(
        before,
        vec![member(instance, local(1)), member(instance, local(2))]
    );

    level.remake_instance(instance).unwrap();
    assert_eq!(level.members(instance), before);
    assert_relative_eq!(world(&level, before[1]), Point3::new(5.0, 2.0, 0.0), epsilon = 1e-5);
}

#[test]
fn nodes_without_id_draw_a_repeatable_sequence() {
    let mut level = level();
    let template = TemplateId::random();
    let anonymous = TemplateNode {
        id: None,
        ..TemplateNode::new(local(1), "Anonymous", NodeKind::Empty)
    };
    let document = TemplateDocument {
        objects: vec![anonymous.clone(), anonymous],
    };
    level
        .library_mut()
        .insert(Template::with_document(template, "Anonymous", document));

    let instance = level.instantiate(template).unwrap();
    let first = level.members(instance);
    assert_eq!(first.len(), 2);
    assert_ne!(first[0], first[1]);

    level.remake_instance(instance).unwrap();
    assert_eq!(level.members(instance), first);
}

#[test]
fn instances_of_one_template_get_distinct_ids() {
    let mut level = level();
    let template = chain_template(&mut level);
    let first = level.instantiate(template).unwrap();
    let second = level.instantiate(template).unwrap();

    assert_ne!(member(first, local(1)), member(second, local(1)));
    assert!(level.scene().contains(member(first, local(1))));
    assert!(level.scene().contains(member(second, local(1))));
    assert_eq!(level.instances_of(template), vec![first, second]);
}

#[test]
fn deleting_a_parent_node_orphans_its_children() {
    let mut level = level();
    let template = chain_template(&mut level);
    let first = level.instantiate(template).unwrap();
    let a = member(first, local(1));

    level.remove_members(first, &[a], true, false).unwrap();
    let document = level
        .library()
        .template(template)
        .and_then(|t| t.graph_document())
        .unwrap();
    assert_eq!(document.objects.len(), 1);
    assert_eq!(document.objects[0].id, Some(local(2)));
    assert_eq!(document.objects[0].parent, Some(local(1)));

    level.take_warnings();
    let second = level.instantiate(template).unwrap();
    let b = member(second, local(2));
    assert_eq!(level.scene().object(b).unwrap().parent(), Some(second));
    assert!(has_warning(&level, |w| {
        *w == PrefabError::UnresolvedReference {
            node: local(2),
            reference: local(1),
        }
    }));
}

#[test]
fn unknown_template_leaves_instance_dangling() {
    let mut level = level();
    let instance = level.allocate_id();
    level.create_instance(instance, "").unwrap();
    let missing = TemplateId::random();

    level.set_template(instance, Some(missing), false).unwrap();

    let inst = level.instance(instance).unwrap();
    assert!(inst.is_dangling());
    assert_eq!(inst.template(), Some(missing));
    let object = level.scene().object(instance).unwrap();
    assert_eq!(object.name(), "Unknown Prefab");
    assert!(object.children().is_empty());
    assert!(has_warning(&level, |w| *w == PrefabError::TemplateNotFound(missing)));
}

#[test]
fn template_without_graph_gives_no_members() {
    let mut level = level();
    let template = TemplateId::random();
    level.library_mut().insert(Template::new(template, "Hollow"));

    let instance = level.instantiate(template).unwrap();

    assert!(level.scene().object(instance).unwrap().children().is_empty());
    assert!(!level.instance(instance).unwrap().is_dangling());
    assert!(has_warning(&level, |w| *w == PrefabError::EmptyTemplateGraph(template)));
}

#[test]
fn nested_template_becomes_nested_instance() {
    let mut level = level();
    let inner = chain_template(&mut level);
    let outer = wrapper_template(&mut level, inner);

    let instance = level.instantiate(outer).unwrap();
    let nested = member(instance, local(10));
    let a = member(nested, local(1));

    assert!(level.is_instance(nested));
    assert_eq!(level.instance(nested).unwrap().template(), Some(inner));
    assert_eq!(level.owning_instance(a), Some(nested));
    assert_eq!(level.owning_instance(nested), Some(instance));
    assert_eq!(level.members(instance).len(), 3);
    assert_relative_eq!(world(&level, a), Point3::new(1.0, 0.0, 3.0), epsilon = 1e-5);
}

#[test]
fn template_nesting_itself_is_cut_off() {
    let mut level = level();
    let template = TemplateId::random();
    let document = TemplateDocument {
        objects: vec![TemplateNode::new(local(1), "Me", NodeKind::Prefab { template })],
    };
    level
        .library_mut()
        .insert(Template::with_document(template, "Ouroboros", document));

    let instance = level.instantiate(template).unwrap();
    let nested = member(instance, local(1));

    assert!(level.is_instance(nested));
    assert!(level.scene().object(nested).unwrap().children().is_empty());
    assert!(has_warning(&level, |w| {
        *w == PrefabError::RecursivePrefabReference(nested, instance)
    }));
}

#[test]
fn deleting_members_and_instances() {
    let mut level = level();
    let template = chain_template(&mut level);
    let first = level.instantiate(template).unwrap();
    let second = level.instantiate(template).unwrap();
    let b = member(first, local(2));

    level.delete_object(b).unwrap();
    assert!(!level.scene().contains(b));
    let document = level
        .library()
        .template(template)
        .and_then(|t| t.graph_document())
        .unwrap();
    assert!(document.node(local(2)).is_none());
    assert_eq!(level.dirty_templates(), vec![template]);

    level.delete_object(second).unwrap();
    assert!(!level.is_instance(second));
    assert!(!level.scene().contains(member(second, local(1))));
    assert!(!level.scene().contains(member(second, local(2))));
    assert_eq!(level.library().events().subscriber_count(template), 1);
}
