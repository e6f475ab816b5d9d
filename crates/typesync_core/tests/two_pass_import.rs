mod common;

use common::{
    add_property, composing, content_type, doc, property_node, setup, tab_node, with_info,
    without_property, Live,
};
use typesync_core::document::Node;
use typesync_core::model::change::ChangeKind;
use typesync_core::serializer::ContentTypeSerializer;
use typesync_core::{
    BatchImporter, BatchItem, CancelFlag, EntityKind, EntitySerializer, SerializerOptions,
    SerializerRegistry, TypeStore,
};
use uuid::Uuid;

struct Scenario {
    post_key: Uuid,
    seo_key: Uuid,
    post: Node,
    seo: Node,
}

fn blog_scenario() -> Scenario {
    let post_key = Uuid::new_v4();
    let seo_key = Uuid::new_v4();
    let post = doc(EntityKind::ContentType, post_key, "blogPost").with_child(
        Node::new("GenericProperties")
            .with_child(property_node(Uuid::new_v4(), "title", "content", 0))
            .with_child(property_node(Uuid::new_v4(), "bodyText", "content", 1)),
    );
    let post = composing(&post, &[(seo_key, "seoMixin")]);
    let seo = doc(EntityKind::ContentType, seo_key, "seoMixin").with_child(
        Node::new("GenericProperties").with_child(property_node(
            Uuid::new_v4(),
            "metaTitle",
            "seo",
            0,
        )),
    );
    Scenario {
        post_key,
        seo_key,
        post,
        seo,
    }
}

fn import(live: &Live<'_>, nodes: &[&Node], options: &SerializerOptions) -> typesync_core::BatchReport {
    let registry = SerializerRegistry::with_defaults();
    let items = nodes
        .iter()
        .map(|node| BatchItem::new(node.attr("Alias").unwrap_or_default(), (*node).clone()))
        .collect::<Vec<_>>();
    BatchImporter::new(&registry, live.ctx()).import(&items, options, &CancelFlag::new())
}

#[test]
fn second_pass_resolves_composition_created_later_in_batch() {
    let conn = setup();
    let live = Live::new(&conn);
    let ctx = live.ctx();
    let serializer = ContentTypeSerializer::default();
    let options = SerializerOptions::default();
    let scenario = blog_scenario();

    let post = serializer.deserialize(&scenario.post, &ctx, &options);
    assert!(post.success);
    assert_eq!(post.change, ChangeKind::Create);
    let mut post_item = post.item.unwrap();
    assert!(post_item.compositions.is_empty());
    live.types.save(&mut post_item).unwrap();

    let seo = serializer.deserialize(&scenario.seo, &ctx, &options);
    let mut seo_item = seo.item.unwrap();
    live.types.save(&mut seo_item).unwrap();

    let second = serializer.deserialize_second_pass(post_item, &scenario.post, &ctx, &options);
    assert!(second.success);
    assert_eq!(second.details.len(), 1);
    assert_eq!(second.details[0].path, "Compositions");
    assert_eq!(second.details[0].kind, ChangeKind::Create);
    assert!(second.saved);

    let stored = live
        .types
        .find_by_key(EntityKind::ContentType, scenario.post_key)
        .unwrap()
        .unwrap();
    assert_eq!(stored.compositions.len(), 1);
    assert_eq!(stored.compositions[0].key, scenario.seo_key);

    let again = import(&live, &[&scenario.post, &scenario.seo], &options);
    assert_eq!(again.failed(), 0);
    assert!(again
        .outcomes
        .iter()
        .all(|outcome| outcome.change == ChangeKind::NoChange && !outcome.saved));
}

#[test]
fn batch_resolves_forward_references_in_either_order() {
    let scenario = blog_scenario();
    for order in [
        [&scenario.post, &scenario.seo],
        [&scenario.seo, &scenario.post],
    ] {
        let conn = setup();
        let live = Live::new(&conn);
        let report = import(&live, &order, &SerializerOptions::default());

        assert_eq!(report.failed(), 0);
        assert!(report.outcomes.iter().all(|outcome| outcome.completed));
        let post = report.find("blogPost").unwrap();
        assert_eq!(post.change, ChangeKind::Create);

        let stored = live
            .types
            .find_by_key(EntityKind::ContentType, scenario.post_key)
            .unwrap()
            .unwrap();
        assert!(stored.composes(scenario.seo_key));
    }
}

#[test]
fn missing_composition_is_reported_without_failing_import() {
    let conn = setup();
    let live = Live::new(&conn);
    let scenario = blog_scenario();

    let report = import(&live, &[&scenario.post], &SerializerOptions::default());
    let outcome = report.find("blogPost").unwrap();
    assert!(outcome.success);
    let reported = outcome
        .details
        .iter()
        .find(|change| change.path == "Compositions")
        .unwrap();
    assert!(!reported.success);
    assert_eq!(reported.name, "seoMixin");

    let stored = live
        .types
        .find_by_key(EntityKind::ContentType, scenario.post_key)
        .unwrap()
        .unwrap();
    assert!(stored.compositions.is_empty());
    assert!(stored.property("title").is_some());
}

#[test]
fn properties_missing_from_document_are_deleted_in_second_pass() {
    let conn = setup();
    let live = Live::new(&conn);
    let ctx = live.ctx();
    let serializer = ContentTypeSerializer::default();
    let options = SerializerOptions::default();

    let mut item = content_type("article");
    add_property(&mut item, "content", "title", 0);
    add_property(&mut item, "content", "legacyField", 1);
    live.types.save(&mut item).unwrap();
    let exported = serializer.serialize(&item, &ctx).unwrap();
    let trimmed = without_property(&exported, "legacyField");

    let first = serializer.deserialize(&trimmed, &ctx, &options);
    assert_eq!(first.change, ChangeKind::NoChange);
    let first_item = first.item.unwrap();
    assert!(first_item.property("legacyField").is_some());

    let second = serializer.deserialize_second_pass(first_item, &trimmed, &ctx, &options);
    assert_eq!(second.change, ChangeKind::Delete);
    let deleted = &second.details[0];
    assert_eq!(deleted.path, "Property");
    assert_eq!(deleted.kind, ChangeKind::Delete);
    assert_eq!(deleted.name, "legacyField");

    let stored = live
        .types
        .find_by_key(EntityKind::ContentType, item.key)
        .unwrap()
        .unwrap();
    assert!(stored.property("legacyField").is_none());
    assert!(stored.group("content").is_some());
}

#[test]
fn composition_cycle_is_rejected() {
    let conn = setup();
    let live = Live::new(&conn);
    let mut base = content_type("base");
    let mut derived = content_type("derived");
    derived.compositions = vec![base.reference()];
    live.types.save(&mut base).unwrap();
    live.types.save(&mut derived).unwrap();

    let cyclic = composing(
        &doc(EntityKind::ContentType, base.key, "base"),
        &[(derived.key, "derived")],
    );
    let report = import(&live, &[&cyclic], &SerializerOptions::default());
    let outcome = report.find("base").unwrap();
    assert!(outcome.success);
    let rejected = outcome
        .details
        .iter()
        .find(|change| change.path == "Compositions")
        .unwrap();
    assert_eq!(rejected.kind, ChangeKind::Fail);
    assert!(rejected.new_value.as_deref().unwrap().contains("cycle"));

    let stored = live
        .types
        .find_by_key(EntityKind::ContentType, base.key)
        .unwrap()
        .unwrap();
    assert!(stored.compositions.is_empty());
}

#[test]
fn composition_with_colliding_property_alias_is_rejected() {
    let conn = setup();
    let live = Live::new(&conn);
    let mut mixin = content_type("titleMixin");
    add_property(&mut mixin, "content", "title", 0);
    live.types.save(&mut mixin).unwrap();

    let page = doc(EntityKind::ContentType, Uuid::new_v4(), "page").with_child(
        Node::new("GenericProperties").with_child(property_node(Uuid::new_v4(), "Title", "content", 0)),
    );
    let page = composing(&page, &[(mixin.key, "titleMixin")]);
    let report = import(&live, &[&page], &SerializerOptions::default());

    let outcome = report.find("page").unwrap();
    let rejected = outcome
        .details
        .iter()
        .find(|change| change.path == "Compositions")
        .unwrap();
    assert!(!rejected.success);
    assert!(rejected.new_value.as_deref().unwrap().contains("title"));
}

#[test]
fn report_mode_resolves_through_batch_without_writing() {
    let conn = setup();
    let live = Live::new(&conn);
    let scenario = blog_scenario();

    let report = import(&live, &[&scenario.post, &scenario.seo], &SerializerOptions::report());
    assert_eq!(report.failed(), 0);
    let post = report.find("blogPost").unwrap();
    assert_eq!(post.change, ChangeKind::Create);
    assert!(!post.saved);
    assert!(post
        .details
        .iter()
        .any(|change| change.path == "Compositions" && change.success));

    assert!(live.types.list(EntityKind::ContentType).unwrap().is_empty());
}

#[test]
fn failing_document_does_not_stop_batch() {
    let conn = setup();
    let live = Live::new(&conn);
    let scenario = blog_scenario();
    let broken = Node::new("ContentType").with_attr("Alias", "broken");
    let foreign = Node::new("Dictionary").with_attr("Alias", "greeting");

    let report = import(
        &live,
        &[&broken, &scenario.seo, &foreign, &scenario.post],
        &SerializerOptions::default(),
    );
    assert_eq!(report.outcomes.len(), 4);
    assert_eq!(report.failed(), 2);
    assert_eq!(report.outcomes[0].change, ChangeKind::Fail);
    assert!(report.outcomes[2].error.is_some());
    assert!(report.find("blogPost").unwrap().completed);
    assert!(live
        .types
        .find_by_key(EntityKind::ContentType, scenario.post_key)
        .unwrap()
        .unwrap()
        .composes(scenario.seo_key));
}

#[test]
fn cancelled_batch_stops_before_next_document() {
    let conn = setup();
    let live = Live::new(&conn);
    let scenario = blog_scenario();
    let cancel = CancelFlag::new();
    cancel.cancel();

    let registry = SerializerRegistry::with_defaults();
    let report = BatchImporter::new(&registry, live.ctx()).import(
        &[BatchItem::new("blogPost", scenario.post.clone())],
        &SerializerOptions::default(),
        &cancel,
    );
    assert!(report.cancelled);
    assert!(report.outcomes.is_empty());
    assert!(live.types.list(EntityKind::ContentType).unwrap().is_empty());
}

#[test]
fn folder_placement_creates_containers() {
    let conn = setup();
    let live = Live::new(&conn);
    let node = with_info(
        &doc(EntityKind::ContentType, Uuid::new_v4(), "newsItem"),
        Node::leaf("Folder", "Site/News"),
    );

    let report = import(&live, &[&node], &SerializerOptions::default());
    assert_eq!(report.failed(), 0);
    let containers = live.types.list_containers(EntityKind::ContentType).unwrap();
    assert_eq!(containers.len(), 2);
    let news = containers.iter().find(|c| c.name == "News").unwrap();
    let site = containers.iter().find(|c| c.name == "Site").unwrap();
    assert_eq!(news.parent, Some(site.key));

    let stored = live
        .types
        .find_by_alias(EntityKind::ContentType, "newsItem")
        .unwrap();
    assert_eq!(stored[0].container, Some(news.key));

    let again = import(&live, &[&node], &SerializerOptions::default());
    assert_eq!(again.outcomes[0].change, ChangeKind::NoChange);
    assert_eq!(live.types.list_containers(EntityKind::ContentType).unwrap().len(), 2);
}

#[test]
fn renamed_tab_moves_its_properties() {
    let conn = setup();
    let live = Live::new(&conn);
    let ctx = live.ctx();
    let serializer = ContentTypeSerializer::default();
    let options = SerializerOptions::default();

    let mut item = content_type("landing");
    let title_key = add_property(&mut item, "content", "title", 0);
    live.types.save(&mut item).unwrap();
    let group_key = item.group("content").unwrap().key;

    let renamed = doc(EntityKind::ContentType, item.key, "landing")
        .with_child(
            Node::new("GenericProperties").with_child(property_node(title_key, "title", "main", 0)),
        )
        .with_child(Node::new("Tabs").with_child(tab_node(group_key, "main", 0)));

    let first = serializer.deserialize(&renamed, &ctx, &options);
    assert!(first
        .details
        .iter()
        .any(|change| change.path == "Tabs/Alias" && change.old_value.as_deref() == Some("content")));
    let second = serializer.deserialize_second_pass(first.item.unwrap(), &renamed, &ctx, &options);
    assert!(second.success);

    let stored = live
        .types
        .find_by_key(EntityKind::ContentType, item.key)
        .unwrap()
        .unwrap();
    assert_eq!(stored.groups.len(), 1);
    assert_eq!(stored.groups[0].key, group_key);
    assert_eq!(stored.property("title").unwrap().group.as_deref(), Some("main"));
}

#[test]
fn same_alias_in_different_folders_creates_separate_entities() {
    let conn = setup();
    let live = Live::new(&conn);
    let first = with_info(
        &doc(EntityKind::ContentType, Uuid::new_v4(), "page"),
        Node::leaf("Folder", "SiteA"),
    );
    let second = with_info(
        &doc(EntityKind::ContentType, Uuid::new_v4(), "page"),
        Node::leaf("Folder", "SiteB"),
    );

    let report = import(&live, &[&first, &second], &SerializerOptions::default());
    assert_eq!(report.failed(), 0);
    assert!(report
        .outcomes
        .iter()
        .all(|outcome| outcome.change == ChangeKind::Create && outcome.completed));

    let stored = live.types.find_by_alias(EntityKind::ContentType, "page").unwrap();
    assert_eq!(stored.len(), 2);
    let containers = live.types.list_containers(EntityKind::ContentType).unwrap();
    for name in ["SiteA", "SiteB"] {
        let folder = containers.iter().find(|c| c.name == name).unwrap();
        assert_eq!(
            stored.iter().filter(|item| item.container == Some(folder.key)).count(),
            1
        );
    }
}

#[test]
fn entity_created_earlier_in_batch_is_not_matched_by_alias() {
    let conn = setup();
    let live = Live::new(&conn);
    let first = doc(EntityKind::ContentType, Uuid::new_v4(), "page");
    let second = doc(EntityKind::ContentType, Uuid::new_v4(), "page");

    let report = import(&live, &[&first, &second], &SerializerOptions::report());
    assert_eq!(report.failed(), 0);
    assert!(report.outcomes.iter().all(|outcome| outcome.change == ChangeKind::Create));
    assert!(report
        .outcomes
        .iter()
        .all(|outcome| outcome.details.iter().all(|change| change.path != "Key")));
    assert!(live.types.list(EntityKind::ContentType).unwrap().is_empty());

    let report = import(&live, &[&first, &second], &SerializerOptions::default());
    assert!(report.outcomes[0].success);
    assert!(report.outcomes[1].error.as_deref().unwrap().contains("alias already in use"));
    assert_eq!(live.types.list(EntityKind::ContentType).unwrap().len(), 1);
}

#[test]
fn compositions_sharing_a_property_alias_are_rejected() {
    let conn = setup();
    let live = Live::new(&conn);
    let mut first = content_type("mixinB");
    add_property(&mut first, "meta", "seo", 0);
    live.types.save(&mut first).unwrap();
    let mut second = content_type("mixinC");
    add_property(&mut second, "meta", "seo", 0);
    live.types.save(&mut second).unwrap();

    let page = composing(
        &doc(EntityKind::ContentType, Uuid::new_v4(), "page"),
        &[(first.key, "mixinB"), (second.key, "mixinC")],
    );
    let report = import(&live, &[&page], &SerializerOptions::default());
    let outcome = report.find("page").unwrap();
    assert!(outcome.success);
    let rejected = outcome
        .details
        .iter()
        .find(|change| change.path == "Compositions" && change.kind == ChangeKind::Fail)
        .unwrap();
    assert!(!rejected.success);
    assert_eq!(rejected.name, "mixinC");
    assert!(rejected.new_value.as_deref().unwrap().contains("seo"));

    let stored = live
        .types
        .find_by_alias(EntityKind::ContentType, "page")
        .unwrap()
        .remove(0);
    assert_eq!(stored.compositions.len(), 1);
    assert_eq!(stored.compositions[0].key, first.key);
}

#[test]
fn shared_base_composition_is_not_a_collision() {
    let conn = setup();
    let live = Live::new(&conn);
    let mut base = content_type("baseMixin");
    add_property(&mut base, "meta", "seo", 0);
    live.types.save(&mut base).unwrap();
    let mut left = content_type("leftMixin");
    left.compositions = vec![base.reference()];
    live.types.save(&mut left).unwrap();
    let mut right = content_type("rightMixin");
    right.compositions = vec![base.reference()];
    live.types.save(&mut right).unwrap();

    let page = composing(
        &doc(EntityKind::ContentType, Uuid::new_v4(), "page"),
        &[(left.key, "leftMixin"), (right.key, "rightMixin")],
    );
    let report = import(&live, &[&page], &SerializerOptions::default());
    let outcome = report.find("page").unwrap();
    assert!(outcome.details.iter().all(|change| change.success));

    let stored = live
        .types
        .find_by_alias(EntityKind::ContentType, "page")
        .unwrap()
        .remove(0);
    assert_eq!(stored.compositions.len(), 2);
}

fn allowing(node: &Node, children: &[(Uuid, &str)]) -> Node {
    node.clone().with_child(
        Node::new("Structure").with_children(
            children
                .iter()
                .map(|(key, alias)| Node::leaf("ContentType", alias).with_attr("Key", key)),
        ),
    )
}

#[test]
fn structure_resolves_by_key_then_alias() {
    let conn = setup();
    let live = Live::new(&conn);
    let mut article = content_type("article");
    live.types.save(&mut article).unwrap();
    let mut gallery = content_type("gallery");
    live.types.save(&mut gallery).unwrap();

    let section = allowing(
        &doc(EntityKind::ContentType, Uuid::new_v4(), "section"),
        &[(article.key, "renamedArticle"), (Uuid::new_v4(), "gallery")],
    );
    let report = import(&live, &[&section], &SerializerOptions::default());
    let outcome = report.find("section").unwrap();
    assert!(outcome.details.iter().all(|change| change.success));

    let stored = live
        .types
        .find_by_alias(EntityKind::ContentType, "section")
        .unwrap()
        .remove(0);
    assert_eq!(stored.allowed_children, vec![article.reference(), gallery.reference()]);
}

#[test]
fn unresolved_structure_entry_is_reported() {
    let conn = setup();
    let live = Live::new(&conn);
    let section = allowing(
        &doc(EntityKind::ContentType, Uuid::new_v4(), "section"),
        &[(Uuid::new_v4(), "missingChild")],
    );

    let report = import(&live, &[&section], &SerializerOptions::default());
    let outcome = report.find("section").unwrap();
    assert!(outcome.success);
    let reported = outcome
        .details
        .iter()
        .find(|change| change.path == "Structure")
        .unwrap();
    assert_eq!(reported.kind, ChangeKind::Fail);
    assert!(!reported.success);
    assert_eq!(reported.name, "missingChild");

    let stored = live
        .types
        .find_by_alias(EntityKind::ContentType, "section")
        .unwrap()
        .remove(0);
    assert!(stored.allowed_children.is_empty());
}

#[test]
fn renamed_tab_merges_into_existing_alias() {
    let conn = setup();
    let live = Live::new(&conn);
    let ctx = live.ctx();
    let serializer = ContentTypeSerializer::default();
    let options = SerializerOptions::default();

    let mut item = content_type("landing");
    let title_key = add_property(&mut item, "content", "title", 0);
    let teaser_key = add_property(&mut item, "main", "teaser", 1);
    live.types.save(&mut item).unwrap();
    let content_key = item.group("content").unwrap().key;
    let main_key = item.group("main").unwrap().key;

    let renamed = doc(EntityKind::ContentType, item.key, "landing")
        .with_child(
            Node::new("GenericProperties")
                .with_child(property_node(title_key, "title", "main", 0))
                .with_child(property_node(teaser_key, "teaser", "main", 1)),
        )
        .with_child(Node::new("Tabs").with_child(tab_node(content_key, "main", 0)));

    let first = serializer.deserialize(&renamed, &ctx, &options);
    let second = serializer.deserialize_second_pass(first.item.unwrap(), &renamed, &ctx, &options);
    assert!(second.success);
    let merged = second
        .details
        .iter()
        .find(|change| change.path == "Tabs")
        .unwrap();
    assert_eq!(merged.kind, ChangeKind::Delete);
    assert_eq!(merged.name, "main");

    let stored = live
        .types
        .find_by_key(EntityKind::ContentType, item.key)
        .unwrap()
        .unwrap();
    assert_eq!(stored.groups.len(), 1);
    assert_eq!(stored.groups[0].key, content_key);
    assert_ne!(stored.groups[0].key, main_key);
    assert!(stored
        .properties
        .iter()
        .all(|property| property.group.as_deref() == Some("main")));
}

#[test]
fn force_saves_unchanged_entity() {
    let conn = setup();
    let live = Live::new(&conn);
    let ctx = live.ctx();
    let serializer = ContentTypeSerializer::default();

    let mut item = content_type("article");
    add_property(&mut item, "content", "title", 0);
    live.types.save(&mut item).unwrap();
    let node = serializer.serialize(&item, &ctx).unwrap();

    let plain = SerializerOptions::default();
    let first = serializer.deserialize(&node, &ctx, &plain);
    let second = serializer.deserialize_second_pass(first.item.unwrap(), &node, &ctx, &plain);
    assert!(!second.saved);

    let forced = SerializerOptions {
        force: true,
        ..SerializerOptions::default()
    };
    let first = serializer.deserialize(&node, &ctx, &forced);
    assert_eq!(first.change, ChangeKind::NoChange);
    let second = serializer.deserialize_second_pass(first.item.unwrap(), &node, &ctx, &forced);
    assert!(second.success);
    assert_eq!(second.change, ChangeKind::NoChange);
    assert!(second.saved);

    let report = import(&live, &[&node], &forced);
    assert!(report.outcomes[0].saved);
    assert_eq!(report.outcomes[0].change, ChangeKind::NoChange);
}
