//! Content type fields: list view, variations and templates.
//!
//! # Invariants
//! - Element types never receive a default template; a `DefaultTemplate` in
//!   an element document is ignored without a change record, and a template
//!   already stored on the entity is left in place (it is not serialized).
//! - Templates resolve by key first, then alias; unresolved ones are
//!   dropped with an invalid change.

use super::base::{KindFields, TypeSerializer};
use super::tracker::Tracker;
use super::SyncContext;
use crate::document::{DocumentRef, Node, PropertySection, TypeDocument};
use crate::model::change::Change;
use crate::model::entity::{ContentType, EntityKind, EntityRef};
use crate::model::property::PropertyType;
use crate::model::template::Template;
use crate::repo::template_repo::TemplateStore;
use crate::repo::type_repo::StoreResult;

pub type ContentTypeSerializer = TypeSerializer<ContentTypeFields>;

#[derive(Debug, Default, Clone, Copy)]
pub struct ContentTypeFields;

impl KindFields for ContentTypeFields {
    fn kind(&self) -> EntityKind {
        EntityKind::ContentType
    }

    fn info_flags(&self, item: &ContentType) -> Vec<Node> {
        vec![
            Node::leaf("IsListView", item.is_container),
            Node::leaf("Variations", item.variations),
        ]
    }

    fn info_references(&self, item: &ContentType, ctx: &SyncContext<'_>) -> StoreResult<Vec<Node>> {
        let mut nodes = Vec::new();
        if !item.is_element {
            if let Some(default) = &item.default_template {
                let current = current_template(ctx.templates, default)?;
                nodes.push(Node::leaf("DefaultTemplate", current.alias).with_attr("Key", current.key));
            }
        }

        let mut allowed = Vec::with_capacity(item.allowed_templates.len());
        for template in &item.allowed_templates {
            allowed.push(current_template(ctx.templates, template)?);
        }
        allowed.sort_by(|a, b| (&a.alias, a.key).cmp(&(&b.alias, b.key)));
        nodes.push(Node::new("AllowedTemplates").with_children(
            allowed
                .into_iter()
                .map(|template| Node::leaf("Template", template.alias).with_attr("Key", template.key)),
        ));
        Ok(nodes)
    }

    fn property_flags(&self, property: &PropertyType) -> Vec<Node> {
        vec![Node::leaf("Variations", property.variations)]
    }

    fn apply_info_flags(&self, item: &mut ContentType, doc: &TypeDocument, tracker: &mut Tracker) {
        tracker.set(
            &mut item.is_container,
            doc.info.is_list_view,
            "Info/IsListView",
            "IsListView",
        );
        tracker.set(
            &mut item.variations,
            doc.info.variations,
            "Info/Variations",
            "Variations",
        );
    }

    fn apply_info_references(
        &self,
        item: &mut ContentType,
        doc: &TypeDocument,
        ctx: &SyncContext<'_>,
        tracker: &mut Tracker,
    ) -> StoreResult<()> {
        apply_default_template(item, doc, ctx.templates, tracker)?;
        apply_allowed_templates(item, doc, ctx.templates, tracker)
    }

    fn apply_property_flags(
        &self,
        property: &mut PropertyType,
        section: &PropertySection,
        tracker: &mut Tracker,
    ) {
        tracker.set(
            &mut property.variations,
            section.variations,
            "Property/Variations",
            &section.alias,
        );
    }
}

fn render(template: &Option<EntityRef>) -> String {
    template
        .as_ref()
        .map(|template| template.alias.clone())
        .unwrap_or_default()
}

fn apply_default_template(
    item: &mut ContentType,
    doc: &TypeDocument,
    templates: &dyn TemplateStore,
    tracker: &mut Tracker,
) -> StoreResult<()> {
    if item.is_element {
        // the stored template comes back if the element flag is cleared later
        return Ok(());
    }

    let Some(reference) = &doc.info.default_template else {
        tracker.set_with(
            &mut item.default_template,
            None,
            "Info/DefaultTemplate",
            "DefaultTemplate",
            render,
        );
        return Ok(());
    };

    // default templates are written by alias, so alias wins over key
    let found = match templates.template_by_alias(&reference.alias)? {
        Some(template) => Some(template),
        None => match reference.key {
            Some(key) => templates.template_by_key(key)?,
            None => None,
        },
    };
    match found {
        Some(template) => {
            tracker.set_with(
                &mut item.default_template,
                Some(template.reference()),
                "Info/DefaultTemplate",
                "DefaultTemplate",
                render,
            );
        }
        None => tracker.report(Change::update(
            "Info/DefaultTemplate",
            "DefaultTemplate",
            render(&item.default_template),
            format!("Cannot find Template {}", reference.alias),
        )),
    }
    Ok(())
}

fn apply_allowed_templates(
    item: &mut ContentType,
    doc: &TypeDocument,
    templates: &dyn TemplateStore,
    tracker: &mut Tracker,
) -> StoreResult<()> {
    let Some(references) = &doc.info.allowed_templates else {
        return Ok(());
    };

    let mut resolved: Vec<EntityRef> = Vec::new();
    for reference in references {
        match find_template(templates, reference)? {
            Some(template) => {
                if !resolved.iter().any(|existing| existing.key == template.key) {
                    resolved.push(template.reference());
                }
            }
            None => tracker.report(Change::fail(
                "Info/AllowedTemplates",
                &reference.alias,
                "Cannot find Template",
            )),
        }
    }

    let joined = |templates: &Vec<EntityRef>| {
        let mut aliases = templates
            .iter()
            .map(|template| template.alias.as_str())
            .collect::<Vec<_>>();
        aliases.sort_unstable();
        aliases.join(",")
    };
    let same_keys = {
        let mut old = item.allowed_templates.iter().map(|t| t.key).collect::<Vec<_>>();
        let mut new = resolved.iter().map(|t| t.key).collect::<Vec<_>>();
        old.sort();
        new.sort();
        old == new
    };
    if same_keys && joined(&item.allowed_templates) == joined(&resolved) {
        return Ok(());
    }

    tracker.record(Change::update(
        "Info/AllowedTemplates",
        "AllowedTemplates",
        joined(&item.allowed_templates),
        joined(&resolved),
    ));
    item.allowed_templates = resolved;
    Ok(())
}

fn find_template(templates: &dyn TemplateStore, reference: &DocumentRef) -> StoreResult<Option<Template>> {
    if let Some(key) = reference.key {
        if let Some(template) = templates.template_by_key(key)? {
            return Ok(Some(template));
        }
    }
    if reference.alias.is_empty() {
        return Ok(None);
    }
    templates.template_by_alias(&reference.alias)
}

/// Refreshes a stored template reference from live state.
fn current_template(templates: &dyn TemplateStore, reference: &EntityRef) -> StoreResult<EntityRef> {
    Ok(templates
        .template_by_key(reference.key)?
        .map(|template| template.reference())
        .unwrap_or_else(|| reference.clone()))
}
