//! DOM-style overlay for UI entities.
//!
//! The overlay is the presentation path for entities that hold both a
//! [`Transform`] and a [`Ui`] component. It is not a world system: the frame
//! driver maps the entity sequence after each update and publishes the
//! resulting nodes to whatever layer reconciles them (a web view, a test, or
//! [`OverlayNode::to_html`] for markup).
//!
//! Node count and order always equal the count and order of qualifying
//! entities.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use moa_ecs::component::{Transform, Ui};
use moa_ecs::entity::{Entity, EntityId};

/// Classes appended to every node after the entity's own.
pub const OVERLAY_CLASSES: &str = "absolute transition-transform";

/// One absolutely positioned overlay element.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayNode {
    /// Identity passed to the activation hook.
    pub entity: EntityId,
    pub tag: String,
    pub class_name: String,
    /// Inline style. Positional properties first, then the entity's own
    /// style, which wins on conflicts.
    pub style: BTreeMap<String, String>,
    pub content: String,
}

impl OverlayNode {
    fn new(id: &EntityId, t: &Transform, ui: &Ui) -> Self {
        let mut style = BTreeMap::new();
        let mut set = |k: &str, v: String| {
            style.insert(k.to_owned(), v);
        };
        set("position", "absolute".to_owned());
        set("left", format!("{}px", t.x));
        set("top", format!("{}px", t.y));
        set("width", format!("{}px", t.width));
        set("height", format!("{}px", t.height));
        set(
            "transform",
            format!("translate(-50%, -50%) rotate({}rad)", t.angle),
        );
        for (k, v) in &ui.style {
            style.insert(k.clone(), v.clone());
        }

        let own = ui.class_name();
        let class_name = if own.is_empty() {
            OVERLAY_CLASSES.to_owned()
        } else {
            format!("{own} {OVERLAY_CLASSES}")
        };

        Self {
            entity: id.clone(),
            tag: ui.tag.clone(),
            class_name,
            style,
            content: ui.content.clone(),
        }
    }

    /// `style` attribute text, e.g. `left: 10px; top: 20px`.
    pub fn style_text(&self) -> String {
        self.style
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Markup for hosts that embed the overlay as HTML. Content is text, not
    /// markup, and is escaped.
    pub fn to_html(&self) -> String {
        let tag = if !self.tag.is_empty() && self.tag.chars().all(|c| c.is_ascii_alphanumeric()) {
            self.tag.as_str()
        } else {
            "div"
        };
        let mut out = String::new();
        let _ = write!(
            out,
            r#"<{tag} data-entity="{}" class="{}" style="{}">{}</{tag}>"#,
            escape(self.entity.as_str()),
            escape(&self.class_name),
            escape(&self.style_text()),
            escape(&self.content),
        );
        out
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// One node per entity holding both `Transform` and `Ui`, in sequence order.
pub fn map_overlay(entities: &[Entity]) -> Vec<OverlayNode> {
    entities
        .iter()
        .filter_map(|e| {
            let t = e.get::<Transform>()?;
            let ui = e.get::<Ui>()?;
            Some(OverlayNode::new(e.id(), t, ui))
        })
        .collect()
}

/// Markup for a whole overlay layer.
pub fn overlay_html(nodes: &[OverlayNode]) -> String {
    let mut out = String::from(r#"<div id="ui-layer">"#);
    for node in nodes {
        out.push_str(&node.to_html());
    }
    out.push_str("</div>");
    out
}
