//! Wire-safe encoding of the entity sequence.
//!
//! [`EntityData`] and [`ComponentData`] are what the host sees. Every
//! component is encoded as its plain fields under a `name` discriminator,
//! except [`Physics`](crate::component::Physics): its body handle is owned by
//! the physics engine and is not transferable, so it is redacted to
//! `{"name": "Physics", "isStatic": ...}`.
//!
//! Field names follow what existing hosts read:
//!
//! | Kind | Wire fields |
//! |------|-------------|
//! | Transform | `x`, `y`, `width`, `height`, `angle` |
//! | Visual | `type`, `color`, `text`, `fontSize` |
//! | UI | `tag`, `className`, `content`, `style` |
//! | Physics | `isStatic` |
//! | State | `state`, `data` |
//! | Tile | `row`, `col`, `type` |
//! | Interactable | `isDraggable`, `onClick` |

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentKind, Shape};
use crate::entity::{Entity, EntityId};

/// One entity as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityData {
    pub id: EntityId,
    pub components: Vec<ComponentData>,
}

/// One component as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum ComponentData {
    Transform {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        angle: f64,
    },
    Visual {
        #[serde(rename = "type")]
        shape: Shape,
        color: String,
        text: String,
        #[serde(rename = "fontSize")]
        font_size: f64,
    },
    #[serde(rename = "UI")]
    Ui {
        tag: String,
        #[serde(rename = "className")]
        class_name: String,
        content: String,
        style: BTreeMap<String, String>,
    },
    /// Redacted physics: the body handle never leaves the runtime.
    Physics {
        #[serde(rename = "isStatic")]
        is_static: bool,
    },
    State {
        state: String,
        data: serde_json::Map<String, serde_json::Value>,
    },
    Tile {
        row: i64,
        col: i64,
        #[serde(rename = "type")]
        tile_type: String,
    },
    Interactable {
        #[serde(rename = "isDraggable")]
        is_draggable: bool,
        #[serde(rename = "onClick")]
        on_click: Option<String>,
    },
}

impl ComponentData {
    pub fn kind(&self) -> ComponentKind {
        match self {
            ComponentData::Transform { .. } => ComponentKind::Transform,
            ComponentData::Visual { .. } => ComponentKind::Visual,
            ComponentData::Ui { .. } => ComponentKind::Ui,
            ComponentData::Physics { .. } => ComponentKind::Physics,
            ComponentData::State { .. } => ComponentKind::State,
            ComponentData::Tile { .. } => ComponentKind::Tile,
            ComponentData::Interactable { .. } => ComponentKind::Interactable,
        }
    }
}

impl From<&Component> for ComponentData {
    fn from(component: &Component) -> Self {
        match component {
            Component::Transform(t) => ComponentData::Transform {
                x: t.x,
                y: t.y,
                width: t.width,
                height: t.height,
                angle: t.angle,
            },
            Component::Visual(v) => ComponentData::Visual {
                shape: v.shape,
                color: v.color.clone(),
                text: v.text.clone(),
                font_size: v.font_size,
            },
            Component::Ui(ui) => ComponentData::Ui {
                tag: ui.tag.clone(),
                class_name: ui.class_name(),
                content: ui.content.clone(),
                style: ui.style.clone(),
            },
            Component::Physics(p) => ComponentData::Physics {
                is_static: p.is_static,
            },
            Component::State(s) => ComponentData::State {
                state: s.state.clone(),
                data: s.data.clone(),
            },
            Component::Tile(t) => ComponentData::Tile {
                row: t.row,
                col: t.col,
                tile_type: t.tile_type.clone(),
            },
            Component::Interactable(i) => ComponentData::Interactable {
                is_draggable: i.is_draggable,
                on_click: i.handler.clone(),
            },
        }
    }
}

impl From<&Entity> for EntityData {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id().clone(),
            components: entity.components().map(ComponentData::from).collect(),
        }
    }
}

/// Encode the whole entity sequence, preserving its order.
pub fn encode_entities(entities: &[Entity]) -> Vec<EntityData> {
    entities.iter().map(EntityData::from).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::component::{
        BodyHandle, Interactable, Physics, State, Tile, Transform, Ui, Visual,
    };

    #[test]
    fn physics_is_redacted_to_is_static() {
        let e = Entity::new("ball").with(Physics::new(BodyHandle::from_raw_parts(9, 3), true));
        let value = serde_json::to_value(EntityData::from(&e)).unwrap();
        assert_eq!(
            value,
            json!({"id": "ball", "components": [{"name": "Physics", "isStatic": true}]})
        );
    }

    #[test]
    fn field_names_match_host_expectations() {
        let e = Entity::new("card")
            .with(Transform::new(1.0, 2.0, 3.0, 4.0).with_angle(0.5))
            .with(Visual::text("hi", 12.0, "#fff"))
            .with(Ui::new("div").with_classes("p-4 shadow").with_content("Task").with_style("color", "red"))
            .with(State::new("todo").with_data("priority", 2))
            .with(Tile::new(3, 4, "wall"))
            .with(Interactable::on_click("select"));

        let value = serde_json::to_value(EntityData::from(&e)).unwrap();
        assert_eq!(
            value["components"],
            json!([
                {"name": "Transform", "x": 1.0, "y": 2.0, "width": 3.0, "height": 4.0, "angle": 0.5},
                {"name": "Visual", "type": "text", "color": "#fff", "text": "hi", "fontSize": 12.0},
                {"name": "UI", "tag": "div", "className": "p-4 shadow", "content": "Task", "style": {"color": "red"}},
                {"name": "State", "state": "todo", "data": {"priority": 2}},
                {"name": "Tile", "row": 3, "col": 4, "type": "wall"},
                {"name": "Interactable", "isDraggable": false, "onClick": "select"},
            ])
        );
    }

    #[test]
    fn encode_preserves_entity_order() {
        let entities = vec![Entity::new("c"), Entity::new("a"), Entity::new("b")];
        let ids: Vec<String> = encode_entities(&entities)
            .into_iter()
            .map(|d| d.id.to_string())
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn wire_form_deserializes_for_hosts() {
        let text = r#"{"id":"p","components":[{"name":"Physics","isStatic":false},{"name":"Tile","row":1,"col":2,"type":"floor"}]}"#;
        let data: EntityData = serde_json::from_str(text).unwrap();
        assert_eq!(data.components[0], ComponentData::Physics { is_static: false });
        assert_eq!(data.components[1].kind(), ComponentKind::Tile);
    }
}
