//! Component kinds and their plain-data payloads.
//!
//! The component set is closed: every kind the runtime understands is a
//! variant of [`ComponentKind`], and every payload is a variant of
//! [`Component`]. Systems match on these exhaustively, so adding a kind is a
//! compile error everywhere it is not handled yet.
//!
//! Components carry data only. The one field that refers to something
//! outside the ECS, the physics body of [`Physics`], is a non-owning
//! [`BodyHandle`] into the physics engine's own body table.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ComponentKind
// ---------------------------------------------------------------------------

/// Discriminator for the closed set of component kinds.
///
/// The declaration order is also the order in which an entity's components
/// are listed in broadcast snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentKind {
    Transform,
    Visual,
    #[serde(rename = "UI")]
    Ui,
    Physics,
    State,
    Tile,
    Interactable,
}

impl ComponentKind {
    /// Number of component kinds.
    pub const COUNT: usize = 7;

    /// Every kind, in declaration order.
    pub const ALL: [ComponentKind; Self::COUNT] = [
        ComponentKind::Transform,
        ComponentKind::Visual,
        ComponentKind::Ui,
        ComponentKind::Physics,
        ComponentKind::State,
        ComponentKind::Tile,
        ComponentKind::Interactable,
    ];

    /// Slot index of this kind inside an entity.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Wire name of this kind (the `name` discriminator in snapshots).
    pub const fn name(self) -> &'static str {
        match self {
            ComponentKind::Transform => "Transform",
            ComponentKind::Visual => "Visual",
            ComponentKind::Ui => "UI",
            ComponentKind::Physics => "Physics",
            ComponentKind::State => "State",
            ComponentKind::Tile => "Tile",
            ComponentKind::Interactable => "Interactable",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// Authoritative 2D pose shared by canvas rendering and the overlay.
///
/// `(x, y)` is the center of the entity. `angle` is in radians. When the
/// entity also has [`Physics`], the physics system owns `x`, `y` and `angle`
/// and overwrites them every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub angle: f64,
}

impl Transform {
    /// A transform centered at `(x, y)` with the given size and no rotation.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            angle: 0.0,
        }
    }

    /// Builder: set the rotation in radians.
    pub fn with_angle(mut self, angle: f64) -> Self {
        self.angle = angle;
        self
    }
}

impl Default for Transform {
    /// 50x50 at the origin, unrotated.
    fn default() -> Self {
        Self::new(0.0, 0.0, 50.0, 50.0)
    }
}

// ---------------------------------------------------------------------------
// Visual
// ---------------------------------------------------------------------------

/// What a [`Visual`] paints on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    /// Filled rectangle of the transform's width and height.
    Rect,
    /// Filled circle of radius `width / 2`.
    Circle,
    /// Monospace text centered on the transform.
    Text,
    /// Reserved for image sprites. The canvas renderer paints nothing for it.
    Sprite,
}

/// Canvas appearance of an entity. Only meaningful together with a
/// [`Transform`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visual {
    pub shape: Shape,
    /// CSS color string, e.g. `#ff0000`.
    pub color: String,
    /// Text painted when `shape` is [`Shape::Text`].
    pub text: String,
    /// Font size in pixels for text shapes.
    pub font_size: f64,
}

/// Default fill used by the runtime's templates.
pub const DEFAULT_VISUAL_COLOR: &str = "#10b981";

/// Default font size for text visuals, in pixels.
pub const DEFAULT_FONT_SIZE: f64 = 16.0;

impl Visual {
    pub fn new(shape: Shape, color: impl Into<String>) -> Self {
        Self {
            shape,
            color: color.into(),
            text: String::new(),
            font_size: DEFAULT_FONT_SIZE,
        }
    }

    pub fn rect(color: impl Into<String>) -> Self {
        Self::new(Shape::Rect, color)
    }

    pub fn circle(color: impl Into<String>) -> Self {
        Self::new(Shape::Circle, color)
    }

    pub fn text(text: impl Into<String>, font_size: f64, color: impl Into<String>) -> Self {
        Self {
            shape: Shape::Text,
            color: color.into(),
            text: text.into(),
            font_size,
        }
    }
}

impl Default for Visual {
    fn default() -> Self {
        Self::rect(DEFAULT_VISUAL_COLOR)
    }
}

// ---------------------------------------------------------------------------
// Ui
// ---------------------------------------------------------------------------

/// DOM-overlay appearance of an entity. Only meaningful together with a
/// [`Transform`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ui {
    /// Element tag, e.g. `div` or `button`.
    pub tag: String,
    /// CSS classes, in the order they were added.
    pub classes: Vec<String>,
    /// Text or markup rendered as the element body.
    pub content: String,
    /// Inline style declarations. Merged over the positional style.
    pub style: BTreeMap<String, String>,
}

impl Ui {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            classes: Vec::new(),
            content: String::new(),
            style: BTreeMap::new(),
        }
    }

    /// Builder: add classes from a whitespace-separated class string.
    pub fn with_classes(mut self, class_name: &str) -> Self {
        self.classes
            .extend(class_name.split_whitespace().map(str::to_owned));
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Builder: set one inline style property (CSS property name).
    pub fn with_style(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.style.insert(property.into(), value.into());
        self
    }

    /// The class list joined with single spaces.
    pub fn class_name(&self) -> String {
        self.classes.join(" ")
    }
}

impl Default for Ui {
    fn default() -> Self {
        Self::new("div")
    }
}

// ---------------------------------------------------------------------------
// Physics
// ---------------------------------------------------------------------------

/// Non-owning reference to a body in the physics engine's body table.
///
/// The physics engine is the only owner of body state. A handle can outlive
/// its body; looking it up afterwards simply finds nothing. Handles are never
/// serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle {
    index: u32,
    generation: u32,
}

impl BodyHandle {
    pub const fn from_raw_parts(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub const fn into_raw_parts(self) -> (u32, u32) {
        (self.index, self.generation)
    }
}

impl fmt::Display for BodyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "body#{}v{}", self.index, self.generation)
    }
}

/// Links an entity to a physics body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Physics {
    pub body: BodyHandle,
    pub is_static: bool,
}

impl Physics {
    pub fn new(body: BodyHandle, is_static: bool) -> Self {
        Self { body, is_static }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Generic state-machine / inventory / status payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub state: String,
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl State {
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            data: serde_json::Map::new(),
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new("idle")
    }
}

// ---------------------------------------------------------------------------
// Tile
// ---------------------------------------------------------------------------

/// Grid-world metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub row: i64,
    pub col: i64,
    pub tile_type: String,
}

impl Tile {
    pub fn new(row: i64, col: i64, tile_type: impl Into<String>) -> Self {
        Self {
            row,
            col,
            tile_type: tile_type.into(),
        }
    }
}

impl Default for Tile {
    fn default() -> Self {
        Self::new(0, 0, "floor")
    }
}

// ---------------------------------------------------------------------------
// Interactable
// ---------------------------------------------------------------------------

/// Marks an entity as a target for pointer interaction.
///
/// `handler` is the *name* of a handler registered with the input layer,
/// never a closure, so the component stays plain data.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Interactable {
    pub is_draggable: bool,
    pub handler: Option<String>,
}

impl Interactable {
    pub fn draggable() -> Self {
        Self {
            is_draggable: true,
            handler: None,
        }
    }

    pub fn on_click(handler: impl Into<String>) -> Self {
        Self {
            is_draggable: false,
            handler: Some(handler.into()),
        }
    }

    pub fn with_handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = Some(handler.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// One component instance of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Transform(Transform),
    Visual(Visual),
    Ui(Ui),
    Physics(Physics),
    State(State),
    Tile(Tile),
    Interactable(Interactable),
}

impl Component {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Component::Transform(_) => ComponentKind::Transform,
            Component::Visual(_) => ComponentKind::Visual,
            Component::Ui(_) => ComponentKind::Ui,
            Component::Physics(_) => ComponentKind::Physics,
            Component::State(_) => ComponentKind::State,
            Component::Tile(_) => ComponentKind::Tile,
            Component::Interactable(_) => ComponentKind::Interactable,
        }
    }
}

/// A concrete payload type that maps to exactly one [`ComponentKind`].
///
/// Implemented for every payload struct; it is what lets
/// [`Entity::get`](crate::entity::Entity::get) and friends be typed.
pub trait ComponentPayload: Into<Component> + Sized + 'static {
    const KIND: ComponentKind;

    fn from_component(component: &Component) -> Option<&Self>;

    fn from_component_mut(component: &mut Component) -> Option<&mut Self>;

    fn from_component_owned(component: Component) -> Option<Self>;
}

macro_rules! impl_payload {
    ($ty:ident) => {
        impl From<$ty> for Component {
            fn from(value: $ty) -> Self {
                Component::$ty(value)
            }
        }

        impl ComponentPayload for $ty {
            const KIND: ComponentKind = ComponentKind::$ty;

            fn from_component(component: &Component) -> Option<&Self> {
                match component {
                    Component::$ty(value) => Some(value),
                    _ => None,
                }
            }

            fn from_component_mut(component: &mut Component) -> Option<&mut Self> {
                match component {
                    Component::$ty(value) => Some(value),
                    _ => None,
                }
            }

            fn from_component_owned(component: Component) -> Option<Self> {
                match component {
                    Component::$ty(value) => Some(value),
                    _ => None,
                }
            }
        }
    };
}

impl_payload!(Transform);
impl_payload!(Visual);
impl_payload!(Ui);
impl_payload!(Physics);
impl_payload!(State);
impl_payload!(Tile);
impl_payload!(Interactable);

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
