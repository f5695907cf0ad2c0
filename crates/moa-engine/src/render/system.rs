//! The render pass: entities with a `Visual` onto a canvas.

use moa_ecs::component::{Shape, Transform, Visual};
use moa_ecs::entity::Entity;
use moa_ecs::world::System;
use moa_ecs::EcsError;
use tracing::trace;

use super::canvas::{Canvas, Font};

/// Paints `Transform` + `Visual` entities onto a [`Canvas`].
///
/// Each pass clears the canvas once, then paints qualifying entities in
/// sequence order, so later entities draw over earlier ones. Every entity is
/// painted inside its own save/restore pair, centered on its transform
/// position and rotated by its angle:
///
/// | Shape | Painted as |
/// |-------|------------|
/// | `rect` | a `width` x `height` rectangle centered on the origin |
/// | `circle` | a circle of radius `width / 2` (`height` is ignored) |
/// | `text` | the text centered on the origin, `fontSize`px monospace |
/// | `sprite` | nothing |
///
/// Entities missing either component are skipped. Painting never changes
/// entity state.
pub struct RenderSystem<C> {
    canvas: C,
}

impl<C: Canvas> RenderSystem<C> {
    pub fn new(canvas: C) -> Self {
        Self { canvas }
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut C {
        &mut self.canvas
    }

    pub fn into_canvas(self) -> C {
        self.canvas
    }

    /// One render pass. Returns how many entities were visited for painting.
    pub fn paint(&mut self, entities: &[Entity]) -> usize {
        self.canvas.clear();

        let mut painted = 0;
        for entity in entities {
            let (Some(transform), Some(visual)) = (entity.get::<Transform>(), entity.get::<Visual>())
            else {
                continue;
            };
            self.paint_one(transform, visual);
            painted += 1;
        }
        trace!(painted, "render pass complete");
        painted
    }

    fn paint_one(&mut self, t: &Transform, visual: &Visual) {
        let canvas = &mut self.canvas;
        canvas.save();
        canvas.translate(t.x, t.y);
        canvas.rotate(t.angle);
        canvas.set_fill_style(&visual.color);

        match visual.shape {
            Shape::Rect => canvas.fill_rect(-t.width / 2.0, -t.height / 2.0, t.width, t.height),
            Shape::Circle => canvas.fill_circle(0.0, 0.0, t.width / 2.0),
            Shape::Text => canvas.fill_text(&visual.text, 0.0, 0.0, &Font::monospace(visual.font_size)),
            Shape::Sprite => {}
        }

        canvas.restore();
    }
}

/// The render pass can also run as an ordinary world system, for hosts that
/// want painting inside `World::update`.
impl<C: Canvas> System for RenderSystem<C> {
    fn name(&self) -> &str {
        "render"
    }

    fn update(&mut self, entities: &mut Vec<Entity>, _dt: f64) -> Result<(), EcsError> {
        self.paint(entities);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::canvas::{DrawOp, RecordingCanvas};
    use moa_ecs::component::Ui;

    fn render() -> RenderSystem<RecordingCanvas> {
        RenderSystem::new(RecordingCanvas::new(800.0, 600.0))
    }

    #[test]
    fn red_rect_is_centered_on_transform() {
        let mut r = render();
        let entities = vec![Entity::new("a")
            .with(Transform::new(10.0, 10.0, 20.0, 20.0))
            .with(Visual::rect("red"))];

        assert_eq!(r.paint(&entities), 1);
        assert_eq!(
            r.canvas().ops(),
            &[DrawOp::Rect {
                center: (10.0, 10.0),
                width: 20.0,
                height: 20.0,
                angle: 0.0,
                color: "red".to_owned(),
            }]
        );
        // The rectangle spans (0,0)-(20,20).
        assert_eq!(r.canvas().save_depth(), 0);
    }

    #[test]
    fn circle_uses_half_width_as_radius() {
        let mut r = render();
        let entities = vec![Entity::new("c")
            .with(Transform::new(50.0, 60.0, 30.0, 999.0))
            .with(Visual::circle("#00f"))];
        r.paint(&entities);
        assert_eq!(
            r.canvas().ops(),
            &[DrawOp::Circle {
                center: (50.0, 60.0),
                radius: 15.0,
                color: "#00f".to_owned(),
            }]
        );
    }

    #[test]
    fn text_is_centered_monospace() {
        let mut r = render();
        let entities = vec![Entity::new("t")
            .with(Transform::new(100.0, 40.0, 0.0, 0.0).with_angle(0.5))
            .with(Visual::text("Score: 3", 24.0, "white"))];
        r.paint(&entities);
        match &r.canvas().ops()[0] {
            DrawOp::Text {
                text,
                center,
                angle,
                font,
                ..
            } => {
                assert_eq!(text, "Score: 3");
                assert_eq!(*center, (100.0, 40.0));
                assert!((angle - 0.5).abs() < 1e-12);
                assert_eq!(font.css(), "24px monospace");
            }
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn sprite_and_partial_entities_paint_nothing() {
        let mut r = render();
        let entities = vec![
            Entity::new("sprite")
                .with(Transform::default())
                .with(Visual::new(Shape::Sprite, "#fff")),
            Entity::new("no-visual").with(Transform::default()).with(Ui::new("div")),
            Entity::new("no-transform").with(Visual::rect("#fff")),
        ];
        assert_eq!(r.paint(&entities), 1);
        assert!(r.canvas().ops().is_empty());
    }

    #[test]
    fn later_entities_paint_over_earlier_ones() {
        let mut r = render();
        let entities = vec![
            Entity::new("below").with(Transform::default()).with(Visual::rect("#000")),
            Entity::new("above").with(Transform::default()).with(Visual::rect("#fff")),
        ];
        r.paint(&entities);
        let colors: Vec<&str> = r.canvas().ops().iter().map(DrawOp::color).collect();
        assert_eq!(colors, vec!["#000", "#fff"]);
    }

    #[test]
    fn each_pass_clears_once_and_does_not_mutate() {
        let mut r = render();
        let mut entities = vec![Entity::new("a").with(Transform::default()).with(Visual::rect("#000"))];
        let before = entities.clone();

        r.update(&mut entities, 1.0 / 60.0).unwrap();
        r.update(&mut entities, 1.0 / 60.0).unwrap();
        assert_eq!(r.canvas().clear_count(), 2);
        assert_eq!(r.canvas().ops().len(), 1);
        assert_eq!(entities, before);
    }
}
