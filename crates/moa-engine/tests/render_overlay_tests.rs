//! Canvas painting and overlay mapping over mixed entity sequences.

use moa_engine::overlay::overlay_html;
use moa_engine::prelude::*;
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn scene() -> Vec<Entity> {
    vec![
        Entity::new("bg")
            .with(Transform::new(400.0, 300.0, 800.0, 600.0))
            .with(Visual::rect("#222")),
        Entity::new("ball")
            .with(Transform::new(100.0, 50.0, 30.0, 30.0))
            .with(Visual::circle("rgb(255, 0, 0)")),
        Entity::new("title")
            .with(Transform::new(400.0, 40.0, 200.0, 40.0).with_angle(0.1))
            .with(Visual::text("MOA", 24.0, "white")),
        Entity::new("hud")
            .with(Transform::new(700.0, 20.0, 100.0, 24.0))
            .with(Ui::new("span").with_classes("text-white").with_content("Lives: 3")),
        Entity::new("sprite")
            .with(Transform::new(10.0, 10.0, 16.0, 16.0))
            .with(Visual::new(Shape::Sprite, "blue")),
        Entity::new("no-transform").with(Visual::rect("green")),
    ]
}

// ---------------------------------------------------------------------------
// Render
// ---------------------------------------------------------------------------

#[test]
fn paints_in_sequence_order() {
    let mut render = RenderSystem::new(RecordingCanvas::new(800.0, 600.0));
    let visited = render.paint(&scene());
    assert_eq!(visited, 4, "entities with Transform and Visual");

    let ops = render.canvas().ops();
    assert_eq!(ops.len(), 3, "sprites paint nothing");
    assert!(matches!(&ops[0], DrawOp::Rect { width, .. } if *width == 800.0));
    assert!(matches!(&ops[1], DrawOp::Circle { radius, .. } if *radius == 15.0));
    match &ops[2] {
        DrawOp::Text { text, center, angle, font, color } => {
            assert_eq!(text, "MOA");
            assert_eq!(*center, (400.0, 40.0));
            assert!((angle - 0.1).abs() < 1e-12);
            assert_eq!(font.size_px, 24.0);
            assert_eq!(color, "white");
        }
        other => panic!("expected text, got {other:?}"),
    }
    assert_eq!(render.canvas().save_depth(), 0);
}

#[test]
fn each_paint_replaces_the_previous_frame() {
    let mut render = RenderSystem::new(RecordingCanvas::new(800.0, 600.0));
    render.paint(&scene());
    render.paint(&scene()[..1]);
    assert_eq!(render.canvas().ops().len(), 1);
    assert_eq!(render.canvas().clear_count(), 2);
}

#[test]
fn unparseable_colors_still_paint() {
    let entities = vec![Entity::new("odd")
        .with(Transform::new(5.0, 5.0, 10.0, 10.0))
        .with(Visual::rect("not-a-color"))];
    let mut render = RenderSystem::new(RecordingCanvas::new(100.0, 100.0));
    render.paint(&entities);
    assert_eq!(render.canvas().ops()[0].color(), "not-a-color");
    assert_eq!(Rgba::parse_or_fallback("not-a-color"), moa_engine::render::color::FALLBACK);
}

// ---------------------------------------------------------------------------
// Overlay
// ---------------------------------------------------------------------------

#[test]
fn overlay_only_maps_ui_entities_with_transform() {
    let mut entities = scene();
    entities.push(Entity::new("floating-ui").with(Ui::new("div")));
    let nodes = map_overlay(&entities);
    assert_eq!(nodes.len(), 1);

    let hud = &nodes[0];
    assert_eq!(hud.entity, "hud");
    assert_eq!(hud.tag, "span");
    assert_eq!(hud.class_name, "text-white absolute transition-transform");
    assert_eq!(hud.content, "Lives: 3");
    assert_eq!(hud.style["left"], "700px");
    assert_eq!(hud.style["top"], "20px");
    assert_eq!(hud.style["width"], "100px");
    assert_eq!(hud.style["height"], "24px");
    assert!(hud.style["transform"].contains("rotate(0rad)"));
}

#[test]
fn ui_style_overrides_positional_style() {
    let entities = vec![Entity::new("panel")
        .with(Transform::new(10.0, 10.0, 50.0, 50.0))
        .with(Ui::new("div").with_style("width", "auto").with_style("color", "red"))];
    let nodes = map_overlay(&entities);
    assert_eq!(nodes[0].style["width"], "auto");
    assert_eq!(nodes[0].style["color"], "red");
    assert_eq!(nodes[0].style["left"], "10px");
}

#[test]
fn overlay_html_escapes_content() {
    let entities = vec![Entity::new("x")
        .with(Transform::new(0.0, 0.0, 1.0, 1.0))
        .with(Ui::new("p").with_content("<b>&</b>"))];
    let html = overlay_html(&map_overlay(&entities));
    assert!(html.starts_with("<div id=\"ui-layer\""));
    assert!(html.contains("&lt;b&gt;&amp;&lt;/b&gt;"));
    assert!(!html.contains("<b>"));
}

// ---------------------------------------------------------------------------
// Property tests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Makeup {
    transform: bool,
    visual: Option<Shape>,
    ui: bool,
}

fn arb_makeup() -> impl Strategy<Value = Makeup> {
    let shape = prop_oneof![
        Just(Shape::Rect),
        Just(Shape::Circle),
        Just(Shape::Text),
        Just(Shape::Sprite),
    ];
    (any::<bool>(), proptest::option::of(shape), any::<bool>()).prop_map(
        |(transform, visual, ui)| Makeup {
            transform,
            visual,
            ui,
        },
    )
}

fn build(makeups: &[Makeup]) -> Vec<Entity> {
    makeups
        .iter()
        .enumerate()
        .map(|(i, makeup)| {
            let mut e = Entity::new(format!("e{i}"));
            if makeup.transform {
                e.insert(Transform::new(i as f64, i as f64, 10.0, 10.0));
            }
            if let Some(shape) = makeup.visual {
                let mut visual = Visual::new(shape, "#123456");
                visual.text = "hi".to_owned();
                e.insert(visual);
            }
            if makeup.ui {
                e.insert(Ui::new("div"));
            }
            e
        })
        .collect()
}

proptest! {
    #[test]
    fn render_and_overlay_cardinality(makeups in proptest::collection::vec(arb_makeup(), 0..24)) {
        let entities = build(&makeups);

        let mut render = RenderSystem::new(RecordingCanvas::new(800.0, 600.0));
        let visited = render.paint(&entities);
        let expected_visits = makeups.iter().filter(|s| s.transform && s.visual.is_some()).count();
        let expected_ops = makeups
            .iter()
            .filter(|s| s.transform && matches!(s.visual, Some(shape) if shape != Shape::Sprite))
            .count();
        prop_assert_eq!(visited, expected_visits);
        prop_assert_eq!(render.canvas().ops().len(), expected_ops);
        prop_assert_eq!(render.canvas().save_depth(), 0);

        let nodes = map_overlay(&entities);
        let expected_ids: Vec<String> = makeups
            .iter()
            .enumerate()
            .filter(|(_, s)| s.transform && s.ui)
            .map(|(i, _)| format!("e{i}"))
            .collect();
        let ids: Vec<String> = nodes.iter().map(|n| n.entity.to_string()).collect();
        prop_assert_eq!(ids, expected_ids);
    }

    #[test]
    fn painted_centers_follow_transforms(angle in -6.3f64..6.3, x in 0.0f64..800.0, y in 0.0f64..600.0) {
        let entities = vec![Entity::new("r")
            .with(Transform::new(x, y, 10.0, 10.0).with_angle(angle))
            .with(Visual::rect("red"))];
        let mut render = RenderSystem::new(RecordingCanvas::new(800.0, 600.0));
        render.paint(&entities);
        let (cx, cy) = render.canvas().ops()[0].center();
        prop_assert!((cx - x).abs() < 1e-9);
        prop_assert!((cy - y).abs() < 1e-9);
    }
}
