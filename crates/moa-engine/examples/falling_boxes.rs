//! Windowed demo: boxes fall onto a floor; drag them with the mouse, press
//! space to kick them upward. A UI label counts the kicks.
//!
//! Run with:
//!   cargo run --example falling_boxes --features renderer -p moa-engine
//!
//! Broadcast snapshots are printed to stdout as JSON lines.

use moa_engine::prelude::*;
use moa_engine::render::run_windowed;

const COLORS: [&str; 4] = ["#ef4444", "#3b82f6", "#10b981", "#eab308"];

fn scene(ctx: &mut PopulateContext<'_>) -> anyhow::Result<()> {
    let (w, h) = (ctx.canvas_width, ctx.canvas_height);

    let walls = [
        ("floor", w / 2.0, h - 10.0, w, 20.0),
        ("wall-left", 10.0, h / 2.0, 20.0, h),
        ("wall-right", w - 10.0, h / 2.0, 20.0, h),
    ];
    for (id, x, y, bw, bh) in walls {
        let body = ctx
            .physics
            .add_body(&BodyDesc::rectangle(x, y, bw, bh).fixed());
        ctx.world.add_entity(
            Entity::new(id)
                .with(Transform::new(x, y, bw, bh))
                .with(Visual::rect("#52525b"))
                .with(body),
        );
    }

    for i in 0..12 {
        let size = 30.0 + (i % 3) as f64 * 10.0;
        let x = 120.0 + (i % 6) as f64 * ((w - 240.0) / 5.0);
        let y = 60.0 + (i / 6) as f64 * 70.0;
        let angle = 0.2 * i as f64;
        let body = ctx.physics.add_body(
            &BodyDesc::rectangle(x, y, size, size)
                .with_angle(angle)
                .with_restitution(0.3),
        );
        ctx.world.add_entity(
            Entity::new(format!("box-{i}"))
                .with(Transform::new(x, y, size, size).with_angle(angle))
                .with(Visual::rect(COLORS[i % COLORS.len()]))
                .with(Interactable::draggable())
                .with(body),
        );
    }

    let ball = ctx
        .physics
        .add_body(&BodyDesc::circle(w / 2.0, 40.0, 20.0).with_restitution(0.8));
    ctx.world.add_entity(
        Entity::new("ball")
            .with(Transform::new(w / 2.0, 40.0, 40.0, 40.0))
            .with(Visual::circle("#f97316"))
            .with(Interactable::draggable())
            .with(ball),
    );

    ctx.world.add_entity(
        Entity::new("title")
            .with(Transform::new(w / 2.0, 30.0, 300.0, 20.0))
            .with(Visual::text("DRAG BOXES - SPACE TO KICK", 14.0, "#e4e4e7")),
    );
    ctx.world.add_entity(
        Entity::new("score")
            .with(Transform::new(w - 90.0, 30.0, 140.0, 28.0))
            .with(Ui::new("div").with_classes("text-white").with_content("Kicks: 0"))
            // The window has no DOM layer, so the label is painted too.
            .with(Visual::text("KICKS: 0", 16.0, "#ffffff"))
            .with(State::new("playing").with_data("kicks", 0)),
    );

    ctx.input.on_key_down(|ctx, event| {
        if event.key != " " || event.repeat {
            return;
        }
        let bodies: Vec<_> = ctx
            .world
            .entities()
            .iter()
            .filter_map(|e| e.get::<Physics>())
            .filter(|p| !p.is_static)
            .map(|p| p.body)
            .collect();
        for body in bodies {
            ctx.physics.set_velocity(body, 0.0, -600.0);
        }

        let Some(score) = ctx.world.entity_mut("score") else {
            return;
        };
        let kicks = score
            .get::<State>()
            .and_then(|s| s.data.get("kicks"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0)
            + 1;
        if let Some(state) = score.get_mut::<State>() {
            state.data.insert("kicks".to_owned(), kicks.into());
        }
        if let Some(ui) = score.get_mut::<Ui>() {
            ui.content = format!("Kicks: {kicks}");
        }
        if let Some(visual) = score.get_mut::<Visual>() {
            visual.text = format!("KICKS: {kicks}");
        }
    });
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let channel = JsonLinesChannel::new(std::io::stdout());
    run_windowed(
        Box::new(program_fn(scene)),
        RuntimeConfig::default(),
        Box::new(channel),
        "MOA -- falling boxes",
    )
}
