//! Headless host: runs a small physics scene without a window and prints
//! every throttled broadcast to stdout as one JSON line.
//!
//! Run with:
//!   cargo run --example headless_host -p moa-engine [-- path/to/config.json]
//!
//! Logs go to stderr; set `RUST_LOG=moa_engine=debug` for frame detail.

use moa_engine::prelude::*;

const FRAMES: u64 = 300;

fn scene() -> impl Program {
    program_fn(|ctx| {
        let (w, h) = (ctx.canvas_width, ctx.canvas_height);

        let floor = ctx
            .physics
            .add_body(&BodyDesc::rectangle(w / 2.0, h - 10.0, w, 20.0).fixed());
        ctx.world.add_entity(
            Entity::new("floor")
                .with(Transform::new(w / 2.0, h - 10.0, w, 20.0))
                .with(Visual::rect("#3f3f46"))
                .with(floor),
        );

        for i in 0..3 {
            let x = w / 4.0 * (i + 1) as f64;
            let ball = ctx
                .physics
                .add_body(&BodyDesc::circle(x, 50.0 + 40.0 * i as f64, 15.0).with_restitution(0.6));
            ctx.world.add_entity(
                Entity::new(format!("ball-{i}"))
                    .with(Transform::new(x, 50.0, 30.0, 30.0))
                    .with(Visual::circle("#f59e0b"))
                    .with(ball),
            );
        }

        ctx.world.add_entity(
            Entity::new("bounces")
                .with(Transform::new(w / 2.0, 24.0, 160.0, 32.0))
                .with(Ui::new("div").with_classes("text-white font-bold"))
                .with(State::new("counting").with_data("frames", 0)),
        );
        ctx.world.add_system_fn("hud", |entities, _dt| {
            let Some(hud) = entities.iter_mut().find(|e| e.id() == "bounces") else {
                return;
            };
            let frames = hud
                .get::<State>()
                .and_then(|s| s.data.get("frames"))
                .and_then(|v| v.as_u64())
                .unwrap_or(0)
                + 1;
            if let Some(state) = hud.get_mut::<State>() {
                state.data.insert("frames".to_owned(), frames.into());
            }
            if let Some(ui) = hud.get_mut::<Ui>() {
                ui.content = format!("Frame {frames}");
            }
        });
        Ok(())
    })
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => RuntimeConfig::from_path(path)?,
        None => RuntimeConfig::default(),
    };
    let (width, height) = (config.canvas.width, config.canvas.height);

    let channel = JsonLinesChannel::new(std::io::stdout());
    let mut driver = FrameDriver::mount(scene(), config, RecordingCanvas::new(width, height), channel)?;
    driver.run_frames(FRAMES)?;

    let report = driver.teardown();
    tracing::info!(frames = report.frames, steps = ?report.steps, "session finished");
    Ok(())
}
