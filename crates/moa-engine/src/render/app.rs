//! Windowed front end.
//!
//! [`run_windowed`] mounts a program on a [`GpuCanvas`] inside a winit event
//! loop. Each `RedrawRequested` runs one frame and presents it. Keyboard
//! presses go to the key-down hook, the left mouse button drives the drag
//! constraint, and closing the window tears the session down.
//!
//! This module is feature-gated behind `renderer`.

use std::sync::Arc;

use moa_ecs::broadcast::HostChannel;
use tracing::{debug, error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey, PhysicalKey};
use winit::window::{WindowAttributes, WindowId};

use super::gpu::GpuCanvas;
use crate::config::RuntimeConfig;
use crate::frame::{FrameDriver, Program};
use crate::input::KeyEvent;
use crate::RuntimeError;

/// Mount `program` in a window and block until the window is closed.
///
/// The window's inner size is the configured canvas size.
///
/// # Errors
///
/// Returns an error if the event loop, window or GPU canvas cannot be
/// created, or if population fails.
pub fn run_windowed(
    program: Box<dyn Program>,
    config: RuntimeConfig,
    channel: Box<dyn HostChannel>,
    title: &str,
) -> Result<(), anyhow::Error> {
    config.validate()?;
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App {
        state: AppState::Pending {
            program,
            config,
            channel,
            title: title.to_owned(),
        },
        failure: None,
    };

    event_loop.run_app(&mut app)?;

    match app.failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Windows can only be created once the loop is resumed, so the session is
/// mounted lazily.
enum AppState {
    Pending {
        program: Box<dyn Program>,
        config: RuntimeConfig,
        channel: Box<dyn HostChannel>,
        title: String,
    },
    Running {
        driver: FrameDriver<GpuCanvas>,
        cursor: (f64, f64),
    },
    /// Placeholder while moving between states, and after close.
    Transitioning,
}

struct App {
    state: AppState,
    failure: Option<anyhow::Error>,
}

impl App {
    fn fail(&mut self, event_loop: &ActiveEventLoop, e: anyhow::Error) {
        let details = format!("{e:#}");
        error!(error = %details, "windowed session failed to start");
        self.failure = Some(e);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let state = std::mem::replace(&mut self.state, AppState::Transitioning);
        let (program, config, channel, title) = match state {
            AppState::Pending {
                program,
                config,
                channel,
                title,
            } => (program, config, channel, title),
            other => {
                self.state = other;
                return;
            }
        };

        let attrs = WindowAttributes::default()
            .with_title(title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                config.canvas.width.round() as u32,
                config.canvas.height.round() as u32,
            ));
        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, e.into()),
        };
        let canvas = match pollster::block_on(GpuCanvas::new(window.clone())) {
            Ok(canvas) => canvas,
            Err(e) => return self.fail(event_loop, e),
        };
        match FrameDriver::mount_boxed(program, config, canvas, channel) {
            Ok(driver) => {
                info!(
                    width = window.inner_size().width,
                    height = window.inner_size().height,
                    "window session started"
                );
                window.request_redraw();
                self.state = AppState::Running {
                    driver,
                    cursor: (0.0, 0.0),
                };
            }
            Err(e) => self.fail(event_loop, e.into()),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let WindowEvent::CloseRequested = event {
            if let AppState::Running { driver, .. } =
                std::mem::replace(&mut self.state, AppState::Transitioning)
            {
                let report = driver.teardown();
                info!(frames = report.frames, steps = ?report.steps, "window closed");
            }
            event_loop.exit();
            return;
        }

        let AppState::Running { driver, cursor } = &mut self.state else {
            return;
        };

        match event {
            WindowEvent::Resized(size) => {
                debug!(width = size.width, height = size.height, "window resized");
                driver.canvas_mut().resize(size);
            }
            WindowEvent::RedrawRequested => match driver.frame() {
                Ok(_) => {
                    present(driver, event_loop);
                    driver.canvas().window().request_redraw();
                }
                Err(RuntimeError::Halted(reason)) => {
                    // The canvas keeps the last good frame.
                    warn!(%reason, "session halted; redraws stopped");
                }
                Err(e) => {
                    debug!(error = %e, "no frame scheduled");
                }
            },
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                let key = match &event.logical_key {
                    Key::Character(s) => s.to_string(),
                    Key::Named(NamedKey::Space) => String::from(" "),
                    Key::Named(named) => format!("{named:?}"),
                    other => format!("{other:?}"),
                };
                let code = match event.physical_key {
                    PhysicalKey::Code(code) => format!("{code:?}"),
                    PhysicalKey::Unidentified(_) => String::from("Unidentified"),
                };
                let mut key_event = KeyEvent::new(key, code);
                key_event.repeat = event.repeat;
                driver.key_down(&key_event);
            }
            WindowEvent::CursorMoved { position, .. } => {
                *cursor = (position.x, position.y);
                driver.pointer_move(position.x, position.y);
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => {
                    driver.pointer_down(cursor.0, cursor.1);
                }
                ElementState::Released => driver.pointer_up(),
            },
            _ => {}
        }
    }
}

fn present(driver: &mut FrameDriver<GpuCanvas>, event_loop: &ActiveEventLoop) {
    let canvas = driver.canvas_mut();
    match canvas.present() {
        Ok(()) => {}
        Err(wgpu::SurfaceError::Lost) => {
            let size = canvas.window().inner_size();
            canvas.resize(size);
        }
        Err(wgpu::SurfaceError::OutOfMemory) => {
            error!("GPU out of memory; exiting");
            event_loop.exit();
        }
        Err(e) => warn!(error = %e, "surface error during present"),
    }
}
