mod batch;
mod cli;
mod picking;
mod projection;
mod shaders;
mod viewer;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pollster::FutureExt;
use wgpu::SurfaceError;
use winit::{
    dpi::PhysicalSize,
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    window::WindowBuilder,
};

use acmap_core::load_map;

use cli::Args;
use viewer::ViewerState;

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let map = load_map(&args.map)?;
    println!(
        "Loaded {} antigens and {} sera; total stress {:.4}",
        map.antigen_count(),
        map.serum_count(),
        map.total_stress()
    );

    if let Some(path) = &args.dump_render {
        let pixels = viewer::render_offscreen(
            &map,
            args.width,
            args.height,
            args.global_scale,
            args.max_point_size,
        )?;
        viewer::export_rgba_to_png(path, args.width, args.height, &pixels)?;
        println!("Wrote render dump to {}", path.display());
    }

    if args.headless {
        if args.dump_render.is_none() {
            println!("Headless mode requested; viewer window bootstrap skipped.");
        }
        return Ok(());
    }

    let event_loop = EventLoop::new().context("creating winit event loop")?;
    let title = args
        .map
        .file_stem()
        .map(|stem| format!("Antigenic Map Viewer - {}", stem.to_string_lossy()))
        .unwrap_or_else(|| "Antigenic Map Viewer".to_string());
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(args.width.max(1), args.height.max(1)))
            .build(&event_loop)
            .context("creating viewer window")?,
    );

    let mut state =
        ViewerState::new(window, map, args.global_scale, args.max_point_size).block_on()?;

    event_loop
        .run(move |event, target| {
            target.set_control_flow(ControlFlow::Poll);

            match event {
                Event::WindowEvent { window_id, event } if window_id == state.window().id() => {
                    match event {
                        WindowEvent::CloseRequested => target.exit(),
                        WindowEvent::KeyboardInput { event, .. } => {
                            if state.handle_key(&event) {
                                target.exit();
                            }
                        }
                        WindowEvent::ModifiersChanged(modifiers) => {
                            state.handle_modifiers(modifiers)
                        }
                        WindowEvent::CursorMoved { position, .. } => {
                            state.handle_cursor_moved(position)
                        }
                        WindowEvent::MouseInput { state: pressed, button, .. } => {
                            state.handle_mouse_input(pressed, button)
                        }
                        WindowEvent::Resized(new_size) => state.resize(new_size),
                        WindowEvent::RedrawRequested => match state.render() {
                            Ok(_) => {}
                            Err(SurfaceError::Lost) => state.resize(state.size()),
                            Err(SurfaceError::OutOfMemory) => target.exit(),
                            Err(err) => eprintln!("[acmap_viewer] render error: {err:?}"),
                        },
                        _ => {}
                    }
                }
                Event::AboutToWait => state.window().request_redraw(),
                _ => {}
            }
        })
        .context("running viewer application")?;
    Ok(())
}
