// main.rs - 窗口、事件翻译与帧循环

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // 在 Release 模式下隐藏控制台窗口

use std::path::Path;
use std::time::Instant;

use winit::{
    dpi::LogicalSize,
    event::*,
    event_loop::{ControlFlow, EventLoop},
    window::{Fullscreen, WindowBuilder},
};

use sphere_panorama::config::ViewerConfig;
use sphere_panorama::error::ViewerError;
use sphere_panorama::host::{wheel_event, InputEvent, PointerTranslator, Session};
use sphere_panorama::loader::ImageLoader;
use sphere_panorama::panorama::OrientationController;
use sphere_panorama::renderer::Renderer;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run() {
        log::error!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), ViewerError> {
    let config = ViewerConfig::resolve()?;

    let event_loop = EventLoop::new();
    let window = WindowBuilder::new()
        .with_title(window_title(&config.image))
        .with_inner_size(LogicalSize::new(config.window_width, config.window_height))
        .build(&event_loop)?;

    let mut renderer = Some(pollster::block_on(Renderer::new(&window, config.vsync))?);

    let size = window.inner_size();
    let aspect = size.width.max(1) as f32 / size.height.max(1) as f32;
    let mut session = Session::new(OrientationController::new(config.controls, aspect));

    let mut loader = ImageLoader::new();
    loader.request(config.image.clone());

    let mut pointer = PointerTranslator::new();

    event_loop.run(move |event, _, control_flow| {
        *control_flow = if session.is_running() {
            ControlFlow::Poll
        } else {
            ControlFlow::Exit
        };

        // 检查是否有新加载的图片
        if let Some(result) = loader.poll() {
            match result {
                Ok(loaded) => {
                    if let Some(r) = renderer.as_mut() {
                        r.load_panorama(loaded.image);
                        window.set_title(&window_title(&loaded.path));
                    }
                }
                Err(err) => log::error!("{err}"),
            }
        }

        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => {
                    shutdown(&mut session, &mut renderer, control_flow);
                }

                WindowEvent::Resized(new_size) => {
                    if let Some(r) = renderer.as_mut() {
                        r.resize(new_size);
                    }
                    session.dispatch(InputEvent::Resize {
                        width: new_size.width,
                        height: new_size.height,
                    });
                }

                WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                    if let Some(r) = renderer.as_mut() {
                        r.resize(*new_inner_size);
                    }
                    session.dispatch(InputEvent::Resize {
                        width: new_inner_size.width,
                        height: new_inner_size.height,
                    });
                }

                // 键盘快捷键
                WindowEvent::KeyboardInput { input, .. }
                    if input.state == ElementState::Pressed && session.is_running() =>
                {
                    match input.virtual_keycode {
                        Some(VirtualKeyCode::O) => {
                            if let Some(path) = rfd::FileDialog::new()
                                .add_filter("Images", &["jpg", "jpeg", "png", "bmp"])
                                .pick_file()
                            {
                                loader.request(path);
                            }
                        }
                        Some(VirtualKeyCode::F11) => {
                            if window.fullscreen().is_some() {
                                window.set_fullscreen(None);
                            } else {
                                window.set_fullscreen(Some(Fullscreen::Borderless(None)));
                            }
                        }
                        Some(VirtualKeyCode::R) => session.controller_mut().reset(),
                        Some(VirtualKeyCode::Escape) => {
                            shutdown(&mut session, &mut renderer, control_flow);
                        }
                        _ => {}
                    }
                }

                // 鼠标/触摸交互
                WindowEvent::MouseInput {
                    state,
                    button: MouseButton::Left,
                    ..
                } => {
                    session.dispatch(pointer.mouse_button(state));
                }

                WindowEvent::CursorMoved { position, .. } => {
                    session.dispatch(pointer.cursor_moved(position, window.scale_factor()));
                }

                WindowEvent::Touch(touch) => {
                    if let Some(event) =
                        pointer.touch(touch.id, touch.phase, touch.location, window.scale_factor())
                    {
                        session.dispatch(event);
                    }
                }

                WindowEvent::MouseWheel { delta, .. } => {
                    session.dispatch(wheel_event(delta));
                }

                WindowEvent::DroppedFile(path) => {
                    if session.is_running() {
                        loader.request(path);
                    }
                }

                _ => {}
            },

            Event::RedrawRequested(_) => {
                let Some(r) = renderer.as_mut() else {
                    return;
                };
                match session.frame(r, Instant::now()) {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost) => r.resize(r.size),
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("GPU out of memory, shutting down");
                        shutdown(&mut session, &mut renderer, control_flow);
                    }
                    Err(e) => log::error!("render error: {e:?}"),
                }
            }

            Event::MainEventsCleared => {
                if session.is_running() {
                    window.request_redraw();
                }
            }

            Event::LoopDestroyed => {
                shutdown(&mut session, &mut renderer, control_flow);
            }

            _ => {}
        }
    })
}

/// 关闭顺序：监听与帧循环 (Session::shutdown 内部)，然后释放 GPU 资源，最后退出事件循环。
fn shutdown(session: &mut Session, renderer: &mut Option<Renderer>, control_flow: &mut ControlFlow) {
    session.shutdown();
    if renderer.take().is_some() {
        log::debug!("GPU resources released");
    }
    *control_flow = ControlFlow::Exit;
}

fn window_title(image: &Path) -> String {
    match image.file_name() {
        Some(name) => format!("Panorama Viewer - {}", name.to_string_lossy()),
        None => "Panorama Viewer".to_string(),
    }
}
