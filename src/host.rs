// host.rs - 输入翻译与路由、帧循环注册与关闭流程
//
// 控制器本身不调度自己：宿主 (main.rs 的 winit 循环) 每帧调用 Session::frame，
// 并把平台事件经 PointerTranslator / wheel_event 翻译成 InputEvent 交给 Session::dispatch。

use std::time::Instant;

use glam::DVec3;
use winit::dpi::{LogicalPosition, PhysicalPosition};
use winit::event::{ElementState, MouseScrollDelta, TouchPhase};

use crate::panorama::{OrientationController, SceneRenderer};

/// 滚轮一格换算成的像素 (与浏览器 wheel 事件的 deltaY 量级一致)
pub const WHEEL_PIXELS_PER_LINE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerSource {
    Mouse,
    Touch,
}

/// 与平台无关的输入事件，坐标为逻辑像素。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerDown { source: PointerSource, x: f64, y: f64 },
    PointerMove { source: PointerSource, x: f64, y: f64 },
    PointerUp { source: PointerSource },
    /// 浏览器约定：向下滚为正 (拉远)
    Wheel { delta_y: f64 },
    Resize { width: u32, height: u32 },
}

/// Session 持有的输入注册。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listener {
    Mouse,
    Touch,
    Wheel,
    Resize,
}

impl InputEvent {
    pub fn listener(&self) -> Listener {
        match self {
            InputEvent::PointerDown { source, .. }
            | InputEvent::PointerMove { source, .. }
            | InputEvent::PointerUp { source } => match source {
                PointerSource::Mouse => Listener::Mouse,
                PointerSource::Touch => Listener::Touch,
            },
            InputEvent::Wheel { .. } => Listener::Wheel,
            InputEvent::Resize { .. } => Listener::Resize,
        }
    }
}

/// winit 向上滚为正，转换成浏览器约定的像素 deltaY。
pub fn wheel_event(delta: MouseScrollDelta) -> InputEvent {
    let delta_y = match delta {
        MouseScrollDelta::LineDelta(_, y) => -(y as f64) * WHEEL_PIXELS_PER_LINE,
        MouseScrollDelta::PixelDelta(pos) => -pos.y,
    };
    InputEvent::Wheel { delta_y }
}

/// 物理像素 -> 逻辑像素 (对应浏览器的 CSS 像素)
pub fn to_logical(position: PhysicalPosition<f64>, scale_factor: f64) -> (f64, f64) {
    let p: LogicalPosition<f64> = position.to_logical(scale_factor);
    (p.x, p.y)
}

/// 鼠标/触摸 -> 指针事件。
///
/// MouseInput 不带坐标，按下时用最近一次的光标位置。
/// 触摸只跟随开始拖拽的那根手指，其余手指的事件全部忽略。
#[derive(Debug, Default)]
pub struct PointerTranslator {
    cursor: (f64, f64),
    active_touch: Option<u64>,
}

impl PointerTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor_moved(&mut self, position: PhysicalPosition<f64>, scale_factor: f64) -> InputEvent {
        self.cursor = to_logical(position, scale_factor);
        InputEvent::PointerMove {
            source: PointerSource::Mouse,
            x: self.cursor.0,
            y: self.cursor.1,
        }
    }

    pub fn mouse_button(&self, state: ElementState) -> InputEvent {
        let source = PointerSource::Mouse;
        match state {
            ElementState::Pressed => InputEvent::PointerDown {
                source,
                x: self.cursor.0,
                y: self.cursor.1,
            },
            ElementState::Released => InputEvent::PointerUp { source },
        }
    }

    pub fn touch(
        &mut self,
        id: u64,
        phase: TouchPhase,
        location: PhysicalPosition<f64>,
        scale_factor: f64,
    ) -> Option<InputEvent> {
        let source = PointerSource::Touch;
        let (x, y) = to_logical(location, scale_factor);

        match phase {
            TouchPhase::Started => {
                if self.active_touch.is_some() {
                    return None;
                }
                self.active_touch = Some(id);
                Some(InputEvent::PointerDown { source, x, y })
            }
            TouchPhase::Moved if self.active_touch == Some(id) => {
                Some(InputEvent::PointerMove { source, x, y })
            }
            TouchPhase::Ended | TouchPhase::Cancelled if self.active_touch == Some(id) => {
                self.active_touch = None;
                Some(InputEvent::PointerUp { source })
            }
            _ => None,
        }
    }
}

/// 帧回调注册，附带每秒一次的 FPS 统计。
#[derive(Debug)]
pub struct FrameLoop {
    active: bool,
    frames: u64,
    window_start: Option<Instant>,
    window_frames: u32,
    fps: f32,
}

impl FrameLoop {
    fn new() -> Self {
        Self {
            active: true,
            frames: 0,
            window_start: None,
            window_frames: 0,
            fps: 0.0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    fn cancel(&mut self) {
        self.active = false;
    }

    fn record(&mut self, now: Instant) {
        self.frames += 1;

        // 开启统计窗口的那一帧不计入
        let Some(start) = self.window_start else {
            self.window_start = Some(now);
            return;
        };

        self.window_frames += 1;
        let elapsed = now.duration_since(start).as_secs_f32();
        if elapsed >= 1.0 {
            self.fps = self.window_frames as f32 / elapsed;
            self.window_frames = 0;
            self.window_start = Some(now);
            log::debug!("fps {:.1}", self.fps);
        }
    }
}

pub struct Session {
    controller: OrientationController,
    listeners: Vec<Listener>,
    frame_loop: FrameLoop,
}

impl Session {
    /// 注册全部输入监听并启动帧循环。
    pub fn new(controller: OrientationController) -> Self {
        Self {
            controller,
            listeners: vec![
                Listener::Mouse,
                Listener::Touch,
                Listener::Wheel,
                Listener::Resize,
            ],
            frame_loop: FrameLoop::new(),
        }
    }

    pub fn controller(&self) -> &OrientationController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut OrientationController {
        &mut self.controller
    }

    pub fn frame_loop(&self) -> &FrameLoop {
        &self.frame_loop
    }

    pub fn is_listening(&self, listener: Listener) -> bool {
        self.listeners.contains(&listener)
    }

    /// 宿主是否还应继续请求新帧
    pub fn is_running(&self) -> bool {
        self.frame_loop.is_active()
    }

    /// 对应的监听已注销时返回 false。
    pub fn dispatch(&mut self, event: InputEvent) -> bool {
        if !self.is_listening(event.listener()) {
            return false;
        }

        let c = &mut self.controller;
        match event {
            InputEvent::PointerDown { x, y, .. } => c.on_pointer_down(x, y),
            InputEvent::PointerMove { x, y, .. } => c.on_pointer_move(x, y),
            InputEvent::PointerUp { .. } => c.on_pointer_up(),
            InputEvent::Wheel { delta_y } => c.on_wheel(delta_y),
            InputEvent::Resize { width, height } => c.on_resize(width, height),
        }
        true
    }

    /// 帧循环仍注册时执行一次控制器 tick。
    pub fn frame<R: SceneRenderer>(
        &mut self,
        renderer: &mut R,
        now: Instant,
    ) -> Result<Option<DVec3>, R::Error> {
        if !self.frame_loop.is_active() {
            return Ok(None);
        }

        self.frame_loop.record(now);
        self.controller.tick(renderer).map(Some)
    }

    /// 注销单个监听，返回是否真的移除了
    fn detach(&mut self, listener: Listener) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| *l != listener);
        self.listeners.len() < before
    }

    /// 先注销输入监听，再注销 resize，最后取消帧循环。重复调用无副作用。
    pub fn shutdown(&mut self) {
        if !self.frame_loop.is_active() && self.listeners.is_empty() {
            return;
        }

        for listener in [
            Listener::Mouse,
            Listener::Touch,
            Listener::Wheel,
            Listener::Resize,
        ] {
            if self.detach(listener) {
                log::debug!("detached {listener:?} listener");
            }
        }

        self.frame_loop.cancel();
        log::info!(
            "viewer session stopped after {} frames (last {:.1} fps)",
            self.frame_loop.frames(),
            self.frame_loop.fps()
        );
    }
}
