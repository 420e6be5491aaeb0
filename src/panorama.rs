// panorama.rs - 视角状态与拖拽/缩放控制器

use glam::DVec3;
use serde::Deserialize;

use crate::camera::PerspectiveCamera;

/// 全景图贴附的球半径
pub const SPHERE_RADIUS: f32 = 500.0;

pub const CAMERA_NEAR: f32 = 1.0;
pub const CAMERA_FAR: f32 = 1100.0;

/// 交互参数。默认值对应经典的 three.js 等距柱状全景示例
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    /// 每像素拖拽对应的角度
    pub drag_sensitivity: f64,
    /// 每单位滚轮增量对应的 fov 变化 (度)
    pub wheel_zoom_speed: f64,
    /// 空闲时每帧增加的经度
    pub idle_drift: f64,
    pub lat_limit: f64,
    pub min_fov: f64,
    pub max_fov: f64,
    pub initial_fov: f64,
    pub look_radius: f64,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            drag_sensitivity: 0.1,
            wheel_zoom_speed: 0.05,
            idle_drift: 0.1,
            lat_limit: 85.0,
            min_fov: 10.0,
            max_fov: 75.0,
            initial_fov: 75.0,
            look_radius: SPHERE_RADIUS as f64,
        }
    }
}

impl ControlSettings {
    /// 检查参数是否可用：全部有限，min_fov <= max_fov，lat_limit >= 0
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("drag_sensitivity", self.drag_sensitivity),
            ("wheel_zoom_speed", self.wheel_zoom_speed),
            ("idle_drift", self.idle_drift),
            ("lat_limit", self.lat_limit),
            ("min_fov", self.min_fov),
            ("max_fov", self.max_fov),
            ("initial_fov", self.initial_fov),
            ("look_radius", self.look_radius),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(format!("{name} must be finite, got {value}"));
        }

        if self.min_fov > self.max_fov {
            return Err(format!(
                "min_fov ({}) is greater than max_fov ({})",
                self.min_fov, self.max_fov
            ));
        }
        if self.lat_limit < 0.0 {
            return Err(format!("lat_limit must not be negative, got {}", self.lat_limit));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionMode {
    Idle,
    Dragging,
}

/// 指针与滚轮处理会修改的全部状态，角度单位为度
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub is_dragging: bool,
    pub drag_origin: (f64, f64),
    pub drag_origin_angles: (f64, f64),
    /// 不做回绕
    pub lon: f64,
    pub lat: f64,
    pub fov: f64,
}

impl ViewState {
    pub fn new(fov: f64) -> Self {
        Self {
            is_dragging: false,
            drag_origin: (0.0, 0.0),
            drag_origin_angles: (0.0, 0.0),
            lon: 0.0,
            lat: 0.0,
            fov,
        }
    }
}

/// 每帧"用相机渲染场景"的那一半
pub trait SceneRenderer {
    type Error;

    fn render(&mut self, camera: &PerspectiveCamera) -> Result<(), Self::Error>;
}

pub struct OrientationController {
    settings: ControlSettings,
    state: ViewState,
    camera: PerspectiveCamera,
}

impl OrientationController {
    pub fn new(settings: ControlSettings, aspect: f32) -> Self {
        let state = ViewState::new(settings.initial_fov);
        let camera = PerspectiveCamera::new(state.fov as f32, aspect, CAMERA_NEAR, CAMERA_FAR);
        Self {
            settings,
            state,
            camera,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn settings(&self) -> &ControlSettings {
        &self.settings
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn mode(&self) -> InteractionMode {
        if self.state.is_dragging {
            InteractionMode::Dragging
        } else {
            InteractionMode::Idle
        }
    }

    pub fn on_pointer_down(&mut self, x: f64, y: f64) {
        self.state.is_dragging = true;
        self.state.drag_origin = (x, y);
        self.state.drag_origin_angles = (self.state.lon, self.state.lat);
    }

    pub fn on_pointer_move(&mut self, x: f64, y: f64) {
        if !self.state.is_dragging {
            return;
        }

        let (origin_x, origin_y) = self.state.drag_origin;
        let (origin_lon, origin_lat) = self.state.drag_origin_angles;
        let k = self.settings.drag_sensitivity;

        // 水平方向反向，垂直方向不反向
        self.state.lon = (origin_x - x) * k + origin_lon;
        self.state.lat = (y - origin_y) * k + origin_lat;
    }

    pub fn on_pointer_up(&mut self) {
        self.state.is_dragging = false;
    }

    pub fn on_wheel(&mut self, delta_y: f64) {
        let fov = self.state.fov + delta_y * self.settings.wheel_zoom_speed;
        self.state.fov = fov.clamp(self.settings.min_fov, self.settings.max_fov);
    }

    /// 忽略零尺寸 (例如窗口最小化)
    pub fn on_resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.camera.set_aspect(width as f32 / height as f32);
    }

    pub fn reset(&mut self) {
        self.state = ViewState::new(self.settings.initial_fov);
    }

    /// 每帧状态更新：空闲漂移与纬度钳制，返回注视点
    pub fn advance(&mut self) -> DVec3 {
        if !self.state.is_dragging {
            self.state.lon += self.settings.idle_drift;
        }

        let limit = self.settings.lat_limit;
        self.state.lat = self.state.lat.clamp(-limit, limit);

        self.look_target()
    }

    /// 当前视线方向在球面上的点
    pub fn look_target(&self) -> DVec3 {
        let phi = (90.0 - self.state.lat).to_radians();
        let theta = self.state.lon.to_radians();
        let r = self.settings.look_radius;

        DVec3::new(
            r * phi.sin() * theta.cos(),
            r * phi.cos(),
            r * phi.sin() * theta.sin(),
        )
    }

    /// 一帧动画。即使渲染失败，状态也已更新
    pub fn tick<R: SceneRenderer>(&mut self, renderer: &mut R) -> Result<DVec3, R::Error> {
        let target = self.advance();

        self.camera.set_fov(self.state.fov as f32);
        self.camera.look_at(target.as_vec3());

        renderer.render(&self.camera)?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[derive(Default)]
    struct RecordingRenderer {
        frames: Vec<(f32, glam::Vec3)>,
        fail: bool,
    }

    impl SceneRenderer for RecordingRenderer {
        type Error = &'static str;

        fn render(&mut self, camera: &PerspectiveCamera) -> Result<(), Self::Error> {
            if self.fail {
                return Err("surface lost");
            }
            self.frames.push((camera.fov, camera.target));
            Ok(())
        }
    }

    fn controller() -> OrientationController {
        OrientationController::new(ControlSettings::default(), 16.0 / 9.0)
    }

    #[test]
    fn test_initial_state() {
        let c = controller();
        assert_eq!(c.state().lon, 0.0);
        assert_eq!(c.state().lat, 0.0);
        assert_eq!(c.state().fov, 75.0);
        assert_eq!(c.mode(), InteractionMode::Idle);
    }

    #[test]
    fn test_drag_maps_pixels_to_degrees() {
        let mut c = controller();
        c.on_pointer_down(100.0, 100.0);
        assert_eq!(c.mode(), InteractionMode::Dragging);

        c.on_pointer_move(90.0, 100.0);
        assert!((c.state().lon - 1.0).abs() < EPS);
        assert!(c.state().lat.abs() < EPS);

        c.on_pointer_move(90.0, 130.0);
        assert!((c.state().lat - 3.0).abs() < EPS);
    }

    #[test]
    fn test_drag_is_relative_to_angles_at_pointer_down() {
        let mut c = controller();
        c.on_pointer_down(0.0, 0.0);
        c.on_pointer_move(-200.0, 0.0);
        c.on_pointer_up();
        assert!((c.state().lon - 20.0).abs() < EPS);

        c.on_pointer_down(50.0, 50.0);
        assert_eq!(c.state().drag_origin_angles, (c.state().lon, c.state().lat));
        c.on_pointer_move(40.0, 50.0);
        assert!((c.state().lon - 21.0).abs() < EPS);
    }

    #[test]
    fn test_move_without_drag_is_noop() {
        let mut c = controller();
        let before = *c.state();
        c.on_pointer_move(500.0, 500.0);
        assert_eq!(*c.state(), before);

        c.on_pointer_down(0.0, 0.0);
        c.on_pointer_up();
        assert_eq!(c.mode(), InteractionMode::Idle);
        c.on_pointer_move(500.0, 500.0);
        assert_eq!(c.state().lon, 0.0);
    }

    #[test]
    fn test_wheel_zoom_and_clamp() {
        let mut c = controller();
        c.on_wheel(-100.0);
        assert!((c.state().fov - 70.0).abs() < EPS);

        c.on_wheel(-10_000.0);
        assert_eq!(c.state().fov, 10.0);

        c.on_wheel(10_000.0);
        assert_eq!(c.state().fov, 75.0);
    }

    #[test]
    fn test_fov_stays_in_range() {
        let mut c = controller();
        for delta in [-3000.0, 17.5, 250.0, -1.0, -999.0, 4.2, 1e6, -1e6] {
            c.on_wheel(delta);
            let fov = c.state().fov;
            assert!((10.0..=75.0).contains(&fov), "fov {fov} out of range");
        }
    }

    #[test]
    fn test_lat_clamped_on_tick() {
        let mut c = controller();
        c.on_pointer_down(0.0, 0.0);
        c.on_pointer_move(0.0, 5000.0);
        assert!(c.state().lat > 85.0);
        c.advance();
        assert_eq!(c.state().lat, 85.0);

        c.on_pointer_move(0.0, -5000.0);
        c.advance();
        assert_eq!(c.state().lat, -85.0);
    }

    #[test]
    fn test_idle_drift_accumulates() {
        let mut c = controller();
        for _ in 0..360 {
            c.advance();
        }
        assert!((c.state().lon - 36.0).abs() < 1e-6);
    }

    #[test]
    fn test_no_drift_while_dragging() {
        let mut c = controller();
        c.on_pointer_down(10.0, 10.0);
        for _ in 0..10 {
            c.advance();
        }
        assert_eq!(c.state().lon, 0.0);

        c.on_pointer_up();
        c.advance();
        assert!((c.state().lon - 0.1).abs() < EPS);
    }

    #[test]
    fn test_look_target_at_origin_angles() {
        let c = controller();
        let t = c.look_target();
        assert!((t.x - 500.0).abs() < EPS);
        assert!(t.y.abs() < EPS);
        assert!(t.z.abs() < EPS);
    }

    #[test]
    fn test_look_target_quarter_turn_and_up() {
        let mut c = controller();
        c.on_pointer_down(0.0, 0.0);
        // lon = 90
        c.on_pointer_move(-900.0, 0.0);
        let t = c.look_target();
        assert!(t.x.abs() < 1e-6);
        assert!((t.z - 500.0).abs() < 1e-6);

        // lat = 60, 上方
        c.on_pointer_move(-900.0, 600.0);
        let t = c.look_target();
        assert!((t.y - 500.0 * 60.0f64.to_radians().sin()).abs() < 1e-6);
        assert!((t.length() - 500.0).abs() < 1e-6);
    }

    #[test]
    fn test_tick_applies_camera_and_renders() {
        let mut c = controller();
        c.on_wheel(-100.0);
        let mut renderer = RecordingRenderer::default();

        let target = c.tick(&mut renderer).unwrap();

        assert_eq!(renderer.frames.len(), 1);
        let (fov, camera_target) = renderer.frames[0];
        assert!((fov - 70.0).abs() < 1e-4);
        assert!((camera_target - target.as_vec3()).length() < 1e-4);
        assert!((c.state().lon - 0.1).abs() < EPS);
    }

    #[test]
    fn test_tick_propagates_render_error_after_update() {
        let mut c = controller();
        let mut renderer = RecordingRenderer {
            fail: true,
            ..Default::default()
        };

        assert_eq!(c.tick(&mut renderer), Err("surface lost"));
        assert!((c.state().lon - 0.1).abs() < EPS);
    }

    #[test]
    fn test_resize_sets_exact_aspect() {
        let mut c = controller();
        c.on_resize(1024, 768);
        assert_eq!(c.camera().aspect, 1024.0 / 768.0);

        c.on_resize(0, 768);
        assert_eq!(c.camera().aspect, 1024.0 / 768.0);
    }

    #[test]
    fn test_reset() {
        let mut c = controller();
        c.on_pointer_down(0.0, 0.0);
        c.on_pointer_move(30.0, 40.0);
        c.on_wheel(-200.0);

        c.reset();
        assert_eq!(*c.state(), ViewState::new(75.0));
        assert_eq!(c.mode(), InteractionMode::Idle);
    }

    #[test]
    fn test_settings_from_partial_json() {
        let s: ControlSettings = serde_json::from_str(r#"{ "idle_drift": 0.0, "max_fov": 90 }"#).unwrap();
        assert_eq!(s.idle_drift, 0.0);
        assert_eq!(s.max_fov, 90.0);
        assert_eq!(s.drag_sensitivity, 0.1);
    }

    #[test]
    fn test_validate_settings() {
        assert!(ControlSettings::default().validate().is_ok());

        let nan_fov = ControlSettings {
            min_fov: f64::NAN,
            ..Default::default()
        };
        assert!(nan_fov.validate().unwrap_err().contains("min_fov"));

        let infinite_drift = ControlSettings {
            idle_drift: f64::INFINITY,
            ..Default::default()
        };
        assert!(infinite_drift.validate().unwrap_err().contains("idle_drift"));

        let inverted = ControlSettings {
            min_fov: 80.0,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());

        let negative_lat = ControlSettings {
            lat_limit: -10.0,
            ..Default::default()
        };
        assert!(negative_lat.validate().is_err());
    }
}
