//! Orbit camera: a camera looking at a target, a perspective projection, the uniform
//! uploaded to the GPU and a damped controller driven by mouse input.

use std::f32::consts::PI;

use cgmath::{InnerSpace, Matrix4, Point3, Rad, Vector3, perspective};
use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

// Keeps the polar angle away from the poles where look_at degenerates.
const POLAR_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
}

impl Camera {
    pub fn new<P: Into<Point3<f32>>, T: Into<Point3<f32>>>(position: P, target: T) -> Self {
        Self {
            position: position.into(),
            target: target.into(),
        }
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, Vector3::unit_y())
    }

    pub fn distance(&self) -> f32 {
        (self.position - self.target).magnitude()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// Pending rotation in spherical coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct SphericalDelta {
    theta: f32,
    phi: f32,
}

/// Orbit controls: left-drag rotates around the target, the wheel zooms.
///
/// With damping enabled every [`update`](Self::update) applies `damping_factor` of the
/// pending rotation and keeps the rest for later frames, so the camera glides to a
/// stop. Zoom is applied in full on the next update.
#[derive(Debug, Clone)]
pub struct CameraController {
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    delta: SphericalDelta,
    scale: f32,
    rotating: bool,
    cursor: Option<PhysicalPosition<f64>>,
    viewport_height: f32,
}

impl CameraController {
    pub fn new(damping_factor: f32, viewport_height: u32) -> Self {
        Self {
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            enable_damping: true,
            damping_factor,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            min_polar_angle: 0.0,
            max_polar_angle: PI,
            delta: SphericalDelta::default(),
            scale: 1.0,
            rotating: false,
            cursor: None,
            viewport_height: viewport_height.max(1) as f32,
        }
    }

    pub fn set_distance_limits(&mut self, min: f32, max: f32) {
        self.min_distance = min;
        self.max_distance = max;
    }

    pub fn resize(&mut self, height: u32) {
        self.viewport_height = height.max(1) as f32;
    }

    /// Queue a rotation for a cursor movement of `dx`/`dy` pixels. Dragging across the
    /// full viewport height turns the camera once around the target.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        let full_turn = 2.0 * PI * self.rotate_speed / self.viewport_height;
        self.delta.theta -= dx * full_turn;
        self.delta.phi -= dy * full_turn;
    }

    /// Queue a zoom. Positive steps move the camera towards the target.
    pub fn zoom(&mut self, steps: f32) {
        let zoom_scale = 0.95f32.powf(self.zoom_speed);
        self.scale *= zoom_scale.powf(steps);
    }

    /// Feed a window event. Returns true when the event was used by the controls.
    pub fn handle_window_events(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.rotating = *state == ElementState::Pressed;
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                let moved = match (self.rotating, self.cursor) {
                    (true, Some(last)) => {
                        self.rotate((position.x - last.x) as f32, (position.y - last.y) as f32);
                        true
                    }
                    _ => false,
                };
                self.cursor = Some(*position);
                moved
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                false
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => (pos.y / 100.0) as f32,
                };
                self.zoom(steps);
                true
            }
            WindowEvent::Resized(size) => {
                self.resize(size.height);
                false
            }
            _ => false,
        }
    }

    /// Apply pending input to `camera`, keeping it on a sphere around its target.
    pub fn update(&mut self, camera: &mut Camera) {
        let offset = camera.position - camera.target;
        let mut radius = offset.magnitude();
        let (mut theta, mut phi) = if radius == 0.0 {
            (0.0, PI / 2.0)
        } else {
            (
                offset.x.atan2(offset.z),
                (offset.y / radius).clamp(-1.0, 1.0).acos(),
            )
        };

        let step = if self.enable_damping {
            self.damping_factor
        } else {
            1.0
        };
        theta += self.delta.theta * step;
        phi += self.delta.phi * step;

        let min_polar = self.min_polar_angle.max(POLAR_EPSILON);
        let max_polar = self.max_polar_angle.min(PI - POLAR_EPSILON);
        phi = phi.clamp(min_polar, max_polar);

        radius = (radius * self.scale).clamp(self.min_distance, self.max_distance);

        let sin_phi_radius = phi.sin() * radius;
        let offset = Vector3::new(
            sin_phi_radius * theta.sin(),
            phi.cos() * radius,
            sin_phi_radius * theta.cos(),
        );
        camera.position = camera.target + offset;

        if self.enable_damping {
            self.delta.theta *= 1.0 - self.damping_factor;
            self.delta.phi *= 1.0 - self.damping_factor;
        } else {
            self.delta = SphericalDelta::default();
        }
        self.scale = 1.0;
    }
}

/// Everything the render pass needs to bind the camera.
#[derive(Debug)]
pub struct CameraResources {
    pub camera: Camera,
    pub controller: CameraController,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl CameraResources {
    pub fn new(
        device: &wgpu::Device,
        camera: Camera,
        controller: CameraController,
        projection: &Projection,
        bind_group_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        use wgpu::util::DeviceExt;

        let mut uniform = CameraUniform::new();
        uniform.update_view_proj(&camera, projection);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });
        Self {
            camera,
            controller,
            uniform,
            buffer,
            bind_group,
        }
    }

    /// Runs the controller and uploads the resulting view.
    pub fn update(&mut self, queue: &wgpu::Queue, projection: &Projection) {
        self.controller.update(&mut self.camera);
        self.uniform.update_view_proj(&self.camera, projection);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}
