//! 骨骼拾取：相机射线与骨骼关节点求交

use glam::{Mat4, Vec2, Vec3, Vec4Swizzles};

use crate::skeleton::matrix_position;

/// 投影方式
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Projection {
    Perspective { fov_y_radians: f32, near: f32, far: f32 },
    /// height 为视口对应的世界空间高度
    Orthographic { height: f32, near: f32, far: f32 },
}

/// 射线（方向已归一化）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction: direction.normalize_or_zero() }
    }

    #[inline]
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// 点到射线的最近参数 t（不小于 0）与距离
    pub fn closest_approach(&self, point: Vec3) -> (f32, f32) {
        let t = (point - self.origin).dot(self.direction).max(0.0);
        (t, self.point_at(t).distance(point))
    }
}

/// 编辑器相机
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub projection: Projection,
    /// 视口像素尺寸
    pub viewport: Vec2,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 1.0, 5.0),
            target: Vec3::new(0.0, 1.0, 0.0),
            up: Vec3::Y,
            projection: Projection::Perspective { fov_y_radians: 45f32.to_radians(), near: 0.1, far: 1000.0 },
            viewport: Vec2::new(1280.0, 720.0),
        }
    }
}

impl Camera {
    #[inline]
    pub fn forward(&self) -> Vec3 {
        (self.target - self.eye).normalize_or_zero()
    }

    #[inline]
    pub fn right(&self) -> Vec3 {
        self.forward().cross(self.up).normalize_or_zero()
    }

    /// 屏幕向上方向（与 forward、right 正交）
    #[inline]
    pub fn screen_up(&self) -> Vec3 {
        self.right().cross(self.forward())
    }

    #[inline]
    pub fn aspect(&self) -> f32 {
        if self.viewport.y > 0.0 { self.viewport.x / self.viewport.y } else { 1.0 }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        match self.projection {
            Projection::Perspective { fov_y_radians, near, far } => {
                Mat4::perspective_rh(fov_y_radians, self.aspect(), near, far)
            }
            Projection::Orthographic { height, near, far } => {
                let half_h = height * 0.5;
                let half_w = half_h * self.aspect();
                Mat4::orthographic_rh(-half_w, half_w, -half_h, half_h, near, far)
            }
        }
    }

    #[inline]
    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// 像素坐标（左上角为原点）→ NDC
    #[inline]
    fn cursor_to_ndc(&self, cursor: Vec2) -> Vec2 {
        let w = self.viewport.x.max(1.0);
        let h = self.viewport.y.max(1.0);
        Vec2::new(2.0 * cursor.x / w - 1.0, 1.0 - 2.0 * cursor.y / h)
    }

    fn unproject(&self, ndc: Vec2, depth: f32) -> Vec3 {
        let clip = self.view_projection().inverse() * ndc.extend(depth).extend(1.0);
        clip.xyz() / clip.w
    }

    /// 光标射线
    ///
    /// 透视：从相机位置穿过光标在近平面上的反投影点；
    /// 正交：从光标在近平面上的反投影点沿相机朝向。
    pub fn screen_ray(&self, cursor: Vec2) -> Ray {
        let ndc = self.cursor_to_ndc(cursor);
        let near_point = self.unproject(ndc, 0.0);
        match self.projection {
            Projection::Perspective { .. } => Ray::new(self.eye, near_point - self.eye),
            Projection::Orthographic { .. } => Ray::new(near_point, self.forward()),
        }
    }

    /// 世界坐标 → 像素坐标（在相机后方时为 None）
    pub fn world_to_screen(&self, point: Vec3) -> Option<Vec2> {
        let clip = self.view_projection() * point.extend(1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc = clip.xyz() / clip.w;
        Some(Vec2::new(
            (ndc.x + 1.0) * 0.5 * self.viewport.x,
            (1.0 - ndc.y) * 0.5 * self.viewport.y,
        ))
    }

    /// 相机到点的距离
    #[inline]
    pub fn distance_to(&self, point: Vec3) -> f32 {
        self.eye.distance(point)
    }
}

/// 拾取射线附近的骨骼
///
/// 关节点到射线距离不超过 pick_radius 的骨骼中，取离射线起点最近的一根。
pub fn pick_bone(ray: &Ray, world_bone_matrices: &[Mat4], pick_radius: f32) -> Option<usize> {
    world_bone_matrices
        .iter()
        .enumerate()
        .filter_map(|(index, matrix)| {
            let (t, distance) = ray.closest_approach(matrix_position(matrix));
            (distance <= pick_radius).then_some((index, t))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(index, _)| index)
}
