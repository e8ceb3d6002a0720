//! Gizmo 操作：鼠标位移 → 平移 / 旋转 / 缩放增量 → 骨骼局部变换

use bitflags::bitflags;
use glam::{Mat4, Quat, Vec2, Vec3};

use super::picking::Camera;
use crate::component::SkeletalMeshComponent;
use crate::skeleton::{rigid_parts, BoneTransform};

/// Gizmo 模式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum GizmoMode {
    #[default]
    Translate,
    Rotate,
    Scale,
}

/// 操作坐标系
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CoordinateSpace {
    /// 骨骼自身的全局轴
    #[default]
    Local,
    World,
}

impl CoordinateSpace {
    pub fn toggled(self) -> Self {
        match self {
            CoordinateSpace::Local => CoordinateSpace::World,
            CoordinateSpace::World => CoordinateSpace::Local,
        }
    }
}

bitflags! {
    /// 允许操作的轴
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct GizmoAxis: u8 {
        const X = 1 << 0;
        const Y = 1 << 1;
        const Z = 1 << 2;
        const ALL = Self::X.bits() | Self::Y.bits() | Self::Z.bits();
    }
}

impl GizmoAxis {
    #[inline]
    fn mask_vector(self) -> Vec3 {
        Vec3::new(
            if self.contains(GizmoAxis::X) { 1.0 } else { 0.0 },
            if self.contains(GizmoAxis::Y) { 1.0 } else { 0.0 },
            if self.contains(GizmoAxis::Z) { 1.0 } else { 0.0 },
        )
    }

    /// 只选中一根轴时返回该轴
    fn single_axis(self) -> Option<Vec3> {
        if self == GizmoAxis::X {
            Some(Vec3::X)
        } else if self == GizmoAxis::Y {
            Some(Vec3::Y)
        } else if self == GizmoAxis::Z {
            Some(Vec3::Z)
        } else {
            None
        }
    }
}

/// 一次拖动产生的增量
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GizmoDelta {
    /// 世界空间平移
    Translation(Vec3),
    /// 世界空间旋转（左乘到骨骼全局旋转上）
    Rotation(Quat),
    /// 局部缩放倍数
    Scale(Vec3),
}

/// Gizmo 状态与灵敏度
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Gizmo {
    pub mode: GizmoMode,
    pub space: CoordinateSpace,
    pub axes: GizmoAxis,
    /// 每像素平移量（乘以相机到骨骼距离）
    pub translate_speed: f32,
    /// 每像素旋转弧度
    pub rotate_speed: f32,
    /// 每像素缩放比例
    pub scale_speed: f32,
}

impl Default for Gizmo {
    fn default() -> Self {
        Self {
            mode: GizmoMode::Translate,
            space: CoordinateSpace::Local,
            axes: GizmoAxis::ALL,
            translate_speed: 0.002,
            rotate_speed: 0.01,
            scale_speed: 0.005,
        }
    }
}

impl Gizmo {
    /// 鼠标位移（像素，y 向下）→ 增量
    ///
    /// bone_rotation 为骨骼全局旋转，Local 坐标系下按其轴向做轴限制。
    pub fn compute_delta(&self, camera: &Camera, mouse_delta: Vec2, bone_position: Vec3, bone_rotation: Quat) -> GizmoDelta {
        let right = camera.right();
        let up = camera.screen_up();
        let basis = match self.space {
            CoordinateSpace::Local => bone_rotation,
            CoordinateSpace::World => Quat::IDENTITY,
        };

        match self.mode {
            GizmoMode::Translate => {
                let scale = self.translate_speed * camera.distance_to(bone_position).max(0.1);
                let world = (right * mouse_delta.x - up * mouse_delta.y) * scale;
                // 转到操作坐标系，按轴屏蔽后转回
                let in_basis = basis.inverse() * world;
                GizmoDelta::Translation(basis * (in_basis * self.axes.mask_vector()))
            }
            GizmoMode::Rotate => {
                let rotation = match self.axes.single_axis() {
                    Some(axis) => {
                        let angle = (mouse_delta.x - mouse_delta.y) * self.rotate_speed;
                        Quat::from_axis_angle(basis * axis, angle)
                    }
                    // 多轴时按屏幕轨迹球旋转
                    None => {
                        Quat::from_axis_angle(up, mouse_delta.x * self.rotate_speed)
                            * Quat::from_axis_angle(right, mouse_delta.y * self.rotate_speed)
                    }
                };
                GizmoDelta::Rotation(rotation.normalize())
            }
            GizmoMode::Scale => {
                let factor = 1.0 + (mouse_delta.x - mouse_delta.y) * self.scale_speed;
                GizmoDelta::Scale(Vec3::ONE + self.scale_mask(bone_rotation) * (factor - 1.0))
            }
        }
    }

    /// 缩放作用在骨骼自身轴上；World 坐标系下把选中的世界轴投影到骨骼轴
    fn scale_mask(&self, bone_rotation: Quat) -> Vec3 {
        match self.space {
            CoordinateSpace::Local => self.axes.mask_vector(),
            CoordinateSpace::World => {
                let inverse = bone_rotation.inverse();
                [(GizmoAxis::X, Vec3::X), (GizmoAxis::Y, Vec3::Y), (GizmoAxis::Z, Vec3::Z)]
                    .into_iter()
                    .filter(|(flag, _)| self.axes.contains(*flag))
                    .fold(Vec3::ZERO, |mask, (_, axis)| mask + (inverse * axis).abs())
                    .min(Vec3::ONE)
            }
        }
    }

    /// 把拖动应用到骨骼局部变换（父骨骼相对坐标系）
    ///
    /// 骨骼索引无效时不做任何修改，返回 false。
    pub fn apply_drag(
        &self,
        component: &mut SkeletalMeshComponent,
        bone_index: usize,
        component_to_world: Mat4,
        camera: &Camera,
        mouse_delta: Vec2,
    ) -> bool {
        let Some(local) = component.bone_local_transform(bone_index) else {
            return false;
        };
        let Some(global) = component.bone_world_matrix(bone_index, component_to_world) else {
            return false;
        };
        let parent_global = match component.reference_skeleton().and_then(|s| s.parent_index(bone_index)) {
            Some(parent) => component.bone_world_matrix(parent, component_to_world).unwrap_or(component_to_world),
            None => component_to_world,
        };

        let (bone_rotation, bone_position) = rigid_parts(global);
        let delta = self.compute_delta(camera, mouse_delta, bone_position, bone_rotation);
        let updated = apply_delta(local, parent_global, delta);
        component.set_bone_local_transform(bone_index, updated)
    }
}

/// 把世界空间增量换算到父骨骼坐标系后作用于局部变换
pub fn apply_delta(local: BoneTransform, parent_global: Mat4, delta: GizmoDelta) -> BoneTransform {
    let mut result = local;
    match delta {
        GizmoDelta::Translation(world) => {
            result.translation += parent_global.inverse().transform_vector3(world);
        }
        GizmoDelta::Rotation(world) => {
            let (parent_rotation, _) = rigid_parts(parent_global);
            let in_parent = parent_rotation.inverse() * world * parent_rotation;
            result.rotation = (in_parent * local.rotation).normalize();
        }
        GizmoDelta::Scale(factor) => {
            result.scale = (local.scale * factor).max(Vec3::splat(1e-3));
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_translation_respects_axis_mask() {
        let camera = Camera::default();
        let gizmo = Gizmo { axes: GizmoAxis::X, space: CoordinateSpace::World, ..Default::default() };
        let GizmoDelta::Translation(t) = gizmo.compute_delta(&camera, Vec2::new(10.0, -10.0), Vec3::ZERO, Quat::IDENTITY)
        else {
            panic!("expected translation");
        };
        assert!(t.x > 0.0);
        assert_eq!(t.y, 0.0);
        assert_eq!(t.z, 0.0);
    }

    #[test]
    fn test_translation_converted_into_parent_frame() {
        // 父骨骼绕 Y 转 90°：世界 +X 对应父坐标系 +Z
        let parent = Mat4::from_rotation_y(FRAC_PI_2);
        let result = apply_delta(BoneTransform::IDENTITY, parent, GizmoDelta::Translation(Vec3::X));
        assert!(result.translation.abs_diff_eq(Vec3::Z, 1e-5));
    }

    #[test]
    fn test_rotation_about_single_world_axis() {
        let camera = Camera::default();
        let gizmo = Gizmo {
            mode: GizmoMode::Rotate,
            space: CoordinateSpace::World,
            axes: GizmoAxis::Y,
            ..Default::default()
        };
        let GizmoDelta::Rotation(q) = gizmo.compute_delta(&camera, Vec2::new(50.0, 0.0), Vec3::ZERO, Quat::IDENTITY)
        else {
            panic!("expected rotation");
        };
        let (axis, angle) = q.to_axis_angle();
        assert!(axis.abs_diff_eq(Vec3::Y, 1e-4));
        assert!((angle - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_scale_masked_and_floored() {
        let gizmo = Gizmo { mode: GizmoMode::Scale, axes: GizmoAxis::Z, ..Default::default() };
        let delta = gizmo.compute_delta(&Camera::default(), Vec2::new(-10_000.0, 0.0), Vec3::ZERO, Quat::IDENTITY);
        let result = apply_delta(BoneTransform::IDENTITY, Mat4::IDENTITY, delta);
        assert_eq!(result.scale.x, 1.0);
        assert_eq!(result.scale.y, 1.0);
        assert!((result.scale.z - 1e-3).abs() < 1e-6);
    }

    #[test]
    fn test_world_scale_axis_follows_bone_rotation() {
        // 骨骼绕 Y 转 90°：世界 X 轴对应骨骼自身 Z 轴
        let bone_rotation = Quat::from_rotation_y(FRAC_PI_2);
        let drag = Vec2::new(100.0, 0.0);
        let world = Gizmo { mode: GizmoMode::Scale, space: CoordinateSpace::World, axes: GizmoAxis::X, ..Default::default() };
        let GizmoDelta::Scale(s) = world.compute_delta(&Camera::default(), drag, Vec3::ZERO, bone_rotation) else {
            panic!("expected scale");
        };
        assert!((s.x - 1.0).abs() < 1e-5);
        assert!((s.y - 1.0).abs() < 1e-5);
        assert!((s.z - 1.5).abs() < 1e-4);

        let local = Gizmo { space: CoordinateSpace::Local, ..world };
        let GizmoDelta::Scale(s) = local.compute_delta(&Camera::default(), drag, Vec3::ZERO, bone_rotation) else {
            panic!("expected scale");
        };
        assert!((s.x - 1.5).abs() < 1e-4);
        assert_eq!(s.z, 1.0);
    }

    #[test]
    fn test_invalid_bone_is_noop() {
        let mut component = SkeletalMeshComponent::new();
        let changed = Gizmo::default().apply_drag(
            &mut component,
            3,
            Mat4::IDENTITY,
            &Camera::default(),
            Vec2::new(5.0, 5.0),
        );
        assert!(!changed);
    }
}
