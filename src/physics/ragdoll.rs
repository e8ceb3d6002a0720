//! 布娃娃生成
//!
//! 按当前姿势（而非绑定姿势）的骨骼全局矩阵生成胶囊刚体和关节。
//! 刚体以父骨骼命名：每根符合条件的子骨骼为父骨骼的刚体追加一个胶囊，
//! 胶囊从父骨骼关节延伸到子骨骼关节。

use std::f32::consts::PI;

use glam::{Mat4, Quat, Vec3};

use super::config::RagdollConfig;
use super::scene::RigidPose;
use super::setup::{AngularLimits, BodySetup, ConstraintSetup, JointKind, ShapeElem};
use crate::skeleton::{matrix_position, ReferenceSkeleton};

/// 从 +Y 到 dir 的最短弧旋转
///
/// 零长度方向返回单位旋转；反向时绕任一垂直轴旋转 π。
pub fn shortest_arc_from_y(dir: Vec3) -> Quat {
    let len = dir.length();
    if len <= f32::EPSILON {
        return Quat::IDENTITY;
    }
    let dir = dir / len;
    let dot = Vec3::Y.dot(dir).clamp(-1.0, 1.0);
    if dot > 1.0 - 1e-6 {
        return Quat::IDENTITY;
    }
    if dot < -1.0 + 1e-6 {
        return Quat::from_axis_angle(Vec3::X, PI);
    }
    let axis = Vec3::Y.cross(dir).normalize();
    Quat::from_axis_angle(axis, dot.acos())
}

/// 胶囊半径：骨长 1/4，不超过上限，不低于下限
#[inline]
pub fn capsule_radius(bone_length: f32, config: &RagdollConfig) -> f32 {
    (bone_length * 0.25)
        .min(config.max_capsule_radius)
        .max(config.min_capsule_radius)
}

/// 是否为骨骼 index 生成胶囊（跳过 0 号骨骼和父骨骼为 0 号的骨骼）
#[inline]
fn qualifies(skeleton: &ReferenceSkeleton, index: usize) -> Option<usize> {
    if index == 0 {
        return None;
    }
    match skeleton.parent_index(index) {
        Some(0) | None => None,
        Some(parent) => Some(parent),
    }
}

/// 为骨骼生成胶囊刚体
///
/// global_bone_matrices 为当前姿势的全局矩阵，长度不足时多余骨骼被跳过。
pub fn generate_ragdoll_body(
    skeleton: &ReferenceSkeleton,
    global_bone_matrices: &[Mat4],
    config: &RagdollConfig,
) -> Vec<BodySetup> {
    let mut bodies: Vec<BodySetup> = Vec::new();

    for index in 0..skeleton.bone_count().min(global_bone_matrices.len()) {
        let Some(parent) = qualifies(skeleton, index) else {
            continue;
        };
        let (Some(parent_name), Some(parent_matrix)) =
            (skeleton.bone_name(parent), global_bone_matrices.get(parent))
        else {
            continue;
        };

        let start = matrix_position(parent_matrix);
        let end = matrix_position(&global_bone_matrices[index]);
        let dir = end - start;
        let bone_length = dir.length();

        let radius = capsule_radius(bone_length, config);
        let length = (bone_length - 2.0 * radius).max(0.0);
        let world_shape = RigidPose::new(shortest_arc_from_y(dir), (start + end) * 0.5);

        // 存储为父骨骼刚体坐标系下的相对位姿
        let pose = RigidPose::from_matrix(*parent_matrix).inverse().mul(&world_shape);
        let elem = ShapeElem::Capsule { pose, radius, length };

        match bodies.iter_mut().find(|b| b.bone_name == parent_name) {
            Some(body) => body.elems.push(elem),
            None => {
                let mut body = BodySetup::new(parent_name);
                body.elems.push(elem);
                bodies.push(body);
            }
        }
    }

    log::info!(
        "[布娃娃] 生成刚体: {} 个 ({} 个胶囊)",
        bodies.len(),
        bodies.iter().map(|b| b.elems.len()).sum::<usize>()
    );
    bodies
}

/// 为所有父子骨骼对生成关节（两端都有刚体时）
///
/// A 侧坐标系 = 子骨骼关节在父骨骼坐标系中的位姿；B 侧为单位位姿。
pub fn generate_constraints_for_all_bones(
    skeleton: &ReferenceSkeleton,
    bodies: &[BodySetup],
    global_bone_matrices: &[Mat4],
    config: &RagdollConfig,
) -> Vec<ConstraintSetup> {
    let has_body = |name: &str| bodies.iter().any(|b| b.bone_name == name);
    let limits = AngularLimits {
        swing1_degrees: config.default_swing1_degrees,
        swing2_degrees: config.default_swing2_degrees,
        twist_degrees: config.default_twist_degrees,
    };

    let mut constraints = Vec::new();
    for index in 0..skeleton.bone_count().min(global_bone_matrices.len()) {
        let Some(parent) = skeleton.parent_index(index) else {
            continue;
        };
        let (Some(parent_name), Some(child_name)) = (skeleton.bone_name(parent), skeleton.bone_name(index))
        else {
            continue;
        };
        if !has_body(parent_name) || !has_body(child_name) {
            continue;
        }

        let parent_pose = RigidPose::from_matrix(global_bone_matrices[parent]);
        let child_pose = RigidPose::from_matrix(global_bone_matrices[index]);

        constraints.push(ConstraintSetup {
            joint_name: format!("{}_{}", parent_name, child_name),
            bone_a: parent_name.to_string(),
            bone_b: child_name.to_string(),
            transform_in_a: parent_pose.inverse().mul(&child_pose),
            transform_in_b: RigidPose::IDENTITY,
            limits,
            kind: JointKind::Cone,
        });
    }

    log::info!("[布娃娃] 生成关节: {} 个", constraints.len());
    constraints
}
