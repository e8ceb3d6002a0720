//! 骨骼系统
//!
//! 核心设计思想：
//! - ReferenceSkeleton: 按父先子后顺序存储的骨骼数组（并行数组 + 名称索引）
//! - Skeleton: 拥有 ReferenceSkeleton 的骨骼资源
//! - importer: 从外部层级描述（FBX 风格）构建骨骼

pub mod importer;
mod reference_skeleton;

pub use reference_skeleton::{BoneInfo, ReferenceSkeleton, Skeleton};
pub(crate) use reference_skeleton::compose_global_matrices;
pub use importer::{build_from_hierarchy, BindPoseTable, SourceNode, SourceNodeKind};

use glam::{Mat4, Quat, Vec3};

// ============================================================================
// 公共类型定义
// ============================================================================

/// 骨骼变换数据（平移 / 旋转 / 缩放）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl BoneTransform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation_rotation(translation: Vec3, rotation: Quat) -> Self {
        Self { translation, rotation, scale: Vec3::ONE }
    }

    /// 转换为 4x4 矩阵
    #[inline]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// 从矩阵分解
    #[inline]
    pub fn from_matrix(m: Mat4) -> Self {
        let (scale, rotation, translation) = m.to_scale_rotation_translation();
        Self { translation, rotation: rotation.normalize(), scale }
    }
}

/// 取矩阵的刚体部分（旋转 + 平移，丢弃缩放）
#[inline]
pub fn rigid_parts(m: Mat4) -> (Quat, Vec3) {
    let (_, rotation, translation) = m.to_scale_rotation_translation();
    (rotation.normalize(), translation)
}

/// 矩阵的平移分量
#[inline]
pub fn matrix_position(m: &Mat4) -> Vec3 {
    m.w_axis.truncate()
}
