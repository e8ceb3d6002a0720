//! 参考骨骼
//!
//! 骨骼按拓扑序存储：父骨骼索引一定小于子骨骼索引，
//! 因此全局矩阵只需一次正向遍历即可求出，无需递归。

use std::collections::HashMap;

use glam::Mat4;

use super::BoneTransform;
use crate::{EngineError, Result};

/// 骨骼层级信息
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoneInfo {
    /// 骨骼名称
    pub name: String,
    /// 父骨骼索引（None 表示根骨骼）
    pub parent_index: Option<usize>,
}

/// 参考骨骼
///
/// 四个并行数组长度始终等于骨骼数。构建完成后不再原地修改，
/// 需要实时编辑时克隆一份工作副本。
#[derive(Clone, Debug, Default)]
pub struct ReferenceSkeleton {
    bone_info: Vec<BoneInfo>,
    bind_pose_local: Vec<BoneTransform>,
    inverse_bind_pose: Vec<Mat4>,
    name_to_index: HashMap<String, usize>,
}

impl ReferenceSkeleton {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加骨骼，返回新骨骼的索引
    ///
    /// 父骨骼必须已经存在（索引小于新骨骼），名称不可重复。
    pub fn add_bone(
        &mut self,
        name: impl Into<String>,
        parent_index: Option<usize>,
        bind_pose_local: BoneTransform,
        inverse_bind_pose: Mat4,
    ) -> Result<usize> {
        let name = name.into();
        let index = self.bone_info.len();

        if let Some(parent) = parent_index {
            if parent >= index {
                return Err(EngineError::InvalidSkeleton(format!(
                    "bone '{}' (index {}) references parent {} which is not before it",
                    name, index, parent
                )));
            }
        }
        if self.name_to_index.contains_key(&name) {
            return Err(EngineError::DuplicateBoneName(name));
        }

        self.name_to_index.insert(name.clone(), index);
        self.bone_info.push(BoneInfo { name, parent_index });
        self.bind_pose_local.push(bind_pose_local);
        self.inverse_bind_pose.push(inverse_bind_pose);
        Ok(index)
    }

    /// 检查全部不变量（用于解码后的数据）
    pub fn validate(&self) -> Result<()> {
        let count = self.bone_info.len();
        if self.bind_pose_local.len() != count
            || self.inverse_bind_pose.len() != count
            || self.name_to_index.len() != count
        {
            return Err(EngineError::InvalidSkeleton(format!(
                "array length mismatch: info={}, bind={}, inverse={}, names={}",
                count,
                self.bind_pose_local.len(),
                self.inverse_bind_pose.len(),
                self.name_to_index.len()
            )));
        }
        for (index, info) in self.bone_info.iter().enumerate() {
            if let Some(parent) = info.parent_index {
                if parent >= index {
                    return Err(EngineError::InvalidSkeleton(format!(
                        "bone '{}' parent {} is not before index {}",
                        info.name, parent, index
                    )));
                }
            }
            if self.name_to_index.get(&info.name) != Some(&index) {
                return Err(EngineError::InvalidSkeleton(format!(
                    "name lookup for '{}' does not resolve to {}",
                    info.name, index
                )));
            }
        }
        Ok(())
    }

    #[inline]
    pub fn bone_count(&self) -> usize {
        self.bone_info.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bone_info.is_empty()
    }

    #[inline]
    pub fn is_valid_index(&self, index: usize) -> bool {
        index < self.bone_info.len()
    }

    pub fn bone_info(&self) -> &[BoneInfo] {
        &self.bone_info
    }

    pub fn bind_pose_local(&self) -> &[BoneTransform] {
        &self.bind_pose_local
    }

    pub fn inverse_bind_pose(&self) -> &[Mat4] {
        &self.inverse_bind_pose
    }

    /// 通过名称查找骨骼
    pub fn find_bone_index(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn bone_name(&self, index: usize) -> Option<&str> {
        self.bone_info.get(index).map(|b| b.name.as_str())
    }

    pub fn parent_index(&self, index: usize) -> Option<usize> {
        self.bone_info.get(index).and_then(|b| b.parent_index)
    }

    /// 直接子骨骼（按索引升序）
    pub fn children_of(&self, index: usize) -> Vec<usize> {
        self.bone_info
            .iter()
            .enumerate()
            .filter(|(_, b)| b.parent_index == Some(index))
            .map(|(i, _)| i)
            .collect()
    }

    /// 根骨骼列表
    pub fn roots(&self) -> Vec<usize> {
        self.bone_info
            .iter()
            .enumerate()
            .filter(|(_, b)| b.parent_index.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    /// 绑定姿势下的全局矩阵（组件空间）
    pub fn bind_pose_global_matrices(&self) -> Vec<Mat4> {
        compose_global_matrices(&self.bone_info, &self.bind_pose_local, Mat4::IDENTITY)
    }
}

/// 单次正向遍历组合全局矩阵
///
/// global[i] = global[parent] * local[i]，根骨骼乘以 root_transform。
/// 依赖拓扑序：父骨骼总在子骨骼之前。
pub(crate) fn compose_global_matrices(
    bone_info: &[BoneInfo],
    local: &[BoneTransform],
    root_transform: Mat4,
) -> Vec<Mat4> {
    let count = bone_info.len().min(local.len());
    let mut global = Vec::with_capacity(count);
    for i in 0..count {
        let parent_matrix = match bone_info[i].parent_index {
            Some(p) if p < i => global[p],
            _ => root_transform,
        };
        global.push(parent_matrix * local[i].to_matrix());
    }
    global
}

// ============================================================================
// 骨骼资源
// ============================================================================

/// 骨骼资源，独占其参考骨骼
#[derive(Clone, Debug, Default)]
pub struct Skeleton {
    pub name: String,
    reference: ReferenceSkeleton,
}

impl Skeleton {
    pub fn new(name: impl Into<String>, reference: ReferenceSkeleton) -> Self {
        Self { name: name.into(), reference }
    }

    pub fn reference(&self) -> &ReferenceSkeleton {
        &self.reference
    }

    /// 整体替换参考骨骼
    pub fn replace_reference(&mut self, reference: ReferenceSkeleton) {
        self.reference = reference;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    fn chain() -> ReferenceSkeleton {
        let mut skel = ReferenceSkeleton::new();
        let t = BoneTransform::from_translation_rotation(Vec3::Y, Quat::IDENTITY);
        skel.add_bone("root", None, BoneTransform::IDENTITY, Mat4::IDENTITY).unwrap();
        skel.add_bone("spine", Some(0), t, Mat4::IDENTITY).unwrap();
        skel.add_bone("head", Some(1), t, Mat4::IDENTITY).unwrap();
        skel
    }

    #[test]
    fn add_bone_rejects_forward_parent() {
        let mut skel = chain();
        let err = skel.add_bone("bad", Some(3), BoneTransform::IDENTITY, Mat4::IDENTITY);
        assert!(matches!(err, Err(EngineError::InvalidSkeleton(_))));
        assert_eq!(skel.bone_count(), 3);
    }

    #[test]
    fn add_bone_rejects_duplicate_name() {
        let mut skel = chain();
        let err = skel.add_bone("spine", Some(0), BoneTransform::IDENTITY, Mat4::IDENTITY);
        assert!(matches!(err, Err(EngineError::DuplicateBoneName(_))));
        assert!(skel.validate().is_ok());
    }

    #[test]
    fn bind_pose_globals_accumulate_down_the_chain() {
        let skel = chain();
        let global = skel.bind_pose_global_matrices();
        assert_eq!(global.len(), 3);
        assert!(global[2].w_axis.truncate().abs_diff_eq(Vec3::new(0.0, 2.0, 0.0), 1e-6));
    }

    #[test]
    fn children_and_roots() {
        let mut skel = chain();
        skel.add_bone("second_root", None, BoneTransform::IDENTITY, Mat4::IDENTITY).unwrap();
        assert_eq!(skel.children_of(0), vec![1]);
        assert_eq!(skel.roots(), vec![0, 3]);
        assert_eq!(skel.find_bone_index("head"), Some(2));
        assert_eq!(skel.parent_index(2), Some(1));
        assert_eq!(skel.parent_index(99), None);
    }
}
