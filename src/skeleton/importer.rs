//! 骨骼导入器
//!
//! 把外部层级描述（FBX 风格的节点树 + 绑定姿势表）转换为 ReferenceSkeleton。
//!
//! 局部绑定变换的求法：
//! 1. 节点和父节点都有绑定姿势：local = parent_global⁻¹ * node_global
//! 2. 只有节点自身有绑定姿势：把 node_global 当作局部变换
//! 3. 都没有：直接使用节点自身的平移 / 旋转 / 缩放
//!
//! 逆绑定矩阵与上面的分支无关：有绑定姿势时为 node_global⁻¹，否则为单位矩阵。

use std::collections::HashMap;

use glam::{EulerRot, Mat4, Quat, Vec3};

use super::{BoneTransform, ReferenceSkeleton};

/// 源节点类型
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceNodeKind {
    Bone,
    Mesh,
    Other,
}

/// 外部层级中的一个节点
#[derive(Clone, Debug)]
pub struct SourceNode {
    pub name: String,
    pub kind: SourceNodeKind,
    /// 默认局部平移
    pub translation: Vec3,
    /// 默认局部旋转（欧拉角，度；按 X → Y → Z 顺序施加）
    pub rotation_euler_degrees: Vec3,
    /// 默认局部缩放
    pub scale: Vec3,
    pub children: Vec<SourceNode>,
}

impl SourceNode {
    pub fn new(name: impl Into<String>, kind: SourceNodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            translation: Vec3::ZERO,
            rotation_euler_degrees: Vec3::ZERO,
            scale: Vec3::ONE,
            children: Vec::new(),
        }
    }

    pub fn bone(name: impl Into<String>) -> Self {
        Self::new(name, SourceNodeKind::Bone)
    }

    pub fn with_translation(mut self, translation: Vec3) -> Self {
        self.translation = translation;
        self
    }

    pub fn with_rotation_degrees(mut self, euler: Vec3) -> Self {
        self.rotation_euler_degrees = euler;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_child(mut self, child: SourceNode) -> Self {
        self.children.push(child);
        self
    }

    #[inline]
    pub fn is_bone(&self) -> bool {
        self.kind == SourceNodeKind::Bone
    }

    /// 节点自身的默认局部变换
    pub fn default_local_transform(&self) -> BoneTransform {
        let r = self.rotation_euler_degrees;
        // 先 X 后 Y 再 Z：R = Rz * Ry * Rx
        let rotation = Quat::from_euler(
            EulerRot::ZYX,
            r.z.to_radians(),
            r.y.to_radians(),
            r.x.to_radians(),
        );
        BoneTransform { translation: self.translation, rotation, scale: self.scale }
    }
}

/// 绑定姿势表：节点名 → 绑定时的全局矩阵
#[derive(Clone, Debug, Default)]
pub struct BindPoseTable {
    global: HashMap<String, Mat4>,
}

impl BindPoseTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node_name: impl Into<String>, global: Mat4) {
        self.global.insert(node_name.into(), global);
    }

    pub fn get(&self, node_name: &str) -> Option<Mat4> {
        self.global.get(node_name).copied()
    }

    pub fn len(&self) -> usize {
        self.global.len()
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty()
    }
}

/// 从节点树构建参考骨骼
///
/// 深度优先遍历。顶层的非骨骼节点会继续向下寻找骨骼根；
/// 一旦进入骨骼子树，只递归骨骼类型的子节点。
pub fn build_from_hierarchy(root_nodes: &[SourceNode], bind_poses: &BindPoseTable) -> ReferenceSkeleton {
    let mut skeleton = ReferenceSkeleton::new();
    let mut fallback_count = 0usize;

    for node in root_nodes {
        find_bone_roots(node, bind_poses, &mut skeleton, &mut fallback_count);
    }

    log::info!(
        "[导入] 骨骼构建完成: {} 骨骼 ({} 使用默认变换回退), {} 条绑定姿势",
        skeleton.bone_count(),
        fallback_count,
        bind_poses.len()
    );
    skeleton
}

fn find_bone_roots(
    node: &SourceNode,
    bind_poses: &BindPoseTable,
    skeleton: &mut ReferenceSkeleton,
    fallback_count: &mut usize,
) {
    if node.is_bone() {
        add_bone_recursive(node, None, None, bind_poses, skeleton, fallback_count);
        return;
    }
    for child in &node.children {
        find_bone_roots(child, bind_poses, skeleton, fallback_count);
    }
}

fn add_bone_recursive(
    node: &SourceNode,
    parent_index: Option<usize>,
    parent_name: Option<&str>,
    bind_poses: &BindPoseTable,
    skeleton: &mut ReferenceSkeleton,
    fallback_count: &mut usize,
) {
    let node_global = bind_poses.get(&node.name);
    let parent_global = parent_name.and_then(|name| bind_poses.get(name));

    let local = match (node_global, parent_index, parent_global) {
        (Some(global), None, _) => BoneTransform::from_matrix(global),
        (Some(global), Some(_), Some(parent)) => BoneTransform::from_matrix(parent.inverse() * global),
        (Some(global), Some(_), None) => BoneTransform::from_matrix(global),
        (None, _, _) => {
            *fallback_count += 1;
            node.default_local_transform()
        }
    };
    let inverse_bind = node_global.map(|g| g.inverse()).unwrap_or(Mat4::IDENTITY);

    let index = match skeleton.add_bone(node.name.clone(), parent_index, local, inverse_bind) {
        Ok(index) => index,
        Err(e) => {
            log::warn!("[导入] 骨骼 '{}' 无法添加，跳过该子树: {}", node.name, e);
            return;
        }
    };

    for child in node.children.iter().filter(|c| c.is_bone()) {
        add_bone_recursive(child, Some(index), Some(&node.name), bind_poses, skeleton, fallback_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn humanoid() -> SourceNode {
        SourceNode::new("Scene", SourceNodeKind::Other).with_child(
            SourceNode::bone("pelvis")
                .with_translation(Vec3::new(0.0, 1.0, 0.0))
                .with_child(
                    SourceNode::bone("spine")
                        .with_translation(Vec3::new(0.0, 0.3, 0.0))
                        .with_child(SourceNode::bone("head").with_translation(Vec3::new(0.0, 0.5, 0.0)))
                        .with_child(
                            SourceNode::new("helmet_mesh", SourceNodeKind::Mesh)
                                .with_child(SourceNode::bone("hidden_bone")),
                        ),
                )
                .with_child(SourceNode::bone("thigh_l").with_translation(Vec3::new(0.2, -0.1, 0.0))),
        )
    }

    #[test]
    fn parents_always_precede_children() {
        let skel = build_from_hierarchy(&[humanoid()], &BindPoseTable::new());
        assert_eq!(skel.bone_count(), 4);
        for (i, info) in skel.bone_info().iter().enumerate() {
            if let Some(p) = info.parent_index {
                assert!(p < i);
            }
        }
        assert_eq!(skel.parent_index(skel.find_bone_index("head").unwrap()), skel.find_bone_index("spine"));
    }

    #[test]
    fn non_bone_child_terminates_branch() {
        let skel = build_from_hierarchy(&[humanoid()], &BindPoseTable::new());
        assert!(skel.find_bone_index("hidden_bone").is_none());
        assert!(skel.find_bone_index("helmet_mesh").is_none());
    }

    #[test]
    fn missing_bind_pose_uses_default_transform() {
        let node = SourceNode::bone("root")
            .with_translation(Vec3::new(1.0, 2.0, 3.0))
            .with_rotation_degrees(Vec3::new(0.0, 90.0, 0.0));
        let skel = build_from_hierarchy(&[node], &BindPoseTable::new());
        let local = skel.bind_pose_local()[0];
        assert!(local.translation.abs_diff_eq(Vec3::new(1.0, 2.0, 3.0), 1e-6));
        let expected = Quat::from_rotation_y(90f32.to_radians());
        assert!(local.rotation.abs_diff_eq(expected, 1e-5));
        assert_eq!(skel.inverse_bind_pose()[0], Mat4::IDENTITY);
    }

    #[test]
    fn bind_pose_pair_yields_relative_local() {
        let root = SourceNode::bone("root").with_child(SourceNode::bone("child"));
        let mut poses = BindPoseTable::new();
        let root_global = Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0));
        let child_global = Mat4::from_translation(Vec3::new(0.0, 3.0, 0.0));
        poses.insert("root", root_global);
        poses.insert("child", child_global);

        let skel = build_from_hierarchy(&[root], &poses);
        let child_local = skel.bind_pose_local()[1];
        assert!(child_local.translation.abs_diff_eq(Vec3::new(0.0, 2.0, 0.0), 1e-6));
        assert!(skel.inverse_bind_pose()[1].abs_diff_eq(child_global.inverse(), 1e-6));
    }

    #[test]
    fn bind_pose_only_on_child_is_treated_as_local() {
        let root = SourceNode::bone("root")
            .with_translation(Vec3::new(5.0, 0.0, 0.0))
            .with_child(SourceNode::bone("child"));
        let mut poses = BindPoseTable::new();
        poses.insert("child", Mat4::from_translation(Vec3::new(0.0, 4.0, 0.0)));

        let skel = build_from_hierarchy(&[root], &poses);
        assert!(skel.bind_pose_local()[0].translation.abs_diff_eq(Vec3::new(5.0, 0.0, 0.0), 1e-6));
        assert!(skel.bind_pose_local()[1].translation.abs_diff_eq(Vec3::new(0.0, 4.0, 0.0), 1e-6));
    }

    #[test]
    fn duplicate_name_skips_subtree() {
        let root = SourceNode::bone("root")
            .with_child(SourceNode::bone("arm").with_child(SourceNode::bone("hand")))
            .with_child(SourceNode::bone("arm").with_child(SourceNode::bone("finger")));
        let skel = build_from_hierarchy(&[root], &BindPoseTable::new());
        assert_eq!(skel.bone_count(), 3);
        assert!(skel.find_bone_index("finger").is_none());
        assert!(skel.validate().is_ok());
    }
}
