//! 骨骼网格组件 - 运行时姿势
//!
//! bone_local_transforms 是"当前姿势"的唯一数据源，每根骨骼每个 tick
//! 只由一个来源写入：动画求值、物理同步或 Gizmo 编辑。
//! 全局矩阵按需计算（单次正向遍历），不跨修改缓存。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};

use crate::animation::{collect_crossed_notifies, AnimPlayback, AnimSequence, PlaybackStep};
use crate::mesh::SkeletalMesh;
use crate::skeleton::{compose_global_matrices, matrix_position, BoneTransform, ReferenceSkeleton};

/// 骨骼网格组件
#[derive(Debug, Default)]
pub struct SkeletalMeshComponent {
    mesh: Option<Arc<SkeletalMesh>>,
    bone_local_transforms: Vec<BoneTransform>,
    animation: Option<Arc<AnimSequence>>,
    pub playback: AnimPlayback,
    /// 由布娃娃接管的骨骼（动画求值跳过）
    physics_owned_bones: HashSet<usize>,
}

impl SkeletalMeshComponent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mesh(mesh: Arc<SkeletalMesh>) -> Self {
        let mut component = Self::new();
        component.set_skeletal_mesh(Some(mesh));
        component
    }

    // ========================================
    // 网格与骨骼
    // ========================================

    /// 设置骨骼网格，局部变换重置为绑定姿势
    pub fn set_skeletal_mesh(&mut self, mesh: Option<Arc<SkeletalMesh>>) {
        self.bone_local_transforms = mesh
            .as_ref()
            .map(|m| m.skeleton().reference().bind_pose_local().to_vec())
            .unwrap_or_default();
        self.physics_owned_bones.clear();
        self.mesh = mesh;
    }

    pub fn skeletal_mesh(&self) -> Option<&Arc<SkeletalMesh>> {
        self.mesh.as_ref()
    }

    pub fn reference_skeleton(&self) -> Option<&ReferenceSkeleton> {
        self.mesh.as_ref().map(|m| m.skeleton().reference())
    }

    #[inline]
    pub fn bone_count(&self) -> usize {
        self.bone_local_transforms.len()
    }

    pub fn find_bone_index(&self, name: &str) -> Option<usize> {
        self.reference_skeleton()?.find_bone_index(name)
    }

    pub fn bone_name(&self, index: usize) -> Option<&str> {
        self.reference_skeleton()?.bone_name(index)
    }

    /// 恢复绑定姿势
    pub fn reset_to_bind_pose(&mut self) {
        if let Some(skeleton) = self.mesh.as_ref().map(|m| m.skeleton().clone()) {
            self.bone_local_transforms = skeleton.reference().bind_pose_local().to_vec();
        }
    }

    // ========================================
    // 局部变换访问（越界时为空操作）
    // ========================================

    pub fn bone_local_transforms(&self) -> &[BoneTransform] {
        &self.bone_local_transforms
    }

    pub fn bone_local_transform(&self, index: usize) -> Option<BoneTransform> {
        self.bone_local_transforms.get(index).copied()
    }

    /// 设置局部变换；索引越界返回 false
    pub fn set_bone_local_transform(&mut self, index: usize, transform: BoneTransform) -> bool {
        match self.bone_local_transforms.get_mut(index) {
            Some(slot) => {
                *slot = transform;
                true
            }
            None => false,
        }
    }

    // ========================================
    // 全局矩阵
    // ========================================

    /// 组件空间全局矩阵（根骨骼乘单位矩阵）
    pub fn component_space_bone_matrices(&self) -> Vec<Mat4> {
        self.world_bone_matrices(Mat4::IDENTITY)
    }

    /// 世界空间全局矩阵（根骨骼乘组件到世界变换）
    pub fn world_bone_matrices(&self, component_to_world: Mat4) -> Vec<Mat4> {
        match self.reference_skeleton() {
            Some(skeleton) => {
                compose_global_matrices(skeleton.bone_info(), &self.bone_local_transforms, component_to_world)
            }
            None => Vec::new(),
        }
    }

    /// 单根骨骼的全局矩阵（沿父链向上组合）
    pub fn bone_world_matrix(&self, index: usize, component_to_world: Mat4) -> Option<Mat4> {
        let skeleton = self.reference_skeleton()?;
        let mut matrix = self.bone_local_transforms.get(index)?.to_matrix();
        let mut current = skeleton.parent_index(index);
        while let Some(parent) = current {
            matrix = self.bone_local_transforms.get(parent)?.to_matrix() * matrix;
            current = skeleton.parent_index(parent);
        }
        Some(component_to_world * matrix)
    }

    pub fn bone_world_position(&self, index: usize, component_to_world: Mat4) -> Option<Vec3> {
        self.bone_world_matrix(index, component_to_world).map(|m| matrix_position(&m))
    }

    /// 蒙皮矩阵 = 组件空间全局矩阵 * 逆绑定矩阵
    pub fn skinning_matrices(&self) -> Vec<Mat4> {
        let Some(skeleton) = self.reference_skeleton() else {
            return Vec::new();
        };
        self.component_space_bone_matrices()
            .iter()
            .zip(skeleton.inverse_bind_pose())
            .map(|(global, inverse_bind)| *global * *inverse_bind)
            .collect()
    }

    /// 用世界空间刚体姿势覆盖若干骨骼（物理回读）
    ///
    /// 按索引顺序处理，父骨骼先更新，子骨骼换算局部变换时使用父骨骼的新矩阵。
    /// 缩放不受物理影响，保留原局部缩放。
    pub fn apply_bone_world_poses(&mut self, component_to_world: Mat4, poses: &[(usize, Quat, Vec3)]) {
        let Some(skeleton) = self.mesh.as_ref().map(|m| m.skeleton().clone()) else {
            return;
        };
        let bone_info = skeleton.reference().bone_info();
        let overrides: HashMap<usize, (Quat, Vec3)> =
            poses.iter().map(|&(index, rotation, translation)| (index, (rotation, translation))).collect();

        let count = bone_info.len().min(self.bone_local_transforms.len());
        let mut global: Vec<Mat4> = Vec::with_capacity(count);
        for i in 0..count {
            let parent_matrix = match bone_info[i].parent_index {
                Some(p) if p < i => global[p],
                _ => component_to_world,
            };
            if let Some(&(rotation, translation)) = overrides.get(&i) {
                let world = Mat4::from_rotation_translation(rotation, translation);
                let local = BoneTransform::from_matrix(parent_matrix.inverse() * world);
                let slot = &mut self.bone_local_transforms[i];
                slot.translation = local.translation;
                slot.rotation = local.rotation;
            }
            global.push(parent_matrix * self.bone_local_transforms[i].to_matrix());
        }
    }

    // ========================================
    // 物理接管
    // ========================================

    pub fn set_physics_owned_bones(&mut self, bones: impl IntoIterator<Item = usize>) {
        self.physics_owned_bones = bones.into_iter().filter(|&i| i < self.bone_count()).collect();
    }

    pub fn clear_physics_owned_bones(&mut self) {
        self.physics_owned_bones.clear();
    }

    pub fn is_physics_owned(&self, index: usize) -> bool {
        self.physics_owned_bones.contains(&index)
    }

    // ========================================
    // 动画
    // ========================================

    pub fn animation(&self) -> Option<&Arc<AnimSequence>> {
        self.animation.as_ref()
    }

    /// 绑定动画序列并立即求值当前帧
    pub fn set_animation(&mut self, animation: Option<Arc<AnimSequence>>) {
        if let Some(sequence) = animation.as_ref() {
            self.playback.configure_for(sequence);
        }
        self.animation = animation;
        self.refresh_bone_transforms();
    }

    /// 推进播放、触发通知、刷新姿势；时间未前进时返回 false
    pub fn tick_animation(&mut self, delta_time: f32) -> bool {
        let Some(step) = self.playback.tick(delta_time) else {
            return false;
        };
        self.evaluate_anim_notifies(&step);
        self.refresh_bone_transforms();
        true
    }

    /// 对本次扫过的时间段触发通知，返回触发次数
    pub fn evaluate_anim_notifies(&self, step: &PlaybackStep) -> usize {
        let Some(sequence) = self.animation.clone() else {
            return 0;
        };
        let fired = collect_crossed_notifies(&sequence, step);
        for payload in &fired {
            payload.notify(self, &sequence);
        }
        fired.len()
    }

    /// 按当前播放时间重新填充局部变换（帧间插值）
    ///
    /// 序列中有轨道的骨骼取采样值，没有轨道的骨骼回到绑定姿势；
    /// 未绑定序列时保持不动。物理接管的骨骼不被覆盖。
    pub fn refresh_bone_transforms(&mut self) {
        let (Some(sequence), Some(mesh)) = (self.animation.clone(), self.mesh.clone()) else {
            return;
        };
        let (frame, amount) = self.playback.current_frame_with_fraction();
        let reference = mesh.skeleton().reference();

        for (index, info) in reference.bone_info().iter().enumerate() {
            if index >= self.bone_local_transforms.len() || self.physics_owned_bones.contains(&index) {
                continue;
            }
            self.bone_local_transforms[index] = sequence
                .sample_bone_precisely(&info.name, frame, amount)
                .unwrap_or(reference.bind_pose_local()[index]);
        }
    }
}
