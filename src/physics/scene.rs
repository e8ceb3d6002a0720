//! 物理引擎协作接口
//!
//! 同步层只通过 PhysicsScene 访问底层物理引擎。
//! RapierScene 是基于 rapier3d 的实现，测试中可替换为模拟实现。

use glam::{Mat4, Quat, Vec3};

use super::setup::{AngularLimits, JointKind, ShapeElem};

/// 物理世界中的刚体句柄（区别于场景中的 Actor）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub u64);

/// 物理世界中的关节句柄
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JointHandle(pub u64);

/// 刚体类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum BodyKind {
    /// 静态刚体
    Static,
    /// 动态刚体（由物理模拟驱动）
    #[default]
    Dynamic,
    /// 运动学刚体（跟随骨骼/组件）
    Kinematic,
}

/// 刚体位姿（旋转 + 平移，不含缩放）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RigidPose {
    pub rotation: Quat,
    pub translation: Vec3,
}

impl Default for RigidPose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl RigidPose {
    pub const IDENTITY: Self = Self { rotation: Quat::IDENTITY, translation: Vec3::ZERO };

    pub fn new(rotation: Quat, translation: Vec3) -> Self {
        Self { rotation, translation }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self { rotation: Quat::IDENTITY, translation }
    }

    /// 从矩阵取刚体部分（丢弃缩放）
    pub fn from_matrix(m: Mat4) -> Self {
        let (rotation, translation) = crate::skeleton::rigid_parts(m);
        Self { rotation, translation }
    }

    #[inline]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.translation)
    }

    /// self * other
    #[inline]
    pub fn mul(&self, other: &RigidPose) -> RigidPose {
        RigidPose {
            rotation: (self.rotation * other.rotation).normalize(),
            translation: self.translation + self.rotation * other.translation,
        }
    }

    #[inline]
    pub fn inverse(&self) -> RigidPose {
        let rotation = self.rotation.inverse();
        RigidPose { rotation, translation: -(rotation * self.translation) }
    }

    /// 位置与旋转在容差内相等
    pub fn abs_diff_eq(&self, other: &RigidPose, epsilon: f32) -> bool {
        self.translation.abs_diff_eq(other.translation, epsilon)
            && (self.rotation.dot(other.rotation).abs() - 1.0).abs() <= epsilon
    }
}

/// 刚体创建参数
#[derive(Clone, Copy, Debug)]
pub struct ActorDesc {
    pub kind: BodyKind,
    pub pose: RigidPose,
    /// 写入底层引擎的用户数据（调试/回查用）
    pub user_data: u128,
}

/// 关节创建参数
#[derive(Clone, Copy, Debug)]
pub struct JointDesc {
    pub kind: JointKind,
    pub actor_a: BodyHandle,
    pub actor_b: BodyHandle,
    /// 关节坐标系在 A 刚体坐标系中的位姿
    pub frame_a: RigidPose,
    /// 关节坐标系在 B 刚体坐标系中的位姿
    pub frame_b: RigidPose,
    pub limits: AngularLimits,
}

/// 物理引擎协作接口
///
/// 创建失败返回 None，由调用方跳过该刚体/关节。
pub trait PhysicsScene: Send + Sync {
    fn create_actor(&mut self, desc: &ActorDesc) -> Option<BodyHandle>;
    fn attach_shape(&mut self, actor: BodyHandle, shape: &ShapeElem, density: f32) -> bool;
    fn create_joint(&mut self, desc: &JointDesc) -> Option<JointHandle>;
    fn remove_actor(&mut self, actor: BodyHandle) -> bool;
    fn remove_joint(&mut self, joint: JointHandle) -> bool;

    fn actor_pose(&self, actor: BodyHandle) -> Option<RigidPose>;
    fn set_actor_pose(&mut self, actor: BodyHandle, pose: RigidPose) -> bool;
    fn actor_kind(&self, actor: BodyHandle) -> Option<BodyKind>;
    fn set_actor_kind(&mut self, actor: BodyHandle, kind: BodyKind) -> bool;
    fn user_data(&self, actor: BodyHandle) -> Option<u128>;

    fn actor_count(&self) -> usize;
    fn joint_count(&self) -> usize;

    /// 推进模拟
    fn simulate(&mut self, delta_time: f32);
    /// 模拟结果可读（同步实现中为空操作）
    fn fetch_results(&mut self) {}
}
