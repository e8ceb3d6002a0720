//! 物理资源：刚体设置 / 关节设置
//!
//! 刚体和关节都按骨骼名称引用骨骼（名称能经受骨骼重新导入后的索引变化）。

use glam::Vec3;

use super::scene::{BodyKind, RigidPose};

/// 形状图元（位姿相对骨骼的刚体坐标系）
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ShapeElem {
    Sphere { center: Vec3, radius: f32 },
    Box { pose: RigidPose, half_extents: Vec3 },
    /// 胶囊沿局部 Y 轴，length 为圆柱段长度（不含两端半球）
    Capsule { pose: RigidPose, radius: f32, length: f32 },
}

impl ShapeElem {
    /// 形状中心（骨骼坐标系）
    pub fn center(&self) -> Vec3 {
        match self {
            ShapeElem::Sphere { center, .. } => *center,
            ShapeElem::Box { pose, .. } | ShapeElem::Capsule { pose, .. } => pose.translation,
        }
    }
}

/// 单根骨骼的刚体设置
#[derive(Clone, Debug, PartialEq)]
pub struct BodySetup {
    pub bone_name: String,
    pub elems: Vec<ShapeElem>,
    pub kind: BodyKind,
}

impl BodySetup {
    pub fn new(bone_name: impl Into<String>) -> Self {
        Self { bone_name: bone_name.into(), elems: Vec::new(), kind: BodyKind::Dynamic }
    }
}

/// 角度限制（度）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AngularLimits {
    pub swing1_degrees: f32,
    pub swing2_degrees: f32,
    pub twist_degrees: f32,
}

impl Default for AngularLimits {
    fn default() -> Self {
        Self { swing1_degrees: 45.0, swing2_degrees: 45.0, twist_degrees: 30.0 }
    }
}

/// 关节类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum JointKind {
    /// 锥形 + 扭转（D6，线性全锁）
    #[default]
    Cone,
    /// 单轴铰链（绕关节坐标系 X 轴，使用 twist 限制）
    Revolute,
}

/// 两根骨骼之间的关节设置
#[derive(Clone, Debug, PartialEq)]
pub struct ConstraintSetup {
    pub joint_name: String,
    /// 父侧骨骼
    pub bone_a: String,
    /// 子侧骨骼
    pub bone_b: String,
    /// 关节坐标系在 A 骨骼坐标系中的位姿
    pub transform_in_a: RigidPose,
    /// 关节坐标系在 B 骨骼坐标系中的位姿
    pub transform_in_b: RigidPose,
    pub limits: AngularLimits,
    pub kind: JointKind,
}

/// 物理资源：与骨骼网格一一对应
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PhysicsAsset {
    pub bodies: Vec<BodySetup>,
    pub constraints: Vec<ConstraintSetup>,
}

impl PhysicsAsset {
    pub fn new(bodies: Vec<BodySetup>, constraints: Vec<ConstraintSetup>) -> Self {
        Self { bodies, constraints }
    }

    pub fn find_body(&self, bone_name: &str) -> Option<&BodySetup> {
        self.bodies.iter().find(|b| b.bone_name == bone_name)
    }

    pub fn find_body_mut(&mut self, bone_name: &str) -> Option<&mut BodySetup> {
        self.bodies.iter_mut().find(|b| b.bone_name == bone_name)
    }

    /// 删除刚体以及所有引用它的关节
    pub fn remove_body(&mut self, bone_name: &str) -> bool {
        let before = self.bodies.len();
        self.bodies.retain(|b| b.bone_name != bone_name);
        self.constraints.retain(|c| c.bone_a != bone_name && c.bone_b != bone_name);
        self.bodies.len() != before
    }
}
