//! 场景组件

use glam::Mat4;

use super::ActorHandle;
use crate::component::SkeletalMeshComponent;
use crate::skeleton::BoneTransform;

/// 交互编辑目标
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditTarget {
    /// 整个组件（组件变换）
    Component,
    /// 组件内的单根骨骼
    Bone(String),
}

/// 组件种类（封闭集合）
#[derive(Debug)]
pub enum ComponentKind {
    /// 普通图元（只有组件变换）
    Primitive,
    SkeletalMesh(Box<SkeletalMeshComponent>),
}

/// 场景组件
#[derive(Debug)]
pub struct SceneComponent {
    pub name: String,
    /// 所属 Actor（弱引用，Actor 删除后失效）
    pub owner: Option<ActorHandle>,
    /// 组件到世界变换
    pub transform: BoneTransform,
    pub kind: ComponentKind,
    edit: Option<EditTarget>,
}

impl SceneComponent {
    pub fn primitive(name: impl Into<String>) -> Self {
        Self::new(name, ComponentKind::Primitive)
    }

    pub fn skeletal_mesh(name: impl Into<String>, component: SkeletalMeshComponent) -> Self {
        Self::new(name, ComponentKind::SkeletalMesh(Box::new(component)))
    }

    pub fn new(name: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            name: name.into(),
            owner: None,
            transform: BoneTransform::IDENTITY,
            kind,
            edit: None,
        }
    }

    pub fn with_transform(mut self, transform: BoneTransform) -> Self {
        self.transform = transform;
        self
    }

    #[inline]
    pub fn component_to_world(&self) -> Mat4 {
        self.transform.to_matrix()
    }

    pub fn as_skeletal_mesh(&self) -> Option<&SkeletalMeshComponent> {
        match &self.kind {
            ComponentKind::SkeletalMesh(c) => Some(&**c),
            ComponentKind::Primitive => None,
        }
    }

    pub fn as_skeletal_mesh_mut(&mut self) -> Option<&mut SkeletalMeshComponent> {
        match &mut self.kind {
            ComponentKind::SkeletalMesh(c) => Some(&mut **c),
            ComponentKind::Primitive => None,
        }
    }

    pub fn edit_target(&self) -> Option<&EditTarget> {
        self.edit.as_ref()
    }

    #[inline]
    pub fn is_being_edited(&self) -> bool {
        self.edit.is_some()
    }

    /// 某个刚体所有者（组件本身或组件内的骨骼）是否处于交互编辑中
    ///
    /// 编辑整个组件时组件内所有刚体都视为被编辑。
    pub fn is_under_edit(&self, bone_name: Option<&str>) -> bool {
        match (&self.edit, bone_name) {
            (None, _) => false,
            (Some(EditTarget::Component), _) => true,
            (Some(EditTarget::Bone(edited)), Some(name)) => edited == name,
            (Some(EditTarget::Bone(_)), None) => false,
        }
    }

    pub(super) fn set_edit(&mut self, target: Option<EditTarget>) {
        self.edit = target;
    }
}
