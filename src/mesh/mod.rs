//! 蒙皮网格
//!
//! - binding: 把原始多边形顶点绑定到参考骨骼（每顶点最多 4 个影响骨骼）
//! - skinning: CPU 蒙皮（rayon 并行）
//! - SkeletalMesh: 骨骼网格资源（引用骨骼，懒创建物理资源）

pub mod binding;
pub mod skinning;

pub use binding::{bind_skinned_mesh, BindOptions, PolygonVertex, RawMeshSource, SkinCluster};
pub use skinning::{skin_vertices, SkinnedOutput};

use std::sync::{Arc, RwLock};

use glam::{Vec2, Vec3, Vec4};

use crate::physics::PhysicsAsset;
use crate::skeleton::Skeleton;

/// 每顶点最大骨骼影响数
pub const MAX_BONE_INFLUENCES: usize = 4;

/// 蒙皮顶点
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SkinnedVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tangent: Vec3,
    pub color: Vec4,
    pub uv: Vec2,
    pub bone_indices: [u32; MAX_BONE_INFLUENCES],
    /// 归一化后和为 1；未使用的槽位权重为 0
    pub bone_weights: [f32; MAX_BONE_INFLUENCES],
}

impl Default for SkinnedVertex {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            normal: Vec3::Y,
            tangent: Vec3::X,
            color: Vec4::ONE,
            uv: Vec2::ZERO,
            bone_indices: [0; MAX_BONE_INFLUENCES],
            bone_weights: [0.0; MAX_BONE_INFLUENCES],
        }
    }
}

impl SkinnedVertex {
    /// 是否有任何非零影响
    #[inline]
    pub fn is_skinned(&self) -> bool {
        self.bone_weights.iter().any(|w| *w > 0.0)
    }
}

/// 渲染数据块（顶点 + 索引）
#[derive(Clone, Debug, Default)]
pub struct SkinnedMeshRenderData {
    pub vertices: Vec<SkinnedVertex>,
    pub indices: Vec<u32>,
}

impl SkinnedMeshRenderData {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// 材质描述（具体着色由渲染端负责）
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaterialDesc {
    pub name: String,
    pub diffuse_color: Vec4,
    pub diffuse_texture: Option<String>,
}

/// 骨骼网格资源
///
/// 只引用骨骼（不拥有）；物理资源在第一次请求时创建，可整体替换。
#[derive(Debug)]
pub struct SkeletalMesh {
    pub name: String,
    skeleton: Arc<Skeleton>,
    pub render_data: Vec<SkinnedMeshRenderData>,
    pub materials: Vec<MaterialDesc>,
    physics_asset: RwLock<Option<Arc<PhysicsAsset>>>,
}

impl SkeletalMesh {
    pub fn new(name: impl Into<String>, skeleton: Arc<Skeleton>) -> Self {
        Self {
            name: name.into(),
            skeleton,
            render_data: Vec::new(),
            materials: Vec::new(),
            physics_asset: RwLock::new(None),
        }
    }

    pub fn with_render_data(mut self, data: SkinnedMeshRenderData) -> Self {
        self.render_data.push(data);
        self
    }

    pub fn skeleton(&self) -> &Arc<Skeleton> {
        &self.skeleton
    }

    /// 当前物理资源（未创建时为 None）
    pub fn physics_asset(&self) -> Option<Arc<PhysicsAsset>> {
        self.physics_asset.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// 获取物理资源，不存在时用 `create` 创建
    pub fn physics_asset_or_insert_with<F>(&self, create: F) -> Arc<PhysicsAsset>
    where
        F: FnOnce(&Skeleton) -> PhysicsAsset,
    {
        let mut slot = self.physics_asset.write().unwrap_or_else(|e| e.into_inner());
        if let Some(asset) = slot.as_ref() {
            return asset.clone();
        }
        let asset = Arc::new(create(&self.skeleton));
        log::info!(
            "[网格] '{}' 创建物理资源: {} 刚体, {} 关节",
            self.name,
            asset.bodies.len(),
            asset.constraints.len()
        );
        *slot = Some(asset.clone());
        asset
    }

    /// 整体替换物理资源（编辑器复制后回写）
    pub fn set_physics_asset(&self, asset: Option<PhysicsAsset>) {
        *self.physics_asset.write().unwrap_or_else(|e| e.into_inner()) = asset.map(Arc::new);
    }
}
