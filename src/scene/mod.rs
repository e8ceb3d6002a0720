//! 场景：组件容器
//!
//! World 用代际句柄管理组件与 Actor；组件只以 ActorHandle 弱引用所属 Actor，
//! 不形成所有权环。

mod component;
mod world;

pub use component::{ComponentKind, EditTarget, SceneComponent};
pub use world::{Actor, World};

/// 组件句柄（索引 + 代数，槽位复用后旧句柄失效）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentHandle {
    index: u32,
    generation: u32,
}

impl ComponentHandle {
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// 打包为 64 位（高 32 位代数，低 32 位索引）
    #[inline]
    pub fn to_bits(&self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    #[inline]
    pub fn from_bits(bits: u64) -> Self {
        Self { index: bits as u32, generation: (bits >> 32) as u32 }
    }
}

/// 场景 Actor 句柄
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorHandle {
    index: u32,
    generation: u32,
}

impl ActorHandle {
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}
