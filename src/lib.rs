//! 骨骼动画与物理同步运行时
//!
//! 模块划分（依赖从叶到根）：
//! - skeleton: 参考骨骼、导入器
//! - mesh: 蒙皮网格绑定、CPU 蒙皮、骨骼网格资源
//! - animation: 动画序列、播放状态机、动画通知
//! - component: 骨骼网格组件（运行时姿势）
//! - physics: 刚体/关节设置、布娃娃生成、物理同步
//! - editor: 骨骼拾取与 Gizmo 操作
//! - scene / engine: 组件容器与 tick 循环

pub mod animation;
pub mod asset;
pub mod component;
pub mod editor;
pub mod engine;
pub mod mesh;
pub mod physics;
pub mod scene;
pub mod skeleton;

mod error;

pub use error::{EngineError, Result};
pub use engine::{Engine, EngineConfig};
