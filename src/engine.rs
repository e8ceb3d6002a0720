//! 引擎上下文
//!
//! 显式构造、显式传递，不使用全局实例。
//! 每帧先执行游戏/编辑阶段（动画求值），再执行物理阶段。

use crate::physics::{PhysicsConfig, PhysicsScene, PhysicsSystem, RagdollConfig};
use crate::scene::World;

/// 引擎配置
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    pub physics: PhysicsConfig,
    pub ragdoll: RagdollConfig,
}

/// 引擎
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    pub world: World,
    pub physics: PhysicsSystem,
    frame: u64,
}

impl Engine {
    /// 使用 rapier3d 物理场景创建
    pub fn new(config: EngineConfig) -> Self {
        let physics = PhysicsSystem::new(config.physics.clone());
        Self::from_parts(config, physics)
    }

    /// 使用自定义物理场景创建
    pub fn with_scene(config: EngineConfig, scene: Box<dyn PhysicsScene>) -> Self {
        let physics = PhysicsSystem::with_scene(scene, config.physics.clone());
        Self::from_parts(config, physics)
    }

    fn from_parts(config: EngineConfig, physics: PhysicsSystem) -> Self {
        log::info!(
            "[引擎] 创建: 物理 FPS={}, 重力Y={}",
            config.physics.physics_fps,
            config.physics.gravity_y
        );
        Self { config, world: World::new(), physics, frame: 0 }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 已执行的帧数
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// 为骨骼网格组件排队创建布娃娃（使用引擎的布娃娃配置）
    pub fn spawn_ragdoll(&mut self, component: crate::scene::ComponentHandle) {
        self.physics.spawn_ragdoll(component, &self.config.ragdoll);
    }

    /// 一帧：动画阶段 → 物理阶段
    pub fn tick(&mut self, delta_time: f32) {
        self.world.tick_animations(delta_time);
        self.physics.step(&mut self.world, delta_time);
        self.frame += 1;
    }
}
