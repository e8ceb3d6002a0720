//! 物理配置
//!
//! 所有参数扁平化，默认值直接写在 Default 里。
//! 配置由 Engine 持有并显式传入，不使用全局实例。

/// 物理模拟配置（扁平化，不嵌套）
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsConfig {
    // ========== 重力 ==========
    /// 重力 Y 分量（负数向下），默认 -9.81
    pub gravity_y: f32,

    // ========== 模拟参数 ==========
    /// 物理 FPS（固定子步长 = 1 / physics_fps），默认 60.0
    pub physics_fps: f32,
    /// 每帧最大子步数，默认 5
    pub max_substep_count: u32,

    // ========== 速度限制 ==========
    /// 最大线速度 (m/s)，默认 50.0
    pub max_linear_velocity: f32,
    /// 最大角速度 (rad/s)，默认 20.0
    pub max_angular_velocity: f32,

    // ========== 刚体 ==========
    /// 动态刚体形状密度（kg/m³），默认 1000.0
    pub shape_density: f32,

    // ========== 调试 ==========
    /// 是否启用关节，默认 true
    pub joints_enabled: bool,
    /// 是否输出调试日志，默认 false
    pub debug_log: bool,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity_y: -9.81,

            // 越高越稳定，CPU 消耗也越大；建议 30~120
            physics_fps: 60.0,
            max_substep_count: 5,

            // 防止卡顿帧或穿透恢复力导致的物理爆炸
            max_linear_velocity: 50.0,
            max_angular_velocity: 20.0,

            shape_density: 1000.0,

            joints_enabled: true,
            debug_log: false,
        }
    }
}

impl PhysicsConfig {
    /// 固定子步长
    #[inline]
    pub fn fixed_time_step(&self) -> f32 {
        1.0 / self.physics_fps.max(1.0)
    }
}

/// 布娃娃生成配置
#[derive(Debug, Clone, PartialEq)]
pub struct RagdollConfig {
    /// 胶囊半径上限，默认 0.15
    pub max_capsule_radius: f32,
    /// 胶囊半径下限（零长度骨骼也不会生成退化形状），默认 0.02
    pub min_capsule_radius: f32,
    /// 默认摆动角限制 1（度），默认 45
    pub default_swing1_degrees: f32,
    /// 默认摆动角限制 2（度），默认 45
    pub default_swing2_degrees: f32,
    /// 默认扭转角限制（度），默认 30
    pub default_twist_degrees: f32,
}

impl Default for RagdollConfig {
    fn default() -> Self {
        Self {
            max_capsule_radius: 0.15,
            min_capsule_radius: 0.02,
            default_swing1_degrees: 45.0,
            default_swing2_degrees: 45.0,
            default_twist_degrees: 30.0,
        }
    }
}
