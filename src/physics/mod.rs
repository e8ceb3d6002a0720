//! 物理系统
//!
//! - config: 物理/布娃娃配置
//! - setup: 物理资源（BodySetup / ConstraintSetup / PhysicsAsset）
//! - ragdoll: 按当前姿势生成胶囊刚体与关节
//! - scene: 物理引擎协作接口
//! - rapier_scene: rapier3d 实现
//! - system: 同步层（flush → push → solve → pull）

pub mod config;
pub mod ragdoll;
pub mod rapier_scene;
pub mod scene;
pub mod setup;
pub mod system;

pub use config::{PhysicsConfig, RagdollConfig};
pub use ragdoll::{generate_constraints_for_all_bones, generate_ragdoll_body};
pub use rapier_scene::RapierScene;
pub use scene::{ActorDesc, BodyHandle, BodyKind, JointDesc, JointHandle, PhysicsScene, RigidPose};
pub use setup::{AngularLimits, BodySetup, ConstraintSetup, JointKind, PhysicsAsset, ShapeElem};
pub use system::PhysicsSystem;
