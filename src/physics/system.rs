//! 物理同步层
//!
//! 每帧流程：flush（待删除 → 待添加）→ push（所有者姿势写入刚体）
//! → solve（模拟）→ pull（动态刚体姿势写回所有者）。
//! 场景放在 RwLock 中：读姿势取读锁，结构修改与步进取写锁，锁不跨帧持有。

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use glam::{Mat4, Quat, Vec3};

use super::config::{PhysicsConfig, RagdollConfig};
use super::ragdoll::{generate_constraints_for_all_bones, generate_ragdoll_body};
use super::rapier_scene::RapierScene;
use super::scene::{ActorDesc, BodyHandle, BodyKind, JointDesc, JointHandle, PhysicsScene, RigidPose};
use super::setup::{PhysicsAsset, ShapeElem};
use crate::scene::{ComponentHandle, SceneComponent, World};

/// 位姿比较容差（脏检查）
const POSE_EPSILON: f32 = 1e-4;

/// 同步层中的一个刚体
#[derive(Clone, Debug)]
struct PhysicsBody {
    owner: ComponentHandle,
    /// None 表示跟随组件变换，Some 表示跟随该骨骼
    bone_name: Option<String>,
    actor: BodyHandle,
    /// 创建时的刚体类型（编辑结束后恢复）
    kind: BodyKind,
    /// 编辑期间被切换为运动学锚点
    anchored: bool,
    /// 上次同步（推送或回读）时的位姿
    last_synced: Option<RigidPose>,
}

#[derive(Clone, Debug)]
struct PhysicsJoint {
    owner: ComponentHandle,
    joint: JointHandle,
}

/// 待添加项
#[derive(Clone, Debug)]
enum PendingAdd {
    Body {
        owner: ComponentHandle,
        bone_name: Option<String>,
        kind: BodyKind,
        shapes: Vec<ShapeElem>,
    },
    Ragdoll {
        owner: ComponentHandle,
        config: RagdollConfig,
    },
}

/// 已创建的刚体与关节（与场景锁分开持有，便于在持锁时修改）
#[derive(Debug, Default)]
struct BodyRegistry {
    bodies: Vec<PhysicsBody>,
    joints: Vec<PhysicsJoint>,
}

/// 物理同步系统
pub struct PhysicsSystem {
    scene: RwLock<Box<dyn PhysicsScene>>,
    config: PhysicsConfig,
    registry: BodyRegistry,
    pending_add: Vec<PendingAdd>,
    pending_remove: Vec<ComponentHandle>,
}

impl std::fmt::Debug for PhysicsSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsSystem")
            .field("bodies", &self.registry.bodies.len())
            .field("joints", &self.registry.joints.len())
            .field("pending_add", &self.pending_add.len())
            .field("pending_remove", &self.pending_remove.len())
            .finish()
    }
}

// ============================================================================
// 所有者姿势读写
// ============================================================================

/// 所有者当前的世界姿势（组件变换或骨骼全局变换）
fn owner_pose(component: &SceneComponent, bone_name: Option<&str>) -> Option<RigidPose> {
    match bone_name {
        None => Some(RigidPose::new(component.transform.rotation, component.transform.translation)),
        Some(name) => {
            let skeletal = component.as_skeletal_mesh()?;
            let index = skeletal.find_bone_index(name)?;
            skeletal
                .bone_world_matrix(index, component.component_to_world())
                .map(RigidPose::from_matrix)
        }
    }
}

/// 把刚体姿势写回所有者（平移 + 旋转，缩放不变）
///
/// 骨骼按索引顺序写入，父骨骼先于子骨骼。
fn apply_poses_to_owners(world: &mut World, results: &[(ComponentHandle, Option<String>, RigidPose)]) {
    let mut bone_poses: HashMap<ComponentHandle, Vec<(usize, Quat, Vec3)>> = HashMap::new();

    for (owner, bone_name, pose) in results {
        let Some(component) = world.component_mut(*owner) else {
            continue;
        };
        match bone_name {
            None => {
                component.transform.translation = pose.translation;
                component.transform.rotation = pose.rotation;
            }
            Some(name) => {
                let Some(index) = component.as_skeletal_mesh().and_then(|s| s.find_bone_index(name)) else {
                    continue;
                };
                bone_poses.entry(*owner).or_default().push((index, pose.rotation, pose.translation));
            }
        }
    }

    for (owner, mut poses) in bone_poses {
        let Some(component) = world.component_mut(owner) else {
            continue;
        };
        let component_to_world = component.component_to_world();
        if let Some(skeletal) = component.as_skeletal_mesh_mut() {
            poses.sort_by_key(|(index, _, _)| *index);
            skeletal.apply_bone_world_poses(component_to_world, &poses);
        }
    }
}

#[inline]
fn encode_user_data(owner: ComponentHandle, bone_index: Option<usize>) -> u128 {
    let bone = bone_index.map(|i| i as u128 + 1).unwrap_or(0);
    ((owner.to_bits() as u128) << 64) | bone
}

impl BodyRegistry {
    fn find_body(&self, owner: ComponentHandle, bone_name: Option<&str>) -> Option<&PhysicsBody> {
        self.bodies
            .iter()
            .find(|b| b.owner == owner && b.bone_name.as_deref() == bone_name)
    }

    fn remove_owner(
        &mut self,
        scene: &mut dyn PhysicsScene,
        world: &mut World,
        owner: ComponentHandle,
        physics: &PhysicsConfig,
    ) {
        let mut removed_joints = 0;
        self.joints.retain(|j| {
            if j.owner == owner {
                scene.remove_joint(j.joint);
                removed_joints += 1;
                false
            } else {
                true
            }
        });

        let mut removed_bodies = 0;
        self.bodies.retain(|b| {
            if b.owner == owner {
                scene.remove_actor(b.actor);
                removed_bodies += 1;
                false
            } else {
                true
            }
        });

        if let Some(skeletal) = world.component_mut(owner).and_then(|c| c.as_skeletal_mesh_mut()) {
            skeletal.clear_physics_owned_bones();
        }

        if physics.debug_log {
            log::debug!("[物理] 删除组件刚体: {} 刚体, {} 关节", removed_bodies, removed_joints);
        }
    }

    fn add_body(
        &mut self,
        scene: &mut dyn PhysicsScene,
        world: &World,
        owner: ComponentHandle,
        bone_name: Option<String>,
        kind: BodyKind,
        shapes: &[ShapeElem],
        physics: &PhysicsConfig,
    ) -> Option<BodyHandle> {
        if self.find_body(owner, bone_name.as_deref()).is_some() {
            log::warn!("[物理] 刚体已存在，跳过: {:?}", bone_name);
            return None;
        }
        let component = world.component(owner)?;
        let pose = owner_pose(component, bone_name.as_deref())?;
        let bone_index = bone_name
            .as_deref()
            .and_then(|name| component.as_skeletal_mesh()?.find_bone_index(name));

        let Some(actor) = scene.create_actor(&ActorDesc {
            kind,
            pose,
            user_data: encode_user_data(owner, bone_index),
        }) else {
            log::warn!("[物理] 刚体 '{}' 创建失败，跳过", bone_name.as_deref().unwrap_or(&component.name));
            return None;
        };
        for shape in shapes {
            if !scene.attach_shape(actor, shape, physics.shape_density) {
                log::warn!("[物理] 形状附加失败: {:?}", shape);
            }
        }

        self.bodies.push(PhysicsBody {
            owner,
            bone_name,
            actor,
            kind,
            anchored: false,
            last_synced: Some(pose),
        });
        Some(actor)
    }

    /// 布娃娃实例化
    ///
    /// 每个骨骼存在的 BodySetup 建一个刚体；两端骨骼和刚体都存在的关节才创建，
    /// 其余关节静默跳过。
    fn instantiate_ragdoll(
        &mut self,
        scene: &mut dyn PhysicsScene,
        world: &mut World,
        owner: ComponentHandle,
        config: &RagdollConfig,
        physics: &PhysicsConfig,
    ) {
        let Some(component) = world.component(owner) else {
            return;
        };
        let Some(skeletal) = component.as_skeletal_mesh() else {
            log::warn!("[物理] 组件 '{}' 不是骨骼网格，无法创建布娃娃", component.name);
            return;
        };
        let Some(mesh) = skeletal.skeletal_mesh().cloned() else {
            return;
        };

        let component_space = skeletal.component_space_bone_matrices();
        let asset = mesh.physics_asset_or_insert_with(|skeleton| {
            let reference = skeleton.reference();
            let bodies = generate_ragdoll_body(reference, &component_space, config);
            let constraints = generate_constraints_for_all_bones(reference, &bodies, &component_space, config);
            PhysicsAsset::new(bodies, constraints)
        });

        let reference = mesh.skeleton().reference();
        let mut actors_by_bone: HashMap<&str, BodyHandle> = HashMap::new();
        let mut owned_bones = Vec::new();

        for setup in &asset.bodies {
            let Some(index) = reference.find_bone_index(&setup.bone_name) else {
                log::debug!("[物理] 刚体骨骼 '{}' 不存在，跳过", setup.bone_name);
                continue;
            };
            let actor = match self.find_body(owner, Some(&setup.bone_name)) {
                Some(existing) => Some(existing.actor),
                None => self.add_body(
                    scene,
                    world,
                    owner,
                    Some(setup.bone_name.clone()),
                    setup.kind,
                    &setup.elems,
                    physics,
                ),
            };
            let Some(actor) = actor else {
                continue;
            };
            actors_by_bone.insert(setup.bone_name.as_str(), actor);
            if setup.kind == BodyKind::Dynamic {
                owned_bones.push(index);
            }
        }

        // 重复实例化：刚体已复用，关节不再重复创建
        let has_joints = self.joints.iter().any(|j| j.owner == owner);
        if has_joints {
            log::warn!("[物理] 组件 {:?} 已有布娃娃关节，跳过关节创建", owner);
        }

        let mut joint_count = 0;
        for constraint in asset.constraints.iter().filter(|_| !has_joints) {
            let resolved = reference.find_bone_index(&constraint.bone_a).is_some()
                && reference.find_bone_index(&constraint.bone_b).is_some();
            let actors = (
                actors_by_bone.get(constraint.bone_a.as_str()),
                actors_by_bone.get(constraint.bone_b.as_str()),
            );
            let (true, (Some(&actor_a), Some(&actor_b))) = (resolved, actors) else {
                log::debug!("[物理] 关节 '{}' 引用的骨骼或刚体不存在，跳过", constraint.joint_name);
                continue;
            };

            let desc = JointDesc {
                kind: constraint.kind,
                actor_a,
                actor_b,
                frame_a: constraint.transform_in_a,
                frame_b: constraint.transform_in_b,
                limits: constraint.limits,
            };
            match scene.create_joint(&desc) {
                Some(joint) => {
                    self.joints.push(PhysicsJoint { owner, joint });
                    joint_count += 1;
                }
                None => log::debug!("[物理] 关节 '{}' 创建失败，跳过", constraint.joint_name),
            }
        }

        if let Some(skeletal) = world.component_mut(owner).and_then(|c| c.as_skeletal_mesh_mut()) {
            skeletal.set_physics_owned_bones(owned_bones);
        }

        log::info!(
            "[物理] 布娃娃实例化完成: {} 刚体, {} 关节",
            actors_by_bone.len(),
            joint_count
        );
    }
}

impl PhysicsSystem {
    /// 使用 rapier3d 场景创建
    pub fn new(config: PhysicsConfig) -> Self {
        let scene = RapierScene::new(&config);
        Self::with_scene(Box::new(scene), config)
    }

    /// 使用自定义物理场景创建
    pub fn with_scene(scene: Box<dyn PhysicsScene>, config: PhysicsConfig) -> Self {
        Self {
            scene: RwLock::new(scene),
            config,
            registry: BodyRegistry::default(),
            pending_add: Vec::new(),
            pending_remove: Vec::new(),
        }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// 场景读锁（中毒时恢复）
    pub fn scene(&self) -> RwLockReadGuard<'_, Box<dyn PhysicsScene>> {
        self.scene.read().unwrap_or_else(|e| e.into_inner())
    }

    fn scene_mut(&self) -> RwLockWriteGuard<'_, Box<dyn PhysicsScene>> {
        self.scene.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn body_count(&self) -> usize {
        self.registry.bodies.len()
    }

    pub fn joint_count(&self) -> usize {
        self.registry.joints.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending_add.is_empty() || !self.pending_remove.is_empty()
    }

    /// 所有者对应的刚体句柄
    pub fn body_handle(&self, owner: ComponentHandle, bone_name: Option<&str>) -> Option<BodyHandle> {
        self.registry.find_body(owner, bone_name).map(|b| b.actor)
    }

    // ========================================
    // 排队（下次 flush 时生效）
    // ========================================

    /// 为组件（bone_name 为 None）或其骨骼创建刚体
    pub fn spawn_body(
        &mut self,
        owner: ComponentHandle,
        bone_name: Option<String>,
        kind: BodyKind,
        shapes: Vec<ShapeElem>,
    ) {
        self.pending_add.push(PendingAdd::Body { owner, bone_name, kind, shapes });
    }

    /// 为骨骼网格组件实例化布娃娃（物理资源不存在时按当前姿势生成）
    pub fn spawn_ragdoll(&mut self, owner: ComponentHandle, config: &RagdollConfig) {
        self.pending_add.push(PendingAdd::Ragdoll { owner, config: config.clone() });
    }

    /// 删除组件的所有刚体和关节
    pub fn remove_component_bodies(&mut self, owner: ComponentHandle) {
        self.pending_remove.push(owner);
    }

    // ========================================
    // 每帧流程
    // ========================================

    /// 完整的一帧：flush → push → solve → pull
    pub fn step(&mut self, world: &mut World, delta_time: f32) {
        self.flush(world);
        self.push(world);
        self.solve(delta_time);
        self.pull(world);
    }

    /// 处理待删除和待添加（删除先于添加，都在推送之前）
    pub fn flush(&mut self, world: &mut World) {
        // 所有者已不存在的刚体一并删除
        let mut removals = std::mem::take(&mut self.pending_remove);
        for body in &self.registry.bodies {
            if !world.contains_component(body.owner) && !removals.contains(&body.owner) {
                removals.push(body.owner);
            }
        }
        let additions = std::mem::take(&mut self.pending_add);
        if removals.is_empty() && additions.is_empty() {
            return;
        }

        let mut scene = self.scene.write().unwrap_or_else(|e| e.into_inner());
        let registry = &mut self.registry;
        let physics = &self.config;

        for owner in removals {
            registry.remove_owner(scene.as_mut(), world, owner, physics);
        }

        for pending in additions {
            match pending {
                PendingAdd::Body { owner, bone_name, kind, shapes } => {
                    registry.add_body(scene.as_mut(), world, owner, bone_name, kind, &shapes, physics);
                }
                PendingAdd::Ragdoll { owner, config } => {
                    registry.instantiate_ragdoll(scene.as_mut(), world, owner, &config, physics);
                }
            }
        }
    }

    /// 所有者姿势写入刚体
    ///
    /// 运动学刚体每帧写入；动态刚体只在所有者自上次同步后移动过时写入。
    /// 处于编辑中的所有者不写入，其刚体切换为运动学锚点，编辑结束后恢复。
    pub fn push(&mut self, world: &World) {
        let mut scene = self.scene.write().unwrap_or_else(|e| e.into_inner());

        for body in &mut self.registry.bodies {
            let Some(component) = world.component(body.owner) else {
                continue;
            };
            let under_edit = component.is_under_edit(body.bone_name.as_deref());

            if under_edit {
                if !body.anchored && body.kind != BodyKind::Kinematic {
                    scene.set_actor_kind(body.actor, BodyKind::Kinematic);
                    body.anchored = true;
                }
                continue;
            }

            let Some(pose) = owner_pose(component, body.bone_name.as_deref()) else {
                continue;
            };

            if body.anchored {
                // 编辑结束：先恢复类型再写入姿势，从编辑后的位置继续模拟
                scene.set_actor_kind(body.actor, body.kind);
                scene.set_actor_pose(body.actor, pose);
                body.anchored = false;
                body.last_synced = Some(pose);
                continue;
            }

            let dirty = match body.kind {
                BodyKind::Kinematic => true,
                BodyKind::Dynamic => body
                    .last_synced
                    .map_or(true, |last| !last.abs_diff_eq(&pose, POSE_EPSILON)),
                BodyKind::Static => false,
            };
            if dirty {
                scene.set_actor_pose(body.actor, pose);
                body.last_synced = Some(pose);
            }
        }
    }

    /// 模拟
    pub fn solve(&mut self, delta_time: f32) {
        let mut scene = self.scene_mut();
        scene.simulate(delta_time);
        scene.fetch_results();
    }

    /// 动态刚体姿势写回所有者（编辑中的所有者跳过）
    pub fn pull(&mut self, world: &mut World) {
        let results = self.collect_dynamic_poses(world);
        for (owner, bone_name, pose) in &results {
            if let Some(body) = self
                .registry
                .bodies
                .iter_mut()
                .find(|b| b.owner == *owner && b.bone_name == *bone_name)
            {
                body.last_synced = Some(*pose);
            }
        }
        apply_poses_to_owners(world, &results);
    }

    /// 只读回读：在读锁下把动态刚体姿势写到组件，不修改同步记录
    pub fn update_visuals(&self, world: &mut World) {
        let results = self.collect_dynamic_poses(world);
        apply_poses_to_owners(world, &results);
    }

    fn collect_dynamic_poses(&self, world: &World) -> Vec<(ComponentHandle, Option<String>, RigidPose)> {
        let scene = self.scene();
        self.registry
            .bodies
            .iter()
            .filter(|b| b.kind == BodyKind::Dynamic && !b.anchored)
            .filter(|b| {
                world
                    .component(b.owner)
                    .is_some_and(|c| !c.is_under_edit(b.bone_name.as_deref()))
            })
            .filter_map(|b| {
                let pose = scene.actor_pose(b.actor)?;
                Some((b.owner, b.bone_name.clone(), pose))
            })
            .collect()
    }

    /// 读取刚体当前位姿（读锁）
    pub fn read_pose(&self, owner: ComponentHandle, bone_name: Option<&str>) -> Option<RigidPose> {
        let actor = self.registry.find_body(owner, bone_name)?.actor;
        self.scene().actor_pose(actor)
    }

    /// 读取刚体当前位姿的矩阵形式
    pub fn read_pose_matrix(&self, owner: ComponentHandle, bone_name: Option<&str>) -> Option<Mat4> {
        self.read_pose(owner, bone_name).map(|p| p.to_matrix())
    }
}
