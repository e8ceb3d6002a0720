//! rapier3d 物理场景
//!
//! PhysicsScene 的默认实现：固定子步长步进 + 每步后速度钳制。

use std::collections::HashMap;

use glam::{Quat, Vec3};
use rapier3d::na::{Quaternion, Translation3, UnitQuaternion};
use rapier3d::prelude::*;

use super::config::PhysicsConfig;
use super::scene::{ActorDesc, BodyHandle, BodyKind, JointDesc, JointHandle, PhysicsScene, RigidPose};
use super::setup::{JointKind, ShapeElem};

// ============================================================================
// glam <-> nalgebra 转换
// ============================================================================

#[inline]
fn to_isometry(pose: &RigidPose) -> Isometry<Real> {
    let q = pose.rotation;
    Isometry::from_parts(
        Translation3::new(pose.translation.x, pose.translation.y, pose.translation.z),
        UnitQuaternion::from_quaternion(Quaternion::new(q.w, q.x, q.y, q.z)),
    )
}

#[inline]
fn from_isometry(iso: &Isometry<Real>) -> RigidPose {
    let c = iso.rotation.into_inner().coords;
    let t = iso.translation.vector;
    RigidPose::new(Quat::from_xyzw(c.x, c.y, c.z, c.w).normalize(), Vec3::new(t.x, t.y, t.z))
}

#[inline]
fn to_body_type(kind: BodyKind) -> RigidBodyType {
    match kind {
        BodyKind::Static => RigidBodyType::Fixed,
        BodyKind::Dynamic => RigidBodyType::Dynamic,
        BodyKind::Kinematic => RigidBodyType::KinematicPositionBased,
    }
}

#[inline]
fn from_body_type(ty: RigidBodyType) -> BodyKind {
    match ty {
        RigidBodyType::Fixed => BodyKind::Static,
        RigidBodyType::Dynamic => BodyKind::Dynamic,
        RigidBodyType::KinematicPositionBased | RigidBodyType::KinematicVelocityBased => BodyKind::Kinematic,
    }
}

/// rapier3d 物理场景
pub struct RapierScene {
    physics_pipeline: PhysicsPipeline,
    integration_parameters: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,

    gravity: Vector<Real>,
    fixed_time_step: f32,
    max_substep_count: u32,
    max_linear_velocity: f32,
    max_angular_velocity: f32,
    joints_enabled: bool,

    /// 外部句柄 → rapier 句柄
    actors: HashMap<BodyHandle, RigidBodyHandle>,
    joints: HashMap<JointHandle, ImpulseJointHandle>,
    next_id: u64,
}

impl RapierScene {
    pub fn new(config: &PhysicsConfig) -> Self {
        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.dt = config.fixed_time_step();

        if config.debug_log {
            log::info!(
                "[物理] rapier 场景创建: FPS={}, 重力Y={}, 最大子步={}",
                config.physics_fps,
                config.gravity_y,
                config.max_substep_count
            );
        }

        Self {
            physics_pipeline: PhysicsPipeline::new(),
            integration_parameters,
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            gravity: Vector::new(0.0, config.gravity_y, 0.0),
            fixed_time_step: config.fixed_time_step(),
            max_substep_count: config.max_substep_count,
            max_linear_velocity: config.max_linear_velocity,
            max_angular_velocity: config.max_angular_velocity,
            joints_enabled: config.joints_enabled,
            actors: HashMap::new(),
            joints: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = Vector::new(gravity.x, gravity.y, gravity.z);
    }

    /// 刚体当前线速度大小
    pub fn linear_speed(&self, actor: BodyHandle) -> Option<f32> {
        let handle = self.actors.get(&actor)?;
        self.rigid_body_set.get(*handle).map(|rb| rb.linvel().norm())
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// 限制动态刚体速度，防止穿透恢复力导致的物理爆炸
    fn clamp_velocities(&mut self) {
        let max_lin = self.max_linear_velocity;
        let max_ang = self.max_angular_velocity;

        for handle in self.actors.values() {
            let Some(rb) = self.rigid_body_set.get_mut(*handle) else {
                continue;
            };
            if !rb.is_dynamic() {
                continue;
            }

            let linvel = *rb.linvel();
            let lin = linvel.norm();
            if lin > max_lin {
                rb.set_linvel(linvel * (max_lin / lin), true);
            }

            let angvel = *rb.angvel();
            let ang = angvel.norm();
            if ang > max_ang {
                rb.set_angvel(angvel * (max_ang / ang), true);
            }
        }
    }
}

impl PhysicsScene for RapierScene {
    fn create_actor(&mut self, desc: &ActorDesc) -> Option<BodyHandle> {
        let body = RigidBodyBuilder::new(to_body_type(desc.kind))
            .position(to_isometry(&desc.pose))
            .user_data(desc.user_data)
            .build();
        let rb_handle = self.rigid_body_set.insert(body);
        let handle = BodyHandle(self.allocate_id());
        self.actors.insert(handle, rb_handle);
        Some(handle)
    }

    fn attach_shape(&mut self, actor: BodyHandle, shape: &ShapeElem, density: f32) -> bool {
        let Some(&rb_handle) = self.actors.get(&actor) else {
            return false;
        };
        let builder = match *shape {
            ShapeElem::Sphere { center, radius } if radius > 0.0 => {
                ColliderBuilder::ball(radius).position(to_isometry(&RigidPose::from_translation(center)))
            }
            ShapeElem::Box { pose, half_extents } if half_extents.min_element() > 0.0 => {
                ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z).position(to_isometry(&pose))
            }
            ShapeElem::Capsule { pose, radius, length } if radius > 0.0 => {
                ColliderBuilder::capsule_y(length.max(0.0) * 0.5, radius).position(to_isometry(&pose))
            }
            _ => return false,
        };
        let collider = builder.density(density).build();
        self.collider_set.insert_with_parent(collider, rb_handle, &mut self.rigid_body_set);
        true
    }

    fn create_joint(&mut self, desc: &JointDesc) -> Option<JointHandle> {
        if !self.joints_enabled {
            return None;
        }
        let body1 = *self.actors.get(&desc.actor_a)?;
        let body2 = *self.actors.get(&desc.actor_b)?;
        if body1 == body2 {
            return None;
        }

        let twist = desc.limits.twist_degrees.to_radians();
        let joint = match desc.kind {
            JointKind::Cone => {
                let swing1 = desc.limits.swing1_degrees.to_radians();
                let swing2 = desc.limits.swing2_degrees.to_radians();
                GenericJointBuilder::new(JointAxesMask::LOCKED_SPHERICAL_AXES)
                    .local_frame1(to_isometry(&desc.frame_a))
                    .local_frame2(to_isometry(&desc.frame_b))
                    .limits(JointAxis::AngX, [-twist, twist])
                    .limits(JointAxis::AngY, [-swing1, swing1])
                    .limits(JointAxis::AngZ, [-swing2, swing2])
                    .contacts_enabled(false)
                    .build()
            }
            JointKind::Revolute => GenericJointBuilder::new(JointAxesMask::LOCKED_REVOLUTE_AXES)
                .local_frame1(to_isometry(&desc.frame_a))
                .local_frame2(to_isometry(&desc.frame_b))
                .limits(JointAxis::AngX, [-twist, twist])
                .contacts_enabled(false)
                .build(),
        };

        let joint_handle = self.impulse_joint_set.insert(body1, body2, joint, true);
        let handle = JointHandle(self.allocate_id());
        self.joints.insert(handle, joint_handle);
        Some(handle)
    }

    fn remove_actor(&mut self, actor: BodyHandle) -> bool {
        let Some(rb_handle) = self.actors.remove(&actor) else {
            return false;
        };
        // 连带删除的关节需要从句柄表中剔除
        self.joints.retain(|_, joint| {
            self.impulse_joint_set
                .get(*joint)
                .is_some_and(|j| j.body1 != rb_handle && j.body2 != rb_handle)
        });
        self.rigid_body_set
            .remove(
                rb_handle,
                &mut self.island_manager,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                true,
            )
            .is_some()
    }

    fn remove_joint(&mut self, joint: JointHandle) -> bool {
        match self.joints.remove(&joint) {
            Some(handle) => self.impulse_joint_set.remove(handle, true).is_some(),
            None => false,
        }
    }

    fn actor_pose(&self, actor: BodyHandle) -> Option<RigidPose> {
        let handle = self.actors.get(&actor)?;
        self.rigid_body_set.get(*handle).map(|rb| from_isometry(rb.position()))
    }

    fn set_actor_pose(&mut self, actor: BodyHandle, pose: RigidPose) -> bool {
        let Some(handle) = self.actors.get(&actor) else {
            return false;
        };
        let Some(rb) = self.rigid_body_set.get_mut(*handle) else {
            return false;
        };
        let iso = to_isometry(&pose);
        if rb.is_kinematic() {
            rb.set_next_kinematic_position(iso);
        } else {
            rb.set_position(iso, true);
        }
        true
    }

    fn actor_kind(&self, actor: BodyHandle) -> Option<BodyKind> {
        let handle = self.actors.get(&actor)?;
        self.rigid_body_set.get(*handle).map(|rb| from_body_type(rb.body_type()))
    }

    fn set_actor_kind(&mut self, actor: BodyHandle, kind: BodyKind) -> bool {
        let Some(handle) = self.actors.get(&actor) else {
            return false;
        };
        match self.rigid_body_set.get_mut(*handle) {
            Some(rb) => {
                rb.set_body_type(to_body_type(kind), true);
                if kind != BodyKind::Dynamic {
                    rb.set_linvel(Vector::zeros(), false);
                    rb.set_angvel(Vector::zeros(), false);
                }
                true
            }
            None => false,
        }
    }

    fn user_data(&self, actor: BodyHandle) -> Option<u128> {
        let handle = self.actors.get(&actor)?;
        self.rigid_body_set.get(*handle).map(|rb| rb.user_data)
    }

    fn actor_count(&self) -> usize {
        self.actors.len()
    }

    fn joint_count(&self) -> usize {
        self.joints.len()
    }

    fn simulate(&mut self, delta_time: f32) {
        if delta_time <= 0.0 {
            return;
        }
        let fixed_dt = self.fixed_time_step;
        let substeps = ((delta_time / fixed_dt - 1e-3).ceil() as u32).clamp(1, self.max_substep_count.max(1));

        for _ in 0..substeps {
            self.physics_pipeline.step(
                &self.gravity,
                &self.integration_parameters,
                &mut self.island_manager,
                &mut self.broad_phase,
                &mut self.narrow_phase,
                &mut self.rigid_body_set,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                &mut self.ccd_solver,
                None,
                &(),
                &(),
            );
            self.clamp_velocities();
        }
    }
}
