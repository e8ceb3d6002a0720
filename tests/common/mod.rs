//! 集成测试共用：模拟物理场景与测试骨骼
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use glam::{Mat4, Quat, Vec3};

use skeletal_engine::mesh::SkeletalMesh;
use skeletal_engine::physics::{
    ActorDesc, BodyHandle, BodyKind, JointDesc, JointHandle, PhysicsScene, RigidPose, ShapeElem,
};
use skeletal_engine::skeleton::{BoneTransform, ReferenceSkeleton, Skeleton};

/// 模拟调用记录
#[derive(Clone, Debug, PartialEq)]
pub enum MockCall {
    CreateActor(BodyHandle),
    RemoveActor(BodyHandle),
    CreateJoint(JointHandle),
    SetPose(BodyHandle, RigidPose),
    SetKind(BodyHandle, BodyKind),
    Simulate,
}

#[derive(Clone, Debug)]
pub struct MockActor {
    pub kind: BodyKind,
    pub pose: RigidPose,
    pub user_data: u128,
    pub shapes: Vec<ShapeElem>,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub actors: HashMap<BodyHandle, MockActor>,
    pub joints: HashMap<JointHandle, (BodyHandle, BodyHandle)>,
    pub calls: Vec<MockCall>,
    next_id: u64,
}

impl MockState {
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn pose_writes(&self, actor: BodyHandle) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, MockCall::SetPose(a, _) if *a == actor))
            .count()
    }
}

/// 模拟物理场景：每次 simulate 把动态刚体沿 -Y 移动 drop_per_step
#[derive(Clone)]
pub struct MockScene {
    pub state: Arc<Mutex<MockState>>,
    pub drop_per_step: f32,
}

impl MockScene {
    pub fn new() -> Self {
        Self { state: Arc::new(Mutex::new(MockState::default())), drop_per_step: 0.1 }
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

impl PhysicsScene for MockScene {
    fn create_actor(&mut self, desc: &ActorDesc) -> Option<BodyHandle> {
        let mut state = self.state();
        state.next_id += 1;
        let handle = BodyHandle(state.next_id);
        state.actors.insert(
            handle,
            MockActor { kind: desc.kind, pose: desc.pose, user_data: desc.user_data, shapes: Vec::new() },
        );
        state.calls.push(MockCall::CreateActor(handle));
        Some(handle)
    }

    fn attach_shape(&mut self, actor: BodyHandle, shape: &ShapeElem, _density: f32) -> bool {
        match self.state().actors.get_mut(&actor) {
            Some(a) => {
                a.shapes.push(*shape);
                true
            }
            None => false,
        }
    }

    fn create_joint(&mut self, desc: &JointDesc) -> Option<JointHandle> {
        let mut state = self.state();
        if !state.actors.contains_key(&desc.actor_a) || !state.actors.contains_key(&desc.actor_b) {
            return None;
        }
        state.next_id += 1;
        let handle = JointHandle(state.next_id);
        state.joints.insert(handle, (desc.actor_a, desc.actor_b));
        state.calls.push(MockCall::CreateJoint(handle));
        Some(handle)
    }

    fn remove_actor(&mut self, actor: BodyHandle) -> bool {
        let mut state = self.state();
        state.joints.retain(|_, (a, b)| *a != actor && *b != actor);
        state.calls.push(MockCall::RemoveActor(actor));
        state.actors.remove(&actor).is_some()
    }

    fn remove_joint(&mut self, joint: JointHandle) -> bool {
        self.state().joints.remove(&joint).is_some()
    }

    fn actor_pose(&self, actor: BodyHandle) -> Option<RigidPose> {
        self.state().actors.get(&actor).map(|a| a.pose)
    }

    fn set_actor_pose(&mut self, actor: BodyHandle, pose: RigidPose) -> bool {
        let mut state = self.state();
        state.calls.push(MockCall::SetPose(actor, pose));
        match state.actors.get_mut(&actor) {
            Some(a) => {
                a.pose = pose;
                true
            }
            None => false,
        }
    }

    fn actor_kind(&self, actor: BodyHandle) -> Option<BodyKind> {
        self.state().actors.get(&actor).map(|a| a.kind)
    }

    fn set_actor_kind(&mut self, actor: BodyHandle, kind: BodyKind) -> bool {
        let mut state = self.state();
        state.calls.push(MockCall::SetKind(actor, kind));
        match state.actors.get_mut(&actor) {
            Some(a) => {
                a.kind = kind;
                true
            }
            None => false,
        }
    }

    fn user_data(&self, actor: BodyHandle) -> Option<u128> {
        self.state().actors.get(&actor).map(|a| a.user_data)
    }

    fn actor_count(&self) -> usize {
        self.state().actors.len()
    }

    fn joint_count(&self) -> usize {
        self.state().joints.len()
    }

    fn simulate(&mut self, _delta_time: f32) {
        let drop = self.drop_per_step;
        let mut state = self.state();
        for actor in state.actors.values_mut() {
            if actor.kind == BodyKind::Dynamic {
                actor.pose.translation.y -= drop;
            }
        }
        state.calls.push(MockCall::Simulate);
    }
}

/// 沿 +Y 的骨骼链，每节长 1
pub fn chain_mesh(names: &[&str]) -> Arc<SkeletalMesh> {
    let mut reference = ReferenceSkeleton::new();
    let mut global = Mat4::IDENTITY;
    for (i, name) in names.iter().enumerate() {
        let offset = if i == 0 { Vec3::ZERO } else { Vec3::Y };
        let local = BoneTransform::from_translation_rotation(offset, Quat::IDENTITY);
        global *= local.to_matrix();
        reference.add_bone(*name, i.checked_sub(1), local, global.inverse()).unwrap();
    }
    Arc::new(SkeletalMesh::new("chain", Arc::new(Skeleton::new("chain", reference))))
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
