mod common;

use glam::{Quat, Vec3};

use common::{chain_mesh, init_logger, MockCall, MockScene};
use skeletal_engine::component::SkeletalMeshComponent;
use skeletal_engine::physics::{
    AngularLimits, BodyKind, BodySetup, ConstraintSetup, JointKind, PhysicsAsset, PhysicsConfig, PhysicsSystem,
    RigidPose, ShapeElem,
};
use skeletal_engine::scene::{ComponentHandle, EditTarget, SceneComponent, World};
use skeletal_engine::skeleton::BoneTransform;

const DT: f32 = 1.0 / 60.0;
const BONES: &[&str] = &["root", "pelvis", "spine", "head"];

fn sphere() -> ShapeElem {
    ShapeElem::Sphere { center: Vec3::ZERO, radius: 0.1 }
}

fn setup() -> (MockScene, PhysicsSystem, World, ComponentHandle) {
    init_logger();
    let scene = MockScene::new();
    let physics = PhysicsSystem::with_scene(Box::new(scene.clone()), PhysicsConfig::default());
    let mut world = World::new();
    let handle = world.add_component(SceneComponent::skeletal_mesh(
        "hero",
        SkeletalMeshComponent::with_mesh(chain_mesh(BONES)),
    ));
    (scene, physics, world, handle)
}

fn local(world: &World, handle: ComponentHandle, bone: usize) -> BoneTransform {
    world
        .component(handle)
        .and_then(|c| c.as_skeletal_mesh())
        .and_then(|s| s.bone_local_transform(bone))
        .unwrap()
}

#[test]
fn gizmo_edit_survives_push_solve_pull() {
    let (scene, mut physics, mut world, handle) = setup();
    physics.spawn_body(handle, Some("spine".into()), BodyKind::Dynamic, vec![sphere()]);

    // 第一帧：刚体下落 0.1，回读到骨骼
    physics.step(&mut world, DT);
    assert!(local(&world, handle, 2).translation.abs_diff_eq(Vec3::new(0.0, 0.9, 0.0), 1e-5));
    let actor = physics.body_handle(handle, Some("spine")).unwrap();

    // 编辑期间：不推送、不回读，刚体变为运动学锚点
    assert!(world.begin_interactive_edit(handle, EditTarget::Bone("spine".into())));
    let edited = BoneTransform::from_translation_rotation(Vec3::new(0.5, 1.0, 0.0), Quat::from_rotation_z(0.2));
    world
        .component_mut(handle)
        .and_then(|c| c.as_skeletal_mesh_mut())
        .unwrap()
        .set_bone_local_transform(2, edited);

    for _ in 0..3 {
        physics.step(&mut world, DT);
        assert_eq!(local(&world, handle, 2), edited);
    }
    assert_eq!(scene.state().actors[&actor].kind, BodyKind::Kinematic);
    assert_eq!(scene.state().pose_writes(actor), 0);

    // 编辑结束：先把编辑后的姿势写入刚体、恢复动态，再模拟
    assert!(world.end_interactive_edit(handle));
    scene.state().clear_calls();
    physics.step(&mut world, DT);

    let calls = scene.state().calls.clone();
    let set_pose = calls
        .iter()
        .position(|c| matches!(c, MockCall::SetPose(a, p) if *a == actor
            && p.translation.abs_diff_eq(Vec3::new(0.5, 2.0, 0.0), 1e-5)))
        .expect("edited pose pushed");
    let restore = calls
        .iter()
        .position(|c| *c == MockCall::SetKind(actor, BodyKind::Dynamic))
        .expect("kind restored");
    let simulate = calls.iter().position(|c| *c == MockCall::Simulate).unwrap();
    assert!(set_pose < simulate && restore < simulate);

    // 从编辑后的位置继续下落
    let spine = local(&world, handle, 2);
    assert!(spine.translation.abs_diff_eq(Vec3::new(0.5, 0.9, 0.0), 1e-5));
    assert!(spine.rotation.abs_diff_eq(edited.rotation, 1e-5));
}

#[test]
fn pending_removal_flushes_before_addition_and_push() {
    let (scene, mut physics, mut world, handle) = setup();
    physics.spawn_body(handle, None, BodyKind::Dynamic, vec![sphere()]);
    physics.step(&mut world, DT);
    let old = physics.body_handle(handle, None).unwrap();

    physics.remove_component_bodies(handle);
    physics.spawn_body(handle, None, BodyKind::Kinematic, vec![sphere()]);
    assert!(physics.has_pending());
    // 排队的操作在下一次 flush 之前不生效
    assert_eq!(physics.body_handle(handle, None), Some(old));

    scene.state().clear_calls();
    physics.step(&mut world, DT);
    let new = physics.body_handle(handle, None).unwrap();
    assert_ne!(new, old);

    let calls = scene.state().calls.clone();
    let at = |call: MockCall| calls.iter().position(|c| *c == call).unwrap();
    let push = calls
        .iter()
        .position(|c| matches!(c, MockCall::SetPose(a, _) if *a == new))
        .unwrap();
    assert!(at(MockCall::RemoveActor(old)) < at(MockCall::CreateActor(new)));
    assert!(at(MockCall::CreateActor(new)) < push);
    assert!(push < at(MockCall::Simulate));
    assert_eq!(scene.state().actors.len(), 1);
}

#[test]
fn dynamic_body_pushed_only_when_owner_moves() {
    let (scene, mut physics, mut world, _) = setup();
    let prop = world.add_component(SceneComponent::primitive("crate"));
    physics.spawn_body(prop, None, BodyKind::Dynamic, vec![sphere()]);

    physics.step(&mut world, DT);
    physics.step(&mut world, DT);
    let actor = physics.body_handle(prop, None).unwrap();
    assert_eq!(scene.state().pose_writes(actor), 0);
    let y = world.component(prop).unwrap().transform.translation.y;
    assert!((y + 0.2).abs() < 1e-5);

    world.component_mut(prop).unwrap().transform.translation.x = 3.0;
    physics.step(&mut world, DT);
    assert_eq!(scene.state().pose_writes(actor), 1);
    assert!((world.component(prop).unwrap().transform.translation.x - 3.0).abs() < 1e-6);
}

#[test]
fn kinematic_body_follows_owner_every_step() {
    let (scene, mut physics, mut world, handle) = setup();
    physics.spawn_body(handle, Some("head".into()), BodyKind::Kinematic, vec![sphere()]);

    for _ in 0..3 {
        physics.step(&mut world, DT);
    }
    let actor = physics.body_handle(handle, Some("head")).unwrap();
    assert_eq!(scene.state().pose_writes(actor), 3);
    // 运动学刚体不回写骨骼
    assert_eq!(local(&world, handle, 3).translation, Vec3::Y);
    let pose = physics.read_pose(handle, Some("head")).unwrap();
    assert!(pose.translation.abs_diff_eq(Vec3::new(0.0, 3.0, 0.0), 1e-5));
}

#[test]
fn dangling_constraints_are_skipped() {
    let (scene, mut physics, mut world, handle) = setup();
    let capsule = ShapeElem::Capsule { pose: RigidPose::IDENTITY, radius: 0.1, length: 0.5 };
    let constraint = |a: &str, b: &str| ConstraintSetup {
        joint_name: format!("{}_{}", a, b),
        bone_a: a.into(),
        bone_b: b.into(),
        transform_in_a: RigidPose::from_translation(Vec3::Y),
        transform_in_b: RigidPose::IDENTITY,
        limits: AngularLimits::default(),
        kind: JointKind::Cone,
    };
    let mut pelvis = BodySetup::new("pelvis");
    pelvis.elems.push(capsule);
    let mut spine = BodySetup::new("spine");
    spine.elems.push(capsule);
    let mut ghost = BodySetup::new("ghost");
    ghost.elems.push(capsule);
    let asset = PhysicsAsset::new(
        vec![pelvis, spine, ghost],
        vec![constraint("pelvis", "spine"), constraint("spine", "ghost"), constraint("tail", "pelvis")],
    );

    let mesh = world
        .component(handle)
        .and_then(|c| c.as_skeletal_mesh())
        .and_then(|s| s.skeletal_mesh().cloned())
        .unwrap();
    mesh.set_physics_asset(Some(asset));

    physics.spawn_ragdoll(handle, &Default::default());
    physics.step(&mut world, DT);

    assert_eq!(physics.body_count(), 2);
    assert_eq!(physics.joint_count(), 1);
    assert_eq!(scene.state().joints.len(), 1);

    let skeletal = world.component(handle).and_then(|c| c.as_skeletal_mesh()).unwrap();
    assert!(skeletal.is_physics_owned(1));
    assert!(skeletal.is_physics_owned(2));
    assert!(!skeletal.is_physics_owned(3));
}

#[test]
fn repeated_ragdoll_spawn_reuses_bodies_and_joints() {
    let (scene, mut physics, mut world, handle) = setup();
    physics.spawn_ragdoll(handle, &Default::default());
    physics.step(&mut world, DT);
    let bodies = physics.body_count();
    let joints = physics.joint_count();
    assert!(bodies > 0 && joints > 0);

    physics.spawn_ragdoll(handle, &Default::default());
    physics.step(&mut world, DT);
    assert_eq!(physics.body_count(), bodies);
    assert_eq!(physics.joint_count(), joints);
    assert_eq!(scene.state().joints.len(), joints);

    // 同一帧内排队两次也只创建一套
    physics.remove_component_bodies(handle);
    physics.spawn_ragdoll(handle, &Default::default());
    physics.spawn_ragdoll(handle, &Default::default());
    physics.step(&mut world, DT);
    assert_eq!(physics.body_count(), bodies);
    assert_eq!(physics.joint_count(), joints);
}

#[test]
fn removed_component_bodies_dropped_at_next_flush() {
    let (scene, mut physics, mut world, handle) = setup();
    physics.spawn_ragdoll(handle, &Default::default());
    physics.step(&mut world, DT);
    assert!(physics.body_count() > 0);

    world.remove_component(handle);
    assert!(physics.body_count() > 0);
    physics.step(&mut world, DT);
    assert_eq!(physics.body_count(), 0);
    assert_eq!(physics.joint_count(), 0);
    assert!(scene.state().actors.is_empty());
}

#[test]
fn update_visuals_reads_without_stepping() {
    let (scene, mut physics, mut world, handle) = setup();
    physics.spawn_body(handle, None, BodyKind::Dynamic, vec![sphere()]);
    physics.flush(&mut world);

    let actor = physics.body_handle(handle, None).unwrap();
    scene.state().actors.get_mut(&actor).unwrap().pose.translation = Vec3::new(1.0, 2.0, 3.0);

    physics.update_visuals(&mut world);
    assert_eq!(world.component(handle).unwrap().transform.translation, Vec3::new(1.0, 2.0, 3.0));
    assert!(!scene.state().calls.contains(&MockCall::Simulate));
}
