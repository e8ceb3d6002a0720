//! 运行时组件

mod skeletal_mesh_component;

pub use skeletal_mesh_component::SkeletalMeshComponent;
