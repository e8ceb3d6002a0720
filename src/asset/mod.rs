//! 资源加载
//!
//! AssetLoader 是外部资源导入的协作接口；BlobAssetLoader 读取本 crate 的
//! 二进制骨骼格式，同名 `.phys` 文件存在时一并加载物理资源。

pub mod blob;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::mesh::{MaterialDesc, SkeletalMesh};
use crate::skeleton::Skeleton;
use crate::{EngineError, Result};

/// 一次加载的结果
#[derive(Debug, Clone)]
pub struct LoadedAsset {
    pub skeleton: Arc<Skeleton>,
    pub meshes: Vec<Arc<SkeletalMesh>>,
    pub materials: Vec<MaterialDesc>,
}

/// 资源加载接口
pub trait AssetLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<LoadedAsset>;
}

/// 二进制骨骼资源加载器
#[derive(Debug, Clone, Default)]
pub struct BlobAssetLoader {
    root: PathBuf,
}

impl BlobAssetLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl AssetLoader for BlobAssetLoader {
    fn load(&self, path: &Path) -> Result<LoadedAsset> {
        let full_path = self.resolve(path);
        if !full_path.is_file() {
            return Err(EngineError::AssetNotFound(full_path));
        }

        let bytes = fs::read(&full_path)?;
        let skeleton = Arc::new(blob::decode_skeleton(&bytes)?);

        let mesh_name = full_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| skeleton.name.clone());
        let mesh = SkeletalMesh::new(mesh_name, skeleton.clone());

        let physics_path = full_path.with_extension("phys");
        if physics_path.is_file() {
            let physics = blob::decode_physics_asset(&fs::read(&physics_path)?)?;
            log::info!(
                "[资源] 加载物理资源: {} 刚体, {} 关节",
                physics.bodies.len(),
                physics.constraints.len()
            );
            mesh.set_physics_asset(Some(physics));
        }

        Ok(LoadedAsset { skeleton, meshes: vec![Arc::new(mesh)], materials: Vec::new() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_reports_not_found() {
        let loader = BlobAssetLoader::new(std::env::temp_dir());
        let err = loader.load(Path::new("definitely_missing_skeleton.skel")).unwrap_err();
        assert!(matches!(err, EngineError::AssetNotFound(_)));
    }

    #[test]
    fn test_load_skeleton_with_physics_sidecar() {
        use crate::physics::{BodySetup, PhysicsAsset};
        use crate::skeleton::{BoneTransform, ReferenceSkeleton};
        use glam::Mat4;

        let dir = std::env::temp_dir().join(format!("skeletal_engine_asset_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let mut reference = ReferenceSkeleton::new();
        reference.add_bone("root", None, BoneTransform::IDENTITY, Mat4::IDENTITY).unwrap();
        let skeleton = Skeleton::new("rig", reference);
        fs::write(dir.join("rig.skel"), blob::encode_skeleton(&skeleton).unwrap()).unwrap();

        let physics = PhysicsAsset::new(vec![BodySetup::new("root")], Vec::new());
        fs::write(dir.join("rig.phys"), blob::encode_physics_asset(&physics).unwrap()).unwrap();

        let loaded = BlobAssetLoader::new(&dir).load(Path::new("rig.skel")).unwrap();
        assert_eq!(loaded.skeleton.reference().bone_count(), 1);
        assert_eq!(loaded.meshes[0].name, "rig");
        assert_eq!(loaded.meshes[0].physics_asset().unwrap().bodies.len(), 1);

        fs::remove_dir_all(&dir).ok();
    }
}
