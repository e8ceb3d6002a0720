//! 蒙皮绑定
//!
//! 对每个控制点收集所有蒙皮簇的权重记录，按权重降序取前 4 个并重新归一化。
//! 前 4 个权重和为 0 时保持全 0（顶点只跟随组件变换）。

use std::collections::HashMap;

use glam::{Vec2, Vec3, Vec4};
use rayon::prelude::*;

use super::{SkinnedMeshRenderData, SkinnedVertex, MAX_BONE_INFLUENCES};
use crate::skeleton::ReferenceSkeleton;

/// 三角化后的多边形顶点
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PolygonVertex {
    pub control_point: u32,
    pub normal: Vec3,
    pub tangent: Vec3,
    pub uv: Vec2,
    pub color: Vec4,
}

/// 蒙皮簇：一根骨骼对若干控制点的权重
#[derive(Clone, Debug, Default)]
pub struct SkinCluster {
    pub bone_name: String,
    /// (控制点索引, 权重)
    pub weights: Vec<(u32, f32)>,
}

/// 原始网格数据（由资源解析端提供）
#[derive(Clone, Debug, Default)]
pub struct RawMeshSource {
    pub control_points: Vec<Vec3>,
    /// 每 3 个为一个三角形
    pub polygon_vertices: Vec<PolygonVertex>,
    pub skin_clusters: Vec<SkinCluster>,
}

/// 绑定选项
#[derive(Clone, Copy, Debug)]
pub struct BindOptions {
    /// 合并属性完全相同的顶点（仅为减少顶点数，不影响正确性）
    pub deduplicate: bool,
}

impl Default for BindOptions {
    fn default() -> Self {
        Self { deduplicate: true }
    }
}

type Influences = ([u32; MAX_BONE_INFLUENCES], [f32; MAX_BONE_INFLUENCES]);

/// 把原始网格绑定到参考骨骼
pub fn bind_skinned_mesh(
    source: &RawMeshSource,
    skeleton: &ReferenceSkeleton,
    options: BindOptions,
) -> SkinnedMeshRenderData {
    let point_count = source.control_points.len();

    // 控制点 → 所有 (骨骼, 权重) 记录
    let mut records: Vec<Vec<(u32, f32)>> = vec![Vec::new(); point_count];
    for cluster in &source.skin_clusters {
        let Some(bone) = skeleton.find_bone_index(&cluster.bone_name) else {
            log::warn!("[蒙皮] 蒙皮簇引用了不存在的骨骼 '{}'，跳过", cluster.bone_name);
            continue;
        };
        for &(point, weight) in &cluster.weights {
            match records.get_mut(point as usize) {
                Some(list) if weight > 0.0 => list.push((bone as u32, weight)),
                Some(_) => {}
                None => log::warn!("[蒙皮] 控制点索引 {} 越界（共 {}）", point, point_count),
            }
        }
    }

    let influences: Vec<Influences> = records.into_par_iter().map(resolve_influences).collect();

    let mut data = SkinnedMeshRenderData::default();
    let mut dedup: HashMap<VertexKey, u32> = HashMap::new();

    let triangles = source.polygon_vertices.chunks_exact(3);
    if !triangles.remainder().is_empty() {
        log::warn!("[蒙皮] 多边形顶点数 {} 不是 3 的倍数，丢弃尾部", source.polygon_vertices.len());
    }
    for triangle in triangles {
        // 任一角越界则整个三角形丢弃，后续三角形的顶点顺序不受影响
        if let Some(bad) = triangle.iter().find(|p| p.control_point as usize >= point_count) {
            log::warn!("[蒙皮] 三角形引用越界控制点 {}，跳过", bad.control_point);
            continue;
        }
        for poly in triangle {
            let point = poly.control_point as usize;
            let (bone_indices, bone_weights) = influences[point];
            let vertex = SkinnedVertex {
                position: source.control_points[point],
                normal: poly.normal,
                tangent: poly.tangent,
                color: poly.color,
                uv: poly.uv,
                bone_indices,
                bone_weights,
            };

            let index = if options.deduplicate {
                *dedup.entry(VertexKey::new(poly)).or_insert_with(|| {
                    data.vertices.push(vertex);
                    (data.vertices.len() - 1) as u32
                })
            } else {
                data.vertices.push(vertex);
                (data.vertices.len() - 1) as u32
            };
            data.indices.push(index);
        }
    }

    log::info!(
        "[蒙皮] 绑定完成: {} 控制点 → {} 顶点, {} 三角形",
        point_count,
        data.vertex_count(),
        data.triangle_count()
    );
    data
}

/// 降序取前 4 个并归一化
fn resolve_influences(mut list: Vec<(u32, f32)>) -> Influences {
    list.sort_by(|a, b| b.1.total_cmp(&a.1));
    list.truncate(MAX_BONE_INFLUENCES);

    let mut bones = [0u32; MAX_BONE_INFLUENCES];
    let mut weights = [0f32; MAX_BONE_INFLUENCES];
    let total: f32 = list.iter().map(|(_, w)| *w).sum();
    if total <= 0.0 {
        return (bones, weights);
    }
    for (slot, (bone, weight)) in list.into_iter().enumerate() {
        bones[slot] = bone;
        weights[slot] = weight / total;
    }
    (bones, weights)
}

/// 顶点去重键（控制点 + 属性位模式）
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct VertexKey {
    control_point: u32,
    attributes: [u32; 12],
}

impl VertexKey {
    fn new(v: &PolygonVertex) -> Self {
        let bits = |f: f32| f.to_bits();
        Self {
            control_point: v.control_point,
            attributes: [
                bits(v.normal.x), bits(v.normal.y), bits(v.normal.z),
                bits(v.tangent.x), bits(v.tangent.y), bits(v.tangent.z),
                bits(v.uv.x), bits(v.uv.y),
                bits(v.color.x), bits(v.color.y), bits(v.color.z), bits(v.color.w),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::BoneTransform;
    use glam::Mat4;

    fn skeleton(names: &[&str]) -> ReferenceSkeleton {
        let mut skel = ReferenceSkeleton::new();
        for (i, name) in names.iter().enumerate() {
            let parent = if i == 0 { None } else { Some(0) };
            skel.add_bone(*name, parent, BoneTransform::IDENTITY, Mat4::IDENTITY).unwrap();
        }
        skel
    }

    fn poly(point: u32) -> PolygonVertex {
        PolygonVertex {
            control_point: point,
            normal: Vec3::Y,
            tangent: Vec3::X,
            uv: Vec2::ZERO,
            color: Vec4::ONE,
        }
    }

    #[test]
    fn keeps_top_four_and_normalizes() {
        let skel = skeleton(&["a", "b", "c", "d", "e"]);
        let weights = [0.1, 0.5, 0.3, 0.05, 0.4];
        let source = RawMeshSource {
            control_points: vec![Vec3::ZERO],
            polygon_vertices: vec![poly(0), poly(0), poly(0)],
            skin_clusters: ["a", "b", "c", "d", "e"]
                .iter()
                .zip(weights)
                .map(|(name, w)| SkinCluster { bone_name: name.to_string(), weights: vec![(0, w)] })
                .collect(),
        };

        let data = bind_skinned_mesh(&source, &skel, BindOptions::default());
        assert_eq!(data.vertices.len(), 1);
        let v = data.vertices[0];
        assert_eq!(v.bone_indices, [1, 4, 2, 0]);
        let sum: f32 = v.bone_weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!((v.bone_weights[0] - 0.5 / 1.3).abs() < 1e-5);
    }

    #[test]
    fn unweighted_vertex_stays_zero() {
        let skel = skeleton(&["a"]);
        let source = RawMeshSource {
            control_points: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            polygon_vertices: vec![poly(0), poly(1), poly(2)],
            skin_clusters: vec![SkinCluster { bone_name: "a".into(), weights: vec![(1, 1.0)] }],
        };
        let data = bind_skinned_mesh(&source, &skel, BindOptions::default());
        assert!(!data.vertices[0].is_skinned());
        assert_eq!(data.vertices[1].bone_weights, [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn dedup_is_optional() {
        let skel = skeleton(&["a"]);
        let source = RawMeshSource {
            control_points: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            polygon_vertices: vec![poly(0), poly(1), poly(2), poly(2), poly(1), poly(0)],
            skin_clusters: vec![],
        };
        let merged = bind_skinned_mesh(&source, &skel, BindOptions { deduplicate: true });
        let raw = bind_skinned_mesh(&source, &skel, BindOptions { deduplicate: false });
        assert_eq!(merged.vertices.len(), 3);
        assert_eq!(raw.vertices.len(), 6);
        assert_eq!(merged.indices, vec![0, 1, 2, 2, 1, 0]);
        assert_eq!(raw.triangle_count(), merged.triangle_count());
    }

    #[test]
    fn out_of_range_corner_drops_whole_triangle() {
        let skel = skeleton(&["a"]);
        let source = RawMeshSource {
            control_points: vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z],
            polygon_vertices: vec![poly(0), poly(99), poly(1), poly(1), poly(2), poly(3), poly(2)],
            skin_clusters: vec![],
        };
        let data = bind_skinned_mesh(&source, &skel, BindOptions { deduplicate: false });
        assert_eq!(data.triangle_count(), 1);
        let corners: Vec<Vec3> = data.indices.iter().map(|&i| data.vertices[i as usize].position).collect();
        assert_eq!(corners, vec![Vec3::X, Vec3::Y, Vec3::Z]);
        assert_eq!(data.vertices.len(), 3);
    }

    #[test]
    fn unknown_bone_cluster_is_ignored() {
        let skel = skeleton(&["a"]);
        let source = RawMeshSource {
            control_points: vec![Vec3::ZERO],
            polygon_vertices: vec![poly(0), poly(0), poly(0)],
            skin_clusters: vec![
                SkinCluster { bone_name: "ghost".into(), weights: vec![(0, 0.9)] },
                SkinCluster { bone_name: "a".into(), weights: vec![(0, 0.2)] },
            ],
        };
        let data = bind_skinned_mesh(&source, &skel, BindOptions::default());
        assert_eq!(data.vertices[0].bone_weights[0], 1.0);
    }
}
