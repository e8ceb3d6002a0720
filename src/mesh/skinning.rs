//! CPU 蒙皮 - 使用 rayon 并行加速
//!
//! skinning_matrix[i] = global[i] * inverse_bind[i]

use glam::{Mat4, Vec3};
use rayon::prelude::*;

use super::SkinnedVertex;

/// 蒙皮结果
#[derive(Clone, Debug, Default)]
pub struct SkinnedOutput {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
}

/// 计算所有顶点的蒙皮位置和法线
///
/// 无影响的顶点原样输出；越界骨骼索引的影响被忽略。
pub fn skin_vertices(vertices: &[SkinnedVertex], skinning_matrices: &[Mat4]) -> SkinnedOutput {
    let (positions, normals) = vertices
        .par_iter()
        .map(|v| compute_vertex_skinning(v, skinning_matrices))
        .unzip();
    SkinnedOutput { positions, normals }
}

fn compute_vertex_skinning(vertex: &SkinnedVertex, matrices: &[Mat4]) -> (Vec3, Vec3) {
    let mut position = Vec3::ZERO;
    let mut normal = Vec3::ZERO;
    let mut total = 0.0;

    for (&bone, &weight) in vertex.bone_indices.iter().zip(vertex.bone_weights.iter()) {
        if weight <= 0.0 {
            continue;
        }
        let Some(m) = matrices.get(bone as usize) else {
            continue;
        };
        position += m.transform_point3(vertex.position) * weight;
        normal += m.transform_vector3(vertex.normal) * weight;
        total += weight;
    }

    if total <= 0.0 {
        return (vertex.position, vertex.normal);
    }
    (position / total, normal.normalize_or_zero())
}
