//! 二进制资源格式（小端）
//!
//! 骨骼：  "SKEL" | 版本 u32 | 名称 | 骨骼数 u32 | 每根骨骼 { 名称, 父索引 i32, 平移, 旋转, 缩放, 逆绑定矩阵 }
//! 物理：  "PHYS" | 版本 u32 | 刚体数 u32 | 刚体... | 关节数 u32 | 关节...
//! 字符串为 u32 字节长度 + UTF-8。

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use glam::{Mat4, Quat, Vec3};

use crate::physics::{AngularLimits, BodyKind, BodySetup, ConstraintSetup, JointKind, PhysicsAsset, RigidPose, ShapeElem};
use crate::skeleton::{BoneTransform, ReferenceSkeleton, Skeleton};
use crate::{EngineError, Result};

pub const SKELETON_MAGIC: &[u8; 4] = b"SKEL";
pub const PHYSICS_MAGIC: &[u8; 4] = b"PHYS";
pub const BLOB_VERSION: u32 = 1;

/// 单个字符串最大长度（防止损坏数据触发超大分配）
const MAX_STRING_LEN: u32 = 64 * 1024;

// ============================================================================
// 读取辅助
// ============================================================================

fn parse_err(what: &str, e: std::io::Error) -> EngineError {
    EngineError::BlobParse(format!("Failed to read {}: {}", what, e))
}

fn read_header<R: Read>(reader: &mut R, magic: &[u8; 4]) -> Result<u32> {
    let mut header = [0u8; 4];
    reader.read_exact(&mut header).map_err(|e| parse_err("header", e))?;
    if &header != magic {
        return Err(EngineError::BlobParse(format!(
            "Invalid header: expected {:?}",
            String::from_utf8_lossy(magic)
        )));
    }
    let version = reader.read_u32::<LittleEndian>().map_err(|e| parse_err("version", e))?;
    if version != BLOB_VERSION {
        return Err(EngineError::BlobParse(format!("Unsupported version: {}", version)));
    }
    Ok(version)
}

fn read_string<R: Read>(reader: &mut R) -> Result<String> {
    let len = reader.read_u32::<LittleEndian>().map_err(|e| parse_err("string length", e))?;
    if len > MAX_STRING_LEN {
        return Err(EngineError::BlobParse(format!("String too long: {}", len)));
    }
    let mut bytes = vec![0u8; len as usize];
    reader.read_exact(&mut bytes).map_err(|e| parse_err("string", e))?;
    String::from_utf8(bytes).map_err(|e| EngineError::BlobParse(format!("Invalid UTF-8: {}", e)))
}

fn read_f32s<R: Read, const N: usize>(reader: &mut R, what: &str) -> Result<[f32; N]> {
    let mut values = [0.0f32; N];
    reader
        .read_f32_into::<LittleEndian>(&mut values)
        .map_err(|e| parse_err(what, e))?;
    Ok(values)
}

fn read_vec3<R: Read>(reader: &mut R, what: &str) -> Result<Vec3> {
    Ok(Vec3::from_array(read_f32s::<_, 3>(reader, what)?))
}

fn read_quat<R: Read>(reader: &mut R, what: &str) -> Result<Quat> {
    let [x, y, z, w] = read_f32s::<_, 4>(reader, what)?;
    Ok(Quat::from_xyzw(x, y, z, w).normalize())
}

fn read_pose<R: Read>(reader: &mut R) -> Result<RigidPose> {
    let rotation = read_quat(reader, "pose rotation")?;
    let translation = read_vec3(reader, "pose translation")?;
    Ok(RigidPose::new(rotation, translation))
}

fn read_u8<R: Read>(reader: &mut R, what: &str) -> Result<u8> {
    reader.read_u8().map_err(|e| parse_err(what, e))
}

fn read_count<R: Read>(reader: &mut R, what: &str) -> Result<u32> {
    reader.read_u32::<LittleEndian>().map_err(|e| parse_err(what, e))
}

// ============================================================================
// 写入辅助
// ============================================================================

fn write_string<W: Write>(writer: &mut W, s: &str) -> Result<()> {
    writer.write_u32::<LittleEndian>(s.len() as u32)?;
    writer.write_all(s.as_bytes())?;
    Ok(())
}

fn write_f32s<W: Write>(writer: &mut W, values: &[f32]) -> Result<()> {
    for v in values {
        writer.write_f32::<LittleEndian>(*v)?;
    }
    Ok(())
}

fn write_pose<W: Write>(writer: &mut W, pose: &RigidPose) -> Result<()> {
    write_f32s(writer, &pose.rotation.to_array())?;
    write_f32s(writer, &pose.translation.to_array())
}

// ============================================================================
// 骨骼
// ============================================================================

pub fn encode_skeleton(skeleton: &Skeleton) -> Result<Vec<u8>> {
    let reference = skeleton.reference();
    let mut out = Vec::new();
    out.write_all(SKELETON_MAGIC)?;
    out.write_u32::<LittleEndian>(BLOB_VERSION)?;
    write_string(&mut out, &skeleton.name)?;
    out.write_u32::<LittleEndian>(reference.bone_count() as u32)?;

    for (index, info) in reference.bone_info().iter().enumerate() {
        let local = &reference.bind_pose_local()[index];
        write_string(&mut out, &info.name)?;
        out.write_i32::<LittleEndian>(info.parent_index.map_or(-1, |p| p as i32))?;
        write_f32s(&mut out, &local.translation.to_array())?;
        write_f32s(&mut out, &local.rotation.to_array())?;
        write_f32s(&mut out, &local.scale.to_array())?;
        write_f32s(&mut out, &reference.inverse_bind_pose()[index].to_cols_array())?;
    }
    Ok(out)
}

/// 解码骨骼；父索引向前引用或重名时返回错误
pub fn decode_skeleton(bytes: &[u8]) -> Result<Skeleton> {
    let mut reader = Cursor::new(bytes);
    read_header(&mut reader, SKELETON_MAGIC)?;
    let name = read_string(&mut reader)?;
    let bone_count = read_count(&mut reader, "bone count")?;

    let mut reference = ReferenceSkeleton::new();
    for _ in 0..bone_count {
        let bone_name = read_string(&mut reader)?;
        let parent = reader
            .read_i32::<LittleEndian>()
            .map_err(|e| parse_err("parent index", e))?;
        let translation = read_vec3(&mut reader, "translation")?;
        let rotation = read_quat(&mut reader, "rotation")?;
        let scale = read_vec3(&mut reader, "scale")?;
        let inverse_bind = Mat4::from_cols_array(&read_f32s::<_, 16>(&mut reader, "inverse bind matrix")?);

        let parent = (parent >= 0).then_some(parent as usize);
        reference.add_bone(bone_name, parent, BoneTransform { translation, rotation, scale }, inverse_bind)?;
    }
    reference.validate()?;

    log::info!("[资源] 骨骼解码完成: '{}', {} 根骨骼", name, reference.bone_count());
    Ok(Skeleton::new(name, reference))
}

// ============================================================================
// 物理资源
// ============================================================================

fn body_kind_tag(kind: BodyKind) -> u8 {
    match kind {
        BodyKind::Static => 0,
        BodyKind::Dynamic => 1,
        BodyKind::Kinematic => 2,
    }
}

fn body_kind_from_tag(tag: u8) -> Result<BodyKind> {
    match tag {
        0 => Ok(BodyKind::Static),
        1 => Ok(BodyKind::Dynamic),
        2 => Ok(BodyKind::Kinematic),
        _ => Err(EngineError::BlobParse(format!("Invalid body kind: {}", tag))),
    }
}

fn write_shape<W: Write>(writer: &mut W, shape: &ShapeElem) -> Result<()> {
    match shape {
        ShapeElem::Sphere { center, radius } => {
            writer.write_u8(0)?;
            write_f32s(writer, &center.to_array())?;
            write_f32s(writer, &[*radius])
        }
        ShapeElem::Box { pose, half_extents } => {
            writer.write_u8(1)?;
            write_pose(writer, pose)?;
            write_f32s(writer, &half_extents.to_array())
        }
        ShapeElem::Capsule { pose, radius, length } => {
            writer.write_u8(2)?;
            write_pose(writer, pose)?;
            write_f32s(writer, &[*radius, *length])
        }
    }
}

fn read_shape<R: Read>(reader: &mut R) -> Result<ShapeElem> {
    match read_u8(reader, "shape type")? {
        0 => {
            let center = read_vec3(reader, "sphere center")?;
            let [radius] = read_f32s::<_, 1>(reader, "sphere radius")?;
            Ok(ShapeElem::Sphere { center, radius })
        }
        1 => {
            let pose = read_pose(reader)?;
            let half_extents = read_vec3(reader, "box extents")?;
            Ok(ShapeElem::Box { pose, half_extents })
        }
        2 => {
            let pose = read_pose(reader)?;
            let [radius, length] = read_f32s::<_, 2>(reader, "capsule size")?;
            Ok(ShapeElem::Capsule { pose, radius, length })
        }
        tag => Err(EngineError::BlobParse(format!("Invalid shape type: {}", tag))),
    }
}

pub fn encode_physics_asset(asset: &PhysicsAsset) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.write_all(PHYSICS_MAGIC)?;
    out.write_u32::<LittleEndian>(BLOB_VERSION)?;

    out.write_u32::<LittleEndian>(asset.bodies.len() as u32)?;
    for body in &asset.bodies {
        write_string(&mut out, &body.bone_name)?;
        out.write_u8(body_kind_tag(body.kind))?;
        out.write_u32::<LittleEndian>(body.elems.len() as u32)?;
        for elem in &body.elems {
            write_shape(&mut out, elem)?;
        }
    }

    out.write_u32::<LittleEndian>(asset.constraints.len() as u32)?;
    for c in &asset.constraints {
        write_string(&mut out, &c.joint_name)?;
        write_string(&mut out, &c.bone_a)?;
        write_string(&mut out, &c.bone_b)?;
        write_pose(&mut out, &c.transform_in_a)?;
        write_pose(&mut out, &c.transform_in_b)?;
        write_f32s(&mut out, &[c.limits.swing1_degrees, c.limits.swing2_degrees, c.limits.twist_degrees])?;
        out.write_u8(match c.kind {
            JointKind::Cone => 0,
            JointKind::Revolute => 1,
        })?;
    }
    Ok(out)
}

/// 解码物理资源（关节引用的骨骼名称不做校验，实例化时跳过悬空关节）
pub fn decode_physics_asset(bytes: &[u8]) -> Result<PhysicsAsset> {
    let mut reader = Cursor::new(bytes);
    read_header(&mut reader, PHYSICS_MAGIC)?;

    let body_count = read_count(&mut reader, "body count")?;
    let mut bodies = Vec::new();
    for _ in 0..body_count {
        let mut body = BodySetup::new(read_string(&mut reader)?);
        body.kind = body_kind_from_tag(read_u8(&mut reader, "body kind")?)?;
        let elem_count = read_count(&mut reader, "shape count")?;
        for _ in 0..elem_count {
            body.elems.push(read_shape(&mut reader)?);
        }
        bodies.push(body);
    }

    let constraint_count = read_count(&mut reader, "constraint count")?;
    let mut constraints = Vec::new();
    for _ in 0..constraint_count {
        let joint_name = read_string(&mut reader)?;
        let bone_a = read_string(&mut reader)?;
        let bone_b = read_string(&mut reader)?;
        let transform_in_a = read_pose(&mut reader)?;
        let transform_in_b = read_pose(&mut reader)?;
        let [swing1_degrees, swing2_degrees, twist_degrees] = read_f32s::<_, 3>(&mut reader, "limits")?;
        let kind = match read_u8(&mut reader, "joint kind")? {
            0 => JointKind::Cone,
            1 => JointKind::Revolute,
            tag => return Err(EngineError::BlobParse(format!("Invalid joint kind: {}", tag))),
        };
        constraints.push(ConstraintSetup {
            joint_name,
            bone_a,
            bone_b,
            transform_in_a,
            transform_in_b,
            limits: AngularLimits { swing1_degrees, swing2_degrees, twist_degrees },
            kind,
        });
    }

    Ok(PhysicsAsset::new(bodies, constraints))
}
