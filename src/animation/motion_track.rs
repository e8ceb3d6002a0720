//! 动画轨道
//!
//! 存储单个骨骼的所有关键帧，并提供查找和插值功能

use std::collections::BTreeMap;

use glam::{Quat, Vec3};

use crate::skeleton::BoneTransform;

/// 骨骼关键帧（父空间下的局部变换）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneKeyframe {
    pub frame_index: u32,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl BoneKeyframe {
    pub fn new(frame_index: u32, transform: BoneTransform) -> Self {
        Self {
            frame_index,
            translation: transform.translation,
            rotation: transform.rotation,
            scale: transform.scale,
        }
    }

    #[inline]
    pub fn transform(&self) -> BoneTransform {
        BoneTransform { translation: self.translation, rotation: self.rotation, scale: self.scale }
    }
}

/// 插值系数
#[inline]
fn coefficient(prev_frame: u32, next_frame: u32, frame: u32) -> f32 {
    let interval = next_frame.saturating_sub(prev_frame);
    if interval == 0 {
        return 0.0;
    }
    (frame.saturating_sub(prev_frame)) as f32 / interval as f32
}

fn interpolate(prev: &BoneKeyframe, next: &BoneKeyframe, amount: f32) -> BoneTransform {
    BoneTransform {
        translation: prev.translation.lerp(next.translation, amount),
        rotation: prev.rotation.slerp(next.rotation, amount),
        scale: prev.scale.lerp(next.scale, amount),
    }
}

/// 骨骼动画轨道
#[derive(Debug, Clone, Default)]
pub struct BoneTrack {
    /// 关键帧映射（帧索引 -> 关键帧）
    keyframes: BTreeMap<u32, BoneKeyframe>,
}

impl BoneTrack {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入关键帧（同帧覆盖，返回旧值）
    pub fn insert_keyframe(&mut self, keyframe: BoneKeyframe) -> Option<BoneKeyframe> {
        self.keyframes.insert(keyframe.frame_index, keyframe)
    }

    pub fn remove_keyframe(&mut self, frame_index: u32) -> Option<BoneKeyframe> {
        self.keyframes.remove(&frame_index)
    }

    pub fn find(&self, frame_index: u32) -> Option<&BoneKeyframe> {
        self.keyframes.get(&frame_index)
    }

    /// 查找最近的前后关键帧（前帧 <= frame_index < 后帧）
    fn search_closest(&self, frame_index: u32) -> (Option<&BoneKeyframe>, Option<&BoneKeyframe>) {
        let prev = self.keyframes.range(..=frame_index).next_back().map(|(_, kf)| kf);
        let next = self
            .keyframes
            .range(frame_index.saturating_add(1)..)
            .next()
            .map(|(_, kf)| kf);
        (prev, next)
    }

    /// 求值指定帧；轨道为空时返回 None
    pub fn seek(&self, frame_index: u32) -> Option<BoneTransform> {
        if let Some(kf) = self.find(frame_index) {
            return Some(kf.transform());
        }
        match self.search_closest(frame_index) {
            (Some(prev), Some(next)) => {
                let coef = coefficient(prev.frame_index, next.frame_index, frame_index);
                Some(interpolate(prev, next, coef))
            }
            (Some(only), None) | (None, Some(only)) => Some(only.transform()),
            (None, None) => None,
        }
    }

    /// 精确求值（支持帧间插值，amount ∈ [0, 1)）
    pub fn seek_precisely(&self, frame_index: u32, amount: f32) -> Option<BoneTransform> {
        let f0 = self.seek(frame_index)?;
        if amount <= 0.0 {
            return Some(f0);
        }
        let f1 = self.seek(frame_index.saturating_add(1)).unwrap_or(f0);
        Some(BoneTransform {
            translation: f0.translation.lerp(f1.translation, amount),
            rotation: f0.rotation.slerp(f1.rotation, amount),
            scale: f0.scale.lerp(f1.scale, amount),
        })
    }

    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    /// 最大帧索引
    pub fn max_frame_index(&self) -> u32 {
        self.keyframes.keys().next_back().copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(frame: u32, x: f32) -> BoneKeyframe {
        BoneKeyframe::new(frame, BoneTransform { translation: Vec3::new(x, 0.0, 0.0), ..Default::default() })
    }

    #[test]
    fn interpolates_between_keys() {
        let mut track = BoneTrack::new();
        track.insert_keyframe(key(0, 0.0));
        track.insert_keyframe(key(10, 10.0));
        let t = track.seek(4).unwrap();
        assert!((t.translation.x - 4.0).abs() < 1e-5);
    }

    #[test]
    fn holds_outside_key_range() {
        let mut track = BoneTrack::new();
        track.insert_keyframe(key(5, 1.0));
        track.insert_keyframe(key(8, 2.0));
        assert_eq!(track.seek(0).unwrap().translation.x, 1.0);
        assert_eq!(track.seek(100).unwrap().translation.x, 2.0);
        assert_eq!(track.max_frame_index(), 8);
    }

    #[test]
    fn empty_track_yields_nothing() {
        assert!(BoneTrack::new().seek(3).is_none());
    }

    #[test]
    fn sub_frame_sampling() {
        let mut track = BoneTrack::new();
        track.insert_keyframe(key(0, 0.0));
        track.insert_keyframe(key(1, 2.0));
        let t = track.seek_precisely(0, 0.25).unwrap();
        assert!((t.translation.x - 0.5).abs() < 1e-5);
    }
}
