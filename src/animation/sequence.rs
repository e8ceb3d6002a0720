//! 动画序列
//!
//! 按骨骼名称组织轨道（名称比索引更能经受骨骼重新导入），
//! 外加若干通知轨道。

use std::collections::HashMap;

use super::motion_track::{BoneKeyframe, BoneTrack};
use super::notify::{NotifyEvent, NotifyTrack};
use crate::skeleton::BoneTransform;

/// 默认帧率
pub const DEFAULT_FRAME_RATE: f32 = 30.0;

/// 动画序列
#[derive(Debug, Clone)]
pub struct AnimSequence {
    pub name: String,
    frame_rate: f32,
    frame_count: u32,
    tracks: HashMap<String, BoneTrack>,
    notify_tracks: Vec<NotifyTrack>,
}

impl AnimSequence {
    pub fn new(name: impl Into<String>, frame_rate: f32) -> Self {
        let frame_rate = if frame_rate > 0.0 { frame_rate } else { DEFAULT_FRAME_RATE };
        Self {
            name: name.into(),
            frame_rate,
            frame_count: 0,
            tracks: HashMap::new(),
            notify_tracks: Vec::new(),
        }
    }

    #[inline]
    pub fn frame_rate(&self) -> f32 {
        self.frame_rate
    }

    /// 帧数（至少覆盖所有关键帧）
    #[inline]
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// 显式延长帧数（不会短于已有关键帧）
    pub fn set_frame_count(&mut self, frame_count: u32) {
        let min = self.tracks.values().map(|t| t.max_frame_index() + 1).max().unwrap_or(0);
        self.frame_count = frame_count.max(min);
    }

    /// 最后一帧的索引
    pub fn last_frame(&self) -> u32 {
        self.frame_count.saturating_sub(1)
    }

    /// 时长（秒）
    pub fn duration(&self) -> f32 {
        self.frame_count as f32 / self.frame_rate
    }

    pub fn insert_bone_keyframe(&mut self, bone_name: &str, frame_index: u32, transform: BoneTransform) {
        self.tracks
            .entry(bone_name.to_string())
            .or_default()
            .insert_keyframe(BoneKeyframe::new(frame_index, transform));
        self.frame_count = self.frame_count.max(frame_index + 1);
    }

    pub fn bone_track(&self, bone_name: &str) -> Option<&BoneTrack> {
        self.tracks.get(bone_name)
    }

    pub fn contains_bone_track(&self, bone_name: &str) -> bool {
        self.tracks.contains_key(bone_name)
    }

    pub fn bone_track_names(&self) -> impl Iterator<Item = &String> {
        self.tracks.keys()
    }

    /// 采样骨骼在某帧的局部变换；序列中没有该骨骼时返回 None
    pub fn sample_bone(&self, bone_name: &str, frame_index: u32) -> Option<BoneTransform> {
        self.tracks.get(bone_name).and_then(|t| t.seek(frame_index))
    }

    /// 帧间采样（amount 为到下一帧的插值系数）
    pub fn sample_bone_precisely(&self, bone_name: &str, frame_index: u32, amount: f32) -> Option<BoneTransform> {
        self.tracks.get(bone_name).and_then(|t| t.seek_precisely(frame_index, amount))
    }

    // ========================================
    // 通知
    // ========================================

    /// 添加通知轨道，返回其索引
    pub fn add_notify_track(&mut self, name: impl Into<String>) -> usize {
        self.notify_tracks.push(NotifyTrack::new(name));
        self.notify_tracks.len() - 1
    }

    /// 向指定轨道添加事件；轨道不存在时返回 false
    pub fn add_notify_event(&mut self, track: usize, event: NotifyEvent) -> bool {
        match self.notify_tracks.get_mut(track) {
            Some(t) => {
                t.add_event(event);
                true
            }
            None => false,
        }
    }

    pub fn notify_tracks(&self) -> &[NotifyTrack] {
        &self.notify_tracks
    }
}
