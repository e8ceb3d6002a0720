//! 动画系统
//!
//! - motion_track: 单骨骼关键帧轨道与插值
//! - sequence: 动画序列（骨骼轨道 + 通知轨道）
//! - playback: 播放状态机
//! - notify: 动画通知

pub mod motion_track;
pub mod notify;
pub mod playback;
pub mod sequence;

pub use motion_track::{BoneKeyframe, BoneTrack};
pub use notify::{collect_crossed_notifies, AnimNotify, NotifyEvent, NotifyTrack};
pub use playback::{AnimPlayback, PlaybackState, PlaybackStep, TimeSegment};
pub use sequence::{AnimSequence, DEFAULT_FRAME_RATE};
