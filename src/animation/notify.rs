//! 动画通知
//!
//! 通知事件覆盖区间 [time, time + duration)。每次 tick 用扫过的时间段
//! 做区间相交测试，而不是对当前时间点采样，所以大步长也不会漏掉事件。
//!
//! 触发规则（每次越过恰好触发一次）：
//! - 正向段 [from, to)：事件起点 time 落在段内
//! - 反向段 (to, from]：事件终点 time + duration 落在段内

use std::fmt;
use std::sync::Arc;

use super::playback::{PlaybackStep, TimeSegment};
use super::sequence::AnimSequence;
use crate::component::SkeletalMeshComponent;

/// 通知负载
pub trait AnimNotify: Send + Sync {
    fn notify(&self, component: &SkeletalMeshComponent, animation: &AnimSequence);

    fn name(&self) -> &str {
        "AnimNotify"
    }
}

/// 通知事件
#[derive(Clone)]
pub struct NotifyEvent {
    /// 开始时间（秒）
    pub time: f32,
    /// 持续时间（秒，0 表示瞬时）
    pub duration: f32,
    pub payload: Arc<dyn AnimNotify>,
}

impl NotifyEvent {
    pub fn new(time: f32, duration: f32, payload: Arc<dyn AnimNotify>) -> Self {
        Self { time, duration: duration.max(0.0), payload }
    }

    #[inline]
    pub fn end_time(&self) -> f32 {
        self.time + self.duration
    }

    /// 是否被时间段越过
    pub fn is_crossed_by(&self, segment: &TimeSegment) -> bool {
        if segment.is_forward() {
            segment.from <= self.time && self.time < segment.to
        } else {
            let end = self.end_time();
            segment.to < end && end <= segment.from
        }
    }
}

impl fmt::Debug for NotifyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifyEvent")
            .field("time", &self.time)
            .field("duration", &self.duration)
            .field("payload", &self.payload.name())
            .finish()
    }
}

/// 通知轨道（事件按开始时间排序）
#[derive(Clone, Debug, Default)]
pub struct NotifyTrack {
    pub name: String,
    events: Vec<NotifyEvent>,
}

impl NotifyTrack {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), events: Vec::new() }
    }

    pub fn add_event(&mut self, event: NotifyEvent) {
        let at = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(at, event);
    }

    pub fn events(&self) -> &[NotifyEvent] {
        &self.events
    }
}

fn collect_segment(sequence: &AnimSequence, segment: &TimeSegment, fired: &mut Vec<Arc<dyn AnimNotify>>) {
    if segment.is_empty() {
        return;
    }
    for track in sequence.notify_tracks() {
        fired.extend(
            track
                .events()
                .iter()
                .filter(|e| e.is_crossed_by(segment))
                .map(|e| e.payload.clone()),
        );
    }
}

/// 收集本次 tick 越过的所有通知负载（按段顺序、轨道顺序）
///
/// 完整循环圈排在首段之后，每圈触发一次整圈内的全部事件。
pub fn collect_crossed_notifies(sequence: &AnimSequence, step: &PlaybackStep) -> Vec<Arc<dyn AnimNotify>> {
    let mut fired = Vec::new();
    let mut segments = step.segments.iter();
    if let Some(first) = segments.next() {
        collect_segment(sequence, first, &mut fired);
    }
    if step.full_laps > 0 {
        let mut lap = Vec::new();
        collect_segment(sequence, &step.lap_segment, &mut lap);
        for _ in 0..step.full_laps {
            fired.extend(lap.iter().cloned());
        }
    }
    for segment in segments {
        collect_segment(sequence, segment, &mut fired);
    }
    fired
}
