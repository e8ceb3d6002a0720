//! 播放状态机
//!
//! 状态：Stopped / Playing(正向) / Playing(反向)，暂停是正交的守卫标志：
//! 暂停期间无论是否 Playing，时间都不前进。
//!
//! 循环时帧索引在 [loop_start_frame, loop_end_frame] 内回绕；
//! 不循环时夹在边界帧并保持（状态仍为 Playing，可以反向播放回来）。

use super::sequence::{AnimSequence, DEFAULT_FRAME_RATE};

/// 浮点帧号取整前的容差（11/30 秒 * 30 不能落到 10）
const FRAME_EPSILON: f32 = 1e-4;

/// 对外可见的播放状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    PlayingForward,
    PlayingReverse,
    Paused,
}

/// 一次 tick 扫过的时间段（反向播放时 from > to）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeSegment {
    pub from: f32,
    pub to: f32,
}

impl TimeSegment {
    #[inline]
    pub fn is_forward(&self) -> bool {
        self.to >= self.from
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }
}

/// tick 结果
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackStep {
    pub previous_time: f32,
    pub current_time: f32,
    /// 按扫过顺序排列，在循环回绕点处切开
    pub segments: Vec<TimeSegment>,
    /// 额外扫过的完整循环圈数（不逐圈展开，每圈等价于一次 lap_segment）
    pub full_laps: u32,
    /// 完整一圈对应的段，方向与播放方向一致
    pub lap_segment: TimeSegment,
}

/// 动画播放器
#[derive(Clone, Debug)]
pub struct AnimPlayback {
    playing: bool,
    paused: bool,
    reverse: bool,
    pub looping: bool,
    pub play_rate: f32,
    frame_rate: f32,
    elapsed_time: f32,
    loop_start_frame: u32,
    loop_end_frame: u32,
}

impl Default for AnimPlayback {
    fn default() -> Self {
        Self {
            playing: false,
            paused: false,
            reverse: false,
            looping: true,
            play_rate: 1.0,
            frame_rate: DEFAULT_FRAME_RATE,
            elapsed_time: 0.0,
            loop_start_frame: 0,
            loop_end_frame: 0,
        }
    }
}

impl AnimPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按序列设置帧率和完整循环区间
    pub fn configure_for(&mut self, sequence: &AnimSequence) {
        self.frame_rate = sequence.frame_rate();
        self.loop_start_frame = 0;
        self.loop_end_frame = sequence.last_frame();
        self.elapsed_time = self.elapsed_time.clamp(self.range_start_time(), self.range_end_time());
    }

    // ========================================
    // 状态转换
    // ========================================

    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    /// 停止（不重置已播放时间）
    pub fn stop(&mut self) {
        self.playing = false;
    }

    pub fn set_reverse(&mut self, reverse: bool) {
        self.reverse = reverse;
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn reset_elapsed_time(&mut self) {
        self.elapsed_time = self.range_start_time();
    }

    pub fn state(&self) -> PlaybackState {
        match (self.playing, self.paused, self.reverse) {
            (false, _, _) => PlaybackState::Stopped,
            (true, true, _) => PlaybackState::Paused,
            (true, false, false) => PlaybackState::PlayingForward,
            (true, false, true) => PlaybackState::PlayingReverse,
        }
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    #[inline]
    pub fn is_reverse(&self) -> bool {
        self.reverse
    }

    // ========================================
    // 时间与帧
    // ========================================

    pub fn frame_rate(&self) -> f32 {
        self.frame_rate
    }

    pub fn set_frame_rate(&mut self, frame_rate: f32) {
        if frame_rate > 0.0 {
            self.frame_rate = frame_rate;
        }
    }

    pub fn elapsed_time(&self) -> f32 {
        self.elapsed_time
    }

    pub fn set_elapsed_time(&mut self, time: f32) {
        self.elapsed_time = time;
    }

    pub fn loop_range(&self) -> (u32, u32) {
        (self.loop_start_frame, self.loop_end_frame)
    }

    /// 设置循环区间（闭区间，顺序颠倒时自动交换）
    pub fn set_loop_range(&mut self, start_frame: u32, end_frame: u32) {
        self.loop_start_frame = start_frame.min(end_frame);
        self.loop_end_frame = start_frame.max(end_frame);
    }

    #[inline]
    fn range_start_time(&self) -> f32 {
        self.loop_start_frame as f32 / self.frame_rate
    }

    /// 区间末帧结束的时刻（半开上界）
    #[inline]
    fn range_end_time(&self) -> f32 {
        (self.loop_end_frame + 1) as f32 / self.frame_rate
    }

    /// 当前显示帧
    pub fn current_frame(&self) -> u32 {
        let raw = (self.elapsed_time * self.frame_rate + FRAME_EPSILON).floor() as i64;
        let start = self.loop_start_frame as i64;
        let end = self.loop_end_frame as i64;
        if self.looping {
            let span = end - start + 1;
            (start + (raw - start).rem_euclid(span)) as u32
        } else {
            raw.clamp(start, end) as u32
        }
    }

    /// 当前帧与帧内插值系数 ∈ [0, 1)
    ///
    /// 夹在边界外或停在循环末帧时系数为 0，不向区间外的帧插值。
    pub fn current_frame_with_fraction(&self) -> (u32, f32) {
        let frame = self.current_frame();
        let position = self.elapsed_time * self.frame_rate;
        let raw = (position + FRAME_EPSILON).floor();
        let outside = raw < self.loop_start_frame as f32 || raw > self.loop_end_frame as f32;
        if frame >= self.loop_end_frame || (!self.looping && outside) {
            return (frame, 0.0);
        }
        (frame, (position - raw).clamp(0.0, 1.0 - f32::EPSILON))
    }

    // ========================================
    // 推进
    // ========================================

    /// 推进播放时间；停止或暂停时返回 None
    pub fn tick(&mut self, delta_time: f32) -> Option<PlaybackStep> {
        if !self.playing || self.paused || delta_time <= 0.0 {
            return None;
        }
        let direction = if self.reverse { -1.0 } else { 1.0 };
        let delta = delta_time * self.play_rate * direction;
        let previous_time = self.elapsed_time;

        let (start, end) = (self.range_start_time(), self.range_end_time());
        let lap_segment = if delta > 0.0 {
            TimeSegment { from: start, to: end }
        } else {
            TimeSegment { from: end, to: start }
        };

        let (segments, full_laps) = if self.looping {
            self.advance_looping(delta)
        } else {
            (self.advance_clamped(delta), 0)
        };

        Some(PlaybackStep { previous_time, current_time: self.elapsed_time, segments, full_laps, lap_segment })
    }

    fn advance_clamped(&mut self, delta: f32) -> Vec<TimeSegment> {
        let from = self.elapsed_time;
        let to = (from + delta).clamp(self.range_start_time(), self.range_end_time());
        self.elapsed_time = to;
        vec![TimeSegment { from, to }]
    }

    /// 返回（不足一圈的段，完整圈数）
    ///
    /// 从任意位置扫过整圈都回到原处，且每个时刻恰好越过一次，
    /// 所以整圈先整体扣除，剩余部分再逐段切开。
    fn advance_looping(&mut self, delta: f32) -> (Vec<TimeSegment>, u32) {
        let start = self.range_start_time();
        let end = self.range_end_time();
        let span = end - start;
        let mut segments = Vec::new();

        // 先把当前时间规范到区间内（外部 seek 可能越界）
        let mut cur = if self.elapsed_time < start || self.elapsed_time >= end {
            start + (self.elapsed_time - start).rem_euclid(span)
        } else {
            self.elapsed_time
        };

        let mut remaining = delta.abs();
        let full_laps = if span > 0.0 { (remaining / span).floor() as u32 } else { 0 };
        remaining = (remaining - full_laps as f32 * span).max(0.0);

        if delta > 0.0 {
            while remaining > 0.0 {
                let to_boundary = end - cur;
                if remaining < to_boundary {
                    segments.push(TimeSegment { from: cur, to: cur + remaining });
                    cur += remaining;
                    break;
                }
                segments.push(TimeSegment { from: cur, to: end });
                remaining -= to_boundary;
                cur = start;
            }
        } else {
            while remaining > 0.0 {
                let to_boundary = cur - start;
                if remaining <= to_boundary {
                    segments.push(TimeSegment { from: cur, to: cur - remaining });
                    cur -= remaining;
                    break;
                }
                segments.push(TimeSegment { from: cur, to: start });
                remaining -= to_boundary;
                cur = end;
            }
        }

        self.elapsed_time = cur;
        (segments, full_laps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn looping_0_9() -> AnimPlayback {
        let mut p = AnimPlayback::new();
        p.set_frame_rate(30.0);
        p.set_loop_range(0, 9);
        p.looping = true;
        p
    }

    #[test]
    fn frame_eleven_wraps_to_one() {
        let mut p = looping_0_9();
        p.set_elapsed_time(11.0 / 30.0);
        assert_eq!(p.current_frame(), 1);
    }

    #[test]
    fn tick_wraps_and_splits_segments() {
        let mut p = looping_0_9();
        p.set_elapsed_time(9.0 / 30.0);
        p.play();
        let step = p.tick(2.0 / 30.0).unwrap();
        assert_eq!(step.segments.len(), 2);
        assert!((step.segments[0].to - 10.0 / 30.0).abs() < 1e-6);
        assert_eq!(step.segments[1].from, 0.0);
        assert_eq!(p.current_frame(), 1);
    }

    #[test]
    fn non_looping_clamps_and_holds() {
        let mut p = looping_0_9();
        p.looping = false;
        p.play();
        p.tick(5.0);
        assert_eq!(p.current_frame(), 9);
        assert_eq!(p.state(), PlaybackState::PlayingForward);
        p.tick(1.0);
        assert_eq!(p.current_frame(), 9);
    }

    #[test]
    fn fraction_between_frames() {
        let mut p = looping_0_9();
        p.set_elapsed_time(2.5 / 30.0);
        let (frame, amount) = p.current_frame_with_fraction();
        assert_eq!(frame, 2);
        assert!((amount - 0.5).abs() < 1e-4);

        // 末帧不向区间外插值
        p.set_elapsed_time(9.5 / 30.0);
        assert_eq!(p.current_frame_with_fraction(), (9, 0.0));
    }

    #[test]
    fn paused_does_not_advance() {
        let mut p = looping_0_9();
        p.play();
        p.set_paused(true);
        assert!(p.tick(0.1).is_none());
        assert_eq!(p.elapsed_time(), 0.0);
        assert_eq!(p.state(), PlaybackState::Paused);
    }

    #[test]
    fn stop_keeps_elapsed_time() {
        let mut p = looping_0_9();
        p.play();
        p.tick(0.1);
        p.stop();
        assert_eq!(p.state(), PlaybackState::Stopped);
        assert!(p.elapsed_time() > 0.0);
        assert!(p.tick(0.1).is_none());
        p.reset_elapsed_time();
        assert_eq!(p.elapsed_time(), 0.0);
    }

    #[test]
    fn reverse_runs_backwards_and_wraps() {
        let mut p = looping_0_9();
        p.set_elapsed_time(1.0 / 30.0);
        p.set_reverse(true);
        p.play();
        let step = p.tick(2.0 / 30.0).unwrap();
        assert_eq!(p.state(), PlaybackState::PlayingReverse);
        assert!(!step.segments[0].is_forward());
        assert_eq!(p.current_frame(), 9);
    }
}
