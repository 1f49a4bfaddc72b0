//! Playback engine: play one sample channel with pluggable loop behavior and
//! crossfades (spec §4.9).

use crate::error::{Error, Result};
use crate::sample::Sample;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PlayState {
    None,
    Play,
    Stop,
    Cancel,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LoopMode {
    None,
    Direct,
    Reverse,
    HalfPingPong,
    FullPingPong,
    SmartPingPong,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CrossfadeType {
    Linear,
    EqualPower,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum BatchType {
    Head,
    Loop,
    Tail,
    None,
}

#[derive(Copy, Clone, Debug)]
struct Batch {
    kind: BatchType,
    start: i64,
    end: i64,
    fade_in: usize,
    fade_out: usize,
}

impl Batch {
    const EMPTY: Batch = Batch {
        kind: BatchType::None,
        start: 0,
        end: 0,
        fade_in: 0,
        fade_out: 0,
    };

    fn direction(&self) -> i64 {
        if self.end >= self.start {
            1
        } else {
            -1
        }
    }

    fn len(&self) -> i64 {
        (self.end - self.start).abs()
    }
}

#[derive(Copy, Clone)]
pub struct PlaybackSettings {
    pub start: usize,
    pub volume: f32,
    pub loop_mode: LoopMode,
    pub loop_start: usize,
    pub loop_end: usize,
    pub crossfade_len: usize,
    pub crossfade_type: CrossfadeType,
    pub cancel_fade_len: usize,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            start: 0,
            volume: 1.0,
            loop_mode: LoopMode::None,
            loop_start: 0,
            loop_end: 0,
            crossfade_len: 0,
            crossfade_type: CrossfadeType::Linear,
            cancel_fade_len: 64,
        }
    }
}

/// One voice: a sample reference, its settings, and a 2-element batch ring
/// (spec's "Playback record").
pub struct Playback {
    sample: Option<Sample>,
    channel: usize,
    settings: PlaybackSettings,
    state: PlayState,
    batches: [Batch; 2],
    active: usize,
    pos: i64,
    samples_emitted: u64,
    loop_forward: bool,
    cancel_remaining: usize,
}

impl Playback {
    pub fn new() -> Self {
        Self {
            sample: None,
            channel: 0,
            settings: PlaybackSettings::default(),
            state: PlayState::None,
            batches: [Batch::EMPTY; 2],
            active: 0,
            pos: 0,
            samples_emitted: 0,
            loop_forward: true,
            cancel_remaining: 0,
        }
    }

    pub fn start_playback(&mut self, sample: Sample, channel: usize, settings: PlaybackSettings) -> Result<()> {
        if channel >= sample.channels() {
            return Err(Error::bad_args("channel out of range"));
        }
        let length = sample.length() as i64;
        self.sample = Some(sample);
        self.channel = channel;
        self.settings = settings;
        self.state = PlayState::Play;
        self.samples_emitted = 0;
        self.loop_forward = true;
        self.pos = settings.start as i64;
        self.active = 0;
        self.batches[0] = Self::plan_initial(&settings, length);
        self.batches[1] = Batch::EMPTY;
        Ok(())
    }

    fn plan_initial(settings: &PlaybackSettings, length: i64) -> Batch {
        let start = settings.start as i64;
        let loop_start = settings.loop_start as i64;
        let loop_end = settings.loop_end.min(settings.start.max(1)) as i64;
        let loop_end = loop_end.max(loop_start);
        if !matches!(settings.loop_mode, LoopMode::None) && start >= loop_start && start < loop_end {
            Batch {
                kind: BatchType::Loop,
                start,
                end: loop_end,
                fade_in: 0,
                fade_out: settings.crossfade_len.min(((loop_end - loop_start) / 2).max(0) as usize),
            }
        } else if start < loop_start {
            Batch {
                kind: BatchType::Head,
                start,
                end: loop_start,
                fade_in: 0,
                fade_out: 0,
            }
        } else {
            Batch {
                kind: BatchType::Tail,
                start,
                end: length,
                fade_in: 0,
                fade_out: 0,
            }
        }
    }

    fn plan_next(&self, finished: &Batch) -> Batch {
        let length = self.sample.as_ref().map(|s| s.length() as i64).unwrap_or(0);
        let loop_start = self.settings.loop_start as i64;
        let loop_end = (self.settings.loop_end as i64).max(loop_start);
        let xfade = self
            .settings
            .crossfade_len
            .min(((loop_end - loop_start) / 2).max(0) as usize);

        match finished.kind {
            BatchType::Head => Batch {
                kind: BatchType::Loop,
                start: loop_start,
                end: loop_end,
                fade_in: 0,
                fade_out: xfade,
            },
            BatchType::Loop => match self.settings.loop_mode {
                LoopMode::None => Batch {
                    kind: BatchType::Tail,
                    start: loop_end,
                    end: length,
                    fade_in: 0,
                    fade_out: 0,
                },
                LoopMode::Direct => Batch {
                    kind: BatchType::Loop,
                    start: loop_start,
                    end: loop_end,
                    fade_in: xfade,
                    fade_out: xfade,
                },
                LoopMode::Reverse => Batch {
                    kind: BatchType::Loop,
                    start: loop_end,
                    end: loop_start,
                    fade_in: xfade,
                    fade_out: xfade,
                },
                LoopMode::HalfPingPong | LoopMode::FullPingPong | LoopMode::SmartPingPong => {
                    let reverse_now = finished.direction() > 0;
                    let (s, e) = if reverse_now {
                        (loop_end, loop_start)
                    } else {
                        (loop_start, loop_end)
                    };
                    Batch {
                        kind: BatchType::Loop,
                        start: s,
                        end: e,
                        fade_in: xfade,
                        fade_out: xfade,
                    }
                }
            },
            BatchType::Tail | BatchType::None => Batch::EMPTY,
        }
    }

    /// Advance playback, writing up to `n` samples to `dst`. Returns the
    /// number of samples written; 0 means the voice is done.
    pub fn process_playback(&mut self, dst: &mut [f32], n: usize) -> Result<usize> {
        if self.state == PlayState::None {
            return Ok(0);
        }
        let Some(sample) = self.sample.clone() else { return Ok(0) };
        let channel_data = sample.channel(self.channel);
        dst[..n].fill(0.0);

        let mut written = 0usize;
        while written < n {
            if self.state == PlayState::Cancel {
                written += self.emit_cancel_fade(dst, channel_data, written, n - written);
                if self.cancel_remaining == 0 {
                    self.state = PlayState::None;
                    break;
                }
                continue;
            }

            let current = self.batches[self.active];
            if matches!(current.kind, BatchType::None) {
                self.state = PlayState::None;
                break;
            }

            let remaining_in_batch = current.len() - (self.pos - current.start).abs();
            if remaining_in_batch <= 0 {
                if self.state == PlayState::Stop && matches!(current.kind, BatchType::Loop) {
                    self.batches[self.active] = Batch {
                        kind: BatchType::Tail,
                        start: current.end,
                        end: channel_data.len() as i64,
                        fade_in: 0,
                        fade_out: 0,
                    };
                    continue;
                }
                let next = self.plan_next(&current);
                self.active = 1 - self.active;
                self.batches[self.active] = next;
                self.pos = next.start;
                if matches!(next.kind, BatchType::None) {
                    self.state = PlayState::None;
                    break;
                }
                continue;
            }

            let step = (n - written) as i64;
            let take = remaining_in_batch.min(step).max(1);
            for _ in 0..take {
                if written >= n {
                    break;
                }
                let idx = self.pos.clamp(0, channel_data.len() as i64 - 1) as usize;
                let dir = current.direction();
                let gain = crossfade_gain(&current, self.pos, self.settings.crossfade_type);
                dst[written] += channel_data[idx] * self.settings.volume * gain;
                self.pos += dir;
                self.samples_emitted += 1;
                written += 1;
            }
        }
        Ok(written)
    }

    fn emit_cancel_fade(&mut self, dst: &mut [f32], channel_data: &[f32], offset: usize, max: usize) -> usize {
        let total = self.settings.cancel_fade_len.max(1);
        let mut n = 0;
        while n < max && self.cancel_remaining > 0 {
            let t = self.cancel_remaining as f32 / total as f32;
            let idx = self.pos.clamp(0, channel_data.len() as i64 - 1) as usize;
            dst[offset + n] += channel_data[idx] * self.settings.volume * t;
            self.pos += 1;
            self.cancel_remaining -= 1;
            n += 1;
        }
        n
    }

    pub fn stop(&mut self) {
        if self.state == PlayState::Play {
            self.state = PlayState::Stop;
        }
    }

    pub fn cancel(&mut self) {
        self.state = PlayState::Cancel;
        self.cancel_remaining = self.settings.cancel_fade_len.max(1);
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn samples_emitted(&self) -> u64 {
        self.samples_emitted
    }
}

impl Default for Playback {
    fn default() -> Self {
        Self::new()
    }
}

fn crossfade_gain(batch: &Batch, pos: i64, kind: CrossfadeType) -> f32 {
    let into_start = (pos - batch.start).abs();
    let from_end = (batch.end - pos).abs();
    let mut g = 1.0f32;
    if batch.fade_in > 0 && (into_start as usize) < batch.fade_in {
        let t = into_start as f32 / batch.fade_in as f32;
        g *= fade_curve(t, kind);
    }
    if batch.fade_out > 0 && (from_end as usize) < batch.fade_out {
        let t = from_end as f32 / batch.fade_out as f32;
        g *= fade_curve(t, kind);
    }
    g
}

fn fade_curve(t: f32, kind: CrossfadeType) -> f32 {
    let t = t.clamp(0.0, 1.0);
    match kind {
        CrossfadeType::Linear => t,
        CrossfadeType::EqualPower => t.sqrt(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_loop_emits_exactly_length_minus_start() {
        let mut s = Sample::new(1, 48000, 100);
        s.set_length(100).unwrap();
        for (i, x) in s.channel_mut(0).iter_mut().enumerate() {
            *x = i as f32;
        }
        let mut pb = Playback::new();
        let settings = PlaybackSettings {
            start: 10,
            ..Default::default()
        };
        pb.start_playback(s, 0, settings).unwrap();
        let mut total = 0u64;
        let mut buf = vec![0.0f32; 16];
        loop {
            let n = pb.process_playback(&mut buf, 16).unwrap();
            if n == 0 {
                break;
            }
            total += n as u64;
        }
        assert_eq!(total, 90);
    }

    #[test]
    fn cancel_emits_a_fade_then_finishes() {
        let mut s = Sample::new(1, 48000, 1000);
        s.set_length(1000).unwrap();
        let mut pb = Playback::new();
        pb.start_playback(s, 0, PlaybackSettings::default()).unwrap();
        let mut buf = vec![0.0f32; 32];
        pb.process_playback(&mut buf, 32).unwrap();
        pb.cancel();
        let mut wrote_any = false;
        loop {
            let n = pb.process_playback(&mut buf, 32).unwrap();
            if n == 0 {
                break;
            }
            wrote_any = true;
        }
        assert!(wrote_any);
        assert_eq!(pb.state(), PlayState::None);
    }
}
