use rodio::Source;
use std::f32::consts::PI;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44100;
const FREQ_HZ: f32 = 880.0;
const DURATION_SECS: f32 = 0.15;
const ATTACK_SECS: f32 = 0.01;
const PEAK: f32 = 0.4;
const FLOOR: f32 = 0.01;

/// The capture confirmation beep: a short A5 sine with a fast attack and an
/// exponential decay, so it reads as a "tick" rather than a tone.
pub struct ScanCue {
    num_sample: usize,
    total_samples: usize,
}

impl ScanCue {
    pub fn new() -> Self {
        Self {
            num_sample: 0,
            total_samples: (SAMPLE_RATE as f32 * DURATION_SECS) as usize,
        }
    }

    fn envelope(t: f32) -> f32 {
        if t < ATTACK_SECS {
            PEAK * (t / ATTACK_SECS)
        } else {
            let progress = (t - ATTACK_SECS) / (DURATION_SECS - ATTACK_SECS);
            PEAK * (FLOOR / PEAK).powf(progress)
        }
    }
}

impl Default for ScanCue {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for ScanCue {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total_samples {
            return None;
        }

        let t = self.num_sample as f32 / SAMPLE_RATE as f32;
        self.num_sample += 1;

        Some((2.0 * PI * FREQ_HZ * t).sin() * Self::envelope(t))
    }
}

impl Source for ScanCue {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(DURATION_SECS))
    }
}
