use rodio::Source;
use std::f32::consts::PI;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44100;
const FREQ_HZ: f32 = 440.0;
const PULSE_SECS: f32 = 0.2;
const PULSE_COUNT: usize = 2;
const ATTACK_SECS: f32 = 0.01;
const PEAK: f32 = 0.3;
const FLOOR: f32 = 0.01;

/// The expired-product warning: two back-to-back A4 square-wave pulses.
/// Square waves carry more harmonics than a sine, so the tone cuts through
/// even on small phone speakers.
pub struct AlertCue {
    num_sample: usize,
    total_samples: usize,
}

impl AlertCue {
    pub fn new() -> Self {
        Self {
            num_sample: 0,
            total_samples: (SAMPLE_RATE as f32 * PULSE_SECS * PULSE_COUNT as f32) as usize,
        }
    }

    fn envelope(pulse_t: f32) -> f32 {
        if pulse_t < ATTACK_SECS {
            PEAK * (pulse_t / ATTACK_SECS)
        } else {
            let progress = (pulse_t - ATTACK_SECS) / (PULSE_SECS - ATTACK_SECS);
            PEAK * (FLOOR / PEAK).powf(progress)
        }
    }
}

impl Default for AlertCue {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for AlertCue {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total_samples {
            return None;
        }

        let t = self.num_sample as f32 / SAMPLE_RATE as f32;
        self.num_sample += 1;

        let pulse_t = t % PULSE_SECS;
        let square = if (2.0 * PI * FREQ_HZ * pulse_t).sin() >= 0.0 {
            1.0
        } else {
            -1.0
        };

        Some(square * Self::envelope(pulse_t))
    }
}

impl Source for AlertCue {
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
        Some(Duration::from_secs_f32(PULSE_SECS * PULSE_COUNT as f32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_pulses_produce_sound() {
        let samples: Vec<f32> = AlertCue::new().collect();
        let pulse_len = (44100.0 * 0.2) as usize;
        assert_eq!(samples.len(), pulse_len * 2);

        let first_peak = samples[..pulse_len].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        let second_peak = samples[pulse_len..].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(first_peak > 0.2);
        assert!(second_peak > 0.2);
    }

    #[test]
    fn amplitude_stays_within_peak() {
        assert!(AlertCue::new().all(|s| s.abs() <= PEAK));
    }
}
