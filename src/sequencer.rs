//! Step sequencer for the background loop and the sound-effect presets.
//!
//! Nothing here touches Web Audio: each step produces a [`StepPlan`] that
//! the audio engine turns into parameter automation.

use std::f64::consts::PI;

pub const STEPS_PER_BAR: u64 = 16;
/// E2 D2 C2 B1, one per bar.
pub const BASS_ROOTS: [i32; 4] = [40, 38, 36, 35];
/// Root-fifth-octave arpeggio with chromatic leaps, offset from root + 3 octaves.
pub const ARP: [i32; 16] = [0, 7, 12, 7, 0, 7, 12, 15, 12, 7, 0, 7, 12, 10, 7, 12];
const GALLOP_ACCENTS: [u64; 6] = [0, 3, 6, 8, 11, 14];

/// Lead's pitch before the first step; E5.
pub const LEAD_START_MIDI: i32 = 76;
pub const LEAD_PAN: f32 = -0.2;
/// Notes are placed this far past the audio clock's "now".
pub const SCHEDULE_AHEAD: f64 = 0.005;

pub const CURVE_SAMPLES: usize = 44100;
/// Gain ramps end here; exponential ramps cannot reach zero.
pub const SILENCE: f32 = 0.0001;
pub const MIN_FREQ: f64 = 10.0;

pub fn midi_to_freq(midi: i32) -> f64 {
    440.0 * 2f64.powf((midi - 69) as f64 / 12.0)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tempo {
    pub bpm: f64,
}

impl Tempo {
    pub fn new(bpm: f64) -> Self {
        Self { bpm }
    }

    /// Length of a sixteenth note.
    pub fn step_seconds(&self) -> f64 {
        60.0 / self.bpm / 4.0
    }

    /// `setInterval` period for one step.
    pub fn interval_ms(&self) -> i32 {
        (self.step_seconds() * 1000.0).round() as i32
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::new(140.0)
    }
}

/// Linear attack to `peak`, then exponential decay to [`SILENCE`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Envelope {
    pub peak: f32,
    pub attack: f64,
    pub release: f64,
}

/// Pitch change on one of the persistent oscillators.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToneNote {
    pub midi: i32,
    pub envelope: Envelope,
}

impl ToneNote {
    pub fn freq(&self) -> f64 {
        midi_to_freq(self.midi)
    }
}

/// Sine drum: pitch drops exponentially while the gain decays.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Kick {
    pub start_hz: f64,
    pub end_hz: f64,
    pub sweep: f64,
    pub gain: f32,
    pub decay: f64,
    pub stop: f64,
}

pub const KICK: Kick = Kick {
    start_hz: 90.0,
    end_hz: 40.0,
    sweep: 0.08,
    gain: 0.18,
    decay: 0.12,
    stop: 0.14,
};

/// Burst of white noise through a high-pass filter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoiseHit {
    pub duration: f64,
    pub gain: f32,
    pub highpass_hz: f32,
}

pub const SNARE: NoiseHit = NoiseHit {
    duration: 0.06,
    gain: 0.12,
    highpass_hz: 1200.0,
};

const HAT_HIGHPASS: f32 = 7000.0;
const HAT_DURATION: f64 = 0.03;

/// Everything that sounds on one sixteenth.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepPlan {
    pub index: u64,
    pub bar_pos: u64,
    pub lead: ToneNote,
    pub bass: Option<ToneNote>,
    pub kick: Option<Kick>,
    pub snare: Option<NoiseHit>,
    pub hat: NoiseHit,
}

#[derive(Clone, Debug)]
pub struct Sequencer {
    step: u64,
    tempo: Tempo,
}

impl Sequencer {
    pub fn new(tempo: Tempo) -> Self {
        Self { step: 0, tempo }
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    /// Number of steps emitted so far.
    pub fn position(&self) -> u64 {
        self.step
    }

    pub fn reset(&mut self) {
        self.step = 0;
    }

    pub fn advance(&mut self) -> StepPlan {
        let index = self.step;
        self.step += 1;

        let step_len = self.tempo.step_seconds();
        let bar_pos = index % STEPS_PER_BAR;
        let bar = index / STEPS_PER_BAR;
        let root = BASS_ROOTS[(bar % BASS_ROOTS.len() as u64) as usize];
        let accent = GALLOP_ACCENTS.contains(&bar_pos);

        let lead = ToneNote {
            midi: root + 36 + ARP[bar_pos as usize],
            envelope: Envelope {
                peak: if accent { 0.08 } else { 0.06 },
                attack: 0.006,
                release: step_len * 0.85,
            },
        };

        let bass = (bar_pos % 2 == 0).then(|| ToneNote {
            midi: if bar_pos % 4 == 2 { root + 7 } else { root },
            envelope: Envelope {
                peak: if accent { 0.09 } else { 0.06 },
                attack: 0.004,
                release: step_len * 0.95,
            },
        });

        StepPlan {
            index,
            bar_pos,
            lead,
            bass,
            kick: (bar_pos % 4 == 0).then_some(KICK),
            snare: (bar_pos == 4 || bar_pos == 12).then_some(SNARE),
            hat: NoiseHit {
                duration: HAT_DURATION,
                gain: if bar_pos % 2 == 0 { 0.05 } else { 0.035 },
                highpass_hz: HAT_HIGHPASS,
            },
        }
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new(Tempo::default())
    }
}

/// Soft-clipping transfer curve for the bus's WaveShaper.
pub fn distortion_curve(amount: f32, samples: usize) -> Vec<f32> {
    let amount = amount as f64;
    let deg = PI / 180.0;
    (0..samples)
        .map(|i| {
            let x = (i as f64 * 2.0) / samples as f64 - 1.0;
            (((3.0 + amount) * x * 20.0 * deg) / (PI + amount * x.abs())) as f32
        })
        .collect()
}

/// Square-wave sweep used by the sound effects.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Chirp {
    pub start_hz: f64,
    pub end_hz: f64,
    pub duration: f64,
    pub volume: f32,
    /// Offset from the trigger time.
    pub delay: f64,
}

impl Chirp {
    const fn new(start_hz: f64, end_hz: f64, duration: f64, volume: f32, delay: f64) -> Self {
        Self {
            start_hz,
            end_hz,
            duration,
            volume,
            delay,
        }
    }

    pub fn start_freq(&self) -> f64 {
        self.start_hz.max(MIN_FREQ)
    }

    pub fn end_freq(&self) -> f64 {
        self.end_hz.max(MIN_FREQ)
    }
}

const SHOOT: [Chirp; 1] = [Chirp::new(900.0, 300.0, 0.12, 0.09, 0.0)];
const HIT: [Chirp; 2] = [
    Chirp::new(220.0, 110.0, 0.07, 0.11, 0.0),
    Chirp::new(660.0, 330.0, 0.05, 0.08, 0.02),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sfx {
    Shoot,
    Hit,
}

impl Sfx {
    pub fn chirps(self) -> &'static [Chirp] {
        match self {
            Sfx::Shoot => &SHOOT,
            Sfx::Hit => &HIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midi_to_freq() {
        assert!((midi_to_freq(69) - 440.0).abs() < 1e-9);
        assert!((midi_to_freq(81) - 880.0).abs() < 1e-9);
        assert!((midi_to_freq(57) - 220.0).abs() < 1e-9);
        assert!((midi_to_freq(LEAD_START_MIDI) - 659.2551).abs() < 1e-3);
    }

    #[test]
    fn test_tempo() {
        let t = Tempo::default();
        assert!((t.step_seconds() - 60.0 / 560.0).abs() < 1e-12);
        assert_eq!(t.interval_ms(), 107);
    }

    #[test]
    fn test_first_bar_pattern() {
        let mut seq = Sequencer::default();
        let plans: Vec<StepPlan> = (0..16).map(|_| seq.advance()).collect();

        let leads: Vec<i32> = plans.iter().map(|p| p.lead.midi - 76).collect();
        assert_eq!(leads, ARP.to_vec());

        let bass: Vec<Option<i32>> = plans.iter().map(|p| p.bass.map(|b| b.midi)).collect();
        assert_eq!(bass[0], Some(40));
        assert_eq!(bass[1], None);
        assert_eq!(bass[2], Some(47));
        assert_eq!(bass[4], Some(40));
        assert_eq!(bass[6], Some(47));
        assert_eq!(bass.iter().flatten().count(), 8);

        let kicks: Vec<u64> = plans.iter().filter(|p| p.kick.is_some()).map(|p| p.bar_pos).collect();
        assert_eq!(kicks, vec![0, 4, 8, 12]);
        let snares: Vec<u64> = plans.iter().filter(|p| p.snare.is_some()).map(|p| p.bar_pos).collect();
        assert_eq!(snares, vec![4, 12]);

        assert_eq!(plans[0].hat.gain, 0.05);
        assert_eq!(plans[1].hat.gain, 0.035);
        assert_eq!(plans[1].hat.highpass_hz, 7000.0);
    }

    #[test]
    fn test_accents_and_envelopes() {
        let mut seq = Sequencer::default();
        let plans: Vec<StepPlan> = (0..16).map(|_| seq.advance()).collect();
        assert_eq!(plans[3].lead.envelope.peak, 0.08);
        assert_eq!(plans[4].lead.envelope.peak, 0.06);
        assert_eq!(plans[6].bass.unwrap().envelope.peak, 0.09);
        assert_eq!(plans[2].bass.unwrap().envelope.peak, 0.06);
        let step = Tempo::default().step_seconds();
        assert!((plans[0].lead.envelope.release - step * 0.85).abs() < 1e-12);
        assert!((plans[0].bass.unwrap().envelope.release - step * 0.95).abs() < 1e-12);
    }

    #[test]
    fn test_roots_cycle_per_bar() {
        let mut seq = Sequencer::default();
        let mut roots = Vec::new();
        for _ in 0..5 {
            roots.push(seq.advance().bass.unwrap().midi);
            for _ in 1..16 {
                seq.advance();
            }
        }
        assert_eq!(roots, vec![40, 38, 36, 35, 40]);
        assert_eq!(seq.position(), 80);
        seq.reset();
        assert_eq!(seq.advance().index, 0);
    }

    #[test]
    fn test_distortion_curve_is_odd_and_monotonic() {
        let curve = distortion_curve(35.0, CURVE_SAMPLES);
        assert_eq!(curve.len(), CURVE_SAMPLES);
        assert_eq!(curve[CURVE_SAMPLES / 2], 0.0);
        for i in 1..CURVE_SAMPLES / 2 {
            assert!((curve[i] + curve[CURVE_SAMPLES - i]).abs() < 1e-6);
        }
        assert!(curve.windows(2).all(|w| w[0] < w[1]));
        assert!(curve[0] < 0.0);
    }

    #[test]
    fn test_sfx_presets() {
        let shoot = Sfx::Shoot.chirps();
        assert_eq!(shoot.len(), 1);
        assert_eq!((shoot[0].start_hz, shoot[0].end_hz), (900.0, 300.0));
        let hit = Sfx::Hit.chirps();
        assert_eq!(hit.len(), 2);
        assert_eq!(hit[1].delay, 0.02);
        let low = Chirp::new(5.0, 1.0, 0.1, 0.1, 0.0);
        assert_eq!(low.start_freq(), MIN_FREQ);
        assert_eq!(low.end_freq(), MIN_FREQ);
    }
}
