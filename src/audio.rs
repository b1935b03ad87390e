//! Web Audio graph for the chiptune loop and the sound effects.
//!
//! The context is created lazily on the first user gesture, since browsers
//! refuse to start audio before one. Every failure here is logged and
//! swallowed: the game keeps running without sound.

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Float32Array, Function, Reflect};
use log::{debug, info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{
    AudioBuffer, AudioContext, AudioContextState, AudioNode, AudioParam, BiquadFilterType,
    GainNode, OscillatorNode, OscillatorType, StereoPannerNode, WaveShaperNode,
};

use crate::config::AudioConfig;
use crate::driver::Interval;
use crate::error::{audio_err, Result};
use crate::sequencer::{
    distortion_curve, midi_to_freq, Chirp, Envelope, Kick, NoiseHit, Sequencer, Sfx, Tempo,
    BASS_ROOTS, CURVE_SAMPLES, LEAD_PAN, LEAD_START_MIDI, SCHEDULE_AHEAD, SILENCE,
};
use crate::sim::SimEvent;

type JsResult<T> = std::result::Result<T, JsValue>;

/// Number of noise samples for a burst, never zero.
fn noise_len(sample_rate: f32, duration: f64) -> u32 {
    ((sample_rate as f64 * duration).floor() as u32).max(1)
}

/// Shared output stage: music and effects each get a gain, both feed one
/// distortion shaper.
struct Bus {
    music: GainNode,
    sfx: GainNode,
    shaper: WaveShaperNode,
}

impl Bus {
    fn new(ctx: &AudioContext, config: &AudioConfig) -> JsResult<Self> {
        let shaper = ctx.create_wave_shaper()?;
        let curve = Float32Array::from(distortion_curve(config.distortion, CURVE_SAMPLES).as_slice());
        Reflect::set(&shaper, &JsValue::from_str("curve"), &curve)?;
        Reflect::set(&shaper, &JsValue::from_str("oversample"), &JsValue::from_str("2x"))?;
        shaper.connect_with_audio_node(&ctx.destination())?;

        let music = ctx.create_gain()?;
        music.gain().set_value(config.master_gain);
        music.connect_with_audio_node(&shaper)?;

        let sfx = ctx.create_gain()?;
        sfx.gain().set_value(config.sfx_gain);
        sfx.connect_with_audio_node(&shaper)?;

        Ok(Self { music, sfx, shaper })
    }

    fn disconnect(&self) {
        let nodes: [&AudioNode; 3] = [&self.music, &self.sfx, &self.shaper];
        for node in nodes {
            let _ = node.disconnect();
        }
    }
}

/// The two oscillators that run for as long as the music does.
pub struct MusicVoices {
    lead: OscillatorNode,
    lead_gain: GainNode,
    lead_pan: Option<StereoPannerNode>,
    bass: OscillatorNode,
    bass_gain: GainNode,
}

impl MusicVoices {
    fn new(ctx: &AudioContext, master: &GainNode) -> JsResult<Self> {
        let lead_gain = ctx.create_gain()?;
        lead_gain.gain().set_value(0.0);
        // panning is cosmetic; fall back to a direct connection
        let lead_pan = match ctx.create_stereo_panner() {
            Ok(pan) => {
                pan.pan().set_value(LEAD_PAN);
                lead_gain.connect_with_audio_node(&pan)?;
                pan.connect_with_audio_node(master)?;
                Some(pan)
            }
            Err(_) => {
                lead_gain.connect_with_audio_node(master)?;
                None
            }
        };
        let lead = square(ctx, midi_to_freq(LEAD_START_MIDI))?;
        lead.connect_with_audio_node(&lead_gain)?;

        let bass_gain = ctx.create_gain()?;
        bass_gain.gain().set_value(0.0);
        bass_gain.connect_with_audio_node(master)?;
        let bass = square(ctx, midi_to_freq(BASS_ROOTS[0]))?;
        bass.connect_with_audio_node(&bass_gain)?;

        lead.start()?;
        bass.start()?;
        Ok(Self {
            lead,
            lead_gain,
            lead_pan,
            bass,
            bass_gain,
        })
    }

    fn stop(&self) {
        let _ = self.lead.stop();
        let _ = self.bass.stop();
        let _ = self.lead.disconnect();
        let _ = self.bass.disconnect();
        let _ = self.lead_gain.disconnect();
        let _ = self.bass_gain.disconnect();
        if let Some(pan) = &self.lead_pan {
            let _ = pan.disconnect();
        }
    }
}

/// State the interval callback mutates on every step.
struct Score {
    ctx: AudioContext,
    master: GainNode,
    voices: MusicVoices,
    sequencer: Sequencer,
}

impl Score {
    fn play_step(&mut self) -> JsResult<()> {
        let plan = self.sequencer.advance();
        let t = self.ctx.current_time() + SCHEDULE_AHEAD;

        if let Some(bass) = plan.bass {
            self.voices.bass.frequency().set_value_at_time(bass.freq() as f32, t)?;
            shape(&self.voices.bass_gain.gain(), &bass.envelope, t)?;
        }
        self.voices
            .lead
            .frequency()
            .set_value_at_time(plan.lead.freq() as f32, t)?;
        shape(&self.voices.lead_gain.gain(), &plan.lead.envelope, t)?;

        if let Some(kick) = plan.kick {
            play_kick(&self.ctx, &self.master, &kick, t)?;
        }
        if let Some(snare) = plan.snare {
            play_noise(&self.ctx, &self.master, &snare, t)?;
        }
        play_noise(&self.ctx, &self.master, &plan.hat, t)
    }
}

struct Music {
    score: Rc<RefCell<Score>>,
    interval: Interval,
}

impl Music {
    fn stop(self) {
        // clear the timer before silencing so no step lands on dead nodes
        drop(self.interval);
        self.score.borrow().voices.stop();
    }
}

pub struct AudioEngine {
    config: AudioConfig,
    ctx: Option<AudioContext>,
    bus: Option<Bus>,
    music: Option<Music>,
    resuming: bool,
}

impl AudioEngine {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            config: config.clone(),
            ctx: None,
            bus: None,
            music: None,
            resuming: false,
        }
    }

    pub fn music_started(&self) -> bool {
        self.music.is_some()
    }

    fn ensure_context(&mut self) -> Result<AudioContext> {
        if let Some(ctx) = &self.ctx {
            return Ok(ctx.clone());
        }
        let ctx = AudioContext::new().map_err(audio_err)?;
        let bus = match Bus::new(&ctx, &self.config) {
            Ok(bus) => bus,
            Err(e) => {
                let _ = ctx.close();
                return Err(audio_err(e));
            }
        };
        debug!("audio context created at {} Hz", ctx.sample_rate());
        self.bus = Some(bus);
        self.ctx = Some(ctx.clone());
        Ok(ctx)
    }

    /// Gesture hook: creates and resumes the context, then starts the music.
    /// Safe to call on every key press; a rejected resume is retried on the
    /// next gesture.
    pub fn unlock(engine: &Rc<RefCell<AudioEngine>>) {
        let mut this = engine.borrow_mut();
        if !this.config.enabled {
            return;
        }
        let ctx = match this.ensure_context() {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!("audio unavailable: {}", e);
                return;
            }
        };
        match ctx.state() {
            AudioContextState::Running => this.start_music_logged(),
            AudioContextState::Suspended if !this.resuming => {
                let promise = match ctx.resume() {
                    Ok(promise) => promise,
                    Err(e) => {
                        debug!("audio resume refused: {:?}", e);
                        return;
                    }
                };
                this.resuming = true;
                drop(this);

                let weak = Rc::downgrade(engine);
                spawn_local(async move {
                    let resumed = JsFuture::from(promise).await;
                    let Some(engine) = weak.upgrade() else {
                        return;
                    };
                    let mut this = engine.borrow_mut();
                    this.resuming = false;
                    match resumed {
                        Ok(_) => {
                            debug!("audio unlocked");
                            this.start_music_logged();
                        }
                        Err(e) => debug!("audio resume rejected, retrying on next gesture: {:?}", e),
                    }
                });
            }
            _ => {}
        }
    }

    fn start_music_logged(&mut self) {
        if let Err(e) = self.start_music() {
            warn!("music disabled: {}", e);
        }
    }

    /// Builds the voices and starts the step timer. No-op when already
    /// playing or before the context exists.
    pub fn start_music(&mut self) -> Result<()> {
        if self.music.is_some() {
            return Ok(());
        }
        let (Some(ctx), Some(bus)) = (&self.ctx, &self.bus) else {
            return Ok(());
        };
        let tempo = Tempo::new(self.config.bpm);
        let voices = MusicVoices::new(ctx, &bus.music).map_err(audio_err)?;
        let score = Rc::new(RefCell::new(Score {
            ctx: ctx.clone(),
            master: bus.music.clone(),
            voices,
            sequencer: Sequencer::new(tempo),
        }));

        let tick_score = Rc::clone(&score);
        let interval = Interval::new(tempo.interval_ms(), move || {
            if let Err(e) = tick_score.borrow_mut().play_step() {
                debug!("music step dropped: {:?}", e);
            }
        });
        let interval = match interval {
            Ok(interval) => interval,
            Err(e) => {
                score.borrow().voices.stop();
                return Err(e);
            }
        };
        info!("music started at {} bpm", tempo.bpm);
        self.music = Some(Music { score, interval });
        Ok(())
    }

    /// Stops the loop but keeps the context, so effects still play.
    pub fn stop_music(&mut self) {
        if let Some(music) = self.music.take() {
            music.stop();
        }
    }

    pub fn play_sfx(&self, sfx: Sfx) {
        let (Some(ctx), Some(bus)) = (&self.ctx, &self.bus) else {
            return;
        };
        let now = ctx.current_time();
        for chirp in sfx.chirps() {
            if let Err(e) = play_chirp(ctx, &bus.sfx, chirp, now + chirp.delay) {
                debug!("sfx dropped: {:?}", e);
            }
        }
    }

    pub fn handle_event(&self, event: &SimEvent) {
        match event {
            SimEvent::Shot => self.play_sfx(Sfx::Shoot),
            SimEvent::EnemyHit { .. } => self.play_sfx(Sfx::Hit),
        }
    }

    /// Full teardown: music, bus and context.
    pub fn shutdown(&mut self) {
        self.stop_music();
        if let Some(bus) = self.bus.take() {
            bus.disconnect();
        }
        if let Some(ctx) = self.ctx.take() {
            let _ = ctx.close();
            debug!("audio context closed");
        }
        self.resuming = false;
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn square(ctx: &AudioContext, freq: f64) -> JsResult<OscillatorNode> {
    let osc = ctx.create_oscillator()?;
    osc.set_type(OscillatorType::Square);
    osc.frequency().set_value(freq as f32);
    Ok(osc)
}

/// Retriggers a persistent voice: silence, linear attack, exponential tail.
fn shape(param: &AudioParam, env: &Envelope, t: f64) -> JsResult<()> {
    param.cancel_scheduled_values(t)?;
    param.set_value_at_time(0.0, t)?;
    param.linear_ramp_to_value_at_time(env.peak, t + env.attack)?;
    param.exponential_ramp_to_value_at_time(SILENCE, t + env.release)?;
    Ok(())
}

fn play_chirp(ctx: &AudioContext, out: &GainNode, chirp: &Chirp, t: f64) -> JsResult<()> {
    let gain = ctx.create_gain()?;
    gain.gain().set_value_at_time(chirp.volume, t)?;
    gain.gain()
        .exponential_ramp_to_value_at_time(SILENCE, t + chirp.duration)?;

    let osc = square(ctx, chirp.start_freq())?;
    osc.frequency().set_value_at_time(chirp.start_freq() as f32, t)?;
    osc.frequency()
        .linear_ramp_to_value_at_time(chirp.end_freq() as f32, t + chirp.duration)?;

    osc.connect_with_audio_node(&gain)?;
    gain.connect_with_audio_node(out)?;
    osc.start_with_when(t)?;
    osc.stop_with_when(t + chirp.duration)?;
    Ok(())
}

fn play_kick(ctx: &AudioContext, out: &GainNode, kick: &Kick, t: f64) -> JsResult<()> {
    let osc = ctx.create_oscillator()?;
    osc.set_type(OscillatorType::Sine);
    osc.frequency().set_value_at_time(kick.start_hz as f32, t)?;
    osc.frequency()
        .exponential_ramp_to_value_at_time(kick.end_hz as f32, t + kick.sweep)?;

    let gain = ctx.create_gain()?;
    gain.gain().set_value_at_time(kick.gain, t)?;
    gain.gain()
        .exponential_ramp_to_value_at_time(SILENCE, t + kick.decay)?;

    osc.connect_with_audio_node(&gain)?;
    gain.connect_with_audio_node(out)?;
    osc.start_with_when(t)?;
    osc.stop_with_when(t + kick.stop)?;
    Ok(())
}

fn play_noise(ctx: &AudioContext, out: &GainNode, hit: &NoiseHit, t: f64) -> JsResult<()> {
    let rate = ctx.sample_rate();
    let len = noise_len(rate, hit.duration);
    let buffer = ctx.create_buffer(1, len, rate)?;
    let samples: Vec<f32> = (0..len)
        .map(|_| (js_sys::Math::random() * 2.0 - 1.0) as f32)
        .collect();
    write_channel(&buffer, &samples)?;

    let src = ctx.create_buffer_source()?;
    src.set_buffer(Some(&buffer));
    let filter = ctx.create_biquad_filter()?;
    filter.set_type(BiquadFilterType::Highpass);
    filter.frequency().set_value(hit.highpass_hz);
    let gain = ctx.create_gain()?;
    gain.gain().set_value_at_time(hit.gain, t)?;
    gain.gain()
        .exponential_ramp_to_value_at_time(SILENCE, t + hit.duration)?;

    src.connect_with_audio_node(&filter)?;
    filter.connect_with_audio_node(&gain)?;
    gain.connect_with_audio_node(out)?;
    src.start_with_when(t)?;
    src.stop_with_when(t + hit.duration)?;
    Ok(())
}

/// `AudioBuffer.copyToChannel(samples, 0)` through reflection, which works
/// the same across web-sys versions.
fn write_channel(buffer: &AudioBuffer, samples: &[f32]) -> JsResult<()> {
    let copy: Function = Reflect::get(buffer, &JsValue::from_str("copyToChannel"))?.dyn_into()?;
    copy.call2(buffer, &JsValue::from(Float32Array::from(samples)), &JsValue::from(0))?;
    Ok(())
}
