//! Frame pacing and the browser timers that drive it.

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::error::{Error, Result};

/// Turns animation-frame timestamps into clamped simulation steps.
#[derive(Clone, Debug)]
pub struct FrameClock {
    last_ms: Option<f64>,
    max_dt: f64,
    fps: u32,
}

impl FrameClock {
    pub fn new(max_dt: f64) -> Self {
        Self {
            last_ms: None,
            max_dt,
            fps: 0,
        }
    }

    /// Seconds since the previous tick, clamped to `[0, max_dt]`. The first
    /// tick after a reset returns 0. Long pauses (a hidden tab, a debugger
    /// break) therefore advance the simulation by at most `max_dt`.
    pub fn tick(&mut self, timestamp_ms: f64) -> f64 {
        let dt = match self.last_ms {
            Some(last) => ((timestamp_ms - last) / 1000.0).clamp(0.0, self.max_dt),
            None => 0.0,
        };
        self.last_ms = Some(timestamp_ms);
        if dt > 0.0 {
            self.fps = (1.0 / dt).round() as u32;
        }
        dt
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn reset(&mut self) {
        self.last_ms = None;
        self.fps = 0;
    }
}

/// A reusable animation-frame callback plus the id of its pending request.
/// Dropping it cancels the pending frame.
pub struct AnimationFrame {
    closure: Closure<dyn FnMut(f64)>,
    handle: Option<i32>,
}

impl AnimationFrame {
    pub fn new(callback: impl FnMut(f64) + 'static) -> Self {
        Self {
            closure: Closure::wrap(Box::new(callback) as Box<dyn FnMut(f64)>),
            handle: None,
        }
    }

    /// Schedules the callback for the next repaint.
    pub fn request(&mut self) -> Result<()> {
        let window = web_sys::window().ok_or_else(|| Error::Dom("no window".into()))?;
        let id = window.request_animation_frame(self.closure.as_ref().unchecked_ref())?;
        self.handle = Some(id);
        Ok(())
    }

    pub fn is_pending(&self) -> bool {
        self.handle.is_some()
    }

    /// Marks the pending request as delivered. Called at the top of the
    /// callback so a later `cancel` does not target a stale id.
    pub fn fired(&mut self) {
        self.handle = None;
    }

    pub fn cancel(&mut self) {
        if let Some(id) = self.handle.take() {
            if let Some(window) = web_sys::window() {
                let _ = window.cancel_animation_frame(id);
            }
        }
    }
}

impl Drop for AnimationFrame {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// A `setInterval` registration that is cleared when dropped.
pub struct Interval {
    _closure: Closure<dyn FnMut()>,
    handle: i32,
}

impl Interval {
    pub fn new(period_ms: i32, callback: impl FnMut() + 'static) -> Result<Self> {
        let window = web_sys::window().ok_or_else(|| Error::Dom("no window".into()))?;
        let closure = Closure::wrap(Box::new(callback) as Box<dyn FnMut()>);
        let handle = window.set_interval_with_callback_and_timeout_and_arguments_0(
            closure.as_ref().unchecked_ref(),
            period_ms,
        )?;
        Ok(Self {
            _closure: closure,
            handle,
        })
    }
}

impl Drop for Interval {
    fn drop(&mut self) {
        if let Some(window) = web_sys::window() {
            window.clear_interval_with_handle(self.handle);
        }
    }
}
