//! The `DoomMini` handle exported to JavaScript and the state of one mount.
//!
//! A mounted session lives in an `Rc<RefCell<Session>>`. Browser callbacks
//! hold only a `Weak` to it and borrow it for the duration of one callback,
//! never while calling back into page script. Unmounting drops every
//! callback, timer and audio node the session created.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use js_sys::Function;
use log::{debug, info, warn, LevelFilter};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Event, EventTarget, KeyboardEvent};

use crate::assets::AssetLoader;
use crate::audio::AudioEngine;
use crate::config::EngineConfig;
use crate::driver::{AnimationFrame, FrameClock};
use crate::error::{Error, Result};
use crate::graphics::Graphics;
use crate::input::{Key, KeysHeld};
use crate::logging;
use crate::render::Renderer;
use crate::sim::Simulation;
use crate::textures::{SpriteSkin, Texture, TextureHandle, TextureStore};

/// Everything `mount` was called with, kept so `set_visible(true)` can
/// remount.
#[derive(Clone)]
struct MountArgs {
    canvas_id: String,
    wall_urls: Vec<String>,
    sprite_url: Option<String>,
    on_close: Function,
}

/// An event listener that unregisters itself when dropped.
struct Listener {
    target: EventTarget,
    kind: &'static str,
    closure: Closure<dyn FnMut(Event)>,
}

impl Listener {
    fn new(target: &EventTarget, kind: &'static str, handler: impl FnMut(Event) + 'static) -> Result<Self> {
        let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(Event)>);
        target.add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref())?;
        Ok(Self {
            target: target.clone(),
            kind,
            closure,
        })
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        let _ = self
            .target
            .remove_event_listener_with_callback(self.kind, self.closure.as_ref().unchecked_ref());
    }
}

struct Session {
    sim: Simulation,
    renderer: Renderer,
    gfx: Graphics,
    textures: TextureStore,
    walls: Vec<TextureHandle>,
    keys: KeysHeld,
    clock: FrameClock,
    audio: Rc<RefCell<AudioEngine>>,
    assets: AssetLoader,
    listeners: Vec<Listener>,
    frame: Option<AnimationFrame>,
    on_close: Function,
}

impl Session {
    fn start(config: &EngineConfig, args: &MountArgs) -> Result<Rc<RefCell<Session>>> {
        let gfx = Graphics::new(&args.canvas_id, config.render.width, config.render.height)?;
        let mut textures = TextureStore::new();
        let walls: Vec<TextureHandle> = args.wall_urls.iter().map(|_| textures.reserve()).collect();
        let mut sim = Simulation::new(config);
        let skin = args.sprite_url.as_ref().map(|_| textures.reserve_skin());
        if let Some(skin) = skin {
            sim.set_enemy_skin(skin);
        }

        let session = Rc::new(RefCell::new(Session {
            sim,
            renderer: Renderer::new(&config.render),
            gfx,
            textures,
            walls: walls.clone(),
            keys: KeysHeld::new(),
            clock: FrameClock::new(config.frame.max_dt),
            audio: Rc::new(RefCell::new(AudioEngine::new(&config.audio))),
            assets: AssetLoader::new(),
            listeners: Vec::new(),
            frame: None,
            on_close: args.on_close.clone(),
        }));
        let weak = Rc::downgrade(&session);

        let mut this = session.borrow_mut();
        for (url, handle) in args.wall_urls.iter().zip(walls) {
            let weak = weak.clone();
            this.assets
                .load(url, move |texture| wall_loaded(&weak, handle, texture))?;
        }
        if let (Some(url), Some(skin)) = (&args.sprite_url, skin) {
            let weak = weak.clone();
            this.assets
                .load(url, move |texture| sprite_loaded(&weak, skin, texture))?;
        }

        this.listeners = install_listeners(&weak)?;

        let frame_weak = weak.clone();
        let mut frame = AnimationFrame::new(move |timestamp| {
            if let Some(shared) = frame_weak.upgrade() {
                shared.borrow_mut().frame(timestamp);
            }
        });
        frame.request()?;
        this.frame = Some(frame);
        drop(this);

        info!(
            "mounted on #{} with {} wall textures",
            args.canvas_id,
            args.wall_urls.len()
        );
        Ok(session)
    }

    /// One animation frame: step, render, present, reschedule.
    fn frame(&mut self, timestamp: f64) {
        if let Some(frame) = self.frame.as_mut() {
            frame.fired();
        }
        let dt = self.clock.tick(timestamp);
        let events = self.sim.step(dt, &self.keys);
        if !events.is_empty() {
            let audio = self.audio.borrow();
            for event in &events {
                audio.handle_event(event);
            }
        }

        self.renderer
            .draw(&mut self.gfx.buffer, &self.sim, &self.textures, &self.walls);
        if let Err(e) = self.gfx.present() {
            warn!("frame not presented: {}", e);
        }

        if let Some(frame) = self.frame.as_mut() {
            if let Err(e) = frame.request() {
                warn!("animation loop stopped: {}", e);
            }
        }
    }

    fn key_down(&mut self, key: Key) {
        self.keys.press(key);
        if key == Key::Fire {
            if let Some(event) = self.sim.try_fire() {
                self.audio.borrow().handle_event(&event);
            }
        }
    }

    fn teardown(&mut self) {
        if let Some(mut frame) = self.frame.take() {
            frame.cancel();
        }
        self.listeners.clear();
        self.assets.cancel_all();
        self.audio.borrow_mut().shutdown();
        self.keys.clear();
        self.clock.reset();
        self.gfx.clear_canvas();
    }
}

fn wall_loaded(weak: &Weak<RefCell<Session>>, handle: TextureHandle, texture: Result<Texture>) {
    let Some(shared) = weak.upgrade() else {
        return;
    };
    let mut session = shared.borrow_mut();
    match texture {
        Ok(texture) => {
            session.textures.fulfill(handle, texture);
            if session.textures.all_loaded(&session.walls) {
                debug!("all {} wall textures ready", session.walls.len());
            }
        }
        Err(e) => warn!("wall texture unavailable, keeping flat walls: {}", e),
    }
}

fn sprite_loaded(weak: &Weak<RefCell<Session>>, skin: SpriteSkin, texture: Result<Texture>) {
    let Some(shared) = weak.upgrade() else {
        return;
    };
    match texture {
        Ok(texture) => {
            shared.borrow_mut().textures.fulfill_skin(skin, texture);
            debug!("enemy sprite ready");
        }
        Err(e) => warn!("enemy sprite unavailable: {}", e),
    }
}

fn install_listeners(weak: &Weak<RefCell<Session>>) -> Result<Vec<Listener>> {
    let window: EventTarget = web_sys::window()
        .ok_or_else(|| Error::Dom("no window".into()))?
        .into();

    let down = weak.clone();
    let keydown = Listener::new(&window, "keydown", move |event: Event| {
        if let Some(event) = event.dyn_ref::<KeyboardEvent>() {
            on_key_down(&down, event);
        }
    })?;

    let up = weak.clone();
    let keyup = Listener::new(&window, "keyup", move |event: Event| {
        let Some(event) = event.dyn_ref::<KeyboardEvent>() else {
            return;
        };
        let Some(key) = Key::from_dom(&event.key(), &event.code()) else {
            return;
        };
        if let Some(shared) = up.upgrade() {
            shared.borrow_mut().keys.release(key);
        }
    })?;

    let gesture = weak.clone();
    let pointer = Listener::new(&window, "pointerdown", move |_event: Event| {
        if let Some(shared) = gesture.upgrade() {
            let audio = Rc::clone(&shared.borrow().audio);
            AudioEngine::unlock(&audio);
        }
    })?;

    Ok(vec![keydown, keyup, pointer])
}

fn on_key_down(weak: &Weak<RefCell<Session>>, event: &KeyboardEvent) {
    let Some(shared) = weak.upgrade() else {
        return;
    };
    let audio = Rc::clone(&shared.borrow().audio);
    AudioEngine::unlock(&audio);

    let Some(key) = Key::from_dom(&event.key(), &event.code()) else {
        return;
    };
    if key.suppresses_default() {
        event.prevent_default();
    }
    if key == Key::Close {
        // the page usually unmounts us from inside this call
        let on_close = shared.borrow().on_close.clone();
        drop(shared);
        if let Err(e) = on_close.call0(&JsValue::NULL) {
            warn!("close callback threw: {:?}", e);
        }
        return;
    }
    shared.borrow_mut().key_down(key);
}

/// Handle the page holds for the easter egg. All methods take `&self` so
/// the close callback may re-enter (typically to call `unmount`).
#[wasm_bindgen]
pub struct DoomMini {
    config: EngineConfig,
    last_mount: RefCell<Option<MountArgs>>,
    session: RefCell<Option<Rc<RefCell<Session>>>>,
}

#[wasm_bindgen]
impl DoomMini {
    /// `config_json` is an optional partial override of the engine tunables.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> std::result::Result<DoomMini, JsValue> {
        logging::init(if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        });
        let config = match config_json {
            Some(json) => EngineConfig::from_json(&json)?,
            None => EngineConfig::default(),
        };
        Ok(DoomMini {
            config,
            last_mount: RefCell::new(None),
            session: RefCell::new(None),
        })
    }

    /// Starts the game on the canvas with id `canvas_id`. A running session
    /// is torn down first.
    pub fn mount(
        &self,
        canvas_id: &str,
        wall_urls: js_sys::Array,
        sprite_url: Option<String>,
        on_close: Function,
    ) -> std::result::Result<(), JsValue> {
        let args = MountArgs {
            canvas_id: canvas_id.to_string(),
            wall_urls: wall_urls.iter().filter_map(|url| url.as_string()).collect(),
            sprite_url,
            on_close,
        };
        self.mount_with(&args)?;
        *self.last_mount.borrow_mut() = Some(args);
        Ok(())
    }

    /// Mirrors the page's visibility flag: `true` remounts with the last
    /// `mount` arguments, `false` unmounts.
    pub fn set_visible(&self, visible: bool) -> std::result::Result<(), JsValue> {
        if !visible {
            self.unmount();
            return Ok(());
        }
        if self.is_mounted() {
            return Ok(());
        }
        let args = self
            .last_mount
            .borrow()
            .clone()
            .ok_or_else(|| Error::Dom("set_visible(true) called before mount()".into()))?;
        self.mount_with(&args)?;
        Ok(())
    }

    /// Stops everything the session started. Idempotent.
    pub fn unmount(&self) {
        let session = self.session.borrow_mut().take();
        if let Some(session) = session {
            session.borrow_mut().teardown();
            info!("unmounted");
        }
    }

    /// Same as pressing Escape: asks the page to close the game.
    pub fn close(&self) {
        let on_close = self
            .last_mount
            .borrow()
            .as_ref()
            .map(|args| args.on_close.clone());
        if let Some(on_close) = on_close {
            if let Err(e) = on_close.call0(&JsValue::NULL) {
                warn!("close callback threw: {:?}", e);
            }
        }
    }

    pub fn fps(&self) -> u32 {
        self.session
            .borrow()
            .as_ref()
            .map(|s| s.borrow().clock.fps())
            .unwrap_or(0)
    }

    pub fn is_mounted(&self) -> bool {
        self.session.borrow().is_some()
    }
}

impl DoomMini {
    fn mount_with(&self, args: &MountArgs) -> Result<()> {
        self.unmount();
        let session = Session::start(&self.config, args)?;
        *self.session.borrow_mut() = Some(session);
        Ok(())
    }
}

impl Drop for DoomMini {
    fn drop(&mut self) {
        self.unmount();
    }
}
