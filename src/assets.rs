//! Lazy image loading into RGBA textures.
//!
//! Each image is decoded through a scratch canvas once its `load` event
//! fires. Pending loads are owned by the loader so unmounting can detach
//! their handlers before they run.

use std::cell::RefCell;
use std::rc::Rc;

use log::debug;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, HtmlImageElement};

use crate::error::{Error, Result};
use crate::textures::Texture;

type ReadyFn = Rc<RefCell<Box<dyn FnMut(Result<Texture>)>>>;

struct PendingImage {
    image: HtmlImageElement,
    _onload: Closure<dyn FnMut()>,
    _onerror: Closure<dyn FnMut()>,
}

impl Drop for PendingImage {
    fn drop(&mut self) {
        self.image.set_onload(None);
        self.image.set_onerror(None);
    }
}

#[derive(Default)]
pub struct AssetLoader {
    pending: Vec<PendingImage>,
}

impl AssetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts fetching `url`; `on_ready` receives the decoded texture, or
    /// the reason it could not be produced.
    pub fn load(&mut self, url: &str, on_ready: impl FnMut(Result<Texture>) + 'static) -> Result<()> {
        let image = HtmlImageElement::new()?;
        image.set_cross_origin(Some("anonymous"));
        let ready: ReadyFn = Rc::new(RefCell::new(Box::new(on_ready)));

        let onload = {
            let image = image.clone();
            let ready = Rc::clone(&ready);
            let url = url.to_string();
            Closure::wrap(Box::new(move || {
                let decoded = decode_image(&image);
                if decoded.is_ok() {
                    debug!("decoded {}", url);
                }
                (ready.borrow_mut().as_mut())(decoded);
            }) as Box<dyn FnMut()>)
        };
        let onerror = {
            let ready = Rc::clone(&ready);
            let url = url.to_string();
            Closure::wrap(Box::new(move || {
                (ready.borrow_mut().as_mut())(Err(Error::Texture(format!("could not load {}", url))));
            }) as Box<dyn FnMut()>)
        };

        image.set_onload(Some(onload.as_ref().unchecked_ref()));
        image.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        image.set_src(url);

        self.pending.push(PendingImage {
            image,
            _onload: onload,
            _onerror: onerror,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Detaches every handler; images still in flight are ignored.
    pub fn cancel_all(&mut self) {
        self.pending.clear();
    }
}

/// Reads an image's pixels back through an offscreen 2d canvas.
pub fn decode_image(image: &HtmlImageElement) -> Result<Texture> {
    let (width, height) = (image.natural_width(), image.natural_height());
    if width == 0 || height == 0 {
        return Err(Error::Texture(format!("{} has no pixels", image.src())));
    }
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| Error::Dom("no document".into()))?;
    let canvas = document
        .create_element("canvas")?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| Error::Dom("created element is not a canvas".into()))?;
    canvas.set_width(width);
    canvas.set_height(height);
    let context = canvas
        .get_context("2d")?
        .ok_or_else(|| Error::Dom("2d context unavailable".into()))?
        .dyn_into::<CanvasRenderingContext2d>()
        .map_err(|_| Error::Dom("2d context has the wrong type".into()))?;

    context.draw_image_with_html_image_element(image, 0.0, 0.0)?;
    // throws for cross-origin images served without CORS headers
    let data = context
        .get_image_data(0.0, 0.0, width as f64, height as f64)
        .map_err(|e| Error::Texture(format!("{} is not readable: {:?}", image.src(), e)))?;
    Texture::from_rgba(width, height, data.data().0)
}
