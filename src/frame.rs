use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys as web;

struct LoopInner {
    tick: RefCell<Option<Closure<dyn FnMut(f64)>>>,
    pending: Cell<Option<i32>>,
}

impl LoopInner {
    fn request(&self) {
        let Some(w) = web::window() else {
            return;
        };
        let tick = self.tick.borrow();
        let Some(tick) = tick.as_ref() else {
            return;
        };
        match w.request_animation_frame(tick.as_ref().unchecked_ref()) {
            Ok(handle) => self.pending.set(Some(handle)),
            Err(e) => log::warn!("[effects] requestAnimationFrame failed: {:?}", e),
        }
    }
}

/// requestAnimationFrame loop that idles between bursts of work.
///
/// The frame callback returns whether it wants another frame; once it says
/// no, the loop sleeps until [`AnimationLoop::wake`] is called.
pub struct AnimationLoop {
    inner: Rc<LoopInner>,
}

impl AnimationLoop {
    pub fn new(mut frame: impl FnMut() -> bool + 'static) -> Self {
        let inner = Rc::new(LoopInner {
            tick: RefCell::new(None),
            pending: Cell::new(None),
        });
        let weak: Weak<LoopInner> = Rc::downgrade(&inner);
        *inner.tick.borrow_mut() = Some(Closure::wrap(Box::new(move |_ts: f64| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            inner.pending.set(None);
            // frame() may have woken us already
            if frame() && inner.pending.get().is_none() {
                inner.request();
            }
        }) as Box<dyn FnMut(f64)>));
        Self { inner }
    }

    pub fn wake(&self) {
        if self.inner.pending.get().is_none() {
            self.inner.request();
        }
    }

    pub fn cancel(&self) {
        if let Some(handle) = self.inner.pending.take() {
            if let Some(w) = web::window() {
                _ = w.cancel_animation_frame(handle);
            }
        }
    }
}

impl Drop for AnimationLoop {
    fn drop(&mut self) {
        self.cancel();
    }
}
