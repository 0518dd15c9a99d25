#![cfg(target_arch = "wasm32")]
use calm_core::{CalmConfig, Settings};
use wasm_bindgen::prelude::*;

mod accel;
mod audio;
mod bridge;
mod capture;
mod constants;
mod contract;
mod dom;
mod events;
mod frame;
mod schedule;
mod session;

use session::Session;

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();
    log::info!("calm-web loaded");
    Ok(())
}

/// Page-level control surface handed to the popup/dashboard bridge.
#[wasm_bindgen]
pub struct CalmController {
    session: Session,
}

/// Probes for an accelerated distance backend, then builds a controller.
/// Monitoring does not begin until `start` is called.
#[wasm_bindgen(js_name = createController)]
pub async fn create_controller() -> Result<CalmController, JsValue> {
    let backend = accel::select().await;
    let session = Session::new(CalmConfig::default(), backend)
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(CalmController { session })
}

#[wasm_bindgen]
impl CalmController {
    /// Settings are read once here; later changes go through the setters.
    pub fn start(
        &self,
        enabled: bool,
        sensitivity: f32,
        platform_label: Option<String>,
    ) -> Result<(), JsValue> {
        let label = platform_label.unwrap_or_else(|| constants::DEFAULT_PLATFORM_LABEL.to_string());
        self.session
            .start(Settings { enabled, sensitivity }, &label)
            .map_err(|e| {
                log::error!("[monitor] start failed: {:?}", e);
                JsValue::from_str(&e.to_string())
            })
    }

    pub fn stop(&self) {
        self.session.stop();
    }

    #[wasm_bindgen(getter, js_name = isRunning)]
    pub fn is_running(&self) -> bool {
        self.session.is_running()
    }

    #[wasm_bindgen(js_name = setSensitivity)]
    pub fn set_sensitivity(&self, sensitivity: f32) {
        self.session.set_sensitivity(sensitivity);
    }

    #[wasm_bindgen(js_name = setEnabled)]
    pub fn set_enabled(&self, enabled: bool) {
        self.session.set_enabled(enabled);
    }

    /// Returns whether a breathe override began.
    #[wasm_bindgen(js_name = triggerBreathe)]
    pub fn trigger_breathe(&self) -> bool {
        self.session.trigger_breathe()
    }

    #[wasm_bindgen(js_name = getState)]
    pub fn get_state(&self) -> JsValue {
        self.session.state().into()
    }

    /// Registers `callback(event)`; events arrive in the order produced.
    #[wasm_bindgen(js_name = onEvent)]
    pub fn on_event(&self, callback: js_sys::Function) {
        self.session.on_event(callback);
    }
}
