use crate::constants::{CAPTURE_CONTEXT, HAVE_CURRENT_DATA};
use crate::dom;
use calm_core::{CaptureError, VisualSource};
use wasm_bindgen::{JsCast, JsValue};
use web_sys as web;

/// Downscaled frame grabber for one video element, backed by a detached
/// 2D canvas.
pub struct VideoCapture {
    video: web::HtmlVideoElement,
    canvas: web::HtmlCanvasElement,
    ctx: web::CanvasRenderingContext2d,
}

impl VideoCapture {
    pub fn new(document: &web::Document, video: web::HtmlVideoElement) -> anyhow::Result<Self> {
        let canvas: web::HtmlCanvasElement = document
            .create_element("canvas")
            .map_err(|e| anyhow::anyhow!("{:?}", e))?
            .dyn_into::<web::HtmlCanvasElement>()
            .map_err(|e| anyhow::anyhow!("{:?}", e))?;
        let ctx = canvas
            .get_context(CAPTURE_CONTEXT)
            .map_err(|e| anyhow::anyhow!("{:?}", e))?
            .ok_or_else(|| anyhow::anyhow!("2d context unavailable"))?
            .dyn_into::<web::CanvasRenderingContext2d>()
            .map_err(|e| anyhow::anyhow!("{:?}", e))?;
        Ok(Self { video, canvas, ctx })
    }

    pub fn video(&self) -> &web::HtmlVideoElement {
        &self.video
    }
}

fn classify(e: JsValue) -> CaptureError {
    match e.dyn_ref::<web::DomException>().map(|d| d.name()) {
        Some(name) if name == "SecurityError" => CaptureError::CrossOrigin,
        Some(name) if name == "InvalidStateError" => CaptureError::NotReady,
        _ => CaptureError::Failed(format!("{:?}", e)),
    }
}

impl VisualSource for VideoCapture {
    fn is_paused(&self) -> bool {
        self.video.paused()
    }

    fn is_ended(&self) -> bool {
        self.video.ended()
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        if self.video.ready_state() < HAVE_CURRENT_DATA {
            return None;
        }
        // Hidden tabs do not paint video frames
        if dom::window_document()
            .map(|d| dom::document_hidden(&d))
            .unwrap_or(false)
        {
            return None;
        }
        let (w, h) = (self.video.video_width(), self.video.video_height());
        (w > 0 && h > 0).then_some((w, h))
    }

    fn capture_rgba(&mut self, width: u32, height: u32) -> Result<Vec<u8>, CaptureError> {
        if self.canvas.width() != width {
            self.canvas.set_width(width);
        }
        if self.canvas.height() != height {
            self.canvas.set_height(height);
        }
        self.ctx
            .draw_image_with_html_video_element_and_dw_and_dh(
                &self.video,
                0.0,
                0.0,
                width as f64,
                height as f64,
            )
            .map_err(classify)?;
        let image = self
            .ctx
            .get_image_data(0.0, 0.0, width as f64, height as f64)
            .map_err(classify)?;
        Ok(image.data().0)
    }
}
