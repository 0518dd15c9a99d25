use crate::constants::{HAVE_CURRENT_DATA, SOURCE_ATTR};
use calm_core::SourceId;
use wasm_bindgen::JsCast;
use web_sys as web;

#[inline]
pub fn window_document() -> Option<web::Document> {
    web::window().and_then(|w| w.document())
}

#[inline]
pub fn scroll_y() -> f64 {
    web::window()
        .and_then(|w| w.scroll_y().ok())
        .unwrap_or(0.0)
}

/// Largest of the root and body scroll heights.
pub fn document_height(document: &web::Document) -> f64 {
    let root = document
        .document_element()
        .map(|e| e.scroll_height())
        .unwrap_or(0);
    let body = document.body().map(|b| b.scroll_height()).unwrap_or(0);
    root.max(body) as f64
}

#[inline]
pub fn document_hidden(document: &web::Document) -> bool {
    document.hidden()
}

pub fn collect_videos(document: &web::Document) -> Vec<web::HtmlVideoElement> {
    let list = document.get_elements_by_tag_name("video");
    (0..list.length())
        .filter_map(|i| list.item(i))
        .filter_map(|el| el.dyn_into::<web::HtmlVideoElement>().ok())
        .collect()
}

#[inline]
pub fn is_playing(video: &web::HtmlVideoElement) -> bool {
    !video.paused() && !video.ended() && video.ready_state() >= HAVE_CURRENT_DATA
}

pub fn count_active_videos(document: &web::Document) -> usize {
    collect_videos(document).iter().filter(|v| is_playing(v)).count()
}

pub fn source_id_of(video: &web::HtmlVideoElement) -> Option<SourceId> {
    video
        .get_attribute(SOURCE_ATTR)
        .and_then(|s| s.parse::<u32>().ok())
        .map(SourceId)
}

pub fn tag_source(video: &web::HtmlVideoElement, id: SourceId) {
    _ = video.set_attribute(SOURCE_ATTR, &id.0.to_string());
}

pub fn untag_source(video: &web::HtmlVideoElement) {
    _ = video.remove_attribute(SOURCE_ATTR);
}
