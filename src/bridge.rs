use calm_core::{BackendKind, MonitorEvent, MonitorState, SubScores};
use js_sys::{Object, Reflect};
use wasm_bindgen::JsValue;

fn set(obj: &Object, key: &str, value: impl Into<JsValue>) {
    _ = Reflect::set(obj, &JsValue::from_str(key), &value.into());
}

fn sub_scores_object(s: &SubScores) -> Object {
    let obj = Object::new();
    set(&obj, "sceneCut", s.scene_cut);
    set(&obj, "scroll", s.scroll);
    set(&obj, "timeOnPage", s.time_on_page);
    set(&obj, "contentChange", s.content_change);
    set(&obj, "activeVideo", s.active_video);
    obj
}

pub fn backend_label(kind: BackendKind) -> &'static str {
    match kind {
        BackendKind::Accelerator => "accelerator",
        BackendKind::Gpu => "gpu",
        BackendKind::Reference => "reference",
    }
}

/// `getState()` payload.
pub fn state_object(state: &MonitorState, backend: BackendKind) -> Object {
    let obj = Object::new();
    set(&obj, "score", state.score);
    set(&obj, "platformLabel", state.platform_label.as_str());
    set(&obj, "activeTime", state.active_time_secs);
    set(&obj, "videoCount", state.video_count as u32);
    set(&obj, "sensitivity", state.sensitivity);
    set(&obj, "enabled", state.enabled);
    set(&obj, "running", state.running);
    set(&obj, "breathing", state.breathing);
    set(&obj, "backend", backend_label(backend));
    set(&obj, "subScores", sub_scores_object(&state.sub_scores));
    obj
}

pub fn event_object(event: &MonitorEvent) -> Object {
    let obj = Object::new();
    match event {
        MonitorEvent::ScoreUpdated(u) => {
            set(&obj, "type", "score");
            set(&obj, "timestamp", u.timestamp_ms as f64);
            set(&obj, "score", u.score);
            set(&obj, "rawScore", u.raw_score);
            set(&obj, "subScores", sub_scores_object(&u.sub_scores));
        }
        MonitorEvent::SourceAttached(id) => {
            set(&obj, "type", "videoAttached");
            set(&obj, "source", id.0);
        }
        MonitorEvent::SourceDetached(id) => {
            set(&obj, "type", "videoDetached");
            set(&obj, "source", id.0);
        }
        MonitorEvent::BreatheStarted { ends_at_ms } => {
            set(&obj, "type", "breatheStarted");
            set(&obj, "endsAt", *ends_at_ms as f64);
        }
        MonitorEvent::BreatheEnded => set(&obj, "type", "breatheEnded"),
    }
    obj
}
