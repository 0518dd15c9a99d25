use crate::contract::{self, ElementCache};
use calm_core::{AudioContract, AudioParams, CalmError, Release};
use web_sys as web;

// High-shelf corner; the shelf gain follows audio intensity
const HIGHSHELF_FREQ_HZ: f32 = 3_000.0;

/// Per-video dampening chain:
/// media source -> lowpass -> high shelf -> gain -> destination.
pub struct AudioPipeline {
    ctx: web::AudioContext,
    source: web::MediaElementAudioSourceNode,
    lowpass: web::BiquadFilterNode,
    highshelf: web::BiquadFilterNode,
    gain: web::GainNode,
    contract: AudioContract,
    last_intensity: Option<f32>,
}

fn create_gain(audio_ctx: &web::AudioContext, value: f32, label: &str) -> anyhow::Result<web::GainNode> {
    match web::GainNode::new(audio_ctx) {
        Ok(g) => {
            g.gain().set_value(value);
            Ok(g)
        }
        Err(e) => {
            log::error!("[audio] {} GainNode error: {:?}", label, e);
            Err(anyhow::anyhow!("{:?}", e))
        }
    }
}

fn create_biquad(
    audio_ctx: &web::AudioContext,
    kind: web::BiquadFilterType,
    frequency_hz: f32,
) -> anyhow::Result<web::BiquadFilterNode> {
    let node = web::BiquadFilterNode::new(audio_ctx).map_err(|e| {
        log::error!("[audio] BiquadFilterNode error: {:?}", e);
        anyhow::anyhow!("{:?}", e)
    })?;
    node.set_type(kind);
    node.frequency().set_value(frequency_hz);
    Ok(node)
}

// Ramp from the current value so successive reschedules never jump
fn ramp(param: &web::AudioParam, value: f32, now: f64, ramp_sec: f64) {
    _ = param.cancel_scheduled_values(now);
    _ = param.set_value_at_time(param.value(), now);
    _ = param.linear_ramp_to_value_at_time(value, now + ramp_sec);
}

impl AudioPipeline {
    pub fn attach(
        audio_ctx: &web::AudioContext,
        source: web::MediaElementAudioSourceNode,
        contract: AudioContract,
    ) -> anyhow::Result<Self> {
        // Drop the bypass left behind by an earlier release
        _ = source.disconnect();
        let neutral = AudioParams::from_intensity(0.0, &contract);
        let lowpass = create_biquad(audio_ctx, web::BiquadFilterType::Lowpass, neutral.lowpass_hz)?;
        let highshelf = create_biquad(audio_ctx, web::BiquadFilterType::Highshelf, HIGHSHELF_FREQ_HZ)?;
        highshelf.gain().set_value(neutral.highshelf_db);
        let gain = create_gain(audio_ctx, neutral.gain, "Dampening")?;

        _ = source.connect_with_audio_node(&lowpass);
        _ = lowpass.connect_with_audio_node(&highshelf);
        _ = highshelf.connect_with_audio_node(&gain);
        _ = gain.connect_with_audio_node(&audio_ctx.destination());

        Ok(Self {
            ctx: audio_ctx.clone(),
            source,
            lowpass,
            highshelf,
            gain,
            contract,
            last_intensity: None,
        })
    }

    pub fn apply(&mut self, intensity: f32) {
        if !contract::needs_audio_reschedule(self.last_intensity, intensity) {
            return;
        }
        self.last_intensity = Some(intensity);
        let p = AudioParams::from_intensity(intensity, &self.contract);
        let now = self.ctx.current_time();
        let ramp_sec = self.contract.ramp_sec;
        ramp(&self.lowpass.frequency(), p.lowpass_hz, now, ramp_sec);
        ramp(&self.highshelf.gain(), p.highshelf_db, now, ramp_sec);
        ramp(&self.gain.gain(), p.gain, now, ramp_sec);
    }
}

impl Release for AudioPipeline {
    /// Tears down the chain and routes the element straight to the output.
    /// A media element can only ever feed one source node, so the source is
    /// kept and bypassed rather than dropped.
    fn release(&mut self) -> Result<(), CalmError> {
        let mut failures = Vec::new();
        let nodes: [(&str, &web::AudioNode); 4] = [
            ("source", self.source.as_ref()),
            ("lowpass", self.lowpass.as_ref()),
            ("highshelf", self.highshelf.as_ref()),
            ("gain", self.gain.as_ref()),
        ];
        for (label, node) in nodes {
            if let Err(e) = node.disconnect() {
                failures.push(format!("{} disconnect: {:?}", label, e));
            }
        }
        if let Err(e) = self
            .source
            .connect_with_audio_node(&self.ctx.destination())
        {
            failures.push(format!("bypass: {:?}", e));
        }
        self.last_intensity = None;
        if failures.is_empty() {
            Ok(())
        } else {
            Err(CalmError::Teardown(failures.join("; ")))
        }
    }
}

/// Source nodes by media element. An element can feed exactly one source
/// node for its whole lifetime, so nodes outlive the pipelines built on them.
#[derive(Default)]
pub struct SourceNodes {
    nodes: ElementCache<web::HtmlMediaElement, web::MediaElementAudioSourceNode>,
}

impl SourceNodes {
    pub fn get_or_create(
        &mut self,
        audio_ctx: &web::AudioContext,
        media: &web::HtmlMediaElement,
    ) -> anyhow::Result<web::MediaElementAudioSourceNode> {
        self.nodes.get_or_try_insert(media, || {
            audio_ctx
                .create_media_element_source(media)
                .map_err(|e| anyhow::anyhow!("{:?}", e))
        })
    }

    /// Forgets nodes whose element has left the document. Released pipelines
    /// leave their source bypassed to the destination, so an element that is
    /// re-inserted later still plays.
    pub fn prune_disconnected(&mut self) -> usize {
        self.nodes.prune(|media| media.is_connected())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}

pub fn create_context() -> Option<web::AudioContext> {
    match web::AudioContext::new() {
        Ok(ctx) => {
            _ = ctx.resume();
            Some(ctx)
        }
        Err(e) => {
            log::warn!("[audio] AudioContext unavailable: {:?}", e);
            None
        }
    }
}
