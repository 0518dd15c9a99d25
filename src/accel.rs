use crate::constants::DISTANCE_WORKGROUP_SIZE;
use calm_core::{select_backend, BackendKind, CalmError, DistanceBackend, DistanceFuture, Histogram};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;
use wgpu::util::DeviceExt;

pub static CHI_SQUARED_WGSL: &str = include_str!("../shaders/chi_squared.wgsl");

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct DistanceParams {
    len: u32,
    _pad: [u32; 3],
}

/// Chi-squared distance on a WebGPU compute pipeline.
pub struct GpuDistance {
    name: String,
    kind: BackendKind,
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

impl GpuDistance {
    pub async fn request(
        power_preference: wgpu::PowerPreference,
        kind: BackendKind,
    ) -> anyhow::Result<Self> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("no {:?} adapter", power_preference))?;
        let info = adapter.get_info();
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("calm distance device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults(),
                    memory_hints: wgpu::MemoryHints::MemoryUsage,
                },
                None,
            )
            .await?;
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("chi_squared"),
            source: wgpu::ShaderSource::Wgsl(CHI_SQUARED_WGSL.into()),
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("chi_squared pipeline"),
            layout: None,
            module: &module,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });
        let layout = pipeline.get_bind_group_layout(0);
        Ok(Self {
            name: format!("wgpu:{}", info.name),
            kind,
            device,
            queue,
            pipeline,
            layout,
        })
    }

    async fn run(&self, a: &[f32], b: &[f32]) -> Result<f32, CalmError> {
        if a.len() != b.len() {
            return Err(CalmError::HistogramLengthMismatch {
                left: a.len(),
                right: b.len(),
            });
        }
        if a.is_empty() {
            return Err(CalmError::EmptyHistogram);
        }
        let n = a.len();
        let size = (n * std::mem::size_of::<f32>()) as u64;

        let buf_a = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("hist a"),
                contents: bytemuck::cast_slice(a),
                usage: wgpu::BufferUsages::STORAGE,
            });
        let buf_b = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("hist b"),
                contents: bytemuck::cast_slice(b),
                usage: wgpu::BufferUsages::STORAGE,
            });
        let params = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("distance params"),
                contents: bytemuck::bytes_of(&DistanceParams {
                    len: n as u32,
                    _pad: [0; 3],
                }),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let terms = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("chi terms"),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("chi readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("chi bind group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buf_a.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buf_b.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: terms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: params.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("chi encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("chi pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups((n as u32).div_ceil(DISTANCE_WORKGROUP_SIZE), 1, 1);
        }
        encoder.copy_buffer_to_buffer(&terms, 0, &readback, 0, size);
        self.queue.submit(Some(encoder.finish()));

        map_read(&self.device, &readback).await?;
        let sum: f32 = {
            let data = readback.slice(..).get_mapped_range();
            data.chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .sum()
        };
        readback.unmap();
        Ok(sum / n as f32)
    }
}

// Resolves once `buffer` is mapped for reading.
async fn map_read(device: &wgpu::Device, buffer: &wgpu::Buffer) -> Result<(), CalmError> {
    let outcome: Rc<RefCell<Option<Result<(), wgpu::BufferAsyncError>>>> =
        Rc::new(RefCell::new(None));
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        let outcome = outcome.clone();
        buffer
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |r| {
                *outcome.borrow_mut() = Some(r);
                _ = resolve.call0(&JsValue::NULL);
            });
    });
    _ = device.poll(wgpu::Maintain::Poll);
    JsFuture::from(promise)
        .await
        .map_err(|e| CalmError::Backend(format!("{:?}", e)))?;
    let result = outcome.borrow_mut().take();
    match result {
        Some(Ok(())) => Ok(()),
        Some(Err(e)) => Err(CalmError::Backend(e.to_string())),
        None => Err(CalmError::Backend("map callback never ran".to_string())),
    }
}

impl DistanceBackend for GpuDistance {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn compute<'a>(&'a self, a: &'a Histogram, b: &'a Histogram) -> DistanceFuture<'a> {
        Box::pin(self.run(a.bins(), b.bins()))
    }
}

/// High-performance adapter first, then low-power; `None` leaves the
/// reference implementation in charge.
pub async fn select() -> Option<Box<dyn DistanceBackend>> {
    let mut candidates: Vec<Box<dyn DistanceBackend>> = Vec::new();
    for (power, kind) in [
        (wgpu::PowerPreference::HighPerformance, BackendKind::Accelerator),
        (wgpu::PowerPreference::LowPower, BackendKind::Gpu),
    ] {
        match GpuDistance::request(power, kind).await {
            Ok(g) => {
                log::info!("[backend] {} available as {:?}", g.name(), kind);
                candidates.push(Box::new(g));
                break;
            }
            Err(e) => log::info!("[backend] {:?} unavailable: {}", kind, e),
        }
    }
    select_backend(candidates)
}
