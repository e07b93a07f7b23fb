//! Device context bootstrap and the three timed phases of a device run:
//! copy-in, kernel and copy-out. Every phase blocks until the device is idle
//! so that host timestamps bound the real device work.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use pollster::block_on;
use tracing::{debug, error, info, info_span};
use wgpu::{
    AdapterInfo, Backends, BindGroup, BindGroupDescriptor, BindGroupEntry, Buffer,
    BufferDescriptor, BufferUsages, CommandEncoderDescriptor, ComputePassDescriptor,
    ComputePipeline, ComputePipelineDescriptor, DeviceDescriptor, DeviceType, ErrorFilter,
    Features, InstanceDescriptor, Maintain, MapMode, PipelineCompilationOptions,
    ShaderModuleDescriptor, ShaderSource,
};

use crate::config::validate_len;
use crate::kernels::{
    grid, group_count, Algorithm, Kernel, Params, BINDING_PARAMS, BINDING_PARTIALS,
    BINDING_SCANNED, BINDING_VALUES, KERNEL_SOURCE,
};
use crate::{Error, Result};

pub struct DeviceContext {
    adapter_info: AdapterInfo,
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipelines: HashMap<Kernel, ComputePipeline>,
    max_grid_dim: u32,
    /// First device error raised outside any error scope since the last phase.
    uncaptured: Arc<Mutex<Option<String>>>,
}

/// Device buffers of one benchmark run, created by [`DeviceContext::copy_in`].
pub struct DeviceJob {
    algorithm: Algorithm,
    n: usize,
    groups: usize,
    grid: (u32, u32),
    values: Buffer,
    partials: Buffer,
    /// Only present for scans.
    scanned: Option<Buffer>,
    params: Buffer,
}

impl DeviceJob {
    pub fn groups(&self) -> usize {
        self.groups
    }

    fn buffer(&self, binding: u32) -> Option<&Buffer> {
        match binding {
            BINDING_VALUES => Some(&self.values),
            BINDING_PARTIALS => Some(&self.partials),
            BINDING_SCANNED => self.scanned.as_ref(),
            BINDING_PARAMS => Some(&self.params),
            _ => None,
        }
    }

    /// Partials for a reduction (slot 0 is the total), the scanned vector for a scan.
    fn result_buffer(&self) -> &Buffer {
        self.scanned.as_ref().unwrap_or(&self.partials)
    }
}

fn is_gpu(device_type: DeviceType) -> bool {
    matches!(
        device_type,
        DeviceType::DiscreteGpu | DeviceType::IntegratedGpu | DeviceType::VirtualGpu
    )
}

fn record_uncaptured(slot: &Mutex<Option<String>>, err: &wgpu::Error) {
    let message = err.to_string();
    eprintln!("Uncaptured device error: {message}");
    error!(error = %message, "uncaptured device error");
    if let Ok(mut slot) = slot.lock() {
        slot.get_or_insert(message);
    }
}

fn take_uncaptured(slot: &Mutex<Option<String>>) -> Option<String> {
    slot.lock().ok().and_then(|mut slot| slot.take())
}

fn device_error(op: &'static str, err: impl std::fmt::Display) -> Error {
    Error::Device {
        op,
        message: err.to_string(),
    }
}

impl DeviceContext {
    /// Select the first GPU-class adapter, create its device and compile
    /// every kernel entry point. There is no CPU fallback.
    pub fn new(backends: Backends) -> Result<Self> {
        let _span = info_span!("device_init", ?backends).entered();

        let instance = wgpu::Instance::new(InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let adapters = instance.enumerate_adapters(backends);
        let platform = match adapters.first() {
            Some(adapter) => format!("{:?}", adapter.get_info().backend),
            None => return Err(Error::NoPlatform),
        };
        let adapter = adapters
            .into_iter()
            .find(|adapter| is_gpu(adapter.get_info().device_type))
            .ok_or(Error::NoGpuDevice { platform })?;

        let adapter_info = adapter.get_info();
        info!(
            backend = ?adapter_info.backend,
            device = %adapter_info.name,
            device_type = ?adapter_info.device_type,
            "GPU adapter acquired"
        );

        let (device, queue) = block_on(adapter.request_device(
            &DeviceDescriptor {
                label: Some("reduce-scan"),
                required_features: Features::empty(),
                required_limits: adapter.limits(),
            },
            None,
        ))
        .map_err(|e| device_error("request_device", e))?;
        info!("GPU device created");

        // Errors outside an error scope would otherwise panic inside wgpu;
        // they fail the next scoped phase instead.
        let uncaptured = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&uncaptured);
        device.on_uncaptured_error(Box::new(move |err: wgpu::Error| {
            record_uncaptured(&slot, &err);
        }));

        device.push_error_scope(ErrorFilter::Validation);
        let module = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("reduce-scan kernels"),
            source: ShaderSource::Wgsl(KERNEL_SOURCE.into()),
        });
        let pipelines: HashMap<Kernel, ComputePipeline> = Kernel::ALL
            .iter()
            .map(|&kernel| {
                let pipeline = device.create_compute_pipeline(&ComputePipelineDescriptor {
                    label: Some(kernel.entry_point()),
                    layout: None,
                    module: &module,
                    entry_point: kernel.entry_point(),
                    compilation_options: PipelineCompilationOptions::default(),
                });
                (kernel, pipeline)
            })
            .collect();
        if let Some(err) = block_on(device.pop_error_scope()) {
            let log = err.to_string();
            eprintln!("{log}");
            let summary = log.lines().next().unwrap_or("unknown error").to_string();
            error!(error = %summary, "kernel compilation failed");
            return Err(Error::Compile(summary));
        }
        info!(
            source_len = KERNEL_SOURCE.len(),
            pipelines = pipelines.len(),
            "kernels compiled"
        );

        let max_grid_dim = device.limits().max_compute_workgroups_per_dimension;

        Ok(Self {
            adapter_info,
            device,
            queue,
            pipelines,
            max_grid_dim,
            uncaptured,
        })
    }

    /// Backend the selected adapter runs on (Vulkan, Metal, DX12, GL).
    pub fn platform_name(&self) -> String {
        format!("{:?}", self.adapter_info.backend)
    }

    pub fn device_name(&self) -> &str {
        &self.adapter_info.name
    }

    /// Run `f` inside validation and out-of-memory error scopes. A device
    /// error raised during `f`, or left uncaptured since the previous
    /// phase, takes precedence over `f`'s own result.
    fn scoped<T>(&self, op: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        self.device.push_error_scope(ErrorFilter::OutOfMemory);
        self.device.push_error_scope(ErrorFilter::Validation);
        let result = f();
        let validation = block_on(self.device.pop_error_scope());
        let out_of_memory = block_on(self.device.pop_error_scope());
        if let Some(err) = validation.or(out_of_memory) {
            return Err(device_error(op, err));
        }
        match take_uncaptured(&self.uncaptured) {
            Some(message) => Err(Error::Device { op, message }),
            None => result,
        }
    }

    /// Block until every submitted command has finished.
    fn flush(&self) {
        self.queue.submit(std::iter::empty());
        self.device.poll(Maintain::Wait);
    }

    fn storage_buffer(&self, label: &str, len: usize, usage: BufferUsages) -> Buffer {
        self.device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size: (len * std::mem::size_of::<f32>()) as u64,
            usage: BufferUsages::STORAGE | usage,
            mapped_at_creation: false,
        })
    }

    /// Upload `data` and allocate the buffers `algorithm` writes.
    pub fn copy_in(&self, data: &[f32], algorithm: Algorithm) -> Result<DeviceJob> {
        validate_len(data.len())?;
        let n = data.len();
        let groups = group_count(n);
        let grid = grid(groups, self.max_grid_dim).ok_or_else(|| {
            Error::InvalidConfig(format!(
                "{n} elements need more work-groups than the device can dispatch"
            ))
        })?;
        let params = Params {
            n: n as u32,
            groups: groups as u32,
            groups_x: grid.0,
            _pad: 0,
        };

        let job = self.scoped("copy-in", || {
            let values = self.storage_buffer("values", n, BufferUsages::COPY_DST);
            self.queue
                .write_buffer(&values, 0, bytemuck::cast_slice(data));

            let partials = self.storage_buffer("partials", groups, BufferUsages::COPY_SRC);
            let scanned = algorithm
                .needs_scanned_buffer()
                .then(|| self.storage_buffer("scanned", n, BufferUsages::COPY_SRC));

            let params_buffer = self.device.create_buffer(&BufferDescriptor {
                label: Some("params"),
                size: std::mem::size_of::<Params>() as u64,
                usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            self.queue
                .write_buffer(&params_buffer, 0, bytemuck::bytes_of(&params));

            self.flush();
            Ok(DeviceJob {
                algorithm,
                n,
                groups,
                grid,
                values,
                partials,
                scanned,
                params: params_buffer,
            })
        })?;

        debug!(
            algorithm = algorithm.name(),
            n,
            groups,
            grid_x = grid.0,
            grid_y = grid.1,
            "device_copy_in"
        );
        Ok(job)
    }

    fn bind_group(&self, kernel: Kernel, job: &DeviceJob) -> Result<BindGroup> {
        let entries = kernel
            .bindings()
            .iter()
            .map(|&binding| {
                let buffer = job.buffer(binding).ok_or_else(|| {
                    device_error(
                        "bind",
                        format!(
                            "{} needs binding {binding}, which a {} job does not carry",
                            kernel.entry_point(),
                            job.algorithm.name()
                        ),
                    )
                })?;
                Ok(BindGroupEntry {
                    binding,
                    resource: buffer.as_entire_binding(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(self.device.create_bind_group(&BindGroupDescriptor {
            label: Some(kernel.entry_point()),
            layout: &self.pipelines[&kernel].get_bind_group_layout(0),
            entries: &entries,
        }))
    }

    /// Dispatch every pass of the job's algorithm, one compute pass each, in
    /// a single submission.
    pub fn run(&self, job: &DeviceJob) -> Result<()> {
        self.scoped("kernel", || {
            let passes = job
                .algorithm
                .passes()
                .iter()
                .map(|&kernel| Ok((kernel, self.bind_group(kernel, job)?)))
                .collect::<Result<Vec<_>>>()?;

            let mut encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
                label: Some(job.algorithm.name()),
            });
            for (kernel, bind_group) in &passes {
                let (x, y) = if kernel.is_serial() { (1, 1) } else { job.grid };
                debug!(kernel = kernel.entry_point(), x, y, "device_dispatch");

                let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor {
                    label: Some(kernel.entry_point()),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&self.pipelines[kernel]);
                pass.set_bind_group(0, bind_group, &[]);
                pass.dispatch_workgroups(x, y, 1);
            }
            self.queue.submit(Some(encoder.finish()));
            self.device.poll(Maintain::Wait);
            Ok(())
        })
    }

    /// Read the job's result buffer back to the host.
    pub fn copy_out(&self, job: &DeviceJob) -> Result<Vec<f32>> {
        let source = job.result_buffer();
        let result = self.scoped("copy-out", || {
            let size = source.size();
            let staging = self.device.create_buffer(&BufferDescriptor {
                label: Some("staging"),
                size,
                usage: BufferUsages::COPY_DST | BufferUsages::MAP_READ,
                mapped_at_creation: false,
            });

            let mut encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
                label: Some("copy-out"),
            });
            encoder.copy_buffer_to_buffer(source, 0, &staging, 0, size);
            self.queue.submit(Some(encoder.finish()));

            let slice = staging.slice(..);
            let (tx, rx) = crossbeam_channel::bounded(1);
            slice.map_async(MapMode::Read, move |mapped| {
                let _ = tx.send(mapped);
            });
            self.device.poll(Maintain::Wait);
            rx.recv()
                .map_err(|e| device_error("copy-out", e))?
                .map_err(|e| device_error("copy-out", e))?;

            let mapped = slice.get_mapped_range();
            let values: Vec<f32> = bytemuck::cast_slice(&mapped).to_vec();
            drop(mapped);
            staging.unmap();
            Ok(values)
        })?;

        debug!(len = result.len(), "device_copy_out");
        Ok(result)
    }

    /// Sum of `data` computed on the device (slot 0 of the partials).
    pub fn reduce(&self, data: &[f32]) -> Result<f32> {
        let job = self.copy_in(data, Algorithm::Reduce)?;
        self.run(&job)?;
        let partials = self.copy_out(&job)?;
        partials
            .first()
            .copied()
            .ok_or_else(|| device_error("copy-out", "partial buffer came back empty"))
    }

    /// Inclusive prefix sum of `data` computed on the device.
    pub fn scan_inclusive(&self, data: &[f32]) -> Result<Vec<f32>> {
        let job = self.copy_in(data, Algorithm::ScanInclusive)?;
        self.run(&job)?;
        self.copy_out(&job)
    }
}
