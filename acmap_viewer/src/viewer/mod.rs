mod input;
mod offscreen;
mod render;

pub use offscreen::{export_rgba_to_png, render_offscreen};

use std::sync::Arc;

use anyhow::{Context, Result};
use bytemuck::cast_slice;
use wgpu::util::DeviceExt;
use winit::{dpi::PhysicalSize, window::Window};

use acmap_core::AntigenicMap;

use crate::batch::{PointBatch, PointInstance};
use crate::projection::{MapProjector, ViewportMetrics};
use crate::shaders::{Globals, LineVertex, MARKER_VERTICES, MarkerVertex};

/// Margin of map units kept around the outermost point when framing.
const FRAME_PADDING: f64 = 1.0;
const INITIAL_LINE_CAPACITY: usize = 64;

/// An in-progress marquee gesture, anchored where the button went down.
/// Dropped without touching the map when the gesture is cancelled.
pub(crate) struct Marquee {
    pub anchor: [f32; 2],
    pub dragged: bool,
}

pub struct ViewerState {
    window: Arc<Window>,
    size: PhysicalSize<u32>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,

    point_pipeline: wgpu::RenderPipeline,
    line_pipeline: wgpu::RenderPipeline,
    marker_vertex_buffer: wgpu::Buffer,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
    instance_count: u32,
    line_vertex_buffer: wgpu::Buffer,
    line_capacity: usize,
    line_count: u32,
    globals_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,

    map: AntigenicMap,
    batch: PointBatch,
    /// point index -> batch slot and its inverse; permuted together with
    /// `PointBatch::set_index` so slot `i` always belongs to one point.
    slot_of_point: Vec<usize>,
    point_of_slot: Vec<usize>,

    projector: MapProjector,
    metrics: ViewportMetrics,

    cursor_ndc: Option<[f32; 2]>,
    hovered: Option<usize>,
    marquee: Option<Marquee>,
    shift_held: bool,
    instances_stale: bool,
}

impl ViewerState {
    pub async fn new(
        window: Arc<Window>,
        map: AntigenicMap,
        global_scale: f32,
        max_point_size: f32,
    ) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window.clone())
            .context("creating wgpu surface")?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: Some(&surface),
            })
            .await
            .context("requesting wgpu adapter")?;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("acmap-viewer-device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .context("requesting wgpu device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|format| format.is_srgb())
            .unwrap_or(surface_caps.formats[0]);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Opaque),
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let resources = GpuResources::create(&device, surface_format, map.len());

        let mut metrics = ViewportMetrics::new(size, window.scale_factor() as f32);
        metrics.global_scale = global_scale;
        metrics.max_point_size = max_point_size;
        let projector = frame_map(&map, size);

        let mut state = Self {
            window,
            size,
            surface,
            device,
            queue,
            config,
            point_pipeline: resources.point_pipeline,
            line_pipeline: resources.line_pipeline,
            marker_vertex_buffer: resources.marker_vertex_buffer,
            instance_buffer: resources.instance_buffer,
            instance_capacity: resources.instance_capacity,
            instance_count: 0,
            line_vertex_buffer: resources.line_vertex_buffer,
            line_capacity: INITIAL_LINE_CAPACITY,
            line_count: 0,
            globals_buffer: resources.globals_buffer,
            globals_bind_group: resources.globals_bind_group,
            batch: PointBatch::allocate(map.len()),
            slot_of_point: Vec::new(),
            point_of_slot: Vec::new(),
            map,
            projector,
            metrics,
            cursor_ndc: None,
            hovered: None,
            marquee: None,
            shift_held: false,
            instances_stale: true,
        };
        state.apply_draw_order();
        state.sync_all_points();
        Ok(state)
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.metrics.size = new_size;
        self.projector = frame_map(&self.map, new_size);
        self.instances_stale = true;
    }

    /// Assigns batch slots from the map's draw-order permutation: slot `z`
    /// draws the point `draw_order[z]`.
    fn apply_draw_order(&mut self) {
        self.point_of_slot = self.map.draw_order().to_vec();
        self.slot_of_point = vec![0; self.point_of_slot.len()];
        for (slot, &point) in self.point_of_slot.iter().enumerate() {
            self.slot_of_point[point] = slot;
        }
    }

    /// Writes one point's current display state into its batch slot. This is
    /// the single path by which map state reaches the GPU columns.
    pub(crate) fn sync_point(&mut self, point_index: usize) {
        let slot = self.slot_of_point[point_index];
        write_point_slot(&mut self.batch, &self.map, slot, point_index);
    }

    /// Refreshes every slot. Run after any mutation that can flip the
    /// global selection mode, since dimming touches points far from the
    /// one that changed.
    pub(crate) fn sync_all_points(&mut self) {
        for point in 0..self.map.len() {
            self.sync_point(point);
        }
    }

    pub(crate) fn upload_globals(&mut self) {
        let globals = Globals {
            viewport: [
                self.size.width.max(1) as f32,
                self.size.height.max(1) as f32,
            ],
            pixel_ratio: self.metrics.pixel_ratio,
            global_scale: self.metrics.global_scale,
            max_point_size: self.metrics.max_point_size,
            scene_rotation: self.projector.scene_rotation(),
            _padding: [0.0; 2],
        };
        self.queue
            .write_buffer(&self.globals_buffer, 0, cast_slice(&[globals]));
    }

    /// Uploads the interleaved instances, growing the buffer when the batch
    /// outgrows it. Called at most once per frame.
    pub(crate) fn upload_instances(&mut self) {
        if !self.batch.is_dirty() && !self.instances_stale {
            return;
        }
        let instances = self.batch.assemble_instances(&self.projector, &self.metrics);
        if instances.len() > self.instance_capacity {
            self.instance_capacity = instances.len().next_power_of_two();
            self.instance_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("acmap-point-instance-buffer"),
                size: (self.instance_capacity * std::mem::size_of::<PointInstance>()) as u64,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
        }
        if !instances.is_empty() {
            self.queue
                .write_buffer(&self.instance_buffer, 0, cast_slice(&instances));
        }
        self.instance_count = instances.len() as u32;
        self.batch.clear_dirty();
        self.instances_stale = false;
    }

    pub(crate) fn upload_lines(&mut self, vertices: &[LineVertex]) {
        if vertices.len() > self.line_capacity {
            self.line_capacity = vertices.len().next_power_of_two();
            self.line_vertex_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("acmap-line-vertex-buffer"),
                size: (self.line_capacity * std::mem::size_of::<LineVertex>()) as u64,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
        }
        if !vertices.is_empty() {
            self.queue
                .write_buffer(&self.line_vertex_buffer, 0, cast_slice(vertices));
        }
        self.line_count = vertices.len() as u32;
    }
}

/// GPU objects shared by the windowed and offscreen paths.
pub(crate) struct GpuResources {
    pub point_pipeline: wgpu::RenderPipeline,
    pub line_pipeline: wgpu::RenderPipeline,
    pub marker_vertex_buffer: wgpu::Buffer,
    pub instance_buffer: wgpu::Buffer,
    pub instance_capacity: usize,
    pub line_vertex_buffer: wgpu::Buffer,
    pub globals_buffer: wgpu::Buffer,
    pub globals_bind_group: wgpu::BindGroup,
}

impl GpuResources {
    pub fn create(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        point_count: usize,
    ) -> Self {
        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("acmap-globals-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let globals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("acmap-globals-buffer"),
            size: std::mem::size_of::<Globals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("acmap-globals-bind-group"),
            layout: &globals_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("acmap-pipeline-layout"),
            bind_group_layouts: &[&globals_layout],
            push_constant_ranges: &[],
        });

        let point_pipeline =
            create_point_pipeline(device, &pipeline_layout, surface_format);
        let line_pipeline = create_line_pipeline(device, &pipeline_layout, surface_format);

        let marker_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("acmap-marker-vertex-buffer"),
            contents: cast_slice(&MARKER_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let instance_capacity = point_count.next_power_of_two().max(4);
        let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("acmap-point-instance-buffer"),
            size: (instance_capacity * std::mem::size_of::<PointInstance>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let line_vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("acmap-line-vertex-buffer"),
            size: (INITIAL_LINE_CAPACITY * std::mem::size_of::<LineVertex>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            point_pipeline,
            line_pipeline,
            marker_vertex_buffer,
            instance_buffer,
            instance_capacity,
            line_vertex_buffer,
            globals_buffer,
            globals_bind_group,
        }
    }
}

fn create_point_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    surface_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("acmap-point-shader"),
        source: wgpu::ShaderSource::Wgsl(std::borrow::Cow::Borrowed(
            crate::shaders::POINT_SHADER_SOURCE,
        )),
    });

    let vertex_layout = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<MarkerVertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &wgpu::vertex_attr_array![0 => Float32x2],
    };

    let instance_layout = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<PointInstance>() as u64,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &[
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x2,
            },
            wgpu::VertexAttribute {
                offset: 8,
                shader_location: 2,
                format: wgpu::VertexFormat::Float32,
            },
            wgpu::VertexAttribute {
                offset: 12,
                shader_location: 3,
                format: wgpu::VertexFormat::Float32,
            },
            wgpu::VertexAttribute {
                offset: 16,
                shader_location: 4,
                format: wgpu::VertexFormat::Float32x4,
            },
            wgpu::VertexAttribute {
                offset: 32,
                shader_location: 5,
                format: wgpu::VertexFormat::Float32x4,
            },
            wgpu::VertexAttribute {
                offset: 48,
                shader_location: 6,
                format: wgpu::VertexFormat::Float32,
            },
            wgpu::VertexAttribute {
                offset: 52,
                shader_location: 7,
                format: wgpu::VertexFormat::Float32,
            },
            wgpu::VertexAttribute {
                offset: 56,
                shader_location: 8,
                format: wgpu::VertexFormat::Float32,
            },
        ],
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("acmap-point-pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: "vs_main",
            buffers: &[vertex_layout, instance_layout],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format: surface_format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}

fn create_line_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    surface_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("acmap-line-shader"),
        source: wgpu::ShaderSource::Wgsl(std::borrow::Cow::Borrowed(
            crate::shaders::LINE_SHADER_SOURCE,
        )),
    });

    let vertex_layout = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<LineVertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x4],
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("acmap-line-pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: "vs_main",
            buffers: &[vertex_layout],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format: surface_format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::LineList,
            ..wgpu::PrimitiveState::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}

/// Resolves one point's style and state into its batch columns. Shared by
/// the windowed sync path and the offscreen renderer.
pub(crate) fn write_point_slot(
    batch: &mut PointBatch,
    map: &AntigenicMap,
    slot: usize,
    point_index: usize,
) {
    let mode = map.mode();
    let point = map.point(point_index);
    let style = &point.style;

    let coords = point.coords_no_na();
    batch.set_position(slot, coords[0], coords[1], coords[2]);
    batch.set_size(slot, style.size);
    batch.set_shape(slot, style.shape);

    let mut fill = style.fill;
    fill[3] *= point.effective_fill_opacity(mode);
    batch.set_fill_color(slot, fill);

    let mut outline = point.effective_outline();
    outline[3] *= point.effective_outline_opacity(mode);
    batch.set_outline_color(slot, outline);

    batch.set_outline_width(slot, style.outline_width);
    batch.set_aspect(slot, style.aspect);
    batch.set_rotation(slot, style.rotation);
    batch.set_visible(slot, point.visible());
}

/// Frames every coordinate-valid point with a padded orthographic camera.
pub(crate) fn frame_map(map: &AntigenicMap, size: PhysicalSize<u32>) -> MapProjector {
    let mut min = [f64::INFINITY; 2];
    let mut max = [f64::NEG_INFINITY; 2];
    for point in map.points() {
        if let Some(coords) = point.coords() {
            min[0] = min[0].min(coords[0]);
            min[1] = min[1].min(coords[1]);
            max[0] = max[0].max(coords[0]);
            max[1] = max[1].max(coords[1]);
        }
    }
    if !min[0].is_finite() {
        return MapProjector::ortho([0.0, 0.0], 5.0, aspect_ratio(size));
    }
    let center = [
        ((min[0] + max[0]) / 2.0) as f32,
        ((min[1] + max[1]) / 2.0) as f32,
    ];
    let half_extent = ((max[0] - min[0]).max(max[1] - min[1]) / 2.0 + FRAME_PADDING).max(1.0);
    MapProjector::ortho(center, half_extent as f32, aspect_ratio(size))
}

fn aspect_ratio(size: PhysicalSize<u32>) -> f32 {
    size.width.max(1) as f32 / size.height.max(1) as f32
}
