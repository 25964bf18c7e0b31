//! Headless rendering: draw the map into an offscreen texture and read the
//! pixels back, for automation and render dumps without a window.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::mpsc;

use anyhow::{Context, Result, bail};
use bytemuck::cast_slice;
use image::{ImageEncoder, codecs::png::PngEncoder};
use winit::dpi::PhysicalSize;

use acmap_core::AntigenicMap;

use crate::batch::PointBatch;
use crate::projection::ViewportMetrics;
use crate::shaders::Globals;

use super::{GpuResources, frame_map, write_point_slot};

const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Renders the map at the given size and returns tightly packed RGBA8 rows.
pub fn render_offscreen(
    map: &AntigenicMap,
    width: u32,
    height: u32,
    global_scale: f32,
    max_point_size: f32,
) -> Result<Vec<u8>> {
    let instance = wgpu::Instance::default();
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        force_fallback_adapter: false,
        compatible_surface: None,
    }))
    .context("requesting wgpu adapter for offscreen rendering")?;
    let (device, queue) = pollster::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: Some("acmap-offscreen-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
        },
        None,
    ))
    .context("requesting wgpu device for offscreen rendering")?;

    let resources = GpuResources::create(&device, OFFSCREEN_FORMAT, map.len());

    let mut batch = PointBatch::allocate(map.len());
    for (slot, &point) in map.draw_order().iter().enumerate() {
        write_point_slot(&mut batch, map, slot, point);
    }
    let size = PhysicalSize::new(width, height);
    let projector = frame_map(map, size);
    let mut metrics = ViewportMetrics::new(size, 1.0);
    metrics.global_scale = global_scale;
    metrics.max_point_size = max_point_size;

    let instances = batch.assemble_instances(&projector, &metrics);
    if !instances.is_empty() {
        queue.write_buffer(&resources.instance_buffer, 0, cast_slice(&instances));
    }
    let globals = Globals {
        viewport: [width as f32, height as f32],
        pixel_ratio: metrics.pixel_ratio,
        global_scale: metrics.global_scale,
        max_point_size: metrics.max_point_size,
        scene_rotation: projector.scene_rotation(),
        _padding: [0.0; 2],
    };
    queue.write_buffer(&resources.globals_buffer, 0, cast_slice(&[globals]));

    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("acmap-offscreen-target"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OFFSCREEN_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    // Copy rows must be aligned; pad and strip below.
    let unpadded_bytes_per_row = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;
    let readback = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("acmap-offscreen-readback"),
        size: (padded_bytes_per_row * height) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("acmap-offscreen-encoder"),
    });
    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("acmap-offscreen-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::WHITE),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        if !instances.is_empty() {
            pass.set_pipeline(&resources.point_pipeline);
            pass.set_bind_group(0, &resources.globals_bind_group, &[]);
            pass.set_vertex_buffer(0, resources.marker_vertex_buffer.slice(..));
            pass.set_vertex_buffer(1, resources.instance_buffer.slice(..));
            pass.draw(0..6, 0..instances.len() as u32);
        }
    }
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &readback,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded_bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = readback.slice(..);
    let (sender, receiver) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    match receiver.recv() {
        Ok(Ok(())) => {}
        Ok(Err(err)) => bail!("mapping offscreen readback buffer: {err}"),
        Err(_) => bail!("offscreen readback callback dropped"),
    }

    let padded = slice.get_mapped_range();
    let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
    for row in 0..height {
        let start = (row * padded_bytes_per_row) as usize;
        pixels.extend_from_slice(&padded[start..start + unpadded_bytes_per_row as usize]);
    }
    drop(padded);
    readback.unmap();
    Ok(pixels)
}

/// Writes tightly packed RGBA8 rows out as a PNG.
pub fn export_rgba_to_png(path: &Path, width: u32, height: u32, pixels: &[u8]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("creating render dump {}", path.display()))?;
    let encoder = PngEncoder::new(BufWriter::new(file));
    encoder
        .write_image(pixels, width, height, image::ColorType::Rgba8)
        .with_context(|| format!("encoding render dump {}", path.display()))?;
    Ok(())
}
