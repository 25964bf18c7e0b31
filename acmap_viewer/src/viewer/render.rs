//! Per-frame drawing: line overlay first, then the instanced point batch.

use acmap_core::ResidualSide;

use crate::shaders::LineVertex;

use super::ViewerState;

const BACKGROUND: wgpu::Color = wgpu::Color {
    r: 1.0,
    g: 1.0,
    b: 1.0,
    a: 1.0,
};

const CONNECTION_COLOR: [f32; 4] = [0.55, 0.55, 0.55, 0.8];
/// The map sits closer than the titer says.
const TOO_CLOSE_COLOR: [f32; 4] = [0.1, 0.3, 0.9, 0.9];
/// The map sits farther than the titer says.
const TOO_FAR_COLOR: [f32; 4] = [0.9, 0.15, 0.1, 0.9];
const MARQUEE_COLOR: [f32; 4] = [0.2, 0.2, 0.2, 0.9];

impl ViewerState {
    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        self.upload_globals();
        self.upload_instances();
        let lines = self.build_line_vertices();
        self.upload_lines(&lines);

        let frame = self.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("acmap-frame-encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("acmap-frame-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(BACKGROUND),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if self.line_count > 0 {
                pass.set_pipeline(&self.line_pipeline);
                pass.set_bind_group(0, &self.globals_bind_group, &[]);
                pass.set_vertex_buffer(0, self.line_vertex_buffer.slice(..));
                pass.draw(0..self.line_count, 0..1);
            }

            if self.instance_count > 0 {
                pass.set_pipeline(&self.point_pipeline);
                pass.set_bind_group(0, &self.globals_bind_group, &[]);
                pass.set_vertex_buffer(0, self.marker_vertex_buffer.slice(..));
                pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
                pass.draw(0..6, 0..self.instance_count);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    /// Connection and error lines for the active pairs, plus the marquee
    /// rectangle while a drag is in flight. Rebuilt each frame; the active
    /// set is small.
    fn build_line_vertices(&self) -> Vec<LineVertex> {
        let mut vertices = Vec::new();
        for segment in self
            .map
            .connection_lines()
            .iter()
            .chain(self.map.error_lines().iter())
        {
            let (Some(from), Some(to)) = (
                self.projector.project(segment.from),
                self.projector.project(segment.to),
            ) else {
                continue;
            };
            let color = match segment.side {
                None => CONNECTION_COLOR,
                Some(ResidualSide::TooClose) => TOO_CLOSE_COLOR,
                Some(ResidualSide::TooFar) => TOO_FAR_COLOR,
            };
            vertices.push(LineVertex {
                position: from,
                color,
            });
            vertices.push(LineVertex {
                position: to,
                color,
            });
        }

        if let (Some(marquee), Some(cursor)) = (&self.marquee, self.cursor_ndc) {
            if marquee.dragged {
                let a = marquee.anchor;
                let corners = [a, [cursor[0], a[1]], cursor, [a[0], cursor[1]]];
                for i in 0..4 {
                    vertices.push(LineVertex {
                        position: corners[i],
                        color: MARQUEE_COLOR,
                    });
                    vertices.push(LineVertex {
                        position: corners[(i + 1) % 4],
                        color: MARQUEE_COLOR,
                    });
                }
            }
        }
        vertices
    }
}
