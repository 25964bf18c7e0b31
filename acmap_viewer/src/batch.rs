//! Columnar per-point attribute store backing the single instanced draw
//! call. Setters are O(1) and mark their column dirty; the interleaved
//! instance vector is assembled at most once per frame.

use bytemuck::{Pod, Zeroable};

use acmap_core::style::Shape;

use crate::projection::{MapProjector, MarkerPlacement, ViewportMetrics, place_marker};

/// One column of the store, used for dirty tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Column {
    Position = 1 << 0,
    Size = 1 << 1,
    Shape = 1 << 2,
    Fill = 1 << 3,
    Outline = 1 << 4,
    OutlineWidth = 1 << 5,
    Aspect = 1 << 6,
    Rotation = 1 << 7,
    Visibility = 1 << 8,
}

/// Per-point instance data matching the vertex layout in `shaders.rs`.
#[repr(C, align(16))]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct PointInstance {
    pub translate: [f32; 2],
    pub size: f32,
    pub shape: f32,
    pub fill: [f32; 4],
    pub outline: [f32; 4],
    pub outline_width: f32,
    pub aspect: f32,
    pub rotation: f32,
    pub _padding: f32,
}

#[derive(Debug, Clone)]
pub struct PointBatch {
    len: usize,
    positions: Vec<[f64; 3]>,
    sizes: Vec<f32>,
    shapes: Vec<f32>,
    fills: Vec<[f32; 4]>,
    outlines: Vec<[f32; 4]>,
    outline_widths: Vec<f32>,
    aspects: Vec<f32>,
    rotations: Vec<f32>,
    visibility: Vec<bool>,
    dirty: u16,
}

impl PointBatch {
    /// Reserves `n` slots, all hidden until styled.
    pub fn allocate(n: usize) -> Self {
        Self {
            len: n,
            positions: vec![[0.0; 3]; n],
            sizes: vec![0.0; n],
            shapes: vec![Shape::Circle.as_code(); n],
            fills: vec![[0.0; 4]; n],
            outlines: vec![[0.0; 4]; n],
            outline_widths: vec![0.0; n],
            aspects: vec![1.0; n],
            rotations: vec![0.0; n],
            visibility: vec![false; n],
            dirty: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn check(&self, index: usize) {
        assert!(
            index < self.len,
            "point batch index {index} out of range (len {})",
            self.len
        );
    }

    fn mark(&mut self, column: Column) {
        self.dirty |= column as u16;
    }

    /// True when any column changed since the last `clear_dirty`.
    pub fn is_dirty(&self) -> bool {
        self.dirty != 0
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = 0;
    }

    pub fn set_position(&mut self, index: usize, x: f64, y: f64, z: f64) {
        self.check(index);
        self.positions[index] = [x, y, z];
        self.mark(Column::Position);
    }

    pub fn set_size(&mut self, index: usize, size: f32) {
        self.check(index);
        self.sizes[index] = size;
        self.mark(Column::Size);
    }

    pub fn set_shape(&mut self, index: usize, shape: Shape) {
        self.check(index);
        self.shapes[index] = shape.as_code();
        self.mark(Column::Shape);
    }

    pub fn set_fill_color(&mut self, index: usize, rgba: [f32; 4]) {
        self.check(index);
        self.fills[index] = rgba;
        self.mark(Column::Fill);
    }

    pub fn set_outline_color(&mut self, index: usize, rgba: [f32; 4]) {
        self.check(index);
        self.outlines[index] = rgba;
        self.mark(Column::Outline);
    }

    pub fn set_outline_width(&mut self, index: usize, width: f32) {
        self.check(index);
        self.outline_widths[index] = width;
        self.mark(Column::OutlineWidth);
    }

    pub fn set_aspect(&mut self, index: usize, aspect: f32) {
        self.check(index);
        self.aspects[index] = aspect;
        self.mark(Column::Aspect);
    }

    pub fn set_rotation(&mut self, index: usize, rotation: f32) {
        self.check(index);
        self.rotations[index] = rotation;
        self.mark(Column::Rotation);
    }

    pub fn set_visible(&mut self, index: usize, visible: bool) {
        self.check(index);
        self.visibility[index] = visible;
        self.mark(Column::Visibility);
    }

    pub fn position(&self, index: usize) -> [f64; 3] {
        self.check(index);
        self.positions[index]
    }

    pub fn size(&self, index: usize) -> f32 {
        self.check(index);
        self.sizes[index]
    }

    pub fn shape_code(&self, index: usize) -> f32 {
        self.check(index);
        self.shapes[index]
    }

    pub fn aspect(&self, index: usize) -> f32 {
        self.check(index);
        self.aspects[index]
    }

    pub fn visible(&self, index: usize) -> bool {
        self.check(index);
        self.visibility[index]
    }

    /// Relocates slot `index` to draw position `new_index`, shifting every
    /// slot strictly between them by one (array splice-move semantics).
    /// Every column is permuted identically; the caller must remap its own
    /// point-id bookkeeping in the same step.
    pub fn set_index(&mut self, index: usize, new_index: usize) {
        self.check(index);
        self.check(new_index);
        if index == new_index {
            return;
        }
        splice_move(&mut self.positions, index, new_index);
        splice_move(&mut self.sizes, index, new_index);
        splice_move(&mut self.shapes, index, new_index);
        splice_move(&mut self.fills, index, new_index);
        splice_move(&mut self.outlines, index, new_index);
        splice_move(&mut self.outline_widths, index, new_index);
        splice_move(&mut self.aspects, index, new_index);
        splice_move(&mut self.rotations, index, new_index);
        splice_move(&mut self.visibility, index, new_index);
        self.dirty = u16::MAX;
    }

    /// Builds the interleaved instance list for this frame. Hidden slots and
    /// slots the projector rejects are skipped; out-of-frustum slots become
    /// edge-hugging arrowheads pointing back at the plot center.
    pub fn assemble_instances(
        &self,
        projector: &MapProjector,
        metrics: &ViewportMetrics,
    ) -> Vec<PointInstance> {
        let mut instances = Vec::with_capacity(self.len);
        for slot in 0..self.len {
            if !self.visibility[slot] {
                continue;
            }
            let Some(placement) = place_marker(projector, self.positions[slot]) else {
                continue;
            };
            let pixel = metrics.effective_pixel_size(self.sizes[slot]);
            let (translate, shape, rotation) = match placement {
                MarkerPlacement::OnScreen(ndc) => {
                    (ndc, self.shapes[slot], self.rotations[slot])
                }
                MarkerPlacement::Clamped { ndc, rotation } => {
                    (ndc, Shape::Arrowhead.as_code(), rotation)
                }
            };
            instances.push(PointInstance {
                translate,
                size: pixel.pixels,
                shape,
                fill: self.fills[slot],
                outline: self.outlines[slot],
                outline_width: self.outline_widths[slot],
                aspect: self.aspects[slot],
                rotation,
                _padding: 0.0,
            });
        }
        instances
    }
}

fn splice_move<T>(column: &mut Vec<T>, index: usize, new_index: usize) {
    let value = column.remove(index);
    column.insert(new_index, value);
}

#[cfg(test)]
mod batch_tests {
    use super::*;

    fn batch_with_sizes(sizes: &[f32]) -> PointBatch {
        let mut batch = PointBatch::allocate(sizes.len());
        for (i, &size) in sizes.iter().enumerate() {
            batch.set_size(i, size);
            batch.set_position(i, i as f64, 0.0, 0.0);
            batch.set_visible(i, true);
        }
        batch
    }

    #[test]
    fn setters_mark_the_batch_dirty_once_per_frame() {
        let mut batch = PointBatch::allocate(2);
        assert!(!batch.is_dirty());
        batch.set_size(0, 7.0);
        batch.set_size(1, 8.0);
        assert!(batch.is_dirty());
        batch.clear_dirty();
        assert!(!batch.is_dirty());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn out_of_range_index_is_fatal() {
        let mut batch = PointBatch::allocate(2);
        batch.set_size(2, 1.0);
    }

    #[test]
    fn set_index_splices_every_column() {
        let mut batch = batch_with_sizes(&[0.0, 1.0, 2.0, 3.0, 4.0]);
        batch.set_index(1, 3);
        let sizes: Vec<f32> = (0..5).map(|i| batch.size(i)).collect();
        assert_eq!(sizes, vec![0.0, 2.0, 3.0, 1.0, 4.0]);
        let xs: Vec<f64> = (0..5).map(|i| batch.position(i)[0]).collect();
        assert_eq!(xs, vec![0.0, 2.0, 3.0, 1.0, 4.0]);
    }

    #[test]
    fn set_index_there_and_back_restores_every_column() {
        let mut batch = batch_with_sizes(&[0.0, 1.0, 2.0, 3.0, 4.0]);
        batch.set_fill_color(2, [0.5, 0.0, 0.0, 1.0]);
        let before = batch.clone();
        batch.set_index(0, 4);
        batch.set_index(4, 0);
        for i in 0..5 {
            assert_eq!(batch.size(i), before.size(i));
            assert_eq!(batch.position(i), before.position(i));
            assert_eq!(batch.fills[i], before.fills[i]);
            assert_eq!(batch.visible(i), before.visible(i));
        }
    }

    #[test]
    fn hidden_slots_are_skipped_during_assembly() {
        use crate::projection::{MapProjector, ViewportMetrics};
        use winit::dpi::PhysicalSize;

        let mut batch = batch_with_sizes(&[5.0, 5.0, 5.0]);
        batch.set_visible(1, false);
        let projector = MapProjector::ortho([0.0, 0.0], 10.0, 1.0);
        let metrics = ViewportMetrics::new(PhysicalSize::new(600, 600), 1.0);
        let instances = batch.assemble_instances(&projector, &metrics);
        assert_eq!(instances.len(), 2);
    }

    #[test]
    fn out_of_frustum_slots_become_arrowheads() {
        use crate::projection::{MapProjector, ViewportMetrics};
        use winit::dpi::PhysicalSize;

        let mut batch = PointBatch::allocate(1);
        batch.set_size(0, 5.0);
        batch.set_position(0, 100.0, 0.0, 0.0);
        batch.set_visible(0, true);
        let projector = MapProjector::ortho([0.0, 0.0], 10.0, 1.0);
        let metrics = ViewportMetrics::new(PhysicalSize::new(600, 600), 1.0);
        let instances = batch.assemble_instances(&projector, &metrics);
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].shape, Shape::Arrowhead.as_code());
        assert!(instances[0].translate[0] < 1.0);
    }
}
