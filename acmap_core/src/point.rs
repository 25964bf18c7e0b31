use crate::map::SelectionMode;
use crate::style::{Rgba, Shape, is_transparent};

/// Opacity multiplier applied to unselected, unhovered, unhighlighted points
/// while some other point is selected.
const DIMMED_OPACITY: f32 = 0.2;

/// Effective-opacity table keyed `[mode][prominent]`, where prominent means
/// selected or partner-highlighted. Only the `SomeSelected` mode
/// distinguishes the rows, which is why selection-count changes restyle the
/// whole point set. Hover bypasses the table entirely with a full-opacity
/// override.
const OPACITY_TABLE: [[f32; 2]; 2] = [
    // SelectionMode::NoneSelected
    [1.0, 1.0],
    // SelectionMode::SomeSelected
    [DIMMED_OPACITY, 1.0],
];

/// Outline color override applied while a point is hovered.
pub const HOVER_OUTLINE: Rgba = [1.0, 0.0, 0.0, 1.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointKind {
    Antigen,
    Serum,
}

impl PointKind {
    pub fn label(self) -> &'static str {
        match self {
            PointKind::Antigen => "antigen",
            PointKind::Serum => "serum",
        }
    }
}

/// Persistent plotting style for one point, as loaded from the map file.
#[derive(Debug, Clone)]
pub struct PointStyle {
    pub size: f32,
    pub shape: Shape,
    pub fill: Rgba,
    pub outline: Rgba,
    pub outline_width: f32,
    pub aspect: f32,
    pub fill_opacity: f32,
    pub outline_opacity: f32,
    pub rotation: f32,
}

impl Default for PointStyle {
    fn default() -> Self {
        Self {
            size: 5.0,
            shape: Shape::Circle,
            fill: [0.0, 0.5, 0.0, 1.0],
            outline: [0.0, 0.0, 0.0, 1.0],
            outline_width: 1.0,
            aspect: 1.0,
            fill_opacity: 1.0,
            outline_opacity: 1.0,
            rotation: 0.0,
        }
    }
}

/// One antigen or serum: identity, geometry, style, interaction state, and
/// the incrementally maintained stress cache.
#[derive(Debug, Clone)]
pub struct Point {
    pub name: String,
    point_index: usize,
    type_index: usize,
    kind: PointKind,
    coords: [f64; 3],
    coords_valid: bool,
    pub style: PointStyle,
    selected: bool,
    hovered: bool,
    highlighted: u32,
    included: bool,
    stress: f64,
    stress_per_partner: Vec<f64>,
}

impl Point {
    pub fn new(
        name: String,
        point_index: usize,
        type_index: usize,
        kind: PointKind,
        coords: Option<[f64; 3]>,
        style: PointStyle,
        partner_count: usize,
    ) -> Self {
        let (coords, coords_valid) = normalize_coords(coords);
        Self {
            name,
            point_index,
            type_index,
            kind,
            coords,
            coords_valid,
            style,
            selected: false,
            hovered: false,
            highlighted: 0,
            included: true,
            stress: 0.0,
            stress_per_partner: vec![0.0; partner_count],
        }
    }

    pub fn point_index(&self) -> usize {
        self.point_index
    }

    pub fn type_index(&self) -> usize {
        self.type_index
    }

    pub fn kind(&self) -> PointKind {
        self.kind
    }

    /// Coordinates, or `None` when any input coordinate was missing/NaN.
    pub fn coords(&self) -> Option<[f64; 3]> {
        self.coords_valid.then_some(self.coords)
    }

    /// Coordinates with NA collapsed to the origin, for callers that need a
    /// position regardless (the scene collaborator's contract).
    pub fn coords_no_na(&self) -> [f64; 3] {
        if self.coords_valid { self.coords } else { [0.0; 3] }
    }

    pub fn coords_valid(&self) -> bool {
        self.coords_valid
    }

    pub(crate) fn set_coords(&mut self, coords: Option<[f64; 3]>) {
        let (coords, valid) = normalize_coords(coords);
        self.coords = coords;
        self.coords_valid = valid;
    }

    pub fn selected(&self) -> bool {
        self.selected
    }

    pub fn hovered(&self) -> bool {
        self.hovered
    }

    pub fn highlighted(&self) -> u32 {
        self.highlighted
    }

    pub fn included(&self) -> bool {
        self.included
    }

    /// Hidden points draw nothing and accept no selection/hover transitions.
    pub fn visible(&self) -> bool {
        self.coords_valid && self.included
    }

    /// Whether this point contributes to distance math at all.
    pub fn contributes(&self) -> bool {
        self.coords_valid && self.included
    }

    pub(crate) fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }

    pub(crate) fn set_hovered(&mut self, hovered: bool) {
        self.hovered = hovered;
    }

    pub(crate) fn set_included(&mut self, included: bool) {
        self.included = included;
    }

    pub(crate) fn add_highlight(&mut self) {
        self.highlighted += 1;
    }

    pub(crate) fn remove_highlight(&mut self) {
        debug_assert!(self.highlighted > 0, "highlight refcount underflow");
        self.highlighted = self.highlighted.saturating_sub(1);
    }

    pub fn stress(&self) -> f64 {
        self.stress
    }

    pub fn stress_per_partner(&self) -> &[f64] {
        &self.stress_per_partner
    }

    /// Mean stress over partners that currently contribute a pair.
    pub fn mean_stress(&self, contributing_pairs: usize) -> f64 {
        if contributing_pairs == 0 {
            0.0
        } else {
            self.stress / contributing_pairs as f64
        }
    }

    pub(crate) fn replace_partner_stress(&mut self, partner: usize, value: f64) {
        let old = self.stress_per_partner[partner];
        self.stress_per_partner[partner] = value;
        self.stress += value - old;
    }

    /// Recomputes the cached total from the per-partner values, squeezing
    /// out accumulated floating-point drift after long edit sessions.
    pub(crate) fn resum_stress(&mut self) {
        self.stress = self.stress_per_partner.iter().sum();
    }

    fn effective_opacity(&self, mode: SelectionMode, styled: f32) -> f32 {
        // Hover is a temporary full-opacity override, ahead of the styled
        // value; a point authored at 0.3 opacity still reads 1.0 hovered.
        if self.hovered {
            return 1.0;
        }
        let prominent = self.selected || self.highlighted > 0;
        OPACITY_TABLE[mode as usize][prominent as usize] * styled
    }

    /// Effective fill opacity under the current selection mode. Highlighted
    /// partners read the prominent column so their connections stay visible.
    pub fn effective_fill_opacity(&self, mode: SelectionMode) -> f32 {
        self.effective_opacity(mode, self.style.fill_opacity)
    }

    pub fn effective_outline_opacity(&self, mode: SelectionMode) -> f32 {
        self.effective_opacity(mode, self.style.outline_opacity)
    }

    /// Outline color with the temporary hover override applied.
    pub fn effective_outline(&self) -> Rgba {
        if self.hovered { HOVER_OUTLINE } else { self.style.outline }
    }

    /// The color a legend/table row shows for this point: the fill unless it
    /// is transparent, in which case the outline stands in.
    pub fn primary_color(&self) -> Rgba {
        if is_transparent(self.style.fill) {
            self.style.outline
        } else {
            self.style.fill
        }
    }
}

fn normalize_coords(coords: Option<[f64; 3]>) -> ([f64; 3], bool) {
    match coords {
        Some(c) if c.iter().all(|v| v.is_finite()) => (c, true),
        _ => ([0.0; 3], false),
    }
}
