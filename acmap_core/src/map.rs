//! The map-wide state machine: point entities, the selection/hover/highlight
//! cascade, and the incrementally maintained stress cache.
//!
//! Every public mutation runs the same ordered derived-state recomputation
//! before returning: pair stresses for the touched point(s), then partner
//! highlight refcounts, then the global selection mode. Nothing else mutates
//! cached state, which is what keeps `stress == sum(stress_per_partner)`
//! structurally true.

use anyhow::{Result, ensure};

use crate::point::{Point, PointKind};
use crate::stress::{ResidualSide, map_distance, pair_stress, residual, residual_side};
use crate::titer::{Titer, TiterError, TiterTable};

/// Global style-resolution mode. Selecting the first point flips this to
/// `SomeSelected`, which dims every non-prominent point; deselecting the
/// last flips it back. Stored once on the map and passed into style lookups
/// rather than mutated global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    NoneSelected = 0,
    SomeSelected = 1,
}

/// One rendered line: a connection line (`side == None`) or an error line
/// colored by which side of the table distance the map landed on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    pub from: [f64; 3],
    pub to: [f64; 3],
    pub side: Option<ResidualSide>,
}

#[derive(Debug, Clone)]
pub struct AntigenicMap {
    points: Vec<Point>,
    antigen_count: usize,
    serum_count: usize,
    titers: TiterTable,
    column_bases: Vec<f64>,
    selection: Vec<usize>,
    mode: SelectionMode,
    draw_order: Vec<usize>,
}

impl AntigenicMap {
    /// Assembles a map from already-constructed points (antigens first).
    /// Runs the one full stress pass of the map's lifetime; every later
    /// update is incremental.
    pub fn new(
        antigens: Vec<Point>,
        sera: Vec<Point>,
        titers: TiterTable,
        column_bases: Option<Vec<f64>>,
    ) -> Result<Self> {
        ensure!(
            titers.antigen_count() == antigens.len() && titers.serum_count() == sera.len(),
            "titer table is {}x{} but the map has {} antigens and {} sera",
            titers.antigen_count(),
            titers.serum_count(),
            antigens.len(),
            sera.len()
        );
        let column_bases = match column_bases {
            Some(bases) => {
                ensure!(
                    bases.len() == sera.len(),
                    "{} column bases supplied for {} sera",
                    bases.len(),
                    sera.len()
                );
                bases
            }
            None => (0..sera.len()).map(|sr| titers.column_basis(sr)).collect(),
        };

        let antigen_count = antigens.len();
        let serum_count = sera.len();
        let mut points = antigens;
        points.extend(sera);
        for (idx, point) in points.iter().enumerate() {
            let (expected_kind, expected_type) = if idx < antigen_count {
                (PointKind::Antigen, idx)
            } else {
                (PointKind::Serum, idx - antigen_count)
            };
            ensure!(
                point.point_index() == idx
                    && point.type_index() == expected_type
                    && point.kind() == expected_kind,
                "point {idx} ({}) has inconsistent identity indices",
                point.name
            );
        }

        let draw_order = (0..points.len()).collect();
        let mut map = Self {
            points,
            antigen_count,
            serum_count,
            titers,
            column_bases,
            selection: Vec::new(),
            mode: SelectionMode::NoneSelected,
            draw_order,
        };
        for ag in 0..map.antigen_count {
            for sr in 0..map.serum_count {
                map.refresh_pair(ag, sr);
            }
        }
        Ok(map)
    }

    pub fn antigen_count(&self) -> usize {
        self.antigen_count
    }

    pub fn serum_count(&self) -> usize {
        self.serum_count
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn point(&self, index: usize) -> &Point {
        &self.points[index]
    }

    pub fn antigen(&self, type_index: usize) -> &Point {
        &self.points[type_index]
    }

    pub fn serum(&self, type_index: usize) -> &Point {
        &self.points[self.antigen_count + type_index]
    }

    pub fn titers(&self) -> &TiterTable {
        &self.titers
    }

    pub fn column_basis(&self, serum: usize) -> f64 {
        self.column_bases[serum]
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    /// Point indices in selection order.
    pub fn selection(&self) -> &[usize] {
        &self.selection
    }

    /// Draw-order permutation: `draw_order[z]` is the point drawn at depth
    /// slot `z`. Applied by the renderer when it fills its batch slots.
    pub fn draw_order(&self) -> &[usize] {
        &self.draw_order
    }

    pub fn set_draw_order(&mut self, order: Vec<usize>) -> Result<()> {
        ensure!(
            order.len() == self.points.len(),
            "draw order has {} entries for {} points",
            order.len(),
            self.points.len()
        );
        let mut seen = vec![false; order.len()];
        for &idx in &order {
            ensure!(
                idx < seen.len() && !std::mem::replace(&mut seen[idx], true),
                "draw order is not a permutation (duplicate or out-of-range {idx})"
            );
        }
        self.draw_order = order;
        Ok(())
    }

    pub fn style_mut(&mut self, index: usize) -> &mut crate::point::PointStyle {
        &mut self.points[index].style
    }

    // --- primitive mutations -------------------------------------------

    /// Moves a point (or marks it NA with `None`) and incrementally refreshes
    /// only its own pairs, adjusting each partner's cached total by the
    /// delta. A move to NA hides the point, so selection and hover are
    /// dropped first, same as exclusion.
    pub fn move_point(&mut self, index: usize, coords: Option<[f64; 3]>) {
        self.points[index].set_coords(coords);
        if !self.points[index].coords_valid() {
            self.deselect(index);
            self.dehover(index);
        }
        self.refresh_point_pairs(index);
    }

    /// Marks a point selected. No-op when hidden or already selected.
    pub fn select(&mut self, index: usize) {
        if !self.points[index].visible() || self.points[index].selected() {
            return;
        }
        self.points[index].set_selected(true);
        self.selection.push(index);
        if self.selection.len() == 1 {
            self.mode = SelectionMode::SomeSelected;
        }
        self.shift_partner_highlights(index, true);
    }

    pub fn deselect(&mut self, index: usize) {
        if !self.points[index].selected() {
            return;
        }
        self.points[index].set_selected(false);
        self.selection.retain(|&i| i != index);
        if self.selection.is_empty() {
            self.mode = SelectionMode::NoneSelected;
        }
        self.shift_partner_highlights(index, false);
    }

    pub fn clear_selection(&mut self) {
        while let Some(&index) = self.selection.last() {
            self.deselect(index);
        }
    }

    /// Temporary hover state; does not touch the persistent selection.
    pub fn hover(&mut self, index: usize) {
        if !self.points[index].visible() || self.points[index].hovered() {
            return;
        }
        self.points[index].set_hovered(true);
        self.shift_partner_highlights(index, true);
    }

    pub fn dehover(&mut self, index: usize) {
        if !self.points[index].hovered() {
            return;
        }
        self.points[index].set_hovered(false);
        self.shift_partner_highlights(index, false);
    }

    /// Restores an excluded point. Its pairs re-enter stress accumulation.
    pub fn include_point(&mut self, index: usize) {
        if self.points[index].included() {
            return;
        }
        self.points[index].set_included(true);
        self.refresh_point_pairs(index);
    }

    /// Excludes a point: hidden, zero stress contribution from either side,
    /// batch slot retained. Selection and hover are dropped first since a
    /// hidden point takes no further state transitions.
    pub fn exclude_point(&mut self, index: usize) {
        if !self.points[index].included() {
            return;
        }
        self.deselect(index);
        self.dehover(index);
        self.points[index].set_included(false);
        self.refresh_point_pairs(index);
    }

    /// Edits one titer cell from its raw string form. Both endpoints' cached
    /// stress and any partner highlights held through this pair are
    /// refreshed before this returns.
    pub fn set_titer(&mut self, antigen: usize, serum: usize, raw: &str) -> Result<(), TiterError> {
        let titer = Titer::parse(raw)?;
        let was_contributing = self.titers.get(antigen, serum).contributes();
        self.titers.set(antigen, serum, titer);
        self.realign_pair_highlights(antigen, serum, was_contributing);
        self.refresh_pair(antigen, serum);
        Ok(())
    }

    /// Reverts an edited titer cell to its loaded value.
    pub fn restore_titer(&mut self, antigen: usize, serum: usize) {
        let was_contributing = self.titers.get(antigen, serum).contributes();
        self.titers.restore(antigen, serum);
        self.realign_pair_highlights(antigen, serum, was_contributing);
        self.refresh_pair(antigen, serum);
    }

    // --- derived state --------------------------------------------------

    /// Number of pairs currently contributing to this point's stress.
    pub fn contributing_pairs(&self, index: usize) -> usize {
        if !self.points[index].contributes() {
            return 0;
        }
        self.partner_range(index)
            .filter(|&partner| {
                let (ag, sr) = self.pair_of(index, partner);
                self.titers.get(ag, sr).contributes()
                    && self.partner_point(index, partner).contributes()
            })
            .count()
    }

    pub fn point_mean_stress(&self, index: usize) -> f64 {
        self.points[index].mean_stress(self.contributing_pairs(index))
    }

    pub fn total_stress(&self) -> f64 {
        // Every pair is cached on both endpoints.
        self.points.iter().map(Point::stress).sum::<f64>() / 2.0
    }

    /// Straight connection lines for every visible pair of a selected or
    /// hovered point.
    pub fn connection_lines(&self) -> Vec<LineSegment> {
        let mut lines = Vec::new();
        self.for_each_active_pair(|map, ag, sr| {
            let a = map.antigen(ag).coords_no_na();
            let s = map.serum(sr).coords_no_na();
            lines.push(LineSegment {
                from: a,
                to: s,
                side: None,
            });
        });
        lines
    }

    /// Error lines: from each endpoint of an active pair, a segment of half
    /// the residual length along the pair axis, pointing toward the partner
    /// when the map is too far and away from it when too close.
    pub fn error_lines(&self) -> Vec<LineSegment> {
        let mut lines = Vec::new();
        self.for_each_active_pair(|map, ag, sr| {
            let a = map.antigen(ag).coords_no_na();
            let s = map.serum(sr).coords_no_na();
            let dist = map_distance(a, s);
            if dist <= f64::EPSILON {
                return;
            }
            let titer = map.titers.get(ag, sr);
            let Some(r) = residual(dist, titer, map.column_bases[sr]) else {
                return;
            };
            let Some(side) = residual_side(r) else {
                return;
            };
            let dir = [(s[0] - a[0]) / dist, (s[1] - a[1]) / dist, (s[2] - a[2]) / dist];
            let half = r / 2.0;
            lines.push(LineSegment {
                from: a,
                to: [a[0] + dir[0] * half, a[1] + dir[1] * half, a[2] + dir[2] * half],
                side: Some(side),
            });
            lines.push(LineSegment {
                from: s,
                to: [s[0] - dir[0] * half, s[1] - dir[1] * half, s[2] - dir[2] * half],
                side: Some(side),
            });
        });
        lines
    }

    // --- internals ------------------------------------------------------

    fn for_each_active_pair(&self, mut visit: impl FnMut(&Self, usize, usize)) {
        for ag in 0..self.antigen_count {
            for sr in 0..self.serum_count {
                let a = self.antigen(ag);
                let s = self.serum(sr);
                let active = (a.selected() || a.hovered() || s.selected() || s.hovered())
                    && a.contributes()
                    && s.contributes()
                    && self.titers.get(ag, sr).contributes();
                if active {
                    visit(self, ag, sr);
                }
            }
        }
    }

    fn partner_range(&self, index: usize) -> std::ops::Range<usize> {
        if index < self.antigen_count {
            0..self.serum_count
        } else {
            0..self.antigen_count
        }
    }

    fn partner_point(&self, index: usize, partner: usize) -> &Point {
        if index < self.antigen_count {
            self.serum(partner)
        } else {
            self.antigen(partner)
        }
    }

    /// Resolves (point, partner-type-index) to the (antigen, serum) pair.
    fn pair_of(&self, index: usize, partner: usize) -> (usize, usize) {
        if index < self.antigen_count {
            (index, partner)
        } else {
            (partner, index - self.antigen_count)
        }
    }

    fn compute_pair_stress(&self, antigen: usize, serum: usize) -> f64 {
        let a = self.antigen(antigen);
        let s = self.serum(serum);
        if !a.contributes() || !s.contributes() {
            return 0.0;
        }
        let dist = map_distance(a.coords_no_na(), s.coords_no_na());
        pair_stress(dist, self.titers.get(antigen, serum), self.column_bases[serum])
    }

    fn refresh_pair(&mut self, antigen: usize, serum: usize) {
        let value = self.compute_pair_stress(antigen, serum);
        let serum_index = self.antigen_count + serum;
        self.points[antigen].replace_partner_stress(serum, value);
        self.points[serum_index].replace_partner_stress(antigen, value);
    }

    fn refresh_point_pairs(&mut self, index: usize) {
        for partner in self.partner_range(index) {
            let (ag, sr) = self.pair_of(index, partner);
            self.refresh_pair(ag, sr);
        }
        self.points[index].resum_stress();
    }

    /// Re-aligns the highlights held through one pair after a titer edit
    /// flips whether the pair contributes. Each selected or hovered endpoint
    /// holds one refcount on its partner, and only for contributing pairs;
    /// the edit must add or release exactly those counts or the refcount
    /// drifts from the selection/hover set.
    fn realign_pair_highlights(&mut self, antigen: usize, serum: usize, was_contributing: bool) {
        let now_contributing = self.titers.get(antigen, serum).contributes();
        if was_contributing == now_contributing {
            return;
        }
        let serum_index = self.antigen_count + serum;
        let antigen_holds =
            self.points[antigen].selected() as u32 + self.points[antigen].hovered() as u32;
        let serum_holds =
            self.points[serum_index].selected() as u32 + self.points[serum_index].hovered() as u32;
        for _ in 0..antigen_holds {
            if now_contributing {
                self.points[serum_index].add_highlight();
            } else {
                self.points[serum_index].remove_highlight();
            }
        }
        for _ in 0..serum_holds {
            if now_contributing {
                self.points[antigen].add_highlight();
            } else {
                self.points[antigen].remove_highlight();
            }
        }
    }

    /// Bumps (or releases) the highlight refcount on every partner the
    /// point actually draws lines to, i.e. pairs whose titer contributes.
    fn shift_partner_highlights(&mut self, index: usize, up: bool) {
        for partner in self.partner_range(index) {
            let (ag, sr) = self.pair_of(index, partner);
            if !self.titers.get(ag, sr).contributes() {
                continue;
            }
            let partner_index = if index < self.antigen_count {
                self.antigen_count + partner
            } else {
                partner
            };
            if up {
                self.points[partner_index].add_highlight();
            } else {
                self.points[partner_index].remove_highlight();
            }
        }
    }
}

#[cfg(test)]
mod map_tests {
    use super::*;
    use crate::point::PointStyle;

    fn test_point(
        name: &str,
        point_index: usize,
        type_index: usize,
        kind: PointKind,
        coords: Option<[f64; 3]>,
        partners: usize,
    ) -> Point {
        Point::new(
            name.to_string(),
            point_index,
            type_index,
            kind,
            coords,
            PointStyle::default(),
            partners,
        )
    }

    /// 1 antigen at the origin, 2 sera. Column bases fixed at 8; the first
    /// serum's titer is "320" (log 5, table distance 3), the second is "*".
    fn small_map() -> AntigenicMap {
        let antigens = vec![test_point(
            "AG1",
            0,
            0,
            PointKind::Antigen,
            Some([0.0, 0.0, 0.0]),
            2,
        )];
        let sera = vec![
            test_point("SR1", 1, 0, PointKind::Serum, Some([3.0, 0.0, 0.0]), 1),
            test_point("SR2", 2, 1, PointKind::Serum, Some([1.0, 1.0, 0.0]), 1),
        ];
        let titers = TiterTable::from_rows(
            &[vec!["320".to_string(), "*".to_string()]],
            1,
            2,
        )
        .expect("titer table");
        AntigenicMap::new(antigens, sera, titers, Some(vec![8.0, 8.0])).expect("map")
    }

    fn assert_invariant(map: &AntigenicMap) {
        for point in map.points() {
            let sum: f64 = point.stress_per_partner().iter().sum();
            assert!(
                (point.stress() - sum).abs() < 1e-9,
                "{}: cached stress {} != partner sum {}",
                point.name,
                point.stress(),
                sum
            );
        }
    }

    #[test]
    fn worked_example_matches_the_hand_computed_stress() {
        let mut map = small_map();
        // Table distance 3, map distance 3: zero stress.
        assert_eq!(map.antigen(0).stress(), 0.0);
        assert_eq!(map.serum(0).stress(), 0.0);

        // Serum to (5,0): residual +2, pair stress 4 on both endpoints.
        map.move_point(1, Some([5.0, 0.0, 0.0]));
        assert_eq!(map.serum(0).stress(), 4.0);
        assert_eq!(map.antigen(0).stress(), 4.0);
        assert_eq!(map.antigen(0).stress_per_partner()[0], 4.0);
        assert_invariant(&map);
    }

    #[test]
    fn star_titer_contributes_zero_regardless_of_coordinates() {
        let mut map = small_map();
        assert_eq!(map.antigen(0).stress_per_partner()[1], 0.0);
        map.move_point(2, Some([100.0, -40.0, 7.0]));
        assert_eq!(map.antigen(0).stress_per_partner()[1], 0.0);
        assert_eq!(map.serum(1).stress(), 0.0);
        assert_invariant(&map);
    }

    #[test]
    fn moving_a_point_back_restores_every_cached_total() {
        let mut map = small_map();
        let before: Vec<f64> = map.points().iter().map(Point::stress).collect();
        map.move_point(0, Some([-2.0, 1.5, 0.0]));
        map.move_point(0, Some([0.0, 0.0, 0.0]));
        let after: Vec<f64> = map.points().iter().map(Point::stress).collect();
        for (a, b) in before.iter().zip(&after) {
            assert!((a - b).abs() < 1e-9, "stress drifted: {a} -> {b}");
        }
        assert_invariant(&map);
    }

    #[test]
    fn na_coordinates_zero_the_points_contributions() {
        let mut map = small_map();
        map.move_point(1, Some([5.0, 0.0, 0.0]));
        assert!(map.antigen(0).stress() > 0.0);
        map.move_point(1, None);
        assert!(!map.serum(0).visible());
        assert_eq!(map.serum(0).stress(), 0.0);
        assert_eq!(map.antigen(0).stress_per_partner()[0], 0.0);
        assert_invariant(&map);
    }

    #[test]
    fn exclusion_removes_stress_from_both_sides_and_keeps_the_slot() {
        let mut map = small_map();
        map.move_point(1, Some([5.0, 0.0, 0.0]));
        map.exclude_point(1);
        assert_eq!(map.serum(0).stress(), 0.0);
        assert_eq!(map.antigen(0).stress(), 0.0);
        assert_eq!(map.len(), 3);
        map.include_point(1);
        assert_eq!(map.antigen(0).stress(), 4.0);
        assert_invariant(&map);
    }

    #[test]
    fn titer_edit_refreshes_both_endpoints_and_restore_undoes_it() {
        let mut map = small_map();
        // "80" is log 3, table distance 5, map distance 3: residual -2.
        map.set_titer(0, 0, "80").expect("edit");
        assert_eq!(map.antigen(0).stress(), 4.0);
        assert_eq!(map.serum(0).stress(), 4.0);
        map.restore_titer(0, 0);
        assert_eq!(map.antigen(0).stress(), 0.0);
        assert_invariant(&map);
    }

    #[test]
    fn selecting_flips_the_mode_and_highlights_partners() {
        let mut map = small_map();
        assert_eq!(map.mode(), SelectionMode::NoneSelected);
        map.select(0);
        assert_eq!(map.mode(), SelectionMode::SomeSelected);
        assert_eq!(map.selection(), &[0]);
        // SR1 is a real partner, SR2 is a "*" pair and stays unhighlighted.
        assert_eq!(map.serum(0).highlighted(), 1);
        assert_eq!(map.serum(1).highlighted(), 0);
        map.select(0);
        assert_eq!(map.serum(0).highlighted(), 1, "reselect must not double-count");
    }

    #[test]
    fn deselecting_the_last_point_restores_untouched_points_opacity() {
        let mut map = small_map();
        // SR2 is never itself selected or hovered; it dims purely through
        // the global mode.
        let bystander = map.serum(1).clone();
        assert_eq!(bystander.effective_fill_opacity(map.mode()), 1.0);
        map.select(0);
        assert!(map.serum(1).effective_fill_opacity(map.mode()) < 1.0);
        map.deselect(0);
        assert_eq!(map.mode(), SelectionMode::NoneSelected);
        assert_eq!(map.serum(1).effective_fill_opacity(map.mode()), 1.0);
        assert_eq!(map.serum(0).highlighted(), 0);
    }

    #[test]
    fn hover_highlights_partners_without_touching_selection() {
        let mut map = small_map();
        map.hover(0);
        assert!(map.antigen(0).hovered());
        assert!(!map.antigen(0).selected());
        assert_eq!(map.serum(0).highlighted(), 1);
        assert_eq!(map.mode(), SelectionMode::NoneSelected);
        map.dehover(0);
        assert_eq!(map.serum(0).highlighted(), 0);
    }

    #[test]
    fn highlight_refcount_survives_overlapping_sources() {
        let mut map = small_map();
        map.select(0);
        map.hover(0);
        assert_eq!(map.serum(0).highlighted(), 2);
        map.dehover(0);
        assert_eq!(map.serum(0).highlighted(), 1);
        map.deselect(0);
        assert_eq!(map.serum(0).highlighted(), 0);
    }

    #[test]
    fn titer_edits_keep_partner_highlights_in_step_with_selection() {
        let mut map = small_map();
        map.select(0);
        map.hover(0);
        assert_eq!(map.serum(0).highlighted(), 2);

        // Measured -> "*": the pair stops drawing lines and both held
        // refcounts are released immediately.
        map.set_titer(0, 0, "*").expect("edit");
        assert_eq!(map.serum(0).highlighted(), 0);

        // Restore brings the contribution back, and with it the refcounts.
        map.restore_titer(0, 0);
        assert_eq!(map.serum(0).highlighted(), 2);

        map.dehover(0);
        map.deselect(0);
        assert_eq!(map.serum(0).highlighted(), 0);
    }

    #[test]
    fn titer_edit_from_star_highlights_the_new_partner_without_underflow() {
        let mut map = small_map();
        map.select(0);
        // SR2 starts as a "*" pair: no highlight held through it.
        assert_eq!(map.serum(1).highlighted(), 0);
        map.set_titer(0, 1, "40").expect("edit");
        assert_eq!(map.serum(1).highlighted(), 1);
        map.deselect(0);
        assert_eq!(map.serum(1).highlighted(), 0);
        assert_invariant(&map);
    }

    #[test]
    fn na_move_drops_selection_and_hover_like_exclusion() {
        let mut map = small_map();
        map.select(1);
        map.hover(1);
        assert_eq!(map.antigen(0).highlighted(), 2);
        map.move_point(1, None);
        assert!(map.selection().is_empty());
        assert!(!map.serum(0).hovered());
        assert_eq!(map.mode(), SelectionMode::NoneSelected);
        assert_eq!(map.antigen(0).highlighted(), 0);
        assert_invariant(&map);
    }

    #[test]
    fn hidden_points_refuse_selection_and_hover() {
        let mut map = small_map();
        map.move_point(1, None);
        map.select(1);
        map.hover(1);
        assert!(map.selection().is_empty());
        assert!(!map.serum(0).hovered());
        assert_eq!(map.mode(), SelectionMode::NoneSelected);
    }

    #[test]
    fn excluding_a_selected_point_deselects_it_first() {
        let mut map = small_map();
        map.select(1);
        assert_eq!(map.mode(), SelectionMode::SomeSelected);
        map.exclude_point(1);
        assert!(map.selection().is_empty());
        assert_eq!(map.mode(), SelectionMode::NoneSelected);
        assert_eq!(map.antigen(0).highlighted(), 0);
    }

    #[test]
    fn connection_and_error_lines_follow_the_active_pairs() {
        let mut map = small_map();
        assert!(map.connection_lines().is_empty());
        map.move_point(1, Some([5.0, 0.0, 0.0]));
        map.select(0);
        let connections = map.connection_lines();
        // Only the measured pair draws; the "*" pair never does.
        assert_eq!(connections.len(), 1);
        assert_eq!(connections[0].side, None);

        let errors = map.error_lines();
        assert_eq!(errors.len(), 2);
        for line in &errors {
            assert_eq!(line.side, Some(ResidualSide::TooFar));
        }
        // Antigen-side error line points one unit toward the serum
        // (residual +2, half length 1).
        assert_eq!(errors[0].from, [0.0, 0.0, 0.0]);
        assert!((errors[0].to[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn mean_stress_counts_only_contributing_pairs() {
        let mut map = small_map();
        map.move_point(1, Some([5.0, 0.0, 0.0]));
        // One contributing pair (SR2 is "*"), total 4.
        assert_eq!(map.contributing_pairs(0), 1);
        assert_eq!(map.point_mean_stress(0), 4.0);
        assert_eq!(map.total_stress(), 4.0);
    }

    #[test]
    fn draw_order_must_be_a_permutation() {
        let mut map = small_map();
        assert!(map.set_draw_order(vec![2, 0, 1]).is_ok());
        assert!(map.set_draw_order(vec![0, 0, 1]).is_err());
        assert!(map.set_draw_order(vec![0, 1]).is_err());
    }
}
