//! Map-file ingestion: the JSON shape of the loader collaborator's per-point
//! arrays and titer matrix, and its conversion into an [`AntigenicMap`].
//!
//! Malformed individual rows degrade per-point (defaulted style, hidden
//! coordinates) with a logged warning; structural problems fail the load.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::map::AntigenicMap;
use crate::point::{Point, PointKind, PointStyle};
use crate::style::{Shape, parse_color};
use crate::titer::TiterTable;

#[derive(Debug, Clone, Deserialize)]
pub struct MapFile {
    #[serde(default)]
    pub name: Option<String>,
    pub antigens: Vec<PointRow>,
    pub sera: Vec<PointRow>,
    /// One row of raw titer strings per antigen.
    pub titers: Vec<Vec<String>>,
    #[serde(default)]
    pub column_bases: Option<Vec<f64>>,
    #[serde(default)]
    pub draw_order: Option<Vec<usize>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PointRow {
    pub name: String,
    /// 2 or 3 entries; `null` marks an NA coordinate.
    pub coords: Vec<Option<f64>>,
    #[serde(default)]
    pub size: Option<f32>,
    #[serde(default)]
    pub fill: Option<String>,
    #[serde(default)]
    pub outline: Option<String>,
    #[serde(default)]
    pub outline_width: Option<f32>,
    #[serde(default)]
    pub aspect: Option<f32>,
    #[serde(default)]
    pub shape: Option<String>,
}

pub fn load_map(path: &Path) -> Result<AntigenicMap> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading map file {}", path.display()))?;
    let file: MapFile = serde_json::from_str(&raw)
        .with_context(|| format!("parsing map file {}", path.display()))?;
    map_from_file(file)
}

pub fn map_from_file(file: MapFile) -> Result<AntigenicMap> {
    let antigen_count = file.antigens.len();
    let serum_count = file.sera.len();
    let titers = TiterTable::from_rows(&file.titers, antigen_count, serum_count)
        .context("building titer table")?;

    let antigens = file
        .antigens
        .iter()
        .enumerate()
        .map(|(idx, row)| build_point(row, idx, idx, PointKind::Antigen, serum_count))
        .collect();
    let sera = file
        .sera
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            build_point(row, antigen_count + idx, idx, PointKind::Serum, antigen_count)
        })
        .collect();

    let mut map = AntigenicMap::new(antigens, sera, titers, file.column_bases)
        .context("assembling antigenic map")?;
    if let Some(order) = file.draw_order {
        map.set_draw_order(order).context("applying draw order")?;
    }
    if let Some(name) = &file.name {
        log::info!("loaded map {name:?}: {antigen_count} antigens, {serum_count} sera");
    }
    Ok(map)
}

fn build_point(
    row: &PointRow,
    point_index: usize,
    type_index: usize,
    kind: PointKind,
    partner_count: usize,
) -> Point {
    let coords = parse_coords(row);
    let style = build_style(row, kind);
    Point::new(
        row.name.clone(),
        point_index,
        type_index,
        kind,
        coords,
        style,
        partner_count,
    )
}

fn parse_coords(row: &PointRow) -> Option<[f64; 3]> {
    if row.coords.len() < 2 || row.coords.len() > 3 {
        log::warn!(
            "{}: {} coordinates supplied, expected 2 or 3; hiding point",
            row.name,
            row.coords.len()
        );
        return None;
    }
    let mut coords = [0.0; 3];
    for (slot, value) in coords.iter_mut().zip(&row.coords) {
        *slot = (*value)?;
    }
    Some(coords)
}

fn default_style(kind: PointKind) -> PointStyle {
    match kind {
        // Antigens: filled green circles. Sera: outline-only boxes.
        PointKind::Antigen => PointStyle::default(),
        PointKind::Serum => PointStyle {
            shape: Shape::Box,
            fill: crate::style::TRANSPARENT,
            outline: [0.0, 0.0, 0.0, 1.0],
            ..PointStyle::default()
        },
    }
}

fn build_style(row: &PointRow, kind: PointKind) -> PointStyle {
    let mut style = default_style(kind);
    if let Some(size) = row.size {
        style.size = size;
    }
    if let Some(width) = row.outline_width {
        style.outline_width = width;
    }
    if let Some(aspect) = row.aspect {
        style.aspect = aspect;
    }
    if let Some(fill) = &row.fill {
        match parse_color(fill) {
            Ok(color) => style.fill = color,
            Err(err) => log::warn!("{}: {err}; keeping default fill", row.name),
        }
    }
    if let Some(outline) = &row.outline {
        match parse_color(outline) {
            Ok(color) => style.outline = color,
            Err(err) => log::warn!("{}: {err}; keeping default outline", row.name),
        }
    }
    if let Some(shape) = &row.shape {
        match Shape::parse(shape) {
            Ok(shape) => style.shape = shape,
            Err(err) => log::warn!("{}: {err}; falling back to circle", row.name),
        }
    }
    style
}

#[cfg(test)]
mod load_tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r##"{
        "name": "demo",
        "antigens": [
            {"name": "AG1", "coords": [0.0, 0.0], "fill": "#ff0000", "shape": "CIRCLE"},
            {"name": "AG2", "coords": [null, 2.0], "shape": "blob"}
        ],
        "sera": [
            {"name": "SR1", "coords": [3.0, 0.0], "outline": "transparent", "shape": "BOX"}
        ],
        "titers": [["320"], ["*"]],
        "column_bases": [8.0],
        "draw_order": [2, 0, 1]
    }"##;

    #[test]
    fn sample_map_round_trips_through_the_loader() {
        let file: MapFile = serde_json::from_str(SAMPLE).expect("json");
        let map = map_from_file(file).expect("map");
        assert_eq!(map.antigen_count(), 2);
        assert_eq!(map.serum_count(), 1);
        assert_eq!(map.antigen(0).style.fill, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(map.draw_order(), &[2, 0, 1]);
        // Table distance 3 == map distance 3.
        assert_eq!(map.antigen(0).stress(), 0.0);
    }

    #[test]
    fn null_coordinates_hide_the_row_instead_of_failing() {
        let file: MapFile = serde_json::from_str(SAMPLE).expect("json");
        let map = map_from_file(file).expect("map");
        assert!(!map.antigen(1).visible());
        assert_eq!(map.antigen(1).stress(), 0.0);
    }

    #[test]
    fn unknown_shape_falls_back_to_circle() {
        let file: MapFile = serde_json::from_str(SAMPLE).expect("json");
        let map = map_from_file(file).expect("map");
        assert_eq!(map.antigen(1).style.shape, Shape::Circle);
    }

    #[test]
    fn ragged_titer_matrix_fails_the_load() {
        let raw = r##"{
            "antigens": [{"name": "AG1", "coords": [0.0, 0.0]}],
            "sera": [{"name": "SR1", "coords": [1.0, 0.0]}],
            "titers": [["40", "40"]]
        }"##;
        let file: MapFile = serde_json::from_str(raw).expect("json");
        assert!(map_from_file(file).is_err());
    }

    #[test]
    fn load_map_reads_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("demo.acmap.json");
        let mut handle = fs::File::create(&path).expect("create");
        handle.write_all(SAMPLE.as_bytes()).expect("write");
        drop(handle);
        let map = load_map(&path).expect("load");
        assert_eq!(map.len(), 3);
    }
}
