pub mod load;
pub mod map;
pub mod point;
pub mod stress;
pub mod style;
pub mod titer;

pub use load::{MapFile, PointRow, load_map, map_from_file};
pub use map::{AntigenicMap, LineSegment, SelectionMode};
pub use point::{Point, PointKind, PointStyle};
pub use style::{Rgba, Shape, StyleError, TRANSPARENT, parse_color};
pub use stress::{ResidualSide, map_distance, pair_stress, residual, table_distance};
pub use titer::{Titer, TiterError, TiterTable};
