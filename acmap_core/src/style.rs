use thiserror::Error;

/// RGBA color in linear 0..1 components, matching the instance layout the
/// renderer uploads.
pub type Rgba = [f32; 4];

/// Sentinel used for "transparent" fills/outlines: the shader skips any
/// layer whose alpha is zero.
pub const TRANSPARENT: Rgba = [0.0, 0.0, 0.0, 0.0];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StyleError {
    #[error("unknown shape name {0:?}")]
    UnknownShape(String),
    #[error("unknown color {0:?}")]
    UnknownColor(String),
    #[error("invalid hex color {0:?}")]
    BadHex(String),
}

/// Marker shapes understood by the rasterizer. `Arrowhead` is not a loadable
/// point shape; the renderer substitutes it for points clamped to the
/// viewport edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Circle,
    Box,
    Triangle,
    Egg,
    UglyEgg,
    Arrowhead,
}

impl Shape {
    /// Numeric shape code consumed by the fragment shader's shape switch.
    pub fn as_code(self) -> f32 {
        match self {
            Shape::Circle => 0.0,
            Shape::Box => 1.0,
            Shape::Triangle => 2.0,
            Shape::Egg => 3.0,
            Shape::UglyEgg => 4.0,
            Shape::Arrowhead => 5.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Shape::Circle => "circle",
            Shape::Box => "box",
            Shape::Triangle => "triangle",
            Shape::Egg => "egg",
            Shape::UglyEgg => "uglyegg",
            Shape::Arrowhead => "arrowhead",
        }
    }

    /// Resolves a logical shape name from a map file. Names are matched
    /// case-insensitively; `BOX` and `RECTANGLE` are aliases.
    pub fn parse(name: &str) -> Result<Shape, StyleError> {
        match name.trim().to_ascii_uppercase().as_str() {
            "CIRCLE" => Ok(Shape::Circle),
            "BOX" | "RECTANGLE" | "SQUARE" => Ok(Shape::Box),
            "TRIANGLE" => Ok(Shape::Triangle),
            "EGG" => Ok(Shape::Egg),
            "UGLYEGG" => Ok(Shape::UglyEgg),
            _ => Err(StyleError::UnknownShape(name.to_string())),
        }
    }
}

/// Resolves a color descriptor: `#rgb`, `#rrggbb`, `#rrggbbaa`, a small set
/// of named colors the map files actually use, or the `transparent`
/// sentinel.
pub fn parse_color(descriptor: &str) -> Result<Rgba, StyleError> {
    let trimmed = descriptor.trim();
    if let Some(hex) = trimmed.strip_prefix('#') {
        return parse_hex(trimmed, hex);
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "transparent" | "none" => Ok(TRANSPARENT),
        "black" => Ok([0.0, 0.0, 0.0, 1.0]),
        "white" => Ok([1.0, 1.0, 1.0, 1.0]),
        "red" => Ok([1.0, 0.0, 0.0, 1.0]),
        "green" => Ok([0.0, 0.5, 0.0, 1.0]),
        "blue" => Ok([0.0, 0.0, 1.0, 1.0]),
        "grey" | "gray" => Ok([0.5, 0.5, 0.5, 1.0]),
        "orange" => Ok([1.0, 0.65, 0.0, 1.0]),
        "yellow" => Ok([1.0, 1.0, 0.0, 1.0]),
        _ => Err(StyleError::UnknownColor(descriptor.to_string())),
    }
}

fn parse_hex(original: &str, hex: &str) -> Result<Rgba, StyleError> {
    let bad = || StyleError::BadHex(original.to_string());
    let channel = |pair: &str| u8::from_str_radix(pair, 16).map_err(|_| bad());
    let expand = |nibble: &str| {
        u8::from_str_radix(nibble, 16)
            .map(|v| v * 0x11)
            .map_err(|_| bad())
    };

    let bytes = match hex.len() {
        3 => [
            expand(&hex[0..1])?,
            expand(&hex[1..2])?,
            expand(&hex[2..3])?,
            255,
        ],
        6 => [
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
            255,
        ],
        8 => [
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
            channel(&hex[6..8])?,
        ],
        _ => return Err(bad()),
    };
    Ok([
        bytes[0] as f32 / 255.0,
        bytes[1] as f32 / 255.0,
        bytes[2] as f32 / 255.0,
        bytes[3] as f32 / 255.0,
    ])
}

pub fn is_transparent(color: Rgba) -> bool {
    color[3] <= 0.0
}

#[cfg(test)]
mod shape_tests {
    use super::*;

    #[test]
    fn shape_names_resolve_case_insensitively() {
        assert_eq!(Shape::parse("circle"), Ok(Shape::Circle));
        assert_eq!(Shape::parse("BOX"), Ok(Shape::Box));
        assert_eq!(Shape::parse("Rectangle"), Ok(Shape::Box));
        assert_eq!(Shape::parse("UGLYEGG"), Ok(Shape::UglyEgg));
    }

    #[test]
    fn unknown_shape_is_a_validation_error() {
        assert_eq!(
            Shape::parse("blob"),
            Err(StyleError::UnknownShape("blob".to_string()))
        );
    }

    #[test]
    fn shape_codes_are_distinct() {
        let codes = [
            Shape::Circle,
            Shape::Box,
            Shape::Triangle,
            Shape::Egg,
            Shape::UglyEgg,
            Shape::Arrowhead,
        ]
        .map(Shape::as_code);
        for (i, a) in codes.iter().enumerate() {
            for b in codes.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}

#[cfg(test)]
mod color_tests {
    use super::*;

    #[test]
    fn hex_colors_parse_in_all_widths() {
        assert_eq!(parse_color("#ff0000").expect("6-digit"), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(parse_color("#f00").expect("3-digit"), [1.0, 0.0, 0.0, 1.0]);
        let rgba = parse_color("#00ff0080").expect("8-digit");
        assert_eq!(rgba[1], 1.0);
        assert!((rgba[3] - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn transparent_sentinel_maps_to_zero_alpha() {
        let color = parse_color("transparent").expect("sentinel");
        assert!(is_transparent(color));
    }

    #[test]
    fn malformed_hex_is_rejected() {
        assert!(matches!(parse_color("#12345"), Err(StyleError::BadHex(_))));
        assert!(matches!(parse_color("#zzzzzz"), Err(StyleError::BadHex(_))));
    }
}
