//! Color helpers: hex parsing/normalization, shading, and stable route colors.

#[cfg(test)]
#[path = "color_test.rs"]
mod color_test;

/// Palette used for routes that carry no explicit color.
pub const ROUTE_PALETTE: [&str; 8] = [
    "#0176de", "#e0542f", "#2e9e5b", "#8e44ad", "#d4a017", "#16a2b8", "#c2185b", "#5d6d7e",
];

/// Parse `#RGB` or `#RRGGBB` values into RGB channels.
#[must_use]
pub fn parse_hex_rgb(raw: &str) -> Option<(u8, u8, u8)> {
    let hex = raw.trim().strip_prefix('#')?;
    match hex.len() {
        3 => {
            let r = channel(&hex.get(0..1)?.repeat(2))?;
            let g = channel(&hex.get(1..2)?.repeat(2))?;
            let b = channel(&hex.get(2..3)?.repeat(2))?;
            Some((r, g, b))
        }
        6 => {
            let r = channel(hex.get(0..2)?)?;
            let g = channel(hex.get(2..4)?)?;
            let b = channel(hex.get(4..6)?)?;
            Some((r, g, b))
        }
        _ => None,
    }
}

fn channel(pair: &str) -> Option<u8> {
    u8::from_str_radix(pair, 16).ok()
}

/// Normalize a color to canonical lowercase `#rrggbb`.
#[must_use]
pub fn normalize_hex_color(value: &str, fallback: &str) -> String {
    let fallback_rgb = parse_hex_rgb(fallback).unwrap_or((1, 118, 222));
    let (r, g, b) = parse_hex_rgb(value).unwrap_or(fallback_rgb);
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// Darken a color by `percent` (negative lightens toward white).
///
/// Unparseable input shades the fallback blue.
#[must_use]
pub fn shade(value: &str, percent: f64) -> String {
    let (r, g, b) = parse_hex_rgb(value).unwrap_or((1, 118, 222));
    let f = (percent / 100.0).clamp(-1.0, 1.0);
    let apply = |c: u8| -> u8 {
        let c = f64::from(c);
        let out = if f >= 0.0 { c * (1.0 - f) } else { c + (255.0 - c) * -f };
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let byte = out.round().clamp(0.0, 255.0) as u8;
        byte
    };
    format!("#{:02x}{:02x}{:02x}", apply(r), apply(g), apply(b))
}

/// 32-bit FNV-1a. Stable across processes and releases, unlike `std`'s hasher.
#[must_use]
pub fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for b in bytes {
        hash ^= u32::from(*b);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// Deterministic palette color for an id.
#[must_use]
pub fn palette_color(id: &str) -> &'static str {
    let idx = fnv1a(id.as_bytes()) as usize % ROUTE_PALETTE.len();
    ROUTE_PALETTE[idx]
}
