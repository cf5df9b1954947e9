use std::collections::HashMap;

/// Colour used for keys that do not parse.
pub const FALLBACK_RGB: [f32; 3] = [1.0, 1.0, 1.0];

/// Parses `#RRGGBB`, `RRGGBB`, `0xRRGGBB` or `#RGB` (any case) into bytes.
pub fn parse_color_key(key: &str) -> Option<[u8; 3]> {
    let key = key.trim();
    let hex = key
        .strip_prefix('#')
        .or_else(|| key.strip_prefix("0x"))
        .or_else(|| key.strip_prefix("0X"))
        .unwrap_or(key);

    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        6 => Some([channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?]),
        3 => {
            let short = |i: usize| channel(&hex[i..i + 1]).map(|v| v * 17);
            Some([short(0)?, short(1)?, short(2)?])
        }
        _ => None,
    }
}

/// Memoized colour key → normalized RGB.
///
/// Entries are never evicted: the cache grows with the number of distinct
/// colours in use, not with geometry size.
#[derive(Debug, Default)]
pub struct ColorCache {
    entries: HashMap<String, [f32; 3]>,
}

impl ColorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalized `[0, 1]` RGB for `key`.
    ///
    /// Unparseable keys resolve to [`FALLBACK_RGB`] and are reported once.
    pub fn rgb(&mut self, key: &str) -> [f32; 3] {
        if let Some(rgb) = self.entries.get(key) {
            return *rgb;
        }

        let rgb = match parse_color_key(key) {
            Some([r, g, b]) => [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0],
            None => {
                log::warn!("unrecognized colour key {key:?}; packing as white");
                FALLBACK_RGB
            }
        };
        self.entries.insert(key.to_owned(), rgb);
        rgb
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
