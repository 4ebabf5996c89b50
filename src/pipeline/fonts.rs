//! Standard-14 font metrics and WinAnsi text encoding.
//!
//! The document only uses the built-in PDF base fonts, so no font files are
//! embedded. Line breaking needs glyph advances, which come from the Adobe
//! AFM tables for the printable ASCII range; anything else falls back to a
//! typical lowercase width.

/// The four base fonts a report uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Font {
    Regular,
    Bold,
    Oblique,
    Mono,
}

impl Font {
    pub const ALL: [Font; 4] = [Font::Regular, Font::Bold, Font::Oblique, Font::Mono];

    /// Resource name used inside content streams.
    pub fn resource_name(self) -> &'static [u8] {
        match self {
            Font::Regular => b"F1",
            Font::Bold => b"F2",
            Font::Oblique => b"F3",
            Font::Mono => b"F4",
        }
    }

    /// PostScript name of the base font.
    pub fn base_font(self) -> &'static [u8] {
        match self {
            Font::Regular => b"Helvetica",
            Font::Bold => b"Helvetica-Bold",
            Font::Oblique => b"Helvetica-Oblique",
            Font::Mono => b"Courier",
        }
    }
}

/// Helvetica advances for U+0020..=U+007E, in 1/1000 em.
#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

/// Helvetica-Bold advances for U+0020..=U+007E, in 1/1000 em.
#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

const COURIER_ADVANCE: u16 = 600;

/// Advance width of `ch` in 1/1000 em.
pub fn char_width(font: Font, ch: char) -> u16 {
    if font == Font::Mono {
        return COURIER_ADVANCE;
    }
    let table = match font {
        Font::Bold => &HELVETICA_BOLD,
        _ => &HELVETICA,
    };
    match ch {
        ' '..='~' => table[ch as usize - 0x20],
        '\t' => table[0] * 4,
        '\u{2022}' => 350,
        '\u{2013}' => 556,
        '\u{2014}' | '\u{2026}' => 1000,
        '\u{2018}' | '\u{2019}' => 222,
        '\u{201C}' | '\u{201D}' => 333,
        _ => 556,
    }
}

/// Width of `text` set in `font` at `size` points.
pub fn text_width(text: &str, font: Font, size: f64) -> f64 {
    let units: u32 = text.chars().map(|c| char_width(font, c) as u32).sum();
    units as f64 * size / 1000.0
}

/// Break `text` into lines no wider than `max_width`.
///
/// Explicit newlines are kept, leading indentation of each source line is
/// preserved on its first output line, and words wider than the line are
/// broken between characters. Always returns at least one line.
pub fn wrap_text(text: &str, font: Font, size: f64, max_width: f64) -> Vec<String> {
    const EPS: f64 = 1e-6;
    let space = text_width(" ", font, size);
    let mut lines = Vec::new();

    for raw in text.split('\n') {
        let raw = raw.trim_end_matches('\r');
        let indent_len = raw.len() - raw.trim_start().len();
        let mut current = raw[..indent_len].replace('\t', "    ");
        let mut width = text_width(&current, font, size);
        if width > max_width {
            current.clear();
            width = 0.0;
        }
        let mut has_word = false;

        for word in raw.split_whitespace() {
            let word_width = text_width(word, font, size);
            let needed = if has_word { space + word_width } else { word_width };

            if width + needed <= max_width + EPS {
                if has_word {
                    current.push(' ');
                }
                current.push_str(word);
                width += needed;
                has_word = true;
                continue;
            }

            if has_word {
                lines.push(std::mem::take(&mut current));
                width = 0.0;
            }
            if word_width <= max_width + EPS {
                current.push_str(word);
                width = word_width;
            } else {
                // Hard-break an over-long token.
                for ch in word.chars() {
                    let w = char_width(font, ch) as f64 * size / 1000.0;
                    if width + w > max_width + EPS && !current.trim().is_empty() {
                        lines.push(std::mem::take(&mut current));
                        width = 0.0;
                    }
                    current.push(ch);
                    width += w;
                }
            }
            has_word = true;
        }
        lines.push(current);
    }
    lines
}

/// Encode `text` as WinAnsi (cp1252) bytes for a PDF string.
///
/// Unmappable characters become `?`; control characters become spaces.
pub fn encode_winansi(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for ch in text.chars() {
        let byte = match ch {
            '\u{0000}'..='\u{001F}' | '\u{007F}' => b' ',
            '\u{0020}'..='\u{007E}' => ch as u8,
            '\u{00A0}'..='\u{00FF}' => ch as u32 as u8,
            '\u{20AC}' => 0x80,
            '\u{201A}' => 0x82,
            '\u{0192}' => 0x83,
            '\u{201E}' => 0x84,
            '\u{2026}' => 0x85,
            '\u{2020}' => 0x86,
            '\u{2021}' => 0x87,
            '\u{02C6}' => 0x88,
            '\u{2030}' => 0x89,
            '\u{0160}' => 0x8A,
            '\u{2039}' => 0x8B,
            '\u{0152}' => 0x8C,
            '\u{017D}' => 0x8E,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{02DC}' => 0x98,
            '\u{2122}' => 0x99,
            '\u{0161}' => 0x9A,
            '\u{203A}' => 0x9B,
            '\u{0153}' => 0x9C,
            '\u{017E}' => 0x9E,
            '\u{0178}' => 0x9F,
            _ => b'?',
        };
        out.push(byte);
    }
    out
}
