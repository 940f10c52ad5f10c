//! Text layout of the archival manifest
//!
//! The column order of both record sections is read positionally by the
//!  importer; new columns may only ever be appended.

use std::fmt::Write as _;

use common::documents::{millis_to_secs, AudioAttachment, RiffRecord, StemRecord};

use crate::version::OUROVEON_FORMAT_VERSION;

const ROOT_NAMES: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
];

const SCALE_NAMES: [&str; 18] = [
    "major",
    "dorian",
    "phrygian",
    "lydian",
    "mixoly",
    "minor",
    "locrian",
    "minor_pent",
    "major_pent",
    "susp_pent",
    "blues_mnr_p",
    "blues_mjr_p",
    "harmonic_mnr",
    "melodic_mnr",
    "dbl_harmonic",
    "blues",
    "whole",
    "chromatic",
];

const UNKNOWN_NAME: &str = "unknown";

pub const RIFF_SCHEMA: &str = "# couch ID, user, creation unix time, root index, root name, scale index, scale name, BPS (float), BPS (hex float), BPM (float), BPM (hex float), bar length, app version, 8x [ stem couch ID, stem gain (float), stem gain (hex float), stem enabled ]";

pub const STEM_SCHEMA: &str = "# couch ID, file endpoint, file bucket, file key, file MIME, file length in bytes, sample rate, creation unix time, preset, user, colour hex, BPS (float), BPS (hex float), BPM (float), BPM (hex float), length 16ths, original pitch, bar length, is-drum, is-note, is-bass, is-mic";

pub fn root_name(index: u32) -> &'static str {
    ROOT_NAMES
        .get(index as usize)
        .copied()
        .unwrap_or(UNKNOWN_NAME)
}

pub fn scale_name(index: u32) -> &'static str {
    SCALE_NAMES
        .get(index as usize)
        .copied()
        .unwrap_or(UNKNOWN_NAME)
}

/// Beats per second to beats per minute, rounded up to two decimals
pub fn bps_to_rounded_bpm(bps: f64) -> f64 {
    ((bps * 60.0) * 100.0).ceil() / 100.0
}

/// Fixed six-decimal rendering
pub fn decimal(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        format!("{:.6}", value)
    }
}

/// Shortest exact hexadecimal rendering, `0x1.8p+00` style.
///
/// The importer reads these back bit-for-bit, so the digits are exactly
///  the significand with trailing zero nibbles dropped and the exponent
///  is at least two digits wide.
pub fn hex_float(value: f64) -> String {
    const MANT_BITS: u32 = 52;
    const EXP_BITS: u32 = 11;
    const BIAS: i32 = -1023;
    const HEX: &[u8; 16] = b"0123456789abcdef";

    let bits = value.to_bits();
    let negative = bits >> (EXP_BITS + MANT_BITS) != 0;
    let raw_exp = ((bits >> MANT_BITS) & ((1 << EXP_BITS) - 1)) as i32;
    let mut mant = bits & ((1u64 << MANT_BITS) - 1);

    let mut exp = raw_exp;
    if raw_exp == (1 << EXP_BITS) - 1 {
        return if mant != 0 {
            "NaN".to_string()
        } else if negative {
            "-Inf".to_string()
        } else {
            "+Inf".to_string()
        };
    } else if raw_exp == 0 {
        // subnormal
        exp += 1;
    } else {
        mant |= 1u64 << MANT_BITS;
    }
    exp += BIAS;

    if mant == 0 {
        exp = 0;
    }

    // leading one at bit 60
    mant <<= 60 - MANT_BITS;
    while mant != 0 && mant & (1u64 << 60) == 0 {
        mant <<= 1;
        exp -= 1;
    }

    let mut out = String::with_capacity(24);
    if negative {
        out.push('-');
    }
    out.push_str("0x");
    out.push(if (mant >> 60) & 1 == 1 { '1' } else { '0' });

    mant <<= 4;
    if mant != 0 {
        out.push('.');
        while mant != 0 {
            out.push(HEX[((mant >> 60) & 0xf) as usize] as char);
            mant <<= 4;
        }
    }

    out.push('p');
    if exp < 0 {
        out.push('-');
        exp = -exp;
    } else {
        out.push('+');
    }
    let _ = write!(out, "{:02}", exp);
    out
}

/// Quote a string for a double-quoted manifest field
pub fn quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Header lines, each newline terminated
pub fn header(server_prefix: &str, export_time_unix: i64, display_name: &str, export_id: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# export from COSM private server '{}'", server_prefix);
    let _ = writeln!(out, "export_time_unix: {}", export_time_unix);
    let _ = writeln!(out, "export_ouroveon_version: {}", quoted(OUROVEON_FORMAT_VERSION));
    let _ = writeln!(
        out,
        "jam_name: {}",
        quoted(&format!("[{}] {}", server_prefix, display_name))
    );
    let _ = writeln!(out, "jam_couch_id: {}", quoted(export_id));
    out
}

pub fn riff_section_header() -> String {
    format!("# riffs schema\n{}\nriffs:\n", RIFF_SCHEMA)
}

pub fn stem_section_header() -> String {
    format!("# stems schema\n{}\nstems:\n", STEM_SCHEMA)
}

/// One riff, newline terminated
pub fn riff_line(riff: &RiffRecord) -> String {
    let bps = riff.bps();
    let bpm = bps_to_rounded_bpm(bps);

    let mut out = String::with_capacity(512);
    let _ = write!(out, " {}: [", quoted(&riff.id));
    let _ = write!(
        out,
        "{}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, ",
        quoted(&riff.user_name),
        millis_to_secs(riff.created),
        riff.root,
        quoted(root_name(riff.root)),
        riff.scale,
        quoted(scale_name(riff.scale)),
        decimal(bps),
        quoted(&hex_float(bps)),
        decimal(bpm),
        quoted(&hex_float(bpm)),
        riff.bar_length(),
        riff.app_version,
    );

    for slot in riff.slots() {
        // disabled slots keep their stem in the document but export empty
        let stem_id = if slot.enabled() { slot.stem_id() } else { "" };
        let _ = write!(
            out,
            "[ {}, {}, {}, {} ], ",
            quoted(stem_id),
            decimal(slot.gain),
            quoted(&hex_float(slot.gain)),
            slot.enabled(),
        );
    }

    let _ = writeln!(out, " {} ]", decimal(riff.magnitude));
    out
}

/// One stem, newline terminated
pub fn stem_line(stem: &StemRecord) -> String {
    let empty = AudioAttachment::default();
    let attachment = stem.active_attachment().unwrap_or(&empty);
    let bpm = bps_to_rounded_bpm(stem.bps);

    let mut out = String::with_capacity(512);
    let _ = write!(out, " {}: [", quoted(&stem.id));
    let _ = writeln!(
        out,
        "{}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {} ]",
        quoted(&attachment.endpoint),
        quoted(""),
        quoted(&attachment.key),
        quoted(&attachment.mime),
        attachment.length,
        stem.sample_rate as i32,
        millis_to_secs(stem.created),
        quoted(&stem.preset_name),
        quoted(&stem.creator_user_name),
        quoted(&stem.primary_colour),
        decimal(stem.bps),
        quoted(&hex_float(stem.bps)),
        decimal(bpm),
        quoted(&hex_float(bpm)),
        stem.length_16ths,
        stem.original_pitch as i32,
        stem.bar_length,
        stem.is_drum,
        stem.is_note,
        stem.is_bass,
        stem.is_mic,
    );
    out
}
