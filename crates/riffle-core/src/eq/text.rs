//! EqualizerAPO-style text import and export
//!
//! ```text
//! Preamp: -6.0 dB
//! Filter 1: ON PK Fc 105 Hz Gain -3.5 dB Q 1.41
//! Filter 2: OFF LSC Fc 80 Hz Gain 4 dB Q 0.9
//! Filter: ON HPQ Fc 25 Hz Q 0.7
//! ```
//!
//! Lines that don't match the grammar are skipped. Parsing stops once
//! [`MAX_BANDS`] filters have been read.

use std::fmt::Write as _;

use super::band::{BandType, EqBand, MAX_BANDS, REFERENCE_Q};

/// Result of parsing an EQ description
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedEq {
    /// `Preamp:` value if the text had one
    pub preamp: Option<f32>,
    pub bands: Vec<EqBand>,
}

/// Parse a line-oriented EQ description
pub fn parse(text: &str) -> ParsedEq {
    let mut parsed = ParsedEq::default();

    for (line_no, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(preamp) = parse_preamp(line) {
            parsed.preamp = Some(preamp);
            continue;
        }

        match parse_filter(line) {
            Some(band) => {
                parsed.bands.push(band);
                if parsed.bands.len() == MAX_BANDS {
                    break;
                }
            }
            None => log::debug!("eq import: skipping line {}: {:?}", line_no + 1, line),
        }
    }

    parsed
}

/// Strip a case-insensitive keyword prefix
fn strip_keyword<'a>(s: &'a str, keyword: &str) -> Option<&'a str> {
    let head = s.get(..keyword.len())?;
    head.eq_ignore_ascii_case(keyword)
        .then(|| &s[keyword.len()..])
}

fn parse_number(token: Option<&str>) -> Option<f32> {
    token?.parse::<f32>().ok().filter(|v| v.is_finite())
}

/// `Preamp: <x> dB`
fn parse_preamp(line: &str) -> Option<f32> {
    let rest = strip_keyword(line, "Preamp")?.trim_start().strip_prefix(':')?;
    let mut tokens = rest.split_whitespace();
    let value = parse_number(tokens.next())?;
    match tokens.next() {
        None => Some(value),
        Some(unit) if unit.eq_ignore_ascii_case("dB") => Some(value),
        Some(_) => None,
    }
}

/// `Filter [n]: ON|OFF <CODE> Fc <f> Hz [Gain <g> dB] [Q <q>]`
fn parse_filter(line: &str) -> Option<EqBand> {
    let rest = strip_keyword(line, "Filter")?;
    let (label, body) = rest.split_once(':')?;
    if !label.trim().chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let mut tokens = body.split_whitespace();
    let enabled = match tokens.next()? {
        t if t.eq_ignore_ascii_case("ON") => true,
        t if t.eq_ignore_ascii_case("OFF") => false,
        _ => return None,
    };
    let band_type = BandType::from_code(tokens.next()?)?;

    let mut frequency = None;
    let mut gain = None;
    let mut q = None;
    while let Some(token) = tokens.next() {
        if token.eq_ignore_ascii_case("Fc") {
            frequency = Some(parse_number(tokens.next())?);
        } else if token.eq_ignore_ascii_case("Gain") {
            gain = Some(parse_number(tokens.next())?);
        } else if token.eq_ignore_ascii_case("Q") {
            q = Some(parse_number(tokens.next())?);
        } else if token.eq_ignore_ascii_case("Hz") || token.eq_ignore_ascii_case("dB") {
            continue;
        } else {
            return None;
        }
    }

    let frequency = frequency?;
    let (gain, q) = match band_type {
        BandType::Peaking => (gain?, q?),
        BandType::LowShelf | BandType::HighShelf => (gain?, q.unwrap_or(REFERENCE_Q)),
        BandType::LowPass | BandType::HighPass | BandType::Notch => {
            (gain.unwrap_or(0.0), q.unwrap_or(REFERENCE_Q))
        }
    };

    let mut band = EqBand::new(band_type, frequency, gain, q);
    band.enabled = enabled;
    Some(band)
}

/// Format `value` with at most `decimals` digits, trimming trailing zeros
fn number(value: f32, decimals: usize) -> String {
    let s = format!("{:.*}", decimals, value);
    let s = if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        &s
    };
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

/// Render preamp and bands in the import grammar
pub fn format(preamp: f32, bands: &[EqBand]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Preamp: {} dB", number(preamp, 2));
    for (i, band) in bands.iter().enumerate() {
        let _ = writeln!(
            out,
            "Filter {}: {} {} Fc {} Hz Gain {} dB Q {}",
            i + 1,
            if band.enabled { "ON" } else { "OFF" },
            band.band_type.code(),
            number(band.frequency, 1),
            number(band.gain, 2),
            number(band.q, 3),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_equalizer_apo_lines() {
        let text = "\
Preamp: -6.5 dB
Filter 1: ON PK Fc 105 Hz Gain -3.5 dB Q 1.41
Filter 2: OFF LSC Fc 80 Hz Gain 4 dB Q 0.9
Filter: ON HS Fc 9000 Hz Gain 2 dB
Filter 4: ON HPQ Fc 25 Hz Q 0.7
";
        let parsed = parse(text);
        assert_eq!(parsed.preamp, Some(-6.5));
        assert_eq!(parsed.bands.len(), 4);

        let pk = parsed.bands[0];
        assert_eq!(pk.band_type, BandType::Peaking);
        assert_eq!(pk.frequency, 105.0);
        assert_eq!(pk.gain, -3.5);
        assert_eq!(pk.q, 1.41);
        assert!(pk.enabled);

        assert!(!parsed.bands[1].enabled);
        assert_eq!(parsed.bands[2].q, REFERENCE_Q);
        assert_eq!(parsed.bands[3].band_type, BandType::HighPass);
    }

    #[test]
    fn test_non_matching_lines_are_skipped() {
        let text = "\
# comment
Device: Headphones
Filter 1: ON BP Fc 1000 Hz Q 2
Filter 2: ON PK Fc abc Hz Gain 1 dB Q 1
Filter 3: PK Fc 1000 Hz Gain 1 dB Q 1
Filter 4: ON PK Fc 1000 Hz Gain 1 dB
Filterx: ON PK Fc 1000 Hz Gain 1 dB Q 1
Filter 6: ON PK Fc 2000 Hz Gain 1 dB Q 1
";
        let parsed = parse(text);
        assert_eq!(parsed.preamp, None);
        assert_eq!(parsed.bands.len(), 1);
        assert_eq!(parsed.bands[0].frequency, 2000.0);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let parsed = parse("Filter 1: ON PK Fc 5 Hz Gain 30 dB Q 25");
        let band = parsed.bands[0];
        assert_eq!(band.frequency, 20.0);
        assert_eq!(band.gain, 12.0);
        assert_eq!(band.q, 10.0);
    }

    #[test]
    fn test_parsing_stops_at_ten_bands() {
        let text: String = (1..=14)
            .map(|i| format!("Filter {}: ON PK Fc {} Hz Gain 1 dB Q 1\n", i, i * 100))
            .collect();
        let parsed = parse(&text);
        assert_eq!(parsed.bands.len(), MAX_BANDS);
        assert_eq!(parsed.bands[9].frequency, 1000.0);
    }

    #[test]
    fn test_export_then_import() {
        let bands = vec![
            EqBand::peaking(105.0, -3.5, 1.41),
            EqBand::new(BandType::LowShelf, 80.0, 4.25, 0.9),
            EqBand::new(BandType::Notch, 3150.5, 0.0, 4.0),
            {
                let mut b = EqBand::new(BandType::HighShelf, 10000.0, -2.0, REFERENCE_Q);
                b.enabled = false;
                b
            },
        ];
        let text = format(-4.0, &bands);
        assert!(text.starts_with("Preamp: -4 dB\n"));
        assert!(text.contains("Filter 1: ON PK Fc 105 Hz Gain -3.5 dB Q 1.41"));

        let parsed = parse(&text);
        assert_eq!(parsed.preamp, Some(-4.0));
        assert_eq!(parsed.bands.len(), bands.len());
        for (a, b) in bands.iter().zip(&parsed.bands) {
            assert_eq!(a.band_type, b.band_type);
            assert_eq!(a.enabled, b.enabled);
            assert!((a.frequency - b.frequency).abs() < 0.05);
            assert!((a.gain - b.gain).abs() < 0.005);
            assert!((a.q - b.q).abs() < 0.0005);
        }
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(number(105.0, 1), "105");
        assert_eq!(number(-0.001, 2), "0");
        assert_eq!(number(0.70710677, 3), "0.707");
    }
}
