//! Display-update report format of the Ocypus Iota L36 panel.

use serde::{Deserialize, Serialize};

use crate::sensors::{TemperatureSample, TemperatureUnit};

/// Length of every output report the panel accepts.
pub const REPORT_LEN: usize = 64;

/// Fixed byte positions of one firmware's display report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportLayout {
    pub report_id: u8,
    pub header: [u8; 2],
    pub header_offset: usize,
    /// First of three digit bytes: hundreds, tens, ones.
    pub digits_offset: usize,
    pub unit_flag_offset: Option<usize>,
    pub celsius_flag: u8,
    pub fahrenheit_flag: u8,
    pub display_min: i64,
    pub display_max: i64,
}

impl ReportLayout {
    /// L36 layout with the unit icon byte.
    pub const L36: ReportLayout = ReportLayout {
        report_id: 0x07,
        header: [0xFF, 0xFF],
        header_offset: 1,
        digits_offset: 3,
        unit_flag_offset: Some(6),
        celsius_flag: 0x01,
        fahrenheit_flag: 0x02,
        display_min: 0,
        display_max: 212,
    };

    /// L36 layout for firmware that ignores the unit icon byte.
    pub const L36_DIGITS_ONLY: ReportLayout = ReportLayout {
        unit_flag_offset: None,
        ..ReportLayout::L36
    };
}

/// Selectable protocol tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProtocolRevision {
    #[default]
    L36,
    L36DigitsOnly,
}

impl ProtocolRevision {
    pub fn layout(self) -> &'static ReportLayout {
        match self {
            ProtocolRevision::L36 => &ReportLayout::L36,
            ProtocolRevision::L36DigitsOnly => &ReportLayout::L36_DIGITS_ONLY,
        }
    }
}

/// One complete HID output report.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputReport([u8; REPORT_LEN]);

impl OutputReport {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn report_id(&self) -> u8 {
        self.0[0]
    }

    /// Digit bytes as laid out by `layout`.
    pub fn digits(&self, layout: &ReportLayout) -> [u8; 3] {
        let at = layout.digits_offset;
        [self.0[at], self.0[at + 1], self.0[at + 2]]
    }

    pub fn unit_flag(&self, layout: &ReportLayout) -> Option<u8> {
        layout.unit_flag_offset.map(|at| self.0[at])
    }
}

/// Builds display reports from samples using one layout table.
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    layout: &'static ReportLayout,
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new(&ReportLayout::L36)
    }
}

impl FrameEncoder {
    pub fn new(layout: &'static ReportLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &'static ReportLayout {
        self.layout
    }

    /// Converts, rounds, clamps and packs `sample` for display in `target`.
    pub fn encode(&self, sample: &TemperatureSample, target: TemperatureUnit) -> OutputReport {
        let degrees = display_degrees(i64::from(sample.millidegrees()), sample.unit(), target);
        self.pack(degrees, Some(target))
    }

    /// Frame written while probing candidate interfaces.
    pub fn probe(&self) -> OutputReport {
        self.pack(0, Some(TemperatureUnit::Celsius))
    }

    /// Frame that turns the readout off: report id, everything else zero.
    pub fn blank(&self) -> OutputReport {
        let mut buf = [0u8; REPORT_LEN];
        buf[0] = self.layout.report_id;
        OutputReport(buf)
    }

    fn pack(&self, degrees: i64, unit: Option<TemperatureUnit>) -> OutputReport {
        let layout = self.layout;
        let value = degrees.clamp(layout.display_min, layout.display_max) as u16;

        let mut buf = [0u8; REPORT_LEN];
        buf[0] = layout.report_id;
        buf[layout.header_offset..layout.header_offset + 2].copy_from_slice(&layout.header);
        buf[layout.digits_offset] = (value / 100 % 10) as u8;
        buf[layout.digits_offset + 1] = (value / 10 % 10) as u8;
        buf[layout.digits_offset + 2] = (value % 10) as u8;

        if let (Some(at), Some(unit)) = (layout.unit_flag_offset, unit) {
            buf[at] = match unit {
                TemperatureUnit::Celsius => layout.celsius_flag,
                TemperatureUnit::Fahrenheit => layout.fahrenheit_flag,
            };
        }

        OutputReport(buf)
    }
}

/// Encodes with the default L36 layout.
pub fn encode(sample: &TemperatureSample, target: TemperatureUnit) -> OutputReport {
    FrameEncoder::default().encode(sample, target)
}

/// Whole degrees in `target`, rounded half away from zero.
///
/// Integer arithmetic on milli-degrees keeps the conversion exact.
pub fn display_degrees(millidegrees: i64, from: TemperatureUnit, target: TemperatureUnit) -> i64 {
    use TemperatureUnit::*;

    match (from, target) {
        (Celsius, Celsius) | (Fahrenheit, Fahrenheit) => div_round(millidegrees, 1000),
        // F = C * 9/5 + 32  =>  1000 F = (9 mC + 160_000) / 5
        (Celsius, Fahrenheit) => div_round(millidegrees * 9 + 160_000, 5000),
        // C = (F - 32) * 5/9  =>  1000 C = 5 (mF - 32_000) / 9
        (Fahrenheit, Celsius) => div_round((millidegrees - 32_000) * 5, 9000),
    }
}

fn div_round(n: i64, d: i64) -> i64 {
    if n >= 0 {
        (n + d / 2) / d
    } else {
        -((-n + d / 2) / d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn celsius(milli: i64) -> TemperatureSample {
        TemperatureSample::celsius(milli, "k10temp").unwrap()
    }

    #[test]
    fn celsius_report_bytes() {
        let report = encode(&celsius(45_000), TemperatureUnit::Celsius);
        let bytes = report.as_bytes();

        assert_eq!(bytes.len(), REPORT_LEN);
        assert_eq!(&bytes[..7], &[0x07, 0xFF, 0xFF, 0, 4, 5, 0x01]);
        assert!(bytes[7..].iter().all(|&b| b == 0));
    }

    #[test]
    fn fahrenheit_report_shows_three_digits() {
        let layout = &ReportLayout::L36;
        let report = encode(&celsius(45_000), TemperatureUnit::Fahrenheit);

        assert_eq!(report.digits(layout), [1, 1, 3]);
        assert_eq!(report.unit_flag(layout), Some(layout.fahrenheit_flag));
    }

    #[test]
    fn conversion_reference_points() {
        use TemperatureUnit::*;
        assert_eq!(display_degrees(0, Celsius, Fahrenheit), 32);
        assert_eq!(display_degrees(100_000, Celsius, Fahrenheit), 212);
        assert_eq!(display_degrees(45_000, Celsius, Fahrenheit), 113);
        assert_eq!(display_degrees(212_000, Fahrenheit, Celsius), 100);
        assert_eq!(display_degrees(-40_000, Celsius, Fahrenheit), -40);
    }

    #[test]
    fn rounding_ties_go_away_from_zero() {
        use TemperatureUnit::*;
        assert_eq!(display_degrees(44_500, Celsius, Celsius), 45);
        assert_eq!(display_degrees(44_499, Celsius, Celsius), 44);
        assert_eq!(display_degrees(-2_500, Celsius, Celsius), -3);
        // 0.5 °C -> 32.9 °F, -18 °C -> -0.4 °F
        assert_eq!(display_degrees(500, Celsius, Fahrenheit), 33);
        assert_eq!(display_degrees(-18_000, Celsius, Fahrenheit), 0);
    }

    #[test]
    fn freezing_point_matches_native_fahrenheit_sample() {
        let converted = encode(&celsius(0), TemperatureUnit::Fahrenheit);
        let native = encode(
            &TemperatureSample::new(32_000, TemperatureUnit::Fahrenheit, "k10temp").unwrap(),
            TemperatureUnit::Fahrenheit,
        );
        assert_eq!(converted, native);
    }

    #[test]
    fn negative_readings_clamp_to_zero() {
        let report = encode(&celsius(-15_000), TemperatureUnit::Celsius);
        assert_eq!(report.digits(&ReportLayout::L36), [0, 0, 0]);
    }

    #[test]
    fn hot_fahrenheit_clamps_to_display_max() {
        let layout = &ReportLayout::L36;
        let a = encode(&celsius(120_000), TemperatureUnit::Fahrenheit);
        let b = encode(&celsius(150_000), TemperatureUnit::Fahrenheit);

        assert_eq!(a.digits(layout), [2, 1, 2]);
        assert_eq!(a, b);
    }

    #[test]
    fn digits_only_layout_leaves_flag_byte_zero() {
        let encoder = FrameEncoder::new(ProtocolRevision::L36DigitsOnly.layout());
        let report = encoder.encode(&celsius(45_000), TemperatureUnit::Fahrenheit);

        assert_eq!(&report.as_bytes()[..7], &[0x07, 0xFF, 0xFF, 1, 1, 3, 0]);
        assert_eq!(report.unit_flag(encoder.layout()), None);
    }

    #[test]
    fn blank_and_probe_frames() {
        let encoder = FrameEncoder::default();
        let blank = encoder.blank();
        assert_eq!(blank.report_id(), 0x07);
        assert!(blank.as_bytes()[1..].iter().all(|&b| b == 0));

        let probe = encoder.probe();
        assert_eq!(&probe.as_bytes()[..6], &[0x07, 0xFF, 0xFF, 0, 0, 0]);
        assert_eq!(probe.as_bytes().len(), REPORT_LEN);
    }

    #[test]
    fn protocol_revision_parses_from_yaml() {
        let rev: ProtocolRevision = serde_yaml::from_str("l36-digits-only").unwrap();
        assert_eq!(rev, ProtocolRevision::L36DigitsOnly);
    }

    proptest! {
        #[test]
        fn report_is_always_full_length(
            milli in -20_000i64..=150_000,
            fahrenheit in any::<bool>(),
        ) {
            let unit = if fahrenheit {
                TemperatureUnit::Fahrenheit
            } else {
                TemperatureUnit::Celsius
            };
            let report = encode(&celsius(milli), unit);
            prop_assert_eq!(report.as_bytes().len(), REPORT_LEN);
            prop_assert!(report.as_bytes()[7..].iter().all(|&b| b == 0));
        }

        #[test]
        fn encoding_is_deterministic(milli in -20_000i64..=150_000) {
            let sample = celsius(milli);
            prop_assert_eq!(
                encode(&sample, TemperatureUnit::Fahrenheit),
                encode(&sample, TemperatureUnit::Fahrenheit)
            );
        }

        #[test]
        fn digits_reassemble_to_clamped_value(milli in -20_000i64..=150_000) {
            let layout = &ReportLayout::L36;
            let [h, t, o] = encode(&celsius(milli), TemperatureUnit::Fahrenheit).digits(layout);
            let shown = i64::from(h) * 100 + i64::from(t) * 10 + i64::from(o);
            let expected =
                display_degrees(milli, TemperatureUnit::Celsius, TemperatureUnit::Fahrenheit)
                    .clamp(layout.display_min, layout.display_max);
            prop_assert_eq!(shown, expected);
        }
    }
}
