//! Decodes one completed curve record into calibrated samples.

/// Parse an ASCII comma-separated curve record into physical units.
///
/// Each field is a base-10 raw code converted as `raw / scale_factor`.
/// A non-numeric field decodes to zero: a garbled record degrades to noisy
/// samples instead of aborting the run, since the instrument will not
/// resend. At most `max_samples` fields are decoded; anything past that is
/// ignored. A single empty field left by a terminating comma is not a
/// sample.
pub fn decode_curve(record: &[u8], max_samples: usize, scale_factor: f32) -> Vec<f32> {
    let mut samples = Vec::with_capacity(max_samples.min(record.len() / 2 + 1));
    let mut fields = record.split(|&byte| byte == b',').peekable();
    while let Some(field) = fields.next() {
        if samples.len() == max_samples {
            break
        }
        if field.is_empty() && fields.peek().is_none() {
            break
        }
        let raw = std::str::from_utf8(field)
            .ok()
            .and_then(|field| field.trim().parse::<i64>().ok())
            .unwrap_or(0);
        samples.push(raw as f32 / scale_factor);
    }
    samples
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::SAMPLE_DEPTH;
    use crate::params::{ChannelParameters, VoltsPerDiv};

    fn scale(num: u32, den: u32) -> f32 {
        ChannelParameters {
            volts_per_div: VoltsPerDiv::new(num, den),
            ..Default::default()
        }.scale_factor()
    }

    fn assert_close(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len(), "{:?} vs {:?}", actual, expected);
        for (&a, &e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-5, "{:?} vs {:?}", actual, expected);
        }
    }

    #[test]
    fn test_worked_example() {
        // 2 V/div makes the divisor 12.8.
        let samples = decode_curve(b"12,34,256,0", SAMPLE_DEPTH, scale(2, 1));
        assert_close(&samples, &[0.9375, 2.65625, 20.0, 0.0]);
    }

    #[test]
    fn test_boundary_codes() {
        let samples = decode_curve(b"0,255", SAMPLE_DEPTH, scale(1, 1));
        assert_close(&samples, &[0.0, 255.0 / 25.6]);
    }

    #[test]
    fn test_truncates_at_max_samples() {
        let record = (0..3000).map(|_| "1").collect::<Vec<_>>().join(",");
        let samples = decode_curve(record.as_bytes(), SAMPLE_DEPTH, scale(2, 1));
        assert_eq!(samples.len(), SAMPLE_DEPTH);
    }

    #[test]
    fn test_short_record() {
        let samples = decode_curve(b"7", SAMPLE_DEPTH, scale(2, 1));
        assert_eq!(samples.len(), 1);
    }

    #[test]
    fn test_empty_record() {
        assert!(decode_curve(b"", SAMPLE_DEPTH, scale(2, 1)).is_empty());
    }

    #[test]
    fn test_non_numeric_field_decodes_to_zero() {
        let samples = decode_curve(b"12,garbage,34", SAMPLE_DEPTH, scale(2, 1));
        assert_close(&samples, &[0.9375, 0.0, 2.65625]);
        // field order does not matter
        let samples = decode_curve(b"garbage,12,34", SAMPLE_DEPTH, scale(2, 1));
        assert_close(&samples, &[0.0, 0.9375, 2.65625]);
    }

    #[test]
    fn test_interior_empty_field_is_a_zero_sample() {
        let samples = decode_curve(b"12,,34", SAMPLE_DEPTH, scale(2, 1));
        assert_close(&samples, &[0.9375, 0.0, 2.65625]);
    }

    #[test]
    fn test_terminating_comma_is_not_a_sample() {
        // Comma-framed records arrive with the delimiter still attached.
        let samples = decode_curve(b"12,34,", SAMPLE_DEPTH, scale(2, 1));
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn test_volts_per_div_fraction() {
        // 1/2 V/div doubles the divisor to 51.2.
        let samples = decode_curve(b"256", SAMPLE_DEPTH, scale(1, 2));
        assert_close(&samples, &[5.0]);
    }
}
