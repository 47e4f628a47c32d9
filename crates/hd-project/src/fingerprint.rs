//! Content fingerprint of a drawing.

use hd_document::{Drawing, ParseError};
use sha2::{Digest, Sha256};

/// SHA-256 of the canonical JSON form. Object keys serialize sorted, so two
/// drawings with equal content share a fingerprint regardless of the key
/// order they were read in.
pub fn fingerprint(drawing: &Drawing) -> Result<String, ParseError> {
    let canonical = serde_json::to_vec(drawing).map_err(ParseError::from)?;
    Ok(format!("{:x}", Sha256::digest(&canonical)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hd_document::parse;

    const A: &str = r#"{"version":9,"metadata":{"units":{"lengthMeasurementSystem":"METRIC","volumeMeasurementSystem":"METRIC","velocityMeasurementSystem":"METRIC","pressureMeasurementSystem":"METRIC","temperatureMeasurementSystem":"METRIC"},"flowSystems":[],"catalog":{},"priceTable":{}},"levels":{},"shared":{}}"#;
    const B: &str = r#"{"shared":{},"levels":{},"metadata":{"priceTable":{},"catalog":{},"flowSystems":[],"units":{"temperatureMeasurementSystem":"METRIC","pressureMeasurementSystem":"METRIC","velocityMeasurementSystem":"METRIC","volumeMeasurementSystem":"METRIC","lengthMeasurementSystem":"METRIC"}},"version":9}"#;

    #[test]
    fn key_order_does_not_matter() {
        let a = fingerprint(&parse(A).unwrap()).unwrap();
        let b = fingerprint(&parse(B).unwrap()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn content_changes_fingerprint() {
        let mut drawing = parse(A).unwrap();
        let before = fingerprint(&drawing).unwrap();
        drawing.metadata.available_fixtures.push("basin".into());
        assert_ne!(before, fingerprint(&drawing).unwrap());
    }
}
