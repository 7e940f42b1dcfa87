//! String encoding of contours used in saved match files.
//!
//! A point is written `[[x,y]]`, a contour is its points joined by `*` and a
//! contour list is its contours joined by `//`. A contour without points is
//! written `[]` so it survives inside a list.

use serde::{Deserialize, Deserializer, Serializer};

use crate::core::BoardMatchError;
use crate::geometry::{Contour, PixelPoint};

const POINT_SEPARATOR: &str = "*";
const CONTOUR_SEPARATOR: &str = "//";
const EMPTY_CONTOUR: &str = "[]";

pub fn encode_contour(contour: &Contour) -> String {
    if contour.points.is_empty() {
        return EMPTY_CONTOUR.to_string();
    }
    contour
        .points
        .iter()
        .map(|p| format!("[[{},{}]]", p.x, p.y))
        .collect::<Vec<_>>()
        .join(POINT_SEPARATOR)
}

pub fn encode_contours(contours: &[Contour]) -> String {
    contours
        .iter()
        .map(encode_contour)
        .collect::<Vec<_>>()
        .join(CONTOUR_SEPARATOR)
}

fn decode_point(text: &str) -> Result<PixelPoint, BoardMatchError> {
    let inner = text
        .trim()
        .strip_prefix("[[")
        .and_then(|t| t.strip_suffix("]]"))
        .ok_or_else(|| BoardMatchError::ContourCodec(format!("malformed point: {}", text)))?;
    let mut parts = inner.split(',');
    let mut next = || -> Result<i32, BoardMatchError> {
        parts
            .next()
            .and_then(|v| v.trim().parse().ok())
            .ok_or_else(|| BoardMatchError::ContourCodec(format!("malformed point: {}", text)))
    };
    let x = next()?;
    let y = next()?;
    if parts.next().is_some() {
        return Err(BoardMatchError::ContourCodec(format!("malformed point: {}", text)));
    }
    Ok(PixelPoint::new(x, y))
}

pub fn decode_contour(text: &str) -> Result<Contour, BoardMatchError> {
    let text = text.trim();
    if text.is_empty() || text == EMPTY_CONTOUR {
        return Ok(Contour::default());
    }
    text.split(POINT_SEPARATOR)
        .map(decode_point)
        .collect::<Result<Vec<_>, _>>()
        .map(Contour::new)
}

pub fn decode_contours(text: &str) -> Result<Vec<Contour>, BoardMatchError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    text.split(CONTOUR_SEPARATOR).map(decode_contour).collect()
}

/// `#[serde(with)]` adapter for a single contour.
pub mod contour {
    use super::*;

    pub fn serialize<S: Serializer>(contour: &Contour, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode_contour(contour))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Contour, D::Error> {
        let text = String::deserialize(deserializer)?;
        decode_contour(&text).map_err(serde::de::Error::custom)
    }
}

/// `#[serde(with)]` adapter for a list of contours.
pub mod contour_list {
    use super::*;

    pub fn serialize<S: Serializer>(contours: &[Contour], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode_contours(contours))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Contour>, D::Error> {
        let text = String::deserialize(deserializer)?;
        decode_contours(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: i32, y: i32) -> Contour {
        Contour::new(vec![
            PixelPoint::new(x, y),
            PixelPoint::new(x, y + 3),
            PixelPoint::new(x + 3, y + 3),
            PixelPoint::new(x + 3, y),
        ])
    }

    #[test]
    fn test_encoding_format() {
        let c = Contour::new(vec![PixelPoint::new(1, 2), PixelPoint::new(-3, 4)]);
        assert_eq!(encode_contour(&c), "[[1,2]]*[[-3,4]]");
        assert_eq!(
            encode_contours(&[c.clone(), c]),
            "[[1,2]]*[[-3,4]]//[[1,2]]*[[-3,4]]"
        );
    }

    #[test]
    fn test_decode_inverts_encode() {
        let list = vec![square(0, 0), square(10, -4)];
        let decoded = decode_contours(&encode_contours(&list)).expect("decode");
        assert_eq!(decoded, list);
        assert!(decode_contours("").expect("empty").is_empty());
    }

    #[test]
    fn test_empty_contour_keeps_its_place() {
        let list = vec![square(0, 0), Contour::default(), square(5, 5)];
        let text = encode_contours(&list);
        assert_eq!(text.matches(EMPTY_CONTOUR).count(), 1);
        assert_eq!(decode_contours(&text).expect("decode"), list);

        let lone = vec![Contour::default()];
        assert_eq!(encode_contours(&lone), "[]");
        assert_eq!(decode_contours("[]").expect("decode"), lone);
    }

    #[test]
    fn test_malformed_input() {
        assert!(decode_contour("[[1,2]]*[3,4]").is_err());
        assert!(decode_contour("[[1,2,3]]").is_err());
        assert!(decode_contour("[[a,2]]").is_err());
    }
}
