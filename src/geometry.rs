//! Stored geometry payloads and envelope extraction.
//!
//! Feature rows carry their geometry as raw WKT bytes, optionally
//! accompanied by a precomputed envelope header. Index builds and manual
//! scans only need bounds, so the header lets them skip the full parse.

use crate::error::{IndexError, Result};
use bytes::Bytes;
use featurebox_types::envelope::GeometryEnvelope;
use geo::{BoundingRect, Geometry};

/// A feature row's geometry payload.
///
/// Z and M ranges reach the index only through the envelope header; the
/// WKT fallback produces 2D envelopes.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredGeometry {
    header: Option<GeometryEnvelope>,
    wkt: Bytes,
}

impl StoredGeometry {
    /// Wrap raw WKT bytes with no envelope header.
    pub fn from_wkt(wkt: impl Into<Bytes>) -> Self {
        Self {
            header: None,
            wkt: wkt.into(),
        }
    }

    /// Wrap raw WKT bytes together with a precomputed envelope.
    pub fn with_envelope(wkt: impl Into<Bytes>, envelope: GeometryEnvelope) -> Self {
        Self {
            header: Some(envelope),
            wkt: wkt.into(),
        }
    }

    /// A point geometry with a degenerate envelope header.
    pub fn point(x: f64, y: f64) -> Self {
        Self::with_envelope(
            format!("POINT({} {})", x, y).into_bytes(),
            GeometryEnvelope::point(x, y),
        )
    }

    /// The raw WKT payload.
    pub fn wkt_bytes(&self) -> &Bytes {
        &self.wkt
    }

    /// The precomputed envelope header, if any.
    pub fn header(&self) -> Option<&GeometryEnvelope> {
        self.header.as_ref()
    }

    /// The geometry's envelope.
    ///
    /// Returns the header when present; otherwise parses the WKT payload
    /// and computes the bounding rectangle.
    pub fn envelope(&self) -> Result<GeometryEnvelope> {
        if let Some(envelope) = &self.header {
            return Ok(envelope.clone());
        }
        let text = std::str::from_utf8(&self.wkt)
            .map_err(|e| IndexError::GeometryParse(format!("{:?}", e)))?;
        let geometry = parse_wkt(text)?;
        envelope_of(&geometry)
    }

    /// Fully parse the WKT payload.
    pub fn to_geometry(&self) -> Result<Geometry<f64>> {
        let text = std::str::from_utf8(&self.wkt)
            .map_err(|e| IndexError::GeometryParse(format!("{:?}", e)))?;
        parse_wkt(text)
    }
}

/// Parse a WKT string into a geo-types Geometry.
pub fn parse_wkt(wkt_str: &str) -> Result<Geometry<f64>> {
    use std::str::FromStr;
    wkt::Wkt::from_str(wkt_str)
        .map_err(|e| IndexError::GeometryParse(format!("{:?}", e)))
        .and_then(|w| {
            w.try_into()
                .map_err(|e: wkt::conversion::Error| IndexError::GeometryParse(format!("{:?}", e)))
        })
}

/// Compute the 2D envelope of a parsed geometry.
///
/// Fails for geometries with no extent, such as an empty collection.
pub fn envelope_of(geometry: &Geometry<f64>) -> Result<GeometryEnvelope> {
    let rect = geometry.bounding_rect().ok_or_else(|| {
        IndexError::GeometryParse("geometry has no bounding rectangle".to_string())
    })?;
    Ok(GeometryEnvelope::new(
        rect.min().x,
        rect.min().y,
        rect.max().x,
        rect.max().y,
    ))
}
