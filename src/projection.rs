//! Coordinate reference systems and the projection bridge.
//!
//! Query boxes arrive in whatever projection the caller works in and
//! must be expressed in the feature table's native projection before
//! any intersection test. The transform mathematics themselves are an
//! external collaborator consumed through [`CoordTransform`]; this
//! module holds the registry and the envelope-level plumbing, including
//! the geodesic widening used when a table stores antimeridian- and
//! pole-aware envelopes.

use crate::error::{IndexError, Result};
use featurebox_types::bbox::BoundingBox;
use featurebox_types::envelope::GeometryEnvelope;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identifier of a spatial reference system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SrsId(pub i32);

impl SrsId {
    /// WGS 84 geographic coordinates.
    pub const WGS84: SrsId = SrsId(4326);
}

impl fmt::Display for SrsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A pure coordinate transform between two reference systems.
///
/// Implementations wrap whatever projection library the host
/// application uses; the engine only ever calls `transform` on corner
/// points.
pub trait CoordTransform: Send + Sync {
    /// The reference system this transform reads.
    fn source(&self) -> SrsId;

    /// The reference system this transform produces.
    fn target(&self) -> SrsId;

    /// Transform a single coordinate pair.
    fn transform(&self, x: f64, y: f64) -> Result<(f64, f64)>;
}

/// Registry of coordinate transforms, keyed by (source, target).
///
/// A box whose source equals the target passes through untouched; a
/// missing transform surfaces a projection error before any query
/// executes.
pub struct ProjectionBridge {
    transforms: FxHashMap<(SrsId, SrsId), Arc<dyn CoordTransform>>,
}

impl ProjectionBridge {
    /// Create an empty bridge.
    pub fn new() -> Self {
        Self {
            transforms: FxHashMap::default(),
        }
    }

    /// Register a transform under its (source, target) pair, replacing
    /// any previous registration.
    pub fn register(&mut self, transform: Arc<dyn CoordTransform>) {
        self.transforms
            .insert((transform.source(), transform.target()), transform);
    }

    /// Whether a transform from `from` to `to` is available.
    pub fn has_transform(&self, from: SrsId, to: SrsId) -> bool {
        from == to || self.transforms.contains_key(&(from, to))
    }

    /// Project a bounding box from `from` into `to`.
    ///
    /// All four corners are transformed and the result is their
    /// axis-aligned hull, so rotating projections still produce a
    /// covering box.
    pub fn project_bbox(&self, bbox: &BoundingBox, from: SrsId, to: SrsId) -> Result<BoundingBox> {
        if from == to {
            return Ok(bbox.clone());
        }
        let Some(transform) = self.transforms.get(&(from, to)) else {
            return Err(IndexError::Projection(format!(
                "no transform registered from srs {} to srs {}",
                from, to
            )));
        };

        let corners = [
            (bbox.min_x(), bbox.min_y()),
            (bbox.min_x(), bbox.max_y()),
            (bbox.max_x(), bbox.min_y()),
            (bbox.max_x(), bbox.max_y()),
        ];

        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for (x, y) in corners {
            let (tx, ty) = transform.transform(x, y)?;
            min_x = min_x.min(tx);
            min_y = min_y.min(ty);
            max_x = max_x.max(tx);
            max_y = max_y.max(ty);
        }

        Ok(BoundingBox::new(min_x, min_y, max_x, max_y))
    }

    /// Project an envelope's X/Y bounds, carrying Z/M ranges through
    /// unchanged.
    pub fn project_envelope(
        &self,
        envelope: &GeometryEnvelope,
        from: SrsId,
        to: SrsId,
    ) -> Result<GeometryEnvelope> {
        if from == to {
            return Ok(envelope.clone());
        }
        let projected = self.project_bbox(&envelope.to_bbox(), from, to)?;
        let mut out = GeometryEnvelope::from_bbox(&projected);
        if let Some((min_z, max_z)) = envelope.z_range() {
            out = out.with_z(min_z, max_z);
        }
        if let Some((min_m, max_m)) = envelope.m_range() {
            out = out.with_m(min_m, max_m);
        }
        Ok(out)
    }
}

impl Default for ProjectionBridge {
    fn default() -> Self {
        Self::new()
    }
}

/// Maximum latitude reached by the great circle through two points at
/// latitude `lat_deg` separated by `width_deg` of longitude.
///
/// Follows from Clairaut's relation; the value grows toward the pole as
/// the separation approaches 180 degrees.
fn great_circle_max_lat(lat_deg: f64, width_deg: f64) -> f64 {
    let lat = lat_deg.to_radians();
    let half_width = (width_deg / 2.0).to_radians();
    (lat.tan() / half_width.cos()).atan().to_degrees()
}

/// Widen a geographic envelope so it bounds the great-circle edges of
/// the region, not just its corner coordinates.
///
/// A plain min/max rectangle clips geometry whose edges bulge poleward
/// between its corners, wraps the antimeridian, or encloses a pole.
/// This returns the widened envelope:
///
/// - northern and southern edges away from the equator are pushed to
///   the maximum latitude their great circles reach;
/// - an envelope given in wrapped form (`min_x > max_x`) is widened to
///   the full longitude span, since a single min/max pair cannot
///   represent the wrap;
/// - an envelope spanning 180 degrees of longitude or more includes the
///   pole on each hemisphere it touches.
///
/// Latitudes are clamped to [-90, 90]; Z and M ranges pass through
/// unchanged.
pub fn geodesic_envelope(envelope: &GeometryEnvelope) -> GeometryEnvelope {
    let wrapped = envelope.min_x > envelope.max_x;
    let width = if wrapped {
        360.0 - (envelope.min_x - envelope.max_x)
    } else {
        envelope.max_x - envelope.min_x
    };

    let (min_x, max_x) = if wrapped {
        (-180.0, 180.0)
    } else {
        (envelope.min_x, envelope.max_x)
    };

    let mut min_y = envelope.min_y;
    let mut max_y = envelope.max_y;
    if width >= 180.0 {
        if max_y > 0.0 {
            max_y = 90.0;
        }
        if min_y < 0.0 {
            min_y = -90.0;
        }
    } else {
        if max_y > 0.0 {
            max_y = great_circle_max_lat(max_y, width);
        }
        if min_y < 0.0 {
            min_y = -great_circle_max_lat(-min_y, width);
        }
    }

    let mut out = GeometryEnvelope::new(
        min_x,
        min_y.clamp(-90.0, 90.0),
        max_x,
        max_y.clamp(-90.0, 90.0),
    );
    if let Some((z_min, z_max)) = envelope.z_range() {
        out = out.with_z(z_min, z_max);
    }
    if let Some((m_min, m_max)) = envelope.m_range() {
        out = out.with_m(m_min, m_max);
    }
    out
}
