use crate::bbox::BoundingBox;
use serde::{Deserialize, Serialize};

/// A geometry envelope: min/max X and Y bounds with optional Z and M
/// ranges.
///
/// Envelopes describe the axis-aligned extent of a stored geometry or a
/// query region. The Z (elevation) and M (measure) ranges are present
/// only when the source geometry carries that dimension; absence is
/// semantically distinct from zero. A range's min and max are always
/// present or absent together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryEnvelope {
    /// Minimum x coordinate
    pub min_x: f64,
    /// Minimum y coordinate
    pub min_y: f64,
    /// Maximum x coordinate
    pub max_x: f64,
    /// Maximum y coordinate
    pub max_y: f64,
    /// Minimum z coordinate, if the geometry has elevation
    pub min_z: Option<f64>,
    /// Maximum z coordinate, if the geometry has elevation
    pub max_z: Option<f64>,
    /// Minimum m value, if the geometry has measures
    pub min_m: Option<f64>,
    /// Maximum m value, if the geometry has measures
    pub max_m: Option<f64>,
}

fn ranges_overlap(a_min: f64, a_max: f64, b_min: f64, b_max: f64) -> bool {
    !(a_max < b_min || a_min > b_max)
}

impl GeometryEnvelope {
    /// Create a new 2D envelope from minimum and maximum coordinates.
    ///
    /// # Examples
    ///
    /// ```
    /// use featurebox_types::envelope::GeometryEnvelope;
    ///
    /// let env = GeometryEnvelope::new(-74.0, 40.7, -73.9, 40.8);
    /// assert!(env.validate().is_ok());
    /// ```
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
            min_z: None,
            max_z: None,
            min_m: None,
            max_m: None,
        }
    }

    /// Create a degenerate envelope covering a single 2D point.
    pub fn point(x: f64, y: f64) -> Self {
        Self::new(x, y, x, y)
    }

    /// Attach a Z range to the envelope.
    pub fn with_z(mut self, min_z: f64, max_z: f64) -> Self {
        self.min_z = Some(min_z);
        self.max_z = Some(max_z);
        self
    }

    /// Attach an M range to the envelope.
    pub fn with_m(mut self, min_m: f64, max_m: f64) -> Self {
        self.min_m = Some(min_m);
        self.max_m = Some(max_m);
        self
    }

    /// Whether the envelope carries a Z range.
    pub fn has_z(&self) -> bool {
        self.min_z.is_some() && self.max_z.is_some()
    }

    /// Whether the envelope carries an M range.
    pub fn has_m(&self) -> bool {
        self.min_m.is_some() && self.max_m.is_some()
    }

    /// The Z range as a pair, when present.
    pub fn z_range(&self) -> Option<(f64, f64)> {
        match (self.min_z, self.max_z) {
            (Some(min), Some(max)) => Some((min, max)),
            _ => None,
        }
    }

    /// The M range as a pair, when present.
    pub fn m_range(&self) -> Option<(f64, f64)> {
        match (self.min_m, self.max_m) {
            (Some(min), Some(max)) => Some((min, max)),
            _ => None,
        }
    }

    /// Check structural invariants: each present range has min <= max,
    /// no range is half-present, and no bound is NaN.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_x.is_nan() || self.max_x.is_nan() || self.min_y.is_nan() || self.max_y.is_nan()
        {
            return Err("envelope bounds must not be NaN".to_string());
        }
        if self.min_x > self.max_x {
            return Err(format!(
                "min_x ({}) must not exceed max_x ({})",
                self.min_x, self.max_x
            ));
        }
        if self.min_y > self.max_y {
            return Err(format!(
                "min_y ({}) must not exceed max_y ({})",
                self.min_y, self.max_y
            ));
        }
        if self.min_z.is_some() != self.max_z.is_some() {
            return Err("min_z and max_z must be present together".to_string());
        }
        if self.min_m.is_some() != self.max_m.is_some() {
            return Err("min_m and max_m must be present together".to_string());
        }
        if let Some((min_z, max_z)) = self.z_range() {
            if min_z > max_z {
                return Err(format!("min_z ({}) must not exceed max_z ({})", min_z, max_z));
            }
        }
        if let Some((min_m, max_m)) = self.m_range() {
            if min_m > max_m {
                return Err(format!("min_m ({}) must not exceed max_m ({})", min_m, max_m));
            }
        }
        Ok(())
    }

    /// Check if this envelope intersects with another.
    ///
    /// The test is inclusive in every dimension. Z and M ranges only
    /// constrain the result when both envelopes carry that dimension;
    /// otherwise the shared X/Y overlap decides.
    pub fn intersects(&self, other: &GeometryEnvelope) -> bool {
        if !ranges_overlap(self.min_x, self.max_x, other.min_x, other.max_x)
            || !ranges_overlap(self.min_y, self.max_y, other.min_y, other.max_y)
        {
            return false;
        }
        if let (Some((a_min, a_max)), Some((b_min, b_max))) = (self.z_range(), other.z_range()) {
            if !ranges_overlap(a_min, a_max, b_min, b_max) {
                return false;
            }
        }
        if let (Some((a_min, a_max)), Some((b_min, b_max))) = (self.m_range(), other.m_range()) {
            if !ranges_overlap(a_min, a_max, b_min, b_max) {
                return false;
            }
        }
        true
    }

    /// Compute the smallest envelope covering both inputs.
    ///
    /// The result carries a Z or M range only when both inputs do; a
    /// one-sided range says nothing about the other geometry's extent
    /// in that dimension.
    pub fn union(&self, other: &GeometryEnvelope) -> Self {
        let mut out = Self::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        );
        if let (Some((a_min, a_max)), Some((b_min, b_max))) = (self.z_range(), other.z_range()) {
            out = out.with_z(a_min.min(b_min), a_max.max(b_max));
        }
        if let (Some((a_min, a_max)), Some((b_min, b_max))) = (self.m_range(), other.m_range()) {
            out = out.with_m(a_min.min(b_min), a_max.max(b_max));
        }
        out
    }

    /// Expand every present range symmetrically by `amount`.
    pub fn expand(&self, amount: f64) -> Self {
        let mut out = Self::new(
            self.min_x - amount,
            self.min_y - amount,
            self.max_x + amount,
            self.max_y + amount,
        );
        if let Some((min_z, max_z)) = self.z_range() {
            out = out.with_z(min_z - amount, max_z + amount);
        }
        if let Some((min_m, max_m)) = self.m_range() {
            out = out.with_m(min_m - amount, max_m + amount);
        }
        out
    }

    /// Build a 2D envelope from a bounding box.
    pub fn from_bbox(bbox: &BoundingBox) -> Self {
        Self::new(bbox.min_x(), bbox.min_y(), bbox.max_x(), bbox.max_y())
    }

    /// Project the envelope to its 2D bounding box, discarding Z and M.
    pub fn to_bbox(&self) -> BoundingBox {
        BoundingBox::new(self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_creation() {
        let env = GeometryEnvelope::new(0.0, 1.0, 10.0, 11.0);
        assert_eq!(env.min_x, 0.0);
        assert_eq!(env.min_y, 1.0);
        assert_eq!(env.max_x, 10.0);
        assert_eq!(env.max_y, 11.0);
        assert!(!env.has_z());
        assert!(!env.has_m());
    }

    #[test]
    fn test_envelope_point_is_degenerate() {
        let env = GeometryEnvelope::point(5.0, 5.0);
        assert_eq!(env.min_x, env.max_x);
        assert_eq!(env.min_y, env.max_y);
        assert!(env.validate().is_ok());
    }

    #[test]
    fn test_envelope_z_m_ranges() {
        let env = GeometryEnvelope::new(0.0, 0.0, 1.0, 1.0)
            .with_z(10.0, 20.0)
            .with_m(0.5, 1.5);
        assert!(env.has_z());
        assert!(env.has_m());
        assert_eq!(env.z_range(), Some((10.0, 20.0)));
        assert_eq!(env.m_range(), Some((0.5, 1.5)));
        assert!(env.validate().is_ok());
    }

    #[test]
    fn test_envelope_validate_rejects_inverted() {
        let env = GeometryEnvelope::new(10.0, 0.0, 0.0, 1.0);
        assert!(env.validate().is_err());

        let env = GeometryEnvelope::new(0.0, 0.0, 1.0, 1.0).with_z(5.0, -5.0);
        assert!(env.validate().is_err());
    }

    #[test]
    fn test_envelope_validate_rejects_half_present_range() {
        let mut env = GeometryEnvelope::new(0.0, 0.0, 1.0, 1.0);
        env.min_z = Some(1.0);
        assert!(env.validate().is_err());
    }

    #[test]
    fn test_envelope_validate_rejects_nan() {
        let env = GeometryEnvelope::new(f64::NAN, 0.0, 1.0, 1.0);
        assert!(env.validate().is_err());
    }

    #[test]
    fn test_envelope_intersects_inclusive() {
        let a = GeometryEnvelope::new(0.0, 0.0, 10.0, 10.0);
        let touching = GeometryEnvelope::new(10.0, 10.0, 20.0, 20.0);
        let disjoint = GeometryEnvelope::new(10.1, 10.1, 20.0, 20.0);

        assert!(a.intersects(&touching));
        assert!(touching.intersects(&a));
        assert!(!a.intersects(&disjoint));
    }

    #[test]
    fn test_envelope_intersects_z_constrains_only_when_shared() {
        let low = GeometryEnvelope::new(0.0, 0.0, 10.0, 10.0).with_z(0.0, 5.0);
        let high = GeometryEnvelope::new(0.0, 0.0, 10.0, 10.0).with_z(6.0, 9.0);
        let flat = GeometryEnvelope::new(0.0, 0.0, 10.0, 10.0);

        assert!(!low.intersects(&high));
        assert!(low.intersects(&flat));
        assert!(flat.intersects(&high));
    }

    #[test]
    fn test_envelope_union() {
        let a = GeometryEnvelope::new(0.0, 0.0, 5.0, 5.0).with_z(0.0, 1.0);
        let b = GeometryEnvelope::new(3.0, -2.0, 8.0, 4.0).with_z(-1.0, 0.5);
        let u = a.union(&b);

        assert_eq!(u.min_x, 0.0);
        assert_eq!(u.min_y, -2.0);
        assert_eq!(u.max_x, 8.0);
        assert_eq!(u.max_y, 5.0);
        assert_eq!(u.z_range(), Some((-1.0, 1.0)));
    }

    #[test]
    fn test_envelope_union_drops_one_sided_z() {
        let a = GeometryEnvelope::new(0.0, 0.0, 5.0, 5.0).with_z(0.0, 1.0);
        let b = GeometryEnvelope::new(3.0, -2.0, 8.0, 4.0);
        assert!(!a.union(&b).has_z());
    }

    #[test]
    fn test_envelope_expand() {
        let env = GeometryEnvelope::new(0.0, 0.0, 10.0, 10.0).with_z(1.0, 2.0);
        let padded = env.expand(0.5);
        assert_eq!(padded.min_x, -0.5);
        assert_eq!(padded.max_y, 10.5);
        assert_eq!(padded.z_range(), Some((0.5, 2.5)));
    }

    #[test]
    fn test_envelope_bbox_round_trip() {
        let bbox = BoundingBox::new(-1.0, -2.0, 3.0, 4.0);
        let env = GeometryEnvelope::from_bbox(&bbox);
        assert_eq!(env.to_bbox(), bbox);
    }
}
