//! # featurebox-types
//!
//! Envelope and bounding-box types for the featurebox spatial index.
//!
//! This crate provides the pure geometric value types shared between the
//! index engine and its callers:
//!
//! - **Bounding boxes**: [`bbox::BoundingBox`], a 2D axis-aligned query
//!   rectangle built on `geo::Rect`
//! - **Envelopes**: [`envelope::GeometryEnvelope`], min/max bounds with
//!   optional Z and M ranges as stored in the geometry index
//!
//! All types are serializable with Serde and built on top of the `geo`
//! crate's geometric primitives.
//!
//! ## Examples
//!
//! ```rust
//! use featurebox_types::bbox::BoundingBox;
//! use featurebox_types::envelope::GeometryEnvelope;
//!
//! let query = BoundingBox::new(-74.1, 40.6, -73.9, 40.9);
//! let stored = GeometryEnvelope::new(-74.0, 40.7, -73.95, 40.75);
//! assert!(stored.intersects(&GeometryEnvelope::from_bbox(&query)));
//! ```

pub mod bbox;
pub mod envelope;
