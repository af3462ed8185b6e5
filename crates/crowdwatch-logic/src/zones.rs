//! Zone catalog: the set of monitored zones and their safe limits.
//!
//! The catalog is supplied by the venue configuration (or the external
//! limits endpoint) and is read-only to the engine. A zone without a limit,
//! or with a limit of zero, cannot be evaluated and always classifies as
//! [`Status::Unknown`](crate::classify::Status::Unknown).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::snapshot::OccupancySnapshot;

/// Optional physical placement of a zone. Never read by prediction logic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Geometry {
    /// Outdoor zone pinned on a map.
    LatLng { lat: f64, lng: f64 },
    /// Indoor zone on a floor-plan layout (center + size, layout units).
    Layout {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

/// A monitored area with an independently tracked occupancy count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub id: String,
    /// Maximum occupancy before the zone counts as breached.
    #[serde(default)]
    pub safe_limit: Option<u32>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

impl Zone {
    pub fn new(id: impl Into<String>, safe_limit: u32) -> Self {
        Self {
            id: id.into(),
            safe_limit: Some(safe_limit),
            geometry: None,
        }
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }
}

/// Known zones keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneCatalog {
    zones: BTreeMap<String, Zone>,
}

impl ZoneCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from zone definitions. Later duplicates replace earlier ones.
    pub fn from_zones(zones: impl IntoIterator<Item = Zone>) -> Self {
        let mut catalog = Self::new();
        for zone in zones {
            catalog.insert(zone);
        }
        catalog
    }

    /// Build a limits-only catalog, the shape the limits endpoint returns.
    pub fn from_limits<I, K>(limits: I) -> Self
    where
        I: IntoIterator<Item = (K, u32)>,
        K: Into<String>,
    {
        Self::from_zones(limits.into_iter().map(|(id, limit)| Zone::new(id, limit)))
    }

    pub fn insert(&mut self, zone: Zone) {
        self.zones.insert(zone.id.clone(), zone);
    }

    pub fn get(&self, zone: &str) -> Option<&Zone> {
        self.zones.get(zone)
    }

    /// The zone's safe limit, or `None` when absent or configured as zero.
    pub fn limit(&self, zone: &str) -> Option<u32> {
        self.zones
            .get(zone)
            .and_then(|z| z.safe_limit)
            .filter(|&limit| limit > 0)
    }

    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.values()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

/// A weighted map point for a heat-map consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityPoint {
    pub zone: String,
    pub lat: f64,
    pub lng: f64,
    pub count: u32,
}

/// Pair each counted zone with its map coordinates.
///
/// Zones with no geometry, or with layout-only geometry, are skipped.
pub fn density_points(snapshot: &OccupancySnapshot, catalog: &ZoneCatalog) -> Vec<DensityPoint> {
    snapshot
        .iter()
        .filter_map(|(zone, count)| match catalog.get(zone)?.geometry? {
            Geometry::LatLng { lat, lng } => Some(DensityPoint {
                zone: zone.to_string(),
                lat,
                lng,
                count,
            }),
            Geometry::Layout { .. } => None,
        })
        .collect()
}
