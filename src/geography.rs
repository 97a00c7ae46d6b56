use std::f64::consts::PI;

use serde_derive::{Deserialize, Serialize};

use crate::DemeId;

/// Mean radius of the Earth, in km.
pub const EARTH_RADIUS: f64 = 6371.0;

/// A point on the globe, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoord {
    pub lat: f64,
    pub lon: f64,
}

impl GeoCoord {
    pub fn new(lat: f64, lon: f64) -> Self {
        GeoCoord { lat, lon }
    }

    /**
    Great-circle distance in km, using the haversine formula.

    ```rust
    # use model::geography::GeoCoord;
    let paris = GeoCoord::new(48.8566, 2.3522);
    let bordeaux = GeoCoord::new(44.8378, -0.5792);
    let d = paris.great_circle_distance_to(&bordeaux);
    assert!((d - 499.).abs() < 5.);
    assert_eq!(bordeaux.great_circle_distance_to(&bordeaux), 0.);
    ```
     */
    pub fn great_circle_distance_to(&self, other: &GeoCoord) -> f64 {
        let lat1 = self.lat * PI / 180.;
        let lat2 = other.lat * PI / 180.;
        let dlat = lat2 - lat1;
        let dlon = (other.lon - self.lon) * PI / 180.;
        let h = (dlat / 2.).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.).sin().powi(2);
        2. * EARTH_RADIUS * h.sqrt().min(1.).asin()
    }
}

/**
The landscape is the fixed set of demes, each represented by the centroid of
its cell. Deme identifiers are positions in this enumeration, so every table
indexed by deme iterates in the same, fixed order.
*/
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Landscape {
    demes: Vec<GeoCoord>,
}

impl Landscape {
    pub fn new(demes: Vec<GeoCoord>) -> Self {
        Landscape { demes }
    }

    pub fn len(&self) -> usize {
        self.demes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.demes.is_empty()
    }

    pub fn centroid(&self, deme: DemeId) -> Option<&GeoCoord> {
        self.demes.get(deme)
    }

    pub fn demes(&self) -> impl Iterator<Item = (DemeId, &GeoCoord)> {
        self.demes.iter().enumerate()
    }

    /// The deme whose centroid is closest to an arbitrary coordinate. Ties go
    /// to the deme enumerated first.
    pub fn reproject_to_centroid(&self, coordinates: &GeoCoord) -> Option<DemeId> {
        let mut closest: Option<(DemeId, f64)> = None;
        for (i, centroid) in self.demes() {
            let d = coordinates.great_circle_distance_to(centroid);
            match closest {
                Some((_, best)) if best <= d => {}
                _ => closest = Some((i, d)),
            }
        }
        closest.map(|(i, _)| i)
    }
}

/**
Pairwise distances between all demes, in km.

The table is computed once from the landscape and never changes afterwards;
replicates only read it, so it can be shared between them freely.
*/
#[derive(Debug, Clone)]
pub struct DistanceTable {
    distances: Vec<Vec<f64>>,
}

impl DistanceTable {
    pub fn new(landscape: &Landscape) -> Self {
        let distances = landscape
            .demes
            .iter()
            .map(|x0| {
                landscape
                    .demes
                    .iter()
                    .map(|y| x0.great_circle_distance_to(y))
                    .collect()
            })
            .collect();
        DistanceTable { distances }
    }

    /// Distances from `deme` to every deme, in deme order.
    pub fn from_deme(&self, deme: DemeId) -> &[f64] {
        &self.distances[deme]
    }

    pub fn get(&self, from: DemeId, to: DemeId) -> f64 {
        self.distances[from][to]
    }

    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }
}
