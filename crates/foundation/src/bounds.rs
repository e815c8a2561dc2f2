/// Axis-aligned bounding box in lon/lat degrees.
///
/// `min` is `[west, south]`, `max` is `[east, north]`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb2 {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Aabb2 {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Aabb2 { min, max }
    }

    /// Degenerate box around a single position.
    pub fn from_point(lon_deg: f64, lat_deg: f64) -> Self {
        Aabb2 {
            min: [lon_deg, lat_deg],
            max: [lon_deg, lat_deg],
        }
    }

    pub fn extend(&mut self, lon_deg: f64, lat_deg: f64) {
        self.min[0] = self.min[0].min(lon_deg);
        self.min[1] = self.min[1].min(lat_deg);
        self.max[0] = self.max[0].max(lon_deg);
        self.max[1] = self.max[1].max(lat_deg);
    }

    pub fn union(self, other: Aabb2) -> Aabb2 {
        Aabb2 {
            min: [self.min[0].min(other.min[0]), self.min[1].min(other.min[1])],
            max: [self.max[0].max(other.max[0]), self.max[1].max(other.max[1])],
        }
    }

    pub fn west(&self) -> f64 {
        self.min[0]
    }

    pub fn south(&self) -> f64 {
        self.min[1]
    }

    pub fn east(&self) -> f64 {
        self.max[0]
    }

    pub fn north(&self) -> f64 {
        self.max[1]
    }

    /// Leaflet-style corner pair: `[[south, west], [north, east]]`.
    pub fn to_lat_lng_corners(&self) -> [[f64; 2]; 2] {
        [[self.south(), self.west()], [self.north(), self.east()]]
    }
}
