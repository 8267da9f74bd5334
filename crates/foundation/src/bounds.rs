use crate::geo::GeoPoint;

/// Axis-aligned lon/lat bounding box, `[lon, lat]` ordering.
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
    pub fn from_point(p: GeoPoint) -> Self {
        let v = [p.lon(), p.lat()];
        Aabb2 { min: v, max: v }
    }

    pub fn extend(&mut self, p: GeoPoint) {
        self.min[0] = self.min[0].min(p.lon());
        self.min[1] = self.min[1].min(p.lat());
        self.max[0] = self.max[0].max(p.lon());
        self.max[1] = self.max[1].max(p.lat());
    }

    pub fn contains(&self, p: GeoPoint) -> bool {
        (self.min[0]..=self.max[0]).contains(&p.lon())
            && (self.min[1]..=self.max[1]).contains(&p.lat())
    }

    /// Grows `current` by `p`, starting a new box when there is none yet.
    pub fn include(current: Option<Self>, p: GeoPoint) -> Self {
        match current {
            Some(mut b) => {
                b.extend(p);
                b
            }
            None => Self::from_point(p),
        }
    }
}
