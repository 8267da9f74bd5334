use foundation::geo::{parse_coordinate, GeoPoint};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::LoadError;

const ID_FIELDS: &[&str] = &["id", "ProjectID", "GlobalID"];
const LAT_FIELDS: &[&str] = &["Latitude", "latitude", "lat"];
const LON_FIELDS: &[&str] = &["Longitude", "longitude", "lng", "lon"];
const REGION_FIELDS: &[&str] = &["Region", "region"];

/// One geo-tagged infrastructure entry.
///
/// Coordinates are kept as parsed numbers and validated lazily through
/// [`Record::position`]; a record without a usable position is still a
/// record. Everything else the backend sent stays in `fields` untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Decodes one search hit.
    ///
    /// Fails only when the hit is not an object or carries no identifier.
    pub fn from_hit(hit: Value) -> Result<Self, LoadError> {
        let Value::Object(mut fields) = hit else {
            return Err(LoadError::malformed("hit is not a JSON object"));
        };

        let id = match take_first(&mut fields, ID_FIELDS) {
            Some(Value::String(s)) if !s.trim().is_empty() => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(LoadError::malformed("hit has no identifier")),
        };

        let latitude = take_first(&mut fields, LAT_FIELDS).as_ref().and_then(coordinate);
        let longitude = take_first(&mut fields, LON_FIELDS).as_ref().and_then(coordinate);
        let region = match take_first(&mut fields, REGION_FIELDS) {
            Some(Value::String(s)) => Some(s),
            Some(other) => {
                fields.insert("Region".to_string(), other);
                None
            }
            None => None,
        };

        Ok(Self {
            id,
            region,
            latitude,
            longitude,
            fields,
        })
    }

    pub fn position(&self) -> Option<GeoPoint> {
        GeoPoint::new(self.latitude?, self.longitude?)
    }

    pub fn has_position(&self) -> bool {
        self.position().is_some()
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

fn take_first(fields: &mut Map<String, Value>, names: &[&str]) -> Option<Value> {
    names.iter().find_map(|name| fields.remove(*name))
}

fn coordinate(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => parse_coordinate(s),
        _ => None,
    }
}
