use serde::{Deserialize, Serialize};

/// A 2D position or velocity vector. `f64` so round-tripping through
/// `serde_json` is exact (JSON numbers decode losslessly into `f64`,
/// unlike the teacher's fixed-point `i16` wire encoding, which existed
/// only to fit a binary MTU that a JSON text protocol doesn't have).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Vec2) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn lerp(&self, other: Vec2, t: f64) -> Vec2 {
        Vec2::new(self.x + (other.x - self.x) * t, self.y + (other.y - self.y) * t)
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Mul<f64> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// Wire representation of one networked entity, as carried in
/// `world_snapshot` and `entity_spawn` (spec §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedNetworkEntity {
    pub network_entity_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub owner_id: String,
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec2>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<Vec2>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<serde_json::Value>,
}

impl SerializedNetworkEntity {
    pub fn new(network_entity_id: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            network_entity_id: network_entity_id.into(),
            owner_id: String::new(),
            entity_type: entity_type.into(),
            position: None,
            velocity: None,
            rotation: None,
            components: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_symmetric() {
        let a = Vec2::new(1.0, 2.0);
        let b = Vec2::new(4.0, 6.0);
        assert_eq!(a.distance_to(b), b.distance_to(a));
    }

    #[test]
    fn serialized_entity_roundtrips_through_json() {
        let mut entity = SerializedNetworkEntity::new("e1", "player");
        entity.position = Some(Vec2::new(1.5, -2.5));
        entity.owner_id = "client-1".into();

        let json = serde_json::to_string(&entity).unwrap();
        let back: SerializedNetworkEntity = serde_json::from_str(&json).unwrap();

        assert_eq!(back.network_entity_id, "e1");
        assert_eq!(back.owner_id, "client-1");
        assert_eq!(back.position.unwrap().x, 1.5);
    }
}
