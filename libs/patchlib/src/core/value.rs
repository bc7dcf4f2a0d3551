// Copyright (c) 2026 Patchlib Contributors
// SPDX-License-Identifier: MIT

//! Typed values flowing through ports.
//!
//! Plain data variants compare structurally. GPU-backed variants
//! (textures, geometry, materials, scene objects, cameras) carry an
//! opaque handle and compare by handle identity plus a generation
//! counter, so a recycled pool slot never accidentally equals a stale
//! handle. Content comparison of GPU resources is never attempted.

use serde::{Deserialize, Serialize};

/// Identity of a GPU texture. Two handles are equal only if they name
/// the same underlying resource instance at the same generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureHandle {
    pub id: u64,
    pub generation: u64,
}

/// Identity of a non-texture GPU resource (geometry, material, scene
/// object, camera). Same equality rule as [`TextureHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceHandle {
    pub id: u64,
    pub generation: u64,
}

/// Tag identifying a port or parameter value type.
///
/// Connections require an exact tag match; there is no implicit
/// coercion between value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Bool,
    Int,
    Float,
    Vector2,
    Vector3,
    Vector4,
    Color,
    String,
    Transform,
    Image,
    Geometry,
    Material,
    Object,
    Camera,
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A value held by a port or parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f32),
    Vector2([f32; 2]),
    Vector3([f32; 3]),
    Vector4([f32; 4]),
    Color([f32; 4]),
    String(String),
    Transform([[f32; 4]; 4]),
    Image(TextureHandle),
    Geometry(ResourceHandle),
    Material(ResourceHandle),
    Object(ResourceHandle),
    Camera(ResourceHandle),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Vector2(_) => ValueType::Vector2,
            Value::Vector3(_) => ValueType::Vector3,
            Value::Vector4(_) => ValueType::Vector4,
            Value::Color(_) => ValueType::Color,
            Value::String(_) => ValueType::String,
            Value::Transform(_) => ValueType::Transform,
            Value::Image(_) => ValueType::Image,
            Value::Geometry(_) => ValueType::Geometry,
            Value::Material(_) => ValueType::Material,
            Value::Object(_) => ValueType::Object,
            Value::Camera(_) => ValueType::Camera,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<TextureHandle> {
        match self {
            Value::Image(h) => Some(*h),
            _ => None,
        }
    }

    pub fn as_geometry(&self) -> Option<ResourceHandle> {
        match self {
            Value::Geometry(h) => Some(*h),
            _ => None,
        }
    }

    pub fn as_material(&self) -> Option<ResourceHandle> {
        match self {
            Value::Material(h) => Some(*h),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ResourceHandle> {
        match self {
            Value::Object(h) => Some(*h),
            _ => None,
        }
    }

    pub fn as_camera(&self) -> Option<ResourceHandle> {
        match self {
            Value::Camera(h) => Some(*h),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_tags() {
        assert_eq!(Value::Float(1.0).value_type(), ValueType::Float);
        assert_eq!(
            Value::String("hi".into()).value_type(),
            ValueType::String
        );
        assert_eq!(
            Value::Image(TextureHandle { id: 1, generation: 0 }).value_type(),
            ValueType::Image
        );
    }

    #[test]
    fn test_plain_values_compare_structurally() {
        assert_eq!(Value::Float(2.0), Value::Float(2.0));
        assert_ne!(Value::Float(2.0), Value::Float(3.0));
        assert_ne!(Value::Float(2.0), Value::Int(2));
    }

    #[test]
    fn test_handles_compare_by_identity_and_generation() {
        let a = TextureHandle { id: 7, generation: 0 };
        let b = TextureHandle { id: 7, generation: 0 };
        let recycled = TextureHandle { id: 7, generation: 1 };

        assert_eq!(Value::Image(a), Value::Image(b));
        assert_ne!(Value::Image(a), Value::Image(recycled));
    }

    #[test]
    fn test_value_json_round_trip() {
        let v = Value::Vector3([1.0, 2.0, 3.0]);
        let json = serde_json::to_string(&v).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }
}
