//! Value - Runtime values for rig parameters and context data

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Type information for a value
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// No value (unset)
    None,
    /// Boolean
    Bool,
    /// 32-bit integer
    Int,
    /// 32-bit float
    Float,
    /// 3D vector
    Vec3,
    /// Text
    Text,
}

impl ValueType {
    /// Get a default value for this type
    pub fn default_value(&self) -> Value {
        match self {
            ValueType::None => Value::None,
            ValueType::Bool => Value::Bool(false),
            ValueType::Int => Value::Int(0),
            ValueType::Float => Value::Float(0.0),
            ValueType::Vec3 => Value::Vec3(Vec3::ZERO),
            ValueType::Text => Value::Text(String::new()),
        }
    }

    /// Check if values of this type can be interpolated
    pub fn is_interpolable(&self) -> bool {
        matches!(self, ValueType::Float | ValueType::Vec3)
    }
}

impl Default for ValueType {
    fn default() -> Self {
        Self::None
    }
}

/// Runtime value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// No value
    None,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i32),
    /// Float
    Float(f32),
    /// 3D vector
    Vec3(Vec3),
    /// Text
    Text(String),
}

impl Value {
    /// Get the type of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::None => ValueType::None,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Vec3(_) => ValueType::Vec3,
            Value::Text(_) => ValueType::Text,
        }
    }

    /// Try to convert to bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// Try to convert to int
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) => Some(*f as i32),
            Value::Bool(b) => Some(if *b { 1 } else { 0 }),
            _ => None,
        }
    }

    /// Try to convert to float
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f32),
            _ => None,
        }
    }

    /// Try to get as vec3
    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            Value::Vec3(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Interpolate between two values.
    ///
    /// Floats and vectors interpolate linearly; discrete values switch to
    /// `to` once `alpha` reaches 0.5.
    pub fn lerp(from: &Value, to: &Value, alpha: f32) -> Value {
        match (from, to) {
            (Value::Float(a), Value::Float(b)) => Value::Float(a + (b - a) * alpha),
            (Value::Vec3(a), Value::Vec3(b)) => Value::Vec3(a.lerp(*b, alpha)),
            _ => {
                if alpha >= 0.5 {
                    to.clone()
                } else {
                    from.clone()
                }
            }
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversions() {
        let int_val = Value::Int(42);
        assert_eq!(int_val.as_int(), Some(42));
        assert_eq!(int_val.as_float(), Some(42.0));
        assert_eq!(int_val.as_bool(), Some(true));

        let float_val = Value::Float(3.5);
        assert_eq!(float_val.as_int(), Some(3));
        assert_eq!(float_val.as_float(), Some(3.5));
    }

    #[test]
    fn test_lerp_numeric() {
        let out = Value::lerp(&Value::Float(0.0), &Value::Float(10.0), 0.25);
        assert_eq!(out, Value::Float(2.5));

        let out = Value::lerp(&Value::Vec3(Vec3::ZERO), &Value::Vec3(Vec3::X), 0.5);
        assert_eq!(out, Value::Vec3(Vec3::new(0.5, 0.0, 0.0)));
    }

    #[test]
    fn test_lerp_discrete_snaps_at_half() {
        let a = Value::Text("near".into());
        let b = Value::Text("far".into());
        assert_eq!(Value::lerp(&a, &b, 0.49), a);
        assert_eq!(Value::lerp(&a, &b, 0.5), b);
    }
}
