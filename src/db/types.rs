//! Decoders for the two composite types CREDO stores: `vector3d` (atom
//! coordinates, ring centroids and normals) and the 12-dimensional `cube`
//! holding USR shape descriptors.
//!
//! Both are projected as `::text` by the entity layer (the cube extension has
//! no binary output function), so decoding parses the textual form.

use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgTypeInfo, PgValueRef};
use sqlx::{Decode, Postgres, Type};

use crate::error::CredoError;

pub const VECTOR3D_TYPE: &str = "vector3d";
pub const CUBE_TYPE: &str = "cube";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vector3d(pub Vector3<f64>);

impl Vector3d {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self(Vector3::new(x, y, z))
    }

    pub fn distance(&self, other: &Vector3d) -> f64 {
        (self.0 - other.0).norm()
    }

    /// Angle between the two vectors in degrees.
    pub fn angle_to(&self, other: &Vector3d) -> f64 {
        self.0.angle(&other.0).to_degrees()
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.0.x, self.0.y, self.0.z]
    }
}

impl Deref for Vector3d {
    type Target = Vector3<f64>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for Vector3d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.0.x, self.0.y, self.0.z)
    }
}

impl FromStr for Vector3d {
    type Err = CredoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = parse_tuple(s)?;
        match values.as_slice() {
            [x, y, z] => Ok(Vector3d::new(*x, *y, *z)),
            other => Err(CredoError::Decode(format!(
                "vector3d expects 3 components, found {}",
                other.len()
            ))),
        }
    }
}

/// A cube value. USR shape spaces are stored as zero-volume (point) cubes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cube {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Cube {
    pub fn point(coords: Vec<f64>) -> Self {
        Self {
            upper: coords.clone(),
            lower: coords,
        }
    }

    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self, CredoError> {
        if lower.len() != upper.len() {
            return Err(CredoError::Decode(format!(
                "cube corners differ in dimension ({} vs {})",
                lower.len(),
                upper.len()
            )));
        }
        Ok(Self { lower, upper })
    }

    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    pub fn is_point(&self) -> bool {
        self.lower == self.upper
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// Grows every dimension by `radius` on both sides, like `cube_enlarge`.
    pub fn enlarge(&self, radius: f64) -> Cube {
        Cube {
            lower: self.lower.iter().map(|v| v - radius).collect(),
            upper: self.upper.iter().map(|v| v + radius).collect(),
        }
    }

    /// Cube containment (`self <@ other`).
    pub fn is_contained_in(&self, other: &Cube) -> bool {
        self.dim() == other.dim()
            && self
                .lower
                .iter()
                .zip(&other.lower)
                .all(|(inner, outer)| inner >= outer)
            && self
                .upper
                .iter()
                .zip(&other.upper)
                .all(|(inner, outer)| inner <= outer)
    }
}

impl fmt::Display for Cube {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |values: &[f64]| {
            values
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        if self.is_point() {
            write!(f, "({})", join(&self.lower))
        } else {
            write!(f, "({}),({})", join(&self.lower), join(&self.upper))
        }
    }
}

impl FromStr for Cube {
    type Err = CredoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.split_once("),(") {
            Some((lower, upper)) => {
                let lower = parse_tuple(&format!("{lower})"))?;
                let upper = parse_tuple(&format!("({upper}"))?;
                Cube::new(lower, upper)
            }
            None => Ok(Cube::point(parse_tuple(trimmed)?)),
        }
    }
}

fn parse_tuple(s: &str) -> Result<Vec<f64>, CredoError> {
    let inner = s
        .trim()
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(|| CredoError::Decode(format!("malformed tuple '{s}'")))?;

    inner
        .split(',')
        .map(|field| {
            field
                .trim()
                .parse::<f64>()
                .map_err(|e| CredoError::Decode(format!("invalid float '{field}': {e}")))
        })
        .collect()
}

macro_rules! text_decoded {
    ($ty:ty) => {
        impl Type<Postgres> for $ty {
            fn type_info() -> PgTypeInfo {
                <String as Type<Postgres>>::type_info()
            }

            fn compatible(ty: &PgTypeInfo) -> bool {
                <&str as Type<Postgres>>::compatible(ty)
            }
        }

        impl<'r> Decode<'r, Postgres> for $ty {
            fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
                let text = <&str as Decode<Postgres>>::decode(value)?;
                Ok(text.parse::<$ty>()?)
            }
        }
    };
}

text_decoded!(Vector3d);
text_decoded!(Cube);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vector3d() {
        let v: Vector3d = "(1.5,-2,3.25)".parse().expect("vector");
        assert_eq!(v.to_array(), [1.5, -2.0, 3.25]);
        assert_eq!(v.to_string(), "(1.5,-2,3.25)");
    }

    #[test]
    fn rejects_wrong_arity() {
        let err = "(1,2)".parse::<Vector3d>().expect_err("arity");
        assert!(err.to_string().contains("3 components"));
        assert!("1,2,3".parse::<Vector3d>().is_err());
    }

    #[test]
    fn vector_arithmetic() {
        let a = Vector3d::new(0.0, 0.0, 0.0);
        let b = Vector3d::new(3.0, 4.0, 0.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-12);
        let x = Vector3d::new(1.0, 0.0, 0.0);
        let y = Vector3d::new(0.0, 1.0, 0.0);
        assert!((x.angle_to(&y) - 90.0).abs() < 1e-9);
    }

    #[test]
    fn parses_point_cube() {
        let text = "(1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12)";
        let cube: Cube = text.parse().expect("cube");
        assert_eq!(cube.dim(), 12);
        assert!(cube.is_point());
        assert_eq!(cube.lower()[11], 12.0);
    }

    #[test]
    fn parses_box_cube() {
        let cube: Cube = "(0, 1),(2, 3)".parse().expect("cube");
        assert!(!cube.is_point());
        assert_eq!(cube.lower(), &[0.0, 1.0]);
        assert_eq!(cube.upper(), &[2.0, 3.0]);
        assert_eq!(cube.to_string(), "(0, 1),(2, 3)");
    }

    #[test]
    fn enlarged_point_contains_neighbours() {
        let probe = Cube::point(vec![1.0; 12]).enlarge(0.75);
        let near = Cube::point(vec![1.5; 12]);
        let far = Cube::point(vec![2.0; 12]);
        assert!(near.is_contained_in(&probe));
        assert!(!far.is_contained_in(&probe));
    }
}
