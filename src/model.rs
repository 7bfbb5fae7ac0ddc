//! Data models for the orientation optimizer.
//!
//! This module defines the fundamental data structures:
//! - `DimensionedBox`: an item to be packed or a container to pack into
//! - `Orientation`: an assignment of item dimensions to container axes
//! - `OrientationConstraint`: which orientations a search may consider

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::{Dimensional, Dims3, Weighted, validation};

/// Validation error for box data and derived calculations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
}

impl ValidationError {
    pub fn invalid_dimension(details: impl Into<String>) -> Self {
        Self::InvalidDimension(details.into())
    }
}

/// Any rectangular solid under evaluation: a shipping box, an insert cell
/// or a truck bed.
///
/// `weight` is the mass of one unit when the box is the item being packed;
/// `payload_capacity` is the mass it may carry when it is the container,
/// absent when the container has no payload ceiling.
/// Dimensions are millimetres, masses kilograms.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "label": "32 ft. Single Axle",
    "length": 9750.0,
    "width": 2440.0,
    "height": 2440.0,
    "payload_capacity": 16000.0
}))]
pub struct DimensionedBox {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_capacity: Option<f64>,
}

impl DimensionedBox {
    /// Creates an item with a per-unit weight after validation.
    ///
    /// # Examples
    /// ```
    /// use packfit::model::DimensionedBox;
    ///
    /// assert!(DimensionedBox::item(1100.0, 900.0, 460.0, 18.0).is_ok());
    /// assert!(DimensionedBox::item(-1100.0, 900.0, 460.0, 18.0).is_err());
    /// ```
    pub fn item(length: f64, width: f64, height: f64, weight: f64) -> Result<Self, ValidationError> {
        let item = Self {
            label: None,
            length,
            width,
            height,
            weight,
            payload_capacity: None,
        };
        item.validate()?;
        Ok(item)
    }

    /// Creates a container with a payload ceiling after validation.
    pub fn container(
        length: f64,
        width: f64,
        height: f64,
        payload_capacity: f64,
    ) -> Result<Self, ValidationError> {
        let container = Self {
            label: None,
            length,
            width,
            height,
            weight: 0.0,
            payload_capacity: Some(payload_capacity),
        };
        container.validate()?;
        Ok(container)
    }

    /// Attaches a display name.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Checks the structural invariants: positive finite dimensions,
    /// non-negative finite weight and capacity.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let prefix = self.label.as_deref().unwrap_or("Box");
        validation::validate_dimensions_3d(self.dims().as_tuple(), prefix)
            .map_err(ValidationError::InvalidDimension)?;
        validation::validate_non_negative(self.weight, &format!("{prefix} weight"))
            .map_err(ValidationError::InvalidDimension)?;
        if let Some(capacity) = self.payload_capacity {
            validation::validate_non_negative(capacity, &format!("{prefix} payload capacity"))
                .map_err(ValidationError::InvalidDimension)?;
        }
        Ok(())
    }

    /// The dimensions as a triple.
    #[inline]
    pub fn dims(&self) -> Dims3 {
        Dims3::new(self.length, self.width, self.height)
    }

    /// Name for logs and messages.
    pub fn display_name(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => format!("{} × {} × {} mm", self.length, self.width, self.height),
        }
    }
}

impl Dimensional for DimensionedBox {
    fn dimensions(&self) -> Dims3 {
        self.dims()
    }
}

impl Weighted for DimensionedBox {
    fn weight(&self) -> f64 {
        self.weight
    }
}

/// One assignment of an item's three dimensions to the container's
/// length, width and height axes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, ToSchema)]
pub struct Orientation {
    pub along_length: f64,
    pub along_width: f64,
    pub along_height: f64,
}

impl Orientation {
    pub const fn new(along_length: f64, along_width: f64, along_height: f64) -> Self {
        Self {
            along_length,
            along_width,
            along_height,
        }
    }

    #[inline]
    pub fn as_dims(&self) -> Dims3 {
        Dims3::new(self.along_length, self.along_width, self.along_height)
    }
}

impl From<Dims3> for Orientation {
    fn from(dims: Dims3) -> Self {
        Self::new(dims.length, dims.width, dims.height)
    }
}

impl Dimensional for Orientation {
    fn dimensions(&self) -> Dims3 {
        self.as_dims()
    }
}

/// Names one of the item's own dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ItemAxis {
    Length,
    Width,
    Height,
}

impl ItemAxis {
    /// Picks this axis' value out of the item dimensions.
    pub fn of(self, dims: Dims3) -> f64 {
        match self {
            ItemAxis::Length => dims.length,
            ItemAxis::Width => dims.width,
            ItemAxis::Height => dims.height,
        }
    }

    /// The other two dimensions, in item order.
    pub fn remaining(self, dims: Dims3) -> (f64, f64) {
        match self {
            ItemAxis::Length => (dims.width, dims.height),
            ItemAxis::Width => (dims.length, dims.height),
            ItemAxis::Height => (dims.length, dims.width),
        }
    }
}

/// Restricts which orientations an optimization may consider.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OrientationConstraint {
    /// Every distinct axis-aligned orientation.
    #[default]
    Any,
    /// The named item dimension stays on the container's height axis;
    /// the footprint may turn.
    Vertical(ItemAxis),
    /// Only the item as given.
    Fixed,
}

impl OrientationConstraint {
    /// Candidate triples for `dims` in a fixed order, duplicates included.
    pub fn candidates(self, dims: Dims3) -> Vec<Dims3> {
        match self {
            OrientationConstraint::Any => dims.permutations().to_vec(),
            OrientationConstraint::Vertical(axis) => {
                let vertical = axis.of(dims);
                let (a, b) = axis.remaining(dims);
                vec![Dims3::new(a, b, vertical), Dims3::new(b, a, vertical)]
            }
            OrientationConstraint::Fixed => vec![dims],
        }
    }
}

/// Collapses candidate triples to their distinct values, keeping the first
/// occurrence of each.
///
/// Exact float equality is intended: two permutations coincide only when
/// the item has equal dimension values.
pub fn distinct_orientations(dims: Dims3, constraint: OrientationConstraint) -> Vec<Orientation> {
    let mut distinct: Vec<Orientation> = Vec::with_capacity(6);
    for candidate in constraint.candidates(dims) {
        let orientation = Orientation::from(candidate);
        if !distinct.contains(&orientation) {
            distinct.push(orientation);
        }
    }
    distinct
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_rejects_non_positive_dimensions() {
        assert!(DimensionedBox::item(0.0, 1.0, 1.0, 1.0).is_err());
        assert!(DimensionedBox::item(1.0, -1.0, 1.0, 1.0).is_err());
        assert!(DimensionedBox::item(1.0, 1.0, f64::NAN, 1.0).is_err());
    }

    #[test]
    fn item_accepts_zero_weight_but_not_negative() {
        assert!(DimensionedBox::item(1.0, 1.0, 1.0, 0.0).is_ok());
        let err = DimensionedBox::item(1.0, 1.0, 1.0, -2.0).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidDimension(_)));
        assert!(err.to_string().contains("weight"));
    }

    #[test]
    fn container_rejects_negative_capacity() {
        assert!(DimensionedBox::container(10.0, 10.0, 10.0, 0.0).is_ok());
        assert!(DimensionedBox::container(10.0, 10.0, 10.0, -1.0).is_err());
    }

    #[test]
    fn container_payload_is_optional_on_the_wire() {
        let open: DimensionedBox =
            serde_json::from_str(r#"{"length": 1120.0, "width": 920.0, "height": 580.0}"#).unwrap();
        assert_eq!(open.payload_capacity, None);
        assert!(open.validate().is_ok());

        let capped: DimensionedBox = serde_json::from_str(
            r#"{"length": 1120.0, "width": 920.0, "height": 580.0, "payload_capacity": 0.0}"#,
        )
        .unwrap();
        assert_eq!(capped.payload_capacity, Some(0.0));
    }

    #[test]
    fn validation_message_uses_label() {
        let truck = DimensionedBox {
            label: Some("22 ft. Truck".to_string()),
            length: 7300.0,
            width: 0.0,
            height: 2440.0,
            weight: 0.0,
            payload_capacity: Some(10000.0),
        };
        let err = truck.validate().unwrap_err();
        assert!(err.to_string().contains("22 ft. Truck width"));
    }

    #[test]
    fn distinct_orientation_counts() {
        let any = OrientationConstraint::Any;
        assert_eq!(distinct_orientations(Dims3::new(1.0, 2.0, 3.0), any).len(), 6);
        assert_eq!(distinct_orientations(Dims3::new(2.0, 2.0, 3.0), any).len(), 3);
        assert_eq!(distinct_orientations(Dims3::new(2.0, 3.0, 2.0), any).len(), 3);
        assert_eq!(distinct_orientations(Dims3::new(4.0, 4.0, 4.0), any).len(), 1);
    }

    #[test]
    fn vertical_constraint_keeps_axis_upright() {
        let dims = Dims3::new(450.0, 300.0, 220.0);
        let upright = distinct_orientations(dims, OrientationConstraint::Vertical(ItemAxis::Length));
        assert_eq!(upright.len(), 2);
        assert!(upright.iter().all(|o| o.along_height == 450.0));

        let square = Dims3::new(300.0, 300.0, 220.0);
        let flat = distinct_orientations(square, OrientationConstraint::Vertical(ItemAxis::Height));
        assert_eq!(flat, vec![Orientation::new(300.0, 300.0, 220.0)]);
    }

    #[test]
    fn fixed_constraint_yields_item_as_given() {
        let dims = Dims3::new(1.0, 2.0, 3.0);
        assert_eq!(
            distinct_orientations(dims, OrientationConstraint::Fixed),
            vec![Orientation::new(1.0, 2.0, 3.0)]
        );
    }
}
