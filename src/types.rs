//! Common types and traits for dimensioned solids.
//!
//! This module defines the reusable dimension triple and the trait
//! abstractions shared by items, containers and orientations.

/// Default relative tolerance for floor divisions and utilization comparisons.
///
/// Large enough to absorb float noise in quotients like `0.3 / 0.1`, small
/// enough to never matter for millimetre inputs.
pub const EPSILON_GENERAL: f64 = 1e-9;

/// A length × width × height triple in millimetres.
///
/// # Examples
/// ```
/// use packfit::types::Dims3;
///
/// let dims = Dims3::new(1100.0, 900.0, 460.0);
/// assert_eq!(dims.volume(), 1100.0 * 900.0 * 460.0);
/// assert_eq!(dims.permutations().len(), 6);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Dims3 {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

impl Dims3 {
    /// Creates a new triple.
    #[inline]
    pub const fn new(length: f64, width: f64, height: f64) -> Self {
        Self {
            length,
            width,
            height,
        }
    }

    /// Converts to tuple format for API compatibility.
    #[inline]
    pub const fn as_tuple(&self) -> (f64, f64, f64) {
        (self.length, self.width, self.height)
    }

    /// Creates from tuple format.
    #[inline]
    pub const fn from_tuple(tuple: (f64, f64, f64)) -> Self {
        Self::new(tuple.0, tuple.1, tuple.2)
    }

    /// Product of all three components.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.length * self.width * self.height
    }

    /// Length × width product.
    #[inline]
    pub fn base_area(&self) -> f64 {
        self.length * self.width
    }

    /// Checks if all components are positive and finite.
    #[inline]
    pub fn is_valid_dimension(&self) -> bool {
        self.length > 0.0
            && self.width > 0.0
            && self.height > 0.0
            && self.length.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }

    /// All six axis assignments of this triple, in a fixed order.
    ///
    /// Order: `(L,W,H) (L,H,W) (W,L,H) (W,H,L) (H,L,W) (H,W,L)`. Entries
    /// may repeat when components are equal.
    pub fn permutations(&self) -> [Dims3; 6] {
        let (l, w, h) = self.as_tuple();
        [
            Self::new(l, w, h),
            Self::new(l, h, w),
            Self::new(w, l, h),
            Self::new(w, h, l),
            Self::new(h, l, w),
            Self::new(h, w, l),
        ]
    }
}

impl From<(f64, f64, f64)> for Dims3 {
    #[inline]
    fn from(tuple: (f64, f64, f64)) -> Self {
        Self::from_tuple(tuple)
    }
}

impl From<Dims3> for (f64, f64, f64) {
    #[inline]
    fn from(dims: Dims3) -> Self {
        dims.as_tuple()
    }
}

impl From<Dims3> for [f64; 3] {
    #[inline]
    fn from(dims: Dims3) -> Self {
        [dims.length, dims.width, dims.height]
    }
}

/// Trait for objects with three spatial dimensions.
pub trait Dimensional {
    /// Returns the dimensions of the object.
    fn dimensions(&self) -> Dims3;

    /// Calculates the volume.
    fn volume(&self) -> f64 {
        self.dimensions().volume()
    }
}

/// Trait for objects with a mass per unit.
pub trait Weighted {
    /// Returns the weight in kg.
    fn weight(&self) -> f64;
}

/// Validation helpers shared by items and containers.
pub mod validation {
    /// Validates a dimension that must be strictly positive.
    ///
    /// # Returns
    /// `Ok(())` for valid values, otherwise error text
    pub fn validate_dimension(value: f64, name: &str) -> Result<(), String> {
        if value.is_nan() {
            return Err(format!("{} must not be NaN", name));
        }
        if value.is_infinite() {
            return Err(format!("{} must not be infinite", name));
        }
        if value <= 0.0 {
            return Err(format!("{} must be positive, got: {}", name, value));
        }
        Ok(())
    }

    /// Validates a mass or capacity that may be zero but not negative.
    pub fn validate_non_negative(value: f64, name: &str) -> Result<(), String> {
        if value.is_nan() {
            return Err(format!("{} must not be NaN", name));
        }
        if value.is_infinite() {
            return Err(format!("{} must not be infinite", name));
        }
        if value < 0.0 {
            return Err(format!("{} must not be negative, got: {}", name, value));
        }
        Ok(())
    }

    /// Validates all three dimensions of a solid.
    pub fn validate_dimensions_3d(dims: (f64, f64, f64), prefix: &str) -> Result<(), String> {
        validate_dimension(dims.0, &format!("{prefix} length"))?;
        validate_dimension(dims.1, &format!("{prefix} width"))?;
        validate_dimension(dims.2, &format!("{prefix} height"))?;
        Ok(())
    }
}
