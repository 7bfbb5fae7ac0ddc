//! Orientation search for grid packing of one item type into one container.
//!
//! Every distinct axis-aligned orientation of the item is tried against the
//! container. Each one yields a grid of `floor(container / item)` units per
//! axis, optionally capped by the container's payload ceiling. The best
//! orientation is chosen by an explicit total order:
//! - highest volume utilization
//! - then most units loaded
//! - then the lexicographically greatest per-axis count triple
//! - then the earliest orientation in enumeration order

use std::cmp::Ordering;

use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

use crate::geometry::{ceil_div, grid_counts, payload_units};
use crate::model::{
    DimensionedBox, Orientation, OrientationConstraint, ValidationError, distinct_orientations,
};
use crate::types::{Dimensional, EPSILON_GENERAL, Weighted};

/// Tuning parameters for the orientation search.
#[derive(Copy, Clone, Debug)]
pub struct PackingConfig {
    /// Relative tolerance for floor divisions and absolute tolerance for
    /// utilization ties
    pub general_epsilon: f64,
    /// Orientations the search may consider
    pub orientation: OrientationConstraint,
}

impl PackingConfig {
    pub const DEFAULT_GENERAL_EPSILON: f64 = EPSILON_GENERAL;

    /// Creates a builder for a custom configuration.
    pub fn builder() -> PackingConfigBuilder {
        PackingConfigBuilder::default()
    }
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            general_epsilon: Self::DEFAULT_GENERAL_EPSILON,
            orientation: OrientationConstraint::Any,
        }
    }
}

/// Builder for `PackingConfig`.
#[derive(Clone, Debug, Default)]
pub struct PackingConfigBuilder {
    config: PackingConfig,
}

impl PackingConfigBuilder {
    /// Sets the numerical tolerance.
    pub fn general_epsilon(mut self, epsilon: f64) -> Self {
        self.config.general_epsilon = epsilon;
        self
    }

    /// Restricts the orientations considered.
    pub fn orientation(mut self, constraint: OrientationConstraint) -> Self {
        self.config.orientation = constraint;
        self
    }

    pub fn build(self) -> PackingConfig {
        self.config
    }
}

/// Outcome of testing one orientation against one container.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct FitResult {
    pub orientation: Orientation,
    pub count_along_length: u64,
    pub count_along_width: u64,
    pub count_along_height: u64,
    /// Units that fit geometrically
    pub units_by_space: u64,
    /// Units that fit under the payload ceiling; absent for weightless items
    /// and for containers without a ceiling
    pub units_by_payload: Option<u64>,
    /// The binding constraint of the two above
    pub units_loaded: u64,
    /// True when the payload ceiling, not space, limited `units_loaded`
    pub payload_limited: bool,
    pub volume_utilization_pct: f64,
    pub space_utilization_pct: f64,
}

impl FitResult {
    /// Per-axis counts as a triple.
    pub fn counts(&self) -> (u64, u64, u64) {
        (
            self.count_along_length,
            self.count_along_width,
            self.count_along_height,
        )
    }
}

/// Best fit of one item into one container.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct OptimizationResult {
    pub container: DimensionedBox,
    pub item: DimensionedBox,
    pub apply_payload_restriction: bool,
    /// Distinct orientations that were tried
    pub orientations_evaluated: usize,
    pub best: FitResult,
}

impl OptimizationResult {
    /// Containers of this kind needed to ship `total_quantity` units.
    pub fn containers_required(&self, total_quantity: u64) -> Result<u64, ValidationError> {
        units_required_containers(total_quantity, self.best.units_loaded)
    }
}

/// Why nothing could be loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NoFitReason {
    /// The item exceeds the container on some axis in every orientation.
    DimensionsExceedContainer,
    /// A single unit already exceeds the payload capacity.
    TooHeavyForContainer,
}

impl NoFitReason {
    pub fn code(&self) -> &'static str {
        match self {
            NoFitReason::DimensionsExceedContainer => "dimensions_exceed_container",
            NoFitReason::TooHeavyForContainer => "too_heavy_for_container",
        }
    }
}

impl std::fmt::Display for NoFitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoFitReason::DimensionsExceedContainer => write!(
                f,
                "The item does not fit in any orientation. Choose a larger container or a smaller item."
            ),
            NoFitReason::TooHeavyForContainer => write!(
                f,
                "One unit exceeds the payload capacity. Choose a container with a higher payload or lighten the item."
            ),
        }
    }
}

/// A legitimate negative result: nothing can be loaded.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct NoFitFound {
    pub container: DimensionedBox,
    pub item: DimensionedBox,
    pub reason: NoFitReason,
}

impl std::fmt::Display for NoFitFound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "No fit for item {} in {}: {}",
            self.item.display_name(),
            self.container.display_name(),
            self.reason
        )
    }
}

/// Result of a valid optimization request.
#[derive(Clone, Debug, PartialEq)]
pub enum OptimizeOutcome {
    Fitted(OptimizationResult),
    NoFit(NoFitFound),
}

impl OptimizeOutcome {
    pub fn fitted(&self) -> Option<&OptimizationResult> {
        match self {
            OptimizeOutcome::Fitted(result) => Some(result),
            OptimizeOutcome::NoFit(_) => None,
        }
    }

    pub fn is_fit(&self) -> bool {
        self.fitted().is_some()
    }
}

/// Events emitted while searching, for live progress reporting.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum OptimizeEvent {
    /// An orientation produced a usable grid.
    OrientationEvaluated { fit: FitResult },
    /// An orientation fits zero units on at least one axis.
    OrientationRejected {
        orientation: Orientation,
        counts: (u64, u64, u64),
    },
    /// The search picked its best orientation.
    Selected { fit: FitResult },
    /// No orientation can load anything.
    NoFit {
        reason_code: String,
        reason_text: String,
    },
    /// Search finished.
    Finished { evaluated: usize, fitted: bool },
}

/// Finds the best orientation of `item` in `container`.
///
/// With `apply_payload_restriction` the container's payload capacity caps
/// the unit count, unless the item is weightless.
///
/// # Examples
/// ```
/// use packfit::model::DimensionedBox;
/// use packfit::optimizer::{optimize, OptimizeOutcome};
///
/// let item = DimensionedBox::item(1100.0, 900.0, 460.0, 18.0).unwrap();
/// let truck = DimensionedBox::container(9750.0, 2440.0, 2440.0, 16000.0).unwrap();
/// match optimize(&item, &truck, true).unwrap() {
///     OptimizeOutcome::Fitted(result) => assert!(result.best.units_loaded >= 80),
///     OptimizeOutcome::NoFit(no_fit) => panic!("{no_fit}"),
/// }
/// ```
pub fn optimize(
    item: &DimensionedBox,
    container: &DimensionedBox,
    apply_payload_restriction: bool,
) -> Result<OptimizeOutcome, ValidationError> {
    optimize_with_config(
        item,
        container,
        apply_payload_restriction,
        PackingConfig::default(),
    )
}

/// Like `optimize`, with adjustable parameters.
pub fn optimize_with_config(
    item: &DimensionedBox,
    container: &DimensionedBox,
    apply_payload_restriction: bool,
    config: PackingConfig,
) -> Result<OptimizeOutcome, ValidationError> {
    optimize_with_progress(item, container, apply_payload_restriction, config, |_| {})
}

/// Optimization with a live progress callback.
///
/// Calls `on_event` for every orientation and once more with the verdict.
pub fn optimize_with_progress(
    item: &DimensionedBox,
    container: &DimensionedBox,
    apply_payload_restriction: bool,
    config: PackingConfig,
    mut on_event: impl FnMut(&OptimizeEvent),
) -> Result<OptimizeOutcome, ValidationError> {
    item.validate()?;
    container.validate()?;

    let orientations = distinct_orientations(item.dims(), config.orientation);
    let mut best: Option<FitResult> = None;

    for orientation in &orientations {
        let fit = evaluate_orientation(item, container, *orientation, apply_payload_restriction, &config);
        if fit.units_by_space == 0 {
            debug!(?orientation, counts = ?fit.counts(), "orientation rejected");
            on_event(&OptimizeEvent::OrientationRejected {
                orientation: *orientation,
                counts: fit.counts(),
            });
            continue;
        }

        debug!(
            ?orientation,
            units_loaded = fit.units_loaded,
            utilization = fit.volume_utilization_pct,
            "orientation evaluated"
        );
        on_event(&OptimizeEvent::OrientationEvaluated { fit: fit.clone() });
        update_best(&mut best, fit, &config);
    }

    let outcome = match best {
        Some(fit) if fit.units_loaded > 0 => {
            on_event(&OptimizeEvent::Selected { fit: fit.clone() });
            OptimizeOutcome::Fitted(OptimizationResult {
                container: container.clone(),
                item: item.clone(),
                apply_payload_restriction,
                orientations_evaluated: orientations.len(),
                best: fit,
            })
        }
        found => {
            let reason = if found.is_some() {
                NoFitReason::TooHeavyForContainer
            } else {
                NoFitReason::DimensionsExceedContainer
            };
            on_event(&OptimizeEvent::NoFit {
                reason_code: reason.code().to_string(),
                reason_text: reason.to_string(),
            });
            OptimizeOutcome::NoFit(NoFitFound {
                container: container.clone(),
                item: item.clone(),
                reason,
            })
        }
    };

    on_event(&OptimizeEvent::Finished {
        evaluated: orientations.len(),
        fitted: outcome.is_fit(),
    });
    Ok(outcome)
}

/// Computes the fit of one orientation without judging it.
///
/// Inputs are assumed validated.
pub fn evaluate_orientation(
    item: &DimensionedBox,
    container: &DimensionedBox,
    orientation: Orientation,
    apply_payload_restriction: bool,
    config: &PackingConfig,
) -> FitResult {
    let (along_length, along_width, along_height) =
        grid_counts(container.dims(), orientation.as_dims(), config.general_epsilon);
    let units_by_space = along_length
        .saturating_mul(along_width)
        .saturating_mul(along_height);

    // Weightless items and open containers yield None, which keeps them off
    // the payload path.
    let units_by_payload =
        payload_units(container.payload_capacity, item.weight(), config.general_epsilon);

    let units_loaded = match units_by_payload {
        Some(by_payload) if apply_payload_restriction => units_by_space.min(by_payload),
        _ => units_by_space,
    };
    let payload_limited = units_loaded < units_by_space;

    let container_volume = container.volume();
    let volume_utilization_pct = if container_volume > 0.0 {
        units_loaded as f64 * item.volume() / container_volume * 100.0
    } else {
        0.0
    };
    let space_utilization_pct = if units_by_space > 0 {
        units_loaded as f64 / units_by_space as f64 * 100.0
    } else {
        0.0
    };

    FitResult {
        orientation,
        count_along_length: along_length,
        count_along_width: along_width,
        count_along_height: along_height,
        units_by_space,
        units_by_payload,
        units_loaded,
        payload_limited,
        volume_utilization_pct,
        space_utilization_pct,
    }
}

/// Ceiling division of a shipment quantity by the units one container holds.
///
/// # Errors
/// `InvalidDimension` when `units_loaded` is zero.
pub fn units_required_containers(
    total_item_quantity: u64,
    units_loaded: u64,
) -> Result<u64, ValidationError> {
    ceil_div(total_item_quantity, units_loaded).ok_or_else(|| {
        ValidationError::invalid_dimension("units loaded per container must be greater than 0")
    })
}

/// Total order on candidate fits; `Greater` means `a` is the better fit.
pub fn compare_fits(a: &FitResult, b: &FitResult, config: &PackingConfig) -> Ordering {
    compare_with_epsilon(
        a.volume_utilization_pct,
        b.volume_utilization_pct,
        config.general_epsilon,
    )
    .then_with(|| a.units_loaded.cmp(&b.units_loaded))
    .then_with(|| a.counts().cmp(&b.counts()))
}

/// Replaces `best` only on a strict improvement, so earlier orientations
/// win full ties.
fn update_best(best: &mut Option<FitResult>, candidate: FitResult, config: &PackingConfig) {
    match best {
        None => *best = Some(candidate),
        Some(current) => {
            if compare_fits(&candidate, current, config) == Ordering::Greater {
                *best = Some(candidate);
            }
        }
    }
}

/// Compares two values with tolerance.
pub(crate) fn compare_with_epsilon(a: f64, b: f64, eps: f64) -> Ordering {
    if (a - b).abs() <= eps {
        Ordering::Equal
    } else if a < b {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemAxis;

    fn single_axle() -> DimensionedBox {
        DimensionedBox::container(9750.0, 2440.0, 2440.0, 16000.0)
            .unwrap()
            .with_label("32 ft. Single Axle")
    }

    fn outer_box() -> DimensionedBox {
        DimensionedBox::item(1100.0, 900.0, 460.0, 18.0).unwrap()
    }

    fn fitted(outcome: OptimizeOutcome) -> OptimizationResult {
        match outcome {
            OptimizeOutcome::Fitted(result) => result,
            OptimizeOutcome::NoFit(no_fit) => panic!("expected a fit, got: {no_fit}"),
        }
    }

    #[test]
    fn single_axle_scenario_dominates_reference_orientation() {
        let item = outer_box();
        let truck = single_axle();
        let config = PackingConfig::default();

        let reference = evaluate_orientation(
            &item,
            &truck,
            Orientation::new(1100.0, 900.0, 460.0),
            true,
            &config,
        );
        assert_eq!(reference.counts(), (8, 2, 5));
        assert_eq!(reference.units_by_space, 80);
        assert_eq!(reference.units_by_payload, Some(888));
        assert_eq!(reference.units_loaded, 80);
        assert!(!reference.payload_limited);

        let result = fitted(optimize(&item, &truck, true).unwrap());
        assert!(result.best.units_by_space >= 80);
        assert!(result.best.volume_utilization_pct + 1e-9 >= reference.volume_utilization_pct);
        assert_eq!(result.orientations_evaluated, 6);
        assert_eq!(result.container.label.as_deref(), Some("32 ft. Single Axle"));
    }

    #[test]
    fn single_axle_scenario_picks_upright_narrow_side() {
        // 1100 × 460 × 900 along L/W/H gives 8 × 5 × 2 = 80 as well, while
        // 900 × 460 × 1100 gives 10 × 5 × 2 = 100, the maximum.
        let result = fitted(optimize(&outer_box(), &single_axle(), true).unwrap());
        assert_eq!(result.best.units_loaded, 100);
        assert_eq!(result.best.counts(), (10, 5, 2));
        assert_eq!(result.best.orientation, Orientation::new(900.0, 460.0, 1100.0));
    }

    #[test]
    fn orientation_completeness() {
        let truck = DimensionedBox::container(1000.0, 1000.0, 1000.0, 0.0).unwrap();
        let cases = [
            ((100.0, 200.0, 300.0), 6),
            ((100.0, 100.0, 300.0), 3),
            ((100.0, 100.0, 100.0), 1),
        ];
        for ((l, w, h), expected) in cases {
            let item = DimensionedBox::item(l, w, h, 0.0).unwrap();
            let mut evaluated = 0;
            let outcome = optimize_with_progress(
                &item,
                &truck,
                false,
                PackingConfig::default(),
                |event| {
                    if matches!(
                        event,
                        OptimizeEvent::OrientationEvaluated { .. }
                            | OptimizeEvent::OrientationRejected { .. }
                    ) {
                        evaluated += 1;
                    }
                },
            )
            .unwrap();
            assert_eq!(evaluated, expected);
            assert_eq!(fitted(outcome).orientations_evaluated, expected);
        }
    }

    #[test]
    fn fit_monotonicity_in_container_dimensions() {
        let item = outer_box();
        let config = PackingConfig::default();
        let orientation = Orientation::new(1100.0, 900.0, 460.0);
        let mut previous = 0;
        for extra in [0.0, 100.0, 250.0, 460.0, 1100.0, 5000.0] {
            let truck = DimensionedBox::container(7300.0 + extra, 2440.0, 2440.0, 0.0).unwrap();
            let fit = evaluate_orientation(&item, &truck, orientation, false, &config);
            assert!(fit.units_by_space >= previous);
            previous = fit.units_by_space;
        }
    }

    #[test]
    fn payload_gating_never_increases_load() {
        let item = DimensionedBox::item(1100.0, 900.0, 460.0, 250.0).unwrap();
        let truck = single_axle();
        let config = PackingConfig::default();
        for orientation in distinct_orientations(item.dims(), OrientationConstraint::Any) {
            let free = evaluate_orientation(&item, &truck, orientation, false, &config);
            let gated = evaluate_orientation(&item, &truck, orientation, true, &config);
            assert!(free.units_loaded >= gated.units_loaded);
            assert!(gated.units_loaded <= gated.units_by_payload.unwrap());
            assert!(gated.units_loaded <= gated.units_by_space);
        }

        // Every orientation is capped at 64 units, so the count triple decides.
        let gated = fitted(optimize(&item, &truck, true).unwrap());
        assert_eq!(gated.best.units_by_payload, Some(64));
        assert_eq!(gated.best.units_loaded, 64);
        assert_eq!(gated.best.counts(), (21, 2, 2));
        assert!(gated.best.payload_limited);
        assert!((gated.best.space_utilization_pct - 64.0 / 84.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn zero_weight_item_is_never_payload_limited() {
        let item = DimensionedBox::item(1100.0, 900.0, 460.0, 0.0).unwrap();
        let truck = DimensionedBox::container(9750.0, 2440.0, 2440.0, 0.0).unwrap();
        for apply in [true, false] {
            let result = fitted(optimize(&item, &truck, apply).unwrap());
            assert_eq!(result.best.units_loaded, result.best.units_by_space);
            assert_eq!(result.best.units_by_payload, None);
            assert!(!result.best.payload_limited);
        }
    }

    #[test]
    fn container_without_payload_ceiling_is_never_payload_limited() {
        let item = DimensionedBox::item(450.0, 300.0, 220.0, 18.0).unwrap();
        let outer = DimensionedBox {
            payload_capacity: None,
            ..DimensionedBox::container(1120.0, 920.0, 580.0, 0.0).unwrap()
        };
        // 220 × 300 × 450 stands the part on its length: 5 × 3 × 1.
        let result = fitted(optimize(&item, &outer, true).unwrap());
        assert_eq!(result.best.units_loaded, 15);
        assert_eq!(result.best.units_by_payload, None);
        assert!(!result.best.payload_limited);

        let capped = DimensionedBox::container(1120.0, 920.0, 580.0, 0.0).unwrap();
        let outcome = optimize(&item, &capped, true).unwrap();
        assert!(matches!(
            outcome,
            OptimizeOutcome::NoFit(NoFitFound { reason: NoFitReason::TooHeavyForContainer, .. })
        ));
    }

    #[test]
    fn oversized_item_signals_no_fit() {
        let item = DimensionedBox::item(3000.0, 3000.0, 3000.0, 18.0).unwrap();
        let outcome = optimize(&item, &single_axle(), true).unwrap();
        match outcome {
            OptimizeOutcome::NoFit(no_fit) => {
                assert_eq!(no_fit.reason, NoFitReason::DimensionsExceedContainer);
                assert!(no_fit.to_string().contains("larger container"));
            }
            OptimizeOutcome::Fitted(result) => panic!("unexpected fit: {:?}", result.best),
        }
    }

    #[test]
    fn item_heavier_than_payload_signals_no_fit() {
        let item = DimensionedBox::item(100.0, 100.0, 100.0, 20000.0).unwrap();
        let outcome = optimize(&item, &single_axle(), true).unwrap();
        match outcome {
            OptimizeOutcome::NoFit(no_fit) => {
                assert_eq!(no_fit.reason, NoFitReason::TooHeavyForContainer)
            }
            OptimizeOutcome::Fitted(_) => panic!("a unit above payload must not fit"),
        }
        assert!(optimize(&item, &single_axle(), false).unwrap().is_fit());
    }

    #[test]
    fn invalid_inputs_surface_as_validation_errors() {
        let mut item = outer_box();
        item.height = 0.0;
        assert!(matches!(
            optimize(&item, &single_axle(), true),
            Err(ValidationError::InvalidDimension(_))
        ));

        let mut truck = single_axle();
        truck.payload_capacity = Some(-1.0);
        assert!(optimize(&outer_box(), &truck, true).is_err());
    }

    #[test]
    fn ceiling_division() {
        assert_eq!(units_required_containers(1000, 83).unwrap(), 13);
        assert_eq!(units_required_containers(830, 83).unwrap(), 10);
        assert_eq!(units_required_containers(0, 83).unwrap(), 0);
        assert!(matches!(
            units_required_containers(10, 0),
            Err(ValidationError::InvalidDimension(_))
        ));
    }

    #[test]
    fn containers_required_uses_best_load() {
        let result = fitted(optimize(&outer_box(), &single_axle(), true).unwrap());
        assert_eq!(result.containers_required(500).unwrap(), 5);
        assert_eq!(result.containers_required(501).unwrap(), 6);
    }

    #[test]
    fn tie_break_prefers_greatest_count_triple() {
        // In a cubic container every orientation loads 36000 units; the
        // winning triple comes from the last enumerated orientation.
        let item = DimensionedBox::item(30.0, 20.0, 10.0, 0.0).unwrap();
        let container = DimensionedBox::container(600.0, 600.0, 600.0, 0.0).unwrap();
        let result = fitted(optimize(&item, &container, false).unwrap());
        assert_eq!(result.best.units_loaded, 36000);
        assert_eq!(result.best.counts(), (60, 30, 20));
        assert_eq!(result.best.orientation, Orientation::new(10.0, 20.0, 30.0));
    }

    #[test]
    fn determinism_over_repeated_calls() {
        let item = DimensionedBox::item(450.0, 300.0, 220.0, 18.0).unwrap();
        let container = DimensionedBox::container(1120.0, 920.0, 580.0, 200.0).unwrap();
        let first = optimize(&item, &container, true).unwrap();
        for _ in 0..20 {
            assert_eq!(optimize(&item, &container, true).unwrap(), first);
        }
    }

    #[test]
    fn vertical_constraint_limits_search() {
        let item = outer_box();
        let config = PackingConfig::builder()
            .orientation(OrientationConstraint::Vertical(ItemAxis::Height))
            .build();
        let result = fitted(optimize_with_config(&item, &single_axle(), true, config).unwrap());
        assert_eq!(result.orientations_evaluated, 2);
        assert_eq!(result.best.orientation.along_height, 460.0);
        assert_eq!(result.best.counts(), (10, 2, 5));
        assert_eq!(result.best.units_loaded, 100);
    }

    #[test]
    fn progress_reports_selection_and_finish() {
        let mut events = Vec::new();
        let outcome = optimize_with_progress(
            &outer_box(),
            &single_axle(),
            true,
            PackingConfig::default(),
            |event| events.push(event.clone()),
        )
        .unwrap();
        let result = fitted(outcome);
        assert!(matches!(
            events.iter().rev().nth(1),
            Some(OptimizeEvent::Selected { fit }) if *fit == result.best
        ));
        assert!(matches!(
            events.last(),
            Some(OptimizeEvent::Finished { evaluated: 6, fitted: true })
        ));
    }
}
