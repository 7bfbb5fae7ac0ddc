//! Insert tray layouts inside an outer box.
//!
//! An insert is a partitioned tray holding one part per cell. The part
//! stands on a chosen axis, trays stack on top of each other, and weight is
//! irrelevant. That is the orientation search with one fixed vertical axis
//! and no payload gating, so this module only translates its result.

use serde::Serialize;
use utoipa::ToSchema;

use crate::model::{DimensionedBox, ItemAxis, Orientation, OrientationConstraint, ValidationError};
use crate::optimizer::{NoFitFound, OptimizeOutcome, PackingConfig, optimize_with_config};

/// Cell grid of one insert tray and how many trays stack in the box.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct InsertLayout {
    pub standing: ItemAxis,
    /// Part dimensions along the outer box axes; also the cell size
    pub cell: Orientation,
    /// Cells along the outer box length
    pub columns: u64,
    /// Cells along the outer box width
    pub rows: u64,
    pub units_per_layer: u64,
    /// Trays stacked along the outer box height
    pub layers: u64,
    pub total_units: u64,
    /// Height of one tray, equal to the cell height
    pub tray_height: f64,
    /// Share of the box floor covered by cells
    pub layer_area_utilization_pct: f64,
    pub volume_utilization_pct: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum InsertOutcome {
    Designed(InsertLayout),
    NoFit(NoFitFound),
}

/// Lays out an insert for `part` standing on `standing` inside `outer_box`.
///
/// The footprint may turn by 90° if that fits more cells per tray.
pub fn design_insert(
    part: &DimensionedBox,
    outer_box: &DimensionedBox,
    standing: ItemAxis,
    config: PackingConfig,
) -> Result<InsertOutcome, ValidationError> {
    let config = PackingConfig {
        orientation: OrientationConstraint::Vertical(standing),
        ..config
    };

    let result = match optimize_with_config(part, outer_box, false, config)? {
        OptimizeOutcome::Fitted(result) => result,
        OptimizeOutcome::NoFit(no_fit) => return Ok(InsertOutcome::NoFit(no_fit)),
    };

    let fit = &result.best;
    let units_per_layer = fit.count_along_length.saturating_mul(fit.count_along_width);
    let cell_area = fit.orientation.as_dims().base_area();
    let floor_area = outer_box.dims().base_area();

    Ok(InsertOutcome::Designed(InsertLayout {
        standing,
        cell: fit.orientation,
        columns: fit.count_along_length,
        rows: fit.count_along_width,
        units_per_layer,
        layers: fit.count_along_height,
        total_units: fit.units_loaded,
        tray_height: fit.orientation.along_height,
        layer_area_utilization_pct: units_per_layer as f64 * cell_area / floor_area * 100.0,
        volume_utilization_pct: fit.volume_utilization_pct,
    }))
}
