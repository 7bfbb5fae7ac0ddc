//! Comparison of one item across several candidate containers.
//!
//! Typical use is choosing between truck models for a shipment: each truck
//! is optimized independently, the number of trucks needed for the shipment
//! quantity is derived, and the truck with the best volume utilization is
//! recommended.

use std::cmp::Ordering;

use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::model::{DimensionedBox, ValidationError};
use crate::optimizer::{
    OptimizationResult, OptimizeEvent, OptimizeOutcome, PackingConfig, compare_with_epsilon,
    optimize_with_progress,
};

/// Built-in truck models, payload in kg.
pub fn default_truck_catalog() -> Vec<DimensionedBox> {
    vec![
        DimensionedBox {
            label: Some("32 ft. Single Axle".to_string()),
            length: 9750.0,
            width: 2440.0,
            height: 2440.0,
            weight: 0.0,
            payload_capacity: Some(16000.0),
        },
        DimensionedBox {
            label: Some("32 ft. Multi Axle".to_string()),
            length: 9750.0,
            width: 2440.0,
            height: 2440.0,
            weight: 0.0,
            payload_capacity: Some(21000.0),
        },
        DimensionedBox {
            label: Some("22 ft. Truck".to_string()),
            length: 7300.0,
            width: 2440.0,
            height: 2440.0,
            weight: 0.0,
            payload_capacity: Some(10000.0),
        },
    ]
}

/// One container's verdict within a comparison.
#[derive(Clone, Debug, PartialEq)]
pub struct ContainerEvaluation {
    pub outcome: OptimizeOutcome,
    /// Containers needed for the shipment; `None` when nothing fits
    pub containers_required: Option<u64>,
}

/// Verdicts for all candidates, in input order.
#[derive(Clone, Debug, PartialEq)]
pub struct FleetReport {
    pub evaluations: Vec<ContainerEvaluation>,
    /// Index into `evaluations` of the recommended container
    pub best: Option<usize>,
}

impl FleetReport {
    pub fn best_result(&self) -> Option<&OptimizationResult> {
        self.best
            .and_then(|idx| self.evaluations.get(idx))
            .and_then(|evaluation| evaluation.outcome.fitted())
    }

    pub fn fitted_count(&self) -> usize {
        self.evaluations
            .iter()
            .filter(|evaluation| evaluation.outcome.is_fit())
            .count()
    }
}

/// Summary row for presentation layers.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct FleetSummary {
    pub containers: usize,
    pub fitted: usize,
    pub best_label: Option<String>,
    pub best_units_loaded: Option<u64>,
}

impl From<&FleetReport> for FleetSummary {
    fn from(report: &FleetReport) -> Self {
        let best = report.best_result();
        Self {
            containers: report.evaluations.len(),
            fitted: report.fitted_count(),
            best_label: best.map(|result| result.container.display_name()),
            best_units_loaded: best.map(|result| result.best.units_loaded),
        }
    }
}

/// Optimizes `item` against every container and recommends one.
///
/// Fails on the first invalid input; a container that cannot hold the
/// item is a regular evaluation with a no-fit outcome.
pub fn compare_containers(
    item: &DimensionedBox,
    containers: &[DimensionedBox],
    apply_payload_restriction: bool,
    total_quantity: u64,
    config: PackingConfig,
) -> Result<FleetReport, ValidationError> {
    compare_containers_with_progress(
        item,
        containers,
        apply_payload_restriction,
        total_quantity,
        config,
        |_, _| {},
    )
}

/// Comparison with a live progress callback receiving the container index.
pub fn compare_containers_with_progress(
    item: &DimensionedBox,
    containers: &[DimensionedBox],
    apply_payload_restriction: bool,
    total_quantity: u64,
    config: PackingConfig,
    mut on_event: impl FnMut(usize, &OptimizeEvent),
) -> Result<FleetReport, ValidationError> {
    let mut evaluations = Vec::with_capacity(containers.len());
    for (idx, container) in containers.iter().enumerate() {
        let outcome = optimize_with_progress(
            item,
            container,
            apply_payload_restriction,
            config,
            |event| on_event(idx, event),
        )?;
        let containers_required = match outcome.fitted() {
            Some(result) => Some(result.containers_required(total_quantity)?),
            None => None,
        };
        evaluations.push(ContainerEvaluation {
            outcome,
            containers_required,
        });
    }

    let best = select_best(&evaluations, &config);
    let report = FleetReport { evaluations, best };
    info!(
        containers = report.evaluations.len(),
        fitted = report.fitted_count(),
        best = ?report.best_result().map(|result| result.container.display_name()),
        "fleet comparison finished"
    );
    Ok(report)
}

/// Highest volume utilization, then most units; earlier entries win ties.
fn select_best(evaluations: &[ContainerEvaluation], config: &PackingConfig) -> Option<usize> {
    let mut best: Option<(usize, &OptimizationResult)> = None;
    for (idx, evaluation) in evaluations.iter().enumerate() {
        let Some(candidate) = evaluation.outcome.fitted() else {
            continue;
        };
        let better = match best {
            None => true,
            Some((_, current)) => {
                compare_with_epsilon(
                    candidate.best.volume_utilization_pct,
                    current.best.volume_utilization_pct,
                    config.general_epsilon,
                )
                .then_with(|| candidate.best.units_loaded.cmp(&current.best.units_loaded))
                    == Ordering::Greater
            }
        };
        if better {
            best = Some((idx, candidate));
        }
    }
    best.map(|(idx, _)| idx)
}
