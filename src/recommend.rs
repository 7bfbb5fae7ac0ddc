//! Client for the generative outer-box recommendation service.
//!
//! The service proposes a box type, material and internal dimensions for a
//! part from a text prompt. It is network- and model-dependent, so every
//! failure is masked behind a static fallback proposal. The optimizer never
//! calls this client; callers may feed `BoxProposal::as_container` into it.
//!
//! The same service also judges which standing axes are feasible for an
//! insert tray, falling back to "all allowed".

use std::time::Duration;

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::config::RecommenderConfig;
use crate::model::{DimensionedBox, ItemAxis, ValidationError};
use crate::types::Dims3;

const FALLBACK_BOX_TYPE: &str = "Fallback Box";
const FALLBACK_MATERIAL: &str = "Corrugated";
const FALLBACK_CAPACITY_KG: f64 = 10.0;
/// Wall allowance added to the part to get the fallback outer dimensions.
const FALLBACK_WALL_ALLOWANCE: (f64, f64, f64) = (40.0, 40.0, 15.0);

fn user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("packfit/{version}")
}

/// How easily the part is damaged in transit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Fragility {
    #[default]
    Low,
    Medium,
    High,
}

/// Part and logistics attributes sent to the service.
#[derive(Clone, Debug, Deserialize, ToSchema)]
#[schema(example = json!({
    "length": 450.0,
    "width": 300.0,
    "height": 220.0,
    "weight": 18.0,
    "fragility": "medium",
    "stacking_allowed": true,
    "annual_quantity": 500,
    "source": "Pune",
    "destination": "Chennai"
}))]
pub struct PartProfile {
    pub length: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub fragility: Fragility,
    #[serde(default)]
    pub stacking_allowed: bool,
    #[serde(default)]
    pub orientation_note: Option<String>,
    #[serde(default = "default_quantity")]
    pub annual_quantity: u64,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub forklift_available: bool,
    #[serde(default)]
    pub forklift_capacity: f64,
}

fn default_quantity() -> u64 {
    1
}

impl PartProfile {
    pub fn validate(&self) -> Result<(), ValidationError> {
        DimensionedBox::item(self.length, self.width, self.height, self.weight).map(|_| ())
    }

    fn dims(&self) -> Dims3 {
        Dims3::new(self.length, self.width, self.height)
    }

    fn prompt(&self) -> String {
        let na = "N/A";
        format!(
            "You are a packaging design expert. Recommend the best outer box type for the given auto part.\n\
             Part: {} x {} x {} mm, {} kg, fragility {:?}, stacking allowed: {}, orientation restrictions: {}, quantity per year: {}.\n\
             Logistics: source {}, destination {}, forklift available: {}, capacity: {} kg.\n\
             Return only JSON: {{\"box\": {{\"type\": string, \"internal\": \"LxWxH mm\", \"external\": \"LxWxH mm\", \"material\": string, \"capacity\": number}}, \"reason\": string}}",
            self.length,
            self.width,
            self.height,
            self.weight,
            self.fragility,
            self.stacking_allowed,
            self.orientation_note.as_deref().unwrap_or(na),
            self.annual_quantity,
            self.source.as_deref().unwrap_or(na),
            self.destination.as_deref().unwrap_or(na),
            self.forklift_available,
            self.forklift_capacity,
        )
    }

    fn orientation_prompt(&self) -> String {
        format!(
            "You are analyzing possible orientations for inserting an auto part into a tray.\n\
             Part: {} x {} x {} mm, {} kg.\n\
             For each part dimension, say whether the part may stand with that dimension vertical.\n\
             Return only JSON: {{\"orientations\": {{\"length\": bool, \"width\": bool, \"height\": bool}}, \"explanation\": string}}",
            self.length, self.width, self.height, self.weight,
        )
    }
}

/// Proposed outer box.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct BoxProposal {
    pub box_type: String,
    #[schema(value_type = [f64; 3], example = json!([1120.0, 920.0, 580.0]))]
    pub internal: (f64, f64, f64),
    #[schema(value_type = [f64; 3], example = json!([1160.0, 960.0, 595.0]))]
    pub external: (f64, f64, f64),
    pub material: String,
    /// Maximum mass the box carries, kg
    pub capacity: f64,
    pub reason: String,
    /// True when the service failed and this is the static default
    pub fallback: bool,
}

impl BoxProposal {
    /// The static proposal used whenever the service is unavailable.
    pub fn fallback_for(profile: &PartProfile) -> Self {
        let (l, w, h) = profile.dims().as_tuple();
        let (dl, dw, dh) = FALLBACK_WALL_ALLOWANCE;
        Self {
            box_type: FALLBACK_BOX_TYPE.to_string(),
            internal: (l, w, h),
            external: (l + dl, w + dw, h + dh),
            material: FALLBACK_MATERIAL.to_string(),
            capacity: FALLBACK_CAPACITY_KG,
            reason: "Fallback: default box selected because the recommendation service was unavailable."
                .to_string(),
            fallback: true,
        }
    }

    /// The proposal's interior as an optimizer container.
    pub fn as_container(&self) -> Result<DimensionedBox, ValidationError> {
        let (l, w, h) = self.internal;
        Ok(DimensionedBox::container(l, w, h, self.capacity)?.with_label(self.box_type.clone()))
    }
}

/// Standing axes the service considers feasible for an insert tray.
///
/// An axis named here is the part dimension kept vertical, as in
/// `design_insert`.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct OrientationAnalysis {
    pub allowed: Vec<ItemAxis>,
    pub explanation: String,
    /// True when the service failed and every axis is assumed feasible
    pub fallback: bool,
}

impl OrientationAnalysis {
    pub fn all_allowed() -> Self {
        Self {
            allowed: vec![ItemAxis::Length, ItemAxis::Width, ItemAxis::Height],
            explanation: "Fallback: assuming all orientations possible.".to_string(),
            fallback: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("recommendation service is not configured")]
    NotConfigured,
    #[error("request to recommendation service failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed recommendation: {0}")]
    Malformed(String),
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    text: String,
}

#[derive(Deserialize)]
struct RawProposal {
    #[serde(rename = "box")]
    proposal: RawBox,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize)]
struct RawBox {
    #[serde(rename = "type")]
    box_type: String,
    internal: RawDims,
    #[serde(default)]
    external: Option<RawDims>,
    #[serde(default)]
    material: Option<String>,
    #[serde(default)]
    capacity: Option<f64>,
}

/// Dimensions arrive either as "1120x920x580 mm" or as a number array.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawDims {
    Text(String),
    Numbers([f64; 3]),
}

impl RawDims {
    fn resolve(&self) -> Result<(f64, f64, f64), RecommendError> {
        let dims = match self {
            RawDims::Text(text) => parse_dimensions_text(text).ok_or_else(|| {
                RecommendError::Malformed(format!("cannot read dimensions from '{text}'"))
            })?,
            RawDims::Numbers([l, w, h]) => (*l, *w, *h),
        };
        if !Dims3::from_tuple(dims).is_valid_dimension() {
            return Err(RecommendError::Malformed(format!(
                "dimensions must be positive, got {dims:?}"
            )));
        }
        Ok(dims)
    }
}

/// Reads "1120 x 920 x 580 mm" (or with `×`) into a triple.
///
/// Each segment contributes its first number only, so trailing notes such
/// as "mm, 5-ply" do not leak into the value. A minus sign directly before
/// the number is kept so that validation can reject it.
pub fn parse_dimensions_text(text: &str) -> Option<(f64, f64, f64)> {
    let values: Vec<f64> = text
        .split(['x', 'X', '×'])
        .filter(|segment| segment.contains(|c: char| c.is_ascii_digit()))
        .map(first_number)
        .collect::<Option<_>>()?;
    match values.as_slice() {
        [l, w, h] => Some((*l, *w, *h)),
        _ => None,
    }
}

fn first_number(segment: &str) -> Option<f64> {
    let start = segment.find(|c: char| c.is_ascii_digit())?;
    let rest = &segment[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    let value: f64 = rest[..end].parse().ok()?;
    if segment[..start].trim_end().ends_with('-') {
        Some(-value)
    } else {
        Some(value)
    }
}

/// Strips a surrounding code fence (with optional language tag).
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parses the service's proposal text.
pub fn parse_proposal(text: &str, profile: &PartProfile) -> Result<BoxProposal, RecommendError> {
    let raw: RawProposal = serde_json::from_str(extract_json(text))
        .map_err(|err| RecommendError::Malformed(err.to_string()))?;
    if raw.proposal.box_type.trim().is_empty() {
        return Err(RecommendError::Malformed("box type is empty".to_string()));
    }

    let internal = raw.proposal.internal.resolve()?;
    let external = match &raw.proposal.external {
        Some(dims) => dims.resolve()?,
        None => BoxProposal::fallback_for(profile).external,
    };

    Ok(BoxProposal {
        box_type: raw.proposal.box_type,
        internal,
        external,
        material: raw
            .proposal
            .material
            .unwrap_or_else(|| FALLBACK_MATERIAL.to_string()),
        capacity: raw
            .proposal
            .capacity
            .filter(|capacity| capacity.is_finite() && *capacity >= 0.0)
            .unwrap_or(FALLBACK_CAPACITY_KG),
        reason: raw.reason.unwrap_or_default(),
        fallback: false,
    })
}

#[derive(Deserialize)]
struct RawOrientationAnalysis {
    orientations: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    explanation: Option<String>,
}

/// Parses the service's orientation verdicts.
///
/// Accepts booleans or text verdicts ("yes", "✅", ...) keyed by `length`,
/// `length_standing` or `length-standing`, and likewise for the other axes.
pub fn parse_orientation_analysis(text: &str) -> Result<OrientationAnalysis, RecommendError> {
    let raw: RawOrientationAnalysis = serde_json::from_str(extract_json(text))
        .map_err(|err| RecommendError::Malformed(err.to_string()))?;

    let allowed: Vec<ItemAxis> = [
        (ItemAxis::Length, "length"),
        (ItemAxis::Width, "width"),
        (ItemAxis::Height, "height"),
    ]
    .into_iter()
    .filter(|(_, name)| {
        [
            name.to_string(),
            format!("{name}_standing"),
            format!("{name}-standing"),
        ]
        .iter()
        .filter_map(|key| raw.orientations.get(key))
        .any(is_affirmative)
    })
    .map(|(axis, _)| axis)
    .collect();

    if allowed.is_empty() {
        return Err(RecommendError::Malformed(
            "no standing orientation allowed".to_string(),
        ));
    }

    Ok(OrientationAnalysis {
        allowed,
        explanation: raw.explanation.unwrap_or_default(),
        fallback: false,
    })
}

fn is_affirmative(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(flag) => *flag,
        serde_json::Value::String(text) => {
            let text = text.trim().to_lowercase();
            text.contains('✅') || matches!(text.as_str(), "yes" | "true" | "allowed" | "y")
        }
        _ => false,
    }
}

/// HTTP client for the recommendation service.
#[derive(Clone, Debug)]
pub struct RecommendationClient {
    http: reqwest::Client,
    config: RecommenderConfig,
}

impl RecommendationClient {
    pub fn new(config: RecommenderConfig) -> Result<Self, RecommendError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs()))
            .user_agent(user_agent())
            .build()?;
        Ok(Self { http, config })
    }

    /// Asks the service for a box; never fails.
    pub async fn recommend_box(&self, profile: &PartProfile) -> BoxProposal {
        match self.try_recommend_box(profile).await {
            Ok(proposal) => {
                info!(box_type = %proposal.box_type, "box recommendation received");
                proposal
            }
            Err(RecommendError::NotConfigured) => BoxProposal::fallback_for(profile),
            Err(err) => {
                warn!(error = %err, "box recommendation failed, using fallback");
                BoxProposal::fallback_for(profile)
            }
        }
    }

    async fn try_recommend_box(&self, profile: &PartProfile) -> Result<BoxProposal, RecommendError> {
        let text = self.generate(profile.prompt()).await?;
        parse_proposal(&text, profile)
    }

    /// Asks the service which standing axes suit an insert; never fails.
    pub async fn analyze_orientations(&self, profile: &PartProfile) -> OrientationAnalysis {
        let analysis = match self.generate(profile.orientation_prompt()).await {
            Ok(text) => parse_orientation_analysis(&text),
            Err(err) => Err(err),
        };
        match analysis {
            Ok(analysis) => {
                info!(allowed = ?analysis.allowed, "orientation analysis received");
                analysis
            }
            Err(RecommendError::NotConfigured) => OrientationAnalysis::all_allowed(),
            Err(err) => {
                warn!(error = %err, "orientation analysis failed, using fallback");
                OrientationAnalysis::all_allowed()
            }
        }
    }

    async fn generate(&self, prompt: String) -> Result<String, RecommendError> {
        let endpoint = self.config.endpoint().ok_or(RecommendError::NotConfigured)?;

        let mut request = self.http.post(endpoint).json(&GenerateRequest {
            model: self.config.model(),
            prompt,
        });
        if let Some(key) = self.config.api_key() {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?.error_for_status()?;
        let body: GenerateResponse = response.json().await?;
        Ok(body.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> PartProfile {
        serde_json::from_value(json!({
            "length": 450.0,
            "width": 300.0,
            "height": 220.0,
            "weight": 18.0
        }))
        .expect("profile should parse")
    }

    #[test]
    fn profile_defaults_apply() {
        let profile = profile();
        assert_eq!(profile.fragility, Fragility::Low);
        assert_eq!(profile.annual_quantity, 1);
        assert!(profile.validate().is_ok());
        assert!(profile.prompt().contains("450 x 300 x 220 mm"));
    }

    #[test]
    fn fallback_adds_wall_allowance() {
        let proposal = BoxProposal::fallback_for(&profile());
        assert!(proposal.fallback);
        assert_eq!(proposal.box_type, "Fallback Box");
        assert_eq!(proposal.internal, (450.0, 300.0, 220.0));
        assert_eq!(proposal.external, (490.0, 340.0, 235.0));
        assert_eq!(proposal.material, "Corrugated");
        assert_eq!(proposal.capacity, 10.0);
    }

    #[test]
    fn extract_json_strips_fences() {
        assert_eq!(extract_json("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(extract_json("```\n{}\n```"), "{}");
        assert_eq!(extract_json("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn parses_dimension_text() {
        assert_eq!(
            parse_dimensions_text("1120x920x580 mm"),
            Some((1120.0, 920.0, 580.0))
        );
        assert_eq!(
            parse_dimensions_text("1120 × 920 × 580"),
            Some((1120.0, 920.0, 580.0))
        );
        assert_eq!(
            parse_dimensions_text("1120x920x580 mm, 5-ply"),
            Some((1120.0, 920.0, 580.0))
        );
        assert_eq!(
            parse_dimensions_text("-1120 x 920 x 580"),
            Some((-1120.0, 920.0, 580.0))
        );
        assert_eq!(parse_dimensions_text("1120 x 920"), None);
        assert_eq!(parse_dimensions_text("large"), None);
    }

    #[test]
    fn parses_fenced_proposal() {
        let text = "```json\n{\"box\": {\"type\": \"RSC\", \"internal\": \"1120x920x580 mm\", \"external\": [1160, 960, 595], \"material\": \"5-ply\", \"capacity\": 120}, \"reason\": \"Heavy part.\"}\n```";
        let proposal = parse_proposal(text, &profile()).unwrap();
        assert!(!proposal.fallback);
        assert_eq!(proposal.box_type, "RSC");
        assert_eq!(proposal.internal, (1120.0, 920.0, 580.0));
        assert_eq!(proposal.external, (1160.0, 960.0, 595.0));
        assert_eq!(proposal.capacity, 120.0);

        let container = proposal.as_container().unwrap();
        assert_eq!(container.label.as_deref(), Some("RSC"));
        assert_eq!(container.payload_capacity, Some(120.0));
    }

    #[test]
    fn rejects_malformed_proposals() {
        assert!(matches!(
            parse_proposal("not json", &profile()),
            Err(RecommendError::Malformed(_))
        ));
        assert!(matches!(
            parse_proposal("{\"box\": {\"type\": \"RSC\", \"internal\": \"0x0x0\"}}", &profile()),
            Err(RecommendError::Malformed(_))
        ));
        assert!(matches!(
            parse_proposal("{\"box\": {\"type\": \"\", \"internal\": [1, 2, 3]}}", &profile()),
            Err(RecommendError::Malformed(_))
        ));
    }

    #[test]
    fn negative_text_dimensions_are_rejected() {
        let text = r#"{"box": {"type": "RSC", "internal": "-1120x920x580 mm"}}"#;
        assert!(matches!(
            parse_proposal(text, &profile()),
            Err(RecommendError::Malformed(_))
        ));
    }

    #[test]
    fn parses_orientation_verdicts() {
        let text = "```json\n{\"orientations\": {\"length-standing\": \"✅\", \"width\": false, \"height_standing\": \"yes\"}, \"explanation\": \"Flat base.\"}\n```";
        let analysis = parse_orientation_analysis(text).unwrap();
        assert_eq!(analysis.allowed, vec![ItemAxis::Length, ItemAxis::Height]);
        assert_eq!(analysis.explanation, "Flat base.");
        assert!(!analysis.fallback);
    }

    #[test]
    fn orientation_verdicts_need_an_allowed_axis() {
        let text = r#"{"orientations": {"length": "❌", "width": "no", "height": false}}"#;
        assert!(matches!(
            parse_orientation_analysis(text),
            Err(RecommendError::Malformed(_))
        ));
        assert!(parse_orientation_analysis("{}").is_err());
    }

    #[tokio::test]
    async fn unconfigured_client_allows_every_orientation() {
        let client = RecommendationClient::new(RecommenderConfig::default()).unwrap();
        let analysis = client.analyze_orientations(&profile()).await;
        assert_eq!(analysis, OrientationAnalysis::all_allowed());
        assert_eq!(analysis.allowed.len(), 3);
    }

    #[tokio::test]
    async fn unconfigured_client_returns_fallback() {
        let client = RecommendationClient::new(RecommenderConfig::default()).unwrap();
        let proposal = client.recommend_box(&profile()).await;
        assert_eq!(proposal, BoxProposal::fallback_for(&profile()));
    }

    #[tokio::test]
    async fn unreachable_service_returns_fallback() {
        let config = RecommenderConfig::default()
            .with_endpoint("http://127.0.0.1:9/generate")
            .with_timeout_secs(1);
        let client = RecommendationClient::new(config).unwrap();
        let proposal = client.recommend_box(&profile()).await;
        assert!(proposal.fallback);
    }
}
