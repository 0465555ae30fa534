//! Request and response payloads for the AutoML backend

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One preview row, column name to cell value
pub type Row = serde_json::Map<String, Value>;

/// Opaque backend session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Column type as inferred by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferredType {
    Numerical,
    Categorical,
    Boolean,
    Datetime,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaItem {
    pub column: String,
    pub dtype: String,
    pub inferred_type: InferredType,
    pub null_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub session_id: SessionId,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub preview: Vec<Row>,
    #[serde(default)]
    pub schema: Vec<SchemaItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanRequest {
    pub session_id: SessionId,
    /// Column name to fill strategy; empty asks for metadata only
    pub fill_strategies: BTreeMap<String, String>,
    pub target_column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanResponse {
    pub session_id: SessionId,
    #[serde(default)]
    pub preview: Vec<Row>,
    #[serde(default)]
    pub before_nulls: BTreeMap<String, u64>,
    #[serde(default)]
    pub after_nulls: BTreeMap<String, u64>,
    #[serde(default)]
    pub numeric_cols: Vec<String>,
    #[serde(default)]
    pub categorical_cols: Vec<String>,
    #[serde(default)]
    pub graph_types: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub rows: u64,
    #[serde(default)]
    pub columns: u64,
    #[serde(default)]
    pub target_column: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdaRequest {
    pub session_id: SessionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_column: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdaResponse {
    pub session_id: SessionId,
    #[serde(default)]
    pub correlation_matrix: BTreeMap<String, BTreeMap<String, Option<f64>>>,
    #[serde(default)]
    pub skewness: BTreeMap<String, Option<f64>>,
    #[serde(default)]
    pub unique_values: BTreeMap<String, u64>,
    #[serde(default)]
    pub class_distribution: BTreeMap<String, Value>,
    #[serde(default)]
    pub numeric_summary: Value,
    #[serde(default)]
    pub num_rows: u64,
    #[serde(default)]
    pub num_columns: u64,
}

/// Transformation options; unset methods are skipped by the backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformOptions {
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub encoding_columns: Vec<String>,
    #[serde(default)]
    pub scaling: Option<String>,
    #[serde(default)]
    pub scaling_columns: Vec<String>,
    #[serde(default)]
    pub balancing: Option<String>,
    #[serde(default)]
    pub balancing_columns: Vec<String>,
    #[serde(default)]
    pub drop_columns: Vec<String>,
    #[serde(default)]
    pub skewness: Option<String>,
    #[serde(default)]
    pub skewness_columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformRequest {
    pub session_id: SessionId,
    #[serde(flatten)]
    pub options: TransformOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformResponse {
    pub session_id: SessionId,
    #[serde(default)]
    pub transformed_preview: Vec<Row>,
    pub shape: (u64, u64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainOptions {
    pub model_key: String,
    #[serde(default)]
    pub hyperparameters: serde_json::Map<String, Value>,
    #[serde(default = "default_test_size")]
    pub test_size: f64,
    #[serde(default = "default_random_state")]
    pub random_state: i64,
    #[serde(default = "default_stratify")]
    pub stratify: bool,
}

impl TrainOptions {
    pub fn new(model_key: impl Into<String>) -> Self {
        Self {
            model_key: model_key.into(),
            hyperparameters: serde_json::Map::new(),
            test_size: default_test_size(),
            random_state: default_random_state(),
            stratify: default_stratify(),
        }
    }
}

fn default_test_size() -> f64 {
    0.2
}

fn default_random_state() -> i64 {
    42
}

fn default_stratify() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainRequest {
    pub session_id: SessionId,
    #[serde(flatten)]
    pub options: TrainOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainResponse {
    pub session_id: SessionId,
    pub model: String,
    #[serde(default)]
    pub params_used: Value,
    #[serde(default)]
    pub evaluation: BTreeMap<String, Value>,
    #[serde(default)]
    pub rows: u64,
    #[serde(default)]
    pub features: u64,
    #[serde(default)]
    pub confusion_matrix: Option<Vec<Vec<f64>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsResponse {
    /// Model name to its evaluation metrics
    #[serde(default)]
    pub metrics: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainRequest {
    pub session_id: SessionId,
    pub model_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainResponse {
    pub session_id: SessionId,
    #[serde(default)]
    pub shap_importance: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default)]
    pub data: Vec<Row>,
    #[serde(default)]
    pub meta: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDataResponse {
    pub session_id: SessionId,
    pub session_data: SessionData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestRequest {
    pub session_id: SessionId,
    pub question: String,
    pub page: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestResponse {
    pub answer: String,
}

/// Extra report content for the PDF export
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PdfReport {
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
    #[serde(default)]
    pub metrics: serde_json::Map<String, Value>,
    #[serde(default)]
    pub tips: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportPdfRequest {
    pub session_id: SessionId,
    #[serde(flatten)]
    pub report: PdfReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportIpynbRequest {
    pub session_id: SessionId,
    #[serde(default)]
    pub code_steps: Vec<String>,
}

/// Error body returned by the backend on failures
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    pub detail: Value,
}

/// Charts the backend can render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GraphKind {
    #[serde(rename = "histogram")]
    Histogram,
    #[serde(rename = "bar")]
    Bar,
    #[serde(rename = "pie")]
    Pie,
    #[serde(rename = "boxplot")]
    Boxplot,
    #[serde(rename = "qq")]
    Qq,
    #[serde(rename = "scatter")]
    Scatter,
    #[serde(rename = "line")]
    Line,
    #[serde(rename = "heatmap")]
    Heatmap,
    #[serde(rename = "roc_plot")]
    RocPlot,
    #[serde(rename = "compare-models")]
    CompareModels,
    #[serde(rename = "shap-summary")]
    ShapSummary,
}

impl GraphKind {
    pub const ALL: [GraphKind; 11] = [
        GraphKind::Histogram,
        GraphKind::Bar,
        GraphKind::Pie,
        GraphKind::Boxplot,
        GraphKind::Qq,
        GraphKind::Scatter,
        GraphKind::Line,
        GraphKind::Heatmap,
        GraphKind::RocPlot,
        GraphKind::CompareModels,
        GraphKind::ShapSummary,
    ];

    /// Path segment under `/graph/`
    pub fn path(&self) -> &'static str {
        match self {
            GraphKind::Histogram => "histogram",
            GraphKind::Bar => "bar",
            GraphKind::Pie => "pie",
            GraphKind::Boxplot => "boxplot",
            GraphKind::Qq => "qq",
            GraphKind::Scatter => "scatter",
            GraphKind::Line => "line",
            GraphKind::Heatmap => "heatmap",
            GraphKind::RocPlot => "roc_plot",
            GraphKind::CompareModels => "compare-models",
            GraphKind::ShapSummary => "shap-summary",
        }
    }
}

impl fmt::Display for GraphKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for GraphKind {
    type Err = crate::ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        GraphKind::ALL
            .into_iter()
            .find(|kind| kind.path().replace('_', "-") == wanted)
            .ok_or_else(|| crate::ClientError::InvalidInput(format!("unknown graph type '{}'", s)))
    }
}

/// Downloadable artifact formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Pdf,
    Ipynb,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Ipynb => "ipynb",
        }
    }

    /// File name used when the caller does not pick one
    pub fn default_file_name(&self, session_id: &SessionId) -> String {
        format!("{}_export.{}", session_id, self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = crate::ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(ExportFormat::Pdf),
            "ipynb" | "notebook" => Ok(ExportFormat::Ipynb),
            other => Err(crate::ClientError::InvalidInput(format!(
                "unknown export format '{}'",
                other
            ))),
        }
    }
}
