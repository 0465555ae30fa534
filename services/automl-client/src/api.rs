//! Typed client for the AutoML backend REST API

use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::io::{HttpClient, HttpResponse};
use crate::types::{
    CleanRequest, CleanResponse, EdaRequest, EdaResponse, ErrorBody, ExplainRequest,
    ExplainResponse, ExportFormat, ExportIpynbRequest, ExportPdfRequest, GraphKind,
    MetricsResponse, PdfReport, SessionDataResponse, SessionId, SessionRequest, SuggestRequest,
    SuggestResponse, TrainOptions, TrainRequest, TrainResponse, TransformOptions,
    TransformRequest, TransformResponse, UploadResponse,
};

/// Dataset extensions the backend accepts
pub const SUPPORTED_EXTENSIONS: [&str; 2] = ["csv", "xlsx"];

/// Client for every endpoint the guided workflow uses
pub struct AutomlClient {
    base_url: String,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for AutomlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutomlClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AutomlClient {
    pub fn new(base_url: &str, http: Arc<dyn HttpClient>) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        tracing::debug!("Created AutomlClient for {}", base_url);
        Self { base_url, http }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// The health-check URL used by the wake-up monitor
    pub fn ping_url(&self) -> String {
        self.url("/ping")
    }

    pub async fn ping(&self) -> crate::Result<()> {
        let response = self.http.get(&self.ping_url(), &[]).await?;
        check_status(response).map(|_| ())
    }

    /// Upload a dataset file read from disk
    pub async fn upload_file(&self, path: &Path) -> crate::Result<UploadResponse> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                crate::ClientError::InvalidInput(format!("{:?} has no file name", path))
            })?
            .to_string();
        validate_dataset_name(&file_name)?;
        let bytes = tokio::fs::read(path).await?;
        self.upload_bytes(&file_name, bytes).await
    }

    /// Upload dataset contents under the given file name
    pub async fn upload_bytes(&self, file_name: &str, bytes: Vec<u8>) -> crate::Result<UploadResponse> {
        validate_dataset_name(file_name)?;
        tracing::debug!("Uploading '{}' ({} bytes)", file_name, bytes.len());
        let response = self
            .http
            .post_multipart(&self.url("/upload/file"), "file", file_name, bytes)
            .await?;
        let upload: UploadResponse = parse_json(response)?;
        tracing::info!("Uploaded '{}' as session {}", file_name, upload.session_id);
        Ok(upload)
    }

    pub async fn clean(&self, request: &CleanRequest) -> crate::Result<CleanResponse> {
        self.post("/pipeline/clean", request).await
    }

    /// Ask for null counts and column lists without changing the data
    pub async fn clean_metadata(&self, session_id: &SessionId) -> crate::Result<CleanResponse> {
        self.clean(&CleanRequest {
            session_id: session_id.clone(),
            fill_strategies: Default::default(),
            target_column: String::new(),
        })
        .await
    }

    pub async fn eda(
        &self,
        session_id: &SessionId,
        target_column: Option<String>,
    ) -> crate::Result<EdaResponse> {
        self.post(
            "/pipeline/eda",
            &EdaRequest {
                session_id: session_id.clone(),
                target_column,
            },
        )
        .await
    }

    pub async fn transform(
        &self,
        session_id: &SessionId,
        options: TransformOptions,
    ) -> crate::Result<TransformResponse> {
        self.post(
            "/pipeline/transform",
            &TransformRequest {
                session_id: session_id.clone(),
                options,
            },
        )
        .await
    }

    pub async fn train(
        &self,
        session_id: &SessionId,
        options: TrainOptions,
    ) -> crate::Result<TrainResponse> {
        self.post(
            "/pipeline/train",
            &TrainRequest {
                session_id: session_id.clone(),
                options,
            },
        )
        .await
    }

    pub async fn metrics(&self, session_id: &SessionId) -> crate::Result<MetricsResponse> {
        let response = self
            .http
            .get(
                &self.url("/pipeline/metrics"),
                &[("session_id", session_id.as_str())],
            )
            .await?;
        parse_json(response)
    }

    pub async fn explain(
        &self,
        session_id: &SessionId,
        model_key: &str,
    ) -> crate::Result<ExplainResponse> {
        self.post(
            "/pipeline/explain",
            &ExplainRequest {
                session_id: session_id.clone(),
                model_key: model_key.to_string(),
            },
        )
        .await
    }

    pub async fn session_data(&self, session_id: &SessionId) -> crate::Result<SessionDataResponse> {
        self.post(
            "/pipeline/data",
            &SessionRequest {
                session_id: session_id.clone(),
            },
        )
        .await
    }

    /// Render a chart; returns the image bytes
    pub async fn graph(
        &self,
        kind: GraphKind,
        session_id: &SessionId,
        params: &[(String, String)],
    ) -> crate::Result<Vec<u8>> {
        let mut query: Vec<(&str, &str)> = vec![("session_id", session_id.as_str())];
        query.extend(
            params
                .iter()
                .filter(|(key, _)| key != "session_id")
                .map(|(key, value)| (key.as_str(), value.as_str())),
        );
        let path = format!("/graph/{}", kind.path());
        let response = self.http.get(&self.url(&path), &query).await?;
        Ok(check_status(response)?.body)
    }

    pub async fn export_pdf(&self, session_id: &SessionId, report: PdfReport) -> crate::Result<Vec<u8>> {
        self.post_bytes(
            "/export/pdf",
            &ExportPdfRequest {
                session_id: session_id.clone(),
                report,
            },
        )
        .await
    }

    pub async fn export_ipynb(
        &self,
        session_id: &SessionId,
        code_steps: Vec<String>,
    ) -> crate::Result<Vec<u8>> {
        self.post_bytes(
            "/export/ipynb",
            &ExportIpynbRequest {
                session_id: session_id.clone(),
                code_steps,
            },
        )
        .await
    }

    pub async fn export(&self, format: ExportFormat, session_id: &SessionId) -> crate::Result<Vec<u8>> {
        match format {
            ExportFormat::Pdf => self.export_pdf(session_id, PdfReport::default()).await,
            ExportFormat::Ipynb => self.export_ipynb(session_id, Vec::new()).await,
        }
    }

    /// Ask the assistant a question about the given pipeline page
    pub async fn suggest(
        &self,
        session_id: &SessionId,
        question: &str,
        page: &str,
    ) -> crate::Result<SuggestResponse> {
        let question = question.trim();
        if question.is_empty() {
            return Err(crate::ClientError::InvalidInput(
                "question must not be empty".to_string(),
            ));
        }
        self.post(
            "/groq/suggest",
            &SuggestRequest {
                session_id: session_id.clone(),
                question: question.to_string(),
                page: page.to_string(),
            },
        )
        .await
    }

    async fn post<Req, Resp>(&self, path: &str, request: &Req) -> crate::Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let body = serde_json::to_value(request)?;
        let response = self.http.post_json(&self.url(path), &body).await?;
        parse_json(response)
    }

    async fn post_bytes<Req>(&self, path: &str, request: &Req) -> crate::Result<Vec<u8>>
    where
        Req: Serialize + Sync,
    {
        let body = serde_json::to_value(request)?;
        let response = self.http.post_json(&self.url(path), &body).await?;
        Ok(check_status(response)?.body)
    }
}

/// Only `.csv` and `.xlsx` datasets are accepted
pub fn validate_dataset_name(file_name: &str) -> crate::Result<()> {
    let supported = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false);

    if supported {
        Ok(())
    } else {
        Err(crate::ClientError::InvalidInput(format!(
            "'{}' is not a .csv or .xlsx file",
            file_name
        )))
    }
}

fn check_status(response: HttpResponse) -> crate::Result<HttpResponse> {
    if response.is_success() {
        return Ok(response);
    }

    let detail = match serde_json::from_slice::<ErrorBody>(&response.body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(message),
        }) => message,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) => response.text(),
    };
    Err(crate::ClientError::Api {
        status: response.status,
        detail,
    })
}

fn parse_json<T: DeserializeOwned>(response: HttpResponse) -> crate::Result<T> {
    let response = check_status(response)?;
    Ok(serde_json::from_slice(&response.body)?)
}
