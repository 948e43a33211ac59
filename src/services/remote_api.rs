use crate::error::AppError;
use crate::models::{CatchFormData, PhotoPayload, Submitter, WaypointPayload};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Category of a failed submission, used for user messaging only
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NetworkErrorKind {
    ConnectionFailed,
    Timeout,
    ServerError,
    Unknown,
}

impl NetworkErrorKind {
    /// Text shown once an upload has failed for good
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkErrorKind::ConnectionFailed => {
                "Could not reach the server. Check the connection and retry."
            }
            NetworkErrorKind::Timeout => "The server did not answer in time. Retry later.",
            NetworkErrorKind::ServerError => {
                "The server could not process the upload. Retry later or contact support."
            }
            NetworkErrorKind::Unknown => "The upload failed. Retry later.",
        }
    }
}

impl std::fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            NetworkErrorKind::ConnectionFailed => "connection failed",
            NetworkErrorKind::Timeout => "timeout",
            NetworkErrorKind::ServerError => "server error",
            NetworkErrorKind::Unknown => "unknown error",
        };
        f.write_str(text)
    }
}

/// Error returned by a [`RemoteSubmitter`]
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitError {
    pub kind: NetworkErrorKind,
    pub message: String,
}

impl SubmitError {
    pub fn new(kind: NetworkErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for SubmitError {}

impl From<SubmitError> for AppError {
    fn from(e: SubmitError) -> Self {
        AppError::Network(e.to_string())
    }
}

/// Remote submission API, one call per record kind.
///
/// Each call returns the id the server assigned to the created record.
#[async_trait::async_trait]
pub trait RemoteSubmitter: Send + Sync {
    async fn submit_catch(
        &self,
        form: &CatchFormData,
        submitter: &Submitter,
    ) -> Result<String, SubmitError>;

    async fn submit_photo(
        &self,
        photo: &PhotoPayload,
        submitter: &Submitter,
    ) -> Result<String, SubmitError>;

    async fn submit_waypoint(
        &self,
        waypoint: &WaypointPayload,
        submitter: &Submitter,
    ) -> Result<String, SubmitError>;
}

#[derive(Serialize)]
struct SubmissionBody<'a, P: Serialize> {
    #[serde(flatten)]
    payload: &'a P,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
}

#[derive(Deserialize)]
struct CreatedResponse {
    id: String,
}

/// JSON-over-HTTP implementation of [`RemoteSubmitter`]
pub struct HttpSubmitter {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSubmitter {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .tcp_keepalive(Duration::from_secs(30))
            .user_agent(concat!("fangbuch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Network(format!("Client build failed: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// True if the API host answers at all, whatever the status code
    pub async fn is_reachable(&self) -> bool {
        match self.client.head(&self.base_url).send().await {
            Ok(_) => true,
            Err(e) => {
                log::debug!("Reachability probe failed: {}", e);
                false
            }
        }
    }

    async fn post<P: Serialize + Sync>(
        &self,
        path: &str,
        payload: &P,
        submitter: &Submitter,
    ) -> Result<String, SubmitError> {
        let body = SubmissionBody {
            payload,
            device_id: submitter.device_id(),
            username: submitter.username(),
        };

        let response = self
            .client
            .post(self.endpoint(path))
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let kind = if status.is_server_error() {
                NetworkErrorKind::ServerError
            } else {
                NetworkErrorKind::Unknown
            };
            return Err(SubmitError::new(
                kind,
                format!("Server returned status: {}", status),
            ));
        }

        let created = response
            .json::<CreatedResponse>()
            .await
            .map_err(|e| SubmitError::new(NetworkErrorKind::Unknown, format!("Bad response: {}", e)))?;
        Ok(created.id)
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> SubmitError {
    let kind = if e.is_timeout() {
        NetworkErrorKind::Timeout
    } else if e.is_connect() {
        NetworkErrorKind::ConnectionFailed
    } else if e.status().is_some_and(|s| s.is_server_error()) {
        NetworkErrorKind::ServerError
    } else {
        NetworkErrorKind::Unknown
    };
    SubmitError::new(kind, e.to_string())
}

#[async_trait::async_trait]
impl RemoteSubmitter for HttpSubmitter {
    async fn submit_catch(
        &self,
        form: &CatchFormData,
        submitter: &Submitter,
    ) -> Result<String, SubmitError> {
        self.post("catches", form, submitter).await
    }

    async fn submit_photo(
        &self,
        photo: &PhotoPayload,
        submitter: &Submitter,
    ) -> Result<String, SubmitError> {
        self.post("photos", photo, submitter).await
    }

    async fn submit_waypoint(
        &self,
        waypoint: &WaypointPayload,
        submitter: &Submitter,
    ) -> Result<String, SubmitError> {
        self.post("waypoints", waypoint, submitter).await
    }
}
