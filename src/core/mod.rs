pub mod middleware;

use serde::Deserialize;

/// Error payload shape shared by the Google REST APIs this crate talks to.
#[derive(Debug, Deserialize)]
pub struct GoogleErrorResponse {
    pub error: GoogleErrorDetails,
}

#[derive(Debug, Deserialize)]
pub struct GoogleErrorDetails {
    pub code: u16,
    pub message: String,
    pub status: Option<String>,
}

impl GoogleErrorResponse {
    pub fn display_message(&self) -> String {
        format!("{} (code: {})", self.error.message, self.error.code)
    }
}

pub async fn parse_error_response(response: reqwest::Response, default_msg: &str) -> String {
    let status = response.status();
    match response.json::<GoogleErrorResponse>().await {
        Ok(error_resp) => error_resp.display_message(),
        Err(_) => format!("{}: {}", default_msg, status),
    }
}
