//! reqwest plumbing shared by the completion backends.

use assistant_core::provider::{BackendError, error_chain_any, is_timeout};
use reqwest::{Response, StatusCode};
use serde::Deserialize;

/// Map a transport-level reqwest failure, keeping timeouts distinct.
pub(crate) fn classify(err: reqwest::Error) -> BackendError {
    let timed_out = err.is_timeout()
        || is_timeout(&err)
        || error_chain_any(&err, &|e| {
            e.downcast_ref::<reqwest::Error>()
                .is_some_and(reqwest::Error::is_timeout)
        });

    if timed_out {
        BackendError::Timeout(err.to_string())
    } else {
        BackendError::Transport(Box::new(err))
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default, rename = "type")]
    error_type: Option<String>,
}

/// Turn a non-success response into a backend error.
///
/// 429 becomes `RateLimited` with whatever the provider's `error` object
/// carried; everything else is `Http`.
pub(crate) async fn error_for_status(response: Response) -> BackendError {
    let status = response.status();
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => return classify(e),
    };

    if status == StatusCode::TOO_MANY_REQUESTS {
        let parsed = serde_json::from_str::<ErrorEnvelope>(&body)
            .ok()
            .and_then(|env| env.error)
            .unwrap_or_default();

        return BackendError::RateLimited {
            message: parsed
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "Too many requests".into()),
            code: parsed.code.map(|c| match c {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            }),
            error_type: parsed.error_type,
        };
    }

    BackendError::Http {
        status: status.as_u16(),
        body,
    }
}
