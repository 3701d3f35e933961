use serde::Deserialize;
use serde_json::Value;
use tradesync_core::ExchangeError;

/// Result of `POST /api/v2/websockets_token/`.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketsToken {
    pub token: String,
    #[serde(default)]
    pub valid_sec: u64,
    #[serde(default)]
    pub user_id: Option<u64>,
}

/// One row of `POST /api/v2/account_balances/`.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountBalance {
    pub currency: String,
    #[serde(default)]
    pub total: String,
    #[serde(default)]
    pub available: String,
    #[serde(default)]
    pub reserved: String,
}

/// Error payload. Bitstamp sends it with 4xx statuses and, for some
/// endpoints, with 200.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BitstampErrorBody {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub reason: Option<Value>,
    #[serde(default)]
    pub code: Option<String>,
}

impl BitstampErrorBody {
    /// Extract the error payload from a response body, if it is one.
    pub fn detect(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let is_error = obj.get("status").and_then(Value::as_str) == Some("error")
            || obj
                .get("code")
                .and_then(Value::as_str)
                .is_some_and(|c| c.starts_with("API"));
        if !is_error {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    /// Reason text; Bitstamp uses either a string or a map of field errors.
    pub fn reason_text(&self) -> String {
        match &self.reason {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Object(fields)) => fields
                .iter()
                .map(|(field, errs)| match errs {
                    Value::Array(list) => format!(
                        "{}: {}",
                        field,
                        list.iter()
                            .map(|e| e.as_str().map(str::to_string).unwrap_or_else(|| e.to_string()))
                            .collect::<Vec<_>>()
                            .join(" ")
                    ),
                    other => format!("{}: {}", field, other),
                })
                .collect::<Vec<_>>()
                .join("; "),
            Some(other) => other.to_string(),
            None => "unknown error".to_string(),
        }
    }

    pub fn classify(&self) -> ExchangeError {
        classify_error(self.code.as_deref(), &self.reason_text())
    }
}

/// Map a Bitstamp error code (or, failing that, its reason) onto the shared
/// taxonomy.
///
/// Codes: https://www.bitstamp.net/api/#section/Response-codes
pub fn classify_error(code: Option<&str>, reason: &str) -> ExchangeError {
    let message = match code {
        Some(code) => format!("{} {}", code, reason),
        None => reason.to_string(),
    };

    if let Some(code) = code {
        return match code {
            // IP not allowed, no permission, profile incomplete
            "API0001" | "API0002" | "API0003" | "API0009" => ExchangeError::PermissionDenied(message),
            "API0005" | "API0008" | "API0011" | "API0012" | "API0013" | "API0014"
            | "API0015" | "API0016" => ExchangeError::Authentication(message),
            _ => ExchangeError::Exchange(message),
        };
    }

    let lower = reason.to_ascii_lowercase();
    if lower.contains("invalid signature")
        || lower.contains("authentication failed")
        || lower.contains("api key not found")
    {
        ExchangeError::Authentication(message)
    } else if lower.contains("no permission") || lower.contains("not allowed") {
        ExchangeError::PermissionDenied(message)
    } else {
        ExchangeError::Exchange(message)
    }
}
