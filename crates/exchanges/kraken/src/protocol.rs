use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use tradesync_core::{ExchangeError, ExchangeName, Order};

/// Envelope of every Kraken REST response.
#[derive(Debug, Deserialize)]
pub struct KrakenResponse {
    #[serde(default)]
    pub error: Vec<String>,
    #[serde(default)]
    pub result: Option<Value>,
}

impl KrakenResponse {
    /// Split the envelope into its result or a classified error.
    pub fn into_result<T: serde::de::DeserializeOwned>(self) -> Result<T, ExchangeError> {
        if !self.error.is_empty() {
            return Err(classify_errors(&self.error));
        }
        let result = self
            .result
            .ok_or_else(|| ExchangeError::BadResponse("Missing result in Kraken response".into()))?;
        serde_json::from_value(result)
            .map_err(|e| ExchangeError::BadResponse(format!("Unexpected Kraken result: {}", e)))
    }
}

/// Result of `GetWebSocketsToken`.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketsToken {
    pub token: String,
    #[serde(default)]
    pub expires: u64,
}

/// Result of `ClosedOrders`: orders keyed by transaction id, in the order
/// Kraken returned them (most recent first).
#[derive(Debug, Clone, Deserialize)]
pub struct ClosedOrders {
    pub closed: Map<String, Value>,
    #[serde(default)]
    pub count: u64,
}

impl ClosedOrders {
    pub fn into_orders(self) -> Result<Vec<Order>, ExchangeError> {
        self.closed
            .into_iter()
            .map(|(txid, payload)| {
                let opentm = payload
                    .get("opentm")
                    .and_then(Value::as_f64)
                    .ok_or_else(|| {
                        ExchangeError::BadResponse(format!("Order {} has no opentm", txid))
                    })?;
                let datetime = DateTime::<Utc>::from_timestamp_millis((opentm * 1000.0).round() as i64)
                    .ok_or_else(|| {
                        ExchangeError::BadResponse(format!("Order {} has invalid opentm {}", txid, opentm))
                    })?;
                Ok(Order {
                    id: txid,
                    datetime,
                    exchange: ExchangeName::Kraken,
                    payload,
                })
            })
            .collect()
    }
}

/// Map Kraken's `error` array onto the shared taxonomy.
///
/// Kraken error identifiers look like `EAPI:Invalid key`. The first entry decides.
pub fn classify_errors(errors: &[String]) -> ExchangeError {
    let joined = errors.join(", ");
    let first = errors.first().map(String::as_str).unwrap_or_default();

    if first.starts_with("EAPI:Invalid key") || first.starts_with("EAPI:Invalid signature") {
        ExchangeError::Authentication(joined)
    } else if first.starts_with("EGeneral:Permission denied") {
        ExchangeError::PermissionDenied(joined)
    } else if first.starts_with("EAPI:Rate limit exceeded")
        || first.starts_with("EOrder:Rate limit exceeded")
        || first.starts_with("EGeneral:Temporary lockout")
    {
        ExchangeError::RateLimited(joined)
    } else if first.starts_with("EService:")
        || first.starts_with("EDatabase:")
        || first.starts_with("EGeneral:Internal error")
    {
        ExchangeError::Unavailable(joined)
    } else {
        ExchangeError::Exchange(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_classify_errors() {
        assert!(matches!(
            classify_errors(&errs(&["EAPI:Invalid key"])),
            ExchangeError::Authentication(_)
        ));
        assert!(matches!(
            classify_errors(&errs(&["EAPI:Invalid signature"])),
            ExchangeError::Authentication(_)
        ));
        assert!(matches!(
            classify_errors(&errs(&["EGeneral:Permission denied"])),
            ExchangeError::PermissionDenied(_)
        ));
        assert!(matches!(
            classify_errors(&errs(&["EAPI:Rate limit exceeded"])),
            ExchangeError::RateLimited(_)
        ));
        assert!(matches!(
            classify_errors(&errs(&["EService:Unavailable"])),
            ExchangeError::Unavailable(_)
        ));
        // Nonce problems and malformed requests are not a credential verdict
        assert!(matches!(
            classify_errors(&errs(&["EAPI:Invalid nonce"])),
            ExchangeError::Exchange(_)
        ));
        assert!(matches!(
            classify_errors(&errs(&["EAPI:Bad request"])),
            ExchangeError::Exchange(_)
        ));
    }

    #[test]
    fn test_envelope_with_error() {
        let resp: KrakenResponse =
            serde_json::from_str(r#"{"error":["EGeneral:Permission denied"]}"#).unwrap();
        let err = resp.into_result::<WebSocketsToken>().unwrap_err();
        assert!(matches!(err, ExchangeError::PermissionDenied(_)));
    }

    #[test]
    fn test_envelope_missing_result() {
        let resp: KrakenResponse = serde_json::from_str(r#"{"error":[]}"#).unwrap();
        let err = resp.into_result::<WebSocketsToken>().unwrap_err();
        assert!(matches!(err, ExchangeError::BadResponse(_)));
    }

    #[test]
    fn test_closed_orders_keep_exchange_order() {
        let body = r#"{
            "error": [],
            "result": {
                "closed": {
                    "OZZZZZ-AAAAA-BBBBBB": {"status": "closed", "opentm": 1704070800.1234, "descr": {"pair": "XBTUSD"}},
                    "OAAAAA-CCCCC-DDDDDD": {"status": "canceled", "opentm": 1704067200.0}
                },
                "count": 2
            }
        }"#;
        let resp: KrakenResponse = serde_json::from_str(body).unwrap();
        let closed: ClosedOrders = resp.into_result().unwrap();
        assert_eq!(closed.count, 2);

        let orders = closed.into_orders().unwrap();
        assert_eq!(orders[0].id, "OZZZZZ-AAAAA-BBBBBB");
        assert_eq!(orders[1].id, "OAAAAA-CCCCC-DDDDDD");
        assert_eq!(orders[0].datetime.timestamp_millis(), 1_704_070_800_123);
        assert_eq!(orders[0].payload["descr"]["pair"], "XBTUSD");
    }

    #[test]
    fn test_order_without_opentm_is_bad_response() {
        let closed: ClosedOrders =
            serde_json::from_str(r#"{"closed": {"OX": {"status": "closed"}}, "count": 1}"#).unwrap();
        assert!(matches!(
            closed.into_orders(),
            Err(ExchangeError::BadResponse(_))
        ));
    }
}
