//! Two-phase credential validation.
//!
//! Adapters issue the probe requests; the reading of each outcome lives here
//! so every exchange answers the same way.

use crate::traits::{AdapterError, ErrorClass, ExchangeError};
use tracing::{debug, warn};

/// Which probe failures count as a rejected credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectOn {
    /// Only an authentication failure.
    Authentication,
    /// Authentication failures and permission-denied responses alike.
    /// Some exchanges answer an unauthorised scope this way.
    AuthenticationOrPermission,
}

/// Interpret the lightweight authenticated probe.
///
/// Success means the credential works. The failure classes named by `reject_on`
/// mean it was rejected. Anything else is fatal.
pub fn interpret_credential_probe<T>(
    result: Result<T, ExchangeError>,
    reject_on: RejectOn,
) -> Result<bool, AdapterError> {
    match result {
        Ok(_) => Ok(true),
        Err(err) => {
            let rejected = match (err.class(), reject_on) {
                (ErrorClass::Authentication, _) => true,
                (ErrorClass::PermissionDenied, RejectOn::AuthenticationOrPermission) => true,
                _ => false,
            };
            if rejected {
                debug!(error = %err, "Credential rejected by exchange");
                Ok(false)
            } else {
                Err(AdapterError::Exchange {
                    operation: "validate_credentials",
                    source: err,
                })
            }
        }
    }
}

/// Interpret the balance probe.
///
/// A permission-denied failure is the good outcome. A successful response means
/// the key can read balances.
pub fn interpret_limitation_probe<T>(
    result: Result<T, ExchangeError>,
) -> Result<bool, AdapterError> {
    match result {
        Ok(_) => {
            warn!("Credential can read account balances");
            Ok(false)
        }
        Err(err) if err.class() == ErrorClass::PermissionDenied => Ok(true),
        Err(err) => Err(AdapterError::Exchange {
            operation: "validate_credential_limitations",
            source: err,
        }),
    }
}
