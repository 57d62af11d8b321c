//! Short-token issuance.

use std::sync::Arc;

use hermes_auth::{password, LongTokenClaims, TokenService};
use hermes_core::{DispatchError, DispatchResult};
use hermes_middleware::stages::{DeviceInfo, DEVICE, LONG_TOKEN};
use hermes_router::{OperationInput, Outcome, Unit};
use serde_json::json;
use uuid::Uuid;

/// The `token` unit.
#[derive(Debug)]
pub struct TokenUnit {
    tokens: Arc<TokenService>,
}

impl TokenUnit {
    /// Builds the unit.
    pub fn unit(tokens: &Arc<TokenService>) -> Unit {
        let state = Arc::new(Self {
            tokens: Arc::clone(tokens),
        });
        Unit::builder("token")
            .expose("v1_createShortToken")
            .method(
                "v1_createShortToken",
                "{ __longToken, __device }",
                &state,
                Self::create_short_token,
            )
            .intercept_operations()
            .build()
    }

    /// Trades a verified long token for a device-bound short token.
    async fn create_short_token(self: Arc<Self>, input: OperationInput) -> DispatchResult<Outcome> {
        let long: LongTokenClaims = input.contribution(LONG_TOKEN)?;
        let device: DeviceInfo = input.contribution(DEVICE)?;
        let fingerprint = serde_json::to_string(&device)
            .map_err(|e| DispatchError::internal_with_source("failed to encode device", e))?;

        let session_id = Uuid::now_v7().to_string();
        let short_token = self
            .tokens
            .gen_short_token(&long, &session_id, password::device_id(&fingerprint))
            .map_err(|e| DispatchError::internal_with_source("failed to sign short token", e))?;

        tracing::info!(user_id = %long.user_id, %session_id, "short token issued");
        Ok(Outcome::Data(json!({ "shortToken": short_token })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_auth::TokenConfig;
    use hermes_router::OperationInput;

    #[tokio::test]
    async fn test_short_token_carries_long_token_identity() {
        let tokens = Arc::new(TokenService::new(&TokenConfig::new("long", "short")));
        let unit = TokenUnit::unit(&tokens);

        let long = LongTokenClaims::new("u-1", "key-1").with_role("superadmin");
        let data = json!({
            "__longToken": long,
            "__device": { "ip": "10.0.0.1", "agent": "curl/8" },
        });
        let outcome = unit
            .invoke(
                "v1_createShortToken",
                OperationInput::detached(data.as_object().cloned().unwrap()),
            )
            .await
            .unwrap();
        let Outcome::Data(value) = outcome else {
            panic!("expected data");
        };

        let claims = tokens
            .verify_short_token(value["shortToken"].as_str().unwrap())
            .unwrap();
        assert_eq!(claims.user_id, "u-1");
        assert_eq!(claims.role.as_deref(), Some("superadmin"));
        assert_eq!(claims.device_id.len(), 64);
        assert!(Uuid::parse_str(&claims.session_id).is_ok());
    }

    #[tokio::test]
    async fn test_missing_contributions_are_internal() {
        let tokens = Arc::new(TokenService::new(&TokenConfig::new("long", "short")));
        let err = TokenUnit::unit(&tokens)
            .invoke("v1_createShortToken", OperationInput::detached(Default::default()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code().as_u16(), 500);
    }
}
