use serde::{Deserialize, Serialize};
use validator::Validate;

use tl_core::domain::entities::principal::Principal;
use tl_core::domain::entities::token::{TokenPair, BEARER_TOKEN_TYPE};

/// Request to issue a token pair for an authenticated principal
#[derive(Debug, Deserialize, Validate)]
pub struct IssueTokenRequest {
    /// Identifier of the principal, as known to the principal directory
    #[validate(length(min = 1, max = 255))]
    pub principal_id: String,
}

/// Request to exchange a refresh token for a new pair
#[derive(Debug, Deserialize, Validate)]
pub struct RefreshTokenRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

/// Request to revoke the lineage of a token (logout)
#[derive(Debug, Deserialize, Validate)]
pub struct RevokeTokenRequest {
    /// Refresh token of the session to end; an access token of the same session is accepted too
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

/// Token pair returned by issue and refresh
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Always `Bearer`
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    /// Refresh token lifetime in seconds
    pub refresh_expires_in: i64,
}

impl From<TokenPair> for TokenPairResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: BEARER_TOKEN_TYPE.to_string(),
            expires_in: pair.access_expires_in,
            refresh_expires_in: pair.refresh_expires_in,
        }
    }
}

/// Identity carried by a verified access token
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub principal_id: String,
    pub email: String,
    pub role: String,
}

impl From<Principal> for SessionResponse {
    fn from(principal: Principal) -> Self {
        Self {
            principal_id: principal.id,
            email: principal.email,
            role: principal.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_request_validation() {
        let valid = IssueTokenRequest {
            principal_id: "user-1".to_string(),
        };
        assert!(valid.validate().is_ok());

        let empty = IssueTokenRequest {
            principal_id: String::new(),
        };
        assert!(empty.validate().is_err());

        let too_long = IssueTokenRequest {
            principal_id: "x".repeat(256),
        };
        assert!(too_long.validate().is_err());
    }

    #[test]
    fn test_token_pair_response_hides_lineage() {
        let pair = TokenPair {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            access_expires_in: 900,
            refresh_expires_in: 604800,
            family_id: uuid::Uuid::new_v4(),
            sequence: 3,
        };

        let json = serde_json::to_value(TokenPairResponse::from(pair)).unwrap();
        assert_eq!(json["token_type"], "Bearer");
        assert_eq!(json["expires_in"], 900);
        assert!(json.get("family_id").is_none());
        assert!(json.get("sequence").is_none());
    }
}
