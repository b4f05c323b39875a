use tonic::metadata::MetadataMap;
use tonic::{Code, Status};

use crate::infrastructure::jwt::JwtService;

#[derive(Debug, Clone)]
pub(crate) struct GrpcAuthContext {
    pub(crate) user_id: i64,
    pub(crate) username: Option<String>,
}

pub(crate) fn authenticate_request(
    jwt: &JwtService,
    metadata: &MetadataMap,
) -> Result<GrpcAuthContext, Status> {
    let token = parse_bearer_token(metadata)?;
    let claims = jwt
        .verify_token(token)
        .map_err(|_| Status::new(Code::Unauthenticated, "invalid token"))?;

    Ok(GrpcAuthContext {
        user_id: claims.user_id,
        username: claims.username,
    })
}

fn parse_bearer_token(metadata: &MetadataMap) -> Result<&str, Status> {
    let invalid = || Status::new(Code::Unauthenticated, "invalid authorization metadata");

    let raw = metadata
        .get("authorization")
        .ok_or_else(|| Status::new(Code::Unauthenticated, "missing authorization metadata"))?
        .to_str()
        .map_err(|_| invalid())?;

    let mut parts = raw.split_whitespace();
    let (Some(scheme), Some(token), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(invalid());
    }

    Ok(token.trim())
}

#[cfg(test)]
mod tests {
    use tonic::Code;
    use tonic::metadata::{MetadataMap, MetadataValue};

    use super::authenticate_request;
    use crate::infrastructure::jwt::JwtService;

    fn metadata_with(value: &str) -> MetadataMap {
        let mut metadata = MetadataMap::new();
        metadata.insert(
            "authorization",
            MetadataValue::try_from(value).expect("ascii metadata"),
        );
        metadata
    }

    #[test]
    fn valid_token_yields_user_context() {
        let jwt = JwtService::new("0123456789abcdef0123456789abcdef", 3600);
        let token = jwt.generate_token(7, Some("neo")).expect("token");

        let ctx = authenticate_request(&jwt, &metadata_with(&format!("Bearer {token}")))
            .expect("authenticated");
        assert_eq!(ctx.user_id, 7);
        assert_eq!(ctx.username.as_deref(), Some("neo"));
    }

    #[test]
    fn missing_or_malformed_metadata_is_unauthenticated() {
        let jwt = JwtService::new("0123456789abcdef0123456789abcdef", 3600);

        let missing = authenticate_request(&jwt, &MetadataMap::new()).expect_err("missing");
        assert_eq!(missing.code(), Code::Unauthenticated);

        let basic = authenticate_request(&jwt, &metadata_with("Basic abc")).expect_err("basic");
        assert_eq!(basic.code(), Code::Unauthenticated);

        let garbage = authenticate_request(&jwt, &metadata_with("Bearer not-a-jwt"))
            .expect_err("garbage");
        assert_eq!(garbage.message(), "invalid token");
    }
}
