//! Caller extraction from MCP `RequestContext`
//!
//! The extraction follows the rmcp extension propagation chain:
//! 1. HTTP middleware inserts [`Principal`] into request extensions
//! 2. rmcp injects `http::request::Parts` into MCP extensions
//! 3. The principal is read from the nested Parts extensions
//!
//! Over stdio there are no Parts and therefore no principal.

use rmcp::model::Extensions;
use rmcp::service::{RequestContext, ServiceRole};

use super::principal::Principal;

pub fn request_principal<R: ServiceRole>(context: &RequestContext<R>) -> Option<&Principal> {
    principal_from_extensions(&context.extensions)
}

pub fn principal_from_extensions(extensions: &Extensions) -> Option<&Principal> {
    #[cfg(feature = "http")]
    {
        extensions
            .get::<axum::http::request::Parts>()
            .and_then(|parts| parts.extensions.get::<Principal>())
    }

    #[cfg(not(feature = "http"))]
    {
        let _ = extensions;
        None
    }
}

#[cfg(all(test, feature = "http"))]
mod tests {
    use axum::body::Body;
    use axum::http::Request;

    use super::*;

    fn extensions_with(principal: Option<Principal>) -> Extensions {
        let mut request = Request::builder()
            .method("POST")
            .uri("/mcp")
            .body(Body::empty())
            .unwrap();
        if let Some(p) = principal {
            request.extensions_mut().insert(p);
        }
        let mut extensions = Extensions::new();
        extensions.insert(request.into_parts().0);
        extensions
    }

    #[test]
    fn test_principal_from_http_parts() {
        let extensions = extensions_with(Some(Principal::new("user_a").with_role("subscriber")));
        let principal = principal_from_extensions(&extensions).unwrap();
        assert_eq!(principal.identity_id, "user_a");
        assert_eq!(principal.role.as_deref(), Some("subscriber"));
    }

    #[test]
    fn test_parts_without_principal() {
        assert!(principal_from_extensions(&extensions_with(None)).is_none());
    }

    #[test]
    fn test_no_parts() {
        assert!(principal_from_extensions(&Extensions::new()).is_none());
    }

    #[test]
    fn test_principal_inserted_directly_is_ignored() {
        let mut extensions = Extensions::new();
        extensions.insert(Principal::new("spoofed"));
        assert!(principal_from_extensions(&extensions).is_none());
    }
}
