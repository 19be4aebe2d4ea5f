//! Route table mapping HTTP method/path pairs onto `UserService` calls
//!
//! | Method       | Path             | Target       |
//! |--------------|------------------|--------------|
//! | POST         | `/v1/users`      | CreateUser   |
//! | GET          | `/v1/users/{id}` | GetUser      |
//! | PUT, PATCH   | `/v1/users/{id}` | UpdateUser   |
//! | DELETE       | `/v1/users/{id}` | DeleteUser   |
//! | GET, HEAD    | `/healthz`       | liveness     |
//! | GET          | `/metrics`       | Prometheus   |

use hyper::Method;
use registry_core::UserId;
use thiserror::Error;

const COLLECTION: &str = "/v1/users";
const HEALTH: &str = "/healthz";
const METRICS: &str = "/metrics";

/// A resolved gateway route
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    CreateUser,
    GetUser(UserId),
    UpdateUser(UserId),
    DeleteUser(UserId),
    Health,
    Metrics,
}

/// Reasons a request matches no route
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum RouteError {
    #[error("Not Found")]
    NotFound,

    #[error("Method Not Allowed")]
    MethodNotAllowed,

    #[error("type mismatch, parameter: id, error: {0}")]
    InvalidId(String),
}

impl Route {
    /// Resolve a request to a route
    pub fn resolve(method: &Method, path: &str) -> Result<Route, RouteError> {
        let path = normalize(path);

        if path == HEALTH {
            return match *method {
                Method::GET | Method::HEAD => Ok(Route::Health),
                _ => Err(RouteError::MethodNotAllowed),
            };
        }

        if path == METRICS {
            return match *method {
                Method::GET => Ok(Route::Metrics),
                _ => Err(RouteError::MethodNotAllowed),
            };
        }

        if path == COLLECTION {
            return match *method {
                Method::POST => Ok(Route::CreateUser),
                _ => Err(RouteError::MethodNotAllowed),
            };
        }

        let segment = path
            .strip_prefix(COLLECTION)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .ok_or(RouteError::NotFound)?;

        // Method is checked before the id so a bad verb wins over a bad id
        let build: fn(UserId) -> Route = match *method {
            Method::GET => Route::GetUser,
            Method::PUT | Method::PATCH => Route::UpdateUser,
            Method::DELETE => Route::DeleteUser,
            _ => return Err(RouteError::MethodNotAllowed),
        };

        segment
            .parse::<UserId>()
            .map(build)
            .map_err(|e| RouteError::InvalidId(e.to_string()))
    }

    /// Path template, used as a low-cardinality metrics label
    pub fn template(&self) -> &'static str {
        match self {
            Route::CreateUser => COLLECTION,
            Route::GetUser(_) | Route::UpdateUser(_) | Route::DeleteUser(_) => "/v1/users/{id}",
            Route::Health => HEALTH,
            Route::Metrics => METRICS,
        }
    }
}

fn normalize(path: &str) -> &str {
    match path.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed,
        _ => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_routes() {
        assert_eq!(Route::resolve(&Method::POST, "/v1/users"), Ok(Route::CreateUser));
        assert_eq!(Route::resolve(&Method::POST, "/v1/users/"), Ok(Route::CreateUser));
        assert_eq!(
            Route::resolve(&Method::GET, "/v1/users"),
            Err(RouteError::MethodNotAllowed)
        );
    }

    #[test]
    fn test_item_routes() {
        assert_eq!(Route::resolve(&Method::GET, "/v1/users/1"), Ok(Route::GetUser(1)));
        assert_eq!(Route::resolve(&Method::PUT, "/v1/users/2"), Ok(Route::UpdateUser(2)));
        assert_eq!(Route::resolve(&Method::PATCH, "/v1/users/3"), Ok(Route::UpdateUser(3)));
        assert_eq!(Route::resolve(&Method::DELETE, "/v1/users/-4"), Ok(Route::DeleteUser(-4)));
        assert_eq!(
            Route::resolve(&Method::POST, "/v1/users/5"),
            Err(RouteError::MethodNotAllowed)
        );
    }

    #[test]
    fn test_invalid_id() {
        assert!(matches!(
            Route::resolve(&Method::GET, "/v1/users/abc"),
            Err(RouteError::InvalidId(_))
        ));
        assert!(matches!(
            Route::resolve(&Method::GET, "/v1/users/99999999999"),
            Err(RouteError::InvalidId(_))
        ));
        assert_eq!(
            Route::resolve(&Method::POST, "/v1/users/abc"),
            Err(RouteError::MethodNotAllowed)
        );
    }

    #[test]
    fn test_unknown_paths() {
        for path in ["/", "/v1", "/v1/user", "/v2/users/1", "/v1/users/1/extra", "/v1/users//"] {
            assert_eq!(
                Route::resolve(&Method::GET, path),
                Err(RouteError::NotFound),
                "{} should not match",
                path
            );
        }
    }

    #[test]
    fn test_auxiliary_routes() {
        assert_eq!(Route::resolve(&Method::GET, "/healthz"), Ok(Route::Health));
        assert_eq!(Route::resolve(&Method::HEAD, "/healthz"), Ok(Route::Health));
        assert_eq!(Route::resolve(&Method::GET, "/metrics"), Ok(Route::Metrics));
        assert_eq!(
            Route::resolve(&Method::POST, "/metrics"),
            Err(RouteError::MethodNotAllowed)
        );
    }

    #[test]
    fn test_templates() {
        assert_eq!(Route::GetUser(9).template(), "/v1/users/{id}");
        assert_eq!(Route::CreateUser.template(), "/v1/users");
        assert_eq!(Route::Health.template(), "/healthz");
    }
}
