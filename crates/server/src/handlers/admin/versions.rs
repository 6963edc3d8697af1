use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use axum_derive_error::ErrorResponse;
use common::{config::Config, environment::Environment};
use derive_more::{Display, Error, From};
use serde::{Deserialize, Serialize};
use store::{
    release::{RegisterError, Release},
    snapshot::SnapshotError,
    version::{MalformedVersion, Version},
    Store,
};
use tracing::{error, info, warn};
use validator::Validate;

use crate::validation::ValidatedJson;

/// Errors that may occur during release registration.
#[derive(ErrorResponse, Display, From, Error)]
pub(super) enum AddVersionError {
    /// Registry could not be persisted.
    SnapshotError(SnapshotError),

    /// Version is not a `major.minor.patch` triple.
    #[status(StatusCode::BAD_REQUEST)]
    MalformedVersion(MalformedVersion),

    /// The version already exists in the target environment.
    #[status(StatusCode::CONFLICT)]
    #[display(fmt = "version {} is already registered", _0)]
    DuplicateVersion(#[error(not(source))] Version),
}

impl From<RegisterError> for AddVersionError {
    fn from(err: RegisterError) -> Self {
        match err {
            RegisterError::DuplicateVersion(version) => AddVersionError::DuplicateVersion(version),
            RegisterError::Snapshot(err) => {
                error!(%err, "unable to persist release registry");
                AddVersionError::SnapshotError(err)
            }
        }
    }
}

/// Release registration request.
#[derive(Deserialize, Validate)]
pub(super) struct AddVersionRequest {
    /// Semantic version in `major.minor.patch` form.
    version: String,

    /// Release notes shown to users.
    #[serde(default)]
    #[validate(length(max = 10000))]
    notes: String,

    /// Target environment, defaulting to the one this instance serves.
    environment: Option<Environment>,
}

/// Release registration handler.
pub(super) async fn add(
    State(store): State<Arc<Store>>,
    Extension(config): Extension<Arc<Config>>,
    ValidatedJson(request): ValidatedJson<AddVersionRequest>,
) -> Result<(StatusCode, Json<Release>), AddVersionError> {
    let version: Version = request.version.parse()?;
    let environment = request
        .environment
        .unwrap_or(config.updates.environment);

    let release = store
        .registry
        .register(version, request.notes, environment)?;

    // Installers are hashed lazily on first download.
    match store.artifacts.is_available(version, environment).await {
        Ok(true) => {}
        Ok(false) => info!(
            %version,
            %environment,
            file = %store::artifact::file_name(version, environment),
            "installer is not uploaded yet"
        ),
        Err(error) => warn!(%version, %environment, %error, "unable to check installer"),
    }

    Ok((StatusCode::CREATED, Json(release)))
}

/// Release listing query.
#[derive(Deserialize)]
pub(super) struct ListQuery {
    environment: Option<Environment>,
}

/// Release listing response.
#[derive(Serialize)]
pub(super) struct ListResponse {
    environment: Environment,
    latest: Option<Release>,
    versions: Vec<Release>,
}

/// Release listing handler.
///
/// Releases are sorted in ascending version order.
pub(super) async fn list(
    State(store): State<Arc<Store>>,
    Extension(config): Extension<Arc<Config>>,
    Query(query): Query<ListQuery>,
) -> Json<ListResponse> {
    let environment = query.environment.unwrap_or(config.updates.environment);

    Json(ListResponse {
        environment,
        latest: store.registry.latest(environment),
        versions: store.registry.releases(environment),
    })
}

#[cfg(test)]
mod tests {
    use crate::{
        auth::{ADMIN_KEY_HEADER, EMAIL_HEADER, SECRET_KEY_HEADER},
        testing::{
            create_env, RequestBodyExt, ResponseBodyExt, TestEnv, TENANT_EMAIL, TENANT_SECRET,
        },
    };

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use common::environment::Environment;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn add_version(env: &TestEnv, body: Value) -> Response {
        env.router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/admin/versions/add")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(ADMIN_KEY_HEADER, env.config.updates.admin_key.as_str())
                    .body(Body::from_json(body))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn list_versions(env: &TestEnv, query: &str) -> Value {
        let response = env
            .router()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(format!("/api/admin/versions{query}"))
                    .header(ADMIN_KEY_HEADER, env.config.updates.admin_key.as_str())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        response.json().await
    }

    #[tokio::test]
    async fn register() {
        let env = create_env();

        let response = add_version(
            &env,
            json!({ "version": "1.0.2", "notes": "Bug fixes" }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CREATED);

        let json = response.json().await;
        assert_eq!(json["version"], "1.0.2");
        assert_eq!(json["notes"], "Bug fixes");
        assert_eq!(json["environment"], "prod");
        assert!(json["release_date"].is_string());

        let latest = env.store.registry.latest(Environment::Prod).unwrap();
        assert_eq!(latest.version.to_string(), "1.0.2");
    }

    #[tokio::test]
    async fn duplicate_version() {
        let env = create_env();
        env.register("1.0.2", "Bug fixes");

        let response = add_version(&env, json!({ "version": "1.0.2", "notes": "Again" })).await;

        assert_eq!(response.status(), StatusCode::CONFLICT);

        let latest = env.store.registry.latest(Environment::Prod).unwrap();
        assert_eq!(latest.notes, "Bug fixes");
    }

    #[tokio::test]
    async fn older_version_keeps_latest() {
        let env = create_env();

        for version in ["1.2.0", "1.1.5"] {
            let response = add_version(&env, json!({ "version": version })).await;
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let json = list_versions(&env, "").await;

        assert_eq!(json["environment"], "prod");
        assert_eq!(json["latest"]["version"], "1.2.0");

        let versions: Vec<_> = json["versions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|release| release["version"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(versions, ["1.1.5", "1.2.0"]);
    }

    #[tokio::test]
    async fn explicit_environment() {
        let env = create_env();

        let response = add_version(
            &env,
            json!({ "version": "2.0.0", "notes": "", "environment": "staging" }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(env.store.registry.latest(Environment::Prod).is_none());

        let json = list_versions(&env, "?environment=staging").await;
        assert_eq!(json["latest"]["version"], "2.0.0");
        assert_eq!(json["latest"]["environment"], "staging");
    }

    #[tokio::test]
    async fn malformed_version() {
        let env = create_env();

        for version in ["1.0", "v1.0.0", "1.0.0-beta", "99999999999999999999.0.0"] {
            let response = add_version(&env, json!({ "version": version })).await;

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(response.json().await["code"], 400);
        }

        for body in [json!({ "version": 1 }), json!({ "notes": "no version" })] {
            let response = add_version(&env, body).await;

            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        }

        assert!(env.store.registry.latest(Environment::Prod).is_none());
    }

    #[tokio::test]
    async fn requires_admin_key() {
        let env = create_env();

        let missing = Request::builder()
            .method("GET")
            .uri("/api/admin/versions")
            .body(Body::empty())
            .unwrap();

        let wrong = Request::builder()
            .method("GET")
            .uri("/api/admin/versions")
            .header(ADMIN_KEY_HEADER, "not-the-admin-key")
            .body(Body::empty())
            .unwrap();

        let tenant = Request::builder()
            .method("POST")
            .uri("/api/admin/versions/add")
            .header(header::CONTENT_TYPE, "application/json")
            .header(EMAIL_HEADER, TENANT_EMAIL)
            .header(SECRET_KEY_HEADER, TENANT_SECRET)
            .body(Body::from_json(json!({ "version": "9.9.9" })))
            .unwrap();

        for request in [missing, wrong, tenant] {
            let response = env.router().oneshot(request).await.unwrap();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        assert!(env.store.registry.latest(Environment::Prod).is_none());
    }

    #[tokio::test]
    async fn registered_without_installer() {
        let env = create_env();

        let response = add_version(&env, json!({ "version": "1.0.2" })).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let token = env
            .store
            .tokens
            .issue("1.0.2".parse().unwrap(), Environment::Prod, TENANT_EMAIL)
            .token;

        let response = env
            .router()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(format!("/api/updates/download?token={token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
