use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest},
    http::{Request, StatusCode},
    Json,
};
use axum_derive_error::ErrorResponse;
use derive_more::{Display, Error};
use validator::{Validate, ValidationErrors};

/// Errors returned when a management request body is unusable.
///
/// Both variants are reported as `422 Unprocessable Entity`, so a client
/// can't tell a syntax error from a rejected field value by status alone.
#[derive(ErrorResponse, Display, Error)]
pub enum ValidatedJsonRejection {
    /// Body is missing, is not JSON, or does not match the request shape.
    #[status(StatusCode::UNPROCESSABLE_ENTITY)]
    #[display(fmt = "malformed request body: {}", _0)]
    MalformedJson(JsonRejection),

    /// Body parsed, but some field values are out of range.
    #[status(StatusCode::UNPROCESSABLE_ENTITY)]
    #[display(fmt = "invalid request fields: {}", _0)]
    InvalidFields(ValidationErrors),
}

/// JSON request body that passed [`validator`] checks.
///
/// Behaves like [`Json`], except that a body failing [`Validate`]
/// is rejected before the handler runs.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S, B> FromRequest<S, B> for ValidatedJson<T>
where
    T: Validate,
    B: Send + 'static,
    S: Sync,
    Json<T>: FromRequest<S, B, Rejection = JsonRejection>,
{
    type Rejection = ValidatedJsonRejection;

    async fn from_request(req: Request<B>, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(ValidatedJsonRejection::MalformedJson)?;

        value
            .validate()
            .map_err(ValidatedJsonRejection::InvalidFields)?;

        Ok(ValidatedJson(value))
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        extract::FromRequest,
        http::{header, Request, StatusCode},
        response::IntoResponse,
    };
    use serde::Deserialize;
    use validator::Validate;

    use super::{ValidatedJson, ValidatedJsonRejection};

    #[derive(Deserialize, Validate)]
    struct Payload {
        #[validate(length(min = 1, max = 8))]
        name: String,
    }

    fn request(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn extract(
        body: &'static str,
    ) -> Result<ValidatedJson<Payload>, ValidatedJsonRejection> {
        ValidatedJson::<Payload>::from_request(request(body), &()).await
    }

    #[tokio::test]
    async fn accepts_valid_body() {
        let ValidatedJson(payload) = extract(r#"{"name": "acme"}"#).await.ok().unwrap();

        assert_eq!(payload.name, "acme");
    }

    #[tokio::test]
    async fn rejects_invalid_fields() {
        let rejection = extract(r#"{"name": ""}"#).await.err().unwrap();

        assert!(matches!(rejection, ValidatedJsonRejection::InvalidFields(_)));
        assert_eq!(
            rejection.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[tokio::test]
    async fn rejects_malformed_json() {
        for body in ["{", r#"{"title": "acme"}"#, r#"{"name": 1}"#] {
            let rejection = extract(body).await.err().unwrap();

            assert!(matches!(rejection, ValidatedJsonRejection::MalformedJson(_)));
            assert_eq!(
                rejection.into_response().status(),
                StatusCode::UNPROCESSABLE_ENTITY
            );
        }
    }
}
