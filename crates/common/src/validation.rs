//! Request body validation
//!
//! [`ValidatedJson`] deserializes a JSON body and runs its `validator`
//! rules, so handlers only ever see input that passed both steps. Failures
//! come back as 400 responses whose `details` map each field to its messages.
//! [`JsonBody`] only deserializes, for handlers that must look something up
//! before validating.

use crate::errors::{AppError, FieldErrors, Result};
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

/// JSON body extractor whose rejections use the API error format
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::InvalidFormat {
                message: rejection.body_text(),
            })?;

        Ok(Self(value))
    }
}

/// JSON body extractor that also runs `Validate`
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let JsonBody(value) = JsonBody::<T>::from_request(req, state).await?;

        validate(&value)?;
        Ok(Self(value))
    }
}

/// Run `value`'s validation rules, mapping failures to a field-level error
pub fn validate<T: Validate>(value: &T) -> Result<()> {
    value.validate().map_err(into_app_error)
}

/// Convert `validator` output into [`AppError::FieldValidation`]
///
/// Errors of nested (including `#[serde(flatten)]`ed) structs are merged
/// into the top-level map under their own field names.
pub fn into_app_error(errors: ValidationErrors) -> AppError {
    let mut fields = FieldErrors::new();
    collect(&errors, &mut fields);
    AppError::FieldValidation { errors: fields }
}

fn collect(errors: &ValidationErrors, fields: &mut FieldErrors) {
    for (field, kind) in errors.errors() {
        match kind {
            ValidationErrorsKind::Field(errs) => fields
                .entry(field.to_string())
                .or_default()
                .extend(errs.iter().map(describe)),
            ValidationErrorsKind::Struct(inner) => collect(inner, fields),
            ValidationErrorsKind::List(items) => {
                for inner in items.values() {
                    collect(inner, fields);
                }
            }
        }
    }
}

fn describe(err: &ValidationError) -> String {
    if let Some(message) = &err.message {
        return message.to_string();
    }

    let param = |name: &str| err.params.get(name).map(|v| v.to_string());

    match err.code.as_ref() {
        "length" => match (param("min"), param("max")) {
            (Some(min), Some(max)) => format!("Ensure this field has between {} and {} characters.", min, max),
            (None, Some(max)) => format!("Ensure this field has no more than {} characters.", max),
            (Some(min), None) => format!("Ensure this field has at least {} characters.", min),
            (None, None) => "Invalid length.".to_string(),
        },
        "email" => "Enter a valid email address.".to_string(),
        "required" => "This field is required.".to_string(),
        code => format!("Invalid value ({}).", code),
    }
}
