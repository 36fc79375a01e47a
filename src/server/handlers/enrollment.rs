use axum::extract::State;
use serde::Deserialize;
use tracing::instrument;

use crate::{
    domain::enrollment::models::{
        DocumentRecord, EdlRecord, EnrollmentStartMessage, PassportRecord,
        VerificationResultMessage,
    },
    server::{AppState, errors::AppError, extract::AppJson},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassportVerificationRequest {
    pub session_token: String,
    #[serde(flatten)]
    pub document: PassportRecord,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenceVerificationRequest {
    pub session_token: String,
    #[serde(flatten)]
    pub document: EdlRecord,
}

/// Opens an enrollment session. Passports and driving licences share the same start.
#[instrument(skip(state))]
pub async fn start(
    State(state): State<AppState>,
) -> Result<AppJson<EnrollmentStartMessage>, AppError> {
    Ok(AppJson(state.engine.start().await?))
}

#[instrument(skip_all)]
pub async fn verify_passport(
    State(state): State<AppState>,
    AppJson(request): AppJson<PassportVerificationRequest>,
) -> Result<AppJson<VerificationResultMessage>, AppError> {
    let message = state
        .engine
        .verify_document(
            &request.session_token,
            DocumentRecord::Passport(request.document),
        )
        .await?;
    Ok(AppJson(message))
}

#[instrument(skip_all)]
pub async fn verify_licence(
    State(state): State<AppState>,
    AppJson(request): AppJson<LicenceVerificationRequest>,
) -> Result<AppJson<VerificationResultMessage>, AppError> {
    let message = state
        .engine
        .verify_document(
            &request.session_token,
            DocumentRecord::DrivingLicence(request.document),
        )
        .await?;
    Ok(AppJson(message))
}
