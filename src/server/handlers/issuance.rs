use axum::extract::{Path, State};
use serde::Deserialize;
use tracing::instrument;

use crate::{
    apdu::{ProtocolCommand, WireResponse},
    domain::enrollment::models::{CardVersion, CredentialList},
    server::{AppState, errors::AppError, extract::AppJson},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub session_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuanceStartRequest {
    pub session_token: String,
    pub card_version: CardVersion,
}

/// Responses stay in wire form here so that bad hex is reported as a protocol error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuanceFinishRequest {
    pub session_token: String,
    pub responses: Vec<WireResponse>,
}

#[instrument(skip_all)]
pub async fn credential_list(
    State(state): State<AppState>,
    AppJson(request): AppJson<SessionRequest>,
) -> Result<AppJson<CredentialList>, AppError> {
    Ok(AppJson(
        state.engine.credential_list(&request.session_token).await?,
    ))
}

#[instrument(skip(state, request))]
pub async fn start(
    State(state): State<AppState>,
    Path(credential): Path<String>,
    AppJson(request): AppJson<IssuanceStartRequest>,
) -> Result<AppJson<Vec<ProtocolCommand>>, AppError> {
    let commands = state
        .engine
        .start_issuance(&request.session_token, &credential, request.card_version)
        .await?;
    Ok(AppJson(commands))
}

#[instrument(skip(state, request))]
pub async fn finish(
    State(state): State<AppState>,
    Path(credential): Path<String>,
    AppJson(request): AppJson<IssuanceFinishRequest>,
) -> Result<AppJson<Vec<ProtocolCommand>>, AppError> {
    let commands = state
        .engine
        .finish_issuance(&request.session_token, &credential, request.responses)
        .await?;
    Ok(AppJson(commands))
}
