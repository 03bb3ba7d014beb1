use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::domain::ProviderKind;
use crate::error::AppError;
use crate::services::{DonationRequest, Donor};
use crate::AppState;

pub const DONOR_ID_HEADER: &str = "x-donor-id";
pub const DONOR_NAME_HEADER: &str = "x-donor-name";
pub const DONOR_EMAIL_HEADER: &str = "x-donor-email";

/// Donor identity forwarded by the authenticating gateway. Absent for guests.
pub struct OptionalDonor(pub Option<Donor>);

#[async_trait]
impl<S> FromRequestParts<S> for OptionalDonor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let Some(raw_id) = header(DONOR_ID_HEADER) else {
            return Ok(OptionalDonor(None));
        };
        let id = Uuid::parse_str(&raw_id)
            .map_err(|_| AppError::BadRequest(format!("{} is not a UUID", DONOR_ID_HEADER)))?;

        Ok(OptionalDonor(Some(Donor {
            id,
            display_name: header(DONOR_NAME_HEADER).unwrap_or_default(),
            email: header(DONOR_EMAIL_HEADER),
        })))
    }
}

pub async fn create_donation(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    OptionalDonor(donor): OptionalDonor,
    Json(request): Json<DonationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let kind: ProviderKind = provider.parse().map_err(AppError::NotFound)?;
    let checkout = state
        .intake
        .open_donation(kind, donor.as_ref(), request)
        .await?;
    Ok((StatusCode::CREATED, Json(checkout)))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let tx = state.store.get_transaction(id).await.map_err(|e| match e {
        crate::ports::RepositoryError::NotFound(_) => {
            AppError::NotFound(format!("Transaction {} not found", id))
        }
        other => other.into(),
    })?;
    Ok(Json(tx))
}
