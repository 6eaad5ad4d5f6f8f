//! Handlers for `/api/parishioners` and `/api/households` endpoints.
//!
//! Listing is open to every authenticated account; mutations require a
//! reviewing role.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/api/parishioners` | By last name, then first name |
//! | `POST` | `/api/parishioners` | Body: `{"first_name":"…","last_name":"…"}` |
//! | `GET`  | `/api/parishioners/{id}` | 404 if not found |
//! | `POST` | `/api/parishioners/{id}/marry` | Body: `{"spouse_id":9}` |
//! | `POST` | `/api/parishioners/{id}/divorce` | |
//! | `POST` | `/api/parishioners/{id}/departed` | Body: `{"death_date":"2024-03-01"}`, defaults to today |
//! | `GET`  | `/api/households` | |
//! | `POST` | `/api/households` | |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{NaiveDate, Utc};
use parish_core::{
  parishioner::{Household, NewHousehold, NewParishioner, Parishioner},
  store::ParishStore,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
  AppState,
  auth::{Privileged, Reviewer},
  error::{Error, Result},
};

// ─── Read ─────────────────────────────────────────────────────────────────────

/// `GET /api/parishioners`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  _: Reviewer,
) -> Result<Json<Vec<Parishioner>>>
where
  S: ParishStore + Clone + 'static,
{
  let parishioners = state.store.list_parishioners().await.map_err(Error::store)?;
  Ok(Json(parishioners))
}

/// `GET /api/parishioners/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  _: Reviewer,
  Path(id): Path<i64>,
) -> Result<Json<Parishioner>>
where
  S: ParishStore + Clone + 'static,
{
  let parishioner = state
    .store
    .parishioner(id)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| Error::NotFound(format!("parishioner {id} not found")))?;
  Ok(Json(parishioner))
}

/// `GET /api/households`
pub async fn households<S>(
  State(state): State<AppState<S>>,
  _: Reviewer,
) -> Result<Json<Vec<Household>>>
where
  S: ParishStore + Clone + 'static,
{
  let households = state.store.list_households().await.map_err(Error::store)?;
  Ok(Json(households))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /api/parishioners`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  _: Privileged,
  Json(body): Json<NewParishioner>,
) -> Result<impl IntoResponse>
where
  S: ParishStore + Clone + 'static,
{
  if body.first_name.trim().is_empty() || body.last_name.trim().is_empty() {
    return Err(Error::BadRequest(
      "First name and last name are required".to_owned(),
    ));
  }
  let parishioner = state.store.add_parishioner(body).await.map_err(Error::store)?;
  Ok((StatusCode::CREATED, Json(parishioner)))
}

/// `POST /api/households`
pub async fn create_household<S>(
  State(state): State<AppState<S>>,
  _: Privileged,
  Json(body): Json<NewHousehold>,
) -> Result<impl IntoResponse>
where
  S: ParishStore + Clone + 'static,
{
  let household = state.store.add_household(body).await.map_err(Error::store)?;
  Ok((StatusCode::CREATED, Json(household)))
}

// ─── Relationships ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct Couple {
  pub parishioner: Parishioner,
  pub spouse:      Parishioner,
}

#[derive(Debug, Deserialize)]
pub struct MarryBody {
  pub spouse_id: i64,
}

/// `POST /api/parishioners/{id}/marry`
pub async fn marry<S>(
  State(state): State<AppState<S>>,
  Privileged(reviewer): Privileged,
  Path(id): Path<i64>,
  Json(body): Json<MarryBody>,
) -> Result<Json<Couple>>
where
  S: ParishStore + Clone + 'static,
{
  let (parishioner, spouse) = state
    .store
    .marry(id, body.spouse_id)
    .await
    .map_err(Error::store)?;
  info!(id, spouse = body.spouse_id, by = %reviewer.email, "married parishioners");
  Ok(Json(Couple { parishioner, spouse }))
}

/// `POST /api/parishioners/{id}/divorce`
pub async fn divorce<S>(
  State(state): State<AppState<S>>,
  Privileged(reviewer): Privileged,
  Path(id): Path<i64>,
) -> Result<Json<Couple>>
where
  S: ParishStore + Clone + 'static,
{
  let (parishioner, spouse) =
    state.store.divorce(id).await.map_err(Error::store)?;
  info!(id, spouse = spouse.id, by = %reviewer.email, "divorced parishioners");
  Ok(Json(Couple { parishioner, spouse }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DepartedBody {
  pub death_date: Option<NaiveDate>,
}

/// `POST /api/parishioners/{id}/departed`
pub async fn departed<S>(
  State(state): State<AppState<S>>,
  Privileged(reviewer): Privileged,
  Path(id): Path<i64>,
  Json(body): Json<DepartedBody>,
) -> Result<Json<Parishioner>>
where
  S: ParishStore + Clone + 'static,
{
  let today = Utc::now().date_naive();
  let on = body.death_date.unwrap_or(today);
  if on > today {
    return Err(Error::BadRequest(
      "Death date cannot be in the future".to_owned(),
    ));
  }
  let parishioner = state
    .store
    .mark_departed(id, on)
    .await
    .map_err(Error::store)?;
  info!(id, death_date = %on, by = %reviewer.email, "marked parishioner departed");
  Ok(Json(parishioner))
}
