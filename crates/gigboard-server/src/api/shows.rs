use axum::{extract::State, http::StatusCode, Json};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use gigboard_db::entities::{artist, show, venue};
use gigboard_db::AppState;

#[derive(Debug, Serialize)]
pub struct ShowResponse {
    pub id: Uuid,
    pub venue_id: Uuid,
    pub venue_name: String,
    pub artist_id: Uuid,
    pub artist_name: String,
    pub artist_image_link: Option<String>,
    pub start_time: chrono::DateTime<chrono::FixedOffset>,
    pub start_time_display: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateShowRequest {
    pub artist_id: Uuid,
    pub venue_id: Uuid,
    pub start_time: chrono::DateTime<chrono::FixedOffset>,
}

/// Split shows into (upcoming, past) around a reference time. A show
/// starting exactly at the reference time counts as upcoming.
pub fn partition_by_time(
    shows: Vec<show::Model>,
    now: chrono::DateTime<chrono::FixedOffset>,
) -> (Vec<show::Model>, Vec<show::Model>) {
    shows.into_iter().partition(|s| s.start_time >= now)
}

/// Display form of a show's start time, e.g. "Mon Jun 15, 2026 08:00PM".
pub fn format_start_time(t: chrono::DateTime<chrono::FixedOffset>) -> String {
    t.format("%a %b %d, %Y %I:%M%p").to_string()
}

/// GET /api/shows — every show, soonest first, annotated with its venue
/// and artist.
pub async fn list_shows(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ShowResponse>>, ApiError> {
    let shows = show::Entity::find()
        .order_by_asc(show::Column::StartTime)
        .all(&state.db)
        .await?;

    // Batch-fetch both sides instead of a query per row
    let venue_ids: Vec<Uuid> = shows
        .iter()
        .map(|s| s.venue_id)
        .collect::<std::collections::HashSet<_>>()
        .into_iter()
        .collect();
    let artist_ids: Vec<Uuid> = shows
        .iter()
        .map(|s| s.artist_id)
        .collect::<std::collections::HashSet<_>>()
        .into_iter()
        .collect();

    let venues: HashMap<Uuid, venue::Model> = if venue_ids.is_empty() {
        HashMap::new()
    } else {
        venue::Entity::find()
            .filter(venue::Column::Id.is_in(venue_ids))
            .all(&state.db)
            .await?
            .into_iter()
            .map(|v| (v.id, v))
            .collect()
    };
    let artists: HashMap<Uuid, artist::Model> = if artist_ids.is_empty() {
        HashMap::new()
    } else {
        artist::Entity::find()
            .filter(artist::Column::Id.is_in(artist_ids))
            .all(&state.db)
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect()
    };

    let mut data = Vec::with_capacity(shows.len());
    for s in shows {
        let (Some(v), Some(a)) = (venues.get(&s.venue_id), artists.get(&s.artist_id)) else {
            continue;
        };
        data.push(ShowResponse {
            id: s.id,
            venue_id: s.venue_id,
            venue_name: v.name.clone(),
            artist_id: s.artist_id,
            artist_name: a.name.clone(),
            artist_image_link: a.image_link.clone(),
            start_time: s.start_time,
            start_time_display: format_start_time(s.start_time),
        });
    }

    Ok(Json(data))
}

/// POST /api/shows
///
/// Both referenced rows are checked inside the transaction, so a dangling
/// artist_id or venue_id persists nothing.
pub async fn create_show(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateShowRequest>,
) -> Result<(StatusCode, Json<ShowResponse>), ApiError> {
    let txn = state.db.begin().await?;

    let artist_model = artist::Entity::find_by_id(body.artist_id)
        .one(&txn)
        .await?
        .ok_or(ApiError::NotFound("artist"))?;
    let venue_model = venue::Entity::find_by_id(body.venue_id)
        .one(&txn)
        .await?
        .ok_or(ApiError::NotFound("venue"))?;

    let new_show = show::ActiveModel {
        id: Set(Uuid::new_v4()),
        start_time: Set(body.start_time),
        artist_id: Set(body.artist_id),
        venue_id: Set(body.venue_id),
        created_at: Set(chrono::Utc::now().fixed_offset()),
    };

    let created = new_show.insert(&txn).await?;
    txn.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(ShowResponse {
            id: created.id,
            venue_id: created.venue_id,
            venue_name: venue_model.name,
            artist_id: created.artist_id,
            artist_name: artist_model.name,
            artist_image_link: artist_model.image_link,
            start_time: created.start_time,
            start_time_display: format_start_time(created.start_time),
        }),
    ))
}
