use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use sea_orm::sea_query::{extension::postgres::PgExpr, Expr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::shows::{format_start_time, partition_by_time};
use super::{search_pattern, SearchItem, SearchParams, SearchResults};
use crate::error::ApiError;
use crate::validation::{
    has_seeking, require, validate_genres, validate_phone, validate_url, FieldError,
};
use gigboard_db::entities::{artist, show, venue};
use gigboard_db::AppState;

#[derive(Debug, Serialize)]
pub struct ArtistResponse {
    pub id: Uuid,
    pub name: String,
    pub city: String,
    pub state: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub genres: Vec<String>,
    pub facebook_link: String,
    pub image_link: Option<String>,
    pub seeking_venue: bool,
    pub seeking_description: Option<String>,
    pub created_at: chrono::DateTime<chrono::FixedOffset>,
}

impl From<artist::Model> for ArtistResponse {
    fn from(a: artist::Model) -> Self {
        Self {
            id: a.id,
            name: a.name,
            city: a.city,
            state: a.state,
            phone: a.phone,
            website: a.website,
            genres: a.genres,
            facebook_link: a.facebook_link,
            image_link: a.image_link,
            seeking_venue: a.seeking_venue,
            seeking_description: a.seeking_description,
            created_at: a.created_at,
        }
    }
}

/// One row of the alphabetical artist index.
#[derive(Debug, Serialize)]
pub struct ArtistListItem {
    pub id: Uuid,
    pub name: String,
}

/// A show on an artist page, annotated with the hosting venue.
#[derive(Debug, Serialize)]
pub struct ArtistShowEntry {
    pub venue_id: Uuid,
    pub venue_name: String,
    pub venue_image_link: Option<String>,
    pub start_time: chrono::DateTime<chrono::FixedOffset>,
    pub start_time_display: String,
}

#[derive(Debug, Serialize)]
pub struct ArtistDetailResponse {
    #[serde(flatten)]
    pub artist: ArtistResponse,
    pub past_shows: Vec<ArtistShowEntry>,
    pub upcoming_shows: Vec<ArtistShowEntry>,
    pub past_shows_count: usize,
    pub upcoming_shows_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct CreateArtistRequest {
    pub name: String,
    pub city: String,
    pub state: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub genres: Vec<String>,
    pub facebook_link: String,
    pub image_link: Option<String>,
    pub seeking_description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateArtistRequest {
    pub name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub genres: Option<Vec<String>>,
    pub facebook_link: Option<String>,
    pub image_link: Option<String>,
    pub seeking_description: Option<String>,
}

fn validate_create(req: &CreateArtistRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    require(&mut errors, "name", &req.name);
    require(&mut errors, "city", &req.city);
    require(&mut errors, "state", &req.state);
    validate_genres(&mut errors, &req.genres);
    // facebook_link is required for artists, and must be a URL when present
    require(&mut errors, "facebook_link", &req.facebook_link);
    if !req.facebook_link.trim().is_empty() {
        validate_url(&mut errors, "facebook_link", Some(&req.facebook_link));
    }
    validate_phone(&mut errors, "phone", req.phone.as_deref());
    validate_url(&mut errors, "website", req.website.as_deref());
    validate_url(&mut errors, "image_link", req.image_link.as_deref());
    errors
}

fn validate_update(req: &UpdateArtistRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if let Some(ref name) = req.name {
        require(&mut errors, "name", name);
    }
    if let Some(ref city) = req.city {
        require(&mut errors, "city", city);
    }
    if let Some(ref state) = req.state {
        require(&mut errors, "state", state);
    }
    if let Some(ref genres) = req.genres {
        validate_genres(&mut errors, genres);
    }
    if let Some(ref facebook_link) = req.facebook_link {
        require(&mut errors, "facebook_link", facebook_link);
        if !facebook_link.trim().is_empty() {
            validate_url(&mut errors, "facebook_link", Some(facebook_link));
        }
    }
    validate_phone(&mut errors, "phone", req.phone.as_deref());
    validate_url(&mut errors, "website", req.website.as_deref());
    validate_url(&mut errors, "image_link", req.image_link.as_deref());
    errors
}

/// GET /api/artists — all artists, alphabetical
pub async fn list_artists(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ArtistListItem>>, ApiError> {
    let artists = artist::Entity::find()
        .order_by_asc(artist::Column::Name)
        .order_by_asc(artist::Column::Id)
        .all(&state.db)
        .await?;

    Ok(Json(
        artists
            .into_iter()
            .map(|a| ArtistListItem {
                id: a.id,
                name: a.name,
            })
            .collect(),
    ))
}

/// GET /api/artists/search?q=...
pub async fn search_artists(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResults>, ApiError> {
    let pattern = search_pattern(&params.q);

    let matches = artist::Entity::find()
        .filter(Expr::col((artist::Entity, artist::Column::Name)).ilike(pattern.as_str()))
        .all(&state.db)
        .await?;

    let now = chrono::Utc::now().fixed_offset();
    let upcoming = show::Entity::find()
        .filter(show::Column::StartTime.gte(now))
        .all(&state.db)
        .await?;
    let mut counts: HashMap<Uuid, u64> = HashMap::new();
    for s in upcoming {
        *counts.entry(s.artist_id).or_insert(0) += 1;
    }

    let data: Vec<SearchItem> = matches
        .into_iter()
        .map(|a| SearchItem {
            num_upcoming_shows: counts.get(&a.id).copied().unwrap_or(0),
            id: a.id,
            name: a.name,
        })
        .collect();

    Ok(Json(SearchResults {
        count: data.len(),
        data,
    }))
}

/// GET /api/artists/{id} — artist detail with past and upcoming shows
pub async fn get_artist(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ArtistDetailResponse>, ApiError> {
    let artist_model = artist::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or(ApiError::NotFound("artist"))?;

    let shows = show::Entity::find()
        .filter(show::Column::ArtistId.eq(id))
        .order_by_asc(show::Column::StartTime)
        .all(&state.db)
        .await?;

    let venue_ids: Vec<Uuid> = shows
        .iter()
        .map(|s| s.venue_id)
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

    let (upcoming, past) = partition_by_time(shows, chrono::Utc::now().fixed_offset());

    let entries = |shows: Vec<show::Model>| -> Vec<ArtistShowEntry> {
        shows
            .into_iter()
            .filter_map(|s| {
                let v = venues.get(&s.venue_id)?;
                Some(ArtistShowEntry {
                    venue_id: s.venue_id,
                    venue_name: v.name.clone(),
                    venue_image_link: v.image_link.clone(),
                    start_time: s.start_time,
                    start_time_display: format_start_time(s.start_time),
                })
            })
            .collect()
    };

    let upcoming_shows = entries(upcoming);
    let past_shows = entries(past);

    Ok(Json(ArtistDetailResponse {
        artist: ArtistResponse::from(artist_model),
        past_shows_count: past_shows.len(),
        upcoming_shows_count: upcoming_shows.len(),
        past_shows,
        upcoming_shows,
    }))
}

/// POST /api/artists
pub async fn create_artist(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateArtistRequest>,
) -> Result<(StatusCode, Json<ArtistResponse>), ApiError> {
    let errors = validate_create(&body);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let txn = state.db.begin().await?;

    let new_artist = artist::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(body.name),
        city: Set(body.city),
        state: Set(body.state),
        phone: Set(body.phone),
        website: Set(body.website),
        genres: Set(body.genres),
        facebook_link: Set(body.facebook_link),
        image_link: Set(body.image_link),
        seeking_venue: Set(has_seeking(body.seeking_description.as_deref())),
        seeking_description: Set(body.seeking_description),
        created_at: Set(chrono::Utc::now().fixed_offset()),
    };

    let created = new_artist.insert(&txn).await?;
    txn.commit().await?;

    Ok((StatusCode::CREATED, Json(ArtistResponse::from(created))))
}

/// PUT /api/artists/{id}
pub async fn update_artist(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateArtistRequest>,
) -> Result<Json<ArtistResponse>, ApiError> {
    let existing = artist::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or(ApiError::NotFound("artist"))?;

    let errors = validate_update(&body);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let txn = state.db.begin().await?;

    let mut active: artist::ActiveModel = existing.into();
    if let Some(name) = body.name {
        active.name = Set(name);
    }
    if let Some(city) = body.city {
        active.city = Set(city);
    }
    if let Some(st) = body.state {
        active.state = Set(st);
    }
    if let Some(phone) = body.phone {
        active.phone = Set(Some(phone));
    }
    if let Some(website) = body.website {
        active.website = Set(Some(website));
    }
    if let Some(genres) = body.genres {
        active.genres = Set(genres);
    }
    if let Some(facebook_link) = body.facebook_link {
        active.facebook_link = Set(facebook_link);
    }
    if let Some(image_link) = body.image_link {
        active.image_link = Set(Some(image_link));
    }
    if let Some(desc) = body.seeking_description {
        // Seeking flag follows the description on every write
        active.seeking_venue = Set(has_seeking(Some(&desc)));
        active.seeking_description = Set(Some(desc));
    }

    let updated = active.update(&txn).await?;
    txn.commit().await?;

    Ok(Json(ArtistResponse::from(updated)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_artist(name: &str) -> artist::Model {
        artist::Model {
            id: Uuid::new_v4(),
            name: name.into(),
            city: "San Francisco".into(),
            state: "CA".into(),
            phone: Some("326-123-5000".into()),
            website: Some("https://www.gunsnpetalsband.com".into()),
            genres: vec!["Rock n Roll".into()],
            facebook_link: "https://www.facebook.com/GunsNPetals".into(),
            image_link: Some("https://img.example.com/gnp.jpg".into()),
            seeking_venue: true,
            seeking_description: Some("Looking for shows to perform at".into()),
            created_at: Utc::now().fixed_offset(),
        }
    }

    fn valid_create_request() -> CreateArtistRequest {
        CreateArtistRequest {
            name: "Guns N Petals".into(),
            city: "San Francisco".into(),
            state: "CA".into(),
            phone: Some("326-123-5000".into()),
            website: None,
            genres: vec!["Rock n Roll".into()],
            facebook_link: "https://www.facebook.com/GunsNPetals".into(),
            image_link: None,
            seeking_description: None,
        }
    }

    // ── Search matching rule ──────────────────────────────────────────
    //
    // The ILIKE pattern runs in Postgres; the same rule is checked here
    // against the scenario fixtures.

    fn ilike_matches(name: &str, term: &str) -> bool {
        name.to_lowercase().contains(&term.to_lowercase())
    }

    #[test]
    fn test_search_term_a_matches_all_three() {
        let names = ["Guns N Petals", "Matt Quevedo", "The Wild Sax Band"];
        assert!(names.iter().all(|n| ilike_matches(n, "a")));
    }

    #[test]
    fn test_search_term_band_matches_only_wild_sax() {
        let names = ["Guns N Petals", "Matt Quevedo", "The Wild Sax Band"];
        let matched: Vec<&&str> = names.iter().filter(|n| ilike_matches(n, "band")).collect();
        assert_eq!(matched, vec![&"The Wild Sax Band"]);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        assert!(ilike_matches("The Wild Sax Band", "BAND"));
    }

    #[test]
    fn test_search_empty_term_matches_everything() {
        assert!(ilike_matches("Guns N Petals", ""));
    }

    // ── Validation ────────────────────────────────────────────────────

    #[test]
    fn test_validate_create_ok() {
        assert!(validate_create(&valid_create_request()).is_empty());
    }

    #[test]
    fn test_validate_create_requires_facebook_link() {
        let mut req = valid_create_request();
        req.facebook_link = "".into();
        let errors = validate_create(&req);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "facebook_link");
        assert_eq!(errors[0].message, "facebook_link is required");
    }

    #[test]
    fn test_validate_create_rejects_malformed_facebook_link() {
        let mut req = valid_create_request();
        req.facebook_link = "GunsNPetals on facebook".into();
        let errors = validate_create(&req);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("not a valid URL"));
    }

    #[test]
    fn test_validate_create_requires_genres() {
        let mut req = valid_create_request();
        req.genres = vec![];
        let errors = validate_create(&req);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "genres");
    }

    #[test]
    fn test_validate_update_empty_request_is_valid() {
        let req: UpdateArtistRequest = serde_json::from_str("{}").unwrap();
        assert!(validate_update(&req).is_empty());
    }

    // ── Serde shapes ──────────────────────────────────────────────────

    #[test]
    fn test_artist_response_from_model() {
        let model = make_artist("Guns N Petals");
        let id = model.id;
        let resp = ArtistResponse::from(model);
        assert_eq!(resp.id, id);
        assert_eq!(resp.name, "Guns N Petals");
        assert!(resp.seeking_venue);
    }

    #[test]
    fn test_artist_detail_flattens_artist_fields() {
        let detail = ArtistDetailResponse {
            artist: ArtistResponse::from(make_artist("Matt Quevedo")),
            past_shows: vec![],
            upcoming_shows: vec![],
            past_shows_count: 0,
            upcoming_shows_count: 0,
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["name"], "Matt Quevedo");
        assert_eq!(json["upcoming_shows_count"], 0);
    }

    #[test]
    fn test_artist_list_item_serialization() {
        let item = ArtistListItem {
            id: Uuid::new_v4(),
            name: "The Wild Sax Band".into(),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["name"], "The Wild Sax Band");
    }

    #[test]
    fn test_create_request_requires_facebook_link_field() {
        // Missing facebook_link is a deserialization error, not a blank
        let json = r#"{
            "name": "Guns N Petals",
            "city": "San Francisco",
            "state": "CA",
            "genres": ["Rock n Roll"]
        }"#;
        assert!(serde_json::from_str::<CreateArtistRequest>(json).is_err());
    }
}
