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
use super::{search_pattern, MessageResponse, SearchItem, SearchParams, SearchResults};
use crate::error::ApiError;
use crate::validation::{
    has_seeking, require, validate_genres, validate_phone, validate_url, FieldError,
};
use gigboard_db::entities::{artist, show, venue};
use gigboard_db::AppState;

#[derive(Debug, Serialize)]
pub struct VenueResponse {
    pub id: Uuid,
    pub name: String,
    pub city: String,
    pub state: String,
    pub address: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub genres: Vec<String>,
    pub facebook_link: Option<String>,
    pub image_link: Option<String>,
    pub seeking_talent: bool,
    pub seeking_description: Option<String>,
    pub created_at: chrono::DateTime<chrono::FixedOffset>,
}

impl From<venue::Model> for VenueResponse {
    fn from(v: venue::Model) -> Self {
        Self {
            id: v.id,
            name: v.name,
            city: v.city,
            state: v.state,
            address: v.address,
            phone: v.phone,
            website: v.website,
            genres: v.genres,
            facebook_link: v.facebook_link,
            image_link: v.image_link,
            seeking_talent: v.seeking_talent,
            seeking_description: v.seeking_description,
            created_at: v.created_at,
        }
    }
}

/// One venue row inside a location group.
#[derive(Debug, Serialize)]
pub struct VenueSummary {
    pub id: Uuid,
    pub name: String,
    pub num_upcoming_shows: u64,
}

/// Venues sharing a (city, state) pair.
#[derive(Debug, Serialize)]
pub struct VenueArea {
    pub city: String,
    pub state: String,
    pub venues: Vec<VenueSummary>,
}

/// A show on a venue page, annotated with the performing artist.
#[derive(Debug, Serialize)]
pub struct VenueShowEntry {
    pub artist_id: Uuid,
    pub artist_name: String,
    pub artist_image_link: Option<String>,
    pub start_time: chrono::DateTime<chrono::FixedOffset>,
    pub start_time_display: String,
}

#[derive(Debug, Serialize)]
pub struct VenueDetailResponse {
    #[serde(flatten)]
    pub venue: VenueResponse,
    pub past_shows: Vec<VenueShowEntry>,
    pub upcoming_shows: Vec<VenueShowEntry>,
    pub past_shows_count: usize,
    pub upcoming_shows_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct CreateVenueRequest {
    pub name: String,
    pub city: String,
    pub state: String,
    pub address: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub genres: Vec<String>,
    pub facebook_link: Option<String>,
    pub image_link: Option<String>,
    pub seeking_description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateVenueRequest {
    pub name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub genres: Option<Vec<String>>,
    pub facebook_link: Option<String>,
    pub image_link: Option<String>,
    pub seeking_description: Option<String>,
}

fn validate_create(req: &CreateVenueRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    require(&mut errors, "name", &req.name);
    require(&mut errors, "city", &req.city);
    require(&mut errors, "state", &req.state);
    require(&mut errors, "address", &req.address);
    validate_genres(&mut errors, &req.genres);
    validate_phone(&mut errors, "phone", req.phone.as_deref());
    validate_url(&mut errors, "website", req.website.as_deref());
    validate_url(&mut errors, "facebook_link", req.facebook_link.as_deref());
    validate_url(&mut errors, "image_link", req.image_link.as_deref());
    errors
}

fn validate_update(req: &UpdateVenueRequest) -> Vec<FieldError> {
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
    if let Some(ref address) = req.address {
        require(&mut errors, "address", address);
    }
    if let Some(ref genres) = req.genres {
        validate_genres(&mut errors, genres);
    }
    validate_phone(&mut errors, "phone", req.phone.as_deref());
    validate_url(&mut errors, "website", req.website.as_deref());
    validate_url(&mut errors, "facebook_link", req.facebook_link.as_deref());
    validate_url(&mut errors, "image_link", req.image_link.as_deref());
    errors
}

/// Group venues by their distinct (city, state) pairs, in first-seen order.
/// Each venue lands in exactly one group.
pub fn group_by_location(
    venues: Vec<venue::Model>,
    upcoming_counts: &HashMap<Uuid, u64>,
) -> Vec<VenueArea> {
    let mut areas: Vec<VenueArea> = Vec::new();
    for v in venues {
        let summary = VenueSummary {
            id: v.id,
            name: v.name,
            num_upcoming_shows: upcoming_counts.get(&v.id).copied().unwrap_or(0),
        };
        match areas
            .iter()
            .position(|a| a.city == v.city && a.state == v.state)
        {
            Some(i) => areas[i].venues.push(summary),
            None => areas.push(VenueArea {
                city: v.city,
                state: v.state,
                venues: vec![summary],
            }),
        }
    }
    areas
}

/// Upcoming-show counts keyed by venue id.
async fn upcoming_counts_by_venue(
    db: &sea_orm::DatabaseConnection,
    now: chrono::DateTime<chrono::FixedOffset>,
) -> Result<HashMap<Uuid, u64>, sea_orm::DbErr> {
    let upcoming = show::Entity::find()
        .filter(show::Column::StartTime.gte(now))
        .all(db)
        .await?;
    let mut counts: HashMap<Uuid, u64> = HashMap::new();
    for s in upcoming {
        *counts.entry(s.venue_id).or_insert(0) += 1;
    }
    Ok(counts)
}

/// GET /api/venues — venues grouped by city and state
pub async fn list_venues(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<VenueArea>>, ApiError> {
    let venues = venue::Entity::find()
        .order_by_asc(venue::Column::City)
        .order_by_asc(venue::Column::State)
        .order_by_asc(venue::Column::Name)
        .all(&state.db)
        .await?;

    let counts = upcoming_counts_by_venue(&state.db, chrono::Utc::now().fixed_offset()).await?;

    Ok(Json(group_by_location(venues, &counts)))
}

/// GET /api/venues/search?q=...
pub async fn search_venues(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResults>, ApiError> {
    let pattern = search_pattern(&params.q);

    let matches = venue::Entity::find()
        .filter(Expr::col((venue::Entity, venue::Column::Name)).ilike(pattern.as_str()))
        .all(&state.db)
        .await?;

    let counts = upcoming_counts_by_venue(&state.db, chrono::Utc::now().fixed_offset()).await?;

    let data: Vec<SearchItem> = matches
        .into_iter()
        .map(|v| SearchItem {
            num_upcoming_shows: counts.get(&v.id).copied().unwrap_or(0),
            id: v.id,
            name: v.name,
        })
        .collect();

    Ok(Json(SearchResults {
        count: data.len(),
        data,
    }))
}

/// GET /api/venues/{id} — venue detail with its shows split into past
/// and upcoming around the current time.
pub async fn get_venue(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<VenueDetailResponse>, ApiError> {
    let venue_model = venue::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or(ApiError::NotFound("venue"))?;

    let shows = show::Entity::find()
        .filter(show::Column::VenueId.eq(id))
        .order_by_asc(show::Column::StartTime)
        .all(&state.db)
        .await?;

    let artist_ids: Vec<Uuid> = shows
        .iter()
        .map(|s| s.artist_id)
        .collect::<std::collections::HashSet<_>>()
        .into_iter()
        .collect();
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

    let (upcoming, past) = partition_by_time(shows, chrono::Utc::now().fixed_offset());

    let entries = |shows: Vec<show::Model>| -> Vec<VenueShowEntry> {
        shows
            .into_iter()
            .filter_map(|s| {
                let a = artists.get(&s.artist_id)?;
                Some(VenueShowEntry {
                    artist_id: s.artist_id,
                    artist_name: a.name.clone(),
                    artist_image_link: a.image_link.clone(),
                    start_time: s.start_time,
                    start_time_display: format_start_time(s.start_time),
                })
            })
            .collect()
    };

    let upcoming_shows = entries(upcoming);
    let past_shows = entries(past);

    Ok(Json(VenueDetailResponse {
        venue: VenueResponse::from(venue_model),
        past_shows_count: past_shows.len(),
        upcoming_shows_count: upcoming_shows.len(),
        past_shows,
        upcoming_shows,
    }))
}

/// POST /api/venues
pub async fn create_venue(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateVenueRequest>,
) -> Result<(StatusCode, Json<VenueResponse>), ApiError> {
    let errors = validate_create(&body);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let txn = state.db.begin().await?;

    let new_venue = venue::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(body.name),
        city: Set(body.city),
        state: Set(body.state),
        address: Set(body.address),
        phone: Set(body.phone),
        website: Set(body.website),
        genres: Set(body.genres),
        facebook_link: Set(body.facebook_link),
        image_link: Set(body.image_link),
        seeking_talent: Set(has_seeking(body.seeking_description.as_deref())),
        seeking_description: Set(body.seeking_description),
        created_at: Set(chrono::Utc::now().fixed_offset()),
    };

    let created = new_venue.insert(&txn).await?;
    txn.commit().await?;

    Ok((StatusCode::CREATED, Json(VenueResponse::from(created))))
}

/// PUT /api/venues/{id}
pub async fn update_venue(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateVenueRequest>,
) -> Result<Json<VenueResponse>, ApiError> {
    let existing = venue::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or(ApiError::NotFound("venue"))?;

    let errors = validate_update(&body);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let txn = state.db.begin().await?;

    let mut active: venue::ActiveModel = existing.into();
    if let Some(name) = body.name {
        active.name = Set(name);
    }
    if let Some(city) = body.city {
        active.city = Set(city);
    }
    if let Some(st) = body.state {
        active.state = Set(st);
    }
    if let Some(address) = body.address {
        active.address = Set(address);
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
        active.facebook_link = Set(Some(facebook_link));
    }
    if let Some(image_link) = body.image_link {
        active.image_link = Set(Some(image_link));
    }
    if let Some(desc) = body.seeking_description {
        // Seeking flag follows the description on every write
        active.seeking_talent = Set(has_seeking(Some(&desc)));
        active.seeking_description = Set(Some(desc));
    }

    let updated = active.update(&txn).await?;
    txn.commit().await?;

    Ok(Json(VenueResponse::from(updated)))
}

/// DELETE /api/venues/{id}
///
/// The venue's shows are removed in the same transaction as the venue
/// itself; the schema-level cascade remains as backstop.
pub async fn delete_venue(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    let existing = venue::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or(ApiError::NotFound("venue"))?;

    let txn = state.db.begin().await?;

    show::Entity::delete_many()
        .filter(show::Column::VenueId.eq(id))
        .exec(&txn)
        .await?;

    venue::Entity::delete_by_id(id).exec(&txn).await?;

    txn.commit().await?;

    Ok(Json(MessageResponse {
        message: format!("Venue {} deleted.", existing.name),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_venue(name: &str, city: &str, state: &str) -> venue::Model {
        venue::Model {
            id: Uuid::new_v4(),
            name: name.into(),
            city: city.into(),
            state: state.into(),
            address: "1015 Folsom Street".into(),
            phone: Some("123-123-1234".into()),
            website: Some("https://themusicalhop.com".into()),
            genres: vec!["Jazz".into(), "Reggae".into()],
            facebook_link: Some("https://www.facebook.com/TheMusicalHop".into()),
            image_link: None,
            seeking_talent: false,
            seeking_description: None,
            created_at: Utc::now().fixed_offset(),
        }
    }

    fn valid_create_request() -> CreateVenueRequest {
        CreateVenueRequest {
            name: "The Musical Hop".into(),
            city: "San Francisco".into(),
            state: "CA".into(),
            address: "1015 Folsom Street".into(),
            phone: Some("123-123-1234".into()),
            website: Some("https://themusicalhop.com".into()),
            genres: vec!["Jazz".into()],
            facebook_link: Some("https://www.facebook.com/TheMusicalHop".into()),
            image_link: None,
            seeking_description: None,
        }
    }

    // ── Grouping ──────────────────────────────────────────────────────

    #[test]
    fn test_group_by_location_shared_pair_single_group() {
        let v1 = make_venue("The Musical Hop", "San Francisco", "CA");
        let v2 = make_venue("Park Square Live Music & Coffee", "San Francisco", "CA");
        let v3 = make_venue("The Dueling Pianos Bar", "New York", "NY");
        let areas = group_by_location(vec![v1, v2, v3], &HashMap::new());

        assert_eq!(areas.len(), 2);
        let sf = areas
            .iter()
            .find(|a| a.city == "San Francisco" && a.state == "CA")
            .unwrap();
        assert_eq!(sf.venues.len(), 2);
        let ny = areas
            .iter()
            .find(|a| a.city == "New York" && a.state == "NY")
            .unwrap();
        assert_eq!(ny.venues.len(), 1);
    }

    #[test]
    fn test_group_by_location_no_venue_in_two_groups() {
        let venues: Vec<venue::Model> = vec![
            make_venue("A", "San Francisco", "CA"),
            make_venue("B", "New York", "NY"),
            make_venue("C", "San Francisco", "CA"),
        ];
        let ids: Vec<Uuid> = venues.iter().map(|v| v.id).collect();
        let areas = group_by_location(venues, &HashMap::new());

        let mut seen: Vec<Uuid> = areas
            .iter()
            .flat_map(|a| a.venues.iter().map(|v| v.id))
            .collect();
        seen.sort();
        let mut expected = ids;
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_group_by_location_same_city_different_state() {
        let areas = group_by_location(
            vec![
                make_venue("A", "Springfield", "IL"),
                make_venue("B", "Springfield", "MA"),
            ],
            &HashMap::new(),
        );
        assert_eq!(areas.len(), 2);
    }

    #[test]
    fn test_group_by_location_carries_upcoming_counts() {
        let v = make_venue("The Musical Hop", "San Francisco", "CA");
        let mut counts = HashMap::new();
        counts.insert(v.id, 3);
        let areas = group_by_location(vec![v], &counts);
        assert_eq!(areas[0].venues[0].num_upcoming_shows, 3);
    }

    // ── Validation ────────────────────────────────────────────────────

    #[test]
    fn test_validate_create_ok() {
        assert!(validate_create(&valid_create_request()).is_empty());
    }

    #[test]
    fn test_validate_create_collects_all_errors() {
        let req = CreateVenueRequest {
            name: "".into(),
            city: "".into(),
            state: "CA".into(),
            address: "".into(),
            phone: Some("nope".into()),
            website: None,
            genres: vec![],
            facebook_link: Some("not-a-url".into()),
            image_link: None,
            seeking_description: None,
        };
        let errors = validate_create(&req);
        let fields: Vec<&str> = errors.iter().map(|e| e.field).collect();
        assert!(fields.contains(&"name"));
        assert!(fields.contains(&"city"));
        assert!(fields.contains(&"address"));
        assert!(fields.contains(&"genres"));
        assert!(fields.contains(&"phone"));
        assert!(fields.contains(&"facebook_link"));
        assert_eq!(errors.len(), 6);
    }

    #[test]
    fn test_validate_update_partial_fields() {
        let req = UpdateVenueRequest {
            name: Some("".into()),
            city: None,
            state: None,
            address: None,
            phone: None,
            website: None,
            genres: Some(vec![]),
            facebook_link: None,
            image_link: None,
            seeking_description: None,
        };
        let errors = validate_update(&req);
        assert_eq!(errors.len(), 2);
    }

    // ── Serde shapes ──────────────────────────────────────────────────

    #[test]
    fn test_venue_response_from_model() {
        let model = make_venue("The Musical Hop", "San Francisco", "CA");
        let id = model.id;
        let resp = VenueResponse::from(model);
        assert_eq!(resp.id, id);
        assert_eq!(resp.name, "The Musical Hop");
        assert_eq!(resp.genres, vec!["Jazz".to_string(), "Reggae".to_string()]);
        assert!(!resp.seeking_talent);
    }

    #[test]
    fn test_venue_detail_flattens_venue_fields() {
        let model = make_venue("The Musical Hop", "San Francisco", "CA");
        let detail = VenueDetailResponse {
            venue: VenueResponse::from(model),
            past_shows: vec![],
            upcoming_shows: vec![],
            past_shows_count: 0,
            upcoming_shows_count: 0,
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["name"], "The Musical Hop");
        assert_eq!(json["past_shows_count"], 0);
        assert!(json["upcoming_shows"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_create_request_minimal_deserialization() {
        let json = r#"{
            "name": "The Musical Hop",
            "city": "San Francisco",
            "state": "CA",
            "address": "1015 Folsom Street",
            "genres": ["Jazz"]
        }"#;
        let req: CreateVenueRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.name, "The Musical Hop");
        assert!(req.phone.is_none());
        assert!(req.seeking_description.is_none());
    }

    #[test]
    fn test_update_request_all_optional() {
        let req: UpdateVenueRequest = serde_json::from_str("{}").unwrap();
        assert!(req.name.is_none());
        assert!(req.genres.is_none());
    }
}
