use axum::{extract::State, Json};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde::Serialize;
use std::sync::Arc;

use crate::error::ApiError;
use gigboard_db::entities::{artist, show, venue};
use gigboard_db::AppState;

#[derive(Debug, Serialize)]
pub struct StatsOverview {
    pub total_venues: u64,
    pub total_artists: u64,
    pub total_shows: u64,
    pub upcoming_shows: u64,
}

/// GET /api/stats/overview — directory-wide counts
pub async fn stats_overview(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatsOverview>, ApiError> {
    let total_venues = venue::Entity::find().count(&state.db).await?;
    let total_artists = artist::Entity::find().count(&state.db).await?;
    let total_shows = show::Entity::find().count(&state.db).await?;

    let upcoming_shows = show::Entity::find()
        .filter(show::Column::StartTime.gte(chrono::Utc::now().fixed_offset()))
        .count(&state.db)
        .await?;

    Ok(Json(StatsOverview {
        total_venues,
        total_artists,
        total_shows,
        upcoming_shows,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_overview_serialization() {
        let stats = StatsOverview {
            total_venues: 3,
            total_artists: 3,
            total_shows: 10,
            upcoming_shows: 4,
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["total_venues"], 3);
        assert_eq!(json["upcoming_shows"], 4);
    }
}
