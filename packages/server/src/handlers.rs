//! HTTP handler functions for the road watch API.

use actix_web::{HttpResponse, web};
use road_watch_database_models::NewPothole;
use road_watch_geocoder::nominatim::NominatimClient;
use road_watch_geography::Coordinate;
use road_watch_server_models::{
    ApiError, ApiHealth, ApiPothole, CreatePotholeRequest, ListPotholesParams, ReverseQueryParams,
    SearchQueryParams,
};

use crate::AppState;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Validates a coordinate pair and checks it falls inside Portugal.
fn validate_location(lat: Option<f64>, lng: Option<f64>) -> Result<Coordinate, String> {
    let (Some(lat), Some(lng)) = (lat, lng) else {
        return Err("lat and lng are required".to_string());
    };

    let coordinate = Coordinate::new(lat, lng).map_err(|e| e.to_string())?;

    if !coordinate.is_within_territory() {
        return Err("Location is outside Portugal (mainland, Madeira or Azores)".to_string());
    }

    Ok(coordinate)
}

fn bad_request(message: impl Into<String>) -> HttpResponse {
    HttpResponse::BadRequest().json(ApiError::new(message))
}

fn geocoder_unavailable() -> HttpResponse {
    HttpResponse::ServiceUnavailable().json(ApiError::new("Geocoding is not configured"))
}

/// `POST /api/potholes`
///
/// Validates the location, reverse geocodes it when a geocoder is
/// configured, and stores the report. Geocoding problems never reject a
/// report; the row is stored `pending` instead.
pub async fn create_pothole(
    state: web::Data<AppState>,
    body: web::Json<CreatePotholeRequest>,
) -> HttpResponse {
    let body = body.into_inner();

    let coordinate = match validate_location(body.lat, body.lng) {
        Ok(c) => c,
        Err(message) => return bad_request(message),
    };

    let geocode = match &state.geocoder {
        Some(client) => geocode_submission(client, coordinate).await,
        None => None,
    };

    let new = NewPothole {
        user_id: body.user_id,
        lat: coordinate.latitude,
        lng: coordinate.longitude,
        address: body.address,
        description: body.description,
        severity: body.severity.unwrap_or_default(),
        geocode,
    };

    match state.store.insert_pothole(&new).await {
        Ok(row) => {
            log::info!(
                "Stored pothole {} ({}) at ({}, {})",
                row.id,
                row.geocode_status,
                row.lat,
                row.lng
            );
            HttpResponse::Created().json(ApiPothole::from(row))
        }
        Err(e) => {
            log::error!("Failed to store pothole: {e}");
            HttpResponse::InternalServerError().json(ApiError::new("Failed to store pothole"))
        }
    }
}

async fn geocode_submission(
    client: &NominatimClient,
    coordinate: Coordinate,
) -> Option<road_watch_geocoder::GeocodeResult> {
    match client
        .reverse_geocode(coordinate.latitude, coordinate.longitude)
        .await
    {
        Ok(result) => result,
        Err(e) => {
            log::warn!(
                "Submission geocoding failed for ({}, {}), leaving pending: {e}",
                coordinate.latitude,
                coordinate.longitude
            );
            None
        }
    }
}

/// `GET /api/potholes`
///
/// Lists every report newest first, archived ones included. An optional
/// positive `limit` keeps only the most recent ones.
pub async fn list_potholes(
    state: web::Data<AppState>,
    params: web::Query<ListPotholesParams>,
) -> HttpResponse {
    match state.store.list_potholes(params.limit).await {
        Ok(rows) => {
            let potholes: Vec<ApiPothole> = rows.into_iter().map(ApiPothole::from).collect();
            HttpResponse::Ok().json(potholes)
        }
        Err(e) => {
            log::error!("Failed to list potholes: {e}");
            HttpResponse::InternalServerError().json(ApiError::new("Failed to list potholes"))
        }
    }
}

/// `GET /api/geocode/reverse`
pub async fn reverse_geocode(
    state: web::Data<AppState>,
    params: web::Query<ReverseQueryParams>,
) -> HttpResponse {
    let coordinate = match validate_location(Some(params.lat), Some(params.lng)) {
        Ok(c) => c,
        Err(message) => return bad_request(message),
    };

    let Some(client) = &state.geocoder else {
        return geocoder_unavailable();
    };

    match client
        .reverse_geocode(coordinate.latitude, coordinate.longitude)
        .await
    {
        Ok(Some(result)) if result.is_resolved() => HttpResponse::Ok().json(result),
        Ok(_) => HttpResponse::NotFound().json(ApiError::new("No address found for location")),
        Err(e) => {
            log::error!("Reverse geocoding failed: {e}");
            HttpResponse::BadGateway().json(ApiError::new("Geocoding provider error"))
        }
    }
}

/// `GET /api/geocode/search`
pub async fn search(
    state: web::Data<AppState>,
    params: web::Query<SearchQueryParams>,
) -> HttpResponse {
    let Some(client) = &state.geocoder else {
        return geocoder_unavailable();
    };

    match client.search(&params.q).await {
        Ok(results) => HttpResponse::Ok().json(results),
        Err(e) => {
            log::error!("Location search failed: {e}");
            HttpResponse::BadGateway().json(ApiError::new("Geocoding provider error"))
        }
    }
}
