use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::auth::AuthUser;
use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::storage::{Feed, FeedFollow, User};
use crate::util::validate_feed_url;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateFeedRequest {
    pub name: String,
    pub url: String,
}

/// A new feed plus the follow its creator gets automatically.
#[derive(Debug, Serialize)]
pub struct CreateFeedResponse {
    pub feed: Feed,
    pub feed_follow: FeedFollow,
}

#[derive(Debug, Deserialize)]
pub struct CreateFeedFollowRequest {
    pub feed_id: i64,
}

fn required(field: &str, value: &str) -> ApiResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::bad_request(format!("{field} is required")));
    }
    Ok(value.to_string())
}

pub async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn err() -> ApiError {
    ApiError::internal("error endpoint requested")
}

pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let Json(req) = payload?;
    let name = required("name", &req.name)?;

    let user = state.db.create_user(&name).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

pub async fn create_feed(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<CreateFeedRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreateFeedResponse>)> {
    let Json(req) = payload?;
    let name = required("name", &req.name)?;
    let url = validate_feed_url(&req.url)?;

    let feed = state.db.create_feed(&name, url.as_str(), user.id).await?;
    let feed_follow = state.db.create_feed_follow(user.id, feed.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateFeedResponse { feed, feed_follow }),
    ))
}

pub async fn get_feeds(State(state): State<AppState>) -> ApiResult<Json<Vec<Feed>>> {
    Ok(Json(state.db.get_all_feeds().await?))
}

pub async fn create_feed_follow(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<CreateFeedFollowRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<FeedFollow>)> {
    let Json(req) = payload?;

    // Unknown feeds are a 404, not a foreign key conflict
    state.db.get_feed(req.feed_id).await?;
    let follow = state.db.create_feed_follow(user.id, req.feed_id).await?;
    Ok((StatusCode::CREATED, Json(follow)))
}

pub async fn get_feed_follows(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<FeedFollow>>> {
    Ok(Json(state.db.get_feed_follows_for_user(user.id).await?))
}

pub async fn delete_feed_follow(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(feed_follow_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    state.db.delete_feed_follow(feed_follow_id, user.id).await?;
    Ok(Json(json!({})))
}
