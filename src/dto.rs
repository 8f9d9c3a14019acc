use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Event, EventStatus, RegistrationStatus, User, UserRole, UserStatus};

#[derive(Debug, Deserialize, Clone)]
pub struct NewUserDto {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: UserRole,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub email: String,
    pub role: UserRole,
    pub exp: usize,
}

impl Claims {
    pub fn new(user: &User, exp: usize) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
            exp,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChangePasswordDto {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpdateProfileDto {
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpdateUserStatusDto {
    pub status: UserStatus,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewEventDto {
    pub title: String,
    pub description: String,
    pub location: String,
    pub category: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventDto {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    pub status: Option<EventStatus>,
}

impl UpdateEventDto {
    /// Applies the supplied fields onto an existing event, leaving the
    /// rest untouched.
    pub fn apply(self, event: &mut Event) {
        if let Some(v) = self.title {
            event.title = v;
        }
        if let Some(v) = self.description {
            event.description = v;
        }
        if let Some(v) = self.location {
            event.location = v;
        }
        if let Some(v) = self.category {
            event.category = v;
        }
        if let Some(v) = self.start_date {
            event.start_date = v;
        }
        if let Some(v) = self.end_date {
            event.end_date = v;
        }
        if let Some(v) = self.image_url {
            event.image_url = Some(v);
        }
        if let Some(v) = self.status {
            event.status = v;
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ListEventsQuery {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    pub search: Option<String>,
    pub category: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewRegistrationDto {
    pub event_id: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpdateRegistrationStatusDto {
    pub status: RegistrationStatus,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpdateEventStatusDto {
    pub status: EventStatus,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewPostDto {
    pub event_id: i64,
    pub content: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NewCommentDto {
    pub content: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RecentPostsQuery {
    pub limit: Option<usize>,
}
