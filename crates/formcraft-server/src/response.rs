//! Success envelopes.
//!
//! Every successful body is `{"success": true, "data": ...}`; list
//! endpoints add a `pagination` object.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use formcraft_core::Page;

/// Pagination metadata of a list response.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u64,
}

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
            pagination: None,
        }
    }
}

impl<T: Serialize> ApiResponse<Vec<T>> {
    /// Envelope for one page of a list.
    pub fn page(page: Page<T>) -> Self {
        let pagination = Pagination {
            page: page.page,
            per_page: page.per_page,
            total: page.total,
            total_pages: page.total_pages(),
        };
        Self {
            success: true,
            data: page.items,
            pagination: Some(pagination),
        }
    }
}

/// 200 with `data`.
pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::new(data))
}

/// 201 with `data`.
pub fn created<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::CREATED, Json(ApiResponse::new(data)))
}

/// 200 with one page and its pagination.
pub fn paged<T: Serialize>(page: Page<T>) -> Json<ApiResponse<Vec<T>>> {
    Json(ApiResponse::page(page))
}
