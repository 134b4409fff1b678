// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP job API.  Every response body is `{"success": true, "data": ...}` or
// `{"success": false, "error": "..."}`.

pub mod error;
pub mod response;
pub mod routes;

pub use error::ApiError;
pub use response::ApiResponse;
pub use routes::router;
