// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

pub mod detect;
pub mod errors;
pub mod http_server;
pub mod stream;

pub use detect::{DetectResponse, GalleryEntry};
pub use errors::ApiError;
pub use http_server::{router, start_server, AppState};
