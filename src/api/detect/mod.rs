// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

pub mod handler;
pub mod response;

pub use handler::detect_handler;
pub use response::{DetectResponse, GalleryEntry};
