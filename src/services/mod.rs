// SPDX-License-Identifier: MIT

//! Business logic services.

pub mod auth;
pub mod generation;
pub mod images;
pub mod presets;
pub mod session;
pub mod trackers;
