// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod connection;
pub mod library;
pub mod user;

pub use connection::{
    ServiceLink, SpotifyConnection, SpotifyProfile, SpotifyTokens, TokenRefresh, SPOTIFY_SERVICE,
};
pub use library::{Image, Page, SavedTrack};
pub use user::{NewUser, User, UserId};
