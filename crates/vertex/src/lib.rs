//! Vertex AI client library.
//!
//! Provides the HTTP implementation of the generation provider (Imagen
//! predictions, Veo long-running operations), the provider payload types,
//! and an OAuth refresh-token credential source.

pub mod api;
pub mod auth;
pub mod messages;

pub use api::{VertexClient, VertexConfig};
pub use auth::{OAuthCredentials, OAuthTokenSource};
