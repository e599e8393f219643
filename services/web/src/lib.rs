pub mod adapters;
pub mod auth;
pub mod config;
pub mod error;
pub mod geocode;
pub mod notifications;
pub mod realtime;
pub mod web;
