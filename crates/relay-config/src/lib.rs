//! Typed access to environment-sourced settings (C1, spec §6.4).
//!
//! Simplified from `astrid-config::loader`'s multi-layer TOML-merge pipeline
//! (embedded defaults → `/etc` → `~/.astrid` → workspace restrictions → env
//! fallbacks) down to the flat env-var surface spec.md §6.4 actually names.
//! A full layered config file format is outside this spec's scope.

pub mod settings;

pub use settings::{BackendKind, Settings, SettingsError};
