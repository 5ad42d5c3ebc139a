//! Attachkit – the host-agnostic core of the attachment and search custom controls.
//!
//! The controls live inside a reporting host that owns their lifecycle and
//! their DOM. What they actually decide is independent of that host and is
//! collected here:
//! * A [`mask::MaskRegistry`] maps a screen code (a *mask*, e.g. `FAUPAS`) to
//!   its module, key column and a sample item id.
//! * [`endpoint::Endpoints`] builds the environment-prefixed URLs.
//! * A [`cache::SessionCache`] memoizes responses over any [`cache::CacheStore`]
//!   with per-entry expiry, quota eviction and version checks.
//! * [`transform::transform`] turns a screen definition and its attachment
//!   definitions into one [`transform::EntityDescriptor`] per data source.
//! * [`orchestrator::AttachmentFetcher`] runs a screen load end to end over a
//!   [`transport::Transport`].
//! * [`search::Dropdown`] holds dropdown items, selection and search predicates.
//! * [`control`] wraps the above in the host's lifecycle.
//!
//! ## Modules
//! * [`config`] – Settings read from the host's flat configuration object.
//! * [`definition`] – Screen and attachment definitions as served.
//! * [`tagged`] – Depth-bounded collection of `@object` values from nested JSON.
//! * [`query`] – OData filter text and record query parameters.
//! * [`auth`] – API token acquisition and reuse.
//!
//! ## Screen load
//! A load authenticates (reusing a cached token while it is valid), fetches
//! the screen definition, its BT20 models and their attachment definitions,
//! transforms them, then fetches the root record by key, the child records
//! linked to it, and every record's attachment list. Steps fail softly: a
//! failing child leaves its siblings untouched.
//!
//! ## Quick Start
//! ```
//! use attachkit::definition::ScreenDefinition;
//! use attachkit::transform::transform;
//! let screen: ScreenDefinition = serde_json::from_value(serde_json::json!({
//!     "dataSources": [
//!         { "entityType": "Asset", "table": "FA_ASSET" },
//!         { "entityType": "Component", "table": "FA_COMP", "parentNavigationProperty": "Asset",
//!           "linkages": [{ "parentProperty": "Faid", "childProperty": "Faid" }] }
//!     ],
//!     "rootComponent": { "dataSource": "Asset" }
//! })).unwrap();
//! let model = transform(&screen, &[]).unwrap();
//! assert_eq!(model.root().unwrap().root_id_columns, Some(vec!["Faid".to_string()]));
//! ```

pub mod auth;
pub mod cache;
pub mod config;
pub mod control;
pub mod definition;
pub mod endpoint;
pub mod error;
pub mod mask;
pub mod orchestrator;
pub mod query;
pub mod search;
pub mod tagged;
pub mod transform;
pub mod transport;
