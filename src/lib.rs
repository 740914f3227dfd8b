//! Overlay rendering engine for campus places and routes on a live map.
//!
//! The engine projects points, polygons, and multi-part routes onto a
//! host-owned map surface, keeps them in sync with pointer hover and
//! selection, and redraws the same shared surface on every screen change
//! without leaking layers, sources, markers, or handlers. The host is
//! responsible only for implementing [`surface::Surface`] over its map
//! library, forwarding pointer events, and reacting to the
//! [`engine::OverlayEvent`]s the engine returns.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Host-facing draw/remove/event API ([`engine::OverlayEngine`]) |
//! | [`surface`] | The map surface trait and its boundary types |
//! | [`memory`] | Headless in-memory surface for tests and previews |
//! | [`normalize`] | Arbitrary GeoJSON-shaped input to flat features |
//! | [`group`] | Features to one group per entity |
//! | [`icon`] | Icon resolution and the surface-registered atlas |
//! | [`glyph`] | Built-in vector glyphs and their rasterizer |
//! | [`layer_set`] | Namespaced source/layer lifecycle |
//! | [`interaction`] | Hover/selection state machine and handler subscriptions |
//! | [`places`] | Place layer plans |
//! | [`routes`] | Route colors and layer plans |
//! | [`scratch`] | Single-geometry preview overlay |
//! | [`viewport`] | Camera framing |
//! | [`gate`] | Deferral of draws until the style loads |
//! | [`style`] | Source data, layer specs, expressions, filters |
//! | [`geometry`] | Positions, bounds, and normalized geometry |
//! | [`color`] | Hex parsing, shading, stable palette colors |
//! | [`config`] | Engine configuration from the environment |
//! | [`error`] | Error types |

pub mod color;
pub mod config;
pub mod engine;
pub mod error;
pub mod gate;
pub mod geometry;
pub mod glyph;
pub mod group;
pub mod icon;
pub mod interaction;
pub mod layer_set;
pub mod memory;
pub mod normalize;
pub mod places;
pub mod routes;
pub mod scratch;
pub mod style;
pub mod surface;
pub mod viewport;
