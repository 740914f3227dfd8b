//! Top-level overlay engine: the host-facing draw, remove, and event API.
//!
//! DESIGN
//! ======
//! `OverlayEngine` owns the icon atlas and the host's type catalog, plus one
//! context per surface it has drawn into. A context holds an
//! [`OverlayLayerSet`] per namespace, the style-ready gate, and the route
//! color cache, so one engine can serve several surfaces without their
//! handlers, markers, or selections mixing. Each draw runs Normalize, Group, Plan, Atlas, Sync, Bind, Fit. Every
//! plan is computed before the first surface mutation.
//!
//! The host forwards pointer events for handlers the engine subscribed to
//! [`OverlayEngine::handle_pointer`] and receives [`OverlayEvent`]s back, the
//! same way `EngineCore` hands `Action`s to its host.
//!
//! ERROR HANDLING
//! ==============
//! Nothing escapes a public entry point. Surface failures are logged with the
//! namespace and operation and reported as [`DrawStatus::Failed`] (or simply
//! dropped for removals and events). Bad input degrades to fewer features.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::SurfaceError;
use crate::gate::ReadyGate;
use crate::geometry::{GeometryType, LngLat};
use crate::group::group;
use crate::icon::{IconAtlas, TypeCatalog};
use crate::interaction::Activation;
use crate::layer_set::{Namespace, OverlayLayerSet, OverlayPlan};
use crate::normalize::{RawGeometryInput, normalize};
use crate::places::{self, PlaceDrawOptions, PlaceMode, PlaceStyle};
use crate::routes::{self, RouteDrawOptions, RoutePalette};
use crate::scratch;
use crate::surface::{Cursor, PointerEvent, Surface, SurfaceId};
use crate::viewport;

/// Outcome of a draw call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawStatus {
    Drawn { namespace: Namespace, features: usize, groups: usize },
    /// Queued until the style loads; replayed by [`OverlayEngine::on_style_ready`].
    Deferred { namespace: Namespace },
    /// A surface failure was caught and logged.
    Failed { namespace: Namespace },
}

impl DrawStatus {
    #[must_use]
    pub fn namespace(&self) -> Namespace {
        match self {
            Self::Drawn { namespace, .. } | Self::Deferred { namespace } | Self::Failed { namespace } => *namespace,
        }
    }
}

/// Domain events emitted to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OverlayEvent {
    EntityActivated {
        namespace: Namespace,
        entity_id: String,
        properties: Map<String, Value>,
        geometry_type: GeometryType,
        pointer: LngLat,
        selected: bool,
    },
    RouteActivated { route_id: String, properties: Map<String, Value>, pointer: LngLat, selected: bool },
}

impl OverlayEvent {
    fn from_activation(namespace: Namespace, a: Activation) -> Self {
        match namespace {
            Namespace::Routes => Self::RouteActivated {
                route_id: a.entity_id,
                properties: a.properties,
                pointer: a.pointer,
                selected: a.selected,
            },
            _ => Self::EntityActivated {
                namespace,
                entity_id: a.entity_id,
                properties: a.properties,
                geometry_type: a.geometry_type,
                pointer: a.pointer,
                selected: a.selected,
            },
        }
    }
}

/// A draw waiting for the style to load.
#[derive(Debug, Clone)]
enum PendingDraw {
    Places(RawGeometryInput, PlaceDrawOptions),
    Routes(RawGeometryInput, RouteDrawOptions),
    Scratch(RawGeometryInput),
}

/// Parse text input up front so mode inference sees its real shape.
fn resolve_text(input: RawGeometryInput) -> RawGeometryInput {
    match input {
        RawGeometryInput::Text(text) => RawGeometryInput::from_text(&text).unwrap_or_else(|e| {
            warn!(error = %e, "unparseable geometry document");
            RawGeometryInput::List(Vec::new())
        }),
        other => other,
    }
}

/// Engine bookkeeping for one surface: the layer set of every namespace,
/// draws waiting on that surface's style, and its route colors.
#[derive(Debug)]
struct SurfaceContext {
    sets: BTreeMap<Namespace, OverlayLayerSet>,
    gate: ReadyGate<PendingDraw>,
    palette: RoutePalette,
}

impl SurfaceContext {
    fn new(config: &EngineConfig) -> Self {
        Self {
            sets: BTreeMap::new(),
            gate: ReadyGate::default(),
            palette: RoutePalette::new(config.hover_shade_percent, config.select_shade_percent),
        }
    }

    fn set(&self, ns: Namespace) -> Option<&OverlayLayerSet> {
        self.sets.get(&ns)
    }
}

pub struct OverlayEngine {
    config: EngineConfig,
    atlas: IconAtlas,
    catalog: TypeCatalog,
    contexts: BTreeMap<SurfaceId, SurfaceContext>,
}

impl Default for OverlayEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl OverlayEngine {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self { atlas: config.atlas(), catalog: TypeCatalog::default(), contexts: BTreeMap::new(), config }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_catalog(&mut self, catalog: TypeCatalog) {
        self.catalog = catalog;
    }

    fn context(&mut self, id: SurfaceId) -> &mut SurfaceContext {
        let config = &self.config;
        self.contexts.entry(id).or_insert_with(|| SurfaceContext::new(config))
    }

    fn set(&self, surface: &dyn Surface, ns: Namespace) -> Option<&OverlayLayerSet> {
        self.contexts.get(&surface.id()).and_then(|c| c.set(ns))
    }

    #[must_use]
    pub fn selected(&self, surface: &dyn Surface, ns: Namespace) -> Option<&str> {
        self.set(surface, ns).and_then(|s| s.controller().selected())
    }

    #[must_use]
    pub fn hovered(&self, surface: &dyn Surface, ns: Namespace) -> Option<&str> {
        self.set(surface, ns).and_then(|s| s.controller().hovered())
    }

    /// Whether the namespace's pointer handlers are bound on `surface`.
    #[must_use]
    pub fn is_bound(&self, surface: &dyn Surface, ns: Namespace) -> bool {
        self.set(surface, ns).is_some_and(|s| s.controller().is_bound())
    }

    /// Whether a draw for `ns` is waiting on the style of `surface`.
    #[must_use]
    pub fn is_pending(&self, surface: &dyn Surface, ns: Namespace) -> bool {
        self.contexts.get(&surface.id()).is_some_and(|c| c.gate.is_pending(ns))
    }

    // --- Draws ---

    /// Draw places. `mode: None` infers multi for list input, single otherwise.
    pub fn draw_places(
        &mut self,
        surface: &mut dyn Surface,
        input: impl Into<RawGeometryInput>,
        options: PlaceDrawOptions,
    ) -> DrawStatus {
        let input = resolve_text(input.into());
        let mode = options.mode.unwrap_or_else(|| PlaceMode::infer(&input));
        let options = PlaceDrawOptions { mode: Some(mode), ..options };
        let ns = mode.namespace();
        if !surface.is_style_loaded() {
            return self.defer(surface.id(), ns, PendingDraw::Places(input, options));
        }
        self.context(surface.id()).gate.cancel(ns);
        let result = self.try_draw_places(surface, ns, &input, &options);
        Self::report(ns, "draw_places", result)
    }

    fn try_draw_places(
        &mut self,
        surface: &mut dyn Surface,
        ns: Namespace,
        input: &RawGeometryInput,
        options: &PlaceDrawOptions,
    ) -> Result<DrawStatus, SurfaceError> {
        let groups = group(normalize(input, ns.prefix()));
        let style = PlaceStyle {
            atlas: &self.atlas,
            catalog: &self.catalog,
            default_icon: &self.config.default_icon,
            select_percent: self.config.select_shade_percent,
        };
        let plan = places::plan(ns, &groups, options, &style);
        let fit = options.should_fit(options.mode.unwrap_or(PlaceMode::Multi));
        if let Some(other) = ns.exclusive_with() {
            self.context(surface.id()).gate.cancel(other);
            self.teardown(surface, other)?;
        }
        self.apply(surface, ns, plan, fit, groups.len())
    }

    /// Draw routes.
    pub fn draw_routes(
        &mut self,
        surface: &mut dyn Surface,
        input: impl Into<RawGeometryInput>,
        options: RouteDrawOptions,
    ) -> DrawStatus {
        let ns = Namespace::Routes;
        let input = resolve_text(input.into());
        if !surface.is_style_loaded() {
            return self.defer(surface.id(), ns, PendingDraw::Routes(input, options));
        }
        let context = self.context(surface.id());
        context.gate.cancel(ns);
        let routes = routes::collect(normalize(&input, ns.prefix()), &mut context.palette);
        let plan = routes::plan(ns, &routes, &options, &self.atlas);
        let result = self.apply(surface, ns, plan, options.fit, routes.len());
        Self::report(ns, "draw_routes", result)
    }

    /// Draw the scratch preview, replacing any previous one.
    pub fn draw_scratch(&mut self, surface: &mut dyn Surface, input: impl Into<RawGeometryInput>) -> DrawStatus {
        let ns = Namespace::Scratch;
        let input = resolve_text(input.into());
        if !surface.is_style_loaded() {
            return self.defer(surface.id(), ns, PendingDraw::Scratch(input));
        }
        self.context(surface.id()).gate.cancel(ns);
        let features = normalize(&input, ns.prefix());
        let count = features.len();
        let result = self.apply(surface, ns, scratch::plan(features), false, count);
        Self::report(ns, "draw_scratch", result)
    }

    fn apply(
        &mut self,
        surface: &mut dyn Surface,
        ns: Namespace,
        mut plan: OverlayPlan,
        fit: bool,
        groups: usize,
    ) -> Result<DrawStatus, SurfaceError> {
        for icon in std::mem::take(&mut plan.icons) {
            self.atlas.ensure(surface, &icon)?;
        }
        let features = plan.feature_count();
        let bounds = plan.bounds;
        self.context(surface.id()).sets.entry(ns).or_insert_with(|| OverlayLayerSet::new(ns)).sync(surface, plan)?;
        if fit {
            viewport::fit(surface, &bounds, self.config.fit_options())?;
        }
        info!(namespace = %ns, features, groups, "overlay drawn");
        Ok(DrawStatus::Drawn { namespace: ns, features, groups })
    }

    fn defer(&mut self, id: SurfaceId, ns: Namespace, draw: PendingDraw) -> DrawStatus {
        let replaced = self.context(id).gate.defer(ns, draw);
        info!(namespace = %ns, replaced, "style not loaded; draw deferred");
        DrawStatus::Deferred { namespace: ns }
    }

    fn report(ns: Namespace, operation: &'static str, result: Result<DrawStatus, SurfaceError>) -> DrawStatus {
        match result {
            Ok(status) => status,
            Err(e) => {
                warn!(namespace = %ns, operation, error = %e, "overlay operation failed");
                DrawStatus::Failed { namespace: ns }
            }
        }
    }

    /// Replay draws queued while the style of `surface` was loading, each
    /// exactly once.
    pub fn on_style_ready(&mut self, surface: &mut dyn Surface) -> Vec<DrawStatus> {
        if !surface.is_style_loaded() {
            return Vec::new();
        }
        let queued = match self.contexts.get_mut(&surface.id()) {
            Some(context) => context.gate.drain(),
            None => Vec::new(),
        };
        let mut statuses = Vec::new();
        for (_, draw) in queued {
            let status = match draw {
                PendingDraw::Places(input, options) => self.draw_places(surface, input, options),
                PendingDraw::Routes(input, options) => self.draw_routes(surface, input, options),
                PendingDraw::Scratch(input) => self.draw_scratch(surface, input),
            };
            statuses.push(status);
        }
        statuses
    }

    // --- Teardown ---

    fn teardown(&mut self, surface: &mut dyn Surface, ns: Namespace) -> Result<(), SurfaceError> {
        let Some(set) = self.contexts.get_mut(&surface.id()).and_then(|c| c.sets.get_mut(&ns)) else {
            return Ok(());
        };
        set.teardown(surface)?;
        info!(namespace = %ns, "overlay removed");
        Ok(())
    }

    fn remove(&mut self, surface: &mut dyn Surface, ns: Namespace, operation: &'static str) {
        if let Some(context) = self.contexts.get_mut(&surface.id()) {
            context.gate.cancel(ns);
        }
        if let Err(e) = self.teardown(surface, ns) {
            warn!(namespace = %ns, operation, error = %e, "overlay teardown failed");
        }
    }

    pub fn remove_places(&mut self, surface: &mut dyn Surface) {
        self.remove(surface, Namespace::Places, "remove_places");
    }

    pub fn remove_place_single(&mut self, surface: &mut dyn Surface) {
        self.remove(surface, Namespace::PlaceSingle, "remove_place_single");
    }

    pub fn remove_routes(&mut self, surface: &mut dyn Surface) {
        self.remove(surface, Namespace::Routes, "remove_routes");
    }

    pub fn remove_scratch(&mut self, surface: &mut dyn Surface) {
        self.remove(surface, Namespace::Scratch, "remove_scratch");
    }

    /// Tear down every namespace on `surface` and forget the surface.
    pub fn remove_all(&mut self, surface: &mut dyn Surface) {
        for ns in Namespace::ALL {
            self.remove(surface, ns, "remove_all");
        }
        self.contexts.remove(&surface.id());
    }

    // --- Pointer ---

    /// Route a pointer event to the namespace that subscribed its handler.
    ///
    /// Events for handlers the engine does not own on this surface return
    /// nothing and leave the cursor alone.
    pub fn handle_pointer(&mut self, surface: &mut dyn Surface, event: &PointerEvent) -> Vec<OverlayEvent> {
        let Some(context) = self.contexts.get_mut(&surface.id()) else {
            return Vec::new();
        };
        let mut events = Vec::new();
        let mut owned = false;
        for (ns, set) in &mut context.sets {
            let (controller, entities) = set.interaction_parts();
            if !controller.owns(event.handler) {
                continue;
            }
            owned = true;
            match controller.handle(surface, event, entities) {
                Ok(Some(activation)) => events.push(OverlayEvent::from_activation(*ns, activation)),
                Ok(None) => {}
                Err(e) => warn!(namespace = %ns, operation = "handle_pointer", error = %e, "pointer handling failed"),
            }
        }
        if owned {
            let hovering = context.sets.values().any(|s| s.controller().hovered().is_some());
            surface.set_cursor(if hovering { Cursor::Pointer } else { Cursor::Default });
        }
        events
    }

    /// Feed a batch of events, as returned by a surface's pointer simulation.
    pub fn handle_pointer_events(&mut self, surface: &mut dyn Surface, events: &[PointerEvent]) -> Vec<OverlayEvent> {
        let mut out = Vec::new();
        for event in events {
            out.extend(self.handle_pointer(surface, event));
        }
        out
    }
}
