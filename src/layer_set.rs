//! Namespaced source/layer lifecycle.
//!
//! DESIGN
//! ======
//! A namespace (`places`, `place-single`, `routes`, `scratch`) prefixes every
//! source, layer, and marker one logical overlay creates, so overlays coexist
//! on one surface and tear down independently. [`OverlayLayerSet`] is the
//! per-namespace context: it owns the namespace's interaction controller,
//! the markers it placed, and the properties of the entities it drew.
//!
//! `sync` brings the surface in line with an [`OverlayPlan`] with minimal
//! churn: existing sources get their data replaced, existing layers get
//! updated in place and re-ordered, and only genuinely new resources are
//! created. Overlay layers always sit directly below the first base-map
//! symbol layer so map labels stay readable above them.
//!
//! ERROR HANDLING
//! ==============
//! Every create and remove is existence-checked first. Surface failures
//! propagate with `?` out of `sync`; `teardown` attempts every step, then
//! reports the first failure.

#[cfg(test)]
#[path = "layer_set_test.rs"]
mod layer_set_test;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::SurfaceError;
use crate::geometry::Bounds;
use crate::icon::IconSpec;
use crate::interaction::InteractionController;
use crate::style::{LayerKind, LayerSpec, SourceData};
use crate::surface::{MarkerSpec, StyleLayer, Surface};

// =============================================================
// Naming
// =============================================================

/// One logical overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Namespace {
    Places,
    PlaceSingle,
    Routes,
    Scratch,
}

impl Namespace {
    pub const ALL: [Self; 4] = [Self::Places, Self::PlaceSingle, Self::Routes, Self::Scratch];

    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Places => "places",
            Self::PlaceSingle => "place-single",
            Self::Routes => "routes",
            Self::Scratch => "scratch",
        }
    }

    /// The namespace that must be torn down before drawing into this one.
    #[must_use]
    pub fn exclusive_with(self) -> Option<Self> {
        match self {
            Self::Places => Some(Self::PlaceSingle),
            Self::PlaceSingle => Some(Self::Places),
            Self::Routes | Self::Scratch => None,
        }
    }

    #[must_use]
    pub fn source_id(self, role: SourceRole) -> String {
        format!("{}-{}", self.prefix(), role.suffix())
    }

    #[must_use]
    pub fn layer_id(self, role: LayerRole) -> String {
        format!("{}-{}", self.prefix(), role.suffix())
    }

    /// Every source id this namespace may create.
    #[must_use]
    pub fn source_ids(self) -> Vec<String> {
        SourceRole::ALL.iter().map(|r| self.source_id(*r)).collect()
    }

    /// Layers the interaction controller listens on.
    #[must_use]
    pub fn interactive_layers(self) -> Vec<String> {
        let roles: &[LayerRole] = match self {
            Self::Places | Self::PlaceSingle => &[LayerRole::Fill, LayerRole::PointBase],
            Self::Routes => &[LayerRole::RouteLine],
            Self::Scratch => &[],
        };
        roles.iter().map(|r| self.layer_id(*r)).collect()
    }

    /// Whether a layer id was created by this namespace.
    #[must_use]
    pub fn owns_layer(self, id: &str) -> bool {
        LayerRole::TEARDOWN_ORDER.iter().any(|r| self.layer_id(*r) == id)
    }

    /// Whether a layer id belongs to any overlay namespace.
    #[must_use]
    pub fn is_overlay_layer(id: &str) -> bool {
        Self::ALL.iter().any(|ns| ns.owns_layer(id))
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Sources a namespace may own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceRole {
    /// Polygons, lines, or the scratch geometry.
    Base,
    /// Derived point markers.
    Points,
}

impl SourceRole {
    pub const ALL: [Self; 2] = [Self::Base, Self::Points];

    fn suffix(self) -> &'static str {
        match self {
            Self::Base => "source",
            Self::Points => "points",
        }
    }
}

/// Layers a namespace may own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerRole {
    Fill,
    Outline,
    Label,
    PointBase,
    PointHover,
    PointText,
    RouteCasing,
    RouteLine,
    Line,
    Circle,
}

impl LayerRole {
    /// Removal order: dependents before the layers they draw over.
    pub const TEARDOWN_ORDER: [Self; 10] = [
        Self::PointText,
        Self::PointHover,
        Self::PointBase,
        Self::Label,
        Self::Fill,
        Self::Outline,
        Self::RouteLine,
        Self::RouteCasing,
        Self::Line,
        Self::Circle,
    ];

    fn suffix(self) -> &'static str {
        match self {
            Self::Fill => "fill",
            Self::Outline => "outline",
            Self::Label => "label",
            Self::PointBase => "point-base",
            Self::PointHover => "point-hover",
            Self::PointText => "point-text",
            Self::RouteCasing => "route-casing",
            Self::RouteLine => "route-line",
            Self::Line => "line",
            Self::Circle => "circle",
        }
    }
}

/// First base-map symbol layer: overlay layers are inserted below it.
#[must_use]
pub fn insertion_anchor(layers: &[StyleLayer]) -> Option<String> {
    layers
        .iter()
        .find(|l| l.kind == LayerKind::Symbol && !Namespace::is_overlay_layer(&l.id))
        .map(|l| l.id.clone())
}

// =============================================================
// Plan
// =============================================================

/// Everything one draw puts on the surface, computed before any mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayPlan {
    pub sources: Vec<(SourceRole, SourceData)>,
    /// Bottom to top.
    pub layers: Vec<LayerSpec>,
    pub markers: Vec<MarkerSpec>,
    /// Icons that must be registered before the layers reference them.
    pub icons: Vec<IconSpec>,
    /// Merged properties per entity id, reported on activation.
    pub entities: BTreeMap<String, Map<String, Value>>,
    /// Extent of everything rendered.
    pub bounds: Bounds,
}

impl OverlayPlan {
    /// Total features across all sources.
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.sources.iter().map(|(_, data)| data.len()).sum()
    }

    pub(crate) fn push_icon(&mut self, spec: IconSpec) {
        if !self.icons.contains(&spec) {
            self.icons.push(spec);
        }
    }
}

// =============================================================
// Layer set
// =============================================================

/// Per-namespace context.
#[derive(Debug)]
pub struct OverlayLayerSet {
    namespace: Namespace,
    controller: InteractionController,
    markers: BTreeSet<String>,
    entities: BTreeMap<String, Map<String, Value>>,
}

impl OverlayLayerSet {
    #[must_use]
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            controller: InteractionController::new(namespace),
            markers: BTreeSet::new(),
            entities: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    #[must_use]
    pub fn controller(&self) -> &InteractionController {
        &self.controller
    }

    #[cfg(test)]
    pub(crate) fn controller_mut(&mut self) -> &mut InteractionController {
        &mut self.controller
    }

    /// Controller and entity table together, for event handling.
    pub(crate) fn interaction_parts(&mut self) -> (&mut InteractionController, &BTreeMap<String, Map<String, Value>>) {
        (&mut self.controller, &self.entities)
    }

    #[must_use]
    pub fn marker_ids(&self) -> Vec<String> {
        self.markers.iter().cloned().collect()
    }

    /// Bring the surface in line with `plan`.
    ///
    /// Feature-state is cleared first so a redraw never leaves a stale hover
    /// or selection behind. Handlers are bound on the first sync only.
    ///
    /// # Errors
    ///
    /// Propagates the first surface failure. Resources created before the
    /// failure stay in place and are reconciled by the next sync or teardown.
    pub fn sync(&mut self, surface: &mut dyn Surface, plan: OverlayPlan) -> Result<(), SurfaceError> {
        let ns = self.namespace;
        self.controller.clear_state(surface)?;

        let wanted_sources: Vec<String> = plan.sources.iter().map(|(role, _)| ns.source_id(*role)).collect();
        for (role, data) in plan.sources {
            let id = ns.source_id(role);
            if surface.has_source(&id) {
                surface.set_source_data(&id, data)?;
            } else {
                surface.add_source(&id, data)?;
            }
        }

        let wanted_layers: Vec<&str> = plan.layers.iter().map(|l| l.id.as_str()).collect();
        for role in LayerRole::TEARDOWN_ORDER {
            let id = ns.layer_id(role);
            if surface.has_layer(&id) && !wanted_layers.contains(&id.as_str()) {
                debug!(namespace = %ns, layer = %id, "removing stale layer");
                surface.remove_layer(&id)?;
            }
        }
        for id in ns.source_ids() {
            if surface.has_source(&id) && !wanted_sources.contains(&id) {
                surface.remove_source(&id)?;
            }
        }

        let anchor = insertion_anchor(&surface.style_layers());
        for layer in plan.layers {
            if surface.has_layer(&layer.id) {
                let id = layer.id.clone();
                surface.update_layer(layer)?;
                surface.move_layer(&id, anchor.as_deref())?;
            } else {
                surface.add_layer(layer, anchor.as_deref())?;
            }
        }

        self.remove_markers(surface)?;
        for marker in plan.markers {
            let id = marker.id.clone();
            if surface.has_marker(&id) {
                surface.remove_marker(&id)?;
            }
            surface.add_marker(marker)?;
            self.markers.insert(id);
        }

        self.entities = plan.entities;
        if !self.controller.is_bound() {
            self.controller.bind(surface);
        }
        Ok(())
    }

    fn remove_markers(&mut self, surface: &mut dyn Surface) -> Result<(), SurfaceError> {
        while let Some(id) = self.markers.pop_first() {
            if surface.has_marker(&id) {
                surface.remove_marker(&id)?;
            }
        }
        Ok(())
    }

    /// Remove everything this namespace created. Safe when nothing was drawn.
    ///
    /// Feature-state is cleared and handlers are unbound before any layer or
    /// source goes away.
    ///
    /// # Errors
    ///
    /// Returns the first surface failure after attempting every step.
    pub fn teardown(&mut self, surface: &mut dyn Surface) -> Result<(), SurfaceError> {
        let ns = self.namespace;
        let mut first_error: Option<SurfaceError> = None;
        let mut record = |result: Result<(), SurfaceError>, what: &str| {
            if let Err(e) = result {
                debug!(namespace = %ns, step = what, error = %e, "teardown step failed");
                first_error.get_or_insert(e);
            }
        };

        record(self.controller.clear_state(surface), "feature-state");
        self.controller.dispose(surface);

        for role in LayerRole::TEARDOWN_ORDER {
            let id = ns.layer_id(role);
            if surface.has_layer(&id) {
                record(surface.remove_layer(&id), "layer");
            }
        }
        for id in ns.source_ids() {
            if surface.has_source(&id) {
                record(surface.remove_source(&id), "source");
            }
        }
        record(self.remove_markers(surface), "markers");
        self.entities.clear();

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
