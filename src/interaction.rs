//! Hover/selection state machine for one namespace.
//!
//! DESIGN
//! ======
//! Hover and selection are independent flags, each held by at most one entity
//! per namespace. The flags live in the surface's feature-state store so
//! layers react declaratively; the controller only remembers which id holds
//! each flag so it can clear it again.
//!
//! Handlers are bound once per namespace and returned as a [`Subscription`]
//! value that `dispose` hands back to the surface. The surface fires a layer
//! event for every layer under the pointer, so every layer handler resolves
//! the topmost namespace feature and only the handler for that feature's
//! layer acts. A global move handler guards against stale hover when the
//! pointer leaves one sub-layer for empty map without a layer leave firing.
//!
//! Ordering inside a namespace is strict: the old hover is cleared before the
//! new one is set, and the old selection before the new selection.

#[cfg(test)]
#[path = "interaction_test.rs"]
mod interaction_test;

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::SurfaceError;
use crate::geometry::{GeometryType, LngLat};
use crate::layer_set::Namespace;
use crate::style::StateKey;
use crate::surface::{HandlerId, PointerEvent, PointerEventKind, RenderedFeature, Surface};

/// What one handler was registered for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Layer { kind: PointerEventKind, layer: String },
    /// Global pointer-move with no layer scope.
    Guard,
}

/// Handlers registered for one namespace.
#[derive(Debug, Default, PartialEq)]
pub struct Subscription {
    handlers: Vec<(HandlerId, Binding)>,
}

impl Subscription {
    /// Subscribe move, leave, and click on each layer, plus one global move guard.
    pub fn bind(surface: &mut dyn Surface, layers: &[String]) -> Self {
        let mut handlers = Vec::with_capacity(layers.len() * 3 + 1);
        for layer in layers {
            for kind in [PointerEventKind::Move, PointerEventKind::Leave, PointerEventKind::Click] {
                let id = surface.subscribe(kind, Some(layer));
                handlers.push((id, Binding::Layer { kind, layer: layer.clone() }));
            }
        }
        if !layers.is_empty() {
            handlers.push((surface.subscribe(PointerEventKind::Move, None), Binding::Guard));
        }
        Self { handlers }
    }

    #[must_use]
    pub fn binding(&self, handler: HandlerId) -> Option<&Binding> {
        self.handlers.iter().find(|(id, _)| *id == handler).map(|(_, b)| b)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn dispose(self, surface: &mut dyn Surface) {
        for (id, _) in self.handlers {
            surface.unsubscribe(id);
        }
    }
}

/// A click that picked an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Activation {
    pub entity_id: String,
    /// The entity's merged properties (without engine-injected keys).
    pub properties: Map<String, Value>,
    pub geometry_type: GeometryType,
    pub pointer: LngLat,
    /// Selection after the click; a second click on the same entity deselects.
    pub selected: bool,
}

/// Per-namespace hover/selection controller.
#[derive(Debug)]
pub struct InteractionController {
    namespace: Namespace,
    subscription: Option<Subscription>,
    hovered: Option<String>,
    selected: Option<String>,
}

impl InteractionController {
    #[must_use]
    pub fn new(namespace: Namespace) -> Self {
        Self { namespace, subscription: None, hovered: None, selected: None }
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.subscription.is_some()
    }

    #[must_use]
    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    #[must_use]
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    #[must_use]
    pub fn owns(&self, handler: HandlerId) -> bool {
        self.subscription.as_ref().is_some_and(|s| s.binding(handler).is_some())
    }

    /// Bind handlers to the namespace's interactive layers. No-op when bound.
    pub fn bind(&mut self, surface: &mut dyn Surface) {
        if self.subscription.is_some() {
            return;
        }
        let layers = self.namespace.interactive_layers();
        if layers.is_empty() {
            return;
        }
        let subscription = Subscription::bind(surface, &layers);
        debug!(namespace = %self.namespace, handlers = subscription.len(), "interaction bound");
        self.subscription = Some(subscription);
    }

    /// Unbind every handler. No-op when not bound.
    pub fn dispose(&mut self, surface: &mut dyn Surface) {
        if let Some(subscription) = self.subscription.take() {
            subscription.dispose(surface);
        }
    }

    fn live_sources(&self, surface: &dyn Surface) -> Vec<String> {
        self.namespace.source_ids().into_iter().filter(|id| surface.has_source(id)).collect()
    }

    fn write_flag(&self, surface: &mut dyn Surface, id: &str, key: StateKey, value: bool) -> Result<(), SurfaceError> {
        for source in self.live_sources(surface) {
            surface.set_feature_state(&source, id, key, value)?;
        }
        Ok(())
    }

    /// Drop every flag this namespace set, on every source it still has.
    ///
    /// # Errors
    ///
    /// Propagates the surface's feature-state failure.
    pub fn clear_state(&mut self, surface: &mut dyn Surface) -> Result<(), SurfaceError> {
        self.hovered = None;
        self.selected = None;
        for source in self.live_sources(surface) {
            surface.clear_feature_state(&source)?;
        }
        Ok(())
    }

    /// Move hover to `id`, clearing the previous holder first.
    ///
    /// # Errors
    ///
    /// Propagates the surface's feature-state failure.
    pub fn set_hover(&mut self, surface: &mut dyn Surface, id: &str) -> Result<(), SurfaceError> {
        if self.hovered.as_deref() == Some(id) {
            return Ok(());
        }
        self.clear_hover(surface)?;
        self.write_flag(surface, id, StateKey::Hover, true)?;
        self.hovered = Some(id.to_string());
        Ok(())
    }

    /// Clear hover if any entity holds it.
    ///
    /// # Errors
    ///
    /// Propagates the surface's feature-state failure.
    pub fn clear_hover(&mut self, surface: &mut dyn Surface) -> Result<(), SurfaceError> {
        if let Some(previous) = self.hovered.take() {
            self.write_flag(surface, &previous, StateKey::Hover, false)?;
        }
        Ok(())
    }

    /// Toggle selection of `id`; selecting clears any other selection first.
    /// Returns the entity's selection after the toggle.
    ///
    /// # Errors
    ///
    /// Propagates the surface's feature-state failure.
    pub fn toggle_selected(&mut self, surface: &mut dyn Surface, id: &str) -> Result<bool, SurfaceError> {
        if self.selected.as_deref() == Some(id) {
            self.write_flag(surface, id, StateKey::Selected, false)?;
            self.selected = None;
            return Ok(false);
        }
        if let Some(previous) = self.selected.take() {
            self.write_flag(surface, &previous, StateKey::Selected, false)?;
        }
        self.write_flag(surface, id, StateKey::Selected, true)?;
        self.selected = Some(id.to_string());
        Ok(true)
    }

    /// Topmost namespace feature under `point`.
    fn topmost(&self, surface: &dyn Surface, point: LngLat) -> Option<RenderedFeature> {
        let layers = self.namespace.interactive_layers();
        surface.query_rendered_features(point, &layers).into_iter().next()
    }

    /// React to one pointer event. Events for handlers this controller does
    /// not own are ignored.
    ///
    /// # Errors
    ///
    /// Propagates the surface's feature-state failure.
    pub fn handle(
        &mut self,
        surface: &mut dyn Surface,
        event: &PointerEvent,
        entities: &BTreeMap<String, Map<String, Value>>,
    ) -> Result<Option<Activation>, SurfaceError> {
        let Some(binding) = self.subscription.as_ref().and_then(|s| s.binding(event.handler)).cloned() else {
            return Ok(None);
        };
        let top = event.point.and_then(|p| self.topmost(surface, p));

        match binding {
            Binding::Guard | Binding::Layer { kind: PointerEventKind::Leave, .. } => {
                if top.is_none() {
                    self.clear_hover(surface)?;
                }
                Ok(None)
            }
            Binding::Layer { kind: PointerEventKind::Move, layer } => {
                if let Some(feature) = top.filter(|f| f.layer == layer) {
                    self.set_hover(surface, &feature.id)?;
                }
                Ok(None)
            }
            Binding::Layer { kind: PointerEventKind::Click, layer } => {
                let (Some(feature), Some(pointer)) = (top.filter(|f| f.layer == layer), event.point) else {
                    return Ok(None);
                };
                let selected = self.toggle_selected(surface, &feature.id)?;
                let properties = entities.get(&feature.id).cloned().unwrap_or(feature.properties);
                Ok(Some(Activation {
                    entity_id: feature.id,
                    properties,
                    geometry_type: feature.geometry_type,
                    pointer,
                    selected,
                }))
            }
        }
    }
}
