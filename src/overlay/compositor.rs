//! Display compositor seam.
//!
//! The renderer only ever talks to a [`Compositor`]. The real display
//! backend lives outside this crate; [`HeadlessCompositor`] keeps layers in
//! memory for dry runs and leak checks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::trace;

use super::image::BarImage;
use crate::error::RenderError;

/// Opaque handle to a compositor layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerHandle(u64);

impl LayerHandle {
    /// Raw handle value.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// A layered display compositor.
///
/// Layers are created hidden. Visibility changes passed to one
/// [`update_visibility`](Self::update_visibility) call must take effect
/// atomically with respect to the compositor's own reads.
pub trait Compositor: Send + Sync {
    /// Creates a hidden layer showing `image` at its position with `opacity`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Compositor`] if the layer cannot be created.
    fn create_layer(&self, image: &BarImage, opacity: u8) -> Result<LayerHandle, RenderError>;

    /// Applies a batch of visibility changes as one update.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Compositor`] if any handle is unknown; in that
    /// case no change is applied.
    fn update_visibility(&self, changes: &[(LayerHandle, bool)]) -> Result<(), RenderError>;

    /// Releases a layer.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Compositor`] if the handle is unknown.
    fn destroy_layer(&self, handle: LayerHandle) -> Result<(), RenderError>;

    /// Shows or hides a single layer.
    ///
    /// # Errors
    ///
    /// See [`update_visibility`](Self::update_visibility).
    fn set_visible(&self, handle: LayerHandle, visible: bool) -> Result<(), RenderError> {
        self.update_visibility(&[(handle, visible)])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LayerRecord {
    opacity: u8,
    visible: bool,
}

#[derive(Debug, Default)]
struct Scene {
    layers: HashMap<u64, LayerRecord>,
    created: u64,
    destroyed: u64,
    updates: u64,
}

/// In-memory compositor.
#[derive(Debug, Default)]
pub struct HeadlessCompositor {
    scene: Mutex<Scene>,
    next_id: AtomicU64,
}

impl HeadlessCompositor {
    /// Creates an empty compositor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn scene(&self) -> MutexGuard<'_, Scene> {
        self.scene.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Layers created and not yet destroyed.
    #[must_use]
    pub fn live_layers(&self) -> usize {
        self.scene().layers.len()
    }

    /// Layers currently visible.
    #[must_use]
    pub fn visible_layers(&self) -> usize {
        self.scene().layers.values().filter(|l| l.visible).count()
    }

    /// Total layers ever created.
    #[must_use]
    pub fn created_total(&self) -> u64 {
        self.scene().created
    }

    /// Total layers destroyed.
    #[must_use]
    pub fn destroyed_total(&self) -> u64 {
        self.scene().destroyed
    }

    /// Number of visibility batches applied.
    #[must_use]
    pub fn visibility_updates(&self) -> u64 {
        self.scene().updates
    }

    /// Opacity a live layer was created with.
    #[must_use]
    pub fn opacity(&self, handle: LayerHandle) -> Option<u8> {
        self.scene().layers.get(&handle.0).map(|l| l.opacity)
    }
}

impl Compositor for HeadlessCompositor {
    fn create_layer(&self, image: &BarImage, opacity: u8) -> Result<LayerHandle, RenderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut scene = self.scene();
        scene.layers.insert(
            id,
            LayerRecord {
                opacity,
                visible: false,
            },
        );
        scene.created += 1;
        drop(scene);
        trace!(
            layer = id,
            x = image.x,
            y = image.y,
            width = image.width,
            height = image.height,
            "layer created"
        );
        Ok(LayerHandle(id))
    }

    fn update_visibility(&self, changes: &[(LayerHandle, bool)]) -> Result<(), RenderError> {
        let mut scene = self.scene();
        if let Some((missing, _)) = changes
            .iter()
            .find(|(handle, _)| !scene.layers.contains_key(&handle.0))
        {
            return Err(RenderError::Compositor(format!(
                "unknown layer {}",
                missing.0
            )));
        }
        for (handle, visible) in changes {
            if let Some(layer) = scene.layers.get_mut(&handle.0) {
                layer.visible = *visible;
            }
        }
        scene.updates += 1;
        Ok(())
    }

    fn destroy_layer(&self, handle: LayerHandle) -> Result<(), RenderError> {
        let mut scene = self.scene();
        if scene.layers.remove(&handle.0).is_none() {
            return Err(RenderError::Compositor(format!(
                "unknown layer {}",
                handle.0
            )));
        }
        scene.destroyed += 1;
        drop(scene);
        trace!(layer = handle.0, "layer destroyed");
        Ok(())
    }
}

/// Two alternating layers for tear-free updates.
///
/// The next frame is composed into a fresh hidden layer, a single
/// visibility update shows it and hides the old one, then the old layer is
/// released.
#[derive(Debug, Default)]
pub struct LayerPair {
    slots: [Option<LayerHandle>; 2],
    front: usize,
}

impl LayerPair {
    /// Creates an empty pair.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently visible layer.
    #[must_use]
    pub const fn front(&self) -> Option<LayerHandle> {
        self.slots[self.front]
    }

    /// Number of layers held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Whether no layer is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shows `image` in place of the current front layer.
    ///
    /// # Errors
    ///
    /// Propagates compositor failures. Any layer already created stays
    /// tracked so [`teardown`](Self::teardown) can release it.
    pub fn present<C>(&mut self, compositor: &C, image: &BarImage, opacity: u8) -> Result<(), RenderError>
    where
        C: Compositor + ?Sized,
    {
        let back = 1 - self.front;
        if let Some(stale) = self.slots[back].take() {
            compositor.destroy_layer(stale)?;
        }
        let fresh = compositor.create_layer(image, opacity)?;
        self.slots[back] = Some(fresh);

        match self.slots[self.front] {
            Some(old) => {
                compositor.update_visibility(&[(fresh, true), (old, false)])?;
                self.slots[self.front] = None;
                compositor.destroy_layer(old)?;
            }
            None => compositor.set_visible(fresh, true)?,
        }
        self.front = back;
        Ok(())
    }

    /// Releases every held layer. Stops at the first failure.
    ///
    /// # Errors
    ///
    /// Propagates compositor failures.
    pub fn teardown<C>(&mut self, compositor: &C) -> Result<(), RenderError>
    where
        C: Compositor + ?Sized,
    {
        for slot in &mut self.slots {
            if let Some(handle) = slot.take() {
                compositor.destroy_layer(handle)?;
            }
        }
        self.front = 0;
        Ok(())
    }
}
