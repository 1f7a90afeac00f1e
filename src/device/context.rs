//! Collaborator registries and shared resources
//!
//! Everything the device looks up by name lives here: renderers, encoder
//! and decoder factories, view sources and the still writer. The context
//! also owns the locks shared with the capture side.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use super::traits::{
    Decoder, DecoderFactory, Encoder, EncoderFactory, Renderer, StillWriter, TextureSize,
    TextureSizeHandle, ViewSource,
};

/// Registries and shared locks for one device
#[derive(Default)]
pub struct DeviceContext {
    renderers: Vec<Arc<dyn Renderer>>,
    encoders: HashMap<String, EncoderFactory>,
    decoders: HashMap<String, DecoderFactory>,
    view_sources: HashMap<String, Arc<dyn ViewSource>>,
    still_writer: Option<Arc<dyn StillWriter>>,
    render_lock: Arc<Mutex<()>>,
    texture_size: TextureSizeHandle,
}

impl DeviceContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a renderer; the first one registered is the default
    pub fn register_renderer<R: Renderer + 'static>(&mut self, renderer: R) {
        tracing::debug!(name = renderer.name(), "Renderer registered");
        self.renderers.push(Arc::new(renderer));
    }

    /// Register an encoder factory for `kind` (`h264`, `h265`, `mjpeg`...)
    pub fn register_encoder<F>(&mut self, kind: &str, factory: F)
    where
        F: Fn() -> Box<dyn Encoder> + Send + Sync + 'static,
    {
        tracing::debug!(kind = kind, "Encoder registered");
        self.encoders
            .insert(kind.to_ascii_lowercase(), Box::new(factory));
    }

    /// Register a decoder factory for `kind`
    pub fn register_decoder<F>(&mut self, kind: &str, factory: F)
    where
        F: Fn() -> Box<dyn Decoder> + Send + Sync + 'static,
    {
        tracing::debug!(kind = kind, "Decoder registered");
        self.decoders
            .insert(kind.to_ascii_lowercase(), Box::new(factory));
    }

    /// Register a view source under its own name
    pub fn register_view_source<V: ViewSource + 'static>(&mut self, source: V) {
        tracing::debug!(name = source.name(), "View source registered");
        self.view_sources
            .insert(source.name().to_string(), Arc::new(source));
    }

    pub fn set_still_writer<W: StillWriter + 'static>(&mut self, writer: W) {
        self.still_writer = Some(Arc::new(writer));
    }

    pub fn renderer(&self, name: &str) -> Option<Arc<dyn Renderer>> {
        self.renderers.iter().find(|r| r.name() == name).cloned()
    }

    pub fn default_renderer(&self) -> Option<Arc<dyn Renderer>> {
        self.renderers.first().cloned()
    }

    /// Instantiate an encoder of `kind`
    pub fn create_encoder(&self, kind: &str) -> Option<Box<dyn Encoder>> {
        self.encoders.get(&kind.to_ascii_lowercase()).map(|f| f())
    }

    pub fn has_encoder(&self, kind: &str) -> bool {
        self.encoders.contains_key(&kind.to_ascii_lowercase())
    }

    /// Instantiate a decoder of `kind`
    pub fn create_decoder(&self, kind: &str) -> Option<Box<dyn Decoder>> {
        self.decoders.get(&kind.to_ascii_lowercase()).map(|f| f())
    }

    pub fn view_source(&self, name: &str) -> Option<Arc<dyn ViewSource>> {
        self.view_sources.get(name).cloned()
    }

    pub fn still_writer(&self) -> Option<Arc<dyn StillWriter>> {
        self.still_writer.clone()
    }

    /// Hold the render lock for a render and readback
    pub fn lock_render(&self) -> MutexGuard<'_, ()> {
        self.render_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Render lock shared with the capture side
    pub fn render_lock(&self) -> Arc<Mutex<()>> {
        Arc::clone(&self.render_lock)
    }

    /// Handle for negotiating the camera texture size
    pub fn texture_size_handle(&self) -> TextureSizeHandle {
        Arc::clone(&self.texture_size)
    }

    pub fn texture_size(&self) -> TextureSize {
        *self.texture_size.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_texture_size(&self, size: TextureSize) {
        *self.texture_size.write().unwrap_or_else(|e| e.into_inner()) = size;
    }
}

impl std::fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceContext")
            .field(
                "renderers",
                &self.renderers.iter().map(|r| r.name().to_string()).collect::<Vec<_>>(),
            )
            .field("encoders", &self.encoders.keys().collect::<Vec<_>>())
            .field("decoders", &self.decoders.keys().collect::<Vec<_>>())
            .field("view_sources", &self.view_sources.keys().collect::<Vec<_>>())
            .finish()
    }
}
