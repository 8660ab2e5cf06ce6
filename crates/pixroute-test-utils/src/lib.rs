//! Testing utilities for pixroute workspace
//!
//! Fake loaders, converters and preloaders that record what they did.
//! Every fake artifact carries a [`Trail`] payload listing the
//! implementations that produced it, so tests can assert on the route taken.

#![allow(missing_docs)]

use parking_lot::Mutex;
use pixroute_flavor::{
    Artifact, ConvertError, Converter, Flavor, ImageDescriptor, LoadError, LoadHints, Loader,
    LoaderFactory, Penalty, Preloader, SessionContext,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Payload of every fake artifact: implementation ids applied so far
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trail(pub Vec<String>);

impl Trail {
    pub fn steps(&self) -> Vec<&str> {
        self.0.iter().map(String::as_str).collect()
    }
}

/// Read the trail out of a fake artifact
pub fn trail_of(artifact: &Artifact) -> Vec<String> {
    artifact
        .downcast_ref::<Trail>()
        .map(|t| t.0.clone())
        .unwrap_or_default()
}

/// Define a flavor
pub fn flavor(name: &str) -> Flavor {
    Flavor::define(name)
}

/// Define `names[0]` refining `names[1]` refining ... `names[n-1]`
pub fn flavor_chain(names: &[&str]) -> Vec<Flavor> {
    let mut defined: Vec<Flavor> = Vec::with_capacity(names.len());
    for name in names.iter().rev() {
        let flavor = match defined.last() {
            Some(parent) => Flavor::builder(name).refines(parent).define().unwrap(),
            None => Flavor::define(name),
        };
        defined.push(flavor);
    }
    defined.reverse();
    defined
}

/// Converter that appends its id to the input trail
#[derive(Clone)]
pub struct FakeConverter {
    id: String,
    sources: Vec<Flavor>,
    target: Flavor,
    penalty: Penalty,
    fail: bool,
    calls: Arc<AtomicUsize>,
}

impl FakeConverter {
    pub fn new(id: &str, source: &Flavor, target: &Flavor, penalty: i32) -> Self {
        Self {
            id: id.to_string(),
            sources: vec![source.clone()],
            target: target.clone(),
            penalty: Penalty::new(penalty),
            fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn from_many(id: &str, sources: &[&Flavor], target: &Flavor, penalty: i32) -> Self {
        let mut converter = Self::new(id, sources[0], target, penalty);
        converter.sources = sources.iter().map(|f| (*f).clone()).collect();
        converter
    }

    pub fn with_penalty(mut self, penalty: Penalty) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn into_arc(self) -> Arc<dyn Converter> {
        Arc::new(self)
    }
}

impl Converter for FakeConverter {
    fn implementation_id(&self) -> &str {
        &self.id
    }

    fn source_flavors(&self) -> Vec<Flavor> {
        self.sources.clone()
    }

    fn target_flavor(&self) -> Flavor {
        self.target.clone()
    }

    fn conversion_penalty(&self) -> Penalty {
        self.penalty
    }

    fn convert(&self, artifact: &Artifact, _hints: &LoadHints) -> Result<Artifact, ConvertError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ConvertError::decode(&self.id, "malformed input"));
        }
        let mut trail = trail_of(artifact);
        trail.push(self.id.clone());
        Ok(Artifact::new(self.target.clone(), Trail(trail)))
    }
}

/// How a fake loader behaves when asked to load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadBehavior {
    Succeed,
    NotFound,
    Malformed,
}

/// Loader factory serving one MIME type
#[derive(Clone)]
pub struct FakeLoaderFactory {
    id: String,
    mime: String,
    flavors: Vec<(Flavor, Penalty)>,
    available: bool,
    rejected_sources: Vec<String>,
    behavior: LoadBehavior,
    loads: Arc<AtomicUsize>,
}

impl FakeLoaderFactory {
    pub fn new(id: &str, mime: &str) -> Self {
        Self {
            id: id.to_string(),
            mime: mime.to_string(),
            flavors: Vec::new(),
            available: true,
            rejected_sources: Vec::new(),
            behavior: LoadBehavior::Succeed,
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn producing(mut self, flavor: &Flavor, penalty: i32) -> Self {
        self.flavors.push((flavor.clone(), Penalty::new(penalty)));
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn rejecting(mut self, source_id: &str) -> Self {
        self.rejected_sources.push(source_id.to_string());
        self
    }

    pub fn behaving(mut self, behavior: LoadBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn into_arc(self) -> Arc<dyn LoaderFactory> {
        Arc::new(self)
    }
}

impl LoaderFactory for FakeLoaderFactory {
    fn implementation_id(&self) -> &str {
        &self.id
    }

    fn supported_mime_types(&self) -> Vec<String> {
        vec![self.mime.clone()]
    }

    fn supported_flavors(&self, mime_type: &str) -> Vec<Flavor> {
        if mime_type.eq_ignore_ascii_case(&self.mime) {
            self.flavors.iter().map(|(f, _)| f.clone()).collect()
        } else {
            Vec::new()
        }
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn is_supported(&self, descriptor: &ImageDescriptor) -> bool {
        !self
            .rejected_sources
            .iter()
            .any(|s| s == descriptor.source_id())
    }

    fn new_loader(&self, flavor: &Flavor) -> Option<Box<dyn Loader>> {
        let (flavor, penalty) = self.flavors.iter().find(|(f, _)| f == flavor)?.clone();
        Some(Box::new(FakeLoader {
            id: self.id.clone(),
            flavor,
            penalty,
            behavior: self.behavior,
            loads: Arc::clone(&self.loads),
        }))
    }
}

struct FakeLoader {
    id: String,
    flavor: Flavor,
    penalty: Penalty,
    behavior: LoadBehavior,
    loads: Arc<AtomicUsize>,
}

impl Loader for FakeLoader {
    fn target_flavor(&self) -> Flavor {
        self.flavor.clone()
    }

    fn usage_penalty(&self) -> Penalty {
        self.penalty
    }

    fn load(
        &self,
        descriptor: &ImageDescriptor,
        _hints: &LoadHints,
        _session: &SessionContext,
    ) -> Result<Artifact, LoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            LoadBehavior::Succeed => Ok(Artifact::new(
                self.flavor.clone(),
                Trail(vec![format!("{}:load", self.id)]),
            )),
            LoadBehavior::NotFound => Err(LoadError::not_found(descriptor.source_id())),
            LoadBehavior::Malformed => Err(LoadError::decode(&self.id, "truncated stream")),
        }
    }
}

/// Preloader backed by a fixed table of known sources
#[derive(Clone)]
pub struct FakePreloader {
    id: String,
    priority: i32,
    known: Arc<Mutex<HashMap<String, String>>>,
    calls: Arc<AtomicUsize>,
}

impl FakePreloader {
    pub fn new(id: &str, priority: i32) -> Self {
        Self {
            id: id.to_string(),
            priority,
            known: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn knowing(self, source_id: &str, mime: &str) -> Self {
        self.add_source(source_id, mime);
        self
    }

    /// Make a source appear later (e.g. a network file becoming available)
    pub fn add_source(&self, source_id: &str, mime: &str) {
        self.known
            .lock()
            .insert(source_id.to_string(), mime.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn into_arc(self) -> Arc<dyn Preloader> {
        Arc::new(self)
    }
}

impl Preloader for FakePreloader {
    fn implementation_id(&self) -> &str {
        &self.id
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn preload(
        &self,
        source_id: &str,
        session: &SessionContext,
    ) -> Result<Option<ImageDescriptor>, LoadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let resolved = session.resolve(source_id);
        match self.known.lock().get(&resolved) {
            Some(mime) => Ok(Some(ImageDescriptor::new(resolved.clone(), mime))),
            None => Err(LoadError::not_found(resolved)),
        }
    }
}

/// Preloader that never applies
pub struct DecliningPreloader {
    pub id: String,
    pub priority: i32,
}

impl Preloader for DecliningPreloader {
    fn implementation_id(&self) -> &str {
        &self.id
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn preload(
        &self,
        _source_id: &str,
        _session: &SessionContext,
    ) -> Result<Option<ImageDescriptor>, LoadError> {
        Ok(None)
    }
}
