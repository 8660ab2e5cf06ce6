//! Resolved pipelines and their execution

use crate::error::PipelineError;
use pixroute_flavor::{
    Artifact, Converter, Flavor, ImageDescriptor, LoadHints, Loader, LoaderFactory, Penalty,
    SessionContext,
};
use smallvec::SmallVec;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Input to a pipeline: an in-memory artifact or a described source
#[derive(Debug, Clone, Copy)]
pub enum PipelineSource<'a> {
    /// Start from an existing artifact
    Artifact(&'a Artifact),
    /// Start by loading a described source
    Descriptor(&'a ImageDescriptor),
}

/// Leading decode step
#[derive(Clone)]
pub struct LoaderStep {
    factory: Arc<dyn LoaderFactory>,
    loader: Arc<dyn Loader>,
    flavor: Flavor,
    penalty: Penalty,
}

impl LoaderStep {
    pub(crate) fn new(
        factory: Arc<dyn LoaderFactory>,
        loader: Arc<dyn Loader>,
        flavor: Flavor,
        penalty: Penalty,
    ) -> Self {
        Self {
            factory,
            loader,
            flavor,
            penalty,
        }
    }

    #[inline]
    #[must_use]
    pub fn implementation_id(&self) -> &str {
        self.factory.implementation_id()
    }

    /// Flavor the loader produces
    #[inline]
    #[must_use]
    pub fn flavor(&self) -> &Flavor {
        &self.flavor
    }

    /// Usage penalty plus any additional penalty
    #[inline]
    #[must_use]
    pub fn penalty(&self) -> Penalty {
        self.penalty
    }

    #[inline]
    #[must_use]
    pub fn loader(&self) -> &Arc<dyn Loader> {
        &self.loader
    }
}

impl Debug for LoaderStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderStep")
            .field("implementation", &self.implementation_id())
            .field("flavor", &self.flavor)
            .field("penalty", &self.penalty)
            .finish()
    }
}

/// One converter application
#[derive(Clone)]
pub struct ConversionStep {
    converter: Arc<dyn Converter>,
    from: Flavor,
    to: Flavor,
    penalty: Penalty,
}

impl ConversionStep {
    pub(crate) fn new(converter: Arc<dyn Converter>, from: Flavor, to: Flavor, penalty: Penalty) -> Self {
        Self {
            converter,
            from,
            to,
            penalty,
        }
    }

    #[inline]
    #[must_use]
    pub fn implementation_id(&self) -> &str {
        self.converter.implementation_id()
    }

    #[inline]
    #[must_use]
    pub fn from(&self) -> &Flavor {
        &self.from
    }

    #[inline]
    #[must_use]
    pub fn to(&self) -> &Flavor {
        &self.to
    }

    /// Conversion penalty plus any additional penalty
    #[inline]
    #[must_use]
    pub fn penalty(&self) -> Penalty {
        self.penalty
    }

    #[inline]
    #[must_use]
    pub fn converter(&self) -> &Arc<dyn Converter> {
        &self.converter
    }
}

impl Debug for ConversionStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionStep")
            .field("implementation", &self.implementation_id())
            .field("from", &self.from)
            .field("to", &self.to)
            .field("penalty", &self.penalty)
            .finish()
    }
}

/// Ordered plan turning a source into a target flavor
///
/// An optional loader step followed by zero or more converter steps. The
/// total penalty is the saturating sum of every step's effective penalty
/// and is available without executing anything.
#[derive(Clone)]
pub struct Pipeline {
    loader: Option<LoaderStep>,
    steps: SmallVec<[ConversionStep; 4]>,
    origin: Flavor,
    penalty: Penalty,
}

impl Pipeline {
    /// Pipeline that hands an artifact of `flavor` back unchanged
    #[must_use]
    pub fn identity(flavor: Flavor) -> Self {
        Self {
            loader: None,
            steps: SmallVec::new(),
            origin: flavor,
            penalty: Penalty::ZERO,
        }
    }

    pub(crate) fn assemble(
        loader: Option<LoaderStep>,
        origin: Flavor,
        steps: impl IntoIterator<Item = ConversionStep>,
    ) -> Self {
        let steps: SmallVec<[ConversionStep; 4]> = steps.into_iter().collect();
        let penalty = loader.iter().map(LoaderStep::penalty).sum::<Penalty>()
            + steps.iter().map(ConversionStep::penalty).sum::<Penalty>();
        Self {
            loader,
            steps,
            origin,
            penalty,
        }
    }

    /// Total penalty
    #[inline]
    #[must_use]
    pub fn penalty(&self) -> Penalty {
        self.penalty
    }

    #[inline]
    #[must_use]
    pub fn loader(&self) -> Option<&LoaderStep> {
        self.loader.as_ref()
    }

    /// Converter steps in execution order
    #[inline]
    #[must_use]
    pub fn steps(&self) -> &[ConversionStep] {
        &self.steps
    }

    /// Number of converter steps
    #[inline]
    #[must_use]
    pub fn hops(&self) -> usize {
        self.steps.len()
    }

    /// True when the pipeline neither loads nor converts
    #[inline]
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.loader.is_none() && self.steps.is_empty()
    }

    /// Flavor entering the first converter
    #[inline]
    #[must_use]
    pub fn source_flavor(&self) -> &Flavor {
        &self.origin
    }

    /// Flavor produced by the last step
    #[must_use]
    pub fn target_flavor(&self) -> &Flavor {
        self.steps.last().map_or(&self.origin, ConversionStep::to)
    }

    /// Human-readable route, e.g. `png:load -> rgba2gray`
    #[must_use]
    pub fn describe(&self) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(self.steps.len() + 1);
        if let Some(loader) = &self.loader {
            parts.push(format!("{}:load", loader.implementation_id()));
        }
        parts.extend(self.steps.iter().map(|s| s.implementation_id().to_string()));
        if parts.is_empty() {
            return format!("identity({})", self.origin);
        }
        parts.join(" -> ")
    }

    /// Run the pipeline
    ///
    /// Steps run in order on the calling thread. The first failure aborts the
    /// run and every intermediate artifact is dropped.
    ///
    /// # Errors
    /// - `PipelineError::Load` / `PipelineError::Convert` when a step fails
    /// - `PipelineError::FlavorMismatch` when a step produces an undeclared flavor
    /// - `PipelineError::MissingDescriptor` / `PipelineError::MissingArtifact`
    ///   when `source` does not fit the pipeline's first step
    pub fn execute(
        &self,
        source: PipelineSource<'_>,
        hints: &LoadHints,
        session: &SessionContext,
    ) -> Result<Artifact, PipelineError> {
        let mut current = match (&self.loader, source) {
            (Some(step), PipelineSource::Descriptor(descriptor)) => {
                let artifact = step.loader.load(descriptor, hints, session)?;
                check_flavor(step.implementation_id(), &step.flavor, &artifact)?;
                artifact
            }
            (None, PipelineSource::Artifact(artifact)) => artifact.clone(),
            (Some(_), PipelineSource::Artifact(_)) => return Err(PipelineError::MissingDescriptor),
            (None, PipelineSource::Descriptor(_)) => return Err(PipelineError::MissingArtifact),
        };

        for step in &self.steps {
            let next = step
                .converter
                .convert(&current, hints)
                .map_err(|err| PipelineError::convert(step.implementation_id(), err))?;
            check_flavor(step.implementation_id(), &step.to, &next)?;
            current = next;
        }

        tracing::trace!(route = %self.describe(), penalty = %self.penalty, "pipeline executed");
        Ok(current)
    }
}

fn check_flavor(implementation: &str, expected: &Flavor, artifact: &Artifact) -> Result<(), PipelineError> {
    if artifact.flavor().is_compatible(expected) {
        Ok(())
    } else {
        Err(PipelineError::FlavorMismatch {
            implementation: implementation.to_string(),
            expected: expected.clone(),
            actual: artifact.flavor().clone(),
        })
    }
}

impl Debug for Pipeline {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("route", &self.describe())
            .field("penalty", &self.penalty)
            .finish()
    }
}
