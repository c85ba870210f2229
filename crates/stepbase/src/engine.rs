//! High-level entry point tying a kernel to the analysis pipeline.

use stepbase_kernel::GeometryKernel;
use tracing::info;

use crate::baseline::{Baseline, SourceInfo};
use crate::builder::BaselineBuilder;
use crate::compare::{BaselineComparator, DiffReport};
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::input::ModelRequest;
use crate::interface::{AssemblyGraph, Interface, InterfaceDetector};
use crate::validation::{validate, ValidationReport};

/// Baseline engine over a geometry kernel.
///
/// ```no_run
/// use stepbase::{Engine, ModelRequest};
/// use stepbase_step::StepKernel;
///
/// let engine = Engine::new(StepKernel::new());
/// let before = ModelRequest::from_path("rev1.step");
/// let after = ModelRequest::from_path("rev2.step");
/// let report = engine.compare_requests(before, after)?;
/// println!("{:?}: {}", report.impact_level, report.impact_message);
/// # Ok::<(), stepbase::EngineError>(())
/// ```
pub struct Engine<K: GeometryKernel> {
    kernel: K,
    config: AnalysisConfig,
    builder: BaselineBuilder,
    detector: InterfaceDetector,
    comparator: BaselineComparator,
}

impl<K: GeometryKernel> Engine<K> {
    /// Engine with the default configuration.
    pub fn new(kernel: K) -> Self {
        Self::assemble(kernel, AnalysisConfig::default())
    }

    /// Engine with an explicit configuration, validated first.
    pub fn with_config(kernel: K, config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(kernel, config))
    }

    fn assemble(kernel: K, config: AnalysisConfig) -> Self {
        Self {
            kernel,
            builder: BaselineBuilder::new(config.builder.clone()),
            detector: InterfaceDetector::new(config.interfaces.clone()),
            comparator: BaselineComparator::new(config.compare.clone()),
            config,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// The geometry kernel.
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Parse the requested model and build its baseline.
    pub fn baseline(&self, request: ModelRequest) -> Result<Baseline> {
        let source = request.into_source()?;
        let data = source.read()?;
        let tree = self.kernel.parse_bytes(&data)?;
        let baseline = self
            .builder
            .build_with_source(&tree, Some(SourceInfo::new(source.label(), &data)))?;
        info!(
            kernel = self.kernel.name(),
            baseline_id = %baseline.baseline_id,
            components = baseline.components.len(),
            "baseline created"
        );
        Ok(baseline)
    }

    /// Interfaces between the parts of `baseline`, with their graph.
    pub fn detect_interfaces(&self, baseline: &Baseline) -> (Vec<Interface>, AssemblyGraph) {
        self.detector.detect(baseline)
    }

    /// Compare two baselines.
    pub fn compare(&self, baseline1: &Baseline, baseline2: &Baseline) -> Result<DiffReport> {
        self.comparator.compare(baseline1, baseline2)
    }

    /// Build both models, detect their interfaces and compare them.
    pub fn compare_requests(&self, request1: ModelRequest, request2: ModelRequest) -> Result<DiffReport> {
        let baseline1 = self.with_interfaces(self.baseline(request1)?);
        let baseline2 = self.with_interfaces(self.baseline(request2)?);
        self.compare(&baseline1, &baseline2)
    }

    /// `baseline` carrying its detected interfaces.
    pub fn with_interfaces(&self, baseline: Baseline) -> Baseline {
        let (interfaces, _) = self.detect_interfaces(&baseline);
        Baseline {
            interfaces: Some(interfaces),
            ..baseline
        }
    }

    /// Run the quality checks.
    pub fn validate(&self, baseline: &Baseline) -> ValidationReport {
        validate(baseline, &self.config.validation)
    }
}
