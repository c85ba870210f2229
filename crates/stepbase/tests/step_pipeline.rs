//! End-to-end runs over the bracket fixtures through the STEP kernel.

use approx::assert_relative_eq;
use stepbase::compare::{CriticalJointChange, FeatureChangeKind, InterfaceChangeKind};
use stepbase::{
    bom_lines, to_csv, BaselineStore, CheckStatus, ComponentId, Engine, FileStore, ImpactLevel, InterfaceKind,
    ModelRequest,
};
use stepbase_step::StepKernel;

const REV1: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../stepbase-step/fixtures/bracket_assembly_rev1.step");
const REV2: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../stepbase-step/fixtures/bracket_assembly_rev2.step");

fn engine() -> Engine<StepKernel> {
    Engine::new(StepKernel::new())
}

#[test]
fn test_baseline_from_file() {
    let baseline = engine().baseline(ModelRequest::from_path(REV1)).unwrap();

    let ids: Vec<&str> = baseline.components.iter().map(|c| c.component_id.as_str()).collect();
    assert_eq!(ids, ["0", "0.0", "0.1", "0.2", "0.3"]);
    let foot = baseline.component(&ComponentId::from("0.2")).unwrap();
    assert_eq!((foot.name.as_str(), foot.quantity), ("foot", 2));
    assert_eq!(
        baseline.source.as_ref().and_then(|s| s.file.as_deref()),
        Some("bracket_assembly_rev1.step")
    );

    let base = baseline.summary(&ComponentId::from("0.0")).unwrap();
    assert_eq!(base.holes.len(), 4);
    assert_relative_eq!(
        base.volume,
        60000.0 - 4.0 * std::f64::consts::PI * 90.0,
        max_relative = 2e-3
    );
    let root = baseline.summary(&ComponentId::root()).unwrap();
    assert_relative_eq!(root.bounding_box.min.z, -5.0, epsilon = 1e-9);
    assert_relative_eq!(root.bounding_box.max.x, 110.5, epsilon = 1e-9);
    let instances: f64 = baseline
        .parts()
        .map(|c| baseline.summary(&c.component_id).unwrap().volume * f64::from(c.quantity))
        .sum();
    assert_relative_eq!(root.volume, instances, max_relative = 1e-9);

    assert_eq!(baseline.totals().instance_count, 5);
    assert_eq!(
        baseline.component_path(&ComponentId::from("0.3")).as_deref(),
        Some("bracket_assembly > sensor")
    );

    let report = engine().validate(&baseline);
    assert_eq!(report.overall_status, CheckStatus::Pass, "{:?}", report.checks);

    let csv = to_csv(&bom_lines(&baseline));
    assert!(csv.lines().any(|row| row == "4;1;2;foot;PART;0.2"));
}

#[test]
fn test_interfaces_from_file() {
    let engine = engine();
    let baseline = engine.baseline(ModelRequest::from_path(REV1)).unwrap();
    let (interfaces, graph) = engine.detect_interfaces(&baseline);

    let fastening = interfaces
        .iter()
        .find(|i| i.pair() == (&ComponentId::from("0.0"), &ComponentId::from("0.1")))
        .unwrap();
    assert_eq!(fastening.kind, InterfaceKind::Fastening);
    assert_eq!(fastening.evidence.fastener_count(), 4);
    assert!(fastening.critical);

    let foot = interfaces
        .iter()
        .find(|i| i.involves(&ComponentId::from("0.2")))
        .unwrap();
    assert_eq!(foot.kind, InterfaceKind::Contact);

    let sensor: Vec<InterfaceKind> = interfaces
        .iter()
        .filter(|i| i.involves(&ComponentId::from("0.3")))
        .map(|i| i.kind)
        .collect();
    assert!(!sensor.is_empty());
    assert!(sensor.iter().all(|k| *k == InterfaceKind::Proximity));

    assert_eq!(graph.critical_joints.len(), 1);
    assert_eq!(graph.connected_groups, 1);
}

#[test]
fn test_revision_diff() {
    let report = engine()
        .compare_requests(ModelRequest::from_path(REV1), ModelRequest::from_path(REV2))
        .unwrap();

    assert_eq!(report.impact_level, ImpactLevel::CriticalInterface);
    assert!(report.bom_changes.is_empty());

    let joint = report
        .interface_changes
        .iter()
        .find(|c| c.critical_joint.is_some())
        .unwrap();
    assert_eq!(joint.change, InterfaceChangeKind::Changed);
    assert_eq!(joint.critical_joint, Some(CriticalJointChange::Disappeared));
    assert_eq!(joint.after.as_ref().map(|i| i.evidence.fastener_count()), Some(2));

    let cover = report
        .geometry_changes
        .iter()
        .find(|g| g.name == "cover_plate")
        .unwrap();
    assert!(cover.volume_change > 0.0);
    assert!(cover.major);

    let holes: Vec<FeatureChangeKind> = report
        .feature_changes
        .iter()
        .filter(|f| f.name == "cover_plate")
        .map(|f| f.change)
        .collect();
    assert_eq!(holes, [FeatureChangeKind::Removed, FeatureChangeKind::Removed]);

    let envelope = report
        .bounding_box_changes
        .iter()
        .find(|c| c.name == "cover_plate")
        .unwrap();
    assert_relative_eq!(envelope.extent_delta.z, 1.0, epsilon = 1e-9);
    assert!(report.metadata_changes.is_empty());
}

#[test]
fn test_stored_baseline_compares_clean() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());
    let engine = engine();

    let baseline = engine.with_interfaces(engine.baseline(ModelRequest::from_path(REV1)).unwrap());
    let id = store.save(&baseline).unwrap();
    let loaded = store.load(&id).unwrap();
    assert_eq!(loaded, baseline);

    let fresh = engine.with_interfaces(engine.baseline(ModelRequest::from_path(REV1)).unwrap());
    let report = engine.compare(&loaded, &fresh).unwrap();
    assert_eq!(report.impact_level, ImpactLevel::None);
    assert_eq!(report.statistics.total_changes, 0);
}
