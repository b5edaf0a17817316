//! Pipeline-level tests for aerodeck
//!
//! Includes:
//! - Reference geometry scenarios
//! - Hinge placement through the deck writer
//! - Batch failure isolation
//! - Reducer robustness
//! - Control derivative fits
//! - Folder-to-summary pipeline against a scripted solver

use std::fs;
use std::path::Path;

use crate::config::{ReferenceConfig, Root};
use crate::context::RunContext;
use crate::controls::{estimate, least_squares};
use crate::deck::DeckWriter;
use crate::executor::testing::ScriptedRunner;
use crate::executor::{Mode, MockModel, SolverExecutor};
use crate::geometry::fixtures::rectangular_half_wing;
use crate::geometry::loader::load_panel_data;
use crate::geometry::{GeometryData, PanelPointSet};
use crate::hinge::HingeStatus;
use crate::record::Coef;
use crate::reducer;
use crate::reference;
use crate::run_matrix::{build_matrix, control_sweep, expand_range, ControlKind};
use crate::stability::{self, NeutralPointSource, Stability};
use approx::assert_relative_eq;
use tempfile::tempdir;

fn silent() -> RunContext {
    RunContext::silent()
}

// =============================================================================
// Reference Geometry
// =============================================================================

#[test]
fn test_rectangular_half_wing_reference() {
    let r = reference::compute(&rectangular_half_wing(), &ReferenceConfig::default());
    assert_relative_eq!(r.area, 8.0);
    assert_relative_eq!(r.span, 8.0);
    assert_relative_eq!(r.chord, 1.0);
    assert!(r.half_span_model);
}

#[test]
fn test_half_span_values_are_exactly_doubled() {
    // Tapered, swept half wing
    let mut g = rectangular_half_wing();
    g.leading_edge = PanelPointSet::from_xyz("Leading Edge", &[[0.0, 0.0, 0.0], [0.6, 1.5, 0.0], [1.3, 3.7, 0.1]]);
    g.trailing_edge = PanelPointSet::from_xyz("Trailing Edge", &[[2.0, 0.0, 0.0], [2.1, 1.5, 0.0], [2.0, 3.7, 0.1]]);
    let (le, te) = (&g.leading_edge.points, &g.trailing_edge.points);

    let r = reference::compute(&g, &ReferenceConfig::default());
    assert_eq!(r.area, 2.0 * reference::single_side_area(le, te));
    assert_eq!(r.span, 2.0 * 3.7);
}

// =============================================================================
// Hinge Placement
// =============================================================================

/// Swept wing, chord 2 ft, sections every 2 ft out to Y = 8.
fn swept_wing() -> GeometryData {
    let mut g = rectangular_half_wing();
    let ys = [0.0, 2.0, 4.0, 6.0, 8.0];
    let le: Vec<[f64; 3]> = ys.iter().map(|y| [0.05 * y, *y, 0.0]).collect();
    let te: Vec<[f64; 3]> = le.iter().map(|p| [p[0] + 2.0, p[1], 0.0]).collect();
    g.leading_edge = PanelPointSet::from_xyz("Leading Edge", &le);
    g.trailing_edge = PanelPointSet::from_xyz("Trailing Edge", &te);
    g
}

#[test]
fn test_section_between_control_ends_gets_interpolated_hinge() {
    let mut g = swept_wing();
    // Control LE from x = 0.6 at Y = 2 to x = 1.0 at Y = 6
    g.control_panel = Some(PanelPointSet::from_xyz(
        "Elevon",
        &[[0.6, 2.0, 0.0], [1.0, 6.0, 0.0], [2.1, 6.0, 0.0], [2.05, 2.0, 0.0]],
    ));
    let r = reference::compute(&g, &ReferenceConfig::default());
    let mut buf = Vec::new();
    let hinges = DeckWriter::from_config(&Root::default())
        .write_avl(&mut buf, "wing", &g, &r)
        .unwrap();

    assert_eq!(hinges.len(), 3);
    let mid = hinges.iter().find(|h| (h.y - 4.0).abs() < 1e-9).unwrap();
    // LE of the section at Y = 4 is x = 0.2; interpolated control LE x = 0.8
    assert_relative_eq!(mid.hinge_fraction, (0.8 - 0.2) / 2.0, epsilon = 1e-12);
    assert_eq!(mid.status, HingeStatus::Inside);

    let text = String::from_utf8(buf).unwrap();
    assert!(text.contains("elevon   1.0    0.3000    0. 0. 0.    1.0\n"));
}

// =============================================================================
// Run Matrix and Execution
// =============================================================================

#[test]
fn test_batch_of_seven_with_one_failure() {
    let cases = build_matrix(&expand_range([0.0, 12.0, 2.0]), &[0.0], 0.1);
    assert_eq!(cases.len(), 7);

    let runner = ScriptedRunner {
        fail_on: vec![cases[3].name.clone()],
        ..Default::default()
    };
    let dir = tempdir().unwrap();
    let exec = SolverExecutor::with_mode(runner, Mode::Real, dir.path(), false);
    let batch = exec.execute(Path::new("wing.avl"), &cases, &silent());

    assert_eq!(batch.records.len(), 7);
    assert_eq!(batch.records.iter().filter(|r| !r.converged).count(), 1);
    assert_eq!(batch.converged_count(), 6);
    assert!(!batch.records[3].converged);
    assert_eq!(batch.records[3].case, cases[3]);
}

#[test]
fn test_case_names_idempotent() {
    let build = || build_matrix(&expand_range([-10.0, 20.0, 2.5]), &expand_range([-5.0, 5.0, 2.5]), 0.15);
    let a: Vec<String> = build().into_iter().map(|c| c.name).collect();
    let b: Vec<String> = build().into_iter().map(|c| c.name).collect();
    assert_eq!(a, b);
    let mut unique = a.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), a.len());
}

#[test]
fn test_mock_batch_deterministic() {
    let cases = build_matrix(&expand_range([-4.0, 8.0, 2.0]), &expand_range([-2.0, 2.0, 2.0]), 0.1);
    let dir = tempdir().unwrap();
    let run = || {
        SolverExecutor::with_mode(ScriptedRunner::default(), Mode::Mock, dir.path(), false)
            .execute(Path::new("wing.avl"), &cases, &silent())
            .records
    };
    assert_eq!(run(), run());
}

// =============================================================================
// Output Reducer
// =============================================================================

#[test]
fn test_reducer_order_and_whitespace_insensitive() {
    let a = reducer::parse("  CLtot =   0.51230   CDtot = 0.01870\n  Cmtot = -0.0420\n");
    let b = reducer::parse("Cmtot=-0.0420\nCDtot = 0.01870     CLtot = 0.51230\n");
    assert_eq!(a, b);
}

#[test]
fn test_reducer_malformed_token_isolated() {
    let p = reducer::parse("  CLtot = abc   CDtot = 0.02\n  Cmtot = -0.1\n");
    assert_eq!(p.totals.lift, None);
    assert_eq!(p.totals.drag, Some(0.02));
    assert_eq!(p.totals.pitch, Some(-0.1));
}

// =============================================================================
// Control Derivatives
// =============================================================================

#[test]
fn test_fit_needs_three_points() {
    assert!(least_squares(&[-10.0, 10.0], &[0.1, 0.3]).is_err());
    let xs = [-20.0, -5.0, 0.0, 15.0];
    let ys: Vec<f64> = xs.iter().map(|x| -0.0071 * x + 0.03).collect();
    assert_relative_eq!(least_squares(&xs, &ys).unwrap().slope, -0.0071, epsilon = 1e-14);
}

// =============================================================================
// Folder to Summary
// =============================================================================

fn write_export(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("mass.csv"), "mass,cg_x,cg_y,cg_z,Ixx,Iyy,Izz\n100,3,0,0,1440,2880,4032\n").unwrap();
    fs::write(dir.join("LEpts.csv"), "x,y,z\n0,0,0\n0,24,0\n0,48,0\n").unwrap();
    fs::write(dir.join("TEpts.csv"), "x,y,z\n12,0,0\n12,24,0\n12,48,0\n").unwrap();
    fs::write(dir.join("ELEVONpts.csv"), "x,y,z\n9,24,0\n9,48,0\n12,48,0\n12,24,0\n").unwrap();
}

#[test]
fn test_folder_to_stability_summary() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    let input = root.join("export");
    let out = root.join("out");
    write_export(&input);
    let ctx = silent();

    let geom = load_panel_data(&input, &ctx).unwrap();
    let mut cfg = Root::default();
    geom.validate(&cfg.validation, &ctx).unwrap();
    assert!(geom.control_panel.is_some());
    assert_relative_eq!(geom.mass.cg.x, 0.25);

    let r = reference::compute(&geom, &cfg.reference);
    assert_relative_eq!(r.area, 8.0);

    cfg.analysis.alpha_range = [-4.0, 8.0, 2.0];
    cfg.analysis.beta_range = [-2.0, 2.0, 2.0];
    let deck = DeckWriter::from_config(&cfg)
        .write_files(&out, "flyingwing", &geom, &r, &ctx)
        .unwrap();
    assert!(deck.avl_path.exists());
    assert!(deck.mass_path.exists());
    assert_eq!(deck.hinges.iter().filter(|h| h.emits_control()).count(), 2);

    let exec = SolverExecutor::new(ScriptedRunner::default(), out.join("avl_outputs"), false, &ctx);
    assert_eq!(exec.mode(), Mode::Real);
    let a = &cfg.analysis;
    let cases = build_matrix(&expand_range(a.alpha_range), &expand_range(a.beta_range), a.mach);
    let batch = exec.execute(&deck.avl_path, &cases, &ctx);
    assert_eq!(batch.converged_count(), cases.len());

    let sweep = control_sweep(ControlKind::Symmetric, &expand_range(cfg.controls.symmetric_range), 0.0, 0.0, a.mach);
    let sweep_batch = exec.execute(&deck.avl_path, &sweep, &ctx);
    let d = estimate(&sweep_batch.records, ControlKind::Symmetric, "elevon").unwrap();
    let m = MockModel::default();
    assert_relative_eq!(d.slope(Coef::Lift).unwrap(), m.cl_sym, epsilon = 1e-8);
    assert_relative_eq!(d.slope(Coef::Pitch).unwrap(), m.cm_sym, epsilon = 1e-8);

    let s = stability::summarize(&batch.records, &r, geom.mass.cg.x);
    assert_eq!(s.neutral_point_source, Some(NeutralPointSource::Reported));
    assert_relative_eq!(s.static_margin.unwrap(), 0.45, epsilon = 1e-9);
    assert_eq!(s.stability, Some(Stability::Stable));
    assert_relative_eq!(s.cl_alpha.unwrap().slope, m.cl_alpha.to_radians(), epsilon = 1e-8);
}
