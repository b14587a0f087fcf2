//! End-to-end ensemble combination on directories laid out like a real PIGS ensemble.

use std::fs;
use std::path::Path;

use approx::assert_relative_eq;
use pigs_stats::app::pipeline::run_combine;
use pigs_stats::domain::{CombineConfig, CombineMethod, ObservableKind};
use pigs_stats::io::{read_table, DEFAULT_EVAPORATION_THRESHOLD, detect_evaporation};

fn write_run(root: &Path, run: usize, name: &str, body: &str) {
    let dir = root.join(format!("run_{run}"));
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(name), body).unwrap();
}

fn config(dir: &Path, kind: ObservableKind, method: CombineMethod, block_size: usize) -> CombineConfig {
    CombineConfig {
        dir: dir.to_path_buf(),
        kind,
        method,
        block_size,
        precision: None,
        output: None,
    }
}

#[test]
fn identical_runs_have_zero_blocked_error() {
    let dir = tempfile::tempdir().unwrap();
    let body: String = (0..100).map(|i| format!("{} 2.0 0.1\n", 0.05 * i as f64)).collect();
    for run in 1..=3 {
        write_run(dir.path(), run, "he4.sd", &body);
    }

    let (series, _) = run_combine(&config(dir.path(), ObservableKind::Superfluid, CombineMethod::Blocking, 2)).unwrap();
    assert_eq!(series.len(), 100);
    assert!(series.columns[0].iter().all(|&v| v == 2.0));
    assert!(series.columns[1].iter().all(|&e| e == 0.0));
}

#[test]
fn combined_file_reads_back_within_precision() {
    let dir = tempfile::tempdir().unwrap();
    write_run(dir.path(), 1, "a.sd", "0.1 0.91 0.01\n0.2 0.82 0.02\n0.3 0.73 0.03\n");
    write_run(dir.path(), 2, "a.sd", "0.1 0.95 0.03\n0.2 0.84 0.02\n0.3 0.77 0.01\n");

    let cfg = config(dir.path(), ObservableKind::Superfluid, CombineMethod::Propagated, 20);
    let (series, path) = run_combine(&cfg).unwrap();
    assert_eq!(path.file_name().unwrap(), "sf_fractions_combined");

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("# block  fraction  error\n"));

    let table = read_table(&path).unwrap();
    assert_eq!(table.n_rows(), 3);
    for (i, row) in table.rows.iter().enumerate() {
        assert_relative_eq!(row[0], series.x[i], max_relative = 1e-4);
        assert_relative_eq!(row[1], series.columns[0][i], max_relative = 1e-4);
        assert_relative_eq!(row[2], series.columns[1][i], max_relative = 1e-4);
    }
    assert_relative_eq!(table.rows[0][1], 0.93, max_relative = 1e-4);
    assert_relative_eq!(table.rows[0][2], (0.01f64.powi(2) + 0.03f64.powi(2)).sqrt() / 2.0, max_relative = 1e-4);
}

#[test]
fn energies_average_over_runs_that_reached_each_block() {
    let dir = tempfile::tempdir().unwrap();
    write_run(dir.path(), 1, "he4.sy", "PARTICLES 4\nMC PASS 4\n");
    write_run(dir.path(), 1, "he4.en", "1 1.0 -3.0 -2.0\n2 2.0 -4.0 -2.0\n3 3.0 -5.0 -2.0\n");
    write_run(dir.path(), 2, "he4.en", "1 3.0 -5.0 -2.0\n2 4.0 -6.0 -2.0\n");

    let (series, path) = run_combine(&config(dir.path(), ObservableKind::Energy, CombineMethod::Blocking, 20)).unwrap();
    assert_eq!(series.x, vec![1.0, 2.0, 3.0]);
    assert_eq!(series.columns[0], vec![2.0, 3.0, 3.0]);
    assert_eq!(series.columns[1], vec![-4.0, -5.0, -5.0]);
    assert_eq!(series.columns[2], vec![-2.0, -2.0, -2.0]);

    let text = fs::read_to_string(path).unwrap();
    assert_eq!(text.lines().nth(1), Some("1\t2.000000e+00\t-4.000000e+00\t-2.000000e+00"));
}

#[test]
fn structure_factor_rows_are_sorted_and_weighted() {
    let dir = tempfile::tempdir().unwrap();
    write_run(dir.path(), 1, "a.sq", "2.0 4.0 1.0\n1.0 1.0 1.0\n");
    write_run(dir.path(), 2, "a.sq", "1.0 3.0 3.0\n2.0 8.0 3.0\n");

    let (series, _) = run_combine(&config(dir.path(), ObservableKind::StructureFactor, CombineMethod::Blocking, 20)).unwrap();
    assert_eq!(series.x, vec![1.0, 2.0]);
    assert_relative_eq!(series.columns[0][0], 2.5);
    assert_relative_eq!(series.columns[0][1], 7.0);
}

#[test]
fn mismatched_runs_are_rejected_by_name() {
    let dir = tempfile::tempdir().unwrap();
    write_run(dir.path(), 1, "a.sd", "0.1 1 1\n0.2 1 1\n");
    write_run(dir.path(), 2, "b.sd", "0.1 1 1\n");

    let err = run_combine(&config(dir.path(), ObservableKind::Superfluid, CombineMethod::Blocking, 1)).unwrap_err();
    assert!(err.is_input());
    assert!(err.message().contains("b.sd"), "{}", err.message());
}

#[test]
fn evaporated_runs_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    write_run(dir.path(), 1, "a.vis", "0 0 1.0\n0 0 2.0\n");
    write_run(dir.path(), 2, "a.vis", "0 0 1.0\n0 0 12.5\n");

    let flagged = detect_evaporation(dir.path(), DEFAULT_EVAPORATION_THRESHOLD).unwrap();
    assert_eq!(flagged.len(), 1);
    assert!(flagged[0].ends_with("run_2/a.vis"));
}
