//! End-to-end build over the fixture inputs.
//!
//! The fixture config covers both cycles: four 2020 states plus one with no
//! market file, one results page with the wrong shape, and a 2016 cycle fed
//! from a race-filtered poll file and a by-state results CSV.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::NaiveDate;
use primarylab_core::{CandidateDayRecord, ContestKey, Cycle, MasterTable, Warning};
use primarylab_runner::{build_from_config, evaluate, evaluate_range, BuildOutput, PipelineConfig};

fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn build() -> BuildOutput {
    let config = PipelineConfig::from_file(&fixture_dir().join("pipeline.toml")).unwrap();
    build_from_config(&config).unwrap()
}

fn rows<'a>(table: &'a MasterTable, cycle: Cycle, state: &str) -> Vec<&'a CandidateDayRecord> {
    table
        .records()
        .iter()
        .filter(|r| r.cycle_year == cycle && r.state == state)
        .collect()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn builds_both_cycles() {
    let out = build();
    assert_eq!(out.table.len(), 34);
    assert_eq!(out.table.contests().len(), 7);
    assert!(out.table.check_invariants().is_ok());
}

#[test]
fn master_key_is_unique_and_fractions_in_range() {
    let out = build();
    let keys: BTreeSet<_> = out.table.records().iter().map(|r| r.key()).collect();
    assert_eq!(keys.len(), out.table.len());

    for r in out.table.records() {
        for v in [r.poll_estimate, r.market_close, r.vote_percent].into_iter().flatten() {
            assert!((0.0..=1.0).contains(&v), "{}: {v}", r.key());
        }
        assert!(r.observation_date <= r.contest_date);
        assert!(r.market_close.is_some() && r.poll_trend_adjusted.is_some());
    }
}

#[test]
fn one_winner_with_top_share_per_contest_with_results() {
    let out = build();
    for (contest, group) in out.table.by_contest() {
        let best = group
            .iter()
            .filter_map(|r| r.vote_percent)
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));
        let Some(best) = best else { continue };
        let winners: BTreeSet<&str> = group
            .iter()
            .filter(|r| r.winner == Some(true))
            .map(|r| r.candidate_name.as_str())
            .collect();
        assert_eq!(winners.len(), 1, "{contest}");
        let share = group
            .iter()
            .find(|r| r.winner == Some(true) && r.vote_percent.is_some())
            .and_then(|r| r.vote_percent);
        assert_eq!(share, Some(best), "{contest}");
    }
}

#[test]
fn iowa_2020_results_attach_to_eve_rows() {
    let out = build();
    let iowa = rows(&out.table, Cycle::Y2020, "Iowa");
    assert_eq!(iowa.len(), 6);

    let eve: Vec<_> = iowa.iter().filter(|r| r.vote_percent.is_some()).collect();
    assert_eq!(eve.len(), 3);
    assert!(eve.iter().all(|r| r.observation_date == date(2020, 2, 2)));

    let pete = eve.iter().find(|r| r.candidate_name == "Pete Buttigieg").unwrap();
    assert!((pete.vote_percent.unwrap() - 0.262).abs() < 1e-12);
    assert!(iowa
        .iter()
        .all(|r| r.winner == Some(r.candidate_name == "Pete Buttigieg")));

    // Warren only had a market quote; she never joins a poll row.
    assert!(iowa.iter().all(|r| r.candidate_name != "Elizabeth Warren"));
}

#[test]
fn market_quotes_carry_close_and_volume() {
    let out = build();
    let biden = out
        .table
        .records()
        .iter()
        .find(|r| {
            r.state == "Texas"
                && r.candidate_name == "Joe Biden"
                && r.observation_date == date(2020, 3, 2)
        })
        .unwrap();
    assert_eq!(biden.market_close, Some(0.37));
    assert_eq!(biden.market_volume, Some(120));
    assert_eq!(biden.poll_estimate, Some(0.30));
    assert_eq!(biden.poll_trend_adjusted, Some(0.301));

    // 2016 market files carry no volume.
    assert!(rows(&out.table, Cycle::Y2016, "Iowa")
        .iter()
        .all(|r| r.market_volume.is_none()));
}

#[test]
fn withdrawn_candidates_are_dropped_from_later_contests() {
    let out = build();
    let texas = rows(&out.table, Cycle::Y2020, "Texas");
    assert_eq!(texas.len(), 4);
    assert!(texas.iter().all(|r| r.candidate_name != "Pete Buttigieg"));
    assert!(texas.iter().all(|r| r.observation_date <= date(2020, 3, 3)));

    let cutoff = date(2020, 3, 1);
    assert!(out
        .table
        .records()
        .iter()
        .filter(|r| r.candidate_name == "Pete Buttigieg")
        .all(|r| r.contest_date <= cutoff));

    // O'Malley withdrew on the day of Iowa 2016: kept there, gone afterwards.
    assert_eq!(
        rows(&out.table, Cycle::Y2016, "Iowa")
            .iter()
            .filter(|r| r.candidate_name == "Martin O'Malley")
            .count(),
        2
    );
    assert!(rows(&out.table, Cycle::Y2016, "New Hampshire")
        .iter()
        .all(|r| r.candidate_name != "Martin O'Malley"));
}

#[test]
fn missing_results_default_per_cycle() {
    let out = build();
    // 2020 contests without attached results keep a null winner.
    for state in ["South Carolina", "Texas"] {
        assert!(rows(&out.table, Cycle::Y2020, state)
            .iter()
            .all(|r| r.winner.is_none() && r.vote_percent.is_none()));
    }
    // 2016 contests missing from the results CSV default to false.
    let nevada = rows(&out.table, Cycle::Y2016, "Nevada");
    assert_eq!(nevada.len(), 4);
    assert!(nevada.iter().all(|r| r.winner == Some(false)));
}

#[test]
fn race_filter_keeps_only_democratic_rows() {
    let out = build();
    assert!(out
        .table
        .records()
        .iter()
        .all(|r| r.candidate_name != "Donald Trump"));
}

#[test]
fn isolated_failures_surface_as_warnings() {
    let out = build();
    let has = |pred: &dyn Fn(&Warning) -> bool| out.warnings.iter().any(pred);

    assert!(has(&|w| matches!(w, Warning::StateFailed { state, .. } if state == "Ohio")));
    assert!(has(
        &|w| matches!(w, Warning::ContestFailed { state, .. } if state == "South Carolina")
    ));
    assert!(has(&|w| matches!(w, Warning::SkippedRow { file, .. } if file.ends_with("Iowa.csv"))));
    assert!(has(&|w| matches!(w, Warning::UnmappedName { raw, .. } if raw == "Gravel")));
    assert_eq!(out.warnings.len(), 4);
}

#[test]
fn fingerprint_is_stable_and_survives_csv_roundtrip() {
    let first = build();
    let second = build();
    assert_eq!(first.fingerprint, second.fingerprint);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out/master.csv");
    first.table.save_csv(&path).unwrap();
    let loaded = MasterTable::load_csv(&path).unwrap();
    assert_eq!(loaded, first.table);
    assert_eq!(loaded.fingerprint().unwrap(), first.fingerprint);
}

#[test]
fn evaluation_over_built_table() {
    let out = build();

    // Market and polls both miss Iowa 2020 and call the other three.
    let snap = evaluate(&out.table, 1, None);
    assert_eq!(snap.market_contests, 4);
    assert_eq!(snap.poll_contests, 4);
    assert_eq!(snap.market_accuracy, Some(75.0));
    assert_eq!(snap.poll_accuracy, Some(75.0));

    let only_2020 = BTreeSet::from([
        ContestKey::new(Cycle::Y2020, "Iowa"),
        ContestKey::new(Cycle::Y2020, "New Hampshire"),
    ]);
    let snap = evaluate(&out.table, 1, Some(&only_2020));
    assert_eq!(snap.market_accuracy, Some(50.0));

    let range = evaluate_range(&out.table, 1..=3, None);
    assert_eq!(range.len(), 3);
    assert_eq!(range[1].market_contests, 4);
    assert_eq!(range[2].market_accuracy, None);
}
