//! Revenue forecast tests - `tft revenue`

mod common;

use common::{TestEnv, REFERENCE_PIPELINE};
use predicates::prelude::*;

#[test]
fn test_revenue_reference_pipeline() {
    let env = TestEnv::new();
    env.write("deals.yaml", REFERENCE_PIPELINE);

    let out = env.json(&["revenue", "--deals", "deals.yaml", "--volatility", "0.1"]);
    assert_eq!(out["deals"], 4);
    assert!((out["expected_value"].as_f64().unwrap() - 168_000.0).abs() < 1e-6);
    assert_eq!(out["market_volatility"], 0.1);

    let p10 = out["p10"].as_f64().unwrap();
    let p50 = out["p50"].as_f64().unwrap();
    let p90 = out["p90"].as_f64().unwrap();
    assert!(p10 < p50 && p50 < p90);
    assert!(p90 <= 370_000.0);
    // Target 0: every trial qualifies
    assert_eq!(out["probability_of_success"], 1.0);
}

#[test]
fn test_revenue_higher_volatility_widens_spread() {
    let env = TestEnv::new();
    env.write("deals.yaml", REFERENCE_PIPELINE);

    let calm = env.json(&[
        "revenue", "--deals", "deals.yaml", "--volatility", "0.1", "--seed", "5",
    ]);
    let stormy = env.json(&[
        "revenue", "--deals", "deals.yaml", "--volatility", "0.5", "--seed", "5",
    ]);
    assert!(stormy["std_dev"].as_f64().unwrap() > calm["std_dev"].as_f64().unwrap());
}

#[test]
fn test_revenue_certain_deal_is_point_mass() {
    let env = TestEnv::new();
    env.write("deals.json", r#"{"deals": [{"amount": 50000, "probability": 1.0}]}"#);

    let out = env.json(&["revenue", "--deals", "deals.json", "--volatility", "0"]);
    assert_eq!(out["p50"], 50_000.0);
    assert_eq!(out["p90"], 50_000.0);
    assert_eq!(out["p99"], 50_000.0);
    assert_eq!(out["std_dev"], 0.0);
}

#[test]
fn test_revenue_empty_pipeline() {
    let env = TestEnv::new();
    env.write("deals.yaml", "[]\n");

    let out = env.json(&["revenue", "--deals", "deals.yaml", "--target", "1"]);
    assert_eq!(out["p50"], 0.0);
    assert_eq!(out["probability_of_success"], 0.0);
}

#[test]
fn test_revenue_target_probability() {
    let env = TestEnv::new();
    env.write("deals.yaml", REFERENCE_PIPELINE);

    let out = env.json(&[
        "revenue", "--deals", "deals.yaml", "--target", "1000000",
    ]);
    // Winning every deal still falls short
    assert_eq!(out["probability_of_success"], 0.0);
}

#[test]
fn test_revenue_human_output() {
    let env = TestEnv::new();
    env.write("deals.yaml", REFERENCE_PIPELINE);

    env.tft()
        .args([
            "revenue", "--deals", "deals.yaml", "--target", "150000", "-n", "2000", "-H",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Simulated pipeline of 4 deals"))
        .stdout(predicate::str::contains("Weighted pipeline: 168000"))
        .stdout(predicate::str::contains("Downside (P10)"))
        .stdout(predicate::str::contains("probability of reaching"))
        .stdout(predicate::str::contains("Distribution"));
}

#[test]
fn test_revenue_does_not_record_runs() {
    let env = TestEnv::new();
    env.write("deals.yaml", REFERENCE_PIPELINE);

    env.tft()
        .args(["revenue", "--deals", "deals.yaml", "-n", "500"])
        .assert()
        .success();

    let runs = env.json(&["run", "list"]);
    assert!(runs.as_array().unwrap().is_empty());
}

#[test]
fn test_revenue_rejects_bad_probability() {
    let env = TestEnv::new();
    env.write("deals.yaml", "- amount: 100\n  probability: 1.5\n");

    env.tft()
        .args(["revenue", "--deals", "deals.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Deal 1"));
}

#[test]
fn test_revenue_rejects_negative_volatility() {
    let env = TestEnv::new();
    env.write("deals.yaml", REFERENCE_PIPELINE);

    env.tft()
        .args(["revenue", "--deals", "deals.yaml", "--volatility=-0.1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Volatility factor"));
}
