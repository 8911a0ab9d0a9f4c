use vigil_domain::{Signal, Thresholds, Verdict};

/// Map a signal to a verdict. Pure; the order of the checks is the policy:
/// unreliable signals first, then drift, then accuracy.
pub fn evaluate(signal: &Signal, thresholds: &Thresholds) -> Verdict {
    if !signal.api_healthy || signal.sample_count < thresholds.min_samples {
        return Verdict::Unknown;
    }
    if !signal.is_well_formed() {
        return Verdict::Unknown;
    }
    if signal.drift_score > thresholds.drift_threshold {
        return Verdict::Drifted;
    }
    if signal.rolling_accuracy < thresholds.accuracy_threshold {
        return Verdict::Degraded;
    }
    Verdict::Healthy
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn signal(api_healthy: bool, accuracy: f64, drift: f64, samples: u64) -> Signal {
        Signal {
            timestamp: Utc::now(),
            api_healthy,
            rolling_accuracy: accuracy,
            drift_score: drift,
            sample_count: samples,
        }
    }

    fn thresholds() -> Thresholds {
        Thresholds {
            drift_threshold: 0.7,
            accuracy_threshold: 0.85,
            min_samples: 30,
        }
    }

    #[test]
    fn scenario_a_low_accuracy_is_degraded() {
        let verdict = evaluate(&signal(true, 0.60, 0.1, 50), &thresholds());
        assert_eq!(verdict, Verdict::Degraded);
    }

    #[test]
    fn scenario_b_drift_wins_over_good_accuracy() {
        let verdict = evaluate(&signal(true, 0.95, 0.9, 50), &thresholds());
        assert_eq!(verdict, Verdict::Drifted);
    }

    #[test]
    fn scenario_c_unhealthy_api_is_unknown() {
        let verdict = evaluate(&signal(false, 0.95, 0.1, 50), &thresholds());
        assert_eq!(verdict, Verdict::Unknown);
    }

    #[test]
    fn drift_has_priority_over_degradation() {
        for accuracy in [0.0, 0.3, 0.6, 0.84] {
            for drift in [0.71, 0.8, 0.99, 1.0] {
                assert_eq!(
                    evaluate(&signal(true, accuracy, drift, 50), &thresholds()),
                    Verdict::Drifted,
                    "accuracy={accuracy} drift={drift}"
                );
            }
        }
    }

    #[test]
    fn unhealthy_api_short_circuits_every_value() {
        for accuracy in [0.0, 0.5, 0.99, f64::NAN] {
            for drift in [0.0, 0.5, 0.99, f64::INFINITY] {
                for samples in [0, 29, 30, 10_000] {
                    assert_eq!(
                        evaluate(&signal(false, accuracy, drift, samples), &thresholds()),
                        Verdict::Unknown
                    );
                }
            }
        }
    }

    #[test]
    fn insufficient_samples_are_unknown() {
        assert_eq!(
            evaluate(&signal(true, 0.2, 0.95, 29), &thresholds()),
            Verdict::Unknown
        );
        assert_eq!(
            evaluate(&signal(true, 0.2, 0.95, 30), &thresholds()),
            Verdict::Drifted
        );
    }

    #[test]
    fn thresholds_are_strict_comparisons() {
        // exactly at the drift threshold is not drift
        assert_eq!(
            evaluate(&signal(true, 0.9, 0.7, 50), &thresholds()),
            Verdict::Healthy
        );
        // exactly at the accuracy threshold is not degraded
        assert_eq!(
            evaluate(&signal(true, 0.85, 0.1, 50), &thresholds()),
            Verdict::Healthy
        );
    }

    #[test]
    fn non_finite_values_are_unknown() {
        assert_eq!(
            evaluate(&signal(true, f64::NAN, 0.1, 50), &thresholds()),
            Verdict::Unknown
        );
        assert_eq!(
            evaluate(&signal(true, 0.9, f64::NAN, 50), &thresholds()),
            Verdict::Unknown
        );
    }
}
