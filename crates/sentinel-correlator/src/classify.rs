//! Pure classification, priority, and strength rules (spec §4.5). Kept free
//! of state so every rule can be unit-tested against fixed inputs.

use sentinel_common::types::{BgpAnomaly, BgpSeries, FailureKind, JoinKind, Role, Severity, SnmpAnomaly};

fn has_series(bgp: &BgpAnomaly, series: BgpSeries) -> bool {
    bgp.detected_series.contains(&series)
}

fn has_feature_prefix(snmp: &SnmpAnomaly, prefix: &str) -> bool {
    snmp.contributing_features
        .iter()
        .any(|f| f.starts_with(prefix))
}

/// Deterministic rule table over the contributing-feature set and
/// cross-modal pattern (spec §4.5 "Classification").
pub fn classify(
    bgp: Option<&BgpAnomaly>,
    snmp: Option<&SnmpAnomaly>,
    bgp_repeat_count: usize,
) -> FailureKind {
    match (bgp, snmp) {
        (Some(b), Some(s)) => {
            if has_series(b, BgpSeries::Withdrawals)
                && has_series(b, BgpSeries::Churn)
                && has_feature_prefix(s, "if_error_rate")
            {
                FailureKind::LinkFailure
            } else if has_series(b, BgpSeries::Churn)
                && (has_feature_prefix(s, "cpu") || has_feature_prefix(s, "mem"))
            {
                FailureKind::RouterOverload
            } else {
                FailureKind::UnclassifiedAnomaly
            }
        }
        (None, Some(s)) => {
            if has_feature_prefix(s, "temp") || has_feature_prefix(s, "cpu_max") {
                FailureKind::HardwareDegradation
            } else {
                FailureKind::UnclassifiedAnomaly
            }
        }
        (Some(b), None) => {
            if has_series(b, BgpSeries::Churn) && bgp_repeat_count >= 2 {
                FailureKind::BgpFlapping
            } else {
                FailureKind::UnclassifiedAnomaly
            }
        }
        (None, None) => FailureKind::UnclassifiedAnomaly,
    }
}

/// `strength = w_time * (1 - Δt/Δcorr) + w_conf * mean(conf) + w_adj *
/// adjacency_bonus`, clipped to [0,1] (spec §4.5 "Correlation strength").
#[allow(clippy::too_many_arguments)]
pub fn correlation_strength(
    w_time: f64,
    w_conf: f64,
    w_adj: f64,
    delta_t_secs: f64,
    window_secs: f64,
    mean_confidence: f64,
    adjacency_bonus: f64,
) -> f64 {
    let time_term = w_time * (1.0 - (delta_t_secs / window_secs).clamp(0.0, 1.0));
    let conf_term = w_conf * mean_confidence;
    let adj_term = w_adj * adjacency_bonus;
    (time_term + conf_term + adj_term).clamp(0.0, 1.0)
}

fn bgp_severity(confidence: f64) -> Severity {
    if confidence >= 0.85 {
        Severity::Error
    } else if confidence >= 0.5 {
        Severity::Warning
    } else {
        Severity::Info
    }
}

/// Overall alert severity: the worse of the BGP-derived and SNMP-reported
/// severities, defaulting to `Info` if neither side is present.
pub fn overall_severity(bgp: Option<&BgpAnomaly>, snmp: Option<&SnmpAnomaly>) -> Severity {
    let from_bgp = bgp.map(|b| bgp_severity(b.confidence));
    let from_snmp = snmp.map(|s| s.severity);
    match (from_bgp, from_snmp) {
        (Some(a), Some(b)) => a.max(b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => Severity::Info,
    }
}

/// Priority derivation (spec §4.5 "Priority derivation"), first-match-wins
/// over P1..P4. Callers short-circuit to P3 for topology-miss devices before
/// reaching this function (spec §4.5 failure semantics).
pub fn priority(
    role: Role,
    blast_radius: usize,
    join_kind: JoinKind,
    severity: Severity,
    spine_blast_threshold: usize,
    tor_blast_threshold: usize,
) -> sentinel_common::types::AlertPriority {
    use sentinel_common::types::AlertPriority;
    let multimodal_critical = join_kind == JoinKind::Multimodal && severity == Severity::Critical;
    if matches!(role, Role::Spine | Role::Rr | Role::Edge)
        || blast_radius >= spine_blast_threshold
        || multimodal_critical
    {
        return AlertPriority::P1;
    }
    if role == Role::Tor || blast_radius >= tor_blast_threshold {
        return AlertPriority::P2;
    }
    if role == Role::Leaf || blast_radius >= 2 {
        return AlertPriority::P3;
    }
    AlertPriority::P4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_is_pure_function_of_inputs() {
        let a = priority(Role::Spine, 1, JoinKind::BgpOnly, Severity::Warning, 12, 4);
        let b = priority(Role::Spine, 1, JoinKind::BgpOnly, Severity::Warning, 12, 4);
        assert_eq!(a, b);
        assert_eq!(a, sentinel_common::types::AlertPriority::P1);
    }

    #[test]
    fn server_with_small_blast_radius_is_p4() {
        let p = priority(Role::Server, 1, JoinKind::SnmpOnly, Severity::Warning, 12, 4);
        assert_eq!(p, sentinel_common::types::AlertPriority::P4);
    }

    #[test]
    fn large_blast_radius_escalates_regardless_of_role() {
        let p = priority(Role::Leaf, 15, JoinKind::BgpOnly, Severity::Warning, 12, 4);
        assert_eq!(p, sentinel_common::types::AlertPriority::P1);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn any_role() -> impl Strategy<Value = Role> {
        prop_oneof![
            Just(Role::Spine),
            Just(Role::Tor),
            Just(Role::Leaf),
            Just(Role::Server),
            Just(Role::Rr),
            Just(Role::Edge),
            Just(Role::Unknown),
        ]
    }

    fn any_join_kind() -> impl Strategy<Value = JoinKind> {
        prop_oneof![
            Just(JoinKind::BgpOnly),
            Just(JoinKind::SnmpOnly),
            Just(JoinKind::Multimodal),
        ]
    }

    fn any_severity() -> impl Strategy<Value = Severity> {
        prop_oneof![
            Just(Severity::Info),
            Just(Severity::Warning),
            Just(Severity::Error),
            Just(Severity::Critical),
        ]
    }

    proptest! {
        /// `priority` is a pure function: same inputs always produce the same
        /// output, and the result is always one of the four defined levels
        /// (spec §4.5 "deterministic function of (role, blast_radius,
        /// join_kind, severity)").
        #[test]
        fn priority_is_deterministic_and_total(
            role in any_role(),
            blast_radius in 0usize..10_000,
            join_kind in any_join_kind(),
            severity in any_severity(),
            spine_threshold in 1usize..100,
            tor_threshold in 1usize..100,
        ) {
            let a = priority(role, blast_radius, join_kind, severity, spine_threshold, tor_threshold);
            let b = priority(role, blast_radius, join_kind, severity, spine_threshold, tor_threshold);
            prop_assert_eq!(a, b);
        }

        /// `correlation_strength` always clips into [0, 1] regardless of how
        /// far out of range the weighted terms push it (spec §4.5
        /// "Correlation strength... clipped to [0,1]").
        #[test]
        fn correlation_strength_is_always_in_unit_range(
            w_time in 0.0f64..2.0,
            w_conf in 0.0f64..2.0,
            w_adj in 0.0f64..2.0,
            delta_t in -100.0f64..1000.0,
            window in 0.1f64..1000.0,
            mean_conf in -2.0f64..2.0,
            adjacency_bonus in -2.0f64..2.0,
        ) {
            let strength = correlation_strength(w_time, w_conf, w_adj, delta_t, window, mean_conf, adjacency_bonus);
            prop_assert!((0.0..=1.0).contains(&strength));
        }

        /// Raising `blast_radius` alone never *lowers* the derived priority,
        /// all else held fixed (spec §4.5 "Priority derivation" escalates
        /// monotonically with blast radius).
        #[test]
        fn priority_is_monotonic_in_blast_radius(
            role in any_role(),
            join_kind in any_join_kind(),
            severity in any_severity(),
            low in 0usize..50,
            delta in 0usize..50,
        ) {
            let high = low + delta;
            let p_low = priority(role, low, join_kind, severity, 12, 4);
            let p_high = priority(role, high, join_kind, severity, 12, 4);
            prop_assert!(p_high >= p_low);
        }
    }
}
