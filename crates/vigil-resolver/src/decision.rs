//! Final decision stage.

use tracing::debug;
use vigil_core::{GovernanceMode, Role};

use crate::config::ResolverConfig;
use crate::error::ResolverResult;
use crate::stages::{compute_bias, compute_timing, BiasDirection, TimingResolution};
use crate::types::{DecisionMode, FinalAction, ResolvedDecision, ResolverInput};

/// Resolve a full input bundle into a final decision.
///
/// Pure and deterministic: the same input yields bit-identical output.
/// Governance is applied last and AVOID is terminal: nothing after the
/// governance gate may turn an AVOID back into BUY/SELL, and no stage may
/// raise the confidence above the weighted input confidence.
pub fn resolve(input: &ResolverInput, config: &ResolverConfig) -> ResolverResult<ResolvedDecision> {
    input.validate()?;

    let bias = compute_bias(&input.horizons, config, &input.flags, input.divergence_grade);
    let timing = compute_timing(&input.horizons, config, &input.flags, input.divergence_grade);

    let base_confidence = bias.weighted_confidence.clamp(0.0, 1.0);
    let entropy_penalty = input.entropy.min(1.0);
    let final_confidence = (base_confidence * (1.0 - entropy_penalty)).min(base_confidence);

    // HALT pre-empts everything; the explain trail carries it as the sole
    // reason so operators see immediately why nothing else mattered.
    if input.governance.mode == GovernanceMode::Halt {
        return Ok(ResolvedDecision {
            bias,
            timing,
            mode: DecisionMode::Hold,
            action: FinalAction::Avoid,
            size_multiplier: 0.0,
            base_confidence,
            final_confidence: 0.0,
            explain: vec!["governance HALT forces AVOID".to_string()],
        });
    }

    let mut explain = Vec::new();
    explain.push(format!(
        "bias {} score={:.4} dominant={}",
        bias.direction,
        bias.score,
        bias.dominant_horizon
            .map(|h| h.to_string())
            .unwrap_or_else(|| "none".to_string()),
    ));
    explain.push(format!(
        "timing {} score={:.4}",
        timing.action, timing.score
    ));
    for blocker in &timing.blockers {
        explain.push(format!("blocker: {}", blocker));
    }

    let (mode, mut action, driving_strength) = classify(&bias, &timing, config);
    explain.push(format!("mode {} action {}", mode, action));

    let mut size_multiplier = 0.0;
    if matches!(action, FinalAction::Buy | FinalAction::Sell) {
        let tail_penalty = config.tail_penalty(input.tail.mc_p95_dd);
        let governance_cap = match input.governance.mode {
            GovernanceMode::Protection => 0.5,
            _ => 1.0,
        };

        size_multiplier =
            driving_strength * (1.0 - entropy_penalty) * (1.0 - tail_penalty) * governance_cap;
        if mode == DecisionMode::CounterTrend {
            size_multiplier *= config.counter_trend_size_factor;
        }
        for modifier in &input.external_modifiers {
            let factor = modifier.clamped();
            size_multiplier *= factor;
            if modifier.factor > 1.0 {
                explain.push(format!(
                    "modifier {} clamped {:.3} -> 1.000",
                    modifier.name, modifier.factor
                ));
            }
        }
        size_multiplier = size_multiplier.clamp(0.0, 1.0);

        if tail_penalty > 0.0 {
            explain.push(format!(
                "tail penalty {:.1} (mcP95DD={:.3})",
                tail_penalty, input.tail.mc_p95_dd
            ));
        }
        if input.governance.mode == GovernanceMode::Protection {
            explain.push("governance PROTECTION halves size".to_string());
        }

        // FROZEN_ONLY forbids new BUY/SELL unless the caller is the ACTIVE
        // role running exactly the frozen policy.
        if input.governance.mode == GovernanceMode::FrozenOnly {
            let frozen_match = input.role == Role::Active
                && input
                    .governance
                    .frozen_policy_hash
                    .as_deref()
                    .map_or(false, |frozen| frozen == input.policy_hash);
            if frozen_match {
                explain.push("governance FROZEN_ONLY: frozen policy allowed".to_string());
            } else {
                action = FinalAction::Avoid;
                size_multiplier = 0.0;
                explain.push("governance FROZEN_ONLY forces AVOID".to_string());
            }
        }
    }

    debug!(
        action = %action,
        mode = %mode,
        size = size_multiplier,
        confidence = final_confidence,
        "decision resolved"
    );

    Ok(ResolvedDecision {
        bias,
        timing,
        mode,
        action,
        size_multiplier,
        base_confidence,
        final_confidence,
        explain,
    })
}

/// Mode/action classification from bias and timing agreement.
fn classify(
    bias: &crate::stages::BiasResolution,
    timing: &TimingResolution,
    config: &ResolverConfig,
) -> (DecisionMode, FinalAction, f64) {
    let bias_sign = bias.direction.sign();
    let timing_sign = timing.action.sign();

    if bias_sign != 0 && timing_sign == bias_sign {
        let action = if bias.direction == BiasDirection::Bull {
            FinalAction::Buy
        } else {
            FinalAction::Sell
        };
        return (DecisionMode::TrendFollow, action, bias.strength);
    }

    if bias_sign != 0 && timing_sign != 0 && timing_sign != bias_sign {
        let (lo, hi) = if bias.strength <= timing.strength {
            (bias.strength, timing.strength)
        } else {
            (timing.strength, bias.strength)
        };
        let similar = hi > 0.0 && lo / hi >= config.counter_trend_ratio;
        if similar {
            // Counter-trend trades the short-term signal against the
            // structural bias, at reduced size.
            let action = if timing_sign > 0 {
                FinalAction::Buy
            } else {
                FinalAction::Sell
            };
            return (DecisionMode::CounterTrend, action, timing.strength);
        }
    }

    (DecisionMode::Hold, FinalAction::Hold, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        DivergenceGrade, ExternalModifier, GovernanceDirective, HorizonInput, ResolverInput,
        TailStats,
    };
    use vigil_core::Horizon;

    fn horizon(h: Horizon, edge: f64, confidence: f64, reliability: f64) -> HorizonInput {
        HorizonInput {
            horizon: h,
            signed_edge: edge,
            confidence,
            reliability,
            phase_risk: 0.0,
            blockers: Vec::new(),
        }
    }

    fn bullish_input() -> ResolverInput {
        ResolverInput {
            horizons: vec![
                horizon(Horizon::D7, 0.8, 0.9, 0.9),
                horizon(Horizon::D365, 0.6, 0.8, 0.85),
            ],
            entropy: 0.0,
            tail: TailStats::default(),
            flags: Vec::new(),
            divergence_grade: DivergenceGrade::B,
            external_modifiers: Vec::new(),
            governance: GovernanceDirective::normal(),
            role: Role::Active,
            policy_hash: "policy-1".to_string(),
        }
    }

    #[test]
    fn test_trend_follow_buy() {
        let decision = resolve(&bullish_input(), &ResolverConfig::default()).unwrap();
        assert_eq!(decision.mode, DecisionMode::TrendFollow);
        assert_eq!(decision.action, FinalAction::Buy);
        assert!(decision.size_multiplier > 0.0);
    }

    #[test]
    fn test_halt_forces_avoid_with_sole_reason() {
        let mut input = bullish_input();
        input.governance.mode = GovernanceMode::Halt;

        let decision = resolve(&input, &ResolverConfig::default()).unwrap();
        assert_eq!(decision.action, FinalAction::Avoid);
        assert_eq!(decision.size_multiplier, 0.0);
        assert_eq!(decision.explain, vec!["governance HALT forces AVOID".to_string()]);
    }

    #[test]
    fn test_halt_avoid_for_every_input_shape() {
        let config = ResolverConfig::default();
        for edge in [-0.9, -0.2, 0.0, 0.2, 0.9] {
            let mut input = bullish_input();
            input.horizons = vec![horizon(Horizon::D90, edge, 0.9, 0.9)];
            input.governance.mode = GovernanceMode::Halt;
            let decision = resolve(&input, &config).unwrap();
            assert_eq!(decision.action, FinalAction::Avoid);
            assert_eq!(decision.size_multiplier, 0.0);
        }
    }

    #[test]
    fn test_protection_halves_size() {
        let config = ResolverConfig::default();
        let normal = resolve(&bullish_input(), &config).unwrap();

        let mut protected_input = bullish_input();
        protected_input.governance.mode = GovernanceMode::Protection;
        let protected = resolve(&protected_input, &config).unwrap();

        assert_eq!(protected.action, FinalAction::Buy);
        assert!((protected.size_multiplier - normal.size_multiplier * 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_frozen_only_gates_on_policy_hash() {
        let config = ResolverConfig::default();

        let mut frozen_match = bullish_input();
        frozen_match.governance.mode = GovernanceMode::FrozenOnly;
        frozen_match.governance.frozen_policy_hash = Some("policy-1".to_string());
        let allowed = resolve(&frozen_match, &config).unwrap();
        assert_eq!(allowed.action, FinalAction::Buy);

        let mut frozen_mismatch = bullish_input();
        frozen_mismatch.governance.mode = GovernanceMode::FrozenOnly;
        frozen_mismatch.governance.frozen_policy_hash = Some("policy-other".to_string());
        let avoided = resolve(&frozen_mismatch, &config).unwrap();
        assert_eq!(avoided.action, FinalAction::Avoid);
        assert_eq!(avoided.size_multiplier, 0.0);

        let mut frozen_shadow = bullish_input();
        frozen_shadow.governance.mode = GovernanceMode::FrozenOnly;
        frozen_shadow.governance.frozen_policy_hash = Some("policy-1".to_string());
        frozen_shadow.role = Role::Shadow;
        let shadow = resolve(&frozen_shadow, &config).unwrap();
        assert_eq!(shadow.action, FinalAction::Avoid);
    }

    #[test]
    fn test_no_confidence_inflation() {
        let config = ResolverConfig::default();
        for entropy in [0.0, 0.3, 0.7, 1.0] {
            let mut input = bullish_input();
            input.entropy = entropy;
            let decision = resolve(&input, &config).unwrap();
            assert!(decision.final_confidence <= decision.base_confidence + 1e-3);
        }
    }

    #[test]
    fn test_external_modifier_clamped_to_one() {
        let config = ResolverConfig::default();
        let baseline = resolve(&bullish_input(), &config).unwrap();

        let mut inflated = bullish_input();
        inflated.external_modifiers = vec![ExternalModifier {
            name: "macro-boost".to_string(),
            factor: 2.5,
        }];
        let decision = resolve(&inflated, &config).unwrap();
        // Clamped to 1.0: no size inflation vs baseline.
        assert!((decision.size_multiplier - baseline.size_multiplier).abs() < 1e-12);
        assert!(decision
            .explain
            .iter()
            .any(|e| e.contains("macro-boost") && e.contains("clamped")));
    }

    #[test]
    fn test_tail_penalty_reduces_size() {
        let config = ResolverConfig::default();
        let calm = resolve(&bullish_input(), &config).unwrap();

        let mut tail_heavy = bullish_input();
        tail_heavy.tail.mc_p95_dd = 0.45;
        let stressed = resolve(&tail_heavy, &config).unwrap();

        assert!((stressed.size_multiplier - calm.size_multiplier * 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_counter_trend_reduced_size() {
        let config = ResolverConfig::default();
        // Strong bear structure, comparable bull timing. With tier weights
        // 0.2/0.5 renormalized, bias strength lands at 0.5 and timing at
        // 0.5, so the strength ratio is 1.
        let input = ResolverInput {
            horizons: vec![
                horizon(Horizon::D7, 0.5, 1.0, 1.0),
                horizon(Horizon::D365, -0.9, 1.0, 1.0),
            ],
            entropy: 0.0,
            tail: TailStats::default(),
            flags: Vec::new(),
            divergence_grade: DivergenceGrade::B,
            external_modifiers: Vec::new(),
            governance: GovernanceDirective::normal(),
            role: Role::Active,
            policy_hash: "policy-1".to_string(),
        };
        let decision = resolve(&input, &config).unwrap();
        assert_eq!(decision.mode, DecisionMode::CounterTrend);
        assert_eq!(decision.action, FinalAction::Buy);
        assert!(decision.size_multiplier <= decision.timing.strength * 0.5 + 1e-12);
    }

    #[test]
    fn test_disagreement_without_similar_strength_holds() {
        let config = ResolverConfig::default();
        // Strong bear structure, faint bull timing past its threshold but
        // far below the structure strength.
        let input = ResolverInput {
            horizons: vec![
                horizon(Horizon::D7, 0.3, 0.8, 0.8),
                horizon(Horizon::D365, -0.95, 1.0, 1.0),
            ],
            entropy: 0.0,
            tail: TailStats::default(),
            flags: Vec::new(),
            divergence_grade: DivergenceGrade::B,
            external_modifiers: Vec::new(),
            governance: GovernanceDirective::normal(),
            role: Role::Active,
            policy_hash: "policy-1".to_string(),
        };
        let decision = resolve(&input, &config).unwrap();
        assert_eq!(decision.mode, DecisionMode::Hold);
        assert_eq!(decision.action, FinalAction::Hold);
        assert_eq!(decision.size_multiplier, 0.0);
    }

    #[test]
    fn test_determinism_across_runs() {
        let config = ResolverConfig::default();
        let input = bullish_input();
        let first = resolve(&input, &config).unwrap();
        for _ in 0..10 {
            let again = resolve(&input, &config).unwrap();
            assert_eq!(first, again);
            // Serialized form is bit-identical too.
            assert_eq!(
                serde_json::to_string(&first).unwrap(),
                serde_json::to_string(&again).unwrap()
            );
        }
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let config = ResolverConfig::default();

        let mut empty = bullish_input();
        empty.horizons.clear();
        assert!(resolve(&empty, &config).is_err());

        let mut out_of_bounds = bullish_input();
        out_of_bounds.horizons[0].signed_edge = 1.5;
        assert!(resolve(&out_of_bounds, &config).is_err());

        let mut duplicate = bullish_input();
        let dup = duplicate.horizons[0].clone();
        duplicate.horizons.push(dup);
        assert!(resolve(&duplicate, &config).is_err());
    }
}
