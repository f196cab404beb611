use native_swap_router::common::{RouterError, Venue};
use native_swap_router::quote::VenueQuote;
use native_swap_router::trading::slippage::{min_out, pair_key};
use native_swap_router::trading::{
    DynamicSlippageEstimator, OracleContext, RouteEligibilityInput, RouteMode, RouteReason, SafetyConfig,
    SlippageConfig, check_quote_safety, decide,
};
use solana_sdk::pubkey::Pubkey;
use std::time::Duration;

fn eligible() -> RouteEligibilityInput {
    RouteEligibilityInput {
        has_provider: true,
        is_fallback_route: false,
        has_input_token: true,
        has_output_token: true,
        has_dex_plan: true,
        quote_out_amount: 149_000_000,
    }
}

#[test]
fn test_sol_to_usdc_min_out() {
    // 150 USDC expected, 50 bps
    assert_eq!(min_out(150_000_000, 50).unwrap(), 149_250_000);

    let estimator = DynamicSlippageEstimator::new(SlippageConfig::default());
    let estimate = estimator.estimate(&pair_key(&Pubkey::new_unique(), &Pubkey::new_unique()), 0.01);
    assert_eq!(estimate.total_bps, 50);
    assert_eq!(estimate.min_out(150_000_000).unwrap(), 149_250_000);
}

#[test]
fn test_min_out_bounds() {
    for (expected, bps) in [(1u64, 50u64), (1_000, 0), (1_000, 10_000), (u64::MAX, 1), (7, 9_999), (10, 20_000)] {
        let out = min_out(expected, bps).unwrap();
        assert!(out >= 1 && out <= expected, "min_out({}, {}) = {}", expected, bps, out);
    }
    assert!(matches!(min_out(0, 50), Err(RouterError::StaleOrInvalidQuote(_))));
}

#[test]
fn test_decision_order() {
    let all_bad = RouteEligibilityInput::default();
    assert_eq!(decide(&all_bad).reason, RouteReason::MissingProvider);

    let cases = [
        (RouteEligibilityInput { is_fallback_route: true, has_input_token: false, ..eligible() }, RouteReason::FallbackRoute),
        (RouteEligibilityInput { has_output_token: false, has_dex_plan: false, ..eligible() }, RouteReason::TokensMissing),
        (RouteEligibilityInput { has_dex_plan: false, quote_out_amount: 0, ..eligible() }, RouteReason::NoDexPlan),
        (RouteEligibilityInput { quote_out_amount: 0, ..eligible() }, RouteReason::InvalidQuote),
        (eligible(), RouteReason::ProviderEligible),
    ];
    for (input, reason) in cases {
        let decision = decide(&input);
        assert_eq!(decision.reason, reason);
        assert_eq!(decision.mode, reason.mode());
        // no hidden state
        assert_eq!(decide(&input), decision);
    }
}

#[test]
fn test_reason_modes() {
    assert_eq!(RouteReason::MissingProvider.mode(), RouteMode::RouterCpiFallback);
    assert_eq!(RouteReason::FallbackRoute.mode(), RouteMode::RouterCpiFallback);
    assert_eq!(RouteReason::NoDexPlan.mode(), RouteMode::RouterCpiFallback);
    assert_eq!(RouteReason::TokensMissing.mode(), RouteMode::ExternalDirectFallback);
    assert_eq!(RouteReason::InvalidQuote.mode(), RouteMode::ExternalDirectFallback);
    assert_eq!(RouteReason::ProviderEligible.mode(), RouteMode::Native);
    assert_eq!(RouteReason::NoDexPlan.to_string(), "no-dex-plan");
}

#[test]
fn test_quote_safety_against_benchmark_and_oracle() {
    let config = SafetyConfig::default();
    let sol_usdc = OracleContext {
        input_price: Some(150.0),
        output_price: Some(1.0),
        input_decimals: 9,
        output_decimals: 6,
    };
    let quote = VenueQuote::native(Venue::RaydiumCpmm, 149_700_000, 12);

    let safety = check_quote_safety(&quote, 1_000_000_000, Some(&VenueQuote::benchmark(150_000_000, 10)), &sol_usdc, &config)
        .unwrap();
    assert!(safety.competitive);
    assert_eq!(safety.score_bps, Some(9_980));
    assert_eq!(safety.divergence_bps, Some(20));

    // loses to the benchmark by more than 50 bps
    let weak = VenueQuote::native(Venue::RaydiumCpmm, 148_000_000, 12);
    let safety =
        check_quote_safety(&weak, 1_000_000_000, Some(&VenueQuote::benchmark(150_000_000, 10)), &sol_usdc, &config)
            .unwrap();
    assert!(!safety.competitive);

    // 10% off the oracle
    let off = VenueQuote::native(Venue::RaydiumCpmm, 135_000_000, 12);
    let err = check_quote_safety(&off, 1_000_000_000, None, &sol_usdc, &config).unwrap_err();
    assert_eq!(err, RouterError::OracleDivergenceExceeded { divergence_bps: 1_000, max_bps: 300 });

    // no oracle, no benchmark: nothing to compare against
    let safety = check_quote_safety(&off, 1_000_000_000, None, &OracleContext::default(), &config).unwrap();
    assert!(safety.competitive);
    assert_eq!(safety.divergence_bps, None);
}

#[tokio::test(start_paused = true)]
async fn test_stale_quote_rejected() {
    let quote = VenueQuote::native(Venue::OrcaWhirlpool, 1_000, 1);
    tokio::time::advance(Duration::from_secs(31)).await;
    let err = check_quote_safety(&quote, 10, None, &OracleContext::default(), &SafetyConfig::default()).unwrap_err();
    assert!(matches!(err, RouterError::StaleOrInvalidQuote(_)));
}

#[test]
fn test_ema_raises_estimate_for_the_pair_only() {
    let estimator = DynamicSlippageEstimator::new(SlippageConfig::default());
    let (sol, usdc, bonk) = (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());

    estimator.observe(&pair_key(&sol, &usdc), 40.0, 2_000.0);
    let hot = estimator.estimate(&pair_key(&usdc, &sol), 0.0);
    // 50 base + 40 volatility + 10 latency
    assert_eq!(hot.total_bps, 100);
    assert_eq!(hot.ema.unwrap().samples, 1);

    let cold = estimator.estimate(&pair_key(&sol, &bonk), 0.0);
    assert_eq!(cold.total_bps, 50);
    assert!(cold.ema.is_none());
}
