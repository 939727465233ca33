use anyhow::{Result, bail};
use dual_deposit::{
    binding::correct_to_ratio,
    config::AppConfig,
    deposit::DepositOrchestrator,
    errors::AppError,
    models::{DepositMode, DepositRequest, Side},
    ratio::{FixedRatioSource, RatioCache},
    settlement::SimulatedSettlement,
    utils::{self, format_token_amount, parse_token_input},
    wallet::StaticBalanceSource,
};
use num_traits::Zero;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    utils::init_logging();

    let cfg = AppConfig::load()?;
    tracing::info!(
        pair = %cfg.pair,
        wallet = %cfg.wallet_address,
        max_deviation_pct = %cfg.max_deviation_pct,
        "[INIT] dual-deposit starting"
    );

    let cache = Arc::new(
        RatioCache::start(
            Arc::new(FixedRatioSource::default()),
            cfg.pair.clone(),
            cfg.ratio_cache,
        )
        .await?,
    );
    let pair = cfg.pair.clone();
    cache.subscribe(move |ratio| {
        tracing::info!(pair = %pair, ratio = %ratio, "[RATIO] ratio refreshed");
    });

    let orchestrator = DepositOrchestrator::new(
        cache.clone(),
        Arc::new(StaticBalanceSource::default()),
        Arc::new(SimulatedSettlement::new(cfg.settlement_delay)),
        cfg.deposit_config(),
    );

    let default_mode = orchestrator.default_mode_for(&cfg.wallet_address).await?;
    tracing::info!(mode = ?default_mode, "[INIT] default deposit mode");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let requests = match args.as_slice() {
        [] => vec![
            ("fits ratio", demo_request(&cfg, "100", "50")),
            ("excess B", demo_request(&cfg, "80", "60")),
            ("over balance", demo_request(&cfg, "300", "200")),
        ],
        [a, b] => vec![("cli", request_from_args(&cfg, a, b, default_mode)?)],
        [a, b, mode] => {
            let mode = match mode.to_ascii_lowercase().as_str() {
                "dual" => DepositMode::Dual,
                "single" => DepositMode::Single,
                other => bail!("unknown deposit mode {other:?}, expected dual or single"),
            };
            vec![("cli", request_from_args(&cfg, a, b, mode)?)]
        }
        _ => bail!("usage: dual-deposit [amountA amountB [dual|single]]"),
    };

    if let Ok(ratio) = cache.snapshot() {
        for (label, request) in &requests {
            if request.mode == DepositMode::Dual {
                let (a, b) = correct_to_ratio(&request.token_a, Side::A, &ratio);
                tracing::info!(
                    scenario = label,
                    token_a = %format_token_amount(&a, 6),
                    token_b = %format_token_amount(&b, 6),
                    "[DEPOSIT] ratio-matched pair for token A input"
                );
            }
        }
    }

    let runs = requests.iter().map(|(label, request)| {
        let orchestrator = &orchestrator;
        async move { (*label, orchestrator.process(request).await) }
    });
    for (label, outcome) in futures::future::join_all(runs).await {
        match outcome {
            Ok(result) => tracing::info!(
                scenario = label,
                shares = %format_token_amount(&result.shares_issued, 4),
                result = %serde_json::to_string(&result)?,
                "[DEPOSIT] completed"
            ),
            Err(AppError::ValidationFailed(binding)) => tracing::warn!(
                scenario = label,
                binding = %serde_json::to_string(&binding)?,
                "[DEPOSIT] not accepted"
            ),
            Err(e) => tracing::warn!(scenario = label, error = %e, "[DEPOSIT] failed"),
        }
    }

    cache.shutdown().await;
    Ok(())
}

fn demo_request(cfg: &AppConfig, a: &str, b: &str) -> DepositRequest {
    DepositRequest::dual(
        cfg.wallet_address.clone(),
        parse_token_input(a),
        parse_token_input(b),
    )
}

fn request_from_args(
    cfg: &AppConfig,
    a: &str,
    b: &str,
    mode: DepositMode,
) -> Result<DepositRequest> {
    let (token_a, token_b) = (parse_token_input(a), parse_token_input(b));
    Ok(match mode {
        DepositMode::Dual => DepositRequest::dual(cfg.wallet_address.clone(), token_a, token_b),
        DepositMode::Single => {
            if !token_a.is_zero() && !token_b.is_zero() {
                bail!("single mode takes one non-zero amount");
            }
            let (side, amount) = if token_b.is_zero() {
                (Side::A, token_a)
            } else {
                (Side::B, token_b)
            };
            DepositRequest::single(cfg.wallet_address.clone(), side, amount)
        }
    })
}
