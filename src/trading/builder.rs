//! 原生路由指令构建
//!
//! 指令顺序固定：
//! 1. compute budget（limit 按 venue CPI 深度，price 来自配置）
//! 2. `create_swap_plan`（plan 缺失 / 过期 / 条款不一致时）
//! 3. 输出 token 的 ATA（幂等创建，可关闭）
//! 4. 路由合约 `swap_direct` / `swap_external`，内层是 venue 的原始 swap 指令

use crate::common::{ChainClient, RouterConfig, RouterError, RouterResult, Venue};
use crate::instruction::SwapInstructionBuilder;
use crate::instruction::router::{create_swap_plan, swap_direct, swap_external};
use crate::instruction::utils::router::{PlanTerms, get_swap_plan_pda, swap_plan_decode};
use crate::instruction::utils::spl_token::create_associated_token_account_idempotent;
use crate::resolver::DexAccounts;
use crate::trading::common::compute_budget::compute_budget_instructions;
use crate::trading::slippage::min_out;
use solana_sdk::{instruction::Instruction, pubkey::Pubkey};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Extra units reserved when the plan account is created in the same transaction.
pub const PLAN_CREATION_UNITS: u32 = 25_000;

/// Units for a router-wrapped external aggregator route.
pub const EXTERNAL_CPI_UNITS: u32 = 600_000;

#[derive(Debug, Clone)]
pub struct BuilderConfig {
    pub router_program: Pubkey,
    pub compute_unit_price: u64,
    pub compute_unit_limit: Option<u32>,
    pub plan_ttl: Duration,
    pub create_plan_if_missing: bool,
    pub create_output_ata: bool,
}

impl From<&RouterConfig> for BuilderConfig {
    fn from(config: &RouterConfig) -> Self {
        Self {
            router_program: config.router_program_id,
            compute_unit_price: config.compute_unit_price,
            compute_unit_limit: config.compute_unit_limit,
            plan_ttl: config.plan_ttl,
            create_plan_if_missing: config.create_plan_if_missing,
            create_output_ata: config.create_output_ata,
        }
    }
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self::from(&RouterConfig::default())
    }
}

/// Amounts for one exact-in swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapParams {
    pub amount_in: u64,
    pub expected_out: u64,
    /// Current slippage bound, usually `SlippageEstimate::total_bps`.
    pub slippage_bps: u64,
}

impl SwapParams {
    pub fn new(amount_in: u64, expected_out: u64, slippage_bps: u64) -> Self {
        Self { amount_in, expected_out, slippage_bps }
    }

    pub fn min_out(&self) -> RouterResult<u64> {
        min_out(self.expected_out, self.slippage_bps)
    }
}

/// Instructions plus what went into them.
#[derive(Debug, Clone)]
pub struct BuiltSwap {
    pub instructions: Vec<Instruction>,
    pub min_out: u64,
    pub swap_plan: Pubkey,
    pub plan_created: bool,
    pub compute_unit_limit: u32,
}

pub struct NativeSwapInstructionBuilder {
    client: Arc<dyn ChainClient>,
    config: BuilderConfig,
}

impl NativeSwapInstructionBuilder {
    pub fn new(client: Arc<dyn ChainClient>, config: BuilderConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Full native instruction list for `route`.
    pub async fn build(&self, user: &Pubkey, route: &DexAccounts, params: &SwapParams) -> RouterResult<Vec<Instruction>> {
        Ok(self.prepare(user, route, params, chrono::Utc::now().timestamp()).await?.instructions)
    }

    pub async fn prepare(
        &self,
        user: &Pubkey,
        route: &DexAccounts,
        params: &SwapParams,
        now: i64,
    ) -> RouterResult<BuiltSwap> {
        let venue = route.venue();
        if !venue.is_native() {
            return Err(RouterError::VenueUnsupported(venue.to_string()));
        }
        let meta = route.meta();
        if meta.user != *user {
            return Err(RouterError::AccountResolutionFailed(format!(
                "accounts resolved for {} used by {}",
                meta.user, user
            )));
        }
        let min_out = params.min_out()?;
        let terms = PlanTerms {
            user: *user,
            input_mint: meta.input_mint,
            output_mint: meta.output_mint,
            amount: params.amount_in,
            min_out,
            venue: venue.id(),
        };
        let venue_ix = route.build_swap_instruction(params.amount_in, min_out);

        let mut body = Vec::with_capacity(3);
        let (swap_plan, plan_ix) = self.plan_instruction(&terms, now).await?;
        let plan_created = plan_ix.is_some();
        body.extend(plan_ix);
        if self.config.create_output_ata {
            body.push(create_associated_token_account_idempotent(
                user,
                user,
                &meta.output_mint,
                &meta.output_token_program,
            ));
        }
        body.push(swap_direct(
            &self.config.router_program,
            user,
            &swap_plan,
            venue.id(),
            params.amount_in,
            min_out,
            &venue_ix,
        ));

        let unit_limit = self.unit_limit(venue.compute_unit_limit(), plan_created);
        let mut instructions = compute_budget_instructions(self.config.compute_unit_price, unit_limit);
        instructions.extend(body);

        debug!(venue = %venue, pool = %meta.pool, min_out, plan_created, unit_limit, "native swap built");
        Ok(BuiltSwap { instructions, min_out, swap_plan, plan_created, compute_unit_limit: unit_limit })
    }

    /// Wrap an externally sourced swap instruction in the router's `swap_external`.
    ///
    /// `setup` (ATA creation, SOL wrapping) runs after the plan and before the swap.
    pub async fn build_external_cpi(
        &self,
        user: &Pubkey,
        input_mint: &Pubkey,
        output_mint: &Pubkey,
        external_ix: &Instruction,
        setup: &[Instruction],
        params: &SwapParams,
    ) -> RouterResult<BuiltSwap> {
        self.prepare_external(user, input_mint, output_mint, external_ix, setup, params, chrono::Utc::now().timestamp())
            .await
    }

    pub async fn prepare_external(
        &self,
        user: &Pubkey,
        input_mint: &Pubkey,
        output_mint: &Pubkey,
        external_ix: &Instruction,
        setup: &[Instruction],
        params: &SwapParams,
        now: i64,
    ) -> RouterResult<BuiltSwap> {
        let min_out = params.min_out()?;
        let terms = PlanTerms {
            user: *user,
            input_mint: *input_mint,
            output_mint: *output_mint,
            amount: params.amount_in,
            min_out,
            venue: Venue::Jupiter.id(),
        };

        let (swap_plan, plan_ix) = self.plan_instruction(&terms, now).await?;
        let plan_created = plan_ix.is_some();
        let unit_limit = self.unit_limit(EXTERNAL_CPI_UNITS, plan_created);

        let mut instructions = compute_budget_instructions(self.config.compute_unit_price, unit_limit);
        instructions.extend(plan_ix);
        instructions.extend(setup.iter().cloned());
        instructions.push(swap_external(
            &self.config.router_program,
            user,
            &swap_plan,
            params.amount_in,
            min_out,
            external_ix,
        ));
        Ok(BuiltSwap { instructions, min_out, swap_plan, plan_created, compute_unit_limit: unit_limit })
    }

    fn unit_limit(&self, venue_units: u32, plan_created: bool) -> u32 {
        match self.config.compute_unit_limit {
            Some(limit) => limit,
            None if plan_created => venue_units.saturating_add(PLAN_CREATION_UNITS),
            None => venue_units,
        }
    }

    /// Reuse a live plan with identical terms, otherwise (re)create it.
    async fn plan_instruction(&self, terms: &PlanTerms, now: i64) -> RouterResult<(Pubkey, Option<Instruction>)> {
        let (swap_plan, _) = get_swap_plan_pda(&terms.user, &self.config.router_program).ok_or_else(|| {
            RouterError::AccountResolutionFailed(format!("no swap plan address for {}", terms.user))
        })?;

        let existing = self
            .client
            .get_account(&swap_plan)
            .await?
            .filter(|account| account.owner == self.config.router_program)
            .and_then(|account| swap_plan_decode(&account.data));
        if existing.as_ref().is_some_and(|plan| plan.matches(terms, now)) {
            return Ok((swap_plan, None));
        }
        if !self.config.create_plan_if_missing {
            return Err(RouterError::PlanMissingOrExpired);
        }
        let expires_at = now.saturating_add(self.config.plan_ttl.as_secs() as i64);
        Ok((swap_plan, Some(create_swap_plan(&self.config.router_program, &swap_plan, terms, expires_at))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::mock_rpc::{MockChainClient, fixtures};
    use crate::constants::{ASSOCIATED_TOKEN_PROGRAM, COMPUTE_BUDGET_PROGRAM};
    use crate::instruction::utils::router::{accounts::ROUTER_PROGRAM, swap_direct_discriminator};
    use crate::resolver::{DexAccountResolver, PoolRegistry, ResolverConfig};

    const NOW: i64 = 1_700_000_000;

    async fn resolved(mock: &Arc<MockChainClient>, user: &Pubkey) -> DexAccounts {
        let (sol, usdc) = (Pubkey::new_unique(), Pubkey::new_unique());
        fixtures::seed_pool(mock, Venue::RaydiumCpmm, sol, usdc, (1_000_000_000_000, 150_000_000_000));
        let resolver = DexAccountResolver::with_registry(mock.clone(), Arc::new(PoolRegistry::new()), ResolverConfig::default());
        resolver.resolve(Venue::RaydiumCpmm, &sol, &usdc, user).await.unwrap()
    }

    #[tokio::test]
    async fn test_instruction_order_with_new_plan() {
        let mock = Arc::new(MockChainClient::new());
        let user = Pubkey::new_unique();
        let route = resolved(&mock, &user).await;
        let builder = NativeSwapInstructionBuilder::new(mock.clone(), BuilderConfig::default());

        let built = builder.prepare(&user, &route, &SwapParams::new(1_000_000_000, 150_000_000, 50), NOW).await.unwrap();
        assert_eq!(built.min_out, 149_250_000);
        assert!(built.plan_created);
        assert_eq!(built.compute_unit_limit, Venue::RaydiumCpmm.compute_unit_limit() + PLAN_CREATION_UNITS);

        let programs: Vec<Pubkey> = built.instructions.iter().map(|ix| ix.program_id).collect();
        assert_eq!(
            programs,
            vec![COMPUTE_BUDGET_PROGRAM, COMPUTE_BUDGET_PROGRAM, ROUTER_PROGRAM, ASSOCIATED_TOKEN_PROGRAM, ROUTER_PROGRAM]
        );
        let swap = built.instructions.last().unwrap();
        assert_eq!(&swap.data[..8], &swap_direct_discriminator());
        assert_eq!(swap.data[8], Venue::RaydiumCpmm.id());
        assert_eq!(&swap.data[17..25], &149_250_000u64.to_le_bytes());
        assert_eq!(swap.accounts[2].pubkey, Venue::RaydiumCpmm.program_id().unwrap());
        assert_eq!(&swap.accounts[3..], &route.to_account_metas()[..]);
        assert_eq!(mock.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_matching_plan_is_reused() {
        let mock = Arc::new(MockChainClient::new());
        let user = Pubkey::new_unique();
        let route = resolved(&mock, &user).await;
        let meta = route.meta().clone();
        let terms = PlanTerms {
            user,
            input_mint: meta.input_mint,
            output_mint: meta.output_mint,
            amount: 1_000_000_000,
            min_out: 149_250_000,
            venue: Venue::RaydiumCpmm.id(),
        };
        let (plan, _) = get_swap_plan_pda(&user, &ROUTER_PROGRAM).unwrap();
        mock.set_account(plan, ROUTER_PROGRAM, fixtures::swap_plan_data(&terms, NOW + 60));

        let config = BuilderConfig { create_output_ata: false, ..BuilderConfig::default() };
        let builder = NativeSwapInstructionBuilder::new(mock.clone(), config);
        let params = SwapParams::new(1_000_000_000, 150_000_000, 50);

        let built = builder.prepare(&user, &route, &params, NOW).await.unwrap();
        assert!(!built.plan_created);
        assert_eq!(built.instructions.len(), 3);

        // expired: recreated
        let built = builder.prepare(&user, &route, &params, NOW + 60).await.unwrap();
        assert!(built.plan_created);
    }

    #[tokio::test]
    async fn test_plan_creation_disabled() {
        let mock = Arc::new(MockChainClient::new());
        let user = Pubkey::new_unique();
        let route = resolved(&mock, &user).await;
        let config = BuilderConfig { create_plan_if_missing: false, ..BuilderConfig::default() };
        let builder = NativeSwapInstructionBuilder::new(mock.clone(), config);

        let err = builder.prepare(&user, &route, &SwapParams::new(1, 100, 50), NOW).await.unwrap_err();
        assert_eq!(err, RouterError::PlanMissingOrExpired);
    }

    #[tokio::test]
    async fn test_zero_expected_output_rejected() {
        let mock = Arc::new(MockChainClient::new());
        let user = Pubkey::new_unique();
        let route = resolved(&mock, &user).await;
        let builder = NativeSwapInstructionBuilder::new(mock.clone(), BuilderConfig::default());
        let err = builder.prepare(&user, &route, &SwapParams::new(1, 0, 50), NOW).await.unwrap_err();
        assert!(matches!(err, RouterError::StaleOrInvalidQuote(_)));
    }

    #[tokio::test]
    async fn test_external_cpi_wraps_instruction() {
        let mock = Arc::new(MockChainClient::new());
        let user = Pubkey::new_unique();
        let builder = NativeSwapInstructionBuilder::new(
            mock.clone(),
            BuilderConfig { compute_unit_limit: Some(900_000), ..BuilderConfig::default() },
        );
        let external = Instruction::new_with_bytes(Pubkey::new_unique(), &[7; 12], vec![]);
        let setup = Instruction::new_with_bytes(Pubkey::new_unique(), &[1], vec![]);
        let built = builder
            .prepare_external(
                &user,
                &Pubkey::new_unique(),
                &Pubkey::new_unique(),
                &external,
                std::slice::from_ref(&setup),
                &SwapParams::new(10, 1_000, 100),
                NOW,
            )
            .await
            .unwrap();
        assert_eq!(built.compute_unit_limit, 900_000);
        assert_eq!(built.min_out, 990);
        assert_eq!(built.instructions[3], setup);
        let wrapped = built.instructions.last().unwrap();
        assert_eq!(wrapped.accounts[2].pubkey, external.program_id);
        assert!(wrapped.data.ends_with(&[7; 12]));
    }
}
