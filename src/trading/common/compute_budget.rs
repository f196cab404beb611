use crate::constants::COMPUTE_BUDGET_PROGRAM;
use solana_compute_budget_interface::ComputeBudgetInstruction;
use solana_sdk::instruction::Instruction;

/// `[SetComputeUnitLimit, SetComputeUnitPrice]`, placed before any business instruction.
///
/// A zero price skips the price directive.
pub fn compute_budget_instructions(unit_price: u64, unit_limit: u32) -> Vec<Instruction> {
    let mut instructions = Vec::with_capacity(2);
    instructions.push(ComputeBudgetInstruction::set_compute_unit_limit(unit_limit));
    if unit_price > 0 {
        instructions.push(ComputeBudgetInstruction::set_compute_unit_price(unit_price));
    }
    instructions
}

/// Drop compute budget directives from an externally built instruction list.
pub fn strip_compute_budget(instructions: Vec<Instruction>) -> Vec<Instruction> {
    instructions.into_iter().filter(|ix| !is_compute_budget(ix)).collect()
}

#[inline]
pub fn is_compute_budget(ix: &Instruction) -> bool {
    ix.program_id == COMPUTE_BUDGET_PROGRAM
}
