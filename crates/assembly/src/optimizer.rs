//! The token-budget optimizer — a 0/1 knapsack over candidate sections.
//!
//! Maximizes total `relevance · importance` value subject to total token
//! cost ≤ budget. Budgets up to the configured threshold use an exact
//! dynamic-programming solution (`candidates × budget`); larger budgets
//! use greedy selection by descending efficiency, which is monotonic in
//! efficiency order but not globally optimal.
//!
//! Two post-passes run after the optimizer:
//! 1. **Compression rescue** — sections that did not fit are retried in
//!    their compressed variant before being dropped.
//! 2. **Essential guarantee** — any `essential` section the optimizer
//!    excluded is forced in, shrinking lower-priority included sections
//!    (compress first, then drop) until it fits.

use tracing::debug;

use promptforge_core::error::TerminalFailure;
use promptforge_core::section::ContextSection;

/// Fixed-point scale for knapsack values.
const VALUE_SCALE: f32 = 10_000.0;

/// The three budget terms. The usable budget is
/// `max_prompt_tokens − template_overhead − reserved_response_tokens`.
#[derive(Debug, Clone, Copy)]
pub struct TokenBudget {
    pub max_prompt_tokens: usize,
    pub template_overhead: usize,
    pub reserved_response_tokens: usize,
}

impl TokenBudget {
    /// Tokens available for context sections.
    pub fn available(&self) -> Result<usize, TerminalFailure> {
        self.max_prompt_tokens
            .checked_sub(self.template_overhead)
            .and_then(|b| b.checked_sub(self.reserved_response_tokens))
            .ok_or_else(|| TerminalFailure::AssemblyFailure {
                reason: format!(
                    "negative budget: max {} - template {} - reserved {}",
                    self.max_prompt_tokens, self.template_overhead, self.reserved_response_tokens
                ),
            })
    }
}

/// A section the optimizer selected, possibly in compressed form.
#[derive(Debug, Clone)]
pub struct SelectedSection {
    pub section: ContextSection,
    pub compressed: bool,
}

impl SelectedSection {
    /// The text that will reach the prompt.
    pub fn text(&self) -> &str {
        match (&self.section.compressed, self.compressed) {
            (Some(c), true) => &c.text,
            _ => &self.section.text,
        }
    }

    /// The token cost of the chosen rendering.
    pub fn cost(&self) -> usize {
        match (&self.section.compressed, self.compressed) {
            (Some(c), true) => c.token_cost,
            _ => self.section.token_cost,
        }
    }
}

/// The optimizer's output.
#[derive(Debug, Clone)]
pub struct AssemblyResult {
    /// Selected sections in candidate order.
    pub sections: Vec<SelectedSection>,
    pub total_tokens: usize,
    pub budget_tokens: usize,
    /// `total_tokens / budget_tokens`, zero for a zero budget.
    pub utilization: f32,
    /// Sum of `relevance · importance` over selected sections.
    pub achieved_value: f32,
    /// Whether the exact DP path ran (as opposed to greedy).
    pub exact: bool,
}

/// The Context Assembly Engine. Stateless; CPU-bound; runs synchronously
/// within one request.
pub struct ContextAssemblyEngine {
    dp_budget_threshold: usize,
}

impl ContextAssemblyEngine {
    pub fn new(dp_budget_threshold: usize) -> Self {
        Self { dp_budget_threshold }
    }

    /// Solve the selection problem for one request.
    ///
    /// Errors are terminal: `BudgetInfeasible` when even the compressed
    /// essential set cannot fit, `AssemblyFailure` for a negative budget.
    pub fn select(
        &self,
        candidates: &[ContextSection],
        budget: &TokenBudget,
    ) -> Result<AssemblyResult, TerminalFailure> {
        let budget_tokens = budget.available()?;

        let essential_floor: usize = candidates
            .iter()
            .filter(|s| s.essential)
            .map(|s| s.min_token_cost())
            .sum();
        if essential_floor > budget_tokens {
            return Err(TerminalFailure::BudgetInfeasible {
                required_tokens: essential_floor,
                budget_tokens,
            });
        }

        let exact = budget_tokens <= self.dp_budget_threshold;
        let mut chosen: Vec<SelectedSection> = if exact {
            knapsack_exact(candidates, budget_tokens)
        } else {
            knapsack_greedy(candidates, budget_tokens)
        }
        .into_iter()
        .map(|idx| SelectedSection {
            section: candidates[idx].clone(),
            compressed: false,
        })
        .collect();

        rescue_compressed(candidates, &mut chosen, budget_tokens);
        ensure_essentials(candidates, &mut chosen, budget_tokens)?;

        chosen.sort_by(|a, b| {
            position(candidates, &a.section.id).cmp(&position(candidates, &b.section.id))
        });

        let total_tokens: usize = chosen.iter().map(SelectedSection::cost).sum();
        debug_assert!(total_tokens <= budget_tokens);
        let achieved_value = chosen
            .iter()
            .map(|s| s.section.relevance * s.section.importance)
            .sum();
        let utilization = if budget_tokens == 0 {
            0.0
        } else {
            total_tokens as f32 / budget_tokens as f32
        };

        debug!(
            candidates = candidates.len(),
            selected = chosen.len(),
            total_tokens,
            budget_tokens,
            exact,
            "section selection complete"
        );

        Ok(AssemblyResult {
            sections: chosen,
            total_tokens,
            budget_tokens,
            utilization,
            achieved_value,
            exact,
        })
    }
}

fn position(candidates: &[ContextSection], id: &str) -> usize {
    candidates
        .iter()
        .position(|c| c.id == id)
        .expect("selected section comes from candidates")
}

/// Exact 0/1 knapsack by dynamic programming over uncompressed costs.
/// Complexity `candidates × budget` in time and space.
fn knapsack_exact(candidates: &[ContextSection], budget: usize) -> Vec<usize> {
    let n = candidates.len();
    if n == 0 || budget == 0 {
        return Vec::new();
    }

    let values: Vec<u64> = candidates
        .iter()
        .map(|s| (s.relevance * s.importance * VALUE_SCALE).round().max(0.0) as u64)
        .collect();

    let mut best = vec![0_u64; budget + 1];
    let mut take = vec![vec![false; budget + 1]; n];

    for (i, section) in candidates.iter().enumerate() {
        let cost = section.token_cost;
        if cost > budget {
            continue;
        }
        // Iterate weights downwards so each item is used at most once.
        for w in (cost..=budget).rev() {
            let candidate_value = best[w - cost] + values[i];
            if candidate_value > best[w] {
                best[w] = candidate_value;
                take[i][w] = true;
            }
        }
    }

    // Reconstruct the chosen set.
    let mut selected = Vec::new();
    let mut w = budget;
    for i in (0..n).rev() {
        if take[i][w] {
            selected.push(i);
            w -= candidates[i].token_cost;
        }
    }
    selected.reverse();
    selected
}

/// Greedy selection by descending efficiency. Ties break on candidate
/// order, so the result is deterministic.
fn knapsack_greedy(candidates: &[ContextSection], budget: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| {
        candidates[b]
            .efficiency()
            .total_cmp(&candidates[a].efficiency())
            .then(a.cmp(&b))
    });

    let mut used = 0;
    let mut selected = Vec::new();
    for idx in order {
        let cost = candidates[idx].token_cost;
        if used + cost <= budget {
            used += cost;
            selected.push(idx);
        }
    }
    selected.sort_unstable();
    selected
}

/// Retry dropped sections in compressed form, best efficiency first.
fn rescue_compressed(
    candidates: &[ContextSection],
    chosen: &mut Vec<SelectedSection>,
    budget: usize,
) {
    let mut used: usize = chosen.iter().map(SelectedSection::cost).sum();
    let mut dropped: Vec<usize> = (0..candidates.len())
        .filter(|i| !chosen.iter().any(|s| s.section.id == candidates[*i].id))
        .collect();
    dropped.sort_by(|&a, &b| {
        candidates[b]
            .efficiency()
            .total_cmp(&candidates[a].efficiency())
            .then(a.cmp(&b))
    });

    for idx in dropped {
        if let Some(compressed) = &candidates[idx].compressed {
            if used + compressed.token_cost <= budget {
                used += compressed.token_cost;
                chosen.push(SelectedSection {
                    section: candidates[idx].clone(),
                    compressed: true,
                });
            }
        }
    }
}

/// Force in every essential section the optimizer excluded, compressing
/// and then dropping the lowest-efficiency non-essential inclusions until
/// it fits. Guaranteed to succeed because the compressed essential floor
/// was checked against the budget up front.
fn ensure_essentials(
    candidates: &[ContextSection],
    chosen: &mut Vec<SelectedSection>,
    budget: usize,
) -> Result<(), TerminalFailure> {
    for (idx, section) in candidates.iter().enumerate() {
        if !section.essential || chosen.iter().any(|s| s.section.id == section.id) {
            continue;
        }

        loop {
            let used: usize = chosen.iter().map(SelectedSection::cost).sum();
            if used + section.token_cost <= budget {
                chosen.push(SelectedSection {
                    section: candidates[idx].clone(),
                    compressed: false,
                });
                break;
            }
            if let Some(c) = &section.compressed {
                if used + c.token_cost <= budget {
                    chosen.push(SelectedSection {
                        section: candidates[idx].clone(),
                        compressed: true,
                    });
                    break;
                }
            }

            // Shrink the allowance of lower-priority inclusions.
            let victim = chosen
                .iter()
                .enumerate()
                .filter(|(_, s)| !s.section.essential)
                .min_by(|(_, a), (_, b)| {
                    a.section.efficiency().total_cmp(&b.section.efficiency())
                })
                .map(|(i, _)| i);
            match victim {
                Some(i) if !chosen[i].compressed && chosen[i].section.compressed.is_some() => {
                    chosen[i].compressed = true;
                }
                Some(i) => {
                    chosen.remove(i);
                }
                None => {
                    // Every inclusion is essential and this one still
                    // cannot fit — the up-front floor check failed us.
                    return Err(TerminalFailure::BudgetInfeasible {
                        required_tokens: chosen
                            .iter()
                            .map(SelectedSection::cost)
                            .sum::<usize>()
                            + section.min_token_cost(),
                        budget_tokens: budget,
                    });
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptforge_core::section::{CompressedVariant, SectionKind};

    fn section(id: &str, relevance: f32, importance: f32, cost: usize) -> ContextSection {
        ContextSection {
            id: id.into(),
            kind: SectionKind::TableSummary,
            source_table: None,
            text: "x".repeat(cost * 4),
            relevance,
            importance,
            token_cost: cost,
            essential: false,
            compressed: None,
        }
    }

    fn budget(tokens: usize) -> TokenBudget {
        TokenBudget {
            max_prompt_tokens: tokens,
            template_overhead: 0,
            reserved_response_tokens: 0,
        }
    }

    fn ids(result: &AssemblyResult) -> Vec<&str> {
        result.sections.iter().map(|s| s.section.id.as_str()).collect()
    }

    #[test]
    fn dp_finds_the_global_optimum() {
        // Greedy takes "a" (best efficiency) and fits nothing else;
        // the exact solution is "b" + "c".
        let candidates = vec![
            section("a", 0.6, 0.6, 6),  // value 0.36, eff 0.060
            section("b", 0.5, 0.5, 5),  // value 0.25, eff 0.050
            section("c", 0.5, 0.5, 5),  // value 0.25, eff 0.050
        ];
        let engine = ContextAssemblyEngine::new(8192);
        let result = engine.select(&candidates, &budget(10)).unwrap();
        assert!(result.exact);
        assert_eq!(ids(&result), vec!["b", "c"]);
        assert!((result.achieved_value - 0.5).abs() < 1e-6);
    }

    #[test]
    fn greedy_used_above_threshold() {
        let candidates = vec![
            section("a", 0.6, 0.6, 6),
            section("b", 0.5, 0.5, 5),
            section("c", 0.5, 0.5, 5),
        ];
        let engine = ContextAssemblyEngine::new(8);
        let result = engine.select(&candidates, &budget(10)).unwrap();
        assert!(!result.exact);
        // Monotonic in efficiency order, not globally optimal.
        assert_eq!(ids(&result), vec!["a"]);
        assert!(result.total_tokens <= 10);
    }

    #[test]
    fn budget_is_never_exceeded() {
        let candidates: Vec<ContextSection> = (0..20)
            .map(|i| section(&format!("s{i}"), 0.5 + (i as f32) * 0.02, 0.7, 7 + i % 5))
            .collect();
        for b in [0, 5, 17, 40, 83] {
            let engine = ContextAssemblyEngine::new(8192);
            let result = engine.select(&candidates, &budget(b)).unwrap();
            assert!(result.total_tokens <= b, "budget {b} exceeded");
        }
    }

    #[test]
    fn essential_that_fits_only_compressed_is_included_compressed() {
        let mut essential = section("ess", 0.9, 1.0, 100);
        essential.essential = true;
        essential.compressed = Some(CompressedVariant {
            text: "short".into(),
            token_cost: 20,
        });
        let candidates = vec![essential, section("other", 0.4, 0.4, 10)];

        let engine = ContextAssemblyEngine::new(8192);
        let result = engine.select(&candidates, &budget(30)).unwrap();

        let ess = result.sections.iter().find(|s| s.section.id == "ess").unwrap();
        assert!(ess.compressed);
        assert_eq!(ess.text(), "short");
        assert!(result.total_tokens <= 30);
    }

    #[test]
    fn essential_displaces_lower_priority_sections() {
        let mut essential = section("ess", 0.3, 0.3, 8); // poor efficiency
        essential.essential = true;
        let candidates = vec![
            essential,
            section("a", 0.6, 0.6, 6),
            section("b", 0.5, 0.4, 4),
        ];
        let engine = ContextAssemblyEngine::new(8192);
        let result = engine.select(&candidates, &budget(10)).unwrap();

        assert!(ids(&result).contains(&"ess"));
        assert!(result.total_tokens <= 10);
    }

    #[test]
    fn infeasible_when_essentials_cannot_fit() {
        let mut a = section("a", 0.9, 0.9, 50);
        a.essential = true;
        let mut b = section("b", 0.9, 0.9, 60);
        b.essential = true;
        let engine = ContextAssemblyEngine::new(8192);
        let err = engine.select(&[a, b], &budget(40)).unwrap_err();
        match err {
            TerminalFailure::BudgetInfeasible {
                required_tokens,
                budget_tokens,
            } => {
                assert_eq!(required_tokens, 110);
                assert_eq!(budget_tokens, 40);
            }
            other => panic!("expected BudgetInfeasible, got {other:?}"),
        }
    }

    #[test]
    fn negative_budget_is_assembly_failure() {
        let engine = ContextAssemblyEngine::new(8192);
        let bad = TokenBudget {
            max_prompt_tokens: 100,
            template_overhead: 80,
            reserved_response_tokens: 50,
        };
        let err = engine.select(&[section("a", 0.5, 0.5, 5)], &bad).unwrap_err();
        assert!(matches!(err, TerminalFailure::AssemblyFailure { .. }));
    }

    #[test]
    fn compression_rescues_non_essential_sections() {
        let mut big = section("big", 0.9, 0.9, 50);
        big.compressed = Some(CompressedVariant {
            text: "tiny".into(),
            token_cost: 4,
        });
        let candidates = vec![section("a", 0.5, 0.5, 6), big];
        let engine = ContextAssemblyEngine::new(8192);
        let result = engine.select(&candidates, &budget(10)).unwrap();

        let big = result.sections.iter().find(|s| s.section.id == "big").unwrap();
        assert!(big.compressed);
        assert_eq!(result.total_tokens, 10);
    }

    #[test]
    fn increasing_budget_never_decreases_dp_value() {
        let candidates: Vec<ContextSection> = (0..12)
            .map(|i| section(&format!("s{i}"), 0.3 + 0.05 * (i as f32), 0.8, 5 + (i * 3) % 11))
            .collect();
        let engine = ContextAssemblyEngine::new(8192);
        let mut last_value = 0.0_f32;
        for b in (0..=120).step_by(10) {
            let result = engine.select(&candidates, &budget(b)).unwrap();
            assert!(
                result.achieved_value >= last_value - 1e-6,
                "value decreased at budget {b}"
            );
            last_value = result.achieved_value;
        }
    }

    #[test]
    fn selection_is_deterministic() {
        let candidates: Vec<ContextSection> = (0..10)
            .map(|i| section(&format!("s{i}"), 0.5, 0.5, 5))
            .collect();
        let engine = ContextAssemblyEngine::new(8192);
        let a = engine.select(&candidates, &budget(23)).unwrap();
        let b = engine.select(&candidates, &budget(23)).unwrap();
        assert_eq!(ids(&a), ids(&b));
        assert_eq!(a.total_tokens, b.total_tokens);
    }

    #[test]
    fn output_preserves_candidate_order() {
        let candidates = vec![
            section("z_first", 0.2, 0.5, 3),
            section("a_second", 0.9, 0.9, 3),
        ];
        let engine = ContextAssemblyEngine::new(8192);
        let result = engine.select(&candidates, &budget(10)).unwrap();
        assert_eq!(ids(&result), vec!["z_first", "a_second"]);
    }

    #[test]
    fn empty_candidates_is_empty_result() {
        let engine = ContextAssemblyEngine::new(8192);
        let result = engine.select(&[], &budget(100)).unwrap();
        assert!(result.sections.is_empty());
        assert_eq!(result.total_tokens, 0);
        assert_eq!(result.utilization, 0.0);
    }
}
