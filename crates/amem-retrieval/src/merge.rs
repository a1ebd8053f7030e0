//! Merges ordered result sections into one deduplicated list (§4.5 "Merge &
//! dedupe"): rules, then facts, then skills, then context, then the
//! relevance results, deduped by id. `Memory.id` is always present in this
//! model, so the id-based pass is authoritative; normalized-summary dedup
//! never runs, since it would otherwise collapse two genuinely distinct
//! memories that happen to say the same thing.

use std::collections::HashSet;

use amem_core::{Memory, MemoryId};

pub fn merge_and_dedupe(sections: Vec<Vec<Memory>>) -> Vec<Memory> {
  let mut seen_ids = HashSet::<MemoryId>::new();
  let mut merged = Vec::new();

  for section in sections {
    for memory in section {
      if seen_ids.insert(memory.id) {
        merged.push(memory);
      }
    }
  }

  merged
}
