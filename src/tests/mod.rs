//! Cross-module integration scenarios (spec §8 "end-to-end scenarios"),
//! matching the teacher's own `src/tests/` tree: these exercise the full
//! logger → dispatcher → transport → formatter path rather than a single
//! unit, so a regression in how the pieces are wired together shows up here
//! even when every module's own `#[cfg(test)]` block still passes.
