// Frequentist comparison of experiment arms
//
// Two-arm z/Welch tests, k-arm omnibus tests with corrected pairwise
// comparisons, and difference-in-differences for pre/post designs.
//
// Scientific Foundation:
// [1] Kohavi, R., Tang, D., & Xu, Y. (2020). Trustworthy Online Controlled
//     Experiments. Cambridge University Press. Ch. 17: two-sample tests on
//     proportions and means, Welch's unequal-variance t-test.
//
// [2] Holm, S. (1979). A simple sequentially rejective multiple test
//     procedure. Scandinavian Journal of Statistics.
//
// Numerical degeneracy (zero standard error) is not an error: the result
// carries p = 1 and a zero-width interval around the observed difference.

mod correction;
mod diff_in_diff;
mod multi_arm;
mod two_arm;

pub use correction::adjust_p_values;
pub use diff_in_diff::{analyze_diff_in_diff, DiffInDiffRequest, DiffInDiffResult};
pub use multi_arm::{
    analyze_k_arm, KArmRequest, KArmResult, NamedArm, PairwiseComparison, VariantSummary,
};
pub use two_arm::{
    analyze_two_arm, compare_arms, test_difference, ComparisonResult, DifferenceTest,
    TwoArmRequest,
};
