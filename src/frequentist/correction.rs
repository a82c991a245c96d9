// Multiple-comparison correction
//
// Bonferroni controls the family-wise error rate by scaling every p-value by
// the number of comparisons. Holm's step-down procedure controls the same
// rate but is uniformly more powerful: adjusted values never exceed
// Bonferroni's and never fall below the raw p-values.
//
// Scientific Foundation:
// Holm, S. (1979). A simple sequentially rejective multiple test procedure.
//     Scandinavian Journal of Statistics 6(2), 65-70.

use crate::primitives::clamp_probability;
use crate::types::Correction;

/// Adjust p-values for `m = p_values.len()` simultaneous comparisons
///
/// Output order matches input order.
///
/// # Example
/// ```
/// use exptest::frequentist::adjust_p_values;
/// use exptest::types::Correction;
///
/// let adjusted = adjust_p_values(&[0.01, 0.02, 0.04], Correction::Holm);
/// assert!((adjusted[0] - 0.03).abs() < 1e-12);
/// assert!((adjusted[1] - 0.04).abs() < 1e-12);
/// assert!((adjusted[2] - 0.04).abs() < 1e-12);
/// ```
pub fn adjust_p_values(p_values: &[f64], method: Correction) -> Vec<f64> {
    let m = p_values.len();
    match method {
        Correction::None => p_values.iter().map(|&p| clamp_probability(p)).collect(),
        Correction::Bonferroni => p_values
            .iter()
            .map(|&p| clamp_probability(p * m as f64))
            .collect(),
        Correction::Holm => {
            let mut order: Vec<usize> = (0..m).collect();
            order.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]));

            let mut adjusted = vec![0.0; m];
            let mut running_max = 0.0_f64;
            for (rank, &index) in order.iter().enumerate() {
                let scaled = clamp_probability(p_values[index] * (m - rank) as f64);
                running_max = running_max.max(scaled);
                adjusted[index] = running_max;
            }
            adjusted
        }
    }
}
