//! Top-k contributing features, sorted by contribution descending with ties
//! broken by schema order.

use super::TopContributor;

pub fn rank_contributors(per_feature: &[f32], names: &[String], k: usize) -> Vec<TopContributor> {
    let sum: f64 = per_feature.iter().map(|&v| v as f64).sum();

    let mut order: Vec<usize> = (0..per_feature.len()).collect();
    // Stable sort keeps schema order on ties.
    order.sort_by(|&a, &b| {
        per_feature[b]
            .partial_cmp(&per_feature[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    order
        .into_iter()
        .take(k)
        .map(|j| TopContributor {
            name: names[j].clone(),
            contribution: per_feature[j],
            percent: if sum > 0.0 {
                (per_feature[j] as f64 / sum) as f32
            } else {
                0.0
            },
        })
        .collect()
}
