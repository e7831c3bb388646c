use std::collections::BTreeMap;

use crate::ir::{Point, Size};

use super::ranking::{is_virtual, ordered_ranks};
use super::{LayoutEngine, LayoutOptions, ScopeInput};

/// Layered placement: one rank per step along the flow direction, ranks
/// centred on the cross axis.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayeredEngine;

impl LayoutEngine for LayeredEngine {
    fn arrange(&self, scope: &ScopeInput, options: &LayoutOptions) -> BTreeMap<String, Point> {
        let horizontal = options.direction.is_horizontal();
        let main_of = |size: Size| if horizontal { size.width } else { size.height };
        let cross_of = |size: Size| if horizontal { size.height } else { size.width };

        let ranks: Vec<Vec<String>> =
            ordered_ranks(&scope.members, &scope.edges, options.order_passes)
                .into_iter()
                .map(|bucket| bucket.into_iter().filter(|id| !is_virtual(id)).collect())
                .filter(|bucket: &Vec<String>| !bucket.is_empty())
                .collect();

        let mut rank_main = Vec::with_capacity(ranks.len());
        let mut rank_extent = Vec::with_capacity(ranks.len());
        let mut cursor = 0.0f32;
        for bucket in &ranks {
            let thickness = bucket
                .iter()
                .map(|id| main_of(scope.size_of(id)))
                .fold(0.0f32, f32::max);
            let extent: f32 = bucket
                .iter()
                .map(|id| cross_of(scope.size_of(id)))
                .sum::<f32>()
                + options.node_spacing * (bucket.len().saturating_sub(1)) as f32;
            rank_main.push((cursor, thickness));
            rank_extent.push(extent);
            cursor += thickness + options.rank_spacing;
        }
        let total_main = (cursor - options.rank_spacing).max(0.0);
        let widest = rank_extent.iter().copied().fold(0.0f32, f32::max);

        let mut placed = BTreeMap::new();
        for (idx, bucket) in ranks.iter().enumerate() {
            let (rank_start, thickness) = rank_main[idx];
            let mut cross = (widest - rank_extent[idx]) / 2.0;
            for id in bucket {
                let size = scope.size_of(id);
                // Centre within the rank band so mixed heights line up.
                let mut main = rank_start + (thickness - main_of(size)) / 2.0;
                if options.direction.is_reversed() {
                    main = total_main - main - main_of(size);
                }
                let point = if horizontal {
                    Point::new(main, cross)
                } else {
                    Point::new(cross, main)
                };
                placed.insert(id.clone(), point);
                cross += cross_of(size) + options.node_spacing;
            }
        }
        placed
    }
}
