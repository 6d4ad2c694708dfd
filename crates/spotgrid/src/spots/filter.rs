//! Attribute predicates over regions.
//!
//! Predicates compose by sequential application: filtering with a list keeps
//! exactly the regions that satisfy every predicate, in input order.

use serde::{Deserialize, Serialize};

use super::Region;

/// Region attribute a predicate inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionAttribute {
    Label,
    Area,
    Eccentricity,
    Orientation,
    MeanIntensity,
    CentroidRow,
    CentroidCol,
}

impl RegionAttribute {
    /// Attribute value, or `None` when the region does not carry it.
    pub fn value(self, region: &Region) -> Option<f64> {
        match self {
            Self::Label => Some(region.label as f64),
            Self::Area => Some(region.area as f64),
            Self::Eccentricity => Some(region.eccentricity),
            Self::Orientation => Some(region.orientation),
            Self::MeanIntensity => region.mean_intensity,
            Self::CentroidRow => Some(region.centroid[0]),
            Self::CentroidCol => Some(region.centroid[1]),
        }
    }
}

/// Comparison applied to an attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op", content = "value")]
pub enum Condition {
    GreaterThan(f64),
    LessThan(f64),
    Equals(f64),
    IsIn(Vec<f64>),
}

impl Condition {
    fn holds(&self, v: f64) -> bool {
        match self {
            Self::GreaterThan(t) => v > *t,
            Self::LessThan(t) => v < *t,
            Self::Equals(t) => v == *t,
            Self::IsIn(set) => set.contains(&v),
        }
    }
}

/// `(attribute, comparator, value)` predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionPredicate {
    pub attribute: RegionAttribute,
    pub condition: Condition,
}

impl RegionPredicate {
    pub fn new(attribute: RegionAttribute, condition: Condition) -> Self {
        Self {
            attribute,
            condition,
        }
    }

    pub fn area_greater_than(min_area: f64) -> Self {
        Self::new(RegionAttribute::Area, Condition::GreaterThan(min_area))
    }

    pub fn eccentricity_less_than(max_eccentricity: f64) -> Self {
        Self::new(
            RegionAttribute::Eccentricity,
            Condition::LessThan(max_eccentricity),
        )
    }

    /// Keep regions whose label appears in `labels`.
    pub fn label_in(labels: impl IntoIterator<Item = u32>) -> Self {
        Self::new(
            RegionAttribute::Label,
            Condition::IsIn(labels.into_iter().map(|l| l as f64).collect()),
        )
    }

    /// Whether `region` satisfies this predicate. Missing attributes fail.
    pub fn matches(&self, region: &Region) -> bool {
        self.attribute
            .value(region)
            .is_some_and(|v| self.condition.holds(v))
    }
}

/// Regions satisfying `predicate`.
pub fn filter_regions(regions: &[Region], predicate: &RegionPredicate) -> Vec<Region> {
    regions
        .iter()
        .filter(|r| predicate.matches(r))
        .cloned()
        .collect()
}

/// Apply `predicates` one after another (logical AND).
pub fn filter_regions_all(regions: &[Region], predicates: &[RegionPredicate]) -> Vec<Region> {
    let mut kept = regions.to_vec();
    for p in predicates {
        let before = kept.len();
        kept = filter_regions(&kept, p);
        tracing::debug!(
            "filter {:?} {:?}: {} -> {} regions",
            p.attribute,
            p.condition,
            before,
            kept.len()
        );
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spots::BoundingBox;

    fn region(label: u32, area: usize, eccentricity: f64) -> Region {
        Region {
            label,
            centroid: [label as f64, 0.0],
            area,
            eccentricity,
            orientation: 0.0,
            bbox: BoundingBox {
                min_row: 0,
                min_col: 0,
                max_row: 1,
                max_col: 1,
            },
            mean_intensity: None,
        }
    }

    fn sample() -> Vec<Region> {
        vec![
            region(1, 400, 0.2),
            region(2, 150, 0.1),
            region(3, 500, 0.95),
            region(4, 320, 0.6),
            region(5, 90, 0.99),
        ]
    }

    fn labels(regions: &[Region]) -> Vec<u32> {
        regions.iter().map(|r| r.label).collect()
    }

    #[test]
    fn comparators() {
        let regions = sample();
        let gt = filter_regions(&regions, &RegionPredicate::area_greater_than(300.0));
        assert_eq!(labels(&gt), vec![1, 3, 4]);
        let lt = filter_regions(&regions, &RegionPredicate::eccentricity_less_than(0.5));
        assert_eq!(labels(&lt), vec![1, 2]);
        let eq = filter_regions(
            &regions,
            &RegionPredicate::new(RegionAttribute::Area, Condition::Equals(150.0)),
        );
        assert_eq!(labels(&eq), vec![2]);
        let is_in = filter_regions(&regions, &RegionPredicate::label_in([5, 2, 9]));
        assert_eq!(labels(&is_in), vec![2, 5]);
    }

    #[test]
    fn sequential_and_matches_joint_predicate_in_any_order() {
        let regions = sample();
        let area = RegionPredicate::area_greater_than(300.0);
        let ecc = RegionPredicate::eccentricity_less_than(0.9);

        let forward = filter_regions_all(&regions, &[area.clone(), ecc.clone()]);
        let backward = filter_regions_all(&regions, &[ecc.clone(), area.clone()]);
        let joint: Vec<Region> = regions
            .iter()
            .filter(|r| area.matches(r) && ecc.matches(r))
            .cloned()
            .collect();

        assert_eq!(forward, joint);
        assert_eq!(backward, joint);
        assert_eq!(labels(&joint), vec![1, 4]);
    }

    #[test]
    fn missing_attribute_never_matches() {
        let regions = sample();
        let p = RegionPredicate::new(RegionAttribute::MeanIntensity, Condition::GreaterThan(-1.0));
        assert!(filter_regions(&regions, &p).is_empty());
    }

    #[test]
    fn predicate_json_shape() {
        let p: RegionPredicate = serde_json::from_str(
            r#"{"attribute":"area","condition":{"op":"greater_than","value":300.0}}"#,
        )
        .expect("valid predicate");
        assert_eq!(p, RegionPredicate::area_greater_than(300.0));

        let p: RegionPredicate = serde_json::from_str(
            r#"{"attribute":"label","condition":{"op":"is_in","value":[1,2]}}"#,
        )
        .expect("valid predicate");
        assert_eq!(p, RegionPredicate::label_in([1, 2]));
    }
}
