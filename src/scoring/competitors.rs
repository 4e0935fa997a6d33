// src/scoring/competitors.rs

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use utoipa::ToSchema;

use crate::models::CompetitorAnalysis;

pub const LOW_SATURATION_MAX: usize = 3;
pub const MEDIUM_SATURATION_MAX: usize = 10;

/// Features we look for in every market; any that no competitor ships is a gap.
pub const CANDIDATE_FEATURES: [&str; 8] = [
    "API access",
    "Mobile app",
    "Team collaboration",
    "AI-powered insights",
    "Custom integrations",
    "Offline mode",
    "Data export",
    "Japanese localization",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Saturation {
    /// No competitor records at all.
    NoCompetitors,
    Low,
    Medium,
    High,
}

impl Saturation {
    pub fn from_count(count: usize) -> Self {
        match count {
            0 => Saturation::NoCompetitors,
            c if c <= LOW_SATURATION_MAX => Saturation::Low,
            c if c <= MEDIUM_SATURATION_MAX => Saturation::Medium,
            _ => Saturation::High,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Saturation::NoCompetitors => "No competitor data: blue ocean opportunity",
            Saturation::Low => "Low saturation: a blue ocean market with room to lead",
            Saturation::Medium => "Medium saturation: differentiation is required",
            Saturation::High => "High saturation: target an underserved niche",
        }
    }

    pub fn strategy(&self) -> &'static str {
        match self {
            Saturation::NoCompetitors | Saturation::Low => "market_leadership",
            Saturation::Medium => "differentiation",
            Saturation::High => "niche",
        }
    }

    fn recommendations(&self) -> Vec<String> {
        let items: &[&str] = match self {
            Saturation::NoCompetitors => &[
                "Validate demand early; no competitors can also mean no market",
                "Move fast to establish the category and own its vocabulary",
            ],
            Saturation::Low => &[
                "Aim for market leadership before larger players arrive",
                "Invest in brand and early community",
            ],
            Saturation::Medium => &[
                "Differentiate on features competitors rarely offer",
                "Compete on user experience and support quality",
            ],
            Saturation::High => &[
                "Focus on a narrow niche the incumbents underserve",
                "Avoid competing on price against established products",
            ],
        };
        items.iter().map(|s| s.to_string()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFrequency {
    pub feature: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompetitorLandscape {
    pub competitor_count: usize,
    pub saturation: Saturation,
    pub message: String,
    pub strategy: String,
    pub recommendations: Vec<String>,
    pub feature_frequency: Vec<FeatureFrequency>,
    /// Features fewer than half of the competitors offer.
    pub advantage_opportunities: Vec<String>,
    /// Candidate features no competitor offers.
    pub market_gaps: Vec<String>,
}

pub fn analyze_competitors(competitors: &[CompetitorAnalysis]) -> CompetitorLandscape {
    let feature_lists: Vec<&[String]> = competitors.iter().map(|c| c.features.as_slice()).collect();
    classify(&feature_lists)
}

/// Same as [`analyze_competitors`] over bare feature lists, one per competitor.
pub fn classify(feature_lists: &[&[String]]) -> CompetitorLandscape {
    let count = feature_lists.len();
    let saturation = Saturation::from_count(count);

    // Keyed by lowercase name; keeps the first spelling seen for display.
    let mut frequency: BTreeMap<String, (String, usize)> = BTreeMap::new();
    for features in feature_lists {
        let mut seen = HashSet::new();
        for feature in features.iter() {
            let trimmed = feature.trim();
            if trimmed.is_empty() {
                continue;
            }
            let key = trimmed.to_lowercase();
            if !seen.insert(key.clone()) {
                continue;
            }
            frequency
                .entry(key)
                .or_insert_with(|| (trimmed.to_string(), 0))
                .1 += 1;
        }
    }

    let advantage_opportunities = frequency
        .values()
        .filter(|(_, n)| n * 2 < count)
        .map(|(name, _)| name.clone())
        .collect();

    let market_gaps = CANDIDATE_FEATURES
        .iter()
        .filter(|candidate| !frequency.contains_key(&candidate.to_lowercase()))
        .map(|s| s.to_string())
        .collect();

    let mut feature_frequency: Vec<FeatureFrequency> = frequency
        .into_values()
        .map(|(feature, count)| FeatureFrequency { feature, count })
        .collect();
    feature_frequency.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.feature.cmp(&b.feature)));

    CompetitorLandscape {
        competitor_count: count,
        saturation,
        message: saturation.message().to_string(),
        strategy: saturation.strategy().to_string(),
        recommendations: saturation.recommendations(),
        feature_frequency,
        advantage_opportunities,
        market_gaps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lists(n: usize) -> Vec<Vec<String>> {
        (0..n).map(|_| vec!["Dashboard".to_string()]).collect()
    }

    fn run(lists: &[Vec<String>]) -> CompetitorLandscape {
        let refs: Vec<&[String]> = lists.iter().map(|l| l.as_slice()).collect();
        classify(&refs)
    }

    #[test]
    fn thresholds() {
        assert_eq!(Saturation::from_count(0), Saturation::NoCompetitors);
        assert_eq!(Saturation::from_count(3), Saturation::Low);
        assert_eq!(Saturation::from_count(4), Saturation::Medium);
        assert_eq!(Saturation::from_count(7), Saturation::Medium);
        assert_eq!(Saturation::from_count(10), Saturation::Medium);
        assert_eq!(Saturation::from_count(11), Saturation::High);
        assert_eq!(Saturation::from_count(15), Saturation::High);
    }

    #[test]
    fn no_competitors_is_blue_ocean() {
        let landscape = run(&[]);
        assert_eq!(landscape.saturation, Saturation::NoCompetitors);
        assert!(landscape.message.contains("blue ocean"));
        assert_eq!(landscape.market_gaps.len(), CANDIDATE_FEATURES.len());
        assert!(landscape.advantage_opportunities.is_empty());
    }

    #[test]
    fn strategies_follow_saturation() {
        assert_eq!(run(&lists(2)).strategy, "market_leadership");
        assert_eq!(run(&lists(7)).strategy, "differentiation");
        assert_eq!(run(&lists(15)).strategy, "niche");
    }

    #[test]
    fn rare_features_are_opportunities() {
        let competitors = vec![
            vec!["Dashboard".to_string(), "API access".to_string()],
            vec!["dashboard".to_string()],
            vec!["Dashboard".to_string(), "Mobile App".to_string()],
            vec!["Dashboard".to_string()],
        ];
        let landscape = run(&competitors);

        assert_eq!(landscape.feature_frequency[0].feature, "Dashboard");
        assert_eq!(landscape.feature_frequency[0].count, 4);
        assert_eq!(
            landscape.advantage_opportunities,
            vec!["API access".to_string(), "Mobile App".to_string()]
        );
        assert!(!landscape.market_gaps.contains(&"API access".to_string()));
        assert!(!landscape.market_gaps.contains(&"Mobile app".to_string()));
        assert!(landscape.market_gaps.contains(&"Offline mode".to_string()));
    }

    #[test]
    fn duplicate_features_count_once_per_competitor() {
        let competitors = vec![
            vec!["Export".to_string(), "export".to_string()],
            vec!["Other".to_string()],
        ];
        let landscape = run(&competitors);
        let export = landscape
            .feature_frequency
            .iter()
            .find(|f| f.feature == "Export")
            .unwrap();
        assert_eq!(export.count, 1);
    }
}
