//! Rule-based outfit generator used when the external scorer is unavailable
//!
//! Deterministic: the same mood, season and inventory always produce the same list.

use chrono::{Datelike, Local};

use crate::models::{Category, ClosetItem, Recommendation, RecommendationType, Season};

/// Items kept per category before combining
const SAMPLE_SIZE: usize = 10;
const MAX_TWO_PIECE: usize = 10;
const MAX_DRESS: usize = 3;
const MAX_RESULTS: usize = 10;

const TWO_PIECE_BASE_SCORE: f64 = 0.9;
const TWO_PIECE_SCORE_STEP: f64 = 0.03;
const DRESS_BASE_SCORE: f64 = 0.85;
const DRESS_SCORE_STEP: f64 = 0.05;
const DEGENERATE_SCORE: f64 = 0.6;

/// Season for a temperature in °C, or for the calendar month when absent
pub fn season_for(temperature: Option<f64>, month: u32) -> Season {
    match temperature {
        Some(t) if t >= 28.0 => Season::Summer,
        Some(t) if t >= 20.0 => Season::Spring,
        Some(t) if t >= 10.0 => Season::Fall,
        Some(_) => Season::Winter,
        None => match month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Fall,
            _ => Season::Winter,
        },
    }
}

pub fn current_season(temperature: Option<f64>) -> Season {
    season_for(temperature, Local::now().month())
}

pub fn generate_reason(mood: &str, score: f64) -> String {
    let level = if score > 0.8 {
        "a great"
    } else if score > 0.6 {
        "a good"
    } else {
        "a decent"
    };
    format!(
        "{} match for a {} mood, picked with today's weather in mind.",
        capitalize(level),
        mood
    )
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Default)]
struct Wardrobe<'a> {
    tops: Vec<&'a ClosetItem>,
    bottoms: Vec<&'a ClosetItem>,
    outers: Vec<&'a ClosetItem>,
    dresses: Vec<&'a ClosetItem>,
}

impl<'a> Wardrobe<'a> {
    fn partition(items: impl Iterator<Item = &'a ClosetItem>) -> Self {
        let mut wardrobe = Wardrobe::default();
        for item in items {
            let group = match item.category() {
                Category::Top => &mut wardrobe.tops,
                Category::Bottom => &mut wardrobe.bottoms,
                Category::Outer => &mut wardrobe.outers,
                Category::Dress => &mut wardrobe.dresses,
                _ => continue,
            };
            if group.len() < SAMPLE_SIZE {
                group.push(item);
            }
        }
        wardrobe
    }
}

/// Builds up to ten outfit combinations from the inventory, best first
pub fn generate_fallback(mood: &str, season: Season, inventory: &[ClosetItem]) -> Vec<Recommendation> {
    let wardrobe = Wardrobe::partition(inventory.iter().filter(|item| item.fits_season(season)));
    let needs_outer = season.needs_outer() && !wardrobe.outers.is_empty();

    let mut recommendations: Vec<Recommendation> = Vec::new();
    if !wardrobe.tops.is_empty() && !wardrobe.bottoms.is_empty() {
        let (tops, bottoms) = (&wardrobe.tops, &wardrobe.bottoms);
        let count = MAX_TWO_PIECE.min(tops.len() * bottoms.len());
        for i in 0..count {
            let top = tops[i % tops.len()];
            let bottom = bottoms[(i / tops.len()) % bottoms.len()];
            let outer = needs_outer.then(|| wardrobe.outers[i % wardrobe.outers.len()]);
            let score = TWO_PIECE_BASE_SCORE - TWO_PIECE_SCORE_STEP * i as f64;

            recommendations.push(Recommendation {
                id: String::new(),
                kind: RecommendationType::TwoPiece,
                top: Some(top.clone()),
                bottom: Some(bottom.clone()),
                dress: None,
                outer: outer.cloned(),
                score,
                reason: generate_reason(mood, score),
            });
        }
    }

    for (j, dress) in wardrobe.dresses.iter().take(MAX_DRESS).enumerate() {
        let outer = needs_outer.then(|| wardrobe.outers[j % wardrobe.outers.len()]);
        let score = DRESS_BASE_SCORE - DRESS_SCORE_STEP * j as f64;

        recommendations.push(Recommendation {
            id: String::new(),
            kind: RecommendationType::Dress,
            top: None,
            bottom: None,
            dress: Some((*dress).clone()),
            outer: outer.cloned(),
            score,
            reason: format!("A dress outfit that suits a {} mood.", mood),
        });
    }

    if recommendations.is_empty() && inventory.len() >= 2 {
        recommendations.push(Recommendation {
            id: String::new(),
            kind: RecommendationType::TwoPiece,
            top: Some(inventory[0].clone()),
            bottom: Some(inventory[1].clone()),
            dress: None,
            outer: None,
            score: DEGENERATE_SCORE,
            reason: generate_reason(mood, DEGENERATE_SCORE),
        });
    }

    recommendations.sort_by(|a, b| b.score.total_cmp(&a.score));
    recommendations.truncate(MAX_RESULTS);
    for (index, rec) in recommendations.iter_mut().enumerate() {
        rec.id = format!("rec_{}", index + 1);
    }

    tracing::debug!(
        season = %season,
        count = recommendations.len(),
        "Generated fallback recommendations"
    );

    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemAttributes;
    use chrono::Utc;

    fn item(id: &str, category: Category, season: Vec<Season>) -> ClosetItem {
        ClosetItem {
            id: id.to_string(),
            image_url: String::new(),
            attributes: ItemAttributes::new(category),
            name: None,
            tags: vec![],
            season,
            image_vector: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn test_season_thresholds() {
        assert_eq!(season_for(Some(28.0), 1), Season::Summer);
        assert_eq!(season_for(Some(27.9), 1), Season::Spring);
        assert_eq!(season_for(Some(20.0), 1), Season::Spring);
        assert_eq!(season_for(Some(10.0), 7), Season::Fall);
        assert_eq!(season_for(Some(9.9), 7), Season::Winter);
        assert_eq!(season_for(Some(-15.0), 7), Season::Winter);
    }

    #[test]
    fn test_season_from_month_when_temperature_missing() {
        assert_eq!(season_for(None, 3), Season::Spring);
        assert_eq!(season_for(None, 5), Season::Spring);
        assert_eq!(season_for(None, 6), Season::Summer);
        assert_eq!(season_for(None, 9), Season::Fall);
        assert_eq!(season_for(None, 11), Season::Fall);
        assert_eq!(season_for(None, 12), Season::Winter);
        assert_eq!(season_for(None, 2), Season::Winter);
    }

    #[test]
    fn test_cold_weather_attaches_outer() {
        let inventory = vec![
            item("t1", Category::Top, vec![]),
            item("b1", Category::Bottom, vec![]),
            item("o1", Category::Outer, vec![Season::Winter]),
        ];
        let recs = generate_fallback("casual", season_for(Some(5.0), 7), &inventory);
        assert!(recs
            .iter()
            .any(|r| r.kind == RecommendationType::TwoPiece && r.outer.is_some()));
    }

    #[test]
    fn test_spring_has_no_outer() {
        let inventory = vec![
            item("t1", Category::Top, vec![]),
            item("t2", Category::Top, vec![]),
            item("b1", Category::Bottom, vec![]),
            item("o1", Category::Outer, vec![]),
        ];
        let season = season_for(Some(25.0), 1);
        assert_eq!(season, Season::Spring);
        let recs = generate_fallback("interview", season, &inventory);
        assert_eq!(recs.len(), 2);
        assert!(recs.iter().all(|r| r.outer.is_none()));
    }

    #[test]
    fn test_season_filter_excludes_out_of_season_items() {
        let inventory = vec![
            item("t-summer", Category::Top, vec![Season::Summer]),
            item("t-winter", Category::Top, vec![Season::Winter]),
            item("b1", Category::Bottom, vec![]),
        ];
        let recs = generate_fallback("beach", Season::Summer, &inventory);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].top.as_ref().unwrap().id, "t-summer");
    }

    #[test]
    fn test_row_major_pairing_and_decreasing_scores() {
        let inventory = vec![
            item("t1", Category::Top, vec![]),
            item("t2", Category::Top, vec![]),
            item("b1", Category::Bottom, vec![]),
            item("b2", Category::Bottom, vec![]),
        ];
        let recs = generate_fallback("weekend", Season::Summer, &inventory);
        let pairs: Vec<(String, String)> = recs
            .iter()
            .map(|r| {
                (
                    r.top.as_ref().unwrap().id.clone(),
                    r.bottom.as_ref().unwrap().id.clone(),
                )
            })
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("t1".to_string(), "b1".to_string()),
                ("t2".to_string(), "b1".to_string()),
                ("t1".to_string(), "b2".to_string()),
                ("t2".to_string(), "b2".to_string()),
            ]
        );
        for window in recs.windows(2) {
            assert!(window[0].score > window[1].score);
        }
        assert_eq!(recs[0].id, "rec_1");
    }

    #[test]
    fn test_caps_results() {
        let mut inventory = Vec::new();
        for i in 0..15 {
            inventory.push(item(&format!("t{}", i), Category::Top, vec![]));
            inventory.push(item(&format!("b{}", i), Category::Bottom, vec![]));
        }
        for i in 0..5 {
            inventory.push(item(&format!("d{}", i), Category::Dress, vec![]));
        }
        let recs = generate_fallback("party", Season::Summer, &inventory);
        assert_eq!(recs.len(), MAX_RESULTS);
        for window in recs.windows(2) {
            assert!(window[0].score >= window[1].score);
        }
        assert!(recs.iter().all(|r| (0.0..=1.0).contains(&r.score)));
    }

    #[test]
    fn test_dress_combinations() {
        let inventory = vec![
            item("d1", Category::Dress, vec![]),
            item("d2", Category::Dress, vec![]),
            item("o1", Category::Outer, vec![]),
        ];
        let recs = generate_fallback("date", Season::Fall, &inventory);
        assert_eq!(recs.len(), 2);
        assert!(recs.iter().all(|r| r.kind == RecommendationType::Dress));
        assert!(recs.iter().all(|r| r.outer.is_some()));
        assert_eq!(recs[0].dress.as_ref().unwrap().id, "d1");
    }

    #[test]
    fn test_degenerate_pairing_for_unmatched_categories() {
        let inventory = vec![
            item("s1", Category::Shoes, vec![]),
            item("bag1", Category::Bag, vec![]),
        ];
        let recs = generate_fallback("errands", Season::Spring, &inventory);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].score, 0.6);
        assert_eq!(recs[0].top.as_ref().unwrap().id, "s1");
        assert_eq!(recs[0].bottom.as_ref().unwrap().id, "bag1");
    }

    #[test]
    fn test_single_item_inventory_yields_nothing() {
        let inventory = vec![item("s1", Category::Shoes, vec![])];
        assert!(generate_fallback("errands", Season::Spring, &inventory).is_empty());
    }

    #[test]
    fn test_reason_levels() {
        assert!(generate_reason("calm", 0.9).starts_with("A great"));
        assert!(generate_reason("calm", 0.7).starts_with("A good"));
        assert!(generate_reason("calm", 0.6).starts_with("A decent"));
    }
}
