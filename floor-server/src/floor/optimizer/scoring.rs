//! Table scoring and combination search
//!
//! Pure functions over an [`OptimizerSnapshot`]; nothing here mutates state.
//!
//! | Term | Points |
//! |------|--------|
//! | base | 100 |
//! | exact capacity | +50 |
//! | overage ≤ 2 | +30 |
//! | overage > 2 | −5 × overage |
//! | VIP party at VIP table | +40 |
//! | seating preference tag | +30 |
//! | preferred table | +100 |
//! | preferred server | +20, else up to +20 by (1 − section load) |
//!
//! Scores never go below 0.

use shared::floor::{
    AssignmentRequest, AssignmentResult, OptimizableTable, OptimizerSnapshot, ServerSection,
    TableRecommendation,
};

pub const BASE_SCORE: f64 = 100.0;
pub const MAX_RECOMMENDATIONS: usize = 5;
/// Combined capacity may exceed the party by at most this many seats
pub const MAX_COMBINATION_OVERAGE: u32 = 4;
pub const COMBINATION_REASON: &str = "combined tables for large party";

const VIP_TAG: &str = "VIP";

/// Hard capacity rejects
pub fn fits(table: &OptimizableTable, party_size: u32) -> bool {
    table.max_capacity >= party_size && party_size >= table.min_capacity
}

/// Score without capacity terms, floored at 0
///
/// Also the per-member score of a combination.
pub fn preference_score(
    table: &OptimizableTable,
    request: &AssignmentRequest,
    section: Option<&ServerSection>,
    reasons: &mut Vec<String>,
) -> f64 {
    let mut score = BASE_SCORE;

    if request.is_vip && table.has_tag(VIP_TAG) {
        score += 40.0;
        reasons.push("VIP table".into());
    }
    if let Some(pref) = request.seating_preference.as_deref()
        && table.has_tag(pref)
    {
        score += 30.0;
        reasons.push(format!("matches {pref} preference"));
    }
    if request.preferred_table_id.as_deref() == Some(table.table_id.as_str()) {
        score += 100.0;
        reasons.push("preferred table".into());
    }

    let preferred_server = request.preferred_server_id.as_deref().is_some_and(|server| {
        table.current_server_id.as_deref() == Some(server)
            || section.is_some_and(|s| s.server_id == server)
    });
    if preferred_server {
        score += 20.0;
        reasons.push("preferred server".into());
    } else if let Some(section) = section {
        let load = section.load_percent().clamp(0.0, 100.0);
        score += 20.0 * (1.0 - load / 100.0);
    }

    score.max(0.0)
}

/// Full single-table score, `None` on a hard reject
pub fn score_table(
    table: &OptimizableTable,
    request: &AssignmentRequest,
    section: Option<&ServerSection>,
) -> Option<(f64, String)> {
    if !fits(table, request.party_size) {
        return None;
    }
    let mut reasons = Vec::new();
    let overage = table.max_capacity - request.party_size;
    let capacity = match overage {
        0 => {
            reasons.push("exact capacity match".into());
            50.0
        }
        1..=2 => {
            reasons.push(format!("{overage} spare seat(s)"));
            30.0
        }
        _ => {
            reasons.push(format!("{overage} seats oversized"));
            -5.0 * overage as f64
        }
    };
    let score = preference_score(table, request, section, &mut reasons) + capacity;
    Some((score.max(0.0), reasons.join(", ")))
}

fn is_candidate(table: &OptimizableTable) -> bool {
    table.is_active && !table.is_occupied
}

fn server_of(table: &OptimizableTable, section: Option<&ServerSection>) -> Option<String> {
    table
        .current_server_id
        .clone()
        .or_else(|| section.map(|s| s.server_id.clone()))
}

/// Can `a` and `b` be pushed together for one party
pub fn can_combine(a: &OptimizableTable, b: &OptimizableTable) -> bool {
    a.table_id != b.table_id
        && a.combinable
        && b.combinable
        && a.max_combination_size >= 2
        && b.max_combination_size >= 2
        && a.accepts(&b.table_id)
        && b.accepts(&a.table_id)
}

/// Pair search, only used when no single table fits
pub fn combinations(
    state: &OptimizerSnapshot,
    request: &AssignmentRequest,
) -> Vec<TableRecommendation> {
    let party = request.party_size;
    let candidates: Vec<&OptimizableTable> =
        state.tables.iter().filter(|t| is_candidate(t)).collect();

    let mut out = Vec::new();
    for (i, a) in candidates.iter().enumerate() {
        for b in &candidates[i + 1..] {
            if !can_combine(a, b) {
                continue;
            }
            let total = a.max_capacity + b.max_capacity;
            if total < party || total > party + MAX_COMBINATION_OVERAGE {
                continue;
            }
            let section_a = state.section_of(&a.table_id);
            let section_b = state.section_of(&b.table_id);
            let mut ignored = Vec::new();
            let score = (preference_score(a, request, section_a, &mut ignored)
                + preference_score(b, request, section_b, &mut ignored))
                / 2.0;
            out.push(TableRecommendation {
                table_ids: vec![a.table_id.clone(), b.table_id.clone()],
                table_numbers: vec![a.number.clone(), b.number.clone()],
                total_capacity: total,
                score,
                reason: COMBINATION_REASON.into(),
                server_id: server_of(a, section_a).or_else(|| server_of(b, section_b)),
                is_combination: true,
            });
        }
    }
    out
}

/// Ranked recommendations (top 5)
pub fn recommend(state: &OptimizerSnapshot, request: &AssignmentRequest) -> AssignmentResult {
    let mut recommendations: Vec<TableRecommendation> = state
        .tables
        .iter()
        .filter(|t| is_candidate(t))
        .filter_map(|table| {
            let section = state.section_of(&table.table_id);
            score_table(table, request, section).map(|(score, reason)| TableRecommendation {
                table_ids: vec![table.table_id.clone()],
                table_numbers: vec![table.number.clone()],
                total_capacity: table.max_capacity,
                score,
                reason,
                server_id: server_of(table, section),
                is_combination: false,
            })
        })
        .collect();

    if recommendations.is_empty() {
        recommendations = combinations(state, request);
    }

    recommendations.sort_by(|a, b| b.score.total_cmp(&a.score));
    recommendations.truncate(MAX_RECOMMENDATIONS);
    AssignmentResult {
        success: !recommendations.is_empty(),
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(party_size: u32) -> AssignmentRequest {
        AssignmentRequest {
            party_size,
            ..Default::default()
        }
    }

    fn state(tables: Vec<OptimizableTable>) -> OptimizerSnapshot {
        OptimizerSnapshot {
            tables,
            ..Default::default()
        }
    }

    #[test]
    fn test_capacity_terms() {
        let req = request(4);
        let exact = OptimizableTable::new("a", "1", 2, 4);
        let close = OptimizableTable::new("b", "2", 2, 6);
        let big = OptimizableTable::new("c", "3", 2, 10);
        assert_eq!(score_table(&exact, &req, None).unwrap().0, 150.0);
        assert_eq!(score_table(&close, &req, None).unwrap().0, 130.0);
        assert_eq!(score_table(&big, &req, None).unwrap().0, 70.0);
    }

    #[test]
    fn test_score_floor_is_zero() {
        let huge = OptimizableTable::new("h", "H", 1, 40);
        assert_eq!(score_table(&huge, &request(2), None).unwrap().0, 0.0);
    }

    #[test]
    fn test_hard_rejects_never_recommended() {
        let s = state(vec![
            OptimizableTable::new("small", "1", 1, 2),
            OptimizableTable::new("banquet", "2", 8, 12),
            OptimizableTable::new("ok", "3", 2, 4),
        ]);
        let result = recommend(&s, &request(4));
        assert!(result.success);
        let ids: Vec<_> = result
            .recommendations
            .iter()
            .flat_map(|r| r.table_ids.clone())
            .collect();
        assert_eq!(ids, vec!["ok".to_string()]);
    }

    #[test]
    fn test_vip_and_preference_bonuses() {
        let mut vip = OptimizableTable::new("v", "V", 2, 4);
        vip.tags = vec!["vip".into(), "window".into()];
        let req = AssignmentRequest {
            party_size: 4,
            is_vip: true,
            seating_preference: Some("Window".into()),
            ..Default::default()
        };
        let (score, reason) = score_table(&vip, &req, None).unwrap();
        assert_eq!(score, 150.0 + 40.0 + 30.0);
        assert!(reason.contains("VIP table"));
    }

    #[test]
    fn test_preferred_table_dominates() {
        let s = state(vec![
            OptimizableTable::new("exact", "1", 2, 4),
            OptimizableTable::new("wanted", "2", 2, 8),
        ]);
        let req = AssignmentRequest {
            party_size: 4,
            preferred_table_id: Some("wanted".into()),
            ..Default::default()
        };
        let result = recommend(&s, &req);
        assert_eq!(result.recommendations[0].table_ids, vec!["wanted".to_string()]);
    }

    #[test]
    fn test_section_load_scales_bonus() {
        let table = OptimizableTable::new("t", "1", 2, 4);
        let idle = ServerSection {
            server_id: "s1".into(),
            server_name: "Ana".into(),
            table_ids: vec!["t".into()],
            max_covers: 20,
            current_covers: 0,
        };
        let busy = ServerSection {
            current_covers: 15,
            ..idle.clone()
        };
        let req = request(4);
        assert_eq!(score_table(&table, &req, Some(&idle)).unwrap().0, 170.0);
        assert_eq!(score_table(&table, &req, Some(&busy)).unwrap().0, 155.0);

        let preferred = AssignmentRequest {
            preferred_server_id: Some("s1".into()),
            ..req
        };
        assert_eq!(score_table(&table, &preferred, Some(&busy)).unwrap().0, 170.0);
    }

    #[test]
    fn test_five_plus_four_combination() {
        let mut a = OptimizableTable::new("a", "5", 2, 5);
        a.combinable = true;
        a.combinable_with = vec!["b".into()];
        let mut b = OptimizableTable::new("b", "4", 2, 4);
        b.combinable = true;
        b.combinable_with = vec!["a".into()];
        let mut lonely = OptimizableTable::new("c", "2", 1, 2);
        lonely.combinable = true;
        lonely.combinable_with = vec!["z".into()];

        let result = recommend(&state(vec![a, b, lonely]), &request(9));
        assert!(result.success);
        assert_eq!(result.recommendations.len(), 1);
        let combo = &result.recommendations[0];
        assert!(combo.is_combination);
        assert_eq!(combo.total_capacity, 9);
        assert_eq!(combo.reason, COMBINATION_REASON);
        assert_eq!(combo.score, 100.0);
    }

    #[test]
    fn test_combination_bounds_and_adjacency() {
        let mk = |id: &str, max: u32| {
            let mut t = OptimizableTable::new(id, id, 1, max);
            t.combinable = true;
            t
        };
        let mut not_combinable = mk("n", 6);
        not_combinable.combinable = false;
        let mut single_only = mk("s", 6);
        single_only.max_combination_size = 1;
        let tables = vec![mk("a", 4), mk("b", 4), mk("c", 8), not_combinable, single_only];

        let combos = combinations(&state(tables), &request(7));
        assert!(!combos.is_empty());
        for combo in &combos {
            assert!(combo.total_capacity >= 7 && combo.total_capacity <= 11);
            assert!(!combo.table_ids.contains(&"n".to_string()));
            assert!(!combo.table_ids.contains(&"s".to_string()));
        }
        // a+c and b+c give 12, past 7 + 4
        assert_eq!(combos.len(), 1);
    }

    #[test]
    fn test_no_combination_when_single_fits() {
        let mut a = OptimizableTable::new("a", "1", 2, 5);
        a.combinable = true;
        let mut b = OptimizableTable::new("b", "2", 2, 4);
        b.combinable = true;
        let big = OptimizableTable::new("c", "3", 2, 10);
        let result = recommend(&state(vec![a, b, big]), &request(9));
        assert!(result.recommendations.iter().all(|r| !r.is_combination));
    }

    #[test]
    fn test_occupied_tables_skipped() {
        let mut t = OptimizableTable::new("a", "1", 2, 4);
        t.is_occupied = true;
        assert!(!recommend(&state(vec![t]), &request(2)).success);
    }
}
