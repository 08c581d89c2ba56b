//! Grouped listing counts for the statistics page. Nothing is maintained
//! incrementally; every request aggregates the current rows.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{AdStatRow, Id, PetStatus};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupStat {
    /// District name or pet type, depending on the grouping.
    pub key: String,
    pub total: u64,
    pub active: u64,
    pub found: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScopeStats {
    pub total: u64,
    pub active: u64,
    pub found: u64,
    pub districts: Vec<GroupStat>,
    pub types: Vec<GroupStat>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatisticsReport {
    pub overall: ScopeStats,
    /// Present only for an authenticated caller: their own ads.
    pub mine: Option<ScopeStats>,
    /// Present only for an authenticated caller: everyone else's ads.
    pub others: Option<ScopeStats>,
}

fn is_active(s: PetStatus) -> bool {
    s == PetStatus::InSearch
}

fn is_found(s: PetStatus) -> bool {
    s == PetStatus::Found
}

/// Distinct values in first-seen order, then sorted for stable output.
fn distinct<F: Fn(&AdStatRow) -> &str>(rows: &[AdStatRow], f: F) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for row in rows {
        let v = f(row);
        if !seen.iter().any(|s| s == v) {
            seen.push(v.to_string());
        }
    }
    seen
}

fn group_by<'a, F: Fn(&AdStatRow) -> &str>(
    rows: &[&'a AdStatRow],
    keys: &[String],
    f: F,
) -> Vec<GroupStat> {
    let mut out: Vec<GroupStat> = keys
        .iter()
        .map(|key| {
            let matching: Vec<_> = rows.iter().filter(|r| f(r) == key).collect();
            GroupStat {
                key: key.clone(),
                total: matching.len() as u64,
                active: matching.iter().filter(|r| is_active(r.status)).count() as u64,
                found: matching.iter().filter(|r| is_found(r.status)).count() as u64,
            }
        })
        .collect();
    // largest first, name as a tiebreak
    out.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.key.cmp(&b.key)));
    out
}

fn scope_stats(rows: &[&AdStatRow], districts: &[String], types: &[String]) -> ScopeStats {
    ScopeStats {
        total: rows.len() as u64,
        active: rows.iter().filter(|r| is_active(r.status)).count() as u64,
        found: rows.iter().filter(|r| is_found(r.status)).count() as u64,
        districts: group_by(rows, districts, |r| &r.district),
        types: group_by(rows, types, |r| &r.pet_type),
    }
}

/// Build the full report. `actor` splits the breakdown into mine/others;
/// the district and type row sets are the global distinct values for every
/// scope, so all three tables line up row for row.
pub fn build_report(rows: &[AdStatRow], actor: Option<Id>) -> StatisticsReport {
    let districts = distinct(rows, |r| &r.district);
    let types = distinct(rows, |r| &r.pet_type);

    let all: Vec<&AdStatRow> = rows.iter().collect();
    let overall = scope_stats(&all, &districts, &types);

    let (mine, others) = match actor {
        Some(user_id) => {
            let mine_rows: Vec<&AdStatRow> =
                rows.iter().filter(|r| r.user_id == user_id).collect();
            let others_rows: Vec<&AdStatRow> =
                rows.iter().filter(|r| r.user_id != user_id).collect();
            (
                Some(scope_stats(&mine_rows, &districts, &types)),
                Some(scope_stats(&others_rows, &districts, &types)),
            )
        }
        None => (None, None),
    };

    StatisticsReport { overall, mine, others }
}
