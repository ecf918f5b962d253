// Draft-session document analysis.
//
// The raw document is owned by the remote service and only eventually
// consistent with itself, so every pass rebuilds the whole snapshot from
// scratch; nothing is carried over from earlier polls.

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::debug;

use super::types::{ActionKind, DraftAction, DraftAnalysis, DraftPhase};

/// Parse one draft-session document. Returns `None` when the document is too
/// malformed to use (no local seat id); the caller treats that as "no new
/// data" for this tick.
pub fn analyze_draft_session(doc: &Value) -> Option<DraftAnalysis> {
    let local_seat = doc.get("localPlayerSeatId").and_then(|v| v.as_i64())?;

    let ally_seats = seat_roster(doc.get("myTeam"));
    let enemy_seats = seat_roster(doc.get("theirTeam"));

    let mut analysis = DraftAnalysis {
        ally_seats,
        enemy_seats,
        ..DraftAnalysis::default()
    };

    if let Some(groups) = doc.get("actions").and_then(|v| v.as_array()) {
        for (index, group) in groups.iter().enumerate() {
            let Some(entries) = group.as_array() else {
                continue;
            };

            let mut actions = Vec::with_capacity(entries.len());
            for entry in entries {
                if let Some(action) = parse_action(entry, index, &analysis.ally_seats) {
                    actions.push(action);
                }
            }
            if actions.is_empty() {
                continue;
            }

            let kind = actions[0].kind;
            let active = actions.iter().any(|a| !a.is_resolved());

            for action in &actions {
                if action.completed && action.champion_id > 0 {
                    match action.kind {
                        ActionKind::Ban => {
                            analysis.banned_champions.insert(action.champion_id);
                        }
                        ActionKind::Pick => {
                            analysis.picked_champions.insert(action.champion_id);
                            analysis
                                .seat_champions
                                .insert(action.seat_id, action.champion_id);
                        }
                    }
                }

                if action.seat_id == local_seat && action.in_progress && !action.completed {
                    analysis.current_turn = action.turn;
                    analysis.current_player_action = Some(action.clone());
                }
            }

            if active && analysis.active_phase.is_none() {
                analysis.active_phase = Some(index);
            }

            analysis.phases.push(DraftPhase {
                index,
                kind,
                actions,
                active,
            });
        }
    }

    collect_bans(doc.get("bans"), &mut analysis.banned_champions);

    let has_ban = analysis.phases.iter().any(|p| p.kind == ActionKind::Ban);
    let has_pick = analysis.phases.iter().any(|p| p.kind == ActionKind::Pick);
    analysis.is_draft_pick = analysis.phases.len() > 2 && has_ban && has_pick;

    if let Some(timer) = doc.get("timer") {
        analysis.total_time_ms = timer
            .get("totalTimeInPhase")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        analysis.remaining_time_ms = timer
            .get("adjustedTimeLeftInPhase")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
    }

    debug!(
        phases = analysis.phases.len(),
        turn = analysis.current_turn,
        draft_pick = analysis.is_draft_pick,
        "analyzed draft session"
    );
    Some(analysis)
}

fn seat_roster(team: Option<&Value>) -> Vec<i64> {
    team.and_then(|v| v.as_array())
        .map(|players| {
            players
                .iter()
                .filter_map(|p| p.get("seatId").and_then(|v| v.as_i64()))
                .collect()
        })
        .unwrap_or_default()
}

fn parse_action(entry: &Value, phase_index: usize, ally_seats: &[i64]) -> Option<DraftAction> {
    let kind = ActionKind::from_wire(entry.get("type").and_then(|v| v.as_str()).unwrap_or(""))?;
    let id = entry.get("id").and_then(|v| v.as_i64())?;
    let seat_id = entry.get("actorSeatId").and_then(|v| v.as_i64())?;

    Some(DraftAction {
        id,
        seat_id,
        kind,
        champion_id: entry.get("championId").and_then(|v| v.as_i64()).unwrap_or(0),
        in_progress: entry
            .get("isInProgress")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        completed: entry
            .get("completed")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        turn: phase_index as u32 + 1,
        is_ally: ally_seats.contains(&seat_id),
    })
}

/// Normalize both documented ban-list shapes into one champion-id set: a flat
/// array of ban records, or `{allyBans, enemyBans}` whose entries may be bare
/// ids or champion-id-bearing records.
fn collect_bans(bans: Option<&Value>, out: &mut BTreeSet<i64>) {
    let Some(bans) = bans else {
        return;
    };

    match bans {
        Value::Array(entries) => {
            for entry in entries {
                if let Some(id) = ban_entry_champion(entry) {
                    out.insert(id);
                }
            }
        }
        Value::Object(map) => {
            for side in ["allyBans", "enemyBans"] {
                if let Some(entries) = map.get(side).and_then(|v| v.as_array()) {
                    for entry in entries {
                        if let Some(id) = ban_entry_champion(entry) {
                            out.insert(id);
                        }
                    }
                }
            }
        }
        _ => {}
    }
}

fn ban_entry_champion(entry: &Value) -> Option<i64> {
    entry
        .as_i64()
        .or_else(|| entry.get("championId").and_then(|v| v.as_i64()))
        .filter(|id| *id > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn action(id: i64, seat: i64, kind: &str, champion: i64, in_progress: bool, completed: bool) -> Value {
        json!({
            "id": id,
            "actorSeatId": seat,
            "type": kind,
            "championId": champion,
            "isInProgress": in_progress,
            "completed": completed
        })
    }

    fn team(seats: &[i64]) -> Value {
        Value::Array(
            seats
                .iter()
                .map(|s| json!({ "seatId": s, "championId": 0, "assignedPosition": "" }))
                .collect(),
        )
    }

    #[test]
    fn missing_local_seat_is_rejected() {
        assert!(analyze_draft_session(&json!({ "myTeam": [] })).is_none());
    }

    #[test]
    fn finds_current_player_action_and_turn() {
        // Local seat 2, one in-progress pick in phase index 3.
        let doc = json!({
            "localPlayerSeatId": 2,
            "myTeam": team(&[0, 1, 2, 3, 4]),
            "theirTeam": team(&[5, 6, 7, 8, 9]),
            "actions": [
                [action(1, 0, "ban", 12, false, true)],
                [],
                [action(4, 5, "pick", 0, false, false)],
                [action(7, 2, "pick", 0, true, false)]
            ]
        });

        let analysis = analyze_draft_session(&doc).unwrap();
        let current = analysis.current_player_action.expect("local action");
        assert_eq!(current.id, 7);
        assert_eq!(analysis.current_turn, 4);
        assert!(current.is_ally);
    }

    #[test]
    fn active_phase_is_first_unresolved() {
        let doc = json!({
            "localPlayerSeatId": 0,
            "myTeam": team(&[0]),
            "theirTeam": team(&[5]),
            "actions": [
                [action(1, 0, "ban", 20, false, true)],
                [action(2, 5, "ban", 0, true, false)],
                [action(3, 0, "pick", 0, false, false)]
            ]
        });

        let analysis = analyze_draft_session(&doc).unwrap();
        assert_eq!(analysis.active_phase, Some(1));
        assert!(!analysis.phases[0].active);
        assert!(analysis.phases[1].active);
    }

    #[test]
    fn accumulates_only_completed_choices() {
        let doc = json!({
            "localPlayerSeatId": 0,
            "myTeam": team(&[0, 1]),
            "theirTeam": team(&[5, 6]),
            "actions": [
                [
                    action(1, 0, "ban", 20, false, true),
                    action(2, 5, "ban", 0, true, false)
                ],
                [
                    action(3, 1, "pick", 99, false, true),
                    action(4, 6, "pick", 44, true, false)
                ]
            ]
        });

        let analysis = analyze_draft_session(&doc).unwrap();
        assert!(analysis.banned_champions.contains(&20));
        assert_eq!(analysis.banned_champions.len(), 1);
        assert!(analysis.picked_champions.contains(&99));
        assert_eq!(analysis.picked_champions.len(), 1);
        assert_eq!(analysis.seat_champions.get(&1), Some(&99));
        assert!(!analysis.seat_champions.contains_key(&6));
    }

    #[test]
    fn two_phase_session_is_not_draft_pick() {
        let doc = json!({
            "localPlayerSeatId": 0,
            "myTeam": team(&[0]),
            "theirTeam": team(&[5]),
            "actions": [
                [action(1, 0, "ban", 0, true, false)],
                [action(2, 0, "pick", 0, false, false)]
            ]
        });
        assert!(!analyze_draft_session(&doc).unwrap().is_draft_pick);
    }

    #[test]
    fn multi_round_session_is_draft_pick() {
        let doc = json!({
            "localPlayerSeatId": 0,
            "myTeam": team(&[0]),
            "theirTeam": team(&[5]),
            "actions": [
                [action(1, 0, "ban", 0, true, false)],
                [action(2, 5, "ban", 0, false, false)],
                [action(3, 0, "pick", 0, false, false)],
                [action(4, 5, "pick", 0, false, false)],
                [action(5, 0, "pick", 0, false, false)]
            ]
        });
        assert!(analyze_draft_session(&doc).unwrap().is_draft_pick);
    }

    #[test]
    fn array_and_object_ban_shapes_are_equivalent() {
        let base = json!({
            "localPlayerSeatId": 0,
            "myTeam": team(&[0]),
            "theirTeam": team(&[5]),
            "actions": []
        });

        let mut array_form = base.clone();
        array_form["bans"] = json!([
            { "championId": 12 },
            { "championId": 34 },
            { "championId": 56 }
        ]);

        let mut object_form = base.clone();
        object_form["bans"] = json!({
            "allyBans": [12, { "championId": 34 }],
            "enemyBans": [{ "championId": 56 }]
        });

        let from_array = analyze_draft_session(&array_form).unwrap();
        let from_object = analyze_draft_session(&object_form).unwrap();
        assert_eq!(from_array.banned_champions, from_object.banned_champions);
        assert_eq!(
            from_array.banned_champions,
            BTreeSet::from([12, 34, 56])
        );
    }

    #[test]
    fn zero_and_garbage_ban_entries_are_ignored() {
        let doc = json!({
            "localPlayerSeatId": 0,
            "myTeam": team(&[0]),
            "theirTeam": team(&[5]),
            "actions": [],
            "bans": [0, "??", { "championId": 0 }, { "championId": 7 }]
        });
        let analysis = analyze_draft_session(&doc).unwrap();
        assert_eq!(analysis.banned_champions, BTreeSet::from([7]));
    }

    #[test]
    fn reveal_entries_are_dropped_but_indexes_kept() {
        let doc = json!({
            "localPlayerSeatId": 0,
            "myTeam": team(&[0]),
            "theirTeam": team(&[5]),
            "actions": [
                [action(1, 0, "ban", 0, false, true)],
                [{ "id": 2, "actorSeatId": -1, "type": "ten_bans_reveal" }],
                [action(3, 0, "pick", 0, true, false)]
            ]
        });

        let analysis = analyze_draft_session(&doc).unwrap();
        assert_eq!(analysis.phases.len(), 2);
        // The pick group keeps its original matrix index and turn number.
        assert_eq!(analysis.phases[1].index, 2);
        assert_eq!(analysis.phases[1].actions[0].turn, 3);
    }

    #[test]
    fn timer_fields_are_read_in_milliseconds() {
        let doc = json!({
            "localPlayerSeatId": 0,
            "myTeam": team(&[0]),
            "theirTeam": team(&[5]),
            "actions": [],
            "timer": { "totalTimeInPhase": 30000, "adjustedTimeLeftInPhase": 12345 }
        });
        let analysis = analyze_draft_session(&doc).unwrap();
        assert_eq!(analysis.total_time_ms, 30000);
        assert_eq!(analysis.remaining_time_ms, 12345);
    }
}
