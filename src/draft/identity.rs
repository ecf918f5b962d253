// Best-effort logical identity for a draft session.
//
// The service never exposes a single authoritative session key, so identity
// is derived through an ordered fallback chain. Each step is tried only when
// the previous one yields nothing. The payload-hash tail of the chain can
// misfire if the server shuffles cosmetic fields between polls; a
// server-guaranteed id is preferred whenever the document carries one.

use std::fmt;

use serde_json::Value;

/// Composite tagged key ("game:1234", "roster:ab12..") used to decide
/// whether two polls describe the same logical draft.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionIdentity(String);

impl SessionIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn resolve_session_identity(doc: &Value) -> SessionIdentity {
    if let Some(game_id) = numeric_game_id(doc) {
        return SessionIdentity(format!("game:{}", game_id));
    }

    if let Some(chat) = doc
        .get("chatDetails")
        .and_then(|c| c.get("multiUserChatId"))
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
    {
        return SessionIdentity(format!("chat:{}", chat));
    }

    if let Some(roster) = doc
        .get("myTeam")
        .and_then(|v| v.as_array())
        .filter(|a| !a.is_empty())
    {
        return SessionIdentity(format!("roster:{}", hash_value(&Value::Array(roster.clone()))));
    }

    if let Some(timer) = doc.get("timer").filter(|t| t.is_object()) {
        return SessionIdentity(format!("timer:{}", hash_value(timer)));
    }

    SessionIdentity(format!("doc:{}", hash_value(doc)))
}

/// Identity of one ready-check pop-up, derived from its declared time.
pub fn ready_check_identity(declared_time: i64) -> SessionIdentity {
    SessionIdentity(format!("ready-check:{}", declared_time))
}

fn numeric_game_id(doc: &Value) -> Option<i64> {
    doc.get("gameId")
        .and_then(|v| v.as_i64())
        .filter(|id| *id > 0)
        .or_else(|| {
            doc.get("gameData")
                .and_then(|gd| gd.get("gameId"))
                .and_then(|v| v.as_i64())
                .filter(|id| *id > 0)
        })
}

fn hash_value(value: &Value) -> String {
    // serde_json serializes object keys in sorted order, so the digest is
    // stable across polls that only reorder fields.
    let serialized = serde_json::to_string(value).unwrap_or_default();
    format!("{:x}", md5::compute(serialized))
}
