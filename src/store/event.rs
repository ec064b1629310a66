use serde::{Deserialize, Serialize};

use crate::error::GameError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Origin {
    /// Informational history of successful banks.
    #[default]
    Banked,
    /// Committed through the save/mint hook; eligible for the leaderboard.
    Saved,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Banked => "BANKED",
            Origin::Saved => "SAVED",
        }
    }
}

/// Identity handed to the core by the host. Never derived or checked beyond non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub display_name: Option<String>,
}

impl Participant {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), display_name: None }
    }

    pub fn with_name(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), display_name: Some(name.into()) }
    }

    /// Name for a board row: the display name, else a shortened id.
    pub fn label(&self) -> String {
        match &self.display_name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => short_id(&self.id),
        }
    }
}

/// `0x1234…abcd` style abbreviation for long ids.
pub fn short_id(id: &str) -> String {
    let chars: Vec<char> = id.chars().collect();
    if chars.len() <= 12 {
        return id.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}

/// The round behind a bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankDetail {
    pub run_points: u64,
    pub pumps: u32,
    pub multiplier: f64,
}

/// One historical score. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEvent {
    pub ts: i64,
    pub participant_id: String,
    pub score: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<BankDetail>,
    /// Implied by the list an event is stored in.
    #[serde(skip)]
    pub origin: Origin,
}

impl ScoreEvent {
    pub fn banked(ts: i64, who: &Participant, total: u64, detail: BankDetail) -> Self {
        Self {
            ts,
            participant_id: who.id.clone(),
            score: total,
            display_name: who.display_name.clone(),
            detail: Some(detail),
            origin: Origin::Banked,
        }
    }

    pub fn saved(ts: i64, who: &Participant, score: u64) -> Self {
        Self {
            ts,
            participant_id: who.id.clone(),
            score,
            display_name: who.display_name.clone(),
            detail: None,
            origin: Origin::Saved,
        }
    }

    /// Build from untrusted input, rejecting negative scores and missing identities.
    pub fn try_new(
        ts: i64,
        participant_id: &str,
        score: i64,
        display_name: Option<String>,
        origin: Origin,
    ) -> Result<Self, GameError> {
        if score < 0 {
            return Err(GameError::validation(format!("negative score {}", score)));
        }
        let event = Self {
            ts,
            participant_id: participant_id.to_string(),
            score: score as u64,
            display_name,
            detail: None,
            origin,
        };
        event.validate()?;
        Ok(event)
    }

    pub fn validate(&self) -> Result<(), GameError> {
        if self.participant_id.trim().is_empty() {
            return Err(GameError::validation("missing participant id"));
        }
        Ok(())
    }

    pub fn participant(&self) -> Participant {
        Participant {
            id: self.participant_id.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_new_rejects_negative_score() {
        let err = ScoreEvent::try_new(0, "0xA", -1, None, Origin::Saved).unwrap_err();
        assert!(matches!(err, GameError::Validation { .. }));
    }

    #[test]
    fn test_try_new_rejects_blank_participant() {
        assert!(ScoreEvent::try_new(0, "  ", 10, None, Origin::Saved).is_err());
        assert!(ScoreEvent::try_new(0, "0xA", 0, None, Origin::Saved).is_ok());
    }

    #[test]
    fn test_serialized_shape() {
        let who = Participant::with_name("0xA", "alice");
        let ev = ScoreEvent::saved(5, &who, 100);
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["ts"], 5);
        assert_eq!(v["participantId"], "0xA");
        assert_eq!(v["score"], 100);
        assert_eq!(v["displayName"], "alice");
        assert!(v.get("origin").is_none());
        assert!(v.get("detail").is_none());
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0xA"), "0xA");
        assert_eq!(short_id("0x1234567890abcdef"), "0x1234…cdef");
        assert_eq!(Participant::new("0x1234567890abcdef").label(), "0x1234…cdef");
        assert_eq!(Participant::with_name("0x1", "bob").label(), "bob");
    }
}
