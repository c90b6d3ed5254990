use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::config::AbsentPlayerPolicy;

pub type PlayerId = String;

#[derive(Debug, thiserror::Error)]
#[error("unknown santa color `{0}`")]
pub struct SkinError(pub String);

/// Cosmetic skin. The wire form is the lowercase label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SantaColor {
    #[default]
    Red,
    Green,
    Blue,
    Yellow,
    Purple,
    Black,
}

impl SantaColor {
    pub const ALL: [SantaColor; 6] = [
        Self::Red,
        Self::Green,
        Self::Blue,
        Self::Yellow,
        Self::Purple,
        Self::Black,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Yellow => "yellow",
            Self::Purple => "purple",
            Self::Black => "black",
        }
    }

    /// Sprite asset for this skin. Left-facing sprites are the mirrored image.
    pub fn icon(self, is_left: bool) -> &'static str {
        match (self, is_left) {
            (Self::Red, false) => "santa-red.png",
            (Self::Red, true) => "santa-red-left.png",
            (Self::Green, false) => "santa-green.png",
            (Self::Green, true) => "santa-green-left.png",
            (Self::Blue, false) => "santa-blue.png",
            (Self::Blue, true) => "santa-blue-left.png",
            (Self::Yellow, false) => "santa-yellow.png",
            (Self::Yellow, true) => "santa-yellow-left.png",
            (Self::Purple, false) => "santa-purple.png",
            (Self::Purple, true) => "santa-purple-left.png",
            (Self::Black, false) => "santa-black.png",
            (Self::Black, true) => "santa-black-left.png",
        }
    }
}

impl fmt::Display for SantaColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SantaColor {
    type Err = SkinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|color| color.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| SkinError(s.to_string()))
    }
}

impl TryFrom<String> for SantaColor {
    type Error = SkinError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SantaColor> for String {
    fn from(color: SantaColor) -> Self {
        color.label().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Player {
    pub id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub nickname: String,
    pub santa_color: SantaColor,
    pub is_left: bool,
    pub kills: u32,
    pub deaths: u32,
    pub can_fire: bool,
}

impl Player {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Field-by-field merge. Only fields the server actually sent are touched.
    pub fn apply(&mut self, update: &PlayerUpdate) {
        if let Some(x) = update.x {
            self.x = x;
        }
        if let Some(y) = update.y {
            self.y = y;
        }
        if let Some(nickname) = &update.nickname {
            self.nickname.clone_from(nickname);
        }
        if let Some(santa_color) = update.santa_color {
            self.santa_color = santa_color;
        }
        if let Some(is_left) = update.is_left {
            self.is_left = is_left;
        }
        if let Some(kills) = update.kills {
            self.kills = kills;
        }
        if let Some(deaths) = update.deaths {
            self.deaths = deaths;
        }
        if let Some(can_fire) = update.can_fire {
            self.can_fire = can_fire;
        }
    }
}

impl From<&PlayerUpdate> for Player {
    fn from(update: &PlayerUpdate) -> Self {
        let mut player = Player {
            id: update.id.clone(),
            ..Default::default()
        };
        player.apply(update);
        player
    }
}

/// A player entry as sent by the server; every field but `id` may be omitted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdate {
    pub id: PlayerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub santa_color: Option<SantaColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_left: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kills: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deaths: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_fire: Option<bool>,
}

/// Keyed merge of an incoming, possibly partial, player list.
///
/// Known ids are merged in place and keep their position. Unknown ids are
/// appended in the order the server sent them. Known ids missing from
/// `incoming` are kept or dropped according to `policy`.
pub fn merge_players(
    existing: &[Player],
    incoming: &[PlayerUpdate],
    policy: AbsentPlayerPolicy,
) -> Vec<Player> {
    let mut merged = existing.to_vec();
    let mut index: HashMap<PlayerId, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, player)| (player.id.clone(), i))
        .collect();

    for update in incoming {
        match index.get(&update.id) {
            Some(&i) => merged[i].apply(update),
            None => {
                index.insert(update.id.clone(), merged.len());
                merged.push(Player::from(update));
            }
        }
    }

    if policy == AbsentPlayerPolicy::Remove {
        let present: HashSet<&str> = incoming.iter().map(|u| u.id.as_str()).collect();
        merged.retain(|player| present.contains(player.id.as_str()));
    }

    merged
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Score {
    pub kills: u32,
    pub deaths: u32,
    pub player: PlayerId,
    pub nickname: String,
    pub santa_color: SantaColor,
}

impl From<&Player> for Score {
    fn from(player: &Player) -> Self {
        Self {
            kills: player.kills,
            deaths: player.deaths,
            player: player.id.clone(),
            nickname: player.nickname.clone(),
            santa_color: player.santa_color,
        }
    }
}

pub fn scores_from(players: &[Player]) -> Vec<Score> {
    players.iter().map(Score::from).collect()
}
