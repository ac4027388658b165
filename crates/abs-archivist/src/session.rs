use abs_core::records::Entity;
use abs_core::relation::{normalize_relation, Relation, RelationAliases};
use chrono::{DateTime, Utc};
use std::cell::{Cell, OnceCell};
use std::collections::BTreeSet;

/// NPC factions, spelled as the game prints them.
pub const NEUTRAL_PLAYERS: [&str; 2] = ["Civil Goverment", "Ghosts of the Past"];

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replays.
pub struct FixedClock {
    now: Cell<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for std::rc::Rc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

type PlayerResolver = Box<dyn Fn() -> Option<String>>;

/// Facts that hold for one archivist session: who the local player is, how
/// relation labels map to codes, and what time it is.
pub struct Session {
    local_player: OnceCell<Option<String>>,
    resolver: Option<PlayerResolver>,
    aliases: RelationAliases,
    neutral_players: BTreeSet<String>,
    clock: Box<dyn Clock>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            local_player: OnceCell::new(),
            resolver: None,
            aliases: RelationAliases::default(),
            neutral_players: NEUTRAL_PLAYERS.iter().map(|name| name.to_string()).collect(),
            clock: Box::new(SystemClock),
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_local_player(mut self, name: impl Into<String>) -> Self {
        self.set_local_player(name);
        self
    }

    /// Resolver consulted once, the first time the local player is needed.
    pub fn with_player_resolver(mut self, resolver: impl Fn() -> Option<String> + 'static) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    pub fn with_relation_aliases(mut self, aliases: RelationAliases) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_neutral_players<I, S>(mut self, players: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.neutral_players = players.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn set_local_player(&mut self, name: impl Into<String>) {
        let name = name.into().trim().to_string();
        self.local_player = OnceCell::from((!name.is_empty()).then_some(name));
    }

    pub fn local_player(&self) -> Option<&str> {
        self.local_player
            .get_or_init(|| {
                self.resolver
                    .as_ref()
                    .and_then(|resolve| resolve())
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
            })
            .as_deref()
    }

    pub fn relation_aliases(&self) -> &RelationAliases {
        &self.aliases
    }

    pub fn normalize_relation(&self, text: &str) -> Option<Relation> {
        normalize_relation(text, &self.aliases)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Owner fixups for colonies, fleets and signatures.
    ///
    /// The local player's entities are always `My`; `My` without a player gets
    /// the local player; NPC factions default to `Neutral`.
    pub fn fix_affiliation(&self, entity: &mut Entity) {
        let local = self.local_player();
        let Some(affiliation) = entity.affiliation_mut() else {
            return;
        };

        match (affiliation.player.as_deref(), local) {
            (Some(player), Some(local)) if player == local => {
                *affiliation.relation = Some(Relation::My);
            }
            (Some(player), _) if affiliation.relation.is_none() => {
                if self.neutral_players.contains(player) {
                    *affiliation.relation = Some(Relation::Neutral);
                }
            }
            _ => {}
        }

        if affiliation.player.is_none() && *affiliation.relation == Some(Relation::My) {
            *affiliation.player = local.map(str::to_string);
        }
    }
}
