use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    Good,
    Bad,
    Neutral,
}

macro_rules! character_catalog {
    ($($variant:ident => $name:literal, $alignment:ident;)+) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Character {
            $($variant,)+
        }

        impl Character {
            pub const ALL: &'static [Character] = &[$(Character::$variant,)+];

            pub fn name(self) -> &'static str {
                match self {
                    $(Character::$variant => $name,)+
                }
            }

            pub fn alignment(self) -> Alignment {
                match self {
                    $(Character::$variant => Alignment::$alignment,)+
                }
            }

            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $($name => Some(Character::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

character_catalog! {
    Viviana => "Viviana", Good;
    KingArthur => "King-Arthur", Good;
    Seer => "Seer", Good;
    Titanya => "Titanya", Good;
    Galahad => "Galahad", Good;
    Nimue => "Nimue", Good;
    SirKay => "Sir-Kay", Good;
    GoodAngel => "Good-Angel", Good;
    Percival => "Percival", Good;
    Merlin => "Merlin", Good;
    Tristan => "Tristan", Good;
    Iseult => "Iseult", Good;
    PrinceClaudin => "Prince-Claudin", Good;
    Nirlem => "Nirlem", Good;
    SirRobin => "Sir-Robin", Good;
    Pellinore => "Pellinore", Good;
    Lot => "Lot", Good;
    Cordana => "Cordana", Good;
    TheCoward => "The-Coward", Good;
    MerlinApprentice => "Merlin-Apprentice", Good;
    LancelotGood => "Lancelot-Good", Good;
    Guinevere => "Guinevere", Good;
    Galaad => "Galaad", Good;
    Raven => "Raven", Good;
    Balain => "Balain", Good;
    SirGawain => "Sir-Gawain", Good;
    Jarvan => "Jarvan", Good;
    Stray => "Stray", Good;
    Ector => "Ector", Good;
    Elaine => "Elaine", Good;
    Blanchefleur => "Blanchefleur", Good;
    TomThumb => "Tom-Thumb", Good;
    Gornemant => "Gornemant", Good;
    Dagonet => "Dagonet", Good;
    Meliagant => "Meliagant", Good;
    Bors => "Bors", Good;
    UtherPendragon => "Uther-Pendragon", Good;
    LoyalServant => "Loyal-Servant-Of-Arthur", Good;
    LoyalServant1 => "Loyal-Servant-Of-Arthur1", Good;
    LoyalServant2 => "Loyal-Servant-Of-Arthur2", Good;
    LoyalServant3 => "Loyal-Servant-Of-Arthur3", Good;
    LoyalServant4 => "Loyal-Servant-Of-Arthur4", Good;
    Morgana => "Morgana", Bad;
    Assassin => "Assassin", Bad;
    Mordred => "Mordred", Bad;
    Oberon => "Oberon", Bad;
    BadAngel => "Bad-Angel", Bad;
    KingClaudin => "King-Claudin", Bad;
    Polygraph => "Polygraph", Bad;
    Accolon => "Accolon", Bad;
    LancelotBad => "Lancelot-Bad", Bad;
    QueenMab => "Queen-Mab", Bad;
    Balin => "Balin", Bad;
    Maeve => "Maeve", Bad;
    Agravain => "Agravain", Bad;
    Nerzhul => "Nerzhul", Bad;
    Mora => "Mora", Bad;
    Melwas => "Melwas", Bad;
    Claudas => "Claudas", Bad;
    Minion => "Minion-Of-Mordred", Bad;
    Minion1 => "Minion-Of-Mordred1", Bad;
    Minion2 => "Minion-Of-Mordred2", Bad;
    Ginerva => "Ginerva", Neutral;
    Puck => "Puck", Neutral;
    Gawain => "Gawain", Neutral;
    TheQuestingBeast => "The-Questing-Beast", Neutral;
}

/// Disguises Stray may be redrawn into, besides Mordred.
pub const STRAY_DISGUISES: &[Character] = &[
    Character::GoodAngel,
    Character::Titanya,
    Character::Nimue,
    Character::Raven,
    Character::KingArthur,
    Character::SirRobin,
    Character::TheCoward,
    Character::MerlinApprentice,
    Character::Guinevere,
    Character::Gornemant,
    Character::Blanchefleur,
    Character::SirGawain,
    Character::Elaine,
    Character::LoyalServant,
    Character::LoyalServant1,
    Character::LoyalServant2,
    Character::LoyalServant3,
    Character::LoyalServant4,
];

impl Character {
    pub fn is_good(self) -> bool {
        self.alignment() == Alignment::Good
    }

    pub fn is_bad(self) -> bool {
        self.alignment() == Alignment::Bad
    }

    /// Side a character is counted on when validating a selection.
    pub fn counts_as_bad(self) -> bool {
        match self {
            Self::Puck => false,
            Self::Ginerva | Self::Gawain | Self::TheQuestingBeast => true,
            other => other.is_bad(),
        }
    }

    /// Characters whose presence on a team keeps it from counting as all-good.
    pub fn spoils_good_team(self) -> bool {
        self.is_bad() || matches!(self, Self::Gawain | Self::Ginerva | Self::Lot)
    }

    pub fn is_angel(self) -> bool {
        matches!(self, Self::GoodAngel | Self::BadAngel)
    }

    /// Characters the Assassin may try to name after a good win.
    pub fn is_assassin_target(self) -> bool {
        matches!(
            self,
            Self::MerlinApprentice
                | Self::Merlin
                | Self::Viviana
                | Self::Nirlem
                | Self::LancelotGood
        )
    }
}

impl Serialize for Character {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl std::fmt::Display for Character {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
