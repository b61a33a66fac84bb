//! Shipment status registry.
//!
//! Maps the 14 internal logistics status codes assigned by agents to the
//! client-facing vocabulary shown on every dashboard: a display title, a
//! coarse [`Phase`], a [`ColorTag`] and a short operator label.
//!
//! The wire codes are a contract with the server and must stay
//! byte-identical. Unknown codes are never an error: they map to the
//! `Traitement` fallback so that statuses added server-side render
//! before the client learns about them.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Coarse lifecycle stage grouping several internal statuses.
///
/// The first four variants are ordered; `Traitement` is the display
/// phase of unknown statuses and has no position in the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    #[serde(rename = "Départ")]
    Depart,
    #[serde(rename = "Transit")]
    Transit,
    #[serde(rename = "Douane")]
    Douane,
    #[serde(rename = "Livraison")]
    Livraison,
    #[serde(rename = "Traitement")]
    Traitement,
}

impl Phase {
    /// The ordered phase sequence used for progress computation.
    pub const TRACKED: [Phase; 4] = [Phase::Depart, Phase::Transit, Phase::Douane, Phase::Livraison];

    /// Position in [`Phase::TRACKED`], or `None` for `Traitement`.
    pub fn index(self) -> Option<usize> {
        Self::TRACKED.iter().position(|p| *p == self)
    }

    /// Progress percentage: `(index + 1) / 4 * 100`, `0` outside the sequence.
    pub fn progress(self) -> u8 {
        match self.index() {
            Some(i) => (((i + 1) * 100) / Self::TRACKED.len()) as u8,
            None => 0,
        }
    }

    /// Badge color of every status in this phase.
    pub fn color(self) -> ColorTag {
        match self {
            Phase::Depart => ColorTag::Blue,
            Phase::Transit => ColorTag::Yellow,
            Phase::Douane => ColorTag::Orange,
            Phase::Livraison => ColorTag::Green,
            Phase::Traitement => ColorTag::Gray,
        }
    }

    /// The wire/display name (`"Départ"`, `"Transit"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Depart => "Départ",
            Phase::Transit => "Transit",
            Phase::Douane => "Douane",
            Phase::Livraison => "Livraison",
            Phase::Traitement => "Traitement",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ColorTag
// ---------------------------------------------------------------------------

/// Badge color tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorTag {
    Blue,
    Yellow,
    Orange,
    Green,
    Gray,
}

impl ColorTag {
    pub fn as_str(self) -> &'static str {
        match self {
            ColorTag::Blue => "blue",
            ColorTag::Yellow => "yellow",
            ColorTag::Orange => "orange",
            ColorTag::Green => "green",
            ColorTag::Gray => "gray",
        }
    }
}

impl fmt::Display for ColorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ShipmentStatus
// ---------------------------------------------------------------------------

macro_rules! define_shipment_statuses {
    (
        $(
            $(#[$vmeta:meta])*
            $variant:ident => $code:literal, $phase:ident, $title:literal, $label:literal;
        )+
    ) => {
        /// Internal logistics status, assigned server-side by agent actions.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum ShipmentStatus {
            $( $(#[$vmeta])* #[serde(rename = $code)] $variant ),+
        }

        impl ShipmentStatus {
            /// Every status, in the order operators pick them from.
            pub const ALL: &'static [ShipmentStatus] = &[ $( ShipmentStatus::$variant ),+ ];

            /// The wire code, e.g. `"EN_MER"`.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( ShipmentStatus::$variant => $code ),+
                }
            }

            /// Look up a wire code. Exact, case-sensitive match.
            pub fn from_code(code: &str) -> Option<Self> {
                match code {
                    $( $code => Some(ShipmentStatus::$variant), )+
                    _ => None,
                }
            }

            pub fn phase(self) -> Phase {
                match self {
                    $( ShipmentStatus::$variant => Phase::$phase ),+
                }
            }

            /// Title shown to clients.
            pub fn client_title(self) -> &'static str {
                match self {
                    $( ShipmentStatus::$variant => $title ),+
                }
            }

            /// Short operator-facing label.
            pub fn label(self) -> &'static str {
                match self {
                    $( ShipmentStatus::$variant => $label ),+
                }
            }
        }
    };
}

define_shipment_statuses! {
    /// Case opened, nothing collected yet.
    DossierOuvert => "DOSSIER_OUVERT", Depart, "Dossier ouvert", "Dossier ouvert";
    Ramassage => "RAMASSAGE", Depart, "Enlèvement de la marchandise", "Ramassage";
    FormalitesExport => "FORMALITES_EXPORT", Depart, "Formalités export", "Formalités export";
    Embarquement => "EMBARQUEMENT", Depart, "Embarquement", "Embarquement";
    EnMer => "EN_MER", Transit, "En mer", "En mer";
    EnVol => "EN_VOL", Transit, "En vol", "En vol";
    ArriveePort => "ARRIVEE_PORT", Transit, "Arrivée au port", "Arrivée port";
    DepotDouane => "DEPOT_DOUANE", Douane, "Dépôt en douane", "Dépôt douane";
    Cotation => "COTATION", Douane, "Cotation douanière", "Cotation";
    /// Physical or scanner inspection by customs.
    VisiteScanner => "VISITE_SCANNER", Douane, "Contrôle douanier", "Visite scanner";
    /// Bon à enlever: customs release granted.
    BaeValide => "BAE_VALIDE", Douane, "Bon à enlever validé", "BAE validé";
    SortieTerminal => "SORTIE_TERMINAL", Livraison, "Sortie du terminal", "Sortie terminal";
    LivraisonCours => "LIVRAISON_COURS", Livraison, "En cours de livraison", "Livraison en cours";
    Livre => "LIVRE", Livraison, "Livré", "Livré";
}

impl ShipmentStatus {
    pub fn descriptor(self) -> StatusDescriptor {
        let phase = self.phase();
        StatusDescriptor {
            client_title: Cow::Borrowed(self.client_title()),
            phase,
            color: phase.color(),
            label: Cow::Borrowed(self.label()),
        }
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShipmentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| {
            CoreError::Validation(format!(
                "Unknown shipment status '{s}'. Must be one of: {}",
                ShipmentStatus::ALL
                    .iter()
                    .map(|st| st.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// Registry lookups
// ---------------------------------------------------------------------------

/// Display metadata for one status code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDescriptor {
    pub client_title: Cow<'static, str>,
    pub phase: Phase,
    pub color: ColorTag,
    pub label: Cow<'static, str>,
}

/// Phase and progress percentage for one status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseProgress {
    pub phase: Phase,
    /// One of 0, 25, 50, 75, 100.
    pub progress: u8,
}

/// Translate an internal status code into display metadata.
///
/// Total: unrecognized codes yield `Traitement`/`gray` with the raw code
/// as both title and label.
pub fn get_client_status(internal_status: &str) -> StatusDescriptor {
    match ShipmentStatus::from_code(internal_status) {
        Some(status) => status.descriptor(),
        None => StatusDescriptor {
            client_title: Cow::Owned(internal_status.to_string()),
            phase: Phase::Traitement,
            color: ColorTag::Gray,
            label: Cow::Owned(internal_status.to_string()),
        },
    }
}

/// Coarse progress for an internal status code.
///
/// All statuses of one phase report the same percentage.
pub fn get_status_phase(internal_status: &str) -> PhaseProgress {
    let phase = get_client_status(internal_status).phase;
    PhaseProgress {
        phase,
        progress: phase.progress(),
    }
}
