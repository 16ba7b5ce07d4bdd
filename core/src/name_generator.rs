//! Deterministic official names from curated medieval name lists.
//!
//! Same stream = same names.

use crate::{model::OfficialRole, rng::StreamRng};

pub struct NameGenerator;

impl NameGenerator {
    /// "Given Byname", e.g. "Osric Ashford".
    pub fn full_name(rng: &mut StreamRng) -> String {
        format!("{} {}", Self::given_name(rng), Self::byname(rng))
    }

    /// Full name with a role-flavoured epithet, e.g. "Maud Thorne the Steward".
    pub fn official_name(rng: &mut StreamRng, role: OfficialRole) -> String {
        let name = Self::full_name(rng);
        if rng.chance(0.25) {
            let epithet = rng.pick(Self::epithets()).copied().unwrap_or("the Elder");
            format!("{name} {epithet}")
        } else {
            format!("{name} the {}", Self::role_title(role))
        }
    }

    pub fn given_name(rng: &mut StreamRng) -> &'static str {
        rng.pick(Self::given_names()).copied().unwrap_or("Anon")
    }

    pub fn byname(rng: &mut StreamRng) -> &'static str {
        rng.pick(Self::bynames()).copied().unwrap_or("of Nowhere")
    }

    pub fn role_title(role: OfficialRole) -> &'static str {
        match role {
            OfficialRole::Bailiff   => "Bailiff",
            OfficialRole::Wizard    => "Wizard",
            OfficialRole::Architect => "Architect",
            OfficialRole::Steward   => "Steward",
            OfficialRole::Reeve     => "Reeve",
            OfficialRole::Beadle    => "Beadle",
            OfficialRole::Constable => "Constable",
            OfficialRole::Forester  => "Forester",
        }
    }

    fn given_names() -> &'static [&'static str] {
        &[
            "Aldous", "Ambrose", "Anselm", "Baldwin", "Bertram", "Cedric", "Conrad",
            "Drogo", "Edmund", "Egbert", "Everard", "Fulk", "Geoffrey", "Godfrey",
            "Hamon", "Hugh", "Ivo", "Jocelyn", "Lambert", "Leofric", "Milo", "Osric",
            "Osbert", "Percival", "Ralf", "Reginald", "Roger", "Simon", "Tancred",
            "Thurstan", "Walter", "Wystan",
            "Adela", "Agnes", "Alice", "Avice", "Beatrix", "Cecily", "Edith", "Elaine",
            "Emma", "Ermengarde", "Godiva", "Gunnora", "Hawise", "Isolde", "Juliana",
            "Letitia", "Mabel", "Matilda", "Maud", "Millicent", "Petronilla", "Rohese",
            "Sibyl", "Wymarc",
        ]
    }

    fn bynames() -> &'static [&'static str] {
        &[
            "Ashford", "Blackwood", "Bramley", "Carrow", "Dunmore", "Fairleigh",
            "Fenwick", "Greythorn", "Hallam", "Harrow", "Kettering", "Langley",
            "Marsh", "Netherby", "Oakhurst", "Penrose", "Ravensworth", "Redmayne",
            "Stow", "Thorne", "Underhill", "Wexley", "Whitlock", "Wycliffe",
            "atte Wode", "de Mowbray", "de Clare", "FitzAlan", "le Bret", "le Gros",
        ]
    }

    fn epithets() -> &'static [&'static str] {
        &[
            "the Elder", "the Younger", "the Wise", "the Patient", "the Stern",
            "the Fair", "the Grey", "Ironhand", "Quillfinger", "the Unbending",
        ]
    }
}
