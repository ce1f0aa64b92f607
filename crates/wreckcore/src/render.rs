use wreckproto::gateway::Card;

use crate::catalog::ObjectDefinition;
use crate::GameError;

pub(crate) fn ship_stat_fields(def: &ObjectDefinition) -> Vec<(String, String)> {
    let armament = if def.weapons.is_empty() {
        "unarmed".to_string()
    } else {
        def.weapons
            .iter()
            .map(|w| format!("{} ({})", w.name, w.damage))
            .collect::<Vec<_>>()
            .join(", ")
    };
    vec![
        ("Class".to_string(), def.category.clone()),
        ("Hull".to_string(), def.hp().to_string()),
        ("Attack".to_string(), def.attack_value().to_string()),
        ("Defense".to_string(), def.defense_value().to_string()),
        ("Price".to_string(), def.price().to_string()),
        ("Armament".to_string(), armament),
    ]
}

pub(crate) fn encounter_card(def: &ObjectDefinition) -> Card {
    let mut card = Card::new(
        format!("A derelict {} drifts into view", def.name),
        "First crew to bring it down claims the wreck. `engage` to open fire.",
    );
    card.fields = ship_stat_fields(def);
    if let Some(url) = &def.image {
        card = card.image(url.clone());
    }
    card
}

pub(crate) fn error_card(err: &GameError) -> Card {
    Card::new("No dice", err.to_string())
}
