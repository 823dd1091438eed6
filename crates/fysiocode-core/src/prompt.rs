//! Builds the fixed system instruction and converts conversation turns into
//! provider chat messages.

use fysiocode_provider::ChatMessage;
use fysiocode_schema::{Turn, TurnKind, TurnRole};
use fysiocode_taxonomy::CodeTable;

/// Fixed Dutch instruction with a digest of both segment tables and a strict
/// JSON output contract. Built once per resolver.
pub fn build_system_prompt(table: &CodeTable) -> String {
    let mut prompt = String::from(
        "Je bent een klinisch codeerassistent voor fysiotherapie. \
Je vertaalt een klachtbeschrijving van een patiënt naar maximaal drie \
diagnosecodes van vier cijfers: de eerste twee cijfers zijn de lichaamslocatie, \
de laatste twee de pathologie. Gebruik uitsluitend segmenten uit de \
onderstaande tabellen.\n\nLocatiesegmenten:\n",
    );
    for (segment, name) in table.locations() {
        prompt.push_str(&format!("  {segment} {name}\n"));
    }
    prompt.push_str("\nPathologiesegmenten:\n");
    for (segment, name) in table.pathologies() {
        prompt.push_str(&format!("  {segment} {name}\n"));
    }
    prompt.push_str(
        "\nAntwoord ALTIJD met uitsluitend JSON, zonder andere tekst.\n\
Als de klacht voldoende informatie bevat:\n\
{\"suggestions\": [{\"code\": \"7920\", \"name\": \"Knie - tendinopathie\", \
\"rationale\": \"...\", \"confidence\": 0.8}], \"needsClarification\": false}\n\
Geef per suggestie een klinische onderbouwing in het Nederlands van één tot \
drie zinnen met de formulering 'passend bij', en een confidence tussen 0 en 1.\n\
Als locatie of aard van de klacht onduidelijk is:\n\
{\"needsClarification\": true, \"clarifyingQuestion\": \"...\"}\n\
Stel dan één gerichte vraag in het Nederlands.",
    );
    prompt
}

/// Map conversation turns onto the provider's chat roles. Resolution turns
/// are bookkeeping and never sent upstream.
pub fn build_messages(turns: &[Turn]) -> Vec<ChatMessage> {
    turns
        .iter()
        .filter(|turn| turn.kind != TurnKind::Resolution)
        .map(|turn| match turn.role {
            TurnRole::Patient => ChatMessage::user(turn.content.clone()),
            TurnRole::System => ChatMessage::assistant(turn.content.clone()),
        })
        .collect()
}
