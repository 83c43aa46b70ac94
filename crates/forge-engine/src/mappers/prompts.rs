use forge_contracts::ideas::{ForgeConfig, ForgeMode, Idea, Language, ECOSYSTEMS, SECTORS};
use serde_json::json;

use crate::transport::ChatMessage;

const IDEA_SCHEMA: &str = "Return a JSON array where each object includes title, tagline, description, ecosystem, sector, degenScore (integer 0-100), and features (array of strings). No extra text outside the JSON.";

pub(crate) fn generate_ideas(config: &ForgeConfig, language: Language) -> Vec<ChatMessage> {
    let lang = language.prompt_name();
    let request = json!({
        "mode": config.mode.as_str(),
        "quantity": config.quantity,
        "ecosystems": config.ecosystems,
        "sectors": config.sectors,
        "degenLevel": config.degen_level,
        "userContext": config.user_context,
        "language": lang,
    });

    let brief = match config.mode {
        ForgeMode::Random => format!(
            "Generate {} chaotic Web3 ideas with wildly varying ecosystems and sectors, drawing from {} and {}. Let the degen score swing hard between ideas. Keep the tone punchy.",
            config.quantity,
            ECOSYSTEMS.join("/"),
            SECTORS.join("/"),
        ),
        ForgeMode::Targeted => {
            let mut brief = format!(
                "Generate {} Web3 ideas targeting ecosystems: {} and sectors: {} with risk level {} (0=safe, 100=wild). High risk favors meme mechanics and experimental tokenomics; low risk favors real-world assets, infrastructure and institutional-grade DeFi.",
                config.quantity,
                join_or_any(&config.ecosystems),
                join_or_any(&config.sectors),
                config.degen_level,
            );
            if let Some(context) = &config.user_context {
                brief.push_str(&format!(
                    " Additional context from the user (prioritize this): {context}"
                ));
            }
            brief
        }
    };

    vec![
        ChatMessage::system(format!(
            "You are a cyberpunk crypto venture architect who understands DeFi, DePin and GameFi mechanics. Be concise, punchy and technical. {IDEA_SCHEMA}"
        )),
        ChatMessage::user(format!(
            "{brief}\nWrite title, tagline, description and features in {lang}.\nREQUEST_JSON:\n{request}"
        )),
    ]
}

pub(crate) fn verify_idea(idea: &Idea, language: Language) -> Vec<ChatMessage> {
    let lang = language.prompt_name();
    let request = json!({
        "title": idea.title,
        "description": idea.description,
        "ecosystem": idea.ecosystem,
        "language": lang,
    });
    vec![
        ChatMessage::system("You are a Web3 market analyst. Always respond with valid JSON."),
        ChatMessage::user(format!(
            "Evaluate the uniqueness of this Web3 idea. Look for existing projects with similar names or mechanisms; if there is a collision, suggest a pivot.\n\
Return JSON with {{ \"isUnique\": boolean, \"similarProjects\": [ {{ \"name\": string, \"url\"?: string, \"description\"?: string }} ], \"notes\": string, \"pivotSuggestion\"?: string }}.\n\
Write notes and pivotSuggestion in {lang}.\nIDEA_JSON:\n{request}"
        )),
    ]
}

pub(crate) fn generate_blueprint(idea: &Idea, language: Language) -> Vec<ChatMessage> {
    let lang = language.prompt_name();
    let request = json!({
        "title": idea.title,
        "tagline": idea.tagline,
        "description": idea.description,
        "sector": idea.sector,
        "chain": idea.ecosystem,
        "language": lang,
    });
    vec![
        ChatMessage::system("Respond only with JSON describing blueprint sections."),
        ChatMessage::user(format!(
            "Craft a technical blueprint for this Web3 project. Include an executive summary, tokenomics (allocations, vesting, utility), a roadmap in 4 phases, and the technical architecture (contracts, frontend, indexing).\n\
Return JSON with {{ \"overview\", \"tokenomics\", \"roadmap\", \"technicalArchitecture\" }} and optionally \"contractCode\", \"frontendSnippet\", \"deploymentUrl\". Write all content in {lang}.\nIDEA_JSON:\n{request}"
        )),
    ]
}

pub(crate) fn translate_idea(idea: &Idea, target: Language) -> Vec<ChatMessage> {
    let lang = target.prompt_name();
    let request = json!({
        "title": idea.title,
        "tagline": idea.tagline,
        "description": idea.description,
        "features": idea.features,
    });
    vec![
        ChatMessage::system("Return valid JSON with the translated fields."),
        ChatMessage::user(format!(
            "Translate this Web3 idea into {lang}, keeping tone and technical detail. Return JSON with title, tagline, description, features (array of strings).\nIDEA_JSON:\n{request}"
        )),
    ]
}

pub(crate) fn generate_contract_code(idea: &Idea) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system("Respond with code only."),
        ChatMessage::user(format!(
            "Write a Solidity smart contract skeleton for {}. Context: {}. Use {} conventions (ERC20, ERC721 or custom logic as appropriate). Return only the code.",
            idea.title, idea.description, idea.ecosystem
        )),
    ]
}

fn join_or_any(tags: &[String]) -> String {
    if tags.is_empty() {
        "any".to_string()
    } else {
        tags.join(", ")
    }
}
